//! Query parser
//!
//! Recursive descent over the token stream, producing the immutable
//! compiled form: a union of location paths, each a chain of steps with
//! axis, node test, and predicate expressions.

use super::lexer::{Lexer, Token, TokenKind};
use crate::error::{Error, Result, SyntaxErrorKind};

/// A compiled query expression: one or more union branches.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub paths: Vec<LocationPath>,
}

/// One union branch.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPath {
    /// Absolute paths start at the document sentinel.
    pub absolute: bool,
    pub steps: Vec<Step>,
}

/// One location step.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<PredExpr>,
}

/// Supported traversal axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
    SelfAxis,
}

impl Axis {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "child" => Some(Axis::Child),
            "descendant" => Some(Axis::Descendant),
            "descendant-or-self" => Some(Axis::DescendantOrSelf),
            "parent" => Some(Axis::Parent),
            "ancestor" => Some(Axis::Ancestor),
            "ancestor-or-self" => Some(Axis::AncestorOrSelf),
            "following-sibling" => Some(Axis::FollowingSibling),
            "preceding-sibling" => Some(Axis::PrecedingSibling),
            "following" => Some(Axis::Following),
            "preceding" => Some(Axis::Preceding),
            "self" => Some(Axis::SelfAxis),
            _ => None,
        }
    }
}

/// Node test of a location step.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeTest {
    /// A (possibly prefixed) tag name.
    Name {
        prefix: Option<String>,
        local: String,
    },
    /// `*` — any tag.
    Wildcard,
    /// `prefix:*` — any tag in a namespace.
    PrefixWildcard(String),
    /// `node()`
    Node,
    /// `text()`
    Text,
    /// `comment()`
    Comment,
    /// `processing-instruction()`, optionally with a target literal.
    ProcessingInstruction(Option<String>),
}

/// Predicate expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum PredExpr {
    Or(Box<PredExpr>, Box<PredExpr>),
    And(Box<PredExpr>, Box<PredExpr>),
    Compare(Box<PredExpr>, CmpOp, Box<PredExpr>),
    /// `@name` — attribute reference on the candidate node.
    Attribute {
        prefix: Option<String>,
        local: String,
    },
    Literal(String),
    Number(f64),
    /// Function call, resolved at evaluation time.
    Call(String, Vec<PredExpr>),
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

fn descendant_or_self_node() -> Step {
    Step {
        axis: Axis::DescendantOrSelf,
        test: NodeTest::Node,
        predicates: Vec::new(),
    }
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

/// Parse a query expression.
pub fn parse(input: &str) -> Result<Expr> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            break;
        }
    }
    Parser {
        input,
        tokens,
        pos: 0,
    }
    .parse()
}

impl<'a> Parser<'a> {
    fn current(&self) -> &Token {
        // The token vector always ends with Eof.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn syntax(&self, kind: SyntaxErrorKind, offset: usize) -> Error {
        Error::syntax(kind, self.input, offset)
    }

    fn unsupported(&self, construct: &str, offset: usize) -> Error {
        Error::Unsupported {
            construct: construct.to_string(),
            offset,
        }
    }

    fn parse(mut self) -> Result<Expr> {
        if self.current().kind == TokenKind::Eof {
            return Err(self.syntax(SyntaxErrorKind::MissingLocationPath, 0));
        }
        let mut paths = vec![self.parse_path()?];
        while self.current().kind == TokenKind::Pipe {
            self.advance();
            paths.push(self.parse_path()?);
        }
        if self.current().kind != TokenKind::Eof {
            let offset = self.current().offset;
            return Err(self.syntax(SyntaxErrorKind::InvalidPredicate, offset));
        }
        Ok(Expr { paths })
    }

    fn parse_path(&mut self) -> Result<LocationPath> {
        let mut absolute = false;
        let mut steps = Vec::new();
        match self.current().kind {
            TokenKind::Slash => {
                absolute = true;
                self.advance();
            }
            TokenKind::DoubleSlash => {
                // A leading '//' is not an absolute marker, just the
                // descendant-or-self step applied to the start node.
                steps.push(descendant_or_self_node());
                self.advance();
            }
            _ => {}
        }
        steps.push(self.parse_step()?);
        loop {
            match self.current().kind {
                TokenKind::Slash => {
                    self.advance();
                    steps.push(self.parse_step()?);
                }
                TokenKind::DoubleSlash => {
                    self.advance();
                    steps.push(descendant_or_self_node());
                    steps.push(self.parse_step()?);
                }
                _ => break,
            }
        }
        Ok(LocationPath { absolute, steps })
    }

    fn parse_step(&mut self) -> Result<Step> {
        let offset = self.current().offset;
        match &self.current().kind {
            TokenKind::At => {
                return Err(self.unsupported("attribute axis location step", offset))
            }
            TokenKind::Dot => return Err(self.unsupported("'.' location step", offset)),
            TokenKind::DoubleDot => return Err(self.unsupported("'..' location step", offset)),
            _ => {}
        }

        let mut axis = Axis::Child;
        if let TokenKind::Name(name) = &self.current().kind {
            if self.peek().kind == TokenKind::AxisSeparator {
                axis = match Axis::from_name(name) {
                    Some(axis) => axis,
                    None if name == "attribute" || name == "namespace" => {
                        return Err(
                            self.unsupported(&format!("the '{}' axis", name), offset)
                        );
                    }
                    None => {
                        return Err(
                            self.syntax(SyntaxErrorKind::UnknownAxis(name.clone()), offset)
                        );
                    }
                };
                self.advance();
                self.advance();
            }
        }

        let test = self.parse_node_test()?;
        let mut predicates = Vec::new();
        while self.current().kind == TokenKind::OpenBracket {
            let open = self.current().offset;
            self.advance();
            predicates.push(self.parse_or_expr()?);
            if self.current().kind != TokenKind::CloseBracket {
                return Err(self.syntax(SyntaxErrorKind::UnterminatedBracket, open));
            }
            self.advance();
        }

        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn parse_node_test(&mut self) -> Result<NodeTest> {
        let offset = self.current().offset;
        match self.current().kind.clone() {
            TokenKind::Star => {
                self.advance();
                Ok(NodeTest::Wildcard)
            }
            TokenKind::Name(name) => {
                if self.peek().kind == TokenKind::OpenParens {
                    return self.parse_type_test(&name, offset);
                }
                self.advance();
                if self.current().kind == TokenKind::Colon {
                    self.advance();
                    match self.current().kind.clone() {
                        TokenKind::Star => {
                            self.advance();
                            Ok(NodeTest::PrefixWildcard(name))
                        }
                        TokenKind::Name(local) => {
                            self.advance();
                            Ok(NodeTest::Name {
                                prefix: Some(name),
                                local,
                            })
                        }
                        _ => {
                            let at = self.current().offset;
                            Err(self.syntax(SyntaxErrorKind::MissingNodeTest, at))
                        }
                    }
                } else {
                    Ok(NodeTest::Name {
                        prefix: None,
                        local: name,
                    })
                }
            }
            _ => Err(self.syntax(SyntaxErrorKind::MissingNodeTest, offset)),
        }
    }

    fn parse_type_test(&mut self, name: &str, offset: usize) -> Result<NodeTest> {
        self.advance(); // the name
        let open = self.current().offset;
        self.advance(); // '('
        let arg = if let TokenKind::Literal(s) = &self.current().kind {
            let s = s.clone();
            self.advance();
            Some(s)
        } else {
            None
        };
        if self.current().kind != TokenKind::CloseParens {
            if self.current().kind == TokenKind::Eof {
                return Err(self.syntax(SyntaxErrorKind::UnterminatedParen, open));
            }
            // Something other than a string literal between the parens.
            let at = self.current().offset;
            return Err(self.syntax(SyntaxErrorKind::InvalidTypeTestArgument, at));
        }
        self.advance();
        match name {
            "node" => Ok(NodeTest::Node),
            "text" => Ok(NodeTest::Text),
            "comment" => Ok(NodeTest::Comment),
            "processing-instruction" => Ok(NodeTest::ProcessingInstruction(arg)),
            _ => Err(self.syntax(SyntaxErrorKind::MissingNodeTest, offset)),
        }
    }

    fn parse_or_expr(&mut self) -> Result<PredExpr> {
        let mut left = self.parse_and_expr()?;
        while self.current().kind == TokenKind::Or {
            self.advance();
            let right = self.parse_and_expr()?;
            left = PredExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<PredExpr> {
        let mut left = self.parse_cmp_expr()?;
        while self.current().kind == TokenKind::And {
            self.advance();
            let right = self.parse_cmp_expr()?;
            left = PredExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_cmp_expr(&mut self) -> Result<PredExpr> {
        let left = self.parse_operand()?;
        let op = match self.current().kind {
            TokenKind::Eq => Some(CmpOp::Eq),
            TokenKind::NotEq => Some(CmpOp::NotEq),
            TokenKind::Lt => Some(CmpOp::Lt),
            TokenKind::LtEq => Some(CmpOp::LtEq),
            TokenKind::Gt => Some(CmpOp::Gt),
            TokenKind::GtEq => Some(CmpOp::GtEq),
            _ => None,
        };
        let expr = match op {
            Some(op) => {
                self.advance();
                let right = self.parse_operand()?;
                PredExpr::Compare(Box::new(left), op, Box::new(right))
            }
            None => left,
        };
        if matches!(self.current().kind, TokenKind::Plus | TokenKind::Minus) {
            let offset = self.current().offset;
            return Err(self.unsupported("arithmetic in predicate", offset));
        }
        Ok(expr)
    }

    fn parse_operand(&mut self) -> Result<PredExpr> {
        let offset = self.current().offset;
        match self.current().kind.clone() {
            TokenKind::At => {
                self.advance();
                let name = match self.current().kind.clone() {
                    TokenKind::Name(name) => name,
                    _ => {
                        let at = self.current().offset;
                        return Err(self.syntax(SyntaxErrorKind::InvalidPredicate, at));
                    }
                };
                self.advance();
                if self.current().kind == TokenKind::Colon {
                    self.advance();
                    match self.current().kind.clone() {
                        TokenKind::Name(local) => {
                            self.advance();
                            Ok(PredExpr::Attribute {
                                prefix: Some(name),
                                local,
                            })
                        }
                        _ => {
                            let at = self.current().offset;
                            Err(self.syntax(SyntaxErrorKind::InvalidPredicate, at))
                        }
                    }
                } else {
                    Ok(PredExpr::Attribute {
                        prefix: None,
                        local: name,
                    })
                }
            }
            TokenKind::Literal(s) => {
                self.advance();
                Ok(PredExpr::Literal(s))
            }
            TokenKind::Number(n) => {
                self.advance();
                Ok(PredExpr::Number(n))
            }
            TokenKind::Dollar => Err(self.unsupported("variable reference", offset)),
            TokenKind::Plus | TokenKind::Minus => {
                Err(self.unsupported("arithmetic in predicate", offset))
            }
            TokenKind::OpenParens => {
                self.advance();
                let inner = self.parse_or_expr()?;
                if self.current().kind != TokenKind::CloseParens {
                    return Err(self.syntax(SyntaxErrorKind::UnterminatedParen, offset));
                }
                self.advance();
                Ok(inner)
            }
            TokenKind::Name(name) => {
                if self.peek().kind != TokenKind::OpenParens {
                    return Err(self.syntax(SyntaxErrorKind::InvalidPredicate, offset));
                }
                self.advance();
                let open = self.current().offset;
                self.advance(); // '('
                let mut args = Vec::new();
                if self.current().kind != TokenKind::CloseParens {
                    args.push(self.parse_or_expr()?);
                    while self.current().kind == TokenKind::Comma {
                        self.advance();
                        args.push(self.parse_or_expr()?);
                    }
                }
                if self.current().kind != TokenKind::CloseParens {
                    return Err(self.syntax(SyntaxErrorKind::UnterminatedParen, open));
                }
                self.advance();
                Ok(PredExpr::Call(name, args))
            }
            _ => Err(self.syntax(SyntaxErrorKind::InvalidPredicate, offset)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_absolute_path() {
        let expr = parse("/library/book").unwrap();
        assert_eq!(expr.paths.len(), 1);
        let path = &expr.paths[0];
        assert!(path.absolute);
        assert_eq!(path.steps.len(), 2);
        assert_eq!(path.steps[0].axis, Axis::Child);
        assert_eq!(
            path.steps[1].test,
            NodeTest::Name {
                prefix: None,
                local: "book".into()
            }
        );
    }

    #[test]
    fn test_double_slash_expands() {
        let expr = parse("//title").unwrap();
        let path = &expr.paths[0];
        assert!(!path.absolute);
        assert_eq!(path.steps.len(), 2);
        assert_eq!(path.steps[0].axis, Axis::DescendantOrSelf);
        assert_eq!(path.steps[0].test, NodeTest::Node);
    }

    #[test]
    fn test_explicit_axis() {
        let expr = parse("ancestor::node()").unwrap();
        let step = &expr.paths[0].steps[0];
        assert_eq!(step.axis, Axis::Ancestor);
        assert_eq!(step.test, NodeTest::Node);
    }

    #[test]
    fn test_unknown_axis() {
        let err = parse("sideways::a").unwrap_err();
        match err {
            Error::Syntax { kind, offset, .. } => {
                assert_eq!(kind, SyntaxErrorKind::UnknownAxis("sideways".into()));
                assert_eq!(offset, 0);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_missing_node_test() {
        let err = parse("/a/").unwrap_err();
        assert!(matches!(
            err,
            Error::Syntax {
                kind: SyntaxErrorKind::MissingNodeTest,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_input() {
        let err = parse("").unwrap_err();
        assert!(matches!(
            err,
            Error::Syntax {
                kind: SyntaxErrorKind::MissingLocationPath,
                ..
            }
        ));
    }

    #[test]
    fn test_unterminated_bracket() {
        let err = parse("a[@id='x'").unwrap_err();
        match err {
            Error::Syntax { kind, offset, .. } => {
                assert_eq!(kind, SyntaxErrorKind::UnterminatedBracket);
                assert_eq!(offset, 1);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_predicate_tree() {
        let expr = parse("book[@lang='en' and position() = 2]").unwrap();
        let step = &expr.paths[0].steps[0];
        assert_eq!(step.predicates.len(), 1);
        match &step.predicates[0] {
            PredExpr::And(left, right) => {
                assert!(matches!(**left, PredExpr::Compare(..)));
                assert!(matches!(**right, PredExpr::Compare(..)));
            }
            other => panic!("unexpected predicate {:?}", other),
        }
    }

    #[test]
    fn test_union() {
        let expr = parse("//a | //b").unwrap();
        assert_eq!(expr.paths.len(), 2);
    }

    #[test]
    fn test_prefixed_name_test() {
        let expr = parse("ns:item/ns:*").unwrap();
        let steps = &expr.paths[0].steps;
        assert_eq!(
            steps[0].test,
            NodeTest::Name {
                prefix: Some("ns".into()),
                local: "item".into()
            }
        );
        assert_eq!(steps[1].test, NodeTest::PrefixWildcard("ns".into()));
    }

    #[test]
    fn test_pi_target_test() {
        let expr = parse("processing-instruction('style')").unwrap();
        assert_eq!(
            expr.paths[0].steps[0].test,
            NodeTest::ProcessingInstruction(Some("style".into()))
        );
    }

    #[test]
    fn test_pi_target_must_be_literal() {
        let err = parse("processing-instruction(foo)").unwrap_err();
        match err {
            Error::Syntax { kind, offset, .. } => {
                assert_eq!(kind, SyntaxErrorKind::InvalidTypeTestArgument);
                assert_eq!(offset, 23);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_type_test_unterminated_paren() {
        let err = parse("a/text(").unwrap_err();
        match err {
            Error::Syntax { kind, offset, .. } => {
                assert_eq!(kind, SyntaxErrorKind::UnterminatedParen);
                assert_eq!(offset, 6);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_constructs() {
        for (text, needle) in [
            ("a/@href", "attribute"),
            ("attribute::href", "attribute"),
            ("a/..", "'..'"),
            ("./a", "'.'"),
            ("a[$x = 1]", "variable"),
            ("a[position() + 1]", "arithmetic"),
        ] {
            match parse(text) {
                Err(Error::Unsupported { construct, .. }) => {
                    assert!(
                        construct.contains(needle),
                        "{}: construct {:?}",
                        text,
                        construct
                    );
                }
                other => panic!("{}: expected unsupported, got {:?}", text, other),
            }
        }
    }

    #[test]
    fn test_number_predicate() {
        let expr = parse("book[2]").unwrap();
        assert_eq!(expr.paths[0].steps[0].predicates[0], PredExpr::Number(2.0));
    }
}

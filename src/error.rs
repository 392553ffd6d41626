//! Error taxonomy
//!
//! One variant per failure class. Every error is raised synchronously at the
//! offending call; nothing is retried and no partial mutation is rolled back.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// How far into the remaining text a syntax-error excerpt reaches.
const EXCERPT_LEN: usize = 24;

/// Classified query-syntax failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxErrorKind {
    #[error("missing location path")]
    MissingLocationPath,
    #[error("unknown axis '{0}'")]
    UnknownAxis(String),
    #[error("missing node test")]
    MissingNodeTest,
    #[error("unterminated '[' predicate")]
    UnterminatedBracket,
    #[error("unterminated '(' group")]
    UnterminatedParen,
    #[error("unterminated string literal")]
    UnterminatedLiteral,
    #[error("unrecognized predicate expression")]
    InvalidPredicate,
    #[error("unexpected character '{0}'")]
    UnexpectedCharacter(char),
    #[error("type test argument must be a string literal")]
    InvalidTypeTestArgument,
}

#[derive(Debug, Error)]
pub enum Error {
    /// Attaching an already-attached node, mutating the sentinel, or
    /// touching the document root where that is forbidden.
    #[error("structural conflict: {0}")]
    StructuralConflict(String),

    /// Invalid character data, names, or comment/PI content.
    #[error("invalid content: {0}")]
    InvalidContent(String),

    /// Tokenizing/parsing failure, with position and a short excerpt.
    #[error("syntax error at offset {offset} near {excerpt:?}: {kind}")]
    Syntax {
        kind: SyntaxErrorKind,
        offset: usize,
        excerpt: String,
    },

    /// A recognized XPath construct that this subset deliberately omits.
    #[error("unsupported query construct at offset {offset}: {construct}")]
    Unsupported { construct: String, offset: usize },

    /// A well-formed query that fails at run time.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// More than one node matched where exactly one was required.
    #[error("ambiguous match: {0}")]
    Ambiguous(String),
}

impl Error {
    /// Build a syntax error from the full source text and an offset into it.
    pub(crate) fn syntax(kind: SyntaxErrorKind, source: &str, offset: usize) -> Self {
        let rest = source.get(offset..).unwrap_or("");
        let mut end = rest.len().min(EXCERPT_LEN);
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        Error::Syntax {
            kind,
            offset,
            excerpt: rest[..end].to_string(),
        }
    }
}

//! Compiled-expression cache
//!
//! A bounded LRU keyed by source text. Entries are `Arc`-shared immutable
//! `Expr` values, so a hit hands out the compiled form without re-parsing
//! and is safe to share across threads.

use super::parser::{self, Expr};
use crate::error::Result;
use log::trace;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

const CACHE_CAPACITY: usize = 256;

static CACHE: OnceLock<Mutex<LruCache<String, Arc<Expr>>>> = OnceLock::new();

fn cache() -> &'static Mutex<LruCache<String, Arc<Expr>>> {
    CACHE.get_or_init(|| {
        let capacity = NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Mutex::new(LruCache::new(capacity))
    })
}

/// Compile a query, consulting the cache first.
pub fn compile(text: &str) -> Result<Arc<Expr>> {
    {
        let mut guard = cache().lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(expr) = guard.get(text) {
            trace!("expression cache hit: {}", text);
            return Ok(expr.clone());
        }
    }
    trace!("expression cache miss: {}", text);
    let expr = Arc::new(parser::parse(text)?);
    let mut guard = cache().lock().unwrap_or_else(PoisonError::into_inner);
    guard.put(text.to_string(), expr.clone());
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_shares_compiled_form() {
        let first = compile("/cache/test/path").unwrap();
        let second = compile("/cache/test/path").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_errors_are_not_cached() {
        assert!(compile("/cache/[").is_err());
        assert!(compile("/cache/[").is_err());
    }
}

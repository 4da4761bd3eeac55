//! String interning for identifiers

pub use lasso::Spur as Symbol;
use lasso::ThreadedRodeo;
use std::sync::{Arc, Mutex};

/// Thread-safe string interner
///
/// Cloning is cheap; clones share the same underlying table.
#[derive(Clone)]
pub struct Interner {
    inner: Arc<Mutex<ThreadedRodeo>>,
}

impl Interner {
    /// Create a new empty interner
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ThreadedRodeo::new())),
        }
    }

    /// Intern a string, returning its symbol
    pub fn intern(&self, s: &str) -> Symbol {
        self.inner.lock().unwrap().get_or_intern(s)
    }

    /// Resolve a symbol back to its string
    pub fn resolve(&self, sym: &Symbol) -> String {
        self.inner.lock().unwrap().resolve(sym).to_string()
    }

    /// Resolve a symbol, returning `None` if it was never interned here
    pub fn try_resolve(&self, sym: &Symbol) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .try_resolve(sym)
            .map(|s| s.to_string())
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_roundtrip() {
        let interner = Interner::new();
        let sym = interner.intern("vertex");
        assert_eq!(interner.resolve(&sym), "vertex");
        assert_eq!(interner.intern("vertex"), sym);
    }
}

use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};

use crate::compiler::{compile_jsx, CompileOptions};
use crate::error::CompileError;

const DEFAULT_CAPACITY: usize = 64;

/// In-memory memo of compile results, keyed by a hash of pragmas + source.
/// Failed compiles are cached too so a broken document is parsed once.
pub struct CompileCache {
    entries: HashMap<String, Result<String, CompileError>>,
    order: VecDeque<String>,
    capacity: usize,
}

impl CompileCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn compute_hash(source: &str, options: &CompileOptions) -> String {
        let mut hasher = Sha256::new();
        hasher.update(options.element_pragma.as_bytes());
        hasher.update([0]);
        hasher.update(options.fragment_pragma.as_bytes());
        hasher.update([0]);
        hasher.update(source.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn compile(
        &mut self,
        source: &str,
        options: &CompileOptions,
    ) -> Result<String, CompileError> {
        let hash = Self::compute_hash(source, options);
        if let Some(hit) = self.entries.get(&hash) {
            return hit.clone();
        }

        let result = compile_jsx(source, options);
        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(hash.clone());
        self.entries.insert(hash, result.clone());
        result
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CompileCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_depends_on_pragma() {
        let a = CompileOptions::default();
        let b = CompileOptions {
            element_pragma: "h".into(),
            fragment_pragma: "Fragment".into(),
        };
        assert_ne!(
            CompileCache::compute_hash("<div />", &a),
            CompileCache::compute_hash("<div />", &b)
        );
    }

    #[test]
    fn test_cache_hit_returns_same_result() {
        let mut cache = CompileCache::new();
        let options = CompileOptions::default();
        let first = cache.compile("<div />", &options);
        let second = cache.compile("<div />", &options);
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_evicts_oldest() {
        let mut cache = CompileCache::with_capacity(2);
        let options = CompileOptions::default();
        let _ = cache.compile("<a />", &options);
        let _ = cache.compile("<b />", &options);
        let _ = cache.compile("<c />", &options);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_errors_are_cached() {
        let mut cache = CompileCache::new();
        let options = CompileOptions::default();
        assert!(cache.compile("<div>", &options).is_err());
        assert!(cache.compile("<div>", &options).is_err());
        assert_eq!(cache.len(), 1);
    }
}

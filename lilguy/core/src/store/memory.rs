//! In-memory backend

use std::collections::HashMap;

use parking_lot::RwLock;

use super::StateBackend;

/// Volatile backend, used for tests and embedded hosts
#[derive(Debug, Default)]
pub struct MemoryBackend {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    /// Create an empty backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend pre-populated with `values`
    #[must_use]
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: RwLock::new(
                values
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Copy of every entry
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.values.read().clone()
    }
}

impl StateBackend for MemoryBackend {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values
            .write()
            .insert(key.to_string(), value.to_string());
    }

    fn keys(&self) -> Vec<String> {
        self.values.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins() {
        let backend = MemoryBackend::new();
        backend.set("health", "90");
        backend.set("health", "80");
        assert_eq!(backend.get("health").as_deref(), Some("80"));
        assert_eq!(backend.keys(), vec!["health".to_string()]);
    }

    #[test]
    fn test_with_values() {
        let backend = MemoryBackend::with_values([("lilGuyStage", "angel")]);
        assert_eq!(backend.get("lilGuyStage").as_deref(), Some("angel"));
        assert_eq!(backend.snapshot().len(), 1);
    }
}

use dashmap::DashMap;
use sha2::{Digest, Sha256};

use crate::scraper::truncate_chars;

/// Only this much of the article takes part in the fingerprint.
pub const KEY_TEXT_CHARS: usize = 1000;

// Hash of the text prefix + source
pub fn cache_key(text: &str, source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(truncate_chars(text, KEY_TEXT_CHARS));
    hasher.update("|");
    hasher.update(source);
    format!("{:x}", hasher.finalize())
}

/// Process-lifetime store of raw analysis texts. No eviction.
#[derive(Default)]
pub struct AnalysisCache {
    entries: DashMap<String, String>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn put(&self, key: String, analysis: String) {
        self.entries.insert(key, analysis);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_deterministic_and_source_sensitive() {
        let text = "Ο πρωθυπουργός μίλησε σήμερα στη Βουλή.";
        assert_eq!(cache_key(text, "ERT"), cache_key(text, "ERT"));
        assert_ne!(cache_key(text, "ERT"), cache_key(text, "SKAI"));
        assert_eq!(cache_key(text, "ERT").len(), 64);
    }

    #[test]
    fn only_the_first_thousand_characters_count() {
        let prefix = "λ".repeat(KEY_TEXT_CHARS);
        let a = format!("{}τέλος πρώτο", prefix);
        let b = format!("{}άλλο τέλος", prefix);
        assert_eq!(cache_key(&a, ""), cache_key(&b, ""));

        let shorter = "λ".repeat(KEY_TEXT_CHARS - 1);
        assert_ne!(cache_key(&shorter, ""), cache_key(&prefix, ""));
    }

    #[test]
    fn stores_and_returns_entries() {
        let cache = AnalysisCache::new();
        let key = cache_key("κείμενο", "ERT");
        assert!(cache.get(&key).is_none());

        cache.put(key.clone(), "ανάλυση".to_string());
        assert_eq!(cache.get(&key).as_deref(), Some("ανάλυση"));
        assert_eq!(cache.len(), 1);
    }
}

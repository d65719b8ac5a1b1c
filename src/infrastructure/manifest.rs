use crate::infrastructure::processors::common::slash_path;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// `/name.ext` → `/name.ext?id=<hash>` for every emitted asset, keys sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AssetManifest {
    entries: BTreeMap<String, String>,
}

impl AssetManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// `relative` is the output path under the public path.
    pub fn insert(&mut self, relative: &Path, content: &[u8]) {
        let key = format!("/{}", slash_path(relative));
        let value = format!("{}?id={}", key, content_hash(content));
        self.entries.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> String {
        let mut json = serde_json::to_string_pretty(&self.entries).unwrap_or_else(|_| "{}".to_string());
        json.push('\n');
        json
    }
}

/// First 20 hex characters of the blake3 digest.
pub fn content_hash(content: &[u8]) -> String {
    let hash = blake3::hash(content).to_hex();
    hash.as_str()[..20].to_string()
}

//! Key filtering logic for the enumerator.

use std::collections::HashSet;

/// Extensions accepted when no allow-list is configured
pub const DEFAULT_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "gif"];

/// Decides whether an object key refers to image content
pub struct ImageKeyFilter {
    /// Lowercased file extensions to include
    extensions: HashSet<String>,
    /// Key suffix of the per-job sentinel object
    sentinel_name: String,
}

impl ImageKeyFilter {
    /// Create a filter with the default extension allow-list
    pub fn new(sentinel_name: &str) -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            sentinel_name: sentinel_name.to_string(),
        }
    }

    /// Override the list of extensions to accept
    pub fn with_extensions(mut self, extensions: &[String]) -> Self {
        self.extensions = extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    /// Check if a key should be hashed
    pub fn should_include(&self, key: &str) -> bool {
        // Folder placeholders
        if key.ends_with('/') {
            return false;
        }

        let name = key.rsplit('/').next().unwrap_or(key);
        if name == self.sentinel_name {
            return false;
        }

        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                self.extensions.contains(&ext.to_lowercase())
            }
            _ => false,
        }
    }
}

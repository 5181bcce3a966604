use url::Url;

use crate::error::ConfigError;

/// Round-robin cursor over a non-empty source list.
pub struct SourceRotation {
    urls: Vec<Url>,
    cursor: usize,
}

impl SourceRotation {
    pub fn new(urls: Vec<Url>) -> Result<Self, ConfigError> {
        if urls.is_empty() {
            return Err(ConfigError::NoSources);
        }
        Ok(Self { urls, cursor: 0 })
    }

    pub fn next(&mut self) -> &Url {
        let idx = self.cursor % self.urls.len();
        self.cursor = self.cursor.wrapping_add(1);
        &self.urls[idx]
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }
}

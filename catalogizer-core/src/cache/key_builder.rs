//! Unified cache key builder
//!
//! All recognition cache keys are constructed here so key shapes stay
//! consistent and environments can be isolated by prefix.

/// Cache key builder with a configurable prefix (default: "catalogizer")
pub struct KeyBuilder {
    prefix: String,
}

impl KeyBuilder {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Recognition result for a file content hash.
    ///
    /// The same hash recognized under an explicit media type is a
    /// different entry: the provider set differs.
    #[must_use]
    pub fn recognition(&self, file_hash: &str, media_type: Option<&str>) -> String {
        match media_type {
            Some(ty) => format!("{}:recognition:{}:{}", self.prefix, file_hash, ty),
            None => format!("{}:recognition:{}:auto", self.prefix, file_hash),
        }
    }
}

impl Default for KeyBuilder {
    fn default() -> Self {
        Self::new("catalogizer")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognition_key_shapes() {
        let kb = KeyBuilder::default();
        assert_eq!(
            kb.recognition("abc123", None),
            "catalogizer:recognition:abc123:auto"
        );
        assert_eq!(
            kb.recognition("abc123", Some("movie")),
            "catalogizer:recognition:abc123:movie"
        );
    }

    #[test]
    fn test_prefix_isolation() {
        let kb = KeyBuilder::new("staging");
        assert!(kb.recognition("h", None).starts_with("staging:"));
    }
}

//! Artifact identifiers.
//!
//! An artifact is not a stored row; its id is the grouping key shared by all
//! of its versions. Ids double as directory names in the blob store, so the
//! accepted alphabet is deliberately narrow.

use crate::MAX_ARTIFACT_ID_LEN;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Validated artifact identifier (e.g. `model-x`).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Parse and validate an artifact id.
    ///
    /// Accepts 1 to 128 characters from `[A-Za-z0-9._-]`, not starting with `.`.
    pub fn parse(s: &str) -> crate::Result<Self> {
        if s.is_empty() {
            return Err(crate::Error::InvalidArtifactId(
                "artifact id cannot be empty".to_string(),
            ));
        }

        if s.chars().count() > MAX_ARTIFACT_ID_LEN {
            return Err(crate::Error::InvalidArtifactId(format!(
                "artifact id exceeds {MAX_ARTIFACT_ID_LEN} characters"
            )));
        }

        if s.starts_with('.') {
            return Err(crate::Error::InvalidArtifactId(format!(
                "artifact id cannot start with '.': {s}"
            )));
        }

        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        {
            return Err(crate::Error::InvalidArtifactId(format!(
                "invalid character {c:?} in artifact id: {s}"
            )));
        }

        Ok(Self(s.to_string()))
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ArtifactId {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::parse(&value)
    }
}

impl From<ArtifactId> for String {
    fn from(id: ArtifactId) -> Self {
        id.0
    }
}

impl AsRef<str> for ArtifactId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArtifactId({})", self.0)
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_artifact_ids() {
        for id in ["model-x", "dataset_v2", "config.yaml", "A", "a-b_c.d-9"] {
            assert_eq!(ArtifactId::parse(id).unwrap().as_str(), id);
        }
    }

    #[test]
    fn test_invalid_artifact_ids() {
        assert!(ArtifactId::parse("").is_err());
        assert!(ArtifactId::parse(".hidden").is_err());
        assert!(ArtifactId::parse("..").is_err());
        assert!(ArtifactId::parse("a/b").is_err());
        assert!(ArtifactId::parse("a\\b").is_err());
        assert!(ArtifactId::parse("with space").is_err());
        assert!(ArtifactId::parse("ümlaut").is_err());
        assert!(ArtifactId::parse(&"x".repeat(MAX_ARTIFACT_ID_LEN + 1)).is_err());
        assert!(ArtifactId::parse(&"x".repeat(MAX_ARTIFACT_ID_LEN)).is_ok());
    }

    #[test]
    fn test_serde_validates() {
        let id: ArtifactId = serde_json::from_str("\"model-x\"").unwrap();
        assert_eq!(id.as_str(), "model-x");
        assert!(serde_json::from_str::<ArtifactId>("\"../etc\"").is_err());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"model-x\"");
    }
}

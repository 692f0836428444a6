//! Stream extension registry
//!
//! Extensions are declared with a `feature` command before the constructs
//! they enable appear in the stream.

use crate::error::{Error, Result};

/// Extra author lines on commits.
pub const MULTIPLE_AUTHORS_FEATURE: &str = "multiple-authors";
/// Property lines on commits.
pub const COMMIT_PROPERTIES_FEATURE: &str = "commit-properties";
/// Directory entries with no files under them.
pub const EMPTY_DIRS_FEATURE: &str = "empty-directories";

/// Every feature name this toolkit understands.
pub const FEATURE_NAMES: &[&str] = &[
    MULTIPLE_AUTHORS_FEATURE,
    COMMIT_PROPERTIES_FEATURE,
    EMPTY_DIRS_FEATURE,
];

/// Check that a declared feature is a known one.
pub fn check_feature_name(name: &str) -> Result<()> {
    if FEATURE_NAMES.contains(&name) {
        Ok(())
    } else {
        Err(Error::UnknownFeature(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_features_accepted() {
        for name in FEATURE_NAMES {
            assert!(check_feature_name(name).is_ok());
        }
    }

    #[test]
    fn test_unknown_feature_rejected() {
        let err = check_feature_name("export-marks").unwrap_err();
        assert!(matches!(err, Error::UnknownFeature(name) if name == "export-marks"));
    }
}

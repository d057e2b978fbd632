//! Production-environment guard
//!
//! Rejects candidate configuration values that look like they belong to a
//! production deployment. The guard only ever inspects values about to be
//! written; it never judges data already present in the local copy.

use crate::error::DatabaseUpdateError;

/// Substrings that mark an identifier as production-like.
const PRODUCTION_INDICATORS: [&str; 5] = [
    "yps-your-part-supplier",
    "outboardpartswarehouse",
    "opw-prod",
    "production",
    "live",
];

/// Fail with a `SafetyViolation` if `candidate` contains any production
/// indicator, case-insensitively.
pub fn validate_safe(candidate: &str) -> Result<(), DatabaseUpdateError> {
    let lowered = candidate.to_lowercase();
    for indicator in PRODUCTION_INDICATORS {
        if lowered.contains(indicator) {
            return Err(DatabaseUpdateError::SafetyViolation {
                value: candidate.to_string(),
                indicator,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_shop_key_rejected() {
        let err = validate_safe("opw-prod-store").unwrap_err();
        assert!(matches!(
            err,
            DatabaseUpdateError::SafetyViolation {
                indicator: "opw-prod",
                ..
            }
        ));
    }

    #[test]
    fn test_development_shop_key_accepted() {
        assert!(validate_safe("dev-sandbox-42").is_ok());
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let err = validate_safe("My-LIVE-Shop").unwrap_err();
        assert!(matches!(
            err,
            DatabaseUpdateError::SafetyViolation {
                indicator: "live",
                ..
            }
        ));
    }

    #[test]
    fn test_indicator_matches_as_substring() {
        assert!(validate_safe("outboardpartswarehouse-2").is_err());
        assert!(validate_safe("copy-of-production-db").is_err());
        assert!(validate_safe("yps-your-part-supplier").is_err());
    }
}

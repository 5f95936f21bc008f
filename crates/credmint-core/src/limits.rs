//! Field limits enforced by the credential program.
//!
//! Checking them client-side turns an on-chain failure (after the user has
//! already signed) into a `ValidationFailed` before any network call.
//! Lengths are in bytes, as the program measures them.

use crate::errors::{CredmintError, CredmintResult};

pub const INSTITUTION_NAME_MAX: usize = 64;
pub const INSTITUTION_URI_MAX: usize = 60;
pub const COLLECTION_NAME_MAX: usize = 64;
pub const COLLECTION_URI_MAX: usize = 60;
pub const CREDENTIAL_NAME_MAX: usize = 32;
pub const CREDENTIAL_URI_MAX: usize = 200;
pub const BURN_REASON_MAX: usize = 120;

/// Content reference stored before real metadata has been published.
pub const PLACEHOLDER_URI: &str = "ipfs://placeholder";

/// Symbol carried by every credential token.
pub const CREDENTIAL_SYMBOL: &str = "GG-CERT";

/// Truncate to at most `max` bytes without splitting a UTF-8 character.
pub fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

pub fn check_len(operation: &str, field: &str, value: &str, max: usize) -> CredmintResult<()> {
    if value.len() > max {
        return Err(CredmintError::validation(
            operation,
            format!("{field} is {} bytes, limit is {max}", value.len()),
        ));
    }
    Ok(())
}

pub fn check_non_empty(operation: &str, field: &str, value: &str) -> CredmintResult<()> {
    if value.trim().is_empty() {
        return Err(CredmintError::validation(operation, format!("{field} must not be empty")));
    }
    Ok(())
}

/// A burn reason must be non-blank and at most 120 bytes.
pub fn validate_burn_reason(reason: &str) -> CredmintResult<()> {
    check_non_empty("burn_credential", "reason", reason)?;
    check_len("burn_credential", "reason", reason, BURN_REASON_MAX)
}

pub fn is_placeholder(uri: Option<&str>) -> bool {
    match uri {
        None => true,
        Some(u) => u.trim().is_empty() || u == PLACEHOLDER_URI,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    #[test]
    fn reason_limits() {
        assert!(validate_burn_reason(&"r".repeat(120)).is_ok());
        assert_matches!(
            validate_burn_reason(&"r".repeat(121)),
            Err(CredmintError::ValidationFailed { .. })
        );
        assert_matches!(
            validate_burn_reason("   "),
            Err(CredmintError::ValidationFailed { .. })
        );
    }

    #[test]
    fn placeholder_detection() {
        assert!(is_placeholder(None));
        assert!(is_placeholder(Some(PLACEHOLDER_URI)));
        assert!(is_placeholder(Some("")));
        assert!(!is_placeholder(Some("https://cdn.credmint.io/m/x.json")));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "Université de Montréal";
        let t = truncate_bytes(s, 5);
        assert_eq!(t, "Unive");
        // 'é' spans bytes 9..11
        assert_eq!(truncate_bytes(s, 7), "Univers");
        assert_eq!(truncate_bytes(s, 9), "Universit");
        assert_eq!(truncate_bytes(s, 10), "Universit");
    }

    proptest! {
        #[test]
        fn truncate_never_exceeds_limit(s in "\\PC{0,80}", max in 0usize..70) {
            let t = truncate_bytes(&s, max);
            prop_assert!(t.len() <= max);
            prop_assert!(s.starts_with(t));
        }
    }
}

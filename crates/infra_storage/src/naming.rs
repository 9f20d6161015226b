//! Bucket and object key rules
//!
//! Bucket names follow the cloud storage rules: 3 to 63 characters of
//! lowercase letters, digits, `-`, `_` and `.`, starting and ending with a
//! letter or digit. Keys may contain `/` but no empty, `.` or `..` segments
//! and no leading `/`, so a key can never escape its bucket directory.

use crate::error::StorageError;

const MAX_KEY_BYTES: usize = 1024;

pub fn validate_bucket_name(name: &str) -> Result<(), StorageError> {
    let fail = |reason: &str| Err(StorageError::invalid_bucket(name, reason));

    if !(3..=63).contains(&name.len()) {
        return fail("must be 3 to 63 characters");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'))
    {
        return fail("only lowercase letters, digits, '-', '_' and '.' are allowed");
    }
    let alnum = |c: Option<char>| c.map_or(false, |c| c.is_ascii_alphanumeric());
    if !alnum(name.chars().next()) || !alnum(name.chars().last()) {
        return fail("must start and end with a letter or digit");
    }
    if name.contains("..") {
        return fail("must not contain '..'");
    }
    if name.starts_with("goog") {
        return fail("must not start with 'goog'");
    }
    if name.split('.').count() == 4 && name.split('.').all(|p| p.parse::<u8>().is_ok()) {
        return fail("must not look like an IP address");
    }
    Ok(())
}

pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let fail = |reason: &str| Err(StorageError::invalid_key(key, reason));

    if key.is_empty() {
        return fail("must not be empty");
    }
    if key.len() > MAX_KEY_BYTES {
        return fail("must be at most 1024 bytes");
    }
    if key.starts_with('/') {
        return fail("must not start with '/'");
    }
    if key.contains('\\') || key.chars().any(char::is_control) {
        return fail("must not contain backslashes or control characters");
    }
    if key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
        return fail("must not contain empty, '.' or '..' segments");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_bucket_names() {
        assert!(validate_bucket_name("claims-intake").is_ok());
        assert!(validate_bucket_name("claims.archive_2024").is_ok());
        assert!(validate_bucket_name("ab").is_err());
        assert!(validate_bucket_name("Claims").is_err());
        assert!(validate_bucket_name("-claims").is_err());
        assert!(validate_bucket_name("google-claims").is_err());
        assert!(validate_bucket_name("192.168.5.4").is_err());
    }

    #[test]
    fn test_keys() {
        assert!(validate_key("claims/2024/a.json").is_ok());
        assert!(validate_key("a.json").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("claims/../../etc").is_err());
        assert!(validate_key("claims//a.json").is_err());
        assert!(validate_key("claims/").is_err());
    }

    proptest! {
        #[test]
        fn prop_keys_with_parent_segments_are_rejected(prefix in "[a-z]{1,8}", suffix in "[a-z]{1,8}") {
            let key = format!("{}/../{}", prefix, suffix);
            prop_assert!(validate_key(&key).is_err());
        }
    }
}

//! Key validation shared by every backend.

use crate::{CacheError, CacheResult};

/// Rejects empty keys.
pub fn validate_key(key: &str) -> CacheResult<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey);
    }
    Ok(())
}

/// Rejects a batch if any of its keys is empty. Nothing is sent to the
/// backend for a partially valid batch.
pub fn validate_keys<'a>(keys: impl IntoIterator<Item = &'a str>) -> CacheResult<()> {
    keys.into_iter().try_for_each(validate_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_invalid() {
        assert!(matches!(validate_key(""), Err(CacheError::InvalidKey)));
        assert!(validate_key("events:Order:A1").is_ok());
    }

    #[test]
    fn one_empty_key_rejects_batch() {
        let keys = ["a", "", "c"];
        assert!(matches!(
            validate_keys(keys.iter().copied()),
            Err(CacheError::InvalidKey)
        ));
    }

    #[test]
    fn empty_batch_is_valid() {
        assert!(validate_keys(std::iter::empty()).is_ok());
    }
}

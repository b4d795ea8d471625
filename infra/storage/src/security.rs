use crate::error::StorageError;
use std::path::{Path, PathBuf};

/// Marker embedded in temporary file names; keys may never contain it.
pub(crate) const TMP_MARKER: &str = ".tstmp.";

const MAX_KEY_LEN: usize = 128;

/// Maps a slot name onto a file inside the session directory.
///
/// Keys are flat file names: ASCII alphanumerics plus `.`, `_` and `-`, not starting with a
/// dot, so a key can never name a directory, a hidden file, or anything outside `root`.
pub(crate) fn resolve_key(root: &Path, key: &str) -> Result<PathBuf, StorageError> {
    validate_key(key)?;
    Ok(root.join(key))
}

pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey {
            message: "EMPTY".into(),
            context: Some("Key cannot be empty".into()),
        });
    }

    if key.len() > MAX_KEY_LEN {
        return Err(StorageError::InvalidKey {
            message: format!("{} characters", key.len()).into(),
            context: Some(format!("Key must not exceed {MAX_KEY_LEN} characters").into()),
        });
    }

    if key.starts_with('.') || key.contains(TMP_MARKER) {
        return Err(StorageError::InvalidKey {
            message: key.to_owned().into(),
            context: Some("Key collides with hidden or temporary files".into()),
        });
    }

    if !key.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')) {
        return Err(StorageError::InvalidKey {
            message: key.to_owned().into(),
            context: Some("Key contains illegal characters".into()),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_keys_resolve_inside_root() {
        let root = Path::new("/session");
        let path = resolve_key(root, "tabseal.session_id").unwrap();
        assert_eq!(path, root.join("tabseal.session_id"));
    }

    #[test]
    fn test_traversal_and_hidden_keys_rejected() {
        let root = Path::new("/session");
        for key in ["", "../etc/passwd", "a/b", ".hidden", "x.tstmp.1", "with space"] {
            assert!(
                matches!(resolve_key(root, key), Err(StorageError::InvalidKey { .. })),
                "key {key:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_overlong_key_rejected() {
        let key = "k".repeat(MAX_KEY_LEN + 1);
        assert!(validate_key(&key).is_err());
        assert!(validate_key(&key[..MAX_KEY_LEN]).is_ok());
    }
}

use std::borrow::Cow;

/// A specialized [`StorageError`] enum of this crate.
///
/// Every variant maps to the "storage unavailable" condition from the caller's point of
/// view: the session vault absorbs them and falls back to ephemeral values.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Storage is switched off (privacy mode, disabled by the host).
    #[error("Storage unavailable{}: {message}", format_context(.context))]
    Unavailable { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The write would exceed the configured byte quota.
    #[error("Storage quota exceeded{}: {message}", format_context(.context))]
    QuotaExceeded { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The slot name cannot be mapped onto the backing store.
    #[error("Invalid storage key{}: {message}", format_context(.context))]
    InvalidKey { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The stored value is not valid UTF-8.
    #[error("Corrupt storage entry{}: {message}", format_context(.context))]
    Corrupt { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Hardware I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },
}

/// Attaches human-readable context to storage results.
pub trait StorageErrorExt<T> {
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, StorageError>;
}

impl<T> StorageErrorExt<T> for Result<T, StorageError> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Self {
        self.map_err(|mut e| {
            match &mut e {
                StorageError::Unavailable { context: c, .. }
                | StorageError::QuotaExceeded { context: c, .. }
                | StorageError::InvalidKey { context: c, .. }
                | StorageError::Corrupt { context: c, .. }
                | StorageError::Io { context: c, .. } => *c = Some(context.into()),
            }
            e
        })
    }
}

impl<T> StorageErrorExt<T> for Result<T, std::io::Error> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, StorageError> {
        self.map_err(|source| StorageError::Io { source, context: Some(context.into()) })
    }
}

impl From<std::io::Error> for StorageError {
    #[inline]
    fn from(source: std::io::Error) -> Self {
        Self::Io { source, context: None }
    }
}

#[allow(clippy::ref_option)]
fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}

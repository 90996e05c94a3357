//! Store error taxonomy.
//!
//! # Invariants
//! - "No matching record" is always reported as `StoreError::NotFound`,
//!   never as an empty value or a raw backend error.
//! - Every other failure is propagated unchanged.

use crate::db::DbError;
use crate::model::ValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by every `Store` operation.
#[derive(Debug)]
pub enum StoreError {
    /// Query executed successfully but matched nothing. Carries the
    /// resource family or query that failed to match.
    NotFound(String),
    /// Write rejected before touching storage.
    Validation(ValidationError),
    /// Backend failure.
    Db(DbError),
    /// Persisted data cannot be converted to a valid model.
    InvalidData(String),
    /// Connection schema is not at the version this binary expects.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// The store has been shut down.
    Closed,
    /// The store cannot serve requests (e.g. poisoned connection lock).
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(resource) => write!(f, "{{{resource}}} not found"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::Closed => write!(f, "store has been shut down"),
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_)
            | Self::InvalidData(_)
            | Self::UninitializedConnection { .. }
            | Self::Closed
            | Self::Unavailable(_) => None,
        }
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Db(DbError::Json(value))
    }
}

/// Returns true if `err` is, or wraps, a `StoreError::NotFound`.
///
/// Walks the `source()` chain, so callers may wrap store errors in their
/// own types and still classify them.
pub fn is_err_not_found(err: &(dyn Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(candidate) = current {
        if let Some(store_err) = candidate.downcast_ref::<StoreError>() {
            if store_err.is_not_found() {
                return true;
            }
        }
        current = candidate.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::{is_err_not_found, StoreError};
    use crate::model::ValidationError;
    use std::error::Error;
    use std::fmt::{Display, Formatter};

    #[derive(Debug)]
    struct Wrapped(StoreError);

    impl Display for Wrapped {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            write!(f, "handler failed: {}", self.0)
        }
    }

    impl Error for Wrapped {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn not_found_message_names_resource() {
        let err = StoreError::not_found("board b1");
        assert_eq!(err.to_string(), "{board b1} not found");
    }

    #[test]
    fn classifies_direct_and_wrapped_not_found() {
        let direct = StoreError::not_found("user");
        assert!(is_err_not_found(&direct));

        let wrapped = Wrapped(StoreError::not_found("session"));
        assert!(is_err_not_found(&wrapped));

        let boxed: Box<dyn Error> = Box::new(Wrapped(StoreError::not_found("team")));
        assert!(is_err_not_found(boxed.as_ref()));
    }

    #[test]
    fn other_errors_are_not_classified_as_not_found() {
        let validation = StoreError::from(ValidationError::SelfParent("b".to_string()));
        assert!(!is_err_not_found(&validation));
        assert!(!is_err_not_found(&Wrapped(StoreError::Closed)));

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert!(!is_err_not_found(&io));
    }
}

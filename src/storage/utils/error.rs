// Error conversion helpers and wrapping macro for Snafu-based errors
use crate::error::Error;
use crate::storage::store::{StoreError, StoreErrorKind};

/// Convert different error types into our unified Error type.
pub trait IntoBucketKvError {
    fn into_error(self) -> Error;
}

impl IntoBucketKvError for Error {
    fn into_error(self) -> Error {
        self
    }
}

impl IntoBucketKvError for opendal::Error {
    fn into_error(self) -> Error {
        self.into()
    }
}

impl IntoBucketKvError for std::io::Error {
    fn into_error(self) -> Error {
        self.into()
    }
}

/// Map a store failure on `key` onto the error taxonomy: a missing object
/// becomes `NoSuchKey`, a failed generation precondition becomes
/// `ConcurrentModification`, anything else is an I/O failure with context.
pub fn store_error(bucket: &str, key: &str, generation: Option<u64>, err: StoreError) -> Error {
    match (err.kind(), generation) {
        (StoreErrorKind::NotFound, _) => Error::NoSuchKey {
            bucket: bucket.to_string(),
            key: key.to_string(),
        },
        (StoreErrorKind::PreconditionFailed, Some(generation)) => Error::ConcurrentModification {
            bucket: bucket.to_string(),
            key: key.to_string(),
            generation,
        },
        _ => Error::Store {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source: err,
        },
    }
}

/// Macro to wrap a Result-producing expression into a Snafu variant with `source: Box<Error>`.
/// Example:
/// wrap_err!(kva.list(path).await, CommandFailed { command: "ls".into(), path: path.into() })?
#[macro_export]
macro_rules! wrap_err {
    ($expr:expr, $variant:ident { $($field:ident : $value:expr),* $(,)? }) => {{
        $expr.map_err(|e| {
            let src: $crate::error::Error = $crate::storage::utils::error::IntoBucketKvError::into_error(e);
            $crate::error::Error::$variant { $($field: $value),*, source: Box::new(src) }
        })
    }};
}

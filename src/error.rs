use snafu::Snafu;

use crate::storage::store::StoreError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("No such key: bucket '{bucket}', key '{key}'"))]
    NoSuchKey { bucket: String, key: String },

    #[snafu(display(
        "Generation mismatch: bucket '{bucket}', key '{key}' is no longer at generation {generation}"
    ))]
    ConcurrentModification {
        bucket: String,
        key: String,
        generation: u64,
    },

    #[snafu(display("Storage failure on bucket '{bucket}', key '{key}': {source}"))]
    Store {
        bucket: String,
        key: String,
        source: StoreError,
    },

    #[snafu(display("Container location {locator} is an invalid URI: {reason}"))]
    InvalidLocator { locator: String, reason: String },

    #[snafu(display("Invalid path '{path}': {reason}"))]
    InvalidPath { path: String, reason: String },

    #[snafu(display("{path} is not a valid group"))]
    NotAGroup { path: String },

    #[snafu(display("{action} bucket '{bucket}' not allowed"))]
    BucketManagementNotAllowed { bucket: String, action: String },

    #[snafu(display("Channel for key '{key}' was opened read-only"))]
    NonWritableChannel { key: String },

    #[snafu(display("Channel for key '{key}' is already closed"))]
    ChannelClosed { key: String },

    #[snafu(display(
        "Range out of bounds for key '{key}': offset {offset}, length {length:?}, object size {size}"
    ))]
    OutOfBounds {
        key: String,
        offset: u64,
        length: Option<u64>,
        size: u64,
    },

    #[snafu(display("Environment variable '{key}' is required but not found"))]
    MissingEnvVar { key: String },

    #[snafu(display("Invalid value '{value}' for '{key}'"))]
    InvalidConfig { key: String, value: String },

    #[snafu(display("Unsupported storage provider: {provider}"))]
    UnsupportedProvider { provider: String },

    #[snafu(display("Failed to {command} '{path}': {source}"))]
    CommandFailed {
        command: String,
        path: String,
        source: Box<Error>,
    },

    #[snafu(display("OpenDAL error: {source}"))]
    OpenDal { source: opendal::Error },

    #[snafu(display("IO error: {source}"))]
    Io { source: std::io::Error },
}

/// Coarse classification of an [`Error`], used by callers to decide whether to
/// re-read and retry, abort, or fall back to the unsafe I/O policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NoSuchKey,
    ConcurrentModification,
    IoFailure,
    InvalidArgument,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoSuchKey { .. } => ErrorKind::NoSuchKey,
            Error::ConcurrentModification { .. } => ErrorKind::ConcurrentModification,
            Error::InvalidLocator { .. }
            | Error::InvalidPath { .. }
            | Error::BucketManagementNotAllowed { .. }
            | Error::NonWritableChannel { .. }
            | Error::ChannelClosed { .. }
            | Error::OutOfBounds { .. }
            | Error::MissingEnvVar { .. }
            | Error::InvalidConfig { .. }
            | Error::UnsupportedProvider { .. } => ErrorKind::InvalidArgument,
            Error::CommandFailed { source, .. } => source.kind(),
            Error::NotAGroup { .. }
            | Error::Store { .. }
            | Error::OpenDal { .. }
            | Error::Io { .. } => ErrorKind::IoFailure,
        }
    }
}

impl From<opendal::Error> for Error {
    fn from(error: opendal::Error) -> Self {
        Error::OpenDal { source: error }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io { source: error }
    }
}

//! CLI Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A CLI error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The catalog file couldn't be read at all.
    #[display("could not read catalog: {}", _0.display())]
    Catalog(#[error(not(source))] PathBuf),
    /// The catalog was read, but isn't a JSON object of item payloads.
    #[display("invalid catalog: {}", _0.display())]
    InvalidCatalog(#[error(not(source))] PathBuf),
    #[display("configuration error")]
    Config,
    #[display("could not set up the scanner")]
    Scanner,
    #[display("failed to read standard input")]
    Stdin,
}

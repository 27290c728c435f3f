//! The crate error type.
//!
//! Internally everything is built with `anyhow` context chains. At module boundaries an error is
//! classified with an `ErrorType` using `pub_result` so that callers, most importantly the
//! conversation controller, can decide what to tell the user without string matching.

use std::fmt::{Debug, Display, Formatter};

/// Classifies an `Error`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ErrorType {
    /// A table (spreadsheet) with the requested name does not exist.
    TableNotFound,
    /// A worksheet with the requested title does not exist in the table.
    WorksheetNotFound,
    /// User input could not be parsed: a date, amount, category or payload shape.
    Validation,
    /// Data already stored in the ledger could not be interpreted.
    DataFormat,
    /// An operation needs a bound table but none has been selected.
    BindingNotEstablished,
    /// A remote call failed for some other reason.
    Backend,
    /// Configuration is missing or invalid.
    Config,
    /// Local file system failure.
    Io,
}

impl Display for ErrorType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorType::TableNotFound => "table not found",
            ErrorType::WorksheetNotFound => "worksheet not found",
            ErrorType::Validation => "validation error",
            ErrorType::DataFormat => "data format error",
            ErrorType::BindingNotEstablished => "binding not established",
            ErrorType::Backend => "backend error",
            ErrorType::Config => "configuration error",
            ErrorType::Io => "i/o error",
        };
        f.write_str(s)
    }
}

/// The public error type of this crate: an `anyhow` chain plus its classification.
pub struct Error {
    kind: ErrorType,
    inner: anyhow::Error,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn new(kind: ErrorType, inner: impl Into<anyhow::Error>) -> Self {
        Self {
            kind,
            inner: inner.into(),
        }
    }

    /// Creates an error from a plain message.
    pub fn msg(kind: ErrorType, message: impl Display + Send + Sync + 'static) -> Self {
        Self::new(kind, anyhow::anyhow!("{message}"))
    }

    pub fn kind(&self) -> ErrorType {
        self.kind
    }

    pub fn is(&self, kind: ErrorType) -> bool {
        self.kind == kind
    }

    /// Adds a layer of context while keeping the classification.
    pub fn context<C>(self, context: C) -> Self
    where
        C: Display + Send + Sync + 'static,
    {
        Self {
            kind: self.kind,
            inner: self.inner.context(context),
        }
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {:?}", self.kind, self.inner)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            write!(f, "{:#}", self.inner)
        } else {
            Display::fmt(&self.inner, f)
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}

/// Errors that reach a crate boundary unclassified are treated as backend failures.
impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Error::new(ErrorType::Backend, value)
    }
}

/// Converts an `anyhow`-style result into a classified crate `Result`.
pub trait IntoResult<T> {
    fn pub_result(self, kind: ErrorType) -> Result<T>;
}

impl<T, E> IntoResult<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn pub_result(self, kind: ErrorType) -> Result<T> {
        self.map_err(|e| Error::new(kind, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_pub_result_keeps_kind_and_chain() {
        let r: std::result::Result<(), anyhow::Error> =
            Err(anyhow::anyhow!("inner")).context("outer");
        let e = r.pub_result(ErrorType::TableNotFound).unwrap_err();
        assert!(e.is(ErrorType::TableNotFound));
        assert_eq!(e.to_string(), "outer");
        assert_eq!(format!("{e:#}"), "outer: inner");
    }

    #[test]
    fn test_context_preserves_kind() {
        let e = Error::msg(ErrorType::DataFormat, "bad amount").context("aggregating");
        assert_eq!(e.kind(), ErrorType::DataFormat);
        assert_eq!(format!("{e:#}"), "aggregating: bad amount");
    }

    #[test]
    fn test_unclassified_anyhow_is_backend() {
        let e: Error = anyhow::anyhow!("boom").into();
        assert_eq!(e.kind(), ErrorType::Backend);
    }
}

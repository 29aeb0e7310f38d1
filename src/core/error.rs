//! Purpose: Define the error taxonomy shared by the pipeline, server, and CLI.
//! Exports: `Error`, `ErrorKind`, `to_exit_code`.
//! Invariants: Each pipeline stage fails with exactly one kind; mapping to
//! HTTP statuses happens in `serve`, mapping to exit codes happens here.
//! Invariants: Error text never carries credentials (see `fetch::redacted_url`).

use std::error::Error as StdError;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    InvalidRequest,
    PayloadTooLarge,
    ResponseTooLarge,
    Download,
    Decode,
    Io,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    detail: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            detail: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Flatten message, detail, and the source chain into one diagnostic
    /// string for 500-class response bodies and stderr envelopes.
    pub fn details_text(&self) -> String {
        let mut parts = Vec::new();
        if let Some(message) = &self.message {
            parts.push(message.clone());
        }
        if let Some(detail) = &self.detail {
            parts.push(detail.clone());
        }
        let mut source = self.source.as_deref().map(|s| s as &dyn StdError);
        while let Some(err) = source {
            parts.push(err.to_string());
            source = err.source();
        }
        if parts.is_empty() {
            parts.push(format!("{:?}", self.kind));
        }
        parts.join(": ")
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::InvalidRequest => 3,
        ErrorKind::PayloadTooLarge => 4,
        ErrorKind::ResponseTooLarge => 5,
        ErrorKind::Download => 6,
        ErrorKind::Decode => 7,
        ErrorKind::Io => 8,
    }
}

//! Error types shared by parsing, configuration and rendering

use std::path::PathBuf;

use thiserror::Error;

/// What went wrong on a line of a spy file
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    #[error("stream ended before the title line")]
    MissingTitle,
    #[error("stream ended before the dimension line")]
    MissingHeader,
    #[error("expected at least {expected} fields, found {found}")]
    TooFewFields { expected: usize, found: usize },
    #[error("'{token}' is not a non-negative integer")]
    InvalidInteger { token: String },
    #[error("stream ended after {found} of {expected} nonzeros")]
    UnexpectedEof { expected: usize, found: usize },
}

/// A malformed spy file, located by its 1-based line number
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("line {line}: {kind}")]
pub struct ParseError {
    pub line: usize,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(line: usize, kind: ParseErrorKind) -> Self {
        Self { line, kind }
    }
}

/// Top-level error for the spyplot pipeline
#[derive(Debug, Error)]
pub enum SpyError {
    #[error("cannot open {}: {source}", path.display())]
    FileNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("render error: {0}")]
    Render(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = SpyError> = std::result::Result<T, E>;

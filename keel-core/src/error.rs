use std::fmt::{self, Display};
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error taxonomy of the data-access layer.
///
/// Every public operation either returns its typed result or one of these.
/// Driver errors are kept as the `source`, [`Error::report`] renders the
/// whole chain.
#[derive(Debug, Error)]
pub enum Error {
    /// The entity annotations are missing or malformed.
    #[error("Invalid mapping for entity `{entity}`: {reason}")]
    Mapping { entity: &'static str, reason: String },

    /// A statement could not be built from the entity metadata.
    #[error("Could not generate the {statement} statement for entity `{entity}`")]
    Generation {
        entity: &'static str,
        statement: &'static str,
        #[source]
        source: Box<Error>,
    },

    /// Zero rows where exactly one was expected.
    #[error("The query returned no rows while exactly one was expected:\n{query}")]
    NotFound { query: String },

    /// A row could not be turned into the requested type.
    #[error("Could not decode the row into `{target}`: {reason}")]
    Decode { target: &'static str, reason: String },

    /// The driver failed while running a statement.
    #[error("{context}")]
    Execution {
        context: String,
        #[source]
        source: BoxError,
    },

    /// The pool could not be created, reached or pinged.
    #[error("{context}")]
    Connection {
        context: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The caller supplied an argument that violates a precondition.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A migration source is malformed.
    #[error("Invalid migration: {0}")]
    Migration(String),

    /// Operation context around another error.
    #[error("{context}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Mapping,
    Generation,
    NotFound,
    Decode,
    Execution,
    Connection,
    InvalidArgument,
    Migration,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Mapping => "mapping",
            ErrorKind::Generation => "generation",
            ErrorKind::NotFound => "not found",
            ErrorKind::Decode => "decode",
            ErrorKind::Execution => "execution",
            ErrorKind::Connection => "connection",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::Migration => "migration",
        })
    }
}

impl Error {
    /// Kind of the error, looking through any operation context.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Mapping { .. } => ErrorKind::Mapping,
            Error::Generation { .. } => ErrorKind::Generation,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Decode { .. } => ErrorKind::Decode,
            Error::Execution { .. } => ErrorKind::Execution,
            Error::Connection { .. } => ErrorKind::Connection,
            Error::InvalidArgument(..) => ErrorKind::InvalidArgument,
            Error::Migration(..) => ErrorKind::Migration,
            Error::Context { source, .. } => source.kind(),
        }
    }

    /// True if this error or any wrapped `Error` has the given kind.
    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        match self {
            Error::Context { source, .. } | Error::Generation { source, .. } => {
                self.kind() == kind || source.has_kind(kind)
            }
            _ => self.kind() == kind,
        }
    }

    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    pub fn execution(
        context: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Error::Execution {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn connection(context: impl Into<String>, source: Option<BoxError>) -> Self {
        Error::Connection {
            context: context.into(),
            source,
        }
    }

    pub fn report(&self) -> Report<'_> {
        Report(self)
    }

    pub fn decode<T: ?Sized>(reason: impl Into<String>) -> Self {
        Error::Decode {
            target: std::any::type_name::<T>(),
            reason: reason.into(),
        }
    }
}

/// The error followed by every source in its chain: `context: cause: ...`.
pub struct Report<'a>(&'a Error);

impl Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = std::error::Error::source(self.0);
        while let Some(e) = source {
            write!(f, ": {}", e)?;
            source = e.source();
        }
        Ok(())
    }
}

/// Attach operation context to the error of a `Result`.
pub trait ErrorContext<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
    fn with_context<C: Into<String>>(self, context: impl FnOnce() -> C) -> Result<T>;
}

impl<T> ErrorContext<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }
    fn with_context<C: Into<String>>(self, context: impl FnOnce() -> C) -> Result<T> {
        self.map_err(|e| e.context(context()))
    }
}

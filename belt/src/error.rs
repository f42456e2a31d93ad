use std::{error, fmt, io, result};

/// Type alias for convenience when using the Result type with our Error.
pub type BeltResult<T> = result::Result<T, BeltError>;

/// Internal error representation with kind, static description, optional
/// dynamic detail, and optional source error.
///
/// Uses boxing to keep the public error type one pointer wide so the success
/// path stays cheap.
struct ErrorInner {
    kind: ErrorKind,
    description: &'static str,
    detail: Option<String>,
    source: Option<Box<dyn error::Error + Send + Sync>>,
}

/// Error classification for the engine.
///
/// Kinds follow the failure points of the pipeline: enumerating the source,
/// reading partitions, transforming batches, and writing sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Listing shards or partitions from a source failed.
    SourceEnumerationFailed,
    /// Acquiring a per-chunk shard resource failed.
    ResourceAcquisitionFailed,
    /// A partition failed while reading its next batch.
    PartitionReadFailed,
    /// A source decoder rejected an input line.
    DecodeFailed,
    /// An input line exceeded the line-buffer ceiling.
    LineTooLong,
    /// Building or sending a transform request failed.
    TransformRequestFailed,
    /// The transform endpoint answered with a non-OK status.
    UnexpectedStatusCode,
    /// The transform response could not be decoded.
    TransformResponseInvalid,
    /// Serializing a record or id failed.
    SerializationFailed,
    /// Creating a sink writer failed.
    SinkCreateFailed,
    /// Appending to a sink failed.
    SinkWriteFailed,
    /// Closing a sink failed.
    SinkCloseFailed,
    /// I/O operation failure.
    IoFailed,
    /// A configuration value was rejected.
    InvalidConfiguration,
    /// A spawned worker task panicked.
    WorkerPanicked,
    /// Error that doesn't fit other categories.
    Other,
}

/// A stable error type for the engine.
///
/// Carries a [`ErrorKind`] for classification, a static description, and an
/// optional detail string plus source error for context. Constructed through
/// the [`crate::belt_error!`] and [`crate::bail!`] macros or the `From`
/// conversions below.
pub struct BeltError(Box<ErrorInner>);

impl BeltError {
    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.0.kind
    }

    /// Attaches a source error, keeping kind and description.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: Into<Box<dyn error::Error + Send + Sync>>,
    {
        self.0.source = Some(source.into());
        self
    }
}

impl From<(ErrorKind, &'static str)> for BeltError {
    fn from((kind, description): (ErrorKind, &'static str)) -> Self {
        BeltError(Box::new(ErrorInner {
            kind,
            description,
            detail: None,
            source: None,
        }))
    }
}

impl From<(ErrorKind, &'static str, String)> for BeltError {
    fn from((kind, description, detail): (ErrorKind, &'static str, String)) -> Self {
        BeltError(Box::new(ErrorInner {
            kind,
            description,
            detail: Some(detail),
            source: None,
        }))
    }
}

impl fmt::Debug for BeltError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeltError")
            .field("kind", &self.0.kind)
            .field("description", &self.0.description)
            .field("detail", &self.0.detail)
            .field("source", &self.0.source)
            .finish()
    }
}

impl fmt::Display for BeltError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.detail {
            Some(detail) => write!(f, "{}: {}", self.0.description, detail),
            None => write!(f, "{}", self.0.description),
        }
    }
}

impl error::Error for BeltError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.0
            .source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

impl From<io::Error> for BeltError {
    fn from(err: io::Error) -> Self {
        BeltError::from((ErrorKind::IoFailed, "I/O operation failed", err.to_string())).with_source(err)
    }
}

impl From<serde_json::Error> for BeltError {
    fn from(err: serde_json::Error) -> Self {
        BeltError::from((
            ErrorKind::SerializationFailed,
            "JSON serialization failed",
            err.to_string(),
        ))
        .with_source(err)
    }
}

impl From<reqwest::Error> for BeltError {
    fn from(err: reqwest::Error) -> Self {
        BeltError::from((
            ErrorKind::TransformRequestFailed,
            "Transform request failed",
            err.to_string(),
        ))
        .with_source(err)
    }
}

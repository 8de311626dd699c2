//! Error types for quire operations.

use std::io;

use thiserror::Error;

/// Errors that can occur while building a publication.
#[derive(Error, Debug)]
pub enum Error {
    /// A resource with the same normalized path is already in the manifest.
    #[error("a resource named {0:?} has already been added to the publication")]
    DuplicateResource(String),

    /// A resource name that is empty or escapes the content root.
    #[error("invalid resource name {0:?}")]
    InvalidResourceName(String),

    /// A date string did not match any accepted granularity.
    #[error("invalid publication date {0:?}: expected YYYY, YYYY-MM, YYYY-MM-DD or an RFC 3339 timestamp")]
    InvalidDate(String),

    /// No manifest id is left for another resource.
    #[error("the manifest cannot hold more than {} resources", u32::MAX)]
    TooManyResources,

    /// The writer has already been closed.
    #[error("publication writer is closed")]
    ClosedWriter,

    /// Failure of the underlying sink, source, or archive encoder.
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn zip(context: impl Into<String>, source: zip::result::ZipError) -> Self {
        Error::io(context, io::Error::other(source))
    }

    /// Whether this error came from the I/O layer (sink, source, or encoder).
    ///
    /// Such failures are generally fatal to the publication being written.
    pub fn is_stream_io(&self) -> bool {
        matches!(self, Error::Io { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

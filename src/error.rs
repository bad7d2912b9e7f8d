use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    io::Error as IoError,
    path::PathBuf,
};

use zip::result::ZipError;

/// The error type surfaced by pack loading, merging, and emitting.
#[derive(Debug)]
pub enum PackError {
    /// Unreadable or unwritable storage.
    Io(IoError),
    /// The archive backend rejected an operation.
    Archive(ZipError),
    /// A file's content could not be parsed for its declared format.
    Format { path: String, message: String },
    /// Refused to clobber an existing pack; retry with the overwrite flag.
    Overwrite(PathBuf),
    /// The file has neither content, nor a source, nor a default.
    MissingContent(String),
    /// Two file types share both scope and extension.
    Registry(String),
}

impl Display for PackError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PackError::Io(error) => Display::fmt(error, f),
            PackError::Archive(error) => Display::fmt(error, f),
            PackError::Format { path, message } => write!(f, "{}: {}", path, message),
            PackError::Overwrite(path) => {
                write!(f, "couldn't overwrite \"{}\"", path.display())
            }
            PackError::MissingContent(path) => {
                write!(f, "no content, source, or default for \"{}\"", path)
            }
            PackError::Registry(message) => write!(f, "invalid file type registry: {}", message),
        }
    }
}

impl Error for PackError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PackError::Io(error) => Some(error),
            PackError::Archive(error) => Some(error),
            _ => None,
        }
    }
}

impl From<IoError> for PackError {
    fn from(x: IoError) -> Self {
        PackError::Io(x)
    }
}

impl From<ZipError> for PackError {
    fn from(x: ZipError) -> Self {
        PackError::Archive(x)
    }
}

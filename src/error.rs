use std::io::{self, Error as IoError};

/// Errors raised while turning alignment blocks into variant records.
#[derive(Debug)]
pub enum ConvertError {
    /// Malformed block, mismatched track lengths or an invalid base.
    Format {
        message: String,
        line: Option<usize>,
    },
    /// Two blocks produce different variant calls over the same reference position.
    AmbiguousCall {
        contig: String,
        position: u64,
        first: String,
        second: String,
    },
    Configuration(String),
    /// Compression or indexing of a finished output failed.
    ExternalTool(String),
    Io(IoError),
    Cancelled,
}

impl ConvertError {
    pub fn format<S: Into<String>>(message: S) -> Self {
        ConvertError::Format {
            message: message.into(),
            line: None,
        }
    }

    pub fn format_at<S: Into<String>>(message: S, line: usize) -> Self {
        ConvertError::Format {
            message: message.into(),
            line: Some(line),
        }
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        ConvertError::Configuration(message.into())
    }
}

impl std::fmt::Display for ConvertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConvertError::Format {
                message,
                line: Some(line),
            } => write!(f, "Format error at line {}: {}", line, message),
            ConvertError::Format { message, line: None } => write!(f, "Format error: {}", message),
            ConvertError::AmbiguousCall {
                contig,
                position,
                first,
                second,
            } => write!(
                f,
                "Conflicting variant calls at {}:{} ({} vs {})",
                contig, position, first, second
            ),
            ConvertError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            ConvertError::ExternalTool(msg) => write!(f, "External tool error: {}", msg),
            ConvertError::Io(e) => write!(f, "IO error: {}", e),
            ConvertError::Cancelled => write!(f, "Conversion cancelled"),
        }
    }
}

impl std::error::Error for ConvertError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConvertError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<IoError> for ConvertError {
    fn from(e: IoError) -> Self {
        ConvertError::Io(e)
    }
}

impl From<ConvertError> for IoError {
    fn from(e: ConvertError) -> Self {
        match e {
            ConvertError::Io(e) => e,
            ConvertError::Configuration(_) => io::Error::new(io::ErrorKind::InvalidInput, e.to_string()),
            ConvertError::Cancelled => io::Error::new(io::ErrorKind::Interrupted, e.to_string()),
            _ => io::Error::new(io::ErrorKind::InvalidData, e.to_string()),
        }
    }
}

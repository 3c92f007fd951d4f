use std::fmt;

/// Custom error type for the distinct-address counter
#[derive(Debug)]
pub enum CountError {
    /// Failure opening or inspecting the input
    Io(std::io::Error),
    /// Non end-of-stream failure while reading the input stream
    Read(std::io::Error),
    /// Configuration error, reported before processing starts
    Config(String),
    /// Parse error
    Parse(String),
    /// Other errors
    Other(String),
}

impl fmt::Display for CountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountError::Io(err) => write!(f, "IO error: {}", err),
            CountError::Read(err) => write!(f, "Read error: {}", err),
            CountError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CountError::Parse(msg) => write!(f, "Parse error: {}", msg),
            CountError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for CountError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CountError::Io(err) | CountError::Read(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CountError {
    fn from(err: std::io::Error) -> Self {
        CountError::Io(err)
    }
}

impl From<toml::de::Error> for CountError {
    fn from(err: toml::de::Error) -> Self {
        CountError::Config(err.to_string())
    }
}

impl From<tokio::task::JoinError> for CountError {
    fn from(err: tokio::task::JoinError) -> Self {
        CountError::Other(format!("worker task failed: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, CountError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = CountError::Config("buffer too small".to_string());
        assert_eq!(err.to_string(), "Configuration error: buffer too small");

        let err = CountError::Read(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"));
        assert_eq!(err.to_string(), "Read error: disk gone");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_from_io() {
        let err: CountError = std::io::Error::new(std::io::ErrorKind::NotFound, "nope").into();
        assert!(matches!(err, CountError::Io(_)));
    }
}

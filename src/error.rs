//src/error.rs

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, UmiError>;

/// Every failure here is fatal to the stream that raised it; nothing is retried.
#[derive(Error, Debug)]
pub enum UmiError {
    /// A new duplicate set was decomposed while outputs of the previous one were still buffered.
    #[error("output buffer is expected to be empty, but already contains duplicate sets")]
    BufferNotDrained,

    #[error("UMI '{umi}' has length {found}, but UMIs in this run have length {expected}")]
    UmiLengthMismatch {
        umi: String,
        expected: usize,
        found: usize,
    },

    #[error("read '{read_name}' has no UMI in tag '{tag}' and missing UMIs are not allowed")]
    MissingUmi { read_name: String, tag: String },

    #[error("a duplicate set must contain at least one record")]
    EmptyDuplicateSet,

    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter { parameter: String, reason: String },

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_mismatch_message() {
        let error = UmiError::UmiLengthMismatch { umi: "ACG".to_string(), expected: 4, found: 3 };
        let msg = format!("{error}");
        assert!(msg.contains("'ACG'"));
        assert!(msg.contains("length 3"));
        assert!(msg.contains("length 4"));
    }

    #[test]
    fn test_missing_umi_names_read_and_tag() {
        let error = UmiError::MissingUmi { read_name: "q1".to_string(), tag: "RX".to_string() };
        let msg = format!("{error}");
        assert!(msg.contains("'q1'"));
        assert!(msg.contains("'RX'"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error: UmiError = io.into();
        assert!(matches!(error, UmiError::Io(_)));
        assert_eq!(format!("{error}"), "gone");
    }
}

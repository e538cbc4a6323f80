use thiserror::Error;

/// Error returned when an encoding is not found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown encoding: {0}")]
pub struct UnknownEncodingError(pub String);

/// Error returned by an external transcoder or conversion library.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The transcoder does not know the encoding.
    #[error("unknown encoding: {0}")]
    UnknownEncoding(String),
    /// The transcoder knows both encodings but cannot convert between them.
    #[error("cannot convert from {from} to {to}")]
    UnsupportedConversion {
        /// Source encoding.
        from: String,
        /// Target encoding.
        to: String,
    },
    /// The transcoder itself could not be used.
    #[error("transcoder unavailable: {0}")]
    Unavailable(String),
}

/// Error returned by [`Registry::transcode`](crate::Registry::transcode).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscodeError {
    /// The source encoding is unknown.
    #[error("source {0}")]
    UnknownSourceEncoding(UnknownEncodingError),
    /// The target encoding is unknown.
    #[error("target {0}")]
    UnknownTargetEncoding(UnknownEncodingError),
    /// The input held invalid sequences, or characters the target cannot represent.
    #[error("{invalid} invalid or unencodable sequences")]
    InvalidInput {
        /// Number of sequences replaced.
        invalid: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = TranscodeError::UnknownSourceEncoding(UnknownEncodingError("x-foo".into()));
        assert_eq!(err.to_string(), "source unknown encoding: x-foo");
        let err = BridgeError::UnsupportedConversion {
            from: "UTF-16LE".into(),
            to: "x-foo".into(),
        };
        assert_eq!(err.to_string(), "cannot convert from UTF-16LE to x-foo");
        assert_eq!(
            TranscodeError::InvalidInput { invalid: 2 }.to_string(),
            "2 invalid or unencodable sequences"
        );
    }
}

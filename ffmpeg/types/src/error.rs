/*!
    Error type shared by the ffmpeg crates.
*/

use thiserror::Error;

/**
    Errors produced by the transform, encode and sink crates.

    Messages carry the underlying FFmpeg error text; callers that need a
    coarser classification match on the variant.
*/
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("codec error: {0}")]
    Codec(String),
    #[error("encoder not found: {0}")]
    EncoderNotFound(String),
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("i/o error: {0}")]
    Io(String),
    #[error("muxer error: {0}")]
    Mux(String),
}

impl Error {
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec(message.into())
    }

    pub fn encoder_not_found(message: impl Into<String>) -> Self {
        Self::EncoderNotFound(message.into())
    }

    pub fn unsupported_format(message: impl Into<String>) -> Self {
        Self::UnsupportedFormat(message.into())
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData(message.into())
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    pub fn mux(message: impl Into<String>) -> Self {
        Self::Mux(message.into())
    }
}

/// Result alias for the ffmpeg crates.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_and_messages() {
        let err = Error::encoder_not_found("h264_nvenc");
        assert_eq!(err, Error::EncoderNotFound("h264_nvenc".into()));
        assert_eq!(err.to_string(), "encoder not found: h264_nvenc");
        assert_eq!(
            Error::io("permission denied").to_string(),
            "i/o error: permission denied"
        );
    }
}

use thiserror::Error;

/**
    Failures recorded by the encoder.

    Setup failures happen in [`Encoder::run`](crate::Encoder::run) before the
    worker starts; streaming failures happen on the worker and end the
    session. Either way the first one is kept and reported by
    [`Encoder::error`](crate::Encoder::error).
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum EncoderError {
    // ── Configuration ─────────────────────────────────────────────────
    #[error("invalid encoder settings")]
    InvalidSettings,
    #[error("backend is unavailable after a worker panic")]
    BackendUnavailable,

    // ── Container and track setup ─────────────────────────────────────
    #[error("could not allocate output context")]
    CouldNotAllocateOutputContext,
    #[error("could not determine output format")]
    CouldNotDetermineOutputFormat,
    #[error("could not find encoder")]
    CouldNotFindEncoder,
    #[error("could not allocate packet")]
    CouldNotAllocatePacket,
    #[error("could not allocate stream")]
    CouldNotAllocateStream,
    #[error("could not allocate encoding context")]
    CouldNotAllocateEncodingContext,
    #[error("unsupported media type")]
    UnsupportedMediaType,
    #[error("output format is not a video format")]
    NotAVideoFormat,
    #[error("could not open codec")]
    CouldNotOpenVideoCodec,
    #[error("could not allocate frame")]
    CouldNotAllocateFrame,
    #[error("could not copy stream parameters")]
    CouldNotCopyStreamParameters,
    #[error("could not create conversion context")]
    CouldNotCreateConversionContext,
    #[error("could not create resampler context")]
    CouldNotCreateResamplerContext,
    #[error("could not open output file")]
    CouldNotOpenFile,
    #[error("could not write container header")]
    CouldNotWriteHeader,
    #[error("could not spawn worker thread")]
    CouldNotSpawnWorker,

    // ── Streaming ─────────────────────────────────────────────────────
    #[error("could not send frame to encoder")]
    CouldNotSendFrameToEncoder,
    #[error("could not encode frame")]
    CouldNotEncodeFrame,
    #[error("could not write output packet")]
    CouldNotWriteOutputPacket,
    #[error("could not write container trailer")]
    CouldNotWriteTrailer,
    #[error("encoder worker panicked")]
    WorkerPanicked,
}

impl EncoderError {
    /**
        True for failures raised before any frame reached the backend.
    */
    pub const fn is_setup_failure(self) -> bool {
        !matches!(
            self,
            Self::CouldNotSendFrameToEncoder
                | Self::CouldNotEncodeFrame
                | Self::CouldNotWriteOutputPacket
                | Self::CouldNotWriteTrailer
                | Self::WorkerPanicked
        )
    }
}

/// Errors loading or validating [`VideoSettings`](crate::VideoSettings).
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not read settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse settings: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_and_streaming_classification() {
        assert!(EncoderError::CouldNotOpenFile.is_setup_failure());
        assert!(EncoderError::InvalidSettings.is_setup_failure());
        assert!(!EncoderError::CouldNotEncodeFrame.is_setup_failure());
        assert!(!EncoderError::CouldNotWriteTrailer.is_setup_failure());
        assert!(!EncoderError::WorkerPanicked.is_setup_failure());
    }

    #[test]
    fn messages() {
        assert_eq!(
            EncoderError::CouldNotWriteHeader.to_string(),
            "could not write container header"
        );
        assert_eq!(
            EncoderError::WorkerPanicked.to_string(),
            "encoder worker panicked"
        );
        assert_eq!(
            SettingsError::Invalid("frame rate must be positive".into()).to_string(),
            "invalid settings: frame rate must be positive"
        );
    }
}

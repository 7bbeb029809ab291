/*!
    Codec identifiers.
*/

use crate::StreamType;

/**
    Codecs known to the ecosystem.

    Anything FFmpeg reports that is not listed here maps to `Other`, which
    still carries enough information to log.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CodecId {
    H264,
    H265,
    Vp9,
    Av1,
    Mpeg4,
    Aac,
    Opus,
    Mp3,
    Vorbis,
    Other,
}

impl CodecId {
    /**
        The kind of stream this codec produces, if known.
    */
    pub const fn stream_type(self) -> Option<StreamType> {
        match self {
            Self::H264 | Self::H265 | Self::Vp9 | Self::Av1 | Self::Mpeg4 => {
                Some(StreamType::Video)
            }
            Self::Aac | Self::Opus | Self::Mp3 | Self::Vorbis => Some(StreamType::Audio),
            Self::Other => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_stream_types() {
        assert_eq!(CodecId::H264.stream_type(), Some(StreamType::Video));
        assert_eq!(CodecId::Aac.stream_type(), Some(StreamType::Audio));
        assert_eq!(CodecId::Other.stream_type(), None);
    }
}

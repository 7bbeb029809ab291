/*!
    Encoder configuration.
*/

use ffmpeg_types::{ChannelLayout, CodecId, Rational};

/// x264 preset and tune for keeping up with a live producer.
pub(crate) const SOFTWARE_REALTIME: (&str, Option<&str>) = ("ultrafast", Some("zerolatency"));

/**
    GPU encoder to try before the software one.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HwEncoder {
    VideoToolbox,
    Nvenc,
}

impl HwEncoder {
    /**
        FFmpeg encoder name for `codec` on this device, if it has one.
    */
    pub fn encoder_name(self, codec: CodecId) -> Option<&'static str> {
        match (self, codec) {
            (Self::Nvenc, CodecId::H264) => Some("h264_nvenc"),
            (Self::Nvenc, CodecId::H265) => Some("hevc_nvenc"),
            (Self::Nvenc, CodecId::Av1) => Some("av1_nvenc"),
            (Self::VideoToolbox, CodecId::H264) => Some("h264_videotoolbox"),
            (Self::VideoToolbox, CodecId::H265) => Some("hevc_videotoolbox"),
            _ => None,
        }
    }

    /**
        Realtime preset and tune for this device, if it takes any.
    */
    pub(crate) fn options(self) -> Option<(&'static str, Option<&'static str>)> {
        match self {
            Self::Nvenc => Some(("p1", Some("ull"))),
            // VideoToolbox only knows `realtime`, set separately
            Self::VideoToolbox => None,
        }
    }
}

/**
    Video encoder settings. Input frames are always YUV420P.
*/
#[derive(Clone, Debug)]
pub struct VideoEncoderConfig {
    pub codec: CodecId,
    pub width: u32,
    pub height: u32,
    pub frame_rate: Rational,
    /// Bits per second.
    pub bit_rate: u64,
    /// Frames between keyframes; two seconds' worth when unset.
    pub gop_size: Option<u32>,
    pub hw_encoder: Option<HwEncoder>,
    /// Put codec headers in extradata instead of every keyframe.
    pub global_header: bool,
}

impl VideoEncoderConfig {
    pub fn new(codec: CodecId, width: u32, height: u32, frame_rate: Rational) -> Self {
        Self {
            codec,
            width,
            height,
            frame_rate,
            bit_rate: 30_000_000,
            gop_size: None,
            hw_encoder: None,
            global_header: false,
        }
    }

    pub fn with_bit_rate(mut self, bit_rate: u64) -> Self {
        self.bit_rate = bit_rate;
        self
    }

    pub fn with_gop_size(mut self, frames: u32) -> Self {
        self.gop_size = Some(frames);
        self
    }

    /**
        Try `encoder` first, falling back to software if FFmpeg lacks it or
        the device refuses to open.
    */
    pub fn with_hw_encoder(mut self, encoder: HwEncoder) -> Self {
        self.hw_encoder = Some(encoder);
        self
    }

    pub fn with_global_header(mut self, global_header: bool) -> Self {
        self.global_header = global_header;
        self
    }

    /// One tick per frame.
    pub fn time_base(&self) -> Rational {
        self.frame_rate.invert()
    }

    pub(crate) fn effective_gop_size(&self) -> u32 {
        self.gop_size
            .unwrap_or_else(|| (self.frame_rate.to_f64() * 2.0).round().max(1.0) as u32)
    }
}

/**
    Audio encoder settings.

    The rate is a request: [`AudioEncoder`](crate::AudioEncoder) settles on
    one the codec supports.
*/
#[derive(Clone, Debug)]
pub struct AudioEncoderConfig {
    pub codec: CodecId,
    pub sample_rate: u32,
    pub channels: ChannelLayout,
    /// Bits per second; codec default when unset.
    pub bit_rate: Option<u64>,
    pub global_header: bool,
}

impl AudioEncoderConfig {
    pub fn new(codec: CodecId, sample_rate: u32, channels: ChannelLayout) -> Self {
        Self {
            codec,
            sample_rate,
            channels,
            bit_rate: None,
            global_header: false,
        }
    }

    pub fn with_bit_rate(mut self, bit_rate: u64) -> Self {
        self.bit_rate = Some(bit_rate);
        self
    }

    pub fn with_global_header(mut self, global_header: bool) -> Self {
        self.global_header = global_header;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardware_encoder_names() {
        assert_eq!(HwEncoder::Nvenc.encoder_name(CodecId::H264), Some("h264_nvenc"));
        assert_eq!(
            HwEncoder::VideoToolbox.encoder_name(CodecId::H265),
            Some("hevc_videotoolbox")
        );
        assert_eq!(HwEncoder::Nvenc.encoder_name(CodecId::Mpeg4), None);
        assert_eq!(HwEncoder::VideoToolbox.encoder_name(CodecId::Av1), None);
    }

    #[test]
    fn presets_tune_for_latency() {
        assert_eq!(SOFTWARE_REALTIME, ("ultrafast", Some("zerolatency")));
        assert_eq!(HwEncoder::Nvenc.options(), Some(("p1", Some("ull"))));
        assert_eq!(HwEncoder::VideoToolbox.options(), None);
    }

    #[test]
    fn gop_defaults_to_two_seconds() {
        let config = VideoEncoderConfig::new(CodecId::H264, 1920, 1080, Rational::new(60, 1));
        assert_eq!(config.time_base(), Rational::new(1, 60));
        assert_eq!(config.effective_gop_size(), 120);
        assert_eq!(config.with_gop_size(12).effective_gop_size(), 12);
    }

    #[test]
    fn ntsc_gop_rounds() {
        let config =
            VideoEncoderConfig::new(CodecId::H264, 640, 480, Rational::new(30000, 1001));
        assert_eq!(config.effective_gop_size(), 60);
    }
}

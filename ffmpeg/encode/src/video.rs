/*!
    Video encoder implementation.
*/

use ffmpeg_next::{
    Codec, Dictionary, Rational as FFmpegRational,
    codec::{self, Id as CodecIdFFmpeg, encoder::Video as VideoEncoderFFmpeg},
    format::Pixel,
    util::frame::video::Video as VideoFrameFFmpeg,
};

use ffmpeg_types::{CodecId, Error, Rational, Result, StreamType};

use crate::config::{HwEncoder, SOFTWARE_REALTIME, VideoEncoderConfig};
use crate::packets::receive_packets;

/**
    Video encoder.

    Encodes scaled frames into compressed packets.
*/
pub struct VideoEncoder {
    encoder: VideoEncoderFFmpeg,
    time_base: Rational,
    codec_name: String,
    hardware: bool,
    fallback_reason: Option<String>,
}

impl VideoEncoder {
    /**
        Create a new video encoder with the given configuration.

        With a hardware encoder configured, that encoder is tried first;
        the software encoder for the same codec is used if it is missing
        or fails to open.
    */
    pub fn new(config: VideoEncoderConfig) -> Result<Self> {
        ffmpeg_next::init().map_err(|e| Error::codec(e.to_string()))?;

        let fallback_reason = match config.hw_encoder {
            Some(hw) => match find_hardware(hw, config.codec) {
                Some(codec) => match open(codec, &config, Some(hw)) {
                    Ok(encoder) => return Ok(encoder),
                    Err(e) => Some(e.to_string()),
                },
                None => Some(format!(
                    "FFmpeg has no {:?} encoder for {:?}",
                    hw, config.codec
                )),
            },
            None => None,
        };

        let codec_id = codec_id_to_ffmpeg(config.codec)?;
        let codec = ffmpeg_next::encoder::find(codec_id).ok_or_else(|| {
            Error::encoder_not_found(format!("no encoder for {:?}", config.codec))
        })?;
        let mut encoder = open(codec, &config, None)?;
        encoder.fallback_reason = fallback_reason;
        Ok(encoder)
    }

    /**
        Get the time base for encoded packets.
    */
    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    /**
        Name of the FFmpeg encoder in use, e.g. `h264_nvenc` or `libx264`.
    */
    pub fn codec_name(&self) -> &str {
        &self.codec_name
    }

    /**
        Whether a hardware encoder was opened.
    */
    pub fn is_hardware(&self) -> bool {
        self.hardware
    }

    /**
        Why the configured hardware encoder was not used, if it wasn't.
    */
    pub fn fallback_reason(&self) -> Option<&str> {
        self.fallback_reason.as_deref()
    }

    /**
        Codec parameters for the muxer's stream.
    */
    pub fn parameters(&self) -> codec::Parameters {
        codec::Parameters::from(&self.encoder)
    }

    /**
        Encode a video frame with presentation timestamp `pts`, returning
        encoded packets.

        May return zero, one, or multiple packets depending on encoder buffering.
    */
    pub fn encode(
        &mut self,
        frame: &mut VideoFrameFFmpeg,
        pts: i64,
    ) -> Result<Vec<ffmpeg_types::Packet>> {
        if frame.width() != self.encoder.width() || frame.height() != self.encoder.height() {
            return Err(Error::invalid_data(format!(
                "frame dimensions {}x{} don't match encoder {}x{}",
                frame.width(),
                frame.height(),
                self.encoder.width(),
                self.encoder.height()
            )));
        }

        frame.set_pts(Some(pts));
        self.encoder
            .send_frame(frame)
            .map_err(|e| Error::invalid_data(format!("encoder rejected frame: {}", e)))?;

        receive_packets(&mut self.encoder, self.time_base, StreamType::Video)
    }

    /**
        Flush the encoder to get any remaining buffered packets.

        Call this at end of stream.
    */
    pub fn flush(&mut self) -> Result<Vec<ffmpeg_types::Packet>> {
        self.encoder
            .send_eof()
            .map_err(|e| Error::invalid_data(format!("encoder rejected end of stream: {}", e)))?;

        receive_packets(&mut self.encoder, self.time_base, StreamType::Video)
    }
}

fn find_hardware(hw: HwEncoder, codec: CodecId) -> Option<Codec> {
    hw.encoder_name(codec)
        .and_then(ffmpeg_next::encoder::find_by_name)
}

/**
    Configure and open an encoder context for `codec`, on `hardware` if set.
*/
fn open(
    codec: Codec,
    config: &VideoEncoderConfig,
    hardware: Option<HwEncoder>,
) -> Result<VideoEncoder> {
    let mut encoder = codec::context::Context::new_with_codec(codec)
        .encoder()
        .video()
        .map_err(|e| Error::codec(e.to_string()))?;

    encoder.set_width(config.width);
    encoder.set_height(config.height);
    encoder.set_format(Pixel::YUV420P);
    encoder.set_frame_rate(Some(FFmpegRational::new(
        config.frame_rate.num,
        config.frame_rate.den,
    )));
    let time_base = config.time_base();
    encoder.set_time_base(FFmpegRational::new(time_base.num, time_base.den));
    encoder.set_gop(config.effective_gop_size());
    encoder.set_bit_rate(config.bit_rate as usize);
    if config.global_header {
        encoder.set_flags(codec::Flags::GLOBAL_HEADER);
    }

    let (preset, tune) = match hardware {
        Some(hw) => match hw.options() {
            Some((preset, tune)) => (Some(preset), tune),
            None => (None, None),
        },
        None => (Some(SOFTWARE_REALTIME.0), SOFTWARE_REALTIME.1),
    };
    let mut opts = Dictionary::new();
    if let Some(preset) = preset {
        opts.set("preset", preset);
    }
    if let Some(tune) = tune {
        opts.set("tune", tune);
    }
    if hardware == Some(HwEncoder::VideoToolbox) {
        opts.set("realtime", "1");
    }

    let encoder = encoder
        .open_with(opts)
        .map_err(|e| Error::codec(format!("failed to open {}: {}", codec.name(), e)))?;

    Ok(VideoEncoder {
        encoder,
        time_base,
        codec_name: codec.name().to_string(),
        hardware: hardware.is_some(),
        fallback_reason: None,
    })
}

/**
    Convert our CodecId to FFmpeg's codec ID.
*/
fn codec_id_to_ffmpeg(codec: CodecId) -> Result<CodecIdFFmpeg> {
    match codec {
        CodecId::H264 => Ok(CodecIdFFmpeg::H264),
        CodecId::H265 => Ok(CodecIdFFmpeg::HEVC),
        CodecId::Vp9 => Ok(CodecIdFFmpeg::VP9),
        CodecId::Av1 => Ok(CodecIdFFmpeg::AV1),
        CodecId::Mpeg4 => Ok(CodecIdFFmpeg::MPEG4),
        _ => Err(Error::unsupported_format(format!(
            "video codec {:?} not supported for encoding",
            codec
        ))),
    }
}

impl std::fmt::Debug for VideoEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoEncoder")
            .field("codec", &self.codec_name)
            .field("hardware", &self.hardware)
            .field("width", &self.encoder.width())
            .field("height", &self.encoder.height())
            .field("time_base", &self.time_base)
            .finish_non_exhaustive()
    }
}

/*!
    Audio encoder implementation.
*/

use ffmpeg_next::{
    ChannelLayout as FFmpegChannelLayout, Codec,
    codec::{
        self, Id as CodecIdFFmpeg, capabilities::Capabilities,
        encoder::Audio as AudioEncoderFFmpeg,
    },
    format::{Sample, sample::Type as SampleType},
    util::frame::audio::Audio as AudioFrameFFmpeg,
};

use ffmpeg_types::{ChannelLayout, CodecId, Error, Rational, Result, SampleFormat, StreamType};

use crate::config::AudioEncoderConfig;
use crate::packets::receive_packets;

/**
    Audio encoder.

    Encodes raw audio frames into compressed packets. The encoder settles on
    a sample format and rate the codec supports; read them back with
    [`sample_format`](Self::sample_format) and
    [`sample_rate`](Self::sample_rate) before producing audio.
*/
pub struct AudioEncoder {
    encoder: AudioEncoderFFmpeg,
    time_base: Rational,
    sample_rate: u32,
    channels: ChannelLayout,
    sample_format: SampleFormat,
    frame_size: Option<usize>,
}

impl AudioEncoder {
    /**
        Create a new audio encoder with the given configuration.
    */
    pub fn new(config: AudioEncoderConfig) -> Result<Self> {
        ffmpeg_next::init().map_err(|e| Error::codec(e.to_string()))?;

        let codec_id = codec_id_to_ffmpeg(config.codec)?;
        let codec = ffmpeg_next::encoder::find(codec_id).ok_or_else(|| {
            Error::encoder_not_found(format!("no encoder for {:?}", config.codec))
        })?;

        let (supported_formats, supported_rates) = supported(codec)?;
        let sample_format = pick_sample_format(&supported_formats);
        let sample_rate = pick_sample_rate(config.sample_rate, &supported_rates);

        let encoder_ctx = codec::context::Context::new_with_codec(codec);
        let mut encoder = encoder_ctx
            .encoder()
            .audio()
            .map_err(|e| Error::codec(e.to_string()))?;

        encoder.set_format(sample_format_to_ffmpeg(sample_format)?);
        encoder.set_rate(sample_rate as i32);
        encoder.set_channel_layout(channel_layout_to_ffmpeg(config.channels));

        // Time base is one tick per sample
        let time_base = Rational::per_second(sample_rate as i32);
        encoder.set_time_base(ffmpeg_next::Rational::new(time_base.num, time_base.den));

        if let Some(bit_rate) = config.bit_rate {
            encoder.set_bit_rate(bit_rate as usize);
        }
        if config.global_header {
            encoder.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder
            .open()
            .map_err(|e| Error::codec(format!("failed to open {}: {}", codec.name(), e)))?;

        let variable = codec
            .capabilities()
            .contains(Capabilities::VARIABLE_FRAME_SIZE);
        let frame_size = match encoder.frame_size() {
            0 => None,
            _ if variable => None,
            size => Some(size as usize),
        };

        Ok(Self {
            encoder,
            time_base,
            sample_rate,
            channels: config.channels,
            sample_format,
            frame_size,
        })
    }

    /**
        Get the time base for encoded packets.
    */
    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> ChannelLayout {
        self.channels
    }

    /**
        Sample format frames must be handed over in.
    */
    pub fn sample_format(&self) -> SampleFormat {
        self.sample_format
    }

    /**
        Get the frame size expected by the encoder.

        Some codecs require a specific number of samples per frame.
        Returns None if the codec accepts variable frame sizes.
    */
    pub fn frame_size(&self) -> Option<usize> {
        self.frame_size
    }

    /**
        Codec parameters for the muxer's stream.
    */
    pub fn parameters(&self) -> codec::Parameters {
        codec::Parameters::from(&self.encoder)
    }

    /**
        Encode an audio frame with presentation timestamp `pts` (in
        [`time_base`](Self::time_base) ticks), returning encoded packets.

        Empty frames are skipped.
    */
    pub fn encode(
        &mut self,
        frame: &mut AudioFrameFFmpeg,
        pts: i64,
    ) -> Result<Vec<ffmpeg_types::Packet>> {
        if frame.samples() == 0 {
            return Ok(Vec::new());
        }
        if let Some(size) = self.frame_size {
            if frame.samples() > size {
                return Err(Error::invalid_data(format!(
                    "{} samples exceed the encoder frame size of {}",
                    frame.samples(),
                    size
                )));
            }
        }

        frame.set_pts(Some(pts));
        self.encoder
            .send_frame(frame)
            .map_err(|e| Error::invalid_data(format!("encoder rejected frame: {}", e)))?;

        receive_packets(&mut self.encoder, self.time_base, StreamType::Audio)
    }

    /**
        Flush the encoder to get any remaining buffered packets.

        Call this at end of stream.
    */
    pub fn flush(&mut self) -> Result<Vec<ffmpeg_types::Packet>> {
        self.encoder
            .send_eof()
            .map_err(|e| Error::invalid_data(format!("encoder rejected end of stream: {}", e)))?;

        receive_packets(&mut self.encoder, self.time_base, StreamType::Audio)
    }
}

/**
    Sample formats and rates the codec advertises. Empty lists mean the
    codec does not say.
*/
fn supported(codec: Codec) -> Result<(Vec<SampleFormat>, Vec<u32>)> {
    let audio = codec.audio().map_err(|e| {
        Error::unsupported_format(format!("{} is not an audio codec: {}", codec.name(), e))
    })?;

    let formats = audio
        .formats()
        .map(|formats| formats.filter_map(ffmpeg_sample_format_to_ours).collect())
        .unwrap_or_default();
    let rates = audio
        .rates()
        .map(|rates| rates.filter(|rate| *rate > 0).map(|rate| rate as u32).collect())
        .unwrap_or_default();

    Ok((formats, rates))
}

/**
    The codec's first advertised format, or planar float if it lists none.
*/
fn pick_sample_format(supported: &[SampleFormat]) -> SampleFormat {
    supported.first().copied().unwrap_or(SampleFormat::F32p)
}

/**
    The requested rate if the codec supports it (or lists nothing),
    otherwise the codec's first advertised rate.
*/
fn pick_sample_rate(requested: u32, supported: &[u32]) -> u32 {
    match supported.first() {
        Some(&first) if !supported.contains(&requested) => first,
        _ => requested,
    }
}

/**
    Convert our CodecId to FFmpeg's codec ID.
*/
fn codec_id_to_ffmpeg(codec: CodecId) -> Result<CodecIdFFmpeg> {
    match codec {
        CodecId::Aac => Ok(CodecIdFFmpeg::AAC),
        CodecId::Opus => Ok(CodecIdFFmpeg::OPUS),
        CodecId::Mp3 => Ok(CodecIdFFmpeg::MP3),
        CodecId::Vorbis => Ok(CodecIdFFmpeg::VORBIS),
        _ => Err(Error::unsupported_format(format!(
            "audio codec {:?} not supported for encoding",
            codec
        ))),
    }
}

/**
    Convert our SampleFormat to FFmpeg's Sample format.
*/
fn sample_format_to_ffmpeg(format: SampleFormat) -> Result<Sample> {
    match format {
        SampleFormat::U8 => Ok(Sample::U8(SampleType::Packed)),
        SampleFormat::S16 => Ok(Sample::I16(SampleType::Packed)),
        SampleFormat::S16p => Ok(Sample::I16(SampleType::Planar)),
        SampleFormat::S32 => Ok(Sample::I32(SampleType::Packed)),
        SampleFormat::S32p => Ok(Sample::I32(SampleType::Planar)),
        SampleFormat::F32 => Ok(Sample::F32(SampleType::Packed)),
        SampleFormat::F32p => Ok(Sample::F32(SampleType::Planar)),
        SampleFormat::F64 => Ok(Sample::F64(SampleType::Packed)),
        SampleFormat::F64p => Ok(Sample::F64(SampleType::Planar)),
        _ => Err(Error::unsupported_format(format!(
            "sample format {:?} not supported",
            format
        ))),
    }
}

/**
    Convert FFmpeg's Sample format to our SampleFormat.
*/
fn ffmpeg_sample_format_to_ours(format: Sample) -> Option<SampleFormat> {
    match format {
        Sample::U8(SampleType::Packed) => Some(SampleFormat::U8),
        Sample::I16(SampleType::Packed) => Some(SampleFormat::S16),
        Sample::I16(SampleType::Planar) => Some(SampleFormat::S16p),
        Sample::I32(SampleType::Packed) => Some(SampleFormat::S32),
        Sample::I32(SampleType::Planar) => Some(SampleFormat::S32p),
        Sample::F32(SampleType::Packed) => Some(SampleFormat::F32),
        Sample::F32(SampleType::Planar) => Some(SampleFormat::F32p),
        Sample::F64(SampleType::Packed) => Some(SampleFormat::F64),
        Sample::F64(SampleType::Planar) => Some(SampleFormat::F64p),
        _ => None,
    }
}

/**
    Convert our ChannelLayout to FFmpeg's ChannelLayout.
*/
fn channel_layout_to_ffmpeg(layout: ChannelLayout) -> FFmpegChannelLayout {
    match layout {
        ChannelLayout::Mono => FFmpegChannelLayout::MONO,
        ChannelLayout::Stereo => FFmpegChannelLayout::STEREO,
        ChannelLayout::Surround5_1 => FFmpegChannelLayout::_5POINT1,
        ChannelLayout::Surround7_1 => FFmpegChannelLayout::_7POINT1,
        _ => FFmpegChannelLayout::STEREO, // fallback
    }
}

impl std::fmt::Debug for AudioEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioEncoder")
            .field("sample_rate", &self.sample_rate)
            .field("sample_format", &self.sample_format)
            .field("frame_size", &self.frame_size)
            .field("time_base", &self.time_base)
            .finish_non_exhaustive()
    }
}

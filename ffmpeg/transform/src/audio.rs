/*!
    Audio frame transformation.
*/

use ffmpeg_next::{
    ChannelLayout as FFmpegChannelLayout,
    format::{Sample, sample::Type as SampleType},
    software::resampling::context::Context as ResamplerContext,
    util::frame::audio::Audio as AudioFrameFFmpeg,
};

use ffmpeg_types::{ChannelLayout, Error, Result, SampleFormat};

/**
    Configuration for audio transformation.

    Input is always interleaved signed 16-bit PCM; the output side matches
    what the encoder was opened with.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioTransformConfig {
    /// Input sample rate in Hz.
    pub src_sample_rate: u32,
    /// Input channel layout.
    pub src_channels: ChannelLayout,
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Output channel layout.
    pub channels: ChannelLayout,
    /// Output sample format.
    pub format: SampleFormat,
}

impl AudioTransformConfig {
    /**
        Create a configuration converting interleaved S16 to `format`,
        keeping the rate and layout.
    */
    pub fn new(sample_rate: u32, channels: ChannelLayout, format: SampleFormat) -> Self {
        Self {
            src_sample_rate: sample_rate,
            src_channels: channels,
            sample_rate,
            channels,
            format,
        }
    }

    /**
        Set the input rate and layout when they differ from the output.
    */
    pub fn with_input(mut self, sample_rate: u32, channels: ChannelLayout) -> Self {
        self.src_sample_rate = sample_rate;
        self.src_channels = channels;
        self
    }
}

/**
    Audio frame transformer.

    Resampling is stateful: frames must be passed in order. When input and
    output rates match, every call returns exactly as many samples as it was
    given, so chunks sized for the encoder stay sized for the encoder.
*/
pub struct AudioTransform {
    config: AudioTransformConfig,
    resampler: ResamplerContext,
}

impl AudioTransform {
    /**
        Create the resampler for `config`.
    */
    pub fn new(config: AudioTransformConfig) -> Result<Self> {
        if config.src_sample_rate == 0 || config.sample_rate == 0 {
            return Err(Error::invalid_data("audio transform with zero sample rate"));
        }

        let resampler = ResamplerContext::get(
            Sample::I16(SampleType::Packed),
            channel_layout_to_ffmpeg(config.src_channels),
            config.src_sample_rate,
            sample_format_to_ffmpeg(config.format)?,
            channel_layout_to_ffmpeg(config.channels),
            config.sample_rate,
        )
        .map_err(|e| Error::codec(format!("failed to create resampler: {}", e)))?;

        Ok(Self { config, resampler })
    }

    /**
        Get the configuration.
    */
    pub fn config(&self) -> &AudioTransformConfig {
        &self.config
    }

    /**
        Convert `sample_count` interleaved samples per channel.

        The returned frame may hold fewer samples than were passed in while
        the resampler fills its delay line, and is empty in that case.
    */
    pub fn transform(&mut self, samples: &[i16], sample_count: usize) -> Result<AudioFrameFFmpeg> {
        let channels = self.config.src_channels.channels() as usize;
        let needed = interleaved_len(samples.len(), sample_count, channels)?;

        let mut src_frame = AudioFrameFFmpeg::new(
            Sample::I16(SampleType::Packed),
            sample_count,
            channel_layout_to_ffmpeg(self.config.src_channels),
        );
        src_frame.set_rate(self.config.src_sample_rate);
        write_s16(&mut src_frame.data_mut(0)[..needed * 2], &samples[..needed]);

        let mut dst_frame = AudioFrameFFmpeg::empty();
        self.resampler
            .run(&src_frame, &mut dst_frame)
            .map_err(|e| Error::codec(format!("resampling failed: {}", e)))?;

        Ok(dst_frame)
    }
}

/**
    Number of interleaved values `sample_count` samples of `channels`
    channels occupy, checked against the `available` input length.
*/
fn interleaved_len(available: usize, sample_count: usize, channels: usize) -> Result<usize> {
    if sample_count == 0 {
        return Err(Error::invalid_data("input frame has zero samples"));
    }
    let needed = sample_count * channels;
    if available < needed {
        return Err(Error::invalid_data(format!(
            "{} samples of {} channels need {} values, got {}",
            sample_count, channels, needed, available
        )));
    }
    Ok(needed)
}

/**
    Write samples into a byte plane in native endianness, as FFmpeg expects.
*/
fn write_s16(dst: &mut [u8], samples: &[i16]) {
    for (bytes, sample) in dst.chunks_exact_mut(2).zip(samples) {
        bytes.copy_from_slice(&sample.to_ne_bytes());
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
    Convert our ChannelLayout to FFmpeg's ChannelLayout.
*/
fn channel_layout_to_ffmpeg(layout: ChannelLayout) -> FFmpegChannelLayout {
    match layout {
        ChannelLayout::Mono => FFmpegChannelLayout::MONO,
        ChannelLayout::Stereo => FFmpegChannelLayout::STEREO,
        ChannelLayout::Surround5_1 => FFmpegChannelLayout::_5POINT1,
        ChannelLayout::Surround7_1 => FFmpegChannelLayout::_7POINT1,
        _ => FFmpegChannelLayout::STEREO, // Default fallback
    }
}

impl std::fmt::Debug for AudioTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioTransform")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

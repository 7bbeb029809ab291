/*!
    Media sink implementation.
*/

use std::path::{Path, PathBuf};

use ffmpeg_next::{
    Rational as FFmpegRational,
    codec::{self, Id as CodecIdFFmpeg},
    format::{context::Output as OutputContext, flag::Flags as FormatFlags},
    media,
    util::error::EINVAL,
};

use ffmpeg_types::{CodecId, Error, Packet, Rational, Result, StreamType};

/**
    Media sink for writing to container files.

    Lifecycle: [`create`](Self::create) opens the file and picks the
    container from its extension, streams are added and given encoder
    parameters, then [`write_header`](Self::write_header), any number of
    [`write`](Self::write) calls, and [`finish`](Self::finish).
*/
pub struct Sink {
    output: OutputContext,
    path: PathBuf,
    video_stream_index: Option<usize>,
    audio_stream_index: Option<usize>,
    header_written: bool,
}

impl Sink {
    /**
        Create the output context for `path` and open the file for writing.

        Fails with [`Error::UnsupportedFormat`] if no container matches the
        extension and with [`Error::Io`] if the file cannot be opened.
    */
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        ffmpeg_next::init().map_err(|e| Error::codec(e.to_string()))?;

        let path = path.as_ref().to_path_buf();
        let output = ffmpeg_next::format::output(&path).map_err(|e| match e {
            ffmpeg_next::Error::Other { errno } if errno == EINVAL => Error::unsupported_format(
                format!("no container format for {}: {}", path.display(), e),
            ),
            ffmpeg_next::Error::Other { .. } => {
                Error::io(format!("failed to open {}: {}", path.display(), e))
            }
            e => Error::mux(format!("failed to create output: {}", e)),
        })?;

        Ok(Self {
            output,
            path,
            video_stream_index: None,
            audio_stream_index: None,
            header_written: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /**
        Name of the container format, e.g. `mp4`.
    */
    pub fn format_name(&self) -> String {
        self.output.format().name().to_string()
    }

    /**
        The container's default codec for `stream_type`, or `None` if the
        container cannot carry that kind of stream.
    */
    pub fn default_codec(&self, stream_type: StreamType) -> Option<CodecId> {
        let kind = match stream_type {
            StreamType::Video => media::Type::Video,
            StreamType::Audio => media::Type::Audio,
        };
        match self.output.format().codec(&self.path, kind) {
            CodecIdFFmpeg::None => None,
            codec => Some(ffmpeg_codec_id_to_ours(codec)),
        }
    }

    /**
        Whether encoders must put codec headers in extradata for this
        container.
    */
    pub fn needs_global_header(&self) -> bool {
        self.output
            .format()
            .flags()
            .contains(FormatFlags::GLOBAL_HEADER)
    }

    /**
        Add a stream for `codec`, returning its index.

        At most one video and one audio stream are supported.
    */
    pub fn add_stream(&mut self, codec: CodecId) -> Result<usize> {
        if self.header_written {
            return Err(Error::invalid_data("streams must be added before the header"));
        }
        let stream_type = codec.stream_type().ok_or_else(|| {
            Error::unsupported_format(format!("codec {:?} has no stream type", codec))
        })?;
        let slot = match stream_type {
            StreamType::Video => &self.video_stream_index,
            StreamType::Audio => &self.audio_stream_index,
        };
        if slot.is_some() {
            return Err(Error::invalid_data(format!(
                "{:?} stream already added",
                stream_type
            )));
        }

        let codec_id = codec_id_to_ffmpeg(codec)?;
        let stream = self
            .output
            .add_stream(ffmpeg_next::encoder::find(codec_id))
            .map_err(|e| Error::mux(format!("failed to add {:?} stream: {}", stream_type, e)))?;
        let index = stream.index();

        match stream_type {
            StreamType::Video => self.video_stream_index = Some(index),
            StreamType::Audio => self.audio_stream_index = Some(index),
        }
        Ok(index)
    }

    /**
        Copy an opened encoder's parameters and time base to stream `index`.
    */
    pub fn set_stream_parameters(
        &mut self,
        index: usize,
        parameters: codec::Parameters,
        time_base: Rational,
    ) -> Result<()> {
        let mut stream = self
            .output
            .stream_mut(index)
            .ok_or_else(|| Error::invalid_data(format!("no stream {}", index)))?;
        stream.set_parameters(parameters);
        stream.set_time_base(FFmpegRational::new(time_base.num, time_base.den));
        Ok(())
    }

    /**
        Time base of stream `index`. The muxer may change it when the header
        is written.
    */
    pub fn stream_time_base(&self, index: usize) -> Option<Rational> {
        self.output.stream(index).map(|stream| {
            let tb = stream.time_base();
            Rational::new(tb.numerator(), tb.denominator())
        })
    }

    /**
        Write the container header.
    */
    pub fn write_header(&mut self) -> Result<()> {
        self.output
            .write_header()
            .map_err(|e| Error::mux(format!("failed to write header: {}", e)))?;
        self.header_written = true;
        Ok(())
    }

    /**
        Write a packet to the sink.

        Packets are routed to the stream matching their type, and their
        timestamps rescaled from the encoder's time base to the stream's.
    */
    pub fn write(&mut self, packet: &Packet) -> Result<()> {
        if !self.header_written {
            return Err(Error::invalid_data("header not written"));
        }

        let stream_index = match packet.stream_type {
            StreamType::Video => self.video_stream_index,
            StreamType::Audio => self.audio_stream_index,
        }
        .ok_or_else(|| {
            Error::invalid_data(format!("no {:?} stream configured", packet.stream_type))
        })?;
        let stream_time_base = self
            .stream_time_base(stream_index)
            .ok_or_else(|| Error::invalid_data(format!("no stream {}", stream_index)))?;

        let mut ffmpeg_pkt = if packet.data.is_empty() {
            ffmpeg_next::Packet::empty()
        } else {
            ffmpeg_next::Packet::copy(&packet.data)
        };
        ffmpeg_pkt.set_stream(stream_index);

        let rescale = |ts: i64| Rational::rescale(ts, packet.time_base, stream_time_base);
        ffmpeg_pkt.set_pts(packet.pts.map(|pts| rescale(pts.0)));
        ffmpeg_pkt.set_dts(packet.dts.map(|dts| rescale(dts.0)));
        ffmpeg_pkt.set_duration(rescale(packet.duration.0));

        if packet.is_keyframe {
            ffmpeg_pkt.set_flags(ffmpeg_next::packet::Flags::KEY);
        }

        ffmpeg_pkt
            .write_interleaved(&mut self.output)
            .map_err(|e| Error::mux(format!("failed to write packet: {}", e)))
    }

    /**
        Finish writing and close the sink.

        This writes any trailing metadata (duration, seeking index) and
        finalizes the container. The file may be corrupt if this is not called.
    */
    pub fn finish(mut self) -> Result<()> {
        if !self.header_written {
            return Err(Error::invalid_data("header not written"));
        }
        self.output
            .write_trailer()
            .map_err(|e| Error::mux(format!("failed to write trailer: {}", e)))
    }
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
        CodecId::Aac => Ok(CodecIdFFmpeg::AAC),
        CodecId::Opus => Ok(CodecIdFFmpeg::OPUS),
        CodecId::Mp3 => Ok(CodecIdFFmpeg::MP3),
        CodecId::Vorbis => Ok(CodecIdFFmpeg::VORBIS),
        _ => Err(Error::unsupported_format(format!(
            "codec {:?} not supported for muxing",
            codec
        ))),
    }
}

/**
    Convert FFmpeg's codec ID to our CodecId.
*/
fn ffmpeg_codec_id_to_ours(codec: CodecIdFFmpeg) -> CodecId {
    match codec {
        CodecIdFFmpeg::H264 => CodecId::H264,
        CodecIdFFmpeg::HEVC => CodecId::H265,
        CodecIdFFmpeg::VP9 => CodecId::Vp9,
        CodecIdFFmpeg::AV1 => CodecId::Av1,
        CodecIdFFmpeg::MPEG4 => CodecId::Mpeg4,
        CodecIdFFmpeg::AAC => CodecId::Aac,
        CodecIdFFmpeg::OPUS => CodecId::Opus,
        CodecIdFFmpeg::MP3 => CodecId::Mp3,
        CodecIdFFmpeg::VORBIS => CodecId::Vorbis,
        _ => CodecId::Other,
    }
}

impl std::fmt::Debug for Sink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sink")
            .field("path", &self.path)
            .field("video_stream", &self.video_stream_index)
            .field("audio_stream", &self.audio_stream_index)
            .field("header_written", &self.header_written)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_ids_map_both_ways() {
        for codec in [
            CodecId::H264,
            CodecId::H265,
            CodecId::Vp9,
            CodecId::Av1,
            CodecId::Mpeg4,
            CodecId::Aac,
            CodecId::Opus,
            CodecId::Mp3,
            CodecId::Vorbis,
        ] {
            let ffmpeg = codec_id_to_ffmpeg(codec).unwrap();
            assert_eq!(ffmpeg_codec_id_to_ours(ffmpeg), codec);
        }
    }

    #[test]
    fn unknown_codecs() {
        assert_eq!(ffmpeg_codec_id_to_ours(CodecIdFFmpeg::PNG), CodecId::Other);
        assert!(matches!(
            codec_id_to_ffmpeg(CodecId::Other),
            Err(Error::UnsupportedFormat(_))
        ));
    }
}

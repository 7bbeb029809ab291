/*!
    FFmpeg backend.

    Binds the [`Backend`] sequence to `ffmpeg-sink` for the container,
    `ffmpeg-encode` for the codecs and `ffmpeg-transform` for pixel and
    sample conversion. Codecs are the container's defaults; the video track
    tries the platform's hardware encoder first when asked to.

    Failures from the ffmpeg crates carry FFmpeg's own message, which is
    logged here; the encoder only sees the [`EncoderError`] it maps to.
*/

use std::path::Path;

use ffmpeg_encode::{
    AudioEncoder, AudioEncoderConfig, HwEncoder, VideoEncoder, VideoEncoderConfig,
};
use ffmpeg_sink::Sink;
use ffmpeg_transform::{
    AudioTransform, AudioTransformConfig, VideoTransform, VideoTransformConfig,
};
use ffmpeg_types::{ChannelLayout, CodecId, Error, Packet, PixelFormat, Rational, StreamType};
use log::{debug, error, info, warn};

use crate::backend::{Backend, RawFrame, TrackConfig, TrackId, TrackParameters};
use crate::EncoderError;

#[cfg(target_os = "macos")]
const PREFERRED_HW_ENCODER: HwEncoder = HwEncoder::VideoToolbox;
#[cfg(not(target_os = "macos"))]
const PREFERRED_HW_ENCODER: HwEncoder = HwEncoder::Nvenc;

/// One container stream and, once opened, its encoder and converter.
struct Track {
    config: TrackConfig,
    stream: usize,
    codec: CodecId,
    coder: Option<Coder>,
}

enum Coder {
    Video {
        encoder: VideoEncoder,
        transform: VideoTransform,
    },
    Audio {
        encoder: AudioEncoder,
        transform: AudioTransform,
    },
}

/**
    [`Backend`] writing real media files through FFmpeg.

    Reusable: after [`close_and_release`](Backend::close_and_release) it can
    start another file.
*/
#[derive(Default)]
pub struct FfmpegBackend {
    sink: Option<Sink>,
    tracks: Vec<Track>,
}

impl FfmpegBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn sink(&mut self, code: EncoderError) -> Result<&mut Sink, EncoderError> {
        self.sink.as_mut().ok_or_else(|| {
            error!("no output container: {code}");
            code
        })
    }
}

/// Log the underlying FFmpeg failure and hand back the code it maps to.
fn fail(context: &str, err: Error, code: EncoderError) -> EncoderError {
    error!("{context}: {err}");
    code
}

fn open_error(context: &str, err: Error) -> EncoderError {
    let code = match err {
        Error::EncoderNotFound(_) | Error::UnsupportedFormat(_) => {
            EncoderError::CouldNotFindEncoder
        }
        _ => EncoderError::CouldNotOpenVideoCodec,
    };
    fail(context, err, code)
}

fn encode_error(context: &str, err: Error) -> EncoderError {
    let code = match err {
        Error::InvalidData(_) => EncoderError::CouldNotSendFrameToEncoder,
        _ => EncoderError::CouldNotEncodeFrame,
    };
    fail(context, err, code)
}

fn write_packets(sink: &mut Sink, packets: &[Packet]) -> Result<(), EncoderError> {
    for packet in packets {
        sink.write(packet)
            .map_err(|e| fail("writing packet", e, EncoderError::CouldNotWriteOutputPacket))?;
    }
    Ok(())
}

impl Backend for FfmpegBackend {
    fn create_output_container(&mut self, path: &Path) -> Result<(), EncoderError> {
        self.tracks.clear();
        let sink = Sink::create(path).map_err(|err| {
            let code = match err {
                Error::UnsupportedFormat(_) => EncoderError::CouldNotDetermineOutputFormat,
                Error::Io(_) => EncoderError::CouldNotOpenFile,
                _ => EncoderError::CouldNotAllocateOutputContext,
            };
            fail("creating output container", err, code)
        })?;

        debug!("{} container for {}", sink.format_name(), path.display());
        self.sink = Some(sink);
        Ok(())
    }

    fn add_track(
        &mut self,
        kind: StreamType,
        config: &TrackConfig,
    ) -> Result<TrackId, EncoderError> {
        if config.stream_type() != kind {
            return Err(EncoderError::UnsupportedMediaType);
        }
        let sink = self.sink(EncoderError::CouldNotAllocateStream)?;

        let codec = match (kind, sink.default_codec(kind)) {
            (StreamType::Video, None) => return Err(EncoderError::NotAVideoFormat),
            (StreamType::Audio, None) => return Err(EncoderError::UnsupportedMediaType),
            (_, Some(CodecId::Other)) => {
                error!("{} has no supported default {kind:?} codec", sink.format_name());
                return Err(EncoderError::CouldNotFindEncoder);
            }
            (_, Some(codec)) => codec,
        };

        let stream = sink
            .add_stream(codec)
            .map_err(|e| fail("adding stream", e, EncoderError::CouldNotAllocateStream))?;

        self.tracks.push(Track {
            config: config.clone(),
            stream,
            codec,
            coder: None,
        });
        Ok(TrackId(self.tracks.len() - 1))
    }

    fn open_track(&mut self, id: TrackId) -> Result<TrackParameters, EncoderError> {
        let Some(sink) = self.sink.as_mut() else {
            return Err(EncoderError::CouldNotAllocateEncodingContext);
        };
        let Some(track) = self.tracks.get_mut(id.0) else {
            return Err(EncoderError::CouldNotAllocateEncodingContext);
        };
        let global_header = sink.needs_global_header();

        match track.config {
            TrackConfig::Video {
                width,
                height,
                input_width,
                input_height,
                input_format,
                frame_rate,
                bit_rate,
                gop_size,
                hardware_encoding,
            } => {
                let mut config = VideoEncoderConfig::new(
                    track.codec,
                    width,
                    height,
                    Rational::new(frame_rate as i32, 1),
                )
                .with_bit_rate(bit_rate)
                .with_global_header(global_header);
                if gop_size > 0 {
                    config = config.with_gop_size(gop_size);
                }
                if hardware_encoding {
                    config = config.with_hw_encoder(PREFERRED_HW_ENCODER);
                }

                let encoder =
                    VideoEncoder::new(config).map_err(|e| open_error("opening video encoder", e))?;
                if let Some(reason) = encoder.fallback_reason() {
                    warn!(
                        "hardware encoder unavailable ({reason}), using {}",
                        encoder.codec_name()
                    );
                }
                info!(
                    "video: {} ({}) {width}x{height} at {frame_rate} fps, {bit_rate} bit/s",
                    encoder.codec_name(),
                    if encoder.is_hardware() { "hardware" } else { "software" }
                );

                let transform = VideoTransform::new(
                    VideoTransformConfig::new(input_width, input_height, input_format)
                        .with_output(width, height, PixelFormat::Yuv420p),
                )
                .map_err(|e| {
                    fail(
                        "creating scaler",
                        e,
                        EncoderError::CouldNotCreateConversionContext,
                    )
                })?;

                sink.set_stream_parameters(track.stream, encoder.parameters(), encoder.time_base())
                    .map_err(|e| {
                        fail(
                            "copying video stream parameters",
                            e,
                            EncoderError::CouldNotCopyStreamParameters,
                        )
                    })?;

                let parameters = TrackParameters::Video {
                    time_base: encoder.time_base(),
                    input_stride: transform.input_stride(),
                };
                track.coder = Some(Coder::Video { encoder, transform });
                Ok(parameters)
            }
            TrackConfig::Audio {
                sample_rate,
                channels,
                bit_rate,
            } => {
                let layout = ChannelLayout::from_count(channels);
                let config = AudioEncoderConfig::new(track.codec, sample_rate, layout)
                    .with_bit_rate(bit_rate)
                    .with_global_header(global_header);

                let encoder =
                    AudioEncoder::new(config).map_err(|e| open_error("opening audio encoder", e))?;
                if encoder.sample_rate() != sample_rate {
                    warn!(
                        "audio encoder runs at {} Hz instead of the requested {sample_rate} Hz",
                        encoder.sample_rate()
                    );
                }
                info!(
                    "audio: {} Hz x{}, {:?}, frame size {:?}",
                    encoder.sample_rate(),
                    encoder.channels().channels(),
                    encoder.sample_format(),
                    encoder.frame_size()
                );

                // Producers generate at the negotiated rate, so only the
                // sample format changes here
                let transform = AudioTransform::new(AudioTransformConfig::new(
                    encoder.sample_rate(),
                    layout,
                    encoder.sample_format(),
                ))
                .map_err(|e| {
                    fail(
                        "creating resampler",
                        e,
                        EncoderError::CouldNotCreateResamplerContext,
                    )
                })?;

                sink.set_stream_parameters(track.stream, encoder.parameters(), encoder.time_base())
                    .map_err(|e| {
                        fail(
                            "copying audio stream parameters",
                            e,
                            EncoderError::CouldNotCopyStreamParameters,
                        )
                    })?;

                let parameters = TrackParameters::Audio {
                    time_base: encoder.time_base(),
                    sample_rate: encoder.sample_rate(),
                    channels: encoder.channels().channels(),
                    frame_size: encoder.frame_size().unwrap_or(0),
                };
                track.coder = Some(Coder::Audio { encoder, transform });
                Ok(parameters)
            }
        }
    }

    fn open_file(&mut self) -> Result<(), EncoderError> {
        // The sink opened the file when the container was created
        let sink = self.sink(EncoderError::CouldNotOpenFile)?;
        debug!("writing to {}", sink.path().display());
        Ok(())
    }

    fn write_header(&mut self) -> Result<(), EncoderError> {
        let Some(sink) = self.sink.as_mut() else {
            error!("no output container to write a header to");
            return Err(EncoderError::CouldNotWriteHeader);
        };
        sink.write_header()
            .map_err(|e| fail("writing header", e, EncoderError::CouldNotWriteHeader))?;

        for track in &self.tracks {
            debug!(
                "stream {} time base {:?}",
                track.stream,
                sink.stream_time_base(track.stream)
            );
        }
        Ok(())
    }

    fn convert_and_encode(
        &mut self,
        id: TrackId,
        frame: RawFrame<'_>,
    ) -> Result<(), EncoderError> {
        let Some(sink) = self.sink.as_mut() else {
            return Err(EncoderError::CouldNotWriteOutputPacket);
        };
        let Some(coder) = self
            .tracks
            .get_mut(id.0)
            .and_then(|track| track.coder.as_mut())
        else {
            return Err(EncoderError::CouldNotSendFrameToEncoder);
        };

        let packets = match (coder, frame) {
            (
                Coder::Video { encoder, transform },
                RawFrame::Video {
                    data, stride, pts, ..
                },
            ) => {
                let yuv = transform.transform(data, stride).map_err(|e| {
                    fail("converting video frame", e, EncoderError::CouldNotEncodeFrame)
                })?;
                encoder
                    .encode(yuv, pts)
                    .map_err(|e| encode_error("encoding video frame", e))?
            }
            (
                Coder::Audio { encoder, transform },
                RawFrame::Audio {
                    samples,
                    sample_count,
                    pts,
                    ..
                },
            ) => {
                let mut converted = transform
                    .transform(samples, sample_count)
                    .map_err(|e| fail("resampling audio", e, EncoderError::CouldNotEncodeFrame))?;
                encoder
                    .encode(&mut converted, pts)
                    .map_err(|e| encode_error("encoding audio frame", e))?
            }
            _ => return Err(EncoderError::UnsupportedMediaType),
        };

        write_packets(sink, &packets)
    }

    fn flush(&mut self, id: TrackId) -> Result<(), EncoderError> {
        let Some(sink) = self.sink.as_mut() else {
            return Err(EncoderError::CouldNotWriteOutputPacket);
        };
        let Some(coder) = self
            .tracks
            .get_mut(id.0)
            .and_then(|track| track.coder.as_mut())
        else {
            return Err(EncoderError::CouldNotSendFrameToEncoder);
        };

        let packets = match coder {
            Coder::Video { encoder, .. } => encoder.flush(),
            Coder::Audio { encoder, .. } => encoder.flush(),
        }
        .map_err(|e| encode_error("flushing encoder", e))?;

        write_packets(sink, &packets)
    }

    fn write_trailer(&mut self) -> Result<(), EncoderError> {
        let Some(sink) = self.sink.take() else {
            return Err(EncoderError::CouldNotWriteTrailer);
        };
        sink.finish()
            .map_err(|e| fail("writing trailer", e, EncoderError::CouldNotWriteTrailer))
    }

    fn close_and_release(&mut self) {
        if let Some(sink) = self.sink.take() {
            debug!("closing unfinished output {}", sink.path().display());
        }
        self.tracks.clear();
    }
}

impl std::fmt::Debug for FfmpegBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegBackend")
            .field("sink", &self.sink)
            .field("tracks", &self.tracks.len())
            .finish()
    }
}

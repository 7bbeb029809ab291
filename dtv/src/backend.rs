/*!
    Codec backend interface.

    The encoder drives a backend through a fixed sequence: create the
    container, add and open each track, open the file and write the header
    on the caller's thread; then convert and encode frames, flush, write the
    trailer and release on the worker thread.
*/

use std::path::Path;

use ffmpeg_types::{PixelFormat, Rational, StreamType};

use crate::EncoderError;

/// Handle to a track inside the backend's output container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TrackId(pub usize);

/**
    What the encoder asks of a track.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrackConfig {
    Video {
        width: u32,
        height: u32,
        input_width: u32,
        input_height: u32,
        input_format: PixelFormat,
        frame_rate: u32,
        bit_rate: u64,
        gop_size: u32,
        hardware_encoding: bool,
    },
    Audio {
        sample_rate: u32,
        channels: u16,
        bit_rate: u64,
    },
}

impl TrackConfig {
    pub fn stream_type(&self) -> StreamType {
        match self {
            Self::Video { .. } => StreamType::Video,
            Self::Audio { .. } => StreamType::Audio,
        }
    }
}

/**
    What the backend actually opened for a track.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackParameters {
    Video {
        /// Time base of the presentation timestamps the track expects.
        time_base: Rational,
        /// Row length in bytes the backend reads input pixels with.
        input_stride: usize,
    },
    Audio {
        time_base: Rational,
        sample_rate: u32,
        channels: u16,
        /// Samples per channel per encoder frame; zero if any size is accepted.
        frame_size: usize,
    },
}

/**
    Raw media handed to [`Backend::convert_and_encode`], borrowed from a
    queue slot.
*/
#[derive(Clone, Copy, Debug)]
pub enum RawFrame<'a> {
    Video {
        data: &'a [u8],
        width: u32,
        height: u32,
        stride: usize,
        pts: i64,
    },
    Audio {
        /// Interleaved signed 16-bit samples, `sample_count * channels` long.
        samples: &'a [i16],
        channels: u16,
        sample_count: usize,
        pts: i64,
    },
}

/**
    Conversion, encoding and muxing for one output file.

    Setup methods run on the thread calling [`Encoder::run`](crate::Encoder::run);
    the backend then moves to the worker thread for the rest of the session.
*/
pub trait Backend: Send + 'static {
    fn create_output_container(&mut self, path: &Path) -> Result<(), EncoderError>;

    /**
        Add a track of `kind` to the container.

        Fails with [`EncoderError::UnsupportedMediaType`] if `config` does not
        describe a `kind` track.
    */
    fn add_track(&mut self, kind: StreamType, config: &TrackConfig)
    -> Result<TrackId, EncoderError>;

    fn open_track(&mut self, track: TrackId) -> Result<TrackParameters, EncoderError>;

    fn open_file(&mut self) -> Result<(), EncoderError>;

    fn write_header(&mut self) -> Result<(), EncoderError>;

    fn convert_and_encode(&mut self, track: TrackId, frame: RawFrame<'_>)
    -> Result<(), EncoderError>;

    /// Drain the track's encoder at end of stream.
    fn flush(&mut self, track: TrackId) -> Result<(), EncoderError>;

    fn write_trailer(&mut self) -> Result<(), EncoderError>;

    /**
        Release every resource held for the session.

        Called exactly once per session on every exit path, and must be safe
        to call when setup stopped half way.
    */
    fn close_and_release(&mut self);
}

//! In-memory backend that records every call the encoder makes.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use dtv::{
    Backend, EncoderError, RawFrame, Rational, StreamType, TrackConfig, TrackId,
    TrackParameters, VideoSettings,
};

/// One recorded backend call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    CreateContainer(PathBuf),
    AddTrack(StreamType),
    OpenTrack(TrackId),
    OpenFile,
    WriteHeader,
    EncodeVideo { pts: i64, first_byte: u8 },
    EncodeAudio { pts: i64, samples: usize },
    Flush(TrackId),
    WriteTrailer,
    CloseAndRelease,
}

/// Setup steps a failure can be injected at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupStep {
    CreateContainer,
    AddVideoTrack,
    OpenVideoTrack,
    OpenFile,
    WriteHeader,
}

/// Shared view of the calls made on a [`FakeBackend`].
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.0.lock().iter().filter(|call| predicate(call)).count()
    }

    pub fn video_encodes(&self) -> Vec<(i64, u8)> {
        self.0
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::EncodeVideo { pts, first_byte } => Some((*pts, *first_byte)),
                _ => None,
            })
            .collect()
    }

    pub fn audio_encodes(&self) -> Vec<(i64, usize)> {
        self.0
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::EncodeAudio { pts, samples } => Some((*pts, *samples)),
                _ => None,
            })
            .collect()
    }

    fn push(&self, call: Call) {
        self.0.lock().push(call);
    }
}

pub struct FakeBackend {
    log: CallLog,
    tracks: Vec<TrackConfig>,
    encode_calls: usize,

    fail_setup: Option<(SetupStep, EncoderError)>,
    fail_on_encode: Option<(usize, EncoderError)>,
    panic_on_encode: Option<usize>,
    encode_delay: Duration,
    audio_frame_size: usize,
    audio_sample_rate: Option<u32>,
}

impl FakeBackend {
    pub fn new() -> (Self, CallLog) {
        let log = CallLog::default();
        let backend = Self {
            log: log.clone(),
            tracks: Vec::new(),
            encode_calls: 0,
            fail_setup: None,
            fail_on_encode: None,
            panic_on_encode: None,
            encode_delay: Duration::ZERO,
            audio_frame_size: 1024,
            audio_sample_rate: None,
        };
        (backend, log)
    }

    /// Fail the given setup step.
    pub fn failing_setup(mut self, step: SetupStep, error: EncoderError) -> Self {
        self.fail_setup = Some((step, error));
        self
    }

    /// Fail the `nth` (1-based) `convert_and_encode` call of the session.
    pub fn failing_encode(mut self, nth: usize, error: EncoderError) -> Self {
        self.fail_on_encode = Some((nth, error));
        self
    }

    /// Panic in the `nth` (1-based) `convert_and_encode` call of the session.
    pub fn panicking_encode(mut self, nth: usize) -> Self {
        self.panic_on_encode = Some(nth);
        self
    }

    /// Sleep in every `convert_and_encode` call.
    pub fn with_encode_delay(mut self, delay: Duration) -> Self {
        self.encode_delay = delay;
        self
    }

    pub fn with_audio_frame_size(mut self, frame_size: usize) -> Self {
        self.audio_frame_size = frame_size;
        self
    }

    /// Open the audio track at `rate` whatever was requested.
    pub fn with_audio_sample_rate(mut self, rate: u32) -> Self {
        self.audio_sample_rate = Some(rate);
        self
    }

    fn check(&self, step: SetupStep) -> Result<(), EncoderError> {
        match self.fail_setup {
            Some((failing, error)) if failing == step => Err(error),
            _ => Ok(()),
        }
    }
}

impl Backend for FakeBackend {
    fn create_output_container(&mut self, path: &Path) -> Result<(), EncoderError> {
        self.log.push(Call::CreateContainer(path.to_path_buf()));
        self.check(SetupStep::CreateContainer)
    }

    fn add_track(
        &mut self,
        kind: StreamType,
        config: &TrackConfig,
    ) -> Result<TrackId, EncoderError> {
        self.log.push(Call::AddTrack(kind));
        if config.stream_type() != kind {
            return Err(EncoderError::UnsupportedMediaType);
        }
        if kind == StreamType::Video {
            self.check(SetupStep::AddVideoTrack)?;
        }
        self.tracks.push(config.clone());
        Ok(TrackId(self.tracks.len() - 1))
    }

    fn open_track(&mut self, track: TrackId) -> Result<TrackParameters, EncoderError> {
        self.log.push(Call::OpenTrack(track));
        match self.tracks.get(track.0) {
            Some(TrackConfig::Video {
                input_width,
                input_format,
                frame_rate,
                ..
            }) => {
                self.check(SetupStep::OpenVideoTrack)?;
                Ok(TrackParameters::Video {
                    time_base: Rational::per_second(*frame_rate as i32),
                    input_stride: input_format.packed_stride(*input_width).unwrap_or(0),
                })
            }
            Some(TrackConfig::Audio {
                sample_rate,
                channels,
                ..
            }) => {
                let rate = self.audio_sample_rate.unwrap_or(*sample_rate);
                Ok(TrackParameters::Audio {
                    time_base: Rational::per_second(rate as i32),
                    sample_rate: rate,
                    channels: *channels,
                    frame_size: self.audio_frame_size,
                })
            }
            None => Err(EncoderError::CouldNotOpenVideoCodec),
        }
    }

    fn open_file(&mut self) -> Result<(), EncoderError> {
        self.log.push(Call::OpenFile);
        self.check(SetupStep::OpenFile)
    }

    fn write_header(&mut self) -> Result<(), EncoderError> {
        self.log.push(Call::WriteHeader);
        self.check(SetupStep::WriteHeader)
    }

    fn convert_and_encode(
        &mut self,
        _track: TrackId,
        frame: RawFrame<'_>,
    ) -> Result<(), EncoderError> {
        if !self.encode_delay.is_zero() {
            thread::sleep(self.encode_delay);
        }

        self.encode_calls += 1;
        if self.panic_on_encode == Some(self.encode_calls) {
            panic!("backend blew up on encode {}", self.encode_calls);
        }
        self.log.push(match frame {
            RawFrame::Video { data, pts, .. } => Call::EncodeVideo {
                pts,
                first_byte: data.first().copied().unwrap_or(0),
            },
            RawFrame::Audio {
                pts, sample_count, ..
            } => Call::EncodeAudio {
                pts,
                samples: sample_count,
            },
        });

        match self.fail_on_encode {
            Some((nth, error)) if nth == self.encode_calls => Err(error),
            _ => Ok(()),
        }
    }

    fn flush(&mut self, track: TrackId) -> Result<(), EncoderError> {
        self.log.push(Call::Flush(track));
        Ok(())
    }

    fn write_trailer(&mut self) -> Result<(), EncoderError> {
        self.log.push(Call::WriteTrailer);
        Ok(())
    }

    fn close_and_release(&mut self) {
        self.log.push(Call::CloseAndRelease);
        self.tracks.clear();
        self.encode_calls = 0;
    }
}

/// Small video-only settings writing to a path nothing reads.
pub fn settings() -> VideoSettings {
    VideoSettings {
        output_path: "fake-output.mp4".into(),
        input_width: 8,
        input_height: 4,
        width: 8,
        height: 4,
        ..VideoSettings::default()
    }
}

pub fn audio_settings() -> VideoSettings {
    VideoSettings {
        audio: true,
        ..settings()
    }
}

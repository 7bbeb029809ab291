/*!
    Encoder orchestrator.

    Owns the settings, the frame queue and the worker thread, and drives the
    backend through setup, streaming and teardown.

    ```text
    Idle --run--> Running --commit--> Draining --(queue drained)--> Finished --stop--> Idle
    ```
*/

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use ffmpeg_types::{Rational, StreamType};
use log::{debug, error, info, warn};

use crate::backend::{Backend, RawFrame, TrackConfig, TrackId, TrackParameters};
use crate::{
    AvSync, EncoderError, Frame, FrameQueue, FrameRequest, FrameWriteGuard, VideoSettings,
};

const WORKER_THREAD_NAME: &str = "dtv-worker";

/// Interleaved channel count requested from the audio encoder.
const AUDIO_CHANNELS: u16 = 2;

/**
    Lifecycle state of an [`Encoder`].
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncoderState {
    /// No session. `run` starts one.
    Idle,
    /// Accepting frames.
    Running,
    /// Committed; the worker is draining queued frames.
    Draining,
    /// The worker has exited, after draining or on an error. `stop` returns to idle.
    Finished,
}

/**
    Audio parameters the backend settled on.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NegotiatedAudio {
    pub time_base: Rational,
    /// Samples per second the producer should generate.
    pub sample_rate: u32,
    /// Interleaved channels per sample.
    pub channels: u16,
    /// Samples per channel per encoder frame; zero if any size is accepted.
    pub frame_size: usize,
}

/**
    What the backend actually opened, as opposed to what was requested.

    Audio allotments are computed from these values, so a producer that
    synthesizes audio should follow `audio.sample_rate` rather than the
    requested rate.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NegotiatedSettings {
    pub video_time_base: Rational,
    /// Row length in bytes of the frames handed to the producer.
    pub input_stride: usize,
    pub audio: Option<NegotiatedAudio>,
}

/// Audio track state owned by the worker.
struct AudioStream {
    track: TrackId,
    time_base: Rational,
    /// Next presentation timestamp in samples.
    next_pts: i64,
    sample_rate: u32,
    samples_written: u64,
    frame_size: usize,
}

impl AudioStream {
    fn new(track: TrackId, audio: &NegotiatedAudio) -> Self {
        Self {
            track,
            time_base: audio.time_base,
            next_pts: 0,
            sample_rate: audio.sample_rate,
            samples_written: 0,
            frame_size: audio.frame_size,
        }
    }
}

type NegotiatedCallback = Box<dyn FnMut(&NegotiatedSettings) + Send>;

/**
    Asynchronous frame encoder.

    One producer thread calls [`new_frame`](Self::new_frame), fills the frame
    and calls [`submit_frame`](Self::submit_frame); a background worker
    encodes submitted frames in order. Errors never cross the thread
    boundary as panics or results: poll [`error`](Self::error).
*/
pub struct Encoder<B: Backend> {
    backend: Option<B>,
    settings: VideoSettings,
    negotiated: Option<NegotiatedSettings>,
    on_negotiated: Option<NegotiatedCallback>,

    queue: Option<Arc<FrameQueue>>,
    worker: Option<JoinHandle<B>>,
    accepting: bool,

    sync: Option<AvSync>,
    frame_template: FrameRequest,
    frames_scheduled: i64,
    frames_submitted: u64,

    last_error: Option<EncoderError>,
}

impl<B: Backend> Encoder<B> {
    /**
        Create an idle encoder around `backend`.
    */
    pub fn new(backend: B) -> Self {
        Self {
            backend: Some(backend),
            settings: VideoSettings::default(),
            negotiated: None,
            on_negotiated: None,
            queue: None,
            worker: None,
            accepting: false,
            sync: None,
            frame_template: FrameRequest::default(),
            frames_scheduled: 0,
            frames_submitted: 0,
            last_error: None,
        }
    }

    /**
        Register a callback invoked from [`run`](Self::run) once the backend
        has opened every track, before the worker starts.
    */
    pub fn set_negotiated_callback(
        &mut self,
        callback: impl FnMut(&NegotiatedSettings) + Send + 'static,
    ) {
        self.on_negotiated = Some(Box::new(callback));
    }

    /**
        Start a session writing to `settings.output_path` through a queue of
        `buffer_capacity` frames.

        Does nothing if a session is already started. Setup failures are
        returned and also reported by [`error`](Self::error); the encoder
        then stays idle with the backend released and no worker spawned.
    */
    pub fn run(
        &mut self,
        settings: VideoSettings,
        buffer_capacity: usize,
    ) -> Result<(), EncoderError> {
        if self.worker.is_some() {
            debug!("run ignored: a session is already started");
            return Ok(());
        }

        self.last_error = None;
        self.negotiated = None;
        self.frames_scheduled = 0;
        self.frames_submitted = 0;

        if let Err(err) = settings.validate() {
            warn!("rejecting encoder settings: {err}");
            return self.fail_setup(EncoderError::InvalidSettings);
        }
        if buffer_capacity == 0 {
            warn!("rejecting encoder settings: buffer capacity must be positive");
            return self.fail_setup(EncoderError::InvalidSettings);
        }
        let Some(mut backend) = self.backend.take() else {
            return self.fail_setup(EncoderError::BackendUnavailable);
        };

        self.settings = settings;
        let queue = FrameQueue::new(buffer_capacity);

        let (negotiated, video, audio) = match setup(&mut backend, &self.settings) {
            Ok(opened) => opened,
            Err(err) => {
                error!(
                    "encoder setup for {} failed: {err}",
                    self.settings.output_path.display()
                );
                backend.close_and_release();
                queue.teardown();
                self.backend = Some(backend);
                return self.fail_setup(err);
            }
        };

        info!(
            "encoding {} at {}x{} ({} fps), video time base {}, {}",
            self.settings.output_path.display(),
            self.settings.width,
            self.settings.height,
            self.settings.frame_rate,
            negotiated.video_time_base,
            match &negotiated.audio {
                Some(audio) => format!(
                    "audio {} Hz x{} in frames of {}",
                    audio.sample_rate, audio.channels, audio.frame_size
                ),
                None => "no audio".to_string(),
            }
        );
        if let Some(callback) = self.on_negotiated.as_mut() {
            callback(&negotiated);
        }

        self.frame_template = FrameRequest {
            width: self.settings.input_width,
            height: self.settings.input_height,
            stride: negotiated.input_stride,
            audio_samples: 0,
            channels: negotiated.audio.map_or(0, |audio| audio.channels),
        };
        self.sync = negotiated.audio.map(|audio| {
            AvSync::new(negotiated.video_time_base, audio.time_base, audio.frame_size)
        });
        self.negotiated = Some(negotiated);

        let queue = Arc::new(queue);
        let spawned = {
            let queue = Arc::clone(&queue);
            thread::Builder::new()
                .name(WORKER_THREAD_NAME.into())
                .spawn(move || run_worker(backend, queue, video, audio))
        };

        match spawned {
            Ok(handle) => {
                self.queue = Some(queue);
                self.worker = Some(handle);
                self.accepting = true;
                Ok(())
            }
            Err(err) => {
                // The backend went down with the closure
                error!("could not spawn encoder worker: {err}");
                if let Ok(queue) = Arc::try_unwrap(queue) {
                    queue.teardown();
                }
                self.sync = None;
                self.negotiated = None;
                self.fail_setup(EncoderError::CouldNotSpawnWorker)
            }
        }
    }

    fn fail_setup(&mut self, err: EncoderError) -> Result<(), EncoderError> {
        self.last_error = Some(err);
        Err(err)
    }

    /**
        Reserve the next frame to render into.

        Returns `None` unless the encoder is running without error, or when
        the queue is full (non-blocking) or stopped. With `blocking`, waits
        for the worker to free a slot.

        The returned frame is sized for the input dimensions and carries the
        audio allotment for this video frame. Drop it, then call
        [`submit_frame`](Self::submit_frame).
    */
    pub fn new_frame(&mut self, blocking: bool) -> Option<FrameWriteGuard<'_>> {
        if !self.accepting {
            return None;
        }
        let queue = self.queue.as_ref()?;
        if queue.error().is_some() {
            return None;
        }

        let allotment = self.sync.as_ref().map_or(0, AvSync::next_allotment);
        let request = FrameRequest {
            audio_samples: allotment as usize,
            ..self.frame_template
        };

        let mut frame = queue.acquire_for_write(&request, blocking)?;

        if let Some(sync) = self.sync.as_mut() {
            sync.advance(allotment);
        }
        frame.set_pts(self.frames_scheduled);
        self.frames_scheduled += 1;

        Some(frame)
    }

    /**
        Hand the oldest frame obtained from [`new_frame`](Self::new_frame)
        to the worker.

        Panics if there is no such frame.
    */
    pub fn submit_frame(&mut self) {
        match &self.queue {
            Some(queue) => {
                queue.publish();
                self.frames_submitted += 1;
            }
            None => warn!("submit_frame called without a running session"),
        }
    }

    /**
        Stop accepting frames and let the worker drain, flush and finalize.

        Returns immediately.
    */
    pub fn commit(&mut self) {
        if !self.accepting {
            return;
        }
        self.accepting = false;
        if let Some(queue) = &self.queue {
            queue.stop();
        }
        info!("committed after {} frames", self.frames_submitted);
    }

    /**
        Commit if needed, wait for the worker to finish and release the queue.

        When this returns the backend has released every resource and the
        encoder is idle again.
    */
    pub fn stop(&mut self) {
        self.commit();

        let Some(worker) = self.worker.take() else {
            return;
        };
        match worker.join() {
            Ok(backend) => self.backend = Some(backend),
            Err(_) => {
                error!("encoder worker panicked; its backend is lost");
                self.last_error.get_or_insert(EncoderError::WorkerPanicked);
            }
        }

        if let Some(queue) = self.queue.take() {
            self.last_error = queue.error().or(self.last_error);
            match Arc::try_unwrap(queue) {
                Ok(queue) => queue.teardown(),
                Err(_) => warn!("frame queue still shared after worker exit"),
            }
        }

        self.sync = None;
        debug!("encoder stopped");
    }

    /**
        The first error of the current or last session, if any.
    */
    pub fn error(&self) -> Option<EncoderError> {
        self.queue
            .as_ref()
            .and_then(|queue| queue.error())
            .or(self.last_error)
    }

    pub fn state(&self) -> EncoderState {
        match &self.worker {
            None => EncoderState::Idle,
            Some(worker) if worker.is_finished() => EncoderState::Finished,
            Some(_) if self.accepting => EncoderState::Running,
            Some(_) => EncoderState::Draining,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == EncoderState::Running
    }

    /// Settings of the current or last session.
    pub fn settings(&self) -> &VideoSettings {
        &self.settings
    }

    /// What the backend opened for the current or last session.
    pub fn negotiated(&self) -> Option<&NegotiatedSettings> {
        self.negotiated.as_ref()
    }

    /// Frames submitted in the current or last session.
    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }
}

impl<B: Backend> Drop for Encoder<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<B: Backend> std::fmt::Debug for Encoder<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("state", &self.state())
            .field("output", &self.settings.output_path)
            .field("frames_submitted", &self.frames_submitted)
            .field("error", &self.error())
            .finish_non_exhaustive()
    }
}

/**
    Create the container, add and open both tracks, open the file and write
    the header.
*/
fn setup<B: Backend>(
    backend: &mut B,
    settings: &VideoSettings,
) -> Result<(NegotiatedSettings, TrackId, Option<AudioStream>), EncoderError> {
    backend.create_output_container(&settings.output_path)?;

    let video_track = backend.add_track(
        StreamType::Video,
        &TrackConfig::Video {
            width: settings.width,
            height: settings.height,
            input_width: settings.input_width,
            input_height: settings.input_height,
            input_format: settings.input_format(),
            frame_rate: settings.frame_rate,
            bit_rate: settings.bit_rate,
            gop_size: settings.gop_size,
            hardware_encoding: settings.hardware_encoding,
        },
    )?;

    let audio_track = if settings.audio {
        Some(backend.add_track(
            StreamType::Audio,
            &TrackConfig::Audio {
                sample_rate: settings.sample_rate,
                channels: AUDIO_CHANNELS,
                bit_rate: settings.audio_bit_rate,
            },
        )?)
    } else {
        None
    };

    let TrackParameters::Video {
        time_base: video_time_base,
        input_stride,
    } = backend.open_track(video_track)?
    else {
        return Err(EncoderError::NotAVideoFormat);
    };

    let audio = match audio_track {
        Some(track) => match backend.open_track(track)? {
            TrackParameters::Audio { sample_rate: 0, .. }
            | TrackParameters::Audio { channels: 0, .. } => {
                return Err(EncoderError::CouldNotCreateResamplerContext);
            }
            TrackParameters::Audio {
                time_base,
                sample_rate,
                channels,
                frame_size,
            } => Some((
                track,
                NegotiatedAudio {
                    time_base,
                    sample_rate,
                    channels,
                    frame_size,
                },
            )),
            TrackParameters::Video { .. } => return Err(EncoderError::UnsupportedMediaType),
        },
        None => None,
    };

    backend.open_file()?;
    backend.write_header()?;

    let negotiated = NegotiatedSettings {
        video_time_base,
        input_stride,
        audio: audio.map(|(_, audio)| audio),
    };
    let audio = audio.map(|(track, audio)| AudioStream::new(track, &audio));

    Ok((negotiated, video_track, audio))
}

/**
    Records [`EncoderError::WorkerPanicked`] if the worker unwinds, which
    stops the queue and wakes a blocked producer.
*/
struct PanicGuard<'a>(&'a FrameQueue);

impl Drop for PanicGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("encoder worker panicked");
            self.0.record_error(EncoderError::WorkerPanicked);
        }
    }
}

/**
    Worker thread body: drain the queue through the backend, finalize, and
    hand the backend back to the joining thread.
*/
fn run_worker<B: Backend>(
    mut backend: B,
    queue: Arc<FrameQueue>,
    video: TrackId,
    mut audio: Option<AudioStream>,
) -> B {
    debug!("encoder worker started");
    let _guard = PanicGuard(&queue);

    let mut frames = 0u64;
    let mut result = Ok(());
    while let Some(frame) = queue.acquire_for_read() {
        result = encode_frame(&mut backend, &frame, video, audio.as_mut());
        drop(frame);
        queue.release();
        if result.is_err() {
            break;
        }
        frames += 1;
    }

    // The trailer is only written after a clean drain
    let result = result.and_then(|()| finish(&mut backend, video, audio.as_ref()));

    match result {
        Ok(()) => {
            queue.stop();
            info!(
                "encoded {frames} frames and {} audio samples",
                audio.as_ref().map_or(0, |audio| audio.samples_written)
            );
        }
        Err(err) => {
            error!("encoding failed after {frames} frames: {err}");
            queue.record_error(err);
        }
    }

    backend.close_and_release();
    backend
}

fn encode_frame<B: Backend>(
    backend: &mut B,
    frame: &Frame,
    video: TrackId,
    audio: Option<&mut AudioStream>,
) -> Result<(), EncoderError> {
    backend.convert_and_encode(
        video,
        RawFrame::Video {
            data: frame.pixels(),
            width: frame.width(),
            height: frame.height(),
            stride: frame.stride(),
            pts: frame.pts(),
        },
    )?;

    let Some(audio) = audio else {
        return Ok(());
    };

    let channels = frame.channels() as usize;
    let total = frame.audio_sample_count();
    let chunk = if audio.frame_size == 0 {
        total
    } else {
        audio.frame_size
    };
    let samples = frame.audio();

    let mut offset = 0;
    while offset < total {
        let count = chunk.min(total - offset);
        let pts = Rational::rescale(
            audio.next_pts,
            Rational::per_second(audio.sample_rate as i32),
            audio.time_base,
        );
        backend.convert_and_encode(
            audio.track,
            RawFrame::Audio {
                samples: &samples[offset * channels..(offset + count) * channels],
                channels: frame.channels(),
                sample_count: count,
                pts,
            },
        )?;
        audio.next_pts += count as i64;
        audio.samples_written += count as u64;
        offset += count;
    }

    Ok(())
}

fn finish<B: Backend>(
    backend: &mut B,
    video: TrackId,
    audio: Option<&AudioStream>,
) -> Result<(), EncoderError> {
    backend.flush(video)?;
    if let Some(audio) = audio {
        backend.flush(audio.track)?;
    }
    backend.write_trailer()
}

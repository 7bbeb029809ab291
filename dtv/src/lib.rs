/*!
    Direct-to-video encoding.

    An application renders frames into buffers handed out by an [`Encoder`],
    submits them, and a single background worker converts, encodes and muxes
    them into a media file through a [`Backend`]. The producer only ever waits
    for a free queue slot, never for the encoder itself.

    ```ignore
    use dtv::{Encoder, VideoSettings};

    let mut encoder = Encoder::new(dtv::ffmpeg::FfmpegBackend::new());
    let settings = VideoSettings {
        output_path: "out.mp4".into(),
        audio: true,
        ..VideoSettings::default()
    };
    encoder.run(settings, 2)?;

    for _ in 0..600 {
        let Some(mut frame) = encoder.new_frame(true) else { break };
        render_into(frame.pixels_mut(), frame.stride());
        drop(frame);
        encoder.submit_frame();
    }

    encoder.commit();
    encoder.stop();
    if let Some(err) = encoder.error() {
        eprintln!("encoding failed: {err}");
    }
    ```

    # Features

    - `ffmpeg`: the [`ffmpeg::FfmpegBackend`] adapter on top of the
      `ffmpeg-transform`, `ffmpeg-encode` and `ffmpeg-sink` crates.
*/

mod backend;
mod encoder;
mod error;
mod frame;
mod frame_queue;
mod settings;
mod sync;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

pub use backend::{Backend, RawFrame, TrackConfig, TrackId, TrackParameters};
pub use encoder::{Encoder, EncoderState, NegotiatedAudio, NegotiatedSettings};
pub use error::{EncoderError, SettingsError};
pub use frame::{Frame, FrameRequest};
pub use frame_queue::{FrameQueue, FrameReadGuard, FrameWriteGuard};
pub use settings::VideoSettings;
pub use sync::AvSync;

pub use ffmpeg_types::{PixelFormat, Rational, StreamType};

/*!
    Pixel and sample conversion for the ffmpeg crate ecosystem.

    Applications hand the encoder packed RGB rows and interleaved 16-bit PCM.
    This crate turns those into the frames encoders consume: scaled planar
    YUV through libswscale, and resampled audio in the encoder's sample
    format through libswresample.

    Both transforms allocate their FFmpeg contexts and source frames once,
    up front, so a configuration FFmpeg cannot handle fails at construction
    instead of on the first frame.

    ```ignore
    use ffmpeg_transform::{VideoTransform, VideoTransformConfig};
    use ffmpeg_types::PixelFormat;

    let config = VideoTransformConfig::new(1280, 720, PixelFormat::Rgb24)
        .with_output(1920, 1080, PixelFormat::Yuv420p);
    let mut transform = VideoTransform::new(config)?;

    // Rows must be `transform.input_stride()` bytes apart
    let frame = transform.transform(&pixels, transform.input_stride())?;
    ```
*/

pub use ffmpeg_types::{ChannelLayout, Error, PixelFormat, Result, SampleFormat};

mod audio;
mod video;

pub use audio::{AudioTransform, AudioTransformConfig};
pub use video::{VideoTransform, VideoTransformConfig, copy_rows};

/*!
    Media encoding for the ffmpeg crate ecosystem.

    This crate turns frames prepared by `ffmpeg-transform` into compressed
    packets for `ffmpeg-sink`.

    # Video Encoding

    ```ignore
    use ffmpeg_encode::{CodecId, HwEncoder, VideoEncoder, VideoEncoderConfig};
    use ffmpeg_types::Rational;

    // H.264 at 1080p60, on the GPU when NVENC is available
    let config = VideoEncoderConfig::new(CodecId::H264, 1920, 1080, Rational::new(60, 1))
        .with_bit_rate(30_000_000)
        .with_gop_size(12)
        .with_hw_encoder(HwEncoder::Nvenc);

    let mut encoder = VideoEncoder::new(config)?;
    println!("encoding with {}", encoder.codec_name());

    for (pts, frame) in yuv_frames.iter_mut().enumerate() {
        for packet in encoder.encode(frame, pts as i64)? {
            // Write to muxer
        }
    }

    // Flush remaining packets
    let final_packets = encoder.flush()?;
    ```

    # Audio Encoding

    ```ignore
    use ffmpeg_encode::{AudioEncoder, AudioEncoderConfig, CodecId};
    use ffmpeg_types::ChannelLayout;

    let config = AudioEncoderConfig::new(CodecId::Aac, 44100, ChannelLayout::Stereo)
        .with_bit_rate(64_000);

    let mut encoder = AudioEncoder::new(config)?;

    // AAC wants exactly frame_size samples per frame but the last
    let chunk = encoder.frame_size().unwrap_or(4096);
    ```

    # Hardware Encoding

    A configured [`HwEncoder`] is tried first. If FFmpeg was built without
    it, or the device refuses to open, the software encoder for the same
    codec is used instead; [`VideoEncoder::is_hardware`] tells which one
    won and [`VideoEncoder::fallback_reason`] why. Every encoder is opened
    with its fastest low-latency preset.

    # Frame Requirements

    - **Video**: YUV420P at the configured size
    - **Audio**: the format reported by [`AudioEncoder::sample_format`]

    Use `ffmpeg-transform` to convert frames to the required format before encoding.
*/

pub use ffmpeg_types::{
    ChannelLayout, CodecId, Error, Packet, PixelFormat, Rational, Result, SampleFormat,
};

mod audio;
mod config;
mod packets;
mod video;

pub use audio::AudioEncoder;
pub use config::{AudioEncoderConfig, HwEncoder, VideoEncoderConfig};
pub use video::VideoEncoder;

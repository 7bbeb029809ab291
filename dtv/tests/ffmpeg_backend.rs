//! End-to-end encoding through the FFmpeg backend. Needs the system FFmpeg
//! libraries with an H.264 and an AAC encoder.

#![cfg(feature = "ffmpeg")]

use dtv::ffmpeg::FfmpegBackend;
use dtv::{Encoder, EncoderError, EncoderState, VideoSettings};

fn small_settings(path: std::path::PathBuf, audio: bool) -> VideoSettings {
    VideoSettings {
        output_path: path,
        input_width: 64,
        input_height: 48,
        width: 64,
        height: 48,
        frame_rate: 30,
        bit_rate: 500_000,
        audio,
        hardware_encoding: false,
        ..VideoSettings::default()
    }
}

fn encode_frames(encoder: &mut Encoder<FfmpegBackend>, count: u8) {
    for i in 0..count {
        let mut frame = encoder.new_frame(true).expect("frame slot");
        frame.pixels_mut().fill(i.wrapping_mul(8));
        for (n, sample) in frame.audio_mut().iter_mut().enumerate() {
            *sample = if n % 2 == 0 { 10_000 } else { -10_000 };
        }
        drop(frame);
        encoder.submit_frame();
    }
}

#[test]
fn writes_playable_mp4_with_audio() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.mp4");

    let mut encoder = Encoder::new(FfmpegBackend::new());
    encoder.run(small_settings(path.clone(), true), 2).unwrap();

    let audio = encoder.negotiated().unwrap().audio.unwrap();
    assert_eq!(audio.channels, 2);
    assert!(audio.sample_rate > 0);

    encode_frames(&mut encoder, 30);
    encoder.stop();

    assert_eq!(encoder.error(), None);
    assert_eq!(encoder.state(), EncoderState::Idle);
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}

#[test]
fn backend_is_reusable_for_a_second_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut encoder = Encoder::new(FfmpegBackend::new());

    for name in ["first.mp4", "second.mp4"] {
        let path = dir.path().join(name);
        encoder.run(small_settings(path.clone(), false), 3).unwrap();
        encode_frames(&mut encoder, 5);
        encoder.stop();

        assert_eq!(encoder.error(), None);
        assert!(path.exists());
    }
}

#[test]
fn unknown_extension_fails_setup() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.notacontainer");

    let mut encoder = Encoder::new(FfmpegBackend::new());
    let err = encoder.run(small_settings(path, false), 2).unwrap_err();

    assert_eq!(err, EncoderError::CouldNotDetermineOutputFormat);
    assert_eq!(encoder.state(), EncoderState::Idle);
    assert!(encoder.new_frame(false).is_none());
}

#[test]
fn audio_only_container_is_not_a_video_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.wav");

    let mut encoder = Encoder::new(FfmpegBackend::new());
    let err = encoder.run(small_settings(path, false), 2).unwrap_err();

    assert_eq!(err, EncoderError::NotAVideoFormat);
}

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, bail};
use clap::Parser;
use log::info;

use dtv::ffmpeg::FfmpegBackend;
use dtv::{Encoder, Frame, PixelFormat, VideoSettings};

#[derive(Parser, Debug)]
#[command(name = "dtv-demo")]
#[command(about = "Encode a synthetic gradient and tone straight to a video file")]
struct Args {
    /// Output file; the container is picked from the extension
    #[arg(short, long, default_value = "output.mp4")]
    output: PathBuf,

    /// JSON settings file, overridden by any flag given here
    #[arg(long)]
    config: Option<PathBuf>,

    /// Width of the rendered frames
    #[arg(long)]
    input_width: Option<u32>,

    /// Height of the rendered frames
    #[arg(long)]
    input_height: Option<u32>,

    /// Encoded width
    #[arg(long)]
    width: Option<u32>,

    /// Encoded height
    #[arg(long)]
    height: Option<u32>,

    /// Frames per second
    #[arg(short, long)]
    frame_rate: Option<u32>,

    /// Video bit rate in bits per second
    #[arg(short, long)]
    bit_rate: Option<u64>,

    /// Add a stereo tone track
    #[arg(long)]
    audio: bool,

    /// Only use software encoders
    #[arg(long)]
    no_hardware: bool,

    /// Render with an alpha channel
    #[arg(long)]
    alpha: bool,

    /// Render in blue-green-red order
    #[arg(long)]
    bgr: bool,

    /// Length of the video in seconds
    #[arg(short, long, default_value = "10")]
    seconds: u32,

    /// Frames buffered between the renderer and the encoder
    #[arg(long, default_value = "2")]
    buffer: usize,
}

impl Args {
    fn settings(&self) -> anyhow::Result<VideoSettings> {
        let mut settings = match &self.config {
            Some(path) => VideoSettings::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => VideoSettings::default(),
        };

        settings.output_path = self.output.clone();
        if let Some(width) = self.input_width {
            settings.input_width = width;
        }
        if let Some(height) = self.input_height {
            settings.input_height = height;
        }
        if let Some(width) = self.width {
            settings.width = width;
        }
        if let Some(height) = self.height {
            settings.height = height;
        }
        if let Some(frame_rate) = self.frame_rate {
            settings.frame_rate = frame_rate;
        }
        if let Some(bit_rate) = self.bit_rate {
            settings.bit_rate = bit_rate;
        }
        settings.audio |= self.audio;
        settings.hardware_encoding &= !self.no_hardware;
        settings.input_alpha |= self.alpha;
        settings.bgr |= self.bgr;

        settings.validate()?;
        Ok(settings)
    }
}

/// Moving gradient: red follows x, green follows y, blue pulses over time.
fn render_video(frame: &mut Frame, index: u64, format: PixelFormat) {
    let bytes_per_pixel = format.bytes_per_pixel().unwrap_or(3);
    let alpha = bytes_per_pixel == 4;
    let bgr = matches!(format, PixelFormat::Bgr24 | PixelFormat::Bgra);
    let blue = (255.0 * (0.5 + 0.5 * (index as f64 * 0.01).sin())).round() as u8;
    let i = index as usize;
    let width = frame.width() as usize;

    for y in 0..frame.height() {
        let green = ((y as usize + i) & 0xFF) as u8;
        let row = frame.row_mut(y);
        for (x, pixel) in row.chunks_exact_mut(bytes_per_pixel).take(width).enumerate() {
            let red = ((x + i) & 0xFF) as u8;
            let (first, third) = if bgr { (blue, red) } else { (red, blue) };
            pixel[0] = first;
            pixel[1] = green;
            pixel[2] = third;
            if alpha {
                pixel[3] = 0xFF;
            }
        }
    }
}

/// Constant left channel, 1000 rad/s sine on the right.
fn render_audio(frame: &mut Frame, sample_rate: u32, next_sample: &mut u64) {
    let channels = frame.channels() as usize;
    for chunk in frame.audio_mut().chunks_exact_mut(channels) {
        let t = *next_sample as f64 / sample_rate as f64;
        chunk[0] = 10_000;
        if let Some(right) = chunk.get_mut(1) {
            *right = ((t * 1000.0).sin() * 0.9 * i16::MAX as f64).round() as i16;
        }
        *next_sample += 1;
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let settings = args.settings()?;
    let total_frames = u64::from(args.seconds) * u64::from(settings.frame_rate);
    let format = settings.input_format();

    let mut encoder = Encoder::new(FfmpegBackend::new());
    encoder
        .run(settings, args.buffer)
        .context("starting encoder")?;

    let sample_rate = encoder
        .negotiated()
        .and_then(|negotiated| negotiated.audio)
        .map_or(0, |audio| audio.sample_rate);
    info!("rendering {total_frames} frames");

    let started = Instant::now();
    let mut next_sample = 0;
    for index in 0..total_frames {
        let Some(mut frame) = encoder.new_frame(true) else {
            break;
        };
        render_video(&mut frame, index, format);
        if sample_rate > 0 {
            render_audio(&mut frame, sample_rate, &mut next_sample);
        }
        drop(frame);
        encoder.submit_frame();

        let done = index + 1;
        if done % 100 == 0 || done + 10 > total_frames {
            println!("Frame: {done}/{total_frames}");
        }
    }

    encoder.commit();
    encoder.stop();
    let elapsed = started.elapsed();

    if let Some(err) = encoder.error() {
        bail!("Encoding failed: {err}");
    }

    let fps = total_frames as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    println!("Encoding time: {:.2}s", elapsed.as_secs_f64());
    println!("Real-time FPS: {fps:.1}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "dtv-demo",
            "--output",
            "clip.mkv",
            "--width",
            "640",
            "--height",
            "360",
            "--audio",
            "--no-hardware",
        ]);
        let settings = args.settings().unwrap();

        assert_eq!(settings.output_path, PathBuf::from("clip.mkv"));
        assert_eq!((settings.width, settings.height), (640, 360));
        assert_eq!(settings.input_width, 1920);
        assert!(settings.audio);
        assert!(!settings.hardware_encoding);
        assert_eq!(args.seconds, 10);
        assert_eq!(args.buffer, 2);
    }

    #[test]
    fn invalid_flags_are_rejected() {
        let args = Args::parse_from(["dtv-demo", "--frame-rate", "0"]);
        assert!(args.settings().is_err());
    }
}

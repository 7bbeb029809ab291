/*!
    Encoder settings.
*/

use std::path::{Path, PathBuf};

use ffmpeg_types::PixelFormat;
use serde::{Deserialize, Serialize};

use crate::SettingsError;

/**
    Output file, dimensions and codec knobs for one encoding session.

    Missing fields in a JSON document take the defaults below, which describe
    a 1080p60 H.264 stream at 30 Mbit/s without audio.
*/
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct VideoSettings {
    /// Output file; the container is chosen from its extension.
    pub output_path: PathBuf,
    /// Width of the frames the application renders.
    pub input_width: u32,
    /// Height of the frames the application renders.
    pub input_height: u32,
    /// Encoded width; input frames are scaled to it.
    pub width: u32,
    /// Encoded height.
    pub height: u32,
    /// Frames per second.
    pub frame_rate: u32,
    /// Video bit rate in bits per second.
    pub bit_rate: u64,
    /// Encode an audio track alongside video.
    pub audio: bool,
    /// Requested audio sample rate; the encoder may pick another.
    pub sample_rate: u32,
    /// Audio bit rate in bits per second.
    pub audio_bit_rate: u64,
    /// Keyframe interval in frames.
    pub gop_size: u32,
    /// Prefer a hardware video encoder when one is available.
    pub hardware_encoding: bool,
    /// Input pixels carry an alpha byte.
    pub input_alpha: bool,
    /// Input pixels are in blue-green-red order.
    pub bgr: bool,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            output_path: PathBuf::new(),
            input_width: 1920,
            input_height: 1080,
            width: 1920,
            height: 1080,
            frame_rate: 60,
            bit_rate: 30_000_000,
            audio: false,
            sample_rate: 44100,
            audio_bit_rate: 64_000,
            gop_size: 12,
            hardware_encoding: true,
            input_alpha: false,
            bgr: false,
        }
    }
}

impl VideoSettings {
    /**
        Load settings from a JSON file.
    */
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn to_json_string(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /**
        Packed pixel layout of the frames the application renders.
    */
    pub fn input_format(&self) -> PixelFormat {
        PixelFormat::packed_rgb(self.input_alpha, self.bgr)
    }

    /**
        Check the settings can describe a stream at all.
    */
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.output_path.as_os_str().is_empty() {
            return Err(SettingsError::Invalid("output path is empty".into()));
        }
        if self.input_width == 0 || self.input_height == 0 {
            return Err(SettingsError::Invalid(format!(
                "input dimensions {}x{} must be positive",
                self.input_width, self.input_height
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(SettingsError::Invalid(format!(
                "output dimensions {}x{} must be positive",
                self.width, self.height
            )));
        }
        if self.frame_rate == 0 || self.frame_rate > i32::MAX as u32 {
            return Err(SettingsError::Invalid(format!(
                "frame rate {} out of range",
                self.frame_rate
            )));
        }
        if self.audio && (self.sample_rate == 0 || self.sample_rate > i32::MAX as u32) {
            return Err(SettingsError::Invalid(format!(
                "sample rate {} out of range",
                self.sample_rate
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn valid() -> VideoSettings {
        VideoSettings {
            output_path: "out.mp4".into(),
            ..VideoSettings::default()
        }
    }

    #[test]
    fn defaults() {
        let settings = VideoSettings::default();
        assert_eq!((settings.width, settings.height), (1920, 1080));
        assert_eq!(settings.frame_rate, 60);
        assert_eq!(settings.bit_rate, 30_000_000);
        assert!(settings.hardware_encoding);
        assert!(!settings.audio);
        assert_eq!(settings.input_format(), PixelFormat::Rgb24);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: VideoSettings =
            serde_json::from_str(r#"{"output_path": "a.mkv", "audio": true, "bgr": true}"#)
                .unwrap();
        assert_eq!(settings.output_path, PathBuf::from("a.mkv"));
        assert!(settings.audio);
        assert_eq!(settings.sample_rate, 44100);
        assert_eq!(settings.input_format(), PixelFormat::Bgr24);
    }

    #[test]
    fn json_file_round_trip() {
        let settings = VideoSettings {
            input_alpha: true,
            gop_size: 30,
            ..valid()
        };

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(settings.to_json_string().unwrap().as_bytes())
            .unwrap();

        let loaded = VideoSettings::from_json_file(file.path()).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.input_format(), PixelFormat::Rgba);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = VideoSettings::from_json_file("/nonexistent/settings.json").unwrap_err();
        assert!(matches!(err, SettingsError::Io(_)));
    }

    #[test]
    fn validation() {
        assert!(valid().validate().is_ok());
        assert!(VideoSettings::default().validate().is_err());

        let zero_rate = VideoSettings {
            frame_rate: 0,
            ..valid()
        };
        assert!(zero_rate.validate().is_err());

        let zero_input = VideoSettings {
            input_height: 0,
            ..valid()
        };
        assert!(zero_input.validate().is_err());

        // Sample rate only matters when audio is enabled
        let silent = VideoSettings {
            sample_rate: 0,
            ..valid()
        };
        assert!(silent.validate().is_ok());
        let broken_audio = VideoSettings {
            audio: true,
            ..silent
        };
        assert!(broken_audio.validate().is_err());
    }
}

/*!
    Video frame transformation.
*/

use ffmpeg_next::{
    format::Pixel,
    software::scaling::{context::Context as ScalerContext, flag::Flags as ScalerFlags},
    util::frame::video::Video as VideoFrameFFmpeg,
};

use ffmpeg_types::{Error, PixelFormat, Result};

/**
    Configuration for video transformation.

    The input side describes the packed frames the application renders; the
    output side describes what the encoder was opened with.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoTransformConfig {
    /// Input width in pixels.
    pub src_width: u32,
    /// Input height in pixels.
    pub src_height: u32,
    /// Input pixel format. Must be a packed format.
    pub src_format: PixelFormat,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output pixel format.
    pub format: PixelFormat,
}

impl VideoTransformConfig {
    /**
        Create a configuration that converts `src_format` frames to YUV 4:2:0
        without resizing.
    */
    pub fn new(src_width: u32, src_height: u32, src_format: PixelFormat) -> Self {
        Self {
            src_width,
            src_height,
            src_format,
            width: src_width,
            height: src_height,
            format: PixelFormat::Yuv420p,
        }
    }

    /**
        Set the output dimensions and pixel format.
    */
    pub fn with_output(mut self, width: u32, height: u32, format: PixelFormat) -> Self {
        self.width = width;
        self.height = height;
        self.format = format;
        self
    }
}

/**
    Video frame transformer. Scales bicubically.

    Owns the scaler, a source frame the packed input is copied into, and the
    output frame handed to the encoder. All three are created once.
*/
pub struct VideoTransform {
    config: VideoTransformConfig,
    scaler: ScalerContext,
    src_frame: VideoFrameFFmpeg,
    dst_frame: VideoFrameFFmpeg,
    row_bytes: usize,
}

impl VideoTransform {
    /**
        Create the scaler and frames for `config`.
    */
    pub fn new(config: VideoTransformConfig) -> Result<Self> {
        if config.src_width == 0
            || config.src_height == 0
            || config.width == 0
            || config.height == 0
        {
            return Err(Error::invalid_data("video transform with zero dimensions"));
        }
        let row_bytes = config.src_format.packed_stride(config.src_width).ok_or_else(|| {
            Error::unsupported_format(format!(
                "input pixel format {:?} is not packed",
                config.src_format
            ))
        })?;

        let src_pixel = pixel_format_to_ffmpeg(config.src_format)?;
        let dst_pixel = pixel_format_to_ffmpeg(config.format)?;

        let scaler = ScalerContext::get(
            src_pixel,
            config.src_width,
            config.src_height,
            dst_pixel,
            config.width,
            config.height,
            ScalerFlags::BICUBIC,
        )
        .map_err(|e| Error::codec(format!("failed to create scaler: {}", e)))?;

        let src_frame = VideoFrameFFmpeg::new(src_pixel, config.src_width, config.src_height);
        let dst_frame = VideoFrameFFmpeg::new(dst_pixel, config.width, config.height);

        Ok(Self {
            config,
            scaler,
            src_frame,
            dst_frame,
            row_bytes,
        })
    }

    /**
        Get the configuration.
    */
    pub fn config(&self) -> &VideoTransformConfig {
        &self.config
    }

    /**
        Row length in bytes of the internal source frame.

        Input laid out with this stride is copied in a single pass.
    */
    pub fn input_stride(&self) -> usize {
        self.src_frame.stride(0)
    }

    /**
        Convert one packed input frame, returning the encoder-ready frame.

        `data` holds `src_height` rows that are `stride` bytes apart. The
        returned frame is reused by the next call.
    */
    pub fn transform(&mut self, data: &[u8], stride: usize) -> Result<&mut VideoFrameFFmpeg> {
        let dst_stride = self.src_frame.stride(0);
        copy_rows(
            data,
            stride,
            self.src_frame.data_mut(0),
            dst_stride,
            self.row_bytes,
            self.config.src_height as usize,
        )?;

        self.scaler
            .run(&self.src_frame, &mut self.dst_frame)
            .map_err(|e| Error::codec(format!("scaling failed: {}", e)))?;

        Ok(&mut self.dst_frame)
    }
}

/**
    Copy `rows` rows of `row_bytes` bytes between buffers with different
    strides.

    Fails without copying anything if either buffer is too short or a stride
    is shorter than a row.
*/
pub fn copy_rows(
    src: &[u8],
    src_stride: usize,
    dst: &mut [u8],
    dst_stride: usize,
    row_bytes: usize,
    rows: usize,
) -> Result<()> {
    if rows == 0 || row_bytes == 0 {
        return Ok(());
    }
    if src_stride < row_bytes || dst_stride < row_bytes {
        return Err(Error::invalid_data(format!(
            "stride shorter than a row of {} bytes",
            row_bytes
        )));
    }

    let src_needed = (rows - 1) * src_stride + row_bytes;
    let dst_needed = (rows - 1) * dst_stride + row_bytes;
    if src.len() < src_needed {
        return Err(Error::invalid_data(format!(
            "input holds {} bytes, {} rows need {}",
            src.len(),
            rows,
            src_needed
        )));
    }
    if dst.len() < dst_needed {
        return Err(Error::invalid_data(format!(
            "frame holds {} bytes, {} rows need {}",
            dst.len(),
            rows,
            dst_needed
        )));
    }

    if src_stride == dst_stride {
        let len = src_needed;
        dst[..len].copy_from_slice(&src[..len]);
        return Ok(());
    }

    for y in 0..rows {
        let src_start = y * src_stride;
        let dst_start = y * dst_stride;
        dst[dst_start..dst_start + row_bytes]
            .copy_from_slice(&src[src_start..src_start + row_bytes]);
    }
    Ok(())
}

/**
    Convert our PixelFormat to FFmpeg's Pixel format.
*/
fn pixel_format_to_ffmpeg(format: PixelFormat) -> Result<Pixel> {
    match format {
        PixelFormat::Yuv420p => Ok(Pixel::YUV420P),
        PixelFormat::Nv12 => Ok(Pixel::NV12),
        PixelFormat::Rgb24 => Ok(Pixel::RGB24),
        PixelFormat::Bgr24 => Ok(Pixel::BGR24),
        PixelFormat::Rgba => Ok(Pixel::RGBA),
        PixelFormat::Bgra => Ok(Pixel::BGRA),
        _ => Err(Error::unsupported_format(format!(
            "pixel format {:?} not supported",
            format
        ))),
    }
}

impl std::fmt::Debug for VideoTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoTransform")
            .field("config", &self.config)
            .field("input_stride", &self.input_stride())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_rows_repacks_between_strides() {
        // 2 rows of 3 bytes, source padded to 4
        let src = [1, 2, 3, 0, 4, 5, 6, 0];
        let mut dst = [9u8; 16];
        copy_rows(&src, 4, &mut dst, 8, 3, 2).unwrap();
        assert_eq!(&dst[..3], &[1, 2, 3]);
        assert_eq!(dst[3], 9);
        assert_eq!(&dst[8..11], &[4, 5, 6]);
    }

    #[test]
    fn copy_rows_same_stride_copies_block() {
        let src: Vec<u8> = (0..12).collect();
        let mut dst = vec![0u8; 12];
        copy_rows(&src, 6, &mut dst, 6, 6, 2).unwrap();
        assert_eq!(dst, src);
    }

    #[test]
    fn copy_rows_last_row_needs_no_padding() {
        let src = [1, 2, 0, 3, 4];
        let mut dst = [0u8; 4];
        copy_rows(&src, 3, &mut dst, 2, 2, 2).unwrap();
        assert_eq!(dst, [1, 2, 3, 4]);
    }

    #[test]
    fn copy_rows_rejects_short_buffers() {
        let mut dst = [0u8; 8];
        assert!(matches!(
            copy_rows(&[0; 5], 3, &mut dst, 4, 3, 2),
            Err(Error::InvalidData(_))
        ));
        assert!(matches!(
            copy_rows(&[0; 8], 4, &mut dst[..5], 4, 3, 2),
            Err(Error::InvalidData(_))
        ));
        assert!(matches!(
            copy_rows(&[0; 8], 2, &mut dst, 4, 3, 2),
            Err(Error::InvalidData(_))
        ));
        assert_eq!(dst, [0; 8]);
    }

    #[test]
    fn config_defaults_to_same_size_yuv() {
        let config = VideoTransformConfig::new(640, 360, PixelFormat::Bgra);
        assert_eq!((config.width, config.height), (640, 360));
        assert_eq!(config.format, PixelFormat::Yuv420p);

        let scaled = config.with_output(1280, 720, PixelFormat::Nv12);
        assert_eq!((scaled.width, scaled.height), (1280, 720));
        assert_eq!(scaled.format, PixelFormat::Nv12);
    }
}

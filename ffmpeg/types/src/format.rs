/*!
    Pixel and sample format types.
*/

/**
    Video pixel formats.

    Packed RGB variants are what applications hand to the encoder; the planar
    YUV variants are what encoders consume.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// Planar YUV 4:2:0, 12bpp (encoder default)
    Yuv420p,
    /// Semi-planar YUV 4:2:0, 12bpp (common hardware encoder input)
    Nv12,
    /// Packed RGB, 24bpp
    Rgb24,
    /// Packed BGR, 24bpp
    Bgr24,
    /// Packed RGBA, 32bpp
    Rgba,
    /// Packed BGRA, 32bpp
    Bgra,
}

impl PixelFormat {
    /**
        Select the packed RGB layout described by an alpha flag and a
        channel order flag.
    */
    pub const fn packed_rgb(alpha: bool, bgr: bool) -> Self {
        match (alpha, bgr) {
            (false, false) => Self::Rgb24,
            (false, true) => Self::Bgr24,
            (true, false) => Self::Rgba,
            (true, true) => Self::Bgra,
        }
    }

    /**
        Returns the bytes per pixel of a packed format, or `None` for
        planar formats.
    */
    pub const fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            Self::Rgb24 | Self::Bgr24 => Some(3),
            Self::Rgba | Self::Bgra => Some(4),
            Self::Yuv420p | Self::Nv12 => None,
        }
    }

    /**
        Returns the tightly packed row length in bytes for `width` pixels of a
        packed format, or `None` for planar formats.
    */
    pub const fn packed_stride(self, width: u32) -> Option<usize> {
        match self.bytes_per_pixel() {
            Some(bpp) => Some(width as usize * bpp),
            None => None,
        }
    }
}

/**
    Audio sample formats.

    The `p` suffixed variants store one plane per channel; the others are
    interleaved.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SampleFormat {
    U8,
    /// Signed 16-bit integer, interleaved
    S16,
    /// Signed 16-bit integer, planar
    S16p,
    /// Signed 32-bit integer, interleaved
    S32,
    /// Signed 32-bit integer, planar
    S32p,
    /// 32-bit floating point, interleaved
    F32,
    /// 32-bit floating point, planar (AAC encoder input)
    F32p,
    /// 64-bit floating point, interleaved
    F64,
    /// 64-bit floating point, planar
    F64p,
}

/**
    Speaker layouts, in FFmpeg's native channel order.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ChannelLayout {
    Mono,
    /// Left, right
    Stereo,
    Surround5_1,
    Surround7_1,
}

impl ChannelLayout {
    pub const fn channels(self) -> u16 {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
            Self::Surround5_1 => 6,
            Self::Surround7_1 => 8,
        }
    }

    /**
        The smallest layout with at least `count` channels.
    */
    pub const fn from_count(count: u16) -> Self {
        match count {
            0 | 1 => Self::Mono,
            2 => Self::Stereo,
            3..=6 => Self::Surround5_1,
            _ => Self::Surround7_1,
        }
    }
}

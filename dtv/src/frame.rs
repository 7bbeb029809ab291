/*!
    Reusable frame storage.
*/

/**
    Dimensions and audio allotment requested for the next frame.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameRequest {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Row length in bytes, including any padding.
    pub stride: usize,
    /// Audio samples per channel to carry with this frame.
    pub audio_samples: usize,
    /// Interleaved audio channel count.
    pub channels: u16,
}

/**
    One slot's worth of pixel and audio storage.

    A frame lives inside a [`FrameQueue`](crate::FrameQueue) slot for the
    whole session. Its buffers only grow: a request that fits the current
    capacity reuses the existing allocation, so a steady stream of same-sized
    frames allocates once per slot.
*/
#[derive(Default)]
pub struct Frame {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    stride: usize,
    max_width: u32,
    max_height: u32,
    max_stride: usize,

    audio: Vec<i16>,
    audio_sample_count: usize,
    channels: u16,

    pts: i64,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /**
        Size the frame for `request`, growing storage only when the request
        exceeds what is already allocated.

        Returns true if either buffer was reallocated.
    */
    pub fn reserve(&mut self, request: &FrameRequest) -> bool {
        let mut reallocated = false;

        if request.width > self.max_width
            || request.height > self.max_height
            || request.stride > self.max_stride
        {
            self.max_width = self.max_width.max(request.width);
            self.max_height = self.max_height.max(request.height);
            self.max_stride = self.max_stride.max(request.stride);
            self.pixels = vec![0; self.max_stride * self.max_height as usize];
            reallocated = true;
        }

        let audio_len = request.audio_samples * request.channels as usize;
        if audio_len > self.audio.len() {
            self.audio = vec![0; audio_len];
            reallocated = true;
        }

        self.width = request.width;
        self.height = request.height;
        self.stride = request.stride;
        self.audio_sample_count = request.audio_samples;
        self.channels = request.channels;

        reallocated
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row length in bytes.
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn max_width(&self) -> u32 {
        self.max_width
    }

    pub fn max_height(&self) -> u32 {
        self.max_height
    }

    /// Pixel rows of this frame, `stride * height` bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels[..self.stride * self.height as usize]
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        let len = self.stride * self.height as usize;
        &mut self.pixels[..len]
    }

    /**
        One row of pixels, `stride` bytes long.

        Panics if `y` is not below the frame height.
    */
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        assert!(y < self.height, "row {y} out of range for height {}", self.height);
        let start = y as usize * self.stride;
        &mut self.pixels[start..start + self.stride]
    }

    /// Interleaved audio for this frame, `audio_sample_count * channels` samples.
    pub fn audio(&self) -> &[i16] {
        &self.audio[..self.audio_sample_count * self.channels as usize]
    }

    pub fn audio_mut(&mut self) -> &mut [i16] {
        let len = self.audio_sample_count * self.channels as usize;
        &mut self.audio[..len]
    }

    /// Samples per channel allotted to this frame. May be zero.
    pub fn audio_sample_count(&self) -> usize {
        self.audio_sample_count
    }

    /// Allocated audio storage, in interleaved samples.
    pub fn audio_capacity(&self) -> usize {
        self.audio.len()
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Presentation index of this frame on the video track.
    pub fn pts(&self) -> i64 {
        self.pts
    }

    pub(crate) fn set_pts(&mut self, pts: i64) {
        self.pts = pts;
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("audio_sample_count", &self.audio_sample_count)
            .field("channels", &self.channels)
            .field("pts", &self.pts)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(width: u32, height: u32, audio_samples: usize) -> FrameRequest {
        FrameRequest {
            width,
            height,
            stride: width as usize * 3,
            audio_samples,
            channels: 2,
        }
    }

    #[test]
    fn first_reserve_allocates() {
        let mut frame = Frame::new();
        assert!(frame.reserve(&request(64, 32, 735)));
        assert_eq!(frame.pixels().len(), 64 * 3 * 32);
        assert_eq!(frame.audio().len(), 735 * 2);
        assert_eq!(frame.max_width(), 64);
        assert_eq!(frame.max_height(), 32);
    }

    #[test]
    fn same_size_reuses_storage() {
        let mut frame = Frame::new();
        frame.reserve(&request(64, 32, 1024));
        let pixels = frame.pixels().as_ptr();
        let audio = frame.audio().as_ptr();

        assert!(!frame.reserve(&request(64, 32, 1024)));
        assert_eq!(frame.pixels().as_ptr(), pixels);
        assert_eq!(frame.audio().as_ptr(), audio);
    }

    #[test]
    fn smaller_request_keeps_capacity() {
        let mut frame = Frame::new();
        frame.reserve(&request(64, 32, 1024));

        assert!(!frame.reserve(&request(32, 16, 0)));
        assert_eq!(frame.width(), 32);
        assert_eq!(frame.height(), 16);
        assert_eq!(frame.max_width(), 64);
        assert_eq!(frame.pixels().len(), 32 * 3 * 16);
        assert!(frame.audio().is_empty());
        assert_eq!(frame.audio_capacity(), 2048);
    }

    #[test]
    fn audio_grows_independently_of_pixels() {
        let mut frame = Frame::new();
        frame.reserve(&request(64, 32, 1024));
        let pixels = frame.pixels().as_ptr();

        assert!(frame.reserve(&request(64, 32, 2048)));
        assert_eq!(frame.pixels().as_ptr(), pixels);
        assert_eq!(frame.audio_capacity(), 4096);
    }

    #[test]
    fn rows_follow_stride() {
        let mut frame = Frame::new();
        frame.reserve(&FrameRequest {
            width: 4,
            height: 2,
            stride: 16,
            audio_samples: 0,
            channels: 0,
        });
        frame.row_mut(1)[0] = 7;
        assert_eq!(frame.pixels()[16], 7);
        assert_eq!(frame.row_mut(0).len(), 16);
    }
}

/*!
    Audio/video synchronization policy.

    Each video frame carries just enough audio for the audio track to reach
    the frame's end time, in whole encoder frames. Audio is scheduled in
    units of the audio encoder's frame size, so the allotment per video frame
    varies (735 samples per 60 fps frame at 44.1 kHz is never a multiple of
    1024), but the running total never drifts.
*/

use ffmpeg_types::Rational;

/**
    Running audio-per-frame scheduler.

    Counters advance only through [`AvSync::advance`], so a frame that was
    refused by the queue does not consume audio.
*/
#[derive(Clone, Copy, Debug)]
pub struct AvSync {
    video_time_base: Rational,
    audio_time_base: Rational,
    audio_frame_size: u64,
    video_frames: i64,
    audio_samples: i64,
}

impl AvSync {
    /**
        A zero `audio_frame_size` means the encoder accepts any frame size,
        and audio is scheduled with single-sample granularity.
    */
    pub fn new(
        video_time_base: Rational,
        audio_time_base: Rational,
        audio_frame_size: usize,
    ) -> Self {
        Self {
            video_time_base,
            audio_time_base,
            audio_frame_size: audio_frame_size as u64,
            video_frames: 0,
            audio_samples: 0,
        }
    }

    /// Video frames committed so far.
    pub fn video_frames_scheduled(&self) -> i64 {
        self.video_frames
    }

    /// Audio samples per channel committed so far.
    pub fn audio_samples_scheduled(&self) -> i64 {
        self.audio_samples
    }

    /**
        Audio samples to attach to the next video frame.

        The smallest multiple of the audio frame size that brings the audio
        end time to or past the end of the next video frame. Identical to
        adding one audio frame at a time while
        `compare_ts(video_frames + 1, video_tb, audio_samples + allotment, audio_tb)`
        is `Greater`, computed directly.
    */
    pub fn next_allotment(&self) -> u64 {
        let step = self.audio_frame_size.max(1) as i128;

        // Audio end >= video end  <=>  samples * a.num * v.den >= frames * v.num * a.den
        let unit = self.audio_time_base.num as i128 * self.video_time_base.den as i128;
        let target = (self.video_frames as i128 + 1)
            * self.video_time_base.num as i128
            * self.audio_time_base.den as i128;

        let needed_samples = ceil_div(target, unit);
        let missing = needed_samples - self.audio_samples as i128;
        if missing <= 0 {
            return 0;
        }

        (ceil_div(missing, step) * step) as u64
    }

    /**
        Commit one video frame and the audio allotted to it.
    */
    pub fn advance(&mut self, allotment: u64) {
        self.video_frames += 1;
        self.audio_samples += allotment as i64;
    }
}

fn ceil_div(numerator: i128, denominator: i128) -> i128 {
    numerator.div_euclid(denominator) + i128::from(numerator.rem_euclid(denominator) != 0)
}

//! SMPTE-style timecodes.
//!
//! Frame indices are derived as `round(seconds * fps)`. Integral rates render as
//! `HH:MM:SS:FF`; the NTSC rates 29.97 and 59.94 use drop-frame numbering and
//! render as `HH:MM:SS;FF`.

use std::fmt;
use std::time::Duration;

const NTSC_30: f64 = 30000.0 / 1001.0;
const NTSC_60: f64 = 60000.0 / 1001.0;
const NTSC_TOLERANCE: f64 = 0.01;

/// A frame position rendered against a frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timecode {
    frame: u64,
    nominal_fps: u64,
    drop_frame: bool,
}

impl Timecode {
    /// Build a timecode for the frame at `time` in a stream running at `fps`.
    ///
    /// Non-positive or non-finite rates collapse every time onto frame 0.
    pub fn from_duration(time: Duration, fps: f64) -> Self {
        let frame = if fps.is_finite() && fps > 0.0 {
            (time.as_secs_f64() * fps).round() as u64
        } else {
            0
        };
        Self::from_frame(frame, fps)
    }

    /// Build a timecode for a known frame index.
    pub fn from_frame(frame: u64, fps: f64) -> Self {
        let drop_frame =
            (fps - NTSC_30).abs() < NTSC_TOLERANCE || (fps - NTSC_60).abs() < NTSC_TOLERANCE;
        let nominal_fps = if fps.is_finite() && fps >= 1.0 {
            fps.round() as u64
        } else {
            1
        };
        Self {
            frame,
            nominal_fps,
            drop_frame,
        }
    }

    /// Zero-based frame index.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Whether drop-frame numbering is in effect.
    pub fn is_drop_frame(&self) -> bool {
        self.drop_frame
    }

    /// Frame number as displayed, with dropped labels skipped.
    fn display_frame(&self) -> u64 {
        if !self.drop_frame {
            return self.frame;
        }

        // Two labels per minute are skipped at 29.97 (four at 59.94),
        // except on every tenth minute.
        let dropped = self.nominal_fps / 15;
        let per_ten_minutes = self.nominal_fps * 600 - dropped * 9;
        let per_minute = self.nominal_fps * 60 - dropped;

        let tens = self.frame / per_ten_minutes;
        let rem = self.frame % per_ten_minutes;
        let mut shifted = self.frame + dropped * 9 * tens;
        if rem > dropped {
            shifted += dropped * ((rem - dropped) / per_minute);
        }
        shifted
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.display_frame();
        let fps = self.nominal_fps;
        let frames = n % fps;
        let total_secs = n / fps;
        let secs = total_secs % 60;
        let mins = (total_secs / 60) % 60;
        let hours = total_secs / 3600;
        let sep = if self.drop_frame { ';' } else { ':' };
        write!(f, "{hours:02}:{mins:02}:{secs:02}{sep}{frames:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_rate() {
        let tc = Timecode::from_duration(Duration::from_secs(3723), 24.0);
        assert_eq!(tc.frame(), 3723 * 24);
        assert_eq!(tc.to_string(), "01:02:03:00");
    }

    #[test]
    fn rounds_to_nearest_frame() {
        // 1.999s at 25fps is 49.975 frames
        let tc = Timecode::from_duration(Duration::from_millis(1999), 25.0);
        assert_eq!(tc.frame(), 50);
        assert_eq!(tc.to_string(), "00:00:02:00");
    }

    #[test]
    fn drop_frame_skips_labels_each_minute() {
        let tc = Timecode::from_frame(1799, NTSC_30);
        assert!(tc.is_drop_frame());
        assert_eq!(tc.to_string(), "00:00:59;29");

        let tc = Timecode::from_frame(1800, NTSC_30);
        assert_eq!(tc.to_string(), "00:01:00;02");
    }

    #[test]
    fn drop_frame_keeps_tenth_minute() {
        let tc = Timecode::from_frame(17982, 29.97);
        assert_eq!(tc.to_string(), "00:10:00;00");
    }

    #[test]
    fn drop_frame_at_59_94() {
        let tc = Timecode::from_frame(3600, 59.94);
        assert_eq!(tc.to_string(), "00:01:00;04");
    }

    #[test]
    fn degenerate_rate_is_frame_zero() {
        let tc = Timecode::from_duration(Duration::from_secs(10), 0.0);
        assert_eq!(tc.frame(), 0);
        assert_eq!(tc.to_string(), "00:00:00:00");
    }
}

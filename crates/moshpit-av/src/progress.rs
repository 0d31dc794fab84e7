//! Progress parsing for ffmpeg runs.
//!
//! ffmpeg announces the input duration on stderr (`Duration: HH:MM:SS.ff`)
//! and, with `-progress`, writes `key=value` blocks to the progress pipe.
//! [`ProgressTracker`] turns the two into a single 0..1 value.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::{Error, Result};

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Duration: (\d+):(\d+):(\d+)(?:\.(\d+))?").expect("valid duration regex")
});

/// Despite the name, ffmpeg reports `out_time_ms` in microseconds.
const OUT_TIME_KEY: &str = "out_time_ms=";

/// Tracks the reference duration of a run and maps elapsed output time onto it.
#[derive(Debug, Default, Clone)]
pub struct ProgressTracker {
    duration: Option<Duration>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Input duration, once a diagnostic line has declared it.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Inspect a diagnostic (stderr) line.
    ///
    /// Only the first duration declaration counts; later ones belong to
    /// secondary inputs and are ignored.
    pub fn on_diagnostic(&mut self, line: &str) -> Result<()> {
        if self.duration.is_some() {
            return Ok(());
        }
        if let Some(duration) = parse_duration(line)? {
            tracing::debug!(?duration, "input duration");
            self.duration = Some(duration);
        }
        Ok(())
    }

    /// Inspect a progress-pipe line, returning a progress value if the line
    /// carried elapsed output time.
    ///
    /// # Errors
    ///
    /// - [`Error::DurationUnknown`] if elapsed time arrives before the duration.
    /// - [`Error::ParseError`] if the elapsed time is not an integer.
    pub fn on_progress(&mut self, line: &str) -> Result<Option<f64>> {
        let Some(value) = line.trim().strip_prefix(OUT_TIME_KEY) else {
            return Ok(None);
        };
        let duration = self.duration.ok_or(Error::DurationUnknown)?;

        let value = value.trim();
        if value == "N/A" {
            tracing::debug!("skipping unavailable output time");
            return Ok(None);
        }
        let micros: i64 = value
            .parse()
            .map_err(|e| Error::parse_error("ffmpeg", format!("invalid output time {value:?}: {e}")))?;

        Ok(Some(fraction(micros.max(0) as u64, duration)))
    }
}

fn fraction(elapsed_micros: u64, duration: Duration) -> f64 {
    let total = duration.as_micros();
    if total == 0 {
        return 1.0;
    }
    // ffmpeg's declared duration is approximate, so elapsed time can overshoot.
    (elapsed_micros as f64 / total as f64).min(1.0)
}

/// Parse a `Duration: HH:MM:SS.ff` declaration out of a diagnostic line.
///
/// The digits after the dot are a decimal fraction of a second, so `.5` and
/// `.50` both mean half a second.
pub fn parse_duration(line: &str) -> Result<Option<Duration>> {
    let Some(caps) = DURATION_RE.captures(line) else {
        return Ok(None);
    };

    let field = |i: usize| -> Result<u64> {
        caps[i]
            .parse()
            .map_err(|e| Error::parse_error("ffmpeg", format!("invalid duration value {:?}: {e}", &caps[0])))
    };
    let (hours, minutes, seconds) = (field(1)?, field(2)?, field(3)?);
    let secs = hours
        .checked_mul(3600)
        .and_then(|s| s.checked_add(minutes.checked_mul(60)?))
        .and_then(|s| s.checked_add(seconds))
        .ok_or_else(|| Error::parse_error("ffmpeg", format!("duration out of range: {:?}", &caps[0])))?;

    let fraction = match caps.get(4) {
        Some(digits) => format!("0.{}", digits.as_str())
            .parse::<f64>()
            .map_err(|e| Error::parse_error("ffmpeg", format!("invalid duration value {:?}: {e}", &caps[0])))?,
        None => 0.0,
    };

    Ok(Some(Duration::from_secs(secs) + Duration::from_secs_f64(fraction)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DURATION_LINE: &str =
        "  Duration: 00:01:30.50, start: 0.000000, bitrate: 1205 kb/s";

    #[test]
    fn test_parse_duration_fraction() {
        let d = parse_duration(DURATION_LINE).unwrap().unwrap();
        assert_eq!(d, Duration::from_millis(90_500));
    }

    #[test]
    fn test_parse_duration_without_fraction() {
        let d = parse_duration("Duration: 01:00:02").unwrap().unwrap();
        assert_eq!(d, Duration::from_secs(3602));
    }

    #[test]
    fn test_parse_duration_unrelated_line() {
        assert!(parse_duration("Stream #0:0: Video: h264").unwrap().is_none());
        assert!(parse_duration("Duration: N/A, bitrate: N/A").unwrap().is_none());
    }

    #[test]
    fn test_progress_before_duration_is_fatal() {
        let mut tracker = ProgressTracker::new();
        let err = tracker.on_progress("out_time_ms=1000000").unwrap_err();
        assert!(matches!(err, Error::DurationUnknown));
    }

    #[test]
    fn test_progress_fraction() {
        let mut tracker = ProgressTracker::new();
        tracker.on_diagnostic("Duration: 00:00:10.00, start: 0").unwrap();
        assert_eq!(tracker.on_progress("out_time_ms=5000000").unwrap(), Some(0.5));
        assert_eq!(tracker.on_progress("frame=12").unwrap(), None);
    }

    #[test]
    fn test_progress_clamped() {
        let mut tracker = ProgressTracker::new();
        tracker.on_diagnostic("Duration: 00:00:01.00").unwrap();
        assert_eq!(tracker.on_progress("out_time_ms=1500000").unwrap(), Some(1.0));
    }

    #[test]
    fn test_first_duration_wins() {
        let mut tracker = ProgressTracker::new();
        tracker.on_diagnostic("Duration: 00:00:10.00").unwrap();
        tracker.on_diagnostic("Duration: 00:00:20.00").unwrap();
        assert_eq!(tracker.duration(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_unavailable_and_negative_times() {
        let mut tracker = ProgressTracker::new();
        tracker.on_diagnostic("Duration: 00:00:10.00").unwrap();
        assert_eq!(tracker.on_progress("out_time_ms=N/A").unwrap(), None);
        assert_eq!(tracker.on_progress("out_time_ms=-23220").unwrap(), Some(0.0));
        assert!(matches!(
            tracker.on_progress("out_time_ms=12x"),
            Err(Error::ParseError { .. })
        ));
    }

    #[test]
    fn test_zero_duration_reports_complete() {
        let mut tracker = ProgressTracker::new();
        tracker.on_diagnostic("Duration: 00:00:00.00").unwrap();
        assert_eq!(tracker.on_progress("out_time_ms=40000").unwrap(), Some(1.0));
    }
}

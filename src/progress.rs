//! Progress reporting as throttled log lines.

use std::time::{Duration, Instant};

use moshpit_av::FfmpegRun;
use moshpit_avi::{MoshSummary, MoshTask};

/// Minimum time between two progress lines for the same step.
const REPORT_INTERVAL: Duration = Duration::from_secs(2);

/// Logs a step's progress at most once per interval.
#[derive(Debug)]
pub struct ProgressReporter {
    step: String,
    interval: Duration,
    last_report: Option<Instant>,
    last_percent: Option<u32>,
}

impl ProgressReporter {
    pub fn new(step: impl Into<String>) -> Self {
        Self::with_interval(step, REPORT_INTERVAL)
    }

    pub fn with_interval(step: impl Into<String>, interval: Duration) -> Self {
        Self {
            step: step.into(),
            interval,
            last_report: None,
            last_percent: None,
        }
    }

    /// Record a progress value in `0.0..=1.0`, returning the percentage if a
    /// line was logged.
    ///
    /// The first value and completion are always logged; anything else only
    /// after the interval has passed, and never the same percentage twice.
    pub fn update(&mut self, fraction: f64) -> Option<u32> {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0).floor() as u32;
        if self.last_percent == Some(percent) {
            return None;
        }
        let due = match self.last_report {
            None => true,
            Some(at) => percent == 100 || at.elapsed() >= self.interval,
        };
        if !due {
            return None;
        }

        tracing::info!("{} {percent}%", self.step);
        self.last_report = Some(Instant::now());
        self.last_percent = Some(percent);
        Some(percent)
    }

    /// Whether the interval has passed since the last line, restarting it if so.
    pub fn tick(&mut self) -> bool {
        let due = self
            .last_report
            .map_or(true, |at| at.elapsed() >= self.interval);
        if due {
            self.last_report = Some(Instant::now());
        }
        due
    }

    pub fn step(&self) -> &str {
        &self.step
    }
}

/// Drain an ffmpeg run's progress into `reporter` and wait for its outcome.
pub async fn track_run(run: FfmpegRun, reporter: &mut ProgressReporter) -> moshpit_av::Result<()> {
    let FfmpegRun {
        mut progress,
        handle,
    } = run;
    while let Some(value) = progress.recv().await {
        reporter.update(value);
    }
    handle.await?
}

/// Drain a frame-removal pass, logging the frame it has reached.
pub async fn track_mosh(
    task: MoshTask,
    reporter: &mut ProgressReporter,
) -> moshpit_avi::Result<MoshSummary> {
    let MoshTask {
        mut processed,
        handle,
    } = task;
    while let Some(index) = processed.recv().await {
        if reporter.tick() {
            tracing::info!("{} frame {index}", reporter.step());
        }
    }
    handle.await?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_and_last_values_always_reported() {
        let mut reporter = ProgressReporter::with_interval("step", Duration::from_secs(3600));
        assert_eq!(reporter.update(0.0), Some(0));
        assert_eq!(reporter.update(0.5), None);
        assert_eq!(reporter.update(1.0), Some(100));
        assert_eq!(reporter.update(1.0), None);
    }

    #[test]
    fn zero_interval_reports_each_new_percentage() {
        let mut reporter = ProgressReporter::with_interval("step", Duration::ZERO);
        assert_eq!(reporter.update(0.25), Some(25));
        assert_eq!(reporter.update(0.251), None);
        assert_eq!(reporter.update(0.5), Some(50));
    }

    #[test]
    fn tick_is_throttled() {
        let mut reporter = ProgressReporter::with_interval("step", Duration::from_secs(3600));
        assert!(reporter.tick());
        assert!(!reporter.tick());
    }
}

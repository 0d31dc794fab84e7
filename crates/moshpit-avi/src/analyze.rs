//! Frame-type analysis.

use std::io::Read;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::frame::{classify, FrameType};
use crate::scanner::FrameScanner;
use crate::{Error, Result};

/// Classify every record of `input` in stream order.
pub fn analyze_frames<R: Read>(input: R) -> impl Iterator<Item = Result<FrameType>> {
    FrameScanner::new(input).map(|record| record.map(|r| classify(&r)))
}

/// Tally of frame types seen in a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub reference: u64,
    pub predicted: u64,
    pub unknown: u64,
}

impl FrameStats {
    /// Count one more frame of the given type.
    pub fn record(&mut self, frame_type: FrameType) {
        match frame_type {
            FrameType::Reference => self.reference += 1,
            FrameType::Predicted => self.predicted += 1,
            FrameType::Unknown => self.unknown += 1,
        }
    }

    /// Total records counted.
    pub fn total(&self) -> u64 {
        self.reference + self.predicted + self.unknown
    }
}

impl FromIterator<FrameType> for FrameStats {
    fn from_iter<I: IntoIterator<Item = FrameType>>(iter: I) -> Self {
        let mut stats = Self::default();
        for t in iter {
            stats.record(t);
        }
        stats
    }
}

/// Handle to an analysis running on a blocking task.
pub struct AnalyzeTask {
    /// Frame types in stream order.
    pub frames: mpsc::Receiver<FrameType>,
    /// Resolves once with the final tally.
    pub handle: JoinHandle<Result<FrameStats>>,
}

/// Run [`analyze_frames`] on a blocking task, streaming each frame type.
pub fn spawn_analyze_frames<R>(input: R, cancel: CancellationToken) -> AnalyzeTask
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);

    let handle = tokio::task::spawn_blocking(move || {
        let mut stats = FrameStats::default();
        let mut consumer_gone = false;
        for frame_type in analyze_frames(input) {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let frame_type = frame_type?;
            stats.record(frame_type);
            if !consumer_gone && tx.blocking_send(frame_type).is_err() {
                consumer_gone = true;
            }
        }
        tracing::debug!(?stats, "frame analysis finished");
        Ok(stats)
    });

    AnalyzeTask {
        frames: rx,
        handle,
    }
}

//! Keyframe removal.
//!
//! Removing a frame and repeating the next surviving frame in its place keeps
//! the container's frame count and timing intact while the decoder loses the
//! picture the removed frame anchored. Predicted frames after the cut are then
//! drawn on top of whatever was on screen before it.

use std::collections::BTreeSet;
use std::io::{BufWriter, Read, Write};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::frame::classify;
use crate::scanner::FrameScanner;
use crate::{Error, Result};

/// Outcome of a frame-removal pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoshSummary {
    /// Records copied verbatim ahead of the first reference frame.
    pub header_records: u64,
    /// Indexed frames read from the input.
    pub frames_read: u64,
    /// Indexed frame records written, duplicates included.
    pub frames_written: u64,
    /// Frames dropped from the output.
    pub frames_removed: u64,
    /// Removals left without a following frame to repeat.
    pub undrained: u64,
    /// Requested indices the stream never reached.
    pub unreached: Vec<u64>,
}

/// Copy `input` to `output`, dropping the frames at the given indices and
/// repeating the next kept frame once for every frame dropped before it.
///
/// Frame index 0 is the first reference frame; records ahead of it are copied
/// unindexed, so requested indices can never address them. `on_processed` is
/// called with each index once that frame has been handled; an error from it
/// aborts the pass.
///
/// When the last frames of the stream are removed there is nothing left to
/// repeat, and the output ends short by that many frames.
pub fn remove_frames<R, W, F>(
    input: R,
    output: W,
    frames: &BTreeSet<u64>,
    mut on_processed: F,
) -> Result<MoshSummary>
where
    R: Read,
    W: Write,
    F: FnMut(u64) -> Result<()>,
{
    let mut scanner = FrameScanner::new(input);
    let mut out = BufWriter::new(output);
    let mut summary = MoshSummary::default();

    let mut next_index: Option<u64> = None;
    let mut duplicate: u64 = 0;

    while let Some(record) = scanner.next_frame()? {
        let index = match next_index {
            Some(i) => i,
            None if classify(&record).is_reference() => {
                tracing::debug!(
                    header_records = summary.header_records,
                    "found first reference frame"
                );
                0
            }
            None => {
                out.write_all(&record)?;
                summary.header_records += 1;
                continue;
            }
        };
        next_index = Some(index + 1);
        summary.frames_read += 1;

        if frames.contains(&index) {
            tracing::trace!(index, "removing frame");
            duplicate += 1;
            summary.frames_removed += 1;
        } else {
            for _ in 0..=duplicate {
                out.write_all(&record)?;
            }
            summary.frames_written += duplicate + 1;
            duplicate = 0;
        }

        on_processed(index)?;
    }
    out.flush()?;

    summary.undrained = duplicate;
    summary.unreached = frames
        .range(summary.frames_read..)
        .copied()
        .collect();

    if summary.undrained > 0 {
        tracing::warn!(
            undrained = summary.undrained,
            "trailing frames removed with no following frame to repeat"
        );
    }
    if !summary.unreached.is_empty() {
        tracing::warn!(
            unreached = ?summary.unreached,
            frames_read = summary.frames_read,
            "requested frames lie beyond the end of the stream"
        );
    }

    Ok(summary)
}

/// Handle to a frame-removal pass running on a blocking task.
pub struct MoshTask {
    /// Indices of frames as they are handled, in stream order.
    pub processed: mpsc::Receiver<u64>,
    /// Resolves once with the pass's outcome.
    pub handle: JoinHandle<Result<MoshSummary>>,
}

impl MoshTask {
    /// Wait for the pass to finish, discarding progress.
    pub async fn finish(mut self) -> Result<MoshSummary> {
        while self.processed.recv().await.is_some() {}
        self.handle.await?
    }
}

/// Run [`remove_frames`] on a blocking task.
///
/// Processed indices are delivered through a capacity-1 channel, so a slow
/// consumer stalls the pass. Cancellation is checked after every indexed frame
/// and ends the pass with [`Error::Cancelled`].
pub fn spawn_remove_frames<R, W>(
    input: R,
    output: W,
    frames: BTreeSet<u64>,
    cancel: CancellationToken,
) -> MoshTask
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);

    let handle = tokio::task::spawn_blocking(move || {
        tracing::info!(frames = frames.len(), "removing frames");
        let mut consumer_gone = false;
        let summary = remove_frames(input, output, &frames, |index| {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if !consumer_gone && tx.blocking_send(index).is_err() {
                tracing::debug!("progress receiver dropped");
                consumer_gone = true;
            }
            Ok(())
        })?;
        tracing::info!(
            removed = summary.frames_removed,
            written = summary.frames_written,
            "frame removal finished"
        );
        Ok(summary)
    });

    MoshTask {
        processed: rx,
        handle,
    }
}

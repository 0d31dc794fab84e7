//! Scene change detection.
//!
//! ffmpeg's `select` filter passes only frames whose scene score reaches the
//! threshold, and `showinfo` prints a line with the timestamp of each one.
//! Timestamps are resolved to frame indices with the rate ffmpeg reports for
//! the first stream.

use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use moshpit_common::{Threshold, VideoTime};
use regex::Regex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::ffmpeg::Ffmpeg;
use crate::{Error, Result};

static FPS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Stream #0:0.*? ([0-9.]+) fps").expect("valid fps regex")
});

static SHOWINFO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Parsed_showinfo_\d+.*\bpts_time:\s*(\S*)").expect("valid showinfo regex")
});

/// Extracts scene changes from ffmpeg's diagnostic output.
#[derive(Debug, Default, Clone)]
pub struct SceneParser {
    fps: Option<f64>,
}

impl SceneParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame rate of the first stream, once reported.
    pub fn fps(&self) -> Option<f64> {
        self.fps
    }

    /// Inspect one diagnostic line, returning the scene change it reports.
    ///
    /// The first frame rate seen is kept for the rest of the run.
    ///
    /// # Errors
    ///
    /// - [`Error::FrameRateUnknown`] if a scene timestamp precedes the frame rate.
    /// - [`Error::ParseError`] if a matched value is not a usable number, which
    ///   includes a negative or missing scene timestamp.
    pub fn parse_line(&mut self, line: &str) -> Result<Option<VideoTime>> {
        if self.fps.is_none() {
            if let Some(caps) = FPS_RE.captures(line) {
                let fps: f64 = caps[1]
                    .parse()
                    .map_err(|e| Error::parse_error("ffmpeg", format!("invalid fps value {:?}: {e}", &caps[1])))?;
                if !fps.is_finite() || fps <= 0.0 {
                    return Err(Error::parse_error("ffmpeg", format!("invalid fps value {fps}")));
                }
                tracing::debug!(fps, "stream frame rate");
                self.fps = Some(fps);
            }
        }

        let Some(caps) = SHOWINFO_RE.captures(line) else {
            return Ok(None);
        };
        let fps = self.fps.ok_or(Error::FrameRateUnknown)?;
        let seconds: f64 = caps[1]
            .parse()
            .map_err(|e| Error::parse_error("ffmpeg", format!("invalid timestamp value {:?}: {e}", &caps[1])))?;
        let time = Duration::try_from_secs_f64(seconds)
            .map_err(|e| Error::parse_error("ffmpeg", format!("invalid timestamp value {seconds}: {e}")))?;

        Ok(Some(VideoTime::new(time, fps)))
    }
}

/// Arguments for a detection pass over `input`: no output file, only the
/// filter's diagnostics.
pub fn scene_args(input: &Path, threshold: Threshold) -> Vec<String> {
    vec![
        "-i".into(),
        input.to_string_lossy().into_owned(),
        "-filter:v".into(),
        format!("select='gte(scene,{:.6})',showinfo", threshold.value()),
        "-f".into(),
        "null".into(),
        "-".into(),
    ]
}

/// A detection pass started with [`find_scenes`].
///
/// `scenes` and `progress` must be drained together; either one filling up
/// stalls the pass.
pub struct SceneSearch {
    /// Scene changes in stream order.
    pub scenes: mpsc::Receiver<VideoTime>,
    /// Progress values in `0.0..=1.0`.
    pub progress: mpsc::Receiver<f64>,
    /// Resolves once with the number of scene changes found.
    pub handle: JoinHandle<Result<u64>>,
}

impl SceneSearch {
    /// Collect every scene change, discarding progress.
    pub async fn collect(mut self) -> Result<Vec<VideoTime>> {
        let mut scenes = Vec::new();
        let mut progress_open = true;
        loop {
            tokio::select! {
                scene = self.scenes.recv() => match scene {
                    Some(scene) => scenes.push(scene),
                    None => break,
                },
                p = self.progress.recv(), if progress_open => {
                    progress_open = p.is_some();
                }
            }
        }
        drop(self.progress);
        self.handle.await??;
        Ok(scenes)
    }
}

/// Find scene changes in `input` whose score reaches `threshold`.
///
/// # Errors
///
/// Returns a validation error without starting ffmpeg if `threshold` lies
/// outside `[0, 1]`. Failures of the pass itself arrive through
/// [`SceneSearch::handle`].
pub fn find_scenes(
    ffmpeg: &Ffmpeg,
    input: impl AsRef<Path>,
    threshold: f64,
    cancel: CancellationToken,
) -> Result<SceneSearch> {
    let threshold = Threshold::new(threshold)?;
    let args = scene_args(input.as_ref(), threshold);
    tracing::info!(input = ?input.as_ref(), %threshold, "detecting scenes");

    let (lines_tx, mut lines_rx) = mpsc::channel::<String>(1);
    let (scenes_tx, scenes_rx) = mpsc::channel(1);

    // Cancelled on a parse error so the ffmpeg run stops with it.
    let run_cancel = cancel.child_token();
    let run = ffmpeg.spawn_with_lines(args, lines_tx, run_cancel.clone());
    let progress = run.progress;
    let run_handle = run.handle;

    let handle = tokio::spawn(async move {
        let mut parser = SceneParser::new();
        let mut scenes_tx = Some(scenes_tx);
        let mut found = 0u64;

        let parsed: Result<()> = async {
            while let Some(line) = lines_rx.recv().await {
                let Some(scene) = parser.parse_line(&line)? else {
                    continue;
                };
                found += 1;
                tracing::debug!(frame = scene.frame, timecode = scene.timecode(), "scene change");
                if let Some(tx) = scenes_tx.as_ref() {
                    let closed = tokio::select! {
                        _ = cancel.cancelled() => return Err(Error::Cancelled),
                        sent = tx.send(scene) => sent.is_err(),
                    };
                    if closed {
                        scenes_tx = None;
                    }
                }
            }
            Ok(())
        }
        .await;

        if let Err(err) = parsed {
            run_cancel.cancel();
            drop(lines_rx);
            if let Err(run_err) = run_handle.await? {
                tracing::debug!(error = %run_err, "ffmpeg stopped after scene parse failure");
            }
            return Err(err);
        }

        run_handle.await??;
        tracing::info!(scenes = found, "scene detection finished");
        Ok(found)
    });

    Ok(SceneSearch {
        scenes: scenes_rx,
        progress,
        handle,
    })
}

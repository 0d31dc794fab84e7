use crate::config::Config;
use crate::pipeline::{FrameSelection, Workspace};
use crate::progress::{track_mosh, track_run, ProgressReporter};
use anyhow::{Context, Result};
use moshpit_av::{convert_to_avi, convert_to_mp4, find_scenes, AviConversion, Ffmpeg, Mp4Conversion, SceneSearch};
use moshpit_avi::{spawn_remove_frames, MoshSummary};
use moshpit_common::{Quality, Threshold, VideoTime};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Everything needed to mosh one file.
#[derive(Debug, Clone)]
pub struct MoshRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub frames: FrameSelection,
    /// Scene threshold used when `frames` selects every scene change.
    pub threshold: Threshold,
    pub intermediate_quality: Quality,
    pub output_quality: Quality,
    pub keep_audio: bool,
    pub audio_bitrate: String,
}

impl MoshRequest {
    /// Build a request with settings taken from `config`.
    pub fn from_config(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        frames: FrameSelection,
        config: &Config,
    ) -> Result<Self> {
        Ok(Self {
            input: input.into(),
            output: output.into(),
            frames,
            threshold: Threshold::new(config.scenes.threshold)?,
            intermediate_quality: Quality::new(config.mosh.intermediate_quality)?,
            output_quality: Quality::new(config.mosh.output_quality)?,
            keep_audio: config.mosh.keep_audio,
            audio_bitrate: config.mosh.audio_bitrate.clone(),
        })
    }

    /// Check the request without touching ffmpeg.
    pub fn validate(&self) -> Result<()> {
        let is_mp4 = self
            .output
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("mp4"));
        if !is_mp4 {
            anyhow::bail!("Output file must have the .mp4 extension: {:?}", self.output);
        }

        if !self.input.is_file() {
            anyhow::bail!("Input file does not exist: {:?}", self.input);
        }

        if same_file(&self.input, &self.output) {
            anyhow::bail!("Output file would overwrite the input: {:?}", self.output);
        }

        if self.keep_audio && self.audio_bitrate.trim().is_empty() {
            anyhow::bail!("Audio bitrate cannot be empty");
        }

        Ok(())
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Detect scene changes in `input`, calling `on_scene` for each as it is found.
pub async fn detect_scenes(
    ffmpeg: &Ffmpeg,
    input: &Path,
    threshold: Threshold,
    cancel: CancellationToken,
    mut on_scene: impl FnMut(&VideoTime),
) -> Result<Vec<VideoTime>> {
    let SceneSearch {
        mut scenes,
        mut progress,
        handle,
    } = find_scenes(ffmpeg, input, threshold.value(), cancel)?;

    let mut reporter = ProgressReporter::new("Detecting scene changes...");
    let mut found = Vec::new();
    let mut progress_open = true;
    loop {
        tokio::select! {
            scene = scenes.recv() => match scene {
                Some(scene) => {
                    on_scene(&scene);
                    found.push(scene);
                }
                None => break,
            },
            value = progress.recv(), if progress_open => match value {
                Some(value) => {
                    reporter.update(value);
                }
                None => progress_open = false,
            },
        }
    }
    drop(progress);

    handle
        .await?
        .context("Scene detection failed")?;

    tracing::info!("Found {} scene changes", found.len());
    if found.is_empty() {
        tracing::info!("Try using a lower threshold value");
    }
    Ok(found)
}

/// Run the three mosh steps, removing the output file if any of them fails.
pub async fn run_mosh(
    ffmpeg: &Ffmpeg,
    request: &MoshRequest,
    cancel: CancellationToken,
) -> Result<MoshSummary> {
    request.validate()?;

    let started = Instant::now();
    let result = execute(ffmpeg, request, &cancel).await;

    match &result {
        Ok(summary) => {
            tracing::info!(
                removed = summary.frames_removed,
                written = summary.frames_written,
                "Moshing took {:.1?}",
                started.elapsed()
            );
        }
        Err(e) => {
            tracing::error!("Mosh failed after {:.1?}: {:#}", started.elapsed(), e);
            discard_output(&request.output).await;
        }
    }

    result
}

async fn discard_output(output: &Path) {
    match tokio::fs::remove_file(output).await {
        Ok(()) => tracing::info!("Removed partial output {:?}", output),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove partial output {:?}: {}", output, e),
    }
}

async fn execute(
    ffmpeg: &Ffmpeg,
    request: &MoshRequest,
    cancel: &CancellationToken,
) -> Result<MoshSummary> {
    let frames = match &request.frames {
        FrameSelection::Indices(frames) => frames.clone(),
        FrameSelection::AllScenes => {
            let scenes =
                detect_scenes(ffmpeg, &request.input, request.threshold, cancel.clone(), |_| {})
                    .await?;
            let frames: BTreeSet<u64> = scenes.iter().map(|s| s.frame).collect();
            if frames.is_empty() {
                anyhow::bail!("Option \"all\": no scene changes were found");
            }
            frames
        }
    };
    tracing::info!("Moshing {} frames of {:?}", frames.len(), request.input);

    let workspace = Workspace::new()?;
    let intermediate = workspace.intermediate();
    let moshed = workspace.moshed();

    let conversion = AviConversion::new(&request.input, &intermediate, request.intermediate_quality)
        .with_keyframes(frames.iter().copied().collect());
    let mut reporter = ProgressReporter::new("[1/3] Writing moshable file...");
    track_run(convert_to_avi(ffmpeg, &conversion, cancel.clone())?, &mut reporter)
        .await
        .context("Error writing AVI file")?;
    tracing::info!("[1/3] Wrote AVI file for moshing");

    let reader = std::fs::File::open(&intermediate)
        .with_context(|| format!("Could not open AVI file for moshing: {:?}", intermediate))?;
    let writer = std::fs::File::create(&moshed)
        .with_context(|| format!("Could not create moshed AVI file: {:?}", moshed))?;
    let mut reporter = ProgressReporter::new("[2/3] Moshing AVI file...");
    let summary = track_mosh(
        spawn_remove_frames(reader, writer, frames, cancel.clone()),
        &mut reporter,
    )
    .await
    .context("Error moshing AVI file")?;
    tracing::info!(
        header_records = summary.header_records,
        frames = summary.frames_read,
        removed = summary.frames_removed,
        "[2/3] Moshed AVI file"
    );

    let mut conversion = Mp4Conversion::new(&moshed, &request.output, request.output_quality)
        .with_audio_bitrate(request.audio_bitrate.clone());
    if request.keep_audio {
        conversion = conversion.with_audio(&request.input);
    }
    let mut reporter = ProgressReporter::new("[3/3] Baking output file...");
    track_run(convert_to_mp4(ffmpeg, &conversion, cancel.clone())?, &mut reporter)
        .await
        .context("Error writing output file")?;
    tracing::info!("[3/3] Baked output file {:?}", request.output);

    Ok(summary)
}

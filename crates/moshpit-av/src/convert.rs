//! ffmpeg conversions in and out of the moshable AVI format.
//!
//! The AVI leg strips audio, whose chunks would otherwise interleave with the
//! video frames, and optionally pins keyframes to chosen frame indices so the
//! frames to be removed are reference frames. The MP4 leg re-encodes the
//! moshed video, optionally muxing the audio of the original file back in.

use std::path::{Path, PathBuf};

use moshpit_common::Quality;
use tokio_util::sync::CancellationToken;

use crate::ffmpeg::{Ffmpeg, FfmpegRun};
use crate::{Error, Result};

/// Audio bitrate used when none is given.
pub const DEFAULT_AUDIO_BITRATE: &str = "320k";

/// Source to intermediate AVI.
#[derive(Debug, Clone)]
pub struct AviConversion {
    pub input: PathBuf,
    pub output: PathBuf,
    pub quality: Quality,
    /// Frame indices to place keyframes at. `None` leaves keyframe placement
    /// to the encoder.
    pub keyframes: Option<Vec<u64>>,
}

impl AviConversion {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, quality: Quality) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            quality,
            keyframes: None,
        }
    }

    /// Disable automatic keyframes and place them at `frames` instead.
    ///
    /// An empty list keeps automatic placement.
    pub fn with_keyframes(mut self, frames: Vec<u64>) -> Self {
        self.keyframes = if frames.is_empty() { None } else { Some(frames) };
        self
    }
}

/// Moshed AVI to final MP4.
#[derive(Debug, Clone)]
pub struct Mp4Conversion {
    pub input: PathBuf,
    pub output: PathBuf,
    pub quality: Quality,
    /// File whose first audio stream is muxed into the output, if any.
    pub audio: Option<PathBuf>,
    pub audio_bitrate: String,
}

impl Mp4Conversion {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, quality: Quality) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            quality,
            audio: None,
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
        }
    }

    /// Take the audio track from `source`. Sources without audio are accepted.
    pub fn with_audio(mut self, source: impl Into<PathBuf>) -> Self {
        self.audio = Some(source.into());
        self
    }

    pub fn with_audio_bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.audio_bitrate = bitrate.into();
        self
    }
}

fn require_extension(path: &Path, extension: &str) -> Result<()> {
    let matches = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension));
    if matches {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "output file must have the .{extension} extension: {}",
            path.display()
        )))
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// `force_key_frames` expression matching exactly the given frame indices.
fn keyframe_expr(frames: &[u64]) -> String {
    let terms: Vec<String> = frames.iter().map(|f| format!("eq(n,{f})")).collect();
    format!("expr:{}", terms.join("+"))
}

/// ffmpeg arguments for an [`AviConversion`].
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] unless the output ends in `.avi`.
pub fn avi_args(conversion: &AviConversion) -> Result<Vec<String>> {
    require_extension(&conversion.output, "avi")?;

    let mut args = vec![
        "-i".to_string(),
        path_arg(&conversion.input),
        "-an".to_string(),
        "-q".to_string(),
        conversion.quality.quantizer().to_string(),
        "-y".to_string(),
    ];

    if let Some(frames) = &conversion.keyframes {
        // Largest GOP size the encoder accepts, so only forced keyframes remain.
        args.extend(["-g".to_string(), i32::MAX.to_string()]);
        // mpeg4 rejects GOP sizes above 600 outside experimental mode.
        args.extend(["-strict".to_string(), "experimental".to_string()]);
        args.extend(["-force_key_frames".to_string(), keyframe_expr(frames)]);
    }

    args.push(path_arg(&conversion.output));
    Ok(args)
}

/// ffmpeg arguments for an [`Mp4Conversion`].
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] unless the output ends in `.mp4`, or if
/// audio is requested with an empty bitrate.
pub fn mp4_args(conversion: &Mp4Conversion) -> Result<Vec<String>> {
    require_extension(&conversion.output, "mp4")?;

    let mut args = vec!["-i".to_string(), path_arg(&conversion.input)];

    if let Some(audio) = &conversion.audio {
        if conversion.audio_bitrate.trim().is_empty() {
            return Err(Error::InvalidInput("audio bitrate must not be empty".into()));
        }
        args.extend(["-i".to_string(), path_arg(audio)]);
        // `?` tolerates an audio source without an audio stream.
        args.extend(["-map", "0:v:0", "-map", "1:a:0?"].map(String::from));
        args.extend([
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            conversion.audio_bitrate.clone(),
        ]);
    }

    args.extend([
        "-q".to_string(),
        conversion.quality.quantizer().to_string(),
        "-preset".to_string(),
        "ultrafast".to_string(),
        "-y".to_string(),
        path_arg(&conversion.output),
    ]);
    Ok(args)
}

/// Start converting to the intermediate AVI.
///
/// Arguments are validated before anything is spawned.
pub fn convert_to_avi(
    ffmpeg: &Ffmpeg,
    conversion: &AviConversion,
    cancel: CancellationToken,
) -> Result<FfmpegRun> {
    let args = avi_args(conversion)?;
    tracing::info!(
        input = ?conversion.input,
        output = ?conversion.output,
        quantizer = conversion.quality.quantizer(),
        keyframes = conversion.keyframes.as_ref().map_or(0, Vec::len),
        "converting to AVI"
    );
    Ok(ffmpeg.spawn(args, cancel))
}

/// Start converting a moshed AVI to the final MP4.
///
/// Arguments are validated before anything is spawned.
pub fn convert_to_mp4(
    ffmpeg: &Ffmpeg,
    conversion: &Mp4Conversion,
    cancel: CancellationToken,
) -> Result<FfmpegRun> {
    let args = mp4_args(conversion)?;
    tracing::info!(
        input = ?conversion.input,
        output = ?conversion.output,
        audio = ?conversion.audio,
        quantizer = conversion.quality.quantizer(),
        "converting to MP4"
    );
    Ok(ffmpeg.spawn(args, cancel))
}

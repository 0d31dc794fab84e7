//! Locating ffmpeg.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Executable name searched for on `PATH`.
pub const FFMPEG: &str = "ffmpeg";

/// An ffmpeg that answered `-version`.
#[derive(Debug, Clone)]
pub struct FfmpegInfo {
    pub path: PathBuf,
    /// Release named in the banner, e.g. `6.1.1` or `n7.0-12-g1a2b3c`.
    pub version: Option<String>,
}

/// Resolve the ffmpeg executable: `configured` if it exists, otherwise a
/// `PATH` lookup.
///
/// # Errors
///
/// Returns [`Error::ToolNotFound`] if neither yields an executable.
pub fn ffmpeg_path(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        tracing::warn!(?path, "configured ffmpeg does not exist, searching PATH");
    }

    which::which(FFMPEG).map_err(|_| Error::tool_not_found(FFMPEG))
}

/// Locate ffmpeg and ask it which release it is.
///
/// # Example
///
/// ```no_run
/// let info = moshpit_av::check_ffmpeg(None)?;
/// println!("ffmpeg {:?} at {}", info.version, info.path.display());
/// # Ok::<(), moshpit_av::Error>(())
/// ```
///
/// # Errors
///
/// - [`Error::ToolNotFound`] if ffmpeg cannot be located.
/// - [`Error::ToolFailed`] if `-version` cannot be run or exits unsuccessfully.
pub fn check_ffmpeg(configured: Option<&Path>) -> Result<FfmpegInfo> {
    let path = ffmpeg_path(configured)?;
    let output = Command::new(&path)
        .arg("-version")
        .output()
        .map_err(|e| Error::tool_failed(FFMPEG, format!("failed to run -version: {e}")))?;
    if !output.status.success() {
        return Err(Error::tool_failed(
            FFMPEG,
            format!("-version exited with {}", output.status),
        ));
    }

    let version = banner_version(&String::from_utf8_lossy(&output.stdout));
    tracing::debug!(?path, ?version, "found ffmpeg");
    Ok(FfmpegInfo { path, version })
}

/// Release from the `ffmpeg version <release> Copyright ...` banner line.
fn banner_version(banner: &str) -> Option<String> {
    banner
        .lines()
        .next()?
        .strip_prefix("ffmpeg version ")?
        .split_whitespace()
        .next()
        .map(String::from)
}

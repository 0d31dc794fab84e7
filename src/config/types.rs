use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub scenes: ScenesConfig,

    #[serde(default)]
    pub mosh: MoshConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Path to the ffmpeg executable (searched on PATH if unset or missing)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LogConfig {
    /// Append ffmpeg's command lines and diagnostic output to this file
    #[serde(default)]
    pub ffmpeg_log: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenesConfig {
    /// Minimum scene score (0-1) for a frame to count as a scene change
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    0.3
}

impl Default for ScenesConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MoshConfig {
    /// Encoding quality (0-1) of the intermediate AVI
    #[serde(default = "default_quality")]
    pub intermediate_quality: f64,

    /// Encoding quality (0-1) of the final MP4
    #[serde(default = "default_quality")]
    pub output_quality: f64,

    /// Mux the source's audio track into the output
    #[serde(default = "default_true")]
    pub keep_audio: bool,

    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
}

fn default_quality() -> f64 {
    1.0
}
fn default_true() -> bool {
    true
}
fn default_audio_bitrate() -> String {
    moshpit_av::convert::DEFAULT_AUDIO_BITRATE.to_string()
}

impl Default for MoshConfig {
    fn default() -> Self {
        Self {
            intermediate_quality: default_quality(),
            output_quality: default_quality(),
            keep_audio: default_true(),
            audio_bitrate: default_audio_bitrate(),
        }
    }
}

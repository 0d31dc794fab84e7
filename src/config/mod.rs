mod types;

pub use types::*;

use anyhow::{Context, Result};
use moshpit_av::Ffmpeg;
use moshpit_common::{Quality, Threshold};
use std::path::{Path, PathBuf};

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    expand_paths(&mut config);

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = ["./moshpit.toml", "~/.config/moshpit/config.toml"];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}

fn expand_paths(config: &mut Config) {
    if let Some(path) = config.tools.ffmpeg_path.as_mut() {
        *path = expand_path(path);
    }
    if let Some(path) = config.log.ffmpeg_log.as_mut() {
        *path = expand_path(path);
    }
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    Threshold::new(config.scenes.threshold).context("Invalid [scenes] threshold")?;
    Quality::new(config.mosh.intermediate_quality)
        .context("Invalid [mosh] intermediate_quality")?;
    Quality::new(config.mosh.output_quality).context("Invalid [mosh] output_quality")?;

    if config.mosh.audio_bitrate.trim().is_empty() {
        anyhow::bail!("[mosh] audio_bitrate cannot be empty");
    }

    if let Some(path) = &config.tools.ffmpeg_path {
        if !expand_path(path).exists() {
            tracing::warn!("Configured ffmpeg path does not exist: {:?}", path);
        }
    }

    Ok(())
}

impl Config {
    /// Build the ffmpeg runner: an explicit path wins, then the configured
    /// path if it exists, then a PATH lookup.
    pub fn ffmpeg(&self, explicit: Option<&Path>) -> Result<Ffmpeg> {
        let program = match explicit {
            Some(path) => path.to_path_buf(),
            None => moshpit_av::ffmpeg_path(self.tools.ffmpeg_path.as_deref())
                .context("ffmpeg is required; install it or set [tools] ffmpeg_path")?,
        };
        tracing::debug!("Using ffmpeg at {:?}", program);

        let mut ffmpeg = Ffmpeg::new(program);
        if let Some(log) = &self.log.ffmpeg_log {
            ffmpeg = ffmpeg.with_log(log);
        }
        Ok(ffmpeg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.scenes.threshold, 0.3);
        assert_eq!(config.mosh.intermediate_quality, 1.0);
        assert_eq!(config.mosh.output_quality, 1.0);
        assert!(config.mosh.keep_audio);
        assert_eq!(config.mosh.audio_bitrate, "320k");
        assert!(config.tools.ffmpeg_path.is_none());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let file = write_config("[mosh]\nkeep_audio = false\n");
        let config = load_config(file.path()).unwrap();
        assert!(!config.mosh.keep_audio);
        assert_eq!(config.mosh.audio_bitrate, "320k");
        assert_eq!(config.scenes.threshold, 0.3);
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let file = write_config("[scenes]\nthreshold = 1.5\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("threshold"));
    }

    #[test]
    fn out_of_range_quality_rejected() {
        let file = write_config("[mosh]\noutput_quality = -0.1\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn empty_bitrate_rejected() {
        let file = write_config("[mosh]\naudio_bitrate = \"\"\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn tilde_paths_expanded() {
        let file = write_config("[log]\nffmpeg_log = \"~/moshpit-ffmpeg.log\"\n");
        let config = load_config(file.path()).unwrap();
        let log = config.log.ffmpeg_log.unwrap();
        assert!(!log.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn explicit_ffmpeg_used_as_is() {
        let mut config = Config::default();
        config.log.ffmpeg_log = Some(PathBuf::from("/tmp/ffmpeg.log"));
        let ffmpeg = config.ffmpeg(Some(Path::new("/opt/ffmpeg/bin/ffmpeg"))).unwrap();
        assert_eq!(ffmpeg.program(), Path::new("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(ffmpeg.log_path(), Some(Path::new("/tmp/ffmpeg.log")));
    }
}

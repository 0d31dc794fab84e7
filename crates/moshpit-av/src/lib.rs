//! # moshpit-av
//!
//! ffmpeg orchestration for the moshing pipeline.
//!
//! This crate provides functionality for:
//! - Running ffmpeg with a normalized, cancellable 0..1 progress signal
//!   ([`Ffmpeg`])
//! - Locating scene changes and resolving them to frame indices
//!   ([`find_scenes`])
//! - Building the two conversions the pipeline needs: source to moshable AVI
//!   ([`convert_to_avi`]) and moshed AVI back to MP4 ([`convert_to_mp4`])
//! - Locating ffmpeg and reading its version ([`check_ffmpeg`])
//!
//! Every long-running operation runs on its own task and reports through
//! capacity-1 channels, so a slow consumer applies backpressure all the way
//! to the ffmpeg pipes. The task's `JoinHandle` resolves exactly once with the
//! operation's outcome.
//!
//! ## Example
//!
//! ```no_run
//! use moshpit_av::{convert_to_avi, AviConversion, Ffmpeg};
//! use moshpit_common::Quality;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> moshpit_av::Result<()> {
//! let ffmpeg = Ffmpeg::new("ffmpeg");
//! let conversion = AviConversion::new("in.mp4", "out.avi", Quality::BEST)
//!     .with_keyframes(vec![120, 480]);
//! let mut run = convert_to_avi(&ffmpeg, &conversion, CancellationToken::new())?;
//! while let Some(progress) = run.progress.recv().await {
//!     println!("{:.0}%", progress * 100.0);
//! }
//! run.handle.await??;
//! # Ok(())
//! # }
//! ```

pub mod convert;
mod error;
pub mod ffmpeg;
pub mod progress;
pub mod scenes;
pub mod tools;

// Re-exports
pub use convert::{convert_to_avi, convert_to_mp4, AviConversion, Mp4Conversion};
pub use error::{Error, Result};
pub use ffmpeg::{inject_progress_args, Ffmpeg, FfmpegRun};
pub use progress::ProgressTracker;
pub use scenes::{find_scenes, SceneParser, SceneSearch};
pub use tools::{check_ffmpeg, ffmpeg_path, FfmpegInfo};

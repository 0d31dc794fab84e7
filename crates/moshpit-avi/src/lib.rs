//! Moshpit-AVI: frame-level editing of AVI streams
//!
//! This crate treats an AVI file as a flat sequence of frame records and
//! rewrites that sequence without decoding any video. It is the substrate the
//! datamosh effect is applied to.
//!
//! # Modules
//!
//! - `frame` - Record delimiter, frame-type prefixes, and classification
//! - `scanner` - Forward-only splitting of a byte stream into frame records
//! - `mosh` - Keyframe removal with duplication of the following frame
//! - `analyze` - Frame-type tallies for inspecting an intermediate file
//!
//! # Record layout
//!
//! Records are split on the `00dc` chunk id, which terminates each record:
//!
//! ```text
//! [size:4][payload ...]["00dc"]
//!          ^ offset 4: 00 00 01 B0 (reference) / 00 00 01 B6 (predicted)
//! ```
//!
//! Everything ahead of the first reference frame is container setup data and
//! passes through untouched.

pub mod analyze;
pub mod error;
pub mod frame;
pub mod mosh;
pub mod scanner;

pub use analyze::{analyze_frames, spawn_analyze_frames, AnalyzeTask, FrameStats};
pub use error::{Error, Result};
pub use frame::{classify, FrameType, FRAME_DELIMITER};
pub use mosh::{remove_frames, spawn_remove_frames, MoshSummary, MoshTask};
pub use scanner::{FrameScanner, MAX_FRAME_BYTES};

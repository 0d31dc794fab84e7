//! Moshpit-Common: Shared value types and validation.
//!
//! This crate provides the small vocabulary used across moshpit:
//!
//! - **Knobs**: [`Quality`] and [`Threshold`], unit-interval values checked at
//!   construction so invalid settings never reach an encoder invocation
//! - **Video time**: [`VideoTime`] and [`Timecode`], mapping an encoder
//!   timestamp onto a frame index for a given frame rate
//! - **Error Handling**: the validation error shared by the other crates
//!
//! # Examples
//!
//! ```
//! use moshpit_common::{Quality, VideoTime};
//! use std::time::Duration;
//!
//! let quality = Quality::new(0.5)?;
//! assert_eq!(quality.quantizer(), 16);
//!
//! let time = VideoTime::new(Duration::from_secs(2), 25.0);
//! assert_eq!(time.frame, 50);
//! assert_eq!(time.timecode(), "00:00:02:00");
//! # Ok::<(), moshpit_common::Error>(())
//! ```

pub mod error;
pub mod timecode;
pub mod types;

pub use error::{Error, Result};
pub use timecode::Timecode;
pub use types::*;

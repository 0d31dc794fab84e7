pub mod executor;
pub mod frames;
pub mod workspace;

pub use executor::{detect_scenes, run_mosh, MoshRequest};
pub use frames::{parse_frames, FrameSelection};
pub use workspace::Workspace;

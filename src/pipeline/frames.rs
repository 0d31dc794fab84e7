//! Parsing of the frame arguments given to `mosh`.

use std::collections::BTreeSet;

use anyhow::Result;

/// Keyword selecting every detected scene change.
pub const ALL_SCENES: &str = "all";

/// Which frames a mosh removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSelection {
    /// Every scene change found by scene detection.
    AllScenes,
    /// Explicit frame indices.
    Indices(BTreeSet<u64>),
}

/// Parse frame arguments: decimal indices, or `all` for every scene change.
///
/// Tokens that are neither are skipped with a warning. Fails if nothing
/// usable remains.
pub fn parse_frames<S: AsRef<str>>(tokens: &[S]) -> Result<FrameSelection> {
    let mut indices = BTreeSet::new();
    let mut all = false;

    for token in tokens {
        let token = token.as_ref().trim();
        if token.eq_ignore_ascii_case(ALL_SCENES) {
            all = true;
            continue;
        }
        match token.parse::<u64>() {
            Ok(index) => {
                indices.insert(index);
            }
            Err(_) => tracing::warn!("\"{token}\" is not a valid frame index, skipping"),
        }
    }

    if all {
        if !indices.is_empty() {
            tracing::debug!(
                "\"{ALL_SCENES}\" given, ignoring {} explicit indices",
                indices.len()
            );
        }
        return Ok(FrameSelection::AllScenes);
    }
    if indices.is_empty() {
        anyhow::bail!("No valid frames to mosh were specified");
    }
    Ok(FrameSelection::Indices(indices))
}

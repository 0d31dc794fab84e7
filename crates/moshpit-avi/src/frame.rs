//! Frame record constants and classification.

use std::fmt;

/// Chunk id terminating every video frame record (`00dc`).
pub const FRAME_DELIMITER: [u8; 4] = *b"00dc";

/// Start-code tail of a reference frame (`0x0001B0`).
pub const REFERENCE_PREFIX: [u8; 3] = [0x00, 0x01, 0xB0];

/// Start-code tail of a predicted frame (`0x0001B6`).
pub const PREDICTED_PREFIX: [u8; 3] = [0x00, 0x01, 0xB6];

/// Offset of the 3-byte prefix window within a record.
///
/// A record begins right after the previous delimiter with the 4-byte chunk
/// size; the payload start code `00 00 01 xx` follows, so its last three bytes
/// sit at offset 5.
pub const PREFIX_OFFSET: usize = 5;

/// Kind of frame held by a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameType {
    /// Not a recognisable video frame (headers, index data, truncated records).
    #[default]
    Unknown,
    /// Self-contained picture (I-frame).
    Reference,
    /// Delta against earlier pictures (P-frame).
    Predicted,
}

impl FrameType {
    /// Whether this is a reference frame.
    pub fn is_reference(self) -> bool {
        self == FrameType::Reference
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Reference => write!(f, "reference"),
            Self::Predicted => write!(f, "predicted"),
        }
    }
}

/// Classify a frame record by the prefix window at [`PREFIX_OFFSET`].
///
/// Records too short to contain the window are [`FrameType::Unknown`].
pub fn classify(record: &[u8]) -> FrameType {
    match record.get(PREFIX_OFFSET..PREFIX_OFFSET + REFERENCE_PREFIX.len()) {
        Some(window) if window == REFERENCE_PREFIX => FrameType::Reference,
        Some(window) if window == PREDICTED_PREFIX => FrameType::Predicted,
        _ => FrameType::Unknown,
    }
}

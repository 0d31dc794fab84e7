//! Shared helpers for integration tests.
//!
//! Integration tests never need a real ffmpeg: [`FakeFfmpeg`] writes a shell
//! script that plays back canned diagnostic and progress output. Tests that
//! spawn one are marked `#[serial]`, since executing a freshly written file
//! while another test forks can fail with ETXTBSY.

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use moshpit_avi::frame::{FRAME_DELIMITER, PREDICTED_PREFIX, REFERENCE_PREFIX};
use tempfile::TempDir;

/// Diagnostic line declaring a ten second input.
pub const DURATION_10S: &str =
    "  Duration: 00:00:10.00, start: 0.000000, bitrate: 1205 kb/s";

/// Diagnostic line declaring a 25 fps first stream.
pub const STREAM_25FPS: &str =
    "    Stream #0:0(und): Video: h264 (High), yuv420p, 1280x720, 2500 kb/s, 25 fps, 25 tbr, 12800 tbn";

/// A throwaway ffmpeg stand-in living in its own temporary directory.
pub struct FakeFfmpeg {
    dir: TempDir,
    path: PathBuf,
}

impl FakeFfmpeg {
    /// Write a `/bin/sh` script with the given body.
    pub fn new(body: &str) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("ffmpeg");
        let script = format!("#!/bin/sh\n{body}\n");
        std::fs::write(&path, script).expect("failed to write fake ffmpeg");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("failed to make fake ffmpeg executable");
        Self { dir, path }
    }

    /// A script that reports a ten second duration on stderr, then each of
    /// `out_times` (microseconds) on the progress pipe.
    pub fn with_progress(out_times: &[&str]) -> Self {
        let mut body = format!("echo '{DURATION_10S}' >&2\nsleep 0.2\n");
        for t in out_times {
            body.push_str(&format!("echo 'out_time_ms={t}'\n"));
        }
        body.push_str("echo 'progress=end'\n");
        Self::new(&body)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Where scripts that record their arguments write them.
    pub fn args_file(&self) -> PathBuf {
        self.dir.path().join("args.txt")
    }
}

/// Script fragment saving the invocation's arguments, one per line.
pub const RECORD_ARGS: &str = r#"printf '%s\n' "$@" > "$(dirname "$0")/args.txt""#;

fn record(prefix: [u8; 3], payload: &[u8]) -> Vec<u8> {
    let mut rec = Vec::new();
    rec.extend_from_slice(&((1 + prefix.len() + payload.len()) as u32).to_le_bytes());
    rec.push(0x00);
    rec.extend_from_slice(&prefix);
    rec.extend_from_slice(payload);
    rec.extend_from_slice(&FRAME_DELIMITER);
    rec
}

/// Container setup record.
pub fn header_record(tag: &[u8]) -> Vec<u8> {
    let mut rec = b"RIFF".to_vec();
    rec.extend_from_slice(tag);
    rec.extend_from_slice(&FRAME_DELIMITER);
    rec
}

pub fn reference_record(payload: &[u8]) -> Vec<u8> {
    record(REFERENCE_PREFIX, payload)
}

pub fn predicted_record(payload: &[u8]) -> Vec<u8> {
    record(PREDICTED_PREFIX, payload)
}

/// Split `data` back into records.
pub fn records(data: &[u8]) -> Vec<Vec<u8>> {
    moshpit_avi::FrameScanner::new(data)
        .map(|r| r.expect("valid record").to_vec())
        .collect()
}

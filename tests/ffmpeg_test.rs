//! ffmpeg orchestration tests against scripted stand-ins.

#![cfg(unix)]

mod common;

use std::time::Duration;

use common::{FakeFfmpeg, DURATION_10S, RECORD_ARGS};
use moshpit_av::{Error, Ffmpeg};
use serial_test::serial;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

async fn collect_progress(ffmpeg: &Ffmpeg, argv: Vec<String>) -> (Vec<f64>, moshpit_av::Result<()>) {
    let mut run = ffmpeg.spawn(argv, CancellationToken::new());
    let mut values = Vec::new();
    while let Some(p) = run.progress.recv().await {
        values.push(p);
    }
    (values, run.handle.await.unwrap())
}

#[tokio::test]
#[serial]
async fn test_progress_normalized_and_clamped() {
    let fake = FakeFfmpeg::with_progress(&["2500000", "5000000", "12000000"]);
    let ffmpeg = Ffmpeg::new(fake.path());

    let (values, result) = collect_progress(&ffmpeg, args(&["-i", "in.mp4", "out.avi"])).await;

    result.unwrap();
    assert_eq!(values, vec![0.0, 0.25, 0.5, 1.0]);
}

#[tokio::test]
#[serial]
async fn test_progress_argument_injected_before_output() {
    let fake = FakeFfmpeg::new(&format!("{RECORD_ARGS}\necho '{DURATION_10S}' >&2"));
    let ffmpeg = Ffmpeg::new(fake.path());

    let (_, result) = collect_progress(&ffmpeg, args(&["-i", "in.mp4", "-an", "out.avi"])).await;
    result.unwrap();

    let recorded = std::fs::read_to_string(fake.args_file()).unwrap();
    let recorded: Vec<&str> = recorded.lines().collect();
    assert_eq!(
        recorded,
        ["-i", "in.mp4", "-an", "-progress", "pipe:1", "out.avi"]
    );
}

#[tokio::test]
#[serial]
async fn test_missing_duration_is_fatal() {
    let fake = FakeFfmpeg::new("echo 'out_time_ms=1000000'\nsleep 1");
    let ffmpeg = Ffmpeg::new(fake.path());

    let (values, result) = collect_progress(&ffmpeg, args(&["-i", "in.mp4", "out.avi"])).await;

    assert!(matches!(result, Err(Error::DurationUnknown)));
    assert!(values.iter().all(|&p| p == 0.0));
}

#[tokio::test]
#[serial]
async fn test_nonzero_exit_reports_stderr_tail() {
    let fake = FakeFfmpeg::new("echo 'in.mp4: No such file or directory' >&2\nexit 1");
    let ffmpeg = Ffmpeg::new(fake.path());

    let (_, result) = collect_progress(&ffmpeg, args(&["-i", "in.mp4", "out.avi"])).await;

    match result {
        Err(Error::ToolFailed { tool, message }) => {
            assert_eq!(tool, "ffmpeg");
            assert!(message.contains("No such file or directory"), "{message}");
        }
        other => panic!("expected ToolFailed, got {other:?}"),
    }
}

#[tokio::test]
#[serial]
async fn test_log_file_receives_command_and_diagnostics() {
    let fake = FakeFfmpeg::with_progress(&["1000000"]);
    let log = fake.dir().join("ffmpeg.log");
    std::fs::write(&log, "previous run\n").unwrap();
    let ffmpeg = Ffmpeg::new(fake.path()).with_log(&log);

    let (_, result) = collect_progress(&ffmpeg, args(&["-i", "in.mp4", "out.avi"])).await;
    result.unwrap();

    let content = std::fs::read_to_string(&log).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "previous run");
    assert!(lines[1].starts_with("Executing "));
    assert!(lines[1].ends_with("-i in.mp4 -progress pipe:1 out.avi"));
    assert_eq!(lines[2], DURATION_10S);
}

#[tokio::test]
#[serial]
async fn test_unwritable_log_is_fatal() {
    let fake = FakeFfmpeg::with_progress(&[]);
    let ffmpeg = Ffmpeg::new(fake.path()).with_log(fake.dir().join("missing/dir/ffmpeg.log"));

    let (_, result) = collect_progress(&ffmpeg, args(&["-i", "in.mp4", "out.avi"])).await;

    assert!(matches!(result, Err(Error::Log { .. })));
}

#[tokio::test]
#[serial]
async fn test_diagnostic_lines_forwarded() {
    let fake = FakeFfmpeg::new(&format!("echo '{DURATION_10S}' >&2\necho 'second line' >&2"));
    let ffmpeg = Ffmpeg::new(fake.path());
    let (tx, mut rx) = mpsc::channel(1);

    let run = ffmpeg.spawn_with_lines(args(&["-f", "null", "-"]), tx, CancellationToken::new());
    let mut lines = Vec::new();
    let mut progress = run.progress;
    loop {
        tokio::select! {
            line = rx.recv() => match line {
                Some(line) => lines.push(line),
                None => break,
            },
            _ = progress.recv() => {}
        }
    }
    run.handle.await.unwrap().unwrap();

    assert_eq!(lines, vec![DURATION_10S.to_string(), "second line".to_string()]);
}

#[tokio::test]
#[serial]
async fn test_cancellation_kills_run() {
    let fake = FakeFfmpeg::new(&format!("echo '{DURATION_10S}' >&2\nexec sleep 30"));
    let ffmpeg = Ffmpeg::new(fake.path());
    let cancel = CancellationToken::new();

    let mut run = ffmpeg.spawn(args(&["-i", "in.mp4", "out.avi"]), cancel.clone());
    assert_eq!(run.progress.recv().await, Some(0.0));
    cancel.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), run.finish())
        .await
        .expect("cancelled run should end promptly");
    assert!(matches!(result, Err(Error::Cancelled)));
}

#[tokio::test]
#[serial]
async fn test_dropped_progress_receiver_does_not_stall() {
    let fake = FakeFfmpeg::with_progress(&["1000000", "2000000", "3000000"]);
    let ffmpeg = Ffmpeg::new(fake.path());

    let run = ffmpeg.spawn(args(&["-i", "in.mp4", "out.avi"]), CancellationToken::new());
    drop(run.progress);

    let result = tokio::time::timeout(Duration::from_secs(5), run.handle)
        .await
        .expect("run should finish without a progress consumer");
    result.unwrap().unwrap();
}

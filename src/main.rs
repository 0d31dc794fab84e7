mod cli;

use moshpit::{
    config::{self, Config},
    pipeline::{self, MoshRequest},
};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use moshpit_avi::{spawn_analyze_frames, FrameStats};
use moshpit_common::{Quality, Threshold};
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Run `task` on a fresh runtime with a token that Ctrl+C cancels.
fn block_on<T, F, Fut>(task: F) -> Result<T>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let cancel = CancellationToken::new();
        let signal = tokio::spawn(cancel_on_signal(cancel.clone()));
        let result = task(cancel).await;
        signal.abort();
        result
    })
}

async fn cancel_on_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::warn!("Interrupt received, cancelling");
    cancel.cancel();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "moshpit=trace,moshpit_av=debug,moshpit_avi=debug,moshpit_common=debug".to_string()
        } else {
            "moshpit=info,moshpit_av=info,moshpit_avi=info,moshpit_common=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Scenes {
            ref input,
            threshold,
            json,
        } => find_scenes(&cli, input, threshold, json),
        Commands::Mosh {
            ref input,
            ref output,
            ref frames,
            threshold,
            mute,
            quality,
        } => mosh(&cli, input, output, frames, threshold, mute, quality),
        Commands::Analyze { ref input } => analyze(input),
        Commands::CheckTools => check_tools(&cli),
        Commands::Validate { ref file } => {
            let path = file.clone().or_else(|| cli.config.clone());
            validate_config(path.as_deref())
        }
    }
}

/// Load config and apply the global CLI overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = config::load_config_or_default(cli.config.as_deref())?;
    if let Some(log) = &cli.log {
        config.log.ffmpeg_log = Some(log.clone());
    }
    Ok(config)
}

fn require_input(input: &Path) -> Result<()> {
    if !input.is_file() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }
    Ok(())
}

fn find_scenes(cli: &Cli, input: &Path, threshold: Option<f64>, json: bool) -> Result<()> {
    let config = load_config(cli)?;
    let threshold = Threshold::new(threshold.unwrap_or(config.scenes.threshold))?;
    require_input(input)?;
    let ffmpeg = config.ffmpeg(cli.ffmpeg.as_deref())?;

    let scenes = block_on(|cancel| {
        pipeline::detect_scenes(&ffmpeg, input, threshold, cancel, |scene| {
            if !json {
                println!(
                    "Found scene change at {} (frame {})",
                    scene.timecode(),
                    scene.frame
                );
            }
        })
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&scenes)?);
    } else if !scenes.is_empty() {
        let frames: Vec<String> = scenes.iter().map(|s| s.frame.to_string()).collect();
        println!("\nFrames: {}", frames.join(" "));
    }

    Ok(())
}

fn mosh(
    cli: &Cli,
    input: &Path,
    output: &Path,
    frames: &[String],
    threshold: Option<f64>,
    mute: bool,
    quality: Option<f64>,
) -> Result<()> {
    let config = load_config(cli)?;
    let selection = pipeline::parse_frames(frames)?;

    let mut request = MoshRequest::from_config(input, output, selection, &config)?;
    if let Some(threshold) = threshold {
        request.threshold = Threshold::new(threshold)?;
    }
    if let Some(quality) = quality {
        request.output_quality = Quality::new(quality)?;
    }
    if mute {
        request.keep_audio = false;
    }
    request.validate()?;

    let ffmpeg = config.ffmpeg(cli.ffmpeg.as_deref())?;
    let summary = block_on(|cancel| pipeline::run_mosh(&ffmpeg, &request, cancel))?;

    println!("Moshed {} frames into {}", summary.frames_removed, output.display());
    if !summary.unreached.is_empty() {
        println!(
            "Frames beyond the end of the video were ignored: {:?}",
            summary.unreached
        );
    }

    Ok(())
}

fn analyze(input: &Path) -> Result<()> {
    require_input(input)?;
    let file = std::fs::File::open(input)
        .with_context(|| format!("Failed to open {:?}", input))?;

    let stats: FrameStats = block_on(|cancel| async move {
        let mut task = spawn_analyze_frames(file, cancel);
        while task.frames.recv().await.is_some() {}
        Ok::<_, anyhow::Error>(task.handle.await??)
    })?;

    println!("File: {}", input.display());
    println!("Frames: {}", stats.total());
    println!("  Reference: {}", stats.reference);
    println!("  Predicted: {}", stats.predicted);
    println!("  Unknown:   {}", stats.unknown);

    Ok(())
}

fn check_tools(cli: &Cli) -> Result<()> {
    println!("Checking external tools...\n");

    let config = load_config(cli)?;
    let configured = cli.ffmpeg.as_deref().or(config.tools.ffmpeg_path.as_deref());

    match moshpit_av::check_ffmpeg(configured) {
        Ok(info) => {
            print!("✓ ffmpeg");
            if let Some(ref version) = info.version {
                print!(" ({})", version);
            }
            println!(" - {}", info.path.display());
            println!("\nAll required tools are available!");
        }
        Err(e) => {
            println!("✗ ffmpeg: {}", e);
            println!("\nInstall ffmpeg or set [tools] ffmpeg_path to use moshpit.");
        }
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    let show = |p: &Option<PathBuf>| {
        p.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    println!("  ffmpeg: {}", show(&config.tools.ffmpeg_path));
    println!("  ffmpeg log: {}", show(&config.log.ffmpeg_log));
    println!("  Scene threshold: {}", config.scenes.threshold);
    println!(
        "  Quality: intermediate {}, output {}",
        config.mosh.intermediate_quality, config.mosh.output_quality
    );
    println!(
        "  Audio: {}",
        if config.mosh.keep_audio {
            config.mosh.audio_bitrate.as_str()
        } else {
            "muted"
        }
    );

    Ok(())
}

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "moshpit")]
#[command(author, version, about = "Datamoshing tool: removes keyframes so motion smears across cuts")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the ffmpeg executable
    #[arg(long, global = true)]
    pub ffmpeg: Option<PathBuf>,

    /// Append ffmpeg output to this file
    #[arg(long, global = true)]
    pub log: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find scene changes in a video file
    Scenes {
        /// Video file to scan
        #[arg(required = true)]
        input: PathBuf,

        /// Scene detection threshold between 0 and 1
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove keyframes at the given frame indices and write the result
    Mosh {
        /// Video file to mosh
        #[arg(required = true)]
        input: PathBuf,

        /// Output file (.mp4)
        #[arg(short, long, required = true)]
        output: PathBuf,

        /// Frame indices to remove, or "all" for every scene change
        #[arg(required = true, num_args = 1..)]
        frames: Vec<String>,

        /// Scene detection threshold used with "all"
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Leave the audio track out of the output
        #[arg(long)]
        mute: bool,

        /// Encoding quality of the output between 0 and 1
        #[arg(short, long)]
        quality: Option<f64>,
    },

    /// Count frame types in an AVI file
    Analyze {
        /// AVI file to analyze
        #[arg(required = true)]
        input: PathBuf,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses --config or defaults if not specified)
        #[arg(value_name = "CONFIG")]
        file: Option<PathBuf>,
    },
}

//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::enums::{BackendKind, OrientationArg};

/// Capture or upload a photo of waste and prepare it for classification
#[derive(Parser, Debug)]
#[command(name = "waste-scanner")]
#[command(version, about = "Camera and upload capture for waste classification", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Camera backend
    #[arg(long, short, global = true, default_value = "synthetic")]
    pub backend: BackendKind,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List available cameras
    Devices,
    /// Take a still from the camera and write it as JPEG
    Capture {
        /// Camera to open (default: from config)
        #[arg(long, short)]
        orientation: Option<OrientationArg>,

        /// Turn the torch on before capturing
        #[arg(long)]
        torch: bool,

        /// Output file (default: <digest>.jpg in the output directory)
        #[arg(long)]
        output: Option<PathBuf>,

        /// How long to wait for the first frame
        #[arg(long, default_value = "2000")]
        warmup_ms: u64,
    },
    /// Validate and normalize an image file
    Ingest {
        /// Image file to ingest
        file: PathBuf,

        /// Declared media type (default: sniffed from content)
        #[arg(long)]
        media_type: Option<String>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Create default config file
    Init,
}

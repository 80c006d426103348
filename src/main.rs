mod cli;

use clap::Parser;

use cli::{Args, Command};
use waste_scanner::config::Config;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), String> {
    // An explicit --config must exist; the default location may be absent
    let config = match args.config.as_deref() {
        Some(path) => Config::load_from(path),
        None => Config::load(None),
    }
    .map_err(|e| e.to_string())?;

    match args.command {
        Command::Config { action } => {
            cli::handle_config_action(action, &config, args.config.as_deref())
        }
        Command::Devices => {
            let backend = args.backend.build()?;
            cli::list_devices(backend.as_ref())
        }
        Command::Capture {
            orientation,
            torch,
            output,
            warmup_ms,
        } => {
            let backend = args.backend.build()?;
            cli::run_capture(backend, &config, orientation, torch, output, warmup_ms).await
        }
        Command::Ingest { file, media_type } => {
            let backend = args.backend.build()?;
            cli::run_ingest(backend, &config, &file, media_type).await
        }
    }
}

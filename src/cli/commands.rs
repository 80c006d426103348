//! Subcommand handlers for devices, capture, ingest and config actions.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::args::ConfigAction;
use super::enums::OrientationArg;
use waste_scanner::camera::{CameraBackend, Orientation};
use waste_scanner::config::{default_path as get_config_path, Config};
use waste_scanner::{CaptureError, CaptureSession, CapturedImage};

/// Poll interval while waiting for the camera to deliver its first frame.
const FRAME_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Declared type for files whose content could not be sniffed.
const UNKNOWN_MEDIA_TYPE: &str = "application/octet-stream";

/// List available cameras and print them to stdout.
pub fn list_devices(backend: &dyn CameraBackend) -> Result<(), String> {
    let devices = backend.list_devices().map_err(|e| e.to_string())?;

    if devices.is_empty() {
        println!("No cameras found.");
        println!();
        println!("Make sure your camera is connected and permissions are granted.");
    } else {
        println!("Available cameras:");
        for device in devices {
            println!("  {}", device);
        }
        println!();
        println!("Use --orientation front|back to select a camera.");
    }
    Ok(())
}

/// Open the camera, wait for a usable frame, capture and write a JPEG.
pub async fn run_capture(
    backend: Arc<dyn CameraBackend>,
    config: &Config,
    orientation: Option<OrientationArg>,
    torch: bool,
    output: Option<PathBuf>,
    warmup_ms: u64,
) -> Result<(), String> {
    let mut session = CaptureSession::from_config(backend, config);
    let requested = orientation
        .map(Orientation::from)
        .unwrap_or(config.camera.orientation);

    let effective = session.start(requested).await.map_err(|e| e.to_string())?;
    if effective != requested {
        println!("No {} camera available, using {} camera.", requested, effective);
    }

    if torch {
        match session.query_torch() {
            Ok(true) => session.set_torch(true).map_err(|e| e.to_string())?,
            Ok(false) => println!("Torch not supported on this camera, continuing without it."),
            Err(e) => return Err(e.to_string()),
        }
    }

    let image = match capture_when_ready(&mut session, Duration::from_millis(warmup_ms)).await {
        Ok(image) => image,
        Err(e) => {
            session.stop();
            return Err(format!("{} ({})", e.user_message(), e));
        }
    };

    let path = output_path(output, config, &image);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Error creating output directory: {}", e))?;
        }
    }
    std::fs::write(&path, image.encoded())
        .map_err(|e| format!("Error writing {}: {}", path.display(), e))?;

    println!(
        "Captured {}x{} {} ({} bytes) -> {}",
        image.width(),
        image.height(),
        image.media_type(),
        image.encoded().len(),
        path.display()
    );
    println!("Digest: {}", image.digest());
    Ok(())
}

/// Retry capture while the camera is warming up, until `warmup` elapses.
async fn capture_when_ready(
    session: &mut CaptureSession,
    warmup: Duration,
) -> Result<CapturedImage, CaptureError> {
    let deadline = Instant::now() + warmup;
    loop {
        match session.capture().await {
            Err(CaptureError::DeviceNotReady) if Instant::now() < deadline => {
                tokio::time::sleep(FRAME_POLL_INTERVAL).await;
            }
            result => return result,
        }
    }
}

fn output_path(output: Option<PathBuf>, config: &Config, image: &CapturedImage) -> PathBuf {
    output.unwrap_or_else(|| {
        let dir = config
            .output
            .directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        dir.join(format!("{}.{}", image.digest(), image.extension()))
    })
}

/// Read a file, validate it as an image and print what was ingested.
pub async fn run_ingest(
    backend: Arc<dyn CameraBackend>,
    config: &Config,
    file: &Path,
    media_type: Option<String>,
) -> Result<(), String> {
    let bytes =
        std::fs::read(file).map_err(|e| format!("Error reading {}: {}", file.display(), e))?;
    let media_type = media_type.unwrap_or_else(|| sniff_media_type(&bytes));

    let mut session = CaptureSession::from_config(backend, config);
    let image = session
        .ingest(bytes, &media_type)
        .await
        .map_err(|e| format!("{} ({})", e.user_message(), e))?;

    println!(
        "Ingested {}x{} {} ({} bytes)",
        image.width(),
        image.height(),
        image.media_type(),
        image.encoded().len()
    );
    println!("Digest: {}", image.digest());
    Ok(())
}

/// Media type from the file's magic bytes. The file name is never consulted.
fn sniff_media_type(bytes: &[u8]) -> String {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| UNKNOWN_MEDIA_TYPE.to_string())
}

/// Handle config subcommand actions.
pub fn handle_config_action(
    action: ConfigAction,
    config: &Config,
    path: Option<&Path>,
) -> Result<(), String> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    match action {
        ConfigAction::Show => {
            println!("Current configuration:");
            println!();
            print!("{}", config.to_toml().map_err(|e| e.to_string())?);
            println!();

            if config_path.exists() {
                println!("Config file: {} (exists)", config_path.display());
            } else {
                println!("Config file: {} (not found)", config_path.display());
            }
            Ok(())
        }
        ConfigAction::Init => {
            if config_path.exists() {
                return Err(format!(
                    "Config file already exists: {}\nUse 'waste-scanner config show' to view current settings.",
                    config_path.display()
                ));
            }

            // Create parent directories if needed
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| format!("Error creating config directory: {}", e))?;
            }

            let body = Config::default().to_toml().map_err(|e| e.to_string())?;
            let contents = format!("# waste-scanner configuration\n\n{}", body);
            std::fs::write(&config_path, contents)
                .map_err(|e| format!("Error writing config file: {}", e))?;

            println!("Created config file: {}", config_path.display());
            Ok(())
        }
    }
}

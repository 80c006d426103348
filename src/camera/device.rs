//! Camera device enumeration and selection.

use super::types::{CameraInfo, Orientation};
#[cfg(feature = "hardware")]
use super::types::CameraError;

/// Guess which way a device faces from its name.
///
/// Desktop webcams rarely say; anything not named as rear-facing is
/// treated as front-facing.
pub fn infer_orientation(name: &str) -> Orientation {
    let name = name.to_lowercase();
    if ["back", "rear", "environment", "world"]
        .iter()
        .any(|kw| name.contains(kw))
    {
        Orientation::Back
    } else {
        Orientation::Front
    }
}

/// Pick the device for `orientation`, or the closest substitute.
///
/// Returns the first device facing the requested way, falling back to the
/// first device overall. `None` only when `devices` is empty.
pub fn pick_device(devices: &[CameraInfo], orientation: Orientation) -> Option<&CameraInfo> {
    devices
        .iter()
        .find(|d| d.orientation == orientation)
        .or_else(|| devices.first())
}

/// List all camera devices nokhwa can see.
///
/// If no cameras are found, returns an empty vector (not an error).
#[cfg(feature = "hardware")]
pub fn list_devices() -> Result<Vec<CameraInfo>, CameraError> {
    use nokhwa::query;
    use nokhwa::utils::ApiBackend;

    let devices = query(ApiBackend::Auto).map_err(|e| CameraError::OpenFailed(e.to_string()))?;

    Ok(devices
        .into_iter()
        .map(|d| {
            let name = d.human_name();
            CameraInfo {
                index: d.index().as_index().unwrap_or(0),
                orientation: infer_orientation(&name),
                name,
            }
        })
        .collect())
}

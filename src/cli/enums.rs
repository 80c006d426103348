//! CLI enum types for backend and orientation options.

use std::sync::Arc;

use clap::ValueEnum;

use waste_scanner::camera::{CameraBackend, Orientation, SyntheticCamera};

/// Which camera backend to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BackendKind {
    /// In-process generated frames, no hardware needed
    #[default]
    Synthetic,
    /// System webcams (requires the `hardware` feature)
    Hardware,
}

impl BackendKind {
    /// Construct the backend this option names.
    pub fn build(self) -> Result<Arc<dyn CameraBackend>, String> {
        match self {
            BackendKind::Synthetic => Ok(Arc::new(SyntheticCamera::default())),
            BackendKind::Hardware => hardware_backend(),
        }
    }
}

#[cfg(feature = "hardware")]
fn hardware_backend() -> Result<Arc<dyn CameraBackend>, String> {
    Ok(Arc::new(waste_scanner::camera::HardwareCamera::new()))
}

#[cfg(not(feature = "hardware"))]
fn hardware_backend() -> Result<Arc<dyn CameraBackend>, String> {
    Err("waste-scanner was built without the `hardware` feature".to_string())
}

/// Camera facing direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OrientationArg {
    Front,
    Back,
}

impl From<OrientationArg> for Orientation {
    fn from(o: OrientationArg) -> Self {
        match o {
            OrientationArg::Front => Orientation::Front,
            OrientationArg::Back => Orientation::Back,
        }
    }
}

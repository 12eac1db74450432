use crate::util::get_from_path;
use crate::ParleyError;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InferenceDevice {
    /// Discrete GPU accelerator
    Cuda,
    /// Unified-memory accelerator (Apple silicon)
    Mps,
    Cpu,
}

impl InferenceDevice {
    pub fn as_str(&self) -> &'static str {
        match self {
            InferenceDevice::Cuda => "cuda",
            InferenceDevice::Mps => "mps",
            InferenceDevice::Cpu => "cpu",
        }
    }
}

impl fmt::Display for InferenceDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRequest {
    Auto,
    Explicit(InferenceDevice),
}

impl FromStr for DeviceRequest {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "auto" => Ok(DeviceRequest::Auto),
            "cuda" => Ok(DeviceRequest::Explicit(InferenceDevice::Cuda)),
            // `mpx` is a common misspelling of the Metal backend name
            "mps" | "mpx" => Ok(DeviceRequest::Explicit(InferenceDevice::Mps)),
            "cpu" => Ok(DeviceRequest::Explicit(InferenceDevice::Cpu)),
            other => Err(ParleyError::ConfigError(format!(
                "unknown device '{other}' (expected auto, cuda, mps or cpu)"
            ))),
        }
    }
}

/// Reports which accelerators the host can use.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceDetector: Send + Sync {
    fn cuda_available(&self) -> bool;
    fn mps_available(&self) -> bool;
}

/// Detector backed by the host environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDetector;

impl DeviceDetector for SystemDetector {
    fn cuda_available(&self) -> bool {
        match std::env::var("CUDA_VISIBLE_DEVICES") {
            Ok(v) if v.trim().is_empty() || v.trim() == "-1" => return false,
            _ => {}
        }
        get_from_path("nvidia-smi").is_some() || Path::new("/dev/nvidia0").exists()
    }

    fn mps_available(&self) -> bool {
        cfg!(all(target_os = "macos", target_arch = "aarch64"))
    }
}

/// Outcome of device selection. `degraded_from` is set when an explicitly
/// requested accelerator was missing and CPU was used instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedDevice {
    pub device: InferenceDevice,
    pub degraded_from: Option<InferenceDevice>,
}

impl ResolvedDevice {
    pub fn warning(&self) -> Option<ParleyError> {
        self.degraded_from.map(|d| {
            ParleyError::DeviceUnavailable(format!("{d} requested but not available; using cpu"))
        })
    }
}

/// `Auto` picks cuda, then mps, then cpu. An explicit accelerator that is
/// missing degrades to cpu with a warning.
pub fn select_device(requested: DeviceRequest, detector: &dyn DeviceDetector) -> ResolvedDevice {
    let available = |d: InferenceDevice| match d {
        InferenceDevice::Cuda => detector.cuda_available(),
        InferenceDevice::Mps => detector.mps_available(),
        InferenceDevice::Cpu => true,
    };

    let resolved = match requested {
        DeviceRequest::Auto => {
            let device = [InferenceDevice::Cuda, InferenceDevice::Mps]
                .into_iter()
                .find(|d| available(*d))
                .unwrap_or(InferenceDevice::Cpu);
            ResolvedDevice {
                device,
                degraded_from: None,
            }
        }
        DeviceRequest::Explicit(d) if available(d) => ResolvedDevice {
            device: d,
            degraded_from: None,
        },
        DeviceRequest::Explicit(d) => ResolvedDevice {
            device: InferenceDevice::Cpu,
            degraded_from: Some(d),
        },
    };

    match resolved.warning() {
        Some(w) => warn!(target = "synthesis", warning = %w, "Inference device degraded"),
        None => info!(target = "synthesis", device = %resolved.device, "Selected inference device"),
    }
    resolved
}

//! Capture device enumeration and rear-camera selection

use tracing::{debug, info};

use crate::error::Result;
use crate::media::MediaDevices;
use crate::types::CaptureDevice;

/// List available video input devices
///
/// May return an empty list, e.g. when the platform hides devices until
/// permission is granted.
pub async fn list_devices(media: &dyn MediaDevices) -> Result<Vec<CaptureDevice>> {
    let devices = media.enumerate_devices().await?;
    debug!("Enumerated {} capture device(s)", devices.len());
    Ok(devices)
}

/// Ranks devices by label to prefer a rear-facing camera
///
/// Policy: the first device whose label contains a keyword wins;
/// otherwise the last listed device is used. Labels are matched
/// case-insensitively and nothing beyond the label is considered.
#[derive(Debug, Clone)]
pub struct DeviceSelector {
    keywords: Vec<String>,
}

impl DeviceSelector {
    /// Create a selector matching the given keywords
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Whether the device label looks like a rear-facing camera
    pub fn is_rear_facing(&self, device: &CaptureDevice) -> bool {
        let label = device.label.to_lowercase();
        self.keywords.iter().any(|k| label.contains(k.as_str()))
    }

    /// Pick the target device, or None if the list is empty
    pub fn select<'a>(&self, devices: &'a [CaptureDevice]) -> Option<&'a CaptureDevice> {
        let selected = devices
            .iter()
            .find(|d| self.is_rear_facing(d))
            .or_else(|| devices.last());

        if let Some(device) = selected {
            info!("Selected capture device: {}", device);
        }
        selected
    }
}

impl Default for DeviceSelector {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_REAR_KEYWORDS)
    }
}

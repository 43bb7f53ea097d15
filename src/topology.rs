//! Display topology: the baseline captured at startup and the runtime
//! query used to verify layout changes.
//!
//! Both walk the backend's device enumeration from index 0 until it runs
//! out, asking each device for its current mode and falling back to the
//! registry mode.  Devices answering neither query are skipped.

use crate::display::{BaselineDisplay, DeviceInfo, DisplayMode, ModeSource, RuntimeDisplay};
use crate::traits::DisplayBackend;
use log::{debug, info};

/// The immutable, ordered list of displays captured at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Baseline {
    displays: Vec<BaselineDisplay>,
}

impl Baseline {
    pub fn new(displays: Vec<BaselineDisplay>) -> Self {
        Self { displays }
    }

    pub fn displays(&self) -> &[BaselineDisplay] {
        &self.displays
    }

    /// Look up a display by its device id.
    pub fn get(&self, id: &str) -> Option<&BaselineDisplay> {
        self.displays.iter().find(|d| d.id == id)
    }

    /// Device ids in enumeration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.displays.iter().map(|d| d.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.displays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.displays.is_empty()
    }
}

/// Walk the device enumeration, pairing every device with a mode.
fn enumerate<B: DisplayBackend>(backend: &B) -> Vec<(DeviceInfo, DisplayMode)> {
    let mut found = Vec::new();
    let mut index = 0u32;
    while let Some(device) = backend.device(index) {
        index += 1;
        let mode = backend
            .mode(&device.name, ModeSource::Current)
            .or_else(|| backend.mode(&device.name, ModeSource::Registry));
        match mode {
            Some(mode) => found.push((device, mode)),
            None => debug!("skipping {}: no current or registry mode", device.name),
        }
    }
    found
}

/// Capture the baseline topology.
///
/// Must run before any layout is applied.  An empty result is not an error;
/// the planner refuses to act on it.
pub fn capture_baseline<B: DisplayBackend>(backend: &B) -> Baseline {
    let displays: Vec<BaselineDisplay> = enumerate(backend)
        .into_iter()
        .map(|(device, mode)| BaselineDisplay {
            id: device.name,
            is_primary: device.is_primary,
            bounds: mode.bounds(),
            mode,
        })
        .collect();

    for d in &displays {
        info!("baseline: {} primary={} {}", d.id, d.is_primary, d.mode);
    }
    info!("baseline captured: {} display(s)", displays.len());
    Baseline::new(displays)
}

/// Observe the live display state.
///
/// Returns a fresh list on every call; nothing is cached.
pub fn probe_runtime<B: DisplayBackend>(backend: &B) -> Vec<RuntimeDisplay> {
    enumerate(backend)
        .into_iter()
        .map(|(device, mode)| RuntimeDisplay {
            id: device.name,
            attached: device.attached,
            bounds: mode.bounds(),
            width: mode.width,
            height: mode.height,
            bits_per_pixel: mode.bits_per_pixel,
            frequency: mode.frequency,
        })
        .collect()
}

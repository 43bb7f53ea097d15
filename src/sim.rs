//! In-memory [`DisplayBackend`] that models misbehaving display drivers.
//!
//! The simulator keeps a list of displays with an `attached` flag, queues
//! submitted modes and applies them on [`commit`](DisplayBackend::commit)
//! according to a [`DriverQuirk`].  It also counts every mutating call so
//! tests can assert how often the OS was touched.
//!
//! It is used by the test-suite and by the binary's `--simulate` mode.

use crate::display::{DeviceInfo, DisplayMode, ModeFields, ModeSource};
use crate::traits::DisplayBackend;
use log::debug;
use std::sync::{Mutex, MutexGuard};

/// How the simulated driver reacts to a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriverQuirk {
    /// Every queued change is applied.
    #[default]
    Cooperative,
    /// At most one detached display is switched on per commit; the rest of
    /// the activations are dropped and need another identical submission.
    OneActivationPerCommit,
    /// After a commit at most one of the requested displays is attached
    /// (the first one submitted); every other display ends up detached.
    SingleActivation,
    /// While only one display is attached, secondary displays are switched
    /// on only if *every* display is requested at once.
    StuckOnSingle,
    /// `commit` fails and nothing changes.
    RejectCommit,
}

/// One simulated display.
#[derive(Debug, Clone)]
pub struct SimDisplay {
    pub name: String,
    pub primary: bool,
    pub attached: bool,
    /// Whether mode queries for this display succeed at all.
    pub queryable: bool,
    /// Last non-degenerate mode, served as both current and registry mode.
    pub mode: DisplayMode,
}

impl SimDisplay {
    pub fn new(name: impl Into<String>, x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            primary: false,
            attached: true,
            queryable: true,
            mode: DisplayMode {
                x,
                y,
                width,
                height,
                bits_per_pixel: 32,
                frequency: 60,
                fields: ModeFields::LAYOUT,
            },
        }
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn detached(mut self) -> Self {
        self.attached = false;
        self
    }

    pub fn unqueryable(mut self) -> Self {
        self.queryable = false;
        self
    }
}

#[derive(Debug, Default)]
struct SimState {
    displays: Vec<SimDisplay>,
    pending: Vec<(String, DisplayMode)>,
    submits: usize,
    commits: usize,
}

/// Errors produced by the simulator.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("unknown device: {0}")]
    UnknownDevice(String),
    #[error("commit rejected by simulated driver")]
    Rejected,
}

/// Simulated display-configuration facility.
#[derive(Debug, Default)]
pub struct SimulatedBackend {
    state: Mutex<SimState>,
    quirk: DriverQuirk,
}

impl SimulatedBackend {
    pub fn new(displays: Vec<SimDisplay>) -> Self {
        Self {
            state: Mutex::new(SimState {
                displays,
                ..SimState::default()
            }),
            quirk: DriverQuirk::Cooperative,
        }
    }

    /// `count` attached 1920×1080 displays: the primary at the origin, the
    /// second directly above it and the rest in a row to the right.
    pub fn desk(count: usize) -> Self {
        let displays = (0..count)
            .map(|i| {
                let name = format!(r"\\.\DISPLAY{}", i + 1);
                match i {
                    0 => SimDisplay::new(name, 0, 0, 1920, 1080).primary(),
                    1 => SimDisplay::new(name, 0, -1080, 1920, 1080),
                    n => SimDisplay::new(name, row_offset(n - 1), 0, 1920, 1080),
                }
            })
            .collect();
        Self::new(displays)
    }

    pub fn with_quirk(mut self, quirk: DriverQuirk) -> Self {
        self.quirk = quirk;
        self
    }

    pub fn set_quirk(&mut self, quirk: DriverQuirk) {
        self.quirk = quirk;
    }

    /// Number of `submit_mode` calls so far.
    pub fn submit_count(&self) -> usize {
        self.state().submits
    }

    /// Number of `commit` calls so far.
    pub fn commit_count(&self) -> usize {
        self.state().commits
    }

    /// Names of the currently attached displays, in enumeration order.
    pub fn attached(&self) -> Vec<String> {
        self.state()
            .displays
            .iter()
            .filter(|d| d.attached)
            .map(|d| d.name.clone())
            .collect()
    }

    /// Force a display's attached flag, bypassing the driver model.
    pub fn set_attached(&self, name: &str, attached: bool) {
        if let Some(d) = self.state().displays.iter_mut().find(|d| d.name == name) {
            d.attached = attached;
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DisplayBackend for SimulatedBackend {
    type Error = SimError;

    fn device(&self, index: u32) -> Option<DeviceInfo> {
        let state = self.state();
        state.displays.get(index as usize).map(|d| DeviceInfo {
            name: d.name.clone(),
            is_primary: d.primary,
            attached: d.attached,
        })
    }

    fn mode(&self, device: &str, source: ModeSource) -> Option<DisplayMode> {
        let state = self.state();
        let d = state.displays.iter().find(|d| d.name == device)?;
        if !d.queryable {
            return None;
        }
        match source {
            ModeSource::Current if !d.attached => None,
            _ => Some(d.mode),
        }
    }

    fn submit_mode(&self, device: &str, mode: &DisplayMode) -> Result<(), SimError> {
        let mut state = self.state();
        state.submits += 1;
        if !state.displays.iter().any(|d| d.name == device) {
            return Err(SimError::UnknownDevice(device.to_string()));
        }
        state.pending.push((device.to_string(), *mode));
        Ok(())
    }

    fn commit(&self) -> Result<(), SimError> {
        let mut state = self.state();
        state.commits += 1;
        let pending = std::mem::take(&mut state.pending);
        if self.quirk == DriverQuirk::RejectCommit {
            return Err(SimError::Rejected);
        }

        let attached_before = state.displays.iter().filter(|d| d.attached).count();
        let requested_on = pending.iter().filter(|(_, m)| !m.is_degenerate()).count();
        let total = state.displays.len();
        let mut activations = 0usize;

        for (name, mode) in &pending {
            let Some(d) = state.displays.iter_mut().find(|d| &d.name == name) else {
                continue;
            };
            if mode.is_degenerate() {
                d.attached = false;
                d.mode.x = mode.x;
                d.mode.y = mode.y;
                continue;
            }
            let allowed = match self.quirk {
                DriverQuirk::Cooperative | DriverQuirk::RejectCommit => true,
                DriverQuirk::OneActivationPerCommit => d.attached || activations == 0,
                DriverQuirk::SingleActivation => activations == 0,
                DriverQuirk::StuckOnSingle => {
                    d.attached || attached_before > 1 || requested_on == total
                }
            };
            if allowed {
                if !d.attached || self.quirk == DriverQuirk::SingleActivation {
                    activations += 1;
                }
                d.attached = true;
                d.mode = *mode;
            } else if self.quirk == DriverQuirk::SingleActivation {
                d.attached = false;
            }
        }

        debug!(
            "sim commit #{}: {} change(s), {} activation(s), quirk {:?}",
            state.commits,
            pending.len(),
            activations,
            self.quirk
        );
        Ok(())
    }
}

/// Left edge of the `slot`-th 1920-wide display in a row, saturating at
/// the edge of the coordinate space.
fn row_offset(slot: usize) -> i32 {
    i32::try_from(slot).unwrap_or(i32::MAX).saturating_mul(1920)
}

//! Core traits that decouple monswitch from the OS display API and from the
//! transport that delivers layout requests.
//!
//! The [`LayoutSwitcher`](crate::switcher::LayoutSwitcher) and the
//! [`Applicator`](crate::applicator::Applicator) only depend on these
//! abstractions; the Win32 binding and the simulator are interchangeable.

use crate::display::{DeviceInfo, DisplayMode, ModeSource};
use crate::layout::LayoutCommand;
use std::sync::mpsc;

/// Narrow view of an OS display-configuration facility.
///
/// Mode changes are two-phase: [`submit_mode`](DisplayBackend::submit_mode)
/// queues a per-device change (persisted, not yet applied) and
/// [`commit`](DisplayBackend::commit) applies everything queued in one go.
pub trait DisplayBackend {
    /// The error type produced by this backend.
    type Error: std::error::Error + Send + 'static;

    /// Return the device at enumeration `index`, or `None` once the
    /// enumeration is exhausted.
    fn device(&self, index: u32) -> Option<DeviceInfo>;

    /// Query a device's mode.  `None` means the query failed.
    fn mode(&self, device: &str, source: ModeSource) -> Option<DisplayMode>;

    /// Queue a mode change for `device` without applying it.
    ///
    /// A mode with zero width and height detaches the device.
    fn submit_mode(&self, device: &str, mode: &DisplayMode) -> Result<(), Self::Error>;

    /// Apply every queued change.
    fn commit(&self) -> Result<(), Self::Error>;
}

/// A source of [`LayoutCommand`]s.
///
/// Implementations read requests from some transport and forward each one
/// into the provided sink.  The reply channel inside every command carries
/// the [`LayoutResult`](crate::layout::LayoutResult) back to the source.
///
/// # Contract
///
/// * [`run`](CommandSource::run) **blocks** until the source is exhausted or
///   an unrecoverable error occurs.
/// * Implementations must be [`Send`] so they can run on a dedicated thread.
pub trait CommandSource: Send {
    /// The error type produced by this source.
    type Error: std::error::Error + Send + 'static;

    /// Start reading and forward every incoming request into `sink`.
    fn run(&mut self, sink: mpsc::Sender<LayoutCommand>) -> Result<(), Self::Error>;
}

//! **monswitch**: switch a multi-monitor Windows desktop between a few
//! predefined layouts.
//!
//! Displays are only switched on or off; their geometry is never changed.
//! At startup the [`topology`] baseline records every display's position
//! and mode, and every later layout change reuses that geometry.
//!
//! # Architecture
//!
//! The crate is organised around two core traits:
//!
//! * [`traits::DisplayBackend`]: abstracts device enumeration, mode
//!   queries and the two-phase submit/commit mode change so the layout
//!   logic is not coupled to the Win32 API.
//! * [`traits::CommandSource`]: abstracts the transport that delivers
//!   layout requests (a tray shell, a script on stdin, ...).
//!
//! [`switcher::LayoutSwitcher`] plans a [`layout::Layout`] and hands it to
//! the [`applicator::Applicator`], which retries until the observed state
//! matches.  Concrete backends live in `win32` (Windows only) and [`sim`]
//! (an in-memory driver model); [`ipc`] holds the line-based transport.

pub mod applicator;
pub mod config;
pub mod display;
pub mod ipc;
pub mod layout;
pub mod neighbor;
pub mod sim;
pub mod switcher;
pub mod topology;
pub mod traits;
#[cfg(target_os = "windows")]
pub mod win32;

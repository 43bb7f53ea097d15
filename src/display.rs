//! Display data types shared by every component.
//!
//! [`DisplayMode`] is the single internal mode descriptor: it is read from
//! and submitted to a [`DisplayBackend`](crate::traits::DisplayBackend)
//! without any platform struct leaking into the layout logic.
//! [`BaselineDisplay`] and [`RuntimeDisplay`] are the two views of a device:
//! the one captured at startup and the one observed after a change.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bitmask of the [`DisplayMode`] fields a backend should honour.
///
/// Bit values match the Win32 `DM_*` constants so a native backend can
/// pass the mask through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ModeFields(pub u32);

impl ModeFields {
    pub const POSITION: ModeFields = ModeFields(0x0000_0020);
    pub const BITS_PER_PEL: ModeFields = ModeFields(0x0004_0000);
    pub const PELS_WIDTH: ModeFields = ModeFields(0x0008_0000);
    pub const PELS_HEIGHT: ModeFields = ModeFields(0x0010_0000);
    pub const DISPLAY_FREQUENCY: ModeFields = ModeFields(0x0040_0000);

    /// Every field a layout change touches.
    pub const LAYOUT: ModeFields = ModeFields(
        Self::POSITION.0
            | Self::BITS_PER_PEL.0
            | Self::PELS_WIDTH.0
            | Self::PELS_HEIGHT.0
            | Self::DISPLAY_FREQUENCY.0,
    );

    pub fn contains(self, other: ModeFields) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for ModeFields {
    type Output = ModeFields;

    fn bitor(self, rhs: ModeFields) -> ModeFields {
        ModeFields(self.0 | rhs.0)
    }
}

/// Resolution, position, colour depth and refresh rate of one display.
///
/// A mode with zero width and height is the "disable this display"
/// instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisplayMode {
    /// X position on the virtual desktop (pixels).
    pub x: i32,
    /// Y position on the virtual desktop (pixels, grows downwards).
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u32,
    /// Refresh rate in Hz.
    pub frequency: u32,
    /// Which of the fields above are meaningful.
    pub fields: ModeFields,
}

impl DisplayMode {
    /// `true` if the mode has no usable resolution.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Same position, zero resolution: the mode that switches a display off.
    pub fn disabled(&self) -> Self {
        Self {
            width: 0,
            height: 0,
            fields: ModeFields::LAYOUT,
            ..*self
        }
    }

    /// The bounding rectangle this mode occupies on the virtual desktop.
    pub fn bounds(&self) -> Rect {
        Rect {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}@{}Hz {}bpp at ({}, {})",
            self.width, self.height, self.frequency, self.bits_per_pixel, self.x, self.y
        )
    }
}

/// Axis-aligned rectangle in virtual-desktop coordinates (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn left(&self) -> f64 {
        self.x as f64
    }

    pub fn right(&self) -> f64 {
        self.x as f64 + self.width as f64
    }

    pub fn top(&self) -> f64 {
        self.y as f64
    }

    /// Center point `(x, y)`.
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }
}

/// Where a backend should read a device's mode from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeSource {
    /// The mode the device is running right now.
    Current,
    /// The mode persisted in the registry (available for detached devices).
    Registry,
}

/// One entry of the OS device enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Opaque OS device name (e.g. `\\.\DISPLAY1`).
    pub name: String,
    pub is_primary: bool,
    /// Whether the device is currently part of the desktop.
    pub attached: bool,
}

/// A display as captured at startup.
///
/// Entries are immutable once captured and are the only source of geometry
/// used when a display is switched back on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineDisplay {
    pub id: String,
    pub is_primary: bool,
    pub bounds: Rect,
    pub mode: DisplayMode,
}

/// A display as observed by a runtime query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeDisplay {
    pub id: String,
    pub attached: bool,
    pub bounds: Rect,
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u32,
    pub frequency: u32,
}

impl fmt::Display for RuntimeDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} attached={} {}x{}@{}Hz {}bpp at ({}, {})",
            self.id,
            self.attached,
            self.width,
            self.height,
            self.frequency,
            self.bits_per_pixel,
            self.bounds.x,
            self.bounds.y
        )
    }
}

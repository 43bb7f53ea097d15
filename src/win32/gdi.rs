//! [`DisplayBackend`] implementation backed by the Win32 GDI display API.
//!
//! | Operation     | API                                                        |
//! |---------------|------------------------------------------------------------|
//! | `device`      | `EnumDisplayDevicesW(NULL, index)`                         |
//! | `mode`        | `EnumDisplaySettingsW(ENUM_CURRENT/REGISTRY_SETTINGS)`     |
//! | `submit_mode` | `ChangeDisplaySettingsExW(device, mode, UPDATEREGISTRY \| NORESET)` |
//! | `commit`      | `ChangeDisplaySettingsExW(NULL, NULL, 0)`                  |
//!
//! Every struct crossing the boundary is converted to or from
//! [`DisplayMode`] / [`DeviceInfo`] here.

use crate::display::{DeviceInfo, DisplayMode, ModeFields, ModeSource};
use crate::traits::DisplayBackend;
use log::debug;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{HWND, POINTL};
use windows::Win32::Graphics::Gdi::{
    ChangeDisplaySettingsExW, EnumDisplayDevicesW, EnumDisplaySettingsW, CDS_NORESET, CDS_TYPE,
    CDS_UPDATEREGISTRY, DEVMODEW, DEVMODE_FIELD_FLAGS, DISPLAY_DEVICEW,
    DISPLAY_DEVICE_ATTACHED_TO_DESKTOP, DISPLAY_DEVICE_PRIMARY_DEVICE, DISP_CHANGE_SUCCESSFUL,
    ENUM_CURRENT_SETTINGS, ENUM_REGISTRY_SETTINGS,
};

/// GDI-backed display configuration.
///
/// Stateless: every call goes straight to the OS.
pub struct GdiBackend;

/// Errors reported by `ChangeDisplaySettingsExW`.
#[derive(Debug, thiserror::Error)]
#[error("ChangeDisplaySettingsEx({device}) returned {code}")]
pub struct GdiError {
    device: String,
    code: i32,
}

impl Default for GdiBackend {
    fn default() -> Self {
        Self
    }
}

impl GdiBackend {
    pub fn new() -> Self {
        Self
    }
}

//  Conversion helpers

/// NUL-terminated UTF-16 copy of `s`.
fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Decode a fixed-size, NUL-padded UTF-16 buffer.
fn from_wide(buf: &[u16]) -> String {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..len])
}

fn to_mode(dm: &DEVMODEW) -> DisplayMode {
    // SAFETY: for display devices the second variant of the union (position,
    // orientation, fixed output) is the one GDI fills in.
    let pos = unsafe { dm.Anonymous1.Anonymous2.dmPosition };
    DisplayMode {
        x: pos.x,
        y: pos.y,
        width: dm.dmPelsWidth,
        height: dm.dmPelsHeight,
        bits_per_pixel: dm.dmBitsPerPel,
        frequency: dm.dmDisplayFrequency,
        fields: ModeFields(dm.dmFields.0),
    }
}

fn to_devmode(mode: &DisplayMode) -> DEVMODEW {
    let mut dm = DEVMODEW {
        dmSize: std::mem::size_of::<DEVMODEW>() as u16,
        dmPelsWidth: mode.width,
        dmPelsHeight: mode.height,
        dmBitsPerPel: mode.bits_per_pixel,
        dmDisplayFrequency: mode.frequency,
        dmFields: DEVMODE_FIELD_FLAGS(mode.fields.0),
        ..Default::default()
    };
    // SAFETY: writing the display variant of a zero-initialised union.
    unsafe {
        dm.Anonymous1.Anonymous2.dmPosition = POINTL {
            x: mode.x,
            y: mode.y,
        };
    }
    dm
}

//  DisplayBackend implementation

impl DisplayBackend for GdiBackend {
    type Error = GdiError;

    fn device(&self, index: u32) -> Option<DeviceInfo> {
        let mut dd = DISPLAY_DEVICEW {
            cb: std::mem::size_of::<DISPLAY_DEVICEW>() as u32,
            ..Default::default()
        };
        // SAFETY: `dd` is a valid, correctly sized DISPLAY_DEVICEW that
        // outlives the call.
        let found = unsafe { EnumDisplayDevicesW(PCWSTR::null(), index, &mut dd, 0) };
        if !found.as_bool() {
            return None;
        }
        let flags = dd.StateFlags.0;
        Some(DeviceInfo {
            name: from_wide(&dd.DeviceName),
            is_primary: flags & DISPLAY_DEVICE_PRIMARY_DEVICE.0 != 0,
            attached: flags & DISPLAY_DEVICE_ATTACHED_TO_DESKTOP.0 != 0,
        })
    }

    fn mode(&self, device: &str, source: ModeSource) -> Option<DisplayMode> {
        let name = wide(device);
        let which = match source {
            ModeSource::Current => ENUM_CURRENT_SETTINGS,
            ModeSource::Registry => ENUM_REGISTRY_SETTINGS,
        };
        let mut dm = DEVMODEW {
            dmSize: std::mem::size_of::<DEVMODEW>() as u16,
            ..Default::default()
        };
        // SAFETY: `name` is NUL-terminated and `dm` is correctly sized; both
        // outlive the call.
        let ok = unsafe { EnumDisplaySettingsW(PCWSTR(name.as_ptr()), which, &mut dm) };
        ok.as_bool().then(|| to_mode(&dm))
    }

    fn submit_mode(&self, device: &str, mode: &DisplayMode) -> Result<(), GdiError> {
        let name = wide(device);
        let dm = to_devmode(mode);
        // SAFETY: `name` and `dm` are valid for the duration of the call.
        let code = unsafe {
            ChangeDisplaySettingsExW(
                PCWSTR(name.as_ptr()),
                Some(&dm as *const DEVMODEW),
                HWND::default(),
                CDS_UPDATEREGISTRY | CDS_NORESET,
                None,
            )
        };
        debug!("ChangeDisplaySettingsEx({}) -> {}", device, code.0);
        if code == DISP_CHANGE_SUCCESSFUL {
            Ok(())
        } else {
            Err(GdiError {
                device: device.to_string(),
                code: code.0,
            })
        }
    }

    fn commit(&self) -> Result<(), GdiError> {
        // SAFETY: a NULL device and NULL mode apply the pending registry
        // changes; no pointers are passed.
        let code = unsafe {
            ChangeDisplaySettingsExW(PCWSTR::null(), None, HWND::default(), CDS_TYPE(0), None)
        };
        debug!("ChangeDisplaySettingsEx(commit) -> {}", code.0);
        if code == DISP_CHANGE_SUCCESSFUL {
            Ok(())
        } else {
            Err(GdiError {
                device: "<commit>".to_string(),
                code: code.0,
            })
        }
    }
}

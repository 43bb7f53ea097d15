//! Layout vocabulary shared by the planner, the applicator and transports.
//!
//! [`Layout`] names one of the predefined layouts, [`LayoutRequest`] is the
//! concrete target a layout resolves to, and [`LayoutResult`] is the
//! outcome reported back to whoever asked.
//!
//! On the wire a layout is a JSON string; the daemon accepts
//! `"MainOnly"`, `"main-only"`, `"main"`, `"above"`, `"all"`, ... (see
//! [`Layout::parse`]).

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::mpsc;

/// One of the predefined display layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Layout {
    /// Only the primary display.
    MainOnly,
    /// The primary display plus the display above it.
    MainAndAbove,
    /// Every display captured in the baseline.
    AllScreens,
}

impl Layout {
    /// Human-readable name, used as notification title.
    pub fn name(self) -> &'static str {
        match self {
            Layout::MainOnly => "Main only",
            Layout::MainAndAbove => "Main + above",
            Layout::AllScreens => "All screens",
        }
    }

    /// Parse a layout name (case-insensitive; `-`, `_`, `+` and whitespace
    /// are ignored).
    pub fn parse(s: &str) -> Option<Layout> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '_' | '+'))
            .flat_map(|c| c.to_lowercase())
            .collect();
        match normalized.as_str() {
            "main" | "mainonly" => Some(Layout::MainOnly),
            "above" | "mainabove" | "mainandabove" => Some(Layout::MainAndAbove),
            "all" | "allscreens" => Some(Layout::AllScreens),
            _ => None,
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Layout {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Layout::parse(&s).ok_or_else(|| DeError::custom(format!("invalid layout: {:?}", s)))
    }
}

/// A resolved layout: the device ids that must end up attached.
///
/// Every baseline device not in `targets` is switched off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutRequest {
    pub name: String,
    pub targets: BTreeSet<String>,
}

impl LayoutRequest {
    pub fn new(name: impl Into<String>, targets: impl IntoIterator<Item = String>) -> Self {
        Self {
            name: name.into(),
            targets: targets.into_iter().collect(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.targets.contains(id)
    }

    /// Number of devices expected to be attached afterwards.
    pub fn expected(&self) -> usize {
        self.targets.len()
    }
}

/// Outcome of a layout application.
///
/// Failure is data: a layout operation never returns an error, it returns a
/// result with `success == false` and a message explaining why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutResult {
    pub layout_name: String,
    pub success: bool,
    pub expected_active: usize,
    pub actual_active: usize,
    /// Attempts performed by the last application cycle.
    pub attempts: u32,
    pub message: String,
}

impl LayoutResult {
    /// Result of an application cycle that ran `attempts` times.
    ///
    /// `success` is decided by the caller: matching counts alone do not
    /// make a success if the wrong displays are attached.
    pub fn from_observation(
        name: &str,
        success: bool,
        expected: usize,
        actual: usize,
        attempts: u32,
    ) -> Self {
        let message = if success {
            format!("{}: {} display(s) active as expected.", name, actual)
        } else if expected == actual {
            format!(
                "{}: {} display(s) active, but not the requested ones.",
                name, actual
            )
        } else {
            format!(
                "{}: expected {} active display(s), but {} are active.",
                name, expected, actual
            )
        };
        Self {
            layout_name: name.to_string(),
            success,
            expected_active: expected,
            actual_active: actual,
            attempts,
            message,
        }
    }

    /// Result for a layout that could not be planned because no primary
    /// display is known.  No display was touched.
    pub fn no_primary(layout: Layout) -> Self {
        Self {
            layout_name: layout.name().to_string(),
            success: false,
            expected_active: 0,
            actual_active: 0,
            attempts: 0,
            message: format!(
                "{}: no primary display was found, nothing was changed.",
                layout.name()
            ),
        }
    }
}

/// A layout request travelling from a [`CommandSource`](crate::traits::CommandSource)
/// to the daemon loop, with the channel its result must be sent back on.
#[derive(Debug)]
pub struct LayoutCommand {
    pub layout: Layout,
    pub reply: mpsc::Sender<LayoutResult>,
}

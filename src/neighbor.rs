//! Spatial queries over the baseline: which display is the primary one and
//! which display sits above it.
//!
//! Coordinates follow the OS convention: the origin is the primary
//! display's top-left corner and `y` grows downwards, so "above" means a
//! smaller `y`.

use crate::display::BaselineDisplay;

/// The display flagged primary, or the first display if none is.
pub fn primary(displays: &[BaselineDisplay]) -> Option<&BaselineDisplay> {
    displays
        .iter()
        .find(|d| d.is_primary)
        .or_else(|| displays.first())
}

/// Find the display above `primary`.
///
/// A candidate is above if its horizontal center lies within the primary's
/// left/right span and its vertical center is above the primary's top edge.
/// The closest such candidate wins.  When none qualifies the topmost other
/// display is returned, so the result is `Some` whenever there are at least
/// two displays.  Ties go to the earlier display in enumeration order.
pub fn above<'a>(
    displays: &'a [BaselineDisplay],
    primary: &BaselineDisplay,
) -> Option<&'a BaselineDisplay> {
    let candidates = || displays.iter().filter(|d| d.id != primary.id);
    let cy = |d: &BaselineDisplay| d.bounds.center().1;

    let left = primary.bounds.left();
    let right = primary.bounds.right();
    let top = primary.bounds.top();

    // `min_by` keeps the first of equal elements; comparing in reverse
    // turns it into a first-wins maximum.
    candidates()
        .filter(|d| {
            let (x, y) = d.bounds.center();
            x >= left && x <= right && y < top
        })
        .min_by(|a, b| cy(b).total_cmp(&cy(a)))
        .or_else(|| candidates().min_by(|a, b| cy(a).total_cmp(&cy(b))))
}

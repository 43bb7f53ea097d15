//! The orchestrator that turns a [`Layout`] into display changes.
//!
//! [`LayoutSwitcher`] owns the backend and the baseline captured at
//! construction.  It plans a layout into a [`LayoutRequest`] (using the
//! [`neighbor`](crate::neighbor) queries), hands it to the
//! [`Applicator`], and for "main + above" adds a single compensating detour
//! through "all screens" when the direct attempt fails.
//!
//! [`dispatch`] runs a layout on a background thread and delivers the
//! result over a channel so the caller's thread stays responsive.

use crate::applicator::{ApplyPolicy, Applicator};
use crate::layout::{Layout, LayoutRequest, LayoutResult};
use crate::neighbor;
use crate::topology::{capture_baseline, Baseline};
use crate::traits::DisplayBackend;
use log::{info, warn};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

/// Plans and applies display layouts.
///
/// The switcher is generic over any [`DisplayBackend`], so the same code
/// drives the Win32 API and the simulator.
///
/// # Typical usage
///
/// ```ignore
/// let switcher = LayoutSwitcher::new(GdiBackend::new(), ApplyPolicy::default());
/// let result = switcher.apply_main_only();
/// println!("{}", result.message);
/// ```
pub struct LayoutSwitcher<B: DisplayBackend> {
    backend: B,
    baseline: Baseline,
    policy: ApplyPolicy,
}

impl<B: DisplayBackend> LayoutSwitcher<B> {
    /// Create a switcher, capturing the baseline from `backend` right away.
    pub fn new(backend: B, policy: ApplyPolicy) -> Self {
        let baseline = capture_baseline(&backend);
        Self::with_baseline(backend, baseline, policy)
    }

    /// Create a switcher around an already captured baseline.
    pub fn with_baseline(backend: B, baseline: Baseline, policy: ApplyPolicy) -> Self {
        Self {
            backend,
            baseline,
            policy,
        }
    }

    pub fn baseline(&self) -> &Baseline {
        &self.baseline
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Resolve `layout` into the set of displays that must be on.
    ///
    /// Returns `None` when the baseline is empty; nothing can be planned
    /// without a primary display.
    pub fn plan(&self, layout: Layout) -> Option<LayoutRequest> {
        let displays = self.baseline.displays();
        let primary = neighbor::primary(displays)?;
        let targets: Vec<String> = match layout {
            Layout::MainOnly => vec![primary.id.clone()],
            Layout::MainAndAbove => match neighbor::above(displays, primary) {
                Some(above) => vec![primary.id.clone(), above.id.clone()],
                None => vec![primary.id.clone()],
            },
            Layout::AllScreens => self.baseline.ids().map(str::to_string).collect(),
        };
        Some(LayoutRequest::new(layout.name(), targets))
    }

    /// Apply one of the predefined layouts.
    pub fn apply(&self, layout: Layout) -> LayoutResult {
        let Some(request) = self.plan(layout) else {
            warn!("{}: baseline has no displays, not touching anything", layout);
            return LayoutResult::no_primary(layout);
        };
        match layout {
            Layout::MainAndAbove => self.apply_with_fallback(&request),
            Layout::MainOnly | Layout::AllScreens => self.apply_request(&request),
        }
    }

    /// Switch to the primary display only.
    pub fn apply_main_only(&self) -> LayoutResult {
        self.apply(Layout::MainOnly)
    }

    /// Switch to the primary display plus the display above it.
    pub fn apply_main_and_above(&self) -> LayoutResult {
        self.apply(Layout::MainAndAbove)
    }

    /// Switch every baseline display on.
    pub fn apply_all_screens(&self) -> LayoutResult {
        self.apply(Layout::AllScreens)
    }

    /// Run one full application cycle for `request`.
    pub fn apply_request(&self, request: &LayoutRequest) -> LayoutResult {
        Applicator::new(&self.backend, &self.baseline, &self.policy).apply(request)
    }

    /// Apply `request`; if that fails, switch everything on and try once
    /// more.  Some drivers refuse to re-enable a secondary display while
    /// only one display is attached, but accept it from the all-on state.
    fn apply_with_fallback(&self, request: &LayoutRequest) -> LayoutResult {
        let direct = self.apply_request(request);
        if direct.success || !self.policy.fallback_enabled {
            return direct;
        }

        info!(
            "{}: direct attempt failed, detouring through all screens",
            request.name
        );
        let all = LayoutRequest::new(
            Layout::AllScreens.name(),
            self.baseline.ids().map(str::to_string),
        );
        let detour = self.apply_request(&all);
        if !detour.success {
            warn!("detour did not settle: {}", detour.message);
        }

        self.apply_request(request)
    }
}

/// Apply `layout` on a background thread and send the result to `reply`.
///
/// If the receiving end is gone the result is dropped.
pub fn dispatch_to<B>(
    switcher: Arc<LayoutSwitcher<B>>,
    layout: Layout,
    reply: mpsc::Sender<LayoutResult>,
) -> JoinHandle<()>
where
    B: DisplayBackend + Send + Sync + 'static,
{
    std::thread::spawn(move || {
        let result = switcher.apply(layout);
        if reply.send(result).is_err() {
            warn!("{}: nobody is waiting for the result", layout);
        }
    })
}

/// Apply `layout` on a background thread; the result arrives on the
/// returned receiver.
pub fn dispatch<B>(
    switcher: Arc<LayoutSwitcher<B>>,
    layout: Layout,
) -> mpsc::Receiver<LayoutResult>
where
    B: DisplayBackend + Send + Sync + 'static,
{
    let (tx, rx) = mpsc::channel();
    dispatch_to(switcher, layout, tx);
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{DeviceInfo, DisplayMode, ModeSource};
    use crate::sim::{DriverQuirk, SimDisplay, SimulatedBackend};
    use std::cell::RefCell;
    use std::collections::BTreeSet;
    use std::time::Duration;

    const D1: &str = r"\\.\DISPLAY1";
    const D2: &str = r"\\.\DISPLAY2";
    const D3: &str = r"\\.\DISPLAY3";

    fn fast_policy() -> ApplyPolicy {
        ApplyPolicy {
            settle_delay: Duration::ZERO,
            ..ApplyPolicy::default()
        }
    }

    fn switcher(sim: SimulatedBackend) -> LayoutSwitcher<SimulatedBackend> {
        LayoutSwitcher::new(sim, fast_policy())
    }

    fn attached(s: &LayoutSwitcher<SimulatedBackend>) -> BTreeSet<String> {
        s.backend().attached().into_iter().collect()
    }

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    /// Backend that records every mutating call and reports no devices.
    #[derive(Debug, Default)]
    struct EmptyBackend {
        mutations: RefCell<usize>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("empty backend error")]
    struct EmptyErr;

    impl DisplayBackend for EmptyBackend {
        type Error = EmptyErr;

        fn device(&self, _index: u32) -> Option<DeviceInfo> {
            None
        }

        fn mode(&self, _device: &str, _source: ModeSource) -> Option<DisplayMode> {
            None
        }

        fn submit_mode(&self, _device: &str, _mode: &DisplayMode) -> Result<(), EmptyErr> {
            *self.mutations.borrow_mut() += 1;
            Ok(())
        }

        fn commit(&self) -> Result<(), EmptyErr> {
            *self.mutations.borrow_mut() += 1;
            Ok(())
        }
    }

    //  Planning

    #[test]
    fn plans_follow_the_baseline() {
        let s = switcher(SimulatedBackend::desk(3));
        assert_eq!(s.plan(Layout::MainOnly).unwrap().targets, set(&[D1]));
        assert_eq!(s.plan(Layout::MainAndAbove).unwrap().targets, set(&[D1, D2]));
        assert_eq!(s.plan(Layout::AllScreens).unwrap().targets, set(&[D1, D2, D3]));
        assert_eq!(s.plan(Layout::MainAndAbove).unwrap().name, "Main + above");
    }

    #[test]
    fn main_and_above_on_single_display_is_main_only() {
        let s = switcher(SimulatedBackend::desk(1));
        assert_eq!(s.plan(Layout::MainAndAbove).unwrap().targets, set(&[D1]));
    }

    //  No-primary guard

    #[test]
    fn empty_baseline_touches_nothing() {
        let s = LayoutSwitcher::new(EmptyBackend::default(), fast_policy());
        assert!(s.baseline().is_empty());
        for result in [
            s.apply_main_only(),
            s.apply_main_and_above(),
            s.apply_all_screens(),
        ] {
            assert!(!result.success);
            assert_eq!(result.expected_active, 0);
            assert_eq!(result.actual_active, 0);
            assert!(result.message.contains("no primary display"));
        }
        assert_eq!(*s.backend().mutations.borrow(), 0);
    }

    //  Single layouts

    #[test]
    fn main_only_on_single_display_succeeds_first_try() {
        let s = switcher(SimulatedBackend::desk(1));
        let r = s.apply_main_only();
        assert!(r.success);
        assert_eq!((r.expected_active, r.actual_active), (1, 1));
        assert_eq!(r.attempts, 1);
        assert_eq!(s.backend().commit_count(), 1);
    }

    #[test]
    fn layouts_switch_the_right_displays() {
        let s = switcher(SimulatedBackend::desk(3));

        let r = s.apply_main_only();
        assert!(r.success, "{}", r.message);
        assert_eq!(attached(&s), set(&[D1]));

        let r = s.apply_main_and_above();
        assert!(r.success, "{}", r.message);
        assert_eq!(attached(&s), set(&[D1, D2]));

        let r = s.apply_all_screens();
        assert!(r.success, "{}", r.message);
        assert_eq!(attached(&s), set(&[D1, D2, D3]));
        assert_eq!(r.layout_name, "All screens");
    }

    #[test]
    fn baseline_is_not_changed_by_layouts() {
        let s = switcher(SimulatedBackend::desk(3));
        let before = s.baseline().clone();
        s.apply_main_only();
        s.apply_all_screens();
        assert_eq!(s.baseline(), &before);
    }

    //  Fallback detour

    #[test]
    fn no_detour_when_direct_attempt_succeeds() {
        let s = switcher(SimulatedBackend::desk(3));
        let r = s.apply_main_and_above();
        assert!(r.success);
        // One commit per attempt: the direct cycle needed exactly one.
        assert_eq!(s.backend().commit_count(), 1);
    }

    #[test]
    fn detour_recovers_stuck_secondary() {
        let mut sim = SimulatedBackend::desk(3);
        sim.set_quirk(DriverQuirk::StuckOnSingle);
        let s = switcher(sim);

        assert!(s.apply_main_only().success);
        let before = s.backend().commit_count();

        let r = s.apply_main_and_above();
        assert!(r.success, "{}", r.message);
        assert_eq!(attached(&s), set(&[D1, D2]));
        // 3 failed direct attempts, 1 all-screens attempt, 1 retry.
        assert_eq!(s.backend().commit_count() - before, 5);
        assert_eq!(r.attempts, 1);
    }

    #[test]
    fn detour_failure_is_surfaced_as_is() {
        let s = switcher(SimulatedBackend::desk(3).with_quirk(DriverQuirk::SingleActivation));
        let r = s.apply_main_and_above();
        assert!(!r.success);
        assert_eq!(r.layout_name, "Main + above");
        assert_eq!((r.expected_active, r.actual_active), (2, 1));
        // Direct cycle, detour cycle, retry cycle: 3 attempts each.
        assert_eq!(s.backend().commit_count(), 9);
    }

    #[test]
    fn detour_can_be_disabled() {
        let sim = SimulatedBackend::desk(3).with_quirk(DriverQuirk::SingleActivation);
        let policy = ApplyPolicy {
            fallback_enabled: false,
            ..fast_policy()
        };
        let s = LayoutSwitcher::new(sim, policy);
        let r = s.apply_main_and_above();
        assert!(!r.success);
        assert_eq!(s.backend().commit_count(), 3);
    }

    #[test]
    fn main_only_never_detours() {
        let s = switcher(SimulatedBackend::desk(2).with_quirk(DriverQuirk::RejectCommit));
        let r = s.apply_main_only();
        assert!(!r.success);
        assert_eq!(s.backend().commit_count(), 3);
    }

    //  Background dispatch

    #[test]
    fn dispatch_delivers_result_over_channel() {
        let s = Arc::new(switcher(SimulatedBackend::new(vec![
            SimDisplay::new("A", 0, 0, 1920, 1080).primary(),
            SimDisplay::new("B", 0, -1080, 1920, 1080),
        ])));
        let rx = dispatch(Arc::clone(&s), Layout::MainOnly);
        let r = rx.recv().unwrap();
        assert!(r.success);
        assert_eq!(r.layout_name, "Main only");
        assert_eq!(s.backend().attached(), vec!["A".to_string()]);
    }

    #[test]
    fn dispatch_to_survives_dropped_receiver() {
        let s = Arc::new(switcher(SimulatedBackend::desk(2)));
        let (tx, rx) = mpsc::channel();
        drop(rx);
        dispatch_to(Arc::clone(&s), Layout::AllScreens, tx)
            .join()
            .unwrap();
        assert_eq!(s.backend().commit_count(), 1);
    }
}

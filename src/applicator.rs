//! Applies a [`LayoutRequest`] and verifies the outcome.
//!
//! Some display drivers only honour part of a multi-monitor change per
//! commit.  The [`Applicator`] therefore runs a bounded retry loop: every
//! attempt submits a mode for *every* baseline display (its baseline mode if
//! it should be on, a zero-size mode at its baseline position if it should
//! be off), commits once, waits a fixed settle delay and re-reads the
//! runtime state.  The loop stops as soon as the attached set matches the
//! request.
//!
//! ```text
//!   Attempting(1) ──match──▶ Succeeded
//!        │ mismatch
//!        ▼
//!   Attempting(2) ──match──▶ Succeeded
//!        │ ...
//!        ▼
//!   ExhaustedRetries
//! ```

use crate::display::{BaselineDisplay, DisplayMode, ModeFields, RuntimeDisplay};
use crate::layout::{LayoutRequest, LayoutResult};
use crate::topology::{probe_runtime, Baseline};
use crate::traits::DisplayBackend;
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::time::Duration;

/// Retry and fallback knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyPolicy {
    /// Attempts per application cycle (at least one is always made).
    pub max_attempts: u32,
    /// Wait between committing and probing.
    pub settle_delay: Duration,
    /// Whether "main + above" may detour through "all screens" on failure.
    pub fallback_enabled: bool,
    /// Resolution used when a display's baseline mode has no size.
    pub fallback_width: u32,
    pub fallback_height: u32,
}

impl Default for ApplyPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            settle_delay: Duration::from_millis(300),
            fallback_enabled: true,
            fallback_width: 1024,
            fallback_height: 768,
        }
    }
}

/// State of the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    /// Attempt `n` (1-based) is running.
    Attempting(u32),
    Succeeded,
    ExhaustedRetries,
}

/// Observation made after one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Observation {
    attached: BTreeSet<String>,
}

/// Drives a backend towards a requested active set.
pub struct Applicator<'a, B: DisplayBackend> {
    backend: &'a B,
    baseline: &'a Baseline,
    policy: &'a ApplyPolicy,
}

impl<'a, B: DisplayBackend> Applicator<'a, B> {
    pub fn new(backend: &'a B, baseline: &'a Baseline, policy: &'a ApplyPolicy) -> Self {
        Self {
            backend,
            baseline,
            policy,
        }
    }

    /// Apply `request`, retrying until the attached set matches or the
    /// attempt budget runs out.
    pub fn apply(&self, request: &LayoutRequest) -> LayoutResult {
        self.run(request).1
    }

    /// Like [`apply`](Self::apply), also returning the terminal state.
    pub fn run(&self, request: &LayoutRequest) -> (AttemptState, LayoutResult) {
        let max_attempts = self.policy.max_attempts.max(1);
        let expected = request.expected();
        info!(
            "applying {:?}: targets {:?} ({} of {} display(s))",
            request.name,
            request.targets,
            expected,
            self.baseline.len()
        );

        let mut state = AttemptState::Attempting(1);
        let mut last = Observation {
            attached: BTreeSet::new(),
        };
        let mut attempts = 0;

        while let AttemptState::Attempting(n) = state {
            attempts = n;
            last = self.attempt(request, n, max_attempts);
            state = if last.attached == request.targets {
                AttemptState::Succeeded
            } else if n >= max_attempts {
                AttemptState::ExhaustedRetries
            } else {
                AttemptState::Attempting(n + 1)
            };
        }

        let actual = last.attached.len();
        let result = LayoutResult::from_observation(
            &request.name,
            state == AttemptState::Succeeded,
            expected,
            actual,
            attempts,
        );
        if result.success {
            info!("{} (after {} attempt(s))", result.message, attempts);
        } else {
            warn!("{} (gave up after {} attempt(s))", result.message, attempts);
        }
        (state, result)
    }

    /// The mode to submit for `display`.
    fn target_mode(&self, display: &BaselineDisplay, active: bool) -> DisplayMode {
        if !active {
            return display.mode.disabled();
        }
        let mut mode = display.mode;
        if mode.is_degenerate() {
            mode.width = self.policy.fallback_width;
            mode.height = self.policy.fallback_height;
        }
        mode.fields = ModeFields::LAYOUT;
        mode
    }

    fn attempt(&self, request: &LayoutRequest, n: u32, max_attempts: u32) -> Observation {
        debug!("attempt {}/{} for {:?}", n, max_attempts, request.name);

        for display in self.baseline.displays() {
            let active = request.contains(&display.id);
            let mode = self.target_mode(display, active);
            debug!(
                "  submit {} {}: {}",
                display.id,
                if active { "on" } else { "off" },
                mode
            );
            if let Err(e) = self.backend.submit_mode(&display.id, &mode) {
                warn!("  submit {} failed: {}", display.id, e);
            }
        }
        if let Err(e) = self.backend.commit() {
            warn!("  commit failed: {}", e);
        }

        if !self.policy.settle_delay.is_zero() {
            std::thread::sleep(self.policy.settle_delay);
        }

        let runtime: Vec<RuntimeDisplay> = probe_runtime(self.backend);
        for d in &runtime {
            debug!("  runtime {}", d);
        }
        let attached: BTreeSet<String> = runtime
            .into_iter()
            .filter(|d| d.attached)
            .map(|d| d.id)
            .collect();
        info!(
            "attempt {}/{} for {:?}: {} of {} expected display(s) active",
            n,
            max_attempts,
            request.name,
            attached.len(),
            request.expected()
        );
        Observation { attached }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::ModeSource;
    use crate::sim::{DriverQuirk, SimDisplay, SimulatedBackend};
    use crate::topology::capture_baseline;

    fn fast_policy() -> ApplyPolicy {
        ApplyPolicy {
            settle_delay: Duration::ZERO,
            ..ApplyPolicy::default()
        }
    }

    fn request(ids: &[&str]) -> LayoutRequest {
        LayoutRequest::new("test", ids.iter().map(|s| s.to_string()))
    }

    const D1: &str = r"\\.\DISPLAY1";
    const D2: &str = r"\\.\DISPLAY2";
    const D3: &str = r"\\.\DISPLAY3";

    #[test]
    fn default_policy() {
        let p = ApplyPolicy::default();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.settle_delay, Duration::from_millis(300));
        assert!(p.fallback_enabled);
        assert_eq!((p.fallback_width, p.fallback_height), (1024, 768));
    }

    #[test]
    fn cooperative_driver_succeeds_first_attempt() {
        let sim = SimulatedBackend::desk(3);
        let baseline = capture_baseline(&sim);
        let policy = fast_policy();
        let (state, result) = Applicator::new(&sim, &baseline, &policy).run(&request(&[D1]));
        assert_eq!(state, AttemptState::Succeeded);
        assert!(result.success);
        assert_eq!((result.expected_active, result.actual_active), (1, 1));
        assert_eq!(result.attempts, 1);
        assert_eq!(sim.attached(), vec![D1.to_string()]);
        // Every baseline display is submitted, then one commit.
        assert_eq!((sim.submit_count(), sim.commit_count()), (3, 1));
    }

    #[test]
    fn applying_twice_is_idempotent() {
        let sim = SimulatedBackend::desk(3);
        let baseline = capture_baseline(&sim);
        let policy = fast_policy();
        let applicator = Applicator::new(&sim, &baseline, &policy);
        let req = request(&[D1, D2]);

        let first = applicator.apply(&req);
        let second = applicator.apply(&req);
        assert_eq!(first.actual_active, 2);
        assert_eq!(second.actual_active, 2);
        assert!(first.success && second.success);
        assert_eq!(sim.attached(), vec![D1.to_string(), D2.to_string()]);
    }

    #[test]
    fn success_means_exactly_the_requested_set() {
        let sim = SimulatedBackend::desk(4);
        let baseline = capture_baseline(&sim);
        let policy = fast_policy();
        let req = request(&[D1, D3]);
        let result = Applicator::new(&sim, &baseline, &policy).apply(&req);
        assert!(result.success);
        let attached: BTreeSet<String> = probe_runtime(&sim)
            .into_iter()
            .filter(|d| d.attached)
            .map(|d| d.id)
            .collect();
        assert_eq!(attached, req.targets);
    }

    #[test]
    fn partial_driver_completes_on_retry() {
        let sim = SimulatedBackend::desk(3).with_quirk(DriverQuirk::OneActivationPerCommit);
        let baseline = capture_baseline(&sim);
        let policy = fast_policy();
        let applicator = Applicator::new(&sim, &baseline, &policy);

        assert!(applicator.apply(&request(&[D1])).success);
        let (state, result) = applicator.run(&request(&[D1, D2, D3]));
        assert_eq!(state, AttemptState::Succeeded);
        assert_eq!(result.attempts, 2);
        assert_eq!(result.actual_active, 3);
    }

    #[test]
    fn retry_budget_is_bounded() {
        let sim = SimulatedBackend::desk(3).with_quirk(DriverQuirk::SingleActivation);
        let baseline = capture_baseline(&sim);
        let policy = fast_policy();
        let (state, result) =
            Applicator::new(&sim, &baseline, &policy).run(&request(&[D1, D2, D3]));
        assert_eq!(state, AttemptState::ExhaustedRetries);
        assert!(!result.success);
        assert_eq!(result.attempts, 3);
        assert_eq!(sim.commit_count(), 3);
        assert_eq!((result.expected_active, result.actual_active), (3, 1));
        assert!(result.message.contains("expected 3"));
    }

    #[test]
    fn attempt_budget_comes_from_policy() {
        let sim = SimulatedBackend::desk(2).with_quirk(DriverQuirk::RejectCommit);
        let baseline = capture_baseline(&sim);
        let policy = ApplyPolicy {
            max_attempts: 5,
            ..fast_policy()
        };
        let result = Applicator::new(&sim, &baseline, &policy).apply(&request(&[D1]));
        assert!(!result.success);
        assert_eq!(result.attempts, 5);
        assert_eq!(sim.commit_count(), 5);
        assert_eq!(result.actual_active, 2);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let sim = SimulatedBackend::desk(2);
        let baseline = capture_baseline(&sim);
        let policy = ApplyPolicy {
            max_attempts: 0,
            ..fast_policy()
        };
        let result = Applicator::new(&sim, &baseline, &policy).apply(&request(&[D1]));
        assert!(result.success);
        assert_eq!(sim.commit_count(), 1);
    }

    #[test]
    fn disabled_display_keeps_baseline_position() {
        let sim = SimulatedBackend::desk(2);
        let baseline = capture_baseline(&sim);
        let policy = fast_policy();
        Applicator::new(&sim, &baseline, &policy).apply(&request(&[D1]));
        let reg = sim.mode(D2, ModeSource::Registry).unwrap();
        assert_eq!((reg.x, reg.y), (0, -1080));

        // Switching back on reuses the baseline geometry.
        Applicator::new(&sim, &baseline, &policy).apply(&request(&[D1, D2]));
        let cur = sim.mode(D2, ModeSource::Current).unwrap();
        assert_eq!((cur.x, cur.y, cur.width, cur.height), (0, -1080, 1920, 1080));
    }

    #[test]
    fn degenerate_baseline_mode_uses_fallback_resolution() {
        let sim = SimulatedBackend::new(vec![
            SimDisplay::new("A", 0, 0, 1920, 1080).primary(),
            SimDisplay::new("B", 1920, 0, 0, 0).detached(),
        ]);
        let baseline = capture_baseline(&sim);
        let policy = fast_policy();
        let req = LayoutRequest::new("both", vec!["A".to_string(), "B".to_string()]);
        let result = Applicator::new(&sim, &baseline, &policy).apply(&req);
        assert!(result.success);
        let b = sim.mode("B", ModeSource::Current).unwrap();
        assert_eq!((b.x, b.width, b.height), (1920, 1024, 768));
    }

    #[test]
    fn right_count_wrong_devices_is_a_failure() {
        // B never comes back on; C is left on by an outside actor.
        let sim = SimulatedBackend::new(vec![
            SimDisplay::new("A", 0, 0, 1920, 1080).primary(),
            SimDisplay::new("B", 0, -1080, 1920, 1080).unqueryable(),
            SimDisplay::new("C", 1920, 0, 1920, 1080),
        ]);
        let baseline = Baseline::new(vec![
            capture_baseline(&sim).get("A").cloned().unwrap(),
            BaselineDisplay {
                id: "B".into(),
                is_primary: false,
                bounds: Default::default(),
                mode: DisplayMode::default(),
            },
        ]);
        let policy = fast_policy();
        let req = LayoutRequest::new("pair", vec!["A".to_string(), "B".to_string()]);
        let result = Applicator::new(&sim, &baseline, &policy).apply(&req);
        assert!(!result.success);
        assert_eq!((result.expected_active, result.actual_active), (2, 2));
        assert!(result.message.contains("not the requested ones"));
    }
}

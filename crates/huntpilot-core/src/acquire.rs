//! Target acquisition state machine.
//!
//! A synthetic pointer move does not immediately produce a correct hover
//! indicator in the host; the cursor feedback updates asynchronously relative
//! to the dispatched event. This sequencer bridges that latency without
//! clicking blindly and without blocking: move, wait a bounded settle delay,
//! probe the cursor, then either click, retry under a budget, or give up.
//!
//! The machine is poll-driven. Callers hand it the host surface and the
//! current time; deferred work is represented as deadline records stamped
//! with the generation of the request that scheduled them. Superseding a
//! request does not cancel its deadlines — they no-op when they fire because
//! their generation no longer matches. That check is the entire cancellation
//! mechanism, so a stale settle timer can never produce a click for a
//! displaced request.

use std::time::{Duration, Instant};

use rand::Rng;

use crate::host::HostSurface;
use crate::input::{self, ScreenPoint};
use crate::probe::CursorProbe;
use crate::queue::{RequestQueue, TargetRequest};
use serde::{Deserialize, Serialize};

/// Phase of the in-flight attempt. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    Idle,
    Moving,
    AwaitingCursor,
    Confirmed,
    Clicking,
    Aborted,
}

/// Bounds retries for a single request.
#[derive(Debug, Clone, Copy)]
pub struct RetryBudget {
    pub max_tries: u32,
    pub current_tries: u32,
}

impl RetryBudget {
    fn new(max_tries: u32) -> Self {
        Self {
            max_tries,
            current_tries: 0,
        }
    }

    fn exhausted(&self) -> bool {
        self.current_tries >= self.max_tries
    }
}

/// Caller-visible result of one request.
///
/// Superseded requests produce no outcome; displacement is a normal
/// transition, not a failure. Whether a lost target should be resubmitted is
/// the caller's decision — the machine never retries across requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A click pair was dispatched at the point. `tries` is 0 for manual
    /// (unconditional) clicks, otherwise the number of confirmation passes
    /// used.
    Clicked { point: ScreenPoint, tries: u32 },
    /// Retries exhausted without the cursor ever confirming the target.
    TargetLost { point: ScreenPoint, tries: u32 },
}

/// A deferred callback: fire at `fire_at`, but only if `generation` still
/// matches the active request.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    fire_at: Instant,
    generation: u64,
}

/// The move→confirm→click sequencer.
pub struct TargetAcquisition {
    probe: CursorProbe,
    settle_delay: Duration,
    max_tries: u32,
    jitter_px: i32,
    state: AttemptState,
    request: Option<TargetRequest>,
    budget: RetryBudget,
    deadlines: Vec<Deadline>,
}

impl TargetAcquisition {
    pub fn new(probe: CursorProbe, settle_delay: Duration, max_tries: u32, jitter_px: i32) -> Self {
        Self {
            probe,
            settle_delay,
            max_tries: max_tries.max(1),
            jitter_px,
            state: AttemptState::Idle,
            request: None,
            budget: RetryBudget::new(1),
            deadlines: Vec::new(),
        }
    }

    /// Current attempt phase.
    pub fn state(&self) -> AttemptState {
        self.state
    }

    /// Generation of the active request (0 when idle).
    pub fn generation(&self) -> u64 {
        self.request.map_or(0, |r| r.generation)
    }

    /// Confirmation passes used by the active request.
    pub fn tries(&self) -> u32 {
        self.budget.current_tries
    }

    /// Advance the machine: consume a newer request if one is pending, then
    /// fire any due deadlines.
    ///
    /// Never panics and never errors; a detached host drops the current
    /// request and the machine returns to `Idle`.
    pub fn poll<H: HostSurface>(
        &mut self,
        queue: &mut RequestQueue,
        host: &mut H,
        now: Instant,
    ) -> Option<Outcome> {
        // Last write wins: a pending request always displaces the in-flight
        // attempt, whatever state it is in.
        if let Some(request) = queue.take() {
            if let Some(outcome) = self.begin(request, host, now) {
                return Some(outcome);
            }
        }

        // Fire due deadlines in scheduling order. Stale generations no-op.
        let mut index = 0;
        while index < self.deadlines.len() {
            if self.deadlines[index].fire_at > now {
                index += 1;
                continue;
            }
            let deadline = self.deadlines.remove(index);
            if Some(deadline.generation) != self.request.map(|r| r.generation) {
                // A displaced request's timer firing after supersession.
                continue;
            }
            if let Some(outcome) = self.on_settle(host, now) {
                return Some(outcome);
            }
        }

        None
    }

    /// Start an attempt for a freshly consumed request.
    fn begin<H: HostSurface>(
        &mut self,
        request: TargetRequest,
        host: &mut H,
        now: Instant,
    ) -> Option<Outcome> {
        self.request = Some(request);
        self.budget = RetryBudget::new(self.max_tries);
        self.state = AttemptState::Moving;

        if !host.dispatch(&input::move_to(request.point)) {
            self.drop_detached();
            return None;
        }

        if !request.check_mob {
            // Manual mode: no confirmation pass, click deterministically.
            self.state = AttemptState::Clicking;
            let [down, up] = input::click_pair(request.point);
            if !host.dispatch(&down) || !host.dispatch(&up) {
                self.drop_detached();
                return None;
            }
            let point = request.point;
            self.reset();
            return Some(Outcome::Clicked { point, tries: 0 });
        }

        self.budget.current_tries = 1;
        self.await_cursor(request.generation, now);
        None
    }

    /// Settle boundary reached for the active request: trust the probe.
    fn on_settle<H: HostSurface>(&mut self, host: &mut H, now: Instant) -> Option<Outcome> {
        let request = self.request?;
        if self.state != AttemptState::AwaitingCursor {
            return None;
        }

        if self.probe.is_targetable(host) {
            self.state = AttemptState::Confirmed;
            return self.click(request.point, host);
        }

        if self.budget.exhausted() {
            self.state = AttemptState::Aborted;
            let tries = self.budget.current_tries;
            let point = request.point;
            self.reset();
            return Some(Outcome::TargetLost { point, tries });
        }

        // Not confirmed yet: nudge the pointer again and wait another settle
        // window. The re-dispatch gives the host a fresh hover computation.
        self.budget.current_tries += 1;
        self.state = AttemptState::Moving;
        if !host.dispatch(&input::move_to(self.jittered(request.point))) {
            self.drop_detached();
            return None;
        }
        self.await_cursor(request.generation, now);
        None
    }

    /// Dispatch the one-shot click pair for a confirmed target.
    fn click<H: HostSurface>(&mut self, point: ScreenPoint, host: &mut H) -> Option<Outcome> {
        self.state = AttemptState::Clicking;
        let [down, up] = input::click_pair(point);
        if !host.dispatch(&down) || !host.dispatch(&up) {
            self.drop_detached();
            return None;
        }
        let tries = self.budget.current_tries;
        self.reset();
        Some(Outcome::Clicked { point, tries })
    }

    fn await_cursor(&mut self, generation: u64, now: Instant) {
        self.state = AttemptState::AwaitingCursor;
        self.deadlines.push(Deadline {
            fire_at: now + self.settle_delay,
            generation,
        });
    }

    fn jittered(&self, point: ScreenPoint) -> ScreenPoint {
        if self.jitter_px <= 0 {
            return point;
        }
        let mut rng = rand::thread_rng();
        ScreenPoint::new(
            point.x + rng.gen_range(-self.jitter_px..=self.jitter_px),
            point.y + rng.gen_range(-self.jitter_px..=self.jitter_px),
        )
    }

    /// Host missing or detached: fatal to the current request only.
    fn drop_detached(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        self.request = None;
        self.state = AttemptState::Idle;
    }
}

//! The driver: the daemon's single control task.
//!
//! All targeting state lives here — the coalescing queue, the acquisition
//! state machine, the rotation, and the bridge handle. The task interleaves
//! two sources of work: control commands from the server and a periodic
//! tick. Nothing else touches the host surface, so the single-threaded
//! model the state machine assumes holds by construction (the overlay
//! forwarding that also writes to the host runs on this same task, during
//! the tick's inbox drain).

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use huntpilot_core::acquire::{Outcome, TargetAcquisition};
use huntpilot_core::config::Profile;
use huntpilot_core::host;
use huntpilot_core::host::HostSurface;
use huntpilot_core::input::{self, ScreenPoint, SyntheticEvent};
use huntpilot_core::probe::CursorProbe;
use huntpilot_core::protocol::DriverStatus;
use huntpilot_core::queue::RequestQueue;
use huntpilot_core::rotation::ActionRotation;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::daemon::bridge::{BridgeHandle, BridgeInbound};

/// How long debug markers stay on the overlay.
const MARKER_TTL_MS: u64 = 1000;

/// Pattern for `wait-cursor`.
pub enum CursorPattern {
    Literal(String),
    Regex(regex::Regex),
}

impl CursorPattern {
    fn matches(&self, token: &str) -> bool {
        match self {
            CursorPattern::Literal(needle) => token.contains(needle),
            CursorPattern::Regex(re) => re.is_match(token),
        }
    }
}

/// Reply to a `wait-cursor` request.
#[derive(Debug)]
pub struct WaitCursorReply {
    pub matched: bool,
    pub token: Option<String>,
    pub elapsed_ms: u64,
}

/// Commands the server forwards into the driver.
pub enum DriverCommand {
    Target { point: ScreenPoint },
    Click { point: ScreenPoint },
    Slot { bar: u8, index: usize },
    Key { key: String, hold_ms: Option<u64> },
    Chat { text: String },
    SetRotation { enabled: bool },
    WaitCursor {
        pattern: CursorPattern,
        timeout: Duration,
        reply: oneshot::Sender<WaitCursorReply>,
    },
    Status { reply: oneshot::Sender<DriverStatus> },
}

struct CursorWaiter {
    pattern: CursorPattern,
    started: Instant,
    deadline: Instant,
    reply: oneshot::Sender<WaitCursorReply>,
}

/// Handle for submitting commands to a running driver.
pub type DriverHandle = mpsc::UnboundedSender<DriverCommand>;

/// Spawn the driver task.
pub fn spawn(bridge: BridgeHandle, profile: &Profile) -> DriverHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let driver = Driver::new(bridge, profile);
    tokio::spawn(driver.run(rx));
    tx
}

struct Driver {
    bridge: BridgeHandle,
    queue: RequestQueue,
    acquisition: TargetAcquisition,
    rotation: ActionRotation,
    rotation_enabled: bool,
    tick_interval: Duration,
    hp_percent: Option<u8>,
    pending_releases: Vec<(Instant, SyntheticEvent)>,
    waiters: Vec<CursorWaiter>,
    clicks: u64,
    targets_lost: u64,
    last_outcome: Option<String>,
    started_at: DateTime<Utc>,
}

impl Driver {
    fn new(bridge: BridgeHandle, profile: &Profile) -> Self {
        let tuning = profile.tuning();
        let probe = CursorProbe::new(tuning.attack_cursor_marker());
        let acquisition = TargetAcquisition::new(
            probe,
            tuning.settle_delay(),
            tuning.max_tries(),
            tuning.retry_jitter_px(),
        );
        let rotation = ActionRotation::new(profile.slot_bar(), profile.action_slots());

        Self {
            bridge,
            queue: RequestQueue::new(),
            acquisition,
            rotation,
            rotation_enabled: profile.rotation_enabled(),
            tick_interval: tuning.tick_interval(),
            hp_percent: None,
            pending_releases: Vec::new(),
            waiters: Vec::new(),
            clicks: 0,
            targets_lost: 0,
            last_outcome: None,
            started_at: Utc::now(),
        }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<DriverCommand>) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!("Driver started (tick interval {:?})", self.tick_interval);

        loop {
            tokio::select! {
                command = rx.recv() => {
                    match command {
                        Some(command) => self.handle_command(command),
                        None => {
                            info!("Driver command channel closed, stopping");
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    self.tick(Instant::now());
                }
            }
        }
    }

    fn handle_command(&mut self, command: DriverCommand) {
        let now = Instant::now();
        match command {
            DriverCommand::Target { point } => {
                let generation = self.queue.push(point, true, now);
                debug!("Target request {:?} queued as generation {}", point, generation);
            }
            DriverCommand::Click { point } => {
                let generation = self.queue.push(point, false, now);
                debug!("Manual click {:?} queued as generation {}", point, generation);
            }
            DriverCommand::Slot { bar, index } => {
                self.fire_slot(bar, index);
            }
            DriverCommand::Key { key, hold_ms } => match hold_ms {
                Some(ms) => {
                    let [down, up] = input::key_press(&key);
                    if self.bridge.dispatch(&down) {
                        self.pending_releases
                            .push((now + Duration::from_millis(ms), up));
                    }
                }
                None => {
                    for event in input::key_press(&key) {
                        if !self.bridge.dispatch(&event) {
                            break;
                        }
                    }
                }
            },
            DriverCommand::Chat { text } => {
                if !self.bridge.chat(&text) {
                    warn!("Dropping chat text, bridge not connected");
                }
            }
            DriverCommand::SetRotation { enabled } => {
                info!("Rotation {}", if enabled { "enabled" } else { "disabled" });
                self.rotation_enabled = enabled;
            }
            DriverCommand::WaitCursor {
                pattern,
                timeout,
                reply,
            } => {
                // Answer immediately when the current token already matches.
                if let Some(token) = self.bridge.cursor_token() {
                    if pattern.matches(&token) {
                        let _ = reply.send(WaitCursorReply {
                            matched: true,
                            token: Some(token),
                            elapsed_ms: 0,
                        });
                        return;
                    }
                }
                self.waiters.push(CursorWaiter {
                    pattern,
                    started: now,
                    deadline: now + timeout,
                    reply,
                });
            }
            DriverCommand::Status { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }

    /// One scheduler tick: drain observed state, then advance the machines.
    fn tick(&mut self, now: Instant) {
        while let Some(message) = self.bridge.try_recv() {
            match message {
                BridgeInbound::Input(event) => {
                    // Overlay passthrough: rebuild and re-emit on the host.
                    host::forward(&mut self.bridge, &event);
                }
                BridgeInbound::Vitals(hp) => {
                    self.hp_percent = Some(hp);
                }
            }
        }

        // Deferred key releases from held keys.
        let mut index = 0;
        while index < self.pending_releases.len() {
            if self.pending_releases[index].0 <= now {
                let (_, event) = self.pending_releases.remove(index);
                self.bridge.dispatch(&event);
            } else {
                index += 1;
            }
        }

        if let Some(outcome) = self.acquisition.poll(&mut self.queue, &mut self.bridge, now) {
            self.record_outcome(outcome);
        }

        if self.rotation_enabled {
            if let Some(slot) = self.rotation.tick(&mut self.bridge, self.hp_percent, now) {
                debug!("Rotation fired slot {}", slot);
            }
        }

        self.answer_waiters(now);
    }

    fn record_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Clicked { point, tries } => {
                self.clicks += 1;
                debug!("Clicked {:?} after {} tries", point, tries);
                // Green marker for confirmed clicks, blue for manual ones.
                let color = if tries == 0 { "blue" } else { "green" };
                self.bridge.marker(point, color, MARKER_TTL_MS);
                self.last_outcome = Some(format!(
                    "clicked ({}, {}) tries={}",
                    point.x, point.y, tries
                ));
            }
            Outcome::TargetLost { point, tries } => {
                self.targets_lost += 1;
                warn!("Target lost at {:?} after {} tries", point, tries);
                self.bridge.marker(point, "red", MARKER_TTL_MS);
                self.last_outcome = Some(format!(
                    "target lost ({}, {}) tries={}",
                    point.x, point.y, tries
                ));
            }
        }
    }

    /// Fire a slot directly, outside the rotation.
    fn fire_slot(&mut self, bar: u8, index: usize) {
        let (Some(bar_key), Some(digit)) = (input::bar_key(bar), input::slot_digit(index)) else {
            warn!("Ignoring slot command with invalid bar {} / index {}", bar, index);
            return;
        };
        for event in input::key_press(&bar_key) {
            if !self.bridge.dispatch(&event) {
                return;
            }
        }
        for event in input::key_press(digit) {
            if !self.bridge.dispatch(&event) {
                return;
            }
        }
        // The manual bar select invalidates the rotation's cached bar.
        self.rotation.note_bar_change();
    }

    fn answer_waiters(&mut self, now: Instant) {
        if self.waiters.is_empty() {
            return;
        }
        let token = self.bridge.cursor_token();

        let mut index = 0;
        while index < self.waiters.len() {
            let matched = token
                .as_deref()
                .map_or(false, |t| self.waiters[index].pattern.matches(t));
            let expired = now >= self.waiters[index].deadline;

            if matched || expired {
                let waiter = self.waiters.remove(index);
                let _ = waiter.reply.send(WaitCursorReply {
                    matched,
                    token: token.clone(),
                    elapsed_ms: now.duration_since(waiter.started).as_millis() as u64,
                });
            } else {
                index += 1;
            }
        }
    }

    fn status(&self) -> DriverStatus {
        DriverStatus {
            attempt_state: self.acquisition.state(),
            generation: self.acquisition.generation(),
            tries: self.acquisition.tries(),
            bridge_connected: self.bridge.connected(),
            rotation_enabled: self.rotation_enabled,
            clicks: self.clicks,
            targets_lost: self.targets_lost,
            last_outcome: self.last_outcome.clone(),
            started_at: self.started_at.to_rfc3339(),
        }
    }
}

//! Action rotation.
//!
//! A priority-ordered scan over the slot bar: each tick, the first enabled
//! slot whose cooldown has elapsed and whose trigger condition holds fires
//! through the key primitives, then goes back on cooldown. No confirmation
//! races here — slot actions are fire-and-forget keystrokes.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::host::HostSurface;
use crate::input;

/// What a slot is mapped to in the client's action bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Unused,
    Attack,
    Buff,
    Food,
    Pill,
    Pickup,
}

impl SlotKind {
    /// Consumable kinds fire on a vital-sign threshold instead of freely.
    pub fn is_consumable(self) -> bool {
        matches!(self, SlotKind::Food | SlotKind::Pill)
    }
}

/// One configured slot in the rotation.
#[derive(Debug, Clone)]
pub struct ActionSlot {
    pub kind: SlotKind,
    pub enabled: bool,
    pub cooldown: Duration,
    /// HP percent at or below which a consumable slot triggers.
    pub threshold: Option<u8>,
    last_fired: Option<Instant>,
}

impl ActionSlot {
    pub fn new(kind: SlotKind, enabled: bool, cooldown: Duration, threshold: Option<u8>) -> Self {
        Self {
            kind,
            enabled,
            cooldown,
            threshold,
            last_fired: None,
        }
    }

    fn ready(&self, now: Instant) -> bool {
        match self.last_fired {
            Some(at) => now.duration_since(at) >= self.cooldown,
            None => true,
        }
    }

    fn triggered(&self, hp_percent: Option<u8>) -> bool {
        match self.threshold {
            // Threshold slots need a vital-sign reading to fire at all.
            Some(threshold) => hp_percent.map_or(false, |hp| hp <= threshold),
            None => true,
        }
    }
}

/// Priority scan over the slot bar.
pub struct ActionRotation {
    bar: u8,
    slots: Vec<ActionSlot>,
    /// The bar-select key is only re-sent when the bar actually changes.
    current_bar: Option<u8>,
}

impl ActionRotation {
    pub fn new(bar: u8, slots: Vec<ActionSlot>) -> Self {
        Self {
            bar,
            slots,
            current_bar: None,
        }
    }

    pub fn slots(&self) -> &[ActionSlot] {
        &self.slots
    }

    /// Forget the cached bar selection.
    ///
    /// Call after anything outside the rotation sends a bar-select key, so
    /// the next firing re-selects its own bar.
    pub fn note_bar_change(&mut self) {
        self.current_bar = None;
    }

    /// Scan in priority order and fire at most one slot.
    ///
    /// Returns the index of the slot that fired. Dispatch failure leaves the
    /// slot off cooldown so it is retried once the host is back.
    pub fn tick<H: HostSurface>(
        &mut self,
        host: &mut H,
        hp_percent: Option<u8>,
        now: Instant,
    ) -> Option<usize> {
        for index in 0..self.slots.len() {
            {
                let slot = &self.slots[index];
                if slot.kind == SlotKind::Unused || !slot.enabled {
                    continue;
                }
                if !slot.ready(now) || !slot.triggered(hp_percent) {
                    continue;
                }
            }
            if !self.fire(host, index) {
                return None;
            }
            self.slots[index].last_fired = Some(now);
            return Some(index);
        }
        None
    }

    fn fire<H: HostSurface>(&mut self, host: &mut H, index: usize) -> bool {
        let Some(digit) = input::slot_digit(index) else {
            return false;
        };

        if self.current_bar != Some(self.bar) {
            let Some(bar_key) = input::bar_key(self.bar) else {
                return false;
            };
            for event in input::key_press(&bar_key) {
                if !host.dispatch(&event) {
                    return false;
                }
            }
            self.current_bar = Some(self.bar);
        }

        for event in input::key_press(digit) {
            if !host.dispatch(&event) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::FakeHost;
    use crate::input::{KeyKind, SyntheticEvent};

    fn pressed_keys(host: &FakeHost) -> Vec<String> {
        host.dispatched
            .iter()
            .filter_map(|e| match e {
                SyntheticEvent::Key(k) if k.kind == KeyKind::Down => Some(k.key.clone()),
                _ => None,
            })
            .collect()
    }

    fn buff_slot(cooldown_ms: u64) -> ActionSlot {
        ActionSlot::new(
            SlotKind::Buff,
            true,
            Duration::from_millis(cooldown_ms),
            None,
        )
    }

    #[test]
    fn fires_first_eligible_slot_in_priority_order() {
        let mut host = FakeHost::new();
        let mut rotation = ActionRotation::new(
            1,
            vec![
                ActionSlot::new(SlotKind::Unused, true, Duration::ZERO, None),
                buff_slot(10_000),
                buff_slot(10_000),
            ],
        );
        let now = Instant::now();

        assert_eq!(rotation.tick(&mut host, None, now), Some(1));
        // Bar select plus the slot digit (slot index 1 -> key "2").
        assert_eq!(pressed_keys(&host), vec!["F1", "2"]);
    }

    #[test]
    fn cooldown_gates_refiring() {
        let mut host = FakeHost::new();
        let mut rotation = ActionRotation::new(1, vec![buff_slot(1_000)]);
        let t0 = Instant::now();

        assert_eq!(rotation.tick(&mut host, None, t0), Some(0));
        assert_eq!(
            rotation.tick(&mut host, None, t0 + Duration::from_millis(500)),
            None
        );
        assert_eq!(
            rotation.tick(&mut host, None, t0 + Duration::from_millis(1_000)),
            Some(0)
        );
    }

    #[test]
    fn consumable_fires_only_at_or_below_threshold() {
        let mut host = FakeHost::new();
        let food = ActionSlot::new(SlotKind::Food, true, Duration::from_secs(1), Some(60));
        let mut rotation = ActionRotation::new(1, vec![food]);
        let now = Instant::now();

        assert_eq!(rotation.tick(&mut host, Some(90), now), None);
        assert_eq!(rotation.tick(&mut host, None, now), None);
        assert_eq!(rotation.tick(&mut host, Some(60), now), Some(0));
    }

    #[test]
    fn lower_priority_runs_when_higher_is_on_cooldown() {
        let mut host = FakeHost::new();
        let mut rotation = ActionRotation::new(1, vec![buff_slot(10_000), buff_slot(10_000)]);
        let t0 = Instant::now();

        assert_eq!(rotation.tick(&mut host, None, t0), Some(0));
        assert_eq!(
            rotation.tick(&mut host, None, t0 + Duration::from_millis(1)),
            Some(1)
        );
    }

    #[test]
    fn disabled_slots_are_skipped() {
        let mut host = FakeHost::new();
        let mut disabled = buff_slot(0);
        disabled.enabled = false;
        let mut rotation = ActionRotation::new(1, vec![disabled, buff_slot(0)]);

        assert_eq!(rotation.tick(&mut host, None, Instant::now()), Some(1));
    }

    #[test]
    fn bar_key_sent_once_until_bar_changes() {
        let mut host = FakeHost::new();
        let mut rotation = ActionRotation::new(2, vec![buff_slot(0)]);
        let t0 = Instant::now();

        rotation.tick(&mut host, None, t0);
        rotation.tick(&mut host, None, t0 + Duration::from_millis(1));

        let bar_presses = pressed_keys(&host)
            .iter()
            .filter(|k| k.as_str() == "F2")
            .count();
        assert_eq!(bar_presses, 1);
    }

    #[test]
    fn note_bar_change_forces_reselect() {
        let mut host = FakeHost::new();
        let mut rotation = ActionRotation::new(3, vec![buff_slot(0)]);
        let t0 = Instant::now();

        rotation.tick(&mut host, None, t0);
        rotation.note_bar_change();
        rotation.tick(&mut host, None, t0 + Duration::from_millis(1));

        let bar_presses = pressed_keys(&host)
            .iter()
            .filter(|k| k.as_str() == "F3")
            .count();
        assert_eq!(bar_presses, 2);
    }

    #[test]
    fn dispatch_failure_keeps_slot_off_cooldown() {
        let mut host = FakeHost {
            detached: true,
            ..FakeHost::new()
        };
        let mut rotation = ActionRotation::new(1, vec![buff_slot(60_000)]);
        let t0 = Instant::now();

        assert_eq!(rotation.tick(&mut host, None, t0), None);

        host.detached = false;
        assert_eq!(
            rotation.tick(&mut host, None, t0 + Duration::from_millis(1)),
            Some(0)
        );
    }
}

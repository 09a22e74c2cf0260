//! Tunables and the on-disk profile.
//!
//! Every timing value here is observed client behavior, not a contract:
//! profiles override them per machine and per client version. Fields are
//! optional in the document so partially written profiles load cleanly.

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::rotation::{ActionSlot, SlotKind};

/// Timing and probe tunables for the acquisition state machine.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Tuning {
    /// Wait after a synthetic move before trusting the cursor probe.
    /// Working values have been observed roughly in the 10-50 ms range.
    settle_delay_ms: Option<u64>,
    /// Confirmation passes per request before giving up (observed 2-5).
    max_tries: Option<u32>,
    /// Random offset applied to retry moves; 0 disables.
    retry_jitter_px: Option<i32>,
    /// Substring of the host cursor token marking an attackable target.
    attack_cursor_marker: Option<String>,
    /// Driver tick interval.
    tick_interval_ms: Option<u64>,
}

impl Tuning {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms.unwrap_or(25))
    }

    pub fn max_tries(&self) -> u32 {
        self.max_tries.unwrap_or(3)
    }

    pub fn retry_jitter_px(&self) -> i32 {
        self.retry_jitter_px.unwrap_or(0)
    }

    pub fn attack_cursor_marker(&self) -> String {
        self.attack_cursor_marker
            .clone()
            .unwrap_or_else(|| "curattack".to_string())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.unwrap_or(5))
    }
}

/// One slot row in the profile document.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct SlotEntry {
    kind: Option<SlotKind>,
    enabled: Option<bool>,
    cooldown_ms: Option<u64>,
    threshold: Option<u8>,
}

impl SlotEntry {
    pub fn kind(&self) -> SlotKind {
        self.kind.unwrap_or(SlotKind::Unused)
    }

    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms.unwrap_or(0))
    }

    pub fn threshold(&self) -> Option<u8> {
        self.threshold
    }

    pub fn to_slot(self) -> ActionSlot {
        ActionSlot::new(self.kind(), self.enabled(), self.cooldown(), self.threshold)
    }
}

/// The complete profile: tunables plus the slot table.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Profile {
    tuning: Option<Tuning>,
    slot_bar: Option<u8>,
    slots: Option<Vec<SlotEntry>>,
    rotation_enabled: Option<bool>,
}

impl Profile {
    pub fn tuning(&self) -> Tuning {
        self.tuning.clone().unwrap_or_default()
    }

    pub fn slot_bar(&self) -> u8 {
        self.slot_bar.unwrap_or(1)
    }

    pub fn slots(&self) -> Vec<SlotEntry> {
        self.slots
            .clone()
            .unwrap_or_else(|| vec![SlotEntry::default(); 10])
    }

    pub fn rotation_enabled(&self) -> bool {
        self.rotation_enabled.unwrap_or(false)
    }

    pub fn action_slots(&self) -> Vec<ActionSlot> {
        self.slots().into_iter().map(SlotEntry::to_slot).collect()
    }

    /// Read a profile from disk, falling back to defaults on any failure.
    pub fn load_or_default(path: &Path) -> Self {
        if let Ok(mut file) = File::open(path) {
            serde_json::from_reader::<_, Profile>(&mut file).unwrap_or_default()
        } else {
            Self::default()
        }
    }

    /// Persist the profile to disk, best effort.
    pub fn save(&self, path: &Path) {
        if let Ok(mut file) = File::create(path) {
            let _ = serde_json::to_writer_pretty(&mut file, self);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let tuning = Tuning::default();
        assert_eq!(tuning.settle_delay(), Duration::from_millis(25));
        assert_eq!(tuning.max_tries(), 3);
        assert_eq!(tuning.retry_jitter_px(), 0);
        assert_eq!(tuning.attack_cursor_marker(), "curattack");

        let profile = Profile::default();
        assert_eq!(profile.slot_bar(), 1);
        assert_eq!(profile.slots().len(), 10);
        assert!(!profile.rotation_enabled());
    }

    #[test]
    fn partial_document_fills_defaults() {
        let json = r#"{"tuning":{"settle_delay_ms":40},"rotation_enabled":true}"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.tuning().settle_delay(), Duration::from_millis(40));
        assert_eq!(profile.tuning().max_tries(), 3);
        assert!(profile.rotation_enabled());
    }

    #[test]
    fn slot_entries_convert_to_action_slots() {
        let json = r#"{"slots":[
            {"kind":"attack","cooldown_ms":3000},
            {"kind":"food","cooldown_ms":1000,"threshold":50,"enabled":false}
        ]}"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        let slots = profile.action_slots();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].kind, SlotKind::Attack);
        assert!(slots[0].enabled);
        assert_eq!(slots[0].cooldown, Duration::from_millis(3000));
        assert_eq!(slots[1].kind, SlotKind::Food);
        assert!(!slots[1].enabled);
        assert_eq!(slots[1].threshold, Some(50));
    }

    #[test]
    fn load_missing_file_gives_defaults() {
        let profile = Profile::load_or_default(Path::new("/nonexistent/profile.json"));
        assert_eq!(profile.tuning().max_tries(), 3);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("huntpilot-profile-test-{}.json", std::process::id()));

        let json = r#"{"tuning":{"max_tries":5},"slot_bar":2}"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        profile.save(&path);

        let loaded = Profile::load_or_default(&path);
        assert_eq!(loaded.tuning().max_tries(), 5);
        assert_eq!(loaded.slot_bar(), 2);

        let _ = std::fs::remove_file(&path);
    }
}

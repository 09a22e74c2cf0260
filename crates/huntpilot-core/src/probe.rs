//! Cursor state probe.
//!
//! The game client signals "this point is an attackable target" by swapping
//! its cursor style to an attack variant. The probe is a read-only check of
//! that indicator: O(1), side-effect free, safe to call once per tick. Only
//! the acquisition state machine acts on its result.

use crate::host::HostSurface;

/// Probes the host's cursor indicator for the attackable marker.
#[derive(Debug, Clone)]
pub struct CursorProbe {
    marker: String,
}

impl CursorProbe {
    /// Create a probe matching the given marker substring.
    ///
    /// The marker is client data, not a contract; the observed client embeds
    /// `curattack` in the cursor style URL, and the value ships as a tunable.
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    /// Whether the host's current cursor token marks an attackable target.
    pub fn is_targetable<H: HostSurface>(&self, host: &H) -> bool {
        host.cursor_token()
            .map_or(false, |token| token.contains(&self.marker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::FakeHost;

    #[test]
    fn matches_marker_substring() {
        let probe = CursorProbe::new("curattack");
        let host = FakeHost::with_cursor("url(\"cursors/curattack.cur\"), auto");
        assert!(probe.is_targetable(&host));
    }

    #[test]
    fn rejects_other_cursor_tokens() {
        let probe = CursorProbe::new("curattack");
        let host = FakeHost::with_cursor("url(\"cursors/curbase.cur\"), auto");
        assert!(!probe.is_targetable(&host));
    }

    #[test]
    fn rejects_missing_token() {
        let probe = CursorProbe::new("curattack");
        let host = FakeHost::new();
        assert!(!probe.is_targetable(&host));
    }
}

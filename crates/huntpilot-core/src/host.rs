//! The host surface seam.
//!
//! The game client lives in another process; everything the core needs from
//! it is an event-dispatch entry point and a readable cursor style token.
//! The daemon provides the real implementation over the bridge socket; tests
//! use [`testing::FakeHost`].

use crate::input::{self, SyntheticEvent};

/// The external game surface receiving synthetic input.
pub trait HostSurface {
    /// Deliver an event to the host's dispatch entry point.
    ///
    /// Returns `false` when the host is missing or detached. No other result
    /// is observable; outcomes are inferred from UI state, never from
    /// dispatch returns.
    fn dispatch(&mut self, event: &SyntheticEvent) -> bool;

    /// The cursor style token the host currently exposes, if any.
    ///
    /// Non-blocking and cheap; implementations cache the last observed value
    /// so this can be read every tick.
    fn cursor_token(&self) -> Option<String>;
}

/// Forward a genuine event captured on an overlay surface to the host.
///
/// The event is rebuilt field-by-field before re-emission so the overlay can
/// sit visually atop the host without swallowing input. Purely a passthrough:
/// this path never participates in targeting.
pub fn forward<H: HostSurface>(host: &mut H, source: &SyntheticEvent) -> bool {
    let rebuilt = input::rebuild(source);
    host.dispatch(&rebuilt)
}


#[cfg(test)]
mod tests {
    use super::testing::FakeHost;
    use super::*;
    use crate::input::{pointer, PointerKind, ScreenPoint};

    #[test]
    fn forward_re_emits_equivalent_event() {
        let mut host = FakeHost::new();
        let genuine = pointer(PointerKind::Click, ScreenPoint::new(42, 24));

        assert!(forward(&mut host, &genuine));
        assert_eq!(host.dispatched.len(), 1);
        assert_eq!(host.dispatched[0], genuine);
    }

    #[test]
    fn forward_reports_detached_host() {
        let mut host = FakeHost {
            detached: true,
            ..FakeHost::new()
        };
        let genuine = pointer(PointerKind::Move, ScreenPoint::new(0, 0));

        assert!(!forward(&mut host, &genuine));
        assert!(host.dispatched.is_empty());
    }
}

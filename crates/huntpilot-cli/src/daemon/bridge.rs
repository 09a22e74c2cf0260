//! Bridge to the game-window shim.
//!
//! The client window runs a small shim that exposes the host surface over a
//! Unix socket: the daemon writes commands (synthetic events, overlay draws,
//! chat) as JSON lines and reads observed state back (cursor token changes,
//! vitals, genuine overlay input). The handle caches the last cursor token
//! so the core's probe stays a non-blocking O(1) read, and implements the
//! core [`HostSurface`] so the state machine can drive it directly.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use huntpilot_core::host::HostSurface;
use huntpilot_core::input::{ScreenPoint, SyntheticEvent};
use huntpilot_core::protocol::{BridgeCommand, BridgeEvent};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Bridge connection failures.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to connect to bridge socket {path:?}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Inbound state the driver consumes each tick.
#[derive(Debug)]
pub enum BridgeInbound {
    /// Genuine overlay event to forward to the host.
    Input(SyntheticEvent),
    /// HP reading for the rotation's threshold slots.
    Vitals(u8),
}

/// Handle to the shim: outbound command channel plus cached observed state.
///
/// I/O runs on two background tasks; the handle itself is used synchronously
/// from the driver's single control task.
pub struct BridgeHandle {
    out_tx: mpsc::UnboundedSender<BridgeCommand>,
    inbox: mpsc::UnboundedReceiver<BridgeInbound>,
    cursor: Arc<Mutex<Option<String>>>,
    connected: Arc<AtomicBool>,
}

impl BridgeHandle {
    /// Connect to the shim socket.
    pub async fn connect(path: &Path) -> Result<Self, BridgeError> {
        let stream = UnixStream::connect(path)
            .await
            .map_err(|source| BridgeError::Connect {
                path: path.to_path_buf(),
                source,
            })?;
        info!("Connected to bridge at {:?}", path);
        Ok(Self::from_stream(stream))
    }

    /// Wrap an established stream, spawning the reader and writer tasks.
    pub fn from_stream(stream: UnixStream) -> Self {
        let (read_half, mut write_half) = stream.into_split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<BridgeCommand>();
        let (in_tx, inbox) = mpsc::unbounded_channel();
        let cursor = Arc::new(Mutex::new(None));
        let connected = Arc::new(AtomicBool::new(true));

        // Writer task: serialize outbound commands as JSON lines.
        {
            let connected = connected.clone();
            tokio::spawn(async move {
                while let Some(command) = out_rx.recv().await {
                    let line = match serde_json::to_string(&command) {
                        Ok(line) => line,
                        Err(e) => {
                            warn!("Failed to encode bridge command: {}", e);
                            continue;
                        }
                    };
                    if write_half.write_all(line.as_bytes()).await.is_err()
                        || write_half.write_all(b"\n").await.is_err()
                    {
                        warn!("Bridge write failed, marking disconnected");
                        connected.store(false, Ordering::Relaxed);
                        break;
                    }
                }
            });
        }

        // Reader task: parse inbound events, keep the cursor cache fresh.
        {
            let cursor = Arc::clone(&cursor);
            let connected = connected.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(read_half);
                let mut line = String::new();
                loop {
                    line.clear();
                    match reader.read_line(&mut line).await {
                        Ok(0) => {
                            info!("Bridge closed by shim");
                            connected.store(false, Ordering::Relaxed);
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!("Bridge read failed: {}", e);
                            connected.store(false, Ordering::Relaxed);
                            break;
                        }
                    }

                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<BridgeEvent>(trimmed) {
                        Ok(BridgeEvent::Cursor { token }) => {
                            *cursor.lock().unwrap() = Some(token);
                        }
                        Ok(BridgeEvent::Input { event }) => {
                            if in_tx.send(BridgeInbound::Input(event)).is_err() {
                                break;
                            }
                        }
                        Ok(BridgeEvent::Vitals { hp_percent }) => {
                            if in_tx.send(BridgeInbound::Vitals(hp_percent)).is_err() {
                                break;
                            }
                        }
                        Err(e) => debug!("Ignoring malformed bridge line: {}", e),
                    }
                }
            });
        }

        Self {
            out_tx,
            inbox,
            cursor,
            connected,
        }
    }

    /// A handle with no shim behind it.
    ///
    /// Every dispatch becomes a no-op failure, which the core treats as a
    /// missing host reference rather than an error. Lets the daemon come up
    /// (and answer `status`) before the client window exists.
    pub fn detached() -> Self {
        let (out_tx, _) = mpsc::unbounded_channel();
        let (_, inbox) = mpsc::unbounded_channel();
        Self {
            out_tx,
            inbox,
            cursor: Arc::new(Mutex::new(None)),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Pull one inbound message without blocking.
    pub fn try_recv(&mut self) -> Option<BridgeInbound> {
        self.inbox.try_recv().ok()
    }

    /// Enqueue a command for the shim. Returns false when the bridge is gone.
    pub fn send(&self, command: BridgeCommand) -> bool {
        if !self.connected() {
            return false;
        }
        self.out_tx.send(command).is_ok()
    }

    /// Draw a short-lived debug marker, best effort.
    pub fn marker(&self, point: ScreenPoint, color: &str, ttl_ms: u64) {
        let _ = self.send(BridgeCommand::Marker {
            x: point.x,
            y: point.y,
            color: color.to_string(),
            ttl_ms,
        });
    }

    /// Draw a short-lived debug rectangle, best effort.
    ///
    /// Exposed for detection tooling that wants to visualize candidate
    /// regions; targeting itself never reads the overlay back.
    pub fn bounds(&self, x: i32, y: i32, w: i32, h: i32, ttl_ms: u64) {
        let _ = self.send(BridgeCommand::Bounds { x, y, w, h, ttl_ms });
    }

    /// Put text into the client chat input, best effort.
    pub fn chat(&self, text: &str) -> bool {
        self.send(BridgeCommand::Chat {
            text: text.to_string(),
        })
    }
}

impl HostSurface for BridgeHandle {
    fn dispatch(&mut self, event: &SyntheticEvent) -> bool {
        if !self.connected() {
            debug!("Dropping dispatch, bridge not connected");
            return false;
        }
        self.out_tx
            .send(BridgeCommand::Dispatch {
                event: event.clone(),
            })
            .is_ok()
    }

    fn cursor_token(&self) -> Option<String> {
        self.cursor.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huntpilot_core::input::{self, PointerKind};
    use std::time::Duration;
    use tokio::time::sleep;

    async fn wait_for<F: Fn() -> bool>(cond: F) {
        for _ in 0..100 {
            if cond() {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met within 1s");
    }

    #[tokio::test]
    async fn dispatch_reaches_shim_as_json_line() {
        let (ours, theirs) = UnixStream::pair().expect("socketpair");
        let mut bridge = BridgeHandle::from_stream(ours);

        let event = input::pointer(PointerKind::Move, ScreenPoint::new(100, 50));
        assert!(bridge.dispatch(&event));

        let mut reader = BufReader::new(theirs);
        let mut line = String::new();
        reader.read_line(&mut line).await.expect("read line");

        let command: BridgeCommand = serde_json::from_str(line.trim()).expect("valid json");
        assert_eq!(command, BridgeCommand::Dispatch { event });
    }

    #[tokio::test]
    async fn overlay_draw_helpers_reach_shim() {
        let (ours, theirs) = UnixStream::pair().expect("socketpair");
        let bridge = BridgeHandle::from_stream(ours);

        bridge.marker(ScreenPoint::new(100, 50), "green", 1000);
        bridge.bounds(90, 40, 20, 20, 1000);

        let mut reader = BufReader::new(theirs);
        let mut line = String::new();
        reader.read_line(&mut line).await.expect("marker line");
        let marker: BridgeCommand = serde_json::from_str(line.trim()).expect("valid json");
        assert_eq!(
            marker,
            BridgeCommand::Marker {
                x: 100,
                y: 50,
                color: "green".to_string(),
                ttl_ms: 1000
            }
        );

        line.clear();
        reader.read_line(&mut line).await.expect("bounds line");
        let bounds: BridgeCommand = serde_json::from_str(line.trim()).expect("valid json");
        assert_eq!(
            bounds,
            BridgeCommand::Bounds {
                x: 90,
                y: 40,
                w: 20,
                h: 20,
                ttl_ms: 1000
            }
        );
    }

    #[tokio::test]
    async fn cursor_events_update_cache() {
        let (ours, mut theirs) = UnixStream::pair().expect("socketpair");
        let bridge = BridgeHandle::from_stream(ours);
        assert_eq!(bridge.cursor_token(), None);

        let event = BridgeEvent::Cursor {
            token: "curattack".to_string(),
        };
        let line = format!("{}\n", serde_json::to_string(&event).unwrap());
        theirs.write_all(line.as_bytes()).await.unwrap();

        wait_for(|| bridge.cursor_token().is_some()).await;
        assert_eq!(bridge.cursor_token().as_deref(), Some("curattack"));
    }

    #[tokio::test]
    async fn inbound_input_lands_in_inbox() {
        let (ours, mut theirs) = UnixStream::pair().expect("socketpair");
        let mut bridge = BridgeHandle::from_stream(ours);

        let event = BridgeEvent::Input {
            event: input::pointer(PointerKind::Click, ScreenPoint::new(3, 4)),
        };
        let line = format!("{}\n", serde_json::to_string(&event).unwrap());
        theirs.write_all(line.as_bytes()).await.unwrap();

        // Reader task needs a moment to deliver.
        sleep(Duration::from_millis(50)).await;
        match bridge.try_recv() {
            Some(BridgeInbound::Input(_)) => {}
            other => panic!("expected input message, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn shim_hangup_marks_disconnected() {
        let (ours, theirs) = UnixStream::pair().expect("socketpair");
        let mut bridge = BridgeHandle::from_stream(ours);
        assert!(bridge.connected());

        drop(theirs);
        wait_for(|| !bridge.connected()).await;

        let event = input::pointer(PointerKind::Move, ScreenPoint::new(0, 0));
        assert!(!bridge.dispatch(&event));
    }

    #[tokio::test]
    async fn detached_handle_never_dispatches() {
        let mut bridge = BridgeHandle::detached();
        assert!(!bridge.connected());
        assert!(!bridge.dispatch(&input::pointer(PointerKind::Move, ScreenPoint::new(1, 1))));
        assert!(bridge.try_recv().is_none());
        assert_eq!(bridge.cursor_token(), None);
    }
}

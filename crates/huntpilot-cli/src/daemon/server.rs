//! Unix socket server for the daemon process.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use huntpilot_core::error::ApiError;
use huntpilot_core::input::ScreenPoint;
use huntpilot_core::protocol::{Command, Request, Response, ResponseData};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{oneshot, Notify, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::daemon::driver::{CursorPattern, DriverCommand, DriverHandle};
use crate::daemon::paths;

/// Maximum number of concurrent client connections.
const MAX_CONNECTIONS: usize = 100;

/// How long to wait for in-flight connections to complete during shutdown.
const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default `wait-cursor` timeout when the client does not specify one.
const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;

/// Upper bound on `wait-cursor` timeouts.
const MAX_WAIT_TIMEOUT_MS: u64 = 600_000;

/// The daemon server that listens for client connections.
///
/// Unlike an on-demand tool daemon, this one never idles out: its whole job
/// is to keep driving the client until told to stop.
pub struct DaemonServer {
    listener: UnixListener,
    socket_path: PathBuf,
    pid_path: PathBuf,
    driver: DriverHandle,
    connection_semaphore: Arc<Semaphore>,
    shutdown: Arc<Notify>,
}

impl DaemonServer {
    /// Bind to the default socket path for the current session.
    pub async fn bind(driver: DriverHandle) -> Result<Self> {
        let socket_path = paths::get_socket_path(None);
        let pid_path = paths::get_pid_path(None);
        Self::bind_to(socket_path, pid_path, driver).await
    }

    /// Bind to a specific socket path.
    ///
    /// Bind-first to avoid TOCTOU races: try the bind, and only when the
    /// address is in use consult the PID file to decide whether the previous
    /// daemon is dead and its socket safe to remove.
    pub async fn bind_to(
        socket_path: PathBuf,
        pid_path: PathBuf,
        driver: DriverHandle,
    ) -> Result<Self> {
        paths::ensure_socket_dir().context("Failed to create runtime directory")?;

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket directory for {:?}", socket_path))?;
        }

        // Write the PID file immediately after a successful bind so another
        // process never sees our socket without a valid PID behind it.
        let write_pid = |pid_path: &PathBuf| -> Result<()> {
            std::fs::write(pid_path, std::process::id().to_string())
                .with_context(|| format!("Failed to write PID file: {:?}", pid_path))
        };

        let listener = match UnixListener::bind(&socket_path) {
            Ok(l) => {
                write_pid(&pid_path)?;
                l
            }
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                if is_daemon_alive(&pid_path) {
                    anyhow::bail!(
                        "Daemon already running (socket {:?} in use, PID file valid)",
                        socket_path
                    );
                }

                // Previous daemon is dead; verify the leftover is actually a
                // socket (and not a symlink) before removing it.
                let metadata = std::fs::symlink_metadata(&socket_path)
                    .with_context(|| format!("Failed to stat socket path: {:?}", socket_path))?;
                if metadata.file_type().is_symlink() {
                    anyhow::bail!(
                        "Socket path {:?} is a symlink, refusing to delete for safety",
                        socket_path
                    );
                }
                #[cfg(unix)]
                {
                    use std::os::unix::fs::FileTypeExt;
                    if !metadata.file_type().is_socket() {
                        anyhow::bail!(
                            "Path {:?} exists but is not a socket file (type: {:?})",
                            socket_path,
                            metadata.file_type()
                        );
                    }
                }

                info!("Removing stale socket from dead daemon");
                std::fs::remove_file(&socket_path)
                    .with_context(|| format!("Failed to remove stale socket: {:?}", socket_path))?;

                let l = UnixListener::bind(&socket_path)
                    .with_context(|| format!("Failed to bind to socket: {:?}", socket_path))?;
                write_pid(&pid_path)?;
                l
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to bind to socket: {:?}", socket_path));
            }
        };

        info!("Daemon listening on {:?}", socket_path);

        Ok(Self {
            listener,
            socket_path,
            pid_path,
            driver,
            connection_semaphore: Arc::new(Semaphore::new(MAX_CONNECTIONS)),
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// Run the server, accepting connections and handling requests.
    ///
    /// Returns when shutdown is signaled; in-flight connections get a grace
    /// period before being aborted, then Drop cleans up the socket/PID files.
    pub async fn run(&self) -> Result<()> {
        let mut connection_tasks: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let permit = match self.connection_semaphore.clone().try_acquire_owned() {
                                Ok(permit) => permit,
                                Err(_) => {
                                    warn!(
                                        "Connection limit ({}) reached, rejecting new connection",
                                        MAX_CONNECTIONS
                                    );
                                    drop(stream);
                                    continue;
                                }
                            };

                            debug!("Accepted new connection");
                            let driver = self.driver.clone();
                            let shutdown = self.shutdown.clone();
                            connection_tasks.spawn(async move {
                                let _permit = permit;
                                if let Err(e) = handle_connection(stream, driver, shutdown).await {
                                    error!("Connection error: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                // Reap completed connection tasks to prevent unbounded growth.
                Some(_) = connection_tasks.join_next(), if !connection_tasks.is_empty() => {}
                _ = self.shutdown.notified() => {
                    info!("Shutdown signal received, waiting for in-flight connections");
                    break;
                }
            }
        }

        if !connection_tasks.is_empty() {
            let pending = connection_tasks.len();
            info!("Waiting for {} in-flight connection(s) to complete", pending);

            let drained = tokio::time::timeout(GRACEFUL_SHUTDOWN_TIMEOUT, async {
                while connection_tasks.join_next().await.is_some() {}
            })
            .await;

            if drained.is_err() {
                warn!(
                    "Graceful shutdown timed out after {:?}, aborting {} connection(s)",
                    GRACEFUL_SHUTDOWN_TIMEOUT,
                    connection_tasks.len()
                );
                connection_tasks.abort_all();
            }
        }

        Ok(())
    }
}

impl Drop for DaemonServer {
    fn drop(&mut self) {
        if self.socket_path.exists() && std::fs::remove_file(&self.socket_path).is_err() {
            warn!("Failed to remove socket on shutdown");
        }
        if self.pid_path.exists() && std::fs::remove_file(&self.pid_path).is_err() {
            warn!("Failed to remove PID file on shutdown");
        }
    }
}

/// Check whether a daemon process is still alive via its PID file.
fn is_daemon_alive(pid_path: &Path) -> bool {
    let pid_str = match std::fs::read_to_string(pid_path) {
        Ok(s) => s,
        Err(_) => return false,
    };

    let pid: i32 = match pid_str.trim().parse() {
        Ok(p) => p,
        Err(_) => return false,
    };

    // kill(pid, 0) checks for existence without delivering a signal.
    unsafe { libc::kill(pid, 0) == 0 }
}

/// Maximum request size in bytes.
const MAX_REQUEST_SIZE: usize = 1024 * 1024;

/// Read a line with a maximum size limit.
///
/// Returns the number of bytes read (0 means EOF); errors if the line
/// exceeds `max_size` before a newline shows up.
async fn read_line_bounded<R: tokio::io::AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut String,
    max_size: usize,
) -> Result<usize> {
    use tokio::io::AsyncBufReadExt;

    let mut total = 0;
    let mut bytes = Vec::new();

    loop {
        let available = reader
            .fill_buf()
            .await
            .context("Failed to read from client")?;

        if available.is_empty() {
            if !bytes.is_empty() {
                let line = std::str::from_utf8(&bytes).context("Invalid UTF-8 in request")?;
                buf.push_str(line);
            }
            return Ok(total);
        }

        let newline_pos = available.iter().position(|&b| b == b'\n');
        let bytes_to_consume = newline_pos.map(|p| p + 1).unwrap_or(available.len());

        if total + bytes_to_consume > max_size {
            anyhow::bail!("Request too large: exceeded {} byte limit", max_size);
        }

        bytes.extend_from_slice(&available[..bytes_to_consume]);
        total += bytes_to_consume;
        reader.consume(bytes_to_consume);

        if newline_pos.is_some() {
            break;
        }
    }

    let line = std::str::from_utf8(&bytes).context("Invalid UTF-8 in request")?;
    buf.push_str(line);
    Ok(total)
}

/// Handle a single client connection.
async fn handle_connection(
    stream: UnixStream,
    driver: DriverHandle,
    shutdown: Arc<Notify>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();

        let bytes_read = read_line_bounded(&mut reader, &mut line, MAX_REQUEST_SIZE).await?;
        if bytes_read == 0 {
            debug!("Client disconnected");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(trimmed) {
            Ok(request) => handle_request(request, &driver, &shutdown).await,
            Err(e) => Response::error(
                "unknown",
                ApiError::invalid_input_with_suggestion(
                    format!("Invalid JSON request: {}", e),
                    "Ensure the request is valid JSON with 'id' and 'command' fields. Example: {\"id\":\"1\",\"command\":{\"action\":\"status\"}}",
                ),
            ),
        };

        let response_json =
            serde_json::to_string(&response).context("Failed to serialize response")?;

        writer
            .write_all(response_json.as_bytes())
            .await
            .context("Failed to write response")?;
        writer
            .write_all(b"\n")
            .await
            .context("Failed to write newline")?;
        writer.flush().await.context("Failed to flush")?;
    }

    Ok(())
}

/// Handle a single request and return a response.
async fn handle_request(request: Request, driver: &DriverHandle, shutdown: &Notify) -> Response {
    debug!("Handling command: {:?}", request.command);
    let id = request.id;

    match request.command {
        Command::Target { x, y } => enqueue(
            &id,
            driver,
            DriverCommand::Target {
                point: ScreenPoint::new(x, y),
            },
            format!("target queued at ({}, {})", x, y),
        ),

        Command::Click { x, y } => enqueue(
            &id,
            driver,
            DriverCommand::Click {
                point: ScreenPoint::new(x, y),
            },
            format!("click queued at ({}, {})", x, y),
        ),

        Command::Slot { bar, index } => {
            if !(1..=9).contains(&bar) {
                return Response::error(
                    &id,
                    ApiError::invalid_input_with_suggestion(
                        format!("Invalid slot bar {}", bar),
                        "Bars are numbered 1-9 (they map to the F1-F9 keys)",
                    ),
                );
            }
            if index > 9 {
                return Response::error(
                    &id,
                    ApiError::invalid_input_with_suggestion(
                        format!("Invalid slot index {}", index),
                        "Slot indexes are 0-9 (they map to the 1-9 and 0 keys)",
                    ),
                );
            }
            enqueue(
                &id,
                driver,
                DriverCommand::Slot { bar, index },
                format!("slot {}/{} fired", bar, index),
            )
        }

        Command::Key { key, hold_ms } => {
            if key.is_empty() {
                return Response::error(
                    &id,
                    ApiError::invalid_input("No key specified"),
                );
            }
            enqueue(
                &id,
                driver,
                DriverCommand::Key {
                    key: key.clone(),
                    hold_ms,
                },
                format!("key '{}' sent", key),
            )
        }

        Command::Chat { text } => enqueue(
            &id,
            driver,
            DriverCommand::Chat { text },
            "chat text set".to_string(),
        ),

        Command::Rotation { enabled } => enqueue(
            &id,
            driver,
            DriverCommand::SetRotation { enabled },
            format!("rotation {}", if enabled { "enabled" } else { "disabled" }),
        ),

        Command::WaitCursor {
            pattern,
            timeout_ms,
            regex,
        } => handle_wait_cursor(&id, driver, pattern, timeout_ms, regex).await,

        Command::Status => {
            let (tx, rx) = oneshot::channel();
            if driver.send(DriverCommand::Status { reply: tx }).is_err() {
                return Response::error(&id, ApiError::internal("Driver task is gone"));
            }
            match rx.await {
                Ok(status) => Response::success(&id, ResponseData::Status(status)),
                Err(_) => Response::error(&id, ApiError::internal("Driver dropped status reply")),
            }
        }

        Command::Shutdown => {
            info!("Shutdown requested via command");
            shutdown.notify_waiters();
            Response::success(
                &id,
                ResponseData::Ok {
                    message: "Daemon shutting down".to_string(),
                },
            )
        }
    }
}

/// Fire-and-forget driver command with an immediate acknowledgment.
fn enqueue(id: &str, driver: &DriverHandle, command: DriverCommand, message: String) -> Response {
    if driver.send(command).is_err() {
        return Response::error(id, ApiError::internal("Driver task is gone"));
    }
    Response::success(id, ResponseData::Ok { message })
}

async fn handle_wait_cursor(
    id: &str,
    driver: &DriverHandle,
    pattern: String,
    timeout_ms: Option<u64>,
    regex: Option<bool>,
) -> Response {
    let timeout_ms = timeout_ms
        .unwrap_or(DEFAULT_WAIT_TIMEOUT_MS)
        .min(MAX_WAIT_TIMEOUT_MS);

    let pattern = if regex.unwrap_or(false) {
        match regex::Regex::new(&pattern) {
            Ok(re) => CursorPattern::Regex(re),
            Err(e) => {
                return Response::error(
                    id,
                    ApiError::invalid_input_with_suggestion(
                        format!("Invalid regex pattern: {}", e),
                        "Check the regex syntax, or drop --regex for a literal match",
                    ),
                );
            }
        }
    } else {
        CursorPattern::Literal(pattern)
    };

    let (tx, rx) = oneshot::channel();
    let command = DriverCommand::WaitCursor {
        pattern,
        timeout: Duration::from_millis(timeout_ms),
        reply: tx,
    };
    if driver.send(command).is_err() {
        return Response::error(id, ApiError::internal("Driver task is gone"));
    }

    // The driver answers at its own tick cadence; the extra second covers it.
    let guard = Duration::from_millis(timeout_ms) + Duration::from_secs(1);
    match tokio::time::timeout(guard, rx).await {
        Ok(Ok(reply)) => Response::success(
            id,
            ResponseData::WaitCursorResult {
                matched: reply.matched,
                token: reply.token,
                elapsed_ms: reply.elapsed_ms,
            },
        ),
        _ => Response::error(id, ApiError::internal("Driver dropped wait-cursor reply")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::bridge::BridgeHandle;
    use crate::daemon::driver;
    use huntpilot_core::config::Profile;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt};

    fn test_paths(tag: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir();
        let socket = dir.join(format!("huntpilot-{}-{}.sock", tag, std::process::id()));
        let pid = socket.with_extension("pid");
        let _ = std::fs::remove_file(&socket);
        (socket, pid)
    }

    async fn roundtrip(stream: &mut UnixStream, request: &Request) -> Response {
        let line = format!("{}\n", serde_json::to_string(request).unwrap());
        stream.write_all(line.as_bytes()).await.unwrap();

        let (read_half, _) = stream.split();
        let mut reader = BufReader::new(read_half);
        let mut response_line = String::new();
        reader.read_line(&mut response_line).await.unwrap();
        serde_json::from_str(&response_line).unwrap()
    }

    #[tokio::test]
    async fn status_round_trip_over_socket() {
        let (socket_path, pid_path) = test_paths("status");
        let handle = driver::spawn(BridgeHandle::detached(), &Profile::default());
        let server = DaemonServer::bind_to(socket_path.clone(), pid_path, handle)
            .await
            .expect("bind");

        let server_task = tokio::spawn(async move {
            let _ = tokio::time::timeout(Duration::from_secs(2), server.run()).await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut stream = UnixStream::connect(&socket_path).await.expect("connect");
        let response = roundtrip(
            &mut stream,
            &Request {
                id: "t1".to_string(),
                command: Command::Status,
            },
        )
        .await;

        assert!(response.success);
        match response.data {
            Some(ResponseData::Status(status)) => {
                assert!(!status.bridge_connected);
                assert_eq!(status.clicks, 0);
            }
            other => panic!("expected status, got {:?}", other),
        }

        server_task.abort();
        let _ = std::fs::remove_file(&socket_path);
    }

    #[tokio::test]
    async fn invalid_slot_bar_is_rejected() {
        let (socket_path, pid_path) = test_paths("slotbar");
        let handle = driver::spawn(BridgeHandle::detached(), &Profile::default());
        let server = DaemonServer::bind_to(socket_path.clone(), pid_path, handle)
            .await
            .expect("bind");

        let server_task = tokio::spawn(async move {
            let _ = tokio::time::timeout(Duration::from_secs(2), server.run()).await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut stream = UnixStream::connect(&socket_path).await.expect("connect");
        let response = roundtrip(
            &mut stream,
            &Request {
                id: "t2".to_string(),
                command: Command::Slot { bar: 0, index: 3 },
            },
        )
        .await;

        assert!(!response.success);
        let err = response.error.expect("error payload");
        assert!(err.message.contains("Invalid slot bar"));
        assert!(err.suggestion.is_some());

        server_task.abort();
        let _ = std::fs::remove_file(&socket_path);
    }

    #[tokio::test]
    async fn malformed_json_gets_structured_error() {
        let (socket_path, pid_path) = test_paths("badjson");
        let handle = driver::spawn(BridgeHandle::detached(), &Profile::default());
        let server = DaemonServer::bind_to(socket_path.clone(), pid_path, handle)
            .await
            .expect("bind");

        let server_task = tokio::spawn(async move {
            let _ = tokio::time::timeout(Duration::from_secs(2), server.run()).await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut stream = UnixStream::connect(&socket_path).await.expect("connect");
        stream.write_all(b"this is not json\n").await.unwrap();

        let (read_half, _) = stream.split();
        let mut reader = BufReader::new(read_half);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        let response: Response = serde_json::from_str(&line).unwrap();

        assert!(!response.success);
        assert!(response.error.is_some());

        server_task.abort();
        let _ = std::fs::remove_file(&socket_path);
    }
}

//! Socket, PID, and profile path resolution.
//!
//! Priority for the runtime directory:
//! 1. `HUNTPILOT_SOCKET_DIR` (explicit override)
//! 2. `XDG_RUNTIME_DIR/huntpilot` (Linux standard)
//! 3. `~/.huntpilot` (home directory fallback)
//! 4. System temp dir (last resort)
//!
//! Session support via `HUNTPILOT_SESSION` (default: "default"). One session
//! drives one client window; each gets its own control socket
//! `{dir}/{session}.sock`, bridge socket `{dir}/{session}.bridge.sock`, and
//! profile `{dir}/{session}.profile.json`.

use std::env;
use std::path::PathBuf;

/// Get the current session name from env or default.
pub fn get_session() -> String {
    env::var("HUNTPILOT_SESSION").unwrap_or_else(|_| "default".to_string())
}

/// Get the runtime directory with priority fallback.
pub fn get_socket_dir() -> PathBuf {
    // 1. Explicit override (ignore empty)
    if let Ok(dir) = env::var("HUNTPILOT_SOCKET_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }

    // 2. XDG_RUNTIME_DIR (ignore empty)
    if let Ok(runtime_dir) = env::var("XDG_RUNTIME_DIR") {
        if !runtime_dir.is_empty() {
            return PathBuf::from(runtime_dir).join("huntpilot");
        }
    }

    // 3. Home directory fallback
    if let Some(home) = dirs::home_dir() {
        return home.join(".huntpilot");
    }

    // 4. Last resort: temp dir
    env::temp_dir().join("huntpilot")
}

/// Validate a session name to prevent path traversal.
///
/// Names must be non-empty, contain only alphanumerics, hyphen or
/// underscore, and not start with a hyphen. Invalid names fall back to
/// "default".
pub(crate) fn sanitize_session_name(name: &str) -> String {
    let is_valid = !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if is_valid {
        name.to_string()
    } else {
        tracing::warn!(
            "Invalid session name '{}', using 'default'. Names must contain only alphanumeric, hyphen, underscore.",
            name
        );
        "default".to_string()
    }
}

fn session_file(session: Option<&str>, suffix: &str) -> PathBuf {
    let sess = session.map(String::from).unwrap_or_else(get_session);
    let safe_sess = sanitize_session_name(&sess);
    get_socket_dir().join(format!("{}{}", safe_sess, suffix))
}

/// Control socket path for a session.
pub fn get_socket_path(session: Option<&str>) -> PathBuf {
    session_file(session, ".sock")
}

/// PID file path for a session.
pub fn get_pid_path(session: Option<&str>) -> PathBuf {
    session_file(session, ".pid")
}

/// Bridge socket path for a session (where the client shim listens).
pub fn get_bridge_path(session: Option<&str>) -> PathBuf {
    session_file(session, ".bridge.sock")
}

/// Profile document path for a session.
pub fn get_profile_path(session: Option<&str>) -> PathBuf {
    session_file(session, ".profile.json")
}

/// Ensure the runtime directory exists with secure permissions (0700).
pub fn ensure_socket_dir() -> std::io::Result<()> {
    let dir = get_socket_dir();
    std::fs::create_dir_all(&dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))?;
    }

    Ok(())
}

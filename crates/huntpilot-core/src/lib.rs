//! Core types and logic for huntpilot.
//!
//! This crate provides the target-acquisition and input-synthesis subsystem
//! for driving a non-scriptable game client: deciding whether a screen
//! coordinate currently represents an attackable target, reconstructing
//! input events indistinguishable from genuine ones, and sequencing
//! move→confirm→click attempts under bounded retries and cancellation.
//! It is pure and deterministic; all I/O lives in the daemon crate.
//!
//! # Modules
//!
//! - [`acquire`]: the move→confirm→click state machine with generation-token
//!   cancellation
//! - [`config`]: tunables and the on-disk profile
//! - [`error`]: protocol error types with actionable suggestions
//! - [`host`]: the host surface seam (dispatch entry point + cursor token)
//! - [`input`]: synthetic event model and builders with full per-kind field
//!   fidelity
//! - [`probe`]: the read-only attackable-cursor check
//! - [`protocol`]: JSON-line control and bridge protocols
//! - [`queue`]: single-slot coalescing request holder
//! - [`rotation`]: priority-ordered cooldown/threshold slot scan
//!
//! # Why a state machine
//!
//! A synthetic pointer move cannot be trusted to produce an immediately
//! correct hover indicator; the host updates that feedback asynchronously.
//! The machine bridges the latency without clicking blindly and without
//! blocking: every deferred step carries the generation token of the request
//! that scheduled it, and a newer request invalidates older steps the moment
//! it arrives.

pub mod acquire;
pub mod config;
pub mod error;
pub mod host;
pub mod input;
pub mod probe;
pub mod protocol;
pub mod queue;
pub mod rotation;

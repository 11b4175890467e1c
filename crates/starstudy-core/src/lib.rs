//! # StarStudy Core Library
//!
//! Core logic for StarStudy, a study timer that lets parents keep a
//! roster of children, run a countdown study session per subject and
//! award a star when a session is finished. The `starstudy` CLI is a
//! thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Storage**: TOML configuration, a SQLite key-value table and an
//!   encrypted cache on top of it
//! - **Remote**: document store and authentication collaborators behind
//!   async traits, with HTTP, in-memory and offline implementations
//! - **Sync**: the coordinator that owns the roster and keeps memory,
//!   cache and remote converged, degrading to local-only on remote errors
//! - **Session**: a countdown state machine and the tokio task that ticks it
//!
//! ## Key Components
//!
//! - [`SyncCoordinator`]: roster mutations and their sync outcomes
//! - [`SessionTimer`]: study session state machine
//! - [`App`]: single-active-session holder wiring sessions to stars
//! - [`EncryptedStore`]: encrypted local cache
//! - [`Config`]: application configuration management

pub mod app;
pub mod auth;
pub mod context;
pub mod error;
pub mod events;
pub mod notify;
pub mod remote;
pub mod roster;
pub mod session;
pub mod storage;
pub mod sync;

pub use app::App;
pub use auth::{AuthProvider, Principal};
pub use context::AppContext;
pub use error::{AuthError, ConfigError, CoreError, RemoteError, SessionError, StoreError, ValidationError};
pub use events::Event;
pub use notify::{Notification, NotificationKind, Notifier};
pub use remote::DocumentStore;
pub use roster::{Child, ChildDraft, Parent, Subject};
pub use session::{SessionState, SessionTimer};
pub use storage::{Config, Database, EncryptedStore};
pub use sync::{DeleteOutcome, LoadOutcome, StarOutcome, SyncCoordinator, SyncOutcome};

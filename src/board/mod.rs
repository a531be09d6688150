//! Kanban board core and its HTTP surface.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (axum Router, ServerConfig)      │
//! │          │ <─────── │    ├─ api.rs     (handlers, AppState)        │
//! └──────────┘ WebSocket│    └─ events.rs  (BoardEvent change feed)    │
//!                       │         │                                    │
//!                       │         │ DbHandle::call (spawn_blocking)    │
//!                       │         v                                    │
//!                       │  service.rs  (one transaction per mutation)  │
//!                       │    ├─ ordering.rs  (dense position packing)  │
//!                       │    ├─ sequence.rs  (project task numbers)    │
//!                       │    └─ history.rs   (status/assignee audit)   │
//!                       │         │                                    │
//!                       │         v                                    │
//!                       │  db.rs  (BoardDb, schema, reads, transact)   │
//!                       └──────────────────────────────────────────────┘
//! ```
//!
//! Every mutation in `service.rs` runs inside `BoardDb::transact`, which
//! opens `BEGIN IMMEDIATE` and retries lock contention a bounded number of
//! times before failing with `BoardError::Conflict`.

pub mod api;
pub mod db;
pub mod events;
pub mod history;
pub mod models;
pub mod ordering;
pub mod sequence;
pub mod server;
pub mod service;

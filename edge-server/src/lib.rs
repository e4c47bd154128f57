//! # xmcl-edge-server
//!
//! Edge service for the XMCL launcher.
//!
//! This crate implements a server that:
//! - Relays WebSocket frames between members of a group (`/group/:id`)
//! - Infers each connection's client id from the first frame that reveals one
//! - Delivers frames addressed to a `receiver` only to that client
//! - Answers binary pings with a `PONG` text frame
//! - Serves cached translations of mod descriptions (`/translation`) and
//!   translates misses in the background, at most once per text and locale
//!
//! ## Architecture
//!
//! ```text
//! Client A ──┐   WebSocket     ┌── Client B
//!            │                 │
//!        ┌───┴─────────────────┴───┐
//!        │      GroupRegistry      │  broadcast channel per group
//!        ├─────────────────────────┤
//!        │  TranslationPipeline    │──► worker ──► chat backend
//!        │  ┌───────────────────┐  │
//!        │  │ SQLite (cache +   │  │
//!        │  │ locks)            │  │
//!        │  └───────────────────┘  │
//!        └─────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cleanup;
pub mod config;
pub mod error;
pub mod groups;
pub mod http;
pub mod server;
pub mod session;
pub mod storage;
pub mod translation;

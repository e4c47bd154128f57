//! # edge-core
//!
//! Pure logic for the XMCL edge relay and translation pipeline (no I/O, instant tests).
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects:
//! - [`connection`] turns socket and channel events into relay actions
//! - [`chunking`] splits documents into backend-sized pieces and stitches
//!   translated pieces back together
//!
//! The actual I/O (sockets, broadcast channels, HTTP, SQLite) is performed by
//! `edge-server`, which interprets the actions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunking;
pub mod connection;

pub use chunking::{pack, LinkTable, PreparedDocument};
pub use connection::{is_transient_error, should_deliver, Action, ConnectionState, Event, Identity};

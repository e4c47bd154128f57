//! # edge-types
//!
//! Wire and domain types shared by the XMCL edge crates.
//!
//! This crate provides the foundational types used across the workspace:
//! - [`GroupId`], [`ClientId`], [`ContentHash`] - Identity and cache-key types
//! - [`TextFrame`], [`BinaryFrame`], [`Pong`] - Relay frame classification
//! - [`TextKind`], [`TranslationStatus`], [`CachedTranslation`] - Translation cache records
//! - [`TypesError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod frames;
mod ids;
mod translation;

pub use error::TypesError;
pub use frames::{BinaryFrame, Payload, Pong, Routing, TextFrame, IDENTITY_LEN, PING_LEN};
pub use ids::{ClientId, ContentHash, GroupId};
pub use translation::{CachedTranslation, DescriptionKind, TextKind, TranslationStatus};

//! De-duplicated translation pipeline.
//!
//! ```text
//! POST /translation ──► TranslationPipeline ──► cache hit? ──► Ready
//!                               │
//!                          try_lock(hash)
//!                               │ won: owner token
//!                               ▼
//!                        mpsc job queue ──► worker ──► backend (per chunk)
//!                                              │
//!                                     insert cache entry, unlock(token)
//! ```
//!
//! Callers only ever see `Ready` or `Pending`; job results reach them through
//! the store on a later request.

pub mod backend;
pub mod pipeline;
pub mod worker;

pub use backend::{ChatBackend, TranslationBackend};
pub use pipeline::{TranslationJob, TranslationPipeline, TranslationRequest};
pub use worker::{spawn_translation_worker, LOCK_REFRESH_INTERVAL};

//! ============================================================================
//! PACKDROP-CORE: AR collectible drops
//! ============================================================================
//! This crate handles everything behind the scan screen:
//! - Weighted item drops from the catalog
//! - Scan session state machine (marker events, taps, timers)
//! - Collection counters, reward unlocks and voucher claims
//! - Embedded redb store plus an in-memory backend for tests
//! ============================================================================

pub mod backend;
pub mod catalog;
pub mod config;
pub mod db;
pub mod drop_resolver;
pub mod error;
pub mod reward;
pub mod service;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use types::*;
pub use backend::{CollectionBackend, MemoryBackend};
pub use catalog::Catalog;
pub use config::PackDropConfig;
pub use db::{DbStats, PackDropDb, UserSnapshot};
pub use drop_resolver::DropResolver;
pub use error::ScanError;
pub use service::ScanService;
pub use session::{PackId, PackState, Prompt, ScanSession, SessionEvent, SessionState, Timers};

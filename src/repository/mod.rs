//! Repository Pattern Implementation
//!
//! Tenant-scoped record storage behind one trait, so effect handlers and
//! loader interceptors never depend on a concrete backend.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          RecordRepository               │
//! │  (tenant, collection, id) -> Record     │
//! └──────────────┬──────────────────────────┘
//!                │
//!        ┌───────┴────────┐
//!        │                │
//! ┌──────▼───────┐  ┌─────▼────────┐
//! │MemoryRecord  │  │FileRecord    │
//! │Repository    │  │Repository    │
//! │- tests, demo │  │- JSON file   │
//! └──────────────┘  └──────────────┘
//! ```

pub mod factory;
pub mod file;
pub mod memory;
pub mod traits;

// Re-export main types
pub use factory::RepositoryFactory;
pub use file::FileRecordRepository;
pub use memory::MemoryRecordRepository;
pub use traits::{Record, RecordKey, RecordRepository};

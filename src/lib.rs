//! Peritext Core - rich-text CRDT for collaborative editing
//!
//! This crate implements a replicated data type for collaborative rich-text
//! editing. Independent replicas apply local and remotely delivered edits and
//! converge to an identical document without central coordination:
//! - RGA character sequence with deterministic conflict resolution
//! - Peritext-style formatting marks anchored to characters, not indices
//! - Idempotent operation application via a deduplication ledger
//! - Snapshot serialization for persistence
//!
//! # Examples
//!
//! ```rust
//! use peritext_core::Document;
//!
//! let mut doc = Document::new("alice".to_string());
//! let op = doc.insert('H', None).unwrap();
//! doc.insert('i', op.op_id().cloned()).unwrap();
//!
//! assert_eq!(doc.get_text(), "Hi");
//! ```

pub mod crdt;
pub mod document;
pub mod error;
pub mod op;
pub mod protocol;
pub mod storage;

// Re-exports for convenience
pub use crdt::mark::{Anchor, AnchorSide, Mark, MarkConfig, MarkType};
pub use crdt::rga::id::OpId;
pub use document::{Document, Snapshot};
pub use error::{DocError, Result};
pub use op::{ApplyOutcome, Operation};

/// Author (replica) identifier type
pub type AuthorId = String;

/// Mark identifier type
pub type MarkId = String;

/// Logical timestamp type carried by operations
pub type Timestamp = u64;

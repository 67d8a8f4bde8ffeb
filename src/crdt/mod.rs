//! CRDT building blocks for the rich-text document
//!
//! # Components
//!
//! - **RGA sequence:** character store with deterministic concurrent ordering
//! - **Marks:** formatting ranges anchored to characters via before/after anchors
//! - **Anchor op-sets:** formatting operations recorded at anchor positions
//! - **Lamport clock:** logical timestamps for the ordering comparator
//!
//! # References
//!
//! - "Replicated abstract data types: Building blocks for collaborative
//!   applications" (RGA)
//! - "Peritext: A CRDT for Collaborative Rich Text Editing" by Litt et al.

pub mod clock;
pub mod mark;
pub mod opset;
pub mod rga;

pub use clock::LamportClock;
pub use mark::{Anchor, AnchorSide, Mark, MarkConfig, MarkType};
pub use opset::{AnchorOp, AnchorOpKind, AnchorOpSets};
pub use rga::{id::OpId, node::SeqNode, sequence::NodeStore};

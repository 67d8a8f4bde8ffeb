//! RGA (Replicated Growable Array) character sequence
//!
//! The sequence backbone of the document: every character ever inserted,
//! including tombstones, keyed by a globally unique operation id and linked
//! into a doubly-linked list anchored at a synthetic root.

pub mod id;
pub mod node;
pub mod sequence;

pub use id::OpId;
pub use node::SeqNode;
pub use sequence::NodeStore;

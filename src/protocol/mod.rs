//! Wire protocol: envelopes, codec and the broadcast session
//!
//! Operations travel as JSON envelopes tagged with a message type, so a
//! document channel can carry other traffic (presence, cursors) alongside
//! CRDT operations without ambiguity. Decoding is forgiving: malformed
//! payloads and foreign message types are dropped with a debug log rather
//! than surfaced as errors, since a replica cannot treat a peer's bad frame
//! as fatal.

use crate::document::Document;
use crate::error::{DocError, Result};
use crate::op::{ApplyOutcome, Operation};
use log::debug;
use serde::{Deserialize, Serialize};

/// Message type tag for operation envelopes
pub const CRDT_OPERATION: &str = "crdt_operation";

/// Envelope wrapping one operation on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub message_type: String,
    pub operation: Operation,
}

impl Envelope {
    pub fn new(operation: Operation) -> Self {
        Self {
            message_type: CRDT_OPERATION.to_string(),
            operation,
        }
    }
}

/// Encode an operation into its wire envelope
pub fn encode(operation: &Operation) -> Result<String> {
    let envelope = Envelope::new(operation.clone());
    serde_json::to_string(&envelope).map_err(|err| DocError::Wire(err.to_string()))
}

/// Decode a wire payload into an operation
///
/// Returns None for malformed JSON, missing fields and foreign message
/// types. Unknown actions inside a `crdt_operation` envelope also decode to
/// None; the ledger never learns about them, so a sender upgrade can
/// re-deliver them later.
pub fn decode(payload: &str) -> Option<Operation> {
    let envelope: Envelope = match serde_json::from_str(payload) {
        Ok(envelope) => envelope,
        Err(err) => {
            debug!("dropping undecodable payload: {err}");
            return None;
        }
    };
    if envelope.message_type != CRDT_OPERATION {
        debug!("dropping foreign message type {:?}", envelope.message_type);
        return None;
    }
    Some(envelope.operation)
}

/// Outbound fan-out for a collaborative session
///
/// Implementations deliver the payload to every peer replica. Delivery may
/// be at-least-once and out of order; the document's ledger and retry
/// semantics absorb both.
pub trait Transport {
    fn broadcast(&mut self, payload: &str);
}

/// A document bound to a transport
///
/// Local edits are applied and broadcast in one call; inbound payloads are
/// decoded and applied. This is the integration surface a host (websocket
/// handler, test harness) talks to.
pub struct Session<T: Transport> {
    document: Document,
    transport: T,
}

impl<T: Transport> Session<T> {
    pub fn new(document: Document, transport: T) -> Self {
        Self {
            document,
            transport,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    /// Apply a local insert and broadcast it
    pub fn insert_at_cursor(&mut self, ch: char, cursor: usize) -> Result<Operation> {
        let op = self.document.insert_at_cursor(ch, cursor)?;
        self.transport.broadcast(&encode(&op)?);
        Ok(op)
    }

    /// Apply a local delete and broadcast it
    pub fn delete_at_index(&mut self, index: usize) -> Result<Operation> {
        let op = self.document.delete_at_index(index)?;
        self.transport.broadcast(&encode(&op)?);
        Ok(op)
    }

    /// Broadcast an already-applied local operation (marks, raw edits)
    pub fn broadcast(&mut self, op: &Operation) -> Result<()> {
        self.transport.broadcast(&encode(op)?);
        Ok(())
    }

    /// Handle one inbound payload from a peer
    ///
    /// Undecodable payloads report `Ignored` without touching the ledger.
    pub fn on_message(&mut self, sender: &str, payload: &str) -> ApplyOutcome {
        match decode(payload) {
            Some(op) => self.document.apply_operation(&op),
            None => {
                debug!("ignoring undecodable payload from {sender}");
                ApplyOutcome::Ignored
            }
        }
    }
}

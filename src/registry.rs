// SPDX-License-Identifier: AGPL-3.0-or-later

//! Table of in-flight requests keyed by the 6-bit requestor sequence
//! number. The registry is the sole ordering authority: the BMC may
//! reorder responses relative to requests, but lookup here is what
//! actually resolves a reply to its caller.
//!
//! Grounded in the same one-map-per-correlation-id shape used upstream for
//! per-tag response channels, narrowed here to a 64-slot keyspace with an
//! explicit free-sequence allocator instead of an arbitrary-width tag.

use dashmap::DashMap;
use tokio::sync::oneshot;

use crate::{codec::message::LanMessage, error::Result};

const SEQUENCE_SPACE: u8 = 64;

pub struct PendingRequest {
    pub reply: oneshot::Sender<Result<LanMessage>>,
}

#[derive(Default)]
pub struct Registry {
    inflight: DashMap<u8, PendingRequest>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds the lowest sequence number not currently in flight. Returns
    /// `None` if all 64 slots are occupied (the caller should back off).
    pub fn alloc_sequence(&self) -> Option<u8> {
        (0..SEQUENCE_SPACE).find(|seq| !self.inflight.contains_key(seq))
    }

    pub fn register(&self, seq: u8, entry: PendingRequest) {
        self.inflight.insert(seq, entry);
    }

    /// Delivers `msg` to the pending request at `seq`, if any, removing it
    /// from the table. Returns `false` if no requestor was waiting — the
    /// caller should emit a `no_requestor` event.
    pub fn complete(&self, seq: u8, msg: Result<LanMessage>) -> bool {
        match self.inflight.remove(&seq) {
            Some((_, entry)) => {
                let _ = entry.reply.send(msg);
                true
            },
            None => false,
        }
    }

    /// Evicts `seq` without delivering anything, used by timeout firing and
    /// caller-initiated cancellation.
    pub fn evict(&self, seq: u8) -> bool {
        self.inflight.remove(&seq).is_some()
    }

    pub fn in_flight_count(&self) -> usize {
        self.inflight.len()
    }

    pub fn in_flight_sequences(&self) -> Vec<u8> {
        self.inflight.iter().map(|e| *e.key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allocates_free_sequence_and_reclaims_on_complete() {
        let reg = Registry::new();
        let seq = reg.alloc_sequence().unwrap();
        assert_eq!(seq, 0);

        let (tx, rx) = oneshot::channel();
        reg.register(seq, PendingRequest { reply: tx });
        assert_eq!(reg.alloc_sequence(), Some(1));

        let msg = LanMessage {
            responder_addr: 0x81,
            netfn: crate::codec::message::NETFN_APP.response(),
            responder_lun: crate::codec::message::Lun::Zero,
            requestor_addr: 0x20,
            requestor_seq: seq,
            requestor_lun: crate::codec::message::Lun::Zero,
            command: 0x38,
            data: vec![0x00],
        };
        assert!(reg.complete(seq, Ok(msg.clone())));
        assert_eq!(reg.alloc_sequence(), Some(0));
        assert_eq!(rx.await.unwrap().unwrap(), msg);
    }

    #[tokio::test]
    async fn complete_on_unknown_sequence_reports_no_requestor() {
        let reg = Registry::new();
        let msg = LanMessage {
            responder_addr: 0x81,
            netfn: crate::codec::message::NETFN_APP.response(),
            responder_lun: crate::codec::message::Lun::Zero,
            requestor_addr: 0x20,
            requestor_seq: 9,
            requestor_lun: crate::codec::message::Lun::Zero,
            command: 0x38,
            data: vec![0x00],
        };
        assert!(!reg.complete(9, Ok(msg)));
    }

    #[tokio::test]
    async fn evict_removes_without_delivering() {
        let reg = Registry::new();
        let seq = reg.alloc_sequence().unwrap();
        let (tx, rx) = oneshot::channel();
        reg.register(seq, PendingRequest { reply: tx });
        assert!(reg.evict(seq));
        drop(reg);
        assert!(rx.await.is_err());
    }
}

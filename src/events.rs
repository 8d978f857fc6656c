// SPDX-License-Identifier: AGPL-3.0-or-later

//! Best-effort, non-blocking fan-out of session lifecycle notifications.
//! A lagging subscriber drops events rather than blocking the Session's
//! request loop — delivery is observer-paced, not publisher-paced.

use tokio::sync::broadcast;

use crate::{
    codec::message::LanMessage,
    error::{DecodeErrorKind, IpmiError},
};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub enum SessionEvent {
    Established,
    Closed { reason: CloseReason },
    DecodeError { reason: DecodeErrorKind },
    RequestTimeout { seq: u8 },
    NoRequestor { seq: u8, decoded: LanMessage },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    User,
    Remote,
    TransportError,
    DecodeError,
    RetransmitsExhausted,
}

impl From<&IpmiError> for CloseReason {
    fn from(e: &IpmiError) -> Self {
        match e {
            IpmiError::TransportError { .. } => CloseReason::TransportError,
            IpmiError::DecodeError { .. } => CloseReason::DecodeError,
            IpmiError::Timeout => CloseReason::RetransmitsExhausted,
            _ => CloseReason::TransportError,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }
}

pub struct Subscription {
    receiver: broadcast::Receiver<SessionEvent>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Publish never blocks: `broadcast::Sender::send` only fails when
    /// there are no subscribers, which is not an error here.
    pub fn publish(&self, event: SessionEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}


impl std::fmt::Debug for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::Established => write!(f, "Established"),
            SessionEvent::Closed { reason } => write!(f, "Closed({reason:?})"),
            SessionEvent::DecodeError { reason } => write!(f, "DecodeError({reason})"),
            SessionEvent::RequestTimeout { seq } => write!(f, "RequestTimeout({seq})"),
            SessionEvent::NoRequestor { seq, .. } => write!(f, "NoRequestor({seq})"),
        }
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later

//! The Session actor: one task per target, owning exactly one UDP
//! endpoint and one in-flight registry (§4.2, §5). The public `Session`
//! handle is a cheap `Clone`, communicating with its task over an mpsc
//! channel — the same message-style boundary the upstream `ClientConnection`
//! exposes over its split TCP halves, generalized here to a persistent
//! `tokio::select!` loop instead of one in-flight operation.

use std::{collections::VecDeque, net::SocketAddr, sync::Arc};

use tokio::{
    net::lookup_host,
    sync::{mpsc, oneshot},
    time::Instant,
};
use tracing::{debug, instrument, warn};

use super::{
    setup::{Established, SetupOutcome, SetupPhase, SetupStep, CMD_CLOSE_SESSION},
    state::Phase,
};
use crate::{
    cfg::config::Config,
    codec::{
        message::{LanMessage, Lun, NETFN_APP},
        rmcp::{RmcpClass, RmcpHeader},
        session::{compute_auth_code, AuthType, SessionHeader},
    },
    error::{DecodeErrorKind, IpmiError, Result},
    events::{CloseReason, EventBus, SessionEvent, Subscription},
    registry::{PendingRequest, Registry},
    transport::Transport,
    utils::wrapping_distance,
};

const REPLAY_WINDOW: u32 = 8;

enum Command {
    Request {
        netfn: crate::codec::message::NetFn,
        command: u8,
        data: Vec<u8>,
        reply: oneshot::Sender<Result<LanMessage>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Opaque (target, tag) pair; valid only while the owning task is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    pub target: SocketAddr,
    pub tag: u64,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub handle: SessionHandle,
    tx: mpsc::Sender<Command>,
    events: EventBus,
}

impl Session {
    #[instrument(skip(cfg), fields(target = %target_host))]
    pub async fn open(target_host: &str, tag: u64, cfg: Config) -> Result<Self> {
        cfg.validate_and_normalize()?;

        let target = resolve(target_host, cfg.port).await?;
        let transport = Transport::connect(target).await?;
        let established = run_setup(&transport, &cfg).await?;

        let (tx, rx) = mpsc::channel(64);
        let events = EventBus::new();
        let handle = SessionHandle { target, tag };

        let task = SessionTask {
            transport,
            registry: Arc::new(Registry::new()),
            events: events.clone(),
            cfg,
            outbound_seq: established.outbound_seq,
            inbound_seq_max: established.inbound_seq,
            auth_type: established.auth_type,
            session_id: established.session_id,
            requestor_lun: Lun::Zero,
            pending_commands: VecDeque::new(),
        };

        tokio::spawn(task.run(rx));

        Ok(Self { handle, tx, events })
    }

    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    pub fn subscribe_count(&self) -> usize {
        self.events.subscriber_count()
    }

    pub async fn request(
        &self,
        netfn: crate::codec::message::NetFn,
        command: u8,
        data: Vec<u8>,
    ) -> Result<LanMessage> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Request {
                netfn,
                command,
                data,
                reply,
            })
            .await
            .map_err(|_| IpmiError::NoSession)?;
        rx.await.map_err(|_| IpmiError::NoSession)?
    }

    pub async fn close(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Command::Close { reply }).await.is_err() {
            return Err(IpmiError::NoSession);
        }
        let _ = rx.await;
        Ok(())
    }
}

async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    let addr = format!("{host}:{port}");
    lookup_host(&addr)
        .await?
        .next()
        .ok_or_else(|| IpmiError::TransportError {
            reason: format!("could not resolve {host}"),
        })
}

/// Drives the setup state machine to completion, strictly sequential: one
/// outstanding request at a time, matched by session id 0 (§4.2 decoding
/// floor).
#[instrument(skip(transport, cfg))]
async fn run_setup(transport: &Transport, cfg: &Config) -> Result<Established> {
    let mut phase = SetupPhase::start();
    let mut rmcp_seq: u8 = 0;

    loop {
        let state = phase.state();
        let request = phase.build_request(cfg);
        let session_header = SessionHeader {
            auth_type: AuthType::None,
            session_seq: 0,
            session_id: 0,
            auth_code: None,
            payload_length: 0, // filled in by encode_frame
        };
        let frame = encode_frame(rmcp_seq, &session_header, &request);
        rmcp_seq = rmcp_seq.wrapping_add(1);

        transport.send(&frame).await?;

        let (buf, _) = tokio::time::timeout(cfg.timeout, transport.recv())
            .await
            .map_err(|_| IpmiError::AuthError { step: state })?
            .map_err(|_| IpmiError::AuthError { step: state })?;

        let resp = decode_frame(&buf).map_err(|_| IpmiError::AuthError { step: state })?;

        match phase.apply_response(cfg, &resp)? {
            SetupOutcome::Advance(next) => phase = next,
            SetupOutcome::Established(established) => {
                debug!(session_id = established.session_id, "session established");
                return Ok(established);
            },
        }
    }
}

fn encode_frame(rmcp_seq: u8, session_header: &SessionHeader, msg: &LanMessage) -> Vec<u8> {
    let payload = msg.encode();
    let mut header = session_header.clone();
    header.payload_length = payload.len() as u8;

    let mut out = RmcpHeader::data_with_ack(RmcpClass::Ipmi, rmcp_seq).encode().to_vec();
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(&payload);
    out
}

fn decode_frame(buf: &[u8]) -> Result<LanMessage> {
    let (rmcp, rest) = RmcpHeader::decode(buf)?;
    if rmcp.class.class()? != RmcpClass::Ipmi {
        return Err(IpmiError::DecodeError {
            reason: DecodeErrorKind::UnexpectedClass,
        });
    }
    let (_session, rest) = SessionHeader::decode(rest)?;
    LanMessage::decode(rest)
}

struct SessionTask {
    transport: Transport,
    registry: Arc<Registry>,
    events: EventBus,
    cfg: Config,
    outbound_seq: u32,
    inbound_seq_max: u32,
    auth_type: AuthType,
    session_id: u32,
    requestor_lun: Lun,
    pending_commands: VecDeque<(u8, Instant)>,
}

impl SessionTask {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let mut rmcp_seq: u8 = 0;
        self.events.publish(SessionEvent::Established);
        loop {
            let next_deadline = self.pending_commands.front().map(|(_, d)| *d);

            tokio::select! {
                biased;

                cmd = commands.recv() => {
                    match cmd {
                        Some(Command::Request { netfn, command, data, reply }) => {
                            if let Err(e) = self.send_request(&mut rmcp_seq, netfn, command, data, reply).await {
                                warn!("failed to dispatch request: {e}");
                            }
                        }
                        Some(Command::Close { reply }) => {
                            self.shutdown(CloseReason::User).await;
                            let _ = reply.send(());
                            return;
                        }
                        None => {
                            self.shutdown(CloseReason::User).await;
                            return;
                        }
                    }
                }

                datagram = self.transport.recv() => {
                    match datagram {
                        Ok((buf, _from)) => self.handle_datagram(&buf),
                        Err(e) => {
                            warn!("transport error: {e}");
                            self.shutdown(CloseReason::TransportError).await;
                            return;
                        }
                    }
                }

                _ = sleep_until_next(next_deadline) => {
                    self.fire_timeouts();
                }
            }
        }
    }

    async fn send_request(
        &mut self,
        rmcp_seq: &mut u8,
        netfn: crate::codec::message::NetFn,
        command: u8,
        data: Vec<u8>,
        reply: oneshot::Sender<Result<LanMessage>>,
    ) -> Result<()> {
        let seq = self.registry.alloc_sequence().ok_or(IpmiError::Timeout)?;
        self.registry.register(seq, PendingRequest { reply });

        let msg = LanMessage {
            responder_addr: 0x20,
            netfn,
            responder_lun: Lun::Zero,
            requestor_addr: self.cfg.rq_addr,
            requestor_seq: seq,
            requestor_lun: self.requestor_lun,
            command,
            data,
        };

        self.outbound_seq = self.outbound_seq.wrapping_add(1);
        let auth_code = compute_auth_code(
            self.auth_type,
            self.session_id,
            &self.cfg.password,
            &msg.encode(),
            self.outbound_seq,
        );
        let header = SessionHeader {
            auth_type: self.auth_type,
            session_seq: self.outbound_seq,
            session_id: self.session_id,
            auth_code,
            payload_length: 0,
        };
        let frame = encode_frame(*rmcp_seq, &header, &msg);
        *rmcp_seq = rmcp_seq.wrapping_add(1);

        self.transport.send(&frame).await?;
        self.pending_commands
            .push_back((seq, Instant::now() + self.cfg.timeout));
        Ok(())
    }

    fn handle_datagram(&mut self, buf: &[u8]) {
        let frame = match RmcpHeader::decode(buf).and_then(|(rmcp, rest)| {
            if rmcp.class.class()? != RmcpClass::Ipmi {
                return Err(IpmiError::DecodeError {
                    reason: DecodeErrorKind::UnexpectedClass,
                });
            }
            let (session, rest) = SessionHeader::decode(rest)?;
            let msg = LanMessage::decode(rest)?;
            Ok((session, msg))
        }) {
            Ok(frame) => frame,
            Err(IpmiError::DecodeError { reason }) => {
                self.events.publish(SessionEvent::DecodeError { reason });
                return;
            },
            Err(_) => return,
        };

        let (session, msg) = frame;

        if session.session_seq != 0 {
            // `behind` is (inbound_seq_max - session_seq) mod 2^32; values at or
            // past the halfway point mean session_seq is actually ahead (the
            // BMC's counter wrapped past u32::MAX), matching RFC 1982 serial
            // number arithmetic so a BMC-chosen initial sequence near the top
            // of the range never overflows this comparison.
            let behind = wrapping_distance(self.inbound_seq_max, session.session_seq, 32);
            if behind >= (1u32 << 31) {
                self.inbound_seq_max = session.session_seq;
            } else if behind >= REPLAY_WINDOW {
                // more than replay-window behind max-seen: drop as a replay
                return;
            }
        }

        let seq = msg.requestor_seq;
        if !self.registry.complete(seq, Ok(msg.clone())) {
            self.events.publish(SessionEvent::NoRequestor { seq, decoded: msg });
        } else {
            self.pending_commands.retain(|(s, _)| *s != seq);
        }
    }

    fn fire_timeouts(&mut self) {
        let now = Instant::now();
        let mut fired = Vec::new();
        while let Some((seq, deadline)) = self.pending_commands.front().copied() {
            if deadline > now {
                break;
            }
            self.pending_commands.pop_front();
            fired.push(seq);
        }
        for seq in fired {
            if self.registry.evict(seq) {
                self.events.publish(SessionEvent::RequestTimeout { seq });
            }
        }
    }

    async fn shutdown(&mut self, reason: CloseReason) {
        if reason == CloseReason::User {
            let close_msg = LanMessage {
                responder_addr: 0x20,
                netfn: NETFN_APP,
                responder_lun: Lun::Zero,
                requestor_addr: self.cfg.rq_addr,
                requestor_seq: 0,
                requestor_lun: self.requestor_lun,
                command: CMD_CLOSE_SESSION,
                data: self.session_id.to_le_bytes().to_vec(),
            };
            self.outbound_seq = self.outbound_seq.wrapping_add(1);
            let header = SessionHeader {
                auth_type: self.auth_type,
                session_seq: self.outbound_seq,
                session_id: self.session_id,
                auth_code: None,
                payload_length: 0,
            };
            let frame = encode_frame(0, &header, &close_msg);
            let _ = self.transport.send(&frame).await;
        }
        for seq in self.registry.in_flight_sequences() {
            self.registry.evict(seq);
        }
        self.events.publish(SessionEvent::Closed { reason });
    }
}

async fn sleep_until_next(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

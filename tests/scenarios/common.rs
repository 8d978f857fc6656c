// SPDX-License-Identifier: AGPL-3.0-or-later

use std::net::SocketAddr;

use ipmi_lan_rs::codec::{
    message::LanMessage,
    rmcp::{RmcpClass, RmcpHeader},
    session::{AuthType, SessionHeader},
};
use tokio::net::UdpSocket;

/// A minimal, scriptable stand-in for a BMC: binds loopback, decodes one
/// request at a time, and replies with whatever the test scripts.
pub struct MockBmc {
    socket: UdpSocket,
}

impl MockBmc {
    pub async fn bind() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind loopback");
        Self { socket }
    }

    pub fn addr(&self) -> SocketAddr {
        self.socket.local_addr().expect("local addr")
    }

    /// Waits for the next IPMI-session-layer request, returning the decoded
    /// message and the peer to reply to.
    pub async fn recv_request(&self) -> (LanMessage, SocketAddr) {
        let mut buf = vec![0u8; 1024];
        let (n, from) = self.socket.recv_from(&mut buf).await.expect("recv");
        buf.truncate(n);
        let (rmcp, rest) = RmcpHeader::decode(&buf).expect("rmcp header");
        assert_eq!(rmcp.class.class().unwrap(), RmcpClass::Ipmi);
        let (_session, rest) = SessionHeader::decode(rest).expect("session header");
        (LanMessage::decode(rest).expect("lan message"), from)
    }

    /// Replies with a completion code and response data, session id/seq 0,
    /// no auth — sufficient for the unauthenticated setup steps this suite
    /// exercises.
    pub async fn reply(&self, to: SocketAddr, request: &LanMessage, completion: u8, data: Vec<u8>) {
        let mut full = vec![completion];
        full.extend(data);
        let response = LanMessage {
            responder_addr: request.requestor_addr,
            netfn: request.netfn.response(),
            responder_lun: request.requestor_lun,
            requestor_addr: request.responder_addr,
            requestor_seq: request.requestor_seq,
            requestor_lun: request.responder_lun,
            command: request.command,
            data: full,
        };
        let header = SessionHeader {
            auth_type: AuthType::None,
            session_seq: 0,
            session_id: 0,
            auth_code: None,
            payload_length: 0,
        };
        let payload = response.encode();
        let mut frame = RmcpHeader::data(RmcpClass::Ipmi).encode().to_vec();
        frame.extend_from_slice(&header.encode());
        frame.extend_from_slice(&payload);
        self.socket.send_to(&frame, to).await.expect("send reply");
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later

use std::time::Duration;

use ipmi_lan_rs::{
    codec::{
        asf::{AsfMessage, AsfMessageType, PongPayload, SupportedEntities, IANA_ENTERPRISE},
        rmcp::{RmcpClass, RmcpHeader},
    },
    discovery::ping,
};
use tokio::net::UdpSocket;

#[tokio::test]
async fn ping_without_ipmi_bit_returns_false() {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let target = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = vec![0u8; 256];
        let (n, from) = socket.recv_from(&mut buf).await.unwrap();
        buf.truncate(n);
        let (_rmcp, rest) = RmcpHeader::decode(&buf).unwrap();
        let ping = AsfMessage::decode(rest).unwrap();

        let pong = AsfMessage {
            message_tag: ping.message_tag,
            message_type: AsfMessageType::Pong(PongPayload {
                oem_iana: IANA_ENTERPRISE,
                oem_specific: 0,
                supported_entities: SupportedEntities::from_bits_truncate(0x01),
                supported_interactions: 0,
            }),
        };
        let mut frame = RmcpHeader::data_with_ack(RmcpClass::Asf, 0x01).encode().to_vec();
        frame.extend_from_slice(&pong.encode());
        socket.send_to(&frame, from).await.unwrap();
    });

    let reachable = ping(target, Duration::from_millis(500)).await;
    assert!(!reachable);
}

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
async fn ping_reachable_reports_ipmi_supported() {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let target = socket.local_addr().unwrap();

    let responder = tokio::spawn(async move {
        let mut buf = vec![0u8; 256];
        let (n, from) = socket.recv_from(&mut buf).await.unwrap();
        buf.truncate(n);
        let (_rmcp, rest) = RmcpHeader::decode(&buf).unwrap();
        let ping = AsfMessage::decode(rest).unwrap();
        assert!(matches!(ping.message_type, AsfMessageType::Ping));

        let pong = AsfMessage {
            message_tag: ping.message_tag,
            message_type: AsfMessageType::Pong(PongPayload {
                oem_iana: IANA_ENTERPRISE,
                oem_specific: 0,
                supported_entities: SupportedEntities::from_bits_truncate(0x81),
                supported_interactions: 0,
            }),
        };
        let mut frame = RmcpHeader::data_with_ack(RmcpClass::Asf, 0x01).encode().to_vec();
        frame.extend_from_slice(&pong.encode());
        socket.send_to(&frame, from).await.unwrap();

        // expect exactly one ACK back from the prober
        let (n, _) = socket.recv_from(&mut buf).await.unwrap();
        let (ack, _) = RmcpHeader::decode(&buf[..n]).unwrap();
        assert!(ack.class.is_ack());
    });

    let reachable = ping(target, Duration::from_millis(500)).await;
    assert!(reachable);
    responder.await.unwrap();
}

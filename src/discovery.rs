// SPDX-License-Identifier: AGPL-3.0-or-later

//! ASF presence probe (§4.7): one ping, tolerate stray RMCP ACKs, accept one
//! pong, ACK it back, and report whether the target advertises IPMI.

use std::{net::SocketAddr, time::Duration};

use tracing::{debug, instrument};

use crate::{
    codec::{
        asf::{AsfMessage, AsfMessageType},
        rmcp::{RmcpClass, RmcpHeader},
    },
    transport::Transport,
};

#[instrument(fields(%target))]
pub async fn ping(target: SocketAddr, timeout: Duration) -> bool {
    match try_ping(target, timeout).await {
        Ok(supports_ipmi) => supports_ipmi,
        Err(e) => {
            debug!("ping failed: {e}");
            false
        },
    }
}

async fn try_ping(target: SocketAddr, timeout: Duration) -> crate::error::Result<bool> {
    let transport = Transport::bind_any().await?;

    let request = RmcpHeader::data_with_ack(RmcpClass::Asf, 0x00);
    let mut frame = request.encode().to_vec();
    frame.extend_from_slice(&AsfMessage::ping(0x00).encode());
    transport.send_to(&frame, target).await?;

    tokio::time::timeout(timeout, async {
        loop {
            let (buf, from) = transport.recv().await?;
            if from != target {
                continue;
            }
            let Ok((rmcp, rest)) = RmcpHeader::decode(&buf) else {
                continue;
            };
            if rmcp.class.is_ack() {
                // a stray RMCP presence ACK; keep waiting for the pong
                continue;
            }
            if rmcp.class.class().ok() != Some(RmcpClass::Asf) {
                continue;
            }
            let Ok(msg) = AsfMessage::decode(rest) else {
                continue;
            };
            let AsfMessageType::Pong(pong) = msg.message_type else {
                continue;
            };

            if rmcp.wants_ack() {
                let ack = RmcpHeader::ack(RmcpClass::Asf, rmcp.sequence).encode();
                let _ = transport.send_to(&ack, target).await;
            }

            return Ok(pong.supported_entities.supports_ipmi());
        }
    })
    .await
    .map_err(|_| crate::error::IpmiError::Timeout)?
}

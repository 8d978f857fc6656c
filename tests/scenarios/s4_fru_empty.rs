// SPDX-License-Identifier: AGPL-3.0-or-later

use anyhow::{Context, Result};
use ipmi_lan_rs::{cfg::config::Config, fru, session::Session};

use crate::scenarios::common::MockBmc;

#[tokio::test]
async fn fru_parameter_out_of_range_yields_empty_result() -> Result<()> {
    let bmc = MockBmc::bind().await;
    let port = bmc.addr().port();

    let responder = tokio::spawn(async move {
        // AuthCap: no auth types advertised beyond "none".
        let (req, from) = bmc.recv_request().await;
        bmc.reply(from, &req, 0x00, vec![0x01, 0x00]).await;

        // Get Session Challenge.
        let (req, from) = bmc.recv_request().await;
        let mut data = 0xAAAAAAAAu32.to_le_bytes().to_vec();
        data.extend_from_slice(&[0x11u8; 16]);
        bmc.reply(from, &req, 0x00, data).await;

        // Activate Session.
        let (req, from) = bmc.recv_request().await;
        let mut data = vec![0x00]; // auth_type: none
        data.extend_from_slice(&7u32.to_le_bytes()); // session id
        data.extend_from_slice(&1u32.to_le_bytes()); // inbound seq
        bmc.reply(from, &req, 0x00, data).await;

        // Set Session Privilege Level.
        let (req, from) = bmc.recv_request().await;
        bmc.reply(from, &req, 0x00, vec![0x04]).await;

        // Get FRU Inventory Area Info: parameter out of range.
        let (req, from) = bmc.recv_request().await;
        bmc.reply(from, &req, 0xC9, vec![]).await;
    });

    let cfg = Config::default().with_port(port);
    let session = Session::open("127.0.0.1", 1, cfg)
        .await
        .context("session should establish")?;

    let info = fru::read(&session, 0).await.context("fru read should succeed")?;
    assert!(info.is_none());

    responder.await.context("responder task panicked")?;
    Ok(())
}

// SPDX-License-Identifier: AGPL-3.0-or-later

use anyhow::{Context, Result};
use ipmi_lan_rs::{
    cfg::config::Config,
    error::{IpmiError, SetupState},
    session::Session,
};

use crate::scenarios::common::MockBmc;

#[tokio::test]
async fn bad_challenge_completion_fails_open_at_challenge_step() -> Result<()> {
    let bmc = MockBmc::bind().await;
    let port = bmc.addr().port();

    let responder = tokio::spawn(async move {
        // AuthCap: succeed, advertise MD5 support.
        let (req, from) = bmc.recv_request().await;
        bmc.reply(from, &req, 0x00, vec![0x01, 0b0000_0010]).await;

        // Get Session Challenge: reject with "invalid user".
        let (req, from) = bmc.recv_request().await;
        bmc.reply(from, &req, 0x81, vec![]).await;
    });

    let cfg = Config::default().with_port(port).with_user("admin");
    let result = Session::open("127.0.0.1", 1, cfg).await;

    match result {
        Err(IpmiError::AuthError { step }) => assert_eq!(step, SetupState::ChallengeReq),
        other => panic!("expected auth_error at challenge step, got {other:?}"),
    }

    responder.await.context("responder task panicked")?;
    Ok(())
}

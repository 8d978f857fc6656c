// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session establishment as a small per-step state machine: each setup
//! phase knows how to build its one outbound request and how to fold the
//! matching response into the next phase, exactly one in flight at a
//! time (§4.2).
//!
//! Grounded in the upstream `Transition<S, R>` / `StateMachine<Ctx,
//! RespCtx>` shape: `SetupStep::apply_response` plays the role of
//! `StateMachine::step`, and `SetupOutcome` plays the role of
//! `Transition`, specialized here because setup has no "stay" case — every
//! reply either advances the phase or fails the open.

use enum_dispatch::enum_dispatch;

use crate::{
    cfg::config::{Config, Privilege},
    codec::{
        message::{LanMessage, Lun, NETFN_APP},
        session::AuthType,
    },
    error::{IpmiError, Result, SetupState},
};

const CMD_GET_CHANNEL_AUTH_CAPABILITIES: u8 = 0x38;
const CMD_GET_SESSION_CHALLENGE: u8 = 0x39;
const CMD_ACTIVATE_SESSION: u8 = 0x3A;
const CMD_SET_SESSION_PRIVILEGE_LEVEL: u8 = 0x3B;
pub const CMD_CLOSE_SESSION: u8 = 0x3C;

const CURRENT_CHANNEL: u8 = 0x0E;

/// Everything established by the time setup is complete.
#[derive(Debug, Clone)]
pub struct Established {
    pub auth_type: AuthType,
    pub session_id: u32,
    pub outbound_seq: u32,
    pub inbound_seq: u32,
}

#[derive(Debug)]
pub enum SetupOutcome {
    Advance(SetupPhase),
    Established(Established),
}

#[enum_dispatch]
pub trait SetupStep {
    fn state(&self) -> SetupState;
    fn build_request(&self, cfg: &Config) -> LanMessage;
    fn apply_response(&self, cfg: &Config, resp: &LanMessage) -> Result<SetupOutcome>;
}

fn completion_ok(resp: &LanMessage) -> Result<()> {
    match resp.completion_code() {
        Some(0x00) => Ok(()),
        Some(_) => Err(IpmiError::AuthError {
            step: SetupState::AuthCap,
        }),
        None => Err(IpmiError::DecodeError {
            reason: crate::error::DecodeErrorKind::BadLength,
        }),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AuthCapStep;

impl SetupStep for AuthCapStep {
    fn state(&self) -> SetupState {
        SetupState::AuthCap
    }

    fn build_request(&self, _cfg: &Config) -> LanMessage {
        LanMessage {
            responder_addr: 0x20,
            netfn: NETFN_APP,
            responder_lun: Lun::Zero,
            requestor_addr: 0x81,
            requestor_seq: 0,
            requestor_lun: Lun::Zero,
            command: CMD_GET_CHANNEL_AUTH_CAPABILITIES,
            data: vec![CURRENT_CHANNEL, Privilege::Administrator.raw()],
        }
    }

    fn apply_response(&self, cfg: &Config, resp: &LanMessage) -> Result<SetupOutcome> {
        if resp.completion_code() != Some(0x00) {
            return Err(IpmiError::AuthError {
                step: SetupState::AuthCap,
            });
        }
        let data = resp.response_data();
        let auth_support = *data.get(1).ok_or(IpmiError::AuthError {
            step: SetupState::AuthCap,
        })?;

        // bit 1 = MD5, bit 2 = MD2, bit 4 = straight password, bit 0 = none
        let chosen_auth = if auth_support & 0b0000_0010 != 0 {
            AuthType::Md5
        } else if auth_support & 0b0000_0100 != 0 {
            AuthType::Md2
        } else if auth_support & 0b0001_0000 != 0 {
            AuthType::Straight
        } else {
            AuthType::None
        };

        Ok(SetupOutcome::Advance(SetupPhase::ChallengeReq(
            ChallengeReqStep { chosen_auth },
        )))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChallengeReqStep {
    chosen_auth: AuthType,
}

impl SetupStep for ChallengeReqStep {
    fn state(&self) -> SetupState {
        SetupState::ChallengeReq
    }

    fn build_request(&self, cfg: &Config) -> LanMessage {
        let mut data = vec![self.chosen_auth.raw()];
        let mut user = [0u8; 16];
        let bytes = cfg.user.as_bytes();
        let n = bytes.len().min(16);
        user[..n].copy_from_slice(&bytes[..n]);
        data.extend_from_slice(&user);

        LanMessage {
            responder_addr: 0x20,
            netfn: NETFN_APP,
            responder_lun: Lun::Zero,
            requestor_addr: 0x81,
            requestor_seq: 0,
            requestor_lun: Lun::Zero,
            command: CMD_GET_SESSION_CHALLENGE,
            data,
        }
    }

    fn apply_response(&self, _cfg: &Config, resp: &LanMessage) -> Result<SetupOutcome> {
        if resp.completion_code() != Some(0x00) {
            return Err(IpmiError::AuthError {
                step: SetupState::ChallengeReq,
            });
        }
        let data = resp.response_data();
        if data.len() < 20 {
            return Err(IpmiError::DecodeError {
                reason: crate::error::DecodeErrorKind::BadLength,
            });
        }
        let temp_session_id = u32::from_le_bytes(data[0..4].try_into().expect("len checked"));
        let mut challenge = [0u8; 16];
        challenge.copy_from_slice(&data[4..20]);

        Ok(SetupOutcome::Advance(SetupPhase::ActivateReq(
            ActivateReqStep {
                chosen_auth: self.chosen_auth,
                temp_session_id,
                challenge,
            },
        )))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ActivateReqStep {
    chosen_auth: AuthType,
    temp_session_id: u32,
    challenge: [u8; 16],
}

impl SetupStep for ActivateReqStep {
    fn state(&self) -> SetupState {
        SetupState::ActivateReq
    }

    fn build_request(&self, cfg: &Config) -> LanMessage {
        let mut data = vec![self.chosen_auth.raw(), cfg.privilege.raw()];
        data.extend_from_slice(&self.challenge);
        data.extend_from_slice(&cfg.initial_outbound_seq_nr.to_le_bytes());

        LanMessage {
            responder_addr: 0x20,
            netfn: NETFN_APP,
            responder_lun: Lun::Zero,
            requestor_addr: 0x81,
            requestor_seq: 0,
            requestor_lun: Lun::Zero,
            command: CMD_ACTIVATE_SESSION,
            data,
        }
    }

    fn apply_response(&self, cfg: &Config, resp: &LanMessage) -> Result<SetupOutcome> {
        if resp.completion_code() != Some(0x00) {
            return Err(IpmiError::AuthError {
                step: SetupState::ActivateReq,
            });
        }
        let data = resp.response_data();
        if data.len() < 9 {
            return Err(IpmiError::DecodeError {
                reason: crate::error::DecodeErrorKind::BadLength,
            });
        }
        let auth_type = AuthType::from_raw(data[0])?;
        let session_id = u32::from_le_bytes(data[1..5].try_into().expect("len checked"));
        let inbound_seq = u32::from_le_bytes(data[5..9].try_into().expect("len checked"));

        Ok(SetupOutcome::Advance(SetupPhase::SetPriv(SetPrivStep {
            auth_type,
            session_id,
            inbound_seq,
            outbound_seq: cfg.initial_outbound_seq_nr,
        })))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SetPrivStep {
    auth_type: AuthType,
    session_id: u32,
    inbound_seq: u32,
    outbound_seq: u32,
}

impl SetupStep for SetPrivStep {
    fn state(&self) -> SetupState {
        SetupState::SetPriv
    }

    fn build_request(&self, cfg: &Config) -> LanMessage {
        LanMessage {
            responder_addr: 0x20,
            netfn: NETFN_APP,
            responder_lun: Lun::Zero,
            requestor_addr: cfg.rq_addr,
            requestor_seq: 0,
            requestor_lun: Lun::Zero,
            command: CMD_SET_SESSION_PRIVILEGE_LEVEL,
            data: vec![cfg.privilege.raw()],
        }
    }

    fn apply_response(&self, _cfg: &Config, resp: &LanMessage) -> Result<SetupOutcome> {
        completion_ok(resp).map_err(|_| IpmiError::AuthError {
            step: SetupState::SetPriv,
        })?;
        Ok(SetupOutcome::Established(Established {
            auth_type: self.auth_type,
            session_id: self.session_id,
            outbound_seq: self.outbound_seq,
            inbound_seq: self.inbound_seq,
        }))
    }
}

#[enum_dispatch(SetupStep)]
#[derive(Debug, Clone)]
pub enum SetupPhase {
    AuthCap(AuthCapStep),
    ChallengeReq(ChallengeReqStep),
    ActivateReq(ActivateReqStep),
    SetPriv(SetPrivStep),
}

impl SetupPhase {
    pub fn start() -> Self {
        SetupPhase::AuthCap(AuthCapStep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::config::Config;

    fn ok_response(command: u8, data: Vec<u8>) -> LanMessage {
        let mut full = vec![0x00];
        full.extend(data);
        LanMessage {
            responder_addr: 0x81,
            netfn: NETFN_APP.response(),
            responder_lun: Lun::Zero,
            requestor_addr: 0x20,
            requestor_seq: 0,
            requestor_lun: Lun::Zero,
            command,
            data: full,
        }
    }

    #[test]
    fn full_setup_sequence_reaches_established() {
        let cfg = Config::default();
        let mut phase = SetupPhase::start();

        let resp = ok_response(CMD_GET_CHANNEL_AUTH_CAPABILITIES, vec![0x01, 0b0000_0010]);
        let outcome = phase.apply_response(&cfg, &resp).unwrap();
        phase = match outcome {
            SetupOutcome::Advance(p) => p,
            SetupOutcome::Established(_) => panic!("too soon"),
        };

        let mut challenge_data = 42u32.to_le_bytes().to_vec();
        challenge_data.extend_from_slice(&[0xAAu8; 16]);
        let resp = ok_response(CMD_GET_SESSION_CHALLENGE, challenge_data);
        let outcome = phase.apply_response(&cfg, &resp).unwrap();
        phase = match outcome {
            SetupOutcome::Advance(p) => p,
            SetupOutcome::Established(_) => panic!("too soon"),
        };

        let mut activate_data = vec![AuthType::Md5.raw()];
        activate_data.extend_from_slice(&99u32.to_le_bytes());
        activate_data.extend_from_slice(&1u32.to_le_bytes());
        let resp = ok_response(CMD_ACTIVATE_SESSION, activate_data);
        let outcome = phase.apply_response(&cfg, &resp).unwrap();
        phase = match outcome {
            SetupOutcome::Advance(p) => p,
            SetupOutcome::Established(_) => panic!("too soon"),
        };

        let resp = ok_response(CMD_SET_SESSION_PRIVILEGE_LEVEL, vec![cfg.privilege.raw()]);
        let outcome = phase.apply_response(&cfg, &resp).unwrap();
        match outcome {
            SetupOutcome::Established(est) => {
                assert_eq!(est.session_id, 99);
                assert_eq!(est.auth_type, AuthType::Md5);
            },
            SetupOutcome::Advance(_) => panic!("expected established"),
        }
    }

    #[test]
    fn challenge_rejection_surfaces_auth_error_at_that_step() {
        let cfg = Config::default();
        let phase = SetupPhase::ChallengeReq(ChallengeReqStep {
            chosen_auth: AuthType::Md5,
        });
        let mut resp = ok_response(CMD_GET_SESSION_CHALLENGE, vec![]);
        resp.data[0] = 0x81;
        let err = phase.apply_response(&cfg, &resp).unwrap_err();
        match err {
            IpmiError::AuthError { step } => assert_eq!(step, SetupState::ChallengeReq),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

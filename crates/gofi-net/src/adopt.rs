//! One-shot SSH adopt call that seeds a factory-default AP with this
//! controller's URL and auth key (§4.G).

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

const DIAL_TIMEOUT: Duration = Duration::from_secs(10);
const SESSION_TIMEOUT: Duration = Duration::from_secs(30);
const ADOPT_USER: &str = "ubnt";

#[derive(Debug, Error)]
pub enum AdoptError {
    #[error("ssh dial to {0} timed out after {1:?}")]
    DialTimeout(String, Duration),
    #[error("ssh session timed out after {0:?}")]
    SessionTimeout(Duration),
    #[error("ssh error: {0}")]
    Ssh(#[from] russh::Error),
    #[error("password authentication rejected for user {0:?}")]
    AuthRejected(String),
    #[error("remote adopt command exited with status {0}")]
    CommandFailed(u32),
}

/// Boxed so `Manager` can be exercised in tests without a real SSH endpoint.
#[async_trait]
pub trait AdoptTransport: Send + Sync {
    async fn adopt(
        &self,
        ap_addr: &str,
        ssh_password: &str,
        controller_url: &str,
        auth_key_hex: &str,
    ) -> Result<(), AdoptError>;
}

/// Exact remote command the original `adopt.go` issues.
fn adopt_command(controller_url: &str, auth_key_hex: &str) -> String {
    format!("/usr/bin/syswrapper.sh set-adopt {controller_url} {auth_key_hex}")
}

/// Host key is never validated: the AP is factory-default and out of this
/// system's trust scope (§4.G).
struct AcceptAnyHostKey;

#[async_trait]
impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::key::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// The shipped [`AdoptTransport`], using `russh` as a pure-Rust async SSH client.
#[derive(Debug, Default)]
pub struct RusshAdopt;

impl RusshAdopt {
    pub fn new() -> Self {
        Self
    }

    async fn dial(&self, ap_addr: &str) -> Result<Handle<AcceptAnyHostKey>, AdoptError> {
        let config = Arc::new(client::Config::default());
        timeout(
            DIAL_TIMEOUT,
            client::connect(config, (ap_addr, 22u16), AcceptAnyHostKey),
        )
        .await
        .map_err(|_| AdoptError::DialTimeout(ap_addr.to_string(), DIAL_TIMEOUT))?
        .map_err(AdoptError::from)
    }
}

#[async_trait]
impl AdoptTransport for RusshAdopt {
    async fn adopt(
        &self,
        ap_addr: &str,
        ssh_password: &str,
        controller_url: &str,
        auth_key_hex: &str,
    ) -> Result<(), AdoptError> {
        let mut session = self.dial(ap_addr).await?;

        let authenticated = session
            .authenticate_password(ADOPT_USER, ssh_password)
            .await?;
        if !authenticated {
            return Err(AdoptError::AuthRejected(ADOPT_USER.to_string()));
        }

        let mut channel = timeout(SESSION_TIMEOUT, session.channel_open_session())
            .await
            .map_err(|_| AdoptError::SessionTimeout(SESSION_TIMEOUT))??;

        channel
            .exec(true, adopt_command(controller_url, auth_key_hex))
            .await?;

        let mut exit_status = 0u32;
        loop {
            let msg = timeout(SESSION_TIMEOUT, channel.wait())
                .await
                .map_err(|_| AdoptError::SessionTimeout(SESSION_TIMEOUT))?;
            match msg {
                Some(ChannelMsg::ExitStatus { exit_status: status }) => exit_status = status,
                Some(ChannelMsg::Eof) | None => break,
                _ => {}
            }
        }

        let _ = session
            .disconnect(Disconnect::ByApplication, "", "en")
            .await;

        if exit_status != 0 {
            return Err(AdoptError::CommandFailed(exit_status));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adopt_command_matches_wire_format() {
        let cmd = adopt_command("http://192.168.1.1:8080/inform", "deadbeef");
        assert_eq!(
            cmd,
            "/usr/bin/syswrapper.sh set-adopt http://192.168.1.1:8080/inform deadbeef"
        );
    }
}

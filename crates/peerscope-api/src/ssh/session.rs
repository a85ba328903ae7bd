use std::sync::Arc;

use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect};
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use super::{DeviceHandler, SshConfig};
use crate::auth::{Endpoint, SshCredentials, SshSecret};
use crate::error::Error;

/// An authenticated SSH session to one device.
///
/// Each command runs on its own exec channel, in order. Dropping the session
/// closes the underlying connection.
pub struct SshSession {
    handle: Handle<DeviceHandler>,
    endpoint: Endpoint,
}

impl SshSession {
    /// Connect and authenticate within `config.connect_timeout`.
    pub async fn connect(
        endpoint: &Endpoint,
        credentials: &SshCredentials,
        config: &SshConfig,
    ) -> Result<Self, Error> {
        let budget = config.connect_timeout;
        tokio::time::timeout(budget, Self::establish(endpoint, credentials, config))
            .await
            .map_err(|_| Error::Timeout {
                timeout_secs: budget.as_secs(),
            })?
    }

    async fn establish(
        endpoint: &Endpoint,
        credentials: &SshCredentials,
        config: &SshConfig,
    ) -> Result<Self, Error> {
        debug!(endpoint = %endpoint, user = %credentials.username, "opening SSH session");

        let handler = DeviceHandler::new(&endpoint.host);
        let mut handle = client::connect(
            config.client_config(),
            (endpoint.host.as_str(), endpoint.port),
            handler,
        )
        .await
        .map_err(|e| connect_error(endpoint, e))?;

        authenticate(&mut handle, credentials).await?;

        Ok(Self {
            handle,
            endpoint: endpoint.clone(),
        })
    }

    pub(crate) fn from_handle(handle: Handle<DeviceHandler>, endpoint: Endpoint) -> Self {
        Self { handle, endpoint }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Run a single command and collect its combined stdout/stderr.
    pub async fn run(&self, command: &str) -> Result<String, Error> {
        debug!(endpoint = %self.endpoint, command, "exec");

        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::Connection {
                message: format!("failed to open channel: {e}"),
            })?;
        channel.exec(true, command).await?;

        let mut output = Vec::new();
        let mut eof = false;
        let mut exited = false;

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } | ChannelMsg::ExtendedData { ref data, .. } => {
                    output.extend_from_slice(data);
                }
                ChannelMsg::Eof => {
                    eof = true;
                    if exited {
                        break;
                    }
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    exited = true;
                    if exit_status != 0 {
                        debug!(endpoint = %self.endpoint, exit_status, "command exited non-zero");
                    }
                    if eof {
                        break;
                    }
                }
                ChannelMsg::Close => break,
                _ => {}
            }
        }

        Ok(String::from_utf8_lossy(&output).into_owned())
    }

    /// Run every command in order, one response per command.
    pub async fn run_all(&self, commands: &[String]) -> Result<Vec<String>, Error> {
        let mut responses = Vec::with_capacity(commands.len());
        for command in commands {
            responses.push(self.run(command).await?);
        }
        Ok(responses)
    }

    /// Politely disconnect. Errors are logged; the connection is gone either way.
    pub async fn close(self) {
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            warn!(endpoint = %self.endpoint, error = %e, "SSH disconnect failed");
        }
    }
}

pub(crate) async fn authenticate(
    handle: &mut Handle<DeviceHandler>,
    credentials: &SshCredentials,
) -> Result<(), Error> {
    let accepted = match &credentials.secret {
        SshSecret::Password(password) => {
            handle
                .authenticate_password(
                    credentials.username.clone(),
                    password.expose_secret().to_owned(),
                )
                .await?
        }
        SshSecret::KeyFile { path, passphrase } => {
            let key = russh_keys::load_secret_key(
                path,
                passphrase.as_ref().map(|p| p.expose_secret()),
            )?;
            handle
                .authenticate_publickey(credentials.username.clone(), Arc::new(key))
                .await?
        }
    };

    if accepted {
        Ok(())
    } else {
        Err(Error::Authentication {
            message: format!("credential for user '{}' was rejected", credentials.username),
        })
    }
}

pub(crate) fn connect_error(endpoint: &Endpoint, err: russh::Error) -> Error {
    match err {
        russh::Error::IO(io) => Error::Connection {
            message: format!("{endpoint}: {io}"),
        },
        russh::Error::ConnectionTimeout => Error::Timeout { timeout_secs: 0 },
        other => Error::Connection {
            message: format!("{endpoint}: {other}"),
        },
    }
}

// Signed-request HTTP transport.
//
// Each command is wrapped in a short-lived token and POSTed as
// `{"encoded": <token>}` to the device agent's `/query/` endpoint. The agent
// answers in the same shape; its token is verified with the same secret.

pub mod token;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    encoded: String,
}

/// HTTP client for one signed-request device agent.
pub struct SignedClient {
    http: reqwest::Client,
    query_url: Url,
    secret: SecretString,
    token_lifetime: Duration,
    timeout: Option<Duration>,
}

impl SignedClient {
    /// Build a client for `host:port`, choosing http/https from the TLS mode.
    ///
    /// Tokens live as long as the transport timeout.
    pub fn new(
        host: &str,
        port: u16,
        secret: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let host = if host.contains(':') {
            format!("[{host}]")
        } else {
            host.to_owned()
        };
        let base = format!("{}://{host}:{port}", transport.tls.scheme());
        let http = transport.build_client()?;
        let client = Self::from_reqwest(&base, http, secret, transport.timeout)?;
        Ok(client.with_timeout(transport.timeout))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn from_reqwest(
        base_url: &str,
        http: reqwest::Client,
        secret: SecretString,
        token_lifetime: Duration,
    ) -> Result<Self, Error> {
        let query_url = Url::parse(base_url)?.join("/query/")?;
        Ok(Self {
            http,
            query_url,
            secret,
            token_lifetime,
            timeout: None,
        })
    }

    /// Bound each request to `timeout`; timeouts are reported with this value.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn query_url(&self) -> &Url {
        &self.query_url
    }

    /// Send one command and return the verified response text.
    ///
    /// `204 No Content` yields an empty string.
    pub async fn send(&self, command: &str) -> Result<String, Error> {
        let secret = self.secret.expose_secret().as_bytes();
        let encoded = token::encode(command, secret, self.token_lifetime)?;

        debug!("POST {}", self.query_url);
        let mut request = self.http.post(self.query_url.clone()).json(&Envelope { encoded });
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        let resp = request.send().await.map_err(|e| match self.timeout {
            Some(timeout) if e.is_timeout() => Error::Timeout {
                timeout_secs: timeout.as_secs(),
            },
            _ if e.is_connect() => Error::Connection {
                message: e.to_string(),
            },
            _ => Error::Transport(e),
        })?;

        let status = resp.status();
        match status.as_u16() {
            200 => {
                let body = resp.text().await?;
                let envelope: Envelope =
                    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                        message: e.to_string(),
                        body: body.clone(),
                    })?;
                token::decode(&envelope.encoded, secret)
            }
            204 => Ok(String::new()),
            401 | 403 => Err(Error::Authentication {
                message: format!("agent rejected the request (HTTP {status})"),
            }),
            code => {
                let body = resp.text().await.unwrap_or_default();
                Err(Error::Status { status: code, body })
            }
        }
    }

    /// Send every command in order, one response per command.
    pub async fn send_all(&self, commands: &[String]) -> Result<Vec<String>, Error> {
        let mut responses = Vec::with_capacity(commands.len());
        for command in commands {
            responses.push(self.send(command).await?);
        }
        Ok(responses)
    }
}

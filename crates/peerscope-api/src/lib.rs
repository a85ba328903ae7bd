// peerscope-api: device transports (SSH, proxied SSH, signed HTTP), the RPKI client
// and the bulk whois client.

pub mod auth;
pub mod error;
pub mod rpki;
pub mod signed;
pub mod ssh;
pub mod transport;
pub mod whois;

pub use auth::{Endpoint, SshCredentials, SshSecret};
pub use error::Error;
pub use rpki::{RpkiClient, RpkiValidity};
pub use signed::SignedClient;
pub use ssh::{ProxyTunnel, SshConfig, SshSession};
pub use transport::{TlsMode, TransportConfig};
pub use whois::{AsnRecord, WhoisClient, WhoisRecord};

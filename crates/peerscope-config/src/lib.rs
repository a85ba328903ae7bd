//! Configuration for the peerscope gateway.
//!
//! A TOML file layered over defaults and `PEERSCOPE_` environment variables,
//! credential resolution (env, keyring, plaintext), reference validation,
//! and translation into the immutable [`GatewayConfig`] the core runs with.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use indexmap::IndexMap;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use peerscope_api::{Endpoint, SshCredentials, SshSecret, TlsMode};
use peerscope_core::{
    Device, DeviceTransport, DirectiveSpec, GatewayConfig, Platform, Proxy, RpkiMode,
    StructuredConfig, TransportKind, Vrf,
};

/// Keyring service every stored secret lives under.
pub const KEYRING_SERVICE: &str = "peerscope";

const REDACTED: &str = "<redacted>";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no secret configured for '{name}'")]
    NoCredentials { name: String },

    #[error("config file already exists at {path}")]
    Exists { path: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub params: Params,

    /// Named login credentials, referenced by devices and proxies.
    #[serde(default)]
    pub credentials: IndexMap<String, CredentialConfig>,

    /// Named SSH jump hosts.
    #[serde(default)]
    pub proxies: IndexMap<String, ProxyConfig>,

    #[serde(default)]
    pub devices: Vec<DeviceConfig>,

    /// User directives, merged over the built-ins by id.
    #[serde(default)]
    pub directives: Vec<DirectiveSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Params {
    /// Seconds a whole query may take.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Structured output for devices that don't say otherwise.
    #[serde(default = "default_true")]
    pub structured_output: bool,

    #[serde(default)]
    pub cache: CacheParams,

    #[serde(default)]
    pub structured: StructuredConfig,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            structured_output: true,
            cache: CacheParams::default(),
            structured: StructuredConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheParams {
    /// Seconds a result stays cached.
    #[serde(default = "default_cache_ttl")]
    pub ttl: u64,
}

impl Default for CacheParams {
    fn default() -> Self {
        Self {
            ttl: default_cache_ttl(),
        }
    }
}

fn default_request_timeout() -> u64 {
    90
}
fn default_cache_ttl() -> u64 {
    120
}
fn default_true() -> bool {
    true
}
fn default_ssh_port() -> u16 {
    22
}

/// A login. Exactly one of `password`, `password_env` or `key_file` is
/// expected; with `key_file` any resolved password unlocks the key.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CredentialConfig {
    pub username: String,

    /// Plaintext password (prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    /// Private key for public-key authentication.
    pub key_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyConfig {
    pub address: String,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    pub credential: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TlsConfig {
    #[serde(default)]
    pub enabled: bool,

    /// PEM certificate the device must present.
    pub cert: Option<PathBuf>,

    /// Skip certificate verification entirely.
    #[serde(default)]
    pub insecure: bool,
}

impl TlsConfig {
    pub fn mode(&self) -> TlsMode {
        if !self.enabled {
            TlsMode::Disabled
        } else if self.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref cert) = self.cert {
            TlsMode::Pinned(cert.clone())
        } else {
            TlsMode::System
        }
    }
}

/// One `[[devices]]` entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    pub name: String,

    pub display_name: Option<String>,

    pub address: String,

    /// Defaults to the platform's management port.
    pub port: Option<u16>,

    /// Platform id, e.g. `juniper` or `mikrotik_routeros`.
    pub platform: String,

    /// SSH credential name. Required unless the platform is signed HTTP.
    pub credential: Option<String>,

    /// Proxy name for devices behind a jump host.
    pub proxy: Option<String>,

    #[serde(default)]
    pub tls: TlsConfig,

    #[serde(default)]
    pub vrfs: Vec<Vrf>,

    /// Extra directive ids beyond the platform built-ins.
    #[serde(default)]
    pub directives: Vec<String>,

    pub structured_output: Option<bool>,

    /// Pre-shared signing secret (plaintext, prefer keyring or env var).
    pub signing_secret: Option<String>,

    /// Environment variable holding the signing secret.
    pub signing_secret_env: Option<String>,
}

fn device_field(index: usize, name: &str) -> String {
    format!("devices[{index}].{name}")
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "peerscope", "peerscope").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("peerscope.toml");
            p
        },
        |dirs| dirs.config_dir().join("peerscope.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("peerscope");
    p
}

// ── Config loading ──────────────────────────────────────────────────

fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PEERSCOPE_").ignore(&["config"]).split("__"))
}

/// Load and validate the config at the canonical path.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load and validate the config at `path`, layered with the environment.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment(path).extract()?;
    config.validate()?;
    debug!(
        path = %path.display(),
        devices = config.devices.len(),
        directives = config.directives.len(),
        "config loaded"
    );
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Starter document written by `config init`.
pub const TEMPLATE: &str = r#"# peerscope configuration

[params]
request_timeout = 90
structured_output = true

[params.cache]
ttl = 120

[params.structured.communities]
mode = "deny"
items = []

[params.structured.rpki]
mode = "router"

[params.structured.ip_enrichment]
enabled = false
server = "bgp.tools:43"

[credentials.lg]
username = "lg"
password_env = "PEERSCOPE_LG_PASSWORD"

# [proxies.jump]
# address = "198.51.100.1"
# credential = "lg"

[[devices]]
name = "edge1"
display_name = "Edge 1"
address = "192.0.2.1"
platform = "juniper"
credential = "lg"

[[devices.vrfs]]
name = "default"
source4 = "192.0.2.1"
"#;

/// Write [`TEMPLATE`] to `path`, refusing to clobber unless `force`.
pub fn init_config(path: &Path, force: bool) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::Exists {
            path: path.display().to_string(),
        });
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, TEMPLATE)?;
    Ok(())
}

// ── Validation ──────────────────────────────────────────────────────

impl Config {
    /// Check every cross-reference once, before anything is resolved.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.params.request_timeout == 0 {
            return Err(invalid("params.request_timeout", "must be at least one second"));
        }

        let rpki = &self.params.structured.rpki;
        if rpki.mode == RpkiMode::External {
            let backend = rpki.backend.as_deref().ok_or_else(|| {
                invalid(
                    "params.structured.rpki.backend",
                    "external RPKI mode needs a validator URL",
                )
            })?;
            url::Url::parse(backend).map_err(|e| {
                invalid("params.structured.rpki.backend", format!("invalid URL: {e}"))
            })?;
        }

        let enrichment = &self.params.structured.ip_enrichment;
        if enrichment.enabled {
            let port = enrichment
                .server
                .rsplit_once(':')
                .and_then(|(host, port)| (!host.is_empty()).then_some(port))
                .and_then(|port| port.parse::<u16>().ok());
            if port.is_none() {
                return Err(invalid(
                    "params.structured.ip_enrichment.server",
                    format!("expected host:port, got '{}'", enrichment.server),
                ));
            }
            if enrichment.timeout == 0 {
                return Err(invalid(
                    "params.structured.ip_enrichment.timeout",
                    "must be at least one second",
                ));
            }
        }

        for (name, proxy) in &self.proxies {
            if !self.credentials.contains_key(&proxy.credential) {
                return Err(invalid(
                    format!("proxies.{name}.credential"),
                    format!("unknown credential '{}'", proxy.credential),
                ));
            }
        }

        let mut seen = HashSet::new();
        for (i, device) in self.devices.iter().enumerate() {
            if !seen.insert(device.name.as_str()) {
                return Err(invalid(
                    device_field(i, "name"),
                    format!("duplicate device name '{}'", device.name),
                ));
            }
            let platform = parse_platform(device, i)?;
            match platform.transport() {
                TransportKind::Session => {
                    let credential = device.credential.as_deref().ok_or_else(|| {
                        invalid(device_field(i, "credential"), "SSH devices need a credential")
                    })?;
                    if !self.credentials.contains_key(credential) {
                        return Err(invalid(
                            device_field(i, "credential"),
                            format!("unknown credential '{credential}'"),
                        ));
                    }
                    if let Some(ref proxy) = device.proxy {
                        if !self.proxies.contains_key(proxy) {
                            return Err(invalid(
                                device_field(i, "proxy"),
                                format!("unknown proxy '{proxy}'"),
                            ));
                        }
                    }
                }
                TransportKind::Signed => {
                    if device.proxy.is_some() {
                        return Err(invalid(
                            device_field(i, "proxy"),
                            format!("{platform} devices are reached over HTTP, not SSH"),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// A copy safe to print: plaintext secrets replaced.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut cfg = self.clone();
        for cred in cfg.credentials.values_mut() {
            if cred.password.is_some() {
                cred.password = Some(REDACTED.into());
            }
        }
        for device in &mut cfg.devices {
            if device.signing_secret.is_some() {
                device.signing_secret = Some(REDACTED.into());
            }
        }
        cfg
    }

    /// Resolve every secret and build the runtime configuration.
    pub fn gateway_config(&self) -> Result<GatewayConfig, ConfigError> {
        let mut devices = IndexMap::with_capacity(self.devices.len());
        for (i, entry) in self.devices.iter().enumerate() {
            let device = self.device(entry, i)?;
            devices.insert(device.name.clone(), Arc::new(device));
        }
        Ok(GatewayConfig {
            request_timeout: Duration::from_secs(self.params.request_timeout),
            cache_ttl: Duration::from_secs(self.params.cache.ttl),
            structured: self.params.structured.clone(),
            devices,
            directives: self.directives.clone(),
        })
    }

    fn device(&self, entry: &DeviceConfig, index: usize) -> Result<Device, ConfigError> {
        let platform = parse_platform(entry, index)?;
        let transport = match platform.transport() {
            TransportKind::Session => {
                let name = entry
                    .credential
                    .as_deref()
                    .ok_or_else(|| invalid(device_field(index, "credential"), "missing"))?;
                let proxy = entry
                    .proxy
                    .as_deref()
                    .map(|name| self.proxy(name))
                    .transpose()?;
                DeviceTransport::Session {
                    credential: self.credential(name)?,
                    proxy,
                }
            }
            TransportKind::Signed => DeviceTransport::Signed {
                secret: resolve_signing_secret(entry)?,
                tls: entry.tls.mode(),
            },
        };

        let vrfs = if entry.vrfs.is_empty() {
            vec![Vrf::default_vrf()]
        } else {
            entry.vrfs.clone()
        };

        Ok(Device {
            name: entry.name.clone(),
            display_name: entry
                .display_name
                .clone()
                .unwrap_or_else(|| entry.name.clone()),
            address: entry.address.clone(),
            port: entry.port.unwrap_or_else(|| platform.default_port()),
            platform,
            transport,
            vrfs,
            directives: entry.directives.clone(),
            structured_output: entry
                .structured_output
                .unwrap_or(self.params.structured_output),
        })
    }

    fn credential(&self, name: &str) -> Result<SshCredentials, ConfigError> {
        let cred = self
            .credentials
            .get(name)
            .ok_or_else(|| invalid("credential", format!("unknown credential '{name}'")))?;
        resolve_credential(name, cred)
    }

    fn proxy(&self, name: &str) -> Result<Proxy, ConfigError> {
        let proxy = self
            .proxies
            .get(name)
            .ok_or_else(|| invalid("proxy", format!("unknown proxy '{name}'")))?;
        Ok(Proxy {
            name: name.to_owned(),
            endpoint: Endpoint::new(&proxy.address, proxy.port),
            credential: self.credential(&proxy.credential)?,
        })
    }
}

fn parse_platform(device: &DeviceConfig, index: usize) -> Result<Platform, ConfigError> {
    device.platform.parse().map_err(|_| {
        let known: Vec<String> = Platform::all().map(|p| p.to_string()).collect();
        invalid(
            device_field(index, "platform"),
            format!(
                "unknown platform '{}', expected one of: {}",
                device.platform,
                known.join(", ")
            ),
        )
    })
}

// ── Credential resolution ───────────────────────────────────────────

/// Keyring account holding a credential's password.
pub fn password_key(credential: &str) -> String {
    format!("{credential}/password")
}

/// Keyring account holding a device's signing secret.
pub fn signing_secret_key(device: &str) -> String {
    format!("{device}/signing-secret")
}

fn from_keyring(account: &str) -> Option<SecretString> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, account).ok()?;
    entry.get_password().ok().map(SecretString::from)
}

/// Store a secret in the system keyring.
pub fn store_secret(account: &str, secret: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, account)?.set_password(secret)?;
    Ok(())
}

/// Remove a secret from the system keyring.
pub fn delete_secret(account: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, account)?.delete_credential()?;
    Ok(())
}

/// Env var, then keyring, then plaintext.
fn resolve_chain(
    env_name: Option<&str>,
    account: &str,
    plaintext: Option<&str>,
) -> Option<SecretString> {
    if let Some(val) = env_name.and_then(|name| std::env::var(name).ok()) {
        return Some(SecretString::from(val));
    }
    if let Some(secret) = from_keyring(account) {
        return Some(secret);
    }
    plaintext.map(|p| SecretString::from(p.to_owned()))
}

/// Resolve a named credential into SSH login material.
pub fn resolve_credential(
    name: &str,
    cred: &CredentialConfig,
) -> Result<SshCredentials, ConfigError> {
    let password = resolve_chain(
        cred.password_env.as_deref(),
        &password_key(name),
        cred.password.as_deref(),
    );
    let secret = match (&cred.key_file, password) {
        (Some(path), passphrase) => SshSecret::KeyFile {
            path: path.clone(),
            passphrase,
        },
        (None, Some(password)) => SshSecret::Password(password),
        (None, None) => {
            return Err(ConfigError::NoCredentials {
                name: name.to_owned(),
            });
        }
    };
    Ok(SshCredentials {
        username: cred.username.clone(),
        secret,
    })
}

fn resolve_signing_secret(device: &DeviceConfig) -> Result<SecretString, ConfigError> {
    resolve_chain(
        device.signing_secret_env.as_deref(),
        &signing_secret_key(&device.name),
        device.signing_secret.as_deref(),
    )
    .ok_or_else(|| ConfigError::NoCredentials {
        name: device.name.clone(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn parse(toml_str: &str) -> Config {
        toml::from_str(toml_str).unwrap()
    }

    const BASE: &str = r#"
[credentials.lg]
username = "lg"
password = "hunter2"

[proxies.jump]
address = "198.51.100.1"
credential = "lg"

[[devices]]
name = "edge1"
address = "192.0.2.1"
platform = "juniper"
credential = "lg"
"#;

    fn validation_field(err: ConfigError) -> String {
        match err {
            ConfigError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn template_is_a_valid_config() {
        let cfg = parse(TEMPLATE);
        cfg.validate().unwrap();
        assert_eq!(cfg.devices.len(), 1);
        assert_eq!(cfg.params.cache.ttl, 120);
    }

    #[test]
    fn duplicate_device_names_are_rejected() {
        let mut cfg = parse(BASE);
        cfg.devices.push(cfg.devices[0].clone());
        assert_eq!(validation_field(cfg.validate().unwrap_err()), "devices[1].name");
    }

    #[test]
    fn unknown_references_are_rejected() {
        let mut cfg = parse(BASE);
        cfg.devices[0].credential = Some("nobody".into());
        assert_eq!(
            validation_field(cfg.validate().unwrap_err()),
            "devices[0].credential"
        );

        let mut cfg = parse(BASE);
        cfg.devices[0].proxy = Some("nowhere".into());
        assert_eq!(validation_field(cfg.validate().unwrap_err()), "devices[0].proxy");

        let mut cfg = parse(BASE);
        cfg.proxies["jump"].credential = "nobody".into();
        assert_eq!(
            validation_field(cfg.validate().unwrap_err()),
            "proxies.jump.credential"
        );
    }

    #[test]
    fn unknown_platform_lists_known_ids() {
        let mut cfg = parse(BASE);
        cfg.devices[0].platform = "cisco_nxos".into();
        let err = cfg.validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("devices[0].platform"), "{msg}");
        assert!(msg.contains("mikrotik_routeros"), "{msg}");
    }

    #[test]
    fn external_rpki_needs_a_backend() {
        let mut cfg = parse(BASE);
        cfg.params.structured.rpki.mode = RpkiMode::External;
        assert_eq!(
            validation_field(cfg.validate().unwrap_err()),
            "params.structured.rpki.backend"
        );

        cfg.params.structured.rpki.backend = Some("https://rpki.example.net".into());
        cfg.validate().unwrap();
    }

    #[test]
    fn ip_enrichment_needs_host_and_port() {
        let mut cfg = parse(BASE);
        cfg.params.structured.ip_enrichment.server = "bgp.tools".into();
        cfg.validate().unwrap();

        cfg.params.structured.ip_enrichment.enabled = true;
        assert_eq!(
            validation_field(cfg.validate().unwrap_err()),
            "params.structured.ip_enrichment.server"
        );

        cfg.params.structured.ip_enrichment.server = "whois.example.net:4343".into();
        cfg.validate().unwrap();

        cfg.params.structured.ip_enrichment.timeout = 0;
        assert_eq!(
            validation_field(cfg.validate().unwrap_err()),
            "params.structured.ip_enrichment.timeout"
        );
    }

    #[test]
    fn signed_devices_cannot_use_a_proxy() {
        let mut cfg = parse(BASE);
        cfg.devices[0].platform = "frr_agent".into();
        cfg.devices[0].proxy = Some("jump".into());
        assert_eq!(validation_field(cfg.validate().unwrap_err()), "devices[0].proxy");
    }

    #[test]
    fn key_file_credential_keeps_optional_passphrase() {
        let cred = CredentialConfig {
            username: "lg".into(),
            password: None,
            password_env: None,
            key_file: Some("/etc/peerscope/id_ed25519".into()),
        };
        let resolved = resolve_credential("keyonly-test-credential", &cred).unwrap();
        assert_eq!(resolved.username, "lg");
        assert!(matches!(resolved.secret, SshSecret::KeyFile { .. }));
    }

    #[test]
    fn password_env_wins_over_plaintext() {
        Jail::expect_with(|jail| {
            jail.set_env("LG_TEST_PASSWORD", "from-env");
            let cred = CredentialConfig {
                username: "lg".into(),
                password: Some("plain".into()),
                password_env: Some("LG_TEST_PASSWORD".into()),
                key_file: None,
            };
            let resolved = resolve_credential("lg", &cred).unwrap();
            match resolved.secret {
                SshSecret::Password(pw) => assert_eq!(pw.expose_secret(), "from-env"),
                SshSecret::KeyFile { .. } => panic!("expected password"),
            }
            Ok(())
        });
    }

    #[test]
    fn redacted_hides_plaintext_secrets() {
        let mut cfg = parse(BASE);
        cfg.devices[0].signing_secret = Some("s3cret".into());
        let shown = toml::to_string_pretty(&cfg.redacted()).unwrap();
        assert!(!shown.contains("hunter2"));
        assert!(!shown.contains("s3cret"));
        assert!(shown.contains(REDACTED));
    }

    #[test]
    fn tls_modes() {
        let mut tls = TlsConfig::default();
        assert_eq!(tls.mode(), TlsMode::Disabled);
        tls.enabled = true;
        assert_eq!(tls.mode(), TlsMode::System);
        tls.cert = Some("/etc/peerscope/agent.pem".into());
        assert_eq!(tls.mode(), TlsMode::Pinned("/etc/peerscope/agent.pem".into()));
        tls.insecure = true;
        assert_eq!(tls.mode(), TlsMode::DangerAcceptInvalid);
    }
}

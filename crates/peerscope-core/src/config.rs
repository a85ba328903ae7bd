// ── Runtime gateway configuration ──
//
// These types describe the device inventory and query policy the gateway runs
// with. They are built once (normally by `peerscope-config`), wrapped in an
// `Arc`, and never mutated. Core never reads files.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use peerscope_api::{Endpoint, SshCredentials, TlsMode};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::directive::DirectiveSpec;
use crate::platform::{Platform, TransportKind};

/// A routing instance on a device and the source addresses used for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vrf {
    pub name: String,
    #[serde(default)]
    pub source4: Option<String>,
    #[serde(default)]
    pub source6: Option<String>,
}

impl Vrf {
    pub fn default_vrf() -> Self {
        Self {
            name: "default".into(),
            source4: None,
            source6: None,
        }
    }
}

/// SSH jump host used to reach a device.
#[derive(Debug, Clone)]
pub struct Proxy {
    pub name: String,
    pub endpoint: Endpoint,
    pub credential: SshCredentials,
}

/// How the gateway reaches a device.
#[derive(Debug, Clone)]
pub enum DeviceTransport {
    /// SSH, direct or through a proxy.
    Session {
        credential: SshCredentials,
        proxy: Option<Proxy>,
    },
    /// Signed HTTP requests with a pre-shared secret.
    Signed { secret: SecretString, tls: TlsMode },
}

impl DeviceTransport {
    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Session { .. } => TransportKind::Session,
            Self::Signed { .. } => TransportKind::Signed,
        }
    }

    pub fn proxy(&self) -> Option<&Proxy> {
        match self {
            Self::Session { proxy, .. } => proxy.as_ref(),
            Self::Signed { .. } => None,
        }
    }
}

/// One network device in the inventory.
#[derive(Debug, Clone)]
pub struct Device {
    /// Stable identifier used in queries and cache keys.
    pub name: String,
    /// Name shown to users and in error messages.
    pub display_name: String,
    pub address: String,
    pub port: u16,
    pub platform: Platform,
    pub transport: DeviceTransport,
    pub vrfs: Vec<Vrf>,
    /// Directive ids enabled in addition to the platform built-ins.
    pub directives: Vec<String>,
    pub structured_output: bool,
}

impl Device {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(&self.address, self.port)
    }

    /// Look up a VRF by name, falling back to the first configured one.
    pub fn vrf(&self, name: Option<&str>) -> Option<&Vrf> {
        match name {
            Some(name) => self.vrfs.iter().find(|v| v.name == name),
            None => self.vrfs.first(),
        }
    }

    /// Whether structured output is both enabled and possible.
    pub fn structured_capable(&self) -> bool {
        self.structured_output && self.platform.supports_structured()
    }
}

// ── Structured output policy ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CommunityMode {
    /// Keep only communities matching `items`.
    Permit,
    /// Drop communities matching `items`.
    #[default]
    Deny,
    /// Append a friendly name from `names`.
    Name,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunityPolicy {
    pub mode: CommunityMode,
    pub items: Vec<String>,
    pub names: IndexMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RpkiMode {
    /// Trust the validation state reported by the router.
    #[default]
    Router,
    /// Ask an external validator.
    External,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpkiPolicy {
    pub mode: RpkiMode,
    /// Base URL of a Routinator-compatible validity API.
    pub backend: Option<String>,
}

/// Bulk whois enrichment of traceroute hops and BGP next hops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpEnrichmentPolicy {
    pub enabled: bool,
    /// Look up the next-hop address of each BGP path. AS path names are
    /// resolved whenever enrichment is enabled.
    pub enrich_next_hop: bool,
    /// `host:port` of a bgp.tools-compatible bulk whois service.
    pub server: String,
    /// Seconds allowed for one bulk lookup.
    pub timeout: u64,
}

impl Default for IpEnrichmentPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            enrich_next_hop: true,
            server: "bgp.tools:43".into(),
            timeout: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredConfig {
    pub communities: CommunityPolicy,
    pub rpki: RpkiPolicy,
    pub ip_enrichment: IpEnrichmentPolicy,
}

// ── Gateway configuration ────────────────────────────────────────────

/// Everything the gateway needs, built once at startup.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// End-to-end budget per query. Device I/O gets one second less.
    pub request_timeout: Duration,
    pub cache_ttl: Duration,
    pub structured: StructuredConfig,
    pub devices: IndexMap<String, Arc<Device>>,
    /// User directives, merged over the built-ins by id.
    pub directives: Vec<DirectiveSpec>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(90),
            cache_ttl: Duration::from_secs(120),
            structured: StructuredConfig::default(),
            devices: IndexMap::new(),
            directives: Vec::new(),
        }
    }
}

impl GatewayConfig {
    pub fn device(&self, name: &str) -> Option<&Arc<Device>> {
        self.devices.get(name)
    }

    /// Budget handed to the connector.
    pub fn execution_budget(&self) -> Duration {
        self.request_timeout
            .saturating_sub(Duration::from_secs(1))
            .max(Duration::from_secs(1))
    }
}

//! Query engine for the peerscope looking glass.
//!
//! A query names a device, a directive and one or more targets. The
//! [`Gateway`] turns it into vendor commands, runs them over the device's
//! transport and hands back either the raw text or a canonical structure:
//!
//! - **[`directive`]**: ordered permit/deny rules per directive, the shipped
//!   built-ins for every platform, and command synthesis with `{target}`,
//!   `{source4}`, `{source6}` and `{vrf}` placeholders.
//!
//! - **[`plugin`]**: input plugins that veto or rewrite targets before any
//!   I/O, and output plugins chained over the response. Built-ins clean
//!   RouterOS noise, parse vendor output and enrich traceroute hops.
//!
//! - **[`connector`]**: SSH (direct or through a jump host) and signed HTTP,
//!   one session per query, always closed.
//!
//! - **[`normalize`]**: Juniper XML, Arista and FRR JSON, Huawei and MikroTik
//!   text into [`BgpRouteTable`]; traceroute text and RouterOS tables into
//!   [`TracerouteResult`]; community and RPKI policy on every route.
//!
//! - **[`cache`]**: results keyed by a SHA-256 fingerprint of the normalized
//!   query.
//!
//! Configuration is built once (normally by `peerscope-config`) as a
//! [`GatewayConfig`] and never mutated. Core never reads files.

pub mod cache;
pub mod collab;
pub mod config;
pub mod connector;
pub mod directive;
pub mod error;
pub mod gateway;
pub mod model;
pub mod normalize;
pub mod platform;
pub mod plugin;
pub mod query;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::{CacheStore, MemoryCache};
pub use collab::{Collaborators, IpEnricher, IpInfo, RpkiValidator};
pub use config::{
    CommunityMode, CommunityPolicy, Device, DeviceTransport, GatewayConfig, IpEnrichmentPolicy,
    Proxy, RpkiMode, RpkiPolicy, StructuredConfig, Vrf,
};
pub use connector::{Connector, DeviceConnector};
pub use directive::{Directive, DirectiveRegistry, DirectiveSpec, FieldType, QueryType, RuleSpec};
pub use error::{CoreError, Severity, ValidationFailure};
pub use gateway::{Gateway, GatewayBuilder, QueryPlan};
pub use model::{
    AsnOrganization, BgpRoute, BgpRouteTable, OutputData, OutputFormat, QueryOutput, RpkiState,
    TracerouteHop, TracerouteResult, WinningWeight,
};
pub use platform::{Platform, TransportKind};
pub use plugin::{
    Applicability, InputContext, InputPlugin, OutputContext, OutputPlugin, PluginRegistry,
};
pub use query::{Query, fingerprint};

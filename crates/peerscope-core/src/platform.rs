// ── Platform table ──
//
// The closed set of device platforms and the static facts attached to each:
// which transport reaches it, whether it has structured parsers, and how
// route targets are formatted before command synthesis.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

/// Supported device platforms.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Platform {
    Juniper,
    AristaEos,
    Frr,
    /// FRR reached through the signed HTTP agent instead of SSH.
    FrrAgent,
    Huawei,
    MikrotikRouteros,
    MikrotikSwitchos,
    CiscoIos,
}

/// How commands reach a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransportKind {
    /// Interactive SSH session, optionally through a proxy tunnel.
    Session,
    /// Signed HTTP request to an agent.
    Signed,
}

/// Platform-specific target rewriting applied before synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Plain,
    /// `prefix/len` becomes `prefix len`.
    Huawei,
}

impl Platform {
    pub fn all() -> impl Iterator<Item = Self> {
        Self::iter()
    }

    pub fn transport(self) -> TransportKind {
        match self {
            Self::FrrAgent => TransportKind::Signed,
            _ => TransportKind::Session,
        }
    }

    /// Whether a structured parser exists for this platform.
    pub fn supports_structured(self) -> bool {
        !matches!(self, Self::CiscoIos)
    }

    pub fn target_format(self) -> TargetFormat {
        match self {
            Self::Huawei => TargetFormat::Huawei,
            _ => TargetFormat::Plain,
        }
    }

    /// Prefix for this platform's built-in directive ids.
    pub fn directive_family(self) -> &'static str {
        match self {
            Self::Juniper => "juniper",
            Self::AristaEos => "arista_eos",
            Self::Frr | Self::FrrAgent => "frr",
            Self::Huawei => "huawei",
            Self::MikrotikRouteros | Self::MikrotikSwitchos => "mikrotik",
            Self::CiscoIos => "cisco_ios",
        }
    }

    pub fn is_mikrotik(self) -> bool {
        matches!(self, Self::MikrotikRouteros | Self::MikrotikSwitchos)
    }

    /// Default management port for the platform's transport.
    pub fn default_port(self) -> u16 {
        match self.transport() {
            TransportKind::Session => 22,
            TransportKind::Signed => 8080,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_ids_round_trip_through_strings() {
        for platform in Platform::all() {
            let id = platform.to_string();
            assert_eq!(id.parse::<Platform>().ok(), Some(platform));
        }
        assert_eq!("arista_eos".parse::<Platform>().ok(), Some(Platform::AristaEos));
        assert!("cisco_nxos".parse::<Platform>().is_err());
    }

    #[test]
    fn transport_table() {
        assert_eq!(Platform::FrrAgent.transport(), TransportKind::Signed);
        assert_eq!(Platform::Juniper.transport(), TransportKind::Session);
        assert_eq!(Platform::FrrAgent.default_port(), 8080);
        assert!(!Platform::CiscoIos.supports_structured());
        assert_eq!(Platform::Huawei.target_format(), TargetFormat::Huawei);
        assert_eq!(Platform::MikrotikSwitchos.directive_family(), "mikrotik");
    }
}

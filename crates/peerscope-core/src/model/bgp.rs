// ── Canonical BGP route model ──

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::AsnOrganization;

/// RPKI origin validation state, carried on the wire as `0..=3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum RpkiState {
    Invalid,
    Valid,
    Unknown,
    #[default]
    Unverified,
}

impl RpkiState {
    pub fn code(self) -> u8 {
        match self {
            Self::Invalid => 0,
            Self::Valid => 1,
            Self::Unknown => 2,
            Self::Unverified => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Invalid),
            1 => Some(Self::Valid),
            2 => Some(Self::Unknown),
            3 => Some(Self::Unverified),
            _ => None,
        }
    }
}

impl Serialize for RpkiState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for RpkiState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        Self::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid RPKI state {code}")))
    }
}

/// Which end of the `weight` scale wins best-path selection on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WinningWeight {
    Low,
    High,
}

/// One path to a prefix, normalized across vendors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgpRoute {
    pub prefix: String,
    pub active: bool,
    /// Seconds since the path was learned, `-1` when the device does not say.
    pub age: i64,
    pub weight: i64,
    pub med: i64,
    pub local_preference: i64,
    pub as_path: Vec<u32>,
    pub communities: Vec<String>,
    pub next_hop: String,
    pub source_as: u32,
    pub source_rid: String,
    pub peer_rid: String,
    pub rpki_state: RpkiState,
    /// Filled by enrichment: who announces the next-hop address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_hop_asn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_hop_org: Option<String>,
}

impl BgpRoute {
    /// Origin AS: the last hop of the AS path.
    pub fn origin_asn(&self) -> Option<u32> {
        self.as_path.last().copied()
    }
}

/// All paths returned for one query, ordered by prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgpRouteTable {
    pub vrf: String,
    pub count: usize,
    pub routes: Vec<BgpRoute>,
    pub winning_weight: WinningWeight,
    /// Names for the ASNs seen in AS paths, keyed by the bare number.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub asn_organizations: IndexMap<String, AsnOrganization>,
}

impl BgpRouteTable {
    pub fn new(vrf: impl Into<String>, routes: Vec<BgpRoute>, winning_weight: WinningWeight) -> Self {
        let mut table = Self {
            vrf: vrf.into(),
            count: 0,
            routes,
            winning_weight,
            asn_organizations: IndexMap::new(),
        };
        table.normalize();
        table
    }

    pub fn empty(vrf: impl Into<String>, winning_weight: WinningWeight) -> Self {
        Self::new(vrf, Vec::new(), winning_weight)
    }

    /// Append another table's routes, re-sort and recount.
    pub fn merge(&mut self, other: Self) {
        self.routes.extend(other.routes);
        self.normalize();
    }

    /// Stable sort on the prefix string; paths for the same prefix keep their order.
    fn normalize(&mut self) {
        self.routes.sort_by(|a, b| a.prefix.cmp(&b.prefix));
        self.count = self.routes.len();
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Distinct ASNs across all AS paths, first-seen order.
    pub fn unique_asns(&self) -> Vec<u32> {
        let mut asns = Vec::new();
        for asn in self.routes.iter().flat_map(|r| &r.as_path) {
            if !asns.contains(asn) {
                asns.push(*asn);
            }
        }
        asns
    }
}

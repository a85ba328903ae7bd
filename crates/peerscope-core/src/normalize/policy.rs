// ── Structured output policy ──
//
// Applied to every parsed route: community filtering or naming, then RPKI
// state from the router or from an external validator.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};

use futures_util::future::join_all;
use indexmap::IndexMap;
use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::collab::RpkiValidator;
use crate::config::{CommunityMode, CommunityPolicy, RpkiMode, StructuredConfig};
use crate::error::CoreError;
use crate::model::{BgpRouteTable, RpkiState};

/// Compiled community policy.
#[derive(Debug)]
pub struct CommunityFilter<'a> {
    mode: CommunityMode,
    patterns: Vec<Regex>,
    names: &'a IndexMap<String, String>,
}

impl<'a> CommunityFilter<'a> {
    pub fn new(policy: &'a CommunityPolicy) -> Result<Self, CoreError> {
        let patterns = policy
            .items
            .iter()
            .map(|item| {
                RegexBuilder::new(&format!("^(?:{item})"))
                    .build()
                    .map_err(|e| CoreError::config(format!("invalid community pattern {item:?}: {e}")))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self {
            mode: policy.mode,
            patterns,
            names: &policy.names,
        })
    }

    fn matches(&self, community: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(community))
    }

    pub fn apply(&self, communities: Vec<String>) -> Vec<String> {
        match self.mode {
            CommunityMode::Permit => communities.into_iter().filter(|c| self.matches(c)).collect(),
            CommunityMode::Deny => communities.into_iter().filter(|c| !self.matches(c)).collect(),
            CommunityMode::Name => communities
                .into_iter()
                .map(|c| match self.names.get(&c) {
                    Some(name) => format!("{c},{name}"),
                    None => c,
                })
                .collect(),
        }
    }
}

/// IANA special-purpose IPv4 blocks that are not globally routable.
const NON_GLOBAL_V4: [(Ipv4Addr, u8); 17] = [
    (Ipv4Addr::new(0, 0, 0, 0), 8),
    (Ipv4Addr::new(10, 0, 0, 0), 8),
    (Ipv4Addr::new(100, 64, 0, 0), 10),
    (Ipv4Addr::new(127, 0, 0, 0), 8),
    (Ipv4Addr::new(169, 254, 0, 0), 16),
    (Ipv4Addr::new(172, 16, 0, 0), 12),
    (Ipv4Addr::new(192, 0, 0, 0), 24),
    (Ipv4Addr::new(192, 0, 2, 0), 24),
    (Ipv4Addr::new(192, 88, 99, 0), 24),
    (Ipv4Addr::new(192, 168, 0, 0), 16),
    (Ipv4Addr::new(198, 18, 0, 0), 15),
    (Ipv4Addr::new(198, 51, 100, 0), 24),
    (Ipv4Addr::new(203, 0, 113, 0), 24),
    (Ipv4Addr::new(224, 0, 0, 0), 4),
    (Ipv4Addr::new(233, 252, 0, 0), 24),
    (Ipv4Addr::new(240, 0, 0, 0), 4),
    (Ipv4Addr::new(255, 255, 255, 255), 32),
];

/// IANA special-purpose IPv6 blocks that are not globally routable.
const NON_GLOBAL_V6: [(Ipv6Addr, u8); 11] = [
    (Ipv6Addr::new(0, 0, 0, 0, 0, 0, 0, 0), 128),
    (Ipv6Addr::new(0, 0, 0, 0, 0, 0, 0, 1), 128),
    (Ipv6Addr::new(0, 0, 0, 0, 0, 0xffff, 0, 0), 96),
    (Ipv6Addr::new(0x64, 0xff9b, 1, 0, 0, 0, 0, 0), 48),
    (Ipv6Addr::new(0x100, 0, 0, 0, 0, 0, 0, 0), 64),
    (Ipv6Addr::new(0x2001, 0, 0, 0, 0, 0, 0, 0), 23),
    (Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0), 32),
    (Ipv6Addr::new(0x3fff, 0, 0, 0, 0, 0, 0, 0), 20),
    (Ipv6Addr::new(0xfc00, 0, 0, 0, 0, 0, 0, 0), 7),
    (Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 0), 10),
    (Ipv6Addr::new(0xff00, 0, 0, 0, 0, 0, 0, 0), 8),
];

/// Whether `net` lies outside every special-purpose block.
fn is_global(net: &IpNet) -> bool {
    match net {
        IpNet::V4(v4) => !NON_GLOBAL_V4
            .iter()
            .filter_map(|&(addr, len)| Ipv4Net::new(addr, len).ok())
            .any(|block| block.contains(v4)),
        IpNet::V6(v6) => !NON_GLOBAL_V6
            .iter()
            .filter_map(|&(addr, len)| Ipv6Net::new(addr, len).ok())
            .any(|block| block.contains(v6)),
    }
}

/// What the external validator should be asked for a route, if anything.
enum Lookup {
    Keep,
    Set(RpkiState),
    Ask(String, u32),
}

fn lookup_for(prefix: &str, as_path: &[u32]) -> Lookup {
    let Some(origin) = as_path.last().copied() else {
        // Internal route.
        return Lookup::Set(RpkiState::Unknown);
    };
    match prefix.parse::<IpNet>() {
        Ok(net) if is_global(&net) => Lookup::Ask(net.trunc().to_string(), origin),
        Ok(_) => Lookup::Keep,
        Err(_) => Lookup::Set(RpkiState::Unverified),
    }
}

async fn resolve_external(table: &mut BgpRouteTable, validator: Option<&dyn RpkiValidator>) {
    let plan: Vec<Lookup> = table
        .routes
        .iter()
        .map(|r| lookup_for(&r.prefix, &r.as_path))
        .collect();

    let mut wanted: Vec<(String, u32)> = Vec::new();
    for lookup in &plan {
        if let Lookup::Ask(prefix, asn) = lookup {
            if !wanted.iter().any(|(p, a)| p == prefix && a == asn) {
                wanted.push((prefix.clone(), *asn));
            }
        }
    }

    let states: HashMap<(String, u32), RpkiState> = match validator {
        Some(validator) => {
            let answers = join_all(
                wanted
                    .iter()
                    .map(|(prefix, asn)| validator.validate(prefix, *asn)),
            )
            .await;
            wanted
                .into_iter()
                .zip(answers)
                .map(|((prefix, asn), answer)| {
                    let state = answer.unwrap_or_else(|e| {
                        warn!(prefix = %prefix, asn, error = %e, "RPKI lookup failed");
                        RpkiState::Unverified
                    });
                    ((prefix, asn), state)
                })
                .collect()
        }
        None => {
            if !wanted.is_empty() {
                warn!("external RPKI mode configured without a validator");
            }
            HashMap::new()
        }
    };

    for (route, lookup) in table.routes.iter_mut().zip(plan) {
        match lookup {
            Lookup::Keep => {}
            Lookup::Set(state) => route.rpki_state = state,
            Lookup::Ask(prefix, asn) => {
                route.rpki_state = states
                    .get(&(prefix, asn))
                    .copied()
                    .unwrap_or(RpkiState::Unverified);
            }
        }
    }
}

/// Filter communities and settle RPKI state on every route of `table`.
pub async fn apply(
    table: &mut BgpRouteTable,
    policy: &StructuredConfig,
    validator: Option<&dyn RpkiValidator>,
) -> Result<(), CoreError> {
    let filter = CommunityFilter::new(&policy.communities)?;
    for route in &mut table.routes {
        route.communities = filter.apply(std::mem::take(&mut route.communities));
    }

    if policy.rpki.mode == RpkiMode::External {
        resolve_external(table, validator).await;
    }
    debug!(routes = table.count, rpki = %policy.rpki.mode, "applied structured policy");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::RpkiPolicy;
    use crate::model::{BgpRoute, WinningWeight};

    // ── Helpers ──

    fn route(prefix: &str, as_path: Vec<u32>, communities: &[&str]) -> BgpRoute {
        BgpRoute {
            prefix: prefix.into(),
            active: true,
            age: 0,
            weight: 0,
            med: 0,
            local_preference: 100,
            source_as: as_path.first().copied().unwrap_or(0),
            as_path,
            communities: communities.iter().map(|c| (*c).to_owned()).collect(),
            next_hop: "192.0.2.1".into(),
            source_rid: String::new(),
            peer_rid: String::new(),
            rpki_state: RpkiState::Valid,
            next_hop_asn: None,
            next_hop_org: None,
        }
    }

    fn policy(mode: CommunityMode, items: &[&str]) -> StructuredConfig {
        StructuredConfig {
            communities: CommunityPolicy {
                mode,
                items: items.iter().map(|i| (*i).to_owned()).collect(),
                names: IndexMap::from([("65000:1".to_owned(), "customer".to_owned())]),
            },
            rpki: RpkiPolicy::default(),
            ..StructuredConfig::default()
        }
    }

    struct FixedValidator {
        state: Result<RpkiState, ()>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RpkiValidator for FixedValidator {
        async fn validate(&self, _prefix: &str, _origin_asn: u32) -> Result<RpkiState, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.state
                .map_err(|()| CoreError::Internal("validator unavailable".into()))
        }
    }

    fn table(routes: Vec<BgpRoute>) -> BgpRouteTable {
        BgpRouteTable::new("default", routes, WinningWeight::High)
    }

    // ── Communities ──

    #[tokio::test]
    async fn deny_mode_drops_matches() {
        let mut t = table(vec![route("1.1.1.0/24", vec![13335], &["65000:1", "174:21000"])]);
        apply(&mut t, &policy(CommunityMode::Deny, &["65000:.*"]), None).await.unwrap();
        assert_eq!(t.routes[0].communities, vec!["174:21000"]);
    }

    #[tokio::test]
    async fn permit_mode_keeps_only_matches() {
        let mut t = table(vec![route("1.1.1.0/24", vec![13335], &["65000:1", "174:21000"])]);
        apply(&mut t, &policy(CommunityMode::Permit, &["174:"]), None).await.unwrap();
        assert_eq!(t.routes[0].communities, vec!["174:21000"]);
    }

    #[tokio::test]
    async fn name_mode_appends_friendly_names() {
        let mut t = table(vec![route("1.1.1.0/24", vec![13335], &["65000:1", "174:21000"])]);
        apply(&mut t, &policy(CommunityMode::Name, &[]), None).await.unwrap();
        assert_eq!(t.routes[0].communities, vec!["65000:1,customer", "174:21000"]);
    }

    #[tokio::test]
    async fn bad_pattern_is_a_config_error() {
        let mut t = table(vec![]);
        let err = apply(&mut t, &policy(CommunityMode::Deny, &["("]), None).await.unwrap_err();
        assert!(matches!(err, CoreError::Configuration { .. }));
    }

    // ── RPKI ──

    fn external() -> StructuredConfig {
        let mut p = policy(CommunityMode::Deny, &[]);
        p.rpki.mode = RpkiMode::External;
        p
    }

    #[tokio::test]
    async fn router_mode_keeps_device_state() {
        let mut t = table(vec![route("1.1.1.0/24", vec![13335], &[])]);
        apply(&mut t, &policy(CommunityMode::Deny, &[]), None).await.unwrap();
        assert_eq!(t.routes[0].rpki_state, RpkiState::Valid);
    }

    #[tokio::test]
    async fn external_mode_asks_once_per_pair() {
        let validator = FixedValidator {
            state: Ok(RpkiState::Invalid),
            calls: AtomicUsize::new(0),
        };
        let mut t = table(vec![
            route("1.1.1.0/24", vec![174, 13335], &[]),
            route("1.1.1.0/24", vec![3356, 13335], &[]),
            route("10.0.0.0/8", vec![], &[]),
        ]);
        apply(&mut t, &external(), Some(&validator)).await.unwrap();

        assert_eq!(validator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(t.routes[0].rpki_state, RpkiState::Invalid);
        assert_eq!(t.routes[1].rpki_state, RpkiState::Invalid);
        assert_eq!(t.routes[2].rpki_state, RpkiState::Unknown);
    }

    #[tokio::test]
    async fn validator_failure_is_unverified() {
        let validator = FixedValidator {
            state: Err(()),
            calls: AtomicUsize::new(0),
        };
        let mut t = table(vec![route("1.1.1.0/24", vec![13335], &[])]);
        apply(&mut t, &external(), Some(&validator)).await.unwrap();
        assert_eq!(t.routes[0].rpki_state, RpkiState::Unverified);
    }

    #[test]
    fn special_purpose_blocks_are_not_global() {
        for prefix in [
            "10.1.0.0/16",
            "100.64.1.0/24",
            "198.18.0.0/16",
            "192.0.2.0/24",
            "240.1.0.0/16",
            "2001:db8:1::/48",
            "fd00::/8",
            "fe80::/64",
        ] {
            assert!(!is_global(&prefix.parse().unwrap()), "{prefix} should not be global");
        }
        for prefix in ["1.1.1.0/24", "100.0.0.0/10", "198.20.0.0/16", "2606:4700::/32"] {
            assert!(is_global(&prefix.parse().unwrap()), "{prefix} should be global");
        }
    }

    #[tokio::test]
    async fn private_prefixes_keep_device_state() {
        let validator = FixedValidator {
            state: Ok(RpkiState::Invalid),
            calls: AtomicUsize::new(0),
        };
        let mut t = table(vec![route("10.1.0.0/16", vec![65001], &[])]);
        apply(&mut t, &external(), Some(&validator)).await.unwrap();
        assert_eq!(validator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(t.routes[0].rpki_state, RpkiState::Valid);
    }
}

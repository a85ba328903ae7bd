// Traceroute hop and BGP route enrichment.
//
// Best effort: a failed lookup is logged and the output is returned as parsed.

use std::net::IpAddr;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::collab::IpEnricher;
use crate::error::CoreError;
use crate::model::{BgpRouteTable, OutputData, TracerouteResult};
use crate::plugin::{Applicability, OutputContext, OutputPlugin};

async fn enrich(result: &mut TracerouteResult, enricher: &dyn IpEnricher) {
    let mut addresses: Vec<String> = Vec::new();
    for address in result.hops.iter().filter_map(|h| h.ip_address.as_ref()) {
        if !addresses.contains(address) {
            addresses.push(address.clone());
        }
    }
    if addresses.is_empty() {
        return;
    }

    match enricher.lookup(&addresses).await {
        Ok(infos) => {
            for hop in &mut result.hops {
                let Some(info) = hop.ip_address.as_ref().and_then(|a| infos.get(a)) else {
                    continue;
                };
                hop.asn.clone_from(&info.asn);
                hop.org.clone_from(&info.org);
                hop.prefix.clone_from(&info.prefix);
                hop.country.clone_from(&info.country);
                if hop.hostname.is_none() {
                    hop.hostname.clone_from(&info.hostname);
                }
            }
        }
        Err(e) => {
            warn!(error = %e, addresses = addresses.len(), "traceroute enrichment failed");
            return;
        }
    }

    let asns: Vec<String> = result
        .unique_asns()
        .into_iter()
        .filter(|asn| asn.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_owned)
        .collect();
    if asns.is_empty() {
        return;
    }
    match enricher.asn_organizations(&asns).await {
        Ok(organizations) => result.asn_organizations = organizations,
        Err(e) => warn!(error = %e, "ASN organization lookup failed"),
    }
}

/// Fills ASN, organization, prefix and country on traceroute hops.
#[derive(Debug, Default)]
pub struct TracerouteEnrichment;

#[async_trait]
impl OutputPlugin for TracerouteEnrichment {
    fn name(&self) -> &str {
        "traceroute_enrichment"
    }

    fn applicability(&self) -> Applicability {
        Applicability::common()
    }

    fn builtin(&self) -> bool {
        true
    }

    async fn process(
        &self,
        ctx: &OutputContext<'_>,
        output: OutputData,
    ) -> Result<OutputData, CoreError> {
        let OutputData::Traceroute(mut result) = output else {
            return Ok(output);
        };
        match ctx.collaborators.enricher.as_deref() {
            Some(enricher) => {
                enrich(&mut result, enricher).await;
                debug!(plugin = self.name(), path = %result.as_path_summary(), "enriched hops");
            }
            None => debug!(plugin = self.name(), "no enrichment service configured"),
        }
        Ok(OutputData::Traceroute(result))
    }
}

/// Fill next-hop ASN/org on each path, then name every AS-path ASN.
async fn enrich_routes(table: &mut BgpRouteTable, enricher: &dyn IpEnricher, next_hop: bool) {
    if next_hop {
        let mut addresses: Vec<String> = Vec::new();
        for route in &table.routes {
            let usable = route
                .next_hop
                .parse::<IpAddr>()
                .is_ok_and(|ip| !ip.is_unspecified());
            if usable && !addresses.contains(&route.next_hop) {
                addresses.push(route.next_hop.clone());
            }
        }
        if !addresses.is_empty() {
            match enricher.lookup(&addresses).await {
                Ok(infos) => {
                    for route in &mut table.routes {
                        if let Some(info) = infos.get(&route.next_hop) {
                            route.next_hop_asn.clone_from(&info.asn);
                            route.next_hop_org.clone_from(&info.org);
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, addresses = addresses.len(), "next-hop enrichment failed");
                }
            }
        }
    }

    let asns: Vec<String> = table.unique_asns().iter().map(u32::to_string).collect();
    if asns.is_empty() {
        return;
    }
    match enricher.asn_organizations(&asns).await {
        Ok(organizations) => table.asn_organizations = organizations,
        Err(e) => warn!(error = %e, "ASN organization lookup failed"),
    }
}

/// Names next hops and AS-path ASNs on parsed BGP tables.
#[derive(Debug, Default)]
pub struct BgpRouteEnrichment;

#[async_trait]
impl OutputPlugin for BgpRouteEnrichment {
    fn name(&self) -> &str {
        "bgp_route_enrichment"
    }

    fn applicability(&self) -> Applicability {
        Applicability::common()
    }

    fn builtin(&self) -> bool {
        true
    }

    async fn process(
        &self,
        ctx: &OutputContext<'_>,
        output: OutputData,
    ) -> Result<OutputData, CoreError> {
        let OutputData::BgpTable(mut table) = output else {
            return Ok(output);
        };
        match ctx.collaborators.enricher.as_deref() {
            Some(enricher) => {
                let next_hop = ctx.policy.ip_enrichment.enrich_next_hop;
                enrich_routes(&mut table, enricher, next_hop).await;
                debug!(
                    plugin = self.name(),
                    organizations = table.asn_organizations.len(),
                    "enriched routes"
                );
            }
            None => debug!(plugin = self.name(), "no enrichment service configured"),
        }
        Ok(OutputData::BgpTable(table))
    }
}

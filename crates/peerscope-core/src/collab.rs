// ── External collaborators ──
//
// Services outside the gateway that output plugins consult: an RPKI origin
// validator and a bulk IP/ASN enrichment service. Both are optional; failures
// are logged by the caller and never fail a query.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use peerscope_api::{RpkiClient, RpkiValidity, WhoisClient};

use crate::error::CoreError;
use crate::model::{AsnOrganization, RpkiState};

/// Origin validation for a (prefix, origin AS) pair.
#[async_trait]
pub trait RpkiValidator: Send + Sync {
    async fn validate(&self, prefix: &str, origin_asn: u32) -> Result<RpkiState, CoreError>;
}

/// What the enrichment service knows about one address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpInfo {
    /// ASN as a bare number, or `IXP` for exchange fabrics.
    pub asn: Option<String>,
    pub org: Option<String>,
    pub country: Option<String>,
    pub prefix: Option<String>,
    pub hostname: Option<String>,
}

/// Bulk address and ASN lookups.
#[async_trait]
pub trait IpEnricher: Send + Sync {
    async fn lookup(&self, addresses: &[String]) -> Result<HashMap<String, IpInfo>, CoreError>;

    /// Organization names for ASNs. Optional.
    async fn asn_organizations(
        &self,
        _asns: &[String],
    ) -> Result<IndexMap<String, AsnOrganization>, CoreError> {
        Ok(IndexMap::new())
    }
}

/// Optional collaborators handed to output plugins.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub rpki: Option<Arc<dyn RpkiValidator>>,
    pub enricher: Option<Arc<dyn IpEnricher>>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("rpki", &self.rpki.is_some())
            .field("enricher", &self.enricher.is_some())
            .finish()
    }
}

#[async_trait]
impl RpkiValidator for RpkiClient {
    async fn validate(&self, prefix: &str, origin_asn: u32) -> Result<RpkiState, CoreError> {
        let validity = self
            .validity(origin_asn, prefix)
            .await
            .map_err(|e| CoreError::Internal(format!("RPKI lookup failed: {e}")))?;
        Ok(match validity {
            RpkiValidity::Valid => RpkiState::Valid,
            RpkiValidity::Invalid => RpkiState::Invalid,
            RpkiValidity::NotFound => RpkiState::Unknown,
        })
    }
}

#[async_trait]
impl IpEnricher for WhoisClient {
    async fn lookup(&self, addresses: &[String]) -> Result<HashMap<String, IpInfo>, CoreError> {
        let records = self
            .lookup_addresses(addresses)
            .await
            .map_err(|e| CoreError::Internal(format!("whois lookup failed: {e}")))?;
        Ok(records
            .iter()
            .map(|r| {
                let info = IpInfo {
                    asn: r.routed_asn().map(str::to_owned),
                    org: r.known_org().map(str::to_owned),
                    country: r.known_country().map(str::to_owned),
                    prefix: r.known_prefix().map(str::to_owned),
                    hostname: None,
                };
                (r.ip.clone(), info)
            })
            .collect())
    }

    async fn asn_organizations(
        &self,
        asns: &[String],
    ) -> Result<IndexMap<String, AsnOrganization>, CoreError> {
        let records = self
            .lookup_asns(asns)
            .await
            .map_err(|e| CoreError::Internal(format!("whois ASN lookup failed: {e}")))?;
        Ok(records
            .into_iter()
            .map(|r| {
                let org = AsnOrganization {
                    name: r.name,
                    country: r.country,
                };
                (r.asn, org)
            })
            .collect())
    }
}

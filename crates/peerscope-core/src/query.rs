// ── Query model ──

use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// One request as submitted to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Per-request id, used only for log correlation.
    pub id: Uuid,
    pub device: String,
    /// Directive id or query type name (`bgp_route`, `ping`, ...).
    pub directive: String,
    pub targets: Vec<String>,
    pub vrf: Option<String>,
    /// Ask for the structured variant when the device supports it.
    pub structured: bool,
}

impl Query {
    pub fn new(
        device: impl Into<String>,
        directive: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            device: device.into(),
            directive: directive.into(),
            targets: vec![target.into()],
            vrf: None,
            structured: true,
        }
    }

    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_vrf(mut self, vrf: impl Into<String>) -> Self {
        self.vrf = Some(vrf.into());
        self
    }

    pub fn raw(mut self) -> Self {
        self.structured = false;
        self
    }
}

/// Fields that make two queries equivalent, in a fixed order.
#[derive(Serialize)]
struct FingerprintInput<'a> {
    device: &'a str,
    directive: &'a str,
    targets: Vec<String>,
    vrf: &'a str,
    structured: bool,
}

/// Lowercase hex SHA-256 of the normalized (device, directive, targets, vrf)
/// tuple plus the effective output format.
///
/// Targets are trimmed and lowercased so cosmetic differences share a key.
/// Raw and structured answers to the same query never share one.
pub fn fingerprint(
    device: &str,
    directive: &str,
    targets: &[String],
    vrf: &str,
    structured: bool,
) -> String {
    let input = FingerprintInput {
        device,
        directive,
        targets: targets.iter().map(|t| t.trim().to_lowercase()).collect(),
        vrf,
        structured,
    };
    let canonical = serde_json::to_vec(&input).unwrap_or_default();
    hex::encode(Sha256::digest(&canonical))
}

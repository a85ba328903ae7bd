// RPKI origin validation over HTTP.
//
// Speaks the Routinator-style validity API:
// `GET {base}/api/v1/validity/AS{asn}/{prefix}`.

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Route origin validity as reported by a relying-party validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpkiValidity {
    Valid,
    Invalid,
    NotFound,
}

#[derive(Debug, Deserialize)]
struct ValidityResponse {
    validated_route: ValidatedRoute,
}

#[derive(Debug, Deserialize)]
struct ValidatedRoute {
    validity: Validity,
}

#[derive(Debug, Deserialize)]
struct Validity {
    state: String,
}

pub struct RpkiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl RpkiClient {
    pub fn new(base_url: &str, transport: &TransportConfig) -> Result<Self, Error> {
        Self::from_reqwest(base_url, transport.build_client()?)
    }

    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        Ok(Self {
            http,
            base_url: Url::parse(base_url.trim_end_matches('/'))?,
        })
    }

    /// Look up the validity of `prefix` originated by `origin_asn`.
    pub async fn validity(&self, origin_asn: u32, prefix: &str) -> Result<RpkiValidity, Error> {
        let url = format!(
            "{}/api/v1/validity/AS{origin_asn}/{prefix}",
            self.base_url.as_str().trim_end_matches('/')
        );
        debug!("GET {}", url);

        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ValidityResponse =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: body.clone(),
            })?;

        match parsed.validated_route.validity.state.as_str() {
            "valid" => Ok(RpkiValidity::Valid),
            "invalid" => Ok(RpkiValidity::Invalid),
            "not-found" | "notfound" | "unknown" => Ok(RpkiValidity::NotFound),
            other => Err(Error::Deserialization {
                message: format!("unknown validity state '{other}'"),
                body,
            }),
        }
    }
}

//! Command dispatch: loads the config, assembles the gateway, and hands off
//! to the per-command handlers.

pub mod config_cmd;
pub mod credentials;
pub mod inventory;
pub mod query;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use peerscope_api::{RpkiClient, SshConfig, TransportConfig, WhoisClient};
use peerscope_config::Config;
use peerscope_core::{
    Collaborators, DeviceConnector, Gateway, IpEnricher, RpkiMode, RpkiValidator,
    StructuredConfig,
};
use tracing::debug;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Config path from `--config`, falling back to the platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(peerscope_config::config_path)
}

/// Load a config that must exist.
pub fn load_required(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = config_path(global);
    if !path.exists() {
        return Err(CliError::NoConfig {
            path: path.display().to_string(),
        });
    }
    Ok(peerscope_config::load_config_from(&path)?)
}

/// RPKI validator for external mode, whois enrichment when enabled.
fn collaborators(structured: &StructuredConfig) -> Result<Collaborators, CliError> {
    let rpki = match (structured.rpki.mode, structured.rpki.backend.as_deref()) {
        (RpkiMode::External, Some(backend)) => {
            let client = RpkiClient::new(backend, &TransportConfig::default()).map_err(|e| {
                CliError::Validation {
                    field: "params.structured.rpki.backend".into(),
                    reason: e.to_string(),
                }
            })?;
            debug!(backend, "using external RPKI validator");
            Some(Arc::new(client) as Arc<dyn RpkiValidator>)
        }
        _ => None,
    };
    let enrichment = &structured.ip_enrichment;
    let enricher = enrichment.enabled.then(|| {
        debug!(server = %enrichment.server, "using whois enrichment");
        let client = WhoisClient::new(
            enrichment.server.clone(),
            Duration::from_secs(enrichment.timeout),
        );
        Arc::new(client) as Arc<dyn IpEnricher>
    });
    Ok(Collaborators { rpki, enricher })
}

/// Build a ready gateway from the config file.
pub fn build_gateway(global: &GlobalOpts) -> Result<Gateway, CliError> {
    let cfg = load_required(global)?;
    let gateway_config = cfg.gateway_config()?;
    let collaborators = collaborators(&gateway_config.structured)?;
    let connector = DeviceConnector::new(
        SshConfig::default(),
        Duration::from_secs(cfg.params.request_timeout),
    );
    Ok(Gateway::builder(gateway_config)
        .connector(Arc::new(connector))
        .collaborators(collaborators)
        .build()?)
}

/// Dispatch a gateway-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let gateway = build_gateway(global)?;
    match cmd {
        Command::Query(args) => query::run(&gateway, &args, global).await,
        Command::Validate(args) => query::validate(&gateway, &args, global),
        Command::Devices(args) => inventory::devices(&gateway, args, global),
        Command::Directives(args) => inventory::directives(&gateway, args, global),
        // Config, Credentials and Completions are handled before dispatch
        Command::Config(_) | Command::Credentials(_) | Command::Completions(_) => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn enrichment_is_wired_only_when_enabled() {
        let mut structured = StructuredConfig::default();
        let built = collaborators(&structured).unwrap();
        assert!(built.enricher.is_none());
        assert!(built.rpki.is_none());

        structured.ip_enrichment.enabled = true;
        let built = collaborators(&structured).unwrap();
        assert!(built.enricher.is_some());
    }

    #[test]
    fn external_rpki_builds_a_validator() {
        let mut structured = StructuredConfig::default();
        structured.rpki.mode = RpkiMode::External;
        structured.rpki.backend = Some("https://rpki.example.net".into());
        assert!(collaborators(&structured).unwrap().rpki.is_some());
    }
}

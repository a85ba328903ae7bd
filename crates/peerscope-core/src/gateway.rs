// ── Gateway ──
//
// Runs one query end to end: directive resolution, target validation, input
// plugins, cache lookup, command synthesis, device execution under the
// request budget, output plugins, cache store. Everything it holds is
// read-only after construction except the cache.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, MemoryCache};
use crate::collab::Collaborators;
use crate::config::{Device, GatewayConfig, Vrf};
use crate::connector::{Connector, DeviceConnector};
use crate::directive::{Directive, DirectiveRegistry, synthesize};
use crate::error::CoreError;
use crate::model::{OutputData, QueryOutput};
use crate::plugin::{InputContext, OutputContext, PluginRegistry};
use crate::query::{Query, fingerprint};

/// What a query would do, without touching the device.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub device: Arc<Device>,
    pub directive: Arc<Directive>,
    /// Targets after input plugins.
    pub targets: Vec<String>,
    pub vrf: String,
    pub fingerprint: String,
    pub commands: Vec<String>,
}

/// Resolved and validated, not yet synthesized.
struct Prepared {
    device: Arc<Device>,
    directive: Arc<Directive>,
    templates: Vec<String>,
    targets: Vec<String>,
    vrf: Vrf,
    structured: bool,
    fingerprint: String,
}

struct GatewayInner {
    config: Arc<GatewayConfig>,
    directives: DirectiveRegistry,
    plugins: PluginRegistry,
    connector: Arc<dyn Connector>,
    cache: Arc<dyn CacheStore>,
    collaborators: Collaborators,
}

/// The query entry point. Cheap to clone.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("devices", &self.inner.config.devices.len())
            .field("directives", &self.inner.directives.len())
            .field("plugins", &self.inner.plugins)
            .field("collaborators", &self.inner.collaborators)
            .finish_non_exhaustive()
    }
}

/// Assembles a [`Gateway`], defaulting to the built-in plugins, the device
/// connector and an in-memory cache.
pub struct GatewayBuilder {
    config: GatewayConfig,
    plugins: Option<PluginRegistry>,
    connector: Option<Arc<dyn Connector>>,
    cache: Option<Arc<dyn CacheStore>>,
    collaborators: Collaborators,
}

impl GatewayBuilder {
    pub fn plugins(mut self, plugins: PluginRegistry) -> Self {
        self.plugins = Some(plugins);
        self
    }

    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = collaborators;
        self
    }

    /// Link the directives and freeze everything.
    pub fn build(self) -> Result<Gateway, CoreError> {
        let directives = DirectiveRegistry::new(&self.config.directives)?;
        let plugins = self.plugins.unwrap_or_else(PluginRegistry::with_builtins);
        info!(
            devices = self.config.devices.len(),
            directives = directives.len(),
            input_plugins = plugins.input_len(),
            output_plugins = plugins.output_len(),
            "gateway ready"
        );
        Ok(Gateway {
            inner: Arc::new(GatewayInner {
                config: Arc::new(self.config),
                directives,
                plugins,
                connector: self
                    .connector
                    .unwrap_or_else(|| Arc::new(DeviceConnector::default())),
                cache: self.cache.unwrap_or_else(|| Arc::new(MemoryCache::new())),
                collaborators: self.collaborators,
            }),
        })
    }
}

impl Gateway {
    pub fn builder(config: GatewayConfig) -> GatewayBuilder {
        GatewayBuilder {
            config,
            plugins: None,
            connector: None,
            cache: None,
            collaborators: Collaborators::default(),
        }
    }

    /// A gateway with every default.
    pub fn new(config: GatewayConfig) -> Result<Self, CoreError> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    pub fn directives(&self) -> &DirectiveRegistry {
        &self.inner.directives
    }

    pub fn devices(&self) -> impl Iterator<Item = &Arc<Device>> {
        self.inner.config.devices.values()
    }

    fn device(&self, name: &str) -> Result<Arc<Device>, CoreError> {
        self.inner
            .config
            .device(name)
            .cloned()
            .ok_or_else(|| CoreError::config(format!("unknown device {name}")))
    }

    /// Directives `device` can run, for listings.
    pub fn directives_for(&self, device: &str) -> Result<Vec<Arc<Directive>>, CoreError> {
        let device = self.device(device)?;
        Ok(self.inner.directives.for_device(&device))
    }

    /// Resolve, validate, run input plugins and fingerprint.
    fn prepare(&self, query: &Query) -> Result<Prepared, CoreError> {
        let device = self.device(&query.device)?;
        let directive = self
            .inner
            .directives
            .resolve(&device, &query.directive, query.structured)?;
        let templates = directive.validate(&query.targets)?.to_vec();

        let ctx = InputContext {
            device: &device,
            directive: &directive,
        };
        let targets = self.inner.plugins.run_input(&ctx, query.targets.clone())?;

        let vrf = device.vrf(query.vrf.as_deref()).cloned().ok_or_else(|| {
            CoreError::config(format!(
                "VRF {} is not configured on {}",
                query.vrf.as_deref().unwrap_or("default"),
                device.display_name
            ))
        })?;
        let structured = query.structured && device.structured_capable();
        let fingerprint =
            fingerprint(&device.name, &directive.id, &targets, &vrf.name, structured);

        Ok(Prepared {
            device,
            directive,
            templates,
            targets,
            vrf,
            structured,
            fingerprint,
        })
    }

    fn synthesize(prepared: &Prepared) -> Result<Vec<String>, CoreError> {
        synthesize(
            &prepared.directive,
            &prepared.templates,
            &prepared.targets,
            &prepared.device,
            &prepared.vrf,
        )
    }

    /// Everything short of device I/O: the commands a query would send.
    pub fn validate(&self, query: &Query) -> Result<QueryPlan, CoreError> {
        let prepared = self.prepare(query)?;
        let commands = Self::synthesize(&prepared)?;
        Ok(QueryPlan {
            commands,
            device: prepared.device,
            directive: prepared.directive,
            targets: prepared.targets,
            vrf: prepared.vrf.name,
            fingerprint: prepared.fingerprint,
        })
    }

    async fn cached(&self, fingerprint: &str) -> Option<QueryOutput> {
        let cache = &self.inner.cache;
        let raw = match cache.get(fingerprint).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(fingerprint, error = %e, "cache read failed");
                return None;
            }
        };
        match serde_json::from_str::<QueryOutput>(&raw) {
            Ok(output) => Some(output),
            Err(e) => {
                warn!(fingerprint, error = %e, "discarding unreadable cache entry");
                if let Err(e) = cache.expire(fingerprint).await {
                    warn!(fingerprint, error = %e, "cache expire failed");
                }
                None
            }
        }
    }

    async fn store(&self, output: &QueryOutput) {
        let ttl = self.inner.config.cache_ttl;
        let result = match serde_json::to_string(output) {
            Ok(json) => self.inner.cache.set(&output.fingerprint, json, ttl).await,
            Err(e) => Err(CoreError::Internal(format!("failed to serialize output: {e}"))),
        };
        if let Err(e) = result {
            warn!(fingerprint = %output.fingerprint, error = %e, "cache write failed");
        }
    }

    /// Run a query against its device, or answer it from the cache.
    pub async fn execute(&self, query: Query) -> Result<QueryOutput, CoreError> {
        let started = Instant::now();
        let prepared = self.prepare(&query)?;
        let device = &prepared.device;
        let directive = &prepared.directive;

        if let Some(mut hit) = self.cached(&prepared.fingerprint).await {
            debug!(
                query_id = %query.id,
                device = %device.name,
                directive = %directive.id,
                fingerprint = %prepared.fingerprint,
                "cache hit"
            );
            hit.cached = true;
            return Ok(hit);
        }

        let commands = Self::synthesize(&prepared)?;
        info!(
            query_id = %query.id,
            device = %device.name,
            directive = %directive.id,
            fingerprint = %prepared.fingerprint,
            command_count = commands.len(),
            "querying device"
        );

        let config = &self.inner.config;
        let outputs = tokio::time::timeout(
            config.execution_budget(),
            self.inner.connector.execute(device, &commands),
        )
        .await
        .map_err(|_| CoreError::ConnectionTimeout {
            device: device.display_name.clone(),
            timeout_secs: config.request_timeout.as_secs(),
        })??;

        if outputs.iter().all(|o| o.trim().is_empty()) {
            return Err(CoreError::EmptyResponse {
                device: device.display_name.clone(),
            });
        }

        let ctx = OutputContext {
            device,
            directive,
            targets: &prepared.targets,
            vrf: &prepared.vrf.name,
            structured: prepared.structured,
            policy: &config.structured,
            collaborators: &self.inner.collaborators,
        };
        let output = self
            .inner
            .plugins
            .run_output(&ctx, OutputData::Raw(outputs))
            .await?;

        let result = QueryOutput {
            format: output.format(),
            output,
            fingerprint: prepared.fingerprint.clone(),
            cached: false,
            runtime_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            timestamp: Utc::now(),
        };
        self.store(&result).await;

        info!(
            query_id = %query.id,
            device = %device.name,
            directive = %directive.id,
            format = %result.format,
            runtime_ms = result.runtime_ms,
            "query complete"
        );
        Ok(result)
    }
}

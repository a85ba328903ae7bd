// ── Plugin pipeline ──
//
// Input plugins see each validated target before any device I/O and may veto
// or rewrite it. Output plugins form a strict chain over the device response:
// each one's result feeds the next, and the first error halts the query.
//
// Selection order is fixed: directive/platform-specific plugins before common
// ones, and within each group user plugins before built-ins.

pub mod builtin;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::collab::Collaborators;
use crate::config::{Device, StructuredConfig};
use crate::directive::Directive;
use crate::error::{CoreError, ValidationFailure};
use crate::model::OutputData;
use crate::platform::Platform;

/// Where a plugin applies.
///
/// A plugin runs when it is `common`, when the directive names it in its
/// `plugins` list, or when both its platform and directive filters accept
/// the query. An empty filter accepts anything, but a plugin with neither
/// filter set only runs when named.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Applicability {
    pub platforms: Vec<Platform>,
    pub directives: Vec<String>,
    pub common: bool,
}

impl Applicability {
    pub fn common() -> Self {
        Self {
            common: true,
            ..Self::default()
        }
    }

    pub fn platforms(platforms: &[Platform]) -> Self {
        Self {
            platforms: platforms.to_vec(),
            ..Self::default()
        }
    }

    pub fn with_directives(mut self, directives: Vec<String>) -> Self {
        self.directives = directives;
        self
    }

    pub fn applies(&self, name: &str, directive: &Directive, platform: Platform) -> bool {
        if self.common || directive.plugins.iter().any(|p| p == name) {
            return true;
        }
        if self.platforms.is_empty() && self.directives.is_empty() {
            return false;
        }
        let platform_ok = self.platforms.is_empty() || self.platforms.contains(&platform);
        let directive_ok =
            self.directives.is_empty() || self.directives.iter().any(|d| *d == directive.id);
        platform_ok && directive_ok
    }
}

// ── Contracts ────────────────────────────────────────────────────────

/// What an input plugin can see about the query.
#[derive(Debug, Clone, Copy)]
pub struct InputContext<'a> {
    pub device: &'a Device,
    pub directive: &'a Directive,
}

/// Pre-execution target check and rewrite.
pub trait InputPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn applicability(&self) -> Applicability;

    fn builtin(&self) -> bool {
        false
    }

    /// Reject the target with a user-facing reason.
    fn validate(&self, _ctx: &InputContext<'_>, _target: &str) -> Result<(), String> {
        Ok(())
    }

    fn transform(&self, _ctx: &InputContext<'_>, target: String) -> String {
        target
    }
}

/// What an output plugin can see about the query.
#[derive(Debug, Clone, Copy)]
pub struct OutputContext<'a> {
    pub device: &'a Device,
    pub directive: &'a Directive,
    /// Targets after input plugins.
    pub targets: &'a [String],
    pub vrf: &'a str,
    /// Structured output was requested and the device can produce it.
    pub structured: bool,
    pub policy: &'a StructuredConfig,
    pub collaborators: &'a Collaborators,
}

/// Post-execution transform, parse or enrichment step.
#[async_trait]
pub trait OutputPlugin: Send + Sync {
    fn name(&self) -> &str;

    fn applicability(&self) -> Applicability;

    fn builtin(&self) -> bool {
        false
    }

    async fn process(
        &self,
        ctx: &OutputContext<'_>,
        output: OutputData,
    ) -> Result<OutputData, CoreError>;
}

// ── Registry ─────────────────────────────────────────────────────────

/// Registered plugins, in registration order.
///
/// Built once at startup and shared read-only between queries.
#[derive(Default)]
pub struct PluginRegistry {
    input: Vec<Arc<dyn InputPlugin>>,
    output: Vec<Arc<dyn OutputPlugin>>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("input", &self.input.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("output", &self.output.iter().map(|p| p.name()).collect::<Vec<_>>())
            .finish()
    }
}

/// Specific before common, then user before built-in. Stable within a group.
fn order_key(common: bool, builtin: bool) -> (bool, bool) {
    (common, builtin)
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in plugin.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register(&mut registry);
        registry
    }

    /// Add an input plugin unless one with the same name and applicability exists.
    pub fn register_input(&mut self, plugin: Arc<dyn InputPlugin>) -> bool {
        let applicability = plugin.applicability();
        if self
            .input
            .iter()
            .any(|p| p.name() == plugin.name() && p.applicability() == applicability)
        {
            debug!(plugin = plugin.name(), "input plugin already registered");
            return false;
        }
        self.input.push(plugin);
        true
    }

    /// Add an output plugin unless one with the same name and applicability exists.
    pub fn register_output(&mut self, plugin: Arc<dyn OutputPlugin>) -> bool {
        let applicability = plugin.applicability();
        if self
            .output
            .iter()
            .any(|p| p.name() == plugin.name() && p.applicability() == applicability)
        {
            debug!(plugin = plugin.name(), "output plugin already registered");
            return false;
        }
        self.output.push(plugin);
        true
    }

    /// Remove this exact plugin instance.
    pub fn unregister_input(&mut self, plugin: &Arc<dyn InputPlugin>) -> bool {
        let before = self.input.len();
        self.input
            .retain(|p| !std::ptr::addr_eq(Arc::as_ptr(p), Arc::as_ptr(plugin)));
        self.input.len() != before
    }

    /// Remove this exact plugin instance.
    pub fn unregister_output(&mut self, plugin: &Arc<dyn OutputPlugin>) -> bool {
        let before = self.output.len();
        self.output
            .retain(|p| !std::ptr::addr_eq(Arc::as_ptr(p), Arc::as_ptr(plugin)));
        self.output.len() != before
    }

    pub fn input_len(&self) -> usize {
        self.input.len()
    }

    pub fn output_len(&self) -> usize {
        self.output.len()
    }

    /// Input plugins for a query, in execution order.
    pub fn input_for(&self, directive: &Directive, platform: Platform) -> Vec<Arc<dyn InputPlugin>> {
        let mut selected: Vec<_> = self
            .input
            .iter()
            .filter(|p| p.applicability().applies(p.name(), directive, platform))
            .cloned()
            .collect();
        selected.sort_by_key(|p| order_key(p.applicability().common, p.builtin()));
        selected
    }

    /// Output plugins for a query, in execution order.
    pub fn output_for(
        &self,
        directive: &Directive,
        platform: Platform,
    ) -> Vec<Arc<dyn OutputPlugin>> {
        let mut selected: Vec<_> = self
            .output
            .iter()
            .filter(|p| p.applicability().applies(p.name(), directive, platform))
            .cloned()
            .collect();
        selected.sort_by_key(|p| order_key(p.applicability().common, p.builtin()));
        selected
    }

    /// Check then rewrite every target with each applicable input plugin.
    pub fn run_input(
        &self,
        ctx: &InputContext<'_>,
        targets: Vec<String>,
    ) -> Result<Vec<String>, CoreError> {
        let mut targets = targets;
        for plugin in self.input_for(ctx.directive, ctx.device.platform) {
            targets = targets
                .into_iter()
                .map(|target| {
                    plugin.validate(ctx, &target).map_err(|reason| {
                        debug!(plugin = plugin.name(), target = %target, "target rejected");
                        CoreError::validation(ValidationFailure::Plugin, &target, reason)
                    })?;
                    let rewritten = plugin.transform(ctx, target.clone());
                    if rewritten != target {
                        debug!(plugin = plugin.name(), from = %target, to = %rewritten, "target rewritten");
                    }
                    Ok(rewritten)
                })
                .collect::<Result<_, CoreError>>()?;
        }
        Ok(targets)
    }

    /// Feed the output through each applicable plugin in turn.
    pub async fn run_output(
        &self,
        ctx: &OutputContext<'_>,
        output: OutputData,
    ) -> Result<OutputData, CoreError> {
        let mut output = output;
        for plugin in self.output_for(ctx.directive, ctx.device.platform) {
            output = plugin.process(ctx, output).await.inspect_err(|e| {
                debug!(plugin = plugin.name(), error = %e, "output plugin halted the chain");
            })?;
            debug!(plugin = plugin.name(), format = %output.format(), "output plugin applied");
        }
        Ok(output)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::{DeviceTransport, Vrf};
    use crate::directive::DirectiveRegistry;
    use peerscope_api::SshCredentials;
    use secrecy::SecretString;

    // ── Helpers ──

    fn device(platform: Platform) -> Device {
        Device {
            name: "edge1".into(),
            display_name: "Edge 1".into(),
            address: "192.0.2.10".into(),
            port: 22,
            platform,
            transport: DeviceTransport::Session {
                credential: SshCredentials::password("lg", SecretString::from("pw".to_owned())),
                proxy: None,
            },
            vrfs: vec![Vrf::default_vrf()],
            directives: vec![],
            structured_output: true,
        }
    }

    /// Appends its tag to every raw line and records when it ran.
    struct Tagger {
        name: &'static str,
        applicability: Applicability,
        builtin: bool,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl OutputPlugin for Tagger {
        fn name(&self) -> &str {
            self.name
        }

        fn applicability(&self) -> Applicability {
            self.applicability.clone()
        }

        fn builtin(&self) -> bool {
            self.builtin
        }

        async fn process(
            &self,
            _ctx: &OutputContext<'_>,
            output: OutputData,
        ) -> Result<OutputData, CoreError> {
            self.log.lock().unwrap().push(self.name);
            match output {
                OutputData::Raw(lines) => Ok(OutputData::Raw(
                    lines.into_iter().map(|l| format!("{l}+{}", self.name)).collect(),
                )),
                _ => Err(CoreError::plugin(self.name, "expected raw output")),
            }
        }
    }

    struct Failing;

    #[async_trait]
    impl OutputPlugin for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn applicability(&self) -> Applicability {
            Applicability::platforms(&[Platform::Juniper])
        }

        async fn process(
            &self,
            _ctx: &OutputContext<'_>,
            _output: OutputData,
        ) -> Result<OutputData, CoreError> {
            Err(CoreError::plugin("failing", "refused"))
        }
    }

    struct Upper;

    impl InputPlugin for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn applicability(&self) -> Applicability {
            Applicability::common()
        }

        fn validate(&self, _ctx: &InputContext<'_>, target: &str) -> Result<(), String> {
            if target.contains("bad") {
                Err(format!("{target} is not allowed"))
            } else {
                Ok(())
            }
        }

        fn transform(&self, _ctx: &InputContext<'_>, target: String) -> String {
            target.to_uppercase()
        }
    }

    fn tagger(
        name: &'static str,
        applicability: Applicability,
        builtin: bool,
        log: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Arc<dyn OutputPlugin> {
        Arc::new(Tagger {
            name,
            applicability,
            builtin,
            log: Arc::clone(log),
        })
    }

    // ── Applicability ──

    #[test]
    fn applicability_filters() {
        let registry = DirectiveRegistry::new(&[]).unwrap();
        let route = registry.get("juniper_bgp_route").unwrap();

        assert!(Applicability::common().applies("x", route, Platform::Juniper));
        assert!(Applicability::platforms(&[Platform::Juniper]).applies("x", route, Platform::Juniper));
        assert!(!Applicability::platforms(&[Platform::Huawei]).applies("x", route, Platform::Juniper));
        assert!(!Applicability::default().applies("x", route, Platform::Juniper));

        let scoped = Applicability::platforms(&[Platform::Juniper])
            .with_directives(vec!["juniper_ping".into()]);
        assert!(!scoped.applies("x", route, Platform::Juniper));

        let huawei = registry.get("huawei_bgp_route").unwrap();
        assert!(Applicability::default().applies("huawei_route_target", huawei, Platform::Huawei));
    }

    // ── Registration ──

    #[test]
    fn registration_is_idempotent_and_removal_by_identity() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = PluginRegistry::new();
        let first = tagger("a", Applicability::common(), false, &log);
        let twin = tagger("a", Applicability::common(), false, &log);

        assert!(registry.register_output(Arc::clone(&first)));
        assert!(!registry.register_output(Arc::clone(&twin)));
        assert_eq!(registry.output_len(), 1);

        assert!(registry.register_output(tagger(
            "a",
            Applicability::platforms(&[Platform::Frr]),
            false,
            &log
        )));
        assert_eq!(registry.output_len(), 2);

        assert!(!registry.unregister_output(&twin));
        assert!(registry.unregister_output(&first));
        assert_eq!(registry.output_len(), 1);
    }

    // ── Execution ──

    #[tokio::test]
    async fn specific_then_common_and_user_before_builtin() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = PluginRegistry::new();
        registry.register_output(tagger("common_builtin", Applicability::common(), true, &log));
        registry.register_output(tagger("common_user", Applicability::common(), false, &log));
        registry.register_output(tagger(
            "specific_builtin",
            Applicability::platforms(&[Platform::Juniper]),
            true,
            &log,
        ));
        registry.register_output(tagger(
            "specific_user",
            Applicability::platforms(&[Platform::Juniper]),
            false,
            &log,
        ));

        let directives = DirectiveRegistry::new(&[]).unwrap();
        let directive = directives.get("juniper_ping").unwrap();
        let device = device(Platform::Juniper);
        let policy = StructuredConfig::default();
        let collaborators = Collaborators::default();
        let ctx = OutputContext {
            device: &device,
            directive,
            targets: &[],
            vrf: "default",
            structured: false,
            policy: &policy,
            collaborators: &collaborators,
        };

        let output = registry
            .run_output(&ctx, OutputData::Raw(vec!["x".into()]))
            .await
            .unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["specific_user", "specific_builtin", "common_user", "common_builtin"]
        );
        assert_eq!(
            output,
            OutputData::Raw(vec!["x+specific_user+specific_builtin+common_user+common_builtin".into()])
        );
    }

    #[tokio::test]
    async fn failure_halts_the_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = PluginRegistry::new();
        registry.register_output(Arc::new(Failing));
        registry.register_output(tagger("after", Applicability::common(), false, &log));

        let directives = DirectiveRegistry::new(&[]).unwrap();
        let directive = directives.get("juniper_ping").unwrap();
        let device = device(Platform::Juniper);
        let policy = StructuredConfig::default();
        let collaborators = Collaborators::default();
        let ctx = OutputContext {
            device: &device,
            directive,
            targets: &[],
            vrf: "default",
            structured: false,
            policy: &policy,
            collaborators: &collaborators,
        };

        let err = registry
            .run_output(&ctx, OutputData::Raw(vec!["x".into()]))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Plugin { .. }));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn input_plugins_veto_and_rewrite() {
        let mut registry = PluginRegistry::new();
        registry.register_input(Arc::new(Upper));

        let directives = DirectiveRegistry::new(&[]).unwrap();
        let directive = directives.get("juniper_ping").unwrap();
        let device = device(Platform::Juniper);
        let ctx = InputContext {
            device: &device,
            directive,
        };

        let out = registry.run_input(&ctx, vec!["abc".into()]).unwrap();
        assert_eq!(out, vec!["ABC"]);

        let err = registry.run_input(&ctx, vec!["bad".into()]).unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationFailure::Plugin));
        assert_eq!(err.to_string(), "bad is not allowed");
    }
}

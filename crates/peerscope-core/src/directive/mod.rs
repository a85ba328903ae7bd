// ── Directives ──
//
// A directive is a named query (route lookup, ping, ...) bound to a set of
// platforms, with ordered validation rules and the command templates each rule
// emits. Documents are parsed into `DirectiveSpec`s, merged by id (user over
// built-in), then linked: `table_output` ids become direct handles.

mod builtin;
pub mod command;
pub mod rule;

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use tracing::debug;

use crate::config::Device;
use crate::error::{CoreError, ValidationFailure};
use crate::platform::Platform;

pub use builtin::{builtin_id, builtin_specs};
pub use command::synthesize;
pub use rule::{Rule, RuleAction, RuleOutcome, RuleSpec};

/// The standard query types.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QueryType {
    BgpRoute,
    BgpAspath,
    BgpCommunity,
    Ping,
    Traceroute,
}

impl QueryType {
    pub fn all() -> impl Iterator<Item = Self> {
        Self::iter()
    }

    pub fn is_bgp(self) -> bool {
        matches!(self, Self::BgpRoute | Self::BgpAspath | Self::BgpCommunity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// How the target is entered and what shape it must have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldType {
    Text {
        #[serde(default)]
        description: Option<String>,
    },
    /// Target must be an address or prefix.
    Ip {
        #[serde(default)]
        description: Option<String>,
    },
    /// Target must be one of the listed values.
    Select {
        #[serde(default)]
        description: Option<String>,
        options: Vec<SelectOption>,
    },
}

impl Default for FieldType {
    fn default() -> Self {
        Self::Text { description: None }
    }
}

impl FieldType {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Ip { .. } => "ip",
            Self::Select { .. } => "select",
        }
    }

    fn check(&self, target: &str) -> Result<(), CoreError> {
        match self {
            Self::Text { .. } => Ok(()),
            Self::Ip { .. } => rule::parse_target_net(target).map(|_| ()),
            Self::Select { options, .. } => {
                if options.iter().any(|o| o.value == target) {
                    Ok(())
                } else {
                    Err(CoreError::validation(
                        ValidationFailure::Format,
                        target,
                        format!("{target} is not one of the allowed values"),
                    ))
                }
            }
        }
    }
}

fn default_separator() -> String {
    " ".into()
}

/// Directive as written in a document, before linking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectiveSpec {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub query_type: Option<QueryType>,
    pub rules: Vec<RuleSpec>,
    #[serde(default)]
    pub field: FieldType,
    #[serde(default)]
    pub info: Option<String>,
    #[serde(default)]
    pub plugins: Vec<String>,
    #[serde(default)]
    pub table_output: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub platforms: Vec<Platform>,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default = "default_separator")]
    pub multiple_separator: String,
}

impl Default for DirectiveSpec {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            query_type: None,
            rules: Vec::new(),
            field: FieldType::default(),
            info: None,
            plugins: Vec::new(),
            table_output: None,
            groups: Vec::new(),
            platforms: Vec::new(),
            multiple: false,
            multiple_separator: default_separator(),
        }
    }
}

/// A linked, ready-to-use directive.
#[derive(Debug)]
pub struct Directive {
    pub id: String,
    pub name: String,
    pub query_type: Option<QueryType>,
    pub rules: Vec<Rule>,
    pub field: FieldType,
    pub info: Option<String>,
    pub plugins: Vec<String>,
    pub table_output: Option<Arc<Directive>>,
    pub groups: Vec<String>,
    /// Empty means any platform.
    pub platforms: Vec<Platform>,
    pub multiple: bool,
    pub multiple_separator: String,
    pub builtin: bool,
}

impl Directive {
    pub fn applies_to(&self, platform: Platform) -> bool {
        self.platforms.is_empty() || self.platforms.contains(&platform)
    }

    pub fn is_query_type(&self, query_type: QueryType) -> bool {
        self.query_type == Some(query_type)
    }

    /// Run the targets through the field check and the ordered rules.
    ///
    /// Returns the matched rule's command templates.
    pub fn validate(&self, targets: &[String]) -> Result<&[String], CoreError> {
        if targets.is_empty() {
            return Err(CoreError::validation(
                ValidationFailure::Format,
                "",
                "a target is required",
            ));
        }
        if targets.len() > 1 && !self.multiple {
            return Err(CoreError::validation(
                ValidationFailure::MultipleTargets,
                targets.join(" "),
                format!("{} accepts a single target", self.name),
            ));
        }
        for target in targets {
            self.field.check(target)?;
        }

        for rule in &self.rules {
            if let RuleOutcome::Matched(commands) = rule.evaluate(targets)? {
                debug!(directive = %self.id, condition = %rule.condition(), "target validated");
                return Ok(commands);
            }
        }

        let joined = targets.join(" ");
        Err(CoreError::validation(
            ValidationFailure::NoMatch,
            &joined,
            format!("{joined}: no matched validation rule"),
        ))
    }
}

// ── Registry ─────────────────────────────────────────────────────────

/// All known directives keyed by id.
#[derive(Debug, Default)]
pub struct DirectiveRegistry {
    directives: IndexMap<String, Arc<Directive>>,
}

impl DirectiveRegistry {
    /// Merge user specs over the built-ins and link `table_output` references.
    pub fn new(user: &[DirectiveSpec]) -> Result<Self, CoreError> {
        let mut specs: IndexMap<String, (DirectiveSpec, bool)> = builtin_specs()
            .into_iter()
            .map(|s| (s.id.clone(), (s, true)))
            .collect();

        let mut seen = Vec::with_capacity(user.len());
        for spec in user {
            if seen.contains(&spec.id.as_str()) {
                return Err(CoreError::config(format!("duplicate directive id {}", spec.id)));
            }
            seen.push(spec.id.as_str());
            if specs.contains_key(&spec.id) {
                debug!(directive = %spec.id, "user directive overrides built-in");
            }
            specs.insert(spec.id.clone(), (spec.clone(), false));
        }

        let mut linker = Linker {
            specs: &specs,
            built: HashMap::new(),
            visiting: Vec::new(),
        };
        let mut directives = IndexMap::with_capacity(specs.len());
        for id in specs.keys() {
            let directive = linker.link(id)?;
            directives.insert(id.clone(), directive);
        }
        Ok(Self { directives })
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Directive>> {
        self.directives.get(id)
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Directive>> {
        self.directives.values()
    }

    /// Whether `device` may run `directive`.
    pub fn available_on(directive: &Directive, device: &Device) -> bool {
        if directive.builtin {
            directive.applies_to(device.platform)
        } else {
            device.directives.contains(&directive.id)
                || directive.platforms.contains(&device.platform)
        }
    }

    /// Directives a device can run, excluding `_table` variants reached by linking.
    pub fn for_device(&self, device: &Device) -> Vec<Arc<Directive>> {
        let linked: Vec<&str> = self
            .iter()
            .filter_map(|d| d.table_output.as_ref().map(|t| t.id.as_str()))
            .collect();
        self.iter()
            .filter(|d| Self::available_on(d, device) && !linked.contains(&d.id.as_str()))
            .cloned()
            .collect()
    }

    /// Resolve a directive id or a query type name for a device.
    ///
    /// When `structured` is set and the device can produce structured output,
    /// the directive's `table_output` variant is returned instead.
    pub fn resolve(
        &self,
        device: &Device,
        selector: &str,
        structured: bool,
    ) -> Result<Arc<Directive>, CoreError> {
        let by_id = self
            .get(selector)
            .filter(|d| Self::available_on(d, device))
            .cloned();

        let directive = match by_id {
            Some(d) => d,
            None => {
                let query_type: QueryType = selector.parse().map_err(|_| {
                    CoreError::config(format!(
                        "directive {selector} is not available on {}",
                        device.display_name
                    ))
                })?;
                let id = builtin_id(device.platform.directive_family(), query_type);
                self.get(&id)
                    .filter(|d| Self::available_on(d, device))
                    .cloned()
                    .ok_or_else(|| {
                        CoreError::config(format!(
                            "no {query_type} directive for platform {}",
                            device.platform
                        ))
                    })?
            }
        };

        if structured && device.structured_capable() {
            if let Some(table) = &directive.table_output {
                debug!(from = %directive.id, to = %table.id, "using structured variant");
                return Ok(Arc::clone(table));
            }
        }
        Ok(directive)
    }
}

/// Second pass: turns specs into directives, resolving `table_output` ids.
struct Linker<'a> {
    specs: &'a IndexMap<String, (DirectiveSpec, bool)>,
    built: HashMap<String, Arc<Directive>>,
    visiting: Vec<String>,
}

impl Linker<'_> {
    fn link(&mut self, id: &str) -> Result<Arc<Directive>, CoreError> {
        if let Some(done) = self.built.get(id) {
            return Ok(Arc::clone(done));
        }
        if self.visiting.iter().any(|v| v == id) {
            return Err(CoreError::config(format!(
                "table_output cycle through directive {id}"
            )));
        }
        let (spec, builtin) = self
            .specs
            .get(id)
            .ok_or_else(|| CoreError::config(format!("unknown directive {id}")))?;

        self.visiting.push(id.to_owned());
        let table_output = match &spec.table_output {
            Some(target) => {
                if !self.specs.contains_key(target) {
                    return Err(CoreError::config(format!(
                        "directive {id} links table_output to unknown directive {target}"
                    )));
                }
                Some(self.link(target)?)
            }
            None => None,
        };
        self.visiting.pop();

        let rules = spec
            .rules
            .iter()
            .map(Rule::from_spec)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CoreError::config(format!("directive {id}: {e}")))?;

        let directive = Arc::new(Directive {
            id: spec.id.clone(),
            name: spec.name.clone(),
            query_type: spec.query_type,
            rules,
            field: spec.field.clone(),
            info: spec.info.clone(),
            plugins: spec.plugins.clone(),
            table_output,
            groups: spec.groups.clone(),
            platforms: spec.platforms.clone(),
            multiple: spec.multiple,
            multiple_separator: spec.multiple_separator.clone(),
            builtin: *builtin,
        });
        self.built.insert(id.to_owned(), Arc::clone(&directive));
        Ok(directive)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{DeviceTransport, Vrf};
    use peerscope_api::SshCredentials;
    use secrecy::SecretString;

    // ── Helpers ──

    fn device(platform: Platform, structured: bool) -> Device {
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
            structured_output: structured,
        }
    }

    fn targets(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_owned()).collect()
    }

    // ── Tests ──

    #[test]
    fn query_type_resolves_to_platform_builtin() {
        let registry = DirectiveRegistry::new(&[]).unwrap();
        let d = registry
            .resolve(&device(Platform::Juniper, false), "bgp_route", false)
            .unwrap();
        assert_eq!(d.id, "juniper_bgp_route");

        let frr = registry
            .resolve(&device(Platform::FrrAgent, false), "ping", false)
            .unwrap();
        assert_eq!(frr.id, "frr_ping");
    }

    #[test]
    fn structured_request_swaps_in_table_variant() {
        let registry = DirectiveRegistry::new(&[]).unwrap();
        let structured = registry
            .resolve(&device(Platform::Juniper, true), "juniper_bgp_route", true)
            .unwrap();
        assert_eq!(structured.id, "juniper_bgp_route_table");

        let not_enabled = registry
            .resolve(&device(Platform::Juniper, false), "bgp_route", true)
            .unwrap();
        assert_eq!(not_enabled.id, "juniper_bgp_route");
    }

    #[test]
    fn foreign_platform_directive_is_not_available() {
        let registry = DirectiveRegistry::new(&[]).unwrap();
        let err = registry
            .resolve(&device(Platform::Juniper, false), "arista_eos_bgp_route", false)
            .unwrap_err();
        assert!(matches!(err, CoreError::Configuration { .. }));
    }

    #[test]
    fn user_directive_overrides_builtin() {
        let user = DirectiveSpec {
            id: "juniper_ping".into(),
            name: "Ping (custom)".into(),
            query_type: Some(QueryType::Ping),
            rules: vec![RuleSpec::permit("0.0.0.0/0", &["ping {target} rapid"])],
            platforms: vec![Platform::Juniper],
            ..DirectiveSpec::default()
        };
        let registry = DirectiveRegistry::new(&[user]).unwrap();
        let d = registry.get("juniper_ping").unwrap();
        assert_eq!(d.name, "Ping (custom)");
        assert!(!d.builtin);
        assert_eq!(d.validate(&targets(&["192.0.2.1"])).unwrap(), ["ping {target} rapid"]);
    }

    #[test]
    fn duplicate_user_ids_are_rejected() {
        let spec = DirectiveSpec {
            id: "custom".into(),
            name: "Custom".into(),
            rules: vec![RuleSpec::permit("*", &["show {target}"])],
            ..DirectiveSpec::default()
        };
        let err = DirectiveRegistry::new(&[spec.clone(), spec]).unwrap_err();
        assert!(err.to_string().contains("duplicate directive id custom"));
    }

    #[test]
    fn table_output_cycles_and_dangling_links_fail() {
        let a = DirectiveSpec {
            id: "a".into(),
            name: "A".into(),
            rules: vec![RuleSpec::permit("*", &["a"])],
            table_output: Some("b".into()),
            ..DirectiveSpec::default()
        };
        let b = DirectiveSpec {
            id: "b".into(),
            table_output: Some("a".into()),
            ..a.clone()
        };
        let err = DirectiveRegistry::new(&[a.clone(), b]).unwrap_err();
        assert!(err.to_string().contains("cycle"));

        let dangling = DirectiveSpec {
            table_output: Some("missing".into()),
            ..a
        };
        let err = DirectiveRegistry::new(&[dangling]).unwrap_err();
        assert!(err.to_string().contains("unknown directive missing"));
    }

    #[test]
    fn rules_are_evaluated_in_order() {
        let spec = DirectiveSpec {
            id: "guarded".into(),
            name: "Guarded".into(),
            rules: vec![
                RuleSpec::deny("192.0.2.0/24"),
                RuleSpec::permit("0.0.0.0/0", &["show route {target}"]),
            ],
            ..DirectiveSpec::default()
        };
        let registry = DirectiveRegistry::new(&[spec]).unwrap();
        let d = registry.get("guarded").unwrap();

        let err = d.validate(&targets(&["192.0.2.1"])).unwrap_err();
        assert!(err.to_string().contains("denied, member of 192.0.2.0/24"));
        assert!(d.validate(&targets(&["198.51.100.1"])).is_ok());

        let err = d.validate(&targets(&["2001:db8::1"])).unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationFailure::NoMatch));
        assert!(err.to_string().contains("no matched validation rule"));
    }

    #[test]
    fn single_target_directives_reject_lists() {
        let registry = DirectiveRegistry::new(&[]).unwrap();
        let d = registry.get("juniper_bgp_route").unwrap();
        let err = d.validate(&targets(&["1.1.1.0/24", "8.8.8.0/24"])).unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationFailure::MultipleTargets));
    }

    #[test]
    fn listing_hides_linked_table_variants() {
        let registry = DirectiveRegistry::new(&[]).unwrap();
        let ids: Vec<String> = registry
            .for_device(&device(Platform::AristaEos, true))
            .iter()
            .map(|d| d.id.clone())
            .collect();
        assert_eq!(ids.len(), 5);
        assert!(ids.iter().all(|id| id.starts_with("arista_eos_") && !id.ends_with("_table")));
    }
}

// ── Validation rules ──
//
// A rule pairs a condition with an action and the command templates emitted
// when a target passes. Rules are evaluated strictly in order; the first rule
// that claims a target decides the outcome.

use std::net::IpAddr;

use ipnet::IpNet;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, ValidationFailure};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RuleAction {
    #[default]
    Permit,
    Deny,
}

/// Rule as written in a directive document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSpec {
    /// Network (`192.0.2.0/24`), regular expression, `*`, or absent for no validation.
    pub condition: Option<String>,
    pub action: RuleAction,
    pub ge: Option<u8>,
    pub le: Option<u8>,
    pub command: Option<String>,
    pub commands: Vec<String>,
}

impl RuleSpec {
    pub fn permit(condition: &str, commands: &[&str]) -> Self {
        Self {
            condition: Some(condition.to_owned()),
            commands: commands.iter().map(|c| (*c).to_owned()).collect(),
            ..Self::default()
        }
    }

    pub fn deny(condition: &str) -> Self {
        Self {
            condition: Some(condition.to_owned()),
            action: RuleAction::Deny,
            ..Self::default()
        }
    }
}

/// Network containment rule with prefix-length bounds.
#[derive(Debug, Clone)]
pub struct IpRule {
    pub network: IpNet,
    pub ge: u8,
    pub le: u8,
    pub action: RuleAction,
    pub commands: Vec<String>,
}

/// Regular-expression rule, compiled case-insensitively.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pub pattern: String,
    pub action: RuleAction,
    pub commands: Vec<String>,
    regex: Regex,
}

#[derive(Debug, Clone)]
pub enum Rule {
    Ipv4(IpRule),
    Ipv6(IpRule),
    Pattern(PatternRule),
    Unconditional { commands: Vec<String> },
}

/// What a single rule concluded about the targets.
#[derive(Debug)]
pub enum RuleOutcome<'a> {
    /// Targets passed; emit these templates.
    Matched(&'a [String]),
    /// The rule does not apply; try the next one.
    Skip,
}

impl Rule {
    pub fn from_spec(spec: &RuleSpec) -> Result<Self, CoreError> {
        let commands: Vec<String> = spec
            .command
            .iter()
            .chain(spec.commands.iter())
            .cloned()
            .collect();
        if commands.is_empty() && spec.action == RuleAction::Permit {
            return Err(CoreError::config(format!(
                "permit rule {:?} has no command",
                spec.condition.as_deref().unwrap_or("<none>")
            )));
        }

        let Some(condition) = spec.condition.as_deref() else {
            return Ok(Self::Unconditional { commands });
        };

        if let Ok(network) = condition.parse::<IpNet>() {
            let max = network.max_prefix_len();
            let ge = spec.ge.unwrap_or(0);
            let le = spec.le.unwrap_or(max);
            if ge > le || le > max {
                return Err(CoreError::config(format!(
                    "rule {condition}: invalid prefix bounds {ge}-{le}"
                )));
            }
            let rule = IpRule {
                network: network.trunc(),
                ge,
                le,
                action: spec.action,
                commands,
            };
            return Ok(match network {
                IpNet::V4(_) => Self::Ipv4(rule),
                IpNet::V6(_) => Self::Ipv6(rule),
            });
        }

        let source = if condition == "*" { ".+" } else { condition };
        let regex = RegexBuilder::new(&format!("^(?:{source})"))
            .case_insensitive(true)
            .build()
            .map_err(|e| CoreError::config(format!("rule pattern {condition:?}: {e}")))?;
        Ok(Self::Pattern(PatternRule {
            pattern: condition.to_owned(),
            action: spec.action,
            commands,
            regex,
        }))
    }

    pub fn commands(&self) -> &[String] {
        match self {
            Self::Ipv4(r) | Self::Ipv6(r) => &r.commands,
            Self::Pattern(r) => &r.commands,
            Self::Unconditional { commands } => commands,
        }
    }

    pub fn condition(&self) -> String {
        match self {
            Self::Ipv4(r) | Self::Ipv6(r) => r.network.to_string(),
            Self::Pattern(r) => r.pattern.clone(),
            Self::Unconditional { .. } => "*".into(),
        }
    }

    pub fn action(&self) -> RuleAction {
        match self {
            Self::Ipv4(r) | Self::Ipv6(r) => r.action,
            Self::Pattern(r) => r.action,
            Self::Unconditional { .. } => RuleAction::Permit,
        }
    }

    /// Evaluate every target against this rule.
    ///
    /// A failure from any target is terminal for the whole directive.
    pub fn evaluate<'a>(&'a self, targets: &[String]) -> Result<RuleOutcome<'a>, CoreError> {
        match self {
            Self::Ipv4(rule) | Self::Ipv6(rule) => {
                let mut all_member = true;
                for target in targets {
                    let net = parse_target_net(target)?;
                    if !rule.network.contains(&net) {
                        all_member = false;
                        continue;
                    }
                    let len = net.prefix_len();
                    if len < rule.ge || len > rule.le {
                        return Err(CoreError::validation(
                            ValidationFailure::OutOfRange,
                            target,
                            format!(
                                "{target}: prefix length out of range {}-{}",
                                rule.ge, rule.le
                            ),
                        ));
                    }
                    if rule.action == RuleAction::Deny {
                        return Err(CoreError::validation(
                            ValidationFailure::Denied,
                            target,
                            format!("{target}: denied, member of {}", rule.network),
                        ));
                    }
                }
                if all_member {
                    debug!(condition = %rule.network, "ip rule matched");
                    Ok(RuleOutcome::Matched(&rule.commands))
                } else {
                    Ok(RuleOutcome::Skip)
                }
            }
            Self::Pattern(rule) => {
                if !targets.iter().all(|t| rule.regex.is_match(t)) {
                    return Ok(RuleOutcome::Skip);
                }
                if rule.action == RuleAction::Deny {
                    let joined = targets.join(" ");
                    return Err(CoreError::validation(
                        ValidationFailure::Denied,
                        &joined,
                        format!("{joined}: denied by pattern {}", rule.pattern),
                    ));
                }
                debug!(pattern = %rule.pattern, "pattern rule matched");
                Ok(RuleOutcome::Matched(&rule.commands))
            }
            Self::Unconditional { commands } => Ok(RuleOutcome::Matched(commands)),
        }
    }
}

/// Parse a target as a network, treating bare addresses as host routes.
pub fn parse_target_net(target: &str) -> Result<IpNet, CoreError> {
    let trimmed = target.trim();
    if let Ok(net) = trimmed.parse::<IpNet>() {
        return Ok(net);
    }
    trimmed
        .parse::<IpAddr>()
        .map(IpNet::from)
        .map_err(|_| {
            CoreError::validation(
                ValidationFailure::Format,
                target,
                format!("{target} is not a valid IP address or prefix"),
            )
        })
}

// ── Command synthesis ──
//
// Substitutes the validated target, the VRF name and the per-AFI source
// addresses into a rule's command templates. One command per template.

use crate::config::{Device, Vrf};
use crate::error::CoreError;
use crate::platform::Platform;

use super::{Directive, QueryType};

const PLACEHOLDER_TARGET: &str = "{target}";
const PLACEHOLDER_SOURCE4: &str = "{source4}";
const PLACEHOLDER_SOURCE6: &str = "{source6}";
const PLACEHOLDER_VRF: &str = "{vrf}";

/// Turn a Cisco-style `_` AS-path separator into the Junos equivalent.
fn junos_aspath(target: &str) -> String {
    target.replace('_', ".* ")
}

/// Render the target string the device should see.
fn render_target(directive: &Directive, device: &Device, targets: &[String]) -> String {
    let joined = targets.join(&directive.multiple_separator);
    if device.platform == Platform::Juniper && directive.is_query_type(QueryType::BgpAspath) {
        junos_aspath(&joined)
    } else {
        joined
    }
}

fn source<'a>(
    value: Option<&'a str>,
    placeholder: &str,
    device: &Device,
    vrf: &Vrf,
) -> Result<&'a str, CoreError> {
    value.ok_or_else(|| {
        CoreError::config(format!(
            "{} has no {} address for VRF {}",
            device.display_name,
            placeholder.trim_matches(|c| c == '{' || c == '}'),
            vrf.name
        ))
    })
}

/// Instantiate `templates` for the validated `targets`.
pub fn synthesize(
    directive: &Directive,
    templates: &[String],
    targets: &[String],
    device: &Device,
    vrf: &Vrf,
) -> Result<Vec<String>, CoreError> {
    let target = render_target(directive, device, targets);
    templates
        .iter()
        .map(|template| substitute(template, &target, device, vrf))
        .collect()
}

/// Expand placeholders in one left-to-right pass. Substituted values are
/// never rescanned, so a target containing `{vrf}` stays literal.
fn substitute(
    template: &str,
    target: &str,
    device: &Device,
    vrf: &Vrf,
) -> Result<String, CoreError> {
    let mut command = String::with_capacity(template.len() + target.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        command.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find('}') else {
            command.push_str(tail);
            return Ok(command);
        };
        let placeholder = &tail[..=end];
        match placeholder {
            PLACEHOLDER_TARGET => command.push_str(target),
            PLACEHOLDER_VRF => command.push_str(&vrf.name),
            PLACEHOLDER_SOURCE4 => {
                command.push_str(source(vrf.source4.as_deref(), placeholder, device, vrf)?);
            }
            PLACEHOLDER_SOURCE6 => {
                command.push_str(source(vrf.source6.as_deref(), placeholder, device, vrf)?);
            }
            _ => {
                command.push('{');
                rest = &tail[1..];
                continue;
            }
        }
        rest = &tail[end + 1..];
    }
    command.push_str(rest);
    Ok(command)
}

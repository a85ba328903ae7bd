// BGP community target validation.

use std::net::Ipv4Addr;

use crate::directive::QueryType;
use crate::plugin::{Applicability, InputContext, InputPlugin};

const MAX_16: u64 = 0xFFFF;
const MAX_32: u64 = 0xFFFF_FFFF;
const EXTENDED_TYPES: [&str; 2] = ["target", "origin"];

fn fits(value: &str, max: u64) -> bool {
    value.parse::<u64>().is_ok_and(|v| v <= max)
}

fn parts(value: &str) -> Vec<&str> {
    value.split(':').filter(|p| !p.is_empty()).collect()
}

/// `4294967295`
fn is_decimal(value: &str) -> bool {
    fits(value, MAX_32)
}

/// `65000:1`, `65000:4294967295`, `4200000000:1`, `192.0.2.1:100`, optionally
/// prefixed with an extended community type.
fn is_standard_or_extended(value: &str) -> bool {
    let mut parts = parts(value);
    if parts.len() == 3 {
        if !parts
            .first()
            .is_some_and(|t| EXTENDED_TYPES.contains(&t.to_lowercase().as_str()))
        {
            return false;
        }
        parts.remove(0);
    }
    let [high, low] = parts.as_slice() else {
        return false;
    };
    (fits(high, MAX_16) && fits(low, MAX_16))
        || (fits(high, MAX_32) && fits(low, MAX_16))
        || (fits(high, MAX_16) && fits(low, MAX_32))
        || (high.parse::<Ipv4Addr>().is_ok() && fits(low, MAX_16))
}

/// `65000:65001:65002`
fn is_large(value: &str) -> bool {
    let parts = parts(value);
    parts.len() == 3 && parts.iter().all(|p| fits(p, MAX_32))
}

pub fn is_valid_community(value: &str) -> bool {
    is_decimal(value) || is_standard_or_extended(value) || is_large(value)
}

/// Rejects `bgp_community` targets that are not a community in any known form.
#[derive(Debug, Default)]
pub struct CommunityInput;

impl InputPlugin for CommunityInput {
    fn name(&self) -> &str {
        "bgp_community"
    }

    fn applicability(&self) -> Applicability {
        Applicability::common()
    }

    fn builtin(&self) -> bool {
        true
    }

    fn validate(&self, ctx: &InputContext<'_>, target: &str) -> Result<(), String> {
        if !ctx.directive.is_query_type(QueryType::BgpCommunity) || is_valid_community(target) {
            return Ok(());
        }
        Err(format!("{target} is not a valid BGP community"))
    }
}

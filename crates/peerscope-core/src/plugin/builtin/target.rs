// Platform target rewrites for route lookups.

use std::net::IpAddr;

use ipnet::IpNet;

use crate::directive::QueryType;
use crate::platform::{Platform, TargetFormat};
use crate::plugin::{Applicability, InputContext, InputPlugin};

fn is_route_lookup(ctx: &InputContext<'_>) -> bool {
    ctx.directive.is_query_type(QueryType::BgpRoute)
}

/// VRP expects `display bgp routing-table 192.0.2.0 24`.
#[derive(Debug, Default)]
pub struct HuaweiRouteTarget;

impl InputPlugin for HuaweiRouteTarget {
    fn name(&self) -> &str {
        "huawei_route_target"
    }

    fn applicability(&self) -> Applicability {
        Applicability::platforms(&[Platform::Huawei])
    }

    fn builtin(&self) -> bool {
        true
    }

    fn transform(&self, ctx: &InputContext<'_>, target: String) -> String {
        if ctx.device.platform.target_format() != TargetFormat::Huawei || !is_route_lookup(ctx) {
            return target;
        }
        match target.split_once('/') {
            Some((address, len)) => format!("{address} {len}"),
            None => target,
        }
    }
}

/// Widen a host to its /24 or /48 so nearby clients share a cache entry.
#[derive(Debug, Default)]
pub struct MikrotikNormalizeTarget;

fn widen(address: IpAddr) -> Option<IpNet> {
    let len = match address {
        IpAddr::V4(_) => 24,
        IpAddr::V6(_) => 48,
    };
    IpNet::new(address, len).ok().map(|net| net.trunc())
}

impl InputPlugin for MikrotikNormalizeTarget {
    fn name(&self) -> &str {
        "mikrotik_normalize_target"
    }

    fn applicability(&self) -> Applicability {
        Applicability::platforms(&[Platform::MikrotikRouteros, Platform::MikrotikSwitchos])
    }

    fn builtin(&self) -> bool {
        true
    }

    fn transform(&self, ctx: &InputContext<'_>, target: String) -> String {
        if !ctx.device.platform.is_mikrotik() || !is_route_lookup(ctx) {
            return target;
        }
        match target.trim().parse::<IpAddr>().ok().and_then(widen) {
            Some(net) => net.to_string(),
            None => target,
        }
    }
}

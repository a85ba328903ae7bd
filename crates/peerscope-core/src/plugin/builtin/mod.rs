// ── Built-in plugins ──
//
// Registration order matters only within an ordering group: the RouterOS
// cleaner is registered before the parsers so it runs first on MikroTik
// output, and enrichment (common) always runs after every parser.

mod community;
mod enrich;
mod mikrotik;
mod parse;
mod target;

use std::sync::Arc;

use crate::normalize::bgp;
use crate::normalize::traceroute;

use super::PluginRegistry;

pub use community::{CommunityInput, is_valid_community};
pub use enrich::{BgpRouteEnrichment, TracerouteEnrichment};
pub use mikrotik::MikrotikGarbage;
pub use parse::{BgpTablePlugin, TraceroutePlugin};
pub use target::{HuaweiRouteTarget, MikrotikNormalizeTarget};

pub fn register(registry: &mut PluginRegistry) {
    registry.register_input(Arc::new(CommunityInput));
    registry.register_input(Arc::new(HuaweiRouteTarget));
    registry.register_input(Arc::new(MikrotikNormalizeTarget));

    registry.register_output(Arc::new(MikrotikGarbage));
    for parser in bgp::PARSERS {
        registry.register_output(Arc::new(BgpTablePlugin::new(parser)));
    }
    for parser in traceroute::PARSERS {
        registry.register_output(Arc::new(TraceroutePlugin::new(parser)));
    }
    registry.register_output(Arc::new(TraceroutePlugin::new(&traceroute::GENERIC)));
    registry.register_output(Arc::new(TracerouteEnrichment));
    registry.register_output(Arc::new(BgpRouteEnrichment));
}

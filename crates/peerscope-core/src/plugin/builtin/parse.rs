// Output plugins wrapping the vendor parsers.
//
// BGP parsers bind to each platform's `*_table` directives, so only the
// structured command variants are parsed. Traceroute parsers bind to the
// platform's traceroute directive and parse when structured output was asked
// for. Either can be attached to a user directive by naming it in `plugins`.

use async_trait::async_trait;
use tracing::debug;

use crate::directive::{QueryType, builtin_id};
use crate::error::CoreError;
use crate::model::OutputData;
use crate::normalize::bgp::BgpParser;
use crate::normalize::policy;
use crate::normalize::traceroute::TracerouteParser;
use crate::platform::Platform;
use crate::plugin::{Applicability, OutputContext, OutputPlugin};

/// Distinct directive families of `platforms`, in order.
fn families(platforms: &[Platform]) -> Vec<&'static str> {
    let mut families: Vec<&'static str> = Vec::new();
    for family in platforms.iter().map(|p| p.directive_family()) {
        if !families.contains(&family) {
            families.push(family);
        }
    }
    families
}

fn table_ids(platforms: &[Platform]) -> Vec<String> {
    families(platforms)
        .into_iter()
        .flat_map(|family| {
            [QueryType::BgpRoute, QueryType::BgpAspath, QueryType::BgpCommunity]
                .map(|qt| format!("{}_table", builtin_id(family, qt)))
        })
        .collect()
}

fn traceroute_ids(platforms: &[Platform]) -> Vec<String> {
    families(platforms)
        .into_iter()
        .map(|family| builtin_id(family, QueryType::Traceroute))
        .collect()
}

// ── BGP ──────────────────────────────────────────────────────────────

/// Parses raw BGP output and applies the structured policy to every route.
#[derive(Debug)]
pub struct BgpTablePlugin {
    parser: &'static BgpParser,
}

impl BgpTablePlugin {
    pub fn new(parser: &'static BgpParser) -> Self {
        Self { parser }
    }
}

#[async_trait]
impl OutputPlugin for BgpTablePlugin {
    fn name(&self) -> &str {
        self.parser.name
    }

    fn applicability(&self) -> Applicability {
        Applicability::platforms(self.parser.platforms)
            .with_directives(table_ids(self.parser.platforms))
    }

    fn builtin(&self) -> bool {
        true
    }

    async fn process(
        &self,
        ctx: &OutputContext<'_>,
        output: OutputData,
    ) -> Result<OutputData, CoreError> {
        let OutputData::Raw(outputs) = output else {
            return Ok(output);
        };
        let is_bgp = ctx.directive.query_type.is_some_and(QueryType::is_bgp);
        if !ctx.structured || !is_bgp {
            return Ok(OutputData::Raw(outputs));
        }

        let mut table = self.parser.parse_all(&outputs)?;
        policy::apply(&mut table, ctx.policy, ctx.collaborators.rpki.as_deref()).await?;
        debug!(
            plugin = self.name(),
            device = %ctx.device.name,
            routes = table.count,
            "built route table"
        );
        Ok(OutputData::BgpTable(table))
    }
}

// ── Traceroute ───────────────────────────────────────────────────────

/// Parses raw traceroute output into hops.
#[derive(Debug)]
pub struct TraceroutePlugin {
    parser: &'static TracerouteParser,
}

impl TraceroutePlugin {
    pub fn new(parser: &'static TracerouteParser) -> Self {
        Self { parser }
    }

    /// Platforms this parser serves, including the fallback's leftovers.
    fn platforms(&self) -> Vec<Platform> {
        Platform::all()
            .filter(|p| TracerouteParser::for_platform(*p).name == self.parser.name)
            .collect()
    }
}

#[async_trait]
impl OutputPlugin for TraceroutePlugin {
    fn name(&self) -> &str {
        self.parser.name
    }

    fn applicability(&self) -> Applicability {
        let platforms = self.platforms();
        Applicability::platforms(&platforms).with_directives(traceroute_ids(&platforms))
    }

    fn builtin(&self) -> bool {
        true
    }

    async fn process(
        &self,
        ctx: &OutputContext<'_>,
        output: OutputData,
    ) -> Result<OutputData, CoreError> {
        let OutputData::Raw(outputs) = output else {
            return Ok(output);
        };
        if !ctx.structured || !ctx.directive.is_query_type(QueryType::Traceroute) {
            return Ok(OutputData::Raw(outputs));
        }

        let target = ctx.targets.join(" ");
        let result = self
            .parser
            .parse_all(&outputs, &target, &ctx.device.display_name)?;
        Ok(OutputData::Traceroute(result))
    }
}

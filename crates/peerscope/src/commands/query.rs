//! Query and validate handlers, plus rendering of query results.

use std::fmt::Write as _;
use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tabled::Tabled;

use peerscope_core::{
    BgpRoute, BgpRouteTable, Gateway, OutputData, Query, QueryOutput, QueryType, RpkiState,
    TracerouteHop, TracerouteResult,
};

use crate::cli::{GlobalOpts, QueryArgs};
use crate::error::CliError;
use crate::output::{self, Paint};

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct RouteRow {
    #[tabled(rename = "Prefix")]
    prefix: String,
    #[tabled(rename = "Best")]
    active: String,
    #[tabled(rename = "AS Path")]
    as_path: String,
    #[tabled(rename = "Next Hop")]
    next_hop: String,
    #[tabled(rename = "LP")]
    local_pref: i64,
    #[tabled(rename = "MED")]
    med: i64,
    #[tabled(rename = "Age")]
    age: String,
    #[tabled(rename = "Communities")]
    communities: String,
    #[tabled(rename = "RPKI")]
    rpki: String,
}

/// Next-hop address, followed by its ASN and org once enriched.
fn next_hop_label(route: &BgpRoute) -> String {
    match (&route.next_hop_asn, &route.next_hop_org) {
        (Some(asn), Some(org)) => format!("{} (AS{asn} {org})", route.next_hop),
        (Some(asn), None) => format!("{} (AS{asn})", route.next_hop),
        _ => route.next_hop.clone(),
    }
}

fn route_row(route: &BgpRoute, paint: Paint) -> RouteRow {
    let rpki = route.rpki_state.to_string();
    RouteRow {
        prefix: route.prefix.clone(),
        active: if route.active { paint.good("yes") } else { String::new() },
        as_path: route
            .as_path
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(" "),
        next_hop: next_hop_label(route),
        local_pref: route.local_preference,
        med: route.med,
        age: format_age(route.age),
        communities: route.communities.join("\n"),
        rpki: match route.rpki_state {
            RpkiState::Valid => paint.good(&rpki),
            RpkiState::Invalid => paint.bad(&rpki),
            RpkiState::Unknown => paint.warn(&rpki),
            RpkiState::Unverified => paint.dim(&rpki),
        },
    }
}

#[derive(Tabled)]
struct HopRow {
    #[tabled(rename = "#")]
    hop: u32,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Hostname")]
    hostname: String,
    #[tabled(rename = "ASN")]
    asn: String,
    #[tabled(rename = "Loss")]
    loss: String,
    #[tabled(rename = "Best")]
    best: String,
    #[tabled(rename = "Avg")]
    avg: String,
    #[tabled(rename = "Worst")]
    worst: String,
}

fn hop_row(hop: &TracerouteHop, paint: Paint) -> HopRow {
    let loss = hop.loss_pct.map(|l| format!("{l}%")).unwrap_or_default();
    HopRow {
        hop: hop.hop_number,
        address: hop.ip_display().map_or_else(|| paint.dim("*"), str::to_owned),
        hostname: hop.hostname.clone().unwrap_or_default(),
        asn: match hop.asn.as_deref() {
            Some("IXP") => "IXP".into(),
            Some(asn) => format!("AS{asn}"),
            None => String::new(),
        },
        loss: match hop.loss_pct {
            Some(100) => paint.bad(&loss),
            Some(0) | None => loss,
            Some(_) => paint.warn(&loss),
        },
        best: format_rtt(hop.best_rtt),
        avg: format_rtt(hop.avg_rtt()),
        worst: format_rtt(hop.worst_rtt),
    }
}

// ── Formatting helpers ──────────────────────────────────────────────

fn format_age(secs: i64) -> String {
    if secs < 0 {
        return "-".into();
    }
    let (days, rem) = (secs / 86_400, secs % 86_400);
    let (hours, rem) = (rem / 3_600, rem % 3_600);
    let (minutes, seconds) = (rem / 60, rem % 60);
    if days > 0 {
        format!("{days}d{hours}h")
    } else if hours > 0 {
        format!("{hours}h{minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

fn format_rtt(rtt: Option<f64>) -> String {
    rtt.map(|ms| format!("{ms:.1} ms")).unwrap_or_default()
}

fn render_routes(table: &BgpRouteTable, paint: Paint) -> String {
    let rows: Vec<RouteRow> = table.routes.iter().map(|r| route_row(r, paint)).collect();
    let noun = if table.count == 1 { "route" } else { "routes" };
    format!(
        "{}\n{}",
        paint.dim(&format!("VRF {} · {} {noun}", table.vrf, table.count)),
        output::render_table(&rows)
    )
}

fn render_hops(result: &TracerouteResult, paint: Paint) -> String {
    let rows: Vec<HopRow> = result.hops.iter().map(|h| hop_row(h, paint)).collect();
    let mut out = format!(
        "{}\n{}",
        paint.dim(&format!(
            "traceroute to {} from {} · {} hops",
            result.target,
            result.source,
            result.hops.len()
        )),
        output::render_table(&rows)
    );
    for (asn, org) in &result.asn_organizations {
        let _ = write!(out, "\nAS{asn}  {} ({})", org.name, org.country);
    }
    out
}

fn render_detail(result: &QueryOutput, paint: Paint) -> String {
    let body = match &result.output {
        OutputData::Raw(outputs) => outputs.join("\n\n"),
        OutputData::BgpTable(table) => render_routes(table, paint),
        OutputData::Traceroute(trace) => render_hops(trace, paint),
    };
    let cached = if result.cached { " · cached" } else { "" };
    format!(
        "{body}\n{}",
        paint.dim(&format!(
            "{} · {} ms{cached}",
            result.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            result.runtime_ms
        ))
    )
}

fn render_plain(result: &QueryOutput) -> String {
    match &result.output {
        OutputData::Raw(outputs) => outputs.join("\n"),
        OutputData::BgpTable(table) => table
            .routes
            .iter()
            .map(|r| format!("{} {} {}", r.prefix, r.next_hop, r.rpki_state))
            .collect::<Vec<_>>()
            .join("\n"),
        OutputData::Traceroute(trace) => trace
            .hops
            .iter()
            .map(|h| format!("{} {}", h.hop_number, h.ip_display().unwrap_or("*")))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

// ── Handlers ────────────────────────────────────────────────────────

fn build_query(gateway: &Gateway, args: &QueryArgs) -> Result<Query, CliError> {
    if gateway.config().device(&args.device).is_none() {
        return Err(CliError::NotFound {
            resource_type: "device".into(),
            identifier: args.device.clone(),
            list_command: "devices list".into(),
        });
    }
    if gateway.directives().get(&args.directive).is_none()
        && args.directive.parse::<QueryType>().is_err()
    {
        return Err(CliError::NotFound {
            resource_type: "directive".into(),
            identifier: args.directive.clone(),
            list_command: format!("directives list --device {}", args.device),
        });
    }

    let mut query = Query::new(&args.device, &args.directive, String::new())
        .with_targets(args.targets.clone());
    if let Some(ref vrf) = args.vrf {
        query = query.with_vrf(vrf);
    }
    if args.raw {
        query = query.raw();
    }
    Ok(query)
}

fn spinner(global: &GlobalOpts, device: &str) -> Option<ProgressBar> {
    if global.quiet || !std::io::stderr().is_terminal() {
        return None;
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} {elapsed}") {
        bar.set_style(style);
    }
    bar.set_message(format!("querying {device}"));
    bar.enable_steady_tick(Duration::from_millis(100));
    Some(bar)
}

/// `peerscope query <device> <directive> <target>...`
pub async fn run(gateway: &Gateway, args: &QueryArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let query = build_query(gateway, args)?;
    let bar = spinner(global, &args.device);
    let result = gateway.execute(query).await;
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    let result = result?;

    let paint = Paint::new(&global.color);
    let out = output::render_single(
        &global.output,
        &result,
        |r| render_detail(r, paint),
        render_plain,
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[derive(Serialize)]
struct PlanView {
    device: String,
    directive: String,
    targets: Vec<String>,
    vrf: String,
    fingerprint: String,
    commands: Vec<String>,
}

fn plan_detail(plan: &PlanView) -> String {
    let mut lines = vec![
        format!("Device:      {}", plan.device),
        format!("Directive:   {}", plan.directive),
        format!("Targets:     {}", plan.targets.join(", ")),
        format!("VRF:         {}", plan.vrf),
        format!("Fingerprint: {}", plan.fingerprint),
        "Commands:".to_owned(),
    ];
    lines.extend(plan.commands.iter().map(|c| format!("  {c}")));
    lines.join("\n")
}

/// `peerscope validate ...`: everything short of connecting.
pub fn validate(gateway: &Gateway, args: &QueryArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let query = build_query(gateway, args)?;
    let plan = gateway.validate(&query)?;
    let view = PlanView {
        device: plan.device.name.clone(),
        directive: plan.directive.id.clone(),
        targets: plan.targets,
        vrf: plan.vrf,
        fingerprint: plan.fingerprint,
        commands: plan.commands,
    };
    let out = output::render_single(&global.output, &view, plan_detail, |p| {
        p.commands.join("\n")
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ages_are_compact() {
        assert_eq!(format_age(-1), "-");
        assert_eq!(format_age(42), "42s");
        assert_eq!(format_age(125), "2m5s");
        assert_eq!(format_age(7_380), "2h3m");
        assert_eq!(format_age(200_000), "2d7h");
    }

    #[test]
    fn enriched_next_hops_show_the_announcer() {
        let mut route = BgpRoute {
            prefix: "1.1.1.0/24".into(),
            active: true,
            age: 0,
            weight: 0,
            med: 0,
            local_preference: 100,
            as_path: vec![174, 13335],
            communities: vec![],
            next_hop: "192.0.2.254".into(),
            source_as: 174,
            source_rid: String::new(),
            peer_rid: String::new(),
            rpki_state: RpkiState::Unverified,
            next_hop_asn: None,
            next_hop_org: None,
        };
        assert_eq!(next_hop_label(&route), "192.0.2.254");

        route.next_hop_asn = Some("174".into());
        assert_eq!(next_hop_label(&route), "192.0.2.254 (AS174)");

        route.next_hop_org = Some("Cogent".into());
        assert_eq!(next_hop_label(&route), "192.0.2.254 (AS174 Cogent)");
    }

    #[test]
    fn rtts_keep_one_decimal() {
        assert_eq!(format_rtt(Some(1.234)), "1.2 ms");
        assert_eq!(format_rtt(None), "");
    }
}

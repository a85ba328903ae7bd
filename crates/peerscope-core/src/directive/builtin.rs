// ── Built-in directives ──
//
// Every platform family ships the five standard query types. Families with a
// structured parser also ship `_table` variants that ask the device for
// machine-readable output, linked from the text directive via `table_output`.

use crate::platform::Platform;

use super::rule::RuleSpec;
use super::{DirectiveSpec, FieldType, QueryType};

/// `[ipv4, ipv6]` command templates.
type Pair = [&'static str; 2];

struct TableCommands {
    route: Pair,
    aspath: Pair,
    community: Pair,
}

struct Profile {
    family: &'static str,
    platforms: &'static [Platform],
    route: Pair,
    aspath: Pair,
    community: Pair,
    ping: Pair,
    traceroute: Pair,
    /// Input/output plugins named by every directive of the family.
    plugins: &'static [&'static str],
    table: Option<TableCommands>,
}

const PROFILES: &[Profile] = &[
    Profile {
        family: "juniper",
        platforms: &[Platform::Juniper],
        route: [
            "show route protocol bgp table inet.0 {target} detail",
            "show route protocol bgp table inet6.0 {target} detail",
        ],
        aspath: [
            r#"show route protocol bgp table inet.0 aspath-regex "{target}""#,
            r#"show route protocol bgp table inet6.0 aspath-regex "{target}""#,
        ],
        community: [
            r#"show route protocol bgp table inet.0 community "{target}" detail"#,
            r#"show route protocol bgp table inet6.0 community "{target}" detail"#,
        ],
        ping: [
            "ping inet {target} count 5 source {source4}",
            "ping inet6 {target} count 5 source {source6}",
        ],
        traceroute: [
            "traceroute inet {target} wait 1 source {source4}",
            "traceroute inet6 {target} wait 1 source {source6}",
        ],
        plugins: &[],
        table: Some(TableCommands {
            route: [
                "show route protocol bgp table inet.0 {target} best detail | display xml",
                "show route protocol bgp table inet6.0 {target} best detail | display xml",
            ],
            aspath: [
                r#"show route protocol bgp table inet.0 aspath-regex "{target}" detail | display xml"#,
                r#"show route protocol bgp table inet6.0 aspath-regex "{target}" detail | display xml"#,
            ],
            community: [
                "show route protocol bgp table inet.0 community {target} detail | display xml",
                "show route protocol bgp table inet6.0 community {target} detail | display xml",
            ],
        }),
    },
    Profile {
        family: "arista_eos",
        platforms: &[Platform::AristaEos],
        route: ["show ip bgp {target}", "show ipv6 bgp {target}"],
        aspath: ["show ip bgp regexp {target}", "show ipv6 bgp regexp {target}"],
        community: [
            "show ip bgp community {target}",
            "show ipv6 bgp community {target}",
        ],
        ping: [
            "ping ip {target} source {source4}",
            "ping ipv6 {target} source {source6}",
        ],
        traceroute: [
            "traceroute ip {target} source {source4}",
            "traceroute ipv6 {target} source {source6}",
        ],
        plugins: &[],
        table: Some(TableCommands {
            route: ["show ip bgp {target} | json", "show ipv6 bgp {target} | json"],
            aspath: [
                "show ip bgp regexp {target} | json",
                "show ipv6 bgp regexp {target} | json",
            ],
            community: [
                "show ip bgp community {target} | json",
                "show ipv6 bgp community {target} | json",
            ],
        }),
    },
    Profile {
        family: "frr",
        platforms: &[Platform::Frr, Platform::FrrAgent],
        route: [
            r#"vtysh -c "show bgp ipv4 unicast {target}""#,
            r#"vtysh -c "show bgp ipv6 unicast {target}""#,
        ],
        aspath: [
            r#"vtysh -c "show bgp ipv4 unicast regexp {target}""#,
            r#"vtysh -c "show bgp ipv6 unicast regexp {target}""#,
        ],
        community: [
            r#"vtysh -c "show bgp ipv4 unicast community {target}""#,
            r#"vtysh -c "show bgp ipv6 unicast community {target}""#,
        ],
        ping: [
            "ping -4 -c 5 -I {source4} {target}",
            "ping -6 -c 5 -I {source6} {target}",
        ],
        traceroute: [
            "traceroute -4 -w 1 -q 1 -s {source4} {target}",
            "traceroute -6 -w 1 -q 1 -s {source6} {target}",
        ],
        plugins: &[],
        table: Some(TableCommands {
            route: [
                r#"vtysh -c "show bgp ipv4 unicast {target} json""#,
                r#"vtysh -c "show bgp ipv6 unicast {target} json""#,
            ],
            aspath: [
                r#"vtysh -c "show bgp ipv4 unicast regexp {target} json""#,
                r#"vtysh -c "show bgp ipv6 unicast regexp {target} json""#,
            ],
            community: [
                r#"vtysh -c "show bgp ipv4 unicast community {target} json""#,
                r#"vtysh -c "show bgp ipv6 unicast community {target} json""#,
            ],
        }),
    },
    Profile {
        family: "huawei",
        platforms: &[Platform::Huawei],
        route: [
            "display bgp routing-table {target} | no-more",
            "display bgp ipv6 routing-table {target} | no-more",
        ],
        aspath: [
            "display bgp routing-table regular-expression {target}",
            "display bgp ipv6 routing-table regular-expression {target}",
        ],
        community: [
            "display bgp routing-table community {target}",
            "display bgp ipv6 routing-table community {target}",
        ],
        ping: [
            "ping -c 5 -a {source4} {target}",
            "ping ipv6 -c 5 -a {source6} {target}",
        ],
        traceroute: [
            "tracert -w 500 -q 1 -f 1 -a {source4} {target}",
            "tracert ipv6 -w 500 -q 1 -f 1 -a {source6} {target}",
        ],
        plugins: &["huawei_route_target"],
        table: Some(TableCommands {
            route: [
                "display bgp routing-table {target} | no-more",
                "display bgp ipv6 routing-table {target} | no-more",
            ],
            aspath: [
                r#"display bgp routing-table regular-expression "{target}""#,
                r#"display bgp ipv6 routing-table regular-expression "{target}""#,
            ],
            community: [
                r#"display bgp routing-table community "{target}""#,
                r#"display bgp ipv6 routing-table community "{target}""#,
            ],
        }),
    },
    Profile {
        family: "mikrotik",
        platforms: &[Platform::MikrotikRouteros, Platform::MikrotikSwitchos],
        route: [
            "routing route print detail without-paging where {target} in dst-address bgp and dst-address !=0.0.0.0/0",
            "routing route print detail without-paging where {target} in dst-address bgp and dst-address !=::/0",
        ],
        aspath: [
            "ip route print where bgp-as-path={target}",
            "ipv6 route print where bgp-as-path={target}",
        ],
        community: [
            "ip route print where bgp-communities={target}",
            "ipv6 route print where bgp-communities={target}",
        ],
        ping: [
            "ping src-address={source4} count=5 {target}",
            "ping src-address={source6} count=5 {target}",
        ],
        traceroute: [
            "tool traceroute src-address={source4} timeout=1 duration=30 count=3 {target}",
            "tool traceroute src-address={source6} timeout=1 duration=30 count=3 {target}",
        ],
        plugins: &["mikrotik_normalize_target", "mikrotik_garbage"],
        table: Some(TableCommands {
            route: [
                "routing route print detail without-paging where {target} in dst-address bgp and dst-address !=0.0.0.0/0",
                "routing route print detail without-paging where {target} in dst-address bgp and dst-address !=::/0",
            ],
            aspath: [
                "routing route print detail without-paging where bgp-as-path~{target}",
                "",
            ],
            community: [
                "routing route print detail without-paging where bgp-communities~{target}",
                "",
            ],
        }),
    },
    Profile {
        family: "cisco_ios",
        platforms: &[Platform::CiscoIos],
        route: [
            "show bgp ipv4 unicast {target} | exclude pathid:|Epoch",
            "show bgp ipv6 unicast {target} | exclude pathid:|Epoch",
        ],
        aspath: [
            r#"show bgp ipv4 unicast quote-regexp "{target}""#,
            r#"show bgp ipv6 unicast quote-regexp "{target}""#,
        ],
        community: [
            "show bgp ipv4 unicast community {target}",
            "show bgp ipv6 unicast community {target}",
        ],
        ping: [
            "ping {target} repeat 5 source {source4}",
            "ping ipv6 {target} repeat 5 source {source6}",
        ],
        traceroute: [
            "traceroute {target} timeout 1 probe 2 source {source4}",
            "traceroute ipv6 {target} timeout 1 probe 2 source {source6}",
        ],
        plugins: &[],
        table: None,
    },
];

/// Built-in id for a family and query type, e.g. `juniper_bgp_route`.
pub fn builtin_id(family: &str, query_type: QueryType) -> String {
    format!("{family}_{query_type}")
}

fn table_id(family: &str, query_type: QueryType) -> String {
    format!("{}_table", builtin_id(family, query_type))
}

fn commands(pair: Pair) -> Vec<&'static str> {
    pair.into_iter().filter(|c| !c.is_empty()).collect()
}

/// Route lookups and pings pick the rule by address family.
fn by_family(pair: Pair) -> Vec<RuleSpec> {
    vec![
        RuleSpec::permit("0.0.0.0/0", &[pair[0]]),
        RuleSpec::permit("::/0", &[pair[1]]),
    ]
}

/// Regex-style targets run against both address families.
fn any_target(pair: Pair) -> Vec<RuleSpec> {
    vec![RuleSpec::permit("*", &commands(pair))]
}

fn spec(
    profile: &Profile,
    id: String,
    query_type: QueryType,
    rules: Vec<RuleSpec>,
    table_output: Option<String>,
) -> DirectiveSpec {
    let (name, description) = match query_type {
        QueryType::BgpRoute => ("BGP Route", "IP Address or Prefix"),
        QueryType::BgpAspath => ("BGP AS Path", "AS Path Regular Expression"),
        QueryType::BgpCommunity => ("BGP Community", "BGP Community String"),
        QueryType::Ping => ("Ping", "IP Address"),
        QueryType::Traceroute => ("Traceroute", "IP Address"),
    };
    let field = match query_type {
        QueryType::BgpAspath | QueryType::BgpCommunity => FieldType::Text {
            description: Some(description.into()),
        },
        QueryType::BgpRoute | QueryType::Ping | QueryType::Traceroute => FieldType::Ip {
            description: Some(description.into()),
        },
    };
    DirectiveSpec {
        id,
        name: name.into(),
        query_type: Some(query_type),
        rules,
        field,
        plugins: profile.plugins.iter().map(|p| (*p).to_owned()).collect(),
        table_output,
        platforms: profile.platforms.to_vec(),
        ..DirectiveSpec::default()
    }
}

/// Every built-in directive, text variants first.
pub fn builtin_specs() -> Vec<DirectiveSpec> {
    let mut specs = Vec::new();
    for profile in PROFILES {
        let family = profile.family;
        let linked = |qt: QueryType| profile.table.as_ref().map(|_| table_id(family, qt));

        let text = [
            (QueryType::BgpRoute, by_family(profile.route)),
            (QueryType::BgpAspath, any_target(profile.aspath)),
            (QueryType::BgpCommunity, any_target(profile.community)),
            (QueryType::Ping, by_family(profile.ping)),
            (QueryType::Traceroute, by_family(profile.traceroute)),
        ];
        for (qt, rules) in text {
            let table_output = if qt.is_bgp() { linked(qt) } else { None };
            specs.push(spec(profile, builtin_id(family, qt), qt, rules, table_output));
        }

        if let Some(table) = &profile.table {
            let structured = [
                (QueryType::BgpRoute, by_family(table.route)),
                (QueryType::BgpAspath, any_target(table.aspath)),
                (QueryType::BgpCommunity, any_target(table.community)),
            ];
            for (qt, rules) in structured {
                let mut table_spec = spec(profile, table_id(family, qt), qt, rules, None);
                table_spec.name = format!("{} (table)", table_spec.name);
                specs.push(table_spec);
            }
        }
    }
    specs
}

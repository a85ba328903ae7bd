#![allow(clippy::unwrap_used)]

use std::time::Duration;

use figment::Jail;
use pretty_assertions::assert_eq;
use secrecy::ExposeSecret;

use peerscope_api::{SshSecret, TlsMode};
use peerscope_config::{
    Config, ConfigError, TEMPLATE, init_config, load_config_from, save_config_to,
};
use peerscope_core::{CommunityMode, DeviceTransport, Platform, RpkiMode};

const INVENTORY: &str = r#"
[params]
request_timeout = 60

[params.cache]
ttl = 300

[params.structured.communities]
mode = "permit"
items = ["^65000:"]

[params.structured.rpki]
mode = "external"
backend = "https://rpki.example.net"

[credentials.lg]
username = "lg"
password_env = "PEERSCOPE_TEST_LG_PASSWORD"

[credentials.jump]
username = "tunnel"
key_file = "/etc/peerscope/id_ed25519"

[proxies.bastion]
address = "198.51.100.1"
credential = "jump"

[[devices]]
name = "er01"
display_name = "Edge Router 01"
address = "192.0.2.1"
platform = "juniper"
credential = "lg"

[[devices.vrfs]]
name = "default"
source4 = "192.0.2.1"
source6 = "2001:db8::1"

[[devices]]
name = "core2"
address = "10.0.0.2"
platform = "mikrotik_routeros"
credential = "lg"
proxy = "bastion"
structured_output = false

[[devices]]
name = "agent1"
address = "203.0.113.7"
platform = "frr_agent"
signing_secret_env = "PEERSCOPE_TEST_AGENT_SECRET"

[devices.tls]
enabled = true
cert = "/etc/peerscope/agent1.pem"

[[directives]]
id = "juniper_bgp_route"
name = "BGP Route (custom)"
platforms = ["juniper"]

[[directives.rules]]
condition = "0.0.0.0/0"
command = "show route {target} table inet.0"
"#;

// ── Helpers ─────────────────────────────────────────────────────────

fn with_inventory(check: impl FnOnce(&mut Jail) -> figment::error::Result<()>) {
    Jail::expect_with(|jail| {
        jail.create_file("peerscope.toml", INVENTORY)?;
        jail.set_env("PEERSCOPE_TEST_LG_PASSWORD", "lg-pass");
        jail.set_env("PEERSCOPE_TEST_AGENT_SECRET", "agent-secret");
        check(jail)
    });
}

// ── Loading ─────────────────────────────────────────────────────────

#[test]
fn loads_params_and_policy() {
    with_inventory(|jail| {
        let cfg = load_config_from(&jail.directory().join("peerscope.toml")).unwrap();
        assert_eq!(cfg.params.request_timeout, 60);
        assert_eq!(cfg.params.cache.ttl, 300);
        assert_eq!(
            cfg.params.structured.communities.mode,
            CommunityMode::Permit
        );
        assert_eq!(cfg.params.structured.rpki.mode, RpkiMode::External);
        assert_eq!(cfg.devices.len(), 3);
        assert_eq!(cfg.directives.len(), 1);
        Ok(())
    });
}

#[test]
fn environment_overrides_file() {
    with_inventory(|jail| {
        jail.set_env("PEERSCOPE_PARAMS__REQUEST_TIMEOUT", "30");
        jail.set_env("PEERSCOPE_PARAMS__CACHE__TTL", "5");
        let cfg = load_config_from(&jail.directory().join("peerscope.toml")).unwrap();
        assert_eq!(cfg.params.request_timeout, 30);
        assert_eq!(cfg.params.cache.ttl, 5);
        Ok(())
    });
}

#[test]
fn missing_file_yields_defaults() {
    Jail::expect_with(|jail| {
        let cfg = load_config_from(&jail.directory().join("absent.toml")).unwrap();
        assert_eq!(cfg.params.request_timeout, 90);
        assert_eq!(cfg.params.cache.ttl, 120);
        assert!(cfg.devices.is_empty());
        Ok(())
    });
}

#[test]
fn invalid_references_fail_at_load() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "peerscope.toml",
            r#"
[[devices]]
name = "er01"
address = "192.0.2.1"
platform = "juniper"
credential = "missing"
"#,
        )?;
        let err = load_config_from(&jail.directory().join("peerscope.toml")).unwrap_err();
        match err {
            ConfigError::Validation { field, reason } => {
                assert_eq!(field, "devices[0].credential");
                assert!(reason.contains("missing"), "{reason}");
            }
            other => panic!("expected validation error, got {other}"),
        }
        Ok(())
    });
}

#[test]
fn malformed_toml_is_a_figment_error() {
    Jail::expect_with(|jail| {
        jail.create_file("peerscope.toml", "[params\nrequest_timeout = ")?;
        assert!(matches!(
            load_config_from(&jail.directory().join("peerscope.toml")).unwrap_err(),
            ConfigError::Figment(_)
        ));
        Ok(())
    });
}

// ── Writing ─────────────────────────────────────────────────────────

#[test]
fn init_refuses_to_clobber() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("peerscope.toml");

    init_config(&path, false).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), TEMPLATE);
    assert!(matches!(
        init_config(&path, false).unwrap_err(),
        ConfigError::Exists { .. }
    ));
    init_config(&path, true).unwrap();
}

#[test]
fn saved_config_parses_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("peerscope.toml");
    let mut cfg: Config = toml::from_str(TEMPLATE).unwrap();
    cfg.params.request_timeout = 45;

    save_config_to(&cfg, &path).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    let back: Config = toml::from_str(&text).unwrap();
    assert_eq!(back.params.request_timeout, 45);
    assert_eq!(back.devices[0].name, "edge1");
    assert_eq!(back.credentials["lg"].password_env.as_deref(), Some("PEERSCOPE_LG_PASSWORD"));
}

// ── Translation ─────────────────────────────────────────────────────

#[test]
fn builds_gateway_config() {
    with_inventory(|jail| {
        let cfg = load_config_from(&jail.directory().join("peerscope.toml")).unwrap();
        let gw = cfg.gateway_config().unwrap();

        assert_eq!(gw.request_timeout, Duration::from_secs(60));
        assert_eq!(gw.cache_ttl, Duration::from_secs(300));
        assert_eq!(
            gw.devices.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["er01", "core2", "agent1"]
        );

        let er01 = gw.device("er01").unwrap();
        assert_eq!(er01.display_name, "Edge Router 01");
        assert_eq!(er01.port, 22);
        assert_eq!(er01.vrfs[0].source6.as_deref(), Some("2001:db8::1"));
        assert!(er01.structured_output);
        match &er01.transport {
            DeviceTransport::Session {
                credential,
                proxy: None,
            } => match &credential.secret {
                SshSecret::Password(pw) => assert_eq!(pw.expose_secret(), "lg-pass"),
                SshSecret::KeyFile { .. } => panic!("expected a password"),
            },
            other => panic!("unexpected transport {other:?}"),
        }

        let core2 = gw.device("core2").unwrap();
        assert_eq!(core2.platform, Platform::MikrotikRouteros);
        assert_eq!(core2.display_name, "core2");
        assert!(!core2.structured_output);
        assert_eq!(core2.vrfs[0].name, "default");
        let proxy = core2.transport.proxy().unwrap();
        assert_eq!(proxy.name, "bastion");
        assert_eq!(proxy.endpoint.port, 22);
        assert_eq!(proxy.credential.username, "tunnel");

        let agent = gw.device("agent1").unwrap();
        assert_eq!(agent.port, 8080);
        match &agent.transport {
            DeviceTransport::Signed { secret, tls } => {
                assert_eq!(secret.expose_secret(), "agent-secret");
                assert_eq!(tls, &TlsMode::Pinned("/etc/peerscope/agent1.pem".into()));
            }
            other => panic!("unexpected transport {other:?}"),
        }
        Ok(())
    });
}

#[test]
fn unresolvable_signing_secret_names_the_device() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "peerscope.toml",
            r#"
[[devices]]
name = "agent-without-secret"
address = "203.0.113.9"
platform = "frr_agent"
signing_secret_env = "PEERSCOPE_TEST_UNSET_SECRET"
"#,
        )?;
        let cfg = load_config_from(&jail.directory().join("peerscope.toml")).unwrap();
        match cfg.gateway_config().unwrap_err() {
            ConfigError::NoCredentials { name } => assert_eq!(name, "agent-without-secret"),
            other => panic!("expected missing credentials, got {other}"),
        }
        Ok(())
    });
}

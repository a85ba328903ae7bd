//! Config subcommand handlers.

use peerscope_config::{Config, init_config, load_config_from};
use peerscope_core::Gateway;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::{config_path, load_required};

/// Redacted TOML for table/plain output, serde for the rest.
fn render_config(cfg: &Config, global: &GlobalOpts) -> Result<String, CliError> {
    let redacted = cfg.redacted();
    match global.output {
        OutputFormat::Table | OutputFormat::Plain => toml::to_string_pretty(&redacted)
            .map_err(|e| CliError::Internal(format!("TOML serialization failed: {e}"))),
        _ => output::render_single(&global.output, &redacted, |_| String::new(), |_| String::new()),
    }
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config_path(global);
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
        }

        // Missing file renders the defaults.
        ConfigCommand::Show => {
            let cfg = load_config_from(&path)?;
            output::print_output(&render_config(&cfg, global)?, global.quiet);
        }

        ConfigCommand::Init { force } => {
            init_config(&path, force)?;
            if !global.quiet {
                eprintln!("Wrote starter config to {}", path.display());
            }
        }

        ConfigCommand::Check => {
            let cfg = load_required(global)?;
            let gateway = Gateway::new(cfg.gateway_config()?)?;
            output::print_output(
                &format!(
                    "ok: {} devices, {} directives",
                    gateway.config().devices.len(),
                    gateway.directives().len()
                ),
                global.quiet,
            );
        }
    }
    Ok(())
}

//! Keyring secret management.

use peerscope_config::{delete_secret, password_key, signing_secret_key, store_secret};

use crate::cli::{CredentialsArgs, CredentialsCommand, GlobalOpts};
use crate::error::CliError;

fn account(name: &str, signing: bool) -> String {
    if signing {
        signing_secret_key(name)
    } else {
        password_key(name)
    }
}

pub fn handle(args: CredentialsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        CredentialsCommand::Set { name, signing } => {
            let label = if signing { "Signing secret" } else { "Password" };
            let secret = rpassword::prompt_password(format!("{label} for {name}: "))?;
            if secret.is_empty() {
                return Err(CliError::Validation {
                    field: "secret".into(),
                    reason: "cannot be empty".into(),
                });
            }
            store_secret(&account(&name, signing), &secret)?;
            if !global.quiet {
                eprintln!("{label} for {name} stored in system keyring");
            }
        }
        CredentialsCommand::Delete { name, signing } => {
            delete_secret(&account(&name, signing))?;
            if !global.quiet {
                eprintln!("Removed {name} from system keyring");
            }
        }
    }
    Ok(())
}

use crate::cli::{actions::Action, globals::GlobalArgs};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Turn parsed arguments into an action plus the shared configuration.
///
/// # Errors
/// Returns an error when a required argument is absent.
pub fn handler(matches: &clap::ArgMatches) -> Result<(Action, GlobalArgs)> {
    let get = |name: &str| -> Result<String> {
        matches
            .get_one::<String>(name)
            .cloned()
            .with_context(|| format!("missing required argument: --{name}"))
    };

    let globals = GlobalArgs {
        identity_url: get("identity-url")?,
        identity_api_key: SecretString::from(get("identity-api-key")?),
        email_url: get("email-url")?,
        email_api_key: SecretString::from(get("email-api-key")?),
        sender_name: get("sender-name")?,
        sender_email: get("sender-email")?,
        frontend_url: get("frontend-url")?,
        otp_ttl_seconds: matches.get_one::<i64>("otp-ttl").copied().unwrap_or(600),
    };

    let action = Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: get("dsn")?,
    };

    Ok((action, globals))
}

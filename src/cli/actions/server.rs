use crate::cli::{actions::Action, globals::GlobalArgs};
use crate::herbbify::handlers::auth::AuthConfig;
use anyhow::Result;

/// Handle the server action
pub async fn handle(action: Action, globals: &GlobalArgs) -> Result<()> {
    match action {
        Action::Server { port, dsn } => {
            let auth_config = AuthConfig::new(globals.frontend_url.clone())
                .with_otp_ttl_seconds(globals.otp_ttl_seconds);

            crate::herbbify::new(port, dsn, globals, auth_config).await?;
        }
    }

    Ok(())
}

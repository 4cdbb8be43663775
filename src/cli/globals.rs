use secrecy::SecretString;

/// Configuration shared across the server: upstream endpoints and secrets.
#[derive(Clone)]
pub struct GlobalArgs {
    pub identity_url: String,
    pub identity_api_key: SecretString,
    pub email_url: String,
    pub email_api_key: SecretString,
    pub sender_name: String,
    pub sender_email: String,
    pub frontend_url: String,
    pub otp_ttl_seconds: i64,
}

impl std::fmt::Debug for GlobalArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalArgs")
            .field("identity_url", &self.identity_url)
            .field("identity_api_key", &"***")
            .field("email_url", &self.email_url)
            .field("email_api_key", &"***")
            .field("sender_name", &self.sender_name)
            .field("sender_email", &self.sender_email)
            .field("frontend_url", &self.frontend_url)
            .field("otp_ttl_seconds", &self.otp_ttl_seconds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn debug_redacts_secrets() {
        let args = GlobalArgs {
            identity_url: "https://identity.example.test".to_string(),
            identity_api_key: SecretString::from("identity-secret"),
            email_url: "https://mail.example.test".to_string(),
            email_api_key: SecretString::from("mail-secret"),
            sender_name: "Herbbify".to_string(),
            sender_email: "no-reply@herbbify.app".to_string(),
            frontend_url: "https://herbbify.app".to_string(),
            otp_ttl_seconds: 600,
        };

        let rendered = format!("{args:?}");
        assert!(!rendered.contains("identity-secret"));
        assert!(!rendered.contains("mail-secret"));
        assert_eq!(args.identity_api_key.expose_secret(), "identity-secret");
    }
}

use dms_navigator::{Credential, CredentialSource};

pub const AUTH_TOKEN_ENV: &str = "DMS_AUTH_TOKEN";

/// Reads the bearer token from `DMS_AUTH_TOKEN` on every call, so a rotated
/// token is picked up without rebuilding the controller.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentials {
    var: Option<String>,
}

impl EnvCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_var(var: impl Into<String>) -> Self {
        Self {
            var: Some(var.into()),
        }
    }

    fn var(&self) -> &str {
        self.var.as_deref().unwrap_or(AUTH_TOKEN_ENV)
    }
}

impl CredentialSource for EnvCredentials {
    fn credential(&self) -> Option<Credential> {
        std::env::var(self.var()).ok().and_then(Credential::bearer)
    }
}

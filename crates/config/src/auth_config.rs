//! Authorization polling settings and stored provider credentials

use crate::validation::{ConfigSection, ValidationError, Validator};
use serde::{Deserialize, Serialize};
use syncwatch_core::Provider;

/// Poll budgets for the two authorization flows
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Time between token checks, in milliseconds
    pub poll_interval_ms: u64,

    /// Tick budget for the link-code flow
    pub provider_a_max_ticks: u32,

    /// Tick budget for the OAuth flow
    pub provider_b_max_ticks: u32,

    /// Origin sent with the OAuth request; the server derives its callback URL from it
    pub oauth_origin: Option<String>,
}

impl AuthConfig {
    pub fn max_ticks(&self, provider: Provider) -> u32 {
        match provider {
            Provider::Plex => self.provider_a_max_ticks,
            Provider::Simkl => self.provider_b_max_ticks,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            provider_a_max_ticks: 360,
            provider_b_max_ticks: 600,
            oauth_origin: None,
        }
    }
}

impl ConfigSection for AuthConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = vec![
            Validator::in_range(self.poll_interval_ms, 100, 60_000, "auth.poll_interval_ms"),
            Validator::in_range(
                self.provider_a_max_ticks,
                1,
                100_000,
                "auth.provider_a_max_ticks",
            ),
            Validator::in_range(
                self.provider_b_max_ticks,
                1,
                100_000,
                "auth.provider_b_max_ticks",
            ),
        ];
        if let Some(origin) = &self.oauth_origin {
            results.push(Validator::http_url(origin, "auth.oauth_origin"));
        }
        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        self.poll_interval_ms = other.poll_interval_ms;
        self.provider_a_max_ticks = other.provider_a_max_ticks;
        self.provider_b_max_ticks = other.provider_b_max_ticks;
        self.oauth_origin = other.oauth_origin;
    }

    fn section_name(&self) -> &'static str {
        "auth"
    }
}

/// Tokens obtained by the authorization flows
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CredentialsConfig {
    pub provider_a_token: Option<String>,
    pub provider_b_token: Option<String>,
}

impl CredentialsConfig {
    pub fn token(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Plex => self.provider_a_token.as_deref(),
            Provider::Simkl => self.provider_b_token.as_deref(),
        }
    }

    pub fn set_token(&mut self, provider: Provider, token: impl Into<String>) {
        let token = Some(token.into());
        match provider {
            Provider::Plex => self.provider_a_token = token,
            Provider::Simkl => self.provider_b_token = token,
        }
    }
}

impl ConfigSection for CredentialsConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = Vec::new();
        if let Some(token) = &self.provider_a_token {
            results.push(Validator::not_empty(token, "credentials.provider_a_token"));
        }
        if let Some(token) = &self.provider_b_token {
            results.push(Validator::not_empty(token, "credentials.provider_b_token"));
        }
        Validator::collect_errors(results)
    }

    // Absent tokens in `other` do not erase stored ones
    fn merge(&mut self, other: Self) {
        if other.provider_a_token.is_some() {
            self.provider_a_token = other.provider_a_token;
        }
        if other.provider_b_token.is_some() {
            self.provider_b_token = other.provider_b_token;
        }
    }

    fn section_name(&self) -> &'static str {
        "credentials"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budgets() {
        let config = AuthConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_ticks(Provider::Plex), 360);
        assert_eq!(config.max_ticks(Provider::Simkl), 600);
    }

    #[test]
    fn test_zero_budget_invalid() {
        let config = AuthConfig {
            provider_b_max_ticks: 0,
            ..AuthConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_set_and_get_token() {
        let mut creds = CredentialsConfig::default();
        assert_eq!(creds.token(Provider::Plex), None);
        creds.set_token(Provider::Plex, "abc");
        assert_eq!(creds.token(Provider::Plex), Some("abc"));
        assert_eq!(creds.token(Provider::Simkl), None);
    }

    #[test]
    fn test_merge_keeps_existing_tokens() {
        let mut base = CredentialsConfig::default();
        base.set_token(Provider::Simkl, "old");
        let mut other = CredentialsConfig::default();
        other.set_token(Provider::Plex, "new");

        base.merge(other);
        assert_eq!(base.token(Provider::Simkl), Some("old"));
        assert_eq!(base.token(Provider::Plex), Some("new"));
    }

    #[test]
    fn test_blank_token_invalid() {
        let mut creds = CredentialsConfig::default();
        creds.set_token(Provider::Simkl, "  ");
        assert!(creds.validate().is_err());
    }
}

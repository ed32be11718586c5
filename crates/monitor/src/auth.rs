// crates/monitor/src/auth.rs
//! Authorization flows for both providers
//!
//! Each flow asks the server to start the provider handshake, hands the user prompt back to
//! the caller, then polls the server config until a new token appears under the provider's
//! key. The poll target is the provider name, so restarting a flow supersedes the old one.

use crate::error::{MonitorError, MonitorResult};
use futures::FutureExt;
use log::{info, warn};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use syncwatch_config::{AuthConfig, ConfigManager};
use syncwatch_core::Provider;
use syncwatch_network::{ApiClient, LinkCode};
use syncwatch_resilience::{PollConfig, PollHandle, Poller};

/// What the user has to do to finish the handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthPrompt {
    /// Enter this code on the provider's link page
    LinkCode(LinkCode),
    /// Open this URL and approve access
    AuthorizeUrl(String),
}

/// Outcome of a flow, reported once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// `stored` is false when the local credential store refused the token
    Authorized {
        provider: Provider,
        token: String,
        stored: bool,
    },
    TimedOut { provider: Provider },
}

/// Where obtained tokens are kept
pub trait CredentialSink: Send + Sync + 'static {
    fn store_token(&self, provider: Provider, token: &str) -> MonitorResult<()>;
}

impl CredentialSink for ConfigManager {
    fn store_token(&self, provider: Provider, token: &str) -> MonitorResult<()> {
        self.update_credentials(|credentials| credentials.set_token(provider, token))?;
        Ok(())
    }
}

/// Token for `provider` inside the server config document, if non-empty
pub fn token_in_server_config(config: &Value, provider: Provider) -> Option<String> {
    let pointer = match provider {
        Provider::Plex => "/plex/account_token",
        Provider::Simkl => "/simkl/access_token",
    };
    config
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Starts and cancels authorization flows
pub struct AuthCoordinator {
    api: ApiClient,
    poller: Poller,
    settings: AuthConfig,
    sink: Arc<dyn CredentialSink>,
}

impl AuthCoordinator {
    pub fn new(
        api: ApiClient,
        poller: Poller,
        settings: AuthConfig,
        sink: Arc<dyn CredentialSink>,
    ) -> Self {
        Self {
            api,
            poller,
            settings,
            sink,
        }
    }

    /// Starts the flow for `provider`
    ///
    /// `current_token` is the token already known; only a different one completes the
    /// flow. `on_outcome` runs once on the poll task, after a new token has been stored.
    pub async fn start<F>(
        &self,
        provider: Provider,
        current_token: Option<String>,
        on_outcome: F,
    ) -> MonitorResult<(AuthPrompt, PollHandle)>
    where
        F: Fn(AuthOutcome) + Send + Sync + 'static,
    {
        let prompt = match provider {
            Provider::Plex => AuthPrompt::LinkCode(self.api.request_link_code().await.map_err(
                |e| MonitorError::AuthStartFailed {
                    provider,
                    reason: e.to_string(),
                },
            )?),
            Provider::Simkl => {
                let origin = self
                    .settings
                    .oauth_origin
                    .clone()
                    .unwrap_or_else(|| self.api.client().base_url().to_string());
                let url = self
                    .api
                    .request_authorize_url(&origin)
                    .await
                    .map_err(|e| MonitorError::AuthStartFailed {
                        provider,
                        reason: e.to_string(),
                    })?;
                AuthPrompt::AuthorizeUrl(url)
            }
        };

        let handle = self.watch_for_token(provider, current_token, on_outcome)?;
        Ok((prompt, handle))
    }

    /// Polls for a token for `provider` without starting the handshake
    pub fn watch_for_token<F>(
        &self,
        provider: Provider,
        current_token: Option<String>,
        on_outcome: F,
    ) -> MonitorResult<PollHandle>
    where
        F: Fn(AuthOutcome) + Send + Sync + 'static,
    {
        let on_outcome = Arc::new(on_outcome);
        let on_timeout = Arc::clone(&on_outcome);
        let sink = Arc::clone(&self.sink);
        let api = self.api.clone();
        let max_ticks = self.settings.max_ticks(provider);

        let config = PollConfig::new(
            move || {
                let api = api.clone();
                async move { api.server_config().await }.boxed()
            },
            move |config: &Value| token_in_server_config(config, provider),
        )
        .with_interval(Duration::from_millis(self.settings.poll_interval_ms))
        .with_max_ticks(max_ticks)
        .with_baseline(current_token)
        .on_success(move |token: String| {
            info!("{} authorization completed", provider);
            let stored = match sink.store_token(provider, &token) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Could not store {} token: {}", provider, e);
                    false
                }
            };
            on_outcome(AuthOutcome::Authorized {
                provider,
                token,
                stored,
            });
        })
        .on_timeout(move || {
            warn!(
                "{} authorization not completed after {} checks",
                provider, max_ticks
            );
            on_timeout(AuthOutcome::TimedOut { provider });
        });

        Ok(self.poller.start(provider.as_str(), config)?)
    }

    /// Stops the flow for `provider`; returns false if none was running
    pub fn cancel(&self, provider: Provider) -> MonitorResult<bool> {
        Ok(self.poller.cancel_target(provider.as_str())?)
    }

    pub fn is_active(&self, handle: &PollHandle) -> bool {
        self.poller.is_active(handle)
    }
}

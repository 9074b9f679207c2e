//! The CAS client adapter: redirect, validate, logout.

use crate::config::CasConfig;
use crate::errors::Result;
use crate::protocol::{endpoint_url, CasTransport, HttpCasTransport, TicketValidation};
use crate::session::CasSession;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use url::Url;

/// Outcome of running a request through the CAS filter.
#[derive(Debug, Clone)]
pub enum FilterOutcome {
    /// The caller must redirect the browser to this CAS login URL.
    Redirect(String),

    /// The request carried a ticket that validated successfully.
    Authenticated(CasSession),

    /// No authentication could be established (bad ticket, network failure,
    /// or unconfigured adapter). The caller sees an unauthenticated state.
    Failed,
}

struct ConfiguredEndpoint {
    /// Exact configured string, compared on reconfiguration
    raw: String,
    base_url: Url,
}

/// Wraps the CAS protocol exchange for one configured server.
///
/// Shared by all request handlers; `configure` swaps the endpoint state
/// wholesale so in-flight requests see either the old or the new server,
/// never a mix.
pub struct CasClient {
    transport: Arc<dyn CasTransport>,
    endpoint: RwLock<Option<ConfiguredEndpoint>>,
    reconfigurations: AtomicUsize,
}

impl CasClient {
    /// Create a client over an arbitrary transport (tests use a scripted one).
    pub fn new(transport: Arc<dyn CasTransport>) -> Self {
        Self {
            transport,
            endpoint: RwLock::new(None),
            reconfigurations: AtomicUsize::new(0),
        }
    }

    /// Create a client speaking real HTTP.
    pub fn http() -> Result<Self> {
        Ok(Self::new(Arc::new(HttpCasTransport::new()?)))
    }

    /// Apply a configuration, reinitializing the endpoint only when the base
    /// URL string actually changed. Called on every settings refresh, so the
    /// common case must be a cheap no-op.
    pub fn configure(&self, config: &CasConfig) -> Result<()> {
        {
            let endpoint = read_lock(&self.endpoint);
            let current = endpoint.as_ref().map(|e| e.raw.as_str()).unwrap_or("");
            if current == config.base_url {
                return Ok(());
            }
        }

        let next = if config.base_url.is_empty() {
            None
        } else {
            let base_url = Url::parse(&config.base_url)?;
            Some(ConfiguredEndpoint {
                raw: config.base_url.clone(),
                base_url,
            })
        };

        let mut endpoint = write_lock(&self.endpoint);
        *endpoint = next;
        self.reconfigurations.fetch_add(1, Ordering::Relaxed);
        tracing::info!(base_url = %config.base_url, "CAS client reconfigured");
        Ok(())
    }

    /// The currently configured base URL, if any.
    pub fn configured_base_url(&self) -> Option<String> {
        read_lock(&self.endpoint).as_ref().map(|e| e.raw.clone())
    }

    /// How many times the endpoint state was actually rebuilt.
    pub fn reconfiguration_count(&self) -> usize {
        self.reconfigurations.load(Ordering::Relaxed)
    }

    /// Run one request through the CAS handshake.
    ///
    /// Without a ticket this produces the login redirect; with one it
    /// validates against the server. Every failure path collapses to
    /// [`FilterOutcome::Failed`], and negative validations are never cached
    /// (CAS tickets are single-use).
    pub async fn filter(&self, ticket: Option<&str>, service_url: &str) -> FilterOutcome {
        let base_url = {
            let endpoint = read_lock(&self.endpoint);
            match endpoint.as_ref() {
                Some(configured) => configured.base_url.clone(),
                None => {
                    tracing::warn!("CAS filter invoked without a configured server");
                    return FilterOutcome::Failed;
                }
            }
        };

        let Some(ticket) = ticket else {
            return match endpoint_url(&base_url, "login", service_url) {
                Ok(url) => FilterOutcome::Redirect(url.into()),
                Err(err) => {
                    tracing::warn!(error = %err, "could not build CAS login URL");
                    FilterOutcome::Failed
                }
            };
        };

        match self
            .transport
            .validate_ticket(&base_url, ticket, service_url)
            .await
        {
            Ok(TicketValidation::Valid(session)) => {
                tracing::debug!(user = %session.user, "CAS ticket validated");
                FilterOutcome::Authenticated(session)
            }
            Ok(TicketValidation::Invalid { code, message }) => {
                tracing::info!(code, message, "CAS ticket rejected");
                FilterOutcome::Failed
            }
            Err(err) => {
                tracing::warn!(error = %err, "CAS ticket validation failed");
                FilterOutcome::Failed
            }
        }
    }

    /// CAS logout URL that lands on `return_url` after remote logout, or
    /// `None` when no server is configured.
    pub fn logout_url(&self, return_url: &str) -> Option<String> {
        let endpoint = read_lock(&self.endpoint);
        let configured = endpoint.as_ref()?;
        match endpoint_url(&configured.base_url, "logout", return_url) {
            Ok(url) => Some(url.into()),
            Err(err) => {
                tracing::warn!(error = %err, "could not build CAS logout URL");
                None
            }
        }
    }
}

// Poisoning only happens if a panic escaped while holding the lock; the
// guarded state is always replaced whole, so recovering the guard is safe.
pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(std::sync::PoisonError::into_inner)
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockCasTransport;

    fn config(base_url: &str) -> CasConfig {
        CasConfig {
            base_url: base_url.to_owned(),
            enabled: true,
            ..CasConfig::default()
        }
    }

    #[test]
    fn configure_is_idempotent_per_base_url() {
        let client = CasClient::new(Arc::new(MockCasTransport::new()));
        client.configure(&config("https://cas.example.org/cas")).unwrap();
        client.configure(&config("https://cas.example.org/cas")).unwrap();
        assert_eq!(client.reconfiguration_count(), 1);

        client.configure(&config("https://other.example.org/cas")).unwrap();
        assert_eq!(client.reconfiguration_count(), 2);
        assert_eq!(
            client.configured_base_url().as_deref(),
            Some("https://other.example.org/cas")
        );
    }

    #[test]
    fn configure_rejects_unparseable_urls() {
        let client = CasClient::new(Arc::new(MockCasTransport::new()));
        assert!(client.configure(&config("not a url")).is_err());
        assert_eq!(client.configured_base_url(), None);
    }

    #[test]
    fn empty_base_url_clears_the_endpoint() {
        let client = CasClient::new(Arc::new(MockCasTransport::new()));
        client.configure(&config("https://cas.example.org/cas")).unwrap();
        client.configure(&config("")).unwrap();
        assert_eq!(client.configured_base_url(), None);
    }

    #[tokio::test]
    async fn ticketless_requests_redirect_to_cas_login() {
        let client = CasClient::new(Arc::new(MockCasTransport::new()));
        client.configure(&config("https://cas.example.org/cas")).unwrap();

        let outcome = client.filter(None, "https://app.example.org/login").await;
        let FilterOutcome::Redirect(url) = outcome else {
            panic!("expected a redirect");
        };
        assert!(url.starts_with("https://cas.example.org/cas/login?service="));
    }

    #[tokio::test]
    async fn unconfigured_filter_fails_closed() {
        let client = CasClient::new(Arc::new(MockCasTransport::new()));
        let outcome = client
            .filter(Some("ST-1"), "https://app.example.org/login")
            .await;
        assert!(matches!(outcome, FilterOutcome::Failed));
        assert_eq!(client.logout_url("https://app.example.org/"), None);
    }

    #[tokio::test]
    async fn transport_errors_collapse_to_failed() {
        let transport = MockCasTransport::new();
        transport.error_ticket("ST-broken");
        let client = CasClient::new(Arc::new(transport));
        client.configure(&config("https://cas.example.org/cas")).unwrap();

        let outcome = client
            .filter(Some("ST-broken"), "https://app.example.org/login")
            .await;
        assert!(matches!(outcome, FilterOutcome::Failed));
    }

    #[test]
    fn logout_url_carries_the_landing_page() {
        let client = CasClient::new(Arc::new(MockCasTransport::new()));
        client.configure(&config("https://cas.example.org/cas")).unwrap();

        let url = client.logout_url("https://app.example.org/").unwrap();
        assert_eq!(
            url,
            "https://cas.example.org/cas/logout?service=https%3A%2F%2Fapp.example.org%2F"
        );
    }
}

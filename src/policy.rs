//! Configuration and readiness policy.

use crate::client::{read_lock, write_lock, CasClient};
use crate::config::{default_setting, CasConfig};
use crate::probe::ReachabilityProber;
use crate::stores::SettingsStore;
use std::sync::{Arc, RwLock};

/// Holds the live CAS configuration and derives readiness from it.
///
/// Configuration is kept as an `Arc` snapshot that is replaced wholesale by
/// [`CasPolicy::on_configuration_changed`]; concurrent logins observe either
/// the old or the new configuration, never a torn one. Readiness itself is
/// never cached — only the reachability sub-check inside the prober is.
pub struct CasPolicy {
    settings: Arc<dyn SettingsStore>,
    prober: ReachabilityProber,
    client: Arc<CasClient>,
    current: RwLock<Arc<CasConfig>>,
}

impl CasPolicy {
    /// Create a policy with the default probe timeout. The initial snapshot
    /// is the defaults table; call [`Self::on_configuration_changed`] once
    /// the host settings store is available.
    pub fn new(settings: Arc<dyn SettingsStore>, client: Arc<CasClient>) -> Self {
        Self::with_prober(settings, client, ReachabilityProber::default())
    }

    /// Create a policy with a custom prober (shorter timeouts in tests).
    pub fn with_prober(
        settings: Arc<dyn SettingsStore>,
        client: Arc<CasClient>,
        prober: ReachabilityProber,
    ) -> Self {
        Self {
            settings,
            prober,
            client,
            current: RwLock::new(Arc::new(CasConfig::default())),
        }
    }

    /// The current configuration snapshot.
    pub fn current(&self) -> Arc<CasConfig> {
        Arc::clone(&read_lock(&self.current))
    }

    /// The client adapter this policy configures.
    pub fn client(&self) -> &Arc<CasClient> {
        &self.client
    }

    /// Whether CAS delegation may be used for this request:
    /// enabled, a base URL is set, and the server answers.
    pub async fn ready(&self) -> bool {
        let config = self.current();
        if !config.enabled || config.base_url.is_empty() {
            return false;
        }
        self.prober.reachable(&config.base_url).await
    }

    /// Resolve a setting: live store first, then the hard-coded defaults.
    ///
    /// Store errors (including an uninitialized persistence layer during
    /// host startup) degrade to the default rather than surfacing.
    pub async fn setting(&self, key: &str) -> Option<String> {
        match self.settings.get(key).await {
            Ok(Some(value)) => Some(value),
            Ok(None) => default_setting(key).map(str::to_owned),
            Err(err) => {
                tracing::debug!(key, error = %err, "settings store unavailable, using default");
                default_setting(key).map(str::to_owned)
            }
        }
    }

    /// Settings-change hook: reload the configuration, replace the snapshot
    /// and reapply it to the client adapter.
    ///
    /// Safe to invoke any number of times and concurrently with in-flight
    /// logins; the client adapter only reinitializes when the base URL
    /// actually changed.
    pub async fn on_configuration_changed(&self) {
        let config = Arc::new(CasConfig::load(self.settings.as_ref()).await);
        if let Err(err) = self.client.configure(&config) {
            tracing::warn!(base_url = %config.base_url, error = %err, "CAS reconfiguration failed");
        }
        *write_lock(&self.current) = config;
    }
}

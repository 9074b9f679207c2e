//! Reachability probing for the configured CAS server.

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use url::Url;

/// Default bound on a single probe attempt.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Probes whether a CAS base URL has a listening service behind it.
///
/// The cache is deliberately asymmetric: a URL that has ever been reachable
/// is treated as reachable for the rest of the process lifetime without
/// re-probing, while a URL that has never succeeded is probed on every call.
/// Masking a flap to unreachable is acceptable; masking a server that never
/// came up is not.
pub struct ReachabilityProber {
    reachable_urls: DashMap<String, ()>,
    timeout: Duration,
    probe_attempts: AtomicUsize,
}

impl Default for ReachabilityProber {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

impl ReachabilityProber {
    /// Create a prober with the given per-attempt timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            reachable_urls: DashMap::new(),
            timeout,
            probe_attempts: AtomicUsize::new(0),
        }
    }

    /// Whether `url` currently looks reachable.
    ///
    /// Never returns an error: malformed URLs, unresolvable hosts, refused
    /// connections, and timeouts all collapse to `false`.
    pub async fn reachable(&self, url: &str) -> bool {
        if self.reachable_urls.contains_key(url) {
            return true;
        }

        let Some((host, port)) = host_and_port(url) else {
            tracing::debug!(url, "reachability probe skipped, URL has no usable host/port");
            return false;
        };

        self.probe_attempts.fetch_add(1, Ordering::Relaxed);
        match tokio::time::timeout(self.timeout, TcpStream::connect((host.as_str(), port))).await {
            Ok(Ok(_stream)) => {
                self.reachable_urls.insert(url.to_owned(), ());
                tracing::debug!(url, "CAS server reachable");
                true
            }
            Ok(Err(err)) => {
                tracing::debug!(url, error = %err, "CAS server unreachable");
                false
            }
            Err(_elapsed) => {
                tracing::debug!(url, timeout = ?self.timeout, "CAS reachability probe timed out");
                false
            }
        }
    }

    /// Number of network probes performed so far (cache hits excluded).
    pub fn probe_attempts(&self) -> usize {
        self.probe_attempts.load(Ordering::Relaxed)
    }
}

fn host_and_port(url: &str) -> Option<(String, u16)> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_owned();
    let port = parsed.port_or_known_default()?;
    Some((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn malformed_urls_are_unreachable_without_probing() {
        let prober = ReachabilityProber::default();
        assert!(!prober.reachable("not a url").await);
        assert!(!prober.reachable("mailto:cas@example.org").await);
        assert_eq!(prober.probe_attempts(), 0);
    }

    #[tokio::test]
    async fn refused_connections_return_false_and_are_reprobed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = format!("http://127.0.0.1:{port}/cas");
        let prober = ReachabilityProber::default();
        assert!(!prober.reachable(&url).await);
        assert!(!prober.reachable(&url).await);
        // Failures are never cached; every call costs a probe.
        assert_eq!(prober.probe_attempts(), 2);
    }

    #[tokio::test]
    async fn success_is_cached_across_server_death() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}/cas");

        let prober = ReachabilityProber::default();
        assert!(prober.reachable(&url).await);
        assert_eq!(prober.probe_attempts(), 1);

        drop(listener);
        assert!(prober.reachable(&url).await);
        assert_eq!(prober.probe_attempts(), 1, "cache hit must not re-probe");
    }

    #[tokio::test]
    async fn timeout_bounds_the_probe() {
        // RFC 5737 TEST-NET-1 address, guaranteed non-routable.
        let prober = ReachabilityProber::new(Duration::from_millis(100));
        let started = std::time::Instant::now();
        assert!(!prober.reachable("http://192.0.2.1:9/cas").await);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}

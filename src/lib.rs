/*!
# CAS Bridge

Delegates login/logout of a host web application to an external Central
Authentication Service (CAS) server: ticket-granting redirects, service-ticket
validation, single logout, attribute mapping onto local user records, and the
policy state machine around it all (auto-create, auto-update,
fallback-to-local authentication).

The host's user storage, session state and settings persistence stay on the
host side; the bridge reaches them through the narrow traits in [`stores`].
Nothing in this crate is allowed to crash the request pipeline: probe and
validation failures collapse to unauthenticated outcomes, and settings
lookups degrade to defaults while the host's persistence layer is still
coming up.

## Quick start

```rust,no_run
use cas_bridge::{CasClient, CasOrchestrator, CasPolicy, LoginOutcome, LoginRequest};
use cas_bridge::testing::{MemorySession, MemorySettings, MemoryUserStore};
use std::sync::Arc;

# #[tokio::main]
# async fn main() -> Result<(), Box<dyn std::error::Error>> {
// Collaborators normally implemented by the host application.
let settings = Arc::new(MemorySettings::new());
let users = Arc::new(MemoryUserStore::new());

let client = Arc::new(CasClient::http()?);
let policy = Arc::new(CasPolicy::new(settings, client));
policy.on_configuration_changed().await; // and again on every settings change

let orchestrator = CasOrchestrator::new(policy, users);

// Inside the host's login action:
let request = LoginRequest {
    ticket: None,
    service_url: "https://app.example.org/login".to_owned(),
    ..LoginRequest::default()
};
let mut session = MemorySession::new();
match orchestrator.handle_login(&request, &mut session).await {
    LoginOutcome::Redirect(_url) => { /* redirect the browser to `_url` */ }
    LoginOutcome::LocalAuth => { /* run the host's own authentication */ }
    _other => { /* map the remaining outcomes to host responses */ }
}
# Ok(())
# }
```

## Readiness

CAS delegation is only attempted when the policy reports ready: the feature
is enabled, a base URL is configured, and the server's host:port answers a
TCP probe. Probe successes are cached for the process lifetime; failures are
re-probed on every call, so a server that never came up is never masked.
*/

pub mod attributes;
pub mod client;
pub mod config;
pub mod errors;
pub mod orchestrator;
pub mod policy;
pub mod probe;
pub mod protocol;
pub mod session;
pub mod stores;
pub mod testing;

pub use attributes::{map_attributes, ProfileFields};
pub use client::{CasClient, FilterOutcome};
pub use config::CasConfig;
pub use errors::{CasError, Result};
pub use orchestrator::{
    CasOrchestrator, LoginOutcome, LoginRequest, LogoutOutcome, UserBindingOutcome,
};
pub use policy::CasPolicy;
pub use probe::ReachabilityProber;
pub use protocol::{CasTransport, HttpCasTransport, TicketValidation};
pub use session::CasSession;
pub use stores::{HostSession, HostUser, NewUser, SettingsStore, UserStatus, UserStore};

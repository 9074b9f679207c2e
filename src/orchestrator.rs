//! The login/logout decision machine.
//!
//! Hosts call [`CasOrchestrator::handle_login`] and
//! [`CasOrchestrator::handle_logout`] from their own login/logout entry
//! points and act on the returned outcome; the orchestrator never touches
//! host routing itself.

use crate::attributes::map_attributes;
use crate::client::FilterOutcome;
use crate::policy::CasPolicy;
use crate::stores::{HostSession, HostUser, NewUser, UserStatus, UserStore};
use std::sync::Arc;

/// One login attempt as seen from the host's request pipeline.
#[derive(Debug, Clone, Default)]
pub struct LoginRequest {
    /// Local-form username, if the request carried one
    pub username: Option<String>,

    /// Local-form password, if the request carried one
    pub password: Option<String>,

    /// CAS service ticket from the callback query string
    pub ticket: Option<String>,

    /// Callback/service URL presented to the CAS server
    pub service_url: String,

    /// Page the user originally asked for, preserved across failures
    pub back_url: Option<String>,
}

impl LoginRequest {
    fn has_local_credentials(&self) -> bool {
        let present = |value: &Option<String>| {
            value.as_deref().is_some_and(|v| !v.trim().is_empty())
        };
        present(&self.username) && present(&self.password)
    }
}

/// What the host should do after a login attempt.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    /// CAS was bypassed or unavailable: run the host's local authentication.
    LocalAuth,

    /// A host session already exists; nothing to do.
    AlreadyAuthenticated,

    /// Send the browser to this CAS login URL and stop handling the request.
    Redirect(String),

    /// Ticket validation failed; the caller sees an unauthenticated state.
    Unauthenticated,

    /// Session established; route to the default landing page.
    LoggedIn { user_id: String },

    /// The local account exists but is not yet activated.
    PendingAccount { login: String },

    /// CAS vouched for a principal with no local account and auto-create is
    /// off. A flash error has been queued; re-render the login form.
    UserNotFound {
        login: String,
        back_url: Option<String>,
    },

    /// Auto-creation of the local account failed.
    CreationFailed { login: String },
}

/// What the host should do after a logout request.
#[derive(Debug, Clone)]
pub enum LogoutOutcome {
    /// Run the host's local logout path.
    Local,

    /// Local session already cleared; send the browser to this CAS logout
    /// URL to propagate the logout.
    RedirectToCas(String),
}

/// How a CAS principal relates to the host's user records.
#[derive(Debug, Clone)]
pub enum UserBindingOutcome {
    /// An active local account with this login exists.
    ExistingActive(HostUser),

    /// A local account exists but may not establish sessions.
    ExistingInactive(HostUser),

    /// No local account carries this login.
    NoLocalUser,
}

/// Decides, per request, between CAS delegation and local authentication,
/// and applies the user-binding policy after a successful CAS handshake.
pub struct CasOrchestrator {
    policy: Arc<CasPolicy>,
    users: Arc<dyn UserStore>,
}

impl CasOrchestrator {
    pub fn new(policy: Arc<CasPolicy>, users: Arc<dyn UserStore>) -> Self {
        Self { policy, users }
    }

    /// The readiness/configuration policy this orchestrator consults.
    pub fn policy(&self) -> &Arc<CasPolicy> {
        &self.policy
    }

    /// Handle one login attempt.
    pub async fn handle_login(
        &self,
        request: &LoginRequest,
        session: &mut dyn HostSession,
    ) -> LoginOutcome {
        // Explicit local credentials bypass CAS entirely.
        if request.has_local_credentials() {
            return LoginOutcome::LocalAuth;
        }

        if !self.policy.ready().await {
            tracing::debug!("CAS not ready, falling back to local authentication");
            return LoginOutcome::LocalAuth;
        }

        if session.current_user_id().is_some() {
            return LoginOutcome::AlreadyAuthenticated;
        }

        let cas_session = match self
            .policy
            .client()
            .filter(request.ticket.as_deref(), &request.service_url)
            .await
        {
            FilterOutcome::Redirect(url) => return LoginOutcome::Redirect(url),
            FilterOutcome::Failed => return LoginOutcome::Unauthenticated,
            FilterOutcome::Authenticated(cas_session) => cas_session,
        };

        let login = cas_session.user.clone();
        let binding = match self.bind_user(&login).await {
            Ok(binding) => binding,
            Err(err) => {
                tracing::warn!(login, error = %err, "user lookup failed during CAS binding");
                return LoginOutcome::Unauthenticated;
            }
        };

        let config = self.policy.current();
        match binding {
            UserBindingOutcome::ExistingActive(user) => {
                if config.auto_update_attributes {
                    let fields = map_attributes(&cas_session);
                    if !fields.is_empty() {
                        // A stale profile must not block login.
                        if let Err(err) = self.users.update_attributes(&user, &fields).await {
                            tracing::warn!(login, error = %err, "profile update from CAS attributes failed");
                        }
                    }
                }
                session.set_current_user_id(&user.id);
                tracing::info!(login, user_id = %user.id, "CAS login succeeded");
                LoginOutcome::LoggedIn { user_id: user.id }
            }
            UserBindingOutcome::ExistingInactive(user) => {
                tracing::info!(login, user_id = %user.id, "CAS login for inactive account");
                LoginOutcome::PendingAccount { login }
            }
            UserBindingOutcome::NoLocalUser if config.auto_create_users => {
                let new_user = NewUser {
                    login: login.clone(),
                    fields: map_attributes(&cas_session),
                    status: UserStatus::Registered,
                };
                match self.users.create_user(new_user).await {
                    Ok(user) => {
                        session.set_current_user_id(&user.id);
                        tracing::info!(login, user_id = %user.id, "auto-created user on first CAS login");
                        LoginOutcome::LoggedIn { user_id: user.id }
                    }
                    Err(err) => {
                        tracing::warn!(login, error = %err, "on-the-fly user creation failed");
                        LoginOutcome::CreationFailed { login }
                    }
                }
            }
            UserBindingOutcome::NoLocalUser => {
                tracing::info!(login, "CAS-authenticated user has no local account");
                session.set_flash_error(&format!("authenticated user not found: {login}"));
                LoginOutcome::UserNotFound {
                    login,
                    back_url: request.back_url.clone(),
                }
            }
        }
    }

    /// Relate a CAS principal to the host's user records.
    pub async fn bind_user(&self, login: &str) -> crate::errors::Result<UserBindingOutcome> {
        Ok(match self.users.find_by_login(login).await? {
            Some(user) if user.active => UserBindingOutcome::ExistingActive(user),
            Some(user) => UserBindingOutcome::ExistingInactive(user),
            None => UserBindingOutcome::NoLocalUser,
        })
    }

    /// Handle a logout request.
    ///
    /// With single logout enabled and CAS ready, the host session is cleared
    /// *before* the remote logout redirect is produced, so a failed remote
    /// step can never leave the local session alive.
    pub async fn handle_logout(
        &self,
        session: &mut dyn HostSession,
        return_url: &str,
    ) -> LogoutOutcome {
        let config = self.policy.current();
        if !config.single_logout || !self.policy.ready().await {
            return LogoutOutcome::Local;
        }

        session.clear();
        match self.policy.client().logout_url(return_url) {
            Some(url) => {
                tracing::info!("propagating logout to CAS");
                LogoutOutcome::RedirectToCas(url)
            }
            None => LogoutOutcome::Local,
        }
    }

    /// Whether the host should show its "log in without CAS" link: CAS is
    /// usable, the local form is allowed, and nobody is logged in yet.
    pub async fn show_login_without_cas_link(&self, session: &dyn HostSession) -> bool {
        if session.current_user_id().is_some() {
            return false;
        }
        self.policy.current().login_without_cas && self.policy.ready().await
    }
}

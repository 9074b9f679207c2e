//! Testing utilities for the CAS bridge.
//!
//! In-memory implementations of the host collaborator traits plus a
//! scripted CAS transport, so hosts (and this crate's own tests) can
//! exercise the full login/logout machinery without a CAS server.

use crate::attributes::ProfileFields;
use crate::errors::{CasError, Result};
use crate::protocol::{CasTransport, TicketValidation};
use crate::session::CasSession;
use crate::stores::{HostSession, HostUser, NewUser, SettingsStore, UserStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use url::Url;

/// Build a [`CasSession`] with single-valued attributes.
pub fn cas_session(user: &str, attributes: &[(&str, &str)]) -> CasSession {
    let mut session = CasSession::new(user);
    for (name, value) in attributes {
        session.push_attribute(*name, *value);
    }
    session
}

/// In-memory [`UserStore`] with switchable failure modes.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, HostUser>>,
    profiles: Mutex<HashMap<String, ProfileFields>>,
    created: Mutex<Vec<NewUser>>,
    next_id: AtomicUsize,
    fail_lookups: AtomicBool,
    fail_creates: AtomicBool,
    fail_updates: AtomicBool,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user record; returns the assigned id.
    pub fn add_user(&self, login: &str, active: bool) -> String {
        let id = format!("u{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let user = HostUser {
            id: id.clone(),
            login: login.to_owned(),
            active,
        };
        self.users.lock().unwrap().insert(login.to_owned(), user);
        id
    }

    /// Make `find_by_login` fail.
    pub fn fail_lookups(&self) {
        self.fail_lookups.store(true, Ordering::Relaxed);
    }

    /// Make `create_user` fail.
    pub fn fail_creates(&self) {
        self.fail_creates.store(true, Ordering::Relaxed);
    }

    /// Make `update_attributes` fail.
    pub fn fail_updates(&self) {
        self.fail_updates.store(true, Ordering::Relaxed);
    }

    /// Every record passed to `create_user`, in order.
    pub fn created_users(&self) -> Vec<NewUser> {
        self.created.lock().unwrap().clone()
    }

    /// Profile fields applied to a user so far.
    pub fn profile(&self, user_id: &str) -> Option<ProfileFields> {
        self.profiles.lock().unwrap().get(user_id).cloned()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_login(&self, login: &str) -> Result<Option<HostUser>> {
        if self.fail_lookups.load(Ordering::Relaxed) {
            return Err(CasError::user_store("lookup failure (scripted)"));
        }
        Ok(self.users.lock().unwrap().get(login).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<HostUser> {
        if self.fail_creates.load(Ordering::Relaxed) {
            return Err(CasError::user_store("creation failure (scripted)"));
        }
        self.created.lock().unwrap().push(user.clone());
        let id = self.add_user(&user.login, true);
        self.profiles.lock().unwrap().insert(id.clone(), user.fields);
        Ok(HostUser {
            id,
            login: user.login,
            active: true,
        })
    }

    async fn update_attributes(&self, user: &HostUser, fields: &ProfileFields) -> Result<()> {
        if self.fail_updates.load(Ordering::Relaxed) {
            return Err(CasError::user_store("update failure (scripted)"));
        }
        let mut profiles = self.profiles.lock().unwrap();
        let profile = profiles.entry(user.id.clone()).or_default();
        if let Some(firstname) = &fields.firstname {
            profile.firstname = Some(firstname.clone());
        }
        if let Some(lastname) = &fields.lastname {
            profile.lastname = Some(lastname.clone());
        }
        if let Some(mail) = &fields.mail {
            profile.mail = Some(mail.clone());
        }
        Ok(())
    }
}

/// In-memory [`HostSession`].
#[derive(Debug, Default)]
pub struct MemorySession {
    user_id: Option<String>,
    flash_error: Option<String>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// A session already authenticated as `user_id`.
    pub fn authenticated(user_id: &str) -> Self {
        Self {
            user_id: Some(user_id.to_owned()),
            flash_error: None,
        }
    }
}

impl HostSession for MemorySession {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.clone()
    }

    fn set_current_user_id(&mut self, user_id: &str) {
        self.user_id = Some(user_id.to_owned());
    }

    fn clear(&mut self) {
        self.user_id = None;
        self.flash_error = None;
    }

    fn set_flash_error(&mut self, message: &str) {
        self.flash_error = Some(message.to_owned());
    }

    fn take_flash_error(&mut self) -> Option<String> {
        self.flash_error.take()
    }
}

/// In-memory [`SettingsStore`], optionally failing every lookup to imitate
/// an uninitialized host persistence layer.
#[derive(Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, String>>,
    failing: bool,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every lookup errors.
    pub fn failing() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            failing: true,
        }
    }

    /// Set a value.
    pub fn put(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_owned(), value.to_owned());
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if self.failing {
            return Err(CasError::config("settings store not initialized"));
        }
        Ok(self.values.lock().unwrap().get(key).cloned())
    }
}

enum ScriptedValidation {
    Valid(CasSession),
    Invalid,
    Error,
}

/// Scripted [`CasTransport`]: per-ticket outcomes, no network.
///
/// Unknown tickets validate as invalid, mirroring a real CAS server's
/// response to a ticket it never issued.
#[derive(Default)]
pub struct MockCasTransport {
    scripts: Mutex<HashMap<String, ScriptedValidation>>,
    validations: AtomicUsize,
}

impl MockCasTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script `ticket` to validate to `session`.
    pub fn valid_ticket(&self, ticket: &str, session: CasSession) {
        self.scripts
            .lock()
            .unwrap()
            .insert(ticket.to_owned(), ScriptedValidation::Valid(session));
    }

    /// Script `ticket` to be rejected.
    pub fn invalid_ticket(&self, ticket: &str) {
        self.scripts
            .lock()
            .unwrap()
            .insert(ticket.to_owned(), ScriptedValidation::Invalid);
    }

    /// Script `ticket` to hit a transport error.
    pub fn error_ticket(&self, ticket: &str) {
        self.scripts
            .lock()
            .unwrap()
            .insert(ticket.to_owned(), ScriptedValidation::Error);
    }

    /// Number of validation calls performed.
    pub fn validation_count(&self) -> usize {
        self.validations.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CasTransport for MockCasTransport {
    async fn validate_ticket(
        &self,
        _base_url: &Url,
        ticket: &str,
        _service_url: &str,
    ) -> Result<TicketValidation> {
        self.validations.fetch_add(1, Ordering::Relaxed);
        match self.scripts.lock().unwrap().get(ticket) {
            Some(ScriptedValidation::Valid(session)) => {
                Ok(TicketValidation::Valid(session.clone()))
            }
            Some(ScriptedValidation::Error) => {
                Err(CasError::protocol("transport failure (scripted)"))
            }
            Some(ScriptedValidation::Invalid) | None => Ok(TicketValidation::Invalid {
                code: "INVALID_TICKET".to_owned(),
                message: format!("ticket {ticket} not recognized"),
            }),
        }
    }
}

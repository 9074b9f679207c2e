//! Host application collaborator traits.
//!
//! The bridge never owns user records, host sessions, or settings
//! persistence. It reaches them through the narrow traits defined here,
//! implemented by the embedding application. In-memory implementations for
//! tests live in [`crate::testing`].

use crate::attributes::ProfileFields;
use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A user record as the host application sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostUser {
    /// Host-side identifier, opaque to the bridge
    pub id: String,

    /// Login name, matched against the CAS principal
    pub login: String,

    /// Whether the account may establish sessions
    pub active: bool,
}

/// Lifecycle status assigned to users the bridge provisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserStatus {
    /// Provisioned through CAS auto-create, pending any host-side activation
    Registered,
}

/// A user record to be created by the host on first CAS login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    /// Login name, taken from the CAS principal
    pub login: String,

    /// Profile fields mapped from CAS attributes
    pub fields: ProfileFields,

    /// Initial status
    pub status: UserStatus,
}

/// Host user storage.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a user by login name.
    async fn find_by_login(&self, login: &str) -> Result<Option<HostUser>>;

    /// Create a new user record.
    async fn create_user(&self, user: NewUser) -> Result<HostUser>;

    /// Update profile fields on an existing user. Unset fields are left
    /// untouched.
    async fn update_attributes(&self, user: &HostUser, fields: &ProfileFields) -> Result<()>;
}

/// Host settings persistence with string-typed values.
///
/// Implementations must tolerate being queried before the host's persistence
/// layer is fully initialized; returning `Err` in that window is fine, the
/// policy layer collapses it to absence.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Fetch the raw value for a setting key, if present.
    async fn get(&self, key: &str) -> Result<Option<String>>;
}

/// The host's per-request session state.
///
/// Synchronous on purpose: this models an already-materialized request
/// session object, not a remote store.
pub trait HostSession: Send {
    /// Currently authenticated user id, if any.
    fn current_user_id(&self) -> Option<String>;

    /// Establish the session for a user.
    fn set_current_user_id(&mut self, user_id: &str);

    /// Drop all session state.
    fn clear(&mut self);

    /// Queue a user-visible error for the next rendered page.
    fn set_flash_error(&mut self, message: &str);

    /// Read and consume the queued error, if any.
    fn take_flash_error(&mut self) -> Option<String>;
}

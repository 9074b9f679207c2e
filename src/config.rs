//! Configuration types for the CAS bridge.

use crate::stores::SettingsStore;
use serde::{Deserialize, Serialize};

/// Setting key: master toggle for CAS delegation.
pub const KEY_ENABLED: &str = "enabled";
/// Setting key: CAS server base URL.
pub const KEY_BASE_URL: &str = "cas_base_url";
/// Setting key: whether the local login form stays reachable next to CAS.
pub const KEY_LOGIN_WITHOUT_CAS: &str = "login_without_cas";
/// Setting key: provision unknown users on first CAS login.
pub const KEY_AUTO_CREATE_USERS: &str = "auto_create_users";
/// Setting key: refresh profile fields from CAS attributes on every login.
pub const KEY_AUTO_UPDATE_ATTRIBUTES: &str = "auto_update_attributes_on_login";
/// Setting key: propagate logout to the CAS server (single logout).
pub const KEY_CAS_LOGOUT: &str = "cas_logout";

/// Hard-coded defaults, used when the settings store has no value for a key
/// (or is not yet initialized). Values are in the store's string
/// representation.
pub const DEFAULT_SETTINGS: &[(&str, &str)] = &[
    (KEY_ENABLED, "0"),
    (KEY_BASE_URL, ""),
    (KEY_LOGIN_WITHOUT_CAS, "1"),
    (KEY_AUTO_CREATE_USERS, "0"),
    (KEY_AUTO_UPDATE_ATTRIBUTES, "0"),
    (KEY_CAS_LOGOUT, "0"),
];

/// Look up a key in the defaults table.
pub fn default_setting(key: &str) -> Option<&'static str> {
    DEFAULT_SETTINGS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, value)| *value)
}

/// Parse a settings-store boolean. Accepts the usual truthy spellings;
/// anything else, including absence, is false.
pub fn parse_bool(value: Option<&str>) -> bool {
    matches!(
        value.map(str::trim).map(str::to_ascii_lowercase).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

/// Live CAS configuration.
///
/// Owned by [`crate::policy::CasPolicy`] and replaced wholesale on every
/// settings change; request handlers only ever see an immutable snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasConfig {
    /// CAS server base URL, e.g. `https://cas.example.org/cas`. Empty means
    /// unconfigured.
    pub base_url: String,

    /// Master toggle for CAS delegation.
    pub enabled: bool,

    /// Whether the host should still offer its local login form.
    pub login_without_cas: bool,

    /// Provision unknown users on first successful CAS login.
    pub auto_create_users: bool,

    /// Refresh profile fields from CAS attributes on every login.
    pub auto_update_attributes: bool,

    /// Propagate logout to the CAS server.
    pub single_logout: bool,
}

impl Default for CasConfig {
    /// Matches [`DEFAULT_SETTINGS`].
    fn default() -> Self {
        Self {
            base_url: String::new(),
            enabled: false,
            login_without_cas: true,
            auto_create_users: false,
            auto_update_attributes: false,
            single_logout: false,
        }
    }
}

impl CasConfig {
    /// Load a configuration snapshot from the host settings store, falling
    /// back to [`DEFAULT_SETTINGS`] per key. Store errors degrade to the
    /// default value; this must work before the host's persistence layer is
    /// up.
    pub async fn load(settings: &dyn SettingsStore) -> Self {
        let get = |key: &'static str| async move {
            match settings.get(key).await {
                Ok(Some(value)) => Some(value),
                Ok(None) => None,
                Err(err) => {
                    tracing::debug!(key, error = %err, "settings lookup failed, using default");
                    None
                }
            }
            .or_else(|| default_setting(key).map(str::to_owned))
        };

        Self {
            base_url: get(KEY_BASE_URL).await.unwrap_or_default(),
            enabled: parse_bool(get(KEY_ENABLED).await.as_deref()),
            login_without_cas: parse_bool(get(KEY_LOGIN_WITHOUT_CAS).await.as_deref()),
            auto_create_users: parse_bool(get(KEY_AUTO_CREATE_USERS).await.as_deref()),
            auto_update_attributes: parse_bool(get(KEY_AUTO_UPDATE_ATTRIBUTES).await.as_deref()),
            single_logout: parse_bool(get(KEY_CAS_LOGOUT).await.as_deref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemorySettings;

    #[test]
    fn bool_parsing_accepts_common_spellings() {
        assert!(parse_bool(Some("1")));
        assert!(parse_bool(Some("true")));
        assert!(parse_bool(Some("Yes")));
        assert!(parse_bool(Some(" on ")));
        assert!(!parse_bool(Some("0")));
        assert!(!parse_bool(Some("disabled")));
        assert!(!parse_bool(None));
    }

    #[test]
    fn defaults_cover_every_recognized_key() {
        for key in [
            KEY_ENABLED,
            KEY_BASE_URL,
            KEY_LOGIN_WITHOUT_CAS,
            KEY_AUTO_CREATE_USERS,
            KEY_AUTO_UPDATE_ATTRIBUTES,
            KEY_CAS_LOGOUT,
        ] {
            assert!(default_setting(key).is_some(), "missing default for {key}");
        }
        assert_eq!(default_setting("no_such_key"), None);
    }

    #[tokio::test]
    async fn load_falls_back_to_defaults() {
        let settings = MemorySettings::new();
        let config = CasConfig::load(&settings).await;
        assert_eq!(config, CasConfig::default());
        assert!(config.login_without_cas);
        assert!(!config.enabled);
    }

    #[tokio::test]
    async fn load_reads_live_values() {
        let settings = MemorySettings::new();
        settings.put(KEY_ENABLED, "1");
        settings.put(KEY_BASE_URL, "https://cas.example.org/cas");
        settings.put(KEY_AUTO_CREATE_USERS, "true");

        let config = CasConfig::load(&settings).await;
        assert!(config.enabled);
        assert!(config.auto_create_users);
        assert_eq!(config.base_url, "https://cas.example.org/cas");
        assert!(!config.single_logout);
    }

    #[tokio::test]
    async fn load_survives_a_failing_store() {
        let settings = MemorySettings::failing();
        let config = CasConfig::load(&settings).await;
        assert_eq!(config, CasConfig::default());
    }
}

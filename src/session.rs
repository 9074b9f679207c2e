//! The ephemeral CAS session produced by ticket validation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Result of a successful service-ticket validation.
///
/// Lives only for the duration of one authentication exchange: the
/// orchestrator and attribute mapper consume it immediately, and the host's
/// own session object is what persists afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CasSession {
    /// Principal name asserted by the CAS server
    pub user: String,

    /// Extra attributes returned alongside the principal. CAS attributes are
    /// multi-valued; order within a value list is preserved as received.
    pub attributes: HashMap<String, Vec<String>>,
}

impl CasSession {
    /// Create a session for a principal with no extra attributes.
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            attributes: HashMap::new(),
        }
    }

    /// Append an attribute value, preserving earlier values for the same name.
    pub fn push_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes
            .entry(name.into())
            .or_default()
            .push(value.into());
    }

    /// First value of the named attribute, if present and non-empty.
    pub fn first_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attribute_skips_empty_values() {
        let mut session = CasSession::new("jdoe");
        session.push_attribute("mail", "");
        assert_eq!(session.first_attribute("mail"), None);

        session.push_attribute("givenName", "Jane");
        session.push_attribute("givenName", "J.");
        assert_eq!(session.first_attribute("givenName"), Some("Jane"));
        assert_eq!(session.first_attribute("sn"), None);
    }
}

//! Mapping of CAS session attributes onto host profile fields.

use crate::session::CasSession;
use serde::{Deserialize, Serialize};

/// Profile fields the bridge may set on a host user.
///
/// `None` means "leave the host's value untouched"; the mapper never produces
/// an empty-string field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFields {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub mail: Option<String>,
}

impl ProfileFields {
    /// Whether no field would be changed by applying this mapping.
    pub fn is_empty(&self) -> bool {
        self.firstname.is_none() && self.lastname.is_none() && self.mail.is_none()
    }
}

/// Translate CAS attributes into profile fields.
///
/// Recognized attributes follow the usual LDAP-derived CAS vocabulary:
/// `givenName` becomes the first name, `sn` the last name, `mail` the mail
/// address. Only the first value of each attribute is considered, and only
/// when it is non-empty.
pub fn map_attributes(session: &CasSession) -> ProfileFields {
    ProfileFields {
        firstname: session.first_attribute("givenName").map(str::to_owned),
        lastname: session.first_attribute("sn").map(str::to_owned),
        mail: session.first_attribute("mail").map(str::to_owned),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_present_attributes_and_skips_empty() {
        let mut session = CasSession::new("jdoe");
        session.push_attribute("givenName", "Jane");
        session.push_attribute("sn", "Doe");
        session.attributes.insert("mail".to_string(), Vec::new());

        let fields = map_attributes(&session);
        assert_eq!(fields.firstname.as_deref(), Some("Jane"));
        assert_eq!(fields.lastname.as_deref(), Some("Doe"));
        assert_eq!(fields.mail, None);
        assert!(!fields.is_empty());
    }

    #[test]
    fn empty_session_maps_to_empty_fields() {
        let fields = map_attributes(&CasSession::new("jdoe"));
        assert!(fields.is_empty());
    }

    #[test]
    fn empty_first_value_leaves_field_unset() {
        let mut session = CasSession::new("jdoe");
        session.push_attribute("mail", "");
        session.push_attribute("mail", "jdoe@example.org");

        // Only the first value counts; an empty first value means unset.
        let fields = map_attributes(&session);
        assert_eq!(fields.mail, None);
    }
}

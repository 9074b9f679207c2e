//! CAS wire protocol: endpoint construction and ticket validation.
//!
//! The network exchange sits behind [`CasTransport`] so the orchestration
//! layers can be exercised against a scripted transport in tests. The real
//! implementation speaks CAS 2.0 (`/serviceValidate`, XML body) and falls
//! back to CAS 1.0 (`/validate`, plain text) when the server predates the
//! XML endpoint.

use crate::errors::{CasError, Result};
use crate::session::CasSession;
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::time::Duration;
use url::Url;

/// Outcome of a service-ticket validation call.
#[derive(Debug, Clone)]
pub enum TicketValidation {
    /// The CAS server vouched for this principal.
    Valid(CasSession),

    /// The CAS server rejected the ticket.
    Invalid {
        /// Protocol failure code, e.g. `INVALID_TICKET`
        code: String,
        /// Human-readable detail from the server
        message: String,
    },
}

/// The CAS server exchange, seen from the client adapter.
#[async_trait]
pub trait CasTransport: Send + Sync {
    /// Validate a service ticket against the CAS server.
    ///
    /// `Err` means the exchange itself failed (network, malformed response);
    /// a rejected ticket is the `Ok(Invalid { .. })` case. Tickets are
    /// single-use, so implementations must never cache results.
    async fn validate_ticket(
        &self,
        base_url: &Url,
        ticket: &str,
        service_url: &str,
    ) -> Result<TicketValidation>;
}

/// Build a CAS endpoint URL under `base_url` with a `service` parameter.
pub(crate) fn endpoint_url(base_url: &Url, endpoint: &str, service_url: &str) -> Result<Url> {
    let mut url = base_url.clone();
    url.path_segments_mut()
        .map_err(|()| CasError::config(format!("CAS base URL cannot be a base: {base_url}")))?
        .pop_if_empty()
        .push(endpoint);
    url.query_pairs_mut().append_pair("service", service_url);
    Ok(url)
}

/// HTTP implementation of [`CasTransport`] backed by `reqwest`.
pub struct HttpCasTransport {
    client: reqwest::Client,
}

/// Bound on a single validation round trip.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

impl HttpCasTransport {
    /// Build the transport with its own pooled HTTP client.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CasTransport for HttpCasTransport {
    async fn validate_ticket(
        &self,
        base_url: &Url,
        ticket: &str,
        service_url: &str,
    ) -> Result<TicketValidation> {
        let mut validate_url = endpoint_url(base_url, "serviceValidate", service_url)?;
        validate_url.query_pairs_mut().append_pair("ticket", ticket);

        let response = self.client.get(validate_url).send().await?;

        // Old CAS 1.0 deployments have no serviceValidate endpoint.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return self.validate_ticket_cas1(base_url, ticket, service_url).await;
        }

        if !response.status().is_success() {
            return Err(CasError::protocol(format!(
                "serviceValidate returned HTTP {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        parse_service_response(&body)
    }
}

impl HttpCasTransport {
    async fn validate_ticket_cas1(
        &self,
        base_url: &Url,
        ticket: &str,
        service_url: &str,
    ) -> Result<TicketValidation> {
        let mut validate_url = endpoint_url(base_url, "validate", service_url)?;
        validate_url.query_pairs_mut().append_pair("ticket", ticket);

        let response = self.client.get(validate_url).send().await?;
        if !response.status().is_success() {
            return Err(CasError::protocol(format!(
                "validate returned HTTP {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        parse_cas1_response(&body)
    }
}

/// Parse a CAS 2.0 `serviceValidate` XML response.
pub(crate) fn parse_service_response(xml: &str) -> Result<TicketValidation> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    // Local-name path from the document root to the current element.
    let mut path: Vec<String> = Vec::new();
    let mut session: Option<CasSession> = None;
    let mut failure_code: Option<String> = None;
    let mut failure_message = String::new();

    loop {
        match reader
            .read_event()
            .map_err(|err| CasError::protocol(format!("malformed validation response: {err}")))?
        {
            Event::Start(element) => {
                let name = String::from_utf8_lossy(element.local_name().as_ref()).into_owned();
                if name == "authenticationFailure" {
                    let code = element
                        .try_get_attribute("code")
                        .ok()
                        .flatten()
                        .and_then(|attr| attr.unescape_value().ok())
                        .map(|value| value.into_owned())
                        .unwrap_or_default();
                    failure_code = Some(code);
                }
                path.push(name);
            }
            Event::End(_) => {
                path.pop();
            }
            Event::Text(text) => {
                let value = text
                    .unescape()
                    .map_err(|err| {
                        CasError::protocol(format!("malformed validation response: {err}"))
                    })?
                    .into_owned();
                match path.as_slice() {
                    [.., success, user]
                        if success == "authenticationSuccess" && user == "user" =>
                    {
                        session = Some(CasSession::new(value.trim()));
                    }
                    [.., attributes, name] if attributes == "attributes" => {
                        if let Some(session) = session.as_mut() {
                            session.push_attribute(name.clone(), value);
                        }
                    }
                    [.., failure] if failure == "authenticationFailure" => {
                        failure_message = value.trim().to_owned();
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(code) = failure_code {
        return Ok(TicketValidation::Invalid {
            code,
            message: failure_message,
        });
    }
    match session {
        Some(session) if !session.user.is_empty() => Ok(TicketValidation::Valid(session)),
        _ => Err(CasError::protocol(
            "validation response carries neither success nor failure",
        )),
    }
}

/// Parse a CAS 1.0 `validate` plain-text response (`yes\nuser\n` / `no\n\n`).
pub(crate) fn parse_cas1_response(body: &str) -> Result<TicketValidation> {
    let mut lines = body.lines();
    match lines.next().map(str::trim) {
        Some("yes") => {
            let user = lines.next().map(str::trim).unwrap_or_default();
            if user.is_empty() {
                return Err(CasError::protocol("CAS 1.0 response missing principal"));
            }
            Ok(TicketValidation::Valid(CasSession::new(user)))
        }
        Some("no") => Ok(TicketValidation::Invalid {
            code: "INVALID_TICKET".to_owned(),
            message: String::new(),
        }),
        _ => Err(CasError::protocol("unrecognized CAS 1.0 response")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUCCESS_XML: &str = r#"
        <cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
            <cas:authenticationSuccess>
                <cas:user>jdoe</cas:user>
                <cas:attributes>
                    <cas:givenName>Jane</cas:givenName>
                    <cas:sn>Doe</cas:sn>
                    <cas:mail>jdoe@example.org</cas:mail>
                    <cas:mail>jane@example.org</cas:mail>
                </cas:attributes>
            </cas:authenticationSuccess>
        </cas:serviceResponse>"#;

    const FAILURE_XML: &str = r#"
        <cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
            <cas:authenticationFailure code="INVALID_TICKET">
                Ticket ST-1856339 not recognized
            </cas:authenticationFailure>
        </cas:serviceResponse>"#;

    #[test]
    fn parses_success_with_multivalued_attributes() {
        let TicketValidation::Valid(session) = parse_service_response(SUCCESS_XML).unwrap()
        else {
            panic!("expected a valid ticket");
        };
        assert_eq!(session.user, "jdoe");
        assert_eq!(session.first_attribute("givenName"), Some("Jane"));
        assert_eq!(session.first_attribute("sn"), Some("Doe"));
        assert_eq!(
            session.attributes.get("mail").map(Vec::len),
            Some(2),
            "both mail values must survive"
        );
    }

    #[test]
    fn parses_success_without_attributes() {
        let xml = r#"
            <cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas">
                <cas:authenticationSuccess><cas:user>jdoe</cas:user></cas:authenticationSuccess>
            </cas:serviceResponse>"#;
        let TicketValidation::Valid(session) = parse_service_response(xml).unwrap() else {
            panic!("expected a valid ticket");
        };
        assert_eq!(session.user, "jdoe");
        assert!(session.attributes.is_empty());
    }

    #[test]
    fn parses_failure_code_and_message() {
        let TicketValidation::Invalid { code, message } =
            parse_service_response(FAILURE_XML).unwrap()
        else {
            panic!("expected an invalid ticket");
        };
        assert_eq!(code, "INVALID_TICKET");
        assert!(message.contains("ST-1856339"));
    }

    #[test]
    fn rejects_responses_with_neither_outcome() {
        let xml = r#"<cas:serviceResponse xmlns:cas="http://www.yale.edu/tp/cas"/>"#;
        assert!(parse_service_response(xml).is_err());
        assert!(parse_service_response("not xml at all <<<").is_err());
    }

    #[test]
    fn parses_cas1_bodies() {
        assert!(matches!(
            parse_cas1_response("yes\njdoe\n").unwrap(),
            TicketValidation::Valid(session) if session.user == "jdoe"
        ));
        assert!(matches!(
            parse_cas1_response("no\n\n").unwrap(),
            TicketValidation::Invalid { .. }
        ));
        assert!(parse_cas1_response("maybe").is_err());
        assert!(parse_cas1_response("yes\n\n").is_err());
    }

    #[test]
    fn endpoint_urls_keep_the_base_path() {
        let base = Url::parse("https://cas.example.org/cas").unwrap();
        let url = endpoint_url(&base, "login", "https://app.example.org/login").unwrap();
        assert_eq!(url.path(), "/cas/login");
        assert_eq!(
            url.query(),
            Some("service=https%3A%2F%2Fapp.example.org%2Flogin")
        );

        // A trailing slash on the base must not double up.
        let base = Url::parse("https://cas.example.org/cas/").unwrap();
        let url = endpoint_url(&base, "logout", "https://app.example.org/").unwrap();
        assert_eq!(url.path(), "/cas/logout");
    }
}

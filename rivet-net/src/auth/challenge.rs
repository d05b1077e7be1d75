// rivet-net/src/auth/challenge.rs
use std::fmt;

use rivet_common::credentials::Credentials;
use url::Url;

/// Who is asking for credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestorType {
    Proxy,
    Server,
}

/// One authentication request raised by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationChallenge {
    pub host: String,
    pub port: u16,
    pub protocol: String,
    pub scheme: String,
    /// The realm announced by the server, used as the credential realm.
    pub prompt: Option<String>,
    pub site: Option<Url>,
    /// Set when the transport knows whether a proxy or the origin asked.
    pub requestor_type: Option<RequestorType>,
}

impl AuthenticationChallenge {
    pub fn new(host: impl Into<String>, port: u16, protocol: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            protocol: protocol.into(),
            scheme: "Basic".to_string(),
            prompt: None,
            site: None,
            requestor_type: None,
        }
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_site(mut self, site: Url) -> Self {
        self.site = Some(site);
        self
    }

    pub fn with_requestor_type(mut self, requestor_type: RequestorType) -> Self {
        self.requestor_type = Some(requestor_type);
        self
    }

    /// Builds a challenge from a `WWW-Authenticate` / `Proxy-Authenticate` value.
    ///
    /// `host`/`port` name whoever sent the challenge, which is the proxy for
    /// proxy challenges and the URL's origin otherwise.
    pub fn from_header(
        site: &Url,
        host: &str,
        port: u16,
        header_value: &str,
        requestor_type: RequestorType,
    ) -> Self {
        let (scheme, realm) = parse_authenticate_header(header_value);
        let mut challenge = Self::new(host, port, site.scheme())
            .with_site(site.clone())
            .with_requestor_type(requestor_type);
        if let Some(scheme) = scheme {
            challenge.scheme = scheme;
        }
        challenge.prompt = realm;
        challenge
    }
}

/// Splits `Basic realm="Repository Manager", charset="UTF-8"` into
/// (`Basic`, `Repository Manager`).
pub fn parse_authenticate_header(value: &str) -> (Option<String>, Option<String>) {
    let value = value.trim();
    if value.is_empty() {
        return (None, None);
    }
    let (scheme, params) = match value.split_once(char::is_whitespace) {
        Some((scheme, rest)) => (scheme, rest.trim()),
        None => (value, ""),
    };

    let mut realm = None;
    let mut rest = params;
    while !rest.is_empty() {
        let Some((key, after_eq)) = rest.split_once('=') else {
            break;
        };
        let key = key.trim().trim_start_matches(',').trim();
        let after_eq = after_eq.trim_start();
        let (param_value, remainder) = if let Some(quoted) = after_eq.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            }
        } else {
            match after_eq.find(',') {
                Some(end) => (after_eq[..end].trim(), &after_eq[end..]),
                None => (after_eq.trim(), ""),
            }
        };
        if key.eq_ignore_ascii_case("realm") {
            realm = Some(param_value.to_string());
        }
        rest = remainder.trim_start().trim_start_matches(',').trim_start();
    }

    (Some(scheme.to_string()), realm)
}

/// A username/password answer to a challenge.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordAuthentication {
    username: String,
    password: String,
}

impl PasswordAuthentication {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl From<&Credentials> for PasswordAuthentication {
    fn from(c: &Credentials) -> Self {
        Self::new(c.username(), c.password())
    }
}

impl fmt::Debug for PasswordAuthentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordAuthentication")
            .field("username", &self.username)
            .field("password", &"****")
            .finish()
    }
}

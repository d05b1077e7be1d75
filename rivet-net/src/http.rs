// rivet-net/src/http.rs
//! Opening descriptor and schema streams for `file:` and `http(s):` locators.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::blocking::{Client, Response};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, PROXY_AUTHENTICATE,
    PROXY_AUTHORIZATION, USER_AGENT, WWW_AUTHENTICATE,
};
use reqwest::StatusCode;
use rivet_common::config::{Config, ProxySettings};
use rivet_common::error::{Result, RivetError};
use tracing::{debug, error};
use url::Url;

use crate::auth::{AuthenticationChallenge, AuthenticatorSlot, PasswordAuthentication, RequestorType};
use crate::validation::check_scheme;

const CONNECT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT_STRING: &str = "rivet dependency resolver (Rust)";

/// Anything that can turn a locator into a readable byte stream.
pub trait DescriptorSource: Send + Sync + fmt::Debug {
    fn open_stream(&self, url: &Url) -> Result<Box<dyn Read + Send>>;
}

/// Default source: local files plus HTTP(S) with challenge handling.
pub struct UrlHandler {
    client: Client,
    proxy: ProxySettings,
    slot: &'static AuthenticatorSlot,
}

impl UrlHandler {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config)?,
            proxy: config.proxy_settings().clone(),
            slot: AuthenticatorSlot::global(),
        })
    }

    /// Answers challenges from `slot` instead of the process-wide one.
    pub fn with_slot(mut self, slot: &'static AuthenticatorSlot) -> Self {
        self.slot = slot;
        self
    }

    fn open_file(&self, url: &Url) -> Result<Box<dyn Read + Send>> {
        let path = url
            .to_file_path()
            .map_err(|_| RivetError::IoError(format!("Not a local file URL: {url}")))?;
        match File::open(&path) {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No file at {}", path.display());
                Err(RivetError::NotFound(url.to_string()))
            }
            Err(e) => Err(RivetError::IoError(format!(
                "Failed to open {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn open_http(&self, url: &Url) -> Result<Box<dyn Read + Send>> {
        let mut response = self.send(url, None)?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::PROXY_AUTHENTICATION_REQUIRED
        {
            if let Some(answer) = self.answer_challenge(url, &response) {
                debug!("Retrying {} with credentials after HTTP {}", url, status);
                response = self.send(url, Some(answer))?;
            }
        }

        let status = response.status();
        debug!("Received HTTP status: {} for {}", status, url);
        match status {
            s if s.is_success() => Ok(Box::new(response)),
            StatusCode::NOT_FOUND => Err(RivetError::NotFound(url.to_string())),
            _ => {
                error!("HTTP error {} for URL {}", status, url);
                Err(RivetError::HttpError(format!(
                    "HTTP error {status} for URL {url}"
                )))
            }
        }
    }

    fn send(&self, url: &Url, auth: Option<(HeaderName, HeaderValue)>) -> Result<Response> {
        let mut request = self.client.get(url.clone());
        if let Some((name, value)) = auth {
            request = request.header(name, value);
        }
        request.send().map_err(|e| {
            debug!("HTTP request failed for {url}: {e}");
            RivetError::HttpError(format!("HTTP request failed for {url}: {e}"))
        })
    }

    /// Builds the challenge for a 401/407 and asks the installed authenticator.
    fn answer_challenge(&self, url: &Url, response: &Response) -> Option<(HeaderName, HeaderValue)> {
        let origin_host = url.host_str().unwrap_or_default().to_string();
        let origin_port = url.port_or_known_default().unwrap_or(80);

        let (requestor_type, challenge_header, answer_header, host, port) =
            if response.status() == StatusCode::PROXY_AUTHENTICATION_REQUIRED {
                (
                    RequestorType::Proxy,
                    PROXY_AUTHENTICATE,
                    PROXY_AUTHORIZATION,
                    self.proxy.host.clone().unwrap_or(origin_host),
                    self.proxy.port.unwrap_or(origin_port),
                )
            } else {
                (
                    RequestorType::Server,
                    WWW_AUTHENTICATE,
                    AUTHORIZATION,
                    origin_host,
                    origin_port,
                )
            };

        let header_value = response
            .headers()
            .get(&challenge_header)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let challenge =
            AuthenticationChallenge::from_header(url, &host, port, header_value, requestor_type);
        let auth = self.slot.request_password_authentication(&challenge)?;
        basic_authorization(&auth).map(|value| (answer_header, value))
    }
}

impl DescriptorSource for UrlHandler {
    fn open_stream(&self, url: &Url) -> Result<Box<dyn Read + Send>> {
        check_scheme(url)?;
        debug!("Opening stream for {}", url);
        match url.scheme() {
            "file" => self.open_file(url),
            _ => self.open_http(url),
        }
    }
}

impl fmt::Debug for UrlHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlHandler")
            .field("proxy", &self.proxy)
            .finish_non_exhaustive()
    }
}

fn build_http_client(config: &Config) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

    let mut builder = Client::builder()
        .timeout(config.http_timeout)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10));

    let proxy = config.proxy_settings();
    if let Some(host) = proxy.host.as_deref() {
        let proxy_url = format!("http://{}:{}", host, proxy.port.unwrap_or(80));
        debug!("Routing HTTP traffic through proxy {}", proxy_url);
        let mut route = reqwest::Proxy::all(proxy_url.as_str()).map_err(|e| {
            RivetError::Config(format!("Invalid proxy '{proxy_url}': {e}"))
        })?;
        // A 407 on an HTTPS tunnel never surfaces as a response, so the
        // proxy credentials have to ride on the CONNECT request itself.
        if let Some(user) = proxy.effective_user() {
            debug!("authenticating to proxy server with username [{}]", user);
            route = route.basic_auth(user, proxy.password.as_deref().unwrap_or(""));
        }
        builder = builder.proxy(route);
    }

    builder
        .build()
        .map_err(|e| RivetError::HttpError(format!("Failed to build HTTP client: {e}")))
}

fn basic_authorization(auth: &PasswordAuthentication) -> Option<HeaderValue> {
    let encoded = STANDARD.encode(format!("{}:{}", auth.username(), auth.password()));
    let mut value = HeaderValue::from_str(&format!("Basic {encoded}")).ok()?;
    value.set_sensitive(true);
    Some(value)
}

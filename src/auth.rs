// OAuth2 token handling: deciding whether the cached token can be used,
// refreshing it, and running the browser-based authorization-code flow
// when nothing usable is on disk.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::callback;
use crate::config::{Overrides, Settings};
use crate::error::{Error, Result};

pub const AUTH_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/authorize";
pub const TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";
pub const SCOPES: &[&str] = &["offline_access", "https://outlook.office.com/Tasks.ReadWrite"];
pub const CALLBACK_PORT: u16 = 8989;
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(300);

/// Tokens are refreshed this long before they actually expire.
const EXPIRY_MARGIN: i64 = 60;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl Token {
    /// A token without an expiry is assumed valid until the server says
    /// otherwise.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => expiry - chrono::Duration::seconds(EXPIRY_MARGIN) <= now,
            None => false,
        }
    }
}

/// How the token for this run is obtained.
#[derive(Debug, PartialEq)]
pub enum Acquisition {
    Cached(Token),
    Refresh(String),
    Interactive,
}

/// Pick the cheapest way to a usable token. A stored refresh token always
/// avoids the browser.
pub fn plan(settings: &Settings, now: DateTime<Utc>) -> Acquisition {
    if let Some(token) = &settings.token {
        if !token.access_token.is_empty() && !token.is_expired(now) {
            return Acquisition::Cached(token.clone());
        }
        if !token.refresh_token.is_empty() {
            return Acquisition::Refresh(token.refresh_token.clone());
        }
    }
    match settings.access_token.as_deref() {
        Some(access) if !access.is_empty() => Acquisition::Cached(Token {
            access_token: access.to_string(),
            refresh_token: String::new(),
            expiry: None,
        }),
        _ => Acquisition::Interactive,
    }
}

/// Token endpoint reply.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_token(self, previous_refresh: Option<&str>) -> Token {
        let refresh_token = self
            .refresh_token
            .filter(|r| !r.is_empty())
            .or_else(|| previous_refresh.map(str::to_string))
            .unwrap_or_default();
        Token {
            access_token: self.access_token,
            refresh_token,
            expiry: self.expires_in.and_then(expiry_after),
        }
    }
}

/// Expiry `secs` from now, or `None` when the provider sent a value chrono
/// cannot represent.
fn expiry_after(secs: i64) -> Option<DateTime<Utc>> {
    TimeDelta::try_seconds(secs).and_then(|delta| Utc::now().checked_add_signed(delta))
}

/// Opens the sign-in page for the user.
pub type Launcher = fn(&str) -> io::Result<()>;

/// Talks to the OAuth provider on behalf of one registered client.
pub struct Authorizer {
    client: Client,
    client_id: String,
    client_secret: String,
    auth_url: String,
    token_url: String,
    port: u16,
    timeout: Duration,
    launcher: Launcher,
}

impl Authorizer {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Authorizer {
            client,
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            auth_url: settings.auth_url.clone().unwrap_or_else(|| AUTH_URL.into()),
            token_url: settings.token_url.clone().unwrap_or_else(|| TOKEN_URL.into()),
            port: CALLBACK_PORT,
            timeout: AUTH_TIMEOUT,
            launcher: open_browser,
        })
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_launcher(mut self, launcher: Launcher) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    /// URL the user's browser is sent to.
    pub fn authorize_url(&self, state: &str) -> Result<Url> {
        let scope = SCOPES.join(" ");
        let redirect = self.redirect_uri();
        let url = Url::parse_with_params(
            &self.auth_url,
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", redirect.as_str()),
                ("scope", scope.as_str()),
                ("state", state),
            ],
        )?;
        Ok(url)
    }

    /// Run the interactive authorization-code flow and return a fresh token.
    /// Blocks until the browser comes back, the provider reports an error,
    /// or the timeout elapses.
    pub fn authorize(&self) -> Result<Token> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, self.port));
        let listener = TcpListener::bind(addr).map_err(|source| Error::Bind {
            addr: addr.to_string(),
            source,
        })?;

        let state = new_state();
        let url = self.authorize_url(&state)?;
        log::debug!("opening browser for authorization");
        if let Err(e) = (self.launcher)(url.as_str()) {
            log::warn!("could not launch a browser: {}", e);
            println!("Open this URL in your browser to sign in:\n\n  {}\n", url);
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message("Waiting for sign-in to complete in the browser...");
        spinner.enable_steady_tick(Duration::from_millis(120));
        let code = callback::wait_for_code(listener, &state, self.timeout);
        spinner.finish_and_clear();

        self.exchange(&code?)
    }

    /// Trade an authorization code for a token.
    pub fn exchange(&self, code: &str) -> Result<Token> {
        let redirect = self.redirect_uri();
        let scope = SCOPES.join(" ");
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect.as_str()),
            ("scope", scope.as_str()),
        ];
        self.request_token(&params, None)
    }

    /// Trade a refresh token for a new token. The old refresh token is kept
    /// if the provider does not issue a new one.
    pub fn refresh(&self, refresh_token: &str) -> Result<Token> {
        let scope = SCOPES.join(" ");
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("scope", scope.as_str()),
        ];
        self.request_token(&params, Some(refresh_token))
    }

    fn request_token(&self, params: &[(&str, &str)], previous_refresh: Option<&str>) -> Result<Token> {
        let mut form: Vec<(&str, &str)> = vec![("client_id", self.client_id.as_str())];
        if !self.client_secret.is_empty() {
            form.push(("client_secret", self.client_secret.as_str()));
        }
        form.extend_from_slice(params);

        log::debug!("POST {}", self.token_url);
        let res = self.client.post(&self.token_url).form(&form).send()?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().unwrap_or_default();
            return Err(Error::TokenExchange { status, body });
        }
        let reply: TokenResponse = res.json()?;
        Ok(reply.into_token(previous_refresh))
    }
}

/// Load the token for this run, refreshing or re-authorizing as needed. Any
/// newly obtained token is written back to `path` before it is returned;
/// `overrides` are used for the exchange but never saved.
pub fn obtain_token(settings: &mut Settings, overrides: &Overrides, path: &Path) -> Result<Token> {
    let effective = settings.with_overrides(overrides);
    let acquisition = plan(&effective, Utc::now());
    let token = match acquisition {
        Acquisition::Cached(token) => {
            log::debug!("using cached token");
            return Ok(token);
        }
        Acquisition::Refresh(refresh_token) => {
            log::debug!("cached token expired, refreshing");
            Authorizer::from_settings(&effective)?.refresh(&refresh_token)?
        }
        Acquisition::Interactive => {
            if effective.client_id.is_empty() {
                return Err(Error::MissingClientId {
                    path: path.to_path_buf(),
                });
            }
            Authorizer::from_settings(&effective)?.authorize()?
        }
    };
    settings.token = Some(token.clone());
    settings.access_token = None;
    settings.save(path)?;
    Ok(token)
}

/// 16 random bytes, hex encoded.
pub fn new_state() -> String {
    let bytes: [u8; 16] = rand::random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn open_browser(url: &str) -> io::Result<()> {
    open::that(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(access: &str, refresh: &str, expiry: Option<DateTime<Utc>>) -> Token {
        Token {
            access_token: access.into(),
            refresh_token: refresh.into(),
            expiry,
        }
    }

    #[test]
    fn fresh_token_is_used_as_is() {
        let now = Utc::now();
        let t = token("a", "r", Some(now + chrono::Duration::hours(1)));
        let settings = Settings {
            token: Some(t.clone()),
            ..Default::default()
        };
        assert_eq!(plan(&settings, now), Acquisition::Cached(t));
    }

    #[test]
    fn expired_token_with_refresh_is_refreshed() {
        let now = Utc::now();
        let settings = Settings {
            token: Some(token("a", "r", Some(now - chrono::Duration::minutes(5)))),
            ..Default::default()
        };
        assert_eq!(plan(&settings, now), Acquisition::Refresh("r".into()));
    }

    #[test]
    fn refresh_token_never_triggers_browser() {
        let now = Utc::now();
        for t in [
            token("", "r", None),
            token("a", "r", Some(now)),
            token("", "r", Some(now + chrono::Duration::hours(1))),
        ] {
            let settings = Settings {
                token: Some(t),
                ..Default::default()
            };
            assert_ne!(plan(&settings, now), Acquisition::Interactive);
        }
    }

    #[test]
    fn token_close_to_expiry_counts_as_expired() {
        let now = Utc::now();
        let t = token("a", "r", Some(now + chrono::Duration::seconds(30)));
        assert!(t.is_expired(now));
        assert!(!token("a", "r", None).is_expired(now));
    }

    #[test]
    fn legacy_access_token_is_used() {
        let settings = Settings {
            access_token: Some("legacy".into()),
            ..Default::default()
        };
        assert_eq!(
            plan(&settings, Utc::now()),
            Acquisition::Cached(token("legacy", "", None))
        );
    }

    #[test]
    fn nothing_stored_means_interactive() {
        assert_eq!(plan(&Settings::default(), Utc::now()), Acquisition::Interactive);
        let settings = Settings {
            access_token: Some(String::new()),
            token: Some(token("a", "", Some(Utc::now() - chrono::Duration::hours(1)))),
            ..Default::default()
        };
        assert_eq!(plan(&settings, Utc::now()), Acquisition::Interactive);
    }

    #[test]
    fn state_is_32_hex_chars() {
        let state = new_state();
        assert_eq!(state.len(), 32);
        assert!(state.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(state, new_state());
    }

    #[test]
    fn authorize_url_carries_flow_parameters() {
        let settings = Settings {
            client_id: "my-client".into(),
            ..Default::default()
        };
        let auth = Authorizer::from_settings(&settings).unwrap();
        let url = auth.authorize_url("abc123").unwrap();
        assert!(url.as_str().starts_with(AUTH_URL));
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["client_id"], "my-client");
        assert_eq!(pairs["redirect_uri"], "http://localhost:8989");
        assert_eq!(pairs["state"], "abc123");
        assert!(pairs["scope"].contains("offline_access"));
        assert!(pairs["scope"].contains("Tasks.ReadWrite"));
    }

    #[test]
    fn absurd_expires_in_leaves_expiry_unset() {
        let reply = TokenResponse {
            access_token: "new".into(),
            refresh_token: Some("r".into()),
            expires_in: Some(i64::MAX),
        };
        let t = reply.into_token(None);
        assert_eq!(t.access_token, "new");
        assert_eq!(t.expiry, None);
        assert!(expiry_after(-1).unwrap() < Utc::now());
    }

    #[test]
    fn busy_port_is_fatal_before_browser() {
        fn no_browser(_: &str) -> io::Result<()> {
            panic!("browser must not open when the port is taken");
        }
        let held = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = held.local_addr().unwrap().port();
        let settings = Settings {
            client_id: "my-client".into(),
            ..Default::default()
        };
        let err = Authorizer::from_settings(&settings)
            .unwrap()
            .with_port(port)
            .with_timeout(Duration::from_secs(1))
            .with_launcher(no_browser)
            .authorize()
            .unwrap_err();
        assert!(matches!(err, Error::Bind { .. }), "got {:?}", err);
    }

    #[test]
    fn token_response_keeps_previous_refresh() {
        let reply = TokenResponse {
            access_token: "new".into(),
            refresh_token: None,
            expires_in: Some(3600),
        };
        let t = reply.into_token(Some("old-refresh"));
        assert_eq!(t.access_token, "new");
        assert_eq!(t.refresh_token, "old-refresh");
        assert!(t.expiry.unwrap() > Utc::now());
    }
}

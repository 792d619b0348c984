//! Form-based login over curl with the cookie engine enabled.
//!
//! All steps share one easy handle so cookies set by any step (landing page,
//! identity provider, relay) end up in the same jar.

use curl::easy::Easy;
use std::time::Duration;
use url::form_urlencoded;

use crate::config::AuthConfig;
use crate::session::Session;
use crate::task::Credentials;

use super::hidden::hidden_inputs;
use super::{Authenticator, LoginError};

/// [`Authenticator`] driven by the `[auth]` config section.
#[derive(Debug, Clone)]
pub struct FormLogin {
    config: AuthConfig,
    connect_timeout: Duration,
    timeout: Duration,
}

impl FormLogin {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            connect_timeout: Duration::from_secs(30),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeouts(mut self, connect_timeout: Duration, timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self.timeout = timeout;
        self
    }

    fn new_handle(&self) -> Result<Easy, curl::Error> {
        let mut easy = Easy::new();
        // Empty file name enables the in-memory cookie engine without reading anything.
        easy.cookie_file("")?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(self.connect_timeout)?;
        easy.timeout(self.timeout)?;
        Ok(easy)
    }

    fn credential_form(&self, credentials: &Credentials) -> String {
        let mut form = form_urlencoded::Serializer::new(String::new());
        form.append_pair(&self.config.username_field, &credentials.username);
        form.append_pair(&self.config.password_field, &credentials.password);
        for (k, v) in &self.config.extra_fields {
            form.append_pair(k, v);
        }
        form.finish()
    }
}

impl Authenticator for FormLogin {
    fn login(&self, credentials: &Credentials) -> Result<Session, LoginError> {
        let mut easy = self.new_handle()?;

        if let Some(landing) = &self.config.landing_url {
            tracing::debug!("setting up session at {}", landing);
            check_status(get(&mut easy, landing)?.0)?;
        }

        tracing::debug!("posting credentials to {}", self.config.login_url);
        let (status, body) = post(&mut easy, &self.config.login_url, &self.credential_form(credentials))?;
        tracing::debug!(status, "credential form answered");
        check_status(status)?;

        if let Some(relay) = &self.config.relay_url {
            let page = String::from_utf8_lossy(&body);
            let fields = hidden_inputs(&page);
            tracing::debug!(fields = fields.len(), "relaying hidden fields to {}", relay);
            let mut form = form_urlencoded::Serializer::new(String::new());
            for (k, v) in &fields {
                form.append_pair(k, v);
            }
            check_status(post(&mut easy, relay, &form.finish())?.0)?;
        }

        if let Some(landing) = &self.config.landing_url {
            check_status(get(&mut easy, landing)?.0)?;
        }

        let session = read_cookie_jar(&mut easy)?;
        match session.cookie(&self.config.session_cookie) {
            Some(value) => {
                tracing::debug!(cookie = %self.config.session_cookie, len = value.len(), "session cookie obtained");
                Ok(session)
            }
            None => Err(LoginError::Rejected(format!(
                "no {} cookie after login (wrong credentials?)",
                self.config.session_cookie
            ))),
        }
    }
}

/// Redirects are followed, so anything left at 400 and above is a failed step.
fn check_status(status: u32) -> Result<(), LoginError> {
    if status >= 400 {
        return Err(LoginError::Http(status));
    }
    Ok(())
}

fn get(easy: &mut Easy, url: &str) -> Result<(u32, Vec<u8>), curl::Error> {
    easy.url(url)?;
    easy.get(true)?;
    perform(easy)
}

fn post(easy: &mut Easy, url: &str, form: &str) -> Result<(u32, Vec<u8>), curl::Error> {
    easy.url(url)?;
    easy.post(true)?;
    easy.post_fields_copy(form.as_bytes())?;
    perform(easy)
}

fn perform(easy: &mut Easy) -> Result<(u32, Vec<u8>), curl::Error> {
    let mut body = Vec::new();
    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }
    let status = easy.response_code()?;
    Ok((status, body))
}

/// Collect name/value pairs from curl's cookie jar (Netscape format lines).
fn read_cookie_jar(easy: &mut Easy) -> Result<Session, curl::Error> {
    let mut session = Session::new();
    for line in easy.cookies()?.iter() {
        let line = String::from_utf8_lossy(line);
        if let Some((name, value)) = parse_netscape_cookie(&line) {
            session.insert(name, value);
        }
    }
    Ok(session)
}

/// Parse `domain \t flag \t path \t secure \t expiry \t name \t value`.
/// `#HttpOnly_` prefixed lines are cookies too; other `#` lines are comments.
pub(crate) fn parse_netscape_cookie(line: &str) -> Option<(String, String)> {
    let line = line.trim_end_matches(|c: char| c == '\r' || c == '\n');
    if line.starts_with('#') && !line.starts_with("#HttpOnly_") {
        return None;
    }
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 7 || fields[5].is_empty() {
        return None;
    }
    Some((fields[5].to_string(), fields[6].to_string()))
}

//! The login flow: sign-in form, credential check and the optional emailed passcode.

use super::{Session, EMAIL_OTP, SIGN_IN, SIGN_IN_PAGE};
use crate::api::{Page, Params};
use crate::error::{Error, Result};
use crate::html::{Document, ElementExt};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use tracing::{debug, info};

const CSRF_META: &str = r#"meta[name="csrf-token"]"#;
const CSRF_HEADER: &str = "X-CSRF-Token";
const XHR_HEADER: &str = "X-Requested-With";
const XHR: &str = "XMLHttpRequest";
/// Any landing URL that contains this is the passcode challenge.
const OTP_MARKER: &str = "email_otp";

/// Where a session is in the login flow.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    /// The site emailed a passcode. Finish with `Session::submit_otp`.
    AwaitingOtp,
    Authenticated,
    /// The credentials or the passcode were rejected. Only a new `login` can leave this state.
    Failed,
}

/// The login state together with what each state needs to carry.
#[derive(Debug, Clone, Default)]
pub(super) enum Auth {
    #[default]
    Unauthenticated,
    AwaitingOtp {
        form: Params,
    },
    Authenticated {
        headers: Params,
    },
    Failed,
}

impl Auth {
    fn state(&self) -> AuthState {
        match self {
            Auth::Unauthenticated => AuthState::Unauthenticated,
            Auth::AwaitingOtp { .. } => AuthState::AwaitingOtp,
            Auth::Authenticated { .. } => AuthState::Authenticated,
            Auth::Failed => AuthState::Failed,
        }
    }

    pub(super) fn headers(&self) -> Option<&Params> {
        match self {
            Auth::Authenticated { headers } => Some(headers),
            _ => None,
        }
    }
}

impl Session {
    pub fn state(&self) -> AuthState {
        self.auth.state()
    }

    /// Signs in with the session's credentials.
    ///
    /// Returns `Error::NeedOtp` when the site emails a one-time passcode, in which case the
    /// session waits in `AuthState::AwaitingOtp` for `submit_otp`. Rejected credentials move the
    /// session to `AuthState::Failed`. Connection and page errors leave the state as it was.
    pub async fn login(&mut self) -> Result<()> {
        debug!("Loading the sign-in form");
        let sign_in = self
            .transport
            .get(&self.endpoints.app(SIGN_IN_PAGE)?, &Params::new())
            .await?;
        let mut form = Params::new()
            .with("authenticity_token", csrf_token(&sign_in.body)?)
            .with("_method", "post")
            .with("mfid_user[email]", &self.credentials.email)
            .with("mfid_user[password]", &self.credentials.password)
            .with("select_account", "true");
        for (name, value) in sign_in.url.query_pairs() {
            form.push(name, value);
        }

        debug!("Submitting credentials for {}", self.credentials.email);
        let landed = self
            .transport
            .post(&self.endpoints.id(SIGN_IN)?, &Params::new(), &form)
            .await?;
        self.land(landed, true)
    }

    /// Finishes a login that returned `Error::NeedOtp` with the passcode from the email.
    ///
    /// Does nothing when already logged in. Fails with `Error::NotInitialized` if `login` has not
    /// been called and with `Error::LoginFailed` after a rejected login.
    pub async fn submit_otp(&mut self, code: &str) -> Result<()> {
        let mut form = match &self.auth {
            Auth::Authenticated { .. } => return Ok(()),
            Auth::AwaitingOtp { form } => form.clone(),
            Auth::Unauthenticated => return Err(Error::NotInitialized),
            Auth::Failed => return Err(Error::LoginFailed),
        };
        form.set("email_otp", code.trim());

        debug!("Submitting the one-time passcode");
        let landed = self
            .transport
            .post(&self.endpoints.id(EMAIL_OTP)?, &Params::new(), &form)
            .await?;
        self.land(landed, false)
    }

    /// Decides the login outcome from where the site sent us.
    fn land(&mut self, page: Page, otp_allowed: bool) -> Result<()> {
        if self.endpoints.is_app_root(&page.url) {
            let headers = Params::new()
                .with(CSRF_HEADER, csrf_token(&page.body)?)
                .with(XHR_HEADER, XHR);
            self.auth = Auth::Authenticated { headers };
            info!("Logged in as {}", self.credentials.email);
            Ok(())
        } else if otp_allowed && page.url.as_str().contains(OTP_MARKER) {
            let form = otp_form(&page.body)?;
            self.auth = Auth::AwaitingOtp { form };
            info!("The site sent a one-time passcode to {}", self.credentials.email);
            Err(Error::NeedOtp)
        } else {
            debug!("Login ended at {}", page.url.path());
            self.auth = Auth::Failed;
            Err(Error::LoginFailed)
        }
    }
}

/// The anti-forgery token of a page.
fn csrf_token(body: &str) -> Result<String> {
    let doc = Document::parse(body);
    let meta = doc.require(CSRF_META)?;
    Ok(meta.require_attr("content")?.to_string())
}

/// Builds the passcode form from the challenge page: the authorization parameters the page embeds
/// in a script, plus the page's own anti-forgery token.
fn otp_form(body: &str) -> Result<Params> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"gon\.authorizationParams\s*=\s*(\{.*?\})\s*;")
            .expect("hardcoded regex should be valid")
    });
    let json = re
        .captures(body)
        .and_then(|c| c.get(1))
        .ok_or_else(|| Error::scrape("The passcode page has no authorization parameters"))?
        .as_str();
    let params: Map<String, Value> = serde_json::from_str(json)
        .map_err(|e| Error::scrape(format!("Unreadable authorization parameters: {e}")))?;

    let mut form: Params = params
        .into_iter()
        .map(|(name, value)| match value {
            Value::String(s) => (name, s),
            other => (name, other.to_string()),
        })
        .collect();
    form.set("authenticity_token", csrf_token(body)?);
    form.set("method", "post");
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Reply, TestTransport};
    use crate::session::tests::session;

    #[tokio::test]
    async fn test_login_without_otp() {
        let site = TestTransport::default();
        let mut session = session(&site);
        assert_eq!(session.state(), AuthState::Unauthenticated);
        session.login().await.unwrap();
        assert_eq!(session.state(), AuthState::Authenticated);

        let request = site.last("POST", SIGN_IN).unwrap();
        assert_eq!(request.url.host_str(), Some("id.moneyforward.com"));
        let form = request.params;
        assert_eq!(form.get("authenticity_token"), Some("signin-token"));
        assert_eq!(form.get("mfid_user[email]"), Some("user@example.com"));
        assert_eq!(form.get("mfid_user[password]"), Some("hunter2"));
        assert_eq!(form.get("select_account"), Some("true"));
        assert_eq!(form.get("client_id"), Some("mf-client"));
        assert_eq!(form.get("response_type"), Some("code"));
    }

    #[tokio::test]
    async fn test_login_with_otp() {
        let site = TestTransport::default();
        site.require_otp();
        let mut session = session(&site);

        let err = session.login().await.unwrap_err();
        assert!(matches!(err, Error::NeedOtp));
        assert_eq!(session.state(), AuthState::AwaitingOtp);

        session.submit_otp(" 123456 ").await.unwrap();
        assert_eq!(session.state(), AuthState::Authenticated);

        let form = site.last("POST", EMAIL_OTP).unwrap().params;
        assert_eq!(form.get("email_otp"), Some("123456"));
        assert_eq!(form.get("authenticity_token"), Some("otp-token"));
        assert_eq!(form.get("method"), Some("post"));
        assert_eq!(form.get("state"), Some("st-1"));
        assert_eq!(form.get("client_id"), Some("mf-client"));
    }

    #[tokio::test]
    async fn test_otp_challenge_under_another_path() {
        let site = TestTransport::default();
        site.require_otp_at("https://id.moneyforward.com/sign_in/email_otp?client_id=x");
        let mut session = session(&site);
        assert!(matches!(session.login().await, Err(Error::NeedOtp)));
        assert_eq!(session.state(), AuthState::AwaitingOtp);
        session.submit_otp("123456").await.unwrap();
        assert_eq!(session.state(), AuthState::Authenticated);
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let site = TestTransport::default();
        site.route(
            "POST",
            SIGN_IN,
            Reply::redirected("https://id.moneyforward.com/sign_in", "<html></html>"),
        );
        let mut session = session(&site);
        assert!(matches!(session.login().await, Err(Error::LoginFailed)));
        assert_eq!(session.state(), AuthState::Failed);
        assert!(matches!(session.submit_otp("1").await, Err(Error::LoginFailed)));
    }

    #[tokio::test]
    async fn test_rejected_otp() {
        let site = TestTransport::default();
        site.require_otp();
        site.route(
            "POST",
            EMAIL_OTP,
            Reply::redirected("https://id.moneyforward.com/email_otp", "<html></html>"),
        );
        let mut session = session(&site);
        assert!(matches!(session.login().await, Err(Error::NeedOtp)));
        assert!(matches!(session.submit_otp("000000").await, Err(Error::LoginFailed)));
        assert_eq!(session.state(), AuthState::Failed);
    }

    #[tokio::test]
    async fn test_submit_otp_before_login() {
        let site = TestTransport::default();
        let mut session = session(&site);
        assert!(matches!(session.submit_otp("1").await, Err(Error::NotInitialized)));
        assert!(site.requests().is_empty());
    }

    #[tokio::test]
    async fn test_submit_otp_when_logged_in_is_noop() {
        let site = TestTransport::default();
        let mut session = session(&site);
        session.login().await.unwrap();
        let before = site.requests().len();
        session.submit_otp("1").await.unwrap();
        assert_eq!(site.requests().len(), before);
    }

    #[tokio::test]
    async fn test_connection_error_keeps_state() {
        let site = TestTransport::default();
        site.route("POST", SIGN_IN, Reply::status(503));
        let mut session = session(&site);
        assert!(matches!(session.login().await, Err(Error::Connection(_))));
        assert_eq!(session.state(), AuthState::Unauthenticated);
    }

    #[test]
    fn test_otp_form_missing_params() {
        let body = r#"<html><head><meta name="csrf-token" content="t"></head></html>"#;
        assert!(matches!(otp_form(body), Err(Error::Scrape(_))));
    }
}

//! The gateway protocol: forward-auth checks, login, and access requests.

use anyhow::Context;
use axum::{
    http::{HeaderMap, StatusCode, header::HOST},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::form_urlencoded;

use super::{
    GatewayConfig, GatewayError,
    authz::{Authorizer, Decision, RequestOutcome},
    cookies::CookieSigner,
    credentials::{hash_password, valid_email, verify_password},
    relay::{RedirectRelay, see_other},
    session::SessionManager,
    target::{forwarded_target, pick_target, site_origin},
    token::TokenBridge,
};
use crate::store::{AccessRequest, CredentialStore, Role, SignupOutcome, SiteState, User};

/// Result of a forward-auth check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthOutcome {
    Allowed { user: String },
    Denied { user: String },
    /// Not authenticated yet; the browser goes to the login page.
    Login { location: String },
    /// Authenticated, but the user never asked for this site.
    RequestAccess { location: String },
}

/// An [`AuthOutcome`] plus the cookies to send with it.
#[derive(Debug)]
pub struct Handoff {
    pub outcome: AuthOutcome,
    pub cookies: HeaderMap,
}

impl Handoff {
    /// # Errors
    /// Returns an error if a redirect location cannot be encoded.
    pub fn respond(self) -> Result<Response, GatewayError> {
        match self.outcome {
            AuthOutcome::Allowed { .. } => Ok((StatusCode::OK, self.cookies).into_response()),
            AuthOutcome::Denied { .. } => {
                Ok((StatusCode::UNAUTHORIZED, self.cookies).into_response())
            }
            AuthOutcome::Login { location } | AuthOutcome::RequestAccess { location } => {
                see_other(&location, self.cookies)
            }
        }
    }
}

/// Successful login.
#[derive(Debug)]
pub struct LoginOutcome {
    pub user: User,
    /// Where the browser should go next, when known.
    pub redirect_url: Option<String>,
    pub cookies: HeaderMap,
}

pub struct Gateway {
    config: GatewayConfig,
    store: Arc<dyn CredentialStore>,
    tokens: Arc<dyn TokenBridge>,
    sessions: SessionManager,
    relay: RedirectRelay,
    authorizer: Authorizer,
}

impl Gateway {
    /// # Errors
    /// Returns [`GatewayError::InvalidDomain`] when the base URL has no registrable domain.
    pub fn new(
        config: GatewayConfig,
        store: Arc<dyn CredentialStore>,
        tokens: Arc<dyn TokenBridge>,
    ) -> Result<Self, GatewayError> {
        let signer = Arc::new(CookieSigner::new(config.session_secret()));
        let sessions = SessionManager::new(
            signer.clone(),
            config.base_url(),
            config.session_ttl_seconds(),
            config.pending_session_ttl_seconds(),
        )?;
        let relay = RedirectRelay::new(signer, config.redirect_ttl_seconds());
        let authorizer = Authorizer::new(store.clone());
        Ok(Self {
            config,
            store,
            tokens,
            sessions,
            relay,
            authorizer,
        })
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Forward-auth check for the site the reverse proxy is asking about.
    ///
    /// # Errors
    /// [`GatewayError::MissingTarget`] when no target can be found,
    /// [`GatewayError::Unauthenticated`] when the session names an unknown user.
    #[instrument(skip_all)]
    pub async fn authenticate(
        &self,
        headers: &HeaderMap,
        redirect: Option<&str>,
    ) -> Result<Handoff, GatewayError> {
        let target = pick_target(forwarded_target(headers), redirect, self.relay.recall(headers))
            .ok_or(GatewayError::MissingTarget)?;
        let site = site_origin(&target)?;
        let session = self.sessions.read(headers).unwrap_or_default();
        let mut cookies = HeaderMap::new();

        let email = if let Some(user) = session.principal() {
            user.to_string()
        } else if let Some(user) = self.tokens.consume(&session.pending) {
            self.sessions.issue_for(&target, &user, &mut cookies)?;
            info!(site = %site, "Promoted pending session");
            user
        } else {
            self.relay.remember(&target, &mut cookies)?;
            let token = self.tokens.create()?;
            self.sessions.begin_pending(&target, &token, &mut cookies)?;
            debug!(site = %site, "Redirecting to login");
            return Ok(Handoff {
                outcome: AuthOutcome::Login {
                    location: self.login_location(&target, &token),
                },
                cookies,
            });
        };

        let user = self
            .store
            .find_user_by_email(&email)
            .await?
            .ok_or(GatewayError::Unauthenticated)?;
        let outcome = match self.authorizer.decide(&user, &site).await? {
            Decision::Allow => AuthOutcome::Allowed { user: email },
            Decision::Deny => AuthOutcome::Denied { user: email },
            Decision::RequireRequest => AuthOutcome::RequestAccess {
                location: self.request_location(&site),
            },
        };
        Ok(Handoff { outcome, cookies })
    }

    /// Verify credentials and open a gateway session.
    ///
    /// # Errors
    /// [`GatewayError::NotFound`] for an unknown email,
    /// [`GatewayError::Unauthenticated`] for a wrong password.
    #[instrument(skip_all)]
    pub async fn login(
        &self,
        headers: &HeaderMap,
        email: &str,
        password: &str,
        redirect: Option<&str>,
        token: Option<&str>,
    ) -> Result<LoginOutcome, GatewayError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(GatewayError::BadRequest(
                "Email and password are required".to_string(),
            ));
        }
        let user = self
            .store
            .find_user_by_email(email)
            .await?
            .ok_or(GatewayError::NotFound("User"))?;

        let password = password.to_string();
        let stored_hash = user.password_hash.clone();
        let verified = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
            .await
            .context("password verification task failed")??;
        if !verified {
            warn!("Invalid password");
            return Err(GatewayError::Unauthenticated);
        }

        let mut cookies = HeaderMap::new();
        self.sessions.issue(&user.email, &mut cookies)?;

        let redirect_url = pick_target(None, redirect, self.relay.recall(headers));
        if let Some(target) = &redirect_url {
            self.relay.remember(target, &mut cookies)?;
        }
        if let Some(token) = token.filter(|token| !token.is_empty()) {
            if !self.tokens.resolve(token, &user.email) {
                warn!("Login carried a handoff token that is no longer pending");
            }
        }

        info!(user = %user.email, "Login successful");
        Ok(LoginOutcome {
            user,
            redirect_url,
            cookies,
        })
    }

    /// Create a `user` account.
    ///
    /// # Errors
    /// [`GatewayError::BadRequest`] for invalid input,
    /// [`GatewayError::Conflict`] when the email is taken.
    #[instrument(skip_all)]
    pub async fn register(&self, email: &str, password: &str) -> Result<User, GatewayError> {
        let email = email.trim();
        if !valid_email(email) {
            return Err(GatewayError::BadRequest("Invalid email".to_string()));
        }
        if password.is_empty() {
            return Err(GatewayError::BadRequest("Password is required".to_string()));
        }
        match self.create_account(email, password, Role::User).await? {
            SignupOutcome::Created(user) => {
                info!(user = %user.email, "User registered");
                Ok(user)
            }
            SignupOutcome::Conflict => Err(GatewayError::Conflict("User already exists".to_string())),
        }
    }

    /// The authenticated user behind a request.
    ///
    /// # Errors
    /// [`GatewayError::Unauthenticated`] without a valid session for an existing user.
    pub async fn principal(&self, headers: &HeaderMap) -> Result<User, GatewayError> {
        let session = self
            .sessions
            .read(headers)
            .map_err(|_| GatewayError::Unauthenticated)?;
        let email = session.principal().ok_or(GatewayError::Unauthenticated)?;
        self.store
            .find_user_by_email(email)
            .await?
            .ok_or(GatewayError::Unauthenticated)
    }

    /// # Errors
    /// [`GatewayError::Unauthenticated`] without a session,
    /// [`GatewayError::BadRequest`] for a target that is not an http(s) URL.
    pub async fn request_access(
        &self,
        headers: &HeaderMap,
        redirect: &str,
    ) -> Result<RequestOutcome, GatewayError> {
        let user = self.principal(headers).await?;
        let site = site_origin(redirect)?;
        self.authorizer.request(&user, &site).await
    }

    /// # Errors
    /// [`GatewayError::Unauthenticated`] without a session, [`GatewayError::Forbidden`] for non-admins.
    pub async fn list_requests(&self, headers: &HeaderMap) -> Result<Vec<AccessRequest>, GatewayError> {
        let actor = self.principal(headers).await?;
        self.authorizer.list(&actor).await
    }

    /// # Errors
    /// [`GatewayError::Forbidden`] for non-admins, [`GatewayError::NotFound`] for unknown references.
    pub async fn update_request(
        &self,
        headers: &HeaderMap,
        user_email: &str,
        site_url: &str,
        state: SiteState,
    ) -> Result<(), GatewayError> {
        let actor = self.principal(headers).await?;
        let site = site_origin(site_url)?;
        self.authorizer
            .set_state(&actor, user_email, &site, state)
            .await
    }

    /// Cookies that end the gateway session.
    ///
    /// # Errors
    /// Returns an error if the header cannot be encoded.
    pub fn logout(&self) -> Result<HeaderMap, GatewayError> {
        let mut cookies = HeaderMap::new();
        self.sessions.invalidate(&mut cookies)?;
        Ok(cookies)
    }

    /// Send the browser back to where it started and drop the remembered target.
    ///
    /// # Errors
    /// Returns an error if the location cannot be encoded.
    pub fn finish_redirect(&self, headers: &HeaderMap) -> Result<Response, GatewayError> {
        let target = self
            .relay
            .recall(headers)
            .or_else(|| {
                headers
                    .get(HOST)
                    .and_then(|host| host.to_str().ok())
                    .filter(|host| !host.is_empty())
                    .map(|host| format!("https://{host}/"))
            })
            .unwrap_or_else(|| self.config.base_url().to_string());
        let mut cookies = HeaderMap::new();
        self.relay.forget(&mut cookies)?;
        see_other(&target, cookies)
    }

    /// Create the bootstrap admin unless the email is already registered.
    ///
    /// # Errors
    /// Returns an error if hashing or persistence fails.
    pub async fn bootstrap_admin(&self, email: &str, password: &str) -> anyhow::Result<bool> {
        if self.store.find_user_by_email(email).await?.is_some() {
            debug!(admin = email, "Admin user already present");
            return Ok(false);
        }
        match self.create_account(email, password, Role::Admin).await? {
            SignupOutcome::Created(user) => {
                info!(admin = %user.email, "Created admin user");
                Ok(true)
            }
            SignupOutcome::Conflict => Ok(false),
        }
    }

    /// Drop expired handoff tokens.
    pub fn purge_expired_tokens(&self) -> usize {
        self.tokens.purge_expired()
    }

    /// # Errors
    /// Returns an error when the store is unreachable.
    pub async fn ping(&self) -> anyhow::Result<()> {
        self.store.ping().await
    }

    async fn create_account(
        &self,
        email: &str,
        password: &str,
        role: Role,
    ) -> anyhow::Result<SignupOutcome> {
        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .context("password hashing task failed")??;
        self.store.create_user(email, &hash, role).await
    }

    fn login_location(&self, target: &str, token: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("redirect", target.trim_end_matches('/'))
            .append_pair("token", token)
            .finish();
        format!("{}?{query}", self.config.login_url())
    }

    fn request_location(&self, site: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("redirect", site)
            .finish();
        format!("{}?{query}", self.config.request_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::token::MemoryTokenBridge;
    use crate::store::MemoryStore;
    use anyhow::{Result, bail};
    use axum::http::{HeaderValue, header::COOKIE, header::SET_COOKIE};
    use secrecy::SecretString;
    use std::time::Duration;

    fn gateway() -> Result<Gateway> {
        let config = GatewayConfig::new(
            "https://auth.example.com",
            SecretString::from("facade-secret".to_string()),
        );
        Ok(Gateway::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryTokenBridge::new(Duration::from_secs(900))),
        )?)
    }

    fn jar(cookies: &HeaderMap) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for value in cookies.get_all(SET_COOKIE) {
            if let Some(pair) = value.to_str()?.split(';').next() {
                headers.append(COOKIE, HeaderValue::from_str(pair)?);
            }
        }
        Ok(headers)
    }

    fn token_of(location: &str) -> Option<String> {
        let (_, query) = location.split_once('?')?;
        form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.into_owned())
    }

    #[tokio::test]
    async fn missing_target_is_rejected() -> Result<()> {
        let gateway = gateway()?;
        assert!(matches!(
            gateway.authenticate(&HeaderMap::new(), None).await,
            Err(GatewayError::MissingTarget)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn unauthenticated_check_starts_handoff() -> Result<()> {
        let gateway = gateway()?;
        let handoff = gateway
            .authenticate(&HeaderMap::new(), Some("https://app.example.com/"))
            .await?;
        let AuthOutcome::Login { location } = &handoff.outcome else {
            bail!("expected login redirect, got {:?}", handoff.outcome);
        };
        assert!(location.starts_with(
            "https://auth.example.com/login?redirect=https%3A%2F%2Fapp.example.com&token="
        ));
        assert_eq!(token_of(location).map(|t| t.len()), Some(64));
        assert_eq!(handoff.cookies.get_all(SET_COOKIE).iter().count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn resolved_token_promotes_session_once() -> Result<()> {
        let gateway = gateway()?;
        gateway.register("alice@example.com", "pw").await?;

        let first = gateway
            .authenticate(&HeaderMap::new(), Some("https://app.other.com"))
            .await?;
        let AuthOutcome::Login { location } = &first.outcome else {
            bail!("expected login redirect");
        };
        let token = token_of(location).context("token missing")?;
        let pending_jar = jar(&first.cookies)?;

        gateway
            .login(&HeaderMap::new(), "alice@example.com", "pw", None, Some(&token))
            .await?;

        let promoted = gateway
            .authenticate(&pending_jar, Some("https://app.other.com"))
            .await?;
        assert!(matches!(promoted.outcome, AuthOutcome::RequestAccess { .. }));
        let cookie = promoted
            .cookies
            .get(SET_COOKIE)
            .context("promoted session cookie missing")?
            .to_str()?;
        assert!(cookie.contains("Domain=other.com"));

        // The same pending cookie cannot be promoted twice.
        let replay = gateway
            .authenticate(&pending_jar, Some("https://app.other.com"))
            .await?;
        assert!(matches!(replay.outcome, AuthOutcome::Login { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn login_failures() -> Result<()> {
        let gateway = gateway()?;
        gateway.register("bob@example.com", "right").await?;
        assert!(matches!(
            gateway
                .login(&HeaderMap::new(), "nobody@example.com", "x", None, None)
                .await,
            Err(GatewayError::NotFound("User"))
        ));
        assert!(matches!(
            gateway
                .login(&HeaderMap::new(), "bob@example.com", "wrong", None, None)
                .await,
            Err(GatewayError::Unauthenticated)
        ));
        assert!(matches!(
            gateway.login(&HeaderMap::new(), "", "", None, None).await,
            Err(GatewayError::BadRequest(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn login_reports_known_target() -> Result<()> {
        let gateway = gateway()?;
        gateway.register("bob@example.com", "pw").await?;
        let outcome = gateway
            .login(
                &HeaderMap::new(),
                "bob@example.com",
                "pw",
                Some("https://app.example.com"),
                None,
            )
            .await?;
        assert_eq!(outcome.redirect_url.as_deref(), Some("https://app.example.com"));

        let outcome = gateway
            .login(&HeaderMap::new(), "bob@example.com", "pw", Some("null"), None)
            .await?;
        assert_eq!(outcome.redirect_url, None);
        Ok(())
    }

    #[tokio::test]
    async fn register_validates_and_detects_duplicates() -> Result<()> {
        let gateway = gateway()?;
        let user = gateway.register("  carol@example.com ", "pw").await?;
        assert_eq!(user.email, "carol@example.com");
        assert_eq!(user.role, Role::User);
        assert!(matches!(
            gateway.register("carol@example.com", "pw").await,
            Err(GatewayError::Conflict(_))
        ));
        assert!(matches!(
            gateway.register("not-an-email", "pw").await,
            Err(GatewayError::BadRequest(_))
        ));
        assert!(matches!(
            gateway.register("dave@example.com", "").await,
            Err(GatewayError::BadRequest(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn bootstrap_admin_runs_once() -> Result<()> {
        let gateway = gateway()?;
        assert!(gateway.bootstrap_admin("root@example.com", "pw").await?);
        assert!(!gateway.bootstrap_admin("root@example.com", "other").await?);
        Ok(())
    }

    #[tokio::test]
    async fn finish_redirect_falls_back_to_host() -> Result<()> {
        let gateway = gateway()?;
        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_static("auth.example.com"));
        let response = gateway.finish_redirect(&headers)?;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response
                .headers()
                .get(axum::http::header::LOCATION)
                .context("location missing")?,
            "https://auth.example.com/"
        );

        let response = gateway.finish_redirect(&HeaderMap::new())?;
        assert_eq!(
            response
                .headers()
                .get(axum::http::header::LOCATION)
                .context("location missing")?,
            "https://auth.example.com"
        );
        Ok(())
    }
}

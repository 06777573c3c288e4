//! Per (user, site) authorization.
//!
//! ```text
//! (none) --request--> Requested --admin--> Authorized | Declined
//! Declined --admin--> Requested
//! ```
//!
//! Admins bypass the table entirely.

use std::sync::Arc;
use tracing::{info, instrument};

use super::GatewayError;
use crate::store::{AccessRequest, CredentialStore, Role, SiteState, User};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    RequireRequest,
    Deny,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    Created,
    /// A row already existed and was left untouched.
    Existing(SiteState),
}

#[must_use]
pub fn decide_for(role: Role, state: Option<SiteState>) -> Decision {
    if role == Role::Admin {
        return Decision::Allow;
    }
    match state {
        None => Decision::RequireRequest,
        Some(SiteState::Authorized) => Decision::Allow,
        Some(SiteState::Requested | SiteState::Declined) => Decision::Deny,
    }
}

pub struct Authorizer {
    store: Arc<dyn CredentialStore>,
}

impl Authorizer {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// # Errors
    /// Returns [`GatewayError::Store`] when the lookup fails.
    #[instrument(skip(self, user), fields(user = %user.email))]
    pub async fn decide(&self, user: &User, site_url: &str) -> Result<Decision, GatewayError> {
        if user.is_admin() {
            return Ok(Decision::Allow);
        }
        let Some(site) = self.store.find_site_by_url(site_url).await? else {
            return Ok(Decision::RequireRequest);
        };
        let state = self.store.user_site_state(user.id, site.id).await?;
        Ok(decide_for(user.role, state))
    }

    /// Record an access request. Never overwrites an existing row.
    ///
    /// # Errors
    /// Returns [`GatewayError::Store`] when persistence fails.
    #[instrument(skip(self, user), fields(user = %user.email))]
    pub async fn request(&self, user: &User, site_url: &str) -> Result<RequestOutcome, GatewayError> {
        let site = self.store.ensure_site(site_url).await?;
        if self
            .store
            .insert_user_site(user.id, site.id, SiteState::Requested)
            .await?
        {
            info!(site = site_url, "Access requested");
            return Ok(RequestOutcome::Created);
        }
        let state = self
            .store
            .user_site_state(user.id, site.id)
            .await?
            .unwrap_or(SiteState::Requested);
        Ok(RequestOutcome::Existing(state))
    }

    /// Change the state of an existing request.
    ///
    /// # Errors
    /// [`GatewayError::Forbidden`] unless `actor` is an admin,
    /// [`GatewayError::NotFound`] when the user, site or request is unknown.
    #[instrument(skip(self, actor), fields(actor = %actor.email))]
    pub async fn set_state(
        &self,
        actor: &User,
        target_email: &str,
        site_url: &str,
        state: SiteState,
    ) -> Result<(), GatewayError> {
        if !actor.is_admin() {
            return Err(GatewayError::Forbidden);
        }
        let target = self
            .store
            .find_user_by_email(target_email)
            .await?
            .ok_or(GatewayError::NotFound("User"))?;
        let site = self
            .store
            .find_site_by_url(site_url)
            .await?
            .ok_or(GatewayError::NotFound("Site"))?;
        if !self.store.update_user_site(target.id, site.id, state).await? {
            return Err(GatewayError::NotFound("Request"));
        }
        info!(%state, "Access request updated");
        Ok(())
    }

    /// # Errors
    /// [`GatewayError::Forbidden`] unless `actor` is an admin.
    pub async fn list(&self, actor: &User) -> Result<Vec<AccessRequest>, GatewayError> {
        if !actor.is_admin() {
            return Err(GatewayError::Forbidden);
        }
        Ok(self.store.list_user_sites().await?)
    }
}

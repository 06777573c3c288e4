//! Credential and authorization persistence.
//!
//! The gateway never talks to a database directly; it goes through the
//! [`CredentialStore`] trait so the Postgres implementation can be swapped for
//! the in-memory one in tests and local runs.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;
use uuid::Uuid;

/// Role attached to a user record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(format!("invalid role: {other}")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authorization state of a (user, site) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SiteState {
    Requested,
    Authorized,
    Declined,
}

impl SiteState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Authorized => "authorized",
            Self::Declined => "declined",
        }
    }
}

impl FromStr for SiteState {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "requested" => Ok(Self::Requested),
            "authorized" => Ok(Self::Authorized),
            "declined" => Ok(Self::Declined),
            other => Err(format!("invalid state: {other}")),
        }
    }
}

impl fmt::Display for SiteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

impl User {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Site {
    pub id: Uuid,
    pub url: String,
}

/// One row of the admin listing: a user, a site and the state between them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AccessRequest {
    pub user: String,
    pub site: String,
    pub state: SiteState,
}

/// Outcome when attempting to create a new user.
#[derive(Debug)]
pub enum SignupOutcome {
    Created(User),
    Conflict,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn create_user(&self, email: &str, password_hash: &str, role: Role)
    -> Result<SignupOutcome>;

    async fn find_site_by_url(&self, url: &str) -> Result<Option<Site>>;

    /// Return the site for `url`, creating it when it has never been seen.
    async fn ensure_site(&self, url: &str) -> Result<Site>;

    async fn user_site_state(&self, user_id: Uuid, site_id: Uuid) -> Result<Option<SiteState>>;

    /// Insert a (user, site) row. Returns `false` without touching anything
    /// when the row already exists.
    async fn insert_user_site(&self, user_id: Uuid, site_id: Uuid, state: SiteState)
    -> Result<bool>;

    /// Update the state of an existing row. Returns `false` when no row exists.
    async fn update_user_site(&self, user_id: Uuid, site_id: Uuid, state: SiteState)
    -> Result<bool>;

    async fn list_user_sites(&self) -> Result<Vec<AccessRequest>>;

    async fn ping(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_state_parses_known_values_only() {
        assert_eq!("requested".parse::<SiteState>(), Ok(SiteState::Requested));
        assert_eq!("authorized".parse::<SiteState>(), Ok(SiteState::Authorized));
        assert_eq!("declined".parse::<SiteState>(), Ok(SiteState::Declined));
        assert!("Authorized".parse::<SiteState>().is_err());
        assert!("".parse::<SiteState>().is_err());
    }

    #[test]
    fn site_state_serializes_lowercase() -> anyhow::Result<()> {
        let value = serde_json::to_value(SiteState::Declined)?;
        assert_eq!(value, serde_json::json!("declined"));
        let decoded: SiteState = serde_json::from_value(serde_json::json!("authorized"))?;
        assert_eq!(decoded, SiteState::Authorized);
        assert!(serde_json::from_value::<SiteState>(serde_json::json!("pending")).is_err());
        Ok(())
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::Admin, Role::User] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("root".parse::<Role>().is_err());
    }
}

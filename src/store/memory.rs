//! In-process [`CredentialStore`] for local runs and tests.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AccessRequest, CredentialStore, Role, SignupOutcome, Site, SiteState, User};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<String, User>,
    sites: HashMap<String, Site>,
    user_sites: HashMap<(Uuid, Uuid), SiteState>,
}

/// Keeps every table behind a single lock so each call is atomic, matching the
/// per-call guarantees of the Postgres store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(email).cloned())
    }

    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<SignupOutcome> {
        let mut tables = self.tables.write().await;
        if tables.users.contains_key(email) {
            return Ok(SignupOutcome::Conflict);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role,
        };
        tables.users.insert(email.to_string(), user.clone());
        Ok(SignupOutcome::Created(user))
    }

    async fn find_site_by_url(&self, url: &str) -> Result<Option<Site>> {
        Ok(self.tables.read().await.sites.get(url).cloned())
    }

    async fn ensure_site(&self, url: &str) -> Result<Site> {
        let mut tables = self.tables.write().await;
        let site = tables
            .sites
            .entry(url.to_string())
            .or_insert_with(|| Site {
                id: Uuid::new_v4(),
                url: url.to_string(),
            });
        Ok(site.clone())
    }

    async fn user_site_state(&self, user_id: Uuid, site_id: Uuid) -> Result<Option<SiteState>> {
        Ok(self
            .tables
            .read()
            .await
            .user_sites
            .get(&(user_id, site_id))
            .copied())
    }

    async fn insert_user_site(
        &self,
        user_id: Uuid,
        site_id: Uuid,
        state: SiteState,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.user_sites.contains_key(&(user_id, site_id)) {
            return Ok(false);
        }
        tables.user_sites.insert((user_id, site_id), state);
        Ok(true)
    }

    async fn update_user_site(
        &self,
        user_id: Uuid,
        site_id: Uuid,
        state: SiteState,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.user_sites.get_mut(&(user_id, site_id)) {
            Some(current) => {
                *current = state;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_user_sites(&self) -> Result<Vec<AccessRequest>> {
        let tables = self.tables.read().await;
        let emails: HashMap<Uuid, &str> = tables
            .users
            .values()
            .map(|user| (user.id, user.email.as_str()))
            .collect();
        let urls: HashMap<Uuid, &str> = tables
            .sites
            .values()
            .map(|site| (site.id, site.url.as_str()))
            .collect();

        let mut rows: Vec<AccessRequest> = tables
            .user_sites
            .iter()
            .filter_map(|((user_id, site_id), state)| {
                Some(AccessRequest {
                    user: (*emails.get(user_id)?).to_string(),
                    site: (*urls.get(site_id)?).to_string(),
                    state: *state,
                })
            })
            .collect();
        rows.sort_by(|a, b| a.user.cmp(&b.user).then_with(|| a.site.cmp(&b.site)));
        Ok(rows)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

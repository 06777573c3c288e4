//! One-time tokens that carry a login across origins.
//!
//! The token is created when an unauthenticated browser is sent to the login
//! page, resolved when that browser logs in, and consumed when the session on
//! the target's domain is promoted. Each token promotes at most one session.

use anyhow::{Context, Result};
use dashmap::DashMap;
use rand::{RngCore, rngs::OsRng};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const TOKEN_BYTES: usize = 32;

pub trait TokenBridge: Send + Sync {
    /// Register a new unresolved token and return it.
    ///
    /// # Errors
    /// Returns an error if the system RNG fails.
    fn create(&self) -> Result<String>;

    /// Attach `user` to `token`. Returns `false` when the token is unknown or expired.
    fn resolve(&self, token: &str, user: &str) -> bool;

    /// Remove a resolved token and return its user.
    ///
    /// Unresolved tokens stay registered so the login they wait for can still
    /// land. Unknown, expired and unresolved tokens all yield `None`.
    fn consume(&self, token: &str) -> Option<String>;

    /// Drop expired entries, returning how many were removed.
    fn purge_expired(&self) -> usize;
}

#[derive(Debug)]
struct PendingToken {
    resolved: bool,
    user: String,
    created_at: Instant,
}

/// Process-local bridge. A gateway restart drops every pending handoff.
#[derive(Debug)]
pub struct MemoryTokenBridge {
    pending: DashMap<String, PendingToken>,
    ttl: Duration,
}

impl MemoryTokenBridge {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: DashMap::new(),
            ttl,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn expired(&self, entry: &PendingToken, now: Instant) -> bool {
        now.saturating_duration_since(entry.created_at) >= self.ttl
    }
}

impl TokenBridge for MemoryTokenBridge {
    fn create(&self) -> Result<String> {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .context("failed to generate handoff token")?;
        let token = hex::encode(bytes);
        self.pending.insert(
            token.clone(),
            PendingToken {
                resolved: false,
                user: String::new(),
                created_at: Instant::now(),
            },
        );
        Ok(token)
    }

    fn resolve(&self, token: &str, user: &str) -> bool {
        let now = Instant::now();
        let live = match self.pending.get_mut(token) {
            Some(mut entry) if !self.expired(&entry, now) => {
                entry.resolved = true;
                entry.user = user.to_string();
                true
            }
            Some(_) => false,
            None => {
                warn!("Attempt to resolve unknown handoff token");
                return false;
            }
        };
        if !live {
            self.pending.remove_if(token, |_, entry| self.expired(entry, now));
            warn!("Attempt to resolve expired handoff token");
        }
        live
    }

    fn consume(&self, token: &str) -> Option<String> {
        if token.is_empty() {
            return None;
        }
        let now = Instant::now();
        let (_, entry) = self
            .pending
            .remove_if(token, |_, entry| entry.resolved || self.expired(entry, now))?;
        if self.expired(&entry, now) {
            debug!("Dropped expired handoff token");
            return None;
        }
        Some(entry.user)
    }

    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.pending.len();
        self.pending.retain(|_, entry| !self.expired(entry, now));
        before.saturating_sub(self.pending.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn tokens_are_256_bit_hex() -> Result<()> {
        let bridge = MemoryTokenBridge::new(Duration::from_secs(60));
        let first = bridge.create()?;
        let second = bridge.create()?;
        assert_eq!(first.len(), TOKEN_BYTES * 2);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, second);
        assert_eq!(bridge.len(), 2);
        Ok(())
    }

    #[test]
    fn resolved_token_is_consumed_once() -> Result<()> {
        let bridge = MemoryTokenBridge::new(Duration::from_secs(60));
        let token = bridge.create()?;
        assert!(bridge.resolve(&token, "alice@example.com"));
        assert_eq!(bridge.consume(&token), Some("alice@example.com".to_string()));
        assert_eq!(bridge.consume(&token), None);
        assert!(bridge.is_empty());
        Ok(())
    }

    #[test]
    fn unresolved_token_survives_consume() -> Result<()> {
        let bridge = MemoryTokenBridge::new(Duration::from_secs(60));
        let token = bridge.create()?;
        assert_eq!(bridge.consume(&token), None);
        assert!(bridge.resolve(&token, "bob@example.com"));
        assert_eq!(bridge.consume(&token), Some("bob@example.com".to_string()));
        Ok(())
    }

    #[test]
    fn unknown_tokens_are_tolerated() {
        let bridge = MemoryTokenBridge::new(Duration::from_secs(60));
        assert!(!bridge.resolve("nope", "alice@example.com"));
        assert_eq!(bridge.consume("nope"), None);
        assert_eq!(bridge.consume(""), None);
    }

    #[test]
    fn expired_tokens_behave_as_unknown() -> Result<()> {
        let bridge = MemoryTokenBridge::new(Duration::ZERO);
        let token = bridge.create()?;
        assert!(!bridge.resolve(&token, "alice@example.com"));
        assert_eq!(bridge.consume(&token), None);
        assert!(bridge.is_empty());
        Ok(())
    }

    #[test]
    fn purge_drops_only_expired_entries() -> Result<()> {
        let stale = MemoryTokenBridge::new(Duration::ZERO);
        stale.create()?;
        stale.create()?;
        assert_eq!(stale.purge_expired(), 2);
        assert!(stale.is_empty());

        let fresh = MemoryTokenBridge::new(Duration::from_secs(60));
        fresh.create()?;
        assert_eq!(fresh.purge_expired(), 0);
        assert_eq!(fresh.len(), 1);
        Ok(())
    }

    #[test]
    fn concurrent_consumers_see_exactly_one_winner() -> Result<()> {
        for _ in 0..50 {
            let bridge = Arc::new(MemoryTokenBridge::new(Duration::from_secs(60)));
            let token = bridge.create()?;
            bridge.resolve(&token, "carol@example.com");

            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let bridge = Arc::clone(&bridge);
                    let token = token.clone();
                    thread::spawn(move || bridge.consume(&token))
                })
                .collect();

            let mut winners = 0;
            for handle in handles {
                match handle.join() {
                    Ok(Some(user)) => {
                        assert_eq!(user, "carol@example.com");
                        winners += 1;
                    }
                    Ok(None) => {}
                    Err(_) => anyhow::bail!("consumer thread panicked"),
                }
            }
            assert_eq!(winners, 1);
        }
        Ok(())
    }
}

//! In-memory client session cache.

use dashmap::DashMap;
use tracing::debug;

use mtaops_protocols::telemetry::ClientSessionCache;

/// Remote platform sessions keyed by user.
#[derive(Default)]
pub struct MemoryClientSessionCache {
    sessions: DashMap<String, String>,
}

impl MemoryClientSessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache `session` for `user`, replacing any previous one.
    pub fn bind(&self, user: impl Into<String>, session: impl Into<String>) {
        self.sessions.insert(user.into(), session.into());
    }

    pub fn contains(&self, user: &str) -> bool {
        self.sessions.contains_key(user)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl ClientSessionCache for MemoryClientSessionCache {
    fn release(&self, user: &str) -> bool {
        let released = self.sessions.remove(user).is_some();
        if released {
            debug!("Released cached client session of {}", user);
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_removes_only_that_user() {
        let cache = MemoryClientSessionCache::new();
        cache.bind("alice", "s1");
        cache.bind("bob", "s2");

        assert!(cache.release("alice"));
        assert!(!cache.release("alice"));
        assert!(cache.contains("bob"));
        assert_eq!(cache.len(), 1);
    }
}

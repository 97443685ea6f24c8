//! Cached id → display name lookups for human-readable reports
//!
//! Resolution never fails: when a lookup errors (not found, forbidden, ...)
//! the id itself is cached and returned. One resolver lives for one command
//! invocation and is shared by handle; nothing is evicted.

use crate::graph::directory::{DirectoryApi, ObjectKind};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

pub struct DirectoryNameResolver {
    api: Arc<dyn DirectoryApi>,
    users: Mutex<HashMap<String, String>>,
    groups: Mutex<HashMap<String, String>>,
    applications: Mutex<HashMap<String, String>>,
    lookups: AtomicUsize,
}

impl DirectoryNameResolver {
    pub fn new(api: Arc<dyn DirectoryApi>) -> Self {
        Self {
            api,
            users: Mutex::new(HashMap::new()),
            groups: Mutex::new(HashMap::new()),
            applications: Mutex::new(HashMap::new()),
            lookups: AtomicUsize::new(0),
        }
    }

    fn cache(&self, kind: ObjectKind) -> &Mutex<HashMap<String, String>> {
        match kind {
            ObjectKind::User => &self.users,
            ObjectKind::Group => &self.groups,
            ObjectKind::Application => &self.applications,
        }
    }

    fn cached(&self, kind: ObjectKind, id: &str) -> Option<String> {
        self.cache(kind)
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(id)
            .cloned()
    }

    pub async fn resolve(&self, kind: ObjectKind, id: &str) -> String {
        if let Some(name) = self.cached(kind, id) {
            return name;
        }

        self.lookups.fetch_add(1, Ordering::Relaxed);
        let name = match self.api.display_name(kind, id).await {
            Ok(name) => name,
            Err(e) => {
                debug!("Could not resolve {} {}: {}", kind, id, e);
                id.to_string()
            }
        };

        self.cache(kind)
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(id.to_string())
            .or_insert(name)
            .clone()
    }

    /// Resolve several ids of one kind, preserving order
    pub async fn resolve_all(&self, kind: ObjectKind, ids: &[String]) -> Vec<String> {
        let mut names = Vec::with_capacity(ids.len());
        for id in ids {
            names.push(self.resolve(kind, id).await);
        }
        names
    }

    /// Number of remote lookups issued so far
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        for kind in [ObjectKind::User, ObjectKind::Group, ObjectKind::Application] {
            self.cache(kind)
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::mock::MockDirectory;

    fn resolver() -> (Arc<MockDirectory>, DirectoryNameResolver) {
        let mock = Arc::new(MockDirectory::new());
        mock.state()
            .display_names
            .insert("u-1".into(), "Adele Vance".into());
        mock.state()
            .display_names
            .insert("00000003-0000-0000-c000-000000000000".into(), "Microsoft Graph".into());
        let resolver = DirectoryNameResolver::new(mock.clone());
        (mock, resolver)
    }

    #[tokio::test]
    async fn test_second_resolve_hits_cache() {
        let (mock, resolver) = resolver();

        assert_eq!(resolver.resolve(ObjectKind::User, "u-1").await, "Adele Vance");
        assert_eq!(resolver.resolve(ObjectKind::User, "u-1").await, "Adele Vance");

        assert_eq!(mock.state().display_name_calls, 1);
        assert_eq!(resolver.lookups(), 1);
    }

    #[tokio::test]
    async fn test_failed_lookup_falls_back_to_id_and_is_cached() {
        let (mock, resolver) = resolver();

        assert_eq!(resolver.resolve(ObjectKind::Group, "g-404").await, "g-404");
        assert_eq!(resolver.resolve(ObjectKind::Group, "g-404").await, "g-404");

        assert_eq!(mock.state().display_name_calls, 1);
    }

    #[tokio::test]
    async fn test_caches_are_independent_per_kind() {
        let (mock, resolver) = resolver();

        resolver.resolve(ObjectKind::User, "u-1").await;
        resolver.resolve(ObjectKind::Group, "u-1").await;
        assert_eq!(mock.state().display_name_calls, 2);

        let names = resolver
            .resolve_all(
                ObjectKind::Application,
                &["00000003-0000-0000-c000-000000000000".to_string()],
            )
            .await;
        assert_eq!(names, vec!["Microsoft Graph".to_string()]);

        resolver.clear();
        resolver.resolve(ObjectKind::User, "u-1").await;
        assert_eq!(mock.state().display_name_calls, 4);
    }
}

use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::Arc;
use tokio::sync::Mutex;
use log::{ debug, warn };

use crate::error::{ SaveState, StoreError };
use crate::models::saved::SavedItem;
use crate::session::Session;
use crate::storage::SavedItemsBackend;

/// Cached saved set in front of a durable backend.
///
/// Writes are confirmed: the backend call runs first and the cache only
/// changes when it succeeds. Mutations queue on `write_gate`, so they apply
/// one at a time in call order and a second toggle always observes the first
/// one's result. The cache lock is only taken to read or apply a result, so
/// reads never wait on a backend call.
pub struct SavedItemsStore {
    backend: Arc<dyn SavedItemsBackend>,
    session: Session,
    items: Mutex<Vec<SavedItem>>,
    write_gate: Mutex<()>,
    loading: AtomicBool,
}

impl SavedItemsStore {
    pub fn new(backend: Arc<dyn SavedItemsBackend>, session: Session) -> Self {
        Self {
            backend,
            session,
            items: Mutex::new(Vec::new()),
            write_gate: Mutex::new(()),
            loading: AtomicBool::new(true),
        }
    }

    /// True until the first load settles, and while any later load runs.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Replaces the cache with the persisted set. On failure the previous
    /// cache stays readable.
    pub async fn load(&self) -> Result<usize, StoreError> {
        let _gate = self.write_gate.lock().await;
        let user = self.session.current_user().await;
        if self.backend.requires_user() && user.is_none() {
            debug!("No signed-in user, keeping an empty saved set");
            self.items.lock().await.clear();
            self.loading.store(false, Ordering::SeqCst);
            return Ok(0);
        }

        self.loading.store(true, Ordering::SeqCst);
        let result = self.backend.load(user.as_ref()).await;
        self.loading.store(false, Ordering::SeqCst);

        match result {
            Ok(mut loaded) => {
                dedup_by_id(&mut loaded);
                let count = loaded.len();
                *self.items.lock().await = loaded;
                debug!("Loaded {} saved items", count);
                Ok(count)
            }
            Err(e) => {
                warn!("Failed to load saved items: {}", e);
                Err(e)
            }
        }
    }

    pub async fn refresh(&self) -> Result<usize, StoreError> {
        self.load().await
    }

    pub async fn toggle_save(&self, item: &SavedItem) -> Result<SaveState, StoreError> {
        let user = self.session.current_user().await;
        if self.backend.requires_user() && user.is_none() {
            warn!("Ignoring save toggle for '{}': no signed-in user", item.id);
            return Err(StoreError::Unauthenticated);
        }

        let _gate = self.write_gate.lock().await;
        if self.is_saved(&item.id).await {
            if let Err(e) = self.backend.remove(user.as_ref(), &item.id).await {
                warn!("Failed to remove saved item '{}': {}", item.id, e);
                return Err(e);
            }
            self.items.lock().await.retain(|saved| saved.id != item.id);
            Ok(SaveState::Removed)
        } else {
            if let Err(e) = self.backend.insert(user.as_ref(), item).await {
                warn!("Failed to save item '{}': {}", item.id, e);
                return Err(e);
            }
            self.items.lock().await.push(item.clone());
            Ok(SaveState::Saved)
        }
    }

    pub async fn is_saved(&self, id: &str) -> bool {
        self.items.lock().await.iter().any(|saved| saved.id == id)
    }

    pub async fn items(&self) -> Vec<SavedItem> {
        self.items.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn clear_all(&self) -> Result<(), StoreError> {
        let user = self.session.current_user().await;
        if self.backend.requires_user() && user.is_none() {
            warn!("Ignoring clear of saved items: no signed-in user");
            return Err(StoreError::Unauthenticated);
        }

        let _gate = self.write_gate.lock().await;
        if let Err(e) = self.backend.clear(user.as_ref()).await {
            warn!("Failed to clear saved items: {}", e);
            return Err(e);
        }
        self.items.lock().await.clear();
        Ok(())
    }

    /// Drops a per-user cache after sign-out. Device-scoped sets stay cached.
    pub async fn on_sign_out(&self) {
        if self.backend.requires_user() {
            self.items.lock().await.clear();
        }
    }
}

fn dedup_by_id(items: &mut Vec<SavedItem>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.id.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use crate::session::AuthUser;
    use crate::storage::kv::{ KeyValueStore, MemoryKv };
    use crate::storage::local::LocalSavedItems;

    const KEY: &str = "@discover_diani_saved_items";

    fn cave() -> SavedItem {
        SavedItem::new("a", "Cave Restaurant").with_category("Restaurant")
    }

    fn local_store() -> (SavedItemsStore, Arc<MemoryKv>) {
        let kv = Arc::new(MemoryKv::new());
        let backend = Arc::new(LocalSavedItems::new(kv.clone(), KEY));
        (SavedItemsStore::new(backend, Session::anonymous()), kv)
    }

    /// Per-user backend that records calls and can be told to fail.
    #[derive(Default)]
    struct ScopedBackend {
        rows: Mutex<Vec<SavedItem>>,
        writes: AtomicUsize,
        fail: AtomicBool,
    }

    impl ScopedBackend {
        fn check(&self, user: Option<&AuthUser>) -> Result<(), StoreError> {
            if user.is_none() {
                return Err(StoreError::Unauthenticated);
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Backend { status: 503, body: "unavailable".into() });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SavedItemsBackend for ScopedBackend {
        fn requires_user(&self) -> bool {
            true
        }

        async fn load(&self, user: Option<&AuthUser>) -> Result<Vec<SavedItem>, StoreError> {
            self.check(user)?;
            Ok(self.rows.lock().await.clone())
        }

        async fn insert(&self, user: Option<&AuthUser>, item: &SavedItem) -> Result<(), StoreError> {
            self.check(user)?;
            tokio::task::yield_now().await;
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.rows.lock().await.push(item.clone());
            Ok(())
        }

        async fn remove(&self, user: Option<&AuthUser>, item_id: &str) -> Result<(), StoreError> {
            self.check(user)?;
            tokio::task::yield_now().await;
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.rows.lock().await.retain(|i| i.id != item_id);
            Ok(())
        }

        async fn clear(&self, user: Option<&AuthUser>) -> Result<(), StoreError> {
            self.check(user)?;
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.rows.lock().await.clear();
            Ok(())
        }
    }

    #[tokio::test]
    async fn basic_save_then_unsave() {
        let (store, _) = local_store();
        store.load().await.unwrap();
        assert_eq!(store.len().await, 0);

        assert_eq!(store.toggle_save(&cave()).await.unwrap(), SaveState::Saved);
        assert!(store.is_saved("a").await);
        assert_eq!(store.len().await, 1);

        assert_eq!(store.toggle_save(&cave()).await.unwrap(), SaveState::Removed);
        assert!(!store.is_saved("a").await);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn toggles_keep_ids_unique_and_persist() {
        let (store, kv) = local_store();
        let ids = ["a", "b", "a", "c", "b", "a"];
        for id in ids {
            store.toggle_save(&SavedItem::new(id, id)).await.unwrap();
        }

        let mut cached: Vec<String> = store.items().await.into_iter().map(|i| i.id).collect();
        cached.sort();
        assert_eq!(cached, vec!["a".to_string(), "c".to_string()]);

        let persisted: Vec<SavedItem> = serde_json::from_str(&kv.get(KEY).await.unwrap().unwrap()).unwrap();
        assert_eq!(persisted.len(), 2);
    }

    #[tokio::test]
    async fn clear_all_empties_cache_and_storage() {
        let (store, kv) = local_store();
        store.toggle_save(&cave()).await.unwrap();
        store.toggle_save(&SavedItem::new("b", "Swahili Beach Resort")).await.unwrap();

        store.clear_all().await.unwrap();
        assert_eq!(store.len().await, 0);
        assert!(!store.is_saved("a").await);
        assert!(!store.is_saved("b").await);
        assert_eq!(kv.get(KEY).await.unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn load_replaces_instead_of_merging() {
        let (store, kv) = local_store();
        store.toggle_save(&cave()).await.unwrap();

        let out_of_band = vec![SavedItem::new("z", "Colobus Conservation")];
        kv.set(KEY, &serde_json::to_string(&out_of_band).unwrap()).await.unwrap();

        assert_eq!(store.load().await.unwrap(), 1);
        assert!(store.is_saved("z").await);
        assert!(!store.is_saved("a").await);
    }

    #[tokio::test]
    async fn load_collapses_duplicate_ids_from_storage() {
        let (store, kv) = local_store();
        let dupes = vec![cave(), cave(), SavedItem::new("b", "b")];
        kv.set(KEY, &serde_json::to_string(&dupes).unwrap()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn failed_load_keeps_stale_cache() {
        let (store, kv) = local_store();
        store.toggle_save(&cave()).await.unwrap();
        kv.set(KEY, "not json").await.unwrap();

        assert!(matches!(store.load().await, Err(StoreError::Serde(_))));
        assert!(store.is_saved("a").await);
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn anonymous_toggle_is_a_logged_no_op() {
        let backend = Arc::new(ScopedBackend::default());
        let store = SavedItemsStore::new(backend.clone(), Session::anonymous());

        let result = store.toggle_save(&cave()).await;
        assert!(matches!(result, Err(StoreError::Unauthenticated)));
        assert_eq!(store.len().await, 0);
        assert_eq!(backend.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_write_leaves_cache_untouched() {
        let backend = Arc::new(ScopedBackend::default());
        let store = SavedItemsStore::new(backend.clone(), Session::signed_in(AuthUser::new("u1")));
        store.toggle_save(&cave()).await.unwrap();

        backend.fail.store(true, Ordering::SeqCst);
        assert!(matches!(store.toggle_save(&cave()).await, Err(StoreError::Backend { status: 503, .. })));
        assert!(store.is_saved("a").await);
        assert!(store.clear_all().await.is_err());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn concurrent_double_toggle_cancels_out() {
        let backend = Arc::new(ScopedBackend::default());
        let store = Arc::new(
            SavedItemsStore::new(backend.clone(), Session::signed_in(AuthUser::new("u1")))
        );

        let first = {
            let store = store.clone();
            tokio::spawn(async move { store.toggle_save(&cave()).await })
        };
        let second = {
            let store = store.clone();
            tokio::spawn(async move { store.toggle_save(&cave()).await })
        };
        let mut states = vec![first.await.unwrap().unwrap(), second.await.unwrap().unwrap()];
        states.sort_by_key(|s| s.is_saved());

        assert_eq!(states, vec![SaveState::Removed, SaveState::Saved]);
        assert!(!store.is_saved("a").await);
        assert!(backend.rows.lock().await.is_empty());
        assert_eq!(backend.writes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn sign_out_drops_per_user_cache() {
        let backend = Arc::new(ScopedBackend::default());
        let session = Session::signed_in(AuthUser::new("u1"));
        let store = SavedItemsStore::new(backend, session.clone());
        store.toggle_save(&cave()).await.unwrap();

        session.sign_out().await;
        store.on_sign_out().await;
        assert_eq!(store.len().await, 0);

        let (device_store, _) = local_store();
        device_store.toggle_save(&cave()).await.unwrap();
        device_store.on_sign_out().await;
        assert!(device_store.is_saved("a").await);
    }

    /// Backend whose inserts park until released.
    #[derive(Default)]
    struct StalledBackend {
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl SavedItemsBackend for StalledBackend {
        fn requires_user(&self) -> bool {
            false
        }

        async fn load(&self, _user: Option<&AuthUser>) -> Result<Vec<SavedItem>, StoreError> {
            Ok(Vec::new())
        }

        async fn insert(&self, _user: Option<&AuthUser>, _item: &SavedItem) -> Result<(), StoreError> {
            self.release.notified().await;
            Ok(())
        }

        async fn remove(&self, _user: Option<&AuthUser>, _item_id: &str) -> Result<(), StoreError> {
            Ok(())
        }

        async fn clear(&self, _user: Option<&AuthUser>) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn reads_do_not_wait_for_a_pending_write() {
        let backend = Arc::new(StalledBackend::default());
        let store = Arc::new(SavedItemsStore::new(backend.clone(), Session::anonymous()));
        store.load().await.unwrap();
        store.items.lock().await.push(SavedItem::new("b", "Swahili Beach Resort"));

        let pending = {
            let store = store.clone();
            tokio::spawn(async move { store.toggle_save(&cave()).await })
        };
        tokio::task::yield_now().await;

        let is_saved = tokio::time::timeout(Duration::from_millis(200), store.is_saved("b")).await;
        assert_eq!(is_saved.ok(), Some(true));
        let len = tokio::time::timeout(Duration::from_millis(200), store.len()).await;
        assert_eq!(len.ok(), Some(1));

        backend.release.notify_one();
        assert_eq!(pending.await.unwrap().unwrap(), SaveState::Saved);
        assert!(store.is_saved("a").await);
    }

    #[tokio::test]
    async fn loading_until_first_load_settles() {
        let (store, _) = local_store();
        assert!(store.is_loading());
        store.load().await.unwrap();
        assert!(!store.is_loading());

        let anonymous = SavedItemsStore::new(Arc::new(ScopedBackend::default()), Session::anonymous());
        assert!(anonymous.is_loading());
        assert_eq!(anonymous.load().await.unwrap(), 0);
        assert!(!anonymous.is_loading());
    }

    #[tokio::test]
    async fn remote_toggle_round_trip() {
        use crate::storage::postgrest::PostgrestClient;
        use crate::storage::remote::RemoteSavedItems;
        use wiremock::matchers::{ body_partial_json, method, path, query_param };
        use wiremock::{ Mock, MockServer, ResponseTemplate };

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/saved_items"))
            .and(body_partial_json(serde_json::json!({ "user_id": "u1", "item_id": "a" })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(
                    serde_json::json!([{ "id": "row-1", "user_id": "u1", "item_id": "a", "title": "Cave Restaurant" }])
                )
            )
            .expect(1)
            .mount(&server).await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/saved_items"))
            .and(query_param("user_id", "eq.u1"))
            .and(query_param("item_id", "eq.a"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server).await;

        let client = PostgrestClient::new(&server.uri(), "anon").unwrap();
        let store = SavedItemsStore::new(
            Arc::new(RemoteSavedItems::new(client)),
            Session::signed_in(AuthUser::new("u1"))
        );

        assert_eq!(store.toggle_save(&cave()).await.unwrap(), SaveState::Saved);
        assert!(store.is_saved("a").await);
        assert_eq!(store.toggle_save(&cave()).await.unwrap(), SaveState::Removed);
        assert!(!store.is_saved("a").await);
    }
}

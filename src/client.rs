//! Client facade: the explicit context object that wires the registry,
//! cache store, deduplicator, transport, and session manager together.
//!
//! Consumers interact through three calls:
//! - [`Client::query`] - cached-or-fetch read of a registered query
//! - [`Client::subscribe`] - reactive read: a handle whose snapshots update
//!   on every cache change, with automatic refetch on invalidation
//! - [`Client::mutate`] - write that applies tag invalidation before its
//!   future resolves
//!
//! There is no global state; independent clients (one per test, one per
//! embedding) never share a cache or a session.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::api::{ApiError, ApiRequest, HttpTransport, Transport};
use crate::auth::guard::AccessGuard;
use crate::auth::session::{Session, SessionManager, SessionWatcher};
use crate::auth::storage::{FileSessionStore, SessionStore};
use crate::cache::dedup::{Deduplicator, FetchOutcome};
use crate::cache::store::{CacheStats, CacheStore, QuerySnapshot, QueryStatus};
use crate::cache::tags::Tag;
use crate::config::Config;
use crate::models::Credentials;
use crate::registry::{EndpointKind, Registry};

#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    registry: Registry,
    store: CacheStore,
    dedup: Deduplicator,
    transport: Arc<dyn Transport>,
    session: Arc<SessionManager>,
    eviction_grace: Duration,
    watcher_interval: Duration,
    watcher: Mutex<Option<SessionWatcher>>,
}

impl Client {
    pub fn new(config: &Config) -> Result<Self> {
        let transport = Arc::new(
            HttpTransport::new(config.base_url.clone()).context("Failed to build transport")?,
        );
        let session_store = Arc::new(
            FileSessionStore::new(config.storage_dir()?)
                .context("Failed to open session storage")?,
        );
        Self::with_parts(config, transport, session_store)
    }

    /// Explicit wiring for tests and embedders: any transport and any
    /// session store.
    pub fn with_parts(
        config: &Config,
        transport: Arc<dyn Transport>,
        session_store: Arc<dyn SessionStore>,
    ) -> Result<Self> {
        let registry = Registry::standard().context("Failed to build endpoint registry")?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                registry,
                store: CacheStore::new(),
                dedup: Deduplicator::new(),
                transport,
                session: Arc::new(SessionManager::new(session_store)),
                eviction_grace: config.eviction_grace(),
                watcher_interval: config.watcher_interval(),
                watcher: Mutex::new(None),
            }),
        })
    }

    /// Restore any persisted session and start the expiry watcher.
    /// Must be called from within a tokio runtime.
    pub fn init(&self) {
        self.inner.session.restore();
        let watcher = self
            .inner
            .session
            .spawn_watcher(self.inner.watcher_interval);
        *self.inner.watcher.lock().expect("watcher lock poisoned") = Some(watcher);
    }

    /// Stop the expiry watcher. Cache contents stay readable.
    pub fn dispose(&self) {
        if let Some(watcher) = self
            .inner
            .watcher
            .lock()
            .expect("watcher lock poisoned")
            .take()
        {
            watcher.cancel();
        }
    }

    pub fn session(&self) -> Arc<SessionManager> {
        Arc::clone(&self.inner.session)
    }

    pub fn guard(&self) -> AccessGuard {
        AccessGuard::new(Arc::clone(&self.inner.session))
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<Session, ApiError> {
        self.inner
            .session
            .login(self.inner.transport.as_ref(), credentials)
            .await
    }

    pub fn logout(&self) {
        self.inner.session.logout();
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.inner.store.stats();
        stats.in_flight = self.inner.dedup.in_flight_count();
        stats
    }

    /// One-shot read. Served from cache when the entry is fulfilled and not
    /// stale; otherwise fetched through the deduplicator, so concurrent
    /// reads of the same key collapse to one call.
    pub async fn query(&self, name: &str, args: Value) -> FetchOutcome {
        let endpoint = match self.inner.registry.get(name) {
            Some(endpoint) => endpoint,
            None => return Err(Arc::new(ApiError::UnknownEndpoint(name.to_string()))),
        };
        if endpoint.kind != EndpointKind::Query {
            return Err(Arc::new(ApiError::KindMismatch {
                name: name.to_string(),
                expected: "query",
                actual: endpoint.kind_str(),
            }));
        }

        let key = endpoint.cache_key(&args);
        self.inner.store.ensure_entry(&key, endpoint.name, &args);

        if let Some(value) = self.inner.store.fresh_value(&key) {
            debug!(key = %key, "Serving from cache");
            return Ok(value);
        }
        self.run_fetch(&key).await
    }

    /// Reactive read. Registers a subscriber on the entry, fetching if it
    /// has never been fetched, was rejected, or is stale. Dropping the
    /// returned handle unsubscribes and schedules grace-period eviction.
    pub fn subscribe(&self, name: &str, args: Value) -> Result<Subscription, ApiError> {
        let endpoint = self
            .inner
            .registry
            .get(name)
            .ok_or_else(|| ApiError::UnknownEndpoint(name.to_string()))?;
        if endpoint.kind != EndpointKind::Query {
            return Err(ApiError::KindMismatch {
                name: name.to_string(),
                expected: "query",
                actual: endpoint.kind_str(),
            });
        }

        let key = endpoint.cache_key(&args);
        let receiver = self.inner.store.subscribe_entry(&key, endpoint.name, &args);

        if self.inner.store.needs_fetch(&key) {
            self.spawn_fetch(key.clone());
        }

        Ok(Subscription {
            key,
            client: self.clone(),
            receiver,
        })
    }

    /// Write path. On success the endpoint's declared tag set is applied to
    /// the cache before this future resolves: entries with subscribers flip
    /// to pending in the same turn and refetch in the background, orphaned
    /// entries go stale and refetch on their next read.
    pub async fn mutate(&self, name: &str, args: Value) -> FetchOutcome {
        let endpoint = match self.inner.registry.get(name) {
            Some(endpoint) => endpoint,
            None => return Err(Arc::new(ApiError::UnknownEndpoint(name.to_string()))),
        };
        if endpoint.kind != EndpointKind::Mutation {
            return Err(Arc::new(ApiError::KindMismatch {
                name: name.to_string(),
                expected: "mutation",
                actual: endpoint.kind_str(),
            }));
        }

        let mut request = ApiRequest::new(endpoint.method.clone(), endpoint.path(&args));
        request.body = endpoint.body_value(&args);
        request.token = self.inner.session.token();

        match self.inner.transport.execute(request).await {
            Ok(data) => {
                let tags = endpoint.invalidates(&args);
                debug!(endpoint = name, tags = tags.len(), "Mutation succeeded, invalidating");
                let refetch = self.inner.store.mark_stale(&tags);
                self.spawn_refetches(refetch);
                Ok(data)
            }
            Err(err) => {
                if err.is_auth_error() {
                    warn!(endpoint = name, "Unauthorized mutation, expiring session");
                    self.inner.session.mark_expired();
                }
                Err(Arc::new(err))
            }
        }
    }

    /// Manual invalidation, behaving exactly like a mutation's declared tag
    /// set. Consumers should rarely need it - registered mutations already
    /// invalidate their views.
    pub fn invalidate(&self, tags: &[Tag]) {
        let refetch = self.inner.store.mark_stale(tags);
        self.spawn_refetches(refetch);
    }

    /// Execute the network call for `key` through the deduplicator. Only
    /// the dedup leader runs the executor and writes the store; followers
    /// receive the published outcome.
    async fn run_fetch(&self, key: &str) -> FetchOutcome {
        let inner = &self.inner;
        let Some((endpoint_name, args)) = inner.store.entry_origin(key) else {
            // Entry evicted between scheduling and execution
            return Err(Arc::new(ApiError::Interrupted));
        };
        let Some(endpoint) = inner.registry.get(endpoint_name) else {
            return Err(Arc::new(ApiError::UnknownEndpoint(endpoint_name.to_string())));
        };

        inner
            .dedup
            .dispatch(key, move || async move {
                inner.store.begin_fetch(key);

                let mut request =
                    ApiRequest::new(endpoint.method.clone(), endpoint.path(&args));
                request.body = endpoint.body_value(&args);
                request.token = inner.session.token();

                match inner.transport.execute(request).await {
                    Ok(data) => {
                        let provides = endpoint.provides(&args, &data);
                        inner.store.write_success(key, data.clone(), &provides);
                        Ok(data)
                    }
                    Err(err) => {
                        if err.is_auth_error() {
                            warn!(key = %key, "Unauthorized response, expiring session");
                            inner.session.mark_expired();
                        }
                        let err = Arc::new(err);
                        inner.store.write_failure(key, Arc::clone(&err));
                        Err(err)
                    }
                }
            })
            .await
    }

    fn spawn_fetch(&self, key: String) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(key = %key, "No runtime available for background fetch");
            return;
        };
        let client = self.clone();
        handle.spawn(async move {
            let _ = client.run_fetch(&key).await;
        });
    }

    fn spawn_refetches(&self, keys: Vec<String>) {
        for key in keys {
            self.spawn_fetch(key);
        }
    }
}

/// Live subscription to one cache entry - the reactive read handle.
/// Snapshots expose `{data, is_loading, error}` and update on every entry
/// change. Dropping the handle releases the subscription; the entry is
/// evicted once orphaned past the grace window.
pub struct Subscription {
    key: String,
    client: Client,
    receiver: watch::Receiver<QuerySnapshot>,
}

impl Subscription {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn snapshot(&self) -> QuerySnapshot {
        self.receiver.borrow().clone()
    }

    /// Wait for the next published change. Returns false if the entry was
    /// evicted from under the subscription.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// Wait until the entry settles out of its loading state.
    pub async fn settled(&mut self) -> QuerySnapshot {
        loop {
            let snapshot = self.snapshot();
            let loading = snapshot.is_loading()
                || snapshot.status == QueryStatus::Uninitialized;
            if !loading {
                return snapshot;
            }
            if !self.changed().await {
                return self.snapshot();
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(epoch) = self.client.inner.store.unsubscribe(&self.key) else {
            return;
        };
        // Last subscriber gone: schedule eviction after the grace window.
        // Outside a runtime the entry simply stays resident.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let client = self.client.clone();
        let key = self.key.clone();
        let grace = client.inner.eviction_grace;
        handle.spawn(async move {
            tokio::time::sleep(grace).await;
            client.inner.store.evict_if_orphaned(&key, epoch);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::mock::MockTransport;
    use crate::auth::storage::MemorySessionStore;
    use crate::cache::tags::Resource;
    use chrono::Utc;

    fn test_client() -> (Client, Arc<MockTransport>, Arc<MemorySessionStore>) {
        let transport = Arc::new(MockTransport::new());
        let session_store = Arc::new(MemorySessionStore::new());
        let transport_dyn: Arc<dyn Transport> = transport.clone();
        let store_dyn: Arc<dyn SessionStore> = session_store.clone();
        let client = Client::with_parts(&Config::default(), transport_dyn, store_dyn).unwrap();
        (client, transport, session_store)
    }

    fn login_route(transport: &MockTransport) {
        transport.route(
            "POST",
            "/auth/login",
            serde_json::json!({
                "token": "tok-abc",
                "user": {"id": 9, "email": "kara@example.com", "firstName": "Kara", "lastName": "Holt"},
                "role": "user",
                "exp": Utc::now().timestamp() + 3600
            }),
        );
    }

    fn credentials() -> Credentials {
        Credentials {
            email: "kara@example.com".into(),
            password: "hunter2".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_simultaneous_subscribers_issue_one_call() {
        let (client, transport, _) = test_client();
        transport.set_delay_ms(20);
        transport.route("GET", "/vehicles/7", serde_json::json!({"id": 7, "name": "GT"}));

        let mut first = client
            .subscribe("getVehicleById", serde_json::json!({"id": 7}))
            .unwrap();
        let mut second = client
            .subscribe("getVehicleById", serde_json::json!({"id": 7}))
            .unwrap();

        let (a, b) = tokio::join!(first.settled(), second.settled());

        assert_eq!(transport.call_count("GET", "/vehicles/7"), 1);
        assert_eq!(a.data, b.data);
        assert_eq!(a.data.unwrap()["name"], "GT");
    }

    #[tokio::test]
    async fn test_query_serves_from_cache_after_first_fetch() {
        let (client, transport, _) = test_client();
        transport.route("GET", "/vehicles", serde_json::json!([{"id": 1}]));

        let first = client.query("listVehicles", Value::Null).await.unwrap();
        let second = client.query("listVehicles", Value::Null).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(transport.call_count("GET", "/vehicles"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_booking_refetches_subscribed_list() {
        let (client, transport, _) = test_client();
        transport.route(
            "GET",
            "/bookings",
            serde_json::json!([{"id": 1, "status": "confirmed"}]),
        );

        let mut list = client.subscribe("listBookings", Value::Null).unwrap();
        let initial = list.settled().await;
        assert_eq!(initial.data.as_ref().unwrap().as_array().unwrap().len(), 1);

        // The server now has a second row; the create triggers the refetch
        transport.route(
            "GET",
            "/bookings",
            serde_json::json!([
                {"id": 1, "status": "confirmed"},
                {"id": 2, "status": "pending"}
            ]),
        );
        transport.route("POST", "/bookings", serde_json::json!({"id": 2}));

        client
            .mutate("createBooking", serde_json::json!({"vehicleId": 7}))
            .await
            .unwrap();

        // Invalidation is visible the moment the mutation resolves
        let snapshot = list.snapshot();
        assert!(snapshot.stale);
        assert!(snapshot.is_loading());

        // No manual refetch call anywhere - the tag graph drives it
        let refreshed = list.settled().await;
        assert_eq!(refreshed.data.unwrap().as_array().unwrap().len(), 2);
        assert!(!refreshed.stale);
        assert_eq!(transport.call_count("GET", "/bookings"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_racing_deletes_leave_entry_consistent() {
        let (client, transport, _) = test_client();
        transport.route("GET", "/bookings", serde_json::json!([{"id": 5}]));
        transport.route("DELETE", "/bookings/5", Value::Null);

        let mut list = client.subscribe("listBookings", Value::Null).unwrap();
        list.settled().await;

        transport.route("GET", "/bookings", serde_json::json!([]));
        let args = serde_json::json!({"id": 5});
        let (a, b) = tokio::join!(
            client.mutate("deleteBooking", args.clone()),
            client.mutate("deleteBooking", args.clone()),
        );
        a.unwrap();
        b.unwrap();

        // Double invalidation: still just stale/refetching, never corrupted
        let settled = list.settled().await;
        assert_eq!(settled.status, QueryStatus::Fulfilled);
        assert_eq!(settled.data.unwrap().as_array().unwrap().len(), 0);
        assert!(!settled.stale);
    }

    #[tokio::test]
    async fn test_unsubscribed_entry_goes_stale_and_refetches_lazily() {
        let (client, transport, _) = test_client();
        transport.route("GET", "/locations", serde_json::json!([{"id": 1}]));

        client.query("listLocations", Value::Null).await.unwrap();
        client.invalidate(&[Tag::all(Resource::Locations)]);

        // Next read refetches instead of serving the stale value
        transport.route("GET", "/locations", serde_json::json!([{"id": 1}, {"id": 2}]));
        let refreshed = client.query("listLocations", Value::Null).await.unwrap();
        assert_eq!(refreshed.as_array().unwrap().len(), 2);
        assert_eq!(transport.call_count("GET", "/locations"), 2);
    }

    #[tokio::test]
    async fn test_logout_then_query_is_anonymous() {
        let (client, transport, _) = test_client();
        login_route(&transport);
        transport.route("GET", "/vehicles", serde_json::json!([]));

        client.login(&credentials()).await.unwrap();
        client.logout();
        client.query("listVehicles", Value::Null).await.unwrap();

        let calls = transport.calls();
        let vehicles_call = calls.iter().find(|c| c.path == "/vehicles").unwrap();
        assert!(vehicles_call.token.is_none());
    }

    #[tokio::test]
    async fn test_authenticated_query_carries_raw_token() {
        let (client, transport, _) = test_client();
        login_route(&transport);
        transport.route("GET", "/bookings", serde_json::json!([]));

        client.login(&credentials()).await.unwrap();
        client.query("listBookings", Value::Null).await.unwrap();

        let calls = transport.calls();
        let call = calls.iter().find(|c| c.path == "/bookings").unwrap();
        // Raw token, no scheme prefix
        assert_eq!(call.token.as_deref(), Some("tok-abc"));
    }

    #[tokio::test]
    async fn test_unauthorized_response_expires_session() {
        let (client, transport, session_store) = test_client();
        login_route(&transport);
        transport.fail("GET", "/tickets", 401);

        client.login(&credentials()).await.unwrap();
        let err = client.query("listTickets", Value::Null).await.unwrap_err();
        assert!(err.is_auth_error());

        // Proactive expiry, independent of the watcher
        assert!(!client.session().is_authenticated());
        assert!(session_store.load_session().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transport_failure_lands_in_entry_state() {
        let (client, transport, _) = test_client();
        transport.fail("GET", "/payments", 500);

        let mut subscription = client.subscribe("listPayments", Value::Null).unwrap();
        let snapshot = subscription.settled().await;

        assert_eq!(snapshot.status, QueryStatus::Rejected);
        assert!(matches!(
            *snapshot.error.unwrap(),
            ApiError::ServerError(_)
        ));
    }

    #[tokio::test]
    async fn test_unknown_endpoint_and_kind_mismatch() {
        let (client, _, _) = test_client();

        let err = client.query("noSuchThing", Value::Null).await.unwrap_err();
        assert!(matches!(*err, ApiError::UnknownEndpoint(_)));

        let err = client.query("createBooking", Value::Null).await.unwrap_err();
        assert!(matches!(*err, ApiError::KindMismatch { .. }));

        let err = client.mutate("listBookings", Value::Null).await.unwrap_err();
        assert!(matches!(*err, ApiError::KindMismatch { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_orphaned_entry_evicted_after_grace() {
        let (client, transport, _) = test_client();
        transport.route("GET", "/locations", serde_json::json!([{"id": 1}]));

        let mut subscription = client.subscribe("listLocations", Value::Null).unwrap();
        subscription.settled().await;
        let key = subscription.key().to_string();
        drop(subscription);

        assert!(client.inner.store.contains(&key));
        // Let the Drop-spawned eviction task run its first poll and arm its
        // grace-window timer before we advance the virtual clock past it.
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;
        assert!(!client.inner.store.contains(&key));
        assert_eq!(client.stats().entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubscribe_within_grace_cancels_eviction() {
        let (client, transport, _) = test_client();
        transport.route("GET", "/locations", serde_json::json!([{"id": 1}]));

        let mut subscription = client.subscribe("listLocations", Value::Null).unwrap();
        subscription.settled().await;
        let key = subscription.key().to_string();
        drop(subscription);

        // Remount before the grace window elapses
        tokio::time::advance(Duration::from_secs(10)).await;
        let revived = client.subscribe("listLocations", Value::Null).unwrap();
        tokio::time::advance(Duration::from_secs(120)).await;
        tokio::task::yield_now().await;

        assert!(client.inner.store.contains(&key));
        drop(revived);
    }

    #[tokio::test]
    async fn test_payment_session_url_is_forwarded_opaquely() {
        let (client, transport, _) = test_client();
        transport.route(
            "POST",
            "/payments/session",
            serde_json::json!({"url": "https://checkout.example.com/cs_123"}),
        );

        let data = client
            .mutate(
                "createPaymentSession",
                serde_json::json!({"bookingId": 11, "amount": 258.0}),
            )
            .await
            .unwrap();
        assert_eq!(data["url"], "https://checkout.example.com/cs_123");
    }

    #[tokio::test]
    async fn test_instance_invalidation_spares_unrelated_details() {
        let (client, transport, _) = test_client();
        transport.route("GET", "/tickets/1", serde_json::json!({"id": 1, "status": "open"}));
        transport.route("GET", "/tickets/2", serde_json::json!({"id": 2, "status": "open"}));

        client
            .query("getTicketById", serde_json::json!({"id": 1}))
            .await
            .unwrap();
        client
            .query("getTicketById", serde_json::json!({"id": 2}))
            .await
            .unwrap();

        client.invalidate(&[Tag::item(Resource::Tickets, 1)]);

        // Ticket 2 still served from cache; ticket 1 refetches
        client
            .query("getTicketById", serde_json::json!({"id": 2}))
            .await
            .unwrap();
        assert_eq!(transport.call_count("GET", "/tickets/2"), 1);

        client
            .query("getTicketById", serde_json::json!({"id": 1}))
            .await
            .unwrap();
        assert_eq!(transport.call_count("GET", "/tickets/1"), 2);
    }
}

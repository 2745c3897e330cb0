//! Page gating for the signed-in user.
//!
//! A [`Provider`] owns the page-access list for one session and answers
//! "may this user do X on route Y". It moves through
//! `Initializing -> LoadingPages -> Ready`; every identity change re-enters
//! `LoadingPages`. Loads run as spawned tasks and the latest trigger wins:
//! a newer trigger aborts the running task, and any result that still
//! arrives for an older generation is dropped. Closing the provider, or
//! dropping its last handle, stops the running load for good.
//!
//! Every failure is closed. A failed fetch commits an empty list, and until
//! the provider is `Ready` nothing outside the public allowlist renders.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::Identity;
use crate::config::Access as AccessConfig;
use crate::permission::{Action, Crud, PageAccessList, normalize_url};
use crate::source::PageSource;

/// Authentication state as reported by the session layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Loading,
    SignedOut,
    SignedIn(Identity),
}

/// Provider lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    LoadingPages,
    Ready,
}

/// Outcome of evaluating the route guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// Inputs still loading: render nothing.
    Pending,
    Allow,
    /// Send the user to this path.
    Redirect(String),
}

/// Routing rules that are not part of the fetched list.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    pub forbidden_path: String,
    pub public_paths: Vec<String>,
    pub dynamic_parents: Vec<String>,
}

impl AccessPolicy {
    pub fn is_public(&self, path: &str) -> bool {
        let path = normalize_url(path);
        path == normalize_url(&self.forbidden_path)
            || self.public_paths.iter().any(|p| normalize_url(p) == path)
    }
}

impl From<&AccessConfig> for AccessPolicy {
    fn from(config: &AccessConfig) -> Self {
        Self {
            forbidden_path: normalize_url(&config.forbidden_path),
            public_paths: config.public_paths.iter().map(|p| normalize_url(p)).collect(),
            dynamic_parents: config.dynamic_parents.clone(),
        }
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::from(&AccessConfig::default())
    }
}

/// Point-in-time view of the provider.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub phase: Phase,
    pub auth: AuthState,
    pub pages: Arc<PageAccessList>,
    /// Bumped on every load trigger; loads only commit into their own.
    pub generation: u64,
}

impl Snapshot {
    fn roles(&self) -> &[String] {
        match &self.auth {
            AuthState::SignedIn(identity) => &identity.roles,
            _ => &[],
        }
    }
}

/// Liveness flag plus the running load, shared by the provider and its tasks.
#[derive(Default)]
struct Lifecycle {
    closed: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Lifecycle {
    fn is_alive(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    fn abort_task(&self) {
        if let Ok(mut task) = self.task.lock()
            && let Some(handle) = task.take()
        {
            handle.abort();
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.abort_task();
    }
}

/// Held only by provider handles, never by load tasks, so it drops with
/// the last handle.
struct CloseOnDrop(Arc<Lifecycle>);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.close();
    }
}

struct Inner<S> {
    source: S,
    policy: AccessPolicy,
    state: watch::Sender<Snapshot>,
    lifecycle: Arc<Lifecycle>,
    current_path: Mutex<Option<String>>,
}

/// Per-session permission engine.
///
/// Clones share one session. Dropping the last clone closes it.
pub struct Provider<S: PageSource> {
    inner: Arc<Inner<S>>,
    _guard: Arc<CloseOnDrop>,
}

impl<S: PageSource> Clone for Provider<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _guard: Arc::clone(&self._guard),
        }
    }
}

impl<S: PageSource> Provider<S> {
    pub fn new(source: S, policy: AccessPolicy) -> Self {
        let (state, _) = watch::channel(Snapshot {
            phase: Phase::Initializing,
            auth: AuthState::Loading,
            pages: Arc::new(PageAccessList::default()),
            generation: 0,
        });

        let lifecycle = Arc::new(Lifecycle::default());
        Self {
            inner: Arc::new(Inner {
                source,
                policy,
                state,
                lifecycle: Arc::clone(&lifecycle),
                current_path: Mutex::new(None),
            }),
            _guard: Arc::new(CloseOnDrop(lifecycle)),
        }
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.inner.policy
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.state.borrow().clone()
    }

    pub fn phase(&self) -> Phase {
        self.inner.state.borrow().phase
    }

    /// Watch for state changes.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.inner.state.subscribe()
    }

    /// Wait until the current load has committed.
    pub async fn ready(&self) -> Snapshot {
        let mut rx = self.subscribe();
        match rx.wait_for(|s| s.phase == Phase::Ready).await {
            Ok(snapshot) => snapshot.clone(),
            // The sender lives in `inner`, which `self` keeps alive
            Err(_) => self.snapshot(),
        }
    }

    /// Feed a new authentication state.
    ///
    /// Re-running with the same principal is a no-op; any other change
    /// restarts the page load. Signing in spawns the load on the current
    /// Tokio runtime; without one the list is committed empty.
    pub fn set_auth(&self, auth: AuthState) {
        if !self.inner.lifecycle.is_alive() {
            return;
        }

        let unchanged = {
            let current = self.inner.state.borrow();
            match (&current.auth, &auth) {
                (AuthState::SignedIn(a), AuthState::SignedIn(b)) => a.same_principal(b),
                (AuthState::SignedOut, AuthState::SignedOut) => current.phase == Phase::Ready,
                (AuthState::Loading, AuthState::Loading) => true,
                _ => false,
            }
        };
        if unchanged {
            // Keep the freshest token for the next fetch
            if let AuthState::SignedIn(identity) = auth {
                self.inner.state.send_modify(|s| {
                    s.auth = AuthState::SignedIn(identity);
                });
            }
            return;
        }

        match auth {
            AuthState::Loading => {
                self.abort_task();
                self.inner.state.send_modify(|s| {
                    s.generation += 1;
                    s.phase = Phase::Initializing;
                    s.auth = AuthState::Loading;
                    s.pages = Arc::new(PageAccessList::default());
                });
            }
            AuthState::SignedOut => {
                self.abort_task();
                self.inner.state.send_modify(|s| {
                    s.generation += 1;
                    s.phase = Phase::Ready;
                    s.auth = AuthState::SignedOut;
                    s.pages = Arc::new(PageAccessList::default());
                });
                debug!("Signed out, every protected page is forbidden");
            }
            AuthState::SignedIn(identity) => self.start_load(identity),
        }
    }

    /// Refetch for the current identity (e.g. after an out-of-band session
    /// update).
    pub fn invalidate(&self) {
        let identity = match &self.inner.state.borrow().auth {
            AuthState::SignedIn(identity) => identity.clone(),
            _ => return,
        };
        self.start_load(identity);
    }

    /// Stop all loads; the provider never updates again.
    pub fn close(&self) {
        // Flipped under the channel lock so no commit can straddle it
        self.inner.state.send_if_modified(|_| {
            self.inner.lifecycle.close();
            false
        });
    }

    fn abort_task(&self) {
        self.inner.lifecycle.abort_task();
    }

    fn start_load(&self, identity: Identity) {
        if !self.inner.lifecycle.is_alive() {
            return;
        }
        self.abort_task();

        let mut generation = 0;
        let load_identity = identity.clone();
        self.inner.state.send_modify(|s| {
            s.generation += 1;
            generation = s.generation;
            s.phase = Phase::LoadingPages;
            s.auth = AuthState::SignedIn(identity);
        });

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("No Tokio runtime for the page-access load, failing closed: {e}");
                self.inner.commit(generation, PageAccessList::default());
                return;
            }
        };

        let inner = Arc::clone(&self.inner);
        let handle = runtime.spawn(async move {
            inner.load(generation, load_identity).await;
        });

        if let Ok(mut task) = self.inner.lifecycle.task.lock() {
            *task = Some(handle);
        }
    }

    /// Effective permissions on `url` for the current user.
    pub fn resolve_for_url(&self, url: &str) -> Crud {
        let snapshot = self.inner.state.borrow();
        if snapshot.phase != Phase::Ready {
            return Crud::NONE;
        }
        snapshot.pages.resolve(url, snapshot.roles())
    }

    pub fn can_read(&self, url: &str) -> bool {
        self.resolve_for_url(url).read
    }

    /// Evaluate the route guard for `path`.
    pub fn guard(&self, path: &str) -> Guard {
        if self.inner.policy.is_public(path) {
            return Guard::Allow;
        }
        if self.phase() != Phase::Ready {
            return Guard::Pending;
        }
        if self.can_read(path) {
            Guard::Allow
        } else {
            debug!(path, "Route denied, redirecting");
            Guard::Redirect(self.inner.policy.forbidden_path.clone())
        }
    }

    /// Record a navigation and evaluate the guard for it.
    pub fn navigate(&self, path: &str) -> Guard {
        if let Ok(mut current) = self.inner.current_path.lock() {
            *current = Some(normalize_url(path));
        }
        self.guard(path)
    }

    pub fn current_path(&self) -> Option<String> {
        self.inner.current_path.lock().ok().and_then(|p| p.clone())
    }

    /// Permissions on the current path.
    pub fn permissions(&self) -> Crud {
        match self.current_path() {
            Some(path) => self.resolve_for_url(&path),
            None => Crud::NONE,
        }
    }

    /// Whether `action` is allowed on the current path.
    pub fn has(&self, action: Action) -> bool {
        self.permissions().allows(action)
    }
}

impl<S: PageSource> Inner<S> {
    async fn load(&self, generation: u64, identity: Identity) {
        debug!(generation, subject = %identity.subject, "Loading page-access list");

        let pages = match self.source.fetch(&identity).await {
            Ok(payload) => {
                let list = PageAccessList::from_json(&payload)
                    .with_dynamic_parents(&self.policy.dynamic_parents);
                if list.skipped() > 0 {
                    warn!(skipped = list.skipped(), "Skipped malformed page-access entries");
                }
                list
            }
            Err(e) => {
                warn!("Page-access fetch failed, failing closed: {e}");
                PageAccessList::default()
            }
        };
        self.commit(generation, pages);
    }

    /// Publish `pages` as `Ready` if `generation` is still current and the
    /// provider is open.
    fn commit(&self, generation: u64, pages: PageAccessList) -> bool {
        let count = pages.len();
        let pages = Arc::new(pages);
        let committed = self.state.send_if_modified(|s| {
            // close() flips the flag under this same lock
            if s.generation != generation || !self.lifecycle.is_alive() {
                return false;
            }
            s.phase = Phase::Ready;
            s.pages = pages;
            true
        });

        if committed {
            info!(generation, entries = count, "Page-access list ready");
        } else {
            debug!(generation, "Discarding stale or closed page-access result");
        }
        committed
    }
}

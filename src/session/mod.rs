/// Session and role context
///
/// A [`SessionContext`] follows an [`AuthProvider`]'s identity stream and
/// publishes a [`SessionState`] that pairs the identity with its stored role.
/// Guards read these states to decide what to show.
///
/// Lifecycle: `Initializing` until the provider's first notification, then
/// `Loading` while the role is read, then `Ready` (or `SignedOut`). Every
/// identity change starts over at `Loading`. A role lookup that is overtaken by
/// a newer identity is abandoned and its result never published.

mod viewer;

pub use viewer::Viewer;

use crate::{
    account::{Identity, ProfileUpdate},
    error::{AppError, AppResult},
    metrics,
    rbac::Role,
    store::ProfileStore,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::{sync::watch, task::JoinHandle};

/// Identity backend
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Current identity, updated on every sign-in and sign-out
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;

    async fn sign_in(&self, email: &str, password: &str) -> AppResult<Identity>;

    async fn sign_up(&self, email: &str, password: &str, username: &str) -> AppResult<Identity>;

    async fn sign_out(&self) -> AppResult<()>;

    /// Send a reset link. Unknown emails succeed silently.
    async fn send_password_reset(&self, email: &str) -> AppResult<()>;

    async fn update_display_name(&self, display_name: &str) -> AppResult<()>;

    async fn change_password(&self, current_password: &str, new_password: &str) -> AppResult<()>;
}

/// Published session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No notification from the auth provider yet
    Initializing,
    SignedOut,
    /// Identity known, role lookup in flight
    Loading { identity: Identity },
    Ready { identity: Identity, role: Role },
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Loading { identity } | SessionState::Ready { identity, .. } => {
                Some(identity)
            }
            _ => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            SessionState::Ready { role, .. } => Some(*role),
            _ => None,
        }
    }

    /// Neither initializing nor loading
    pub fn is_settled(&self) -> bool {
        matches!(self, SessionState::SignedOut | SessionState::Ready { .. })
    }

    pub fn viewer(&self) -> Option<Viewer> {
        match self {
            SessionState::Ready { identity, role } => Some(Viewer::new(
                identity.uid.clone(),
                identity.display_name.clone(),
                *role,
            )),
            _ => None,
        }
    }
}

/// Read a user's role, falling back to [`Role::User`] on any failure.
///
/// Missing profiles, unrecognized stored roles and store errors are all
/// reported through tracing and the role lookup failure counter.
pub async fn resolve_role(profiles: &dyn ProfileStore, uid: &str) -> Role {
    match profiles.get_role(uid).await {
        Ok(Some(role)) => role,
        Ok(None) => {
            metrics::record_role_lookup_failure("missing");
            tracing::error!("No profile for {}, using role {}", uid, Role::User);
            Role::User
        }
        Err(AppError::Validation(e)) => {
            metrics::record_role_lookup_failure("unrecognized");
            tracing::error!("Unrecognized role for {}: {}", uid, e);
            Role::User
        }
        Err(e) => {
            metrics::record_role_lookup_failure("error");
            tracing::error!("Role lookup for {} failed: {}", uid, e);
            Role::User
        }
    }
}

/// Live session for one signed-in client. Dropping it stops the listener.
pub struct SessionContext {
    auth: Arc<dyn AuthProvider>,
    profiles: Arc<dyn ProfileStore>,
    state: watch::Receiver<SessionState>,
    listener: JoinHandle<()>,
}

impl SessionContext {
    /// Start following `auth`. Must be called within a tokio runtime.
    pub fn start(auth: Arc<dyn AuthProvider>, profiles: Arc<dyn ProfileStore>) -> Self {
        let (sender, state) = watch::channel(SessionState::Initializing);
        let listener = tokio::spawn(listen(auth.subscribe(), profiles.clone(), sender));

        Self {
            auth,
            profiles,
            state,
            listener,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every published state
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Wait until the state is `SignedOut` or `Ready`
    pub async fn settled(&self) -> AppResult<SessionState> {
        let mut state = self.state.clone();
        let settled = state
            .wait_for(SessionState::is_settled)
            .await
            .map_err(|_| AppError::Internal("Session listener stopped".to_string()))?;
        Ok(settled.clone())
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AppResult<Identity> {
        self.auth.sign_in(email, password).await
    }

    pub async fn sign_up(&self, email: &str, password: &str, username: &str) -> AppResult<Identity> {
        self.auth.sign_up(email, password, username).await
    }

    pub async fn sign_out(&self) -> AppResult<()> {
        self.auth.sign_out().await
    }

    pub async fn reset_password(&self, email: &str) -> AppResult<()> {
        self.auth.send_password_reset(email).await
    }

    pub async fn change_password(&self, current_password: &str, new_password: &str) -> AppResult<()> {
        self.auth.change_password(current_password, new_password).await
    }

    /// Update the signed-in user's username, bio and avatar
    pub async fn update_profile(&self, update: ProfileUpdate) -> AppResult<()> {
        let uid = self
            .state
            .borrow()
            .identity()
            .map(|identity| identity.uid.clone())
            .ok_or_else(|| AppError::Authentication("Not signed in".to_string()))?;

        if update.is_empty() {
            return Ok(());
        }

        if let Some(username) = update.username.as_deref() {
            self.auth.update_display_name(username).await?;
        }
        self.profiles.update_profile(&uid, &update).await
    }

    /// Stop the listener. The last published state stays readable.
    pub fn close(&self) {
        self.listener.abort();
    }
}

impl Drop for SessionContext {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

async fn listen(
    mut identities: watch::Receiver<Option<Identity>>,
    profiles: Arc<dyn ProfileStore>,
    sender: watch::Sender<SessionState>,
) {
    loop {
        let identity = identities.borrow_and_update().clone();

        match identity {
            None => {
                sender.send_replace(SessionState::SignedOut);
            }
            Some(identity) => {
                sender.send_replace(SessionState::Loading {
                    identity: identity.clone(),
                });

                tokio::select! {
                    role = resolve_role(profiles.as_ref(), &identity.uid) => {
                        // A change that landed as the lookup finished still wins
                        if identities.has_changed().unwrap_or(false) {
                            tracing::debug!("Discarding stale role for {}", identity.uid);
                            continue;
                        }
                        sender.send_replace(SessionState::Ready { identity, role });
                    }
                    changed = identities.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        tracing::debug!("Identity changed during role lookup for {}", identity.uid);
                        continue;
                    }
                }
            }
        }

        if identities.changed().await.is_err() {
            break;
        }
    }

    tracing::debug!("Auth provider closed, session listener stopping");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Profile;
    use crate::db::{memory_pool, SqliteProfileStore};
    use std::time::Duration;

    /// Auth provider driven directly by the test
    struct ScriptedAuth {
        identity: watch::Sender<Option<Identity>>,
    }

    impl ScriptedAuth {
        fn new() -> Self {
            let (identity, _) = watch::channel(None);
            Self { identity }
        }

        fn set(&self, identity: Option<Identity>) {
            self.identity.send_replace(identity);
        }
    }

    #[async_trait]
    impl AuthProvider for ScriptedAuth {
        fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
            self.identity.subscribe()
        }

        async fn sign_in(&self, email: &str, _password: &str) -> AppResult<Identity> {
            let identity = identity(email);
            self.set(Some(identity.clone()));
            Ok(identity)
        }

        async fn sign_up(&self, email: &str, password: &str, _username: &str) -> AppResult<Identity> {
            self.sign_in(email, password).await
        }

        async fn sign_out(&self) -> AppResult<()> {
            self.set(None);
            Ok(())
        }

        async fn send_password_reset(&self, _email: &str) -> AppResult<()> {
            Ok(())
        }

        async fn update_display_name(&self, _display_name: &str) -> AppResult<()> {
            Ok(())
        }

        async fn change_password(&self, _current: &str, _new: &str) -> AppResult<()> {
            Ok(())
        }
    }

    /// Profile store that answers slowly for one user
    struct SlowFor {
        inner: SqliteProfileStore,
        slow_uid: &'static str,
    }

    #[async_trait]
    impl ProfileStore for SlowFor {
        async fn get_role(&self, uid: &str) -> AppResult<Option<Role>> {
            if uid == self.slow_uid {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            self.inner.get_role(uid).await
        }

        async fn set_role(&self, uid: &str, role: Role) -> AppResult<()> {
            self.inner.set_role(uid, role).await
        }

        async fn set_roles(&self, uids: &[String], role: Role) -> AppResult<()> {
            self.inner.set_roles(uids, role).await
        }

        async fn create_profile(&self, profile: &Profile) -> AppResult<()> {
            self.inner.create_profile(profile).await
        }

        async fn get_profile(&self, uid: &str) -> AppResult<Option<Profile>> {
            self.inner.get_profile(uid).await
        }

        async fn update_profile(&self, uid: &str, update: &ProfileUpdate) -> AppResult<()> {
            self.inner.update_profile(uid, update).await
        }

        async fn set_banned(&self, uid: &str, banned: bool) -> AppResult<()> {
            self.inner.set_banned(uid, banned).await
        }

        async fn is_banned(&self, uid: &str) -> AppResult<bool> {
            self.inner.is_banned(uid).await
        }

        async fn list_profiles(&self, limit: i64) -> AppResult<Vec<Profile>> {
            self.inner.list_profiles(limit).await
        }
    }

    fn identity(uid: &str) -> Identity {
        Identity {
            uid: uid.to_string(),
            email: format!("{}@example.com", uid),
            display_name: Some(uid.to_string()),
        }
    }

    async fn profiles_with(users: &[(&str, Role)]) -> SqliteProfileStore {
        let store = SqliteProfileStore::new(memory_pool().await.unwrap());
        for (uid, role) in users {
            let mut profile = Profile::new(uid, uid, &format!("{}@example.com", uid));
            profile.role = *role;
            store.create_profile(&profile).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_resolve_role_fails_closed() {
        let store = profiles_with(&[("mod", Role::Moderator)]).await;

        assert_eq!(resolve_role(&store, "mod").await, Role::Moderator);
        assert_eq!(resolve_role(&store, "ghost").await, Role::User);
    }

    #[tokio::test]
    async fn test_sign_in_and_out_states() {
        let auth = Arc::new(ScriptedAuth::new());
        let profiles = Arc::new(profiles_with(&[("admin", Role::Admin)]).await);
        let context = SessionContext::start(auth.clone(), profiles);

        assert_eq!(context.settled().await.unwrap(), SessionState::SignedOut);

        context.sign_in("admin", "pw").await.unwrap();
        let mut states = context.subscribe();
        let ready = states
            .wait_for(|s| matches!(s, SessionState::Ready { .. }))
            .await
            .unwrap()
            .clone();
        assert_eq!(ready.role(), Some(Role::Admin));
        assert_eq!(ready.viewer().unwrap().uid, "admin");

        context.sign_out().await.unwrap();
        states
            .wait_for(|s| *s == SessionState::SignedOut)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_stale_role_lookup_is_discarded() {
        let auth = Arc::new(ScriptedAuth::new());
        let inner = profiles_with(&[("slow", Role::Admin), ("fast", Role::User)]).await;
        let profiles = Arc::new(SlowFor {
            inner,
            slow_uid: "slow",
        });
        let context = SessionContext::start(auth.clone(), profiles);
        context.settled().await.unwrap();

        let mut states = context.subscribe();
        auth.set(Some(identity("slow")));
        states
            .wait_for(|s| matches!(s, SessionState::Loading { .. }))
            .await
            .unwrap();
        auth.set(Some(identity("fast")));

        let ready = states
            .wait_for(|s| matches!(s, SessionState::Ready { .. }))
            .await
            .unwrap()
            .clone();
        assert_eq!(ready.identity().unwrap().uid, "fast");
        assert_eq!(ready.role(), Some(Role::User));

        // The slow lookup never lands afterwards
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(context.state().identity().unwrap().uid, "fast");
    }

    #[tokio::test]
    async fn test_close_stops_following_identity() {
        let auth = Arc::new(ScriptedAuth::new());
        let profiles = Arc::new(profiles_with(&[]).await);
        let context = SessionContext::start(auth.clone(), profiles);
        context.settled().await.unwrap();

        context.close();
        tokio::task::yield_now().await;
        auth.set(Some(identity("late")));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(context.state(), SessionState::SignedOut);
    }

    #[tokio::test]
    async fn test_update_profile_requires_identity() {
        let auth = Arc::new(ScriptedAuth::new());
        let profiles = Arc::new(profiles_with(&[("u1", Role::User)]).await);
        let context = SessionContext::start(auth.clone(), profiles.clone());
        context.settled().await.unwrap();

        let update = ProfileUpdate {
            bio: Some("hello".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            context.update_profile(update.clone()).await,
            Err(AppError::Authentication(_))
        ));

        context.sign_in("u1", "pw").await.unwrap();
        let mut states = context.subscribe();
        states.wait_for(|s| s.role().is_some()).await.unwrap();

        context.update_profile(update).await.unwrap();
        let profile = profiles.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(profile.bio, "hello");
    }
}

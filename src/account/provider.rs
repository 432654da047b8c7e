/// Auth provider backed by the local account manager
use crate::{
    account::{account_identity, AccountManager, Identity, IssuedSession},
    error::{AppError, AppResult},
    mailer::Mailer,
    session::AuthProvider,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// In-process [`AuthProvider`] holding one client's session
pub struct LocalAuthProvider {
    accounts: Arc<AccountManager>,
    mailer: Arc<Mailer>,
    public_url: String,
    identity: watch::Sender<Option<Identity>>,
    session: Mutex<Option<IssuedSession>>,
}

impl LocalAuthProvider {
    pub fn new(accounts: Arc<AccountManager>, mailer: Arc<Mailer>, public_url: &str) -> Self {
        let (identity, _) = watch::channel(None);
        Self {
            accounts,
            mailer,
            public_url: public_url.trim_end_matches('/').to_string(),
            identity,
            session: Mutex::new(None),
        }
    }

    /// Resume a session from a previously issued bearer token
    pub async fn resume(&self, access_token: &str) -> AppResult<Identity> {
        let validated = self.accounts.validate_access_token(access_token).await?;
        let account = self.accounts.get_account(&validated.uid).await?;
        let identity = account_identity(&account);

        let expires_at = self
            .accounts
            .session_expiry(&validated.session_id)
            .await?;

        self.install(IssuedSession {
            session_id: validated.session_id,
            identity: identity.clone(),
            access_token: access_token.to_string(),
            expires_at,
        })
        .await;

        Ok(identity)
    }

    /// Bearer token of the current session
    pub async fn access_token(&self) -> Option<String> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| session.access_token.clone())
    }

    async fn install(&self, session: IssuedSession) {
        let identity = session.identity.clone();
        *self.session.lock().await = Some(session);
        self.identity.send_replace(Some(identity));
    }

    async fn current_uid(&self) -> AppResult<String> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| session.identity.uid.clone())
            .ok_or_else(|| AppError::Authentication("Not signed in".to_string()))
    }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.subscribe()
    }

    async fn sign_in(&self, email: &str, password: &str) -> AppResult<Identity> {
        let (_, session) = self.accounts.sign_in(email, password).await?;
        let identity = session.identity.clone();
        self.install(session).await;
        Ok(identity)
    }

    async fn sign_up(&self, email: &str, password: &str, username: &str) -> AppResult<Identity> {
        let (_, session) = self.accounts.sign_up(email, password, username).await?;
        let identity = session.identity.clone();
        self.install(session).await;
        Ok(identity)
    }

    async fn sign_out(&self) -> AppResult<()> {
        let previous = self.session.lock().await.take();
        if let Some(session) = previous {
            self.accounts.sign_out(&session.session_id).await?;
        }
        self.identity.send_replace(None);
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> AppResult<()> {
        let Some((account, token)) = self.accounts.request_password_reset(email).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(());
        };

        let username = account.display_name.as_deref().unwrap_or(&account.email);
        self.mailer
            .send_password_reset_email(&account.email, username, &token, &self.public_url)
            .await
    }

    async fn update_display_name(&self, display_name: &str) -> AppResult<()> {
        let uid = self.current_uid().await?;
        self.accounts.update_display_name(&uid, display_name).await?;

        let mut session = self.session.lock().await;
        if let Some(session) = session.as_mut() {
            session.identity.display_name = Some(display_name.trim().to_string());
            self.identity.send_replace(Some(session.identity.clone()));
        }
        Ok(())
    }

    async fn change_password(&self, current_password: &str, new_password: &str) -> AppResult<()> {
        let uid = self.current_uid().await?;
        self.accounts
            .change_password(&uid, current_password, new_password)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::db::memory_pool;

    async fn provider() -> LocalAuthProvider {
        let config = ServerConfig::for_directory("./data".into(), "0123456789abcdef0123456789abcdef");
        let accounts = AccountManager::new(memory_pool().await.unwrap(), Arc::new(config));
        LocalAuthProvider::new(
            Arc::new(accounts),
            Arc::new(Mailer::disabled()),
            "http://localhost:3000/",
        )
    }

    #[tokio::test]
    async fn test_identity_follows_sign_in_and_out() {
        let provider = provider().await;
        let identities = provider.subscribe();
        assert!(identities.borrow().is_none());

        let identity = provider
            .sign_up("alice@example.com", "password123", "alice")
            .await
            .unwrap();
        assert_eq!(identities.borrow().as_ref(), Some(&identity));
        assert!(provider.access_token().await.is_some());

        provider.sign_out().await.unwrap();
        assert!(identities.borrow().is_none());
        assert!(provider.access_token().await.is_none());
    }

    #[tokio::test]
    async fn test_resume_from_token() {
        let first = provider().await;
        first
            .sign_up("alice@example.com", "password123", "alice")
            .await
            .unwrap();
        let token = first.access_token().await.unwrap();

        let identity = first.resume(&token).await.unwrap();
        assert_eq!(identity.email, "alice@example.com");
    }

    #[tokio::test]
    async fn test_display_name_update_republishes_identity() {
        let provider = provider().await;
        provider
            .sign_up("alice@example.com", "password123", "alice")
            .await
            .unwrap();

        provider.update_display_name(" alicia ").await.unwrap();
        let identities = provider.subscribe();
        let current = identities.borrow().clone().unwrap();
        assert_eq!(current.display_name.as_deref(), Some("alicia"));
    }

    #[tokio::test]
    async fn test_reset_for_unknown_email_is_silent() {
        let provider = provider().await;
        provider
            .send_password_reset("nobody@example.com")
            .await
            .unwrap();
    }
}

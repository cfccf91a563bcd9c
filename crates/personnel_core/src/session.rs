//! crates/personnel_core/src/session.rs
//!
//! The session store: current identity and auth token, persisted through a
//! `TokenStore` and published on a watch channel. It is constructed once and
//! shared by reference; nothing reads the identity before `restore` settles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::domain::{
    CredentialUpdate, Credentials, LoginResponse, PersistedSession, Role, Session, SessionStatus,
    User,
};
use crate::error::ViewError;
use crate::ports::{ApiGateway, ApiRequest, PortError, PortResult, TokenStore};

pub struct SessionStore {
    gateway: Arc<dyn ApiGateway>,
    storage: Arc<dyn TokenStore>,
    state: watch::Sender<Session>,
    restore_started: AtomicBool,
}

impl SessionStore {
    pub fn new(gateway: Arc<dyn ApiGateway>, storage: Arc<dyn TokenStore>) -> Self {
        let (state, _) = watch::channel(Session::unresolved());
        Self {
            gateway,
            storage,
            state,
            restore_started: AtomicBool::new(false),
        }
    }

    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    /// A receiver that observes every login, logout, restore and expiry.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// The signed-in user, once the session is resolved.
    pub fn identity(&self) -> Option<User> {
        let session = self.state.borrow();
        if session.is_resolved() {
            session.identity.clone()
        } else {
            None
        }
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().token.clone()
    }

    /// Resolves the session from the persisted token. Runs once per store.
    pub async fn restore(&self) -> Session {
        if self.restore_started.swap(true, Ordering::SeqCst) {
            warn!("Session restore requested more than once; keeping the current state.");
            return self.snapshot();
        }

        let Some(persisted) = self.storage.load() else {
            debug!("No persisted token; starting signed out.");
            self.state.send_replace(Session::anonymous());
            return self.snapshot();
        };

        let request = ApiRequest::get("/auth/me").with_bearer(Some(persisted.token.clone()));
        match self.gateway.send(request).await.and_then(decode::<User>) {
            Ok(user) => {
                let refreshed = PersistedSession {
                    token: persisted.token.clone(),
                    user: Some(user.clone()),
                };
                if let Err(e) = self.storage.save(&refreshed) {
                    warn!("Failed to persist restored identity: {}", e);
                }
                info!(user_id = %user.id, role = user.role.as_str(), "Session restored.");
                self.state.send_replace(Session {
                    identity: Some(user),
                    token: Some(persisted.token),
                    status: SessionStatus::Resolved,
                });
            }
            Err(e) => {
                warn!("Persisted token rejected during restore: {}", e);
                self.storage.clear();
                self.state.send_replace(Session::anonymous());
            }
        }
        self.snapshot()
    }

    /// Exchanges credentials for a token. On failure the previous state is kept.
    pub async fn login(&self, credentials: &Credentials) -> Result<User, ViewError> {
        let body = serde_json::to_value(credentials).map_err(|e| {
            warn!("Failed to encode credentials: {}", e);
            ViewError::InvalidCredentials
        })?;

        let response = self
            .gateway
            .send(ApiRequest::post("/auth/login", body))
            .await
            .and_then(decode::<LoginResponse>)
            .map_err(|e| {
                warn!(regimental_no = %credentials.regimental_no, "Login rejected: {}", e);
                ViewError::InvalidCredentials
            })?;

        let persisted = PersistedSession {
            token: response.token.clone(),
            user: Some(response.user.clone()),
        };
        if let Err(e) = self.storage.save(&persisted) {
            warn!("Failed to persist session after login: {}", e);
        }

        info!(user_id = %response.user.id, role = response.user.role.as_str(), "Signed in.");
        // A login settles the session even if restore never ran.
        self.restore_started.store(true, Ordering::SeqCst);
        self.state.send_replace(Session {
            identity: Some(response.user.clone()),
            token: Some(response.token),
            status: SessionStatus::Resolved,
        });
        Ok(response.user)
    }

    /// Clears the token, the identity and every persisted copy.
    pub fn logout(&self) {
        self.storage.clear();
        self.state.send_replace(Session::anonymous());
        info!("Signed out.");
    }

    /// Same effect as `logout`, for a token the server no longer accepts.
    pub fn expire(&self) {
        self.storage.clear();
        self.state.send_replace(Session::anonymous());
        warn!("Session expired; signed out.");
    }

    /// Sends a request with the current bearer token. An unauthorized answer expires the
    /// session, unless the token it was sent with has been replaced in the meantime.
    pub async fn send(&self, request: ApiRequest) -> PortResult<Value> {
        let bearer = self.token();
        let result = self.gateway.send(request.with_bearer(bearer.clone())).await;
        if matches!(result, Err(PortError::Unauthorized)) && bearer.is_some() {
            if self.token() == bearer {
                self.expire();
            } else {
                debug!("Ignoring unauthorized answer for a replaced token.");
            }
        }
        result
    }

    /// Changes the signed-in account's credentials. The cached identity is left as is.
    pub async fn change_credentials(&self, update: &CredentialUpdate) -> Result<(), ViewError> {
        let user = self.identity().ok_or(ViewError::SessionExpired)?;
        let body = serde_json::to_value(update).map_err(|e| ViewError::SaveFailure {
            entity: "user".to_string(),
            reason: e.to_string(),
        })?;
        self.send(ApiRequest::put(format!("/user/{}", user.id), body))
            .await
            .map_err(|e| ViewError::save("user", &e))?;
        info!(user_id = %user.id, "Credentials updated.");
        Ok(())
    }
}

/// Where a user lands after signing in or after being refused a view.
pub fn landing_route(user: &User) -> String {
    match (user.role, &user.employee_id) {
        (Role::Admin, _) => "/admin".to_string(),
        (Role::Employee, Some(employee_id)) => format!("/employee/{}", employee_id),
        (Role::Employee, None) => "/employee".to_string(),
    }
}

fn decode<T: serde::de::DeserializeOwned>(body: Value) -> PortResult<T> {
    serde_json::from_value(body).map_err(|e| PortError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::MemoryTokenStore;
    use crate::testing::ScriptedGateway;
    use serde_json::json;

    fn employee(id: &str) -> User {
        User {
            id: id.to_string(),
            role: Role::Employee,
            display_name: Some("Asha".to_string()),
            regimental_no: Some("R-1".to_string()),
            employee_id: Some("e1".to_string()),
            is_admin: false,
        }
    }

    fn persisted(token: &str) -> Arc<MemoryTokenStore> {
        Arc::new(MemoryTokenStore::with_session(PersistedSession {
            token: token.to_string(),
            user: None,
        }))
    }

    #[tokio::test]
    async fn restore_with_valid_token_resolves_identity() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.respond(json!({"_id": "u1", "role": "employee", "name": "Asha"}));
        let storage = persisted("tok-1");
        let store = SessionStore::new(gateway.clone(), storage.clone());

        assert_eq!(store.snapshot().status, SessionStatus::Unresolved);
        assert!(store.identity().is_none());

        let session = store.restore().await;
        assert_eq!(session.status, SessionStatus::Resolved);
        assert_eq!(session.role(), Some(Role::Employee));
        assert_eq!(session.token.as_deref(), Some("tok-1"));

        let sent = gateway.requests();
        assert_eq!(sent[0].path, "/auth/me");
        assert_eq!(sent[0].bearer.as_deref(), Some("tok-1"));
        assert_eq!(storage.load().unwrap().user.unwrap().id, "u1");
    }

    #[tokio::test]
    async fn restore_with_rejected_token_clears_storage() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.fail(PortError::Unauthorized);
        let storage = persisted("stale");
        let store = SessionStore::new(gateway, storage.clone());

        let session = store.restore().await;
        assert!(session.is_resolved());
        assert!(session.identity.is_none());
        assert!(session.token.is_none());
        assert!(storage.load().is_none());
    }

    #[tokio::test]
    async fn restore_without_token_resolves_without_request() {
        let gateway = Arc::new(ScriptedGateway::new());
        let store = SessionStore::new(gateway.clone(), Arc::new(MemoryTokenStore::new()));

        let session = store.restore().await;
        assert!(session.is_resolved());
        assert!(session.identity.is_none());
        assert!(gateway.requests().is_empty());
    }

    #[tokio::test]
    async fn restore_runs_only_once() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.respond(json!({"_id": "u1", "role": "admin"}));
        let store = SessionStore::new(gateway.clone(), persisted("tok"));

        store.restore().await;
        let second = store.restore().await;
        assert_eq!(second.role(), Some(Role::Admin));
        assert_eq!(gateway.requests().len(), 1);
    }

    #[tokio::test]
    async fn login_stores_token_and_identity() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.respond(json!({
            "token": "tok-9",
            "user": {"_id": "u9", "role": "employee", "employeeId": "e1"}
        }));
        let storage = Arc::new(MemoryTokenStore::new());
        let store = SessionStore::new(gateway.clone(), storage.clone());

        let user = store.login(&Credentials::new("R-1", "pw")).await.unwrap();
        assert_eq!(user.id, "u9");
        assert_eq!(store.token().as_deref(), Some("tok-9"));
        assert_eq!(storage.load().unwrap().token, "tok-9");
        assert_eq!(landing_route(&user), "/employee/e1");

        let sent = gateway.requests();
        assert_eq!(sent[0].body, Some(json!({"regimentalNo": "R-1", "password": "pw"})));
        assert!(sent[0].bearer.is_none());
    }

    #[tokio::test]
    async fn failed_login_keeps_previous_session() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.respond(json!({"_id": "u1", "role": "admin"}));
        gateway.fail(PortError::Rejected(400, "bad password".to_string()));
        let store = SessionStore::new(gateway, persisted("tok-1"));
        store.restore().await;

        let err = store.login(&Credentials::new("R-1", "wrong")).await.unwrap_err();
        assert_eq!(err, ViewError::InvalidCredentials);
        assert_eq!(store.token().as_deref(), Some("tok-1"));
        assert_eq!(store.snapshot().role(), Some(Role::Admin));
    }

    #[tokio::test]
    async fn logout_clears_everything_and_notifies() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.respond(json!({"_id": "u1", "role": "admin"}));
        let storage = persisted("tok-1");
        let store = SessionStore::new(gateway, storage.clone());
        store.restore().await;
        let changes = store.subscribe();

        store.logout();
        assert!(changes.has_changed().unwrap());
        assert!(store.identity().is_none());
        assert!(store.token().is_none());
        assert!(storage.load().is_none());
        assert!(store.snapshot().is_resolved());
    }

    #[tokio::test]
    async fn unauthorized_call_expires_session() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.respond(json!({"_id": "u1", "role": "admin"}));
        gateway.fail(PortError::Unauthorized);
        let storage = persisted("tok-1");
        let store = SessionStore::new(gateway.clone(), storage.clone());
        store.restore().await;

        let result = store.send(ApiRequest::get("/employee")).await;
        assert_eq!(result, Err(PortError::Unauthorized));
        assert!(store.identity().is_none());
        assert!(storage.load().is_none());
        assert_eq!(gateway.requests()[1].bearer.as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn credential_change_keeps_cached_role() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.respond(json!({"_id": "u1", "role": "employee", "employeeId": "e1"}));
        gateway.respond(json!({"_id": "u1", "role": "admin"}));
        let store = SessionStore::new(gateway.clone(), persisted("tok"));
        store.restore().await;
        let before = store.identity().unwrap();

        let update = CredentialUpdate {
            password: Some("new-secret".to_string()),
            ..Default::default()
        };
        store.change_credentials(&update).await.unwrap();

        assert_eq!(store.identity().unwrap(), before);
        assert_eq!(before.role, Role::Employee);
        let sent = gateway.requests();
        assert_eq!(sent[1].path, "/user/u1");
        assert_eq!(sent[1].body, Some(json!({"password": "new-secret"})));
    }

    #[tokio::test]
    async fn late_unauthorized_for_old_token_keeps_new_login() {
        let gateway = Arc::new(ScriptedGateway::paused());
        gateway.respond(json!({"_id": "u1", "role": "admin"}));
        gateway.release(1);
        let store = Arc::new(SessionStore::new(gateway.clone(), persisted("tok-old")));
        store.restore().await;

        let stale = tokio::spawn({
            let store = store.clone();
            async move { store.send(ApiRequest::get("/leave")).await }
        });
        while gateway.requests().len() < 2 {
            tokio::task::yield_now().await;
        }

        let login = tokio::spawn({
            let store = store.clone();
            async move { store.login(&Credentials::new("R-9", "pw")).await }
        });
        while gateway.requests().len() < 3 {
            tokio::task::yield_now().await;
        }
        gateway.respond(json!({"token": "tok-new", "user": {"_id": "u1", "role": "admin"}}));
        gateway.release_request(2);
        login.await.unwrap().unwrap();

        gateway.fail(PortError::Unauthorized);
        gateway.release_request(1);
        assert_eq!(stale.await.unwrap(), Err(PortError::Unauthorized));

        assert_eq!(gateway.requests()[1].bearer.as_deref(), Some("tok-old"));
        assert_eq!(store.token().as_deref(), Some("tok-new"));
        assert!(store.identity().is_some());
    }

    #[test]
    fn landing_routes_follow_role() {
        let mut admin = employee("u1");
        admin.role = Role::Admin;
        assert_eq!(landing_route(&admin), "/admin");

        let mut unlinked = employee("u2");
        unlinked.employee_id = None;
        assert_eq!(landing_route(&unlinked), "/employee");
    }
}

//! services/client/src/app/state.rs
//!
//! The application state: created once at startup and handed to every view.

use std::sync::Arc;

use personnel_core::ports::{ApiGateway, TokenStore};
use personnel_core::{Entity, Navigation, RecordController, RouteGuard, SessionStore};

use crate::adapters::{FileTokenStore, HttpGateway};
use crate::app::attendance::AttendanceView;
use crate::app::relations::RelationEditor;
use crate::config::Config;
use crate::error::ClientError;

//=========================================================================================
// AppState (Shared Across All Views)
//=========================================================================================

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub session: Arc<SessionStore>,
    pub guard: Arc<RouteGuard>,
}

impl AppState {
    /// Wires the state from explicit adapters.
    pub fn new(
        config: Arc<Config>,
        gateway: Arc<dyn ApiGateway>,
        storage: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            config,
            session: Arc::new(SessionStore::new(gateway, storage)),
            guard: Arc::new(RouteGuard::default()),
        }
    }

    /// Wires the state with the HTTP gateway and the file-backed token store.
    pub fn from_config(config: Arc<Config>) -> Result<Self, ClientError> {
        let gateway = Arc::new(HttpGateway::new(
            &config.api_base_url,
            config.request_timeout,
        )?);
        let storage = Arc::new(FileTokenStore::new(config.session_path.clone()));
        Ok(Self::new(config, gateway, storage))
    }

    /// A fresh controller for one mounted list view.
    pub fn controller<E: Entity>(&self) -> RecordController<E> {
        RecordController::new(self.session.clone())
    }

    pub fn relations(&self) -> RelationEditor {
        RelationEditor::new(self.session.clone())
    }

    pub fn attendance(&self) -> AttendanceView {
        AttendanceView::new(self.session.clone())
    }

    /// Re-evaluates the guard against the current session.
    pub fn navigate(&self, path: &str) -> Navigation {
        self.guard.navigate(&self.session.snapshot(), path)
    }
}

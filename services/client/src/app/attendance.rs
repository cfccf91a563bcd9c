//! services/client/src/app/attendance.rs
//!
//! The employee's attendance screen: today's status plus check-in and check-out
//! marking, which needs a known location. Admins read the full register through
//! a `RecordController<AttendanceRecord>` instead.

use std::sync::Arc;

use personnel_core::guard::{session_can, Capability};
use personnel_core::ports::ApiRequest;
use personnel_core::{SessionStore, ViewError};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Location {
    pub lat: f64,
    pub long: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarkKind {
    CheckIn,
    CheckOut,
}

impl MarkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkKind::CheckIn => "check-in",
            MarkKind::CheckOut => "check-out",
        }
    }
}

#[derive(Debug, Default)]
struct AttendanceState {
    location: Option<Location>,
    /// The server's status document, shown as is.
    status: Option<Value>,
    error: Option<String>,
}

pub struct AttendanceView {
    session: Arc<SessionStore>,
    state: Mutex<AttendanceState>,
}

impl AttendanceView {
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self {
            session,
            state: Mutex::new(AttendanceState::default()),
        }
    }

    pub async fn set_location(&self, location: Location) {
        self.state.lock().await.location = Some(location);
    }

    pub async fn status(&self) -> Option<Value> {
        self.state.lock().await.status.clone()
    }

    pub async fn error(&self) -> Option<String> {
        self.state.lock().await.error.clone()
    }

    /// Fetches today's status. A failure keeps the last status shown.
    pub async fn refresh(&self) -> Result<Value, ViewError> {
        let result = self.session.send(ApiRequest::get("/attendance/status")).await;
        let mut state = self.state.lock().await;
        match result {
            Ok(status) => {
                state.status = Some(status.clone());
                state.error = None;
                Ok(status)
            }
            Err(e) => {
                let err = ViewError::load("attendance", &e);
                error!("Failed to fetch attendance status: {}", e);
                state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Marks a check-in or check-out at the stored location.
    pub async fn mark(&self, kind: MarkKind) -> Result<Value, ViewError> {
        if !session_can(&self.session.snapshot(), Capability::MarkAttendance) {
            return Err(ViewError::NotPermitted("mark attendance".to_string()));
        }
        let location = {
            let mut state = self.state.lock().await;
            match state.location {
                Some(location) => location,
                None => {
                    let err = ViewError::MissingFields(vec!["location".to_string()]);
                    state.error = Some(err.to_string());
                    return Err(err);
                }
            }
        };

        let body = json!({ "type": kind, "location": location });
        let result = self
            .session
            .send(ApiRequest::post("/attendance/mark", body))
            .await;
        let mut state = self.state.lock().await;
        match result {
            Ok(status) => {
                info!(kind = kind.as_str(), "Attendance marked.");
                state.status = Some(status.clone());
                state.error = None;
                Ok(status)
            }
            Err(e) => {
                let err = ViewError::save("attendance", &e);
                error!(kind = kind.as_str(), "Failed to mark attendance: {}", e);
                state.error = Some(err.to_string());
                Err(err)
            }
        }
    }
}

//! services/client/src/app/views.rs
//!
//! Maps a rendered route onto the view behind it and loads that view into
//! printable lines. This is the whole "screen" layer of the headless client.

use personnel_core::format::format_date;
use personnel_core::ports::ApiRequest;
use personnel_core::{
    AccountUser, AttendanceRecord, BmiRecord, Course, Employee, Entity, Equipment, LeaveRequest,
    FilterCriteria, MedicalRecord, RefetchTrigger, RouteMatch, ViewError,
};
use personnel_core::guard::{session_can, Capability};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::app::state::AppState;
use crate::error::ClientError;

//=========================================================================================
// View Resolution
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    Employees,
    Leave,
    Courses,
    Bmi,
    Medical,
    Attendance,
    Equipment,
    Users,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewKind {
    Login,
    AdminDashboard,
    List(Listing),
    /// An employee profile: assignments plus leave, BMI and medical history.
    Profile { employee_id: String },
    /// The signed-in employee's own profile; the id comes from the identity.
    OwnProfile,
    Unknown(String),
}

impl ViewKind {
    pub fn resolve(route: &RouteMatch) -> Self {
        let parts: Vec<&str> = route
            .path
            .split('/')
            .filter(|part| !part.is_empty())
            .collect();
        match parts.as_slice() {
            ["login"] => ViewKind::Login,
            ["admin"] => ViewKind::AdminDashboard,
            ["admin", "employee"] => ViewKind::List(Listing::Employees),
            ["admin", "employee", id] => ViewKind::Profile {
                employee_id: id.to_string(),
            },
            ["admin", "leave"] => ViewKind::List(Listing::Leave),
            ["admin", "course"] => ViewKind::List(Listing::Courses),
            ["admin", "bmi"] => ViewKind::List(Listing::Bmi),
            ["admin", "medical"] => ViewKind::List(Listing::Medical),
            ["admin", "attendance"] => ViewKind::List(Listing::Attendance),
            ["admin", "equipment"] => ViewKind::List(Listing::Equipment),
            ["admin", "user"] => ViewKind::List(Listing::Users),
            ["employee", ..] => ViewKind::OwnProfile,
            _ => ViewKind::Unknown(route.path.clone()),
        }
    }
}

//=========================================================================================
// Dashboard
//=========================================================================================

/// Counters served by `/admin/analytics`; missing counters read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Analytics {
    pub present: u64,
    pub absent: u64,
    pub total_employees: u64,
    pub approved_leaves: u64,
    pub pending_leaves: u64,
    pub rejected_leaves: u64,
}

pub async fn load_analytics(state: &AppState) -> Result<Analytics, ViewError> {
    let body = state
        .session
        .send(ApiRequest::get("/admin/analytics"))
        .await
        .map_err(|e| ViewError::load("analytics", &e))?;
    serde_json::from_value(body).map_err(|e| ViewError::LoadFailure {
        entity: "analytics".to_string(),
        reason: e.to_string(),
    })
}

//=========================================================================================
// Rendering
//=========================================================================================

/// Loads the view and returns the lines a terminal renderer prints.
pub async fn render(state: &AppState, view: &ViewKind) -> Result<Vec<String>, ClientError> {
    debug!(?view, "Rendering view.");
    match view {
        ViewKind::Login => Ok(vec![
            "Sign in with your regimental number and password.".to_string(),
        ]),
        ViewKind::AdminDashboard => {
            let a = load_analytics(state).await?;
            Ok(vec![
                format!(
                    "Employees: {} (present {}, absent {})",
                    a.total_employees, a.present, a.absent
                ),
                format!(
                    "Leave requests: {} approved, {} pending, {} rejected",
                    a.approved_leaves, a.pending_leaves, a.rejected_leaves
                ),
            ])
        }
        ViewKind::List(listing) => match listing {
            Listing::Employees => list::<Employee>(state).await,
            Listing::Leave => list::<LeaveRequest>(state).await,
            Listing::Courses => list::<Course>(state).await,
            Listing::Bmi => list::<BmiRecord>(state).await,
            Listing::Medical => list::<MedicalRecord>(state).await,
            Listing::Attendance => list::<AttendanceRecord>(state).await,
            Listing::Equipment => list::<Equipment>(state).await,
            Listing::Users => list::<AccountUser>(state).await,
        },
        ViewKind::Profile { employee_id } => profile(state, employee_id).await,
        ViewKind::OwnProfile => {
            if !session_can(&state.session.snapshot(), Capability::ViewOwnProfile) {
                return Err(ViewError::NotPermitted("view this profile".to_string()).into());
            }
            match state.session.identity().and_then(|user| user.employee_id) {
                Some(employee_id) => profile(state, &employee_id).await,
                None => Ok(vec!["No employee record is linked to this account.".to_string()]),
            }
        }
        ViewKind::Unknown(path) => {
            warn!(%path, "No view is registered for this route.");
            Ok(vec![format!("Nothing to show at {}", path)])
        }
    }
}

async fn list<E: Entity>(state: &AppState) -> Result<Vec<String>, ClientError> {
    let controller = state.controller::<E>();
    controller.refetch(RefetchTrigger::Mount).await?;
    let records = controller.records().await;
    controller.unmount();
    if records.is_empty() {
        return Ok(vec![format!("No {} records.", controller.spec().name)]);
    }
    Ok(records.iter().map(Entity::summary).collect())
}

async fn profile(state: &AppState, employee_id: &str) -> Result<Vec<String>, ClientError> {
    let employee = state.relations().employee(employee_id).await?;
    let mut lines = vec![employee.summary()];
    if let Some(doj) = employee.doj.as_deref() {
        lines.push(format!("Joined: {}", format_date(doj)));
    }
    for course in &employee.courses {
        lines.push(format!("Course: {}", course.label()));
    }
    for item in &employee.equipment {
        lines.push(format!("Equipment: {}", item.label()));
    }
    lines.extend(history::<LeaveRequest>(state, employee_id, "Leave", false).await?);
    lines.extend(history::<BmiRecord>(state, employee_id, "BMI", true).await?);
    lines.extend(history::<MedicalRecord>(state, employee_id, "Medical", true).await?);
    Ok(lines)
}

/// One profile tab: the employee's records of one kind, newest first when `newest_first`.
async fn history<E: Entity>(
    state: &AppState,
    employee_id: &str,
    heading: &str,
    newest_first: bool,
) -> Result<Vec<String>, ClientError> {
    let mut criteria = FilterCriteria::new();
    criteria.set("employee_id", employee_id);
    if newest_first {
        criteria.set("sort", "desc");
    }
    let controller = state.controller::<E>();
    controller.list(criteria).await?;
    let records = controller.records().await;
    controller.unmount();
    if records.is_empty() {
        return Ok(vec![format!("{}: none", heading)]);
    }
    Ok(records
        .iter()
        .map(|record| format!("{}: {}", heading, record.summary()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use personnel_core::testing::ScriptedGateway;
    use personnel_core::{Credentials, MemoryTokenStore, Navigation};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn route(path: &str) -> RouteMatch {
        RouteMatch {
            pattern: "/admin/*",
            path: path.to_string(),
            params: BTreeMap::new(),
        }
    }

    #[test]
    fn routes_resolve_to_views() {
        assert_eq!(ViewKind::resolve(&route("/admin")), ViewKind::AdminDashboard);
        assert_eq!(
            ViewKind::resolve(&route("/admin/bmi")),
            ViewKind::List(Listing::Bmi)
        );
        assert_eq!(
            ViewKind::resolve(&route("/admin/employee/e7")),
            ViewKind::Profile {
                employee_id: "e7".to_string()
            }
        );
        assert_eq!(ViewKind::resolve(&route("/employee/leaves")), ViewKind::OwnProfile);
        assert_eq!(
            ViewKind::resolve(&route("/admin/reports")),
            ViewKind::Unknown("/admin/reports".to_string())
        );
    }

    async fn admin_state() -> (Arc<ScriptedGateway>, AppState) {
        let gateway = Arc::new(ScriptedGateway::new());
        let config = Arc::new(Config::from_lookup(|_| None).unwrap());
        let state = AppState::new(config, gateway.clone(), Arc::new(MemoryTokenStore::new()));
        gateway.respond(json!({
            "token": "tok",
            "user": {"_id": "u1", "role": "admin"}
        }));
        state
            .session
            .login(&Credentials::new("R-9", "pw"))
            .await
            .unwrap();
        (gateway, state)
    }

    #[tokio::test]
    async fn list_view_prints_summaries_in_server_order() {
        let (gateway, state) = admin_state().await;
        gateway.respond(json!([
            {"_id": "c2", "name": "Signals", "type": "technical"},
            {"_id": "c1", "name": "Drill", "type": "basic"}
        ]));

        let Navigation::Render(matched) = state.navigate("/admin/course") else {
            panic!("admin should reach the course list");
        };
        let lines = render(&state, &ViewKind::resolve(&matched)).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Signals"));
        assert!(lines[1].contains("Drill"));
        assert_eq!(gateway.requests()[1].path, "/course");
    }

    #[tokio::test]
    async fn dashboard_tolerates_missing_counters() {
        let (gateway, state) = admin_state().await;
        gateway.respond(json!({"present": 3, "totalEmployees": 5}));

        let lines = render(&state, &ViewKind::AdminDashboard).await.unwrap();
        assert_eq!(lines[0], "Employees: 5 (present 3, absent 0)");
        assert_eq!(lines[1], "Leave requests: 0 approved, 0 pending, 0 rejected");
    }

    #[tokio::test]
    async fn load_failure_surfaces_as_view_error() {
        let (gateway, state) = admin_state().await;
        gateway.fail(personnel_core::PortError::Transport("offline".to_string()));

        let err = render(&state, &ViewKind::List(Listing::Leave)).await.unwrap_err();
        assert!(matches!(err, ClientError::View(ViewError::LoadFailure { .. })));
    }

    #[tokio::test]
    async fn own_profile_includes_leave_bmi_and_medical_history() {
        let gateway = Arc::new(ScriptedGateway::new());
        let config = Arc::new(Config::from_lookup(|_| None).unwrap());
        let state = AppState::new(config, gateway.clone(), Arc::new(MemoryTokenStore::new()));
        gateway.respond(json!({
            "token": "tok",
            "user": {"_id": "u2", "role": "employee", "employeeId": "e1"}
        }));
        state
            .session
            .login(&Credentials::new("R-2", "pw"))
            .await
            .unwrap();

        gateway.respond(json!([{"_id": "e1", "name": "asha rao", "rank": "Naik"}]));
        gateway.respond(json!([{
            "_id": "l1",
            "employee": "e1",
            "leaveType": "casual",
            "startDate": "2024-01-10",
            "endDate": "2024-01-14",
            "status": "approved"
        }]));
        gateway.respond(json!({"data": [{"_id": "b1", "employee": "e1", "bmi": "22.86"}]}));
        gateway.respond(json!([]));

        let lines = render(&state, &ViewKind::OwnProfile).await.unwrap();
        assert!(lines[0].contains("Asha Rao"));
        assert!(lines.iter().any(|l| l.starts_with("Leave: ") && l.contains("casual")));
        assert!(lines.iter().any(|l| l == "BMI: e1: BMI 22.86"));
        assert_eq!(lines.last().map(String::as_str), Some("Medical: none"));

        let requests = gateway.requests();
        assert_eq!(requests[2].path, "/leave");
        assert_eq!(requests[2].query.get("employee_id"), Some("e1"));
        assert_eq!(requests[2].query.get("sort"), None);
        assert_eq!(requests[3].path, "/bmi");
        assert_eq!(requests[3].query.get("sort"), Some("desc"));
        assert_eq!(requests[4].path, "/medical");
        assert_eq!(requests[4].query.get("employee_id"), Some("e1"));
    }
}

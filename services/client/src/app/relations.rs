//! services/client/src/app/relations.rs
//!
//! Assigns courses and equipment to an employee from the employee profile.
//! Every change re-fetches the owning employee so the caller renders the
//! server's view of the relation lists.

use std::sync::Arc;

use personnel_core::guard::{session_can, Capability};
use personnel_core::ports::{ApiRequest, PortError};
use personnel_core::{Employee, QueryParams, SessionStore, ViewError};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

/// The relation lists hanging off an employee record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Course,
    Equipment,
}

impl Relation {
    fn path(&self, target_id: &str) -> String {
        match self {
            Relation::Course => format!("/employee/course/{}", target_id),
            Relation::Equipment => format!("/employee/equipment/{}", target_id),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Course => "course",
            Relation::Equipment => "equipment",
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EmployeeLookup {
    Many(Vec<Employee>),
    Wrapped { data: Vec<Employee> },
    One(Employee),
}

pub struct RelationEditor {
    session: Arc<SessionStore>,
}

impl RelationEditor {
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self { session }
    }

    /// Loads one employee through the list endpoint's `_id` filter.
    pub async fn employee(&self, employee_id: &str) -> Result<Employee, ViewError> {
        let request = ApiRequest::get("/employee")
            .with_query(QueryParams::new().with("_id", employee_id));
        let body = self
            .session
            .send(request)
            .await
            .map_err(|e| ViewError::load("employee", &e))?;

        let lookup = serde_json::from_value::<EmployeeLookup>(body)
            .map_err(|e| ViewError::load("employee", &PortError::Decode(e.to_string())))?;
        let found = match lookup {
            EmployeeLookup::Many(list) | EmployeeLookup::Wrapped { data: list } => {
                list.into_iter().find(|employee| employee.id == employee_id)
            }
            EmployeeLookup::One(employee) => Some(employee),
        };
        found.ok_or_else(|| ViewError::NotFound(employee_id.to_string()))
    }

    pub async fn attach(
        &self,
        relation: Relation,
        employee_id: &str,
        target_id: &str,
    ) -> Result<Employee, ViewError> {
        self.ensure_permitted()?;
        let request = ApiRequest::post(relation.path(target_id), body(employee_id));
        self.change(relation, employee_id, target_id, request).await
    }

    pub async fn detach(
        &self,
        relation: Relation,
        employee_id: &str,
        target_id: &str,
    ) -> Result<Employee, ViewError> {
        self.ensure_permitted()?;
        let request = ApiRequest::delete(relation.path(target_id)).with_body(body(employee_id));
        self.change(relation, employee_id, target_id, request).await
    }

    async fn change(
        &self,
        relation: Relation,
        employee_id: &str,
        target_id: &str,
        request: ApiRequest,
    ) -> Result<Employee, ViewError> {
        let method = request.method;
        if let Err(e) = self.session.send(request).await {
            error!(relation = relation.as_str(), employee_id, target_id, "Relation change failed: {}", e);
            return Err(ViewError::save(relation.as_str(), &e));
        }
        info!(
            relation = relation.as_str(),
            method = method.as_str(),
            employee_id,
            target_id,
            "Relation updated."
        );
        self.employee(employee_id).await
    }

    fn ensure_permitted(&self) -> Result<(), ViewError> {
        if session_can(&self.session.snapshot(), Capability::ManageEmployees) {
            Ok(())
        } else {
            Err(ViewError::NotPermitted("manage employee assignments".to_string()))
        }
    }
}

fn body(employee_id: &str) -> Value {
    json!({ "employee_id": employee_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use personnel_core::ports::Method;
    use personnel_core::testing::ScriptedGateway;
    use personnel_core::{Credentials, MemoryTokenStore};

    async fn signed_in(role: &str) -> (Arc<ScriptedGateway>, RelationEditor) {
        let gateway = Arc::new(ScriptedGateway::new());
        let session = Arc::new(SessionStore::new(
            gateway.clone(),
            Arc::new(MemoryTokenStore::new()),
        ));
        gateway.respond(json!({
            "token": "tok",
            "user": {"_id": "u1", "role": role}
        }));
        session.login(&Credentials::new("R-1", "pw")).await.unwrap();
        (gateway, RelationEditor::new(session))
    }

    #[tokio::test]
    async fn attach_posts_then_reloads_employee() {
        let (gateway, editor) = signed_in("admin").await;
        gateway.respond(json!({"message": "ok"}));
        gateway.respond(json!({"data": [{
            "_id": "e1",
            "name": "Asha",
            "courses": [{"_id": "c1", "name": "Drill"}]
        }]}));

        let employee = editor.attach(Relation::Course, "e1", "c1").await.unwrap();
        assert_eq!(employee.courses.len(), 1);
        assert_eq!(employee.courses[0].id(), "c1");

        let requests = gateway.requests();
        let change = &requests[1];
        assert_eq!(change.method, Method::Post);
        assert_eq!(change.path, "/employee/course/c1");
        assert_eq!(change.body, Some(json!({"employee_id": "e1"})));
        assert_eq!(change.bearer.as_deref(), Some("tok"));

        let reload = &requests[2];
        assert_eq!(reload.path, "/employee");
        assert_eq!(reload.query.get("_id"), Some("e1"));
    }

    #[tokio::test]
    async fn detach_failure_skips_reload() {
        let (gateway, editor) = signed_in("admin").await;
        gateway.fail(PortError::Rejected(500, "boom".to_string()));

        let err = editor
            .detach(Relation::Equipment, "e1", "q1")
            .await
            .unwrap_err();
        assert!(matches!(err, ViewError::SaveFailure { ref entity, .. } if entity == "equipment"));

        let requests = gateway.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].method, Method::Delete);
        assert_eq!(requests[1].path, "/employee/equipment/q1");
    }

    #[tokio::test]
    async fn employees_may_not_edit_assignments() {
        let (gateway, editor) = signed_in("employee").await;
        let err = editor.attach(Relation::Course, "e1", "c1").await.unwrap_err();
        assert!(matches!(err, ViewError::NotPermitted(_)));
        assert_eq!(gateway.requests().len(), 1);
    }
}

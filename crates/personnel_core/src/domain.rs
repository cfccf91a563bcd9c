//! crates/personnel_core/src/domain.rs
//!
//! Defines the core data structures for the application: the session and its
//! identity, and the entity records exposed by the personnel REST API.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::derive::DerivedRule;
use crate::guard::Capability;
use crate::format::{capitalize_words, format_date};

//=========================================================================================
// Identity and Session
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Employee => "employee",
        }
    }
}

/// The signed-in account as returned by `/auth/login` and `/auth/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(alias = "_id")]
    pub id: String,
    pub role: Role,
    #[serde(default, alias = "name", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regimental_no: Option<String>,
    /// The employee record this account belongs to, when it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Restore has not settled yet; nothing may read the identity.
    Unresolved,
    Resolved,
}

/// A point-in-time view of the session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub identity: Option<User>,
    pub token: Option<String>,
    pub status: SessionStatus,
}

impl Session {
    pub fn unresolved() -> Self {
        Self {
            identity: None,
            token: None,
            status: SessionStatus::Unresolved,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            identity: None,
            token: None,
            status: SessionStatus::Resolved,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.status == SessionStatus::Resolved
    }

    pub fn role(&self) -> Option<Role> {
        self.identity.as_ref().map(|user| user.role)
    }
}

/// What survives a restart: the token and the last identity seen with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub token: String,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub regimental_no: String,
    pub password: String,
}

impl Credentials {
    pub fn new(regimental_no: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            regimental_no: regimental_no.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("regimental_no", &self.regimental_no)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// Body of the credential-change action on `/user/:id`.
#[derive(Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regimental_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

//=========================================================================================
// Entity Records
//=========================================================================================

/// Static configuration of one record-management screen.
#[derive(Debug, Clone, Copy)]
pub struct EntitySpec {
    pub name: &'static str,
    pub base_path: &'static str,
    pub id_field: &'static str,
    /// Fields that must be non-empty before a create or update is sent.
    pub required: &'static [&'static str],
    pub derived: &'static [DerivedRule],
    /// Filter keys that are only applied on an explicit search action.
    pub text_filters: &'static [&'static str],
    /// Needed to list or search; `None` lets any signed-in role read.
    pub read: Option<Capability>,
    pub create: Capability,
    /// Needed to update or delete.
    pub manage: Capability,
}

/// A persisted business object served by one CRUD endpoint family.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn spec() -> EntitySpec;

    fn id(&self) -> &str;

    /// One-line description used by list renderers.
    fn summary(&self) -> String;
}

/// A relation to another entity: a bare id, or the populated document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reference {
    Id(String),
    Populated(PopulatedRef),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulatedRef {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regimental_no: Option<String>,
}

impl Reference {
    pub fn id(&self) -> &str {
        match self {
            Reference::Id(id) => id,
            Reference::Populated(doc) => &doc.id,
        }
    }

    /// "Name (regimental no)" when populated, otherwise the bare id.
    pub fn label(&self) -> String {
        match self {
            Reference::Id(id) => id.clone(),
            Reference::Populated(doc) => match (&doc.name, &doc.regimental_no) {
                (Some(name), Some(no)) => format!("{} ({})", name, no),
                (Some(name), None) => name.clone(),
                _ => doc.id.clone(),
            },
        }
    }
}

/// Numbers arrive both as JSON numbers and as strings (form values posted verbatim).
fn number_or_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub dob: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub regimental_no: Option<String>,
    #[serde(default)]
    pub rank: Option<String>,
    #[serde(default)]
    pub doj: Option<String>,
    #[serde(default)]
    pub courses: Vec<Reference>,
    #[serde(default)]
    pub equipment: Vec<Reference>,
}

impl Entity for Employee {
    fn spec() -> EntitySpec {
        EntitySpec {
            name: "employee",
            base_path: "/employee",
            id_field: "_id",
            required: &["name", "phone", "regimentalNo", "rank"],
            derived: &[],
            text_filters: &[],
            read: None,
            create: Capability::ManageEmployees,
            manage: Capability::ManageEmployees,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn summary(&self) -> String {
        format!(
            "{} {} ({})",
            self.rank.as_deref().unwrap_or(""),
            capitalize_words(&self.name),
            self.regimental_no.as_deref().unwrap_or("-")
        )
        .trim()
        .to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    #[serde(rename = "_id")]
    pub id: String,
    pub employee: Reference,
    #[serde(default)]
    pub leave_type: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "number_or_string")]
    pub no_of_days: Option<f64>,
    #[serde(default)]
    pub reason: Option<String>,
    pub status: LeaveStatus,
}

impl Entity for LeaveRequest {
    fn spec() -> EntitySpec {
        EntitySpec {
            name: "leave",
            base_path: "/leave",
            id_field: "_id",
            required: &["employee", "leaveType", "status", "startDate", "noOfDays"],
            derived: &[DerivedRule::LEAVE_END_DATE],
            text_filters: &[],
            read: None,
            create: Capability::RequestLeave,
            manage: Capability::ManageLeave,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn summary(&self) -> String {
        format!(
            "{}: {} {} to {} [{:?}]",
            self.employee.label(),
            self.leave_type.as_deref().unwrap_or("leave"),
            format_date(self.start_date.as_deref().unwrap_or("")),
            format_date(self.end_date.as_deref().unwrap_or("")),
            self.status
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BmiRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub employee: Reference,
    #[serde(default, deserialize_with = "number_or_string")]
    pub weight: Option<f64>,
    #[serde(default, deserialize_with = "number_or_string")]
    pub height: Option<f64>,
    #[serde(default, deserialize_with = "number_or_string")]
    pub bmi: Option<f64>,
}

impl Entity for BmiRecord {
    fn spec() -> EntitySpec {
        EntitySpec {
            name: "bmi",
            base_path: "/bmi",
            id_field: "_id",
            required: &["employee", "weight", "height"],
            derived: &[DerivedRule::BMI],
            text_filters: &["bmi"],
            read: None,
            create: Capability::ManageBmi,
            manage: Capability::ManageBmi,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn summary(&self) -> String {
        match self.bmi {
            Some(bmi) => format!("{}: BMI {:.2}", self.employee.label(), bmi),
            None => format!("{}: BMI -", self.employee.label()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub employee: Reference,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Entity for MedicalRecord {
    fn spec() -> EntitySpec {
        EntitySpec {
            name: "medical",
            base_path: "/medical",
            id_field: "_id",
            required: &["employee", "date", "category"],
            derived: &[],
            text_filters: &[],
            read: None,
            create: Capability::ManageMedical,
            manage: Capability::ManageMedical,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn summary(&self) -> String {
        format!(
            "{}: {} on {}",
            self.employee.label(),
            self.category.as_deref().unwrap_or("-"),
            format_date(self.date.as_deref().unwrap_or(""))
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Equipment {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<Reference>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub is_serviceable: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub warranty_period: Option<String>,
    #[serde(default)]
    pub purchase_date: Option<String>,
    #[serde(default)]
    pub last_serviced: Option<String>,
}

impl Entity for Equipment {
    fn spec() -> EntitySpec {
        EntitySpec {
            name: "equipment",
            base_path: "/equipment",
            id_field: "_id",
            required: &["name", "category", "purchaseDate"],
            derived: &[],
            text_filters: &[],
            read: None,
            create: Capability::ManageEquipment,
            manage: Capability::ManageEquipment,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn summary(&self) -> String {
        let category = self
            .category
            .as_ref()
            .map(Reference::label)
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{} [{}] {}",
            self.name,
            category,
            capitalize_words(self.status.as_deref().unwrap_or(""))
        )
        .trim_end()
        .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub duration: Option<Value>,
}

impl Entity for Course {
    fn spec() -> EntitySpec {
        EntitySpec {
            name: "course",
            base_path: "/course",
            id_field: "_id",
            required: &["name", "type"],
            derived: &[],
            text_filters: &[],
            read: None,
            create: Capability::ManageCourses,
            manage: Capability::ManageCourses,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn summary(&self) -> String {
        match &self.kind {
            Some(kind) => format!("{} ({})", self.name, kind),
            None => self.name.clone(),
        }
    }
}

/// A login account managed from the user-management screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub regimental_no: String,
    pub role: Role,
    #[serde(default)]
    pub is_admin: bool,
}

impl Entity for AccountUser {
    fn spec() -> EntitySpec {
        EntitySpec {
            name: "user",
            base_path: "/user",
            id_field: "_id",
            required: &["regimentalNo", "password", "role"],
            derived: &[],
            text_filters: &[],
            read: Some(Capability::ManageUsers),
            create: Capability::ManageUsers,
            manage: Capability::ManageUsers,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn summary(&self) -> String {
        format!("{} ({})", self.regimental_no, self.role.as_str())
    }
}

/// A day's attendance entry; listed read-only on the admin screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub employee: Option<Reference>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl Entity for AttendanceRecord {
    fn spec() -> EntitySpec {
        EntitySpec {
            name: "attendance",
            base_path: "/attendance",
            id_field: "_id",
            required: &["date", "status"],
            derived: &[],
            text_filters: &[],
            read: Some(Capability::ViewAttendance),
            create: Capability::ManageAttendance,
            manage: Capability::ManageAttendance,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn summary(&self) -> String {
        format!(
            "Date: {}, Status: {}, Remarks: {}",
            format_date(self.date.as_deref().unwrap_or("")),
            self.status.as_deref().unwrap_or("-"),
            self.remarks.as_deref().unwrap_or("-")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_decodes_mongo_style_id_and_name() {
        let user: User = serde_json::from_value(json!({
            "_id": "u1",
            "role": "employee",
            "name": "Asha",
            "employeeId": "e7",
            "isAdmin": false
        }))
        .unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.role, Role::Employee);
        assert_eq!(user.display_name.as_deref(), Some("Asha"));
        assert_eq!(user.employee_id.as_deref(), Some("e7"));
    }

    #[test]
    fn relation_decodes_from_id_or_populated_document() {
        let bare: Reference = serde_json::from_value(json!("e1")).unwrap();
        assert_eq!(bare.id(), "e1");

        let populated: Reference =
            serde_json::from_value(json!({"_id": "e2", "name": "Ravi", "regimentalNo": "R-9"}))
                .unwrap();
        assert_eq!(populated.id(), "e2");
        assert_eq!(populated.label(), "Ravi (R-9)");
    }

    #[test]
    fn bmi_record_accepts_string_numbers() {
        let record: BmiRecord = serde_json::from_value(json!({
            "_id": "b1",
            "employee": "e1",
            "weight": "70",
            "height": 175,
            "bmi": "22.86"
        }))
        .unwrap();
        assert_eq!(record.weight, Some(70.0));
        assert_eq!(record.height, Some(175.0));
        assert_eq!(record.bmi, Some(22.86));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials::new("R-1", "hunter2");
        let printed = format!("{:?}", creds);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("R-1"));
    }
}

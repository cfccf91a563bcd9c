//! crates/personnel_core/src/draft.rs
//!
//! Transient form state for one open create/edit dialog. Setting an input
//! field recomputes the derived fields that depend on it.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::derive::DerivedRule;
use crate::error::ViewError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftMode {
    Create,
    Edit { id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormDraft {
    fields: Map<String, Value>,
    rules: &'static [DerivedRule],
}

impl FormDraft {
    pub fn new(rules: &'static [DerivedRule]) -> Self {
        Self {
            fields: Map::new(),
            rules,
        }
    }

    /// Seeds a draft from an existing record. Populated relations collapse to their ids.
    pub fn from_record<T: Serialize>(record: &T, rules: &'static [DerivedRule]) -> Self {
        let fields = match serde_json::to_value(record) {
            Ok(Value::Object(map)) => map
                .into_iter()
                .map(|(key, value)| (key, relation_to_id(value)))
                .collect(),
            _ => Map::new(),
        };
        Self { fields, rules }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn is_read_only(&self, field: &str) -> bool {
        self.rules.iter().any(|rule| rule.output() == field)
    }

    /// Sets an input field and refreshes whatever is derived from it.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<(), ViewError> {
        if self.is_read_only(field) {
            return Err(ViewError::ReadOnlyField(field.to_string()));
        }
        self.fields.insert(field.to_string(), value.into());
        for rule in self.rules.iter().filter(|rule| rule.depends_on(field)) {
            rule.apply(&mut self.fields);
        }
        Ok(())
    }

    pub fn recompute(&mut self) {
        for rule in self.rules {
            rule.apply(&mut self.fields);
        }
    }

    /// Required fields that are absent, null, blank or an empty list.
    pub fn missing(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|field| match self.fields.get(**field) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(Value::Array(items)) => items.is_empty(),
                Some(_) => false,
            })
            .map(|field| field.to_string())
            .collect()
    }

    pub fn to_body(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

fn relation_to_id(value: Value) -> Value {
    match value {
        Value::Object(doc) => match doc.get("_id") {
            Some(Value::String(id)) => Value::String(id.clone()),
            _ => Value::Object(doc),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(relation_to_id).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bmi_follows_weight_and_height() {
        let mut draft = FormDraft::new(&[DerivedRule::BMI]);
        draft.set("weight", 70).unwrap();
        assert_eq!(draft.get("bmi"), None);
        draft.set("height", 175).unwrap();
        assert_eq!(draft.get("bmi"), Some(&json!(22.86)));
        draft.set("height", 180).unwrap();
        assert_eq!(draft.get("bmi"), Some(&json!(21.6)));
    }

    #[test]
    fn derived_output_is_read_only() {
        let mut draft = FormDraft::new(&[DerivedRule::BMI]);
        let err = draft.set("bmi", 30).unwrap_err();
        assert_eq!(err, ViewError::ReadOnlyField("bmi".to_string()));
    }

    #[test]
    fn leave_end_date_holds_last_valid_value() {
        let mut draft = FormDraft::new(&[DerivedRule::LEAVE_END_DATE]);
        draft.set("startDate", "2024-01-10").unwrap();
        draft.set("noOfDays", 5).unwrap();
        assert_eq!(draft.get("endDate"), Some(&json!("2024-01-14")));

        draft.set("noOfDays", "").unwrap();
        assert_eq!(draft.get("endDate"), Some(&json!("2024-01-14")));

        draft.set("noOfDays", 2).unwrap();
        assert_eq!(draft.get("endDate"), Some(&json!("2024-01-11")));
    }

    #[test]
    fn oversized_leave_duration_is_ignored() {
        let mut draft = FormDraft::new(&[DerivedRule::LEAVE_END_DATE]);
        draft.set("startDate", "2024-01-10").unwrap();
        draft.set("noOfDays", 5).unwrap();
        draft.set("noOfDays", "1000000000000").unwrap();
        assert_eq!(draft.get("endDate"), Some(&json!("2024-01-14")));
    }

    #[test]
    fn missing_reports_blank_and_absent_fields() {
        let mut draft = FormDraft::new(&[]);
        draft.set("name", "  ").unwrap();
        draft.set("rank", "Havildar").unwrap();
        draft.set("courses", json!([])).unwrap();
        assert_eq!(
            draft.missing(&["name", "rank", "phone", "courses"]),
            vec!["name", "phone", "courses"]
        );
    }

    #[test]
    fn seeding_collapses_populated_relations() {
        let record = json!({
            "_id": "l1",
            "employee": {"_id": "e1", "name": "Asha"},
            "courses": [{"_id": "c1", "name": "Drill"}, "c2"],
            "status": "pending"
        });
        let draft = FormDraft::from_record(&record, &[]);
        assert_eq!(draft.get("employee"), Some(&json!("e1")));
        assert_eq!(draft.get("courses"), Some(&json!(["c1", "c2"])));
        assert_eq!(draft.get("_id"), Some(&json!("l1")));
    }
}

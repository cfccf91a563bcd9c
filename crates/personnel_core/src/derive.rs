//! crates/personnel_core/src/derive.rs
//!
//! The derived-field engine: pure functions computing dependent form fields
//! (BMI from weight and height, leave end-date from start-date and duration),
//! plus the rule table that wires them to draft field names.
//!
//! When an input is absent or invalid the previous derived value is kept. A
//! derived output is never an input of any rule, so recomputation cannot loop.

use chrono::{Duration, NaiveDate};
use serde_json::{Map, Number, Value};

use crate::format::parse_date;

/// `weight_kg / (height_cm / 100)^2`, rounded to two decimals.
pub fn bmi(weight_kg: f64, height_cm: f64) -> Option<f64> {
    if !(weight_kg.is_finite() && height_cm.is_finite()) || weight_kg <= 0.0 || height_cm <= 0.0 {
        return None;
    }
    let metres = height_cm / 100.0;
    Some(round_to(weight_kg / (metres * metres), 2))
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Inclusive end of a leave: `start + (days - 1)`. `None` when out of the calendar's range.
pub fn leave_end_date(start: NaiveDate, days: i64) -> Option<NaiveDate> {
    if days < 1 {
        return None;
    }
    start.checked_add_signed(Duration::try_days(days - 1)?)
}

//=========================================================================================
// Rule Table
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedRule {
    Bmi {
        weight: &'static str,
        height: &'static str,
        output: &'static str,
    },
    LeaveEndDate {
        start: &'static str,
        days: &'static str,
        output: &'static str,
    },
}

impl DerivedRule {
    pub const BMI: DerivedRule = DerivedRule::Bmi {
        weight: "weight",
        height: "height",
        output: "bmi",
    };

    pub const LEAVE_END_DATE: DerivedRule = DerivedRule::LeaveEndDate {
        start: "startDate",
        days: "noOfDays",
        output: "endDate",
    };

    pub fn inputs(&self) -> [&'static str; 2] {
        match *self {
            DerivedRule::Bmi { weight, height, .. } => [weight, height],
            DerivedRule::LeaveEndDate { start, days, .. } => [start, days],
        }
    }

    pub fn output(&self) -> &'static str {
        match *self {
            DerivedRule::Bmi { output, .. } | DerivedRule::LeaveEndDate { output, .. } => output,
        }
    }

    pub fn depends_on(&self, field: &str) -> bool {
        self.inputs().contains(&field)
    }

    /// The derived value for the current inputs, or `None` if they are absent or invalid.
    pub fn evaluate(&self, fields: &Map<String, Value>) -> Option<Value> {
        match *self {
            DerivedRule::Bmi { weight, height, .. } => {
                let value = bmi(number_field(fields, weight)?, number_field(fields, height)?)?;
                Number::from_f64(value).map(Value::Number)
            }
            DerivedRule::LeaveEndDate { start, days, .. } => {
                let start = fields.get(start).and_then(Value::as_str).and_then(parse_date)?;
                let days = whole_days(fields, days)?;
                let end = leave_end_date(start, days)?;
                Some(Value::String(end.format("%Y-%m-%d").to_string()))
            }
        }
    }

    /// Writes the derived output when the inputs are valid. Returns whether it wrote.
    pub fn apply(&self, fields: &mut Map<String, Value>) -> bool {
        match self.evaluate(fields) {
            Some(value) => {
                fields.insert(self.output().to_string(), value);
                true
            }
            None => false,
        }
    }
}

fn number_field(fields: &Map<String, Value>, key: &str) -> Option<f64> {
    match fields.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn whole_days(fields: &Map<String, Value>, key: &str) -> Option<i64> {
    let days = number_field(fields, key)?;
    // `i64::MAX as f64` rounds up to 2^63, so the bound is exclusive.
    if days.fract() != 0.0 || days < 1.0 || days >= i64::MAX as f64 {
        return None;
    }
    Some(days as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("fixture must be an object"),
        }
    }

    #[test]
    fn bmi_rounds_to_two_decimals() {
        assert_eq!(bmi(70.0, 175.0), Some(22.86));
        assert_eq!(bmi(70.0, 180.0), Some(21.6));
    }

    #[test]
    fn bmi_rejects_non_positive_inputs() {
        assert_eq!(bmi(0.0, 175.0), None);
        assert_eq!(bmi(70.0, -1.0), None);
        assert_eq!(bmi(f64::NAN, 175.0), None);
    }

    #[test]
    fn leave_end_date_counts_inclusively() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        assert_eq!(leave_end_date(start, 5), NaiveDate::from_ymd_opt(2024, 1, 14));
        assert_eq!(leave_end_date(start, 1), Some(start));
        assert_eq!(leave_end_date(start, 0), None);
    }

    #[test]
    fn leave_end_date_out_of_range_is_none() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        assert_eq!(leave_end_date(start, 1_000_000_000_000), None);
        assert_eq!(leave_end_date(start, i64::MAX), None);
    }

    #[test]
    fn huge_day_counts_keep_previous_output() {
        let mut draft = fields(json!({
            "startDate": "2024-01-10",
            "noOfDays": "1000000000000",
            "endDate": "2024-01-14"
        }));
        assert!(!DerivedRule::LEAVE_END_DATE.apply(&mut draft));
        assert_eq!(draft["endDate"], json!("2024-01-14"));

        draft.insert("noOfDays".to_string(), json!(1e300));
        assert!(!DerivedRule::LEAVE_END_DATE.apply(&mut draft));
        assert_eq!(draft["endDate"], json!("2024-01-14"));
    }

    #[test]
    fn leave_end_date_crosses_month_boundary() {
        let start = NaiveDate::from_ymd_opt(2024, 2, 27).unwrap();
        assert_eq!(leave_end_date(start, 4), NaiveDate::from_ymd_opt(2024, 3, 1));
    }

    #[test]
    fn bmi_rule_reads_string_inputs() {
        let mut draft = fields(json!({"weight": "70", "height": "175"}));
        assert!(DerivedRule::BMI.apply(&mut draft));
        assert_eq!(draft["bmi"], json!(22.86));
    }

    #[test]
    fn leave_rule_accepts_timestamps() {
        let mut draft = fields(json!({"startDate": "2024-01-10T00:00:00.000Z", "noOfDays": 5}));
        assert!(DerivedRule::LEAVE_END_DATE.apply(&mut draft));
        assert_eq!(draft["endDate"], json!("2024-01-14"));
    }

    #[test]
    fn invalid_inputs_keep_previous_output() {
        let mut draft = fields(json!({"startDate": "2024-01-10", "noOfDays": "2.5", "endDate": "2024-01-12"}));
        assert!(!DerivedRule::LEAVE_END_DATE.apply(&mut draft));
        assert_eq!(draft["endDate"], json!("2024-01-12"));

        let mut draft = fields(json!({"weight": "", "height": 175, "bmi": 22.86}));
        assert!(!DerivedRule::BMI.apply(&mut draft));
        assert_eq!(draft["bmi"], json!(22.86));
    }

    #[test]
    fn outputs_are_never_inputs() {
        for rule in [DerivedRule::BMI, DerivedRule::LEAVE_END_DATE] {
            assert!(!rule.depends_on(rule.output()));
        }
    }
}

//! Report validation and normalization per meeting type.
//!
//! The LLM output is dynamic JSON; before persisting, the parsed object is
//! checked against the expected shape. A missing or empty `summary` is a
//! validation failure; missing optional sections become empty values so the
//! stored report has a stable shape.

use anyhow::{bail, Result};
use serde_json::{json, Value};

use crate::record::MeetingType;

/// Validate and normalize a parsed report in place.
pub fn normalize_report(meeting_type: MeetingType, mut report: Value) -> Result<Value> {
    let Some(object) = report.as_object_mut() else {
        bail!("report is not a JSON object");
    };

    match object.get("summary").and_then(Value::as_str) {
        Some(summary) if !summary.trim().is_empty() => {}
        _ => bail!("report is missing a summary"),
    }

    let array_fields: &[&str] = match meeting_type {
        MeetingType::General => &[
            "keyTopics",
            "highlights",
            "lowlights",
            "decisions",
            "actions",
            "participants",
        ],
        MeetingType::Weekly => &[
            "announcements",
            "projectReviews",
            "decisions",
            "actions",
            "participants",
        ],
        MeetingType::Tech => &[
            "topics",
            "highlights",
            "lowlights",
            "actions",
            "knowledgeBase",
            "participants",
            "techStack",
        ],
        MeetingType::Customer => &[
            "awsAttendees",
            "customerNeeds",
            "painPoints",
            "solutionsDiscussed",
            "commitments",
            "nextSteps",
            "participants",
        ],
    };

    for field in array_fields {
        let entry = object.entry(field.to_string()).or_insert_with(|| json!([]));
        if !entry.is_array() {
            *entry = json!([]);
        }
    }

    match meeting_type {
        MeetingType::Weekly => {
            let entry = object
                .entry("teamKPI".to_string())
                .or_insert_with(|| json!({"overview": "", "individuals": []}));
            if !entry.is_object() {
                *entry = json!({"overview": "", "individuals": []});
            }
        }
        MeetingType::Customer => {
            let entry = object
                .entry("customerInfo".to_string())
                .or_insert_with(|| json!({"company": "", "attendees": []}));
            if !entry.is_object() {
                *entry = json!({"company": "", "attendees": []});
            }
        }
        _ => {}
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_general_report_normalizes() {
        let report = normalize_report(MeetingType::General, json!({"summary": "ok"})).unwrap();
        assert_eq!(report["summary"], "ok");
        assert!(report["actions"].as_array().unwrap().is_empty());
        assert!(report["keyTopics"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_missing_summary_fails() {
        assert!(normalize_report(MeetingType::General, json!({"actions": []})).is_err());
        assert!(normalize_report(MeetingType::General, json!({"summary": "  "})).is_err());
        assert!(normalize_report(MeetingType::General, json!({"summary": 42})).is_err());
    }

    #[test]
    fn test_non_object_fails() {
        assert!(normalize_report(MeetingType::General, json!(["summary"])).is_err());
        assert!(normalize_report(MeetingType::General, json!("summary")).is_err());
    }

    #[test]
    fn test_existing_sections_preserved() {
        let report = normalize_report(
            MeetingType::General,
            json!({
                "summary": "ok",
                "actions": [{"task": "ship it", "owner": "li", "deadline": "fri", "priority": "high"}]
            }),
        )
        .unwrap();
        assert_eq!(report["actions"][0]["task"], "ship it");
    }

    #[test]
    fn test_weekly_gets_team_kpi_object() {
        let report = normalize_report(MeetingType::Weekly, json!({"summary": "ok"})).unwrap();
        assert!(report["teamKPI"].is_object());
        assert!(report["projectReviews"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_customer_gets_customer_info() {
        let report = normalize_report(MeetingType::Customer, json!({"summary": "ok"})).unwrap();
        assert!(report["customerInfo"].is_object());
        assert!(report["commitments"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_wrong_typed_section_replaced() {
        let report = normalize_report(
            MeetingType::Tech,
            json!({"summary": "ok", "techStack": "not an array"}),
        )
        .unwrap();
        assert!(report["techStack"].as_array().unwrap().is_empty());
    }
}

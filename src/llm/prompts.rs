//! Report prompt builders, one schema per meeting type.
//!
//! Every prompt starts with an optional speaker note (only when the
//! transcript carries speaker labels) and an optional glossary note (only
//! when terms exist), then the type-specific JSON schema, then the
//! transcript. All prompts mandate JSON-only output.

use crate::record::{GlossaryTerm, MeetingType};

/// Marker emitted by the diarizing track; its presence means speaker labels
/// are in the transcript.
const SPEAKER_MARKER: &str = "[SPEAKER_";

fn speaker_note(transcript: &str) -> Option<String> {
    if transcript.contains(SPEAKER_MARKER) {
        Some(
            "转录文本中包含说话人标签（如 [SPEAKER_0]、[SPEAKER_1]）。\
             请利用这些标签区分不同发言人，在 participants 与各项归属字段中尽量\
             对应到具体说话人。\n\n"
                .to_string(),
        )
    } else {
        None
    }
}

fn glossary_note(terms: &[GlossaryTerm]) -> Option<String> {
    if terms.is_empty() {
        return None;
    }
    let mut note = String::from("术语表（请在输出中使用以下规范拼写）：\n");
    for term in terms {
        note.push_str("- ");
        note.push_str(&term.term);
        if !term.aliases.is_empty() {
            note.push_str("（别名: ");
            note.push_str(&term.aliases.join("、"));
            note.push('）');
        }
        if !term.definition.is_empty() {
            note.push_str(": ");
            note.push_str(&term.definition);
        }
        note.push('\n');
    }
    note.push('\n');
    Some(note)
}

/// Build the full report prompt for one meeting.
pub fn build_report_prompt(
    meeting_type: MeetingType,
    transcript: &str,
    terms: &[GlossaryTerm],
) -> String {
    let mut prompt = String::new();
    if let Some(note) = speaker_note(transcript) {
        prompt.push_str(&note);
    }
    if let Some(note) = glossary_note(terms) {
        prompt.push_str(&note);
    }
    prompt.push_str(schema_instructions(meeting_type));
    prompt.push_str("\n会议转录：\n");
    prompt.push_str(transcript);
    prompt.push_str("\n\n只输出 JSON，不要输出任何其他文字。");
    prompt
}

fn schema_instructions(meeting_type: MeetingType) -> &'static str {
    match meeting_type {
        MeetingType::General => GENERAL_SCHEMA,
        MeetingType::Weekly => WEEKLY_SCHEMA,
        MeetingType::Tech => TECH_SCHEMA,
        MeetingType::Customer => CUSTOMER_SCHEMA,
    }
}

const GENERAL_SCHEMA: &str = "\
你是一名专业的会议纪要助手。请根据会议转录生成结构化的会议纪要，输出一个 JSON 对象，\
包含以下字段：
{
  \"summary\": \"会议摘要（必填）\",
  \"keyTopics\": [\"讨论的关键主题\"],
  \"highlights\": [\"进展顺利的事项\"],
  \"lowlights\": [\"存在问题的事项\"],
  \"decisions\": [\"会议做出的决定\"],
  \"actions\": [{\"task\": \"\", \"owner\": \"\", \"deadline\": \"\", \"priority\": \"high|medium|low\"}],
  \"participants\": [\"参会人\"],
  \"duration\": \"会议时长估计\",
  \"meetingType\": \"general\"
}
没有内容的数组请输出空数组。
";

const WEEKLY_SCHEMA: &str = "\
你是一名专业的会议纪要助手。这是一次团队周会。请输出一个 JSON 对象，包含以下字段：
{
  \"summary\": \"会议摘要（必填）\",
  \"teamKPI\": {
    \"overview\": \"团队整体进展\",
    \"individuals\": [{\"name\": \"\", \"kpi\": \"\", \"status\": \"on-track|at-risk|completed\"}]
  },
  \"announcements\": [\"公告事项\"],
  \"projectReviews\": [{
    \"project\": \"\", \"progress\": \"\",
    \"followUps\": [], \"highlights\": [], \"lowlights\": [],
    \"risks\": [{\"impact\": \"high|medium|low\", \"mitigation\": \"\"}],
    \"challenges\": []
  }],
  \"decisions\": [],
  \"actions\": [{\"task\": \"\", \"owner\": \"\", \"deadline\": \"\", \"priority\": \"high|medium|low\"}],
  \"participants\": [],
  \"nextMeeting\": \"下次会议安排\"
}
没有内容的数组请输出空数组。
";

const TECH_SCHEMA: &str = "\
你是一名专业的会议纪要助手。这是一次技术讨论会。请输出一个 JSON 对象，包含以下字段：
{
  \"summary\": \"会议摘要（必填）\",
  \"topics\": [{\"topic\": \"\", \"discussion\": \"\", \"conclusion\": \"\"}],
  \"highlights\": [],
  \"lowlights\": [],
  \"actions\": [{\"task\": \"\", \"owner\": \"\", \"deadline\": \"\", \"priority\": \"high|medium|low\", \"estimate\": \"工作量估计\"}],
  \"knowledgeBase\": [{\"title\": \"\", \"content\": \"值得沉淀的技术结论\"}],
  \"participants\": [],
  \"techStack\": [\"涉及的技术栈\"]
}
没有内容的数组请输出空数组。
";

const CUSTOMER_SCHEMA: &str = "\
你是一名专业的会议纪要助手。这是一次客户会议。请输出一个 JSON 对象，包含以下字段：
{
  \"summary\": \"会议摘要（必填）\",
  \"customerInfo\": {\"company\": \"客户公司\", \"attendees\": [\"客户参会人\"]},
  \"awsAttendees\": [\"AWS 参会人\"],
  \"customerNeeds\": [{\"need\": \"\", \"priority\": \"high|medium|low\", \"background\": \"\"}],
  \"painPoints\": [{\"point\": \"\", \"detail\": \"\"}],
  \"solutionsDiscussed\": [{\"solution\": \"\", \"awsServices\": [], \"customerFeedback\": \"\"}],
  \"commitments\": [{\"party\": \"AWS|客户\", \"commitment\": \"\", \"owner\": \"\", \"deadline\": \"\"}],
  \"nextSteps\": [{\"task\": \"\", \"owner\": \"\", \"deadline\": \"\", \"priority\": \"high|medium|low\"}],
  \"participants\": []
}
没有内容的数组请输出空数组。
";

#[cfg(test)]
mod tests {
    use super::*;

    fn term(name: &str) -> GlossaryTerm {
        GlossaryTerm {
            term_id: format!("id-{name}"),
            term: name.to_string(),
            aliases: vec![],
            definition: String::new(),
            created_at: "t0".into(),
        }
    }

    #[test]
    fn test_speaker_note_only_with_marker() {
        let with = build_report_prompt(MeetingType::General, "[SPEAKER_0] 大家好", &[]);
        assert!(with.contains("说话人标签"));

        let without = build_report_prompt(MeetingType::General, "大家好", &[]);
        assert!(!without.contains("说话人标签"));
    }

    #[test]
    fn test_glossary_terms_all_present() {
        let terms = vec![term("EKS"), term("Bedrock"), term("Karpenter")];
        let prompt = build_report_prompt(MeetingType::Tech, "text", &terms);
        for t in &terms {
            assert!(prompt.contains(&t.term), "missing term {}", t.term);
        }

        let empty = build_report_prompt(MeetingType::Tech, "text", &[]);
        assert!(!empty.contains("术语表"));
    }

    #[test]
    fn test_glossary_note_includes_aliases_and_definition() {
        let terms = vec![GlossaryTerm {
            term_id: "g1".into(),
            term: "EKS".into(),
            aliases: vec!["Elastic Kubernetes Service".into()],
            definition: "托管 Kubernetes".into(),
            created_at: "t0".into(),
        }];
        let prompt = build_report_prompt(MeetingType::General, "text", &terms);
        assert!(prompt.contains("Elastic Kubernetes Service"));
        assert!(prompt.contains("托管 Kubernetes"));
    }

    #[test]
    fn test_customer_fields_only_in_customer_prompt() {
        let customer = build_report_prompt(MeetingType::Customer, "text", &[]);
        for field in [
            "customerInfo",
            "customerNeeds",
            "painPoints",
            "solutionsDiscussed",
            "commitments",
            "awsAttendees",
        ] {
            assert!(customer.contains(field), "customer prompt missing {field}");
        }

        for meeting_type in [MeetingType::General, MeetingType::Weekly, MeetingType::Tech] {
            let prompt = build_report_prompt(meeting_type, "text", &[]);
            for field in ["customerInfo", "customerNeeds", "painPoints", "solutionsDiscussed"] {
                assert!(
                    !prompt.contains(field),
                    "{} prompt unexpectedly contains {field}",
                    meeting_type.as_str()
                );
            }
        }
    }

    #[test]
    fn test_type_specific_fields() {
        let weekly = build_report_prompt(MeetingType::Weekly, "text", &[]);
        assert!(weekly.contains("teamKPI"));
        assert!(weekly.contains("projectReviews"));
        assert!(weekly.contains("nextMeeting"));

        let tech = build_report_prompt(MeetingType::Tech, "text", &[]);
        assert!(tech.contains("knowledgeBase"));
        assert!(tech.contains("techStack"));
        assert!(tech.contains("estimate"));

        let general = build_report_prompt(MeetingType::General, "text", &[]);
        assert!(general.contains("keyTopics"));
        assert!(general.contains("duration"));
    }

    #[test]
    fn test_prompt_mandates_json_only() {
        for meeting_type in [
            MeetingType::General,
            MeetingType::Weekly,
            MeetingType::Tech,
            MeetingType::Customer,
        ] {
            let prompt = build_report_prompt(meeting_type, "text", &[]);
            assert!(prompt.contains("只输出 JSON"));
            assert!(prompt.ends_with("不要输出任何其他文字。"));
        }
    }

    #[test]
    fn test_transcript_embedded() {
        let prompt = build_report_prompt(MeetingType::General, "独特的转录内容", &[]);
        assert!(prompt.contains("独特的转录内容"));
    }
}

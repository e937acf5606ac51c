//! HTML body renderer for delivery emails.
//!
//! Table-based markup assembled from the report JSON. Sections are rendered
//! only when present and non-empty; unknown report fields are skipped
//! silently so schema evolution never breaks delivery.

use serde_json::Value;

const BRAND_COLOR: &str = "#232f3e";
const ACCENT_COLOR: &str = "#ff9900";

pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn str_field<'a>(report: &'a Value, key: &str) -> Option<&'a str> {
    report.get(key).and_then(Value::as_str).filter(|s| !s.trim().is_empty())
}

fn array_field<'a>(report: &'a Value, key: &str) -> Option<&'a Vec<Value>> {
    report.get(key).and_then(Value::as_array).filter(|a| !a.is_empty())
}

fn section_title(title: &str) -> String {
    format!(
        "<h2 style=\"color:{BRAND_COLOR};border-bottom:2px solid {ACCENT_COLOR};\
         padding-bottom:4px;font-size:16px;\">{}</h2>",
        escape(title)
    )
}

fn list_section(out: &mut String, report: &Value, key: &str, title: &str) {
    let Some(items) = array_field(report, key) else {
        return;
    };
    out.push_str(&section_title(title));
    out.push_str("<ul>");
    for item in items {
        if let Some(text) = item.as_str() {
            out.push_str(&format!("<li>{}</li>", escape(text)));
        }
    }
    out.push_str("</ul>");
}

fn inline_list_section(out: &mut String, report: &Value, key: &str, title: &str) {
    let Some(items) = array_field(report, key) else {
        return;
    };
    let joined = items
        .iter()
        .filter_map(Value::as_str)
        .map(escape)
        .collect::<Vec<_>>()
        .join("、");
    if joined.is_empty() {
        return;
    }
    out.push_str(&section_title(title));
    out.push_str(&format!("<p>{joined}</p>"));
}

fn table_section(
    out: &mut String,
    report: &Value,
    key: &str,
    title: &str,
    columns: &[(&str, &str)],
) {
    let Some(rows) = array_field(report, key) else {
        return;
    };
    out.push_str(&section_title(title));
    out.push_str(
        "<table border=\"0\" cellpadding=\"6\" cellspacing=\"0\" \
         style=\"border-collapse:collapse;width:100%;font-size:14px;\">",
    );
    out.push_str(&format!(
        "<tr style=\"background:{BRAND_COLOR};color:#ffffff;\">{}</tr>",
        columns
            .iter()
            .map(|(header, _)| format!("<th align=\"left\">{}</th>", escape(header)))
            .collect::<String>()
    ));
    for row in rows {
        out.push_str("<tr style=\"border-bottom:1px solid #dddddd;\">");
        for (_, field) in columns {
            let cell = match row.get(*field) {
                Some(Value::String(s)) => escape(s),
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(escape)
                    .collect::<Vec<_>>()
                    .join("、"),
                Some(other) if !other.is_null() => escape(&other.to_string()),
                _ => String::new(),
            };
            out.push_str(&format!("<td valign=\"top\">{cell}</td>"));
        }
        out.push_str("</tr>");
    }
    out.push_str("</table>");
}

/// Render the delivery email body for a report.
pub fn render_report(meeting_name: &str, report: &Value) -> String {
    let mut out = String::new();
    out.push_str(
        "<html><body style=\"font-family:'Helvetica Neue',Arial,'PingFang SC',\
         'Microsoft YaHei',sans-serif;color:#333333;max-width:720px;margin:0 auto;\">",
    );
    out.push_str(&format!(
        "<div style=\"background:{BRAND_COLOR};color:#ffffff;padding:16px 20px;\">\
         <h1 style=\"margin:0;font-size:20px;\">会议纪要</h1>\
         <p style=\"margin:4px 0 0;color:{ACCENT_COLOR};\">{}</p></div>",
        escape(meeting_name)
    ));

    if let Some(summary) = str_field(report, "summary") {
        out.push_str(&section_title("摘要"));
        out.push_str(&format!("<p>{}</p>", escape(summary)));
    }

    list_section(&mut out, report, "keyTopics", "关键主题");
    list_section(&mut out, report, "announcements", "公告");
    list_section(&mut out, report, "highlights", "亮点");
    list_section(&mut out, report, "lowlights", "问题");
    list_section(&mut out, report, "decisions", "决定");

    // Weekly
    if let Some(kpi) = report.get("teamKPI").filter(|v| v.is_object()) {
        if let Some(overview) = str_field(kpi, "overview") {
            out.push_str(&section_title("团队进展"));
            out.push_str(&format!("<p>{}</p>", escape(overview)));
        }
        table_section(
            &mut out,
            kpi,
            "individuals",
            "个人 KPI",
            &[("成员", "name"), ("KPI", "kpi"), ("状态", "status")],
        );
    }
    table_section(
        &mut out,
        report,
        "projectReviews",
        "项目回顾",
        &[("项目", "project"), ("进展", "progress"), ("亮点", "highlights"), ("风险", "risks")],
    );

    // Tech
    table_section(
        &mut out,
        report,
        "topics",
        "技术议题",
        &[("议题", "topic"), ("讨论", "discussion"), ("结论", "conclusion")],
    );
    table_section(
        &mut out,
        report,
        "knowledgeBase",
        "知识沉淀",
        &[("标题", "title"), ("内容", "content")],
    );
    inline_list_section(&mut out, report, "techStack", "技术栈");

    // Customer
    if let Some(info) = report.get("customerInfo").filter(|v| v.is_object()) {
        if let Some(company) = str_field(info, "company") {
            out.push_str(&section_title("客户信息"));
            out.push_str(&format!("<p>{}</p>", escape(company)));
        }
    }
    table_section(
        &mut out,
        report,
        "customerNeeds",
        "客户需求",
        &[("需求", "need"), ("优先级", "priority"), ("背景", "background")],
    );
    table_section(
        &mut out,
        report,
        "painPoints",
        "痛点",
        &[("痛点", "point"), ("详情", "detail")],
    );
    table_section(
        &mut out,
        report,
        "solutionsDiscussed",
        "讨论的方案",
        &[("方案", "solution"), ("服务", "awsServices"), ("客户反馈", "customerFeedback")],
    );
    table_section(
        &mut out,
        report,
        "commitments",
        "承诺事项",
        &[("承诺方", "party"), ("承诺", "commitment"), ("负责人", "owner"), ("期限", "deadline")],
    );
    table_section(
        &mut out,
        report,
        "nextSteps",
        "下一步",
        &[("任务", "task"), ("负责人", "owner"), ("期限", "deadline"), ("优先级", "priority")],
    );

    table_section(
        &mut out,
        report,
        "actions",
        "行动项",
        &[("任务", "task"), ("负责人", "owner"), ("期限", "deadline"), ("优先级", "priority")],
    );
    inline_list_section(&mut out, report, "participants", "参会人");

    if let Some(next_meeting) = str_field(report, "nextMeeting") {
        out.push_str(&section_title("下次会议"));
        out.push_str(&format!("<p>{}</p>", escape(next_meeting)));
    }

    out.push_str(
        "<p style=\"color:#999999;font-size:12px;margin-top:24px;\">\
         本邮件由会议纪要服务自动生成。</p>",
    );
    out.push_str("</body></html>");
    out
}

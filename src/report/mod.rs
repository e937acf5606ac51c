//! Ensemble transcript assembly and prompt-input truncation.
//!
//! The report stage fuses up to three per-track transcripts into one
//! labelled text, then bounds the result before prompting:
//! FunASR-only input is trimmed after its label, dual-track input is trimmed
//! per side around the Whisper label, anything else is trimmed as a whole.

use anyhow::{Context, Result};
use serde::Deserialize;

pub mod schema;

pub const AWS_LABEL: &str = "[AWS Transcribe 转录]";
pub const WHISPER_LABEL: &str = "[Whisper 转录]";
pub const FUNASR_LABEL: &str = "[FunASR 转录（含说话人标签）]";

const SIDE_LIMIT: usize = 60_000;
const WHOLE_LIMIT: usize = 120_000;

/// Shape written by the managed transcribe service.
#[derive(Debug, Deserialize)]
struct TranscribeOutput {
    results: TranscribeResults,
}

#[derive(Debug, Deserialize)]
struct TranscribeResults {
    transcripts: Vec<TranscribeAlternative>,
}

#[derive(Debug, Deserialize)]
struct TranscribeAlternative {
    transcript: String,
}

#[derive(Debug, Deserialize)]
struct FunAsrOutput {
    #[serde(default)]
    segments: Vec<FunAsrSegment>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FunAsrSegment {
    #[serde(default)]
    pub speaker: String,
    #[serde(default)]
    pub text: String,
}

/// Extract plain text from a raw transcript blob. The managed-service output
/// shape yields its inner transcript; anything else is used verbatim.
pub fn plain_text(raw: &[u8]) -> String {
    if let Ok(output) = serde_json::from_slice::<TranscribeOutput>(raw) {
        if let Some(first) = output.results.transcripts.into_iter().next() {
            return first.transcript;
        }
    }
    String::from_utf8_lossy(raw).into_owned()
}

/// Render a FunASR transcript as speaker-labelled lines.
///
/// Adjacent segments with the same speaker tag are coalesced; the body is
/// bounded, then prefixed with the FunASR label.
pub fn render_funasr(raw: &[u8]) -> Result<String> {
    let output: FunAsrOutput =
        serde_json::from_slice(raw).context("FunASR transcript is not valid JSON")?;

    let mut lines: Vec<(String, String)> = Vec::new();
    for segment in output.segments {
        match lines.last_mut() {
            Some((speaker, text)) if *speaker == segment.speaker => {
                text.push_str(&segment.text);
            }
            _ => lines.push((segment.speaker, segment.text)),
        }
    }

    let body = lines
        .into_iter()
        .map(|(speaker, text)| format!("[{speaker}] {text}"))
        .collect::<Vec<_>>()
        .join("\n");

    Ok(format!("{FUNASR_LABEL}\n{}", truncate_chars(&body, SIDE_LIMIT)))
}

/// Fuse the present per-track texts into the ensemble transcript.
/// Returns `None` when no source contributed anything.
pub fn assemble(
    transcribe: Option<String>,
    whisper: Option<String>,
    funasr_block: Option<String>,
) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();

    match (transcribe, whisper) {
        (Some(aws), Some(whisper)) => {
            parts.push(format!("{AWS_LABEL}\n{aws}\n\n{WHISPER_LABEL}\n{whisper}"));
        }
        (Some(aws), None) => parts.push(aws),
        (None, Some(whisper)) => parts.push(whisper),
        (None, None) => {}
    }

    if let Some(block) = funasr_block {
        parts.push(block);
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// Bound the assembled transcript before prompting.
pub fn truncate_for_prompt(text: &str) -> String {
    let has_aws = text.contains(AWS_LABEL);
    let has_whisper = text.contains(WHISPER_LABEL);

    if has_aws && has_whisper {
        // Dual-track: bound each side of the Whisper label independently.
        if let Some((left, right)) = text.split_once(WHISPER_LABEL) {
            return format!(
                "{}{WHISPER_LABEL}{}",
                truncate_chars(left, SIDE_LIMIT),
                truncate_chars(right, SIDE_LIMIT)
            );
        }
    }

    if text.starts_with(FUNASR_LABEL) && !has_aws && !has_whisper {
        // FunASR-only: the body is already bounded at render time; keep the
        // invariant even if a caller hands us a longer block.
        let body = &text[FUNASR_LABEL.len()..];
        return format!("{FUNASR_LABEL}{}", truncate_chars(body, SIDE_LIMIT));
    }

    truncate_chars(text, WHOLE_LIMIT)
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        text.chars().take(limit).collect()
    }
}

/// Extract the outermost JSON object from an LLM response: the substring
/// from the first `{` to the last `}`.
pub fn extract_json_object(text: &str) -> Result<serde_json::Value> {
    let start = text.find('{').context("LLM response contains no JSON object")?;
    let end = text.rfind('}').context("LLM response contains no JSON object")?;
    if end < start {
        anyhow::bail!("LLM response contains no JSON object");
    }
    serde_json::from_str(&text[start..=end]).context("LLM response JSON is malformed")
}

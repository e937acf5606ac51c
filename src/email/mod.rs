//! Email port and message shape.

use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;
use regex::Regex;
use std::sync::OnceLock;

pub mod html;
pub mod memory;
pub mod sendmail;

pub use memory::MemoryMailer;
pub use sendmail::SendmailMailer;

/// One HTML email ready for transport.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub html_body: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_html(&self, message: &EmailMessage) -> Result<()>;
}

/// MIME encoded-word for a UTF-8 subject line.
pub fn encode_subject(subject: &str) -> String {
    if subject.is_ascii() {
        subject.to_string()
    } else {
        format!(
            "=?UTF-8?B?{}?=",
            base64::engine::general_purpose::STANDARD.encode(subject.as_bytes())
        )
    }
}

/// Lightweight address check; mirrors the validation applied at upload time.
pub fn is_valid_email(address: &str) -> bool {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    let re = EMAIL_RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());
    re.is_match(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_subject_unchanged() {
        assert_eq!(encode_subject("Meeting Minutes - standup"), "Meeting Minutes - standup");
    }

    #[test]
    fn test_utf8_subject_encoded() {
        let encoded = encode_subject("会议纪要 - 周会");
        assert!(encoded.starts_with("=?UTF-8?B?"));
        assert!(encoded.ends_with("?="));

        let inner = &encoded["=?UTF-8?B?".len()..encoded.len() - 2];
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(inner)
            .unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "会议纪要 - 周会");
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("a@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.co"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a b@example.com"));
        assert!(!is_valid_email("a@no-dot"));
        assert!(!is_valid_email("@example.com"));
    }
}

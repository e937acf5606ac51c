//! Local sendmail transport.
//!
//! Pipes a complete MIME message to the sendmail binary's stdin. Managed
//! email services are external collaborators behind the same port.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use super::{encode_subject, EmailMessage, EmailSender};

const SEND_TIMEOUT: Duration = Duration::from_secs(60);

pub struct SendmailMailer {
    sendmail_path: String,
}

impl SendmailMailer {
    pub fn new(sendmail_path: impl Into<String>) -> Self {
        Self {
            sendmail_path: sendmail_path.into(),
        }
    }

    fn render_mime(message: &EmailMessage) -> String {
        let mut mime = String::new();
        mime.push_str(&format!("From: {}\r\n", message.from));
        mime.push_str(&format!("To: {}\r\n", message.to.join(", ")));
        if !message.bcc.is_empty() {
            mime.push_str(&format!("Bcc: {}\r\n", message.bcc.join(", ")));
        }
        mime.push_str(&format!("Subject: {}\r\n", encode_subject(&message.subject)));
        mime.push_str("MIME-Version: 1.0\r\n");
        mime.push_str("Content-Type: text/html; charset=UTF-8\r\n");
        mime.push_str("Content-Transfer-Encoding: 8bit\r\n");
        mime.push_str("\r\n");
        mime.push_str(&message.html_body);
        mime
    }
}

#[async_trait]
impl EmailSender for SendmailMailer {
    async fn send_html(&self, message: &EmailMessage) -> Result<()> {
        info!(
            "Sending email via {} to {} recipient(s)",
            self.sendmail_path,
            message.to.len() + message.bcc.len()
        );

        let mut child = tokio::process::Command::new(&self.sendmail_path)
            .arg("-i")
            .arg("-t")
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.sendmail_path))?;

        let mime = Self::render_mime(message);
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(mime.as_bytes())
                .await
                .context("Failed to write message to sendmail")?;
            // Drop stdin to signal EOF
        }

        // kill_on_drop handles cleanup on timeout
        match tokio::time::timeout(SEND_TIMEOUT, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                if output.status.success() {
                    info!("Email accepted by sendmail");
                    Ok(())
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    bail!("sendmail exited with {}: {}", output.status, stderr.trim());
                }
            }
            Ok(Err(e)) => {
                warn!("sendmail failed to run: {e}");
                Err(e.into())
            }
            Err(_) => bail!(
                "sendmail timed out after {}s (process will be killed)",
                SEND_TIMEOUT.as_secs()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> EmailMessage {
        EmailMessage {
            from: "minutes@example.com".into(),
            to: vec!["a@example.com".into(), "b@example.com".into()],
            bcc: vec!["team@example.com".into()],
            subject: "会议纪要 - 周会".into(),
            html_body: "<h1>纪要</h1>".into(),
        }
    }

    #[test]
    fn test_mime_headers() {
        let mime = SendmailMailer::render_mime(&message());
        assert!(mime.contains("From: minutes@example.com\r\n"));
        assert!(mime.contains("To: a@example.com, b@example.com\r\n"));
        assert!(mime.contains("Bcc: team@example.com\r\n"));
        assert!(mime.contains("Subject: =?UTF-8?B?"));
        assert!(mime.contains("Content-Type: text/html; charset=UTF-8\r\n"));
        assert!(mime.ends_with("<h1>纪要</h1>"));
    }

    #[test]
    fn test_mime_omits_empty_bcc() {
        let mut msg = message();
        msg.bcc.clear();
        let mime = SendmailMailer::render_mime(&msg);
        assert!(!mime.contains("Bcc:"));
    }

    #[tokio::test]
    async fn test_script_as_sendmail_succeeds() {
        use std::os::unix::fs::PermissionsExt;

        // A stand-in that consumes stdin and exits zero.
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("sendmail");
        std::fs::write(&script, "#!/bin/sh\ncat > /dev/null\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mailer = SendmailMailer::new(script.to_string_lossy().to_string());
        assert!(mailer.send_html(&message()).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_binary_fails() {
        let mailer = SendmailMailer::new("/nonexistent/sendmail");
        assert!(mailer.send_html(&message()).await.is_err());
    }
}

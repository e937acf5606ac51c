//! Environment-based service configuration.
//!
//! Every deployment knob is an environment variable; `Config::from_env()`
//! reads them once at startup and validates the combination. Poll cadences
//! are compile-time constants, not configuration.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

const DEFAULT_API_ADDR: &str = "127.0.0.1:3737";
const DEFAULT_SENDMAIL_PATH: &str = "/usr/sbin/sendmail";

#[derive(Debug, Clone)]
pub struct Config {
    /// Blob namespace (bucket name passed to the ASR servers).
    pub s3_bucket: String,
    /// Key prefix inside the blob namespace.
    pub s3_prefix: String,
    /// Record table name (informational for managed adapters).
    pub dynamodb_table: String,
    /// Glossary table name.
    pub glossary_table: String,
    pub transcription_queue: String,
    pub report_queue: String,
    pub export_queue: String,
    pub asr: AsrConfig,
    pub llm: LlmConfig,
    pub email: EmailConfig,
    /// Root directory for the local record store and blob prefix.
    pub data_dir: PathBuf,
    /// Bind address for the retry/health HTTP surface.
    pub api_addr: String,
    pub aws_region: String,
}

#[derive(Debug, Clone)]
pub struct AsrConfig {
    pub enable_transcribe: bool,
    pub enable_whisper: bool,
    pub whisper_url: String,
    /// Non-empty enables the FunASR track.
    pub funasr_url: String,
}

impl AsrConfig {
    pub fn funasr_enabled(&self) -> bool {
        !self.funasr_url.is_empty()
    }

    pub fn any_track_enabled(&self) -> bool {
        self.enable_transcribe || self.enable_whisper || self.funasr_enabled()
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub from: String,
    /// Default recipient; empty means "no default".
    pub default_to: String,
    pub sendmail_path: String,
}

fn env_string(name: &str) -> String {
    std::env::var(name).unwrap_or_default()
}

fn env_bool(name: &str) -> bool {
    matches!(
        std::env::var(name).unwrap_or_default().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let data_dir = match std::env::var("DATA_DIR") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::data_dir()
                .map(|d| d.join("minutecast"))
                .context("Unable to determine data directory; set DATA_DIR")?,
        };

        let config = Self {
            s3_bucket: env_string("S3_BUCKET"),
            s3_prefix: env_string("S3_PREFIX"),
            dynamodb_table: env_string("DYNAMODB_TABLE"),
            glossary_table: env_string("GLOSSARY_TABLE"),
            transcription_queue: non_empty_or("SQS_TRANSCRIPTION_QUEUE", "transcription"),
            report_queue: non_empty_or("SQS_REPORT_QUEUE", "report"),
            export_queue: non_empty_or("SQS_EXPORT_QUEUE", "export"),
            asr: AsrConfig {
                enable_transcribe: env_bool("ENABLE_TRANSCRIBE"),
                enable_whisper: env_bool("ENABLE_WHISPER"),
                whisper_url: env_string("WHISPER_URL"),
                funasr_url: env_string("FUNASR_URL"),
            },
            llm: LlmConfig {
                url: env_string("LLM_URL"),
                api_key: env_string("LLM_API_KEY"),
                model: non_empty_or("LLM_MODEL", "gpt-4o"),
            },
            email: EmailConfig {
                from: env_string("SES_FROM_EMAIL"),
                default_to: env_string("SES_TO_EMAIL"),
                sendmail_path: non_empty_or("SENDMAIL_PATH", DEFAULT_SENDMAIL_PATH),
            },
            data_dir,
            api_addr: non_empty_or("API_ADDR", DEFAULT_API_ADDR),
            aws_region: env_string("AWS_REGION"),
        };

        config.validate()?;
        Ok(config)
    }

    /// Startup validation. All ASR tracks disabled is a configuration error;
    /// it would make every job fail after a full fan-out.
    pub fn validate(&self) -> Result<()> {
        if !self.asr.any_track_enabled() {
            bail!("No ASR track enabled. Set ENABLE_TRANSCRIBE, ENABLE_WHISPER or FUNASR_URL.");
        }
        if self.asr.enable_whisper && self.asr.whisper_url.is_empty() {
            bail!("ENABLE_WHISPER is set but WHISPER_URL is empty");
        }
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("minutecast.db")
    }

    pub fn blob_root(&self) -> PathBuf {
        self.data_dir.join("blobs")
    }
}

fn non_empty_or(name: &str, default: &str) -> String {
    let value = env_string(name);
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            s3_bucket: "media".into(),
            s3_prefix: "".into(),
            dynamodb_table: "meetings".into(),
            glossary_table: "glossary".into(),
            transcription_queue: "transcription".into(),
            report_queue: "report".into(),
            export_queue: "export".into(),
            asr: AsrConfig {
                enable_transcribe: false,
                enable_whisper: true,
                whisper_url: "http://localhost:9000".into(),
                funasr_url: String::new(),
            },
            llm: LlmConfig {
                url: "http://localhost:8000/v1".into(),
                api_key: String::new(),
                model: "gpt-4o".into(),
            },
            email: EmailConfig {
                from: "minutes@example.com".into(),
                default_to: "team@example.com".into(),
                sendmail_path: DEFAULT_SENDMAIL_PATH.into(),
            },
            data_dir: PathBuf::from("/tmp/minutecast-test"),
            api_addr: DEFAULT_API_ADDR.into(),
            aws_region: String::new(),
        }
    }

    #[test]
    fn test_validate_accepts_single_track() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_all_tracks_disabled() {
        let mut config = test_config();
        config.asr.enable_whisper = false;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("No ASR track enabled"));
    }

    #[test]
    fn test_validate_rejects_whisper_without_url() {
        let mut config = test_config();
        config.asr.whisper_url = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_funasr_enabled_by_url() {
        let mut config = test_config();
        assert!(!config.asr.funasr_enabled());
        config.asr.funasr_url = "http://localhost:9001".into();
        assert!(config.asr.funasr_enabled());
    }
}

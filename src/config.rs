//! Configuration types, read from `REPORT_*` environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::pipeline::WorkerPool;
use crate::render::PageSize;

pub const DEFAULT_SMTP_HOST: &str = "smtp.yandex.com";
pub const DEFAULT_SMTP_PORT: u16 = 465;
pub const DEFAULT_SUBJECT: &str = "Report from service";
pub const DEFAULT_BODY: &str = "Reports attached.";

// ── Mail ────────────────────────────────────────────────────────────

/// SMTP delivery settings.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
    pub to_addresses: Vec<String>,
    pub subject: String,
    pub body: String,
    /// Socket timeout for every SMTP exchange.
    pub timeout: Duration,
}

impl MailConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. `from_env` with a seam for tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let username = lookup("REPORT_SMTP_USERNAME").unwrap_or_default();
        let from_address = lookup("REPORT_FROM").unwrap_or_else(|| username.clone());

        let to_addresses = lookup("REPORT_TO")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host: lookup("REPORT_SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            port: parse_or(&lookup, "REPORT_SMTP_PORT", DEFAULT_SMTP_PORT)?,
            username,
            password: SecretString::from(lookup("REPORT_SMTP_PASSWORD").unwrap_or_default()),
            from_address,
            to_addresses,
            subject: lookup("REPORT_SUBJECT").unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
            body: DEFAULT_BODY.to_string(),
            timeout: Duration::from_secs(parse_or(&lookup, "REPORT_SMTP_TIMEOUT_SECS", 30)?),
        })
    }
}

// ── Report pipeline ─────────────────────────────────────────────────

/// Everything the binary needs to run one batch.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub page: PageSize,
    /// Worker pool size.
    pub workers: usize,
    /// Per-batch build deadline; `None` waits indefinitely.
    pub deadline: Option<Duration>,
    /// TTF font to embed instead of built-in Helvetica.
    pub font_path: Option<PathBuf>,
    /// Ignore the payload and run the built-in demo request.
    pub test_mode: bool,
    pub mail: MailConfig,
}

impl ReportConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default_page = PageSize::default();
        let page = PageSize::new(
            parse_or(&lookup, "REPORT_PAGE_WIDTH_MM", default_page.width_mm)?,
            parse_or(&lookup, "REPORT_PAGE_HEIGHT_MM", default_page.height_mm)?,
        );
        if !(page.width_mm > 0.0 && page.height_mm > 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "REPORT_PAGE_WIDTH_MM/REPORT_PAGE_HEIGHT_MM".to_string(),
                message: format!("page must be positive, got {}x{}", page.width_mm, page.height_mm),
            });
        }

        let workers = parse_or(&lookup, "REPORT_WORKERS", WorkerPool::default_size())?;
        if workers == 0 {
            return Err(ConfigError::InvalidValue {
                key: "REPORT_WORKERS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        let deadline = parse_opt::<u64, _>(&lookup, "REPORT_DEADLINE_SECS")?.map(Duration::from_secs);
        let font_path = lookup("REPORT_FONT_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        let test_mode = parse_flag(&lookup, "REPORT_TEST_MODE")?;

        Ok(Self {
            page,
            workers,
            deadline,
            font_path,
            test_mode,
            mail: MailConfig::from_lookup(lookup)?,
        })
    }
}

// ── Parsing helpers ─────────────────────────────────────────────────

fn parse_opt<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|raw| raw.trim().to_string()) {
        None => Ok(None),
        Some(raw) if raw.is_empty() => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{raw:?}: {e}"),
            }),
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_opt(lookup, key)?.unwrap_or(default))
}

fn parse_flag<F>(lookup: &F, key: &str) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" => Ok(false),
        "1" | "true" | "yes" | "on" => Ok(true),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got {other:?}"),
        }),
    }
}

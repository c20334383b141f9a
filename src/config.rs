//! Configuration lookup: process environment, then `--set` overrides, then a `.env` file.

use crate::error::{IsoError, Result};
use crate::infrastructure::pool::{DEFAULT_CONNECTION_TIMEOUT, DEFAULT_MAX_POOL, PoolConfig};
use chrono::{FixedOffset, Local, NaiveDateTime, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

pub const ISO_SERVER_HOST: &str = "ISO_SERVER_HOST";
pub const ISO_SERVER_PORT: &str = "ISO_SERVER_PORT";
pub const ISO_SERVER_BIND: &str = "ISO_SERVER_BIND";
pub const ISO_CONNECT_TIMEOUT_MS: &str = "ISO_CONNECT_TIMEOUT_MS";
pub const ISO_RESPONSE_TIMEOUT_MS: &str = "ISO_RESPONSE_TIMEOUT_MS";
pub const ISO_CLIENT_TIMEZONE: &str = "ISO_CLIENT_TIMEZONE";
pub const ISO_DB_PATH: &str = "ISO_DB_PATH";
pub const ISO_JOURNAL_CSV: &str = "ISO_JOURNAL_CSV";
pub const ISO_DB_MAX_POOL: &str = "ISO_DB_MAX_POOL";
pub const ISO_DB_CONNECTION_TIMEOUT: &str = "ISO_DB_CONNECTION_TIMEOUT";

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_TIMEOUT_MS: i64 = 30_000;
pub const DEFAULT_BIND: &str = "0.0.0.0";

/// Layered key/value configuration.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    overrides: HashMap<String, String>,
    dotenv: HashMap<String, String>,
}

impl Environment {
    /// Reads `env_file` if it exists; a missing file is not an error and malformed lines are skipped.
    pub fn load(env_file: Option<&Path>, overrides: Vec<(String, String)>) -> Self {
        let path = env_file.unwrap_or_else(|| Path::new(".env"));
        let dotenv = match dotenvy::from_path_iter(path) {
            Ok(entries) => {
                let entries: HashMap<String, String> = entries.filter_map(|entry| entry.ok()).collect();
                info!(count = entries.len(), file = %path.display(), "loaded .env entries");
                entries
            }
            Err(_) => HashMap::new(),
        };
        Self::from_parts(dotenv, overrides.into_iter().collect())
    }

    pub fn from_parts(dotenv: HashMap<String, String>, overrides: HashMap<String, String>) -> Self {
        Self { overrides, dotenv }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .or_else(|| self.overrides.get(key).cloned())
            .or_else(|| self.dotenv.get(key).cloned())
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_required(&self, key: &str) -> Result<String> {
        self.get(key)
            .ok_or_else(|| IsoError::MissingConfig(key.to_string()))
    }

    /// Parses `key`, warning and falling back to `default` on garbage.
    pub fn get_parsed<T>(&self, key: &str, default: T) -> T
    where
        T: FromStr + std::fmt::Display,
    {
        match self.get(key) {
            None => default,
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                warn!("Configuration value '{raw}' for key '{key}' is not valid. Using default {default}.");
                default
            }),
        }
    }
}

/// Parses dotenv content. Malformed lines are skipped.
pub fn parse_dotenv(content: &str) -> HashMap<String, String> {
    dotenvy::from_read_iter(content.as_bytes())
        .filter_map(|entry| entry.ok())
        .collect()
}

/// `clap` value parser for `--set KEY=VALUE`.
pub fn parse_override(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

/// Clock used to stamp outgoing requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientTimezone {
    Utc,
    Local,
    Fixed(FixedOffset),
    /// IANA region such as `Asia/Tehran`, daylight saving included.
    Region(Tz),
}

impl ClientTimezone {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if ["UTC", "Z", "GMT"].iter().any(|z| raw.eq_ignore_ascii_case(z)) {
            return Some(Self::Utc);
        }
        if raw.eq_ignore_ascii_case("local") {
            return Some(Self::Local);
        }
        if let Some(offset) = parse_offset(raw) {
            return Some(Self::Fixed(offset));
        }
        raw.parse::<Tz>().ok().map(Self::Region)
    }

    pub fn now(&self) -> NaiveDateTime {
        match self {
            ClientTimezone::Utc => Utc::now().naive_utc(),
            ClientTimezone::Local => Local::now().naive_local(),
            ClientTimezone::Fixed(offset) => Utc::now().with_timezone(offset).naive_local(),
            ClientTimezone::Region(tz) => Utc::now().with_timezone(tz).naive_local(),
        }
    }
}

/// `+HH:MM`, `-HHMM` or `+HH`.
fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let sign = match raw.as_bytes().first()? {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let digits: String = raw[1..].chars().filter(|c| *c != ':').collect();
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Values placed into the outgoing authorization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDefaults {
    pub pan: String,
    pub processing_code: String,
    pub amount: String,
    pub pos_entry_mode: String,
    pub pos_condition_code: String,
    pub acquirer_id: String,
    pub terminal_id: String,
    pub merchant_id: String,
    pub currency_code: String,
}

impl RequestDefaults {
    pub fn from_env(env: &Environment) -> Self {
        Self {
            pan: env.get_or("ISO_PAN", "4242424242424242"),
            processing_code: env.get_or("ISO_PROCESSING_CODE", "000000"),
            amount: env.get_or("ISO_AMOUNT", "000000010000"),
            pos_entry_mode: env.get_or("ISO_POS_ENTRY_MODE", "012"),
            pos_condition_code: env.get_or("ISO_POS_CONDITION_CODE", "00"),
            acquirer_id: env.get_or("ISO_ACQUIRER_ID", "000000"),
            terminal_id: env.get_or("ISO_TERMINAL_ID", "TERMID01"),
            merchant_id: env.get_or("ISO_MERCHANT_ID", "MERCHANT0001"),
            currency_code: env.get_or("ISO_CURRENCY_CODE", "840"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Raw comma separated host list.
    pub hosts: Option<String>,
    pub port: u16,
    pub connect_timeout_ms: i64,
    pub response_timeout_ms: i64,
    pub timezone: ClientTimezone,
    pub request: RequestDefaults,
}

impl ClientConfig {
    pub fn from_env(env: &Environment) -> Self {
        let timezone = match env.get(ISO_CLIENT_TIMEZONE) {
            None => ClientTimezone::Utc,
            Some(raw) => ClientTimezone::parse(&raw).unwrap_or_else(|| {
                warn!("Unsupported timezone '{raw}', using UTC");
                ClientTimezone::Utc
            }),
        };
        Self {
            hosts: env.get(ISO_SERVER_HOST),
            port: env.get_parsed(ISO_SERVER_PORT, DEFAULT_PORT),
            connect_timeout_ms: env.get_parsed(ISO_CONNECT_TIMEOUT_MS, DEFAULT_TIMEOUT_MS),
            response_timeout_ms: env.get_parsed(ISO_RESPONSE_TIMEOUT_MS, DEFAULT_TIMEOUT_MS),
            timezone,
            request: RequestDefaults::from_env(env),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub db_path: Option<PathBuf>,
    pub journal_csv: Option<PathBuf>,
    pub pool: PoolConfig,
}

impl ServerConfig {
    pub fn from_env(env: &Environment) -> Self {
        let timeout_ms = env.get_parsed(
            ISO_DB_CONNECTION_TIMEOUT,
            DEFAULT_CONNECTION_TIMEOUT.as_millis() as u64,
        );
        Self {
            bind: env.get_or(ISO_SERVER_BIND, DEFAULT_BIND),
            port: env.get_parsed(ISO_SERVER_PORT, DEFAULT_PORT),
            db_path: env.get(ISO_DB_PATH).map(PathBuf::from),
            journal_csv: env.get(ISO_JOURNAL_CSV).map(PathBuf::from),
            pool: PoolConfig {
                max_size: env.get_parsed(ISO_DB_MAX_POOL, DEFAULT_MAX_POOL),
                connection_timeout: Duration::from_millis(timeout_ms),
            },
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(dotenv: &[(&str, &str)], overrides: &[(&str, &str)]) -> Environment {
        let to_map = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };
        Environment::from_parts(to_map(dotenv), to_map(overrides))
    }

    #[test]
    fn test_parse_dotenv() {
        let parsed = parse_dotenv(
            "# comment\nISO_SERVER_HOST=server\n\nexport ISO_PAN=\"5555\"\nnot a pair\nBAD KEY=1\nEMPTY=\n",
        );
        assert_eq!(parsed.get("ISO_SERVER_HOST").unwrap(), "server");
        assert_eq!(parsed.get("ISO_PAN").unwrap(), "5555");
        assert_eq!(parsed.get("EMPTY").unwrap(), "");
        assert_eq!(parsed.len(), 3);
    }

    #[test]
    fn test_parse_dotenv_inline_comment_and_escapes() {
        let parsed = parse_dotenv("ISO_AMOUNT=000000005000 # fifty\nISO_MERCHANT_ID=\"SHOP \\\"1\\\"\"\n");
        assert_eq!(parsed.get("ISO_AMOUNT").unwrap(), "000000005000");
        assert_eq!(parsed.get("ISO_MERCHANT_ID").unwrap(), "SHOP \"1\"");
    }

    #[test]
    fn test_overrides_win_over_dotenv() {
        let env = env(
            &[("ISOGATE_TEST_LAYERED", "file")],
            &[("ISOGATE_TEST_LAYERED", "override")],
        );
        assert_eq!(env.get("ISOGATE_TEST_LAYERED").unwrap(), "override");
    }

    #[test]
    fn test_get_required_reports_key() {
        let err = env(&[], &[]).get_required("ISOGATE_TEST_ABSENT").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required configuration value: ISOGATE_TEST_ABSENT"
        );
    }

    #[test]
    fn test_invalid_number_falls_back() {
        let env = env(&[("ISOGATE_TEST_NUM", "abc")], &[]);
        assert_eq!(env.get_parsed("ISOGATE_TEST_NUM", 42i64), 42);
        let env = Environment::from_parts(
            HashMap::new(),
            [("ISOGATE_TEST_NUM2".to_string(), " -5 ".to_string())].into(),
        );
        assert_eq!(env.get_parsed("ISOGATE_TEST_NUM2", 0i64), -5);
    }

    #[test]
    fn test_parse_override() {
        assert_eq!(
            parse_override("A=b=c").unwrap(),
            ("A".to_string(), "b=c".to_string())
        );
        assert!(parse_override("novalue").is_err());
        assert!(parse_override("=x").is_err());
    }

    #[test]
    fn test_timezone_parse() {
        assert_eq!(ClientTimezone::parse("utc"), Some(ClientTimezone::Utc));
        assert_eq!(ClientTimezone::parse("Local"), Some(ClientTimezone::Local));
        assert!(matches!(
            ClientTimezone::parse("+03:30"),
            Some(ClientTimezone::Fixed(_))
        ));
        assert_eq!(ClientTimezone::parse("Mars/Olympus"), None);
    }

    #[test]
    fn test_timezone_region_follows_zone_rules() {
        let tehran = ClientTimezone::parse("Asia/Tehran");
        assert_eq!(tehran, Some(ClientTimezone::Region(chrono_tz::Asia::Tehran)));

        let Some(ClientTimezone::Region(tz)) = ClientTimezone::parse("Europe/Berlin") else {
            panic!("Europe/Berlin should parse as a region");
        };
        let winter = chrono::NaiveDate::from_ymd_opt(2026, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc();
        let summer = chrono::NaiveDate::from_ymd_opt(2026, 7, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc();
        assert_eq!(winter.with_timezone(&tz).naive_local().format("%H").to_string(), "13");
        assert_eq!(summer.with_timezone(&tz).naive_local().format("%H").to_string(), "14");
    }

    #[test]
    fn test_request_defaults() {
        let defaults = RequestDefaults::from_env(&env(&[("ISOGATE_UNUSED", "x")], &[]));
        if std::env::var("ISO_PAN").is_err() {
            assert_eq!(defaults.pan, "4242424242424242");
        }
        if std::env::var("ISO_TERMINAL_ID").is_err() {
            assert_eq!(defaults.terminal_id, "TERMID01");
        }
    }
}

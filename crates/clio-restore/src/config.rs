//! Runtime configuration: environment variables and command-line flags.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;

use clio_core::defaults::{FETCH_TIMEOUT_SECS, TRANSCODE_TIMEOUT_SECS};
use clio_core::{Error, Result};

/// Restore a FriendFeed archive into FreeFeed.
#[derive(Debug, Parser)]
#[command(name = "clio-restore", version, about)]
pub struct Cli {
    /// Path to the clio archive (.zip)
    pub archive: PathBuf,

    /// Restore entries created after this date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub from_date: Option<NaiveDate>,

    /// Restore entries created before this date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub to_date: Option<NaiveDate>,
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("invalid date {:?}: {}", s, e))
}

/// Inclusive date window of entries to restore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateFilter {
    /// Both bounds are taken at midnight UTC.
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self {
            from: from.and_then(midnight_utc),
            to: to.and_then(midnight_utc),
        }
    }

    pub fn accepts(&self, date: DateTime<Utc>) -> bool {
        if matches!(self.from, Some(from) if date < from) {
            return false;
        }
        !matches!(self.to, Some(to) if date > to)
    }
}

fn midnight_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}

/// Where attachment payloads are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Filesystem {
        root: PathBuf,
    },
    S3 {
        bucket: String,
        region: String,
        endpoint: Option<String>,
        path_style: bool,
        access_key: Option<String>,
        secret_key: Option<String>,
    },
}

/// External image tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscoderConfig {
    pub gm_path: String,
    pub gifsicle_path: String,
    pub srgb_profile: Option<String>,
    pub timeout: Duration,
}

/// Configuration of one restore run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreConfig {
    pub database_url: String,
    pub store: StoreConfig,
    /// Public base URL of the attachment store, without trailing slash.
    pub attachments_url: String,
    pub transcoder: TranscoderConfig,
    pub mp3_zip: Option<PathBuf>,
    pub fetch_timeout: Duration,
}

impl RestoreConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            var(key).ok_or_else(|| Error::Config(format!("{} must be set", key)))
        };
        let secs = |key: &str, default: u64| -> Result<Duration> {
            match var(key) {
                Some(v) => v
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| Error::Config(format!("{} must be a number of seconds", key))),
                None => Ok(Duration::from_secs(default)),
            }
        };

        let store = match var("CLIO_ATTACHMENTS_DIR") {
            Some(dir) => StoreConfig::Filesystem {
                root: PathBuf::from(dir),
            },
            None => StoreConfig::S3 {
                bucket: required("CLIO_S3_BUCKET")?,
                region: var("CLIO_S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                endpoint: var("CLIO_S3_ENDPOINT"),
                path_style: var("CLIO_S3_PATH_STYLE")
                    .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                    .unwrap_or(false),
                access_key: var("AWS_ACCESS_KEY_ID"),
                secret_key: var("AWS_SECRET_ACCESS_KEY"),
            },
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            store,
            attachments_url: required("CLIO_ATTACHMENTS_URL")?
                .trim_end_matches('/')
                .to_string(),
            transcoder: TranscoderConfig {
                gm_path: var("CLIO_GM_PATH").unwrap_or_else(|| "gm".to_string()),
                gifsicle_path: var("CLIO_GIFSICLE_PATH").unwrap_or_else(|| "gifsicle".to_string()),
                srgb_profile: var("CLIO_SRGB_PROFILE"),
                timeout: secs("CLIO_TRANSCODE_TIMEOUT_SECS", TRANSCODE_TIMEOUT_SECS)?,
            },
            mp3_zip: var("CLIO_MP3_ZIP").map(PathBuf::from),
            fetch_timeout: secs("CLIO_FETCH_TIMEOUT_SECS", FETCH_TIMEOUT_SECS)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_filesystem_config_with_defaults() {
        let config = RestoreConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/freefeed"),
            ("CLIO_ATTACHMENTS_DIR", "/var/freefeed"),
            ("CLIO_ATTACHMENTS_URL", "https://media.example.com/"),
        ]))
        .unwrap();

        assert_eq!(
            config.store,
            StoreConfig::Filesystem {
                root: PathBuf::from("/var/freefeed")
            }
        );
        assert_eq!(config.attachments_url, "https://media.example.com");
        assert_eq!(config.transcoder.gm_path, "gm");
        assert_eq!(config.transcoder.gifsicle_path, "gifsicle");
        assert_eq!(config.transcoder.srgb_profile, None);
        assert_eq!(config.fetch_timeout, Duration::from_secs(FETCH_TIMEOUT_SECS));
        assert_eq!(config.mp3_zip, None);
    }

    #[test]
    fn test_s3_config() {
        let config = RestoreConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/freefeed"),
            ("CLIO_ATTACHMENTS_URL", "https://media.example.com"),
            ("CLIO_S3_BUCKET", "media"),
            ("CLIO_S3_ENDPOINT", "http://localhost:9000"),
            ("CLIO_S3_PATH_STYLE", "true"),
            ("CLIO_TRANSCODE_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();

        match config.store {
            StoreConfig::S3 {
                bucket,
                region,
                endpoint,
                path_style,
                ..
            } => {
                assert_eq!(bucket, "media");
                assert_eq!(region, "us-east-1");
                assert_eq!(endpoint.as_deref(), Some("http://localhost:9000"));
                assert!(path_style);
            }
            other => panic!("expected S3 store, got {:?}", other),
        }
        assert_eq!(config.transcoder.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_missing_database_url() {
        let err = RestoreConfig::from_lookup(lookup(&[
            ("CLIO_ATTACHMENTS_DIR", "/tmp"),
            ("CLIO_ATTACHMENTS_URL", "https://media.example.com"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("DATABASE_URL")));
    }

    #[test]
    fn test_s3_requires_bucket() {
        let err = RestoreConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/freefeed"),
            ("CLIO_ATTACHMENTS_URL", "https://media.example.com"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("CLIO_S3_BUCKET"));
    }

    #[test]
    fn test_bad_timeout() {
        let err = RestoreConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/freefeed"),
            ("CLIO_ATTACHMENTS_DIR", "/tmp"),
            ("CLIO_ATTACHMENTS_URL", "https://media.example.com"),
            ("CLIO_FETCH_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("CLIO_FETCH_TIMEOUT_SECS"));
    }

    #[test]
    fn test_cli_dates() {
        let cli = Cli::parse_from([
            "clio-restore",
            "--from-date",
            "2009-01-01",
            "--to-date",
            "2010-12-31",
            "archive.zip",
        ]);
        assert_eq!(cli.archive, PathBuf::from("archive.zip"));
        assert_eq!(cli.from_date, NaiveDate::from_ymd_opt(2009, 1, 1));
        assert!(Cli::try_parse_from(["clio-restore", "--from-date", "yesterday", "a.zip"]).is_err());
    }

    #[test]
    fn test_date_filter() {
        let filter = DateFilter::new(
            NaiveDate::from_ymd_opt(2009, 1, 1),
            NaiveDate::from_ymd_opt(2010, 1, 1),
        );
        assert!(!filter.accepts(Utc.with_ymd_and_hms(2008, 12, 31, 23, 59, 59).unwrap()));
        assert!(filter.accepts(Utc.with_ymd_and_hms(2009, 1, 1, 0, 0, 0).unwrap()));
        assert!(filter.accepts(Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap()));
        assert!(!filter.accepts(Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 1).unwrap()));
        assert!(DateFilter::default().accepts(Utc::now()));
    }
}

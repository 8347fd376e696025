use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File, Map};
use serde::Deserialize;

use crate::db::DEFAULT_DB_PATH;
use crate::review::{DEFAULT_BAD_THRESHOLD, MAX_RATING};
use crate::targets::TargetSource;

const ENV_PREFIX: &str = "REVIEWS";
const CONFIG_FILE: &str = "review_watch";

/// When accepted reviews reach disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Durability {
    /// Commit each review as soon as it is accepted.
    Append,
    /// Commit everything once, after all targets were visited.
    Snapshot,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db_path: PathBuf,
    pub bad_threshold: u8,
    pub durability: Durability,
    pub targets_file: Option<PathBuf>,
    pub sheet_id: Option<String>,
    pub sheet_name: String,
    pub browserless_url: String,
    pub browserless_token: Option<String>,
    pub page_timeout_secs: u64,
    pub export_path: PathBuf,
    pub webhook_url: Option<String>,
    pub recipient: Option<String>,
}

impl Settings {
    /// Defaults, then `review_watch.toml` if present, then `REVIEWS_*` variables.
    pub fn load() -> Result<Self> {
        Self::build(Some(CONFIG_FILE), None)
    }

    /// `file` is looked up as by `config::File::with_name` and may be absent.
    /// `env` replaces the process environment when given.
    fn build(file: Option<&str>, env: Option<Map<String, String>>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("db_path", DEFAULT_DB_PATH)?
            .set_default("bad_threshold", DEFAULT_BAD_THRESHOLD as i64)?
            .set_default("durability", "append")?
            .set_default("sheet_name", "Sheet1")?
            .set_default("browserless_url", "http://localhost:3000")?
            .set_default("page_timeout_secs", 60_i64)?
            .set_default("export_path", "new_bad_reviews.csv")?;
        if let Some(file) = file {
            builder = builder.add_source(File::with_name(file).required(false));
        }
        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()
            .context("Invalid settings")?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if !(1..=MAX_RATING).contains(&self.bad_threshold) {
            bail!("bad_threshold must be between 1 and {MAX_RATING}, got {}", self.bad_threshold);
        }
        Ok(())
    }

    /// A local file wins over a sheet when both are configured.
    pub fn target_source(&self) -> Result<TargetSource> {
        if let Some(ref path) = self.targets_file {
            return Ok(TargetSource::File(path.clone()));
        }
        match self.sheet_id {
            Some(ref id) => Ok(TargetSource::Sheet {
                id: id.clone(),
                name: self.sheet_name.clone(),
            }),
            None => bail!(
                "No target list configured: set {ENV_PREFIX}_TARGETS_FILE or {ENV_PREFIX}_SHEET_ID"
            ),
        }
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }
}

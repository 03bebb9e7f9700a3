//! TOML-based application configuration.
//!
//! Stores:
//! - Session timing (work/rest lengths, period count, countdowns)
//! - The exercise catalogue
//! - Known users and which of them take part
//!
//! Configuration is stored at `~/.config/hiitimer/config.toml`.

use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::data_dir;
use crate::error::{ConfigError, CoreError, Result, ValidationError};
use crate::exercise::{default_catalogue, Exercise, ExerciseSelector, User};
use crate::ports::{ExerciseSource, ResolvedPlan, SettingsSource};
use crate::timer::{SessionSettings, MAX_WORK_PERIODS};

/// Session timing, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_work_seconds")]
    pub work_seconds: u64,
    #[serde(default = "default_rest_seconds")]
    pub rest_seconds: u64,
    #[serde(default = "default_work_periods")]
    pub work_periods: usize,
    /// 0 skips the Prepare step.
    #[serde(default = "default_session_start_count_down")]
    pub session_start_count_down_seconds: u64,
    #[serde(default = "default_period_start_count_down")]
    pub period_start_count_down_seconds: u64,
    #[serde(default = "default_true")]
    pub beep_sound_count_down: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/hiitimer/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Ids of the users taking part; empty means everyone.
    #[serde(default)]
    pub selected_users: Vec<i64>,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default = "default_catalogue")]
    pub exercises: Vec<Exercise>,
    #[serde(default)]
    pub users: Vec<User>,
}

fn default_work_seconds() -> u64 {
    20
}
fn default_rest_seconds() -> u64 {
    10
}
fn default_work_periods() -> usize {
    8
}
fn default_session_start_count_down() -> u64 {
    5
}
fn default_period_start_count_down() -> u64 {
    3
}
fn default_true() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            work_seconds: default_work_seconds(),
            rest_seconds: default_rest_seconds(),
            work_periods: default_work_periods(),
            session_start_count_down_seconds: default_session_start_count_down(),
            period_start_count_down_seconds: default_period_start_count_down(),
            beep_sound_count_down: true,
        }
    }
}

impl SessionConfig {
    /// Convert to engine settings.
    ///
    /// # Errors
    /// Returns an error if the work period length is zero, the period count
    /// exceeds [`MAX_WORK_PERIODS`], or a length does not fit in milliseconds.
    pub fn to_settings(&self) -> Result<SessionSettings> {
        if self.work_seconds == 0 {
            return Err(invalid("session.work_seconds", "must be greater than 0".into()));
        }
        if self.work_periods > MAX_WORK_PERIODS {
            return Err(invalid(
                "session.work_periods",
                format!("must be at most {MAX_WORK_PERIODS}"),
            ));
        }
        Ok(SessionSettings {
            work_period_length_ms: seconds_to_ms("session.work_seconds", self.work_seconds)?,
            rest_period_length_ms: seconds_to_ms("session.rest_seconds", self.rest_seconds)?,
            number_of_work_periods: self.work_periods,
            session_start_count_down_length_ms: seconds_to_ms(
                "session.session_start_count_down_seconds",
                self.session_start_count_down_seconds,
            )?,
            period_start_count_down_length_ms: seconds_to_ms(
                "session.period_start_count_down_seconds",
                self.period_start_count_down_seconds,
            )?,
            beep_sound_count_down_active: self.beep_sound_count_down,
        })
    }
}

fn invalid(field: &str, message: String) -> CoreError {
    ValidationError::InvalidValue {
        field: field.into(),
        message,
    }
    .into()
}

fn seconds_to_ms(field: &str, seconds: u64) -> Result<u64> {
    seconds
        .checked_mul(1000)
        .ok_or_else(|| invalid(field, format!("{seconds}s is too long")))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            selected_users: Vec::new(),
            session: SessionConfig::default(),
            exercises: default_catalogue(),
            users: Vec::new(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        if key.is_empty() {
            return Err(unknown());
        }

        let mut parts = key.split('.').peekable();
        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;
            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|e| invalid(e.to_string()))?,
                ),
                serde_json::Value::Number(_) => value
                    .parse::<u64>()
                    .map(|n| serde_json::Value::Number(n.into()))
                    .map_err(|_| invalid(format!("cannot parse '{value}' as a whole number")))?,
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                }
                _ => serde_json::Value::String(value.into()),
            };
            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    /// Path of the config file in the data directory.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing the default config if none exists yet.
    ///
    /// # Errors
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Persist to disk.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    /// Load from `path`, writing the default config there if it is missing.
    ///
    /// # Errors
    /// Returns an error if the file cannot be parsed or the default cannot be written.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                Ok(cfg)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, writing defaults");
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(err) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: err.to_string(),
            }
            .into()),
        }
    }

    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key, in memory only.
    ///
    /// The new value must parse as the type of the value it replaces, and
    /// the resulting session timing must still be valid.
    ///
    /// # Errors
    /// Returns an error if the key is unknown or the value is rejected.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.session.to_settings()?;
        *self = updated;
        Ok(())
    }

    /// Flattened `key = value` listing of every leaf.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out
    }

    /// Users taking part in the next session.
    pub fn participants(&self) -> Vec<User> {
        self.users
            .iter()
            .filter(|user| self.selected_users.is_empty() || self.selected_users.contains(&user.id))
            .cloned()
            .collect()
    }

    /// # Errors
    /// Returns an error if the configured session timing is invalid.
    pub fn session_settings(&self) -> Result<SessionSettings> {
        self.session.to_settings()
    }

    /// Draw an exercise sequence for the participants.
    ///
    /// # Errors
    /// Returns [`crate::ErrorCode::ExercisesUnavailable`] if the
    /// participants have excluded every exercise.
    pub fn resolve_with<R: rand::Rng + ?Sized>(
        &self,
        settings: &SessionSettings,
        rng: &mut R,
    ) -> Result<ResolvedPlan> {
        let users = self.participants();
        let entries = ExerciseSelector::new(&self.exercises, &users)
            .select(settings.number_of_work_periods, rng)?;
        Ok(ResolvedPlan { entries, users })
    }
}

impl SettingsSource for Config {
    fn session_settings(&self) -> Result<SessionSettings> {
        Config::session_settings(self)
    }
}

impl ExerciseSource for Config {
    fn resolve(&mut self, settings: &SessionSettings) -> Result<ResolvedPlan> {
        self.resolve_with(settings, &mut rand::thread_rng())
    }
}

/// Config read fresh from a file for every attempt, so edits made between
/// attempts apply to the next one.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
    rng: Pcg64,
}

impl ConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            rng: Pcg64::from_entropy(),
        }
    }

    /// The config file in the data directory.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(Config::path()?))
    }

    /// Use a fixed seed for the exercise draw.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Pcg64::seed_from_u64(seed);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(&self) -> Result<Config> {
        Config::load_from(&self.path)
    }
}

impl SettingsSource for ConfigFile {
    fn session_settings(&self) -> Result<SessionSettings> {
        self.load()?.session_settings()
    }
}

impl ExerciseSource for ConfigFile {
    fn resolve(&mut self, settings: &SessionSettings) -> Result<ResolvedPlan> {
        let config = self.load()?;
        config.resolve_with(settings, &mut self.rng)
    }
}

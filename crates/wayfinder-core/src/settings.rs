//! Extension settings
//!
//! The settings document is stored as a single JSON value under the
//! `settings` key. Updates replace the whole document.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use wayfinder_storage::Database;

use crate::error::SettingsError;

const SETTINGS_KEY: &str = "settings";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuidanceMode {
    /// Highlight and explain; the user performs each step
    Guided,
    /// The assistant performs actions itself
    Autonomous,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub ai_provider: String,
    pub language: String,
    pub guidance_mode: GuidanceMode,
    pub auto_analyze: bool,
    pub sound_enabled: bool,
    pub theme: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ai_provider: "openai".to_string(),
            language: "en".to_string(),
            guidance_mode: GuidanceMode::Guided,
            auto_analyze: true,
            sound_enabled: true,
            theme: "light".to_string(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.ai_provider.trim().is_empty() {
            return Err(SettingsError::Invalid("aiProvider cannot be empty".to_string()));
        }
        if self.language.trim().is_empty() {
            return Err(SettingsError::Invalid("language cannot be empty".to_string()));
        }
        if self.theme.trim().is_empty() {
            return Err(SettingsError::Invalid("theme cannot be empty".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_settings(&self) -> Result<Settings, SettingsError>;

    async fn update_settings(&self, settings: Settings) -> Result<(), SettingsError>;

    /// Seed defaults on first start. Returns true if anything was written.
    async fn initialize(&self) -> Result<bool, SettingsError> {
        Ok(false)
    }
}

pub struct SqliteSettingsStore {
    db: Database,
}

impl SqliteSettingsStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn get_settings(&self) -> Result<Settings, SettingsError> {
        Ok(self.db.get_json(SETTINGS_KEY)?.unwrap_or_default())
    }

    async fn update_settings(&self, settings: Settings) -> Result<(), SettingsError> {
        settings.validate()?;
        self.db.set_json(SETTINGS_KEY, &settings)?;

        tracing::info!(
            provider = %settings.ai_provider,
            language = %settings.language,
            "Updated settings"
        );

        Ok(())
    }

    async fn initialize(&self) -> Result<bool, SettingsError> {
        if self.db.get_setting(SETTINGS_KEY)?.is_some() {
            return Ok(false);
        }

        self.db.set_json(SETTINGS_KEY, &Settings::default())?;
        tracing::info!("Seeded default settings");
        Ok(true)
    }
}

impl Clone for SqliteSettingsStore {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

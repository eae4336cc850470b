use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use directories::BaseDirs;
use url::Url;

use crate::api::models::ConversationId;
use crate::cli::{Cli, Command};
use crate::error::{ClientError, Result};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub api_base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: String::new(),
            socket_url: None,
            token: None,
            user_id: None,
            cache_enabled: true,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }
    // TOML is the settings format; an older JSON state file is migrated into it on first load
    pub fn toml_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        let cfg_dir = base.config_dir();
        Some(cfg_dir.join("tradeboard.toml"))
    }

    fn legacy_json_path() -> Option<PathBuf> {
        let proj = directories::ProjectDirs::from("com", "example", "Tradeboard")?;
        Some(proj.config_dir().join("state.json"))
    }

    pub fn load() -> Self {
        if let Some(path) = Self::toml_path() {
            match Self::load_from(&path) {
                Ok(Some(settings)) => return settings,
                Ok(None) => {}
                Err(e) => log::warn!("ignoring {}: {}", path.display(), e),
            }
        }

        if let Some(legacy) = Self::legacy_json_path() {
            if let Ok(bytes) = fs::read(&legacy) {
                if let Ok(settings) = serde_json::from_slice::<Settings>(&bytes) {
                    if let Err(e) = settings.save() {
                        log::warn!("could not migrate {}: {}", legacy.display(), e);
                    }
                    return settings;
                }
            }
        }

        Self::new()
    }

    /// `Ok(None)` when the file does not exist yet.
    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        toml::from_str::<Settings>(&text)
            .map(Some)
            .map_err(|e| ClientError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::toml_path().ok_or_else(|| ClientError::Config("No config dir".into()))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ClientError::Config(e.to_string()))?;
        fs::write(path, toml)?;
        Ok(())
    }

    /// Environment wins over the file, so one-off runs need no login.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = get("TRADEBOARD_API_URL") {
            self.api_base_url = url;
        }
        if let Some(url) = get("TRADEBOARD_SOCKET_URL") {
            self.socket_url = Some(url);
        }
        if let Some(token) = get("TRADEBOARD_TOKEN") {
            self.token = Some(token);
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_base_url.trim().is_empty()
    }

    pub fn socket_url(&self) -> Result<Url> {
        match self.socket_url.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(explicit) => Ok(Url::parse(explicit)?),
            None => crate::utils::socket_url_for(&self.api_base_url),
        }
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let path = cli.config.clone().or_else(Settings::toml_path);
    let mut settings = match &cli.config {
        Some(p) => Settings::load_from(p)?.unwrap_or_default(),
        None => Settings::load(),
    };
    settings.apply_env();

    match cli.command {
        Command::Login(args) => crate::ui::login::login(args, settings, path).await,
        _ if !settings.is_configured() => Err(ClientError::Config(
            "not logged in, run `tradeboard login --api-url <url>` first".into(),
        )),
        Command::Status => crate::ui::login::status(&settings).await,
        Command::Conversations => crate::ui::sidebar::list(&settings).await,
        Command::Chat { conversation } => {
            crate::ui::main_window::run_chat(&settings, conversation.map(ConversationId::new)).await
        }
        Command::Bids { action } => crate::ui::bids::run(&settings, action).await,
        Command::Projects(args) => crate::ui::projects::run(&settings, args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Settings::load_from(&dir.path().join("nope.toml")).unwrap(), None);
    }

    #[test]
    fn save_and_reload_roundtrip_keeps_optional_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg").join("tradeboard.toml");
        let settings = Settings {
            api_base_url: "https://api.example.com".into(),
            token: Some("abc".into()),
            user_id: Some("17".into()),
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(!text.contains("socket_url"));
        assert_eq!(Settings::load_from(&path).unwrap(), Some(settings));
    }

    #[test]
    fn cache_defaults_on_for_old_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tradeboard.toml");
        fs::write(&path, "api_base_url = \"https://x.test\"\n").unwrap();
        let settings = Settings::load_from(&path).unwrap().unwrap();
        assert!(settings.cache_enabled);
        assert!(settings.is_configured());
    }

    #[test]
    fn broken_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tradeboard.toml");
        fs::write(&path, "api_base_url = [").unwrap();
        assert!(matches!(Settings::load_from(&path), Err(ClientError::Config(_))));
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut settings = Settings {
            api_base_url: "https://file.test".into(),
            token: Some("old".into()),
            ..Settings::default()
        };
        settings.apply_overrides(|key| match key {
            "TRADEBOARD_API_URL" => Some("https://env.test".into()),
            "TRADEBOARD_TOKEN" => Some("  ".into()),
            _ => None,
        });
        assert_eq!(settings.api_base_url, "https://env.test");
        assert_eq!(settings.token.as_deref(), Some("old"));
    }

    #[test]
    fn socket_url_prefers_explicit_value() {
        let mut settings = Settings {
            api_base_url: "http://localhost:4000".into(),
            ..Settings::default()
        };
        assert_eq!(settings.socket_url().unwrap().as_str(), "ws://localhost:4000/socket");
        settings.socket_url = Some("wss://rt.example.com/ws".into());
        assert_eq!(settings.socket_url().unwrap().as_str(), "wss://rt.example.com/ws");
    }
}

// Settings persistence: client credentials, the cached OAuth token and a
// few endpoint overrides, stored as JSON in the user's config directory.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::auth::Token;
use crate::error::{Error, Result};

pub const APP_DIR: &str = "to-do";
pub const SETTINGS_FILE: &str = "settings.json";

/// On-disk settings. Key names match the files written by earlier releases,
/// which is why they are PascalCase.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Settings {
    #[serde(rename = "ClientID", default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Bare access token kept by older releases. Used as-is when no
    /// structured token is present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Token>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
}

/// Directory holding the settings file. `TODO_CONFIG_DIR` wins, then
/// `~/.config/to-do` (or `%APPDATA%\to-do` on Windows).
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TODO_CONFIG_DIR") {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    #[cfg(windows)]
    let base = dirs::config_dir();
    #[cfg(not(windows))]
    let base = dirs::home_dir().map(|home| home.join(".config"));
    base.map(|b| b.join(APP_DIR)).ok_or(Error::NoConfigDir)
}

pub fn settings_path(dir: &Path) -> PathBuf {
    dir.join(SETTINGS_FILE)
}

/// Values taken from the environment for this run only. They are layered
/// over the file's settings and never written back.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Overrides {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub api_url: Option<String>,
}

impl Overrides {
    /// Read `TODO_CLIENT_ID`, `TODO_CLIENT_SECRET` and `TODO_API_URL`.
    pub fn from_env() -> Self {
        let from_env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        Overrides {
            client_id: from_env("TODO_CLIENT_ID"),
            client_secret: from_env("TODO_CLIENT_SECRET"),
            api_url: from_env("TODO_API_URL"),
        }
    }
}

impl Settings {
    /// Read settings from `path`. A missing file yields defaults; a file that
    /// exists but does not parse is an error naming the path.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data).map_err(|source| Error::ConfigParse {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no settings at {}, starting fresh", path.display());
                Ok(Settings::default())
            }
            Err(source) => Err(Error::ConfigRead {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Settings in effect for this run. Credentials from the environment only
    /// fill blanks left by the file; the API URL from the environment wins.
    pub fn with_overrides(&self, overrides: &Overrides) -> Settings {
        let mut effective = self.clone();
        if effective.client_id.is_empty() {
            if let Some(id) = &overrides.client_id {
                effective.client_id = id.clone();
            }
        }
        if effective.client_secret.is_empty() {
            if let Some(secret) = &overrides.client_secret {
                effective.client_secret = secret.clone();
            }
        }
        if let Some(url) = &overrides.api_url {
            effective.api_url = Some(url.clone());
        }
        effective
    }

    /// Write settings to `path`, creating the parent directory first. Both
    /// the directory and the file are restricted to the owner. The data goes
    /// to a temporary file beside `path` which then replaces it, so a crash
    /// never leaves a half-written file behind.
    pub fn save(&self, path: &Path) -> Result<()> {
        let write_err = |source| Error::ConfigWrite {
            path: path.to_path_buf(),
            source,
        };
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        create_private_dir(dir).map_err(write_err)?;

        let data = serde_json::to_vec_pretty(self)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        restrict_to_owner(tmp.as_file()).map_err(write_err)?;
        tmp.write_all(&data).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;
        log::debug!("settings written to {}", path.display());
        Ok(())
    }
}

fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
    }
    #[cfg(not(unix))]
    {
        fs::create_dir_all(dir)
    }
}

fn restrict_to_owner(file: &fs::File) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))
    }
    #[cfg(not(unix))]
    {
        let _ = file;
        Ok(())
    }
}

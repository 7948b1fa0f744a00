use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::backend::{AuthClient, Subscription};
use crate::error::Result;
use crate::types::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// Client preferences persisted between sessions.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub theme: Theme,
}

impl Preferences {
    /// Read preferences from disk; a missing or corrupt file falls back to
    /// defaults (light theme).
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                log::warn!("corrupt preferences at {}: {}", path.display(), e);
                Preferences::default()
            }),
            Err(_) => Preferences::default(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Default location under the user's config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("silentaudit").join("preferences.json"))
    }
}

/// Explicit application state: session snapshot plus the persisted theme.
///
/// Initialization reads the stored preference once; `set_theme` mutates and
/// persists in a single step. Nothing else writes the preferences file.
#[derive(Debug)]
pub struct AppState {
    session: Option<Session>,
    theme: Theme,
    prefs_path: PathBuf,
}

impl AppState {
    pub fn initialize(auth: &dyn AuthClient, prefs_path: PathBuf) -> Result<Self> {
        let session = auth.get_session()?;
        let theme = Preferences::load(&prefs_path).theme;
        Ok(Self {
            session,
            theme,
            prefs_path,
        })
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Session presence gates all dashboard rendering.
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn set_session(&mut self, session: Option<Session>) {
        self.session = session;
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<()> {
        self.theme = theme;
        Preferences { theme }.save(&self.prefs_path)
    }

    pub fn toggle_theme(&mut self) -> Result<Theme> {
        let next = match self.theme {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        };
        self.set_theme(next)?;
        Ok(next)
    }

    /// Keep a shared state in sync with the auth collaborator. The returned
    /// guard must outlive the view consuming the state.
    pub fn watch_session(
        auth: &dyn AuthClient,
        state: Arc<Mutex<AppState>>,
    ) -> Subscription {
        auth.on_session_change(Box::new(move |session| {
            if let Ok(mut guard) = state.lock() {
                guard.set_session(session);
            }
        }))
    }
}

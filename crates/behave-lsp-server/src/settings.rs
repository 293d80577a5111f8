//! Glob settings supplied by the editor.
//!
//! The client sends a `behave` settings section with three list-of-strings
//! keys: `stepsGlob`, `featuresGlob` and `exclude`. Missing, malformed or
//! empty values fall back to the defaults below; a bad setting is never an
//! error.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Globs selecting Python step modules.
pub const DEFAULT_STEPS_GLOBS: &[&str] = &["**/steps/**/*.py", "**/step_definitions/**/*.py"];

/// Globs selecting feature files.
pub const DEFAULT_FEATURE_GLOBS: &[&str] = &["**/*.feature"];

/// Globs never indexed, whichever corpus they would otherwise match.
pub const DEFAULT_EXCLUDE_GLOBS: &[&str] = &[
    "**/node_modules/**",
    "**/.git/**",
    "**/.venv/**",
    "**/venv/**",
    "**/__pycache__/**",
    "**/site-packages/**",
];

/// Settings section read from client configuration payloads.
const SECTION: &str = "behave";

/// Setting keys that listeners can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    /// `stepsGlob`, which drives the step definition index.
    Steps,
    /// `featuresGlob`, which drives the step usage index.
    Features,
}

/// Resolved glob configuration for both corpora.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobSettings {
    /// Globs selecting step definition modules.
    pub steps: Vec<String>,
    /// Globs selecting feature files.
    pub features: Vec<String>,
    /// Globs excluded from both corpora.
    pub exclude: Vec<String>,
}

fn owned(globs: &[&str]) -> Vec<String> {
    globs.iter().map(ToString::to_string).collect()
}

impl Default for GlobSettings {
    fn default() -> Self {
        Self {
            steps: owned(DEFAULT_STEPS_GLOBS),
            features: owned(DEFAULT_FEATURE_GLOBS),
            exclude: owned(DEFAULT_EXCLUDE_GLOBS),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GlobList {
    One(String),
    Many(Vec<String>),
}

fn string_list(section: &Value, key: &str, default: &[&str]) -> Vec<String> {
    let parsed = section
        .get(key)
        .cloned()
        .and_then(|raw| serde_json::from_value::<GlobList>(raw).ok());
    let globs: Vec<String> = match parsed {
        Some(GlobList::One(glob)) => vec![glob],
        Some(GlobList::Many(globs)) => globs,
        None => Vec::new(),
    }
    .into_iter()
    .map(|glob| glob.trim().to_string())
    .filter(|glob| !glob.is_empty())
    .collect();

    if globs.is_empty() {
        debug!(key, "using default globs");
        return owned(default);
    }
    globs
}

impl GlobSettings {
    /// Read settings from a client configuration payload.
    ///
    /// Accepts either the whole settings object (with a `behave` section) or
    /// the section itself.
    ///
    /// # Examples
    ///
    /// ```
    /// use behave_lsp_server::settings::GlobSettings;
    /// use serde_json::json;
    ///
    /// let settings = GlobSettings::from_client_settings(&json!({
    ///     "behave": { "stepsGlob": ["tests/steps/*.py"], "exclude": [] }
    /// }));
    /// assert_eq!(settings.steps, vec!["tests/steps/*.py".to_string()]);
    /// assert_eq!(settings.features, vec!["**/*.feature".to_string()]);
    /// assert!(!settings.exclude.is_empty());
    /// ```
    #[must_use]
    pub fn from_client_settings(value: &Value) -> Self {
        let section = value.get(SECTION).unwrap_or(value);
        Self {
            steps: string_list(section, "stepsGlob", DEFAULT_STEPS_GLOBS),
            features: string_list(section, "featuresGlob", DEFAULT_FEATURE_GLOBS),
            exclude: string_list(section, "exclude", DEFAULT_EXCLUDE_GLOBS),
        }
    }

    /// Globs configured for one corpus.
    #[must_use]
    pub fn patterns(&self, key: SettingKey) -> &[String] {
        match key {
            SettingKey::Steps => &self.steps,
            SettingKey::Features => &self.features,
        }
    }

    fn changed_keys(&self, next: &Self) -> Vec<SettingKey> {
        let exclude_changed = self.exclude != next.exclude;
        [SettingKey::Steps, SettingKey::Features]
            .into_iter()
            .filter(|key| exclude_changed || self.patterns(*key) != next.patterns(*key))
            .collect()
    }
}

type SettingListener = Arc<dyn Fn(&GlobSettings) + Send + Sync>;

struct SourceState {
    current: GlobSettings,
    listeners: Vec<(SettingKey, SettingListener)>,
}

/// Holder of the live glob settings with per-key change listeners.
///
/// A listener only fires when the value of the key it subscribed to
/// changes. A change to `exclude` counts as a change for both keys.
pub struct GlobSettingsSource {
    state: Mutex<SourceState>,
}

impl std::fmt::Debug for GlobSettingsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobSettingsSource")
            .field("current", &self.current())
            .finish_non_exhaustive()
    }
}

impl Default for GlobSettingsSource {
    fn default() -> Self {
        Self::new(GlobSettings::default())
    }
}

impl GlobSettingsSource {
    /// Create a source holding `initial`.
    #[must_use]
    pub fn new(initial: GlobSettings) -> Self {
        Self {
            state: Mutex::new(SourceState {
                current: initial,
                listeners: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SourceState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Snapshot of the current settings.
    #[must_use]
    pub fn current(&self) -> GlobSettings {
        self.lock().current.clone()
    }

    /// Register `listener` for changes to `key`.
    pub fn subscribe(&self, key: SettingKey, listener: impl Fn(&GlobSettings) + Send + Sync + 'static) {
        self.lock().listeners.push((key, Arc::new(listener)));
    }

    /// Replace the settings, notifying listeners of each changed key.
    ///
    /// Returns the keys whose effective globs changed.
    pub fn update(&self, next: GlobSettings) -> Vec<SettingKey> {
        let (changed, listeners) = {
            let mut state = self.lock();
            let changed = state.current.changed_keys(&next);
            if changed.is_empty() {
                return changed;
            }
            state.current = next.clone();
            let listeners: Vec<SettingListener> = state
                .listeners
                .iter()
                .filter(|(key, _)| changed.contains(key))
                .map(|(_, listener)| Arc::clone(listener))
                .collect();
            (changed, listeners)
        };

        debug!(?changed, "glob settings changed");
        for listener in listeners {
            listener(&next);
        }
        changed
    }
}

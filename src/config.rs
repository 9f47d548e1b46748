use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Settings {
    pub log_filter: String,
    pub workspace: Option<PathBuf>,
    pub default_session_key: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_filter: "info".into(),
            workspace: None,
            default_session_key: "default".into(),
        }
    }
}

impl Settings {
    /// Defaults, overridden by `SETUPD_*` environment variables.
    pub fn load() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Settings::default();
        let non_empty = |k: &str| get(k).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("SETUPD_LOG") {
            settings.log_filter = v;
        }
        if let Some(v) = non_empty("SETUPD_WORKSPACE") {
            settings.workspace = Some(PathBuf::from(v));
        }
        if let Some(v) = non_empty("SETUPD_SESSION_KEY") {
            settings.default_session_key = v.trim().to_string();
        }
        settings
    }
}

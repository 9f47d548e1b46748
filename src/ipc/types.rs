use std::path::PathBuf;

use serde::Deserialize;

use crate::config::Settings;
use crate::store::SqliteDraftStore;
use crate::wizard::controller::WizardController;
use crate::wizard::model::Draft;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// The loaded wizard plus the unsubmitted form the UI is editing.
pub struct Session {
    pub controller: WizardController,
    pub form: Draft,
}

pub struct AppState {
    pub settings: Settings,
    pub workspace: Option<PathBuf>,
    pub store: Option<SqliteDraftStore>,
    pub session: Option<Session>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            workspace: None,
            store: None,
            session: None,
        }
    }
}

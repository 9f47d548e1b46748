use serde_json::{json, Value};
use tracing::info;

use crate::wizard::controller::{Collaborators, DraftStore, NoticeKind, Navigator, Notifier};
use crate::wizard::WizardStep;

#[derive(Debug, Default)]
pub struct NavigationLog(Vec<Value>);

impl Navigator for NavigationLog {
    fn advance_to(&mut self, step: WizardStep) {
        self.0.push(json!({ "action": "advance", "step": step }));
    }

    fn go_back(&mut self, to: WizardStep) {
        self.0.push(json!({ "action": "back", "step": to }));
    }
}

#[derive(Debug, Default)]
pub struct NoticeLog(Vec<Value>);

impl Notifier for NoticeLog {
    fn notify(&mut self, kind: NoticeKind, message: &str) {
        info!(?kind, message, "notify");
        self.0.push(json!({ "kind": kind, "message": message }));
    }
}

/// Navigation and notification events raised while handling one request.
/// They are returned to the UI shell with the response.
#[derive(Debug, Default)]
pub struct Outbox {
    pub navigation: NavigationLog,
    pub notifications: NoticeLog,
}

impl Outbox {
    pub fn collaborators<'a>(&'a mut self, store: &'a dyn DraftStore) -> Collaborators<'a> {
        Collaborators {
            store,
            navigator: &mut self.navigation,
            notifier: &mut self.notifications,
        }
    }

    pub fn navigation_json(&self) -> Value {
        Value::Array(self.navigation.0.clone())
    }

    pub fn notifications_json(&self) -> Value {
        Value::Array(self.notifications.0.clone())
    }
}

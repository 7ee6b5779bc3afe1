//! Report Sink: an append-only record of what happened during a run,
//! flushed once at process exit.

use crate::status::Action;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct ItemOutcome {
    pub name: String,
    pub version: String,
    pub action: String,
    pub success: bool,
    pub message: Option<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub items: Vec<ItemOutcome>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, name: &str, version: &str, action: Action) {
        self.items.push(ItemOutcome {
            name: name.to_string(),
            version: version.to_string(),
            action: action_label(action).to_string(),
            success: true,
            message: None,
        });
    }

    pub fn record_failure(&mut self, name: &str, version: &str, action: Action, message: impl Into<String>) {
        self.items.push(ItemOutcome {
            name: name.to_string(),
            version: version.to_string(),
            action: action_label(action).to_string(),
            success: false,
            message: Some(message.into()),
        });
    }

    pub fn installed_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.success && i.action != "uninstall")
            .count()
    }

    pub fn failure_count(&self) -> usize {
        self.items.iter().filter(|i| !i.success).count()
    }

    /// Serializes the report to YAML and writes it to `path`, overwriting
    /// any prior report. Called once, at the end of a run.
    pub fn flush(&self, path: &Path) -> std::io::Result<()> {
        let yaml = serde_yaml::to_string(self)
            .unwrap_or_else(|_| "items: []\n".to_string());
        std::fs::write(path, yaml)
    }
}

fn action_label(action: Action) -> &'static str {
    match action {
        Action::Install => "install",
        Action::Update => "update",
        Action::Uninstall => "uninstall",
    }
}

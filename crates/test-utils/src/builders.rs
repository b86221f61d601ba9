#![allow(dead_code)]

use std::time::Duration;

use mcpshare::share::{ClassifierRules, ShareSettings};

/// Builder for `ShareSettings` to simplify test setup.
///
/// Starts from the defaults but with a short startup timeout so timeout
/// scenarios finish quickly.
pub struct SettingsBuilder {
    settings: ShareSettings,
}

impl SettingsBuilder {
    pub fn new() -> Self {
        Self {
            settings: ShareSettings {
                startup_timeout: Duration::from_millis(500),
                ..ShareSettings::default()
            },
        }
    }

    pub fn program(mut self, program: &str) -> Self {
        self.settings.program = program.to_string();
        self
    }

    pub fn subcommand(mut self, args: &[&str]) -> Self {
        self.settings.subcommand = args.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.settings.startup_timeout = timeout;
        self
    }

    pub fn capture_limit(mut self, limit: usize) -> Self {
        self.settings.capture_limit = limit;
        self
    }

    pub fn rules(mut self, success: &[&str], failure: &[&str]) -> Self {
        self.settings.rules = ClassifierRules::new(success.iter().copied(), failure.iter().copied());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.settings.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> ShareSettings {
        self.settings
    }
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//! The configuration object passed to `refresh` (§6).

use std::collections::HashMap;
use std::time::Duration;

/// Startup failure policy chosen at startup (§4.2). The spec's source
/// material names this inconsistently across modules (`strict`/`warn`/
/// `ignore` vs. `fail_fast` elsewhere); this crate standardizes on the
/// three-valued mode below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartupFailureMode {
    /// First `post_construct`/`startup` failure aborts startup.
    #[default]
    Strict,
    /// Log and continue; the failing component is left `failed` and skips
    /// shutdown hooks.
    Warn,
    /// Continue silently.
    Ignore,
}

/// Trailing-slash handling for route matching (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrailingSlashPolicy {
    /// `/foo/` and `/foo` are treated identically.
    Ignore,
    /// A request to `/foo/` when only `/foo` is registered gets a redirect
    /// response (and vice versa).
    Redirect,
    /// Trailing slash is significant; no implicit normalization.
    #[default]
    Strict,
}

/// Per-content-type registration priority for the codec registry (§4.5).
#[derive(Debug, Clone, Default)]
pub struct CodecPriorities {
    overrides: HashMap<String, i32>,
}

impl CodecPriorities {
    pub fn set(&mut self, content_type: impl Into<String>, priority: i32) {
        self.overrides.insert(content_type.into(), priority);
    }

    pub fn get(&self, content_type: &str) -> Option<i32> {
        self.overrides.get(content_type).copied()
    }
}

/// Configuration passed to `Container::refresh` (§6).
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub startup_failure_mode: StartupFailureMode,
    pub shutdown_component_deadline: Duration,
    pub codec_priorities: CodecPriorities,
    pub debug_responses: bool,
    pub route_trailing_slash: TrailingSlashPolicy,
    pub route_case_sensitive: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            startup_failure_mode: StartupFailureMode::Strict,
            shutdown_component_deadline: Duration::from_secs(30),
            codec_priorities: CodecPriorities::default(),
            debug_responses: false,
            route_trailing_slash: TrailingSlashPolicy::Strict,
            route_case_sensitive: true,
        }
    }
}

/// Builder for [`RuntimeConfig`], following the teacher's chained-setter
/// builder idiom.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfigBuilder {
    config: RuntimeConfig,
}

impl RuntimeConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn startup_failure_mode(mut self, mode: StartupFailureMode) -> Self {
        self.config.startup_failure_mode = mode;
        self
    }

    pub fn shutdown_component_deadline(mut self, deadline: Duration) -> Self {
        self.config.shutdown_component_deadline = deadline;
        self
    }

    pub fn codec_priority(mut self, content_type: impl Into<String>, priority: i32) -> Self {
        self.config.codec_priorities.set(content_type, priority);
        self
    }

    pub fn debug_responses(mut self, enabled: bool) -> Self {
        self.config.debug_responses = enabled;
        self
    }

    pub fn route_trailing_slash(mut self, policy: TrailingSlashPolicy) -> Self {
        self.config.route_trailing_slash = policy;
        self
    }

    pub fn route_case_sensitive(mut self, sensitive: bool) -> Self {
        self.config.route_case_sensitive = sensitive;
        self
    }

    pub fn build(self) -> RuntimeConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = RuntimeConfig::default();
        assert_eq!(config.startup_failure_mode, StartupFailureMode::Strict);
        assert_eq!(config.shutdown_component_deadline, Duration::from_secs(30));
        assert!(!config.debug_responses);
        assert_eq!(config.route_trailing_slash, TrailingSlashPolicy::Strict);
        assert!(config.route_case_sensitive);
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = RuntimeConfigBuilder::new()
            .startup_failure_mode(StartupFailureMode::Warn)
            .debug_responses(true)
            .build();
        assert_eq!(config.startup_failure_mode, StartupFailureMode::Warn);
        assert!(config.debug_responses);
    }
}

use crate::handler::Handler;
use crate::project::{normalize_context_path, ProjectInfo};
use serde::Deserialize;
use tracing::warn;

/// User overrides read from `.cw-settings` at the project location.
///
/// Ports may arrive as JSON numbers or strings and are coerced to strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectSettings {
    pub internal_port: Option<PortSetting>,
    pub internal_debug_port: Option<PortSetting>,
    pub context_root: Option<String>,
    pub health_check: Option<String>,
    pub ignored_paths: Option<Vec<String>>,
    pub maven_profiles: Option<Vec<String>>,
    pub maven_properties: Option<Vec<String>>,
    pub watched_files: Option<WatchedFilesSetting>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WatchedFilesSetting {
    pub include_files: Option<Vec<String>>,
    pub exclude_files: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PortSetting {
    Text(String),
    Number(serde_json::Number),
}

impl PortSetting {
    /// String form with surrounding whitespace removed.
    pub fn coerce(&self) -> String {
        match self {
            Self::Text(s) => s.trim().to_string(),
            Self::Number(n) => n.to_string(),
        }
    }
}

/// Merges handler defaults and `.cw-settings` into a project record.
///
/// Settings are applied last and win over defaults; prior values on `info`
/// win over handler defaults. A list setting with an empty element is
/// rejected whole, never partially applied.
pub fn merge_project_info(
    mut info: ProjectInfo,
    handler: &dyn Handler,
    settings: &ProjectSettings,
) -> ProjectInfo {
    let project_id = info.project_id.clone();

    if info.debug_port.is_none() {
        info.debug_port = handler.default_debug_port();
    }
    if info.ignored_paths.is_none() {
        let defaults = handler.default_ignored_paths();
        if !defaults.is_empty() {
            info.ignored_paths = Some(defaults);
        }
    }

    match settings.internal_port.as_ref().map(PortSetting::coerce) {
        Some(port) if !port.is_empty() => info.set_app_port(port),
        _ => {
            // Replaces any ports a re-merged record already carries; the
            // slot never accumulates.
            info.app_ports.clear();
            for port in handler.default_app_ports() {
                info.app_ports.push(port);
            }
        }
    }

    if let Some(paths) = &settings.ignored_paths {
        let filtered: Vec<String> = paths.iter().filter(|p| !p.is_empty()).cloned().collect();
        if filtered.is_empty() {
            warn!("ignoredPaths for {project_id} has no usable entries, ignoring the setting");
        } else {
            info.ignored_paths = Some(filtered);
        }
    }

    if let Some(port) = settings.internal_debug_port.as_ref().map(PortSetting::coerce) {
        if !port.is_empty() {
            info.debug_port = Some(port);
        }
    }

    if let Some(root) = &settings.context_root {
        info.context_root = Some(normalize_context_path(root));
    }
    if let Some(path) = &settings.health_check {
        info.health_check = Some(normalize_context_path(path));
    }

    if let Some(profiles) = &settings.maven_profiles {
        match trimmed_non_empty(profiles) {
            Some(values) => info.maven_profiles = Some(values),
            None => warn!("mavenProfiles for {project_id} has an empty entry, rejecting the setting"),
        }
    }
    if let Some(properties) = &settings.maven_properties {
        match trimmed_non_empty(properties) {
            Some(values) => info.maven_properties = Some(values),
            None => {
                warn!("mavenProperties for {project_id} has an empty entry, rejecting the setting")
            }
        }
    }

    if let Some(watched) = &settings.watched_files {
        if let Some(include) = &watched.include_files {
            match trimmed_non_empty(include) {
                Some(values) => info.watched_files = Some(values),
                None => warn!(
                    "watchedFiles.includeFiles for {project_id} has an empty entry, rejecting the setting"
                ),
            }
        }
        if let Some(exclude) = &watched.exclude_files {
            match trimmed_non_empty(exclude) {
                Some(values) => info.ignored_files = Some(values),
                None => warn!(
                    "watchedFiles.excludeFiles for {project_id} has an empty entry, rejecting the setting"
                ),
            }
        }
    }

    info
}

/// Trims every element; the whole list is rejected when empty or when any
/// element trims to nothing.
fn trimmed_non_empty(values: &[String]) -> Option<Vec<String>> {
    if values.is_empty() {
        return None;
    }
    let trimmed: Vec<String> = values.iter().map(|v| v.trim().to_string()).collect();
    if trimmed.iter().any(String::is_empty) {
        return None;
    }
    Some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Operation;
    use async_trait::async_trait;

    struct PortsHandler {
        app_ports: Vec<String>,
        debug_port: Option<String>,
        ignored: Vec<String>,
    }

    impl PortsHandler {
        fn with_app_port(port: &str) -> Self {
            Self {
                app_ports: vec![port.to_string()],
                debug_port: None,
                ignored: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl Handler for PortsHandler {
        fn supported_type(&self) -> &str {
            "docker"
        }

        async fn create(&self, _operation: &Operation) -> anyhow::Result<()> {
            Ok(())
        }

        async fn delete_container(&self, _info: &ProjectInfo) -> anyhow::Result<()> {
            Ok(())
        }

        fn default_app_ports(&self) -> Vec<String> {
            self.app_ports.clone()
        }

        fn default_debug_port(&self) -> Option<String> {
            self.debug_port.clone()
        }

        fn default_ignored_paths(&self) -> Vec<String> {
            self.ignored.clone()
        }
    }

    fn fresh_info() -> ProjectInfo {
        ProjectInfo::new("p1", "docker", "/ws/p1")
    }

    #[test]
    fn settings_win_over_handler_defaults() {
        let handler = PortsHandler::with_app_port("8080");
        let settings: ProjectSettings = serde_json::from_str(
            r#"{
                "internalPort": "3000",
                "contextRoot": "//api/v1/",
                "mavenProfiles": ["dev", "", "prod"]
            }"#,
        )
        .unwrap();

        let info = merge_project_info(fresh_info(), &handler, &settings);
        assert_eq!(info.app_ports, vec!["3000".to_string()]);
        assert_eq!(info.context_root.as_deref(), Some("/api/v1"));
        assert_eq!(info.maven_profiles, None);
    }

    #[test]
    fn handler_port_applies_without_settings() {
        let handler = PortsHandler::with_app_port("8080");
        let info = merge_project_info(fresh_info(), &handler, &ProjectSettings::default());
        assert_eq!(info.app_ports, vec!["8080".to_string()]);
    }

    #[test]
    fn remerging_a_live_record_does_not_grow_the_port_slot() {
        let handler = PortsHandler::with_app_port("8080");
        let first = merge_project_info(fresh_info(), &handler, &ProjectSettings::default());
        assert_eq!(first.app_ports, vec!["8080".to_string()]);

        // A record that already carries a port keeps exactly one entry
        // through any later overlay.
        let again = merge_project_info(first, &handler, &ProjectSettings::default());
        assert_eq!(again.app_ports, vec!["8080".to_string()]);

        let mut carried = fresh_info();
        carried.set_app_port("9000");
        let merged = merge_project_info(carried, &handler, &ProjectSettings::default());
        assert_eq!(merged.app_ports, vec!["8080".to_string()]);
    }

    #[test]
    fn numeric_ports_coerce_to_strings() {
        let handler = PortsHandler::with_app_port("8080");
        let settings: ProjectSettings =
            serde_json::from_str(r#"{"internalPort": 3000, "internalDebugPort": 7777}"#).unwrap();

        let info = merge_project_info(fresh_info(), &handler, &settings);
        assert_eq!(info.app_ports, vec!["3000".to_string()]);
        assert_eq!(info.debug_port.as_deref(), Some("7777"));
    }

    #[test]
    fn blank_debug_port_is_ignored() {
        let handler = PortsHandler {
            app_ports: Vec::new(),
            debug_port: Some("9229".to_string()),
            ignored: Vec::new(),
        };
        let settings: ProjectSettings =
            serde_json::from_str(r#"{"internalDebugPort": "   "}"#).unwrap();

        let info = merge_project_info(fresh_info(), &handler, &settings);
        assert_eq!(info.debug_port.as_deref(), Some("9229"));
    }

    #[test]
    fn empty_ignored_path_entries_are_filtered() {
        let handler = PortsHandler {
            app_ports: Vec::new(),
            debug_port: None,
            ignored: vec!["/target".to_string()],
        };
        let settings: ProjectSettings =
            serde_json::from_str(r#"{"ignoredPaths": ["", "/node_modules", ""]}"#).unwrap();

        let info = merge_project_info(fresh_info(), &handler, &settings);
        assert_eq!(
            info.ignored_paths,
            Some(vec!["/node_modules".to_string()])
        );
    }

    #[test]
    fn all_empty_ignored_paths_keep_the_handler_default() {
        let handler = PortsHandler {
            app_ports: Vec::new(),
            debug_port: None,
            ignored: vec!["/target".to_string()],
        };
        let settings: ProjectSettings =
            serde_json::from_str(r#"{"ignoredPaths": ["", ""]}"#).unwrap();

        let info = merge_project_info(fresh_info(), &handler, &settings);
        assert_eq!(info.ignored_paths, Some(vec!["/target".to_string()]));
    }

    #[test]
    fn watched_files_split_into_includes_and_excludes() {
        let handler = PortsHandler::with_app_port("8080");
        let settings: ProjectSettings = serde_json::from_str(
            r#"{
                "watchedFiles": {
                    "includeFiles": [" src ", "pom.xml"],
                    "excludeFiles": ["target"]
                }
            }"#,
        )
        .unwrap();

        let info = merge_project_info(fresh_info(), &handler, &settings);
        assert_eq!(
            info.watched_files,
            Some(vec!["src".to_string(), "pom.xml".to_string()])
        );
        assert_eq!(info.ignored_files, Some(vec!["target".to_string()]));
    }

    #[test]
    fn watched_files_with_empty_entry_are_rejected_whole() {
        let handler = PortsHandler::with_app_port("8080");
        let settings: ProjectSettings = serde_json::from_str(
            r#"{"watchedFiles": {"includeFiles": ["src", "  "]}}"#,
        )
        .unwrap();

        let info = merge_project_info(fresh_info(), &handler, &settings);
        assert_eq!(info.watched_files, None);
    }

    #[test]
    fn health_check_gains_exactly_one_leading_slash() {
        let handler = PortsHandler::with_app_port("8080");
        let settings: ProjectSettings =
            serde_json::from_str(r#"{"healthCheck": "health/"}"#).unwrap();

        let info = merge_project_info(fresh_info(), &handler, &settings);
        assert_eq!(info.health_check.as_deref(), Some("/health"));
    }
}

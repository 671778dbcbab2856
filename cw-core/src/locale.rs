/// Message keys used by build-state transitions.
pub mod keys {
    pub const BUILD_RANK: &str = "projectStatusController.buildRank";
    pub const BUILD_STARTED: &str = "projectStatusController.buildStarted";
    pub const BUILD_FAILED: &str = "projectStatusController.buildFailed";
    pub const BUILD_FAIL_MISSING_FILE: &str = "buildscripts.buildFailMissingFile";
}

/// Resolves a message key and named arguments to user-facing text.
pub trait LocaleTranslator: Send + Sync {
    fn translation(&self, key: &str, args: &[(&str, &str)]) -> String;
}

/// Built-in English catalog. Unknown keys fall back to the key itself so a
/// missing entry never hides a status transition.
pub struct EnglishCatalog;

impl LocaleTranslator for EnglishCatalog {
    fn translation(&self, key: &str, args: &[(&str, &str)]) -> String {
        let template = match key {
            keys::BUILD_RANK => "Build queued, position {rank}",
            keys::BUILD_STARTED => "Build started",
            keys::BUILD_FAILED => "Build failed: {error}",
            keys::BUILD_FAIL_MISSING_FILE => "Build failed: required file {file} is missing",
            other => other,
        };

        let mut message = template.to_string();
        for (name, value) in args {
            message = message.replace(&format!("{{{name}}}"), value);
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_named_arguments() {
        let catalog = EnglishCatalog;
        assert_eq!(
            catalog.translation(keys::BUILD_RANK, &[("rank", "2/5")]),
            "Build queued, position 2/5"
        );
        assert_eq!(
            catalog.translation(keys::BUILD_FAIL_MISSING_FILE, &[("file", "Dockerfile")]),
            "Build failed: required file Dockerfile is missing"
        );
    }

    #[test]
    fn unknown_keys_fall_back_to_the_key() {
        let catalog = EnglishCatalog;
        assert_eq!(catalog.translation("no.such.key", &[]), "no.such.key");
    }
}

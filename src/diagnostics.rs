// ABOUTME: Diagnostics accumulator for non-fatal conditions during a launch.
// ABOUTME: Collects warnings that shouldn't fail a launch but must be shown to the operator.

use serde::Serialize;

/// Collects non-fatal warnings during launch operations.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

/// A non-fatal warning collected during a launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    /// Group, target, file or source the warning is about.
    pub subject: Option<String>,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            subject: None,
            message: message.into(),
        }
    }

    pub fn about(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Required env keys still missing after every generator ran.
    pub fn configuration_incomplete(missing: &[String]) -> Self {
        Self::new(
            WarningKind::ConfigurationIncomplete,
            format!("required keys missing or empty: {}", missing.join(", ")),
        )
    }

    /// A dependency group did not answer before its deadline.
    pub fn readiness_timeout(group: &str, pending: &[String]) -> Self {
        Self::new(
            WarningKind::ReadinessTimeout,
            format!(
                "{} not ready in time (pending: {}); continuing",
                group,
                pending.join(", ")
            ),
        )
        .about(group)
    }

    /// Neither listen-table tool was usable.
    pub fn port_resolution_unavailable() -> Self {
        Self::new(
            WarningKind::PortResolutionUnavailable,
            "could not inspect listening ports (ss and lsof unavailable); assuming no conflicts",
        )
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.subject {
            Some(subject) => write!(f, "[{}] {}", subject, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Categories of warnings that can occur during a launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Required env keys absent after generation.
    ConfigurationIncomplete,
    /// An env generator failed; the next one may still succeed.
    EnvGeneration,
    /// The root env file could not be mirrored to the shadow path.
    ShadowCopy,
    /// A dependency group timed out; the launch continued.
    ReadinessTimeout,
    /// Listening ports could not be inspected.
    PortResolutionUnavailable,
    /// No free port above a conflicting one.
    PortExhausted,
    /// Compose port declarations could not be used for a preview.
    PortDeclaration,
    /// The temporary overlay file could not be removed.
    OverlayCleanup,
    /// Best-effort update of an existing checkout failed.
    SourceUpdate,
    /// A local image could not be built.
    ImageBuild,
    /// The frontend dev server could not be started.
    FrontendLaunch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_starts_empty() {
        let diag = Diagnostics::default();
        assert!(!diag.has_warnings());
        assert!(diag.warnings().is_empty());
    }

    #[test]
    fn diagnostics_collects_warnings() {
        let mut diag = Diagnostics::default();

        diag.warn(Warning::port_resolution_unavailable());
        diag.warn(Warning::readiness_timeout("neo4j", &["neo4j-http".to_string()]));

        assert!(diag.has_warnings());
        assert_eq!(diag.warnings().len(), 2);
    }

    #[test]
    fn readiness_timeout_names_the_group() {
        let warning = Warning::readiness_timeout("supabase", &["auth".into(), "rest".into()]);
        assert_eq!(warning.kind, WarningKind::ReadinessTimeout);
        assert_eq!(warning.subject.as_deref(), Some("supabase"));
        assert!(warning.message.contains("auth, rest"));
        assert!(warning.to_string().starts_with("[supabase]"));
    }

    #[test]
    fn warnings_serialize_with_snake_case_kind() {
        let warning = Warning::configuration_incomplete(&["JWT_SECRET".into()]);
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(json["kind"], "configuration_incomplete");
        assert_eq!(json["subject"], serde_json::Value::Null);
    }
}

//! Prompt templates for the worker and reviewer sessions.
//!
//! Templates are plain text files loaded verbatim. The only substitution is
//! the [`PLACEHOLDER`] token, replaced with the plan document path.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::debug;

use crate::error::PlanError;
use crate::io::session::Role;

/// Token replaced with the resolved plan document path.
pub const PLACEHOLDER: &str = "$ARGUMENTS";

/// The four prompt variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    /// First worker turn on a task.
    Work,
    /// Worker turn after the reviewer requested changes.
    WorkResume,
    /// First review of a task.
    Review,
    /// Re-review on the same reviewer session.
    ReviewResume,
}

impl PromptKind {
    pub const ALL: [PromptKind; 4] = [
        PromptKind::Work,
        PromptKind::WorkResume,
        PromptKind::Review,
        PromptKind::ReviewResume,
    ];

    /// Pick the variant for a role's turn. `resume` is true once the role has run on this task.
    pub fn for_turn(role: Role, resume: bool) -> Self {
        match (role, resume) {
            (Role::Worker, false) => PromptKind::Work,
            (Role::Worker, true) => PromptKind::WorkResume,
            (Role::Reviewer, false) => PromptKind::Review,
            (Role::Reviewer, true) => PromptKind::ReviewResume,
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            PromptKind::Work => "work.md",
            PromptKind::WorkResume => "work-resume.md",
            PromptKind::Review => "review.md",
            PromptKind::ReviewResume => "review-resume.md",
        }
    }
}

/// All four templates, loaded up front so a missing file fails before any session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplates {
    work: String,
    work_resume: String,
    review: String,
    review_resume: String,
}

impl PromptTemplates {
    pub fn load(dir: &Path) -> Result<Self, PlanError> {
        let templates = Self {
            work: read_template(dir, PromptKind::Work)?,
            work_resume: read_template(dir, PromptKind::WorkResume)?,
            review: read_template(dir, PromptKind::Review)?,
            review_resume: read_template(dir, PromptKind::ReviewResume)?,
        };
        debug!(dir = %dir.display(), "loaded prompt templates");
        Ok(templates)
    }

    pub fn from_parts(work: &str, work_resume: &str, review: &str, review_resume: &str) -> Self {
        Self {
            work: work.to_string(),
            work_resume: work_resume.to_string(),
            review: review.to_string(),
            review_resume: review_resume.to_string(),
        }
    }

    pub fn template(&self, kind: PromptKind) -> &str {
        match kind {
            PromptKind::Work => &self.work,
            PromptKind::WorkResume => &self.work_resume,
            PromptKind::Review => &self.review,
            PromptKind::ReviewResume => &self.review_resume,
        }
    }

    /// Render a prompt for the given document.
    pub fn render(&self, kind: PromptKind, document_path: &Path) -> String {
        self.template(kind)
            .replace(PLACEHOLDER, &document_path.display().to_string())
    }
}

fn read_template(dir: &Path, kind: PromptKind) -> Result<String, PlanError> {
    let path = dir.join(kind.file_name());
    fs::read_to_string(&path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => PlanError::TemplateNotFound { path: path.clone() },
        _ => PlanError::TemplateRead {
            path: path.clone(),
            source,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_all(dir: &Path) {
        for kind in PromptKind::ALL {
            fs::write(
                dir.join(kind.file_name()),
                format!("{} for $ARGUMENTS\n", kind.file_name()),
            )
            .expect("write template");
        }
    }

    #[test]
    fn turn_variants_follow_role_and_resume() {
        assert_eq!(PromptKind::for_turn(Role::Worker, false), PromptKind::Work);
        assert_eq!(PromptKind::for_turn(Role::Worker, true), PromptKind::WorkResume);
        assert_eq!(PromptKind::for_turn(Role::Reviewer, false), PromptKind::Review);
        assert_eq!(
            PromptKind::for_turn(Role::Reviewer, true),
            PromptKind::ReviewResume
        );
    }

    #[test]
    fn loads_and_renders_each_template() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_all(temp.path());
        let templates = PromptTemplates::load(temp.path()).expect("load");

        let doc = PathBuf::from("plans/auth.md");
        assert_eq!(
            templates.render(PromptKind::ReviewResume, &doc),
            "review-resume.md for plans/auth.md\n"
        );
        assert_eq!(
            templates.render(PromptKind::Work, &doc),
            "work.md for plans/auth.md\n"
        );
    }

    #[test]
    fn every_placeholder_occurrence_is_replaced() {
        let templates = PromptTemplates::from_parts("$ARGUMENTS / $ARGUMENTS", "", "", "");
        assert_eq!(
            templates.render(PromptKind::Work, Path::new("p.md")),
            "p.md / p.md"
        );
    }

    #[test]
    fn template_text_is_otherwise_verbatim() {
        let raw = "Use {{ braces }} and $OTHER as-is: $ARGUMENTS";
        let templates = PromptTemplates::from_parts(raw, raw, raw, raw);
        assert_eq!(
            templates.render(PromptKind::Review, Path::new("x.md")),
            "Use {{ braces }} and $OTHER as-is: x.md"
        );
    }

    #[test]
    fn missing_template_is_fatal() {
        let temp = tempfile::tempdir().expect("tempdir");
        write_all(temp.path());
        fs::remove_file(temp.path().join("review-resume.md")).expect("remove");

        let err = PromptTemplates::load(temp.path()).unwrap_err();
        match err {
            PlanError::TemplateNotFound { path } => {
                assert!(path.ends_with("review-resume.md"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

/// How one cycle of a session is expected to end.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Committed,
    NothingToRun,
    ParseFailed,
    Aborted,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RevisionSpec {
    /// Source file of this revision, relative to the session directory.
    pub source: String,
    pub outcome: OutcomeKind,
    /// Number of statements the cycle is expected to execute.
    #[serde(default)]
    pub executed: Option<usize>,
    /// Lines printed during the cycle.
    #[serde(default)]
    pub stdout: Option<Vec<String>>,
    /// Every run state published during the cycle, rendered as glyphs with
    /// lines joined by `|`.
    #[serde(default)]
    pub run_states: Option<Vec<String>>,
    /// Exception class name of the fault, for aborted cycles.
    #[serde(default)]
    pub error: Option<String>,
    /// First line of the failing statement, for aborted cycles.
    #[serde(default)]
    pub line: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionSpec {
    pub description: String,
    pub revisions: Vec<RevisionSpec>,
    /// `str()` of module-level bindings after the last revision.
    #[serde(default)]
    pub globals: BTreeMap<String, String>,
    /// Whether the final environment must match a from-scratch run of the
    /// last revision.
    #[serde(default)]
    pub clean_run_matches: bool,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub name: String,
    pub dir: PathBuf,
    pub spec: SessionSpec,
}

impl Session {
    pub fn read_text(&self, relative_path: &str) -> Result<String> {
        fs::read_to_string(self.dir.join(relative_path))
            .with_context(|| format!("Reading {} fixture file {}", self.name, relative_path))
    }

    pub fn sources(&self) -> Result<Vec<String>> {
        self.spec
            .revisions
            .iter()
            .map(|revision| self.read_text(&revision.source))
            .collect()
    }
}

pub fn load_sessions(sessions_dir: &Path) -> Result<Vec<Session>> {
    let mut sessions = Vec::new();

    for entry in
        fs::read_dir(sessions_dir).with_context(|| format!("Reading {}", sessions_dir.display()))?
    {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }

        let case_path = path.join("case.yaml");
        if !case_path.exists() {
            continue;
        }

        let name = path
            .file_name()
            .and_then(|value| value.to_str())
            .map(str::to_string)
            .with_context(|| format!("Invalid session directory name {}", path.display()))?;
        let case_raw = fs::read_to_string(&case_path)
            .with_context(|| format!("Reading {}", case_path.display()))?;
        let spec: SessionSpec = serde_yaml::from_str(&case_raw)
            .with_context(|| format!("Parsing {}", case_path.display()))?;

        ensure!(
            !spec.revisions.is_empty(),
            "Session {name} has no revisions"
        );
        for revision in &spec.revisions {
            ensure!(
                path.join(&revision.source).exists(),
                "Missing {} for session {}",
                revision.source,
                path.display()
            );
            ensure!(
                revision.outcome == OutcomeKind::Aborted
                    || (revision.error.is_none() && revision.line.is_none()),
                "Session {name}: error/line only apply to aborted revisions"
            );
        }

        sessions.push(Session {
            name,
            dir: path,
            spec,
        });
    }

    ensure!(
        !sessions.is_empty(),
        "No sessions found in {}",
        sessions_dir.display()
    );
    sessions.sort_by(|left, right| left.name.cmp(&right.name));
    Ok(sessions)
}

pub fn normalize_output(output: &str) -> String {
    output.replace("\r\n", "\n").trim_end().to_string()
}

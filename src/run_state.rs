//! Per-line run-state markers and where they are published.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ast::LineSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Marker {
    #[default]
    Clean,
    MarkedForRun,
    Running,
    Failed,
}

impl Marker {
    pub fn name(self) -> &'static str {
        match self {
            Marker::Clean => "clean",
            Marker::MarkedForRun => "marked-for-run",
            Marker::Running => "running",
            Marker::Failed => "failed",
        }
    }

    /// Short form understood by editor integrations.
    pub fn glyph(self) -> &'static str {
        match self {
            Marker::Clean => ".",
            Marker::MarkedForRun => "~",
            Marker::Running => ">>",
            Marker::Failed => "x",
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a run state is written out: marker names, or editor glyphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RunStateFormat {
    #[default]
    Names,
    Glyphs,
}

/// One marker per line of the source text a cycle is working on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunState {
    markers: Vec<Marker>,
}

impl RunState {
    pub fn clean(line_count: usize) -> Self {
        Self {
            markers: vec![Marker::Clean; line_count],
        }
    }

    pub fn for_source(source: &str) -> Self {
        Self::clean(source.split('\n').count())
    }

    /// Sets every line of `span` to `marker`. Lines past the end are ignored.
    pub fn mark(&mut self, span: LineSpan, marker: Marker) {
        let start = span.start.saturating_sub(1).min(self.markers.len());
        let end = span.end.min(self.markers.len());
        for slot in &mut self.markers[start..end.max(start)] {
            *slot = marker;
        }
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn line_count(&self) -> usize {
        self.markers.len()
    }

    pub fn is_clean(&self) -> bool {
        self.markers.iter().all(|marker| *marker == Marker::Clean)
    }

    pub fn render(&self, format: RunStateFormat) -> String {
        let rendered: Vec<&str> = self
            .markers
            .iter()
            .map(|marker| match format {
                RunStateFormat::Names => marker.name(),
                RunStateFormat::Glyphs => marker.glyph(),
            })
            .collect();
        rendered.join("\n")
    }
}

/// Receives every run state the driver publishes during a cycle.
pub trait RunStateSink {
    fn publish(&mut self, state: &RunState);
}

impl<F> RunStateSink for F
where
    F: FnMut(&RunState),
{
    fn publish(&mut self, state: &RunState) {
        (self)(state)
    }
}

/// Overwrites a file with the rendered state on every publish.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
    format: RunStateFormat,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>, format: RunStateFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl RunStateSink for FileSink {
    fn publish(&mut self, state: &RunState) {
        if let Err(error) = fs::write(&self.path, state.render(self.format)) {
            warn!(path = %self.path.display(), %error, "failed to write run state");
        }
    }
}

// Source Infos
//
// Per-source compilation metadata: reported problems, discovered main
// classes, and the append-only log of compilations.

use crate::names::{ClassName, SourceFile};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// A diagnostic the compiler reported for a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub category: String,
    pub severity: Severity,
    pub message: String,
    /// Rendered position, `path:line`, empty when unknown.
    pub position: String,
}

/// Metadata recorded for one source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub reported_problems: Vec<Problem>,
    pub unreported_problems: Vec<Problem>,
    pub main_classes: Vec<ClassName>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceInfos {
    infos: HashMap<SourceFile, SourceInfo>,
}

impl SourceInfos {
    pub fn new() -> SourceInfos {
        SourceInfos::default()
    }

    pub fn add(&mut self, source: SourceFile, info: SourceInfo) {
        self.infos.insert(source, info);
    }

    pub fn get(&self, source: &SourceFile) -> Option<&SourceInfo> {
        self.infos.get(source)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SourceFile, &SourceInfo)> {
        self.infos.iter()
    }

    pub fn merge(&mut self, other: &SourceInfos) {
        self.infos
            .extend(other.infos.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    pub fn remove(&mut self, sources: &BTreeSet<SourceFile>) {
        self.infos.retain(|source, _| !sources.contains(source));
    }
}

/// One compiler run, as recorded in the compilations log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compilation {
    pub start_time_ms: u64,
    pub output_dir: String,
}

/// Append-only log of compiler runs that produced this Analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Compilations {
    entries: Vec<Compilation>,
}

impl Compilations {
    pub fn new() -> Compilations {
        Compilations::default()
    }

    pub fn add(&mut self, compilation: Compilation) {
        self.entries.push(compilation);
    }

    pub fn entries(&self) -> &[Compilation] {
        &self.entries
    }

    /// Concatenation, ordered by start time.
    pub fn merge(&mut self, other: &Compilations) {
        self.entries.extend(other.entries.iter().cloned());
        self.entries.sort_by_key(|entry| entry.start_time_ms);
        self.entries.dedup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_order_merged_compilations_by_start_time() {
        let mut left = Compilations::new();
        left.add(Compilation { start_time_ms: 20, output_dir: "out".into() });
        let mut right = Compilations::new();
        right.add(Compilation { start_time_ms: 10, output_dir: "out".into() });
        left.merge(&right);
        let times: Vec<u64> = left.entries().iter().map(|e| e.start_time_ms).collect();
        assert_eq!(times, vec![10, 20]);
    }
}

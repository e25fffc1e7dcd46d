//! Package structure checks: manifest, frontmatter, leftover placeholders.
//!
//! Every finding is a soft failure. The checks read the filesystem
//! synchronously, so the gate runs them on the blocking pool.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use gatekeeper_core::GateResult;
use regex::Regex;
use serde_json::{json, Value};

use crate::gate::{conclude, names, Evaluation, Gate};

/// Manifest location relative to the package root.
pub const MANIFEST_PATH: &str = ".claude-plugin/plugin.json";

/// Skill document that must carry `name` and `description`.
pub const SKILL_PATH: &str = "skills/email-triage/SKILL.md";

const SEMVER_PATTERN: &str = r"^\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?(?:\+[0-9A-Za-z.-]+)?$";

const PLACEHOLDER_PATTERNS: &[(&str, &str)] = &[
    ("yourdomain placeholder", r"(?i)\byourdomain(?:\.com)?\b"),
    ("yourcompany placeholder", r"(?i)\byourcompany(?:\.com)?\b"),
    ("[Your Name] placeholder", r"\[Your Name\]"),
    ("<your-...> placeholder", r"(?i)<\s*your[^>]*>"),
    ("TODO marker", r"\bTODO\b"),
    ("FIXME marker", r"\bFIXME\b"),
    ("TBD marker", r"\bTBD\b"),
];

/// Findings for one package root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuralReport {
    /// Files scanned for placeholders
    pub scanned_files: usize,
    failures: Vec<String>,
}

fn rel(root: &Path, path: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

/// YAML frontmatter between a leading `---` line and the next `---` line.
fn frontmatter(text: &str) -> Option<&str> {
    let body = text.strip_prefix("---\n")?;
    let end = body.find("\n---\n")?;
    Some(&body[..end])
}

fn has_key(frontmatter: &str, key: &str) -> bool {
    Regex::new(&format!(r"(?m)^{}\s*:\s*(.+)$", regex::escape(key)))
        .map(|re| re.is_match(frontmatter))
        .unwrap_or(false)
}

fn check_manifest(root: &Path, failures: &mut Vec<String>) {
    let path = root.join(MANIFEST_PATH);
    let shown = rel(root, &path);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            failures.push(format!("Missing manifest: {}", shown));
            return;
        }
        Err(e) => {
            failures.push(format!("Unreadable manifest {}: {}", shown, e));
            return;
        }
    };
    let manifest: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(e) => {
            failures.push(format!("Invalid JSON in {}: {}", shown, e));
            return;
        }
    };

    for (key, pointer) in [
        ("name", "/name"),
        ("version", "/version"),
        ("description", "/description"),
        ("author.name", "/author/name"),
    ] {
        let present = manifest
            .pointer(pointer)
            .and_then(Value::as_str)
            .is_some_and(|v| !v.trim().is_empty());
        if !present {
            failures.push(format!("Manifest key `{}` must be a non-empty string in {}", key, shown));
        }
    }

    if let Some(version) = manifest.get("version").and_then(Value::as_str) {
        let valid = Regex::new(SEMVER_PATTERN).map(|re| re.is_match(version)).unwrap_or(false);
        if !valid {
            failures.push(format!("Manifest version must be semver in {}: {}", shown, version));
        }
    }
}

fn markdown_files(dir: &Path, recursive: bool, out: &mut BTreeSet<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if recursive {
                markdown_files(&path, true, out);
            }
        } else if path.extension().is_some_and(|ext| ext == "md") {
            out.insert(path);
        }
    }
}

fn check_frontmatter(root: &Path, failures: &mut Vec<String>) {
    let mut commands = BTreeSet::new();
    markdown_files(&root.join("commands"), false, &mut commands);
    if commands.is_empty() {
        failures.push("No command files found in commands/".to_string());
    }
    for path in &commands {
        let shown = rel(root, path);
        let Ok(text) = fs::read_to_string(path) else {
            failures.push(format!("Unreadable command file {}", shown));
            continue;
        };
        match frontmatter(&text) {
            None => failures.push(format!("Missing YAML frontmatter in {}", shown)),
            Some(fm) if !has_key(fm, "description") => {
                failures.push(format!("Missing or empty `description` in {}", shown))
            }
            Some(_) => {}
        }
    }

    let skill = root.join(SKILL_PATH);
    let shown = rel(root, &skill);
    let Ok(text) = fs::read_to_string(&skill) else {
        failures.push(format!("Missing skill file: {}", shown));
        return;
    };
    let Some(fm) = frontmatter(&text) else {
        failures.push(format!("Missing YAML frontmatter in {}", shown));
        return;
    };
    for key in ["name", "description"] {
        if !has_key(fm, key) {
            failures.push(format!("Missing or empty `{}` in {}", key, shown));
        }
    }
}

fn scan_targets(root: &Path) -> BTreeSet<PathBuf> {
    let mut files = BTreeSet::new();
    for single in ["README.md", MANIFEST_PATH] {
        let path = root.join(single);
        if path.is_file() {
            files.insert(path);
        }
    }
    markdown_files(&root.join("commands"), false, &mut files);
    markdown_files(&root.join("skills"), true, &mut files);
    files
}

fn check_placeholders(root: &Path, failures: &mut Vec<String>) -> usize {
    let patterns: Vec<(&str, Regex)> = PLACEHOLDER_PATTERNS
        .iter()
        .filter_map(|(label, pattern)| Regex::new(pattern).ok().map(|re| (*label, re)))
        .collect();

    let files = scan_targets(root);
    for path in &files {
        let Ok(text) = fs::read_to_string(path) else {
            continue;
        };
        for (index, line) in text.lines().enumerate() {
            for (label, re) in &patterns {
                if re.is_match(line) {
                    failures.push(format!(
                        "Placeholder check failed ({}) at {}:{}: {}",
                        label,
                        rel(root, path),
                        index + 1,
                        line.trim()
                    ));
                }
            }
        }
    }
    files.len()
}

/// Run every structural check against a package root.
pub fn inspect_package(root: &Path) -> StructuralReport {
    let mut failures = Vec::new();
    check_manifest(root, &mut failures);
    check_frontmatter(root, &mut failures);
    let scanned_files = check_placeholders(root, &mut failures);
    StructuralReport { scanned_files, failures }
}

impl Evaluation for StructuralReport {
    fn summary(&self) -> BTreeMap<String, Value> {
        BTreeMap::from([
            ("scanned_files".to_string(), json!(self.scanned_files)),
            ("findings".to_string(), json!(self.failures.len())),
        ])
    }

    fn failures(&self) -> &[String] {
        &self.failures
    }

    fn render(&self) -> String {
        if self.failures.is_empty() {
            return "Release validation passed.\n\
                    - Manifest is complete and semver-valid.\n\
                    - Command and skill frontmatter are present.\n\
                    - No blocked template placeholders were found.\n"
                .to_string();
        }
        let mut out = String::from("Release validation failed.\n");
        for failure in &self.failures {
            out.push_str(&format!("- {}\n", failure));
        }
        out
    }
}

/// Gate over a package root. Always enforcing.
pub struct StructuralGate {
    root: PathBuf,
}

impl StructuralGate {
    /// Create the gate.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Gate for StructuralGate {
    fn name(&self) -> &str {
        names::STRUCTURAL
    }

    async fn run(&self) -> GateResult {
        tracing::debug!("Inspecting package structure under {}", self.root.display());
        let root = self.root.clone();
        match tokio::task::spawn_blocking(move || inspect_package(&root)).await {
            Ok(report) => conclude(self.name(), Ok(report), true),
            Err(e) => {
                tracing::warn!("Structural inspection of {} aborted: {}", self.root.display(), e);
                GateResult::unevaluable(self.name(), format!("structural inspection aborted: {}", e))
            }
        }
    }
}

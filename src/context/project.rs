//! Project-layer enumeration.
//!
//! Walks the workspace tree with `ignore::WalkBuilder` (recursive
//! .gitignore support), collects file metadata, detects entry points and
//! test files, parses the dependency manifest, and derives architecture
//! labels from folder names. Every step fails soft: an unreadable manifest
//! or tree yields an empty layer, never an error that aborts analysis.

use ignore::WalkBuilder;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

use crate::context::types::{DependencyManifest, FileKind, FileMeta, ProjectContext};

/// Directories always excluded from enumeration, regardless of gitignore.
pub const EXCLUDED_DIR_NAMES: &[&str] = &["node_modules", ".git", "dist", "build", "target"];

/// Maximum number of files recorded in one project layer.
const MAX_ENUMERATED_FILES: usize = 2_000;

/// Folder-name heuristics mapped to architecture labels.
const ARCHITECTURE_HINTS: &[(&str, &str)] = &[
    ("controllers", "mvc"),
    ("routes", "mvc"),
    ("views", "mvc"),
    ("services", "service-layer"),
    ("components", "component-based"),
    ("domain", "domain-driven"),
    ("entities", "domain-driven"),
    ("middleware", "middleware-pipeline"),
];

/// File names treated as entry points when found near the root.
const ENTRY_POINT_NAMES: &[&str] = &[
    "main.rs", "lib.rs", "main.py", "index.js", "index.ts", "main.go", "app.js", "app.ts",
];

/// Build the project layer for a workspace root.
pub fn enumerate(root: &Path) -> ProjectContext {
    let mut context = ProjectContext {
        root: Some(normalize(&root.to_string_lossy())),
        ..Default::default()
    };

    let mut directories = BTreeSet::new();

    let walker = WalkBuilder::new(root)
        .standard_filters(true)
        .follow_links(false)
        .filter_entry(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| !EXCLUDED_DIR_NAMES.contains(&name))
                .unwrap_or(true)
        })
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Error walking workspace: {}", e);
                continue;
            }
        };

        let path = entry.path();
        let relative = match path.strip_prefix(root) {
            Ok(p) if !p.as_os_str().is_empty() => normalize(&p.to_string_lossy()),
            _ => continue,
        };

        if path.is_dir() {
            directories.insert(relative);
            continue;
        }

        if context.files.len() >= MAX_ENUMERATED_FILES {
            continue;
        }

        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) => {
                warn!("Failed to stat {}: {}", path.display(), e);
                continue;
            }
        };
        let mtime_ms = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let kind = classify(&relative);
        match kind {
            FileKind::Test => context.test_files.push(relative.clone()),
            FileKind::Config => context.config_files.push(relative.clone()),
            _ => {}
        }
        if is_entry_point(&relative) {
            context.entry_points.push(relative.clone());
        }

        context.files.push(FileMeta {
            path: relative,
            size: metadata.len(),
            kind,
            mtime_ms,
        });
    }

    context.architecture_labels = architecture_labels(&directories);
    context.directories = directories.into_iter().collect();
    context.dependencies = parse_manifest(root);

    debug!(
        "Enumerated {} files, {} directories under {}",
        context.files.len(),
        context.directories.len(),
        root.display()
    );

    context
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}

/// Classify a relative path by name convention.
pub fn classify(relative_path: &str) -> FileKind {
    let lower = relative_path.to_lowercase();
    let name = lower.rsplit('/').next().unwrap_or(&lower);

    if lower.contains("test") || lower.contains("spec") || name.ends_with("_test.go") {
        if name.ends_with(".rs")
            || name.ends_with(".ts")
            || name.ends_with(".js")
            || name.ends_with(".py")
            || name.ends_with(".go")
        {
            return FileKind::Test;
        }
    }

    if name == "package.json"
        || name == "cargo.toml"
        || name == "pyproject.toml"
        || name == "dockerfile"
        || name == "makefile"
        || name.ends_with(".yml")
        || name.ends_with(".yaml")
        || name.ends_with(".toml")
        || name.ends_with(".ini")
        || name.starts_with(".env")
        || name.starts_with("tsconfig")
        || name.starts_with("webpack")
    {
        return FileKind::Config;
    }

    if name.ends_with(".md") || name.ends_with(".rst") || name.ends_with(".txt") {
        return FileKind::Doc;
    }

    if name.ends_with(".rs")
        || name.ends_with(".ts")
        || name.ends_with(".tsx")
        || name.ends_with(".js")
        || name.ends_with(".jsx")
        || name.ends_with(".py")
        || name.ends_with(".go")
        || name.ends_with(".java")
        || name.ends_with(".c")
        || name.ends_with(".cpp")
        || name.ends_with(".h")
    {
        return FileKind::Source;
    }

    FileKind::Other
}

fn is_entry_point(relative_path: &str) -> bool {
    let name = relative_path.rsplit('/').next().unwrap_or(relative_path);
    // Only near-root files count; deep main.rs files are module internals.
    let depth = relative_path.matches('/').count();
    ENTRY_POINT_NAMES.contains(&name) && depth <= 2
}

fn architecture_labels(directories: &BTreeSet<String>) -> Vec<String> {
    let mut labels = BTreeSet::new();
    for dir in directories {
        let last = dir.rsplit('/').next().unwrap_or(dir).to_lowercase();
        for (hint, label) in ARCHITECTURE_HINTS {
            if last == *hint {
                labels.insert(label.to_string());
            }
        }
    }
    labels.into_iter().collect()
}

/// Whether any CI configuration exists under the root.
pub fn has_ci_config(root: &Path) -> bool {
    root.join(".github/workflows").is_dir()
        || root.join(".gitlab-ci.yml").is_file()
        || root.join(".circleci").is_dir()
        || root.join("Jenkinsfile").is_file()
}

#[derive(Debug, Deserialize)]
struct PackageJson {
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "devDependencies")]
    dev_dependencies: BTreeMap<String, String>,
    #[serde(default, rename = "peerDependencies")]
    peer_dependencies: BTreeMap<String, String>,
}

/// Parse the dependency manifest. Tries package.json, then Cargo.toml;
/// malformed content yields empty maps.
pub fn parse_manifest(root: &Path) -> DependencyManifest {
    let package_json = root.join("package.json");
    if package_json.is_file() {
        match std::fs::read_to_string(&package_json) {
            Ok(content) => match serde_json::from_str::<PackageJson>(&content) {
                Ok(parsed) => {
                    return DependencyManifest {
                        production: parsed.dependencies,
                        development: parsed.dev_dependencies,
                        peer: parsed.peer_dependencies,
                    }
                }
                Err(e) => {
                    warn!("Malformed package.json: {}", e);
                    return DependencyManifest::default();
                }
            },
            Err(e) => {
                warn!("Failed to read package.json: {}", e);
                return DependencyManifest::default();
            }
        }
    }

    let cargo_toml = root.join("Cargo.toml");
    if cargo_toml.is_file() {
        if let Ok(content) = std::fs::read_to_string(&cargo_toml) {
            return parse_cargo_dependencies(&content);
        }
    }

    DependencyManifest::default()
}

/// Minimal line-oriented scan of Cargo.toml dependency tables.
///
/// Only `name = "version"` and `name = { version = "..." }` forms are
/// recognized; anything else is skipped. Good enough for the context
/// layer, which only needs name→version strings.
fn parse_cargo_dependencies(content: &str) -> DependencyManifest {
    let mut manifest = DependencyManifest::default();
    let mut section: Option<bool> = None; // Some(true) = production

    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            section = match line {
                "[dependencies]" => Some(true),
                "[dev-dependencies]" => Some(false),
                _ => None,
            };
            continue;
        }
        let Some(is_production) = section else {
            continue;
        };
        let Some((name, value)) = line.split_once('=') else {
            continue;
        };
        let name = name.trim().to_string();
        if name.is_empty() || name.starts_with('#') {
            continue;
        }
        let value = value.trim();
        let version = if value.starts_with('"') {
            value.trim_matches('"').to_string()
        } else if value.starts_with('{') {
            match value.split("version").nth(1).and_then(|rest| {
                rest.split('"').nth(1).map(ToOwned::to_owned)
            }) {
                Some(v) => v,
                None => continue,
            }
        } else {
            continue;
        };

        if is_production {
            manifest.production.insert(name, version);
        } else {
            manifest.development.insert(name, version);
        }
    }

    manifest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_convention() {
        assert_eq!(classify("src/lib.rs"), FileKind::Source);
        assert_eq!(classify("tests/parser_test.rs"), FileKind::Test);
        assert_eq!(classify("src/app.spec.ts"), FileKind::Test);
        assert_eq!(classify("Cargo.toml"), FileKind::Config);
        assert_eq!(classify("docker-compose.yml"), FileKind::Config);
        assert_eq!(classify("README.md"), FileKind::Doc);
        assert_eq!(classify("assets/logo.png"), FileKind::Other);
    }

    #[test]
    fn test_parse_cargo_dependencies() {
        let content = r#"
[package]
name = "demo"

[dependencies]
serde = { version = "1.0", features = ["derive"] }
regex = "1.11"

[dev-dependencies]
tempfile = "3.8"
"#;
        let manifest = parse_cargo_dependencies(content);
        assert_eq!(manifest.production.get("serde").map(String::as_str), Some("1.0"));
        assert_eq!(manifest.production.get("regex").map(String::as_str), Some("1.11"));
        assert_eq!(
            manifest.development.get("tempfile").map(String::as_str),
            Some("3.8")
        );
    }

    #[test]
    fn test_malformed_manifest_fails_soft() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("package.json"), "{broken").unwrap();
        let manifest = parse_manifest(temp_dir.path());
        assert!(manifest.production.is_empty());
        assert!(manifest.development.is_empty());
    }

    #[test]
    fn test_architecture_labels() {
        let dirs: BTreeSet<String> = ["src/controllers", "src/services", "src/util"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let labels = architecture_labels(&dirs);
        assert!(labels.contains(&"mvc".to_string()));
        assert!(labels.contains(&"service-layer".to_string()));
        assert_eq!(labels.len(), 2);
    }
}

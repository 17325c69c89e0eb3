//! Host project metadata.
//!
//! Read from the host's manifests, README and git remote. Every source is
//! optional: anything that fails to read or parse is logged and skipped.

use std::path::Path;

use arkival_core::HostMetadata;
use serde_json::Value as Json;
use tracing::debug;

use crate::error::Result;

/// Files whose presence indicates a technology.
const TECH_INDICATORS: &[(&str, &str)] = &[
    ("package.json", "Node.js"),
    ("tsconfig.json", "TypeScript"),
    ("vite.config.ts", "Vite"),
    ("vite.config.js", "Vite"),
    ("next.config.js", "Next.js"),
    ("vue.config.js", "Vue.js"),
    ("Cargo.toml", "Rust"),
    ("pyproject.toml", "Python"),
    ("requirements.txt", "Python"),
    ("go.mod", "Go"),
    ("pom.xml", "Java/Maven"),
    ("build.gradle", "Java/Gradle"),
    ("composer.json", "PHP"),
    ("Gemfile", "Ruby"),
];

const README_NAMES: &[&str] = &["README.md", "README.txt", "README.rst", "README"];

/// Fields found in one manifest.
#[derive(Debug, Default)]
struct Manifest {
    name: Option<String>,
    version: Option<String>,
    description: Option<String>,
}

impl Manifest {
    fn merge_into(self, meta: &mut HostMetadata, found_name: &mut bool) {
        if let Some(name) = self.name {
            if !*found_name {
                meta.name = name;
                *found_name = true;
            }
        }
        if let Some(version) = self.version {
            if meta.declared_version == "unknown" {
                meta.declared_version = version;
            }
        }
        if meta.description.is_none() {
            meta.description = self.description;
        }
    }
}

/// Gather metadata for `host_root`, falling back to placeholders.
pub fn extract_host_metadata(host_root: &Path) -> HostMetadata {
    let mut meta = HostMetadata::placeholder(host_root);
    let mut found_name = false;

    let manifests: [(&str, fn(&str) -> Option<Manifest>); 3] = [
        ("package.json", parse_package_json),
        ("Cargo.toml", parse_cargo_toml),
        ("pyproject.toml", parse_pyproject),
    ];
    for (file, parse) in manifests {
        let Some(text) = read(host_root, file) else {
            continue;
        };
        match parse(&text) {
            Some(manifest) => manifest.merge_into(&mut meta, &mut found_name),
            None => debug!("Could not parse {} in {}", file, host_root.display()),
        }
    }

    if let Some((heading, paragraph)) = README_NAMES.iter().find_map(|f| read(host_root, f)).map(|t| readme_intro(&t)) {
        if !found_name {
            if let Some(heading) = heading {
                meta.name = heading;
            }
        }
        if meta.description.is_none() {
            meta.description = paragraph;
        }
    }

    for (file, tech) in TECH_INDICATORS {
        if host_root.join(file).exists() && !meta.tech_stack.iter().any(|t| t == tech) {
            meta.tech_stack.push((*tech).to_string());
        }
    }

    match origin_remote(host_root) {
        Ok(remote) => meta.vcs_remote = remote,
        Err(e) => debug!("No git remote for {}: {}", host_root.display(), e),
    }

    meta
}

fn read(dir: &Path, file: &str) -> Option<String> {
    std::fs::read_to_string(dir.join(file)).ok()
}

fn json_str(value: &Json, key: &str) -> Option<String> {
    value.get(key)?.as_str().map(str::to_string)
}

fn toml_str(table: &toml::Value, key: &str) -> Option<String> {
    table.get(key)?.as_str().map(str::to_string)
}

fn parse_package_json(text: &str) -> Option<Manifest> {
    let value: Json = serde_json::from_str(text).ok()?;
    Some(Manifest {
        name: json_str(&value, "name"),
        version: json_str(&value, "version"),
        description: json_str(&value, "description"),
    })
}

fn parse_cargo_toml(text: &str) -> Option<Manifest> {
    let value: toml::Value = toml::from_str(text).ok()?;
    // Workspace roots carry no [package]; `version.workspace = true` is not a string.
    let package = value.get("package").or_else(|| value.get("workspace").and_then(|w| w.get("package")))?;
    Some(Manifest {
        name: toml_str(package, "name"),
        version: toml_str(package, "version"),
        description: toml_str(package, "description"),
    })
}

fn parse_pyproject(text: &str) -> Option<Manifest> {
    let value: toml::Value = toml::from_str(text).ok()?;
    let project = value
        .get("project")
        .or_else(|| value.get("tool").and_then(|t| t.get("poetry")))?;
    Some(Manifest {
        name: toml_str(project, "name"),
        version: toml_str(project, "version"),
        description: toml_str(project, "description"),
    })
}

/// First heading and first prose paragraph of a README.
fn readme_intro(text: &str) -> (Option<String>, Option<String>) {
    let mut heading = None;
    let mut paragraph: Vec<&str> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            if heading.is_none() {
                let title = trimmed.trim_start_matches('#').trim();
                if !title.is_empty() {
                    heading = Some(title.to_string());
                }
            }
            if !paragraph.is_empty() {
                break;
            }
            continue;
        }
        if trimmed.is_empty() {
            if !paragraph.is_empty() {
                break;
            }
            continue;
        }
        // Badges, images and html wrappers are not prose.
        if trimmed.starts_with('[') || trimmed.starts_with('!') || trimmed.starts_with('<') {
            continue;
        }
        paragraph.push(trimmed);
    }

    let paragraph = (!paragraph.is_empty()).then(|| paragraph.join(" "));
    (heading, paragraph)
}

fn origin_remote(host_root: &Path) -> Result<Option<String>> {
    let repo = git2::Repository::open(host_root)?;
    let remote = repo.find_remote("origin")?;
    Ok(remote.url().map(str::to_string))
}

//! Assembles generated files into the configuration handed to the proxy.

use crate::{
    core::policies::{
        Errors, GenerateError, GenerateResult, Generator, LocationType, Policy, Settings,
    },
    graph::Graph,
};
use anyhow::{Context, Result};
use std::{
    collections::{btree_map::Entry, BTreeMap},
    path::Path,
};
use tracing::{debug, info};

/// The location class of an include file.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FileLocation {
    /// Included once in the `http` context.
    Http,
    Server,
    Location(LocationType),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigFile {
    pub name: String,
    pub location: FileLocation,
    pub content: Vec<u8>,
}

/// Everything generated for one graph.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Output {
    /// Unique by name, in generation order.
    pub files: Vec<ConfigFile>,

    /// Inline settings, keyed by the server key, path rule match key, or
    /// match rule key of the scope they were generated for. Settings for the
    /// `http` context are keyed by [`HTTP_SETTINGS`].
    pub settings: BTreeMap<String, Settings>,
}

pub const HTTP_SETTINGS: &str = "http";

const INCLUDES: &str = "includes";
const SETTINGS: &str = "settings.json";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(transparent)]
    Generate(#[from] Errors),

    #[error("file {name} was generated with conflicting contents")]
    FileNameCollision { name: String },
}

/// Runs the generator over every scope of the graph.
///
/// Every scope is visited even after a failure so that all errors are
/// reported together. A policy attached to several scopes is reported once.
pub fn generate(graph: &Graph, generator: &dyn Generator) -> Result<Output, ConfigError> {
    let mut assembly = Assembly::default();

    match generator.generate_for_http(&attached_policies(graph)) {
        Ok(result) => assembly.http(result),
        Err(errors) => assembly.fail(errors),
    }

    for server in &graph.servers {
        match generator.generate_for_server(&server.policies, server) {
            Ok(result) => {
                for file in result.files {
                    assembly.add(file.name, FileLocation::Server, file.content);
                }
                assembly.settings(server.key(), result.settings);
            }
            Err(errors) => assembly.fail(errors),
        }

        for path_rule in &server.path_rules {
            match generator.generate_for_path_rule(&path_rule.policies, path_rule) {
                Ok(result) => {
                    for file in result.files {
                        let location = FileLocation::Location(file.location_type);
                        assembly.add(file.name, location, file.content);
                    }
                    assembly.settings(path_rule.match_key.clone(), result.settings);
                }
                Err(errors) => assembly.fail(errors),
            }

            for match_rule in &path_rule.match_rules {
                match generator.generate_for_match_rule(&match_rule.policies, match_rule) {
                    Ok(result) => {
                        for file in result.files {
                            let location = FileLocation::Location(file.location_type);
                            assembly.add(file.name, location, file.content);
                        }
                        assembly.settings(match_rule.key(path_rule), result.settings);
                    }
                    Err(errors) => assembly.fail(errors),
                }
            }
        }
    }

    assembly.finish()
}

/// Every policy attached to a scope of the graph, once, in the order the
/// scopes are visited.
fn attached_policies(graph: &Graph) -> Vec<Policy> {
    let mut policies = Vec::<Policy>::new();
    let mut push = |attached: &[Policy]| {
        for policy in attached {
            if !policies.contains(policy) {
                policies.push(policy.clone());
            }
        }
    };
    for server in &graph.servers {
        push(&server.policies);
        for path_rule in &server.path_rules {
            push(&path_rule.policies);
            for match_rule in &path_rule.match_rules {
                push(&match_rule.policies);
            }
        }
    }
    policies
}

/// Writes the output under `dir`, replacing whatever a previous pass wrote.
///
/// Files are written to `dir/includes/<name>` and settings to
/// `dir/settings.json`. Both are staged next to their final paths and renamed
/// into place, so a failed write leaves the previous configuration intact.
pub async fn write(output: &Output, dir: &Path) -> Result<()> {
    let includes = dir.join(INCLUDES);
    let staged = dir.join(format!(".{INCLUDES}.staged"));
    let previous = dir.join(format!(".{INCLUDES}.previous"));
    for stale in [&staged, &previous] {
        remove_dir_if_exists(stale).await?;
    }

    tokio::fs::create_dir_all(&staged)
        .await
        .with_context(|| format!("creating {}", staged.display()))?;
    for file in &output.files {
        let path = staged.join(&file.name);
        tokio::fs::write(&path, &file.content)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        debug!(file = %file.name, location = ?file.location, "Staged include file");
    }

    let settings = serde_json::to_vec_pretty(&output.settings)?;
    let settings_path = dir.join(SETTINGS);
    let staged_settings = dir.join(format!(".{SETTINGS}.staged"));
    tokio::fs::write(&staged_settings, settings)
        .await
        .with_context(|| format!("writing {}", staged_settings.display()))?;

    if tokio::fs::try_exists(&includes).await? {
        tokio::fs::rename(&includes, &previous)
            .await
            .with_context(|| format!("moving {} aside", includes.display()))?;
    }
    tokio::fs::rename(&staged, &includes)
        .await
        .with_context(|| format!("replacing {}", includes.display()))?;
    tokio::fs::rename(&staged_settings, &settings_path)
        .await
        .with_context(|| format!("replacing {}", settings_path.display()))?;
    remove_dir_if_exists(&previous).await?;

    info!(
        files = output.files.len(),
        scopes = output.settings.len(),
        dir = %dir.display(),
        "Wrote configuration"
    );
    Ok(())
}

async fn remove_dir_if_exists(path: &Path) -> Result<()> {
    if tokio::fs::try_exists(path).await? {
        tokio::fs::remove_dir_all(path)
            .await
            .with_context(|| format!("removing {}", path.display()))?;
    }
    Ok(())
}

#[derive(Default)]
struct Assembly {
    files: Vec<ConfigFile>,
    names: BTreeMap<String, usize>,
    settings: BTreeMap<String, Settings>,
    errors: Vec<GenerateError>,
    collisions: Vec<String>,
}

// === impl Assembly ===

impl Assembly {
    fn add(&mut self, name: String, location: FileLocation, content: Vec<u8>) {
        match self.names.entry(name) {
            Entry::Vacant(entry) => {
                let name = entry.key().clone();
                entry.insert(self.files.len());
                self.files.push(ConfigFile {
                    name,
                    location,
                    content,
                });
            }
            Entry::Occupied(entry) => {
                let existing = &self.files[*entry.get()];
                if existing.location != location || existing.content != content {
                    self.collisions.push(entry.key().clone());
                }
            }
        }
    }

    fn http(&mut self, result: GenerateResult) {
        for file in result.files {
            self.add(file.name, FileLocation::Http, file.content);
        }
        self.settings(HTTP_SETTINGS.to_string(), result.settings);
    }

    fn settings(&mut self, key: String, settings: Settings) {
        if !settings.is_empty() {
            self.settings.entry(key).or_default().extend(settings);
        }
    }

    fn fail(&mut self, errors: Errors) {
        for error in errors {
            if !self.errors.contains(&error) {
                self.errors.push(error);
            }
        }
    }

    fn finish(self) -> Result<Output, ConfigError> {
        if !self.errors.is_empty() {
            return Err(ConfigError::Generate(self.errors.into_iter().collect()));
        }
        if let Some(name) = self.collisions.into_iter().next() {
            return Err(ConfigError::FileNameCollision { name });
        }
        Ok(Output {
            files: self.files,
            settings: self.settings,
        })
    }
}

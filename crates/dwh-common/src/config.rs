//! Configuration file handling
//!
//! The warehouse tooling is configured by an INI file (`dwh.cfg` by default)
//! with four sections:
//!
//! ```text
//! [AWS]       KEY, SECRET, REGION
//! [CLUSTER]   HOST, DB_NAME, DB_USER, DB_PASSWORD, DB_PORT,
//!             CLUSTER_TYPE, NUM_NODES, NODE_TYPE, CLUSTER_IDENTIFIER
//! [IAM_ROLE]  IAM_ROLE_NAME, ARN
//! [S3]        LOG_DATA, LOG_JSONPATH, SONG_DATA
//! ```
//!
//! Any value can be overridden from the environment as
//! `DWH_<SECTION>__<KEY>` (for example `DWH_AWS__SECRET`). A `.env` file in
//! the working directory is loaded first.
//!
//! A loaded [`DwhConfig`] is an immutable snapshot. Provisioning produces a
//! new snapshot through [`DwhConfig::with_provisioned_endpoint`] and persists
//! the two provisioned values with [`persist_provisioned_endpoint`].

use crate::error::{DwhError, Result};
use config::{Config, Environment, File, FileFormat};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Config file read when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "dwh.cfg";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "DWH";

/// Section holding the connection host written back after provisioning.
pub const CLUSTER_SECTION: &str = "CLUSTER";

/// Section holding the role ARN written back after provisioning.
pub const IAM_ROLE_SECTION: &str = "IAM_ROLE";

/// Immutable key/value snapshot of the configuration file.
///
/// Section and key lookups are case-insensitive. Empty values are treated as
/// absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DwhConfig {
    source: Option<PathBuf>,
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl DwhConfig {
    /// Load `path`, then apply `.env` and `DWH_*` environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = path.as_ref();
        if !path.exists() {
            return Err(DwhError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("config file '{}' does not exist", path.display()),
            )));
        }

        let file = Config::builder()
            .add_source(File::from(path).format(FileFormat::Ini).required(true))
            .build()?;
        let environment = Config::builder()
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let mut loaded = Self::from_settings(file)?;
        loaded.overlay(Self::from_settings(environment)?);
        loaded.source = Some(path.to_path_buf());
        debug!(path = %path.display(), sections = loaded.sections.len(), "Configuration loaded");
        Ok(loaded)
    }

    /// Parse INI text without touching the file system or the environment.
    pub fn from_ini_str(contents: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(contents, FileFormat::Ini))
            .build()?;
        Self::from_settings(settings)
    }

    fn from_settings(settings: Config) -> Result<Self> {
        let raw: config::Map<String, config::Value> = settings.try_deserialize()?;

        let mut sections = BTreeMap::new();
        for (section, value) in raw {
            // Top-level scalars come from unrelated DWH_* variables such as DWH_CONFIG.
            let Ok(table) = value.into_table() else {
                continue;
            };

            let entries: BTreeMap<String, String> = table
                .into_iter()
                .filter_map(|(key, value)| {
                    value
                        .into_string()
                        .ok()
                        .map(|v| (key.to_lowercase(), clean_value(&v)))
                })
                .collect();

            sections
                .entry(section.to_lowercase())
                .or_insert_with(BTreeMap::new)
                .extend(entries);
        }

        Ok(Self {
            source: None,
            sections,
        })
    }

    fn overlay(&mut self, other: Self) {
        for (section, entries) in other.sections {
            self.sections.entry(section).or_default().extend(entries);
        }
    }

    /// Path the snapshot was loaded from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Non-empty value for `section`/`key`
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(&section.to_lowercase())
            .and_then(|entries| entries.get(&key.to_lowercase()))
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Non-empty value for `section`/`key`, or `ConfigurationMissing`
    pub fn require(&self, section: &str, key: &str) -> Result<&str> {
        self.get(section, key)
            .ok_or_else(|| DwhError::missing(section, key))
    }

    pub fn get_or<'a>(&'a self, section: &str, key: &str, default: &'a str) -> &'a str {
        self.get(section, key).unwrap_or(default)
    }

    /// Required value parsed into `T`
    pub fn parse<T>(&self, section: &str, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.require(section, key)?;
        raw.parse()
            .map_err(|e: T::Err| DwhError::invalid(section, key, format!("'{}': {}", raw, e)))
    }

    /// New snapshot carrying the provisioned connection host and role ARN.
    pub fn with_provisioned_endpoint(&self, host: &str, role_arn: &str) -> Self {
        let mut next = self.clone();
        next.set(CLUSTER_SECTION, "HOST", host);
        next.set(IAM_ROLE_SECTION, "ARN", role_arn);
        next
    }

    fn set(&mut self, section: &str, key: &str, value: &str) {
        self.sections
            .entry(section.to_lowercase())
            .or_default()
            .insert(key.to_lowercase(), value.to_string());
    }
}

/// Strip surrounding whitespace and one pair of matching quotes.
fn clean_value(raw: &str) -> String {
    let trimmed = raw.trim();
    for quote in ['\'', '"'] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return trimmed[1..trimmed.len() - 1].to_string();
        }
    }
    trimmed.to_string()
}

/// Rewrite `HOST` in `[CLUSTER]` and `ARN` in `[IAM_ROLE]` in place.
///
/// All other lines are preserved byte for byte, line endings included; added
/// lines use the file's own line ending. A missing key is appended to the end
/// of its section; a missing section is appended to the file.
pub fn persist_provisioned_endpoint(path: &Path, host: &str, role_arn: &str) -> Result<()> {
    let contents = std::fs::read_to_string(path)?;
    let updated = rewrite_entries(
        &contents,
        &[(CLUSTER_SECTION, "HOST", host), (IAM_ROLE_SECTION, "ARN", role_arn)],
    );
    std::fs::write(path, updated)?;
    debug!(path = %path.display(), "Provisioned endpoint written to config file");
    Ok(())
}

fn rewrite_entries(contents: &str, updates: &[(&str, &str, &str)]) -> String {
    let newline = if contents.contains("\r\n") { "\r\n" } else { "\n" };
    // (text, terminator) per line; the terminator is kept as found.
    let mut lines: Vec<(String, &str)> = contents
        .split_inclusive('\n')
        .map(|raw| {
            let text = raw.strip_suffix('\n').map_or(raw, |t| t.strip_suffix('\r').unwrap_or(t));
            (text.to_string(), &raw[text.len()..])
        })
        .collect();
    let mut done = vec![false; updates.len()];
    // Index of the last non-blank line of each section, keyed by upper-case name.
    let mut section_tail: BTreeMap<String, usize> = BTreeMap::new();
    let mut current: Option<String> = None;

    for (index, (line, _)) in lines.iter_mut().enumerate() {
        let trimmed = line.trim();
        if let Some(name) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            let name = name.trim().to_uppercase();
            section_tail.insert(name.clone(), index);
            current = Some(name);
            continue;
        }

        let Some(section) = current.as_deref() else {
            continue;
        };
        if !trimmed.is_empty() {
            section_tail.insert(section.to_string(), index);
        }

        let Some(key) = trimmed.split(['=', ':']).next().map(str::trim) else {
            continue;
        };
        let mut replacement = None;
        for (slot, (target_section, target_key, value)) in updates.iter().enumerate() {
            if !done[slot]
                && section.eq_ignore_ascii_case(target_section)
                && key.eq_ignore_ascii_case(target_key)
            {
                replacement = Some(format!("{}={}", target_key, value));
                done[slot] = true;
            }
        }
        if let Some(replacement) = replacement {
            *line = replacement;
        }
    }

    // Insert from the bottom up so earlier indices stay valid.
    let mut inserts: Vec<(usize, String)> = Vec::new();
    for (slot, (section, key, value)) in updates.iter().enumerate() {
        if done[slot] {
            continue;
        }
        match section_tail.get(&section.to_uppercase()) {
            Some(&tail) => inserts.push((tail + 1, format!("{}={}", key, value))),
            None => {
                if lines.last().is_some_and(|(l, _)| !l.trim().is_empty()) {
                    lines.push((String::new(), newline));
                }
                lines.push((format!("[{}]", section), newline));
                lines.push((format!("{}={}", key, value), newline));
            }
        }
    }
    inserts.sort_by(|a, b| b.0.cmp(&a.0));
    for (at, line) in inserts {
        lines.insert(at, (line, newline));
    }

    let last = lines.len().saturating_sub(1);
    let keep_final_newline = contents.ends_with('\n') || contents.is_empty();
    let mut out = String::with_capacity(contents.len() + 64);
    for (index, (line, terminator)) in lines.iter().enumerate() {
        out.push_str(line);
        if index < last || keep_final_newline {
            out.push_str(if terminator.is_empty() { newline } else { terminator });
        }
    }
    out
}

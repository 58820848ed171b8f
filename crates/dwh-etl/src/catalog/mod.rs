//! Statement Catalog
//!
//! Named SQL statements grouped by [`Phase`]. Templates are resolved exactly
//! once, from configuration, when the catalog is loaded; afterwards the
//! catalog is read-only.

mod sql;

use crate::error::{EtlError, Result};
use dwh_common::DwhConfig;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Region used for COPY when `[AWS] REGION` is not configured.
pub const DEFAULT_REGION: &str = "us-west-2";

/// A named batch of statements executed as one pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Guard: tables currently present in the public schema
    ExistingTables,
    DropTables,
    CreateTables,
    CopyStaging,
    InsertStarSchema,
    /// Guard: songs with `year = 0`
    DetectYearZero,
    CleanYearZero,
    /// One read-only statement per star schema table
    CheckDuplicates,
    RemoveArtistDuplicates,
    TruncateTables,
    DropStagingTables,
    Analytics,
}

impl Phase {
    pub const ALL: [Phase; 12] = [
        Phase::ExistingTables,
        Phase::DropTables,
        Phase::CreateTables,
        Phase::CopyStaging,
        Phase::InsertStarSchema,
        Phase::DetectYearZero,
        Phase::CleanYearZero,
        Phase::CheckDuplicates,
        Phase::RemoveArtistDuplicates,
        Phase::TruncateTables,
        Phase::DropStagingTables,
        Phase::Analytics,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::ExistingTables => "existing-tables",
            Phase::DropTables => "drop-tables",
            Phase::CreateTables => "create-tables",
            Phase::CopyStaging => "copy-staging",
            Phase::InsertStarSchema => "insert-star-schema",
            Phase::DetectYearZero => "detect-year-zero",
            Phase::CleanYearZero => "clean-year-zero",
            Phase::CheckDuplicates => "check-duplicates",
            Phase::RemoveArtistDuplicates => "remove-artist-duplicates",
            Phase::TruncateTables => "truncate-tables",
            Phase::DropStagingTables => "drop-staging-tables",
            Phase::Analytics => "analytics",
        }
    }

    /// Phases that destroy data and may be gated by a confirmation
    pub fn is_destructive(self) -> bool {
        matches!(
            self,
            Phase::DropTables
                | Phase::CleanYearZero
                | Phase::RemoveArtistDuplicates
                | Phase::TruncateTables
                | Phase::DropStagingTables
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        Phase::ALL
            .into_iter()
            .find(|phase| phase.as_str() == wanted)
            .ok_or_else(|| {
                let known: Vec<_> = Phase::ALL.iter().map(|p| p.as_str()).collect();
                format!("unknown phase '{}', expected one of: {}", s, known.join(", "))
            })
    }
}

/// Identity of a statement: its phase and logical name
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StatementId {
    pub phase: Phase,
    pub name: &'static str,
}

impl StatementId {
    pub const fn new(phase: Phase, name: &'static str) -> Self {
        Self { phase, name }
    }
}

impl fmt::Display for StatementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.phase, self.name)
    }
}

impl Serialize for StatementId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A resolved, immutable SQL statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    id: StatementId,
    table: Option<&'static str>,
    sql: String,
}

impl Statement {
    pub fn id(&self) -> StatementId {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.id.phase
    }

    pub fn name(&self) -> &'static str {
        self.id.name
    }

    /// Table the statement acts on, used for narration
    pub fn table(&self) -> Option<&'static str> {
        self.table
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

pub(crate) struct Template {
    name: &'static str,
    table: Option<&'static str>,
    sql: &'static str,
}

/// Values substituted into statement templates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogParams {
    pub role_arn: String,
    pub log_data: String,
    pub log_jsonpath: String,
    pub song_data: String,
    pub region: String,
}

impl CatalogParams {
    /// Read `[IAM_ROLE] ARN`, `[S3] LOG_DATA/LOG_JSONPATH/SONG_DATA` and `[AWS] REGION`.
    ///
    /// Every key except the region is required.
    pub fn from_config(config: &DwhConfig) -> Result<Self> {
        Ok(Self {
            role_arn: config.require("IAM_ROLE", "ARN")?.to_string(),
            log_data: config.require("S3", "LOG_DATA")?.to_string(),
            log_jsonpath: config.require("S3", "LOG_JSONPATH")?.to_string(),
            song_data: config.require("S3", "SONG_DATA")?.to_string(),
            region: config.get_or("AWS", "REGION", DEFAULT_REGION).to_string(),
        })
    }

    fn lookup(&self, parameter: &str) -> Option<String> {
        match parameter {
            "role_arn" => Some(self.role_arn.clone()),
            "iam_credentials" => Some(format!("aws_iam_role={}", self.role_arn)),
            "log_data" => Some(self.log_data.clone()),
            "log_jsonpath" => Some(self.log_jsonpath.clone()),
            "song_data" => Some(self.song_data.clone()),
            "region" => Some(self.region.clone()),
            _ => None,
        }
    }
}

/// Quote a value as a SQL string literal.
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn resolve(template: &Template, phase: Phase, params: &CatalogParams) -> Result<String> {
    let mut out = String::with_capacity(template.sql.len());
    let mut rest = template.sql;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| EtlError::Template {
            statement: StatementId::new(phase, template.name).to_string(),
            parameter: after.to_string(),
        })?;
        let parameter = &after[..end];
        let value = params.lookup(parameter).ok_or_else(|| EtlError::Template {
            statement: StatementId::new(phase, template.name).to_string(),
            parameter: parameter.to_string(),
        })?;
        out.push_str(&quote_literal(&value));
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Ok(out.trim().to_string())
}

/// Every statement, resolved and grouped by phase
#[derive(Debug, Clone)]
pub struct StatementCatalog {
    phases: BTreeMap<Phase, Vec<Statement>>,
}

impl StatementCatalog {
    /// Resolve every template against `params`.
    pub fn load(params: &CatalogParams) -> Result<Self> {
        let mut phases = BTreeMap::new();
        for (phase, templates) in sql::PHASES {
            let statements = templates
                .iter()
                .map(|template| {
                    Ok(Statement {
                        id: StatementId::new(*phase, template.name),
                        table: template.table,
                        sql: resolve(template, *phase, params)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            phases.insert(*phase, statements);
        }

        debug!(
            phases = phases.len(),
            statements = phases.values().map(Vec::len).sum::<usize>(),
            "Statement catalog loaded"
        );
        Ok(Self { phases })
    }

    /// Statements of `phase` in execution order
    pub fn phase(&self, phase: Phase) -> &[Statement] {
        self.phases.get(&phase).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn statement(&self, phase: Phase, name: &str) -> Option<&Statement> {
        self.phase(phase).iter().find(|s| s.name() == name)
    }

    /// Statement of `phase` acting on `table`
    pub fn for_table(&self, phase: Phase, table: &str) -> Option<&Statement> {
        self.phase(phase).iter().find(|s| s.table() == Some(table))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Statement> {
        self.phases.values().flatten()
    }
}

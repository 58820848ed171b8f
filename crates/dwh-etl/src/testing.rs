//! Test doubles: an in-memory warehouse and fake AWS infrastructure
#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::catalog::{CatalogParams, Phase, Statement, StatementCatalog, StatementId};
use crate::dedup::{self, ArtistCandidate};
use crate::infra::{
    ClusterDescription, ClusterSpec, Creation, Deletion, InfraError, Infrastructure,
};
use crate::row::{Row, Value};
use crate::warehouse::{Warehouse, WarehouseError};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub fn catalog() -> StatementCatalog {
    StatementCatalog::load(&CatalogParams {
        role_arn: "arn:aws:iam::123456789012:role/dwhRole".to_string(),
        log_data: "s3://udacity-dend/log_data".to_string(),
        log_jsonpath: "s3://udacity-dend/log_json_path.json".to_string(),
        song_data: "s3://udacity-dend/song_data".to_string(),
        region: "us-west-2".to_string(),
    })
    .unwrap()
}

pub fn cluster_spec() -> ClusterSpec {
    ClusterSpec {
        identifier: "dwhcluster".to_string(),
        cluster_type: "multi-node".to_string(),
        node_type: "dc2.large".to_string(),
        num_nodes: 4,
        db_name: "dwh".to_string(),
        master_user: "dwhuser".to_string(),
        master_password: "Passw0rd".to_string(),
        port: Some(5439),
    }
}

// ============================================================================
// In-memory warehouse
// ============================================================================

pub const ALL_TABLES: [&str; 7] = [
    "staging_events",
    "staging_songs",
    "songplays",
    "users",
    "songs",
    "artists",
    "time",
];

/// One line of the event log data set
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub artist: Option<String>,
    pub song: Option<String>,
    pub length: Option<f64>,
    pub page: String,
    pub user_id: Option<i64>,
    pub ts: i64,
}

impl Event {
    pub fn next_song(user_id: i64, artist: &str, song: &str, length: f64, ts: i64) -> Self {
        Self {
            artist: Some(artist.to_string()),
            song: Some(song.to_string()),
            length: Some(length),
            page: "NextSong".to_string(),
            user_id: Some(user_id),
            ts,
        }
    }

    pub fn on_page(mut self, page: &str) -> Self {
        self.page = page.to_string();
        self
    }
}

/// One record of the song data set
#[derive(Debug, Clone, PartialEq)]
pub struct SongRecord {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    pub artist_name: String,
    pub artist_location: Option<String>,
    pub artist_latitude: Option<f64>,
    pub artist_longitude: Option<f64>,
    pub duration: f64,
    pub year: i64,
}

impl SongRecord {
    pub fn new(song_id: &str, title: &str, artist_id: &str, artist_name: &str, duration: f64) -> Self {
        Self {
            song_id: song_id.to_string(),
            title: title.to_string(),
            artist_id: artist_id.to_string(),
            artist_name: artist_name.to_string(),
            artist_location: None,
            artist_latitude: None,
            artist_longitude: None,
            duration,
            year: 2004,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Songplay {
    pub start_ts: i64,
    pub user_id: i64,
    pub song_id: String,
    pub artist_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SongRow {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    pub year: Option<i64>,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtistRow {
    pub artist_id: String,
    pub name: String,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ArtistRow {
    pub fn new(artist_id: &str, name: &str, location: Option<&str>) -> Self {
        Self {
            artist_id: artist_id.to_string(),
            name: name.to_string(),
            location: location.map(str::to_string),
            latitude: None,
            longitude: None,
        }
    }
}

/// Models the effect of every catalog statement on plain vectors.
///
/// `source_*` is what COPY reads from S3.
#[derive(Debug, Default)]
pub struct InMemoryWarehouse {
    pub tables: BTreeSet<String>,
    pub source_events: Vec<Event>,
    pub source_songs: Vec<SongRecord>,
    pub staging_events: Vec<Event>,
    pub staging_songs: Vec<SongRecord>,
    pub songplays: Vec<Songplay>,
    pub users: Vec<i64>,
    pub songs: Vec<SongRow>,
    pub artists: Vec<ArtistRow>,
    pub time: Vec<i64>,
    survivors: Vec<ArtistRow>,
    fail_on: HashSet<&'static str>,
    cancel_after: Option<(&'static str, CancellationToken)>,
    executed: Vec<StatementId>,
}

impl InMemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Warehouse where every table already exists
    pub fn with_tables() -> Self {
        let mut warehouse = Self::new();
        warehouse.tables = ALL_TABLES.iter().map(|t| t.to_string()).collect();
        warehouse
    }

    /// Reject the statement named `name` in every phase
    pub fn fail_on(mut self, name: &'static str) -> Self {
        self.fail_on.insert(name);
        self
    }

    /// Cancel `token` once the statement named `name` has run, like a
    /// Ctrl-C arriving while it is in flight
    pub fn cancel_after(mut self, name: &'static str, token: CancellationToken) -> Self {
        self.cancel_after = Some((name, token));
        self
    }

    pub fn executed(&self) -> &[StatementId] {
        &self.executed
    }

    pub fn executed_in(&self, phase: Phase) -> usize {
        self.executed.iter().filter(|id| id.phase == phase).count()
    }

    fn require_table(&self, table: &str) -> Result<(), WarehouseError> {
        if self.tables.contains(table) {
            Ok(())
        } else {
            Err(WarehouseError::Sqlx(sqlx::Error::Protocol(format!(
                "relation \"{}\" does not exist",
                table
            ))))
        }
    }

    fn clear(&mut self, table: &str) {
        match table {
            "staging_events" => self.staging_events.clear(),
            "staging_songs" => self.staging_songs.clear(),
            "songplays" => self.songplays.clear(),
            "users" => self.users.clear(),
            "songs" => self.songs.clear(),
            "artists" => self.artists.clear(),
            "time" => self.time.clear(),
            _ => {}
        }
    }

    fn insert_star_table(&mut self, table: &str) {
        match table {
            "songplays" => {
                let plays: Vec<Songplay> = self
                    .staging_events
                    .iter()
                    .filter(|e| e.page == "NextSong")
                    .flat_map(|e| {
                        self.staging_songs
                            .iter()
                            .filter(move |s| {
                                e.song.as_deref() == Some(s.title.as_str())
                                    && e.artist.as_deref() == Some(s.artist_name.as_str())
                                    && e.length == Some(s.duration)
                            })
                            .map(move |s| Songplay {
                                start_ts: e.ts,
                                user_id: e.user_id.unwrap_or_default(),
                                song_id: s.song_id.clone(),
                                artist_id: s.artist_id.clone(),
                            })
                    })
                    .collect();
                self.songplays.extend(plays);
            }
            "users" => {
                let ids: BTreeSet<i64> = self.staging_events.iter().filter_map(|e| e.user_id).collect();
                self.users.extend(ids);
            }
            "songs" => {
                let mut rows: Vec<SongRow> = Vec::new();
                for s in &self.staging_songs {
                    let row = SongRow {
                        song_id: s.song_id.clone(),
                        title: s.title.clone(),
                        artist_id: s.artist_id.clone(),
                        year: Some(s.year),
                        duration: s.duration,
                    };
                    if !rows.contains(&row) {
                        rows.push(row);
                    }
                }
                self.songs.extend(rows);
            }
            "artists" => {
                let mut rows: Vec<ArtistRow> = Vec::new();
                for s in &self.staging_songs {
                    let row = ArtistRow {
                        artist_id: s.artist_id.clone(),
                        name: s.artist_name.clone(),
                        location: s.artist_location.clone(),
                        latitude: s.artist_latitude,
                        longitude: s.artist_longitude,
                    };
                    if !rows.contains(&row) {
                        rows.push(row);
                    }
                }
                self.artists.extend(rows);
            }
            "time" => {
                let ts: BTreeSet<i64> = self.staging_events.iter().map(|e| e.ts).collect();
                self.time.extend(ts);
            }
            _ => {}
        }
    }

    fn artist_candidates(&self) -> Vec<ArtistCandidate> {
        let mut counts: BTreeMap<(&str, &str), i64> = BTreeMap::new();
        for a in &self.artists {
            *counts.entry((&a.artist_id, &a.name)).or_default() += 1;
        }

        let mut candidates: Vec<ArtistCandidate> = self
            .artists
            .iter()
            .map(|a| ArtistCandidate {
                duplicates: counts[&(a.artist_id.as_str(), a.name.as_str())],
                artist_id: a.artist_id.clone(),
                name: a.name.clone(),
                location: a.location.clone(),
                latitude: a.latitude,
                longitude: a.longitude,
            })
            .filter(|c| c.duplicates > 1)
            .collect();
        candidates.sort_by(dedup::survivor_order);
        candidates
    }

    fn duplicate_counts<K: Ord + Clone>(keys: impl Iterator<Item = K>) -> Vec<(K, i64)> {
        let mut counts: BTreeMap<K, i64> = BTreeMap::new();
        for key in keys {
            *counts.entry(key).or_default() += 1;
        }
        counts.into_iter().filter(|(_, n)| *n > 1).collect()
    }

    fn apply(&mut self, statement: &Statement) -> Result<Vec<Row>, WarehouseError> {
        let table = statement.table().unwrap_or_default();

        match statement.phase() {
            Phase::ExistingTables => Ok(self
                .tables
                .iter()
                .map(|t| Row::new().with("tablename", t.as_str()))
                .collect()),
            Phase::DropTables | Phase::DropStagingTables => {
                self.clear(table);
                self.tables.remove(table);
                Ok(Vec::new())
            }
            Phase::CreateTables => {
                self.tables.insert(table.to_string());
                Ok(Vec::new())
            }
            Phase::CopyStaging => {
                self.require_table(table)?;
                match table {
                    "staging_events" => self.staging_events.extend(self.source_events.clone()),
                    _ => self.staging_songs.extend(self.source_songs.clone()),
                }
                Ok(Vec::new())
            }
            Phase::InsertStarSchema => {
                self.require_table(table)?;
                self.insert_star_table(table);
                Ok(Vec::new())
            }
            Phase::DetectYearZero => Ok(self
                .songs
                .iter()
                .filter(|s| s.year == Some(0))
                .take(5)
                .map(|s| Row::new().with("song_id", s.song_id.as_str()).with("year", 0_i64))
                .collect()),
            Phase::CleanYearZero => {
                for song in self.songs.iter_mut().filter(|s| s.year == Some(0)) {
                    song.year = None;
                }
                Ok(Vec::new())
            }
            Phase::CheckDuplicates => {
                self.require_table(table)?;
                let rows = match table {
                    "artists" => self
                        .artist_candidates()
                        .into_iter()
                        .map(|c| {
                            Row::new()
                                .with("num_duplicates", c.duplicates)
                                .with("artist_id", c.artist_id)
                                .with("name", c.name)
                                .with("location", c.location)
                                .with("latitude", c.latitude)
                                .with("longitude", c.longitude)
                        })
                        .collect(),
                    "users" => Self::duplicate_counts(self.users.iter().copied())
                        .into_iter()
                        .take(5)
                        .map(|(id, n)| Row::new().with("num_duplicates", n).with("user_id", id))
                        .collect(),
                    "songs" => Self::duplicate_counts(self.songs.iter().map(|s| s.song_id.clone()))
                        .into_iter()
                        .take(5)
                        .map(|(id, n)| Row::new().with("num_duplicates", n).with("song_id", id))
                        .collect(),
                    "time" => Self::duplicate_counts(self.time.iter().copied())
                        .into_iter()
                        .take(5)
                        .map(|(ts, n)| Row::new().with("num_duplicates", n).with("start_time", ts))
                        .collect(),
                    _ => Self::duplicate_counts(self.songplays.iter().map(|p| p.start_ts))
                        .into_iter()
                        .take(5)
                        .map(|(ts, n)| Row::new().with("num_duplicates", n).with("start_time", ts))
                        .collect(),
                };
                Ok(rows)
            }
            Phase::RemoveArtistDuplicates => {
                match statement.name() {
                    "select_survivors" => {
                        self.survivors = dedup::select_survivors(&self.artist_candidates())
                            .into_iter()
                            .map(|c| ArtistRow {
                                artist_id: c.artist_id,
                                name: c.name,
                                location: c.location,
                                latitude: c.latitude,
                                longitude: c.longitude,
                            })
                            .collect();
                    }
                    "delete_duplicates" => {
                        let survivors = &self.survivors;
                        self.artists.retain(|a| {
                            !survivors
                                .iter()
                                .any(|s| s.artist_id == a.artist_id && s.name == a.name)
                        });
                    }
                    "reinsert_survivors" => self.artists.extend(self.survivors.clone()),
                    "drop_survivors" | "drop_stale_survivors" => self.survivors.clear(),
                    _ => {}
                }
                Ok(Vec::new())
            }
            Phase::TruncateTables => {
                self.require_table(table)?;
                self.clear(table);
                Ok(Vec::new())
            }
            Phase::Analytics => {
                let mut plays: BTreeMap<&str, i64> = BTreeMap::new();
                for play in &self.songplays {
                    for artist in self.artists.iter().filter(|a| a.artist_id == play.artist_id) {
                        *plays.entry(artist.name.as_str()).or_default() += 1;
                    }
                }
                let mut ranked: Vec<(&str, i64)> = plays.into_iter().collect();
                ranked.sort_by(|a, b| b.1.cmp(&a.1));
                Ok(ranked
                    .into_iter()
                    .take(5)
                    .map(|(name, n)| Row::new().with("name", name).with("plays", Value::Int(n)))
                    .collect())
            }
        }
    }
}

#[async_trait]
impl Warehouse for InMemoryWarehouse {
    async fn execute(&mut self, statement: &Statement) -> Result<Vec<Row>, WarehouseError> {
        self.executed.push(statement.id());
        if self.fail_on.contains(statement.name()) {
            return Err(WarehouseError::Sqlx(sqlx::Error::Protocol(format!(
                "simulated failure in {}",
                statement.name()
            ))));
        }
        let result = self.apply(statement);
        if let Some((name, token)) = &self.cancel_after {
            if *name == statement.name() {
                token.cancel();
            }
        }
        result
    }

    async fn close(self) -> Result<(), WarehouseError> {
        Ok(())
    }
}

// ============================================================================
// Fake infrastructure
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfraCall {
    CreateRole(String),
    AttachPolicy(String),
    RoleArn(String),
    CreateCluster(String),
    DescribeCluster(String),
    DeleteCluster(String),
    DetachPolicy(String),
    DeleteRole(String),
}

#[derive(Debug, Default)]
struct FakeState {
    role: bool,
    cluster: Option<String>,
    creating_polls: u32,
    deleting_polls: u32,
    polls_left: u32,
    fail_on: HashSet<&'static str>,
    calls: Vec<InfraCall>,
    describes: usize,
}

/// Simulates IAM and Redshift state transitions.
///
/// A created cluster reports `creating` for `available_after` describes, a
/// deleted one reports `deleting` for `deleted_after` describes.
#[derive(Debug, Default)]
pub struct FakeInfrastructure {
    state: Mutex<FakeState>,
}

impl FakeInfrastructure {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(self, f: impl FnOnce(&mut FakeState)) -> Self {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
        self
    }

    pub fn with_role(self) -> Self {
        self.update(|s| s.role = true)
    }

    pub fn with_cluster(self, status: &str) -> Self {
        let status = status.to_string();
        self.update(|s| s.cluster = Some(status))
    }

    pub fn available_after(self, polls: u32) -> Self {
        self.update(|s| s.creating_polls = polls)
    }

    pub fn deleted_after(self, polls: u32) -> Self {
        self.update(|s| s.deleting_polls = polls)
    }

    pub fn fail_on(self, operation: &'static str) -> Self {
        self.update(|s| {
            s.fail_on.insert(operation);
        })
    }

    pub fn calls(&self) -> Vec<InfraCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn describe_count(&self) -> usize {
        self.state.lock().unwrap().describes
    }

    fn record(&self, call: InfraCall, operation: &'static str) -> Result<std::sync::MutexGuard<'_, FakeState>, InfraError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.fail_on.contains(operation) {
            return Err(InfraError::new(operation, "simulated failure"));
        }
        Ok(state)
    }
}

fn description(identifier: &str, status: &str) -> ClusterDescription {
    let available = status == "available";
    ClusterDescription {
        identifier: identifier.to_string(),
        status: status.to_string(),
        endpoint: available.then(|| format!("{}.example.us-west-2.redshift.amazonaws.com", identifier)),
        port: available.then_some(5439),
        role_arns: vec!["arn:aws:iam::123456789012:role/dwhRole".to_string()],
    }
}

#[async_trait]
impl Infrastructure for FakeInfrastructure {
    async fn create_role(&self, name: &str, _description: &str, _trust_policy: &str) -> Result<Creation, InfraError> {
        let mut state = self.record(InfraCall::CreateRole(name.to_string()), "create-role")?;
        if state.role {
            return Ok(Creation::AlreadyExists);
        }
        state.role = true;
        Ok(Creation::Created)
    }

    async fn attach_policy(&self, role: &str, _policy_arn: &str) -> Result<(), InfraError> {
        let state = self.record(InfraCall::AttachPolicy(role.to_string()), "attach-policy")?;
        if !state.role {
            return Err(InfraError::new("attach-policy", "NoSuchEntity"));
        }
        Ok(())
    }

    async fn role_arn(&self, role: &str) -> Result<String, InfraError> {
        let state = self.record(InfraCall::RoleArn(role.to_string()), "get-role")?;
        if !state.role {
            return Err(InfraError::new("get-role", "NoSuchEntity"));
        }
        Ok(format!("arn:aws:iam::123456789012:role/{}", role))
    }

    async fn create_cluster(&self, spec: &ClusterSpec, _role_arn: &str) -> Result<Creation, InfraError> {
        let mut state = self.record(InfraCall::CreateCluster(spec.identifier.clone()), "create-cluster")?;
        if state.cluster.is_some() {
            return Ok(Creation::AlreadyExists);
        }
        state.cluster = Some("creating".to_string());
        state.polls_left = state.creating_polls;
        Ok(Creation::Created)
    }

    async fn describe_cluster(&self, identifier: &str) -> Result<Option<ClusterDescription>, InfraError> {
        let mut state = self.record(InfraCall::DescribeCluster(identifier.to_string()), "describe-cluster")?;
        state.describes += 1;

        let Some(status) = state.cluster.clone() else {
            return Ok(None);
        };
        match status.as_str() {
            "creating" if state.polls_left == 0 => {
                state.cluster = Some("available".to_string());
                Ok(Some(description(identifier, "available")))
            }
            "deleting" if state.polls_left == 0 => {
                state.cluster = None;
                Ok(None)
            }
            "creating" | "deleting" => {
                state.polls_left -= 1;
                Ok(Some(description(identifier, &status)))
            }
            _ => Ok(Some(description(identifier, &status))),
        }
    }

    async fn delete_cluster(&self, identifier: &str) -> Result<(), InfraError> {
        let mut state = self.record(InfraCall::DeleteCluster(identifier.to_string()), "delete-cluster")?;
        if state.cluster.is_none() {
            return Err(InfraError::new("delete-cluster", "ClusterNotFound"));
        }
        state.cluster = Some("deleting".to_string());
        state.polls_left = state.deleting_polls;
        Ok(())
    }

    async fn detach_policy(&self, role: &str, _policy_arn: &str) -> Result<(), InfraError> {
        self.record(InfraCall::DetachPolicy(role.to_string()), "detach-policy")?;
        Ok(())
    }

    async fn delete_role(&self, role: &str) -> Result<Deletion, InfraError> {
        let mut state = self.record(InfraCall::DeleteRole(role.to_string()), "delete-role")?;
        if !state.role {
            return Ok(Deletion::NotFound);
        }
        state.role = false;
        Ok(Deletion::Deleted)
    }
}

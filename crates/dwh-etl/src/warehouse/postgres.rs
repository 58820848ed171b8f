//! Redshift over the Postgres wire protocol

use super::{Warehouse, WarehouseError};
use crate::catalog::Statement;
use crate::error::Result;
use crate::row::{Row, Value};
use async_trait::async_trait;
use dwh_common::config::CLUSTER_SECTION;
use dwh_common::DwhConfig;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::types::BigDecimal;
use sqlx::{Column, Connection, Executor as _, Row as _, TypeInfo, ValueRef};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Default Redshift port
pub const DEFAULT_PORT: u16 = 5439;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Connection parameters from the `[CLUSTER]` section
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub connect_timeout_secs: u64,
}

impl ConnectionSettings {
    /// Read `HOST`, `DB_PORT`, `DB_NAME`, `DB_USER` and `DB_PASSWORD`.
    ///
    /// `HOST` is only known after provisioning; it is required here.
    pub fn from_config(config: &DwhConfig) -> Result<Self> {
        let port = match config.get(CLUSTER_SECTION, "DB_PORT") {
            Some(_) => config.parse::<u16>(CLUSTER_SECTION, "DB_PORT")?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            host: config.require(CLUSTER_SECTION, "HOST")?.to_string(),
            port,
            database: config.require(CLUSTER_SECTION, "DB_NAME")?.to_string(),
            user: config.require(CLUSTER_SECTION, "DB_USER")?.to_string(),
            password: config.require(CLUSTER_SECTION, "DB_PASSWORD")?.to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        })
    }

    fn options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
            .application_name("dwh")
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// Warehouse session on one `PgConnection`
pub struct PgWarehouse {
    conn: PgConnection,
}

impl PgWarehouse {
    pub async fn connect(settings: &ConnectionSettings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.connect_timeout_secs);
        let conn = tokio::time::timeout(timeout, PgConnection::connect_with(&settings.options()))
            .await
            .map_err(|_| WarehouseError::ConnectTimeout(settings.connect_timeout_secs))?
            .map_err(WarehouseError::from)?;

        info!(
            host = %settings.host,
            port = settings.port,
            database = %settings.database,
            "Connected to warehouse"
        );
        Ok(Self { conn })
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    #[instrument(skip_all, fields(statement = %statement.id()))]
    async fn execute(&mut self, statement: &Statement) -> std::result::Result<Vec<Row>, WarehouseError> {
        let mut tx = self.conn.begin().await?;
        let rows = (&mut *tx).fetch_all(sqlx::raw_sql(statement.sql())).await?;
        tx.commit().await?;

        debug!(rows = rows.len(), "Statement committed");
        rows.iter().map(decode_row).collect()
    }

    async fn close(self) -> std::result::Result<(), WarehouseError> {
        self.conn.close().await?;
        debug!("Warehouse connection closed");
        Ok(())
    }
}

/// Convert a driver row into a [`Row`], choosing the value variant from the
/// column's declared type.
fn decode_row(pg: &PgRow) -> std::result::Result<Row, WarehouseError> {
    let mut row = Row::new();
    for (idx, column) in pg.columns().iter().enumerate() {
        let value = if pg.try_get_raw(idx)?.is_null() {
            Value::Null
        } else {
            match column.type_info().name() {
                "BOOL" => Value::Bool(pg.try_get(idx)?),
                "INT2" => Value::Int(i64::from(pg.try_get::<i16, _>(idx)?)),
                "INT4" => Value::Int(i64::from(pg.try_get::<i32, _>(idx)?)),
                "INT8" => Value::Int(pg.try_get(idx)?),
                "FLOAT4" => Value::Float(f64::from(pg.try_get::<f32, _>(idx)?)),
                "FLOAT8" => Value::Float(pg.try_get(idx)?),
                "NUMERIC" => Value::Decimal(pg.try_get::<BigDecimal, _>(idx)?.to_string()),
                "TIMESTAMP" => Value::Timestamp(pg.try_get(idx)?),
                "TIMESTAMPTZ" => Value::Timestamp(
                    pg.try_get::<chrono::DateTime<chrono::Utc>, _>(idx)?
                        .naive_utc(),
                ),
                "DATE" => Value::Text(pg.try_get::<chrono::NaiveDate, _>(idx)?.to_string()),
                _ => Value::Text(pg.try_get_unchecked::<String, _>(idx)?),
            }
        };
        row.push(column.name(), value);
    }
    Ok(row)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::EtlError;
    use dwh_common::DwhError;

    const CLUSTER: &str = "\
[CLUSTER]
HOST=dwhcluster.abc.us-west-2.redshift.amazonaws.com
DB_NAME=dwh
DB_USER=dwhuser
DB_PASSWORD=Passw0rd
DB_PORT=5439
";

    #[test]
    fn test_settings_from_config() {
        let config = DwhConfig::from_ini_str(CLUSTER).unwrap();
        let settings = ConnectionSettings::from_config(&config).unwrap();

        assert_eq!(settings.host, "dwhcluster.abc.us-west-2.redshift.amazonaws.com");
        assert_eq!(settings.port, 5439);
        assert_eq!(settings.database, "dwh");
        assert_eq!(settings.user, "dwhuser");
    }

    #[test]
    fn test_debug_hides_password() {
        let config = DwhConfig::from_ini_str(CLUSTER).unwrap();
        let settings = ConnectionSettings::from_config(&config).unwrap();
        let debug = format!("{:?}", settings);

        assert!(!debug.contains("Passw0rd"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_missing_host_is_configuration_error() {
        let config = DwhConfig::from_ini_str(&CLUSTER.replace(
            "HOST=dwhcluster.abc.us-west-2.redshift.amazonaws.com",
            "HOST=",
        ))
        .unwrap();

        let err = ConnectionSettings::from_config(&config).unwrap_err();
        assert!(matches!(
            err,
            EtlError::Config(DwhError::ConfigurationMissing { ref key, .. }) if key == "HOST"
        ));
    }

    #[test]
    fn test_invalid_port() {
        let config = DwhConfig::from_ini_str(&CLUSTER.replace("5439", "redshift")).unwrap();
        let err = ConnectionSettings::from_config(&config).unwrap_err();
        assert!(matches!(err, EtlError::Config(DwhError::InvalidConfiguration { .. })));
    }

    #[test]
    fn test_port_defaults_when_absent() {
        let config = DwhConfig::from_ini_str(&CLUSTER.replace("DB_PORT=5439\n", "")).unwrap();
        let settings = ConnectionSettings::from_config(&config).unwrap();
        assert_eq!(settings.port, DEFAULT_PORT);
    }
}

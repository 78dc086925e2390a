use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::{pin_mut, SinkExt};
use tokio::io::AsyncReadExt;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, error, info, instrument};

use crate::error::Result;
use crate::models::{Direction, MessageStatusRow};
use crate::schema::{message_status_history as view, TableDef};
use crate::validation::InputValidator;

const COPY_CHUNK_BYTES: usize = 64 * 1024;

/// Open a single connection. The connection task runs until the client is
/// dropped.
pub async fn connect(database_url: &str, timeout: Duration) -> Result<Client> {
    InputValidator::validate_database_url(database_url)?;

    let mut config = tokio_postgres::Config::from_str(database_url)?;
    config.connect_timeout(timeout);
    let (client, connection) = config.connect(NoTls).await?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!(error = %e, "Postgres connection closed with error");
        }
    });

    debug!("Connected to Postgres");
    Ok(client)
}

fn quote_ident(name: &str) -> Result<String> {
    InputValidator::validate_identifier(name)?;
    Ok(format!("\"{name}\""))
}

fn qualified(schema: &str, name: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_ident(schema)?, quote_ident(name)?))
}

/// `DROP TABLE IF EXISTS ... CASCADE`
pub fn drop_table_sql(schema: &str, table: &TableDef) -> Result<String> {
    Ok(format!("DROP TABLE IF EXISTS {} CASCADE", qualified(schema, table.name)?))
}

/// `CREATE TABLE` with every cast column typed as TEXT
pub fn create_table_sql(schema: &str, table: &TableDef) -> Result<String> {
    let columns = table
        .columns
        .iter()
        .map(|c| Ok(format!("    {} {}", quote_ident(c.name)?, c.ty.create_sql())))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!(
        "CREATE TABLE {} (\n{}\n)",
        qualified(schema, table.name)?,
        columns.join(",\n")
    ))
}

/// `COPY ... FROM STDIN` for a tab-delimited file with a header row, empty
/// string as null
pub fn copy_sql(schema: &str, table: &TableDef, columns: &[String]) -> Result<String> {
    let columns = columns.iter().map(|c| quote_ident(c)).collect::<Result<Vec<_>>>()?;
    Ok(format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT csv, DELIMITER E'\\t', HEADER true, NULL '')",
        qualified(schema, table.name)?,
        columns.join(", ")
    ))
}

/// Single `ALTER TABLE` converting every cast column, empty string as null.
/// `None` when the table has nothing to cast.
pub fn cast_columns_sql(schema: &str, table: &TableDef) -> Result<Option<String>> {
    let clauses = table
        .cast_columns()
        .map(|(name, cast)| {
            let column = quote_ident(name)?;
            let ty = cast.sql();
            Ok(format!("    ALTER COLUMN {column} TYPE {ty} USING NULLIF({column}, '')::{ty}"))
        })
        .collect::<Result<Vec<_>>>()?;

    if clauses.is_empty() {
        return Ok(None);
    }
    Ok(Some(format!(
        "ALTER TABLE {}\n{}",
        qualified(schema, table.name)?,
        clauses.join(",\n")
    )))
}

/// Statement-level access to the warehouse schema
pub struct Warehouse {
    client: Client,
    schema: String,
}

impl Warehouse {
    /// Wrap a connected client; `schema` must be a plain identifier
    pub fn new(client: Client, schema: &str) -> Result<Self> {
        InputValidator::validate_identifier(schema)?;
        Ok(Self {
            client,
            schema: schema.to_string(),
        })
    }

    /// Connect and wrap the client
    pub async fn connect(database_url: &str, schema: &str, timeout: Duration) -> Result<Self> {
        let client = connect(database_url, timeout).await?;
        Self::new(client, schema)
    }

    /// Underlying connection
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Drop the table (and everything depending on it) and create it empty
    #[instrument(skip(self, table), fields(table = table.name))]
    pub async fn replace_table(&self, table: &TableDef) -> Result<()> {
        let drop_sql = drop_table_sql(&self.schema, table)?;
        let create_sql = create_table_sql(&self.schema, table)?;
        self.client.batch_execute(&drop_sql).await?;
        self.client.batch_execute(&create_sql).await?;
        info!("Recreated {}.{}", self.schema, table.name);
        Ok(())
    }

    /// Stream a landed TSV file into the table; returns rows copied
    #[instrument(skip(self, table, columns), fields(table = table.name, file = %path.display()))]
    pub async fn copy_file(&self, table: &TableDef, columns: &[String], path: &Path) -> Result<u64> {
        let sql = copy_sql(&self.schema, table, columns)?;
        let mut file = tokio::fs::File::open(path).await?;

        let sink = self.client.copy_in::<_, Bytes>(sql.as_str()).await?;
        pin_mut!(sink);

        let mut buf = vec![0_u8; COPY_CHUNK_BYTES];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            sink.send(Bytes::copy_from_slice(&buf[..n])).await?;
        }

        let rows = sink.finish().await?;
        info!(rows, "Bulk copy finished");
        Ok(rows)
    }

    /// Convert text columns to their final types. A malformed value fails the
    /// whole statement.
    #[instrument(skip(self, table), fields(table = table.name))]
    pub async fn cast_columns(&self, table: &TableDef) -> Result<()> {
        if let Some(sql) = cast_columns_sql(&self.schema, table)? {
            self.client.batch_execute(&sql).await?;
            debug!("Cast columns to final types");
        }
        Ok(())
    }

    /// Row count of a table in the warehouse schema
    pub async fn count_rows(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", qualified(&self.schema, table)?);
        let row = self.client.query_one(sql.as_str(), &[]).await?;
        Ok(row.try_get(0)?)
    }

    /// Read the dbt message/status view the reports are computed from
    #[instrument(skip(self))]
    pub async fn message_status_history(&self, view_name: &str) -> Result<Vec<MessageStatusRow>> {
        let sql = format!(
            "SELECT {}::timestamptz, {}::text, {}::text, {}::text, {}::timestamptz, {}::timestamptz, {}::timestamptz, {}::timestamptz FROM {}",
            view::MESSAGE_CREATED_AT,
            view::MASKED_SENDER,
            view::MASKED_ADDRESSEES,
            view::DIRECTION,
            view::SENT_AT,
            view::DELIVERED_AT,
            view::READ_AT,
            view::FAILED_AT,
            qualified(&self.schema, view_name)?,
        );
        let rows = self.client.query(sql.as_str(), &[]).await?;
        let records = rows.iter().map(map_status_row).collect::<Result<Vec<_>>>()?;
        info!(rows = records.len(), view = view_name, "Read report dataset");
        Ok(records)
    }
}

fn map_status_row(row: &Row) -> Result<MessageStatusRow> {
    let direction: Option<String> = row.try_get(3)?;
    Ok(MessageStatusRow {
        message_created_at: row.try_get::<_, Option<DateTime<Utc>>>(0)?,
        masked_sender: row.try_get(1)?,
        masked_addressees: row.try_get(2)?,
        direction: direction.as_deref().and_then(Direction::parse),
        sent_at: row.try_get(4)?,
        delivered_at: row.try_get(5)?,
        read_at: row.try_get(6)?,
        failed_at: row.try_get(7)?,
    })
}

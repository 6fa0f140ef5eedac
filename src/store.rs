//! SQLite result store
//!
//! One append-only `results` table. Every operation opens its own
//! connection, ensures the schema and closes the connection again, so the
//! database file is only held for the duration of a single round trip.

use crate::{
    error::{AppError, Result},
    logging::Logger,
    models::{Measurement, StorageFormat, StoredResult},
    units::format_byte_rate,
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode},
    Connection, Row,
};
use std::path::{Path, PathBuf};

const CREATE_RESULTS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT,
        download,
        upload,
        ping REAL,
        image_result TEXT
    )
"#;

const INSERT_RESULT: &str =
    "INSERT INTO results (date, download, upload, ping, image_result) VALUES (?, ?, ?, ?, ?)";

const SELECT_RECENT: &str = r#"
    SELECT id,
           date,
           CAST(download AS TEXT) AS download,
           CAST(upload AS TEXT) AS upload,
           CAST(ping AS REAL) AS ping,
           image_result
    FROM results
    ORDER BY id DESC
    LIMIT ?
"#;

/// Throughput as written to the `download`/`upload` columns
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    Number(f64),
    Text(String),
}

impl StoredValue {
    pub fn for_rate(bytes_per_sec: f64, format: StorageFormat) -> Self {
        match format {
            StorageFormat::Raw => StoredValue::Number(bytes_per_sec),
            StorageFormat::Human => StoredValue::Text(format_byte_rate(bytes_per_sec)),
        }
    }
}

type SqlResult<T> = std::result::Result<T, sqlx::Error>;

/// Append-only store of measurement results
#[derive(Debug, Clone)]
pub struct ResultStore {
    path: PathBuf,
    format: StorageFormat,
    logger: Logger,
}

impl ResultStore {
    pub fn new(path: impl Into<PathBuf>, format: StorageFormat, logger: Logger) -> Self {
        Self {
            path: path.into(),
            format,
            logger,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> StorageFormat {
        self.format
    }

    async fn connect(&self) -> SqlResult<SqliteConnection> {
        let options = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete);
        SqliteConnection::connect_with(&options).await
    }

    /// Open a connection, run `op`, and close the connection whatever the
    /// outcome of `op`
    async fn with_connection<T, F>(&self, operation: &str, op: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> futures::future::BoxFuture<'c, SqlResult<T>>,
    {
        let mut conn = match self.connect().await {
            Ok(conn) => conn,
            Err(e) => return Err(self.storage_failure(operation, e).await),
        };

        let outcome = op(&mut conn).await;
        let closed = conn.close().await;

        let value = match outcome {
            Ok(value) => value,
            Err(e) => return Err(self.storage_failure(operation, e).await),
        };
        if let Err(e) = closed {
            return Err(self.storage_failure(operation, e).await);
        }
        Ok(value)
    }

    async fn storage_failure(&self, operation: &str, error: sqlx::Error) -> AppError {
        let app_error = AppError::from(error);
        self.logger.error(&format!("Database error during {}: {}", operation, app_error))
            .error_info(&app_error)
            .field("database", self.path.display().to_string())
            .log()
            .await;
        app_error
    }

    /// Append one row for `measurement` and return its id
    pub async fn persist(&self, measurement: &Measurement) -> Result<i64> {
        let date = measurement.date_text();
        let download = StoredValue::for_rate(measurement.download_bps(), self.format);
        let upload = StoredValue::for_rate(measurement.upload_bps(), self.format);
        let ping = measurement.latency_ms();
        let image_result = measurement.share_token().to_string();

        self.logger.debug("Inserting result row")
            .field("database", self.path.display().to_string())
            .field("date", &date)
            .field("download", format!("{:?}", download))
            .field("upload", format!("{:?}", upload))
            .field("ping", ping)
            .field("image_result", &image_result)
            .log()
            .await;

        let id = self.with_connection("insert", move |conn| Box::pin(async move {
            sqlx::query(CREATE_RESULTS_TABLE).execute(&mut *conn).await?;

            let query = sqlx::query(INSERT_RESULT).bind(date);
            let query = match download {
                StoredValue::Number(n) => query.bind(n),
                StoredValue::Text(s) => query.bind(s),
            };
            let query = match upload {
                StoredValue::Number(n) => query.bind(n),
                StoredValue::Text(s) => query.bind(s),
            };
            let result = query.bind(ping).bind(image_result).execute(&mut *conn).await?;

            Ok::<_, sqlx::Error>(result.last_insert_rowid())
        })).await?;

        self.logger.debug("Insert successful").field("id", id).log().await;
        Ok(id)
    }

    /// Most recent rows, newest first
    pub async fn recent(&self, limit: u32) -> Result<Vec<StoredResult>> {
        self.with_connection("history query", move |conn| Box::pin(async move {
            sqlx::query(CREATE_RESULTS_TABLE).execute(&mut *conn).await?;

            let rows = sqlx::query(SELECT_RECENT)
                .bind(i64::from(limit))
                .fetch_all(&mut *conn)
                .await?;

            rows.iter()
                .map(|row| -> SqlResult<StoredResult> {
                    Ok(StoredResult {
                        id: row.try_get("id")?,
                        date: row.try_get::<Option<String>, _>("date")?.unwrap_or_default(),
                        download: row.try_get::<Option<String>, _>("download")?.unwrap_or_default(),
                        upload: row.try_get::<Option<String>, _>("upload")?.unwrap_or_default(),
                        ping: row.try_get::<Option<f64>, _>("ping")?.unwrap_or_default(),
                        image_result: row.try_get::<Option<String>, _>("image_result")?.unwrap_or_default(),
                    })
                })
                .collect::<SqlResult<Vec<_>>>()
        })).await
    }

    /// Number of stored rows
    pub async fn count(&self) -> Result<i64> {
        self.with_connection("count", |conn| Box::pin(async move {
            sqlx::query(CREATE_RESULTS_TABLE).execute(&mut *conn).await?;
            let row = sqlx::query("SELECT COUNT(*) AS n FROM results").fetch_one(&mut *conn).await?;
            row.try_get::<i64, _>("n")
        })).await
    }
}

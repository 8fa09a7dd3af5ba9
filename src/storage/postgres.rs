//! PostgreSQL account store

use super::StorageGateway;
use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::types::anomaly::{AnomalyRecord, RiskLevel};
use crate::types::transaction::{TransactionRecord, TransactionType};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use tracing::{debug, info};

/// sqlx-backed store. Decimal amounts are stored as text.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    accounts_table: String,
    transactions_table: String,
    anomalies_table: String,
}

impl PostgresStore {
    /// Open a connection pool. Table names must already be validated.
    pub async fn connect(config: &StorageConfig) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;

        info!(
            accounts = %config.accounts_table,
            transactions = %config.transactions_table,
            anomalies = %config.anomalies_table,
            "Connected to Postgres"
        );

        Ok(Self {
            pool,
            accounts_table: config.accounts_table.clone(),
            transactions_table: config.transactions_table.clone(),
            anomalies_table: config.anomalies_table.clone(),
        })
    }

    /// Create tables and indexes if they do not exist
    pub async fn init_schema(&self) -> Result<(), StorageError> {
        let statements = [
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {accounts} (
                    account_id TEXT PRIMARY KEY,
                    is_stale BOOLEAN NOT NULL DEFAULT FALSE,
                    created_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
                )
                "#,
                accounts = self.accounts_table
            ),
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {transactions} (
                    transaction_id TEXT PRIMARY KEY,
                    account_id TEXT NOT NULL,
                    amount TEXT NOT NULL,            -- Decimal stored as text
                    transaction_type TEXT NOT NULL,
                    balance_after TEXT NOT NULL,     -- Decimal stored as text
                    timestamp TEXT NOT NULL,         -- RFC 3339, UTC
                    risk_score DOUBLE PRECISION,
                    risk_level TEXT,
                    is_anomaly BOOLEAN
                )
                "#,
                transactions = self.transactions_table
            ),
            recent_index_sql(&self.transactions_table),
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {anomalies} (
                    anomaly_id TEXT PRIMARY KEY,
                    transaction_id TEXT NOT NULL,
                    account_id TEXT NOT NULL,
                    risk_score DOUBLE PRECISION NOT NULL,
                    risk_level TEXT NOT NULL,
                    detected_at TIMESTAMPTZ NOT NULL,
                    model_version TEXT NOT NULL,
                    features JSONB NOT NULL
                )
                "#,
                anomalies = self.anomalies_table
            ),
        ];

        for statement in &statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        info!("Database schema applied successfully");
        Ok(())
    }

    /// Insert or replace an account row
    pub async fn upsert_account(&self, account_id: &str, pending: bool) -> Result<(), StorageError> {
        let sql = format!(
            "INSERT INTO {} (account_id, is_stale) VALUES ($1, $2) \
             ON CONFLICT (account_id) DO UPDATE SET is_stale = EXCLUDED.is_stale",
            self.accounts_table
        );
        sqlx::query(&sql)
            .bind(account_id)
            .bind(pending)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Insert a transaction, ignoring duplicates
    pub async fn insert_transaction(&self, record: &TransactionRecord) -> Result<(), StorageError> {
        let sql = format!(
            "INSERT INTO {} (transaction_id, account_id, amount, transaction_type, balance_after, timestamp) \
             VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (transaction_id) DO NOTHING",
            self.transactions_table
        );
        sqlx::query(&sql)
            .bind(&record.transaction_id)
            .bind(&record.account_id)
            .bind(record.amount.to_string())
            .bind(record.transaction_type.as_str())
            .bind(record.balance_after.to_string())
            .bind(&record.timestamp)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn decode_transaction(row: &PgRow) -> Result<TransactionRecord, StorageError> {
        let amount: String = row.try_get("amount")?;
        let balance_after: String = row.try_get("balance_after")?;
        let transaction_type: String = row.try_get("transaction_type")?;

        Ok(TransactionRecord {
            transaction_id: row.try_get("transaction_id")?,
            account_id: row.try_get("account_id")?,
            amount: parse_decimal(&amount)?,
            transaction_type: TransactionType::parse(&transaction_type),
            balance_after: parse_decimal(&balance_after)?,
            timestamp: row.try_get("timestamp")?,
        })
    }
}

// Timestamps are RFC 3339 UTC text; byte order is chronological order,
// whatever the database's default collation.
fn recent_index_sql(table: &str) -> String {
    format!(
        r#"CREATE INDEX IF NOT EXISTS {table}_account_ts_idx ON {table} (account_id, timestamp COLLATE "C" DESC)"#
    )
}

fn recent_transactions_sql(table: &str) -> String {
    format!(
        r#"SELECT transaction_id, account_id, amount, transaction_type, balance_after, timestamp
           FROM {table} WHERE account_id = $1
           ORDER BY timestamp COLLATE "C" DESC, transaction_id COLLATE "C" DESC LIMIT $2"#
    )
}

fn parse_decimal(value: &str) -> Result<Decimal, StorageError> {
    Decimal::from_str_exact(value.trim()).map_err(|e| StorageError::Decode {
        entity: "decimal",
        reason: format!("{value:?}: {e}"),
    })
}

#[async_trait]
impl StorageGateway for PostgresStore {
    async fn list_accounts_pending_processing(&self) -> Result<Vec<String>, StorageError> {
        let sql = format!(
            "SELECT account_id FROM {} WHERE is_stale = TRUE ORDER BY account_id",
            self.accounts_table
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let accounts = rows
            .iter()
            .map(|row| row.try_get::<String, _>("account_id"))
            .collect::<Result<Vec<_>, _>>()?;

        info!(count = accounts.len(), "Found stale accounts for processing");
        Ok(accounts)
    }

    async fn get_recent_transactions(
        &self,
        account_id: &str,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, StorageError> {
        let sql = recent_transactions_sql(&self.transactions_table);
        let rows = sqlx::query(&sql)
            .bind(account_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        let records = rows
            .iter()
            .map(Self::decode_transaction)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(account_id = %account_id, count = records.len(), "Retrieved transactions");
        Ok(records)
    }

    async fn put_anomaly_record(&self, record: &AnomalyRecord) -> Result<(), StorageError> {
        let sql = format!(
            "INSERT INTO {} (anomaly_id, transaction_id, account_id, risk_score, risk_level, detected_at, model_version, features) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            self.anomalies_table
        );
        sqlx::query(&sql)
            .bind(&record.anomaly_id)
            .bind(&record.transaction_id)
            .bind(&record.account_id)
            .bind(record.risk_score)
            .bind(record.risk_level.as_str())
            .bind(record.detected_at)
            .bind(&record.model_version)
            .bind(Json(&record.features))
            .execute(&self.pool)
            .await?;

        debug!(anomaly_id = %record.anomaly_id, transaction_id = %record.transaction_id, "Anomaly saved");
        Ok(())
    }

    async fn update_transaction_risk(
        &self,
        transaction_id: &str,
        normalized_score: f64,
        risk_level: RiskLevel,
        is_anomaly: bool,
    ) -> Result<(), StorageError> {
        let sql = format!(
            "UPDATE {} SET risk_score = $2, risk_level = $3, is_anomaly = $4 WHERE transaction_id = $1",
            self.transactions_table
        );
        let result = sqlx::query(&sql)
            .bind(transaction_id)
            .bind(normalized_score)
            .bind(risk_level.as_str())
            .bind(is_anomaly)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Database(format!(
                "unknown transaction {transaction_id}"
            )));
        }
        debug!(transaction_id = %transaction_id, risk_score = normalized_score, "Transaction risk updated");
        Ok(())
    }

    async fn clear_pending_processing(&self, account_id: &str) -> Result<(), StorageError> {
        let sql = format!(
            "UPDATE {} SET is_stale = FALSE WHERE account_id = $1",
            self.accounts_table
        );
        sqlx::query(&sql).bind(account_id).execute(&self.pool).await?;
        debug!(account_id = %account_id, "Stale flag cleared");
        Ok(())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

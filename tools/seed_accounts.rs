//! Synthetic Account Seeder
//!
//! Writes synthetic accounts and transactions into the configured Postgres
//! store, marks the accounts pending, and optionally triggers a run over NATS.
//!
//! Usage: seed-accounts [accounts] [transactions_per_account] [anomaly_rate] [trigger]

use account_anomaly_pipeline::{
    config::{AppConfig, StorageBackend},
    storage::PostgresStore,
    types::transaction::{TransactionRecord, TransactionType},
};
use chrono::{Duration, Timelike, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use std::time::Duration as StdDuration;
use tracing::{info, warn};

/// Account history generator
struct AccountGenerator {
    rng: rand::rngs::ThreadRng,
    transaction_counter: u64,
}

impl AccountGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            transaction_counter: 0,
        }
    }

    /// Generate one account's history, oldest first, ending at `end`
    fn generate_history(
        &mut self,
        account_id: &str,
        count: usize,
        anomaly_rate: f64,
        end: chrono::DateTime<Utc>,
    ) -> Vec<TransactionRecord> {
        let mut balance = Decimal::from(self.rng.gen_range(2_000..10_000));
        let mut timestamp = end - Duration::days(30);
        let mut records = Vec::with_capacity(count);

        for _ in 0..count {
            self.transaction_counter += 1;
            let unusual = self.rng.gen_bool(anomaly_rate.clamp(0.0, 1.0));

            let (transaction_type, amount) = if unusual {
                timestamp = (timestamp + Duration::days(1))
                    .with_hour(self.rng.gen_range(1..5))
                    .unwrap_or(timestamp);
                (
                    TransactionType::Withdrawal,
                    Decimal::from(self.rng.gen_range(2_500..9_000)),
                )
            } else {
                timestamp += Duration::minutes(self.rng.gen_range(90..720));
                let transaction_type = self.random_choice(&[
                    TransactionType::Purchase,
                    TransactionType::Purchase,
                    TransactionType::Payment,
                    TransactionType::Deposit,
                    TransactionType::Refund,
                ]);
                let cents = self.rng.gen_range(1_000..25_000);
                (transaction_type, Decimal::new(cents, 2))
            };

            balance = if transaction_type.is_debit() {
                balance - amount
            } else {
                balance + amount
            };

            records.push(TransactionRecord::new(
                format!("txn_{:010}", self.transaction_counter),
                account_id,
                amount,
                transaction_type,
                balance,
                timestamp.to_rfc3339(),
            ));
        }

        records
    }

    fn random_choice(&mut self, choices: &[TransactionType]) -> TransactionType {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("seed_accounts=info".parse()?),
        )
        .init();

    info!("Starting Synthetic Account Seeder");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let accounts: usize = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(10);
    let per_account: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(40);
    let anomaly_rate: f64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(0.05);
    let trigger = args.get(4).map(|s| s == "trigger").unwrap_or(false);

    let config = AppConfig::load()?;
    config.validate()?;

    info!(
        accounts = accounts,
        per_account = per_account,
        anomaly_rate = anomaly_rate,
        trigger = trigger,
        "Configuration loaded"
    );

    let mut generator = AccountGenerator::new();
    let end = Utc::now();
    let histories: Vec<(String, Vec<TransactionRecord>)> = (1..=accounts)
        .map(|n| {
            let account_id = format!("acct_{n:05}");
            let history = generator.generate_history(&account_id, per_account, anomaly_rate, end);
            (account_id, history)
        })
        .collect();

    if config.storage.backend != StorageBackend::Postgres {
        warn!("Storage backend is not postgres; printing a sample instead of seeding");
        if let Some((account_id, history)) = histories.first() {
            for record in history.iter().take(5) {
                info!("Sample transaction for {}:\n{}", account_id, serde_json::to_string_pretty(record)?);
            }
        }
        return Ok(());
    }

    let store = PostgresStore::connect(&config.storage).await?;
    store.init_schema().await?;

    let mut inserted = 0usize;
    for (account_id, history) in &histories {
        store.upsert_account(account_id, true).await?;
        for record in history {
            store.insert_transaction(record).await?;
            inserted += 1;
        }
        info!(account_id = %account_id, transactions = history.len(), "Account seeded");
    }

    info!(
        accounts = histories.len(),
        transactions = inserted,
        "Seeding complete"
    );

    if trigger {
        let client = async_nats::ConnectOptions::new()
            .request_timeout(Some(StdDuration::from_secs(120)))
            .connect(&config.nats.url)
            .await?;
        info!("Connected to NATS at {}", config.nats.url);

        let event = serde_json::json!({
            "source": "liveflow.scheduler",
            "detail-type": "Detect Anomalies",
            "detail": { "processStaleAccounts": true }
        });

        match client
            .request(
                config.nats.trigger_subject.clone(),
                serde_json::to_vec(&event)?.into(),
            )
            .await
        {
            Ok(reply) => {
                info!("Run result:\n{}", String::from_utf8_lossy(&reply.payload));
            }
            Err(e) => warn!(error = %e, "Trigger request failed"),
        }
    }

    Ok(())
}

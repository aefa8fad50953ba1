use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use walletpay::PaymentService;
use walletpay::domain::ports::{LedgerStore, StorageHandle, WalletStore};
use walletpay::domain::wallet::UserId;
use walletpay::error::PaymentError;
use walletpay::infrastructure::in_memory::InMemoryStore;
#[cfg(feature = "storage-rocksdb")]
use walletpay::infrastructure::rocksdb::RocksDbStore;
use walletpay::interfaces::csv::operation_reader::{OpKind, OperationReader, OperationRecord};
use walletpay::interfaces::csv::report_writer::ReportWriter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input operations CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Also dump the ledger after the wallet states
    #[arg(long)]
    ledger: bool,

    /// Reconcile every wallet against the ledger before reporting
    #[arg(long)]
    audit: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let storage = open_storage(cli.db_path.as_deref())?;
    let service = PaymentService::new(storage.clone());

    // Process operations; a failed row is reported and skipped, the run
    // continues.
    let file = File::open(cli.input).into_diagnostic()?;
    let reader = OperationReader::new(file);
    let mut order_labels: HashMap<String, Uuid> = HashMap::new();
    for record in reader.operations() {
        match record {
            Ok(record) => {
                if let Err(e) = apply(&service, &mut order_labels, record).await {
                    eprintln!("Error processing operation: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading operation: {}", e);
            }
        }
    }

    if cli.audit {
        let findings = service.audit().await.into_diagnostic()?;
        if !findings.is_empty() {
            for finding in &findings {
                eprintln!(
                    "audit mismatch for {}: stored {}/{} vs replayed {}/{}",
                    finding.user_id,
                    finding.balance,
                    finding.frozen,
                    finding.replayed_balance,
                    finding.replayed_frozen
                );
            }
            miette::bail!("{} wallet(s) failed reconciliation", findings.len());
        }
    }

    // Output final wallet states.
    let wallets = storage.wallets().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    writer.write_wallets(&wallets).into_diagnostic()?;

    if cli.ledger {
        let entries = storage.entries(None).await.into_diagnostic()?;
        let stdout = io::stdout();
        let mut writer = ReportWriter::new(stdout.lock());
        writer.write_entries(&entries).into_diagnostic()?;
    }

    Ok(())
}

fn open_storage(db_path: Option<&Path>) -> Result<StorageHandle> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = RocksDbStore::open(path).into_diagnostic()?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => miette::bail!("--db-path requires the storage-rocksdb feature"),
        None => Ok(Arc::new(InMemoryStore::new())),
    }
}

/// Applies one script row to the service. Order ids generated by `prepare`
/// are remembered under the row's `order` label so later `confirm`/`cancel`
/// rows can reference them.
async fn apply(
    service: &PaymentService,
    order_labels: &mut HashMap<String, Uuid>,
    record: OperationRecord,
) -> walletpay::Result<()> {
    match record.op {
        OpKind::Buy => {
            let user = require(record.user, "buy requires a user")?;
            let amount = require(record.amount, "buy requires an amount")?;
            service.buy(&UserId::new(user), amount).await?;
        }
        OpKind::Prepare => {
            let user = require(record.user, "prepare requires a user")?;
            let merchant = require(record.merchant, "prepare requires a merchant")?;
            let amount = require(record.amount, "prepare requires an amount")?;
            let order = service
                .prepare(&UserId::new(user), &merchant, amount)
                .await?;
            if let Some(label) = record.order {
                order_labels.insert(label, order.order_id);
            }
        }
        OpKind::Confirm => {
            let order_id = resolve_order(order_labels, record.order)?;
            service.confirm(order_id).await?;
        }
        OpKind::Cancel => {
            let order_id = resolve_order(order_labels, record.order)?;
            service.cancel(order_id).await?;
        }
    }
    Ok(())
}

fn require<T>(value: Option<T>, message: &str) -> walletpay::Result<T> {
    value.ok_or_else(|| PaymentError::InvalidArgument(message.to_string()))
}

fn resolve_order(
    order_labels: &HashMap<String, Uuid>,
    label: Option<String>,
) -> walletpay::Result<Uuid> {
    let label = require(label, "confirm/cancel require an order label")?;
    order_labels
        .get(&label)
        .copied()
        .ok_or_else(|| PaymentError::InvalidArgument(format!("unknown order label {label}")))
}

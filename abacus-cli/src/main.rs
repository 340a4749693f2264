use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use abacus_core::{BillingCycle, SubscriptionDraft, TransactionStore};
use abacus_enrich::{
    DetectionOutcome, EnrichmentClient, ImportOutcome, ImportPhase, ImportPipeline,
    SubscriptionDetector,
};

mod config;
mod review_cmd;
mod store_json;

use store_json::JsonStore;

#[derive(Parser, Debug)]
#[command(
    name = "abacus",
    version,
    about = "Bank statement import, AI enrichment and subscription tracking"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a bank statement XML export
    Import {
        /// Path to the statement file
        file: Option<PathBuf>,
    },

    /// Detect recurring subscriptions among unlinked transactions
    Detect,

    /// Detect, then interactively review and save subscriptions
    Review,

    /// List stored transactions
    Transactions {
        /// Only transactions without a subscription link
        #[arg(long)]
        unlinked: bool,
    },

    /// Manage subscriptions
    Subscriptions {
        #[command(subcommand)]
        command: SubscriptionCommand,
    },

    /// Store the inference credential in ~/.abacus/config.json
    Setup,
}

#[derive(Subcommand, Debug)]
enum SubscriptionCommand {
    List,

    /// Add a subscription directly
    Add {
        #[arg(long)]
        name: String,

        /// Price in major units, e.g. 9.99
        #[arg(long)]
        price: f64,

        /// weekly, monthly or yearly
        #[arg(long)]
        cycle: BillingCycle,

        /// Date of the first payment (defaults to today)
        #[arg(long)]
        since: Option<NaiveDate>,

        #[arg(long)]
        domain: Option<String>,
    },

    /// Remove a subscription; its transactions are unlinked, not deleted
    Remove { id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let store = JsonStore::open(config::store_path()?);

    match cli.command {
        Command::Import { file } => import(&store, file).await,
        Command::Detect => detect(&store).await,
        Command::Review => review(&store).await,
        Command::Transactions { unlinked } => list_transactions(&store, unlinked).await,
        Command::Subscriptions { command } => match command {
            SubscriptionCommand::List => list_subscriptions(&store).await,
            SubscriptionCommand::Add {
                name,
                price,
                cycle,
                since,
                domain,
            } => add_subscription(&store, name, price, cycle, since, domain).await,
            SubscriptionCommand::Remove { id } => remove_subscription(&store, id).await,
        },
        Command::Setup => setup(),
    }
}

async fn import(store: &JsonStore, file: Option<PathBuf>) -> Result<()> {
    let Some(file) = file else {
        println!("No file selected.");
        return Ok(());
    };
    let xml = std::fs::read_to_string(&file)
        .with_context(|| format!("read {}", file.display()))?;

    let client = EnrichmentClient::new(config::read_config()?.backend());
    let pipeline = ImportPipeline::new(store, &client).with_progress(Box::new(|phase| {
        match phase {
            ImportPhase::Fetching => println!("Reading statement..."),
            ImportPhase::Enriching => println!("Analyzing transactions..."),
            ImportPhase::Done => {}
        }
    }));

    match pipeline.run(&xml).await? {
        ImportOutcome::NoTransactionsInFile => {
            println!("No transactions found in {}.", file.display());
        }
        ImportOutcome::NoNewTransactions => {
            println!("No new transactions — this statement was already imported.");
        }
        ImportOutcome::Imported {
            inserted,
            skipped,
            enriched,
        } => {
            println!("Imported {inserted} new transactions ({skipped} entries skipped).");
            if !enriched {
                println!("Enrichment was unavailable; transactions were kept un-enriched.");
            }
        }
    }
    Ok(())
}

async fn detect(store: &JsonStore) -> Result<()> {
    let client = EnrichmentClient::new(config::read_config()?.backend());
    let detector = SubscriptionDetector::new(store, &client);
    match detector.detect().await? {
        DetectionOutcome::NothingToAnalyze => {
            println!("Nothing to analyze — every transaction is already linked.");
        }
        DetectionOutcome::NoCandidates => println!("No subscriptions detected."),
        DetectionOutcome::Candidates(candidates) => {
            println!("Detected {} candidate subscriptions:", candidates.len());
            println!();
            for (index, candidate) in candidates.iter().enumerate() {
                review_cmd::print_candidate(index + 1, candidate, true);
            }
            println!("\nRun `abacus review` to save any of these.");
        }
    }
    Ok(())
}

async fn review(store: &JsonStore) -> Result<()> {
    let client = EnrichmentClient::new(config::read_config()?.backend());
    let detector = SubscriptionDetector::new(store, &client);
    match detector.detect().await? {
        DetectionOutcome::NothingToAnalyze => {
            println!("Nothing to analyze — every transaction is already linked.");
            Ok(())
        }
        DetectionOutcome::NoCandidates => {
            println!("No subscriptions detected.");
            Ok(())
        }
        DetectionOutcome::Candidates(candidates) => review_cmd::run_review(store, candidates).await,
    }
}

async fn list_transactions(store: &JsonStore, unlinked: bool) -> Result<()> {
    let transactions = if unlinked {
        store.unlinked_transactions().await?
    } else {
        store.transactions().await?
    };
    if transactions.is_empty() {
        println!("No transactions stored.");
        return Ok(());
    }
    for transaction in &transactions {
        let category = transaction
            .category
            .map(|c| c.label())
            .unwrap_or("uncategorized");
        let link = transaction
            .subscription_id
            .map(|id| format!("  sub #{id}"))
            .unwrap_or_default();
        println!(
            "{}  {:>12} {}  {}  [{}]{}",
            transaction.date,
            format_cents(transaction.signed_amount),
            transaction.currency,
            transaction.label(),
            category,
            link,
        );
    }
    println!("\n{} transactions.", transactions.len());
    Ok(())
}

async fn list_subscriptions(store: &JsonStore) -> Result<()> {
    let subscriptions = store.subscriptions().await?;
    if subscriptions.is_empty() {
        println!("No subscriptions yet.");
        return Ok(());
    }
    for subscription in &subscriptions {
        let domain = subscription
            .domain
            .as_deref()
            .map(|d| format!("  {d}"))
            .unwrap_or_default();
        println!(
            "#{} {} — {} {}  since {}{}",
            subscription.id,
            subscription.name,
            format_cents(subscription.price),
            subscription.billing_cycle.label(),
            subscription.subscribed_at,
            domain,
        );
    }
    Ok(())
}

async fn add_subscription(
    store: &JsonStore,
    name: String,
    price: f64,
    cycle: BillingCycle,
    since: Option<NaiveDate>,
    domain: Option<String>,
) -> Result<()> {
    if !price.is_finite() || price <= 0.0 {
        bail!("price must be positive");
    }
    let draft = SubscriptionDraft {
        name,
        price: (price * 100.0).round() as i64,
        billing_cycle: cycle,
        subscribed_at: since.unwrap_or_else(|| chrono::Local::now().date_naive()),
        domain,
        transaction_ids: Vec::new(),
    };
    let created = store
        .commit_candidates(&[draft])
        .await
        .context("failed to add subscription")?;
    println!("Added subscription #{} {}.", created[0].id, created[0].name);
    Ok(())
}

async fn remove_subscription(store: &JsonStore, id: i64) -> Result<()> {
    store.remove_subscription(id).await?;
    println!("Removed subscription #{id}; its transactions were unlinked.");
    Ok(())
}

fn setup() -> Result<()> {
    print!("Anthropic API key: ");
    io::stdout().flush()?;
    let mut key = String::new();
    io::stdin().read_line(&mut key)?;
    let key = key.trim();
    if key.is_empty() {
        bail!("no key entered");
    }
    let mut config = config::read_config()?;
    config.api_key = Some(key.to_string());
    config::write_config(&config)?;
    println!("Wrote {}.", config::config_path()?.display());
    Ok(())
}

/// Render minor units as "12.90" (sign included for signed amounts).
pub(crate) fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use stockpile::utils::{logger, validation::Validate};
use stockpile::{AccessPolicy, Dispenser, InventoryStore, LocalStorage, StockError, StockpileConfig};

#[derive(Parser)]
#[command(name = "stockpile")]
#[command(about = "Manage service stock and hand out random records")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "stockpile.toml")]
    config: PathBuf,

    /// Override the storage root from the config
    #[arg(long)]
    root: Option<String>,

    /// Act as this caller (defaults to the configured owner)
    #[arg(long = "as")]
    caller: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show every service and its record count
    Stock {
        #[arg(long)]
        json: bool,
    },
    /// Create an empty service
    Create { service: String },
    /// Delete a service and everything in it
    Delete { service: String },
    /// Print the record count of a service
    Count { service: String },
    /// Add records from a file, inline content, or stdin
    Add {
        service: String,
        #[arg(long, conflicts_with = "content")]
        file: Option<PathBuf>,
        #[arg(long)]
        content: Option<String>,
    },
    /// Withdraw random records
    Generate {
        service: String,
        amount: usize,
        /// Tier memberships of the caller (repeatable)
        #[arg(long = "role")]
        roles: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            eprintln!("💡 Make sure the config file exists and is valid TOML");
            std::process::exit(1);
        }
    };

    // 初始化日誌
    let mut log_options = config.log_options();
    log_options.verbose |= args.verbose;
    if let Err(e) = logger::init_logger(&log_options) {
        eprintln!("⚠️ Logger not initialized: {}", e);
    }
    tracing::debug!("Using storage root: {}", config.storage_root());

    let caller = args
        .caller
        .clone()
        .unwrap_or_else(|| config.policy.owner.clone());
    let dispenser = Dispenser::new(
        InventoryStore::new(LocalStorage::new(config.storage_root())),
        AccessPolicy::new(config.policy.clone()),
    );

    if let Err(e) = run(&dispenser, &caller, args.command).await {
        let code = e.downcast_ref::<StockError>().map_or(1, StockError::exit_code);
        tracing::error!("Command failed: {:#}", e);
        eprintln!("❌ {:#}", e);
        std::process::exit(code);
    }
}

fn load_config(args: &Args) -> anyhow::Result<StockpileConfig> {
    let mut config = StockpileConfig::from_file(&args.config)
        .with_context(|| format!("failed to load config '{}'", args.config.display()))?;

    if let Some(root) = &args.root {
        config.storage.root = root.clone();
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn run(
    dispenser: &Dispenser<LocalStorage>,
    caller: &str,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Stock { json } => {
            let report = dispenser.stock_report().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }
            if report.services.is_empty() {
                println!("No services found");
                return Ok(());
            }
            for entry in &report.services {
                let status = if entry.count > 0 { "🟢" } else { "🔴" };
                println!("{} {:<20} {}", status, entry.service.as_str().to_uppercase(), entry.count);
            }
            println!("Total services: {}", report.services.len());
            println!("Total stock: {}", report.total);
        }
        Command::Create { service } => {
            let name = dispenser.create_service(caller, &service).await?;
            println!("✨ Created service {}", name.as_str().to_uppercase());
        }
        Command::Delete { service } => {
            let removed = dispenser.delete_service(caller, &service).await?;
            println!("🗑️ Deleted {} ({} records removed)", service.to_uppercase(), removed);
        }
        Command::Count { service } => {
            println!("{}", dispenser.store().count_records(&service).await);
        }
        Command::Add {
            service,
            file,
            content,
        } => {
            let block = match (file, content) {
                (Some(path), _) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?,
                (None, Some(content)) => content,
                (None, None) => {
                    let mut buffer = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buffer)
                        .context("failed to read stdin")?;
                    buffer
                }
            };
            let outcome = dispenser.restock(caller, &service, &block).await?;
            println!(
                "✅ Added {} records to {} (total {})",
                outcome.added,
                service.to_uppercase(),
                outcome.total
            );
        }
        Command::Generate {
            service,
            amount,
            roles,
        } => {
            let records = dispenser.generate(caller, roles.as_slice(), &service, amount).await?;
            for record in records {
                println!("{}", record);
            }
        }
    }

    Ok(())
}

//! CLI over the referral queue, the specialty ledger and the scheduled
//! booking passes.
//!
//! The store subcommands work in any build. `run` additionally needs a
//! WebDriver transport: the booking passes drive `autobook::Runner` through
//! a [`autobook::DriverFactory`], which is deployment-specific and linked in
//! by the packaging build.

use std::io::{self, Write as _};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use autobook::{scheduler, Config, DriverFactory, QueueOutcome, Runner, Store};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "autobook")]
#[command(about = "Referral queue administration for the slot autobooker")]
struct Cli {
    /// SQLite database path
    #[arg(long, env = "AUTOBOOK_DB", default_value = "data.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
#[command(rename_all = "snake_case")]
enum Commands {
    /// Run booking passes on a fixed cadence until one gives up
    Run {
        /// Minutes between passes
        #[arg(long, value_name = "MINUTES", default_value_t = 4)]
        every: u64,
    },
    /// Queue a new referral for booking (interactive)
    Add,
    /// Purge opening events older than 30 days
    Del,
    /// List referrals still waiting to be booked
    NeedRecorder,
    /// Dump every referral row as JSON
    AllRecorder,
    /// Force the booked flag for a referral (0 or 1)
    ChgStatus { referral_id: String, status: u8 },
    /// Remove a referral row
    DelRecord { referral_id: String },
    /// Mark a referral's contact as notified
    Ntf { referral_id: String },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let store = Store::open(&cli.db)
        .with_context(|| format!("opening database {}", cli.db.display()))?;

    match cli.command {
        Commands::Run { every } => run_scheduled(store, every),
        Commands::Add => add_referral(&store),
        Commands::Del => {
            let purged = store.purge_old_openings()?;
            info!(purged, "old opening events purged");
            println!("Удалено событий открытия старше 30 дней: {purged}");
            Ok(())
        }
        Commands::NeedRecorder => {
            for (index, referral) in store.pending_referrals()?.iter().enumerate() {
                println!(
                    "{index}. Номер направления: {}.\n Специальность: {}.\n Специфика: {}",
                    referral.referral_id,
                    referral.specialty,
                    referral.specificity.as_deref().unwrap_or("-"),
                );
            }
            Ok(())
        }
        Commands::AllRecorder => {
            let rows = store.all_referrals()?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
            Ok(())
        }
        Commands::ChgStatus {
            referral_id,
            status,
        } => {
            if status > 1 {
                bail!("статус должен быть 0 или 1, передано {status}");
            }
            store.set_booked_flag(&referral_id, status == 1)?;
            info!(referral_id, status, "booked flag forced");
            println!("Статус направления {referral_id} изменён.");
            Ok(())
        }
        Commands::DelRecord { referral_id } => {
            store.delete_referral(&referral_id)?;
            info!(referral_id, "referral deleted");
            println!("Направление {referral_id} удалено.");
            Ok(())
        }
        Commands::Ntf { referral_id } => {
            store.mark_notified(&referral_id)?;
            info!(referral_id, "referral marked notified");
            println!("По направлению {referral_id} статус изменён на «оповещены».");
            Ok(())
        }
    }
}

fn run_scheduled(store: Store, every: u64) -> Result<()> {
    let factory = webdriver_factory()?;
    let config = Config::from_env()?;
    let runner = Arc::new(Runner::new(factory, store, config));

    info!(every, "starting scheduled booking passes");
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(scheduler::run_every(runner, Duration::from_secs(every * 60)))?;
    Ok(())
}

/// The WebDriver transport a deployment links in. This build carries none.
fn webdriver_factory() -> Result<Arc<dyn DriverFactory>> {
    bail!(
        "в этой сборке нет WebDriver-бэкенда: подключите реализацию \
         autobook::DriverFactory и пересоберите"
    )
}

fn add_referral(store: &Store) -> Result<()> {
    let referral_id = prompt("Введите номер направления")?;
    let specialty = prompt("Введите специальность")?;
    let specificity = prompt("Введите специфику (Enter, если нет)")?;
    let note = prompt("Введите кого оповестить после записи")?;

    match store.create_referral(
        &referral_id,
        &specialty,
        none_if_empty(&specificity),
        none_if_empty(&note),
    )? {
        QueueOutcome::Queued => {
            info!(referral_id, specialty, "referral queued");
            println!("Направление {referral_id} добавлено в очередь.");
        }
        QueueOutcome::UnknownSpecialty => println!(
            "Специальность «{specialty}» неизвестна: сначала она должна появиться в таблице специальностей."
        ),
        QueueOutcome::Duplicate => {
            println!("Направление {referral_id} уже есть в очереди.")
        }
    }
    Ok(())
}

fn none_if_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}:\n> ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn init_logging() {
    // Console keeps the operator-facing output; diagnostics go to the log
    // file the same way the scheduled runs log.
    let file = tracing_appender::rolling::never(".", "autobook.log");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(file)
        .with_ansi(false)
        .init();
}

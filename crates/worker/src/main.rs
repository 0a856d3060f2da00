use cadence_core::config::{EngineConfig, Settings};
use cadence_core::engine::{run_pipeline, PipelineOutput};
use cadence_core::ingest::{load_tables, load_target_customers};
use cadence_core::storage;
use cadence_core::storage::lock::WeekLock;
use cadence_core::time::compliance::ComplianceCalendar;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod artifacts;

const DEFAULT_INPUT_DIR: &str = "data";
const DEFAULT_OUTPUT_DIR: &str = "out";
const DEFAULT_TARGETS_FILE: &str = "sample_customer_ids.csv";

#[derive(Debug, Parser)]
#[command(name = "cadence_worker")]
struct Args {
    /// Directory holding clients.csv, customers.csv and messages.csv.
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Where JSON artifacts are written.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// CSV with a `customer_id` column. Defaults to sample_customer_ids.csv in the input dir.
    #[arg(long)]
    targets: Option<PathBuf>,

    #[arg(long)]
    converted_rating: Option<u32>,

    /// Recommendations per customer.
    #[arg(long)]
    per_customer: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// Run the model and log the outcome without writing artifacts or touching the database.
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::from_env();
        if let Some(n) = self.converted_rating {
            config.converted_rating = n;
        }
        if let Some(n) = self.per_customer {
            config.per_customer = n;
        }
        if let Some(n) = self.seed {
            config.training.seed = n;
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let input_dir = args
        .input_dir
        .clone()
        .unwrap_or_else(|| settings.input_dir_or(DEFAULT_INPUT_DIR));
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| settings.output_dir_or(DEFAULT_OUTPUT_DIR));
    let targets_path = args
        .targets
        .clone()
        .unwrap_or_else(|| input_dir.join(DEFAULT_TARGETS_FILE));

    let config = args.engine_config();
    let calendar = ComplianceCalendar::from_env()?;
    let week_start = calendar.week_start();

    let tables = load_tables(&input_dir)?;
    let targets = load_target_customers(&targets_path)?;

    if args.dry_run {
        let output = run_pipeline(&tables, &targets, &config, &calendar)?;
        log_summary(&output, true);
        return Ok(());
    }

    let db = match settings.database_url.as_deref() {
        Some(db_url) => {
            let pool = storage::connect(db_url).await?;
            storage::migrate(&pool).await?;
            match WeekLock::try_acquire(&pool, week_start).await? {
                Some(lock) => Some((pool, lock)),
                None => {
                    tracing::warn!(%week_start, "compliance week locked by another run; skipping");
                    return Ok(());
                }
            }
        }
        None => {
            tracing::info!("DATABASE_URL not set; results are written to disk only");
            None
        }
    };
    let pool = db.as_ref().map(|(pool, _)| pool);

    let result = run_pipeline(&tables, &targets, &config, &calendar)
        .map_err(anyhow::Error::from)
        .and_then(|output| {
            artifacts::write_all(&output_dir, &tables, &output)?;
            Ok(output)
        });

    let outcome = match (result, pool) {
        (Ok(output), Some(pool)) => {
            log_summary(&output, false);
            storage::recommendations::persist_success(pool, &output.run)
                .await
                .map(|_| ())
        }
        (Ok(output), None) => {
            log_summary(&output, false);
            Ok(())
        }
        (Err(err), pool) => {
            sentry_anyhow::capture_anyhow(&err);
            if let Some(pool) = pool {
                match storage::recommendations::persist_failure(
                    pool,
                    week_start,
                    chrono::Utc::now(),
                    &format!("{:#}", err),
                )
                .await
                {
                    Ok(run_id) => {
                        tracing::error!(%week_start, %run_id, error = %err, "recommendation run failed")
                    }
                    Err(persist_err) => {
                        tracing::error!(error = %persist_err, "failed to record run failure")
                    }
                }
            }
            Err(err)
        }
    };

    if let Some((pool, lock)) = db {
        if let Err(err) = lock.release(&pool).await {
            tracing::warn!(error = %err, "failed to release compliance week lock");
        }
    }
    outcome
}

fn log_summary(output: &PipelineOutput, dry_run: bool) {
    let run = &output.run;
    tracing::info!(
        run_id = %run.run_id,
        week_start = %run.week_start,
        dry_run,
        customers = run.customers.len(),
        omitted = run.omissions.len(),
        trained_ratings = run.trained_ratings,
        held_out_ratings = run.held_out_ratings,
        rmse = ?run.rmse,
        "recommendation run finished"
    );
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

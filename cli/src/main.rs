use std::sync::Arc;

use anyhow::Result;
use anyhow::bail;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use leadscout_backend_client::BackendClient;
use leadscout_backend_client::ClientOptions;
use leadscout_core::HuntOutcome;
use leadscout_core::HuntPhase;
use leadscout_core::JobTracker;
use leadscout_core::SessionConfig;
use leadscout_core::SessionHost;
use leadscout_core::TerminationMode;
use leadscout_core::TrackerConfig;
use leadscout_protocol::SearchContext;
use leadscout_protocol::Tier;

/// Discover and qualify sales leads through the streaming backend.
#[derive(Debug, clap::Parser)]
#[command(name = "leadscout", version)]
struct Cli {
    /// Base URL of the backend.
    #[arg(long, env = "LEADSCOUT_BASE_URL", default_value = "http://127.0.0.1:8080")]
    base_url: String,

    /// Bearer token. Without one, requests fail locally before being sent.
    #[arg(long, env = "LEADSCOUT_API_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Run one hunt end to end: discovery, then streaming qualification.
    Hunt(HuntArgs),

    /// Rebuild a finished run from durable storage, without streaming.
    Resume {
        /// Durable run id assigned by the backend.
        run_id: String,
    },

    /// Launch a batch enrichment job over lead ids and follow it live.
    Enrich {
        /// Enrichment action, e.g. `find_email`.
        #[arg(long)]
        action: String,

        /// Lead ids to enrich.
        #[arg(required = true)]
        targets: Vec<String>,
    },

    /// One-shot status of an enrichment job.
    Status {
        job_id: String,
    },
}

#[derive(Debug, clap::Args)]
struct HuntArgs {
    #[arg(long)]
    industry: String,

    #[arg(long)]
    location: String,

    /// What you are selling; sharpens qualification.
    #[arg(long)]
    offering: Option<String>,

    /// Extra qualification criteria in free text.
    #[arg(long)]
    notes: Option<String>,

    /// Fail instead of completing quietly when the stream closes without
    /// a terminal event.
    #[arg(long)]
    strict: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut options = ClientOptions::new(cli.base_url);
    if let Some(token) = cli.token {
        options = options.with_bearer_token(token);
    }
    let client = BackendClient::new(options)?;

    match cli.command {
        Command::Hunt(args) => hunt(client, args).await,
        Command::Resume { run_id } => resume(client, &run_id).await,
        Command::Enrich { action, targets } => enrich(client, action, targets).await,
        Command::Status { job_id } => status(client, &job_id).await,
    }
}

async fn hunt(client: BackendClient, args: HuntArgs) -> Result<()> {
    let config = SessionConfig {
        termination: if args.strict {
            TerminationMode::Strict
        } else {
            TerminationMode::Lenient
        },
    };
    let host = Arc::new(SessionHost::new(client, config));
    let context = SearchContext {
        industry: args.industry,
        location: args.location,
        offering: args.offering,
        notes: args.notes,
    };

    eprintln!("searching...");
    let candidates = host.launch_search(context, Vec::new()).await?;
    eprintln!("found {} candidates, qualifying...", candidates.len());

    let printer = spawn_progress_printer(&host);
    let outcome = host.launch_pipeline().await;
    printer.abort();
    match outcome? {
        HuntOutcome::Completed => {}
        HuntOutcome::Cancelled => bail!("pipeline was cancelled"),
    }

    print_run(&host);
    Ok(())
}

async fn resume(client: BackendClient, run_id: &str) -> Result<()> {
    let host = SessionHost::new(client, SessionConfig::default());
    host.resume(run_id).await?;
    print_run(&host);
    Ok(())
}

async fn enrich(client: BackendClient, action: String, targets: Vec<String>) -> Result<()> {
    let tracker = JobTracker::new(client, TrackerConfig::default());
    let job_id = tracker.start_batch(targets, action).await?;
    eprintln!("job {job_id} started");
    tracker.track(&job_id).await?;

    let Some(job) = tracker.job(&job_id).await else {
        bail!("job {job_id} vanished from the tracker");
    };
    println!(
        "{}: {:?} {}/{} processed ({} succeeded, {} failed)",
        job.id, job.status, job.processed, job.total, job.succeeded, job.failed
    );
    if let Some(error) = job.last_error {
        println!("error: {error}");
    }
    Ok(())
}

async fn status(client: BackendClient, job_id: &str) -> Result<()> {
    let snapshot = client.job_status(job_id).await?;
    println!(
        "{}: {:?} {}/{} processed ({} succeeded, {} failed)",
        snapshot.id,
        snapshot.status,
        snapshot.processed,
        snapshot.total,
        snapshot.succeeded,
        snapshot.failed
    );
    Ok(())
}

fn spawn_progress_printer(host: &Arc<SessionHost>) -> tokio::task::JoinHandle<()> {
    let mut watcher = host.subscribe();
    tokio::spawn(async move {
        while watcher.changed().await.is_ok() {
            let (progress, results) = {
                let run = watcher.borrow_and_update();
                (run.progress.clone(), run.results.len())
            };
            if let Some(progress) = progress {
                let stage = progress.phase.unwrap_or_else(|| "working".to_string());
                eprintln!(
                    "[{}/{}] {stage} ({results} results so far)",
                    progress.index + 1,
                    progress.total
                );
            }
        }
    })
}

fn print_run(host: &SessionHost) {
    let run = host.snapshot();
    debug_assert_eq!(run.phase, HuntPhase::Complete);
    for lead in &run.results {
        let tier = match lead.tier {
            Tier::Hot => "HOT",
            Tier::Review => "REVIEW",
            Tier::Rejected => "REJECTED",
            Tier::Failed => "FAILED",
        };
        let website = lead.candidate.website.as_deref().unwrap_or("-");
        println!("{tier:<8} {:<32} {website}", lead.candidate.name);
    }
    println!(
        "summary: {} hot, {} review, {} rejected, {} failed",
        run.summary.hot, run.summary.review, run.summary.rejected, run.summary.failed
    );
    if let Some(id) = &run.external_id {
        println!("saved as run {id}");
    }
}

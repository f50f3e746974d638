//! Fanout CLI - run one query against many candidates in parallel.

mod output;

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use futures_util::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fanout_agent_sdk::{
    CandidateRecord, DiscoveryService, HttpAgentClient, HttpDiscoveryClient, StaticDiscovery,
};
use fanout_orchestrator::{Orchestrator, OrchestratorConfig, RunRequest, StreamEndPolicy};

use output::ProgressPrinter;

/// Fanout CLI - parallel agent search
#[derive(Parser)]
#[command(name = "fanout")]
#[command(about = "Dispatch one browsing agent per candidate and collect the results", long_about = None)]
struct Cli {
    /// Discovery service endpoint
    #[arg(long, global = true)]
    discovery_url: Option<String>,

    /// Agent service endpoint
    #[arg(long, global = true, default_value = "http://127.0.0.1:8080/tasks")]
    agent_url: String,

    /// Bearer token sent to both services
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Fixed candidate as NAME=URL; skips remote discovery (repeatable)
    #[arg(long = "candidate", global = true, value_parser = parse_candidate)]
    candidates: Vec<CandidateRecord>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a search and stream progress until every candidate is done
    Search {
        /// The query to check against each candidate
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Per-candidate timeout in seconds
        #[arg(long, default_value = "300")]
        timeout_secs: u64,

        /// Goal template; {query}, {name} and {url} are substituted
        #[arg(long)]
        goal: Option<String>,

        /// What to do when an agent stream ends without a result
        #[arg(long, value_enum, default_value = "fail")]
        on_stream_end: OnStreamEnd,

        /// Maximum number of candidates to dispatch
        #[arg(long, default_value = "8")]
        max_candidates: usize,

        /// Print the final snapshot and summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the candidates discovery returns, without dispatching agents
    Discover {
        /// The query to discover candidates for
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OnStreamEnd {
    /// Mark the task failed
    Fail,
    /// Complete the task with a fallback result
    Fallback,
}

impl From<OnStreamEnd> for StreamEndPolicy {
    fn from(value: OnStreamEnd) -> Self {
        match value {
            OnStreamEnd::Fail => StreamEndPolicy::Fail,
            OnStreamEnd::Fallback => StreamEndPolicy::CompleteWithFallback,
        }
    }
}

fn parse_candidate(value: &str) -> Result<CandidateRecord, String> {
    let (name, url) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=URL, got '{}'", value))?;
    let (name, url) = (name.trim(), url.trim());
    if name.is_empty() || url.is_empty() {
        return Err(format!("expected NAME=URL, got '{}'", value));
    }
    Ok(CandidateRecord::new(name, url))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is for results
    let default_directive = if cli.verbose { "fanout=debug" } else { "fanout=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(default_directive.parse()?))
        .with_writer(std::io::stderr)
        .init();

    let discovery = build_discovery(&cli)?;

    match cli.command {
        Commands::Search {
            query,
            timeout_secs,
            goal,
            on_stream_end,
            max_candidates,
            json,
        } => {
            let config = OrchestratorConfig {
                task_timeout: Duration::from_secs(timeout_secs),
                stream_end: on_stream_end.into(),
                max_candidates,
                ..OrchestratorConfig::default()
            };
            let mut agent = HttpAgentClient::new(&cli.agent_url);
            if let Some(key) = &cli.api_key {
                agent = agent.with_api_key(key.clone());
            }

            let mut request = RunRequest::new(query.join(" "));
            if let Some(goal) = goal {
                request = request.with_goal_template(goal);
            }

            let orchestrator = Orchestrator::new(discovery, Arc::new(agent), config);
            search(orchestrator, request, json).await?;
        }
        Commands::Discover { query } => {
            discover(discovery.as_ref(), &query.join(" ")).await?;
        }
    }

    Ok(())
}

fn build_discovery(cli: &Cli) -> Result<Arc<dyn DiscoveryService>, Box<dyn std::error::Error>> {
    if !cli.candidates.is_empty() {
        return Ok(Arc::new(StaticDiscovery::new(cli.candidates.clone())));
    }

    let url = cli
        .discovery_url
        .as_deref()
        .ok_or("either --discovery-url or at least one --candidate is required")?;
    let mut client = HttpDiscoveryClient::new(url);
    if let Some(key) = &cli.api_key {
        client = client.with_api_key(key.clone());
    }
    Ok(Arc::new(client))
}

async fn search(
    orchestrator: Orchestrator,
    request: RunRequest,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let handle = orchestrator.start_run_with(request).await?;
    info!(
        run_id = %handle.run_id(),
        query = %handle.query(),
        candidates = handle.candidates().len(),
        "Run started"
    );

    let mut printer = ProgressPrinter::new(!json);
    let mut updates = Box::pin(orchestrator.observe(&handle));
    let mut interrupted = false;

    loop {
        tokio::select! {
            next = updates.next() => match next {
                Some(snapshot) => printer.show(&snapshot),
                None => break,
            },
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                if let Err(e) = signal {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                    continue;
                }
                warn!("Interrupted, cancelling run");
                orchestrator.cancel_run(&handle);
            }
        }
    }

    let snapshot = handle.wait_finished().await;
    if json {
        println!("{}", output::render_json(&snapshot)?);
    } else {
        output::print_summary(&snapshot);
    }

    Ok(())
}

async fn discover(
    discovery: &dyn DiscoveryService,
    query: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let records = discovery.discover(query).await?;

    println!("Candidates ({}):", records.len());
    println!("{:<4}  {:<32}  {}", "#", "NAME", "URL");
    println!("{}", "-".repeat(80));

    for (index, record) in records.iter().enumerate() {
        println!("{:<4}  {:<32}  {}", index, record.name, record.url);
    }

    Ok(())
}

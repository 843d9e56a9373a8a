use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use ci_lite::api::{ErrorResponse, JobRequest, JobResponse, ListJobsResponse, WaitResponse};
use ci_lite::config::{MonitorConfig, PipelineConfig, ServerConfig};
use ci_lite::server::Server;
use ci_lite::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "ci-lite")]
#[command(version)]
#[command(about = "A minimal in-memory CI job runner")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the CI server
    Server(ServerArgs),

    /// Job management commands
    Job {
        #[command(flatten)]
        client: ClientArgs,

        #[command(subcommand)]
        command: JobCommands,
    },
}

// =============================================================================
// Server Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct ServerArgs {
    /// Port to listen on
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Directory in which per-job working directories are created
    /// (defaults to the system temp dir)
    #[arg(long)]
    work_root: Option<PathBuf>,

    /// How often /api/wait polls job state, in milliseconds
    #[arg(long, default_value = "100")]
    poll_interval_ms: u64,

    /// How long /api/wait waits for a first job, in seconds
    #[arg(long, default_value = "30")]
    arrival_window_secs: u64,

    /// How long /api/wait waits for jobs to finish, in seconds
    #[arg(long, default_value = "300")]
    drain_window_secs: u64,
}

// =============================================================================
// Client Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct ClientArgs {
    /// Server address
    #[arg(long, short = 'a', default_value = "http://127.0.0.1:8080")]
    addr: String,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(clap::Subcommand, Debug)]
enum JobCommands {
    /// Submit a new job
    Submit {
        /// Repository to clone (URL or local path)
        repo_uri: String,
        /// Commit, branch or tag to check out
        commit: String,
        /// The command to execute (e.g., "make test")
        command: String,
    },
    /// Get status of a specific job
    Status {
        job_id: String,
    },
    /// Print a job's log
    Logs {
        job_id: String,
    },
    /// List all job IDs
    List,
    /// Block until every job has finished
    Wait,
}

// =============================================================================
// Server Implementation
// =============================================================================

async fn run_server(args: ServerArgs) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let listen_addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;

    let mut pipeline = PipelineConfig::default();
    if let Some(root) = args.work_root {
        tokio::fs::create_dir_all(&root).await?;
        pipeline = pipeline.with_work_root(root);
    }

    let monitor = MonitorConfig::default()
        .with_poll_interval(Duration::from_millis(args.poll_interval_ms.max(1)))
        .with_arrival_window(Duration::from_secs(args.arrival_window_secs))
        .with_drain_window(Duration::from_secs(args.drain_window_secs));

    let config = ServerConfig::new(listen_addr)
        .with_pipeline(pipeline)
        .with_monitor(monitor);

    tracing::info!(
        listen_addr = %config.listen_addr,
        work_root = ?config.pipeline.work_root,
        poll_interval = ?config.monitor.poll_interval,
        arrival_window = ?config.monitor.arrival_window,
        drain_window = ?config.monitor.drain_window,
        "Starting ci-lite server"
    );

    let shutdown = install_shutdown_handler()?;
    Server::new(config).run(shutdown).await?;

    Ok(())
}

// =============================================================================
// Client Command Handlers
// =============================================================================

fn endpoint(client_args: &ClientArgs, path: &str) -> String {
    format!("{}{}", client_args.addr.trim_end_matches('/'), path)
}

/// Decode a JSON body, exiting with the server's error message on a non-2xx
/// response.
async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, Box<dyn std::error::Error>> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }
    let message = match response.json::<ErrorResponse>().await {
        Ok(body) => body.error,
        Err(_) => status.to_string(),
    };
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn handle_job_submit(
    http: &reqwest::Client,
    client_args: &ClientArgs,
    request: JobRequest,
) -> Result<(), Box<dyn std::error::Error>> {
    let response = http
        .post(endpoint(client_args, "/api/jobs"))
        .json(&request)
        .send()
        .await?;
    let job: JobResponse = decode(response).await?;

    match client_args.output {
        OutputFormat::Json => print_json(&job)?,
        OutputFormat::Table => {
            println!("Job submitted successfully!");
            println!("Job ID: {}", job.id);
        }
    }
    Ok(())
}

async fn handle_job_status(
    http: &reqwest::Client,
    client_args: &ClientArgs,
    job_id: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let response = http
        .get(endpoint(client_args, &format!("/api/jobs/{}", job_id)))
        .send()
        .await?;
    let job: JobResponse = decode(response).await?;

    match client_args.output {
        OutputFormat::Json => print_json(&job)?,
        OutputFormat::Table => {
            println!("Job ID:   {}", job.id);
            println!("Status:   {}", job.status);
            if !job.repo_uri.is_empty() {
                println!("Repo:     {}", job.repo_uri);
                println!("Commit:   {}", job.commit);
                println!("Command:  {}", job.command);
            }
        }
    }
    Ok(())
}

async fn handle_job_logs(
    http: &reqwest::Client,
    client_args: &ClientArgs,
    job_id: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let response = http
        .get(endpoint(client_args, &format!("/api/jobs/{}/logs", job_id)))
        .send()
        .await?;
    let job: JobResponse = decode(response).await?;

    match client_args.output {
        OutputFormat::Json => print_json(&job)?,
        OutputFormat::Table => {
            for line in &job.logs {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

async fn handle_job_list(
    http: &reqwest::Client,
    client_args: &ClientArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let response = http.get(endpoint(client_args, "/api/jobs")).send().await?;
    let list: ListJobsResponse = decode(response).await?;

    match client_args.output {
        OutputFormat::Json => print_json(&list)?,
        OutputFormat::Table => {
            if list.jobs.is_empty() {
                println!("No jobs found.");
            } else {
                for id in &list.jobs {
                    println!("{}", id);
                }
                println!();
                println!("{} jobs", list.jobs.len());
            }
        }
    }
    Ok(())
}

async fn handle_job_wait(
    http: &reqwest::Client,
    client_args: &ClientArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    // 504 carries the timeout outcome, so read the body regardless of status
    let response = http.get(endpoint(client_args, "/api/wait")).send().await?;
    let wait: WaitResponse = response.json().await?;

    match client_args.output {
        OutputFormat::Json => print_json(&wait)?,
        OutputFormat::Table => println!("Outcome: {}", wait.outcome),
    }

    if wait.outcome != "all-succeeded" && wait.outcome != "no-jobs" {
        std::process::exit(1);
    }
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Commands::Server(server_args) => {
            run_server(server_args).await?;
        }
        Commands::Job { client, command } => {
            let http = reqwest::Client::new();

            match command {
                JobCommands::Submit {
                    repo_uri,
                    commit,
                    command,
                } => {
                    let request = JobRequest {
                        repo_uri,
                        commit,
                        command,
                    };
                    handle_job_submit(&http, &client, request).await?;
                }
                JobCommands::Status { job_id } => {
                    handle_job_status(&http, &client, job_id).await?;
                }
                JobCommands::Logs { job_id } => {
                    handle_job_logs(&http, &client, job_id).await?;
                }
                JobCommands::List => {
                    handle_job_list(&http, &client).await?;
                }
                JobCommands::Wait => {
                    handle_job_wait(&http, &client).await?;
                }
            }
        }
    }

    Ok(())
}

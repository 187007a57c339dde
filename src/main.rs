//! CLI entry point for `attachscope`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};

use attachscope::cluster::{self, RetryOutcome, RetryPlan};
use attachscope::config::Config;
use attachscope::model::attachment::Attachment;
use attachscope::processors::{self, Pipeline};
use attachscope::store::elastic::ElasticClient;

#[derive(Parser)]
#[command(
    name = "attachscope",
    version,
    about = "Enrich email attachments and manage the sample store"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Elasticsearch client host
    #[arg(short = 'c', long = "client-host", global = true, env = "ATTACHSCOPE_ES_HOST")]
    client_host: Option<String>,

    /// Max retry for maintenance actions
    #[arg(short = 'm', long = "max-retry", global = true)]
    max_retry: Option<u32>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Update the number of replicas
    Replicas {
        /// Number of replicas
        #[arg(short = 'n', long = "nr-replicas", default_value_t = 0)]
        nr_replicas: u32,
        /// Comma-separated list of index names; `_all` or empty for every index
        #[arg(short = 'i', long = "index", default_value = "_all")]
        index: String,
    },
    /// Update or add an index template
    Template {
        /// Path of the template file
        #[arg(short = 'p', long = "template-path")]
        template_path: PathBuf,
        /// Template name
        #[arg(short = 'n', long = "template-name")]
        template_name: String,
    },
    /// Save a sample payload stored in Elasticsearch
    GetPayload {
        /// Comma-separated list of index names; `_all` or empty for every index
        #[arg(short = 'i', long = "index", default_value = "_all")]
        index: String,
        /// Sample hash (md5, sha1, sha256 or sha512)
        #[arg(short = 'a', long = "hash-value")]
        hash_value: String,
        /// Output file
        #[arg(short = 'f', long = "file-output")]
        file_output: PathBuf,
    },
    /// Run the configured processors over a JSON array of attachments
    Enrich {
        /// Attachments file (JSON array)
        #[arg(short = 'a', long = "attachments")]
        attachments: PathBuf,
        /// Write the enriched attachments here instead of stdout
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The real subscriber depends on the config, so config loading reports
    // through a temporary stderr one.
    let bootstrap = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let config = tracing::subscriber::with_default(bootstrap, || {
        attachscope::config::load_config(cli.config.as_deref())
    })?;

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let host = cli
        .client_host
        .clone()
        .unwrap_or_else(|| config.elasticsearch.host.clone());
    let plan = RetryPlan::new(cli.max_retry.unwrap_or(config.elasticsearch.max_retry))
        .with_deadline(config.elasticsearch.retry_deadline());

    match cli.command {
        Commands::Replicas { nr_replicas, index } => {
            cmd_replicas(&host, &config, &plan, &index, nr_replicas)
        }
        Commands::Template {
            template_path,
            template_name,
        } => cmd_template(&host, &config, &plan, &template_path, &template_name),
        Commands::GetPayload {
            index,
            hash_value,
            file_output,
        } => cmd_get_payload(&host, &config, &index, &hash_value, &file_output),
        Commands::Enrich {
            attachments,
            output,
        } => cmd_enrich(&config, &attachments, output.as_deref()),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = attachscope::config::log_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "attachscope.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn connect(host: &str, config: &Config) -> anyhow::Result<ElasticClient> {
    ElasticClient::new(host, config.elasticsearch.timeout())
        .with_context(|| format!("Could not create Elasticsearch client for '{host}'"))
}

/// Update the replica count, retrying while the cluster is unavailable.
fn cmd_replicas(
    host: &str,
    config: &Config,
    plan: &RetryPlan,
    index: &str,
    nr_replicas: u32,
) -> anyhow::Result<()> {
    let client = connect(host, config)?;
    let outcome = cluster::update_replicas(&client, index, nr_replicas, plan, &mut thread_sleep)?;
    report_outcome("replicas", &outcome);
    Ok(())
}

/// Upsert an index template, retrying while the cluster is unavailable.
fn cmd_template(
    host: &str,
    config: &Config,
    plan: &RetryPlan,
    template_path: &Path,
    template_name: &str,
) -> anyhow::Result<()> {
    let client = connect(host, config)?;
    let outcome = cluster::update_template(
        &client,
        template_path,
        template_name,
        plan,
        &mut thread_sleep,
    )?;
    report_outcome("template", &outcome);
    Ok(())
}

/// Save a stored sample to disk.
fn cmd_get_payload(
    host: &str,
    config: &Config,
    index: &str,
    hash_value: &str,
    file_output: &Path,
) -> anyhow::Result<()> {
    use humansize::{format_size, BINARY};

    let client = connect(host, config)?;
    let sample = attachscope::export::retrieve_payload(&client, index, hash_value, file_output)?;

    println!();
    println!(
        "  {:<15} {}",
        "Filename",
        sample.filename.as_deref().unwrap_or("-")
    );
    println!("  {:<15} {}", "Content-Type", sample.content_type);
    println!("  {:<15} {}", "sha256", sample.sha256);
    println!("  {:<15} {}", "Size", format_size(sample.size, BINARY));
    println!("  {:<15} {}", "Saved to", sample.path.display());
    println!();
    Ok(())
}

/// Enrich a batch of attachments and print or save the result.
fn cmd_enrich(config: &Config, input: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Could not read {}", input.display()))?;
    let mut attachments: Vec<Attachment> = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a JSON array of attachments", input.display()))?;

    let registry = processors::build_registry(&config.processors, config.elasticsearch.timeout())?;
    if registry.is_empty() {
        eprintln!("  No processor is enabled; attachments are passed through unchanged");
    }
    let report = Pipeline::new(&registry).run(&config.processors, &mut attachments)?;

    for (name, reason) in &report.failed {
        eprintln!("  Processor {name} failed: {reason}");
    }

    let json = serde_json::to_string_pretty(&attachments)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Could not write {}", path.display()))?;
            eprintln!(
                "  Enriched {} attachment(s) with {} processor(s), saved to {}",
                attachments.len(),
                report.completed.len(),
                path.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn report_outcome(what: &str, outcome: &RetryOutcome<()>) {
    if let RetryOutcome::Exhausted { attempts } = outcome {
        eprintln!("  Updating {what} gave up after {attempts} attempt(s)");
    }
}

fn thread_sleep(wait: Duration) {
    std::thread::sleep(wait);
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "attachscope", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

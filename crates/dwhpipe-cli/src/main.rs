use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dwhpipe_cloud::AwsProvider;
use dwhpipe_core::{Config, Credentials, DEFAULT_CONFIG_FILE};
use dwhpipe_engine::{
    host_configured, recreate_tables, resolve_host, resolve_role_arn, role_arn_configured,
    EtlPipeline, ProvisionReport, Provisioner, Providers, RoleCreation, RunSummary, Step,
    TeardownReport,
};
use dwhpipe_warehouse::{ConnectionSettings, PostgresSession, SqlSession};

/// dwhpipe - Redshift cluster provisioning and star-schema ETL
#[derive(Parser)]
#[command(name = "dwhpipe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: dwhpipe.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the IAM role and cluster, wait for it, open the port
    Cluster {
        /// Delete the cluster and role instead
        #[arg(long)]
        delete: bool,
    },

    /// Describe the cluster once
    Status,

    /// Drop and recreate the staging and star-schema tables
    CreateTables,

    /// Load staging tables from S3, then populate the star schema
    Etl,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A missing .env is fine; credentials may come from the environment
    dotenvy::dotenv().ok();

    init_tracing(cli.verbose);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = load_config(&config_path)?;

    match cli.command {
        Commands::Cluster { delete: false } => cluster_command(&config).await,
        Commands::Cluster { delete: true } => teardown_command(&config).await,
        Commands::Status => status_command(&config).await,
        Commands::CreateTables => create_tables_command(&config).await,
        Commands::Etl => etl_command(&config).await,
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "Config not found at {}. Pass --config or create {}.",
            path.display(),
            DEFAULT_CONFIG_FILE
        ));
    }
    let config = Config::from_file(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    tracing::debug!(path = %path.display(), cluster_id = %config.cluster.identifier, "Config loaded");
    Ok(config)
}

/// Provider-backed provisioner; reads credentials from the environment
async fn aws_provisioner(config: &Config) -> Result<Provisioner> {
    let credentials = Credentials::from_env().context("AWS credentials are required")?;
    let provider = AwsProvider::connect(&credentials, config.aws.region.clone()).await;
    Ok(Provisioner::new(config, Providers::from_provider(provider)))
}

/// Open a session to the warehouse at `host`
async fn connect(config: &Config, host: &str) -> Result<PostgresSession> {
    let settings = ConnectionSettings::from_config(&config.database, host);
    let mut session = PostgresSession::connect(&settings)
        .await
        .with_context(|| format!("Failed to connect to {}", settings.target()))?;
    session.test_connection().await?;
    tracing::info!(warehouse = %settings.target(), backend = session.name(), "Connected to warehouse");
    Ok(session)
}

/// Host from config, or from the provider when it is missing
async fn warehouse_host(config: &Config, provisioner: Option<&Provisioner>) -> Result<String> {
    match provisioner {
        Some(provisioner) => Ok(resolve_host(config, provisioner.cluster()).await?),
        None => config
            .database
            .host
            .clone()
            .context("database.host is not set"),
    }
}

async fn cluster_command(config: &Config) -> Result<()> {
    let provisioner = aws_provisioner(config).await?;
    let report = provisioner.provision().await?;
    print_provision_report(config, &report);

    if !report.is_ready() {
        return Err(anyhow::anyhow!(
            "Cluster {} did not become available",
            config.cluster.identifier
        ));
    }
    Ok(())
}

async fn teardown_command(config: &Config) -> Result<()> {
    let provisioner = aws_provisioner(config).await?;
    let report = provisioner.teardown().await;
    print_teardown_report(config, &report);
    Ok(())
}

async fn status_command(config: &Config) -> Result<()> {
    let provisioner = aws_provisioner(config).await?;
    let description = provisioner.cluster().describe().await?;

    println!("{}", "Cluster Status".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!("  {} {}", "Identifier:".bold(), config.cluster.identifier);

    let Some(description) = description else {
        println!("  {} {}", "Status:".bold(), "not found".yellow());
        return Ok(());
    };

    println!("  {} {}", "Status:".bold(), status_colored(description.status.as_str()));
    if let Some(node_type) = &description.node_type {
        println!("  {} {}", "Node type:".bold(), node_type);
    }
    if let Some(nodes) = description.number_of_nodes {
        println!("  {} {}", "Nodes:".bold(), nodes);
    }
    match &description.endpoint {
        Some(endpoint) => println!("  {} {}", "Endpoint:".bold(), endpoint),
        None => println!("  {} {}", "Endpoint:".bold(), "-".dimmed()),
    }
    if let Some(vpc_id) = &description.vpc_id {
        println!("  {} {}", "VPC:".bold(), vpc_id);
    }
    for role in &description.iam_roles {
        println!("  {} {}", "IAM role:".bold(), role);
    }
    Ok(())
}

async fn create_tables_command(config: &Config) -> Result<()> {
    let provisioner = if host_configured(config) {
        None
    } else {
        Some(aws_provisioner(config).await?)
    };
    let host = warehouse_host(config, provisioner.as_ref()).await?;

    let mut session = connect(config, &host).await?;
    let summaries = recreate_tables(&mut session).await?;
    print_run_summaries("Tables recreated", &summaries);
    Ok(())
}

async fn etl_command(config: &Config) -> Result<()> {
    let provisioner = if host_configured(config) && role_arn_configured(config) {
        None
    } else {
        Some(aws_provisioner(config).await?)
    };

    let host = warehouse_host(config, provisioner.as_ref()).await?;
    let role_arn = match &provisioner {
        Some(provisioner) => resolve_role_arn(config, provisioner.roles()).await?,
        None => config
            .iam_role
            .arn
            .clone()
            .context("iam_role.arn is not set")?,
    };

    let pipeline = EtlPipeline::new(config, &role_arn)?;
    let mut session = connect(config, &host).await?;
    let summaries = pipeline.run(&mut session).await?;
    print_run_summaries("ETL complete", &summaries);
    Ok(())
}

fn status_colored(status: &str) -> colored::ColoredString {
    match status {
        "available" => status.green(),
        "creating" | "deleting" | "modifying" | "rebooting" => status.yellow(),
        _ => status.red(),
    }
}

fn step_colored(step: &Step) -> colored::ColoredString {
    match step {
        Step::Done => "done".green(),
        Step::AlreadyExists => "already exists".yellow(),
        Step::Skipped => "skipped".dimmed(),
        Step::Failed(e) => format!("failed: {}", e).red(),
    }
}

fn print_provision_report(config: &Config, report: &ProvisionReport) {
    println!();
    println!("{}", "Provisioning Summary".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());

    let role = match &report.role.creation {
        RoleCreation::Created => "created".green(),
        RoleCreation::CreatedWithoutPolicy(e) => format!("created, policy not attached: {}", e).yellow(),
        RoleCreation::AlreadyExists => "already exists".yellow(),
        RoleCreation::Failed(e) => format!("create failed, reused: {}", e).yellow(),
    };
    println!("  {} {} ({})", "IAM role:".bold(), config.cluster.iam_role_name, role);
    println!("  {} {}", "Role ARN:".bold(), report.role.arn);
    println!("  {} {}", "Create cluster:".bold(), step_colored(&report.create));
    println!(
        "  {} {} after {} polls",
        "Status:".bold(),
        report
            .last_status
            .as_ref()
            .map(|s| status_colored(s.as_str()))
            .unwrap_or_else(|| "not found".red()),
        report.attempts
    );

    match &report.cluster {
        Some(cluster) => {
            if let Some(endpoint) = &cluster.endpoint {
                println!("  {} {}", "Endpoint:".bold(), endpoint);
            }
            match &report.ingress {
                Some(step) => println!("  {} {}", "Ingress:".bold(), step_colored(step)),
                None => println!("  {} {}", "Ingress:".bold(), "not attempted".dimmed()),
            }
            println!();
            println!("{}", "✓ Cluster is available".green().bold());
        }
        None => {
            println!();
            println!("{}", "✗ Could not connect to cluster".red().bold());
        }
    }
}

fn print_teardown_report(config: &Config, report: &TeardownReport) {
    println!();
    println!("{}", "Teardown Summary".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!("  {} {}", "Delete cluster:".bold(), step_colored(&report.delete));
    println!(
        "  {} {} after {} polls",
        "Cluster gone:".bold(),
        if report.deleted { "yes".green() } else { "no".red() },
        report.attempts
    );
    println!("  {} {}", "Detach policy:".bold(), step_colored(&report.role.detach));
    println!(
        "  {} {} ({})",
        "Delete role:".bold(),
        config.cluster.iam_role_name,
        step_colored(&report.role.delete)
    );
    println!("  {} {}", "Ingress rule:".bold(), "left in place".dimmed());
}

fn print_run_summaries(title: &str, summaries: &[RunSummary]) {
    println!();
    println!("{}", title.bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    for summary in summaries {
        println!(
            "  {} {:<10} {} statements in {:.1}s",
            "✓".green(),
            summary.stage,
            summary.executed,
            summary.elapsed.as_secs_f64()
        );
    }
}

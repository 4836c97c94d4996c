//! Responder CLI
//!
//! Runs the alert remediation server, checks directives against the safety
//! gate offline, and sends sample alerts to a running server.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use responder::{
    substitute_placeholders, ClusterClient, KubeClusterClient, OllamaClient, Pipeline,
    RemediationAction, ResponderConfig, SafetyGate, SafetyVerdict, ServerState, UnavailableCluster,
};

/// Multi-agent alert remediation orchestrator
#[derive(Parser)]
#[command(name = "responder")]
#[command(about = "Multi-agent alert remediation orchestrator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON config file
    #[arg(long, global = true, env = "RESPONDER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook server
    Server {
        /// Address to listen on (overrides config)
        #[arg(long)]
        addr: Option<String>,
    },
    /// Evaluate a directive line against the safety gate without executing it
    CheckDirective {
        /// Directive text, e.g. "RESTART DEPLOYMENT frontend IN online-boutique"
        line: String,

        /// Workload substituted for `<name>` placeholders
        #[arg(long)]
        workload: Option<String>,
    },
    /// Post a sample alert to a running server
    TestAlert {
        /// Alert name
        #[arg(long, default_value = "HighLatency")]
        name: String,

        /// Namespace label
        #[arg(long, default_value = "online-boutique")]
        namespace: String,

        /// Deployment label
        #[arg(long, default_value = "cartservice")]
        deployment: String,

        /// Summary annotation
        #[arg(long, default_value = "p99 latency above 2s")]
        summary: String,

        /// Server address
        #[arg(long, default_value = "127.0.0.1:8000")]
        addr: String,
    },
}

fn init_tracing(verbose: bool, json_logs: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("responder=debug,tower_http=debug")
        } else {
            EnvFilter::new("responder=info,tower_http=info")
        }
    });

    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let config = ResponderConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Server { addr } => run_server_command(config, addr).await,
        Commands::CheckDirective { line, workload } => {
            run_check_directive(&config, &line, workload.as_deref());
            Ok(())
        }
        Commands::TestAlert {
            name,
            namespace,
            deployment,
            summary,
            addr,
        } => run_test_alert(&name, &namespace, &deployment, &summary, &addr).await,
    }
}

/// Run the webhook server.
async fn run_server_command(mut config: ResponderConfig, addr: Option<String>) -> Result<()> {
    if let Some(addr) = addr {
        config.listen_addr = addr;
    }

    println!("{}", "═".repeat(60).cyan());
    println!("{}", "RESPONDER ALERT REMEDIATION SERVER".cyan().bold());
    println!("{}", "═".repeat(60).cyan());
    println!();
    println!("  Address:     {}", config.listen_addr.green());
    println!("  Inference:   {}", config.inference.url.green());
    println!("  Model:       {}", config.inference.model.cyan());
    println!(
        "  Namespaces:  {}",
        config.safety.allowed_namespaces.join(", ").green()
    );
    println!(
        "  Runbooks:    {}",
        config.storage.runbooks_dir.display().to_string().green()
    );
    println!(
        "  Post-mortems: {}",
        config.storage.post_mortems_dir.display().to_string().green()
    );

    let cluster: Arc<dyn ClusterClient> = match KubeClusterClient::try_default().await {
        Ok(client) => {
            println!("  Cluster:     {}", "connected".green());
            Arc::new(client)
        }
        Err(e) => {
            println!("  Cluster:     {}", "unavailable".red());
            Arc::new(UnavailableCluster::new(e.to_string()))
        }
    };
    println!();

    let inference = Arc::new(OllamaClient::new(&config.inference));
    let pipeline = Pipeline::new(&config, inference, cluster);
    let state = Arc::new(ServerState::new(pipeline));

    println!(
        "{}",
        format!("Starting server on {}...", config.listen_addr).cyan()
    );
    responder::run_server(state, &config.listen_addr).await
}

/// Print the safety verdict and parsed action for one directive line.
fn run_check_directive(config: &ResponderConfig, line: &str, workload: Option<&str>) {
    let gate = SafetyGate::new(&config.safety);
    let directive = substitute_placeholders(line, workload);
    let action = RemediationAction::parse(&directive);
    let mut verdict = gate.evaluate(&directive);
    if let Some(target) = action.target() {
        if verdict.is_allowed() && !gate.allows_namespace(&target.namespace) {
            verdict = SafetyVerdict::NamespaceNotAllowed;
        }
    }

    println!("  Directive: {}", directive.cyan());
    if verdict.is_allowed() {
        println!("  Verdict:   {}", "ALLOWED".green().bold());
        println!("  Action:    {}", action.to_string().green());
    } else {
        println!("  Verdict:   {}", "BLOCKED".red().bold());
        println!("  Reason:    {}", verdict.reason().yellow());
    }
}

/// Send a one-alert Alertmanager batch to a running server.
async fn run_test_alert(
    name: &str,
    namespace: &str,
    deployment: &str,
    summary: &str,
    addr: &str,
) -> Result<()> {
    let payload = json!({
        "receiver": "responder",
        "status": "firing",
        "alerts": [{
            "status": "firing",
            "labels": {
                "alertname": name,
                "namespace": namespace,
                "deployment": deployment,
                "severity": "critical",
            },
            "annotations": {
                "summary": summary,
                "description": format!("{name} firing for {deployment} in {namespace}"),
            },
            "startsAt": chrono::Utc::now().to_rfc3339(),
        }],
    });

    let url = format!("http://{addr}/webhook");
    let response = reqwest::Client::new()
        .post(&url)
        .json(&payload)
        .send()
        .await
        .with_context(|| format!("Failed to reach {url}"))?;

    let status = response.status();
    let body = response.text().await.context("Failed to read response")?;

    if status.is_success() {
        println!("{} {} {}", "✓".green(), status.as_u16(), body);
    } else {
        println!("{} {} {}", "✗".red(), status.as_u16(), body);
        anyhow::bail!("server rejected test alert with {status}");
    }

    Ok(())
}

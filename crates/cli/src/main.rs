use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing::info;

use stackup_ops::dataplane::{DeploymentOpts, DeploymentReport};
use stackup_ops::{cancel_channel, ObjectReport, OpsConfig, ProgressSink, UpgradeOps};
use stackup_store::KubeStore;

#[derive(Parser, Debug)]
#[command(name = "stackupctl", version, about = "OpenStack-on-Kubernetes minor-update helper")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Kubernetes namespace (default: "openstack", or STACKUP_NAMESPACE)
    #[arg(long = "ns", global = true)]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the OpenStackVersion: versions and condition readiness
    Status {
        /// CR name (default: first OpenStackVersion in the namespace)
        #[arg(long)]
        name: Option<String>,
    },
    /// Patch spec.targetVersion to start a minor update
    SetTarget {
        /// Version to set, e.g. "18.0.3"
        version: String,
        /// JSON object patched into spec.customContainerImages
        #[arg(long = "images")]
        images: Option<String>,
    },
    /// Poll the OpenStackVersion until a condition turns True
    Wait {
        /// Condition type, e.g. "MinorUpdateControlplane"
        condition: String,
        /// CR name (default: first OpenStackVersion in the namespace)
        #[arg(long)]
        name: Option<String>,
        /// Overall timeout in seconds
        #[arg(long, default_value_t = 600)]
        timeout: i64,
        /// Seconds between polls
        #[arg(long = "poll-interval", default_value_t = 5)]
        poll_interval: i64,
    },
    /// Decide which step of the update procedure to resume from
    ResumeStep {
        /// CR name (default: first OpenStackVersion in the namespace)
        #[arg(long)]
        name: Option<String>,
    },
    /// Show the OpenStackControlPlane spec and status
    Controlplane {
        /// CR name (default: first OpenStackControlPlane in the namespace)
        #[arg(long)]
        name: Option<String>,
    },
    /// Check that every controlplane condition is True
    VerifyControlplane {
        /// CR name (default: first OpenStackControlPlane in the namespace)
        #[arg(long)]
        name: Option<String>,
    },
    /// List OpenStackDataplaneNodeSets
    Nodesets,
    /// Check that every nodeset condition is True
    VerifyNodesets,
    /// List OpenStackDataplaneDeployments
    Deployments,
    /// Show one OpenStackDataplaneDeployment
    Deployment {
        /// Deployment name; dots are replaced with dashes
        name: String,
    },
    /// Create an OpenStackDataplaneDeployment
    Deploy {
        /// Deployment name; dots are replaced with dashes
        name: String,
        /// Nodeset to target; repeat for several (default: every nodeset in the namespace)
        #[arg(long = "nodeset")]
        nodesets: Vec<String>,
        /// Service to run; repeat for several
        #[arg(long = "service")]
        services: Vec<String>,
        /// Full JSON spec; overrides --nodeset and --service
        #[arg(long = "spec")]
        spec: Option<String>,
    },
    /// Create a deployment running the ovn service on every nodeset (step 5)
    DeployOvn {
        /// Deployment name; dots are replaced with dashes
        name: String,
    },
    /// Create a deployment running the update service on every nodeset (step 8)
    DeployUpdate {
        /// Deployment name; dots are replaced with dashes
        name: String,
    },
}

fn init_tracing() {
    let env = std::env::var("STACKUP_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("STACKUP_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid STACKUP_METRICS_ADDR; expected host:port");
        }
    }
}

/// Progress lines go to stderr so stdout stays parseable.
struct StderrSink;

impl ProgressSink for StderrSink {
    fn notify(&self, message: &str) {
        eprintln!("{}", message);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let ns = cli.namespace.as_deref();

    let store = Arc::new(KubeStore::connect().await?);
    let ops = UpgradeOps::with_sink(store, OpsConfig::from_env(), Arc::new(StderrSink));

    match cli.command {
        Commands::Status { name } => {
            info!(ns = ?ns, name = ?name, "status invoked");
            let report = ops.version_status(ns, name.as_deref()).await?;
            match cli.output {
                Output::Human => {
                    println!("name:             {}", report.name);
                    println!("namespace:        {}", report.namespace);
                    println!("targetVersion:    {}", report.target_version);
                    println!("availableVersion: {}", opt(&report.available_version));
                    println!("deployedVersion:  {}", opt(&report.deployed_version));
                    println!("ready:            {}", join(&report.ready_conditions));
                    println!("notReady:         {}", join(&report.not_ready_conditions));
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            }
        }
        Commands::SetTarget { version, images } => {
            info!(ns = ?ns, version = %version, "set-target invoked");
            let images = match images.as_deref() {
                Some(raw) => Some(serde_json::from_str::<Value>(raw)?),
                None => None,
            };
            let report = ops.set_target_version(ns, &version, images.as_ref()).await?;
            match cli.output {
                Output::Human => println!(
                    "targetVersion on '{}/{}' set to '{}'",
                    report.namespace, report.name, report.spec.target_version
                ),
                Output::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            }
        }
        Commands::Wait { condition, name, timeout, poll_interval } => {
            info!(ns = ?ns, condition = %condition, timeout, poll_interval, "wait invoked");
            let (handle, signal) = cancel_channel();
            let ctrlc = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    handle.cancel();
                }
            });
            let result = ops
                .wait_for_condition(ns, name.as_deref(), &condition, timeout, poll_interval, signal)
                .await;
            ctrlc.abort();
            let report = result?;
            match cli.output {
                Output::Human => println!(
                    "condition '{}' on '{}/{}': met={} reason={} message={}",
                    report.condition,
                    report.namespace,
                    report.name,
                    report.outcome.met,
                    report.outcome.reason,
                    report.outcome.message
                ),
                Output::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            }
            if !report.outcome.met {
                std::process::exit(1);
            }
        }
        Commands::ResumeStep { name } => {
            info!(ns = ?ns, name = ?name, "resume-step invoked");
            let report = ops.resume_step(ns, name.as_deref()).await?;
            match cli.output {
                Output::Human => {
                    println!("resume at step {}", report.resume_step);
                    println!("{}", report.explanation);
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            }
        }
        Commands::Controlplane { name } => {
            info!(ns = ?ns, name = ?name, "controlplane invoked");
            let report = ops.controlplane_status(ns, name.as_deref()).await?;
            print_object(&report, cli.output)?;
        }
        Commands::VerifyControlplane { name } => {
            info!(ns = ?ns, name = ?name, "verify-controlplane invoked");
            let verdict = ops.verify_controlplane(ns, name.as_deref()).await?;
            match cli.output {
                Output::Human => {
                    println!(
                        "allReady: {} ({} of {} conditions ready)",
                        verdict.all_ready,
                        verdict.ready_conditions.len(),
                        verdict.total_conditions
                    );
                    for c in &verdict.not_ready_conditions {
                        println!("  {} {} (reason: {}) {}", c.type_, c.status, c.reason, c.message);
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&verdict)?),
            }
        }
        Commands::Nodesets => {
            info!(ns = ?ns, "nodesets invoked");
            let reports = ops.list_nodesets(ns).await?;
            let empty = format!(
                "No OpenStackDataplaneNodeSets found in namespace '{}'",
                effective_ns(ns, ops.config())
            );
            print_objects(&reports, cli.output, &empty)?;
        }
        Commands::VerifyNodesets => {
            info!(ns = ?ns, "verify-nodesets invoked");
            let verdict = ops.verify_nodesets(ns).await?;
            match cli.output {
                Output::Human => {
                    println!(
                        "allReady: {} ({} of {} nodesets ready)",
                        verdict.all_ready,
                        verdict.ready_node_sets.len(),
                        verdict.total_node_sets
                    );
                    for nodeset in &verdict.not_ready_node_sets {
                        println!("  {}:", nodeset.name);
                        for c in &nodeset.not_ready_conditions {
                            println!(
                                "    {} {} (reason: {}) {}",
                                c.type_, c.status, c.reason, c.message
                            );
                        }
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&verdict)?),
            }
        }
        Commands::Deployments => {
            info!(ns = ?ns, "deployments invoked");
            let reports = ops.list_deployments(ns).await?;
            let empty = format!(
                "No OpenStackDataplaneDeployments found in namespace '{}'",
                effective_ns(ns, ops.config())
            );
            print_objects(&reports, cli.output, &empty)?;
        }
        Commands::Deployment { name } => {
            info!(ns = ?ns, name = %name, "deployment invoked");
            let report = ops.deployment_status(ns, &name).await?;
            print_object(&report, cli.output)?;
        }
        Commands::Deploy { name, nodesets, services, spec } => {
            info!(ns = ?ns, name = %name, "deploy invoked");
            let opts = DeploymentOpts {
                node_sets: if nodesets.is_empty() { None } else { Some(nodesets) },
                services_override: if services.is_empty() { None } else { Some(services) },
                spec: match spec.as_deref() {
                    Some(raw) => Some(serde_json::from_str(raw)?),
                    None => None,
                },
            };
            let report = ops.create_deployment(ns, &name, opts).await?;
            print_deployment(&report, cli.output)?;
        }
        Commands::DeployOvn { name } => {
            info!(ns = ?ns, name = %name, "deploy-ovn invoked");
            let report = ops.create_ovn_deployment(ns, &name).await?;
            print_deployment(&report, cli.output)?;
        }
        Commands::DeployUpdate { name } => {
            info!(ns = ?ns, name = %name, "deploy-update invoked");
            let report = ops.create_update_deployment(ns, &name).await?;
            print_deployment(&report, cli.output)?;
        }
    }

    Ok(())
}

fn opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

fn join(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

fn effective_ns<'a>(ns: Option<&'a str>, cfg: &'a OpsConfig) -> &'a str {
    match ns {
        Some(s) if !s.is_empty() => s,
        _ => &cfg.default_namespace,
    }
}

fn print_object(report: &ObjectReport, output: Output) -> Result<()> {
    match output {
        Output::Human => {
            println!("name:      {}", report.name);
            println!("namespace: {}", report.namespace);
            if let Some(spec) = &report.spec {
                println!("spec:\n{}", serde_json::to_string_pretty(spec)?);
            }
            if let Some(status) = &report.status {
                println!("status:\n{}", serde_json::to_string_pretty(status)?);
            }
        }
        Output::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}

fn print_objects(reports: &[ObjectReport], output: Output, empty: &str) -> Result<()> {
    match output {
        Output::Human => {
            if reports.is_empty() {
                println!("{}", empty);
            } else {
                println!("{:<12} {}", "NAMESPACE", "NAME");
                for r in reports {
                    println!("{:<12} {}", r.namespace, r.name);
                }
            }
        }
        Output::Json => println!("{}", serde_json::to_string_pretty(reports)?),
    }
    Ok(())
}

fn print_deployment(report: &DeploymentReport, output: Output) -> Result<()> {
    match output {
        Output::Human => {
            println!(
                "Successfully created OpenStackDataplaneDeployment '{}' in namespace '{}' with spec:",
                report.name, report.namespace
            );
            println!("{}", serde_json::to_string_pretty(&report.spec)?);
        }
        Output::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}

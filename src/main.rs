// src/main.rs

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use conary_facet::backend::{SqliteConsumerRegistry, SqliteTaskQueue, TaskStatus};
use conary_facet::db;
use conary_facet::db::models::{
    ContentFacet, ContentView, ErrataStatus, Host, HostStatus, LifecycleEnvironment, StatusKind,
    TraceStatus,
};
use conary_facet::{BindingContext, FacetConfig, facet, search};
use rusqlite::Connection;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

#[derive(Parser)]
#[command(name = "conary-facet")]
#[command(author, version, about = "Host content facet: repository binding and errata applicability", long_about = None)]
struct Cli {
    /// Configuration file (default: /etc/conary/facet.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the facet database
    Init {
        /// Database path (overrides the configuration)
        #[arg(short, long)]
        db_path: Option<String>,
    },
    /// Show a host's content facet
    Show {
        /// Host name
        host: String,
        #[arg(short, long)]
        db_path: Option<String>,
    },
    /// Search hosts, e.g. `installable_errata = RHSA-2024:0001`
    Search {
        /// Query: field = value [and field = value ...]
        query: String,
        #[arg(short, long)]
        db_path: Option<String>,
    },
    /// Bind a host to the repositories at the given paths
    Bind {
        /// Host name
        host: String,
        /// Repository paths, e.g. /pulp/repos/ACME/Library/rhel_6; none clears
        paths: Vec<String>,
        #[arg(short, long)]
        db_path: Option<String>,
    },
    /// List queued background tasks
    Tasks {
        /// Only tasks with this status (queued, running, completed, failed)
        #[arg(short, long)]
        status: Option<String>,
        #[arg(short, long)]
        db_path: Option<String>,
    },
    /// Run queued background tasks until the queue is empty
    Work {
        #[arg(short, long)]
        db_path: Option<String>,
    },
    /// Record a host status
    Status {
        /// Host name
        host: String,
        /// Status kind (errata, trace)
        kind: String,
        /// Status value, e.g. security_needed or reboot_needed
        value: String,
        #[arg(short, long)]
        db_path: Option<String>,
    },
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = FacetConfig::load(cli.config.as_deref())?;
    let resolve_db = |db_path: Option<String>| db_path.unwrap_or_else(|| config.database.path.clone());

    match cli.command {
        Some(Commands::Init { db_path }) => {
            let db_path = resolve_db(db_path);
            info!("Initializing facet database at: {}", db_path);
            db::init(&db_path)?;
            println!("Database initialized successfully at: {}", db_path);
            Ok(())
        }
        Some(Commands::Show { host, db_path }) => {
            let conn = db::open(&resolve_db(db_path))?;
            cmd_show(&conn, &host, &config)
        }
        Some(Commands::Search { query, db_path }) => {
            let conn = db::open(&resolve_db(db_path))?;
            let hosts = search::search_hosts(&conn, &query, &config.agent.package_name)?;
            if hosts.is_empty() {
                println!("No hosts match.");
            }
            for host in hosts {
                println!("{}", host.name);
            }
            Ok(())
        }
        Some(Commands::Bind {
            host,
            paths,
            db_path,
        }) => {
            let db_path = resolve_db(db_path);
            let mut conn = db::open(&db_path)?;
            let facet = find_facet(&conn, &host)?;
            let dispatcher = SqliteTaskQueue::open(&db_path)?;
            let registry = SqliteConsumerRegistry::open(&db_path)?;
            let ctx = BindingContext {
                dispatcher: &dispatcher,
                registry: &registry,
                path_prefixes: &config.binding.path_prefixes,
            };

            let change = facet.update_repositories_by_paths(&mut conn, paths.as_slice(), &ctx)?;
            if change.changed() {
                println!(
                    "Updated bindings for {}: {} added, {} removed",
                    host,
                    change.added.len(),
                    change.removed.len()
                );
            } else {
                println!("Bindings for {} unchanged", host);
            }
            Ok(())
        }
        Some(Commands::Tasks { status, db_path }) => {
            let status = status
                .map(|s| TaskStatus::from_str(&s).with_context(|| format!("unknown task status '{s}'")))
                .transpose()?;
            let queue = SqliteTaskQueue::open(&resolve_db(db_path))?;
            let tasks = queue.list(status)?;
            if tasks.is_empty() {
                println!("No tasks.");
            }
            for task in tasks {
                let hosts: Vec<String> = task.hosts.iter().map(|h| h.host_id.to_string()).collect();
                println!(
                    "{}  {:<22} {:<9} {}  hosts: {}",
                    task.id,
                    task.kind,
                    task.status,
                    task.created_at,
                    hosts.join(", ")
                );
            }
            Ok(())
        }
        Some(Commands::Work { db_path }) => {
            let db_path = resolve_db(db_path);
            let conn = db::open(&db_path)?;
            let queue = SqliteTaskQueue::open(&db_path)?;
            let ran = queue.drain(|task| facet::run_task(&conn, task))?;
            println!("Ran {} task(s)", ran);
            Ok(())
        }
        Some(Commands::Status {
            host,
            kind,
            value,
            db_path,
        }) => {
            let conn = db::open(&resolve_db(db_path))?;
            let host_id = find_host(&conn, &host)?;
            let kind = StatusKind::from_str(&kind).with_context(|| format!("unknown status kind '{kind}'"))?;
            match kind {
                StatusKind::Errata => {
                    let status = ErrataStatus::from_str(&value)
                        .with_context(|| format!("unknown errata status '{value}'"))?;
                    HostStatus::set_errata(&conn, host_id, status)?;
                }
                StatusKind::Trace => {
                    let status = TraceStatus::from_str(&value)
                        .with_context(|| format!("unknown trace status '{value}'"))?;
                    HostStatus::set_trace(&conn, host_id, status)?;
                }
            }
            println!("Recorded {} status '{}' for {}", kind, value, host);
            Ok(())
        }
        None => {
            println!("Conary content facet v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'conary-facet --help' for usage information");
            Ok(())
        }
    }
}

fn find_host(conn: &Connection, name: &str) -> Result<i64> {
    let host = Host::find_by_name(conn, name)?.with_context(|| format!("host '{name}' not found"))?;
    host.id.with_context(|| format!("host '{name}' has no id"))
}

fn find_facet(conn: &Connection, name: &str) -> Result<ContentFacet> {
    let host_id = find_host(conn, name)?;
    match ContentFacet::find_by_host(conn, host_id)? {
        Some(facet) => Ok(facet),
        None => bail!("host '{name}' has no content facet"),
    }
}

fn cmd_show(conn: &Connection, name: &str, config: &FacetConfig) -> Result<()> {
    let facet = find_facet(conn, name)?;

    let view = ContentView::find_by_id(conn, facet.content_view_id)?
        .map(|v| v.name)
        .unwrap_or_else(|| facet.content_view_id.to_string());
    let environment = LifecycleEnvironment::find_by_id(conn, facet.lifecycle_environment_id)?
        .map(|e| e.name)
        .unwrap_or_else(|| facet.lifecycle_environment_id.to_string());
    let version = facet
        .content_view_version(conn)?
        .map(|v| v.to_string())
        .unwrap_or_else(|| "not promoted".to_string());

    println!("Host: {}", name);
    println!("  Content view: {} (version {})", view, version);
    println!("  Lifecycle environment: {}", environment);
    if let Some(uuid) = &facet.uuid {
        println!("  Consumer: {}", uuid);
    }

    let repos = facet.bound_repositories(conn)?;
    println!("  Bound repositories: {}", repos.len());
    for repo in &repos {
        println!("    {} ({})", repo.name, repo.relative_path);
    }
    if facet.regeneration_pending(conn)? {
        println!("  Applicability regeneration: not yet queued");
    }

    println!(
        "  Errata: {} applicable, {} installable",
        facet.applicable_errata(conn)?.len(),
        facet.installable_errata(conn)?.len()
    );
    println!(
        "  Packages: {} applicable, {} installable, {} upgradable",
        facet.applicable_rpms(conn)?.len(),
        facet.installable_rpms(conn)?.len(),
        facet.upgradable_rpms(conn)?.len()
    );
    println!("  Errata status: {}", HostStatus::errata(conn, facet.host_id)?);
    match HostStatus::trace(conn, facet.host_id)? {
        Some(trace) => println!("  Trace status: {}", trace),
        None => println!("  Trace status: not reported"),
    }
    println!(
        "  Agent installed: {}",
        facet.agent_installed(conn, &config.agent.package_name)?
    );
    Ok(())
}

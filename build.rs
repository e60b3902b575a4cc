// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: database path
fn db_path_arg() -> Arg {
    Arg::new("db_path")
        .short('d')
        .long("db-path")
        .value_name("PATH")
        .help("Database path (overrides the configuration)")
}

/// Common argument: host name
fn host_arg() -> Arg {
    Arg::new("host").required(true).help("Host name")
}

fn build_cli() -> Command {
    Command::new("conary-facet")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Conary Contributors")
        .about("Host content facet: repository binding and errata applicability")
        .subcommand_required(false)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .global(true)
                .help("Configuration file (default: /etc/conary/facet.toml)"),
        )
        .subcommand(
            Command::new("init")
                .about("Initialize the facet database")
                .arg(db_path_arg()),
        )
        .subcommand(
            Command::new("show")
                .about("Show a host's content facet")
                .arg(host_arg())
                .arg(db_path_arg()),
        )
        .subcommand(
            Command::new("search")
                .about("Search hosts, e.g. `installable_errata = RHSA-2024:0001`")
                .arg(
                    Arg::new("query")
                        .required(true)
                        .help("Query: field = value [and field = value ...]"),
                )
                .arg(db_path_arg()),
        )
        .subcommand(
            Command::new("bind")
                .about("Bind a host to the repositories at the given paths")
                .arg(host_arg())
                .arg(
                    Arg::new("paths")
                        .num_args(0..)
                        .help("Repository paths, e.g. /pulp/repos/ACME/Library/rhel_6; none clears"),
                )
                .arg(db_path_arg()),
        )
        .subcommand(
            Command::new("tasks")
                .about("List queued background tasks")
                .arg(
                    Arg::new("status")
                        .short('s')
                        .long("status")
                        .value_parser(["queued", "running", "completed", "failed"])
                        .help("Only tasks with this status"),
                )
                .arg(db_path_arg()),
        )
        .subcommand(
            Command::new("work")
                .about("Run queued background tasks until the queue is empty")
                .arg(db_path_arg()),
        )
        .subcommand(
            Command::new("status")
                .about("Record a host status")
                .arg(host_arg())
                .arg(
                    Arg::new("kind")
                        .required(true)
                        .value_parser(["errata", "trace"])
                        .help("Status kind"),
                )
                .arg(
                    Arg::new("value")
                        .required(true)
                        .help("Status value, e.g. security_needed or reboot_needed"),
                )
                .arg(db_path_arg()),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("conary-facet.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}

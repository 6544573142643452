//! stackdeck - Entry Point
//!
//! Headless shell around the project session: select a build context,
//! refresh container state, start and stop services. The card UI sits on
//! top of the same session API; this binary prints the cards as text.

use std::collections::HashMap;
use std::env;

use stackdeck::errors::DeckError;
use stackdeck::logs::{init_logging, LogOptions};
use stackdeck::naming::service_container_name;
use stackdeck::session::ProjectSession;
use stackdeck::utils::version_info;

use tracing::error;

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        println!("{}", serde_json::to_string_pretty(&version_info()).unwrap());
        return;
    }

    // Initialize logging
    let log_options = LogOptions {
        log_level: cli_args
            .get("log-level")
            .and_then(|level| level.parse().ok())
            .unwrap_or_default(),
        ..Default::default()
    };
    if let Err(e) = init_logging(log_options) {
        println!("Failed to initialize logging: {e}");
    }

    let Some(project_dir) = cli_args.get("project") else {
        eprintln!("Usage: stackdeck --project=<build-context-dir> [--generate | --up=<service> | --stop=<service>]");
        return;
    };

    if let Err(e) = run(project_dir, &cli_args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(project_dir: &str, cli_args: &HashMap<String, String>) -> Result<(), DeckError> {
    // Generate-only mode leaves the runtime alone
    if cli_args.contains_key("generate") {
        let session = ProjectSession::load(project_dir).await?;
        session.regenerate_compose().await?;
        println!(
            "Generated {}",
            session.build_context().compose_file().path().display()
        );
        return Ok(());
    }

    let mut session = ProjectSession::open(project_dir).await?;

    if let Some(service_name) = cli_args.get("up") {
        let container = service_container_name(session.build_context().root(), service_name);
        session.start_service(&container).await?;
    } else if let Some(service_name) = cli_args.get("stop") {
        let container = service_container_name(session.build_context().root(), service_name);
        session.stop_service(&container).await?;
    }

    print_cards(&mut session);
    Ok(())
}

fn print_cards(session: &mut ProjectSession) {
    let desktop_apps: Option<Vec<String>> = session
        .model()
        .desktop_apps
        .as_ref()
        .map(|desktop| desktop.host_machine.apps.keys().cloned().collect());
    if let Some(apps) = desktop_apps {
        println!("host machine");
        for app_name in apps {
            let status = session.desktop_procs().status_label(&app_name);
            println!("  app {:<24} {}", app_name, status);
        }
    }

    for snapshot in session.snapshots() {
        let id = if snapshot.id.is_empty() { "-" } else { &snapshot.id };
        let mut ports: Vec<String> = snapshot
            .ports
            .iter()
            .map(|(container, host)| format!("{}->{}", container, host))
            .collect();
        ports.sort();
        println!(
            "{:<32} {:<12} id={:<14} image={} ports=[{}]",
            snapshot.name,
            snapshot.state.status_label(),
            id,
            if snapshot.image.is_empty() { "-" } else { &snapshot.image },
            ports.join(", ")
        );
    }
}

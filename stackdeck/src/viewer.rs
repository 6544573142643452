//! Auxiliary system-graph viewer bootstrap
//!
//! Optional companion container that renders the project's service graph.
//! Bootstrap is fire-and-forget: it runs in the background, must never block
//! a primary flow, and every failure is swallowed after logging.

use std::path::PathBuf;

use tokio::process::Command;
use tracing::{info, warn};

use crate::errors::DeckError;
use crate::filesys::dir::Dir;

/// Viewer container configuration
#[derive(Debug, Clone)]
pub struct ViewerOptions {
    pub container_name: String,
    pub image_name: String,
    pub repo_url: String,
    pub repo_dir: PathBuf,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        let home = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);
        Self {
            container_name: "stackdeck-system-graph-viewer".to_string(),
            image_name: "stackdeck-system-graph-viewer".to_string(),
            repo_url: "https://github.com/stackdeck-dev/graph-viewer.git".to_string(),
            repo_dir: home.join(".stackdeck").join("graph-viewer"),
        }
    }
}

/// Kick off the viewer bootstrap without waiting for it
pub fn spawn_bootstrap(options: ViewerOptions) {
    tokio::spawn(async move {
        if let Err(e) = ensure_running(&options).await {
            warn!("Graph viewer bootstrap failed (ignored): {}", e);
        }
    });
}

async fn ensure_running(options: &ViewerOptions) -> Result<(), DeckError> {
    if !container_exists(&options.container_name).await? {
        build_and_create(options).await?;
    } else if !container_running(&options.container_name).await? {
        info!("Starting graph viewer container...");
        run_docker(&["start", &options.container_name]).await?;
    }
    Ok(())
}

async fn build_and_create(options: &ViewerOptions) -> Result<(), DeckError> {
    let repo = Dir::new(&options.repo_dir);
    if !repo.exists().await {
        info!("Cloning graph viewer repository...");
        let status = Command::new("git")
            .args(["clone", &options.repo_url])
            .arg(repo.path())
            .status()
            .await
            .map_err(|e| DeckError::Fetch(format!("Failed to run git: {}", e)))?;
        if !status.success() {
            return Err(DeckError::Fetch("git clone failed".to_string()));
        }
    }

    let images = run_docker(&["images", "--format", "{{.Repository}}", &options.image_name]).await?;
    if !images.lines().any(|line| line.trim() == options.image_name) {
        info!("Building graph viewer image...");
        let status = Command::new("docker")
            .current_dir(repo.path())
            .args(["build", "-t", &options.image_name, "."])
            .status()
            .await
            .map_err(|e| DeckError::Deploy(format!("Failed to run docker build: {}", e)))?;
        if !status.success() {
            return Err(DeckError::Deploy("docker build failed".to_string()));
        }
    }

    // Dynamic host port assignment; readers resolve it through `docker port`
    info!("Creating graph viewer container...");
    run_docker(&[
        "run",
        "-d",
        "--name",
        &options.container_name,
        "-p",
        "8080",
        &options.image_name,
    ])
    .await?;
    Ok(())
}

async fn container_exists(name: &str) -> Result<bool, DeckError> {
    let listing = run_docker(&[
        "ps",
        "-a",
        "--filter",
        &format!("name={}", name),
        "--format",
        "{{.Names}}",
    ])
    .await?;
    Ok(listing.lines().any(|line| line.trim() == name))
}

async fn container_running(name: &str) -> Result<bool, DeckError> {
    let listing = run_docker(&[
        "ps",
        "--filter",
        &format!("name={}", name),
        "--format",
        "{{.Names}}",
    ])
    .await?;
    Ok(listing.lines().any(|line| line.trim() == name))
}

async fn run_docker(args: &[&str]) -> Result<String, DeckError> {
    let output = Command::new("docker")
        .args(args)
        .output()
        .await
        .map_err(|e| DeckError::RuntimeQuery(format!("Failed to run docker: {}", e)))?;

    if !output.status.success() {
        return Err(DeckError::RuntimeQuery(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

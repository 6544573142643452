//! Container runtime polling and lifecycle drive
//!
//! Observes Docker through its CLI and reports; it never assumes a
//! transition happened without re-polling. Every poll fully replaces the
//! previous snapshot set.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::DeckError;
use crate::layout::BuildContext;
use crate::model::ProjectModel;
use crate::naming::service_container_name;

/// `docker ps` Go template emitting one JSON object per line
const PS_FORMAT: &str = r#"{"name":"{{.Names}}","id":"{{.ID}}","state":"{{.State}}","ports":"{{.Ports}}","image":"{{.Image}}"}"#;

const START_TIMEOUT: Duration = Duration::from_secs(60);
const START_POLL_INTERVAL: Duration = Duration::from_secs(1);

fn port_mapping() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)->(\d+)/tcp").expect("valid regex"))
}

/// Observed container state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerState {
    Running,
    Exited,
    NotCreated,
    Unknown,
}

impl ContainerState {
    fn from_docker(state: &str) -> Self {
        match state.to_lowercase().as_str() {
            "running" => ContainerState::Running,
            "exited" => ContainerState::Exited,
            "not created" => ContainerState::NotCreated,
            _ => ContainerState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerState::Running => "running",
            ContainerState::Exited => "exited",
            ContainerState::NotCreated => "not created",
            ContainerState::Unknown => "unknown",
        }
    }

    /// Human label for the card UI
    pub fn status_label(&self) -> &'static str {
        match self {
            ContainerState::Running => "running",
            ContainerState::Exited => "stopped",
            ContainerState::NotCreated => "not created",
            ContainerState::Unknown => "unknown",
        }
    }
}

/// Point-in-time facts about a live or absent container
#[derive(Debug, Clone)]
pub struct RuntimeSnapshot {
    pub name: String,
    pub id: String,
    pub state: ContainerState,
    /// container port -> dynamically assigned host port
    pub ports: HashMap<u16, u16>,
    pub image: String,
    pub compose_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct PsLine {
    name: String,
    id: String,
    state: String,
    ports: String,
    image: String,
}

/// Parse Docker's port-mapping text into container-port -> host-port pairs
pub fn parse_port_map(text: &str) -> HashMap<u16, u16> {
    let mut ports = HashMap::new();
    for captures in port_mapping().captures_iter(text) {
        let host: u16 = match captures[1].parse() {
            Ok(port) => port,
            Err(_) => continue,
        };
        let container: u16 = match captures[2].parse() {
            Ok(port) => port,
            Err(_) => continue,
        };
        ports.insert(container, host);
    }
    ports
}

async fn run_capture(program: &str, args: &[&str], cwd: Option<&Path>) -> Result<String, DeckError> {
    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let output = command
        .output()
        .await
        .map_err(|e| DeckError::RuntimeQuery(format!("Failed to run {}: {}", program, e)))?;

    if !output.status.success() {
        return Err(DeckError::RuntimeQuery(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Poll the runtime for the current state of every declared service.
///
/// Services with no matching live container get a placeholder snapshot with
/// an empty id, empty ports, `not created` state, and the image backfilled
/// from the model so a known image never regresses to blank across polls.
pub async fn poll(ctx: &BuildContext, model: &ProjectModel) -> Result<Vec<RuntimeSnapshot>, DeckError> {
    let declared = run_capture(
        "docker",
        &["compose", "config", "--services"],
        Some(ctx.root()),
    )
    .await?;
    let declared: Vec<&str> = declared.lines().filter(|l| !l.trim().is_empty()).collect();

    let listing = run_capture("docker", &["ps", "-a", "--format", PS_FORMAT], None).await?;

    let mut live: HashMap<String, RuntimeSnapshot> = HashMap::new();
    for line in listing.lines().filter(|l| !l.trim().is_empty()) {
        let parsed: PsLine = match serde_json::from_str(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Skipping malformed container listing line: {}", e);
                continue;
            }
        };
        live.insert(
            parsed.name.clone(),
            RuntimeSnapshot {
                name: parsed.name,
                id: parsed.id,
                state: ContainerState::from_docker(&parsed.state),
                ports: parse_port_map(&parsed.ports),
                image: parsed.image,
                compose_dir: ctx.root().to_path_buf(),
            },
        );
    }

    let snapshots = assemble_snapshots(&declared, live, ctx, model);
    debug!("Polled {} service container(s)", snapshots.len());
    Ok(snapshots)
}

/// Match live containers to declared services by the naming convention and
/// synthesize a `not created` placeholder for every service without one.
fn assemble_snapshots(
    declared: &[&str],
    mut live: HashMap<String, RuntimeSnapshot>,
    ctx: &BuildContext,
    model: &ProjectModel,
) -> Vec<RuntimeSnapshot> {
    let mut snapshots = Vec::with_capacity(declared.len());
    for service_name in declared {
        let service_name = service_name.trim();
        let container_name = service_container_name(ctx.root(), service_name);
        match live.remove(&container_name) {
            Some(snapshot) => snapshots.push(snapshot),
            None => snapshots.push(RuntimeSnapshot {
                name: container_name,
                id: String::new(),
                state: ContainerState::NotCreated,
                ports: HashMap::new(),
                image: model
                    .services
                    .get(service_name)
                    .map(|s| s.image.clone())
                    .unwrap_or_default(),
                compose_dir: ctx.root().to_path_buf(),
            }),
        }
    }
    snapshots
}

/// Start one service and wait for its container to report running
pub async fn up(ctx: &BuildContext, service_name: &str) -> Result<(), DeckError> {
    let status = Command::new("docker")
        .current_dir(ctx.root())
        .args(["compose", "up", "-d", service_name])
        .status()
        .await
        .map_err(|e| DeckError::Deploy(format!("Failed to run docker compose: {}", e)))?;

    if !status.success() {
        return Err(DeckError::Deploy(format!(
            "docker compose up failed for service {}",
            service_name
        )));
    }

    let container_name = service_container_name(ctx.root(), service_name);
    wait_for_running(&container_name).await
}

/// Stop one service
pub async fn stop(ctx: &BuildContext, service_name: &str) -> Result<(), DeckError> {
    let status = Command::new("docker")
        .current_dir(ctx.root())
        .args(["compose", "stop", service_name])
        .status()
        .await
        .map_err(|e| DeckError::Deploy(format!("Failed to run docker compose: {}", e)))?;

    if !status.success() {
        return Err(DeckError::Deploy(format!(
            "docker compose stop failed for service {}",
            service_name
        )));
    }
    Ok(())
}

/// Bounded readiness poll: inspect once per second until the container
/// reports running or the budget runs out. No retry on timeout.
async fn wait_for_running(container_name: &str) -> Result<(), DeckError> {
    let deadline = tokio::time::Instant::now() + START_TIMEOUT;

    loop {
        let inspect = Command::new("docker")
            .args(["inspect", "--format", "{{.State.Running}}", container_name])
            .output()
            .await
            .map_err(|e| DeckError::Deploy(format!("Failed to run docker inspect: {}", e)))?;

        if inspect.status.success()
            && String::from_utf8_lossy(&inspect.stdout).trim() == "true"
        {
            return Ok(());
        }

        if tokio::time::Instant::now() >= deadline {
            return Err(DeckError::Deploy(format!(
                "Container {} did not reach running state within {}s",
                container_name,
                START_TIMEOUT.as_secs()
            )));
        }
        tokio::time::sleep(START_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_port_map_pairs() {
        let ports = parse_port_map("0.0.0.0:32768->8080/tcp, 0.0.0.0:32769->9090/tcp");
        assert_eq!(ports.len(), 2);
        assert_eq!(ports.get(&8080), Some(&32768));
        assert_eq!(ports.get(&9090), Some(&32769));
    }

    #[test]
    fn test_parse_port_map_ignores_non_tcp_and_garbage() {
        assert!(parse_port_map("").is_empty());
        assert!(parse_port_map("no mappings here").is_empty());
        assert!(parse_port_map("0.0.0.0:32768->8080/udp").is_empty());
    }

    #[test]
    fn test_container_state_parsing() {
        assert_eq!(ContainerState::from_docker("running"), ContainerState::Running);
        assert_eq!(ContainerState::from_docker("Exited"), ContainerState::Exited);
        assert_eq!(ContainerState::from_docker("restarting"), ContainerState::Unknown);
        assert_eq!(ContainerState::from_docker("not created"), ContainerState::NotCreated);
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(ContainerState::Running.status_label(), "running");
        assert_eq!(ContainerState::Exited.status_label(), "stopped");
        assert_eq!(ContainerState::NotCreated.status_label(), "not created");
    }

    #[test]
    fn test_placeholder_synthesized_for_absent_container() {
        use crate::model::Service;

        let ctx = BuildContext::new("/work/rig");
        let mut model = ProjectModel::default();
        model.services.insert(
            "web".to_string(),
            Service {
                image: "known-image".to_string(),
                ..Service::default()
            },
        );

        let snapshots = assemble_snapshots(&["web"], HashMap::new(), &ctx, &model);
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].name, "rig-web-1");
        assert_eq!(snapshots[0].state, ContainerState::NotCreated);
        assert_eq!(snapshots[0].id, "");
        assert!(snapshots[0].ports.is_empty());
        // A previously recorded image does not regress to blank
        assert_eq!(snapshots[0].image, "known-image");
    }

    #[test]
    fn test_live_container_matched_by_naming_convention() {
        use crate::model::Service;

        let ctx = BuildContext::new("/work/rig");
        let mut model = ProjectModel::default();
        model.services.insert("web".to_string(), Service::default());

        let mut live = HashMap::new();
        live.insert(
            "rig-web-1".to_string(),
            RuntimeSnapshot {
                name: "rig-web-1".to_string(),
                id: "abc123".to_string(),
                state: ContainerState::Running,
                ports: HashMap::new(),
                image: "live-image".to_string(),
                compose_dir: "/work/rig".into(),
            },
        );
        // A container from another project never matches
        live.insert(
            "other-web-1".to_string(),
            RuntimeSnapshot {
                name: "other-web-1".to_string(),
                id: "zzz999".to_string(),
                state: ContainerState::Running,
                ports: HashMap::new(),
                image: String::new(),
                compose_dir: "/work/other".into(),
            },
        );

        let snapshots = assemble_snapshots(&["web"], live, &ctx, &model);
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].id, "abc123");
        assert_eq!(snapshots[0].state, ContainerState::Running);
    }

    #[test]
    fn test_ps_line_parses_template_output() {
        let line = r#"{"name":"rig-web-1","id":"abc123","state":"running","ports":"0.0.0.0:32768->8501/tcp","image":"bench-image"}"#;
        let parsed: PsLine = serde_json::from_str(line).unwrap();
        assert_eq!(parsed.name, "rig-web-1");
        assert_eq!(parse_port_map(&parsed.ports).get(&8501), Some(&32768));
    }
}

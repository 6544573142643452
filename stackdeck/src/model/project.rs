//! Project model types and persistence
//!
//! `project_info.json` is the single source of truth for a build context.
//! Every keyed collection is an `IndexMap` so a read-modify-write cycle
//! preserves the author's key order and rewrites stay diff-friendly.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::errors::DeckError;
use crate::layout::BuildContext;
use crate::model::validate;
use crate::utils::{path_file_stem, path_parent_name};

/// Root of `project_info.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectModel {
    /// Containerized services, compiled into Compose services
    #[serde(default)]
    pub services: IndexMap<String, Service>,

    /// Applications run directly on the host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desktop_apps: Option<DesktopApps>,

    /// Sources cloned into `programs/<name>`
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub repositories: IndexMap<String, GitSource>,

    /// Sources whose Dockerfile is fetched into `dockerfiles/<name>/Dockerfile`
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub dockerfiles: IndexMap<String, GitSource>,
}

/// Desktop-side application tree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DesktopApps {
    #[serde(default)]
    pub host_machine: HostApps,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostApps {
    #[serde(default)]
    pub apps: IndexMap<String, App>,
}

/// A git source: repository URL plus the branch to fetch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitSource {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub branch: String,
}

/// A declared containerized unit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Service {
    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub image: String,

    #[serde(default)]
    pub working_dir: String,

    #[serde(rename = "Dockerfile", default)]
    pub dockerfile: String,

    /// Container id, written only by the runtime fact fold
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub apps: IndexMap<String, App>,
}

/// A runnable unit, container-side or desktop-side
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct App {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,

    /// Path to the entry-point program file
    #[serde(default)]
    pub main: String,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub args: IndexMap<String, String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_port"
    )]
    pub container_port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venv: Option<String>,

    /// Host directories mounted/linked into the app's runtime location
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_roots: Vec<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub devices: IndexMap<String, Device>,
}

impl App {
    /// Stem of the main program file; names the program mount inside a container
    pub fn main_stem(&self) -> String {
        path_file_stem(&self.main)
    }

    /// Name of the directory holding the main program file; names the
    /// program symlink of a desktop app
    pub fn program_dir_name(&self) -> String {
        path_parent_name(&self.main)
    }
}

/// A named hardware-style endpoint bound to IP targets under constraints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Device {
    /// Pool of selectable addresses, kept numerically sorted on write
    #[serde(default)]
    pub ip_addr: Vec<String>,

    /// Currently assigned targets
    #[serde(default)]
    pub target: Vec<String>,

    /// Cardinality constraint, `"min:max:allowDuplicateFlag"` where an empty
    /// max means unbounded
    #[serde(default)]
    pub num: String,
}

/// Parsed form of [`Device::num`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConstraints {
    pub min_connections: u32,
    pub max_connections: Option<u32>,
    pub allow_duplicate: bool,
}

impl Device {
    /// Parse the `num` constraint string
    pub fn constraints(&self) -> Result<DeviceConstraints, DeckError> {
        let mut parts = self.num.split(':');
        let (min, max, flag) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(min), Some(max), Some(flag), None) => (min, max, flag),
            _ => {
                return Err(DeckError::ConfigFormat(format!(
                    "Invalid device connection constraint: {:?}",
                    self.num
                )))
            }
        };

        let min_connections = min.parse::<u32>().map_err(|_| {
            DeckError::ConfigFormat(format!("Invalid minimum connection count: {:?}", self.num))
        })?;

        let max_connections = if max.is_empty() {
            None
        } else {
            Some(max.parse::<u32>().map_err(|_| {
                DeckError::ConfigFormat(format!(
                    "Invalid maximum connection count: {:?}",
                    self.num
                ))
            })?)
        };

        let allow_duplicate = flag.parse::<u32>().map_err(|_| {
            DeckError::ConfigFormat(format!("Invalid duplicate flag: {:?}", self.num))
        })? != 0;

        Ok(DeviceConstraints {
            min_connections,
            max_connections,
            allow_duplicate,
        })
    }
}

/// Accept a container port written either as a JSON number or a digit string
fn de_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortRepr {
        Num(u16),
        Text(String),
    }

    match Option::<PortRepr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(PortRepr::Num(port)) => Ok(Some(port)),
        Some(PortRepr::Text(text)) => text
            .parse::<u16>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid container_port: {:?}", text))),
    }
}

/// Load and validate the model of a build context.
///
/// A missing, empty or unparseable file and every schema violation surface
/// as one `ConfigFormat` error; schema violations are all enumerated in a
/// single pass rather than reported one at a time.
pub async fn load_project_info(ctx: &BuildContext) -> Result<ProjectModel, DeckError> {
    let file = ctx.project_info_file();

    if !file.exists().await {
        return Err(DeckError::ConfigFormat(format!(
            "project_info.json not found: {}",
            file.path().display()
        )));
    }
    if file.size().await == 0 {
        return Err(DeckError::ConfigFormat(format!(
            "project_info.json is empty: {}",
            file.path().display()
        )));
    }

    let contents = file.read_string().await?;
    let model: ProjectModel = serde_json::from_str(&contents).map_err(|e| {
        DeckError::ConfigFormat(format!(
            "project_info.json is malformed: {}: {}",
            file.path().display(),
            e
        ))
    })?;

    let problems = validate::validate(&model);
    if !problems.is_empty() {
        return Err(DeckError::ConfigFormat(format!(
            "project_info.json is invalid: {}: {}",
            file.path().display(),
            problems.join("; ")
        )));
    }

    for warning in validate::pool_warnings(&model) {
        warn!("{}", warning);
    }

    Ok(model)
}

/// Persist the model as pretty-printed JSON (full-document rewrite)
pub async fn save_project_info(ctx: &BuildContext, model: &ProjectModel) -> Result<(), DeckError> {
    ctx.project_info_file().write_json(model).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(num: &str) -> Device {
        Device {
            num: num.to_string(),
            ..Device::default()
        }
    }

    #[test]
    fn test_constraints_bounded() {
        let parsed = device("1:4:0").constraints().unwrap();
        assert_eq!(parsed.min_connections, 1);
        assert_eq!(parsed.max_connections, Some(4));
        assert!(!parsed.allow_duplicate);
    }

    #[test]
    fn test_constraints_unbounded_max() {
        let parsed = device("2::1").constraints().unwrap();
        assert_eq!(parsed.min_connections, 2);
        assert_eq!(parsed.max_connections, None);
        assert!(parsed.allow_duplicate);
    }

    #[test]
    fn test_constraints_rejects_malformed() {
        assert!(device("").constraints().is_err());
        assert!(device("1:2").constraints().is_err());
        assert!(device("a:2:0").constraints().is_err());
        assert!(device("1:2:0:9").constraints().is_err());
    }

    #[test]
    fn test_container_port_accepts_number_or_string() {
        let app: App = serde_json::from_str(r#"{"main":"m.py","container_port":8080}"#).unwrap();
        assert_eq!(app.container_port, Some(8080));

        let app: App = serde_json::from_str(r#"{"main":"m.py","container_port":"8080"}"#).unwrap();
        assert_eq!(app.container_port, Some(8080));

        let app: App = serde_json::from_str(r#"{"main":"m.py"}"#).unwrap();
        assert_eq!(app.container_port, None);
    }

    #[test]
    fn test_app_path_accessors() {
        let app = App {
            main: "programs/sensor_hub/main.py".to_string(),
            ..App::default()
        };
        assert_eq!(app.main_stem(), "main");
        assert_eq!(app.program_dir_name(), "sensor_hub");
    }

    #[test]
    fn test_model_round_trip_preserves_key_order() {
        let raw = r#"{
            "services": {
                "zeta": {"user": "u", "image": "i", "working_dir": "/w", "Dockerfile": "d", "apps": {}},
                "alpha": {"user": "u", "image": "i", "working_dir": "/w", "Dockerfile": "d", "apps": {}}
            }
        }"#;
        let model: ProjectModel = serde_json::from_str(raw).unwrap();
        let keys: Vec<_> = model.services.keys().cloned().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);

        let rewritten = serde_json::to_string(&model).unwrap();
        let zeta = rewritten.find("zeta").unwrap();
        let alpha = rewritten.find("alpha").unwrap();
        assert!(zeta < alpha);
    }
}

//! Compose document generation
//!
//! Transforms a [`ProjectModel`] into a complete `docker-compose.yml`:
//! service blocks, bind-mount volumes, the generated startup script, and the
//! on-disk YAML dialect Compose expects. Key order is fixed by struct field
//! order and map insertion order; it is never sorted.

pub mod command;
pub mod render;

use indexmap::IndexMap;
use serde::Serialize;

use crate::errors::DeckError;
use crate::filesys::file::File;
use crate::model::{App, ProjectModel};
use crate::utils::path_file_name;

/// Top-level compose document
#[derive(Debug, Clone, Serialize)]
pub struct ComposeFile {
    pub services: IndexMap<String, ComposeService>,
    pub networks: IndexMap<String, NetworkSpec>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildSpec {
    pub context: String,
    pub dockerfile: String,
}

/// One generated service block; field order is serialization order
#[derive(Debug, Clone, Serialize)]
pub struct ComposeService {
    pub build: BuildSpec,
    pub image: String,
    pub user: String,
    pub working_dir: String,
    pub networks: Vec<String>,
    pub volumes: Vec<String>,
    pub command: String,
    pub ports: Vec<String>,
    pub environment: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkSpec {
    pub driver: String,
}

/// Generate the compose document for a model
pub fn generate(model: &ProjectModel) -> Result<ComposeFile, DeckError> {
    let mut services = IndexMap::new();

    for (service_name, service) in &model.services {
        let user = &service.user;

        let mut ports = Vec::new();
        for (app_name, app) in &service.apps {
            let port = app.container_port.ok_or_else(|| {
                DeckError::ConfigFormat(format!(
                    "missing field: services.{}.apps.{}.container_port",
                    service_name, app_name
                ))
            })?;
            ports.push(port.to_string());
        }

        services.insert(
            service_name.clone(),
            ComposeService {
                build: BuildSpec {
                    context: ".".to_string(),
                    dockerfile: format!("./dockerfiles/{}/Dockerfile", service.dockerfile),
                },
                image: service.image.clone(),
                user: user.clone(),
                working_dir: service.working_dir.clone(),
                networks: vec!["default".to_string()],
                volumes: volumes_for(user, &service.apps, service_name),
                command: command::service_command(user, &service.apps)?,
                ports,
                environment: vec!["PYTHONPATH".to_string()],
            },
        );
    }

    let mut networks = IndexMap::new();
    networks.insert(
        "default".to_string(),
        NetworkSpec {
            driver: "bridge".to_string(),
        },
    );

    Ok(ComposeFile { services, networks })
}

/// Volume list for one service, in mount order: version info, generated
/// container info, then per app the program directory, the generated app
/// info, and every declared data root.
fn volumes_for(user: &str, apps: &IndexMap<String, App>, service_name: &str) -> Vec<String> {
    let mut volumes = vec![
        format!("./version_info/{}:/home/{}/version_info", service_name, user),
        format!(
            "./container_info/{}/container_info.json:/home/{}/container_info.json",
            service_name, user
        ),
    ];

    for (app_name, app) in apps {
        let stem = app.main_stem();
        volumes.push(format!(
            "./programs/{}:/home/{}/apps/{}/{}",
            stem, user, app_name, stem
        ));
        volumes.push(format!(
            "./container_info/{}/{}/app_info.json:/home/{}/apps/{}/app_info.json",
            service_name, app_name, user, app_name
        ));

        for host_path in &app.data_roots {
            volumes.push(format!(
                "{}:/home/{}/apps/{}/{}",
                host_path,
                user,
                app_name,
                path_file_name(host_path)
            ));
        }
    }

    volumes
}

/// Generate and write `docker-compose.yml`
pub async fn save(model: &ProjectModel, output: &File) -> Result<(), DeckError> {
    let doc = generate(model)?;
    let yaml = render::render(&doc)?;
    output.write_string(&yaml).await
}

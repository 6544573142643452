//! Project session: one open build context
//!
//! Owns the loaded model, the latest runtime snapshot set and the desktop
//! process registry, and passes them explicitly through every operation —
//! there is no ambient global state. All read-modify-writes of
//! `project_info.json` are serialized through an in-process write gate so
//! one logical edit lands at a time.

use std::path::PathBuf;

use tokio::sync::Mutex;
use tracing::info;

use crate::compose;
use crate::desktop::{self, DesktopProcs};
use crate::devices::sort_ip_pool;
use crate::errors::DeckError;
use crate::fetch;
use crate::layout::BuildContext;
use crate::model::project::{load_project_info, save_project_info};
use crate::model::{App, ProjectModel};
use crate::naming::extract_service_name;
use crate::reconcile;
use crate::runtime::{self, RuntimeSnapshot};
use crate::utils::path_file_name;
use crate::viewer::{self, ViewerOptions};

/// Where an app lives: directly on the host, or inside a declared service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppScope {
    HostMachine,
    Service(String),
}

/// One open build context
pub struct ProjectSession {
    ctx: BuildContext,
    model: ProjectModel,
    snapshots: Vec<RuntimeSnapshot>,
    desktop: DesktopProcs,
    write_gate: Mutex<()>,
}

impl ProjectSession {
    /// Load the model of a build context without touching anything on disk
    /// beyond `project_info.json`
    pub async fn load(root: impl Into<PathBuf>) -> Result<Self, DeckError> {
        let ctx = BuildContext::new(root);
        let model = load_project_info(&ctx).await?;
        Ok(Self {
            ctx,
            model,
            snapshots: Vec::new(),
            desktop: DesktopProcs::new(),
            write_gate: Mutex::new(()),
        })
    }

    /// First-run flow for a newly selected build context: load, materialize
    /// sources, wire the desktop tree, generate the compose file, kick off
    /// the viewer bootstrap in the background, then refresh.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, DeckError> {
        let mut session = Self::load(root).await?;

        fetch::clone_repositories(&session.model, &session.ctx).await?;
        fetch::clone_dockerfiles(&session.model, &session.ctx).await?;
        desktop::setup_desktop_apps(&session.model, &session.ctx).await?;

        if !session.model.services.is_empty() {
            compose::save(&session.model, &session.ctx.compose_file()).await?;
            info!("Generated {}", session.ctx.compose_file().path().display());
        }

        viewer::spawn_bootstrap(ViewerOptions::default());

        session.refresh().await?;
        Ok(session)
    }

    pub fn build_context(&self) -> &BuildContext {
        &self.ctx
    }

    pub fn model(&self) -> &ProjectModel {
        &self.model
    }

    /// Latest polled snapshot set, fully replaced on every refresh
    pub fn snapshots(&self) -> &[RuntimeSnapshot] {
        &self.snapshots
    }

    pub fn desktop_procs(&mut self) -> &mut DesktopProcs {
        &mut self.desktop
    }

    /// Reload the model from disk, rebuild derived state, poll the runtime
    /// and fold its facts back.
    pub async fn refresh(&mut self) -> Result<(), DeckError> {
        self.model = load_project_info(&self.ctx).await?;
        reconcile::denormalize(&self.model, &self.ctx).await?;

        // A failed poll leaves no stale snapshots behind
        self.snapshots.clear();
        if self.model.services.is_empty() {
            return Ok(());
        }

        let snapshots = runtime::poll(&self.ctx, &self.model).await?;

        {
            let _guard = self.write_gate.lock().await;
            let mut model = load_project_info(&self.ctx).await?;
            if reconcile::fold_runtime_facts(&mut model, &snapshots, &self.ctx) {
                save_project_info(&self.ctx, &model).await?;
            }
            self.model = model;
        }
        reconcile::denormalize(&self.model, &self.ctx).await?;

        self.snapshots = snapshots;
        Ok(())
    }

    /// Regenerate `docker-compose.yml` from the current model
    pub async fn regenerate_compose(&self) -> Result<(), DeckError> {
        compose::save(&self.model, &self.ctx.compose_file()).await
    }

    /// Start the service behind a container name and wait for it to run
    pub async fn start_service(&mut self, container_name: &str) -> Result<(), DeckError> {
        let service_name = self.declared_service(container_name)?;
        info!("Starting container {}...", container_name);
        runtime::up(&self.ctx, &service_name).await?;
        self.refresh().await
    }

    /// Stop the service behind a container name
    pub async fn stop_service(&mut self, container_name: &str) -> Result<(), DeckError> {
        let service_name = self.declared_service(container_name)?;
        info!("Stopping container {}...", container_name);
        runtime::stop(&self.ctx, &service_name).await?;
        self.refresh().await
    }

    fn declared_service(&self, container_name: &str) -> Result<String, DeckError> {
        let service_name = extract_service_name(container_name, self.ctx.root())?;
        if !self.model.services.contains_key(&service_name) {
            return Err(DeckError::NameFormat(format!(
                "No declared service matches container {}",
                container_name
            )));
        }
        Ok(service_name)
    }

    /// Replace a device's target assignment for one app
    pub async fn set_device_targets(
        &mut self,
        scope: &AppScope,
        app_name: &str,
        device_type: &str,
        targets: Vec<String>,
    ) -> Result<(), DeckError> {
        let device_type = device_type.to_string();
        let scope_for_edit = scope.clone();
        let app_name_owned = app_name.to_string();

        self.edit_model(move |model| {
            let app = app_mut(model, &scope_for_edit, &app_name_owned)?;
            let device = app.devices.get_mut(&device_type).ok_or_else(|| {
                DeckError::ConfigFormat(format!(
                    "No device {} configured for app {}",
                    device_type, app_name_owned
                ))
            })?;
            device.target = targets;
            Ok(())
        })
        .await?;

        if *scope == AppScope::HostMachine {
            desktop::setup_desktop_apps(&self.model, &self.ctx).await?;
        }
        Ok(())
    }

    /// Replace the selectable address pool of a device type everywhere it
    /// appears, desktop apps included. The pool is stored sorted and unique.
    pub async fn set_device_pool(
        &mut self,
        device_type: &str,
        mut pool: Vec<String>,
    ) -> Result<(), DeckError> {
        sort_ip_pool(&mut pool);
        let device_type = device_type.to_string();

        self.edit_model(move |model| {
            for service in model.services.values_mut() {
                for app in service.apps.values_mut() {
                    if let Some(device) = app.devices.get_mut(&device_type) {
                        device.ip_addr = pool.clone();
                    }
                }
            }
            if let Some(desktop_apps) = &mut model.desktop_apps {
                for app in desktop_apps.host_machine.apps.values_mut() {
                    if let Some(device) = app.devices.get_mut(&device_type) {
                        device.ip_addr = pool.clone();
                    }
                }
            }
            Ok(())
        })
        .await
    }

    /// Point a named data root of one app at a new host directory. The new
    /// directory must keep the data root's name.
    pub async fn set_data_root(
        &mut self,
        scope: &AppScope,
        app_name: &str,
        root_name: &str,
        new_path: &str,
    ) -> Result<(), DeckError> {
        if path_file_name(new_path) != root_name {
            return Err(DeckError::ConfigFormat(format!(
                "Selected directory {} does not match data root {}",
                new_path, root_name
            )));
        }

        let scope_for_edit = scope.clone();
        let app_name_owned = app_name.to_string();
        let root_name_owned = root_name.to_string();
        let new_path_owned = new_path.to_string();

        self.edit_model(move |model| {
            let app = app_mut(model, &scope_for_edit, &app_name_owned)?;
            match app
                .data_roots
                .iter()
                .position(|path| path_file_name(path) == root_name_owned)
            {
                Some(i) => app.data_roots[i] = new_path_owned,
                None => app.data_roots.push(new_path_owned),
            }
            Ok(())
        })
        .await?;

        if *scope == AppScope::HostMachine {
            desktop::setup_desktop_apps(&self.model, &self.ctx).await?;
        }
        Ok(())
    }

    /// Apply one logical edit: re-read the file under the write gate, edit,
    /// persist atomically, re-denormalize.
    async fn edit_model<F>(&mut self, edit: F) -> Result<(), DeckError>
    where
        F: FnOnce(&mut ProjectModel) -> Result<(), DeckError>,
    {
        {
            let _guard = self.write_gate.lock().await;
            let mut model = load_project_info(&self.ctx).await?;
            edit(&mut model)?;
            save_project_info(&self.ctx, &model).await?;
            self.model = model;
        }
        reconcile::denormalize(&self.model, &self.ctx).await
    }
}

fn app_mut<'a>(
    model: &'a mut ProjectModel,
    scope: &AppScope,
    app_name: &str,
) -> Result<&'a mut App, DeckError> {
    let apps = match scope {
        AppScope::HostMachine => model
            .desktop_apps
            .as_mut()
            .map(|desktop| &mut desktop.host_machine.apps)
            .ok_or_else(|| {
                DeckError::ConfigFormat("No desktop apps configured".to_string())
            })?,
        AppScope::Service(service_name) => {
            &mut model
                .services
                .get_mut(service_name)
                .ok_or_else(|| {
                    DeckError::ConfigFormat(format!("No such service: {}", service_name))
                })?
                .apps
        }
    };

    apps.get_mut(app_name)
        .ok_or_else(|| DeckError::ConfigFormat(format!("No such app: {}", app_name)))
}

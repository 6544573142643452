//! Desktop-side application wiring
//!
//! Desktop apps run on the host out of `desktop_apps/<app>/`: a symlink to
//! the app's program directory, one symlink per declared data root, and a
//! generated `app_info.json` the launcher reads. The process side is a thin
//! wrapper around interpreter subprocesses keyed by app name.

use std::collections::HashMap;
use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;
use tokio::fs;
use tokio::process::{Child, Command};
use tracing::info;

use crate::errors::DeckError;
use crate::layout::BuildContext;
use crate::model::{App, Device, ProjectModel};
use crate::utils::{path_file_name, to_forward_slashes};

/// Generated launcher document for one desktop app
#[derive(Debug, Serialize)]
struct DesktopAppInfo<'a> {
    interpreter: &'a str,
    main: String,
    args: &'a IndexMap<String, String>,
    devices: &'a IndexMap<String, Device>,
    data_roots: IndexMap<String, String>,
}

/// Create or refresh the `desktop_apps/` tree for every declared desktop
/// app. Existing links are replaced, never followed.
pub async fn setup_desktop_apps(model: &ProjectModel, ctx: &BuildContext) -> Result<(), DeckError> {
    let Some(desktop) = &model.desktop_apps else {
        return Ok(());
    };

    let desktop_dir = ctx.desktop_apps_dir();
    desktop_dir.create().await?;

    for (app_name, app) in &desktop.host_machine.apps {
        let app_dir = desktop_dir.subdir(app_name);
        app_dir.create().await?;

        let program_dir_name = app.program_dir_name();
        let src_program = ctx.programs_dir().subdir(&program_dir_name);
        let dst_program = app_dir.path().join(&program_dir_name);
        create_symlink(src_program.path(), &dst_program).await?;

        let mut data_roots = IndexMap::new();
        for host_path in &app.data_roots {
            let root_name = path_file_name(host_path);
            let dst_data = app_dir.path().join(&root_name);
            create_symlink(Path::new(&to_forward_slashes(host_path)), &dst_data).await?;
            data_roots.insert(root_name, dst_data.to_string_lossy().into_owned());
        }

        let doc = DesktopAppInfo {
            interpreter: app.interpreter.as_deref().unwrap_or_default(),
            main: format!("{}/{}", program_dir_name, path_file_name(&app.main)),
            args: &app.args,
            devices: &app.devices,
            data_roots,
        };
        app_dir.file("app_info.json").write_json(&doc).await?;
    }

    Ok(())
}

/// Replace whatever occupies `dst` with a symlink to `src`
async fn create_symlink(src: &Path, dst: &Path) -> Result<(), DeckError> {
    match fs::symlink_metadata(dst).await {
        Ok(meta) if meta.file_type().is_symlink() => fs::remove_file(dst).await?,
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(dst).await?,
        Ok(_) => fs::remove_file(dst).await?,
        Err(_) => {}
    }

    #[cfg(unix)]
    {
        fs::symlink(src, dst).await?;
    }

    #[cfg(windows)]
    {
        let result = if fs::metadata(src).await.map(|m| m.is_dir()).unwrap_or(false) {
            fs::symlink_dir(src, dst).await
        } else {
            fs::symlink_file(src, dst).await
        };
        result.map_err(|e| {
            DeckError::Symlink(format!(
                "Failed to link {}: {}. Symlink creation on Windows requires Developer \
                 Mode (Settings > System > For developers) or elevated privileges.",
                dst.display(),
                e
            ))
        })?;
    }

    Ok(())
}

/// Desktop-app process registry
#[derive(Default)]
pub struct DesktopProcs {
    procs: HashMap<String, Child>,
}

impl DesktopProcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn an app's interpreter in its `desktop_apps/<app>/` directory
    pub async fn start(
        &mut self,
        app_name: &str,
        app: &App,
        ctx: &BuildContext,
    ) -> Result<(), DeckError> {
        if self.is_running(app_name) {
            return Ok(());
        }

        let interpreter = app.interpreter.as_deref().filter(|i| !i.is_empty()).ok_or_else(
            || DeckError::ConfigFormat(format!("missing field: interpreter for app {}", app_name)),
        )?;

        let app_dir = ctx.desktop_apps_dir().subdir(app_name);
        let main = format!(
            "{}/{}",
            app.program_dir_name(),
            path_file_name(&app.main)
        );

        let mut command = Command::new(interpreter);
        command.arg(&main).current_dir(app_dir.path());
        for (name, value) in &app.args {
            command.arg(name).arg(value);
        }

        info!("Starting desktop app {}: {} {}", app_name, interpreter, main);
        let child = command
            .spawn()
            .map_err(|e| DeckError::Deploy(format!("Failed to start {}: {}", app_name, e)))?;
        self.procs.insert(app_name.to_string(), child);
        Ok(())
    }

    /// Kill an app's process if it is still alive
    pub async fn stop(&mut self, app_name: &str) -> Result<(), DeckError> {
        if let Some(mut child) = self.procs.remove(app_name) {
            if child.try_wait()?.is_none() {
                child
                    .kill()
                    .await
                    .map_err(|e| DeckError::Deploy(format!("Failed to stop {}: {}", app_name, e)))?;
            }
        }
        Ok(())
    }

    /// Whether the app's process is alive right now
    pub fn is_running(&mut self, app_name: &str) -> bool {
        match self.procs.get_mut(app_name) {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Human status label for the card UI
    pub fn status_label(&mut self, app_name: &str) -> &'static str {
        if self.is_running(app_name) {
            "running"
        } else {
            "stopped"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesys::dir::Dir;

    #[tokio::test]
    async fn test_create_symlink_replaces_existing() {
        let temp = Dir::create_temp("stackdeck-symlink").await.unwrap();
        let src_a = temp.subdir("a");
        let src_b = temp.subdir("b");
        src_a.create().await.unwrap();
        src_b.create().await.unwrap();
        let dst = temp.path().join("link");

        create_symlink(src_a.path(), &dst).await.unwrap();
        assert_eq!(fs::read_link(&dst).await.unwrap(), src_a.path());

        create_symlink(src_b.path(), &dst).await.unwrap();
        assert_eq!(fs::read_link(&dst).await.unwrap(), src_b.path());

        temp.delete().await.unwrap();
    }

    #[tokio::test]
    async fn test_status_label_for_unknown_app() {
        let mut procs = DesktopProcs::new();
        assert_eq!(procs.status_label("nope"), "stopped");
    }
}

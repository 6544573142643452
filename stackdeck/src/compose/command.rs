//! Startup script generation
//!
//! Each service runs one generated bash script: ownership and permission
//! normalization, per-app virtual environments with a package-manifest
//! snapshot, PYTHONPATH exports per distinct venv, then sequential app
//! starts with every app but the last backgrounded.
//!
//! Every `$` that must reach the shell is doubled: Compose interpolates
//! `${...}` in the YAML it reads, and only `$$` survives as a literal `$`.

use indexmap::IndexMap;

use crate::errors::DeckError;
use crate::model::App;
use crate::utils::path_file_name;

/// Per-app fields the script needs, extracted once with error checking
struct AppCmd<'a> {
    name: &'a str,
    main: &'a str,
    main_stem: String,
    venv: &'a str,
    args: &'a IndexMap<String, String>,
    data_roots: &'a [String],
}

fn app_cmds<'a>(apps: &'a IndexMap<String, App>) -> Result<Vec<AppCmd<'a>>, DeckError> {
    let mut cmds = Vec::with_capacity(apps.len());
    for (name, app) in apps {
        if app.main.is_empty() {
            return Err(DeckError::ConfigFormat(format!(
                "missing field: main for app {}",
                name
            )));
        }
        let venv = app.venv.as_deref().filter(|v| !v.is_empty()).ok_or_else(|| {
            DeckError::ConfigFormat(format!("missing field: venv for app {}", name))
        })?;
        cmds.push(AppCmd {
            name,
            main: &app.main,
            main_stem: app.main_stem(),
            venv,
            args: &app.args,
            data_roots: &app.data_roots,
        });
    }
    if cmds.is_empty() {
        return Err(DeckError::ConfigFormat(
            "service declares no apps".to_string(),
        ));
    }
    Ok(cmds)
}

/// Build the full `/bin/bash -c '...'` command string for one service
pub fn service_command(user: &str, apps: &IndexMap<String, App>) -> Result<String, DeckError> {
    let cmds = app_cmds(apps)?;
    let first_venv = cmds[0].venv;

    let sections = [
        "set -e".to_string(),
        format!("sudo -n chown -R {user}:{user} /home/{user}"),
        permission_commands(user, &cmds),
        "echo \"Current working directory: $${pwd}\"".to_string(),
        "ls -la".to_string(),
        "echo \"Detecting Python version...\"".to_string(),
        "RAW_VERSION=\"$$(python3 --version)\"".to_string(),
        "FULL_VERSION=\"$${RAW_VERSION#Python }\"".to_string(),
        "PY_VER=\"$$(echo $${FULL_VERSION} | cut -d. -f1,2)\"".to_string(),
        venv_setup_commands(user, &cmds),
        format!("cp -r /opt/version_info/* /home/{user}/version_info/"),
        "rm -rf /opt/version_info/*".to_string(),
        pythonpath_commands(user, &cmds),
        "echo \"Testing libm2k...\"".to_string(),
        format!(
            "PYTHONPATH=$${{PYTHONPATH_{first_venv}}} /home/{user}/venv/{first_venv}/bin/python3 \
             -c \"import libm2k; print(f\\\"libm2k path: {{libm2k.__file__}}\\\")\""
        ),
        "echo \"Starting applications...\"".to_string(),
        format!("mkdir -p /home/{user}/version_info"),
        start_commands(user, &cmds),
    ];

    let script = sections
        .iter()
        .filter(|s| !s.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");

    Ok(format!("/bin/bash -c '{script}'"))
}

/// chmod pass: app files and directories to 0755 (generated info files
/// excluded), data roots to 0777 with 0666 files so they stay writable
/// across containers and from the host.
fn permission_commands(user: &str, cmds: &[AppCmd<'_>]) -> String {
    let mut lines = Vec::new();
    for cmd in cmds {
        let app_path = format!("/home/{}/apps/{}", user, cmd.name);
        lines.push(format!(
            "find {app_path} -type f ! -name 'app_info.json' ! -name 'container_info.json' -exec chmod 755 {{}} \\;"
        ));
        lines.push(format!("find {app_path} -type d -exec chmod 755 {{}} \\;"));

        for host_path in cmd.data_roots {
            let data_path = format!("{}/{}", app_path, path_file_name(host_path));
            lines.push(format!("chmod 777 {data_path}"));
            lines.push(format!("find {data_path} -type d -exec chmod 777 {{}} \\;"));
            lines.push(format!("find {data_path} -type f -exec chmod 666 {{}} \\;"));
        }
    }
    lines.join("\n")
}

/// Per-app venv creation, requirements install and package-list snapshot
fn venv_setup_commands(user: &str, cmds: &[AppCmd<'_>]) -> String {
    let mut lines = Vec::new();
    for cmd in cmds {
        let venv_path = format!("/home/{}/venv/{}", user, cmd.venv);
        let app_path = format!("/home/{}/apps/{}/{}", user, cmd.name, cmd.main_stem);
        lines.push(format!(
            "echo \"Setting up virtual environment for {}...\"",
            cmd.name
        ));
        lines.push(format!(
            "python3 -m venv {venv_path} --clear --system-site-packages"
        ));
        lines.push(format!("echo \"Installing requirements for {}...\"", cmd.name));
        lines.push(format!(
            "{venv_path}/bin/pip install --no-cache-dir -r {app_path}/requirements.txt"
        ));
        lines.push(format!(
            "{venv_path}/bin/pip freeze > /opt/version_info/{}_requirements.txt",
            cmd.name
        ));
    }
    lines.join("\n")
}

/// One PYTHONPATH export per distinct venv, system site-package locations
/// ahead of the venv's own so native extensions resolve to the image's
/// copies.
fn pythonpath_commands(user: &str, cmds: &[AppCmd<'_>]) -> String {
    let mut seen: Vec<&str> = Vec::new();
    let mut lines = Vec::new();
    for cmd in cmds {
        if seen.contains(&cmd.venv) {
            continue;
        }
        seen.push(cmd.venv);

        let venv = cmd.venv;
        let venv_path = format!("/home/{user}/venv/{venv}");
        lines.push(format!(
            "export PYTHONPATH_{venv}=\"/usr/local/lib/python$${{PY_VER}}/dist-packages:\
             /usr/local/lib/python$${{PY_VER}}/site-packages:\
             /usr/lib/python$${{PY_VER}}/dist-packages:\
             /usr/lib/python$${{PY_VER}}/site-packages:\
             {venv_path}/lib/python$${{PY_VER}}/site-packages\""
        ));
        lines.push(format!(
            "echo \"PYTHONPATH for {venv} set to: $${{PYTHONPATH_{venv}}}\""
        ));
    }
    lines.join("\n")
}

/// Start every app in its program directory; all but the last are
/// backgrounded so the container's main process stays attached to the last.
fn start_commands(user: &str, cmds: &[AppCmd<'_>]) -> String {
    let mut lines = Vec::new();
    for (i, cmd) in cmds.iter().enumerate() {
        let background = if i + 1 == cmds.len() { "" } else { "&" };
        let args_str = cmd
            .args
            .iter()
            .map(|(name, value)| format!("{name} {value}"))
            .collect::<Vec<_>>()
            .join(" ");
        let venv = cmd.venv;
        lines.push(format!(
            "cd /home/{user}/apps/{name}/{stem}/ &&\n\
             PYTHONPATH=$${{PYTHONPATH_{venv}}} /home/{user}/venv/{venv}/bin/python3 ./{main} {args_str} {background}",
            name = cmd.name,
            stem = cmd.main_stem,
            main = cmd.main,
        ));
    }
    lines.join("\n")
}

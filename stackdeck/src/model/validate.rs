//! Upfront schema validation
//!
//! One pass over the loaded model that collects every problem, so a broken
//! file is reported completely instead of failing on the first missing key.
//! Required keys are context sensitive: containerized apps need what the
//! compose generation consumes, desktop apps what the launcher consumes.

use crate::model::project::{App, ProjectModel};

/// Validate a loaded model, returning every problem found (empty = valid)
pub fn validate(model: &ProjectModel) -> Vec<String> {
    let mut problems = Vec::new();

    for (service_name, service) in &model.services {
        let at = |field: &str| format!("services.{}.{}", service_name, field);

        if service.user.is_empty() {
            problems.push(format!("missing field: {}", at("user")));
        }
        if service.image.is_empty() {
            problems.push(format!("missing field: {}", at("image")));
        }
        if service.working_dir.is_empty() {
            problems.push(format!("missing field: {}", at("working_dir")));
        }
        if service.dockerfile.is_empty() {
            problems.push(format!("missing field: {}", at("Dockerfile")));
        }
        if service.apps.is_empty() {
            problems.push(format!("{} declares no apps", at("apps")));
        }

        for (app_name, app) in &service.apps {
            let app_path = format!("services.{}.apps.{}", service_name, app_name);

            if app.main.is_empty() {
                problems.push(format!("missing field: {}.main", app_path));
            }
            if app.venv.as_deref().unwrap_or("").is_empty() {
                problems.push(format!("missing field: {}.venv", app_path));
            }
            if app.container_port.is_none() {
                problems.push(format!("missing field: {}.container_port", app_path));
            }
            check_devices(&app_path, app, &mut problems);
        }
    }

    if let Some(desktop) = &model.desktop_apps {
        for (app_name, app) in &desktop.host_machine.apps {
            let app_path = format!("desktop_apps.host_machine.apps.{}", app_name);

            if app.main.is_empty() {
                problems.push(format!("missing field: {}.main", app_path));
            }
            if app.interpreter.as_deref().unwrap_or("").is_empty() {
                problems.push(format!("missing field: {}.interpreter", app_path));
            }
            check_devices(&app_path, app, &mut problems);
        }
    }

    for (name, source) in model.repositories.iter().chain(model.dockerfiles.iter()) {
        if source.url.is_empty() {
            problems.push(format!("missing field: url for source {}", name));
        }
        if source.branch.is_empty() {
            problems.push(format!("missing field: branch for source {}", name));
        }
    }

    problems
}

fn check_devices(app_path: &str, app: &App, problems: &mut Vec<String>) {
    for (device_type, device) in &app.devices {
        if let Err(e) = device.constraints() {
            problems.push(format!("{}.devices.{}: {}", app_path, device_type, e));
        }
    }
}

/// Targets pointing outside their device's address pool.
///
/// The dropdown UI cannot produce these, a hand-edited file can; they are
/// reported as warnings at load time, never as hard errors.
pub fn pool_warnings(model: &ProjectModel) -> Vec<String> {
    let mut warnings = Vec::new();

    let mut scan = |owner: String, app: &App| {
        for (device_type, device) in &app.devices {
            for target in &device.target {
                if !device.ip_addr.contains(target) {
                    warnings.push(format!(
                        "{}.devices.{}: target {} is not in the ip_addr pool",
                        owner, device_type, target
                    ));
                }
            }
        }
    };

    for (service_name, service) in &model.services {
        for (app_name, app) in &service.apps {
            scan(format!("services.{}.apps.{}", service_name, app_name), app);
        }
    }
    if let Some(desktop) = &model.desktop_apps {
        for (app_name, app) in &desktop.host_machine.apps {
            scan(format!("desktop_apps.host_machine.apps.{}", app_name), app);
        }
    }

    warnings
}

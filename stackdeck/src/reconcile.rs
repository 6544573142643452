//! Project-info reconciliation
//!
//! Fans the model out into the denormalized `container_info/` tree consumed
//! by the compose bind-mounts, and folds live runtime facts back into the
//! model. The tree is derived state: fully regenerated on every pass, never
//! merged, never hand-edited.

use indexmap::IndexMap;
use serde::Serialize;

use crate::errors::DeckError;
use crate::layout::BuildContext;
use crate::model::{App, ProjectModel};
use crate::naming::service_container_name;
use crate::runtime::RuntimeSnapshot;

/// Per-service document mounted at `/home/<user>/container_info.json`
#[derive(Debug, Serialize)]
struct ContainerInfoDoc<'a> {
    name: &'a str,
    image: &'a str,
    id: &'a str,
    #[serde(rename = "Dockerfile")]
    dockerfile: &'a str,
    apps: &'a IndexMap<String, App>,
}

/// Regenerate `container_info/<service>/container_info.json` and
/// `container_info/<service>/<app>/app_info.json` for every declared
/// service. Idempotent: an unchanged model produces byte-identical files.
pub async fn denormalize(model: &ProjectModel, ctx: &BuildContext) -> Result<(), DeckError> {
    let root = ctx.container_info_dir();
    root.create().await?;

    for (service_name, service) in &model.services {
        let service_dir = root.subdir(service_name);
        service_dir.create().await?;

        let doc = ContainerInfoDoc {
            name: service_name,
            image: &service.image,
            id: &service.id,
            dockerfile: &service.dockerfile,
            apps: &service.apps,
        };
        service_dir.file("container_info.json").write_json(&doc).await?;

        for (app_name, app) in &service.apps {
            let app_dir = service_dir.subdir(app_name);
            app_dir.create().await?;
            app_dir.file("app_info.json").write_json(app).await?;
        }
    }

    Ok(())
}

/// Fold polled runtime facts into the model: the container id is written
/// unconditionally, the image only when the runtime reports one (the
/// declared image stays authoritative until then). Returns whether the
/// model changed; persistence is the caller's move.
pub fn fold_runtime_facts(
    model: &mut ProjectModel,
    facts: &[RuntimeSnapshot],
    ctx: &BuildContext,
) -> bool {
    let mut changed = false;

    for (service_name, service) in model.services.iter_mut() {
        let container_name = service_container_name(ctx.root(), service_name);
        let Some(fact) = facts.iter().find(|f| f.name == container_name) else {
            continue;
        };

        if service.id != fact.id {
            service.id = fact.id.clone();
            changed = true;
        }
        if !fact.image.is_empty() && service.image != fact.image {
            service.image = fact.image.clone();
            changed = true;
        }
    }

    changed
}

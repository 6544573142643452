//! Source materialization for a build context
//!
//! Repositories are shallow-cloned into `programs/<name>`; Dockerfile
//! sources get a no-checkout clone plus a cone-mode sparse checkout of the
//! single `Dockerfile`, which is then relocated into
//! `dockerfiles/<name>/Dockerfile` and the scratch clone removed. Targets
//! that already exist are skipped, so re-running is cheap.

use std::path::Path;

use tokio::fs;
use tokio::process::Command;
use tracing::info;

use crate::errors::DeckError;
use crate::filesys::dir::Dir;
use crate::layout::BuildContext;
use crate::model::ProjectModel;

async fn run_git(args: &[&str], cwd: Option<&Path>) -> Result<(), DeckError> {
    let mut command = Command::new("git");
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let output = command
        .output()
        .await
        .map_err(|e| DeckError::Fetch(format!("Failed to run git: {}", e)))?;

    if !output.status.success() {
        return Err(DeckError::Fetch(format!(
            "git {} failed: {}",
            args.first().unwrap_or(&""),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(())
}

/// Clone every declared repository absent from `programs/`
pub async fn clone_repositories(model: &ProjectModel, ctx: &BuildContext) -> Result<(), DeckError> {
    if model.repositories.is_empty() {
        return Ok(());
    }

    let programs = ctx.programs_dir();
    programs.create().await?;

    for (repo_name, source) in &model.repositories {
        let target = programs.subdir(repo_name);
        if target.exists().await {
            continue;
        }

        info!("Cloning {} (branch {})...", repo_name, source.branch);
        let target_path = target.path().to_string_lossy().into_owned();
        run_git(
            &[
                "clone",
                "--depth",
                "1",
                "-b",
                &source.branch,
                &source.url,
                target_path.as_str(),
            ],
            None,
        )
        .await?;
        info!("Cloned {}", repo_name);
    }

    Ok(())
}

/// Fetch the `Dockerfile` of every declared Dockerfile source absent from
/// `dockerfiles/<name>/Dockerfile`
pub async fn clone_dockerfiles(model: &ProjectModel, ctx: &BuildContext) -> Result<(), DeckError> {
    if model.dockerfiles.is_empty() {
        return Ok(());
    }

    let dockerfiles = ctx.dockerfiles_dir();
    dockerfiles.create().await?;

    for (name, source) in &model.dockerfiles {
        let target_dir = dockerfiles.subdir(name);
        target_dir.create().await?;
        let target = target_dir.file("Dockerfile");
        if target.exists().await {
            continue;
        }

        info!("Fetching Dockerfile for {} (branch {})...", name, source.branch);
        let scratch = Dir::create_temp("stackdeck-dockerfile").await?;
        let fetched = fetch_single_dockerfile(source, &scratch, target.path()).await;
        scratch.delete().await?;
        fetched?;
        info!("Fetched Dockerfile for {}", name);
    }

    Ok(())
}

async fn fetch_single_dockerfile(
    source: &crate::model::GitSource,
    scratch: &Dir,
    target: &Path,
) -> Result<(), DeckError> {
    let scratch_path = scratch.path().to_string_lossy().into_owned();

    run_git(
        &[
            "clone",
            "--no-checkout",
            "--depth",
            "1",
            "-b",
            &source.branch,
            &source.url,
            scratch_path.as_str(),
        ],
        None,
    )
    .await?;
    run_git(
        &["sparse-checkout", "set", "--cone", "Dockerfile"],
        Some(scratch.path()),
    )
    .await?;
    run_git(&["checkout"], Some(scratch.path())).await?;

    let fetched = scratch.path().join("Dockerfile");
    if !fs::try_exists(&fetched).await.unwrap_or(false) {
        return Err(DeckError::Fetch(format!(
            "Repository {} has no Dockerfile on branch {}",
            source.url, source.branch
        )));
    }

    // Copy rather than rename: the scratch clone may sit on another filesystem
    fs::copy(&fetched, target).await?;
    Ok(())
}

//! Build-context directory layout

use std::path::{Path, PathBuf};

use crate::errors::DeckError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// The user-selected project root: one `project_info.json` plus every
/// artifact derived from it.
#[derive(Debug, Clone)]
pub struct BuildContext {
    root: PathBuf,
}

impl BuildContext {
    /// Create a new build-context reference
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the context root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory name of the context root. This is the Compose project name
    /// and the prefix of every container name.
    pub fn project_name(&self) -> Result<String, DeckError> {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                DeckError::ConfigFormat(format!(
                    "Build context has no directory name: {}",
                    self.root.display()
                ))
            })
    }

    /// Get the project_info.json file
    pub fn project_info_file(&self) -> File {
        File::new(self.root.join("project_info.json"))
    }

    /// Get the generated docker-compose.yml file
    pub fn compose_file(&self) -> File {
        File::new(self.root.join("docker-compose.yml"))
    }

    /// Get the denormalized container_info tree
    pub fn container_info_dir(&self) -> Dir {
        Dir::new(self.root.join("container_info"))
    }

    /// Get the cloned-program directory
    pub fn programs_dir(&self) -> Dir {
        Dir::new(self.root.join("programs"))
    }

    /// Get the fetched-Dockerfile directory
    pub fn dockerfiles_dir(&self) -> Dir {
        Dir::new(self.root.join("dockerfiles"))
    }

    /// Get the desktop-app tree
    pub fn desktop_apps_dir(&self) -> Dir {
        Dir::new(self.root.join("desktop_apps"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_name_is_directory_basename() {
        let ctx = BuildContext::new("/work/bench-rig");
        assert_eq!(ctx.project_name().unwrap(), "bench-rig");
    }

    #[test]
    fn test_derived_paths() {
        let ctx = BuildContext::new("/work/bench-rig");
        assert!(ctx
            .project_info_file()
            .path()
            .ends_with("bench-rig/project_info.json"));
        assert!(ctx.compose_file().path().ends_with("bench-rig/docker-compose.yml"));
        assert!(ctx
            .container_info_dir()
            .path()
            .ends_with("bench-rig/container_info"));
    }
}

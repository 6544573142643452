//! Typed project model: the in-memory form of `project_info.json`

pub mod project;
pub mod validate;

pub use project::{
    App, Device, DeviceConstraints, DesktopApps, GitSource, HostApps, ProjectModel, Service,
};

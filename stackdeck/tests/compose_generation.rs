//! Compose generation integration tests

use indexmap::IndexMap;

use stackdeck::compose::{generate, render::render, save};
use stackdeck::filesys::dir::Dir;
use stackdeck::model::{App, ProjectModel, Service};

fn app(main: &str, venv: &str, port: u16) -> App {
    App {
        main: main.to_string(),
        venv: Some(venv.to_string()),
        container_port: Some(port),
        ..App::default()
    }
}

fn two_app_model() -> ProjectModel {
    let mut apps = IndexMap::new();
    apps.insert("app01".to_string(), app("fg_pg.py", "measure", 8501));
    apps.insert("app02".to_string(), app("scope.py", "analysis", 8502));

    let mut model = ProjectModel::default();
    model.services.insert(
        "fg-pg".to_string(),
        Service {
            user: "bench".to_string(),
            image: "bench-image".to_string(),
            working_dir: "/home/bench".to_string(),
            dockerfile: "bench".to_string(),
            apps,
            ..Service::default()
        },
    );
    model
}

#[test]
fn test_round_trip_volume_count_through_yaml() {
    let doc = generate(&two_app_model()).unwrap();
    let yaml = render(&doc).unwrap();

    let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
    let volumes = parsed["services"]["fg-pg"]["volumes"].as_sequence().unwrap();

    // 2 service-level mounts plus 2 per app
    assert_eq!(volumes.len(), 2 + 2 * 2);
    assert_eq!(
        volumes[0].as_str().unwrap(),
        "./version_info/fg-pg:/home/bench/version_info"
    );
    assert_eq!(
        volumes[1].as_str().unwrap(),
        "./container_info/fg-pg/container_info.json:/home/bench/container_info.json"
    );
    assert_eq!(
        volumes[2].as_str().unwrap(),
        "./programs/fg_pg:/home/bench/apps/app01/fg_pg"
    );
    assert_eq!(
        volumes[3].as_str().unwrap(),
        "./container_info/fg-pg/app01/app_info.json:/home/bench/apps/app01/app_info.json"
    );
    assert_eq!(
        volumes[4].as_str().unwrap(),
        "./programs/scope:/home/bench/apps/app02/scope"
    );
    assert_eq!(
        volumes[5].as_str().unwrap(),
        "./container_info/fg-pg/app02/app_info.json:/home/bench/apps/app02/app_info.json"
    );
}

#[test]
fn test_command_round_trips_as_inline_script() {
    let doc = generate(&two_app_model()).unwrap();
    let yaml = render(&doc).unwrap();

    let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
    let command = parsed["services"]["fg-pg"]["command"].as_str().unwrap();

    assert!(command.starts_with("/bin/bash -c '\n"));
    assert!(command.contains("set -e\n"));
    assert!(command.contains("sudo -n chown -R bench:bench /home/bench"));
    // Both venvs exported, each exactly once
    assert_eq!(command.matches("export PYTHONPATH_measure=").count(), 1);
    assert_eq!(command.matches("export PYTHONPATH_analysis=").count(), 1);
    // First app backgrounded, last app in foreground
    assert!(command.contains("./fg_pg.py  &\n"));
    let tail = command.split("./scope.py").nth(1).unwrap();
    assert!(!tail.contains('&'));
    // Dollars stay doubled all the way to the file
    assert!(command.contains("PYTHONPATH=$${PYTHONPATH_measure}"));
}

#[test]
fn test_document_layout() {
    let doc = generate(&two_app_model()).unwrap();
    let yaml = render(&doc).unwrap();

    assert!(yaml.starts_with("services:\n"));
    assert!(yaml.contains("\n\nnetworks:\n"));
    assert!(yaml.contains("    ports:\n"));
    assert!(yaml.contains("'8501'"));
    assert!(yaml.contains("'8502'"));
    assert!(yaml.contains("    environment:\n"));
    assert!(yaml.contains("- PYTHONPATH"));

    let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(
        parsed["networks"]["default"]["driver"].as_str().unwrap(),
        "bridge"
    );
    assert_eq!(
        parsed["services"]["fg-pg"]["build"]["dockerfile"]
            .as_str()
            .unwrap(),
        "./dockerfiles/bench/Dockerfile"
    );
}

#[tokio::test]
async fn test_save_writes_parseable_file() {
    let temp = Dir::create_temp("stackdeck-compose").await.unwrap();
    let output = temp.file("docker-compose.yml");

    save(&two_app_model(), &output).await.unwrap();

    let written = output.read_string().await.unwrap();
    let parsed: serde_yaml::Value = serde_yaml::from_str(&written).unwrap();
    assert!(parsed["services"]["fg-pg"]["command"].is_string());

    temp.delete().await.unwrap();
}

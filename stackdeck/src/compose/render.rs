//! Compose YAML serialization
//!
//! Two passes: a generic structural dump of the document, then targeted text
//! surgery for exactly the `command` fields, rewriting each into a literal
//! block scalar so the startup script keeps its inline formatting. The
//! quoting contract for the whole file lives in this one function.

use std::sync::OnceLock;

use regex::Regex;

use crate::compose::ComposeFile;
use crate::errors::DeckError;

const BLOCK_INDENT: &str = "      ";

fn bash_wrapper() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^(/bin/bash -c) '(.*)'$").expect("valid regex"))
}

/// Serialize a compose document to the on-disk YAML dialect: 2-space
/// indentation, keys in insertion order, a blank line between top-level
/// blocks, and every `command` as a literal block scalar.
pub fn render(doc: &ComposeFile) -> Result<String, DeckError> {
    // Pass 1: dump with single-line placeholders standing in for the
    // multi-line command scripts.
    let mut shadow = doc.clone();
    let mut commands = Vec::with_capacity(shadow.services.len());
    for (i, (_, service)) in shadow.services.iter_mut().enumerate() {
        let token = format!("__STACKDECK_COMMAND_{}__", i);
        commands.push((token.clone(), std::mem::take(&mut service.command)));
        service.command = token;
    }

    let mut yaml = serde_yaml::to_string(&shadow)?;

    // Pass 2: replace each placeholder with the literal block form.
    for (token, command) in &commands {
        let needle = format!("command: {}", token);
        let block = command_block(command);
        yaml = yaml.replacen(&needle, &block, 1);
    }

    Ok(space_top_level_blocks(&yaml))
}

/// Literal block scalar for a command string. A `/bin/bash -c '<script>'`
/// wrapper is split so the opening quote ends the first line and the closing
/// quote stands alone; script lines are trimmed, empty ones dropped.
fn command_block(command: &str) -> String {
    let mut lines: Vec<String> = vec!["command: |".to_string()];

    if let Some(captures) = bash_wrapper().captures(command) {
        lines.push(format!("{}{} '", BLOCK_INDENT, &captures[1]));
        for line in captures[2].lines() {
            let line = line.trim();
            if !line.is_empty() {
                lines.push(format!("{}{}", BLOCK_INDENT, line));
            }
        }
        lines.push(format!("{}'", BLOCK_INDENT));
    } else {
        for line in command.lines() {
            let line = line.trim();
            if !line.is_empty() {
                lines.push(format!("{}{}", BLOCK_INDENT, line));
            }
        }
    }

    lines.join("\n")
}

/// Insert a blank line before every top-level key after the first
fn space_top_level_blocks(yaml: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for (i, line) in yaml.lines().enumerate() {
        let is_top_level = !line.is_empty() && !line.starts_with(' ') && !line.starts_with('-');
        if i > 0 && is_top_level {
            out.push("");
        }
        out.push(line);
    }
    let mut joined = out.join("\n");
    joined.push('\n');
    joined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{BuildSpec, ComposeService, NetworkSpec};
    use indexmap::IndexMap;

    fn doc_with_command(command: &str) -> ComposeFile {
        let mut services = IndexMap::new();
        services.insert(
            "web".to_string(),
            ComposeService {
                build: BuildSpec {
                    context: ".".to_string(),
                    dockerfile: "./dockerfiles/web/Dockerfile".to_string(),
                },
                image: "web-image".to_string(),
                user: "bench".to_string(),
                working_dir: "/home/bench".to_string(),
                networks: vec!["default".to_string()],
                volumes: vec!["./version_info/web:/home/bench/version_info".to_string()],
                command: command.to_string(),
                ports: vec!["8501".to_string()],
                environment: vec!["PYTHONPATH".to_string()],
            },
        );
        let mut networks = IndexMap::new();
        networks.insert(
            "default".to_string(),
            NetworkSpec {
                driver: "bridge".to_string(),
            },
        );
        ComposeFile { services, networks }
    }

    #[test]
    fn test_command_rewritten_to_literal_block() {
        let doc = doc_with_command("/bin/bash -c 'set -e\necho \"hi\"'");
        let yaml = render(&doc).unwrap();
        assert!(yaml.contains("    command: |\n      /bin/bash -c '\n      set -e\n      echo \"hi\"\n      '\n"));
        assert!(!yaml.contains("__STACKDECK_COMMAND_"));
    }

    #[test]
    fn test_blank_line_between_top_level_blocks() {
        let doc = doc_with_command("/bin/bash -c 'set -e'");
        let yaml = render(&doc).unwrap();
        assert!(yaml.starts_with("services:\n"));
        assert!(yaml.contains("\n\nnetworks:\n"));
    }

    #[test]
    fn test_output_reparses_with_inline_script() {
        let doc = doc_with_command("/bin/bash -c 'set -e\ncd /srv/ &&\npython3 ./main.py '");
        let yaml = render(&doc).unwrap();

        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        let command = parsed["services"]["web"]["command"].as_str().unwrap();
        assert!(command.starts_with("/bin/bash -c '\n"));
        assert!(command.contains("set -e\n"));
        assert!(command.contains("cd /srv/ &&\npython3 ./main.py\n"));
        assert!(command.trim_end().ends_with('\''));
    }

    #[test]
    fn test_key_order_preserved() {
        let doc = doc_with_command("/bin/bash -c 'set -e'");
        let yaml = render(&doc).unwrap();
        let build = yaml.find("build:").unwrap();
        let image = yaml.find("image:").unwrap();
        let volumes = yaml.find("volumes:").unwrap();
        let command = yaml.find("command:").unwrap();
        let ports = yaml.find("ports:").unwrap();
        assert!(build < image && image < volumes && volumes < command && command < ports);
    }
}

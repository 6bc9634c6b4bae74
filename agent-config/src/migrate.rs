//! Versioned config load + migration (A1, §4.18, §6).
//!
//! The shipped template (`templates/config.toml`) is the canonical document:
//! its key order and the comment blocks sitting above each section/key are
//! what a migration must preserve. `toml_edit` is used instead of plain
//! `toml` for the merge step specifically because `serde`'s `Deserialize` /
//! `Serialize` round-trip is comment-blind and would re-flatten the file
//! into whatever order the `Config` struct's fields happen to be declared
//! in, losing both.

use crate::{Config, CURRENT_CONFIG_VERSION};
use std::path::Path;
use thiserror::Error;
use toml_edit::{DocumentMut, Item, Table};

const TEMPLATE: &str = include_str!("../templates/config.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("malformed config at {path}: {source}")]
    ParseEdit {
        path: String,
        #[source]
        source: toml_edit::TomlError,
    },
    #[error("bundled config template is malformed: {0}")]
    Template(#[from] toml_edit::TomlError),
}

/// Loads `config.toml` at `path`, migrating it in place if its `version` is
/// older than [`CURRENT_CONFIG_VERSION`]. A missing file is treated as "no
/// user config yet" and seeded verbatim from the bundled template; any
/// other I/O or parse failure is fatal (§7), since there is no safe
/// recoverable default for a config file that exists but cannot be
/// understood.
pub fn load_or_migrate(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        std::fs::write(path, TEMPLATE).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })?;
        return parse_config(path, TEMPLATE);
    }

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let config: Config = parse_config(path, &raw)?;

    if config.version >= CURRENT_CONFIG_VERSION {
        return Ok(config);
    }

    let backup_path = format!("{}.backup", path.display());
    std::fs::write(&backup_path, &raw).map_err(|source| ConfigError::Write {
        path: backup_path.clone(),
        source,
    })?;
    log::info!(
        "migrating config from version {} to {CURRENT_CONFIG_VERSION}, backup written to {backup_path}",
        config.version
    );

    let old_doc: DocumentMut = raw.parse().map_err(|source| ConfigError::ParseEdit {
        path: path.display().to_string(),
        source,
    })?;
    let mut merged: DocumentMut = TEMPLATE.parse()?;

    overlay_table(merged.as_table_mut(), old_doc.as_table());
    merged["version"] = toml_edit::value(i64::from(CURRENT_CONFIG_VERSION));

    let serialized = merged.to_string();
    std::fs::write(path, &serialized).map_err(|source| ConfigError::Write {
        path: path.display().to_string(),
        source,
    })?;

    parse_config(path, &serialized)
}

fn parse_config(path: &Path, raw: &str) -> Result<Config, ConfigError> {
    toml::from_str(raw).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Overlays every key the old document has in common with the template
/// onto the template, recursing into nested tables. Keys the old document
/// has but the template doesn't (stale/renamed fields) are dropped; keys
/// the template has but the old document doesn't keep the template's
/// default. `version` is excluded — the caller sets it explicitly once the
/// overlay is done.
fn overlay_table(template: &mut Table, old: &Table) {
    for (key, old_item) in old.iter() {
        if key == "version" {
            continue;
        }
        let Some(template_item) = template.get_mut(key) else {
            continue;
        };
        match (template_item, old_item) {
            (Item::Table(template_table), Item::Table(old_table)) => {
                overlay_table(template_table, old_table);
            }
            (Item::Value(template_value), Item::Value(old_value)) => {
                let decor = template_value.decor().clone();
                *template_value = old_value.clone();
                *template_value.decor_mut() = decor;
            }
            // A type mismatch (e.g. a table renamed to a scalar between
            // versions) can't be overlaid meaningfully; keep the
            // template's own default rather than producing an invalid
            // document.
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn template_version_matches_current() {
        let config: Config = toml::from_str(TEMPLATE).unwrap();
        assert_eq!(config.version, CURRENT_CONFIG_VERSION);
    }

    #[test]
    fn missing_file_is_seeded_from_template() {
        let dir = std::env::temp_dir().join(format!("agent-config-test-{}", uuid_like()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        let config = load_or_migrate(&path).unwrap();
        assert_eq!(config.version, CURRENT_CONFIG_VERSION);
        assert!(path.exists());
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("# Configuration template"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn old_version_triggers_backup_and_preserves_user_value() {
        let dir = std::env::temp_dir().join(format!("agent-config-test-{}", uuid_like()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "version = 0\n[bot]\nplayer_name = \"Mai\"\n").unwrap();
        drop(f);

        let config = load_or_migrate(&path).unwrap();
        assert_eq!(config.version, CURRENT_CONFIG_VERSION);
        assert_eq!(config.bot.player_name, "Mai");
        assert!(Path::new(&format!("{}.backup", path.display())).exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn migration_preserves_template_comments_and_defaults_for_untouched_keys() {
        let dir = std::env::temp_dir().join(format!("agent-config-test-{}", uuid_like()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "version = 0\n[llm]\nmodel = \"claude\"\n").unwrap();

        load_or_migrate(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("model = \"claude\""));
        // Untouched default-valued section keeps the template's comment.
        assert!(written.contains("# Logging setup"));
        assert!(written.contains("level = \"info\""));
        std::fs::remove_dir_all(&dir).ok();
    }

    fn uuid_like() -> u128 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    }
}

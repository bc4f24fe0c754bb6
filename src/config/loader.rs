use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value as Json;

use crate::errors::LoadError;
use crate::infrastructure::container::{ProviderBuilder, ServiceProvider, ServiceTree};
use crate::logging::OperationTimer;

/// Expand a leading `~` to the home directory.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::tilde(raw.as_ref());
    PathBuf::from(expanded.as_ref())
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("toml"))
}

/// Load a YAML (or, for `.toml` files, TOML) document as a JSON tree.
/// An empty file yields `null`.
pub fn load_tree(path: &Path) -> Result<Json, LoadError> {
    let path = expand_path(path);
    let text = fs::read_to_string(&path).map_err(|source| LoadError::Read {
        path: path.clone(),
        source,
    })?;

    if text.trim().is_empty() {
        return Ok(Json::Null);
    }

    if is_toml(&path) {
        toml::from_str(&text).map_err(|source| LoadError::Toml { path, source })
    } else {
        serde_yaml::from_str(&text).map_err(|source| LoadError::Yaml { path, source })
    }
}

/// Load a service definition file. The top level must be a mapping; an
/// empty file is an empty set of services.
pub fn load_service_tree(path: &Path) -> Result<ServiceTree, LoadError> {
    match load_tree(path)? {
        Json::Object(services) => Ok(services),
        Json::Null => Ok(ServiceTree::new()),
        _ => Err(LoadError::NotAMapping {
            path: expand_path(path),
        }),
    }
}

/// Build a provider from a service definition file and an optional
/// application configuration file.
pub fn provider_from_files(
    service_path: &Path,
    app_path: Option<&Path>,
    builder: ProviderBuilder,
) -> Result<ServiceProvider, LoadError> {
    let timer = OperationTimer::new("provider_from_files")
        .with_metadata("services", service_path.display());

    let services = load_service_tree(service_path)?;
    let app = app_path.map(load_tree).transpose()?;
    let provider = builder.configure(&services, app)?;

    timer.finish();
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_file(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_yaml_and_toml() {
        let yaml = temp_file(".yaml", "app:\n  key: value\n");
        assert_eq!(load_tree(yaml.path()).unwrap()["app"]["key"], "value");

        let toml = temp_file(".toml", "[app]\nkey = \"value\"\n");
        assert_eq!(load_tree(toml.path()).unwrap()["app"]["key"], "value");
    }

    #[test]
    fn test_empty_service_file_is_empty_tree() {
        let empty = temp_file(".yaml", "");
        assert!(load_service_tree(empty.path()).unwrap().is_empty());
    }

    #[test]
    fn test_service_file_must_be_mapping() {
        let list = temp_file(".yaml", "- a\n- b\n");
        assert!(matches!(
            load_service_tree(list.path()),
            Err(LoadError::NotAMapping { .. })
        ));
    }

    #[test]
    fn test_read_and_parse_errors() {
        let missing = Path::new("/definitely/not/here.yaml");
        assert!(matches!(load_tree(missing), Err(LoadError::Read { .. })));

        let broken = temp_file(".yaml", "key: [unclosed\n");
        assert!(matches!(load_tree(broken.path()), Err(LoadError::Yaml { .. })));

        let broken = temp_file(".toml", "key = \n");
        assert!(matches!(load_tree(broken.path()), Err(LoadError::Toml { .. })));
    }
}

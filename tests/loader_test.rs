//! 配置文件加载集成测试

use std::fs;
use std::path::{Path, PathBuf};

use service_wire::config::{
    provider_from_files, provider_from_sources, MergeOptions, ServiceDefinitionSource,
};
use service_wire::{
    Arguments, BoxError, LoadError, MapEnv, ServiceProvider, SymbolRegistry, Value,
};
use tempfile::TempDir;

const SERVICE_CONF: &str = r#"
serviceA:
  class: app.Greeter
  arguments:
    - "A"
serviceB:
  class: app.Greeter
  arguments:
    - "B"
"#;

const SERVICE_CONF_WITH_NAMESPACES: &str = r#"
service1:
  class: app.Greeter
  named_arguments:
    name: "%greeting.target%"
foo.bar:
  class: app.Greeter
  arguments:
    - "$GREETED"
"#;

struct Greeter {
    name: String,
}

fn registry() -> SymbolRegistry {
    let registry = SymbolRegistry::new();
    registry.register_class("app.Greeter", |args: Arguments| {
        let name = args
            .require(0, "name")?
            .as_str()
            .ok_or("name must be a string")?
            .to_string();
        Ok::<_, BoxError>(Greeter { name })
    });
    registry
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn greeting(provider: &ServiceProvider, name: &str) -> String {
    let value = provider.get(name).unwrap();
    value.downcast::<Greeter>().unwrap().name.clone()
}

#[test]
fn test_provider_from_yaml_files() {
    let dir = TempDir::new().unwrap();
    let services = write(dir.path(), "services.yaml", SERVICE_CONF_WITH_NAMESPACES);
    let app = write(dir.path(), "app.yaml", "greeting:\n  target: World\n");

    let provider = provider_from_files(
        &services,
        Some(&app),
        ServiceProvider::builder()
            .registry(registry())
            .env(MapEnv::new().with("GREETED", "Alice")),
    )
    .unwrap();

    assert_eq!(provider.service_names(), vec!["service1"]);
    assert_eq!(provider.namespaces(), vec!["foo"]);
    assert_eq!(greeting(&provider, "service1"), "World");
    assert_eq!(greeting(&provider, "foo.bar"), "Alice");
}

#[test]
fn test_provider_from_toml_files() {
    let dir = TempDir::new().unwrap();
    let services = write(
        dir.path(),
        "services.toml",
        "[\"entity.hello\"]\nclass = \"app.Greeter\"\narguments = [\"toml\"]\n",
    );

    let provider =
        provider_from_files(&services, None, ServiceProvider::builder().registry(registry()))
            .unwrap();
    assert_eq!(greeting(&provider, "entity.hello"), "toml");
}

#[test]
fn test_build_from_one_source() {
    let dir = TempDir::new().unwrap();
    let conf = write(dir.path(), "service_conf_2.yaml", SERVICE_CONF);

    let p = provider_from_sources(
        &[ServiceDefinitionSource::new("test", &conf)],
        MergeOptions::default(),
        None,
        ServiceProvider::builder().registry(registry()),
    )
    .unwrap();
    assert!(p.service_names().is_empty());
    assert_eq!(p.namespaces(), vec!["test"]);
    assert_eq!(
        p.namespace("test").unwrap().service_names(),
        ["serviceA".to_string(), "serviceB".to_string()]
    );

    let p = provider_from_sources(
        &[ServiceDefinitionSource::at_root("test", &conf)],
        MergeOptions::default(),
        None,
        ServiceProvider::builder().registry(registry()),
    )
    .unwrap();
    assert_eq!(p.service_names(), vec!["serviceA", "serviceB"]);
    assert!(p.namespaces().is_empty());
    assert_eq!(greeting(&p, "serviceB"), "B");
}

#[test]
fn test_build_from_multiple_sources() {
    let dir = TempDir::new().unwrap();
    let conf = write(dir.path(), "service_conf_2.yaml", SERVICE_CONF);
    let with_ns = write(
        dir.path(),
        "service_conf_with_namespaces.yaml",
        SERVICE_CONF_WITH_NAMESPACES,
    );

    let p = provider_from_sources(
        &[
            ServiceDefinitionSource::at_root("test", &conf),
            ServiceDefinitionSource::new("test2", &with_ns),
        ],
        MergeOptions::default(),
        None,
        ServiceProvider::builder().registry(registry()),
    )
    .unwrap();

    assert_eq!(p.service_names(), vec!["serviceA", "serviceB"]);
    assert_eq!(p.namespaces(), vec!["test2"]);
    let test2 = p.namespace("test2").unwrap();
    assert_eq!(test2.service_names(), ["service1".to_string()]);
    assert_eq!(test2.namespaces(), vec!["foo"]);
}

#[test]
fn test_dash_aliases_are_the_same_service() {
    let dir = TempDir::new().unwrap();
    let conf = write(
        dir.path(),
        "dashed.yaml",
        "db-client:\n  class: app.Greeter\n  arguments: [\"db\"]\n",
    );

    let p = provider_from_sources(
        &[ServiceDefinitionSource::new("my-app", &conf)],
        MergeOptions::default(),
        None,
        ServiceProvider::builder().registry(registry()),
    )
    .unwrap();

    assert_eq!(greeting(&p, "my-app.db-client"), "db");
    assert_eq!(greeting(&p, "my_app.db_client"), "db");
    assert_eq!(p.namespaces(), vec!["my-app", "my_app"]);

    let dashed = p.get("my-app.db-client").unwrap();
    assert!(dashed.same_object(&p.get("my_app.db_client").unwrap()));
    assert!(dashed.same_object(&p.namespace("my_app").unwrap().get("db_client").unwrap()));
    assert_eq!(p.stats().cache_misses, 1);

    p.set("my-app.db-client", Value::from("set")).unwrap();
    assert_eq!(p.get("my_app.db_client").unwrap().as_str(), Some("set"));
}

#[test]
fn test_duplicates_across_sources_fail() {
    let dir = TempDir::new().unwrap();
    let first = write(dir.path(), "first.yaml", SERVICE_CONF);
    let second = write(dir.path(), "second.yaml", SERVICE_CONF);

    let err = provider_from_sources(
        &[
            ServiceDefinitionSource::at_root("first", &first),
            ServiceDefinitionSource::at_root("second", &second),
        ],
        MergeOptions::default(),
        None,
        ServiceProvider::builder(),
    )
    .unwrap_err();

    match err {
        LoadError::Merge(merge) => {
            let keys: Vec<_> = merge.duplicates.iter().map(|d| d.key.as_str()).collect();
            assert_eq!(keys, vec!["serviceA", "serviceB"]);
            assert!(merge.duplicates.iter().all(|d| d.previous == first && d.source == second));
        }
        other => panic!("unexpected: {other}"),
    }
}

#[test]
fn test_missing_source_file() {
    let dir = TempDir::new().unwrap();
    let err = provider_from_sources(
        &[ServiceDefinitionSource::new("gone", dir.path().join("gone.yaml"))],
        MergeOptions::default(),
        None,
        ServiceProvider::builder(),
    )
    .unwrap_err();
    assert!(matches!(err, LoadError::Read { .. }));
}

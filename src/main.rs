use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;

use service_wire::args::{Args, Command};
use service_wire::config::{provider_from_sources, MergeOptions, ServiceDefinitionSource};
use service_wire::infrastructure::container::{ArgumentSpec, NameTree};
use service_wire::logging::{init_logging, LoggingConfig};
use service_wire::{DotenvEnv, ServiceProvider};

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(LoggingConfig::from_verbosity(args.verbose))?;

    let provider = build_provider(&args)?;

    match args.command {
        Command::List => {
            print_tree(provider.catalog().names(), 0);
            Ok(ExitCode::SUCCESS)
        }
        Command::Check => Ok(check(&provider)),
    }
}

fn build_provider(args: &Args) -> Result<ServiceProvider> {
    let mut sources: Vec<ServiceDefinitionSource> = args
        .root_sources
        .iter()
        .map(|path| ServiceDefinitionSource::at_root(source_name(path), path.clone()))
        .collect();
    sources.extend(
        args.sources
            .iter()
            .map(|(name, path)| ServiceDefinitionSource::new(name.clone(), path.clone())),
    );
    if sources.is_empty() {
        bail!("no service definitions given, use --source NAME=PATH or --root-source PATH");
    }

    let env = match &args.dotenv {
        None => DotenvEnv::default(),
        Some(None) => DotenvEnv::discover().context("Failed to read .env file")?,
        Some(Some(path)) => DotenvEnv::from_path(path)
            .with_context(|| format!("Failed to read env file '{}'", path.display()))?,
    };

    let options = MergeOptions {
        alt_names_for_dashes: !args.no_dash_aliases,
    };
    let provider = provider_from_sources(
        &sources,
        options,
        args.app_config.as_deref(),
        ServiceProvider::builder().env(env),
    )?;
    Ok(provider)
}

fn source_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_tree(tree: &NameTree, depth: usize) {
    let indent = "  ".repeat(depth);
    for service in tree.service_names() {
        println!("{indent}{service}");
    }
    for namespace in tree.namespaces() {
        println!("{indent}{namespace}/");
        if let Some(child) = tree.namespace(namespace) {
            print_tree(child, depth + 1);
        }
    }
}

fn check(provider: &ServiceProvider) -> ExitCode {
    let catalog = provider.catalog();

    for (service, declaration) in catalog.declarations() {
        for spec in declaration.argument_specs() {
            if let ArgumentSpec::Env { name, default: None } = spec {
                if provider.env().var(name).is_none() {
                    eprintln!("warning: {service}: ${name} is not set and has no default");
                }
            }
        }
    }

    let issues = provider.validate_structure();
    if issues.is_empty() {
        println!("OK: {} services", catalog.len());
        return ExitCode::SUCCESS;
    }
    for issue in &issues {
        eprintln!("error: {issue}");
    }
    eprintln!("{} problem(s) found", issues.len());
    ExitCode::FAILURE
}

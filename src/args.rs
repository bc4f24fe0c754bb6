use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// svcwire - 检查与浏览服务定义文件
#[derive(Parser, Debug)]
#[command(name = "svcwire")]
#[command(about = "Inspect and check service definition files")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Namespaced definition source, `name=path` (repeatable)
    #[arg(long = "source", value_name = "NAME=PATH", value_parser = parse_source, global = true)]
    pub sources: Vec<(String, PathBuf)>,

    /// Definition file merged at the root level (repeatable)
    #[arg(long = "root-source", value_name = "PATH", global = true)]
    pub root_sources: Vec<PathBuf>,

    /// Application configuration file for `%path%` arguments
    #[arg(long, value_name = "PATH", global = true)]
    pub app_config: Option<PathBuf>,

    /// Do not add underscore aliases for keys containing dashes
    #[arg(long, global = true)]
    pub no_dash_aliases: bool,

    /// Layer a `.env` file under the process environment (discovered when no path is given)
    #[arg(long, value_name = "PATH", num_args = 0..=1, global = true)]
    pub dotenv: Option<Option<PathBuf>>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Print namespaces and service names as a tree
    List,
    /// Validate declarations without constructing anything
    Check,
}

fn parse_source(raw: &str) -> Result<(String, PathBuf), String> {
    match raw.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected NAME=PATH, got '{raw}'")),
    }
}

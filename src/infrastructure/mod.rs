//! 基础设施层
//!
//! - 服务容器
//! - 符号注册表
//! - 环境变量来源

pub mod container;
pub mod env;
pub mod registry;

pub use container::{Namespace, ServiceProvider};
pub use env::{DotenvEnv, EnvSource, MapEnv, ProcessEnv};
pub use registry::{Arguments, ServiceFactory, Symbol, SymbolRegistry};

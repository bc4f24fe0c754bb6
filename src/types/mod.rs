pub mod value;

pub use value::{Instance, Value};

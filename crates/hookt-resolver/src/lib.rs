mod error;
mod registry;
mod resolver;

pub use error::ResolveError;
pub use registry::Registry;
pub use resolver::{ResolveContext, Resolver, StandardResolver};

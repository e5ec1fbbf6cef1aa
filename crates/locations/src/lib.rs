pub mod document;
pub mod registry;

pub use document::*;
pub use registry::*;

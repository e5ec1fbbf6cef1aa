pub mod gate;
pub mod store;
mod web;

pub use gate::*;
pub use store::*;
pub use web::LocalStorageStore;

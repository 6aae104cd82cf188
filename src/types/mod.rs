mod models;
mod scope;

pub use models::*;
pub use scope::*;

pub mod config;
pub mod error;
pub mod ids;
pub mod logging;
pub mod query;
pub mod store;
pub mod tags;

pub use error::{CatalogError, CatalogResult};
pub use ids::{RecipeId, TagId};
pub use store::RecipeStore;

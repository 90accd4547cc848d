pub mod search;

pub use search::{SearchQuery, matches_text};

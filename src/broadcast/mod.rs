pub mod models;
pub use models::*;

mod hub;
pub use hub::*;

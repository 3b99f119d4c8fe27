//! Built-in tools the model can call.

pub mod products;
pub mod profile;

pub use products::SearchProductsTool;
pub use profile::{GetProfileTool, UpdateProfileTool};

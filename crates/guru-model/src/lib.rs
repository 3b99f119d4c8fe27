//! guru-model: typed boundary between the conversation engine and the
//! upstream generative model.
//!
//! Concrete providers live outside this workspace; they implement
//! [`ModelAdapter`] and surface their output as a [`ModelEvent`] stream.

pub mod adapter;
pub mod error;
pub mod stream;
pub mod types;

pub use adapter::{ModelAdapter, ModelContext};
pub use error::{Error, Result};
pub use stream::{ModelEvent, ModelEventStream};
pub use types::*;

//! Session domain: model, state axes, and persistence trait.

pub mod model;
pub mod repository;
pub mod state;

pub use model::Session;
pub use repository::SessionRepository;
pub use state::{LifecycleState, Mode, ReviewerRole, ValidationState};

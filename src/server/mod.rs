pub mod form;
mod handlers;
pub mod pagination;
pub mod response;
mod router;
pub mod validation;

pub use router::{AppState, create_router};

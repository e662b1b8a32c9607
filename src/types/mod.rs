mod models;
mod quantity;

pub use models::*;
pub use quantity::{Quantity, QuantityError};

pub mod models;
pub mod parser;
pub mod evaluator;
pub mod services;
pub mod errors;

pub use models::*;
pub use evaluator::{evaluate, CellResolver, ExpressionEvaluator};
pub use services::*;
pub use errors::*;

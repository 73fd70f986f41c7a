pub mod transaction;
pub mod validation;

pub mod validation;

pub use validation::{ValidatedJson, parse_uuid};

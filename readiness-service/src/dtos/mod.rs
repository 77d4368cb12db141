pub mod chat;
pub mod session;
pub mod snapshot;

pub use chat::*;
pub use session::*;
pub use snapshot::*;

use validator::ValidationError;

/// Rejects strings that are empty once trimmed.
pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Message content cannot be blank".into());
        return Err(err);
    }
    Ok(())
}

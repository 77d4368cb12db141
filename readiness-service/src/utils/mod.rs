//! Utility functions.

pub mod token;

pub use token::{
    hash_recovery_token, issue_recovery_token, verify_recovery_token, RecoveryToken,
    RecoveryTokenHash,
};

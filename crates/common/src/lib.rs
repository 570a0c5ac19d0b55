//! Common types shared by the FaydaPass KYC gateway crates

mod secret;
mod error;

pub use secret::Secret;
pub use error::{Error, Result};

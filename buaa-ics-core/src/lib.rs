//! BUAA ICS Core Library
//!
//! This library logs into the BUAA single sign-on portal, fetches weekly
//! timetables from the BUAA app and turns them into ICS calendar files.

pub mod cache;
pub mod error;
pub mod ics;
pub mod providers;
pub mod schedule;
pub mod semester;
pub mod service;
pub mod session;
pub mod types;

// Re-export core types and error handling
pub use error::{AuthFailure, Error, Result};
pub use types::*;

/// Commonly used items
pub mod prelude {
    pub use crate::{
        cache::*, ics::*, providers::buaa::BuaaProvider, providers::*, semester::*, service::*,
        types::*,
    };
}

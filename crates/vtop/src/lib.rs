//! Session client and scraper for the VTOP student portal.
//!
//! [`VtopClient`] logs in through the portal's captcha-guarded form and
//! fetches report pages; [`parser`] turns those pages into the records in
//! [`types`].

pub mod analysis;
pub mod captcha;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod login;
pub mod parser;
pub mod session;
pub mod transport;
pub mod types;

pub use captcha::{CaptchaSolver, HttpCaptchaSolver};
pub use client::{SharedVtopClient, VtopClient};
pub use config::VtopConfig;
pub use error::{ParseIncomplete, VtopError};
pub use login::{LoginState, LoginVerdict};
pub use session::{
    CancelHandle, MemorySessionStore, SavedSession, SessionState, SessionStore,
};
pub use types::*;

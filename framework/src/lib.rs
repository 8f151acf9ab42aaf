//! Mandrill `send-raw` transport for a larger mail-dispatch framework.
//!
//! See [`mail`] for the transport itself and [`config`] for environment
//! handling.

pub mod config;
pub mod mail;

pub use crate::config::EnvConfig;
pub use crate::mail::{MailError, Mailer, Mandrill, MandrillConfig, SendOutcome};

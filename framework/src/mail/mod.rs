//! Outbound delivery through Mandrill's `messages/send-raw` API.
//!
//! A fully rendered MIME message is posted as-is; Mandrill's JSON reply is
//! classified per recipient and reported through an [`EventBus`].
//!
//! # Quick Start
//!
//! ```ignore
//! // 1. Initialize the transport from environment
//! let mut mandrill = Mandrill::from_env()?;
//!
//! // 2. Turn directive headers into send parameters while finalizing headers
//! let headers = mandrill.apply_headers(&headers);
//!
//! // 3. Send the rendered message
//! match mandrill.send(&RawMessage::new(mime), Some(log)).await? {
//!     SendOutcome::Sent => {}
//!     SendOutcome::RejectedBeforeSend => { /* never left the building */ }
//! }
//! ```
//!
//! # Environment Variables
//!
//! [`Mandrill::from_env`] reads:
//!
//! | Variable | Required | Description |
//! |----------|----------|-------------|
//! | `MANDRILL_KEY` | Yes | API key |
//! | `MANDRILL_ENDPOINT` | No | API base (default: `https://mandrillapp.com/api/1.0`) |
//! | `MANDRILL_ASYNC` | No | Async delivery flag (default: `true`) |
//! | `MANDRILL_TRACKING` | No | Suppresses the default `X-MC-Track` header when set |
//! | `MANDRILL_API_TRACKING` | No | Same as `MANDRILL_TRACKING` |
//! | `MANDRILL_SUB_ACCOUNT` | No | Sub-account for every message |
//! | `MANDRILL_TIMEOUT` | No | Request timeout in seconds |
//!
//! At send time the resolver also consults `mandrill_sub_account` and
//! `sendthis_user_agent`.

mod events;
mod headers;
mod http;
mod mailer;
mod message;
mod response;

pub use events::{
    ApplicationName, DeliveryLog, EventBus, EventKind, EventNaming, MailEvent, MemoryEvents,
    MemoryLog, PlainNaming, TracingEvents,
};
pub use headers::{translate, HeaderSet, ParamDeltas, Translation};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use mailer::{Mailer, Mandrill, MandrillBuilder, MandrillConfig};
pub use message::{Messenger, RawMessage};

use thiserror::Error;

/// Directive header names and the provider headers injected for them.
pub mod directives {
    pub const SEND_AT: &str = "X-SendAt";
    pub const ASYNC: &str = "X-Async";
    pub const RETURN_PATH_DOMAIN: &str = "X-ReturnPathDomain";
    pub const TRACK: &str = "X-MC-Track";
    pub const SUBACCOUNT: &str = "X-MC-Subaccount";

    /// Value injected into [`TRACK`] when tracking is not configured.
    pub const DEFAULT_TRACKING: &str = "opens,clicks_htmlonly";

    /// Environment key for a sub-account override.
    pub const SUB_ACCOUNT_ENV: &str = "mandrill_sub_account";
    /// Environment key for a client identifier override.
    pub const USER_AGENT_ENV: &str = "sendthis_user_agent";
}

/// What happened to a send that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Every recipient was accepted by Mandrill.
    Sent,
    /// The message failed its pre-send checks; nothing was sent.
    RejectedBeforeSend,
}

impl SendOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendOutcome::Sent)
    }
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid API Key. Could not connect to Mandrill.")]
    MissingApiKey,

    #[error("failed to load config: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unable to parse response body into JSON: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    #[error("{diagnostic}")]
    Delivery { status: u16, diagnostic: String },
}

//! Mailer trait and the Mandrill implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::directives::USER_AGENT_ENV;
use super::events::{ApplicationName, DeliveryLog, EventBus, EventNaming, PlainNaming, TracingEvents};
use super::headers::{translate, HeaderSet};
use super::http::{HttpClient, HttpResponse, ReqwestClient};
use super::response::{interpret, Reporter};
use super::{MailError, Messenger, SendOutcome};
use crate::config::{EnvConfig, EnvResolver};

const SUBJECT: &str = "Mandrill";
const SEND_RAW: &str = "messages/send-raw";

/// Async email sending trait, called by the surrounding dispatch framework.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    /// Send a rendered message.
    ///
    /// `Ok(RejectedBeforeSend)` means nothing was attempted; any `Err` means
    /// the attempt was made (or could not be configured) and failed.
    async fn send(
        &self,
        message: &dyn Messenger,
        log: Option<Arc<dyn DeliveryLog>>,
    ) -> Result<SendOutcome, MailError>;
}

/// Configuration for the Mandrill transport.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MandrillConfig {
    /// API base URL (default: `https://mandrillapp.com/api/1.0`).
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API key. Sending fails without one.
    #[serde(default)]
    pub key: Option<String>,

    /// Forwarded verbatim as `async` (default: `true`).
    #[serde(rename = "async", default = "default_async")]
    pub async_delivery: Value,

    #[serde(default)]
    pub send_at: Option<String>,

    #[serde(default)]
    pub return_path_domain: Option<String>,

    /// Any value, even `false`, turns off the default tracking header.
    #[serde(default)]
    pub tracking: Option<Value>,

    #[serde(default)]
    pub api_tracking: Option<Value>,

    #[serde(default)]
    pub sub_account: Option<String>,

    /// Request timeout in seconds. Unset keeps reqwest's default.
    #[serde(default)]
    pub timeout: Option<u64>,
}

fn default_endpoint() -> String {
    "https://mandrillapp.com/api/1.0".to_string()
}

fn default_async() -> Value {
    Value::Bool(true)
}

impl Default for MandrillConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            key: None,
            async_delivery: default_async(),
            send_at: None,
            return_path_domain: None,
            tracking: None,
            api_tracking: None,
            sub_account: None,
            timeout: None,
        }
    }
}

impl MandrillConfig {
    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Default::default()
        }
    }
}

/// Transport for Mandrill's `messages/send-raw` endpoint.
///
/// One instance carries one configuration. Header directives applied through
/// [`Mandrill::apply_headers`] stick to the instance, so use one per send when
/// directives differ between messages.
pub struct Mandrill {
    config: MandrillConfig,
    provider_headers: HeaderSet,
    http: Arc<dyn HttpClient>,
    events: Arc<dyn EventBus>,
    naming: Arc<dyn EventNaming>,
    app_name: Arc<dyn ApplicationName>,
    env: EnvResolver,
}

impl Mandrill {
    /// Create a transport from `MANDRILL_*` environment variables.
    pub fn from_env() -> Result<Self, MailError> {
        dotenvy::dotenv().ok();

        let config = MandrillConfig::from_env_with_prefix("MANDRILL")?;

        Self::builder(config).build()
    }

    pub fn builder(config: MandrillConfig) -> MandrillBuilder {
        MandrillBuilder::new(config)
    }

    pub fn config(&self) -> &MandrillConfig {
        &self.config
    }

    /// Translate directive headers, keep the extracted parameters and the
    /// Mandrill-specific headers for the next request, and return the headers
    /// that belong in the message.
    pub fn apply_headers(&mut self, headers: &HeaderSet) -> HeaderSet {
        let translation = translate(headers, &self.config, &self.env);
        translation.params.apply(&mut self.config);

        self.provider_headers = translation
            .headers
            .iter()
            .filter(|(name, _)| name.starts_with("X-MC-"))
            .collect();

        translation.headers
    }

    /// Classify a reply from Mandrill, firing `sent`/`failed` events.
    pub fn handle_response(
        &self,
        response: &HttpResponse,
        message: &dyn Messenger,
        log: Option<Arc<dyn DeliveryLog>>,
    ) -> Result<SendOutcome, MailError> {
        let reporter = Reporter {
            subject: SUBJECT,
            messenger: message,
            log,
            events: self.events.as_ref(),
            naming: self.naming.as_ref(),
        };
        interpret(response, &reporter)
    }

    /// `sendthis_user_agent` when set, else the application name without
    /// whitespace followed by `~Mandrill`.
    pub fn user_agent(&self) -> String {
        self.env.lookup(USER_AGENT_ENV).unwrap_or_else(|| {
            let name: String = self
                .app_name
                .application_name()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            format!("{name}~{SUBJECT}")
        })
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/{}.json", self.config.endpoint.trim_end_matches('/'), action)
    }

    fn request_body(&self, key: &str, message: &dyn Messenger) -> Value {
        let mut body = json!({
            "key": key,
            "raw_message": message.mime(),
            "async": self.config.async_delivery,
        });
        if let Some(send_at) = &self.config.send_at {
            body["send_at"] = json!(send_at);
        }
        if let Some(domain) = &self.config.return_path_domain {
            body["return_path_domain"] = json!(domain);
        }
        body
    }
}

#[async_trait]
impl Mailer for Mandrill {
    async fn send(
        &self,
        message: &dyn Messenger,
        log: Option<Arc<dyn DeliveryLog>>,
    ) -> Result<SendOutcome, MailError> {
        let key = self
            .config
            .key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(MailError::MissingApiKey)?;

        if !message.pre_send() {
            tracing::debug!("message failed pre-send checks, not sending");
            return Ok(SendOutcome::RejectedBeforeSend);
        }

        let url = self.endpoint(SEND_RAW);
        let user_agent = self.user_agent();
        tracing::debug!(%url, %user_agent, "posting raw message to Mandrill");

        let mut headers = vec![("User-Agent".to_string(), user_agent)];
        headers.extend(
            self.provider_headers
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string())),
        );

        let body = self.request_body(key, message);
        let response = self.http.post_json(&url, &headers, &body).await?;

        self.handle_response(&response, message, log)
    }
}

/// Wires a [`Mandrill`] transport to its collaborators.
pub struct MandrillBuilder {
    config: MandrillConfig,
    http: Option<Arc<dyn HttpClient>>,
    events: Arc<dyn EventBus>,
    naming: Arc<dyn EventNaming>,
    app_name: Arc<dyn ApplicationName>,
    env: Option<EnvResolver>,
}

impl MandrillBuilder {
    fn new(config: MandrillConfig) -> Self {
        Self {
            config,
            http: None,
            events: Arc::new(TracingEvents),
            naming: Arc::new(PlainNaming),
            app_name: Arc::new("SendThis"),
            env: None,
        }
    }

    pub fn http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn events(mut self, events: Arc<dyn EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn event_naming(mut self, naming: Arc<dyn EventNaming>) -> Self {
        self.naming = naming;
        self
    }

    pub fn application_name(mut self, name: impl ApplicationName + 'static) -> Self {
        self.app_name = Arc::new(name);
        self
    }

    /// Defaults to [`EnvResolver::system`].
    pub fn env(mut self, env: EnvResolver) -> Self {
        self.env = Some(env);
        self
    }

    pub fn build(self) -> Result<Mandrill, MailError> {
        let http: Arc<dyn HttpClient> = match (self.http, self.config.timeout) {
            (Some(http), _) => http,
            (None, Some(secs)) => Arc::new(ReqwestClient::with_timeout(Duration::from_secs(secs))?),
            (None, None) => Arc::new(ReqwestClient::new()),
        };

        Ok(Mandrill {
            config: self.config,
            provider_headers: HeaderSet::new(),
            http,
            events: self.events,
            naming: self.naming,
            app_name: self.app_name,
            env: self.env.unwrap_or_else(EnvResolver::system),
        })
    }
}

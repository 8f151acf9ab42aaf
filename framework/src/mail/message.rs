//! The rendered message handed to the transport.

/// A composed message, as far as the transport needs to know it.
pub trait Messenger: Send + Sync {
    /// Final checks before anything goes over the network.
    fn pre_send(&self) -> bool;

    /// The full MIME document.
    fn mime(&self) -> String;

    /// Message id assigned while rendering, if any.
    fn last_message_id(&self) -> Option<String>;
}

/// A message that was rendered elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    mime: String,
    message_id: Option<String>,
}

impl RawMessage {
    pub fn new(mime: impl Into<String>) -> Self {
        Self {
            mime: mime.into(),
            message_id: None,
        }
    }

    /// Override the id otherwise read from the `Message-ID` header.
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.mime
            .lines()
            .take_while(|line| !line.trim().is_empty())
            .find_map(|line| {
                let (key, value) = line.split_once(':')?;
                key.trim()
                    .eq_ignore_ascii_case(name)
                    .then(|| value.trim())
            })
    }
}

impl Messenger for RawMessage {
    fn pre_send(&self) -> bool {
        !self.mime.trim().is_empty()
    }

    fn mime(&self) -> String {
        self.mime.clone()
    }

    fn last_message_id(&self) -> Option<String> {
        self.message_id
            .clone()
            .or_else(|| self.header("Message-ID").map(str::to_string))
    }
}

impl Messenger for lettre::Message {
    fn pre_send(&self) -> bool {
        !self.envelope().to().is_empty()
    }

    fn mime(&self) -> String {
        String::from_utf8_lossy(&self.formatted()).into_owned()
    }

    fn last_message_id(&self) -> Option<String> {
        self.headers()
            .get_raw("Message-ID")
            .map(|id| id.trim().to_string())
    }
}

//! Directive headers and their translation into send parameters.

use serde_json::Value;

use super::directives::{
    ASYNC, DEFAULT_TRACKING, RETURN_PATH_DOMAIN, SEND_AT, SUBACCOUNT, SUB_ACCOUNT_ENV, TRACK,
};
use super::MandrillConfig;
use crate::config::EnvResolver;

/// Ordered header name/value pairs. Names are matched exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    entries: Vec<(String, String)>,
}

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Replace the value in place when the header exists, append otherwise.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = HeaderSet::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// Send parameters lifted out of directive headers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamDeltas {
    pub send_at: Option<String>,
    /// Kept as the raw header text.
    pub async_delivery: Option<Value>,
    pub return_path_domain: Option<String>,
}

impl ParamDeltas {
    pub fn is_empty(&self) -> bool {
        self.send_at.is_none() && self.async_delivery.is_none() && self.return_path_domain.is_none()
    }

    pub fn apply(self, config: &mut MandrillConfig) {
        if let Some(send_at) = self.send_at {
            config.send_at = Some(send_at);
        }
        if let Some(async_delivery) = self.async_delivery {
            config.async_delivery = async_delivery;
        }
        if let Some(domain) = self.return_path_domain {
            config.return_path_domain = Some(domain);
        }
    }
}

/// Headers to put on the wire plus the parameters taken out of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Translation {
    pub headers: HeaderSet,
    pub params: ParamDeltas,
}

/// Consume directive headers and inject Mandrill's tracking and sub-account
/// headers. The input set is left untouched.
pub fn translate(headers: &HeaderSet, config: &MandrillConfig, env: &EnvResolver) -> Translation {
    let mut headers = headers.clone();
    let mut params = ParamDeltas::default();

    if let Some(send_at) = headers.remove(SEND_AT) {
        params.send_at = Some(send_at);
    }

    // Presence alone counts, even for "" or "false".
    if let Some(value) = headers.remove(ASYNC) {
        params.async_delivery = Some(Value::String(value));
    }

    if let Some(domain) = headers.remove(RETURN_PATH_DOMAIN) {
        params.return_path_domain = Some(domain);
    }

    if !headers.contains(TRACK) && config.tracking.is_none() && config.api_tracking.is_none() {
        headers.insert(TRACK, DEFAULT_TRACKING);
    }

    let sub_account = config
        .sub_account
        .clone()
        .or_else(|| env.lookup(SUB_ACCOUNT_ENV));
    if let Some(sub_account) = sub_account {
        headers.insert(SUBACCOUNT, sub_account);
    }

    Translation { headers, params }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvMap;

    fn untracked() -> MandrillConfig {
        MandrillConfig {
            tracking: Some(Value::Bool(false)),
            ..Default::default()
        }
    }

    #[test]
    fn directives_become_params() {
        let headers = HeaderSet::new()
            .with("Subject", "Hello")
            .with(SEND_AT, "2026-10-20 09:00:00")
            .with(ASYNC, "false")
            .with(RETURN_PATH_DOMAIN, "bounce.example.com");

        let t = translate(&headers, &untracked(), &EnvResolver::new());

        assert_eq!(t.params.send_at.as_deref(), Some("2026-10-20 09:00:00"));
        assert_eq!(t.params.async_delivery, Some(Value::String("false".into())));
        assert_eq!(t.params.return_path_domain.as_deref(), Some("bounce.example.com"));
        assert!(!t.headers.contains(SEND_AT));
        assert!(!t.headers.contains(ASYNC));
        assert!(!t.headers.contains(RETURN_PATH_DOMAIN));
        assert_eq!(t.headers.get("Subject"), Some("Hello"));
    }

    #[test]
    fn empty_async_directive_still_applies() {
        let headers = HeaderSet::new().with(ASYNC, "");

        let t = translate(&headers, &untracked(), &EnvResolver::new());

        assert_eq!(t.params.async_delivery, Some(Value::String(String::new())));
        assert!(t.headers.is_empty());
    }

    #[test]
    fn directive_lookup_is_case_sensitive() {
        let headers = HeaderSet::new().with("x-sendat", "tomorrow");

        let t = translate(&headers, &untracked(), &EnvResolver::new());

        assert!(t.params.is_empty());
        assert_eq!(t.headers.get("x-sendat"), Some("tomorrow"));
    }

    #[test]
    fn input_headers_are_not_mutated() {
        let headers = HeaderSet::new().with(SEND_AT, "now");

        let _ = translate(&headers, &untracked(), &EnvResolver::new());

        assert_eq!(headers.get(SEND_AT), Some("now"));
    }

    #[test]
    fn injects_default_tracking_when_unconfigured() {
        let t = translate(
            &HeaderSet::new(),
            &MandrillConfig::default(),
            &EnvResolver::new(),
        );

        assert_eq!(t.headers.get(TRACK), Some(DEFAULT_TRACKING));
    }

    #[test]
    fn tracking_flags_suppress_injection() {
        let general = MandrillConfig {
            tracking: Some(Value::Bool(true)),
            ..Default::default()
        };
        let api = MandrillConfig {
            api_tracking: Some(Value::String("opens,clicks".into())),
            ..Default::default()
        };

        for config in [general, api] {
            let t = translate(&HeaderSet::new(), &config, &EnvResolver::new());
            assert!(!t.headers.contains(TRACK));
        }
    }

    #[test]
    fn explicit_tracking_header_is_kept() {
        let headers = HeaderSet::new().with(TRACK, "opens");

        let t = translate(&headers, &MandrillConfig::default(), &EnvResolver::new());

        assert_eq!(t.headers.get(TRACK), Some("opens"));
        assert_eq!(t.headers.len(), 1);
    }

    #[test]
    fn configured_sub_account_beats_environment() {
        let config = MandrillConfig {
            sub_account: Some("configured".into()),
            ..untracked()
        };
        let env = EnvResolver::new().with_source(EnvMap::new().with(SUB_ACCOUNT_ENV, "from-env"));

        let t = translate(&HeaderSet::new(), &config, &env);

        assert_eq!(t.headers.get(SUBACCOUNT), Some("configured"));
    }

    #[test]
    fn sub_account_falls_back_to_environment_in_order() {
        let env = EnvResolver::new()
            .with_source(EnvMap::new())
            .with_source(EnvMap::new().with(SUB_ACCOUNT_ENV, "second"));

        let t = translate(&HeaderSet::new(), &untracked(), &env);

        assert_eq!(t.headers.get(SUBACCOUNT), Some("second"));
    }

    #[test]
    fn no_sub_account_anywhere() {
        let t = translate(&HeaderSet::new(), &untracked(), &EnvResolver::new());

        assert!(!t.headers.contains(SUBACCOUNT));
    }

    #[test]
    fn deltas_apply_to_config() {
        let mut config = MandrillConfig::default();
        ParamDeltas {
            send_at: Some("later".into()),
            async_delivery: Some(Value::String("0".into())),
            return_path_domain: None,
        }
        .apply(&mut config);

        assert_eq!(config.send_at.as_deref(), Some("later"));
        assert_eq!(config.async_delivery, Value::String("0".into()));
        assert_eq!(config.return_path_domain, None);
    }

    #[test]
    fn header_set_keeps_insertion_order() {
        let headers: HeaderSet = [("B", "2"), ("A", "1"), ("B", "3")].into_iter().collect();

        let names: Vec<_> = headers.iter().collect();
        assert_eq!(names, vec![("B", "3"), ("A", "1")]);
    }
}

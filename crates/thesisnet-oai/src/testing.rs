//! Scripted [`Transport`] for tests without network access.
//!
//! Responses are matched by substring of the requested URL; the first rule
//! whose needle occurs wins. Unmatched requests get a 404.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use thesisnet_core::{ProxyResponse, Transport, TransportError};

#[derive(Default)]
pub struct ScriptedTransport {
    rules: Vec<(String, Result<ProxyResponse, TransportError>)>,
    stalls: Vec<(String, Duration)>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer URLs containing `needle` with `status` and `body`.
    pub fn respond(mut self, needle: &str, status: u16, body: impl Into<String>) -> Self {
        self.rules
            .push((needle.to_string(), Ok(ProxyResponse::new(status, body))));
        self
    }

    /// Fail URLs containing `needle` before any response arrives.
    pub fn fail(mut self, needle: &str, err: TransportError) -> Self {
        self.rules.push((needle.to_string(), Err(err)));
        self
    }

    /// Hold requests for URLs containing `needle` for `delay` before answering.
    pub fn stall(mut self, needle: &str, delay: Duration) -> Self {
        self.stalls.push((needle.to_string(), delay));
        self
    }

    /// Every URL requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count_matching(&self, needle: &str) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|url| url.contains(needle))
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, target: &str) -> Result<ProxyResponse, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(target.to_string());
        let stall = self
            .stalls
            .iter()
            .find(|(needle, _)| target.contains(needle.as_str()))
            .map(|(_, delay)| *delay);
        match stall {
            Some(delay) => tokio::time::sleep(delay).await,
            // Suspend like a real request would, so interleavings are observable
            None => tokio::task::yield_now().await,
        }
        self.rules
            .iter()
            .find(|(needle, _)| target.contains(needle.as_str()))
            .map(|(_, answer)| answer.clone())
            .unwrap_or_else(|| Ok(ProxyResponse::new(404, "not found")))
    }
}

/// Wrap Dublin Core elements into a `ListRecords` response.
///
/// `records` are `(header identifier, dc body)` pairs; `token` becomes the
/// resumption token (an empty token element is written when `None`).
pub fn list_records_body(records: &[(&str, &str)], token: Option<&str>) -> String {
    let mut body = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/"><ListRecords>"#,
    );
    for (id, dc) in records {
        body.push_str(&format!(
            r#"<record><header><identifier>{id}</identifier></header><metadata><oai_dc:dc xmlns:oai_dc="http://www.openarchives.org/OAI/2.0/oai_dc/" xmlns:dc="http://purl.org/dc/elements/1.1/">{dc}</oai_dc:dc></metadata></record>"#
        ));
    }
    match token {
        Some(token) => body.push_str(&format!("<resumptionToken>{token}</resumptionToken>")),
        None => body.push_str("<resumptionToken/>"),
    }
    body.push_str("</ListRecords></OAI-PMH>");
    body
}

/// Minimal `Identify` response.
pub fn identify_body(repository_name: &str, admin_email: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/"><Identify><repositoryName>{repository_name}</repositoryName><baseURL>https://r.example/oai</baseURL><protocolVersion>2.0</protocolVersion><adminEmail>{admin_email}</adminEmail></Identify></OAI-PMH>"#
    )
}

/// OAI `<error>` response.
pub fn error_body(code: &str, message: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/"><error code="{code}">{message}</error></OAI-PMH>"#
    )
}

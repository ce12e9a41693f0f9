//! OAI-PMH client: `Identify` probes and `ListRecords` pages
//!
//! All requests go through a [`Transport`] (the proxy collaborator) and are
//! bounded by a timeout. The client holds no per-institution state; the
//! resumption token is owned by the caller.

use std::time::Duration;

use serde::Serialize;
use thesisnet_core::{Transport, with_timeout};

use crate::error::OaiError;
use crate::registry::Institution;
use crate::xml::{self, Element};

/// Metadata format requested on the first `ListRecords` call
pub const METADATA_PREFIX: &str = "oai_dc";

/// Outcome of an `Identify` probe. Never an error: failures are `online: false`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReachabilityResult {
    pub online: bool,
    pub admin_email: Option<String>,
    pub repository_name: Option<String>,
    /// Base URL that answered (primary or fallback)
    pub base_url: Option<String>,
    /// Diagnostic for offline results
    pub message: Option<String>,
}

impl ReachabilityResult {
    fn offline(message: impl Into<String>) -> Self {
        Self {
            online: false,
            message: Some(message.into()),
            ..Default::default()
        }
    }
}

/// One `<record>` element as received, not yet normalized.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawRecord(Element);

impl RawRecord {
    /// Parse a standalone `<record>` document.
    pub fn parse(xml: &str) -> Result<Self, OaiError> {
        let root = xml::parse(xml)?;
        if root.local_name() == "record" {
            return Ok(Self(root));
        }
        root.first("record")
            .cloned()
            .map(Self)
            .ok_or_else(|| OaiError::Malformed("no <record> element".to_string()))
    }

    pub fn element(&self) -> &Element {
        &self.0
    }

    /// `<header><identifier>` value.
    pub fn header_identifier(&self) -> Option<&str> {
        self.0
            .child("header")
            .and_then(|h| h.child("identifier"))
            .map(Element::text)
            .filter(|t| !t.is_empty())
    }

    /// Header marked `status="deleted"`.
    pub fn is_deleted(&self) -> bool {
        self.0
            .child("header")
            .and_then(|h| h.attr("status"))
            .is_some_and(|s| s.eq_ignore_ascii_case("deleted"))
    }

    /// The `<metadata>` child, absent for deleted records.
    pub fn metadata(&self) -> Option<&Element> {
        self.0.child("metadata")
    }
}

/// Records of one `ListRecords` response plus the continuation cursor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    pub records: Vec<RawRecord>,
    /// Absent when this was the last page
    pub next_token: Option<String>,
    /// `completeListSize` advertised on the resumption token, if any
    pub complete_list_size: Option<usize>,
}

/// `base?verb=Identify`
pub fn identify_url(base: &str) -> String {
    with_query(base, &[("verb", "Identify")])
}

/// First page asks for `oai_dc`; continuation pages carry only the token.
pub fn list_records_url(base: &str, token: Option<&str>) -> String {
    match token {
        Some(token) => with_query(base, &[("verb", "ListRecords"), ("resumptionToken", token)]),
        None => with_query(
            base,
            &[("verb", "ListRecords"), ("metadataPrefix", METADATA_PREFIX)],
        ),
    }
}

fn with_query(base: &str, params: &[(&str, &str)]) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{base}{sep}{query}")
}

/// OAI `<error>` element directly under the response root.
fn protocol_error(root: &Element) -> Option<OaiError> {
    let err = root.child("error")?;
    Some(OaiError::Protocol {
        code: err.attr("code").unwrap_or("unknown").to_string(),
        message: err.text().to_string(),
    })
}

pub struct OaiClient<T> {
    transport: T,
    timeout: Duration,
}

impl<T: Transport> OaiClient<T> {
    pub fn new(transport: T, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Probe `institution` with `Identify`, trying the fallback base when the
    /// primary does not answer. Never fails; see [`ReachabilityResult`].
    pub async fn identify(&self, institution: &Institution) -> ReachabilityResult {
        let mut last = ReachabilityResult::offline("no base URL configured");
        for base in institution.candidate_bases() {
            let result = self.identify_base(base).await;
            if result.online {
                log::debug!("{}: online at {base}", institution.name);
                return result;
            }
            log::debug!(
                "{}: Identify failed at {base}: {}",
                institution.name,
                result.message.as_deref().unwrap_or("?")
            );
            last = result;
        }
        last
    }

    async fn identify_base(&self, base: &str) -> ReachabilityResult {
        let url = identify_url(base);
        let body = match with_timeout(self.timeout, self.transport.get(&url)).await {
            Ok(response) => match response.into_success() {
                Ok(body) => body,
                Err(e) => return ReachabilityResult::offline(e.to_string()),
            },
            Err(e) => return ReachabilityResult::offline(e.to_string()),
        };

        let root = match xml::parse(&body) {
            Ok(root) => root,
            Err(e) => return ReachabilityResult::offline(e.to_string()),
        };
        if let Some(err) = protocol_error(&root) {
            return ReachabilityResult::offline(err.to_string());
        }
        let Some(identify) = root.first("Identify") else {
            return ReachabilityResult::offline("response has no Identify element");
        };

        let field = |local: &str| {
            identify
                .child(local)
                .map(Element::text)
                .filter(|t| !t.is_empty())
                .map(String::from)
        };
        ReachabilityResult {
            online: true,
            admin_email: field("adminEmail"),
            repository_name: field("repositoryName"),
            base_url: Some(base.to_string()),
            message: None,
        }
    }

    /// Fetch one `ListRecords` page from the institution's active base.
    pub async fn fetch_page(
        &self,
        institution: &Institution,
        token: Option<&str>,
    ) -> Result<Page, OaiError> {
        let url = list_records_url(institution.base_url(), token);
        let body = with_timeout(self.timeout, self.transport.get(&url))
            .await?
            .into_success()?;
        parse_page(&body)
    }
}

/// Interpret a `ListRecords` response body.
pub fn parse_page(body: &str) -> Result<Page, OaiError> {
    let root = xml::parse(body)?;
    if let Some(err) = protocol_error(&root) {
        return Err(err);
    }

    let records: Vec<RawRecord> = match root.child("ListRecords") {
        Some(list) => list
            .children()
            .iter()
            .filter(|c| c.local_name() == "record")
            .cloned()
            .map(RawRecord)
            .collect(),
        None => root.descendants("record").into_iter().cloned().map(RawRecord).collect(),
    };

    let token_el = root.first("resumptionToken");
    let next_token = token_el
        .map(Element::text)
        .filter(|t| !t.is_empty())
        .map(String::from);
    let complete_list_size = token_el
        .and_then(|t| t.attr("completeListSize"))
        .and_then(|s| s.trim().parse().ok());

    Ok(Page {
        records,
        next_token,
        complete_list_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identify_url_shape() {
        assert_eq!(
            identify_url("https://open.uct.ac.za/server/oai/request"),
            "https://open.uct.ac.za/server/oai/request?verb=Identify"
        );
    }

    #[test]
    fn first_page_requests_oai_dc() {
        let url = list_records_url("https://r.example/oai", None);
        assert_eq!(url, "https://r.example/oai?verb=ListRecords&metadataPrefix=oai_dc");
    }

    #[test]
    fn continuation_carries_only_token() {
        let url = list_records_url("https://r.example/oai", Some("xyz123"));
        assert_eq!(url, "https://r.example/oai?verb=ListRecords&resumptionToken=xyz123");
        assert!(!url.contains("metadataPrefix"));
    }

    #[test]
    fn token_is_encoded() {
        let url = list_records_url("https://r.example/oai", Some("oai_dc////100"));
        assert!(url.ends_with("resumptionToken=oai_dc%2F%2F%2F%2F100"));
    }

    #[test]
    fn base_with_query_appends() {
        assert_eq!(
            identify_url("https://r.example/oai?set=etd"),
            "https://r.example/oai?set=etd&verb=Identify"
        );
    }

    #[test]
    fn parse_page_with_token() {
        let body = r#"<OAI-PMH><ListRecords>
            <record><header><identifier>oai:x:1</identifier></header><metadata/></record>
            <record><header status="deleted"><identifier>oai:x:2</identifier></header></record>
            <resumptionToken completeListSize="250" cursor="0">xyz123</resumptionToken>
        </ListRecords></OAI-PMH>"#;
        let page = parse_page(body).unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.next_token.as_deref(), Some("xyz123"));
        assert_eq!(page.complete_list_size, Some(250));
        assert_eq!(page.records[0].header_identifier(), Some("oai:x:1"));
        assert!(!page.records[0].is_deleted());
        assert!(page.records[1].is_deleted());
        assert!(page.records[1].metadata().is_none());
    }

    #[test]
    fn empty_token_ends_harvest() {
        let body = r#"<OAI-PMH><ListRecords><record/><resumptionToken completeListSize="1"/></ListRecords></OAI-PMH>"#;
        let page = parse_page(body).unwrap();
        assert_eq!(page.next_token, None);
    }

    #[test]
    fn protocol_error_surfaces() {
        let body = r#"<OAI-PMH><error code="noRecordsMatch">No matching records</error></OAI-PMH>"#;
        let err = parse_page(body).unwrap_err();
        assert!(err.is_no_records_match());
    }

    #[test]
    fn garbage_body_is_malformed() {
        let err = parse_page("<html><body>Bad gateway").unwrap_err();
        assert!(matches!(err, OaiError::Malformed(_)));
    }

    #[test]
    fn raw_record_parses_standalone() {
        let record = RawRecord::parse(
            r#"<record><header><identifier>oai:x:9</identifier></header></record>"#,
        )
        .unwrap();
        assert_eq!(record.header_identifier(), Some("oai:x:9"));
        assert!(RawRecord::parse("<header/>").is_err());
        assert!(RawRecord::parse("<record>").is_err());
    }

    mod scripted {
        use super::*;
        use crate::testing::{ScriptedTransport, error_body, identify_body, list_records_body};
        use thesisnet_core::TransportError;

        const BASE: &str = "https://r.example/server/oai/request";
        const OLD_BASE: &str = "https://r.example/oai/request";

        fn client(transport: ScriptedTransport) -> OaiClient<ScriptedTransport> {
            OaiClient::new(transport, Duration::from_secs(1))
        }

        #[tokio::test]
        async fn identify_reads_repository_fields() {
            let transport = ScriptedTransport::new().respond(
                "verb=Identify",
                200,
                identify_body("OpenUCT", "openuct@uct.ac.za"),
            );
            let result = client(transport)
                .identify(&Institution::new("UCT", "South Africa", BASE))
                .await;
            assert!(result.online);
            assert_eq!(result.repository_name.as_deref(), Some("OpenUCT"));
            assert_eq!(result.admin_email.as_deref(), Some("openuct@uct.ac.za"));
            assert_eq!(result.base_url.as_deref(), Some(BASE));
        }

        #[tokio::test]
        async fn identify_503_is_offline() {
            let transport = ScriptedTransport::new().respond("verb=Identify", 503, "busy");
            let result = client(transport)
                .identify(&Institution::new("Wits", "South Africa", BASE))
                .await;
            assert!(!result.online);
            assert_eq!(result.message.as_deref(), Some("HTTP 503"));
        }

        #[tokio::test]
        async fn identify_error_element_is_offline() {
            let transport = ScriptedTransport::new().respond(
                "verb=Identify",
                200,
                error_body("badVerb", "Illegal verb"),
            );
            let result = client(transport)
                .identify(&Institution::new("UFS", "South Africa", BASE))
                .await;
            assert!(!result.online);
        }

        #[tokio::test]
        async fn identify_tries_fallback() {
            let transport = ScriptedTransport::new()
                .fail(BASE, TransportError::network("connection refused"))
                .respond(OLD_BASE, 200, identify_body("UFS", "a@ufs.ac.za"));
            let client = client(transport);
            let inst = Institution::new("UFS", "South Africa", BASE).with_fallback(OLD_BASE);
            let result = client.identify(&inst).await;
            assert!(result.online);
            assert_eq!(result.base_url.as_deref(), Some(OLD_BASE));
            assert_eq!(client.transport().requests().len(), 2);
        }

        #[tokio::test]
        async fn fetch_page_follows_token() {
            let transport = ScriptedTransport::new()
                .respond(
                    "resumptionToken=xyz123",
                    200,
                    list_records_body(&[("oai:r:2", "<dc:type>Thesis</dc:type>")], None),
                )
                .respond(
                    "metadataPrefix=oai_dc",
                    200,
                    list_records_body(&[("oai:r:1", "<dc:type>Thesis</dc:type>")], Some("xyz123")),
                );
            let client = client(transport);
            let inst = Institution::new("R", "", BASE);

            let first = client.fetch_page(&inst, None).await.unwrap();
            assert_eq!(first.next_token.as_deref(), Some("xyz123"));
            let second = client.fetch_page(&inst, Some("xyz123")).await.unwrap();
            assert_eq!(second.next_token, None);
            assert_eq!(second.records[0].header_identifier(), Some("oai:r:2"));

            let requests = client.transport().requests();
            assert!(requests[1].contains("resumptionToken=xyz123"));
            assert!(!requests[1].contains("metadataPrefix"));
        }

        #[tokio::test]
        async fn fetch_page_maps_status_to_transport() {
            let transport = ScriptedTransport::new().respond("ListRecords", 502, "bad gateway");
            let err = client(transport)
                .fetch_page(&Institution::new("R", "", BASE), None)
                .await
                .unwrap_err();
            assert!(err.is_transport());
        }
    }
}

//! Dublin Core record → [`HarvestRecord`]
//!
//! Field lookup is by local name only. Records that do not look like a thesis
//! or dissertation are dropped here, at harvest time: the cache only ever holds
//! thesis-like items.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::client::RawRecord;
use crate::record::{Classification, HarvestRecord, UNTITLED};

/// Superset vocabulary: anything matching is thesis-like.
static THESIS_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"thesis|dissertation|doctoral|masters|m\.?sc|mphil|dphil|ph\.?d").expect("valid regex")
});

/// Doctoral-level vocabulary; also the strict `dissertation` harvest filter.
static DOCTORAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"dissertation|ph\.?d|doctoral|dphil").expect("valid regex"));

/// Strict `thesis` harvest filter.
static MASTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"thesis|masters|m\.?sc").expect("valid regex"));

static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("valid regex"));

/// Year at the start of a date value; also matches compact `20190501`.
static DATE_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}").expect("valid regex"));

/// Role marker inside a contributor value: "(Supervisor)", "advisor:", "Co-supervisor"
static ROLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[\(\[]?\b(?:co-?)?(?:advisor|supervisor)\b[\)\]]?\s*:?").expect("valid regex")
});

/// Classify from types + first description. `None` means "not thesis-like".
pub fn classify(types: &[String], description: &str) -> Option<Classification> {
    classify_haystack(&haystack(types, description))
}

fn haystack(types: &[String], description: &str) -> String {
    format!("{} {}", types.join(" "), description).to_lowercase()
}

fn classify_haystack(hay: &str) -> Option<Classification> {
    if !THESIS_LIKE.is_match(hay) {
        return None;
    }
    if DOCTORAL.is_match(hay) {
        Some(Classification::Dissertation)
    } else {
        Some(Classification::Thesis)
    }
}

/// Strict harvest-time check; `Unknown` (or no filter) admits everything.
fn passes_strict(hay: &str, filter: Classification) -> bool {
    match filter {
        Classification::Thesis => MASTERS.is_match(hay),
        Classification::Dissertation => DOCTORAL.is_match(hay),
        Classification::Unknown => true,
    }
}

/// First `(19|20)\d{2}` token in `text`.
pub fn year_token(text: &str) -> Option<&str> {
    year_span(text).map(|span| &text[span])
}

/// Byte range of the first year token in `text`.
pub fn year_span(text: &str) -> Option<Range<usize>> {
    YEAR.find(text).map(|m| m.range())
}

/// Year from the date values in order, then from the description.
pub fn extract_year(dates: &[String], description: &str) -> String {
    dates
        .iter()
        .find_map(|d| DATE_YEAR.find(d).map(|m| m.as_str()))
        .or_else(|| year_token(description))
        .unwrap_or_default()
        .to_string()
}

/// Best outbound link: web URL, then handle, then DOI, else empty.
pub fn pick_link(identifiers: &[String]) -> String {
    let ids = || identifiers.iter().map(|i| i.trim());

    if let Some(url) = ids().find(|id| {
        let lower = id.to_ascii_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    }) {
        return url.to_string();
    }
    if let Some(handle) = ids().find(|id| id.contains("hdl.handle.net")) {
        return format!("https://{}", handle.trim_start_matches('/'));
    }
    if let Some(doi) = ids().find(|id| id.starts_with("10.")) {
        return format!("https://doi.org/{doi}");
    }
    String::new()
}

/// Contributor values that name an advisor/supervisor, role marker removed.
///
/// A contributor qualifies when its element name (`contributor.advisor`) or
/// its text mentions the role.
fn advisors(metadata: &crate::xml::Element) -> Vec<String> {
    metadata
        .find_all(|e| e.local_name().starts_with("contributor"))
        .into_iter()
        .filter_map(|e| {
            let name = e.local_name().to_ascii_lowercase();
            let text = e.text();
            let by_name = name.contains("advisor") || name.contains("supervisor");
            if !by_name && !ROLE.is_match(text) {
                return None;
            }
            let cleaned = ROLE.replace_all(text, "");
            let cleaned = cleaned.trim().trim_matches(|c: char| c == ',' || c == ';').trim();
            (!cleaned.is_empty()).then(|| cleaned.to_string())
        })
        .collect()
}

/// Normalize one raw record harvested from `institution`.
///
/// Returns `None` for records without metadata (deleted/reassigned) and for
/// records that are not thesis-like. With `type_filter`, records failing the
/// narrower vocabulary are dropped as well.
pub fn normalize(
    raw: &RawRecord,
    institution: &str,
    type_filter: Option<Classification>,
) -> Option<HarvestRecord> {
    if raw.is_deleted() {
        log::debug!("{institution}: skipping deleted record {:?}", raw.header_identifier());
        return None;
    }
    let Some(md) = raw.metadata() else {
        log::debug!("{institution}: record {:?} has no metadata", raw.header_identifier());
        return None;
    };

    let mut descriptions = md.texts("description");
    descriptions.extend(md.texts("abstract"));
    let description = descriptions.into_iter().next().unwrap_or_default();
    let raw_types = md.texts("type");

    let hay = haystack(&raw_types, &description);
    let classification = classify_haystack(&hay)?;
    if let Some(filter) = type_filter {
        if !passes_strict(&hay, filter) {
            return None;
        }
    }

    let dates = md.texts("date");
    let identifiers = md.texts("identifier");

    Some(HarvestRecord {
        identifier: raw.header_identifier().unwrap_or_default().to_string(),
        title: md
            .texts("title")
            .into_iter()
            .next()
            .unwrap_or_else(|| UNTITLED.to_string()),
        creators: md.texts("creator"),
        year: extract_year(&dates, &description),
        date: dates.first().cloned().unwrap_or_default(),
        description,
        subjects: md.texts("subject"),
        raw_types,
        classification,
        link: pick_link(&identifiers),
        institution: institution.to_string(),
        advisors: advisors(md),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn record(dc_body: &str) -> RawRecord {
        RawRecord::parse(&format!(
            r#"<record xmlns:dc="http://purl.org/dc/elements/1.1/">
                 <header><identifier>oai:test:1</identifier></header>
                 <metadata><oai_dc:dc xmlns:oai_dc="http://www.openarchives.org/OAI/2.0/oai_dc/">{dc_body}</oai_dc:dc></metadata>
               </record>"#
        ))
        .unwrap()
    }

    #[test]
    fn classify_vocabulary() {
        assert_eq!(classify(&strings(&["Thesis"]), ""), Some(Classification::Thesis));
        assert_eq!(classify(&strings(&["Masters"]), ""), Some(Classification::Thesis));
        assert_eq!(classify(&strings(&[]), "MSc thesis"), Some(Classification::Thesis));
        assert_eq!(classify(&strings(&["MPhil"]), ""), Some(Classification::Thesis));
        assert_eq!(
            classify(&strings(&["Thesis"]), "Thesis (PhD)--University of Cape Town"),
            Some(Classification::Dissertation)
        );
        assert_eq!(classify(&strings(&["Doctoral"]), ""), Some(Classification::Dissertation));
        assert_eq!(classify(&strings(&["DPhil"]), ""), Some(Classification::Dissertation));
        assert_eq!(classify(&strings(&["Article"]), "A journal paper"), None);
    }

    #[test]
    fn year_prefers_dates_then_description() {
        assert_eq!(extract_year(&strings(&["n.d.", "2019-05-01T10:00:00Z"]), "2001"), "2019");
        assert_eq!(extract_year(&strings(&["n.d."]), "Submitted in 2004."), "2004");
        assert_eq!(extract_year(&strings(&[]), "no year here"), "");
        assert_eq!(extract_year(&strings(&["1850"]), ""), "");
        assert_eq!(extract_year(&strings(&["20190501"]), "2001"), "2019");
    }

    #[test]
    fn year_token_in_query() {
        assert_eq!(year_token("water 2020 cape"), Some("2020"));
        assert_eq!(year_token("12020"), None);
        assert_eq!(year_span("x12020 water 2020"), Some(13..17));
        assert_eq!(year_token("water"), None);
    }

    #[test]
    fn link_doi_only() {
        assert_eq!(pick_link(&strings(&["10.1000/xyz"])), "https://doi.org/10.1000/xyz");
    }

    #[test]
    fn link_http_beats_doi() {
        assert_eq!(
            pick_link(&strings(&["10.1000/xyz", "http://hdl.handle.net/11427/1"])),
            "http://hdl.handle.net/11427/1"
        );
    }

    #[test]
    fn link_bare_handle_gets_https() {
        assert_eq!(
            pick_link(&strings(&["Mokoena T (2019)", "hdl.handle.net/10539/28813", "10.1/x"])),
            "https://hdl.handle.net/10539/28813"
        );
    }

    #[test]
    fn link_empty_when_nothing_usable() {
        assert_eq!(pick_link(&strings(&["Mokoena, T. 2019. Water."])), "");
        assert_eq!(pick_link(&[]), "");
    }

    #[test]
    fn normalize_full_record() {
        let raw = record(
            r#"<dc:title>Groundwater recharge in the Karoo</dc:title>
               <dc:creator>Mokoena, Thabo</dc:creator>
               <dc:contributor>Botha, J. (Supervisor)</dc:contributor>
               <dc:contributor>Department of Geology</dc:contributor>
               <dc:subject>Hydrology</dc:subject>
               <dc:description>Thesis (MSc)--University of Cape Town, 2018.</dc:description>
               <dc:type>Master Thesis</dc:type>
               <dc:date>2019-02-11T08:00:00Z</dc:date>
               <dc:identifier>Mokoena, T. 2019. Groundwater.</dc:identifier>
               <dc:identifier>http://hdl.handle.net/11427/30001</dc:identifier>"#,
        );
        let rec = normalize(&raw, "UCT", None).unwrap();
        assert_eq!(rec.identifier, "oai:test:1");
        assert_eq!(rec.title, "Groundwater recharge in the Karoo");
        assert_eq!(rec.creators, vec!["Mokoena, Thabo"]);
        assert_eq!(rec.advisors, vec!["Botha, J."]);
        assert_eq!(rec.subjects, vec!["Hydrology"]);
        assert_eq!(rec.raw_types, vec!["Master Thesis"]);
        assert_eq!(rec.classification, Classification::Thesis);
        assert_eq!(rec.year, "2019");
        assert_eq!(rec.date, "2019-02-11T08:00:00Z");
        assert_eq!(rec.link, "http://hdl.handle.net/11427/30001");
        assert_eq!(rec.institution, "UCT");
    }

    #[test]
    fn normalize_drops_non_thesis() {
        let raw = record(
            r#"<dc:title>Annual report</dc:title>
               <dc:type>Report</dc:type>
               <dc:description>Financial statements</dc:description>"#,
        );
        assert!(normalize(&raw, "UCT", None).is_none());
    }

    #[test]
    fn normalize_untitled_placeholder() {
        let raw = record("<dc:type>Thesis</dc:type>");
        let rec = normalize(&raw, "UCT", None).unwrap();
        assert_eq!(rec.title, UNTITLED);
        assert_eq!(rec.year, "");
        assert_eq!(rec.link, "");
    }

    #[test]
    fn abstract_used_when_description_missing() {
        let raw = record(
            r#"<dc:type>Text</dc:type><dcterms:abstract>A doctoral study of 2011 floods</dcterms:abstract>"#,
        );
        let rec = normalize(&raw, "UKZN", None).unwrap();
        assert_eq!(rec.description, "A doctoral study of 2011 floods");
        assert_eq!(rec.classification, Classification::Dissertation);
        assert_eq!(rec.year, "2011");
    }

    #[test]
    fn description_comes_before_abstract() {
        let raw = record(
            r#"<dc:type>Thesis</dc:type>
               <dcterms:abstract>Second</dcterms:abstract>
               <dc:description>First</dc:description>"#,
        );
        assert_eq!(normalize(&raw, "UCT", None).unwrap().description, "First");
    }

    #[test]
    fn contributor_advisor_element_name() {
        let raw = record(
            r#"<dc:type>Thesis</dc:type><dim:contributor.advisor>Naidoo, P.</dim:contributor.advisor>"#,
        );
        assert_eq!(normalize(&raw, "UKZN", None).unwrap().advisors, vec!["Naidoo, P."]);
    }

    #[test]
    fn strict_filter_drops_at_harvest() {
        let masters = record("<dc:type>Masters thesis</dc:type>");
        let doctoral = record("<dc:type>Doctoral</dc:type>");

        let thesis = Some(Classification::Thesis);
        let dissertation = Some(Classification::Dissertation);
        assert!(normalize(&masters, "UCT", thesis).is_some());
        assert!(normalize(&masters, "UCT", dissertation).is_none());
        assert!(normalize(&doctoral, "UCT", dissertation).is_some());
        assert!(normalize(&doctoral, "UCT", thesis).is_none());
    }

    #[test]
    fn missing_metadata_is_skipped() {
        let raw = RawRecord::parse(
            r#"<record><header><identifier>oai:test:2</identifier></header></record>"#,
        )
        .unwrap();
        assert!(normalize(&raw, "UCT", None).is_none());
    }

    #[test]
    fn deleted_record_is_skipped() {
        let raw = RawRecord::parse(
            r#"<record><header status="deleted"><identifier>x</identifier></header>
               <metadata><dc><type>Thesis</type></dc></metadata></record>"#,
        )
        .unwrap();
        assert!(normalize(&raw, "UCT", None).is_none());
    }
}

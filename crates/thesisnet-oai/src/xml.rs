//! Namespace-agnostic XML access using quick-xml
//!
//! OAI-PMH responses from different DSpace versions disagree on namespace
//! prefixes (`dc:title`, `oai_dc:dc`, default namespaces, none at all), so
//! everything here is keyed by *local* name only. The whole response is read
//! into a small owned tree; pages are a few hundred KB at most.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Failure to read a document as XML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlError(pub String);

impl std::fmt::Display for XmlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "XML parse error: {}", self.0)
    }
}

impl std::error::Error for XmlError {}

fn xml_err(e: impl std::fmt::Display) -> XmlError {
    XmlError(e.to_string())
}

/// One element with its local name, attributes and flattened text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn from_start(e: &BytesStart<'_>) -> Result<Self, XmlError> {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
        let mut attrs = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(xml_err)?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.unescape_value().map_err(xml_err)?.into_owned();
            attrs.push((key, value));
        }
        Ok(Self {
            name,
            attrs,
            ..Default::default()
        })
    }

    /// Local name, prefix stripped (`dc:title` -> `title`).
    pub fn local_name(&self) -> &str {
        &self.name
    }

    /// Text of this element and all descendants in document order, trimmed.
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// Attribute value by local name.
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == local)
            .map(|(_, v)| v.as_str())
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// First direct child with the given local name.
    pub fn child(&self, local: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == local)
    }

    /// All descendants (not self) with the given local name, document order.
    pub fn descendants(&self, local: &str) -> Vec<&Element> {
        self.find_all(|e| e.name == local)
    }

    /// All descendants (not self) accepted by `pred`, document order.
    pub fn find_all(&self, pred: impl Fn(&Element) -> bool) -> Vec<&Element> {
        let mut out = Vec::new();
        collect(self, &pred, &mut out);
        out
    }

    /// First descendant with the given local name.
    pub fn first(&self, local: &str) -> Option<&Element> {
        self.children.iter().find_map(|c| {
            if c.name == local {
                Some(c)
            } else {
                c.first(local)
            }
        })
    }

    /// Trimmed, non-empty texts of all descendants named `local`.
    pub fn texts(&self, local: &str) -> Vec<String> {
        self.descendants(local)
            .into_iter()
            .map(Element::text)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect()
    }
}

fn collect<'a>(el: &'a Element, pred: &impl Fn(&Element) -> bool, out: &mut Vec<&'a Element>) {
    for child in &el.children {
        if pred(child) {
            out.push(child);
        }
        collect(child, pred, out);
    }
}

/// Parse a document and return its root element.
pub fn parse(xml: &str) -> Result<Element, XmlError> {
    let mut reader = Reader::from_str(xml.trim_start_matches('\u{feff}'));
    // Keep inner whitespace so "<i>a</i> <b>b</b>" flattens to "a b"
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(e) => stack.push(Element::from_start(&e)?),
            Event::Empty(e) => {
                let el = Element::from_start(&e)?;
                close(el, &mut stack, &mut root)?;
            }
            Event::End(_) => {
                let el = stack
                    .pop()
                    .ok_or_else(|| XmlError("unmatched end tag".to_string()))?;
                close(el, &mut stack, &mut root)?;
            }
            Event::Text(e) => {
                if let Some(top) = stack.last_mut() {
                    match e.unescape() {
                        Ok(text) => top.text.push_str(&text),
                        // Unknown entities (&nbsp; in abstracts) keep their raw form
                        Err(_) => top.text.push_str(&String::from_utf8_lossy(&e)),
                    }
                }
            }
            Event::CData(e) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(XmlError(format!(
            "unexpected end of document inside <{}>",
            stack.last().map(|e| e.name.as_str()).unwrap_or_default()
        )));
    }
    root.ok_or_else(|| XmlError("document has no root element".to_string()))
}

/// Attach a finished element to its parent (or make it the root).
fn close(el: Element, stack: &mut [Element], root: &mut Option<Element>) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.text.push_str(&el.text);
            parent.children.push(el);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(el);
            Ok(())
        }
        None => Err(XmlError("multiple root elements".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OAI_DC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
  <ListRecords>
    <record>
      <header><identifier>oai:open.uct.ac.za:11427/1</identifier></header>
      <metadata>
        <oai_dc:dc xmlns:oai_dc="http://www.openarchives.org/OAI/2.0/oai_dc/"
                   xmlns:dc="http://purl.org/dc/elements/1.1/">
          <dc:title>Water &amp; sanitation</dc:title>
          <dc:creator>Mokoena, T.</dc:creator>
          <dc:creator>Naidoo, P.</dc:creator>
          <title>Unprefixed</title>
        </oai_dc:dc>
      </metadata>
    </record>
  </ListRecords>
</OAI-PMH>"#;

    #[test]
    fn local_names_ignore_prefixes() {
        let root = parse(OAI_DC).unwrap();
        assert_eq!(root.local_name(), "OAI-PMH");
        let dc = root.first("dc").unwrap();
        assert_eq!(dc.texts("title"), vec!["Water & sanitation", "Unprefixed"]);
        assert_eq!(dc.texts("creator"), vec!["Mokoena, T.", "Naidoo, P."]);
    }

    #[test]
    fn child_is_direct_only() {
        let root = parse(OAI_DC).unwrap();
        assert!(root.child("ListRecords").is_some());
        assert!(root.child("record").is_none());
        assert_eq!(root.descendants("record").len(), 1);
    }

    #[test]
    fn nested_markup_flattens() {
        let root = parse("<a><b>Effects of <i>E. coli</i> on <sub>x</sub>soil</b></a>").unwrap();
        assert_eq!(root.first("b").unwrap().text(), "Effects of E. coli on xsoil");
    }

    #[test]
    fn attributes_by_local_name() {
        let root = parse(r#"<r><error code="badResumptionToken">expired</error></r>"#).unwrap();
        let err = root.child("error").unwrap();
        assert_eq!(err.attr("code"), Some("badResumptionToken"));
        assert_eq!(err.text(), "expired");
        assert_eq!(err.attr("missing"), None);
    }

    #[test]
    fn empty_elements_are_kept() {
        let root = parse(r#"<r><resumptionToken completeListSize="10"/></r>"#).unwrap();
        let token = root.first("resumptionToken").unwrap();
        assert_eq!(token.text(), "");
        assert_eq!(token.attr("completeListSize"), Some("10"));
    }

    #[test]
    fn cdata_is_text() {
        let root = parse("<r><description><![CDATA[a < b]]></description></r>").unwrap();
        assert_eq!(root.texts("description"), vec!["a < b"]);
    }

    #[test]
    fn unknown_entity_keeps_raw_text() {
        let root = parse("<r><d>a&nbsp;b</d></r>").unwrap();
        assert!(root.first("d").unwrap().text().contains("nbsp"));
    }

    #[test]
    fn truncated_document_fails() {
        assert!(parse("<OAI-PMH><ListRecords><record>").is_err());
    }

    #[test]
    fn non_xml_fails() {
        assert!(parse("").is_err());
        assert!(parse("<html><body>502 Bad Gateway</body></html></extra>").is_err());
    }

    #[test]
    fn bom_is_ignored() {
        let root = parse("\u{feff}<r/>").unwrap();
        assert_eq!(root.local_name(), "r");
    }
}

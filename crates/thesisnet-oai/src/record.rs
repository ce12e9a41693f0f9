//! Normalized record model

use serde::{Deserialize, Serialize};

/// Placeholder title for records without a `dc:title`
pub const UNTITLED: &str = "(Untitled)";

/// Degree-level classification derived from type and description text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Thesis,
    Dissertation,
    #[default]
    Unknown,
}

impl Classification {
    /// Parse CLI/config string; `all` and empty mean "no constraint" and yield `None`.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "thesis" | "theses" => Some(Self::Thesis),
            "dissertation" | "dissertations" => Some(Self::Dissertation),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Thesis => "thesis",
            Self::Dissertation => "dissertation",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One Dublin Core record after normalization.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HarvestRecord {
    /// OAI header identifier (`oai:host:handle`), empty when absent
    pub identifier: String,
    pub title: String,
    pub creators: Vec<String>,
    /// First description/abstract value
    pub description: String,
    pub subjects: Vec<String>,
    pub raw_types: Vec<String>,
    pub classification: Classification,
    /// Four-digit year or empty
    pub year: String,
    /// First raw `dc:date` value
    pub date: String,
    /// Best-effort outbound URL or empty
    pub link: String,
    /// Name of the institution the record was harvested from
    pub institution: String,
    pub advisors: Vec<String>,
}

impl HarvestRecord {
    /// Identity used to merge repeated harvests: the link, or
    /// `title|institution|year` when there is no link.
    pub fn pool_key(&self) -> String {
        if self.link.is_empty() {
            format!("{}|{}|{}", self.title, self.institution, self.year)
        } else {
            self.link.clone()
        }
    }

    /// Lowercased text searched by free-text queries.
    pub fn haystack(&self) -> String {
        let mut hay = String::with_capacity(self.title.len() + self.description.len() + 128);
        for part in [self.title.as_str(), self.description.as_str()] {
            hay.push_str(part);
            hay.push(' ');
        }
        for list in [&self.creators, &self.subjects, &self.advisors] {
            for item in list {
                hay.push_str(item);
                hay.push(' ');
            }
        }
        hay.push_str(&self.institution);
        hay.to_lowercase()
    }
}

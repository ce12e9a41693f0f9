//! Known repositories and their reachability
//!
//! The registry is configuration, not code: adding a repository means adding
//! an `InstitutionSpec` (TOML `[[institutions]]` entry). DSpace 6 vs 7 path
//! differences are expressed as a `fallback` base URL.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::client::ReachabilityResult;

/// Built-in South African DSpace endpoints: (name, country, base)
const BUILTIN: &[(&str, &str, &str)] = &[
    ("University of Cape Town (UCT)", "South Africa", "https://open.uct.ac.za/server/oai/request"),
    ("Stellenbosch University (SUNScholar)", "South Africa", "https://scholar.sun.ac.za/server/oai/request"),
    ("University of Pretoria (UPSpace)", "South Africa", "https://repository.up.ac.za/server/oai/request"),
    ("Wits (WIReDSpace)", "South Africa", "https://wiredspace.wits.ac.za/server/oai/request"),
    ("North-West University (NWU)", "South Africa", "https://repository.nwu.ac.za/server/oai/request"),
    ("University of KwaZulu-Natal (UKZN)", "South Africa", "https://researchspace.ukzn.ac.za/server/oai/request"),
    ("University of the Free State (UFS)", "South Africa", "https://scholar.ufs.ac.za/server/oai/request"),
    ("University of the Western Cape (UWC)", "South Africa", "https://etd.uwc.ac.za/server/oai/request"),
    ("University of South Africa (UNISA)", "South Africa", "https://uir.unisa.ac.za/server/oai/request"),
    ("Cape Peninsula University of Technology (CPUT)", "South Africa", "https://etd.cput.ac.za/server/oai/request"),
    ("Central University of Technology (CUT)", "South Africa", "https://cutscholar.cut.ac.za/server/oai/request"),
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Reachability {
    #[default]
    Unknown,
    Online,
    Offline,
}

impl std::fmt::Display for Reachability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::Online => "online",
            Self::Offline => "offline",
        })
    }
}

/// Static description of a repository, as written in configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct InstitutionSpec {
    pub name: String,
    #[serde(default)]
    pub country: String,
    /// Primary OAI base URL (without `?verb=`)
    pub base: String,
    /// Alternative base tried when the primary does not answer `Identify`
    #[serde(default)]
    pub fallback: Option<String>,
}

/// A repository plus what the session has learned about it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Institution {
    pub name: String,
    pub country: String,
    pub primary: String,
    pub fallback: Option<String>,
    active_base: String,
    reachability: Reachability,
    admin_email: Option<String>,
    repository_name: Option<String>,
    last_message: Option<String>,
}

impl Institution {
    pub fn new(name: impl Into<String>, country: impl Into<String>, primary: impl Into<String>) -> Self {
        let primary = primary.into();
        Self {
            name: name.into(),
            country: country.into(),
            active_base: primary.clone(),
            primary,
            fallback: None,
            reachability: Reachability::Unknown,
            admin_email: None,
            repository_name: None,
            last_message: None,
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    pub fn from_spec(spec: &InstitutionSpec) -> Self {
        let inst = Self::new(spec.name.trim(), spec.country.trim(), spec.base.trim());
        match spec.fallback.as_deref().map(str::trim) {
            Some(fallback) if !fallback.is_empty() => inst.with_fallback(fallback),
            _ => inst,
        }
    }

    /// Base URL used for harvesting: primary unless only the fallback answered.
    pub fn base_url(&self) -> &str {
        &self.active_base
    }

    /// Primary then fallback, in probing order.
    pub fn candidate_bases(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.fallback.as_deref())
    }

    pub fn reachability(&self) -> Reachability {
        self.reachability
    }

    pub fn is_offline(&self) -> bool {
        self.reachability == Reachability::Offline
    }

    pub fn admin_email(&self) -> Option<&str> {
        self.admin_email.as_deref()
    }

    pub fn repository_name(&self) -> Option<&str> {
        self.repository_name.as_deref()
    }

    /// Diagnostic from the last failed probe or harvest.
    pub fn last_message(&self) -> Option<&str> {
        self.last_message.as_deref()
    }

    /// Record the outcome of an `Identify` probe.
    pub fn apply_reachability(&mut self, result: &ReachabilityResult) {
        if result.online {
            self.reachability = Reachability::Online;
            if let Some(base) = &result.base_url {
                self.active_base = base.clone();
            }
            if result.admin_email.is_some() {
                self.admin_email = result.admin_email.clone();
            }
            if result.repository_name.is_some() {
                self.repository_name = result.repository_name.clone();
            }
            self.last_message = None;
        } else {
            self.reachability = Reachability::Offline;
            self.last_message = result.message.clone();
        }
    }

    /// Mark unreachable after a transport failure outside of `Identify`.
    pub fn mark_offline(&mut self, message: impl Into<String>) {
        self.reachability = Reachability::Offline;
        self.last_message = Some(message.into());
    }
}

/// Ordered set of institutions, unique by name.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    institutions: Vec<Institution>,
}

impl Registry {
    /// The built-in South African repository list.
    pub fn builtin() -> Self {
        Self {
            institutions: BUILTIN
                .iter()
                .map(|(name, country, base)| Institution::new(*name, *country, *base))
                .collect(),
        }
    }

    /// Build from configuration entries, rejecting blanks and duplicates.
    pub fn from_specs(specs: &[InstitutionSpec]) -> Result<Self> {
        let mut registry = Self::default();
        for spec in specs {
            if spec.name.trim().is_empty() {
                bail!("institution entry with empty name (base {:?})", spec.base);
            }
            if spec.base.trim().is_empty() {
                bail!("institution {:?} has no base URL", spec.name);
            }
            registry.push(Institution::from_spec(spec))?;
        }
        Ok(registry)
    }

    pub fn push(&mut self, institution: Institution) -> Result<()> {
        if self.get(&institution.name).is_some() {
            bail!("duplicate institution {:?}", institution.name);
        }
        self.institutions.push(institution);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Institution> {
        self.institutions.iter().find(|i| i.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Institution> {
        self.institutions.iter_mut().find(|i| i.name == name)
    }

    /// Resolve user input to an institution: exact name, then
    /// case-insensitive name, then a unique case-insensitive substring
    /// (so `uct` finds "University of Cape Town (UCT)").
    pub fn resolve(&self, query: &str) -> Option<&Institution> {
        let query = query.trim();
        if let Some(exact) = self.get(query) {
            return Some(exact);
        }
        let lower = query.to_lowercase();
        if let Some(ci) = self.institutions.iter().find(|i| i.name.to_lowercase() == lower) {
            return Some(ci);
        }
        let mut hits = self
            .institutions
            .iter()
            .filter(|i| i.name.to_lowercase().contains(&lower));
        match (hits.next(), hits.next()) {
            (Some(only), None) if !lower.is_empty() => Some(only),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Institution> {
        self.institutions.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.institutions.iter().map(|i| i.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.institutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.institutions.is_empty()
    }
}

impl FromIterator<Institution> for Registry {
    /// Later duplicates are dropped; use `from_specs` to reject them instead.
    fn from_iter<I: IntoIterator<Item = Institution>>(iter: I) -> Self {
        let mut registry = Self::default();
        for institution in iter {
            let _ = registry.push(institution);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, base: &str) -> InstitutionSpec {
        InstitutionSpec {
            name: name.into(),
            country: "South Africa".into(),
            base: base.into(),
            fallback: None,
        }
    }

    #[test]
    fn builtin_is_unique_and_https() {
        let registry = Registry::builtin();
        assert_eq!(registry.len(), 11);
        let mut names = registry.names();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 11);
        assert!(registry.iter().all(|i| i.primary.starts_with("https://")));
    }

    #[test]
    fn from_specs_rejects_duplicates() {
        let err = Registry::from_specs(&[spec("UCT", "https://a"), spec("UCT", "https://b")])
            .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn from_specs_rejects_missing_base() {
        assert!(Registry::from_specs(&[spec("UCT", "  ")]).is_err());
        assert!(Registry::from_specs(&[spec("", "https://a")]).is_err());
    }

    #[test]
    fn resolve_by_substring() {
        let registry = Registry::builtin();
        assert_eq!(
            registry.resolve("uct").map(|i| i.name.as_str()),
            Some("University of Cape Town (UCT)")
        );
        assert_eq!(
            registry.resolve("wits (wiredspace)").map(|i| i.name.as_str()),
            Some("Wits (WIReDSpace)")
        );
        // Ambiguous: many names contain "University"
        assert!(registry.resolve("University").is_none());
        assert!(registry.resolve("").is_none());
    }

    #[test]
    fn fallback_becomes_active_when_it_answers() {
        let mut inst = Institution::new("UFS", "South Africa", "https://scholar.ufs.ac.za/server/oai/request")
            .with_fallback("https://scholar.ufs.ac.za/oai/request");
        assert_eq!(inst.candidate_bases().count(), 2);
        inst.apply_reachability(&ReachabilityResult {
            online: true,
            base_url: Some("https://scholar.ufs.ac.za/oai/request".into()),
            admin_email: Some("repo@ufs.ac.za".into()),
            ..Default::default()
        });
        assert_eq!(inst.reachability(), Reachability::Online);
        assert_eq!(inst.base_url(), "https://scholar.ufs.ac.za/oai/request");
        assert_eq!(inst.admin_email(), Some("repo@ufs.ac.za"));
    }

    #[test]
    fn offline_result_keeps_message() {
        let mut inst = Institution::new("Wits", "South Africa", "https://w");
        inst.apply_reachability(&ReachabilityResult {
            online: false,
            message: Some("HTTP 503".into()),
            ..Default::default()
        });
        assert!(inst.is_offline());
        assert_eq!(inst.last_message(), Some("HTTP 503"));
        assert_eq!(inst.base_url(), "https://w");
    }

    #[test]
    fn spec_parses_from_toml() {
        let spec: InstitutionSpec = toml::from_str(
            r#"
name = "Rhodes University"
base = "https://commons.ru.ac.za/server/oai/request"
fallback = "https://commons.ru.ac.za/oai/request"
"#,
        )
        .unwrap();
        assert_eq!(spec.country, "");
        assert_eq!(spec.fallback.as_deref(), Some("https://commons.ru.ac.za/oai/request"));
    }
}

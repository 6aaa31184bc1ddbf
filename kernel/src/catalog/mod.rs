// Policy Catalog
//
// Read-only set of hardening policies keyed by feature id and OS.
// Loading lives in `adapters::feature_map`; this module only answers lookups.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Feature ids offered when a policy lookup misses.
pub const SUGGESTED_POLICIES: usize = 5;

/// Operating system family a policy targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OsType {
    Linux,
    Windows,
}

impl OsType {
    pub fn matches(&self, raw: &str) -> bool {
        raw.trim().eq_ignore_ascii_case(self.as_str())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OsType::Linux => "Linux",
            OsType::Windows => "Windows",
        }
    }
}

impl fmt::Display for OsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OsType {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [OsType::Linux, OsType::Windows]
            .into_iter()
            .find(|os| os.matches(s))
            .ok_or_else(|| CatalogError::UnknownOs(s.to_owned()))
    }
}

/// A single policy row.
///
/// Field names follow the feature map columns so that records
/// persisted in the ledger keep the same shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRecord {
    #[serde(rename = "Feature ID", default)]
    pub feature_id: String,

    #[serde(rename = "OS", default)]
    pub os: String,

    #[serde(rename = "Category", default)]
    pub category: String,

    #[serde(rename = "Parameter/Rule")]
    pub rule: String,

    #[serde(rename = "Priority", default)]
    pub priority: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("policy catalog {path} is unavailable: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("malformed policy catalog row: {0}")]
    Malformed(#[from] csv::Error),

    #[error("unknown OS type '{0}'")]
    UnknownOs(String),

    #[error("policy '{id}' not found for {os}")]
    PolicyNotFound {
        id: String,
        os: OsType,
        /// First few feature ids valid for `os`.
        available: Vec<String>,
    },

    #[error("category '{name}' not found")]
    CategoryNotFound { name: String, available: Vec<String> },

    #[error("no {os} policies found for category '{category}'")]
    EmptyCategory { category: String, os: OsType },
}

/// Policies of one category for one OS, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryMatch<'a> {
    pub name: &'a str,
    pub os: OsType,
    pub policies: Vec<&'a PolicyRecord>,
}

/// Per-OS policy counts of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub name: String,
    pub linux: usize,
    pub windows: usize,
}

impl CategoryCount {
    pub fn for_os(&self, os: OsType) -> usize {
        match os {
            OsType::Linux => self.linux,
            OsType::Windows => self.windows,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyCatalog {
    policies: Vec<PolicyRecord>,
}

impl PolicyCatalog {
    pub fn new(policies: Vec<PolicyRecord>) -> Self {
        Self { policies }
    }

    pub fn policies_for(&self, os: OsType) -> impl Iterator<Item = &PolicyRecord> {
        self.policies.iter().filter(move |p| os.matches(&p.os))
    }

    pub fn policy(&self, id: &str, os: OsType) -> Result<&PolicyRecord, CatalogError> {
        self.policies_for(os)
            .find(|p| p.feature_id == id)
            .ok_or_else(|| CatalogError::PolicyNotFound {
                id: id.to_owned(),
                os,
                available: self
                    .policies_for(os)
                    .map(|p| p.feature_id.clone())
                    .take(SUGGESTED_POLICIES)
                    .collect(),
            })
    }

    /// Case-insensitive category lookup.
    pub fn category(&self, name: &str, os: OsType) -> Result<CategoryMatch<'_>, CatalogError> {
        let canonical = self
            .policies
            .iter()
            .map(|p| p.category.as_str())
            .find(|c| c.eq_ignore_ascii_case(name))
            .ok_or_else(|| CatalogError::CategoryNotFound {
                name: name.to_owned(),
                available: self.category_names(),
            })?;

        let policies: Vec<_> = self
            .policies_for(os)
            .filter(|p| p.category == canonical)
            .collect();

        if policies.is_empty() {
            return Err(CatalogError::EmptyCategory {
                category: canonical.to_owned(),
                os,
            });
        }

        Ok(CategoryMatch {
            name: canonical,
            os,
            policies,
        })
    }

    /// Sorted, de-duplicated category names.
    pub fn category_names(&self) -> Vec<String> {
        self.categories().into_iter().map(|c| c.name).collect()
    }

    pub fn categories(&self) -> Vec<CategoryCount> {
        let mut counts: BTreeMap<&str, CategoryCount> = BTreeMap::new();

        for policy in &self.policies {
            let count = counts
                .entry(policy.category.as_str())
                .or_insert_with(|| CategoryCount {
                    name: policy.category.clone(),
                    linux: 0,
                    windows: 0,
                });
            if OsType::Linux.matches(&policy.os) {
                count.linux += 1;
            } else if OsType::Windows.matches(&policy.os) {
                count.windows += 1;
            }
        }

        counts.into_values().collect()
    }
}

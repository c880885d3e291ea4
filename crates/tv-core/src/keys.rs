//! Typed keys for object collections and the flat tables derived from them.
//!
//! The four base keys (`LC_reco`, `LC_sim`, `Tracksters_reco`,
//! `Tracksters_sim`) are the product of [`Category`] and [`Provenance`].
//! Derived tables append a suffix: `LC_reco_HD`, `Tracksters_sim_E`, ...
//! String forms are only parsed when configuration is loaded.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Object category.
///
/// `Lc` collections are tracksters built from layer clusters; `Tracksters`
/// collections are superclusters built from tracksters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Category {
    /// Tracksters made of layer clusters.
    Lc,
    /// Superclusters made of tracksters.
    Tracksters,
}

/// Whether a collection is reconstructed or simulated truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Provenance {
    /// Reconstructed objects.
    Reco,
    /// Simulated (truth) objects.
    Sim,
}

impl Category {
    /// All categories in canonical order.
    pub const ALL: [Category; 2] = [Category::Lc, Category::Tracksters];

    /// Short name used in table keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Lc => "LC",
            Category::Tracksters => "Tracksters",
        }
    }
}

impl Provenance {
    /// All provenances in canonical order.
    pub const ALL: [Provenance; 2] = [Provenance::Reco, Provenance::Sim];

    /// Short name used in table keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::Reco => "reco",
            Provenance::Sim => "sim",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "LC" => Ok(Category::Lc),
            "Tracksters" => Ok(Category::Tracksters),
            other => Err(Error::Config(format!(
                "unknown category '{other}' (expected 'LC' or 'Tracksters')"
            ))),
        }
    }
}

impl FromStr for Provenance {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "reco" => Ok(Provenance::Reco),
            "sim" => Ok(Provenance::Sim),
            other => Err(Error::Config(format!(
                "unknown provenance '{other}' (expected 'reco' or 'sim')"
            ))),
        }
    }
}

impl TryFrom<String> for Category {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Category> for String {
    fn from(c: Category) -> Self {
        c.as_str().to_string()
    }
}

impl TryFrom<String> for Provenance {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Provenance> for String {
    fn from(p: Provenance) -> Self {
        p.as_str().to_string()
    }
}

/// A base key: one category × provenance pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionKey {
    /// Object category.
    pub category: Category,
    /// Reco or sim.
    pub provenance: Provenance,
}

impl CollectionKey {
    /// Create a key.
    pub const fn new(category: Category, provenance: Provenance) -> Self {
        Self { category, provenance }
    }

    /// The four base keys in canonical order.
    pub fn all() -> impl Iterator<Item = CollectionKey> {
        Category::ALL
            .into_iter()
            .flat_map(|c| Provenance::ALL.into_iter().map(move |p| CollectionKey::new(c, p)))
    }

    /// The same category with the other provenance.
    pub fn counterpart(self) -> Self {
        let provenance = match self.provenance {
            Provenance::Reco => Provenance::Sim,
            Provenance::Sim => Provenance::Reco,
        };
        Self { category: self.category, provenance }
    }

    /// Derived table key `<self>_<suffix>`.
    pub fn with_suffix(self, suffix: impl Into<String>) -> TableKey {
        TableKey::derived(self, suffix)
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.category, self.provenance)
    }
}

impl FromStr for CollectionKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (category, provenance) = s.split_once('_').ok_or_else(|| {
            Error::Config(format!("'{s}' is not a base key of the form <category>_<reco|sim>"))
        })?;
        Ok(Self::new(category.parse()?, provenance.parse()?))
    }
}

impl TryFrom<String> for CollectionKey {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<CollectionKey> for String {
    fn from(key: CollectionKey) -> Self {
        key.to_string()
    }
}

/// Key of a flat table: a base key plus an optional suffix.
///
/// For primary tables a suffixed key names a boolean mask over the base
/// table; for slicing tables the suffix is the slicing quantity name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableKey {
    /// Base collection key.
    pub base: CollectionKey,
    /// Suffix after `<base>_`, if any.
    pub suffix: Option<String>,
}

impl TableKey {
    /// Unsuffixed key.
    pub fn base(base: CollectionKey) -> Self {
        Self { base, suffix: None }
    }

    /// Suffixed key.
    pub fn derived(base: CollectionKey, suffix: impl Into<String>) -> Self {
        Self { base, suffix: Some(suffix.into()) }
    }

    /// Whether this key carries a suffix.
    pub fn is_derived(&self) -> bool {
        self.suffix.is_some()
    }

    /// Key `<self>_<slice>`, used to look up slicing tables and to name
    /// sliced histograms.
    pub fn sliced(&self, slice: &str) -> TableKey {
        match &self.suffix {
            Some(s) => TableKey::derived(self.base, format!("{s}_{slice}")),
            None => TableKey::derived(self.base, slice),
        }
    }
}

impl From<CollectionKey> for TableKey {
    fn from(base: CollectionKey) -> Self {
        TableKey::base(base)
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.suffix {
            Some(s) => write!(f, "{}_{}", self.base, s),
            None => write!(f, "{}", self.base),
        }
    }
}

impl FromStr for TableKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        for base in CollectionKey::all() {
            let name = base.to_string();
            let Some(rest) = s.strip_prefix(name.as_str()) else {
                continue;
            };
            if rest.is_empty() {
                return Ok(TableKey::base(base));
            }
            if let Some(suffix) = rest.strip_prefix('_')
                && !suffix.is_empty()
            {
                return Ok(TableKey::derived(base, suffix));
            }
        }
        Err(Error::Config(format!(
            "'{s}' is neither a base key nor of the form <base>_<suffix>"
        )))
    }
}

impl TryFrom<String> for TableKey {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<TableKey> for String {
    fn from(key: TableKey) -> Self {
        key.to_string()
    }
}

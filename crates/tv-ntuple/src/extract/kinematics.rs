use std::collections::BTreeMap;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tv_core::{CollectionKey, Error, FlatTable, Result, TableSet};
use tv_source::{ColumnarSource, JaggedCol};

use super::{Extractor, float_table};
use crate::comparison::{CmpOp, Comparison, Operand, Quantity};
use crate::config::CollectionTable;

/// A quantity and the suffix its table is stored under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedQuantity {
    /// Table suffix (`E`, `HD`, ...).
    pub name: String,
    /// Field or comparison.
    pub quantity: Quantity,
}

impl NamedQuantity {
    /// Parse `quantity` with the comparison grammar.
    pub fn parse(name: impl Into<String>, quantity: &str) -> Result<Self> {
        Ok(Self { name: name.into(), quantity: quantity.parse()? })
    }
}

/// Per-object kinematic quantities and selection masks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KinematicsConfig {
    /// Collection names.
    pub collections: CollectionTable,
    /// Quantities, in output order.
    pub quantities: Vec<NamedQuantity>,
}

impl KinematicsConfig {
    /// The standard slicing set: energy, transverse energy, pseudorapidity
    /// and the high/low-density split at |η| = 2.15.
    pub fn ticl_default() -> Self {
        let field = |name: &str, operand: Operand| NamedQuantity {
            name: name.to_string(),
            quantity: Quantity::Field(operand),
        };
        let cut = |name: &str, op: CmpOp| NamedQuantity {
            name: name.to_string(),
            quantity: Quantity::Compare(Comparison {
                operand: Operand::abs("barycenter_eta"),
                op,
                threshold: 2.15,
            }),
        };
        Self {
            collections: CollectionTable::ticl_default(),
            quantities: vec![
                field("E", Operand::field("raw_energy")),
                field("ET", Operand::field("raw_pt")),
                field("eta", Operand::field("barycenter_eta")),
                cut("HD", CmpOp::Ge),
                cut("LD", CmpOp::Lt),
            ],
        }
    }

    /// Reject empty or repeated quantity names.
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeMap::new();
        for (i, q) in self.quantities.iter().enumerate() {
            if q.name.is_empty() {
                return Err(Error::Config(format!("kinematic quantity #{i} has an empty name")));
            }
            if let Some(j) = seen.insert(q.name.as_str(), i) {
                return Err(Error::Config(format!(
                    "kinematic quantity name '{}' is used by #{j} and #{i}",
                    q.name
                )));
            }
        }
        Ok(())
    }
}

impl Default for KinematicsConfig {
    fn default() -> Self {
        Self::ticl_default()
    }
}

/// Flattened quantities (`Float`) and masks (`Bool`) keyed `<base>_<name>`.
pub struct KinematicsExtractor<'a, S: ColumnarSource + ?Sized> {
    source: &'a S,
    config: KinematicsConfig,
    /// Quantities left after dropping repeated comparisons.
    plan: Vec<NamedQuantity>,
    tables: OnceCell<TableSet>,
}

impl<'a, S: ColumnarSource + ?Sized> KinematicsExtractor<'a, S> {
    /// Extractor over `source`. Fails on an invalid configuration.
    pub fn new(source: &'a S, config: KinematicsConfig) -> Result<Self> {
        config.validate()?;
        let plan = dedup_comparisons(&config.quantities);
        Ok(Self { source, config, plan, tables: OnceCell::new() })
    }

    /// Quantities that will be produced, in order.
    pub fn plan(&self) -> &[NamedQuantity] {
        &self.plan
    }

    /// Configuration in use.
    pub fn config(&self) -> &KinematicsConfig {
        &self.config
    }

    fn compute(&self) -> Result<TableSet> {
        let mut out = TableSet::new();
        for key in self.config.collections.keys() {
            let collection = self.config.collections.require(key)?;
            let fields = self.read_fields(key, collection)?;
            for nq in &self.plan {
                let operand = nq.quantity.operand();
                let values = fields[operand.field.as_str()].flatten();
                let table = match &nq.quantity {
                    Quantity::Field(o) => float_table(values, o.absolute),
                    Quantity::Compare(c) => FlatTable::Bool(c.mask(values)),
                };
                out.insert(key.with_suffix(nq.name.as_str()), table);
            }
        }
        Ok(out)
    }

    /// Read every distinct field of the plan once and check they are aligned.
    fn read_fields(&self, key: CollectionKey, collection: &str) -> Result<BTreeMap<&str, JaggedCol>> {
        let mut fields: BTreeMap<&str, JaggedCol> = BTreeMap::new();
        for nq in &self.plan {
            let field = nq.quantity.operand().field.as_str();
            if fields.contains_key(field) {
                continue;
            }
            let column = self.source.read_jagged(collection, field)?;
            if let Some((first, reference)) = fields.iter().next() {
                reference.check_aligned(&column, &format!("{key} ({collection}): {first} vs {field}"))?;
            }
            fields.insert(field, column);
        }
        log::debug!("kinematics: {key} <- {collection}, {} fields", fields.len());
        Ok(fields)
    }
}

impl<S: ColumnarSource + ?Sized> Extractor for KinematicsExtractor<'_, S> {
    fn name(&self) -> &'static str {
        "kinematics"
    }

    fn ensure_computed(&self) -> Result<&TableSet> {
        self.tables.get_or_try_init(|| self.compute())
    }
}

/// Drop comparisons identical to an earlier one (same operand, operator and
/// threshold); they would duplicate the boundary partner of a shared cut.
fn dedup_comparisons(quantities: &[NamedQuantity]) -> Vec<NamedQuantity> {
    let mut kept: Vec<NamedQuantity> = Vec::with_capacity(quantities.len());
    for nq in quantities {
        if let Quantity::Compare(c) = &nq.quantity
            && let Some(prev) = kept.iter().find(|k| match &k.quantity {
                Quantity::Compare(p) => p.same_cut(c) && p.op == c.op,
                Quantity::Field(_) => false,
            })
        {
            log::warn!("kinematics: '{}' ({c}) repeats '{}'; skipping it", nq.name, prev.name);
            continue;
        }
        kept.push(nq.clone());
    }
    kept
}

//! `ticlval run` orchestration.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tv_core::{TableKey, TableSet};
use tv_hist::{Engine, EngineConfig, HistogramStore};
use tv_ntuple::{
    AngularConfig, AngularExtractor, AssociationAspect, AssociationConfig, AssociationDirection,
    AssociationExtractor, CollectionTable, Extractor, KinematicsConfig, KinematicsExtractor,
    LayerAssignment, LayerAssignmentConfig, LayerConfig, LayerResolver, MultiplicityConfig,
    MultiplicityExtractor, PidConfig, PidExtractor, Quantity,
};
use tv_source::{ColumnarSource, ParquetSource};

/// One analysis; each writes to its own `<analysis>[_<variant>]_histos.json`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Analysis {
    Multiplicity,
    Kinematics,
    Pid,
    Association,
    Angular,
    Layers,
}

impl Analysis {
    pub const ALL: [Analysis; 6] = [
        Analysis::Multiplicity,
        Analysis::Kinematics,
        Analysis::Pid,
        Analysis::Association,
        Analysis::Angular,
        Analysis::Layers,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Analysis::Multiplicity => "multiplicity",
            Analysis::Kinematics => "kinematics",
            Analysis::Pid => "pid",
            Analysis::Association => "association",
            Analysis::Angular => "angular",
            Analysis::Layers => "layers",
        }
    }

    /// Engine settings used when the run config has none for this analysis.
    ///
    /// Identification scores keep only truth-labelled objects, so they are
    /// no longer aligned with the slicing tables and are not sliced.
    pub fn default_engine(self) -> EngineConfig {
        match self {
            Analysis::Pid => EngineConfig { slices: vec![], ..EngineConfig::default() },
            _ => EngineConfig::default(),
        }
    }
}

impl fmt::Display for Analysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Directory of per-collection Parquet files.
    pub source: PathBuf,
    /// Directory receiving the histogram stores.
    pub out_dir: PathBuf,

    /// Analyses to run, in order.
    #[serde(default = "default_analyses")]
    pub analyses: Vec<Analysis>,

    /// Replaces the collection table of every extractor.
    #[serde(default)]
    pub collections: Option<CollectionTable>,

    /// Kinematic masks (`HD`, `LD`, ...) added as derived primary keys to
    /// every sliceable analysis.
    #[serde(default)]
    pub selections: Vec<String>,

    /// Engine settings per analysis; missing ones use
    /// [`Analysis::default_engine`].
    #[serde(default)]
    pub engines: BTreeMap<Analysis, EngineConfig>,

    #[serde(default)]
    pub multiplicity: MultiplicityConfig,
    #[serde(default)]
    pub kinematics: KinematicsConfig,
    #[serde(default)]
    pub pid: PidConfig,
    #[serde(default)]
    pub association: AssociationConfig,
    #[serde(default)]
    pub angular: AngularConfig,
    #[serde(default)]
    pub layer_map: LayerConfig,
    #[serde(default)]
    pub layers: LayerAssignmentConfig,
}

fn default_analyses() -> Vec<Analysis> {
    Analysis::ALL.to_vec()
}

impl RunConfig {
    pub fn engine_config(&self, analysis: Analysis) -> EngineConfig {
        self.engines.get(&analysis).cloned().unwrap_or_else(|| analysis.default_engine())
    }

    /// Push the shared collection table (if any) into every extractor config.
    fn apply_collections(&mut self) {
        let Some(table) = &self.collections else {
            return;
        };
        self.multiplicity.collections = table.clone();
        self.kinematics.collections = table.clone();
        self.pid.collections = table.clone();
        self.association.collections = table.clone();
        self.angular.collections = table.clone();
        self.layers.collections = table.clone();
    }
}

/// Read a run config; `.json` as JSON, anything else as YAML.
pub fn read_run_config(path: &Path) -> Result<RunConfig> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
    let mut cfg: RunConfig = if ext == "json" {
        serde_json::from_slice(&bytes)?
    } else {
        serde_yaml_ng::from_slice(&bytes)?
    };
    cfg.apply_collections();
    Ok(cfg)
}

/// One store written by a run.
#[derive(Debug, Clone, Serialize)]
pub struct StoreReport {
    pub analysis: Analysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    pub store: PathBuf,
    pub histograms: usize,
}

pub fn store_path(out_dir: &Path, analysis: Analysis, variant: Option<&str>) -> PathBuf {
    let name = match variant {
        Some(v) => format!("{analysis}_{v}_histos.json"),
        None => format!("{analysis}_histos.json"),
    };
    out_dir.join(name)
}

/// Run `analyses` (all configured ones if empty) and merge into the stores.
pub fn run(cfg: &RunConfig, only: &[Analysis]) -> Result<Vec<StoreReport>> {
    let source = ParquetSource::open(&cfg.source)
        .with_context(|| format!("opening source {}", cfg.source.display()))?;
    tracing::info!(
        path = %cfg.source.display(),
        collections = source.collections().len(),
        events = source.n_events(),
        "source opened"
    );
    std::fs::create_dir_all(&cfg.out_dir)?;

    let kinematics = KinematicsExtractor::new(&source, cfg.kinematics.clone())?;
    let association = AssociationExtractor::new(&source, cfg.association.clone());
    let resolver = LayerResolver::new(&source, cfg.layer_map.clone());

    let analyses: Vec<Analysis> = if only.is_empty() {
        cfg.analyses.clone()
    } else {
        cfg.analyses.iter().copied().filter(|a| only.contains(a)).collect()
    };

    let mut reports = Vec::new();
    for analysis in analyses {
        let engine = Engine::new(cfg.engine_config(analysis))?;
        let empty = TableSet::new();
        let slicing = if engine.config().slices.is_empty() { &empty } else { kinematics.ensure_computed()? };

        let variants: Vec<(Option<String>, TableSet)> = match analysis {
            Analysis::Multiplicity => {
                let extractor = MultiplicityExtractor::new(&source, cfg.multiplicity.clone());
                vec![(None, extractor.ensure_computed()?.clone())]
            }
            Analysis::Kinematics => {
                let set = kinematics.ensure_computed()?;
                kinematics
                    .plan()
                    .iter()
                    .filter(|nq| matches!(nq.quantity, Quantity::Field(_)))
                    .map(|nq| (Some(nq.name.clone()), tv_ntuple::extract::project(set, &nq.name)))
                    .collect()
            }
            Analysis::Pid => {
                let extractor = PidExtractor::new(&source, cfg.pid.clone());
                let mut out = Vec::with_capacity(cfg.pid.classes.len());
                for &class in &cfg.pid.classes {
                    out.push((Some(class.as_str().to_string()), extractor.tables_for(class)?));
                }
                out
            }
            Analysis::Association => {
                let mut out = Vec::new();
                for direction in AssociationDirection::ALL {
                    for aspect in AssociationAspect::ALL {
                        let variant = format!("{direction}{}", aspect.field_suffix());
                        out.push((Some(variant), association.tables_for(direction, aspect)?));
                    }
                }
                out
            }
            Analysis::Angular => {
                let extractor = AngularExtractor::new(&source, &association, cfg.angular.clone());
                let mut out = Vec::new();
                for direction in AssociationDirection::ALL {
                    if cfg.angular.pairs.iter().any(|&(_, d)| d == direction) {
                        out.push((Some(direction.as_str().to_string()), extractor.tables_for(direction)?));
                    }
                }
                out
            }
            Analysis::Layers => {
                let extractor = LayerAssignment::new(&source, &resolver, cfg.layers.clone());
                vec![(None, extractor.ensure_computed()?.clone())]
            }
        };

        for (variant, mut primary) in variants {
            if primary.is_empty() {
                tracing::warn!(analysis = %analysis, variant = ?variant, "nothing extracted, store left untouched");
                continue;
            }
            if analysis != Analysis::Pid && !cfg.selections.is_empty() {
                add_selections(&mut primary, kinematics.ensure_computed()?, &cfg.selections)?;
            }
            let store = HistogramStore::new(store_path(&cfg.out_dir, analysis, variant.as_deref()));
            let summary = engine
                .run(&primary, slicing, &store)
                .with_context(|| format!("{analysis} {}", variant.as_deref().unwrap_or("")))?;
            tracing::info!(
                analysis = %analysis,
                variant = variant.as_deref().unwrap_or("-"),
                histograms = summary.len(),
                store = %store.path().display(),
                "store updated"
            );
            reports.push(StoreReport {
                analysis,
                variant,
                store: store.path().to_path_buf(),
                histograms: summary.len(),
            });
        }
    }
    Ok(reports)
}

/// Add `<base>_<selection>` masks from `kinematics` for every base key of `primary`.
fn add_selections(primary: &mut TableSet, kinematics: &TableSet, selections: &[String]) -> Result<()> {
    let bases: Vec<TableKey> = primary.keys().filter(|k| !k.is_derived()).cloned().collect();
    for base in bases {
        for selection in selections {
            let key = TableKey::derived(base.base, selection.as_str());
            let mask = kinematics.require(&key)?;
            anyhow::ensure!(
                mask.is_mask(),
                "selection '{selection}' is a {} table, expected a comparison",
                mask.kind()
            );
            primary.insert(key, mask.clone());
        }
    }
    Ok(())
}

/// Collections, their fields and the event count of a source.
pub fn inspect(path: &Path) -> Result<serde_json::Value> {
    let source = ParquetSource::open(path).with_context(|| format!("opening source {}", path.display()))?;
    let mut collections = BTreeMap::new();
    for name in source.collections() {
        let fields = source.fields(&name)?;
        collections.insert(name, fields);
    }
    Ok(serde_json::json!({
        "n_events": source.n_events(),
        "collections": collections,
    }))
}

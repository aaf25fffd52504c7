use rand::Rng;
use rand::rngs::StdRng;
use std::sync::Arc;

use super::error::{Error, Result};
use super::executor::RequestSpec;

/// Per-invocation inputs available to a scenario's request builder.
///
/// Builders may draw from `rng` to embed randomized ids; `vu_id` and
/// `iteration` identify the invoking virtual user loop.
pub struct BuildContext<'a> {
    pub vu_id: u64,
    pub iteration: u64,
    pub rng: &'a mut StdRng,
}

type BuildFn = Box<dyn Fn(&mut BuildContext<'_>) -> RequestSpec + Send + Sync>;

/// A named, weighted request template. Immutable once the catalog is built.
pub struct ScenarioDefinition {
    name: Arc<str>,
    weight: f64,
    build: BuildFn,
}

impl ScenarioDefinition {
    pub fn new(
        name: impl Into<Arc<str>>,
        weight: f64,
        build: impl Fn(&mut BuildContext<'_>) -> RequestSpec + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            weight,
            build: Box::new(build),
        }
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn build(&self, ctx: &mut BuildContext<'_>) -> RequestSpec {
        (self.build)(ctx)
    }
}

impl std::fmt::Debug for ScenarioDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioDefinition")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .finish_non_exhaustive()
    }
}

/// Weighted scenario table.
///
/// Weights need not sum to 1; they are normalized into cumulative cut-points
/// over [0,1). A uniform draw maps to the first cut-point it falls below, so
/// ties resolve in catalog order and zero-weight entries are never selected.
pub struct ScenarioCatalog {
    entries: Vec<ScenarioDefinition>,
    cumulative: Vec<f64>,
}

impl ScenarioCatalog {
    /// Validates and freezes the catalog. Fails fast on an empty catalog,
    /// duplicate names, negative weights, or a non-positive weight total.
    pub fn new(entries: Vec<ScenarioDefinition>) -> Result<Self> {
        Self::with_weight_overrides(entries, &[])
    }

    /// Like [`ScenarioCatalog::new`], but applies per-scenario weight
    /// overrides before normalization. Overrides naming an unknown scenario
    /// are a configuration error.
    pub fn with_weight_overrides(
        mut entries: Vec<ScenarioDefinition>,
        overrides: &[(String, f64)],
    ) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::EmptyCatalog);
        }

        for (name, weight) in overrides {
            let entry = entries
                .iter_mut()
                .find(|e| e.name.as_ref() == name.as_str())
                .ok_or_else(|| Error::UnknownScenario(name.clone()))?;
            entry.weight = *weight;
        }

        for (i, entry) in entries.iter().enumerate() {
            if entries[..i].iter().any(|e| e.name == entry.name) {
                return Err(Error::DuplicateScenario(entry.name.to_string()));
            }
            if entry.weight < 0.0 || !entry.weight.is_finite() {
                return Err(Error::NegativeWeight {
                    scenario: entry.name.to_string(),
                    weight: entry.weight,
                });
            }
        }

        let total: f64 = entries.iter().map(|e| e.weight).sum();
        if total <= 0.0 {
            return Err(Error::NonPositiveTotalWeight);
        }

        let mut cumulative = Vec::with_capacity(entries.len());
        let mut acc = 0.0;
        for entry in &entries {
            acc += entry.weight / total;
            cumulative.push(acc);
        }

        Ok(Self {
            entries,
            cumulative,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ScenarioDefinition] {
        &self.entries
    }

    /// Map a uniform draw in [0,1) to a scenario. First cut-point wins;
    /// floating-point residue at the top end falls back to the last entry.
    pub fn select(&self, draw: f64) -> &ScenarioDefinition {
        for (i, cut) in self.cumulative.iter().enumerate() {
            if draw < *cut {
                return &self.entries[i];
            }
        }
        // draw >= last cut-point can only happen through fp rounding.
        &self.entries[self.entries.len() - 1]
    }

    pub fn select_with<R: Rng + ?Sized>(&self, rng: &mut R) -> &ScenarioDefinition {
        self.select(rng.gen_range(0.0..1.0))
    }
}

impl std::fmt::Debug for ScenarioCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioCatalog")
            .field("entries", &self.entries)
            .field("cumulative", &self.cumulative)
            .finish()
    }
}

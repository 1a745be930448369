//! Runs the variable morphers in dependency order and gathers what succeeds.
//!
//! Each variable moves through `pending -> skipped | merged | failed`. A variable is skipped when
//! its climate files or its dependencies are missing and fails when its signals or morph step
//! return an error. Neither stops the run; the manifest records what happened to each.
use crate::config::{MorphConfig, ValidationRange};
use crate::error::{MorphError, PipelineError};
use crate::morph::{
    DewPointMorpher, MorphContext, Morpher, PrecipitableWaterMorpher, RelativeHumidityMorpher,
    SolarRadiationMorpher, TemperatureMorpher, Variable, WindSpeedMorpher,
};
use crate::record::{MorphedColumnSet, WeatherRecord};
use crate::series::HourlySeries;
use crate::sources::{ClimateFileSet, SourceLayout};
use log::{debug, info, warn};
use std::collections::BTreeMap;

/// Append-only store of the series morphed so far in a run.
#[derive(Debug, Clone, Default)]
pub struct ResultStore(BTreeMap<Variable, HourlySeries>);

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a result. A variable is only ever morphed once per run, so an existing entry is kept.
    pub fn insert(&mut self, variable: Variable, series: HourlySeries) {
        self.0.entry(variable).or_insert(series);
    }

    pub fn get(&self, variable: Variable) -> Option<&HourlySeries> {
        self.0.get(&variable)
    }

    pub fn contains(&self, variable: Variable) -> bool {
        self.0.contains_key(&variable)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Variable, &HourlySeries)> {
        self.0.iter().map(|(&var, series)| (var, series))
    }
}

/// What happened to one variable.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableStatus {
    Merged {
        column: usize,
        baseline_mean: f64,
        morphed_mean: f64,
        /// Hours outside the configured plausibility range.
        out_of_range: usize,
    },
    Skipped {
        reason: String,
    },
    Failed {
        reason: String,
    },
}

impl VariableStatus {
    pub fn is_merged(&self) -> bool {
        match self {
            VariableStatus::Merged { .. } => true,
            _ => false,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VariableStatus::Merged { .. } => "merged",
            VariableStatus::Skipped { .. } => "skipped",
            VariableStatus::Failed { .. } => "failed",
        }
    }
}

/// Status of every registered variable, in run order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest(Vec<(Variable, VariableStatus)>);

impl Manifest {
    fn push(&mut self, variable: Variable, status: VariableStatus) {
        match &status {
            VariableStatus::Merged { .. } => info!("{}: merged", variable),
            VariableStatus::Skipped { reason } => warn!("{}: skipped, {}", variable, reason),
            VariableStatus::Failed { reason } => warn!("{}: failed, {}", variable, reason),
        }
        self.0.push((variable, status));
    }

    pub fn status(&self, variable: Variable) -> Option<&VariableStatus> {
        self.0
            .iter()
            .find(|(v, _)| *v == variable)
            .map(|(_, status)| status)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Variable, &VariableStatus)> {
        self.0.iter().map(|(v, s)| (*v, s))
    }

    pub fn merged(&self) -> impl Iterator<Item = Variable> + '_ {
        self.iter().filter(|(_, s)| s.is_merged()).map(|(v, _)| v)
    }

    /// True when at least one variable was merged.
    pub fn is_success(&self) -> bool {
        self.merged().next().is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The products of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub manifest: Manifest,
    pub columns: MorphedColumnSet,
    pub results: ResultStore,
}

/// An ordered set of morphers, at most one per variable.
pub struct MorphingPipeline {
    morphers: Vec<Box<dyn Morpher>>,
}

impl MorphingPipeline {
    /// Order `morphers` so every dependency runs before its dependents.
    ///
    /// The sort is stable: among morphers free to run, registration order is kept. Dependencies
    /// on variables that are not registered are left for the run to report as skipped.
    pub fn new(morphers: Vec<Box<dyn Morpher>>) -> Result<Self, PipelineError> {
        for (i, m) in morphers.iter().enumerate() {
            if morphers[..i].iter().any(|o| o.variable() == m.variable()) {
                return Err(PipelineError::Duplicate(m.variable()));
            }
        }

        let mut pending: Vec<Box<dyn Morpher>> = morphers;
        let mut ordered: Vec<Box<dyn Morpher>> = Vec::with_capacity(pending.len());

        while !pending.is_empty() {
            let ready = pending.iter().position(|m| {
                m.depends_on()
                    .iter()
                    .all(|dep| !pending.iter().any(|p| p.variable() == *dep))
            });

            match ready {
                Some(idx) => ordered.push(pending.remove(idx)),
                None => {
                    return Err(PipelineError::Cycle(
                        pending.iter().map(|m| m.variable()).collect(),
                    ))
                }
            }
        }

        debug!(
            "run order: {}",
            ordered
                .iter()
                .map(|m| m.variable().key())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(MorphingPipeline { morphers: ordered })
    }

    /// The usual morphers for a source layout.
    ///
    /// Solar radiation is only morphed from rasters since the difference tables carry no
    /// radiation climatology.
    pub fn standard(layout: SourceLayout, config: &MorphConfig) -> Result<Self, PipelineError> {
        Self::for_variables(layout, config, &Self::standard_variables(layout))
    }

    pub fn standard_variables(layout: SourceLayout) -> Vec<Variable> {
        use Variable::*;

        let mut vars = vec![
            DryBulb,
            RelativeHumidity,
            DewPoint,
            WindSpeed,
            PrecipitableWater,
        ];
        if layout == SourceLayout::Rasters {
            vars.push(SolarRadiation);
        }
        vars
    }

    /// A pipeline for the given variables with the morpher each uses for `layout`.
    pub fn for_variables(
        layout: SourceLayout,
        config: &MorphConfig,
        variables: &[Variable],
    ) -> Result<Self, PipelineError> {
        let morphers = variables
            .iter()
            .map(|&var| -> Box<dyn Morpher> {
                match var {
                    Variable::DryBulb => Box::new(TemperatureMorpher::for_layout(layout, config)),
                    Variable::RelativeHumidity => {
                        Box::new(RelativeHumidityMorpher::for_layout(layout, config))
                    }
                    Variable::DewPoint => Box::new(DewPointMorpher::new()),
                    Variable::WindSpeed => Box::new(WindSpeedMorpher::new(layout)),
                    Variable::PrecipitableWater => Box::new(PrecipitableWaterMorpher::new(layout)),
                    Variable::SolarRadiation => Box::new(SolarRadiationMorpher::new()),
                }
            })
            .collect();

        Self::new(morphers)
    }

    /// Variables in run order.
    pub fn variables(&self) -> Vec<Variable> {
        self.morphers.iter().map(|m| m.variable()).collect()
    }

    /// Morph every registered variable of `record`.
    ///
    /// `city` selects city specific validation ranges and defaults to the record's city.
    pub fn run(
        &self,
        record: &WeatherRecord,
        files: &ClimateFileSet,
        config: &MorphConfig,
        city: Option<&str>,
    ) -> PipelineOutcome {
        let city = city.or_else(|| {
            let c = record.location().city.as_str();
            if c.is_empty() {
                None
            } else {
                Some(c)
            }
        });

        let mut manifest = Manifest::default();
        let mut results = ResultStore::new();
        let mut columns = MorphedColumnSet::new();

        for morpher in &self.morphers {
            let variable = morpher.variable();
            info!("processing {} (column {})", variable.description(), morpher.column());

            let requires = morpher.requires();
            let missing = files.missing(&requires);
            if !missing.is_empty() {
                let err = MorphError::MissingInputFile(missing.into_iter().map(str::to_owned).collect());
                manifest.push(variable, VariableStatus::Skipped { reason: err.to_string() });
                continue;
            }

            if let Some(&dep) = morpher.depends_on().iter().find(|&&d| !results.contains(d)) {
                let err = MorphError::DependencyUnmet {
                    variable,
                    missing: dep,
                };
                manifest.push(variable, VariableStatus::Skipped { reason: err.to_string() });
                continue;
            }

            let ctx = MorphContext {
                record,
                city,
                config,
                results: &results,
            };

            let attempt = record
                .column(morpher.column())
                .map_err(MorphError::from)
                .and_then(|baseline| {
                    let signals = morpher.load_signals(files, &ctx)?;
                    let morphed = morpher.morph(&baseline, &signals, &ctx)?;
                    Ok((baseline, morphed))
                });

            let (baseline, morphed) = match attempt {
                Ok(pair) => pair,
                Err(err) => {
                    manifest.push(variable, VariableStatus::Failed { reason: err.to_string() });
                    continue;
                }
            };

            let out_of_range = config
                .validation
                .range_for(variable, city)
                .map(|range| count_out_of_range(variable, &morphed, range))
                .unwrap_or(0);

            let status = VariableStatus::Merged {
                column: morpher.column(),
                baseline_mean: baseline.mean(),
                morphed_mean: morphed.mean(),
                out_of_range,
            };

            columns.insert(morpher.column(), morphed.clone());
            results.insert(variable, morphed);
            manifest.push(variable, status);
        }

        if !manifest.is_success() {
            warn!("no variables were morphed");
        }

        PipelineOutcome {
            manifest,
            columns,
            results,
        }
    }
}

fn count_out_of_range(variable: Variable, series: &HourlySeries, range: ValidationRange) -> usize {
    let count = series.iter().filter(|&&v| !range.contains(v)).count();
    if count > 0 {
        warn!(
            "{}: {} hours outside the plausible range {} to {} {}",
            variable,
            count,
            range.min,
            range.max,
            variable.units()
        );
    }
    count
}

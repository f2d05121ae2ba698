use std::fmt;

use kanon_group::group_records;
use kanon_metrics::{
    audit_closeness, feasibility_sweep, k_anonymity, recommend_threshold, ClosenessAudit,
    FeasibilityRow, MetricsSnapshot,
};
use kanon_record::{AnonError, AttributeRoles, Record};
use serde::Serialize;
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::suppress::{suppress_by_k, suppress_by_l};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Configure,
    Loaded,
    RiskAssessed,
    Generalized,
    Suppressed,
    Audited,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Configure => "configure",
            Stage::Loaded => "load",
            Stage::RiskAssessed => "risk assessment",
            Stage::Generalized => "generalization",
            Stage::Suppressed => "suppression",
            Stage::Audited => "audit",
            Stage::Done => "done",
        };
        write!(f, "{s}")
    }
}

/// A failed run: the stage that was being entered and the cause.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{stage} failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: AnonError,
}

impl PipelineError {
    fn at(stage: Stage) -> impl FnOnce(AnonError) -> PipelineError {
        move |source| PipelineError { stage, source }
    }
}

/// k after one step of the anonymization process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressPoint {
    pub label: String,
    pub k: usize,
    pub singleton_count: usize,
}

/// Terminal result of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutcome {
    pub raw: MetricsSnapshot,
    pub generalized: MetricsSnapshot,
    #[serde(rename = "final")]
    pub final_metrics: MetricsSnapshot,
    /// False when generalization neither raised k nor removed a singleton.
    pub generalization_progressed: bool,
    pub dropped_groups: usize,
    /// None when suppression removed every record.
    pub closeness: Option<ClosenessAudit>,
    pub feasibility: Vec<FeasibilityRow>,
    pub recommended_threshold: Option<f64>,
    pub progress: Vec<ProgressPoint>,
    /// Record set after generalization, before suppression.
    #[serde(skip)]
    pub generalized_records: Vec<Record>,
    #[serde(skip)]
    pub final_records: Vec<Record>,
}

/// Pipeline state. [`Pipeline::step`] advances one transition; `Done` and
/// `Failed` are terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    Loaded {
        records: Vec<Record>,
    },
    RiskAssessed {
        records: Vec<Record>,
        raw: MetricsSnapshot,
        progress: Vec<ProgressPoint>,
    },
    Generalized {
        raw: MetricsSnapshot,
        records: Vec<Record>,
        generalized: MetricsSnapshot,
        progress: Vec<ProgressPoint>,
    },
    Suppressed {
        raw: MetricsSnapshot,
        generalized_records: Vec<Record>,
        generalized: MetricsSnapshot,
        records: Vec<Record>,
        dropped_records: usize,
        dropped_groups: usize,
        drop_fraction: f64,
        progress: Vec<ProgressPoint>,
    },
    Audited(Box<PipelineOutcome>),
    Done(Box<PipelineOutcome>),
    Failed(PipelineError),
}

impl PipelineState {
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineState::Loaded { .. } => Some(Stage::Loaded),
            PipelineState::RiskAssessed { .. } => Some(Stage::RiskAssessed),
            PipelineState::Generalized { .. } => Some(Stage::Generalized),
            PipelineState::Suppressed { .. } => Some(Stage::Suppressed),
            PipelineState::Audited(_) => Some(Stage::Audited),
            PipelineState::Done(_) => Some(Stage::Done),
            PipelineState::Failed(_) => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done(_) | PipelineState::Failed(_))
    }
}

/// Runs generalization, suppression and auditing for one configuration.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    roles: AttributeRoles,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let roles = config.validate().map_err(PipelineError::at(Stage::Configure))?;
        Ok(Self { config, roles })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn roles(&self) -> &AttributeRoles {
        &self.roles
    }

    pub fn start(&self, records: Vec<Record>) -> PipelineState {
        log::debug!("pipeline loaded {} records", records.len());
        PipelineState::Loaded { records }
    }

    /// Drives `records` through every stage.
    pub fn run(&self, records: Vec<Record>) -> Result<PipelineOutcome, PipelineError> {
        let mut state = self.start(records);
        loop {
            state = match state {
                PipelineState::Done(outcome) => return Ok(*outcome),
                PipelineState::Failed(err) => return Err(err),
                pending => self.step(pending),
            };
        }
    }

    /// Advances one transition. Failures become [`PipelineState::Failed`];
    /// terminal states are returned unchanged.
    pub fn step(&self, state: PipelineState) -> PipelineState {
        let next = match state {
            PipelineState::Loaded { records } => self.assess(records),
            PipelineState::RiskAssessed {
                records,
                raw,
                progress,
            } => self.generalize(records, raw, progress),
            PipelineState::Generalized {
                raw,
                records,
                generalized,
                progress,
            } => self.suppress(raw, records, generalized, progress),
            PipelineState::Suppressed {
                raw,
                generalized_records,
                generalized,
                records,
                dropped_records,
                dropped_groups,
                drop_fraction,
                progress,
            } => self.audit(
                raw,
                generalized_records,
                generalized,
                records,
                (dropped_records, dropped_groups, drop_fraction),
                progress,
            ),
            PipelineState::Audited(outcome) => Ok(PipelineState::Done(outcome)),
            terminal @ (PipelineState::Done(_) | PipelineState::Failed(_)) => Ok(terminal),
        };
        next.unwrap_or_else(|err| {
            log::error!("pipeline halted: {err}");
            PipelineState::Failed(err)
        })
    }

    fn qi(&self) -> &[String] {
        self.roles.quasi_identifiers()
    }

    fn sensitive(&self) -> &str {
        self.roles.sensitive()
    }

    fn measure(&self, stage: &str, records: &[Record]) -> Result<MetricsSnapshot, AnonError> {
        MetricsSnapshot::measure(stage, records, self.qi(), self.sensitive())
    }

    fn progress_point(&self, label: &str, records: &[Record]) -> Result<ProgressPoint, AnonError> {
        let groups = group_records(records, self.qi())?;
        let k = k_anonymity(&groups)?;
        Ok(ProgressPoint {
            label: label.to_string(),
            k: k.k,
            singleton_count: k.singleton_count,
        })
    }

    fn assess(&self, records: Vec<Record>) -> Result<PipelineState, PipelineError> {
        let fail = PipelineError::at(Stage::RiskAssessed);
        if records.is_empty() {
            return Err(fail(AnonError::EmptyDataset));
        }
        let raw = self.measure("raw", &records).map_err(fail)?;
        log::info!(
            "raw data: k = {}, {} unique profiles, l = {}",
            raw.k,
            raw.singleton_count,
            raw.l_min
        );
        let progress = if self.config.trace_steps {
            vec![ProgressPoint {
                label: "raw".to_string(),
                k: raw.k,
                singleton_count: raw.singleton_count,
            }]
        } else {
            Vec::new()
        };
        Ok(PipelineState::RiskAssessed {
            records,
            raw,
            progress,
        })
    }

    fn generalize(
        &self,
        records: Vec<Record>,
        raw: MetricsSnapshot,
        mut progress: Vec<ProgressPoint>,
    ) -> Result<PipelineState, PipelineError> {
        let fail = PipelineError::at(Stage::Generalized);
        let catalogue = &self.config.rules;
        let generalized_records = if self.config.trace_steps {
            catalogue
                .apply_stepwise(&records, |rule, set| {
                    progress.push(self.progress_point(&rule.attribute, set)?);
                    Ok(())
                })
                .map_err(fail)?
        } else {
            catalogue
                .generalize(&records)
                .map_err(PipelineError::at(Stage::Generalized))?
        };
        let generalized = self
            .measure("generalized", &generalized_records)
            .map_err(PipelineError::at(Stage::Generalized))?;

        if generalized.k <= raw.k && generalized.singleton_count >= raw.singleton_count {
            log::warn!(
                "generalization made no progress: k stayed at {}, {} unique profiles remain",
                generalized.k,
                generalized.singleton_count
            );
        } else {
            log::info!(
                "generalized data: k = {}, {} unique profiles",
                generalized.k,
                generalized.singleton_count
            );
        }
        Ok(PipelineState::Generalized {
            raw,
            records: generalized_records,
            generalized,
            progress,
        })
    }

    fn suppress(
        &self,
        raw: MetricsSnapshot,
        generalized_records: Vec<Record>,
        generalized: MetricsSnapshot,
        mut progress: Vec<ProgressPoint>,
    ) -> Result<PipelineState, PipelineError> {
        let fail = PipelineError::at(Stage::Suppressed);
        let by_l = suppress_by_l(
            &generalized_records,
            self.qi(),
            self.sensitive(),
            self.config.min_l,
        )
        .map_err(fail)?;
        let mut dropped_groups = by_l.dropped_groups;
        let mut records = by_l.retained;
        if let Some(min_k) = self.config.min_k {
            let by_k = suppress_by_k(&records, self.qi(), min_k)
                .map_err(PipelineError::at(Stage::Suppressed))?;
            dropped_groups += by_k.dropped_groups;
            records = by_k.retained;
        }

        let dropped_records = generalized_records.len() - records.len();
        let drop_fraction = dropped_records as f64 / generalized_records.len() as f64;
        log::info!(
            "suppression dropped {dropped_records} of {} records ({:.2}%)",
            generalized_records.len(),
            drop_fraction * 100.0
        );
        if records.is_empty() {
            log::warn!("suppression removed every record");
        } else if self.config.trace_steps {
            let point = self
                .progress_point("suppression", &records)
                .map_err(PipelineError::at(Stage::Suppressed))?;
            progress.push(point);
        }

        Ok(PipelineState::Suppressed {
            raw,
            generalized_records,
            generalized,
            records,
            dropped_records,
            dropped_groups,
            drop_fraction,
            progress,
        })
    }

    fn audit(
        &self,
        raw: MetricsSnapshot,
        generalized_records: Vec<Record>,
        generalized: MetricsSnapshot,
        records: Vec<Record>,
        (dropped_records, dropped_groups, drop_fraction): (usize, usize, f64),
        progress: Vec<ProgressPoint>,
    ) -> Result<PipelineState, PipelineError> {
        let fail = PipelineError::at(Stage::Audited);
        let final_metrics = self
            .measure("final", &records)
            .map_err(fail)?
            .with_drop(dropped_records, drop_fraction);

        let closeness = if records.is_empty() {
            None
        } else {
            let groups =
                group_records(&records, self.qi()).map_err(PipelineError::at(Stage::Audited))?;
            Some(
                audit_closeness(&groups, self.sensitive())
                    .map_err(PipelineError::at(Stage::Audited))?,
            )
        };
        let feasibility = closeness
            .as_ref()
            .map(|audit| feasibility_sweep(audit, &self.config.closeness_thresholds))
            .unwrap_or_default();
        let recommended_threshold = recommend_threshold(&feasibility);
        if let Some(audit) = &closeness {
            log::info!(
                "closeness: max t = {:.4}, mean t = {:.4}",
                audit.max_t,
                audit.mean_t
            );
        }

        let generalization_progressed =
            generalized.k > raw.k || generalized.singleton_count < raw.singleton_count;
        Ok(PipelineState::Audited(Box::new(PipelineOutcome {
            raw,
            generalized,
            final_metrics,
            generalization_progressed,
            dropped_groups,
            closeness,
            feasibility,
            recommended_threshold,
            progress,
            generalized_records,
            final_records: records,
        })))
    }
}

// Copyright Catenary Transit Initiatives
// Shared analysis state with single-writer, snapshot-reader semantics

use crate::clustering::{
    ClusteringReport, DEFAULT_EPS_KM, DEFAULT_MIN_SAMPLES, cluster_observations, is_clustered,
};
use crate::conflict_detection::{conflicts_for_lane, detect_conflicts};
use crate::conflict_stats::{monthly_stats, summarize};
use crate::errors::{ConflictError, ConflictResult};
use crate::ingest::DataDirContents;
use crate::models::{
    ConflictSummary, ConflictZone, Lane, MonthKey, MonthlyConflictStats, Observation,
    RouteSuggestion,
};
use crate::route_suggestion::suggest_route;
use log::debug;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// One consistent view of the session: the observations (with whatever
/// cluster assignment produced `conflicts`), the lanes, and the conflicts.
#[derive(Debug, Default, Clone)]
pub struct AnalysisSnapshot {
    pub observations: Option<Arc<Vec<Observation>>>,
    pub lanes: Option<Arc<Vec<Lane>>>,
    pub conflicts: Option<Arc<Vec<ConflictZone>>>,
    /// Bumped on every successful state transition.
    pub generation: u64,
}

impl AnalysisSnapshot {
    fn observations(&self) -> ConflictResult<&Arc<Vec<Observation>>> {
        self.observations
            .as_ref()
            .ok_or_else(|| ConflictError::missing("Migration data not loaded"))
    }

    fn lanes(&self) -> ConflictResult<&Arc<Vec<Lane>>> {
        self.lanes
            .as_ref()
            .ok_or_else(|| ConflictError::missing("Shipping lanes not loaded"))
    }

    fn conflicts(&self) -> ConflictResult<&Arc<Vec<ConflictZone>>> {
        self.conflicts
            .as_ref()
            .ok_or_else(|| ConflictError::missing("Conflict zones not available"))
    }

    fn next(&self) -> AnalysisSnapshot {
        AnalysisSnapshot {
            generation: self.generation + 1,
            ..self.clone()
        }
    }
}

/// Holds the inputs and latest results of an analysis.
///
/// Writers are serialised and build the next snapshot off to the side, then
/// publish it with a single pointer swap. Readers clone the current `Arc` and
/// never see a clustering that disagrees with the conflicts next to it. A
/// failed run publishes nothing.
#[derive(Debug, Default)]
pub struct AnalysisSession {
    current: RwLock<Arc<AnalysisSnapshot>>,
    writer: Mutex<()>,
}

impl AnalysisSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_contents(contents: DataDirContents) -> Self {
        let session = Self::new();
        if let Some(observations) = contents.observations {
            session.load_observations(observations);
        }
        if let Some(lanes) = contents.lanes {
            session.load_lanes(lanes);
        }
        session
    }

    pub fn snapshot(&self) -> Arc<AnalysisSnapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn transition<T>(
        &self,
        step: impl FnOnce(&AnalysisSnapshot) -> ConflictResult<(AnalysisSnapshot, T)>,
    ) -> ConflictResult<T> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let base = self.snapshot();

        let (next, output) = step(&base)?;

        debug!("Publishing analysis snapshot generation {}", next.generation);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        Ok(output)
    }

    /// Replaces the observation set. Conflicts derived from the old set are dropped.
    pub fn load_observations(&self, observations: Vec<Observation>) {
        let _ = self.transition(|base| {
            let mut next = base.next();
            next.observations = Some(Arc::new(observations));
            next.conflicts = None;
            Ok((next, ()))
        });
    }

    /// Replaces the lane set. Conflicts derived from the old set are dropped.
    pub fn load_lanes(&self, lanes: Vec<Lane>) {
        let _ = self.transition(|base| {
            let mut next = base.next();
            next.lanes = Some(Arc::new(lanes));
            next.conflicts = None;
            Ok((next, ()))
        });
    }

    /// Re-clusters the loaded observations. Existing conflicts refer to the
    /// previous assignment and are dropped.
    pub fn identify_clusters(
        &self,
        eps_km: f64,
        min_samples: usize,
    ) -> ConflictResult<ClusteringReport> {
        self.transition(|base| {
            let clustered = cluster_observations(base.observations()?, eps_km, min_samples)?;
            let report = ClusteringReport::from_observations(&clustered);

            let mut next = base.next();
            next.observations = Some(Arc::new(clustered));
            next.conflicts = None;
            Ok((next, report))
        })
    }

    /// Runs detection and publishes the result as the new conflict set. If
    /// the observations have not been clustered yet they are clustered with
    /// the defaults, and that assignment is published alongside.
    pub fn detect_conflicts(
        &self,
        distance_threshold_km: f64,
    ) -> ConflictResult<Arc<Vec<ConflictZone>>> {
        self.transition(|base| {
            let observations = base.observations()?;
            let lanes = base.lanes()?;

            let observations = if is_clustered(observations) {
                Arc::clone(observations)
            } else {
                Arc::new(cluster_observations(
                    observations,
                    DEFAULT_EPS_KM,
                    DEFAULT_MIN_SAMPLES,
                )?)
            };

            let conflicts = Arc::new(detect_conflicts(
                &observations,
                lanes,
                distance_threshold_km,
            )?);

            let mut next = base.next();
            next.observations = Some(observations);
            next.conflicts = Some(Arc::clone(&conflicts));
            Ok((next, conflicts))
        })
    }

    pub fn conflicts(&self) -> ConflictResult<Arc<Vec<ConflictZone>>> {
        self.snapshot().conflicts().cloned()
    }

    pub fn conflict_summary(&self) -> ConflictResult<ConflictSummary> {
        let snapshot = self.snapshot();
        Ok(summarize(snapshot.conflicts()?))
    }

    pub fn monthly_stats(&self) -> ConflictResult<BTreeMap<MonthKey, MonthlyConflictStats>> {
        let snapshot = self.snapshot();
        let observations = snapshot.observations()?;
        let conflicts = snapshot.conflicts()?;
        Ok(monthly_stats(observations, conflicts))
    }

    pub fn suggest_route(&self, lane_id: usize, buffer_km: f64) -> ConflictResult<RouteSuggestion> {
        let snapshot = self.snapshot();
        let lanes = snapshot.lanes()?;
        let conflicts = snapshot.conflicts()?;

        let lane = lanes
            .get(lane_id)
            .ok_or_else(|| ConflictError::invalid(format!("Invalid lane ID: {}", lane_id)))?;

        suggest_route(
            lane_id,
            lane,
            &conflicts_for_lane(conflicts, lane_id),
            buffer_km,
        )
    }
}

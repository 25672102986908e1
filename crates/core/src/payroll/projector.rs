use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

use crate::errors::ApplicationError;
use crate::payroll::projection::{project, PayrollProjection};
use crate::payroll::service::PayrollComputationService;
use crate::roster::RosterStore;

pub const DEFAULT_MAX_RECOMPUTE_ATTEMPTS: u32 = 4;

/// Keeps the projection in step with the roster.
///
/// A computed projection is applied only when the roster generation it was
/// computed from is still current. Results overtaken by a mutation are
/// discarded and the projection is recomputed from the newer snapshot.
pub struct PayrollProjector<S> {
    roster: Arc<RosterStore>,
    service: S,
    max_attempts: u32,
    applied: Mutex<Option<Arc<PayrollProjection>>>,
}

impl<S> PayrollProjector<S>
where
    S: PayrollComputationService,
{
    pub fn new(roster: Arc<RosterStore>, service: S) -> Self {
        Self::with_max_attempts(roster, service, DEFAULT_MAX_RECOMPUTE_ATTEMPTS)
    }

    pub fn with_max_attempts(roster: Arc<RosterStore>, service: S, max_attempts: u32) -> Self {
        Self { roster, service, max_attempts: max_attempts.max(1), applied: Mutex::new(None) }
    }

    pub fn roster(&self) -> &Arc<RosterStore> {
        &self.roster
    }

    /// Last applied projection, or `None` if the roster has moved on since.
    pub fn current(&self) -> Option<Arc<PayrollProjection>> {
        let generation = self.roster.generation();
        self.applied().as_ref().filter(|projection| projection.generation() == generation).cloned()
    }

    /// Current projection, recomputing only when the cached one is stale.
    pub async fn ensure_current(&self) -> Result<Arc<PayrollProjection>, ApplicationError> {
        match self.current() {
            Some(projection) => Ok(projection),
            None => self.refresh().await,
        }
    }

    pub async fn refresh(&self) -> Result<Arc<PayrollProjection>, ApplicationError> {
        for attempt in 1..=self.max_attempts {
            let snapshot = self.roster.snapshot();
            let projection = match project(&snapshot.employees, &self.service).await {
                Ok(projection) => projection.at_generation(snapshot.generation),
                Err(error) => {
                    self.clear_older_than(snapshot.generation);
                    warn!(
                        event_name = "payroll.projection_failed",
                        generation = snapshot.generation,
                        error = %error,
                        "payroll computation failed; cached projection cleared"
                    );
                    return Err(error);
                }
            };

            let mut applied = self.applied();
            let latest = self.roster.generation();
            if latest != snapshot.generation {
                drop(applied);
                debug!(
                    event_name = "payroll.projection_discarded_stale",
                    computed_generation = snapshot.generation,
                    roster_generation = latest,
                    attempt,
                    "roster changed during computation; discarding result"
                );
                continue;
            }
            if let Some(existing) =
                applied.as_ref().filter(|existing| existing.generation() >= snapshot.generation)
            {
                let existing = Arc::clone(existing);
                drop(applied);
                debug!(
                    event_name = "payroll.projection_already_applied",
                    computed_generation = snapshot.generation,
                    applied_generation = existing.generation(),
                    "an equal or newer projection was applied concurrently"
                );
                return Ok(existing);
            }

            let projection = Arc::new(projection);
            *applied = Some(Arc::clone(&projection));
            drop(applied);
            info!(
                event_name = "payroll.projection_applied",
                generation = projection.generation(),
                employee_count = projection.len(),
                issue_count = projection.issues().len(),
                "payroll projection applied"
            );
            return Ok(projection);
        }

        self.clear();
        warn!(
            event_name = "payroll.projection_superseded",
            attempts = self.max_attempts,
            "roster kept changing during every recompute attempt"
        );
        Err(ApplicationError::ProjectionSuperseded { attempts: self.max_attempts })
    }

    fn clear(&self) {
        *self.applied() = None;
    }

    /// Drops the applied projection unless it is at least `generation`.
    fn clear_older_than(&self, generation: u64) {
        let mut applied = self.applied();
        if applied.as_ref().is_some_and(|existing| existing.generation() < generation) {
            *applied = None;
        }
    }

    fn applied(&self) -> MutexGuard<'_, Option<Arc<PayrollProjection>>> {
        match self.applied.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

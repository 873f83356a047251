mod eligibility;
mod fatigue;
mod generate;
mod selector;
mod types;

pub use eligibility::{Eligibility, EligibilityIndex, SlotKey};
pub use fatigue::{FatigueTracker, FatigueViolation};
pub use generate::GeneratedRoster;
pub use selector::{select, Candidate, Load, LoadBook};
pub use types::{
    Cancellation, DateRange, Exclusion, RosterEntry, RosterError, SlotState, UnfilledReason,
};

use crate::config::RosterConfig;
use crate::model::Shift;
use crate::storage::RosterSnapshot;

/// Scheduler : configuration + instantané figé pour la durée d'un run.
#[derive(Debug)]
pub struct Scheduler {
    config: RosterConfig,
    snapshot: RosterSnapshot,
    cancellation: Cancellation,
}

impl Scheduler {
    /// Valide la configuration et la juridiction avant tout run.
    pub fn new(config: RosterConfig, snapshot: RosterSnapshot) -> Result<Self, RosterError> {
        config.validate()?;
        if let Some(code) = &config.jurisdiction {
            if !snapshot.calendar.known(code) {
                return Err(RosterError::UnknownJurisdiction(code.clone()));
            }
        }
        Ok(Self {
            config,
            snapshot,
            cancellation: Cancellation::default(),
        })
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Génère le roster de `range` ; `existing` est figé et repris tel quel.
    pub fn generate(
        &self,
        range: DateRange,
        existing: &[Shift],
    ) -> Result<GeneratedRoster, RosterError> {
        generate::generate(self, range, existing)
    }

    /// Génère avec les gardes engagées de l'instantané.
    pub fn generate_committed(&self, range: DateRange) -> Result<GeneratedRoster, RosterError> {
        generate::generate(self, range, &self.snapshot.committed)
    }
}

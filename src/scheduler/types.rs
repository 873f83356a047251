use crate::model::{Shift, ShiftType};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Plage de dates fermée `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, RosterError> {
        if end < start {
            return Err(RosterError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    /// Plage étendue vers le passé (fenêtre de fatigue).
    pub fn with_lookback(&self, days: u32) -> DateRange {
        DateRange {
            start: self
                .start
                .checked_sub_days(Days::new(u64::from(days)))
                .unwrap_or(NaiveDate::MIN),
            end: self.end,
        }
    }
}

/// Cause d'un créneau non pourvu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnfilledReason {
    /// Personne n'est éligible (congé, statut, emploi…)
    NoEligibleCandidate,
    /// Des éligibles existent mais tous sont en fatigue
    AllFatigued,
    /// Run interrompu avant ce créneau
    Cancelled,
}

/// État terminal d'un créneau.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum SlotState {
    Fixed,
    Assigned,
    Unfilled(UnfilledReason),
}

/// Une ligne du roster généré.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub shift: Shift,
    pub state: SlotState,
}

/// Motif d'exclusion d'un interne par le filtre d'éligibilité.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exclusion {
    OutsideEmployment,
    OnLeave,
    StatusRestricted,
    Reliever,
    PreOncall,
    NeedsBuddy,
}

/// Jeton d'interruption vérifié entre deux créneaux.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            flag: Arc::default(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("invalid date range: end {end} is before start {start}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    #[error("unknown jurisdiction: {0}")]
    UnknownJurisdiction(String),
    #[error("shift type {0} is referenced but not rostered")]
    UnknownShiftType(ShiftType),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#![forbid(unsafe_code)]
//! Radroster : moteur de génération de rosters d'internes en radiologie (sans BD).
//!
//! - Calendrier des jours fériés par juridiction (règles NZ intégrées).
//! - Filtre d'éligibilité (emploi, congés, statuts, binôme senior).
//! - Suivi de fatigue (repos minimal, séries consécutives).
//! - Sélection équitable déterministe et synthèse de charge.
//! - Stockage fichiers (JSON/CSV), commit par lot.

pub mod calendar;
pub mod config;
pub mod io;
pub mod model;
pub mod scheduler;
pub mod storage;
pub mod summary;

pub use calendar::{Holiday, HolidayCalendar};
pub use config::{load_config_from_file, RosterConfig};
pub use model::{
    DayPortion, IsoWeekday, Leave, LeaveType, Registrar, RegistrarId, Roster, Shift, ShiftId,
    ShiftType, Status, StatusType,
};
pub use scheduler::{
    Cancellation, DateRange, GeneratedRoster, RosterEntry, RosterError, Scheduler, SlotState,
    UnfilledReason,
};
pub use storage::{JsonStorage, RosterSnapshot, ShiftStore, Storage, StoreError};
pub use summary::{summarize, WorkloadSummary};

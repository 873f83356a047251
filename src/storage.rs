use crate::calendar::HolidayCalendar;
use crate::model::{Leave, Registrar, RegistrarId, Roster, Shift, ShiftId, ShiftType, Status};
use crate::scheduler::DateRange;
use anyhow::{anyhow, Context};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

/// Annuaire des internes et de leurs statuts.
pub trait RegistrarDirectory {
    fn registrars(&self) -> anyhow::Result<Vec<Registrar>>;
    /// Statuts recoupant la plage.
    fn statuses(&self, range: DateRange) -> anyhow::Result<Vec<Status>>;

    /// Internes dont la période d'emploi recoupe `[start, end]`, triés par id.
    fn active_registrars(&self, start: NaiveDate, end: NaiveDate) -> anyhow::Result<Vec<Registrar>> {
        let mut out: Vec<Registrar> = self
            .registrars()?
            .into_iter()
            .filter(|r| r.employed_between(start, end))
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }
}

pub trait LeaveLedger {
    fn leave_between(&self, range: DateRange) -> anyhow::Result<Vec<Leave>>;
}

pub trait HolidaySource {
    fn calendar(&self) -> anyhow::Result<HolidayCalendar>;
}

/// Gardes persistées : lecture, commit par lot, réaffectation manuelle.
pub trait ShiftStore {
    fn shifts_between(&self, range: DateRange) -> anyhow::Result<Vec<Shift>>;
    /// Chaque entrée est acceptée ou rejetée individuellement.
    fn commit(&mut self, batch: &[Shift]) -> Result<CommitReport, StoreError>;
    /// Réaffectation manuelle, sans contrôle d'éligibilité ni de fatigue.
    fn reassign(
        &mut self,
        id: &ShiftId,
        registrar: Option<RegistrarId>,
    ) -> Result<Shift, StoreError>;
}

/// Support de persistance du document complet.
pub trait Storage {
    /// Charge un roster depuis un support.
    fn load(&self) -> anyhow::Result<Roster>;
    /// Sauvegarde de manière atomique.
    fn save(&self, roster: &Roster) -> anyhow::Result<()>;
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("unknown shift: {0}")]
    UnknownShift(String),
    #[error("unknown registrar: {0}")]
    UnknownRegistrar(RegistrarId),
    #[error("{registrar} already holds {kind} on {date} (extra duty: {extra_duty})")]
    Duplicate {
        date: NaiveDate,
        kind: ShiftType,
        registrar: RegistrarId,
        extra_duty: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitRejection {
    /// L'entrée porte déjà un identifiant de store
    AlreadyCommitted,
    /// Viole l'unicité (date, type, interne, extra)
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedShift {
    pub shift: Shift,
    pub reason: CommitRejection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitReport {
    pub committed: Vec<Shift>,
    pub rejected: Vec<RejectedShift>,
}

type UniqueKey = (NaiveDate, ShiftType, RegistrarId, bool);

fn owned_key(shift: &Shift) -> Option<UniqueKey> {
    shift
        .unique_key()
        .map(|(date, kind, registrar, extra)| (date, kind, registrar.clone(), extra))
}

impl RegistrarDirectory for Roster {
    fn registrars(&self) -> anyhow::Result<Vec<Registrar>> {
        Ok(self.registrars.clone())
    }

    fn statuses(&self, range: DateRange) -> anyhow::Result<Vec<Status>> {
        Ok(self
            .statuses
            .iter()
            .filter(|s| s.start <= range.end && s.end >= range.start)
            .cloned()
            .collect())
    }
}

impl LeaveLedger for Roster {
    fn leave_between(&self, range: DateRange) -> anyhow::Result<Vec<Leave>> {
        Ok(self
            .leave
            .iter()
            .filter(|l| range.contains(l.date))
            .cloned()
            .collect())
    }
}

impl HolidaySource for Roster {
    fn calendar(&self) -> anyhow::Result<HolidayCalendar> {
        Ok(HolidayCalendar::new().with_holidays(self.holidays.iter().cloned()))
    }
}

impl ShiftStore for Roster {
    fn shifts_between(&self, range: DateRange) -> anyhow::Result<Vec<Shift>> {
        Ok(self
            .shifts
            .iter()
            .filter(|s| range.contains(s.date))
            .cloned()
            .collect())
    }

    fn commit(&mut self, batch: &[Shift]) -> Result<CommitReport, StoreError> {
        let mut taken: HashSet<UniqueKey> = self.shifts.iter().filter_map(owned_key).collect();
        let mut report = CommitReport::default();

        for shift in batch {
            let rejection = if shift.is_committed() {
                Some(CommitRejection::AlreadyCommitted)
            } else if owned_key(shift).is_some_and(|key| !taken.insert(key)) {
                Some(CommitRejection::Duplicate)
            } else {
                None
            };
            if let Some(reason) = rejection {
                warn!(%shift, ?reason, "commit entry rejected");
                report.rejected.push(RejectedShift {
                    shift: shift.clone(),
                    reason,
                });
                continue;
            }
            let mut stored = shift.clone();
            stored.id = Some(ShiftId::random());
            self.shifts.push(stored.clone());
            report.committed.push(stored);
        }
        debug!(
            committed = report.committed.len(),
            rejected = report.rejected.len(),
            "commit done"
        );
        Ok(report)
    }

    fn reassign(
        &mut self,
        id: &ShiftId,
        registrar: Option<RegistrarId>,
    ) -> Result<Shift, StoreError> {
        let pos = self
            .shifts
            .iter()
            .position(|s| s.id.as_ref() == Some(id))
            .ok_or_else(|| StoreError::UnknownShift(id.as_str().to_string()))?;

        if let Some(target) = &registrar {
            if self.find_registrar(target).is_none() {
                return Err(StoreError::UnknownRegistrar(target.clone()));
            }
            let current = &self.shifts[pos];
            let clash = self.shifts.iter().enumerate().any(|(i, s)| {
                i != pos
                    && s.date == current.date
                    && s.kind == current.kind
                    && s.extra_duty == current.extra_duty
                    && s.registrar.as_ref() == Some(target)
            });
            if clash {
                return Err(StoreError::Duplicate {
                    date: current.date,
                    kind: current.kind,
                    registrar: target.clone(),
                    extra_duty: current.extra_duty,
                });
            }
        }

        self.shifts[pos].registrar = registrar;
        Ok(self.shifts[pos].clone())
    }
}

/// Instantané en lecture seule pour un run.
#[derive(Debug, Clone, Default)]
pub struct RosterSnapshot {
    pub registrars: Vec<Registrar>,
    pub statuses: Vec<Status>,
    pub leave: Vec<Leave>,
    pub calendar: HolidayCalendar,
    /// Gardes engagées de `[start - lookback, end]`
    pub committed: Vec<Shift>,
}

impl RosterSnapshot {
    /// Lit les quatre collaborateurs en parallèle (données figées pour le run).
    pub fn fetch<D, L, H, S>(
        directory: &D,
        ledger: &L,
        holidays: &H,
        store: &S,
        range: DateRange,
        lookback_days: u32,
    ) -> anyhow::Result<Self>
    where
        D: RegistrarDirectory + Sync,
        L: LeaveLedger + Sync,
        H: HolidaySource + Sync,
        S: ShiftStore + Sync,
    {
        let window = range.with_lookback(lookback_days);
        thread::scope(|scope| {
            let registrars = scope.spawn(|| directory.registrars());
            let statuses = scope.spawn(|| directory.statuses(range));
            let leave = scope.spawn(|| ledger.leave_between(range));
            let calendar = scope.spawn(|| holidays.calendar());
            let committed = scope.spawn(|| store.shifts_between(window));

            Ok(Self {
                registrars: registrars
                    .join()
                    .map_err(|_| anyhow!("registrar fetch panicked"))?
                    .context("fetching registrars")?,
                statuses: statuses
                    .join()
                    .map_err(|_| anyhow!("status fetch panicked"))?
                    .context("fetching statuses")?,
                leave: leave
                    .join()
                    .map_err(|_| anyhow!("leave fetch panicked"))?
                    .context("fetching leave")?,
                calendar: calendar
                    .join()
                    .map_err(|_| anyhow!("holiday fetch panicked"))?
                    .context("fetching holidays")?,
                committed: committed
                    .join()
                    .map_err(|_| anyhow!("shift fetch panicked"))?
                    .context("fetching committed shifts")?,
            })
        })
    }
}

pub struct JsonStorage {
    path: PathBuf,
}

impl JsonStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Ok(Self { path: path.as_ref().to_path_buf() })
    }
}

impl Storage for JsonStorage {
    fn load(&self) -> anyhow::Result<Roster> {
        let data = fs::read(&self.path).with_context(|| format!("reading {}", self.path.display()))?;
        let roster: Roster = serde_json::from_slice(&data).with_context(|| "parsing roster.json")?;
        Ok(roster)
    }

    fn save(&self, roster: &Roster) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(roster)?;
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).with_context(|| "creating temp file")?;
        tmp.write_all(&json)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).with_context(|| "atomic rename")?;
        Ok(())
    }
}

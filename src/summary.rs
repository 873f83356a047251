//! Synthèse de charge par interne et grille jour × type pour relecture.

use crate::config::Weights;
use crate::model::{RegistrarId, Roster, Shift, ShiftType};
use crate::scheduler::DateRange;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    pub count: u32,
    pub weighted: f64,
    /// Part des gardes affectées (0–100)
    pub percentage: f64,
    pub stat_days: u32,
    pub by_type: BTreeMap<ShiftType, u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkloadSummary {
    pub rows: BTreeMap<RegistrarId, Workload>,
    pub total: u32,
    pub unfilled: u32,
}

impl WorkloadSummary {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: &RegistrarId) -> Option<&Workload> {
        self.rows.get(id)
    }

    /// Écart entre la charge pondérée max et min.
    pub fn spread(&self) -> f64 {
        let mut weighted = self.rows.values().map(|w| w.weighted);
        let Some(first) = weighted.next() else {
            return 0.0;
        };
        let (min, max) = weighted.fold((first, first), |(lo, hi), w| (lo.min(w), hi.max(w)));
        max - min
    }

    /// Tableau texte ; les noms viennent de `roster` quand il est fourni.
    pub fn table<'a>(&'a self, roster: Option<&'a Roster>) -> SummaryTable<'a> {
        SummaryTable {
            summary: self,
            roster,
        }
    }

    pub fn render(&self, roster: Option<&Roster>) -> String {
        self.table(roster).to_string()
    }
}

impl fmt::Display for WorkloadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.table(None), f)
    }
}

/// Vue affichable de la synthèse.
pub struct SummaryTable<'a> {
    summary: &'a WorkloadSummary,
    roster: Option<&'a Roster>,
}

impl fmt::Display for SummaryTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "registrar | count | weighted | %")?;
        for (id, w) in &self.summary.rows {
            let name = self
                .roster
                .and_then(|r| r.find_registrar(id))
                .map_or(id.as_str(), |r| r.username.as_str());
            writeln!(
                f,
                "{name} | {} | {:.1} | {:.1}",
                w.count, w.weighted, w.percentage
            )?;
        }
        write!(f, "total {} | unfilled {}", self.summary.total, self.summary.unfilled)
    }
}

/// Agrège les gardes affectées par interne.
pub fn summarize(shifts: &[Shift], weights: &Weights) -> WorkloadSummary {
    let mut summary = WorkloadSummary::default();
    for shift in shifts {
        let Some(id) = &shift.registrar else {
            summary.unfilled += 1;
            continue;
        };
        let row = summary.rows.entry(id.clone()).or_default();
        row.count += 1;
        row.weighted += weights.weight_of(shift);
        if shift.stat_day {
            row.stat_days += 1;
        }
        *row.by_type.entry(shift.kind).or_default() += 1;
        summary.total += 1;
    }
    if summary.total > 0 {
        let total = f64::from(summary.total);
        for row in summary.rows.values_mut() {
            row.percentage = f64::from(row.count) * 100.0 / total;
        }
    }
    summary
}

/// Grille date → type → gardes, avec une entrée pour chaque date de la plage.
pub fn day_grid(range: DateRange, shifts: &[Shift]) -> BTreeMap<NaiveDate, BTreeMap<ShiftType, Vec<&Shift>>> {
    let mut grid: BTreeMap<NaiveDate, BTreeMap<ShiftType, Vec<&Shift>>> =
        range.days().map(|d| (d, BTreeMap::new())).collect();
    for shift in shifts.iter().filter(|s| range.contains(s.date)) {
        grid.entry(shift.date)
            .or_default()
            .entry(shift.kind)
            .or_default()
            .push(shift);
    }
    grid
}

use crate::config::FatigueRules;
use crate::model::{RegistrarId, Shift, ShiftType};
use chrono::{Days, NaiveDate};
use std::collections::{BTreeMap, HashMap};

/// Raison d'un refus pour fatigue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FatigueViolation {
    /// Repos insuffisant entre deux gardes
    RestGap {
        earlier: NaiveDate,
        later: NaiveDate,
        needed_days: u32,
    },
    /// Trop de jours travaillés d'affilée
    Consecutive { run: u32, max: u32 },
}

#[derive(Debug, Clone, Copy)]
struct Worked {
    kind: ShiftType,
    fatigue_override: f64,
}

/// Historique glissant des gardes par interne pour un run.
///
/// Chaque affectation doit être enregistrée via [`FatigueTracker::record`]
/// avant l'évaluation du créneau suivant.
#[derive(Debug)]
pub struct FatigueTracker {
    rules: FatigueRules,
    worked: HashMap<RegistrarId, BTreeMap<NaiveDate, Vec<Worked>>>,
}

impl FatigueTracker {
    pub fn new(rules: FatigueRules) -> Self {
        Self {
            rules,
            worked: HashMap::new(),
        }
    }

    /// Amorce l'état avec des gardes déjà engagées.
    pub fn seed<'s, I: IntoIterator<Item = &'s Shift>>(&mut self, shifts: I) {
        for shift in shifts {
            if let Some(registrar) = &shift.registrar {
                self.record(registrar, shift.date, shift.kind, shift.fatigue_override);
            }
        }
    }

    pub fn record(
        &mut self,
        registrar: &RegistrarId,
        date: NaiveDate,
        kind: ShiftType,
        fatigue_override: f64,
    ) {
        self.worked
            .entry(registrar.clone())
            .or_default()
            .entry(date)
            .or_default()
            .push(Worked {
                kind,
                fatigue_override,
            });
    }

    /// Dernière date travaillée strictement avant `date`.
    pub fn last_before(&self, registrar: &RegistrarId, date: NaiveDate) -> Option<NaiveDate> {
        self.worked
            .get(registrar)?
            .range(..date)
            .next_back()
            .map(|(d, _)| *d)
    }

    pub fn can_assign(
        &self,
        registrar: &RegistrarId,
        date: NaiveDate,
        kind: ShiftType,
        fatigue_override: f64,
    ) -> Result<(), FatigueViolation> {
        let Some(history) = self.worked.get(registrar) else {
            return Ok(());
        };

        let window = u64::from(self.rules.window_days());
        if window > 0 {
            let span = Days::new(window - 1);
            let from = date.checked_sub_days(span).unwrap_or(NaiveDate::MIN);
            let to = date.checked_add_days(span).unwrap_or(NaiveDate::MAX);
            for (&other, shifts) in history.range(from..=to) {
                let gap = (date - other).num_days().unsigned_abs();
                for w in shifts {
                    // paire (antérieure → ultérieure) ; le jour même, les deux sens
                    if other <= date {
                        self.check_pair(w.kind, kind, gap, fatigue_override)
                            .map_err(|needed_days| FatigueViolation::RestGap {
                                earlier: other,
                                later: date,
                                needed_days,
                            })?;
                    }
                    if other >= date {
                        self.check_pair(kind, w.kind, gap, w.fatigue_override)
                            .map_err(|needed_days| FatigueViolation::RestGap {
                                earlier: date,
                                later: other,
                                needed_days,
                            })?;
                    }
                }
            }
        }

        let run = self.run_through(history, date);
        let max = self.rules.max_consecutive_days;
        if run > max && fatigue_override < self.rules.consecutive_override_threshold {
            return Err(FatigueViolation::Consecutive { run, max });
        }
        Ok(())
    }

    fn check_pair(
        &self,
        earlier: ShiftType,
        later: ShiftType,
        gap: u64,
        later_override: f64,
    ) -> Result<(), u32> {
        let (needed, threshold) = self.rules.min_gap(earlier, later);
        if gap < u64::from(needed) && later_override < threshold {
            return Err(needed);
        }
        Ok(())
    }

    /// Longueur de la série de jours travaillés contenant `date`.
    fn run_through(&self, history: &BTreeMap<NaiveDate, Vec<Worked>>, date: NaiveDate) -> u32 {
        let mut run = 1u32;
        let mut cursor = date;
        while let Some(prev) = cursor.pred_opt() {
            if !history.contains_key(&prev) {
                break;
            }
            run += 1;
            cursor = prev;
        }
        cursor = date;
        while let Some(next) = cursor.succ_opt() {
            if !history.contains_key(&next) {
                break;
            }
            run += 1;
            cursor = next;
        }
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RestRule;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn id() -> RegistrarId {
        RegistrarId::new("r1")
    }

    #[test]
    fn one_shift_per_day_by_default() {
        let mut t = FatigueTracker::new(FatigueRules::default());
        t.record(&id(), d(3), ShiftType::Day, 0.0);
        assert!(matches!(
            t.can_assign(&id(), d(3), ShiftType::Long, 0.0),
            Err(FatigueViolation::RestGap { .. })
        ));
        assert!(t.can_assign(&id(), d(4), ShiftType::Day, 0.0).is_ok());
        assert!(t.can_assign(&RegistrarId::new("other"), d(3), ShiftType::Long, 0.0).is_ok());
    }

    #[test]
    fn night_needs_longer_rest_before_day() {
        let mut t = FatigueTracker::new(FatigueRules::default());
        t.record(&id(), d(3), ShiftType::Night, 0.0);
        assert_eq!(
            t.can_assign(&id(), d(4), ShiftType::Day, 0.0),
            Err(FatigueViolation::RestGap {
                earlier: d(3),
                later: d(4),
                needed_days: 2
            })
        );
        assert!(t.can_assign(&id(), d(4), ShiftType::Night, 0.0).is_ok());
        assert!(t.can_assign(&id(), d(5), ShiftType::Day, 0.0).is_ok());
    }

    #[test]
    fn later_committed_shift_constrains_backwards() {
        let mut t = FatigueTracker::new(FatigueRules::default());
        t.record(&id(), d(5), ShiftType::Day, 0.0);
        assert!(t.can_assign(&id(), d(4), ShiftType::Night, 0.0).is_err());
        assert!(t.can_assign(&id(), d(4), ShiftType::Day, 0.0).is_ok());
    }

    #[test]
    fn override_relaxes_only_when_above_threshold() {
        let mut rules = FatigueRules::default();
        rules.rest.push(RestRule {
            after: ShiftType::Weekend,
            before: ShiftType::Weekend,
            min_gap_days: 7,
            override_threshold: Some(3.0),
        });
        let mut t = FatigueTracker::new(rules);
        t.record(&id(), d(1), ShiftType::Weekend, 0.0);
        assert!(t.can_assign(&id(), d(2), ShiftType::Weekend, 2.5).is_err());
        assert!(t.can_assign(&id(), d(2), ShiftType::Weekend, 3.0).is_ok());
        assert!(t.can_assign(&id(), d(8), ShiftType::Weekend, 0.0).is_ok());
    }

    #[test]
    fn consecutive_days_are_capped() {
        let mut rules = FatigueRules::default();
        rules.max_consecutive_days = 3;
        let mut t = FatigueTracker::new(rules);
        for day in [3, 4, 6] {
            t.record(&id(), d(day), ShiftType::Day, 0.0);
        }
        // 3,4,5,6 = 4 jours d'affilée
        assert_eq!(
            t.can_assign(&id(), d(5), ShiftType::Day, 0.0),
            Err(FatigueViolation::Consecutive { run: 4, max: 3 })
        );
        assert!(t.can_assign(&id(), d(5), ShiftType::Day, 1.0).is_ok());
        assert!(t.can_assign(&id(), d(8), ShiftType::Day, 0.0).is_ok());
    }

    #[test]
    fn oversized_window_saturates() {
        let rules = FatigueRules {
            default_min_gap_days: u32::MAX,
            ..FatigueRules::default()
        };
        let mut t = FatigueTracker::new(rules);
        t.record(&id(), d(3), ShiftType::Day, 0.0);
        assert!(matches!(
            t.can_assign(&id(), d(10), ShiftType::Day, 0.0),
            Err(FatigueViolation::RestGap { .. })
        ));
    }

    #[test]
    fn last_before_ignores_same_day_and_future() {
        let mut t = FatigueTracker::new(FatigueRules::default());
        t.seed(&[
            Shift::new(d(2), ShiftType::Day).assigned_to(id()),
            Shift::new(d(9), ShiftType::Day).assigned_to(id()),
            Shift::new(d(4), ShiftType::Night),
        ]);
        assert_eq!(t.last_before(&id(), d(5)), Some(d(2)));
        assert_eq!(t.last_before(&id(), d(2)), None);
    }
}

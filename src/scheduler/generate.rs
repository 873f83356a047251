use super::eligibility::{EligibilityIndex, SlotKey};
use super::fatigue::FatigueTracker;
use super::selector::{self, Candidate, LoadBook};
use super::types::{DateRange, RosterEntry, RosterError, SlotState, UnfilledReason};
use super::Scheduler;
use crate::calendar;
use crate::config::{RosterConfig, SlotRule};
use crate::model::{Registrar, RegistrarId, Shift, ShiftType};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Roster produit par un run : une entrée par créneau, dans l'ordre de traitement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedRoster {
    pub range: DateRange,
    pub entries: Vec<RosterEntry>,
}

impl GeneratedRoster {
    pub fn shifts(&self) -> Vec<Shift> {
        self.entries.iter().map(|e| e.shift.clone()).collect()
    }

    /// Gardes nouvellement affectées, à proposer au commit.
    pub fn to_commit(&self) -> Vec<Shift> {
        self.entries
            .iter()
            .filter(|e| e.state == SlotState::Assigned)
            .map(|e| e.shift.clone())
            .collect()
    }

    pub fn unfilled(&self) -> impl Iterator<Item = &RosterEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.state, SlotState::Unfilled(_)))
    }

    pub fn count(&self, state: SlotState) -> usize {
        self.entries.iter().filter(|e| e.state == state).count()
    }
}

/// Créneau à pourvoir.
struct OpenSlot<'c> {
    key: SlotKey,
    rule: Option<&'c SlotRule>,
    fatigue_override: f64,
}

enum Planned<'c> {
    Fixed(Shift),
    Open(OpenSlot<'c>),
}

/// (date, priorité, type, extra) : l'ordre de la clé est l'ordre de traitement.
type PlanKey = (NaiveDate, usize, ShiftType, bool);

pub(super) fn generate(
    scheduler: &Scheduler,
    range: DateRange,
    existing: &[Shift],
) -> Result<GeneratedRoster, RosterError> {
    let range = DateRange::new(range.start, range.end)?;
    let config = &scheduler.config;
    let snapshot = &scheduler.snapshot;
    let window = range.with_lookback(config.fatigue.lookback_days);

    let index = EligibilityIndex::new(&snapshot.registrars, &snapshot.statuses, &snapshot.leave);
    let stat_days: BTreeSet<NaiveDate> = config
        .jurisdiction
        .as_deref()
        .map(|code| snapshot.calendar.dates_between(code, range.start, range.end))
        .unwrap_or_default();

    let mut tracker = FatigueTracker::new(config.fatigue.clone());
    tracker.seed(existing.iter().filter(|s| window.contains(s.date)));

    let fixed: Vec<&Shift> = existing.iter().filter(|s| range.contains(s.date)).collect();
    let mut loads = LoadBook::default();
    let mut held: HashMap<RegistrarId, HashSet<(NaiveDate, ShiftType)>> = HashMap::new();
    let mut senior_days: HashSet<NaiveDate> = HashSet::new();
    for shift in &fixed {
        if let Some(id) = &shift.registrar {
            note_assignment(&index, &mut held, &mut senior_days, id, shift.date, shift.kind);
            loads.add(id, config.weights.weight_of(shift));
        }
    }

    let plan = plan_slots(config, range, &fixed);
    let mut entries = Vec::with_capacity(plan.len());

    for planned in plan {
        let slot = match planned {
            Planned::Fixed(shift) => {
                debug!(%shift, "slot fixed");
                entries.push(RosterEntry {
                    shift,
                    state: SlotState::Fixed,
                });
                continue;
            }
            Planned::Open(slot) => slot,
        };

        let SlotKey {
            date,
            kind,
            extra_duty,
        } = slot.key;
        let mut shift = Shift::new(date, kind);
        shift.stat_day = stat_days.contains(&date);
        shift.extra_duty = extra_duty;
        shift.fatigue_override = slot.fatigue_override;

        if scheduler.cancellation.is_cancelled() {
            entries.push(RosterEntry {
                shift,
                state: SlotState::Unfilled(UnfilledReason::Cancelled),
            });
            continue;
        }

        let eligibility = index.evaluate(slot.key, slot.rule, senior_days.contains(&date));
        for (id, why) in &eligibility.excluded {
            debug!(registrar = %id, ?why, %shift, "excluded");
        }
        let free: Vec<&Registrar> = eligibility
            .eligible
            .into_iter()
            .filter(|r| !held.get(&r.id).is_some_and(|h| h.contains(&(date, kind))))
            .collect();
        if free.is_empty() {
            warn!(%shift, "no eligible registrar");
            entries.push(RosterEntry {
                shift,
                state: SlotState::Unfilled(UnfilledReason::NoEligibleCandidate),
            });
            continue;
        }

        let mut candidates = Vec::with_capacity(free.len());
        for registrar in free {
            match tracker.can_assign(&registrar.id, date, kind, slot.fatigue_override) {
                Ok(()) => candidates.push(Candidate {
                    registrar,
                    load: loads.get(&registrar.id),
                    last_assigned: tracker.last_before(&registrar.id, date),
                }),
                Err(violation) => {
                    debug!(registrar = %registrar.id, ?violation, "fatigued");
                }
            }
        }

        let Some(chosen) = selector::select(&candidates) else {
            warn!(%shift, "all eligible registrars fatigued");
            entries.push(RosterEntry {
                shift,
                state: SlotState::Unfilled(UnfilledReason::AllFatigued),
            });
            continue;
        };

        tracker.record(&chosen.id, date, kind, slot.fatigue_override);
        note_assignment(&index, &mut held, &mut senior_days, &chosen.id, date, kind);
        loads.add(&chosen.id, config.weights.weight_of(&shift));
        shift.registrar = Some(chosen.id.clone());
        debug!(%shift, "slot assigned");
        entries.push(RosterEntry {
            shift,
            state: SlotState::Assigned,
        });
    }

    let roster = GeneratedRoster { range, entries };
    info!(
        start = %range.start,
        end = %range.end,
        fixed = roster.count(SlotState::Fixed),
        assigned = roster.count(SlotState::Assigned),
        unfilled = roster.unfilled().count(),
        "roster generated"
    );
    Ok(roster)
}

fn note_assignment(
    index: &EligibilityIndex<'_>,
    held: &mut HashMap<RegistrarId, HashSet<(NaiveDate, ShiftType)>>,
    senior_days: &mut HashSet<NaiveDate>,
    id: &RegistrarId,
    date: NaiveDate,
    kind: ShiftType,
) {
    held.entry(id.clone()).or_default().insert((date, kind));
    if index.registrar(id).is_some_and(|r| r.senior) {
        senior_days.insert(date);
    }
}

/// Énumère les créneaux de la plage et y rattache les gardes existantes.
fn plan_slots<'c>(config: &'c RosterConfig, range: DateRange, fixed: &[&Shift]) -> Vec<Planned<'c>> {
    let mut existing: BTreeMap<PlanKey, Vec<Shift>> = BTreeMap::new();
    for shift in fixed {
        let key = (shift.date, config.priority(shift.kind), shift.kind, shift.extra_duty);
        existing.entry(key).or_default().push((*shift).clone());
    }

    for date in range.days() {
        let weekday = calendar::weekday(date);
        for rule in config.shift_types.iter().filter(|r| r.weekdays.contains(&weekday)) {
            let key = (date, config.priority(rule.shift_type), rule.shift_type, false);
            existing.entry(key).or_default();
        }
    }

    let mut extras: BTreeMap<(NaiveDate, ShiftType), Vec<f64>> = BTreeMap::new();
    for extra in config.extra_duties.iter().filter(|e| range.contains(e.date)) {
        let overrides = extras.entry((extra.date, extra.shift_type)).or_default();
        overrides.extend(std::iter::repeat(extra.fatigue_override).take(extra.count as usize));
        let key = (extra.date, config.priority(extra.shift_type), extra.shift_type, true);
        existing.entry(key).or_default();
    }

    let mut plan = Vec::new();
    for ((date, _, kind, extra_duty), shifts) in existing {
        let open: Vec<f64> = if extra_duty {
            extras
                .get(&(date, kind))
                .map(|o| o.iter().skip(shifts.len()).copied().collect())
                .unwrap_or_default()
        } else if shifts.is_empty() {
            vec![config.override_for(date, kind)]
        } else {
            Vec::new()
        };

        plan.extend(shifts.into_iter().map(Planned::Fixed));
        plan.extend(open.into_iter().map(|fatigue_override| {
            Planned::Open(OpenSlot {
                key: SlotKey {
                    date,
                    kind,
                    extra_duty,
                },
                rule: config.slot_rule(kind),
                fatigue_override,
            })
        }));
    }
    plan
}

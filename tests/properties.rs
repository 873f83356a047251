//! Propriétés du générateur sur des entrées aléatoires (config par défaut).

use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate};
use proptest::prelude::*;

use radroster::config::{FatigueRules, SlotRule};
use radroster::{
    summarize, DateRange, DayPortion, GeneratedRoster, IsoWeekday, Leave, LeaveType, Registrar, RegistrarId,
    Roster, RosterConfig, RosterSnapshot, Scheduler, Shift, ShiftType, SlotState,
};

#[derive(Debug, Clone)]
struct Input {
    registrars: usize,
    start: NaiveDate,
    days: u32,
    /// (interne, jour relatif, approuvé, annulé)
    leave: Vec<(usize, u32, bool, bool)>,
}

impl Input {
    fn range(&self) -> DateRange {
        DateRange::new(self.start, self.start + Duration::days(i64::from(self.days) - 1)).unwrap()
    }
}

fn arb_input() -> impl Strategy<Value = Input> {
    (
        1usize..=6,
        0i64..28,
        1u32..=21,
        prop::collection::vec((0usize..6, 0u32..21, any::<bool>(), any::<bool>()), 0..12),
    )
        .prop_map(|(registrars, offset, days, leave)| Input {
            registrars,
            start: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap() + Duration::days(offset),
            days,
            leave,
        })
}

fn roster_of(input: &Input) -> Roster {
    let mut roster = Roster::default();
    for i in 0..input.registrars {
        roster
            .registrars
            .push(Registrar::new(format!("r{i}"), format!("user{i}")));
    }
    for &(who, day, approved, cancelled) in &input.leave {
        roster.leave.push(Leave {
            registrar: RegistrarId::new(format!("r{}", who % input.registrars)),
            date: input.start + Duration::days(i64::from(day)),
            kind: LeaveType::Annual,
            portion: DayPortion::All,
            approved,
            cancelled,
            comment: String::new(),
        });
    }
    roster
}

fn run(input: &Input) -> GeneratedRoster {
    let roster = roster_of(input);
    let range = input.range();
    let config = RosterConfig::default();
    let snapshot = RosterSnapshot::fetch(
        &roster,
        &roster,
        &roster,
        &roster,
        range,
        config.fatigue.lookback_days,
    )
    .unwrap();
    Scheduler::new(config, snapshot)
        .unwrap()
        .generate_committed(range)
        .unwrap()
}

/// Trois créneaux par jour, un seul par interne et par jour, sans congé.
fn uniform_config() -> RosterConfig {
    RosterConfig {
        shift_types: vec![
            SlotRule::new(ShiftType::Night, &IsoWeekday::ALL),
            SlotRule::new(ShiftType::Long, &IsoWeekday::ALL),
            SlotRule::new(ShiftType::Day, &IsoWeekday::ALL),
        ],
        fatigue: FatigueRules {
            max_consecutive_days: 14,
            rest: Vec::new(),
            ..FatigueRules::default()
        },
        ..RosterConfig::default()
    }
}

fn by_registrar(shifts: &[Shift]) -> BTreeMap<RegistrarId, Vec<&Shift>> {
    let mut out: BTreeMap<RegistrarId, Vec<&Shift>> = BTreeMap::new();
    for s in shifts {
        if let Some(id) = &s.registrar {
            out.entry(id.clone()).or_default().push(s);
        }
    }
    for list in out.values_mut() {
        list.sort_by_key(|s| s.date);
    }
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn identical_inputs_give_identical_output(input in arb_input()) {
        let a = serde_json::to_string(&run(&input)).unwrap();
        let b = serde_json::to_string(&run(&input)).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn every_slot_is_reported(input in arb_input()) {
        let generated = run(&input);
        let expected: usize = input
            .range()
            .days()
            .map(|d| if IsoWeekday::from(d.weekday()).is_weekend() { 2 } else { 3 })
            .sum();
        prop_assert_eq!(generated.entries.len(), expected);
        for entry in &generated.entries {
            let assigned = entry.shift.registrar.is_some();
            prop_assert_eq!(assigned, entry.state == SlotState::Assigned);
        }
    }

    #[test]
    fn no_double_booking(input in arb_input()) {
        let shifts = run(&input).shifts();
        let mut seen = HashSet::new();
        for key in shifts.iter().filter_map(Shift::unique_key) {
            prop_assert!(seen.insert(key), "duplicate booking {:?}", key);
        }
    }

    #[test]
    fn approved_leave_is_respected(input in arb_input()) {
        let roster = roster_of(&input);
        let blocked: HashSet<(RegistrarId, NaiveDate)> = roster
            .leave
            .iter()
            .filter(|l| l.blocks())
            .map(|l| (l.registrar.clone(), l.date))
            .collect();
        for s in run(&input).shifts() {
            if let Some(id) = s.registrar {
                prop_assert!(!blocked.contains(&(id.clone(), s.date)), "{} works on leave {}", id, s.date);
            }
        }
    }

    #[test]
    fn fatigue_rules_hold(input in arb_input()) {
        let rules = RosterConfig::default().fatigue;
        let shifts = run(&input).shifts();
        for (id, worked) in by_registrar(&shifts) {
            for (i, earlier) in worked.iter().enumerate() {
                for later in &worked[i + 1..] {
                    let gap = (later.date - earlier.date).num_days();
                    let (needed, _) = rules.min_gap(earlier.kind, later.kind);
                    prop_assert!(gap >= i64::from(needed), "{} rests {} day(s) between {} and {}", id, gap, earlier, later);
                }
            }

            let mut run_len = 0u32;
            let mut previous: Option<NaiveDate> = None;
            for date in worked.iter().map(|s| s.date) {
                run_len = match previous {
                    Some(p) if p == date => run_len,
                    Some(p) if p.succ_opt() == Some(date) => run_len + 1,
                    _ => 1,
                };
                previous = Some(date);
                prop_assert!(run_len <= rules.max_consecutive_days);
            }
        }
    }

    #[test]
    fn uniform_team_stays_within_one_shift(registrars in 3usize..=6, offset in 0i64..28, days in 1u32..=14) {
        let input = Input {
            registrars,
            start: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap() + Duration::days(offset),
            days,
            leave: Vec::new(),
        };
        let roster = roster_of(&input);
        let range = input.range();
        let config = uniform_config();
        let generated = Scheduler::new(config.clone(), RosterSnapshot {
            registrars: roster.registrars.clone(),
            ..RosterSnapshot::default()
        })
        .unwrap()
        .generate(range, &[])
        .unwrap();
        prop_assert_eq!(generated.count(SlotState::Assigned), 3 * days as usize);

        let summary = summarize(&generated.shifts(), &config.weights);
        let loads: Vec<f64> = roster
            .registrars
            .iter()
            .map(|r| summary.get(&r.id).map_or(0.0, |w| w.weighted))
            .collect();
        let max = loads.iter().copied().fold(f64::MIN, f64::max);
        let min = loads.iter().copied().fold(f64::MAX, f64::min);
        prop_assert!(max - min <= 1.0, "loads {:?}", loads);
    }
}

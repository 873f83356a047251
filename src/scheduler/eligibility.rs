use super::types::Exclusion;
use crate::config::SlotRule;
use crate::model::{DayPortion, IsoWeekday, Leave, Registrar, RegistrarId, ShiftType, Status, StatusType};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Créneau évalué par le filtre.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotKey {
    pub date: NaiveDate,
    pub kind: ShiftType,
    pub extra_duty: bool,
}

/// Résultat du filtre : éligibles triés par id, exclus avec leur motif.
#[derive(Debug, Default)]
pub struct Eligibility<'a> {
    pub eligible: Vec<&'a Registrar>,
    pub excluded: Vec<(&'a RegistrarId, Exclusion)>,
}

impl Eligibility<'_> {
    pub fn ids(&self) -> Vec<RegistrarId> {
        self.eligible.iter().map(|r| r.id.clone()).collect()
    }
}

/// Index construit une fois par run : statuts par interne, congés par interne puis date.
#[derive(Debug)]
pub struct EligibilityIndex<'a> {
    registrars: Vec<&'a Registrar>,
    statuses: HashMap<&'a RegistrarId, Vec<&'a Status>>,
    leave: HashMap<&'a RegistrarId, HashMap<NaiveDate, Vec<DayPortion>>>,
}

impl<'a> EligibilityIndex<'a> {
    pub fn new(registrars: &'a [Registrar], statuses: &'a [Status], leave: &'a [Leave]) -> Self {
        let mut sorted: Vec<&Registrar> = registrars.iter().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));
        sorted.dedup_by(|a, b| a.id == b.id);

        let mut by_registrar: HashMap<&RegistrarId, Vec<&Status>> = HashMap::new();
        for s in statuses {
            by_registrar.entry(&s.registrar).or_default().push(s);
        }

        let mut by_day: HashMap<&RegistrarId, HashMap<NaiveDate, Vec<DayPortion>>> =
            HashMap::new();
        for l in leave.iter().filter(|l| l.blocks()) {
            by_day
                .entry(&l.registrar)
                .or_default()
                .entry(l.date)
                .or_default()
                .push(l.portion);
        }

        Self {
            registrars: sorted,
            statuses: by_registrar,
            leave: by_day,
        }
    }

    pub fn registrar(&self, id: &RegistrarId) -> Option<&'a Registrar> {
        self.registrars
            .binary_search_by(|r| r.id.cmp(id))
            .ok()
            .map(|i| self.registrars[i])
    }

    /// Filtre la population pour un créneau.
    ///
    /// `senior_on_duty` : un senior tient déjà une garde ce jour-là (règle du buddy).
    pub fn evaluate(
        &self,
        slot: SlotKey,
        rule: Option<&SlotRule>,
        senior_on_duty: bool,
    ) -> Eligibility<'a> {
        let mut out = Eligibility::default();
        for &registrar in &self.registrars {
            match self.check(registrar, slot, rule, senior_on_duty) {
                Ok(()) => out.eligible.push(registrar),
                Err(why) => out.excluded.push((&registrar.id, why)),
            }
        }
        out
    }

    pub fn check(
        &self,
        registrar: &Registrar,
        slot: SlotKey,
        rule: Option<&SlotRule>,
        senior_on_duty: bool,
    ) -> Result<(), Exclusion> {
        if !registrar.employed_on(slot.date) {
            return Err(Exclusion::OutsideEmployment);
        }

        let leave = self
            .leave
            .get(&registrar.id)
            .and_then(|days| days.get(&slot.date));
        if let Some(portions) = leave {
            let blocked = portions.iter().any(|p| match rule {
                Some(rule) => rule.blocked_by(*p),
                None => true,
            });
            if blocked {
                return Err(Exclusion::OnLeave);
            }
        }

        let weekday = IsoWeekday::of(slot.date);
        let mut needs_buddy = false;
        let active = self
            .statuses
            .get(&registrar.id)
            .into_iter()
            .flatten()
            .filter(|s| s.covers(slot.date));
        for status in active {
            match status.kind {
                StatusType::Reliever => return Err(Exclusion::Reliever),
                StatusType::PreOncall if slot.kind.is_oncall() => {
                    return Err(Exclusion::PreOncall)
                }
                StatusType::Buddy if slot.kind.is_oncall() => needs_buddy = true,
                _ => {}
            }
            if !status.weekdays.is_empty() && !status.weekdays.contains(&weekday) {
                return Err(Exclusion::StatusRestricted);
            }
            if !status.shift_types.is_empty() && !status.shift_types.contains(&slot.kind) {
                return Err(Exclusion::StatusRestricted);
            }
        }

        if needs_buddy && !senior_on_duty {
            return Err(Exclusion::NeedsBuddy);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LeaveType;

    fn d(day: u32) -> NaiveDate {
        // 2025-03-03 est un lundi
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn people() -> Vec<Registrar> {
        vec![
            Registrar::new("c", "carol"),
            Registrar::new("a", "alice"),
            Registrar::new("b", "bob"),
        ]
    }

    fn slot(day: u32, kind: ShiftType) -> SlotKey {
        SlotKey {
            date: d(day),
            kind,
            extra_duty: false,
        }
    }

    fn leave(id: &str, day: u32, portion: DayPortion) -> Leave {
        Leave {
            registrar: RegistrarId::new(id),
            date: d(day),
            kind: LeaveType::Annual,
            portion,
            approved: true,
            cancelled: false,
            comment: String::new(),
        }
    }

    fn status(id: &str, kind: StatusType) -> Status {
        Status::new(RegistrarId::new(id), d(1), d(31), kind).unwrap()
    }

    #[test]
    fn eligible_set_is_sorted_by_id() {
        let people = people();
        let index = EligibilityIndex::new(&people, &[], &[]);
        let out = index.evaluate(slot(3, ShiftType::Day), None, false);
        let ids: Vec<_> = out.ids().iter().map(|i| i.as_str().to_owned()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn employment_window_and_leave_exclude() {
        let mut people = people();
        people[0].finish = Some(d(2));
        let leaves = vec![leave("a", 3, DayPortion::All)];
        let index = EligibilityIndex::new(&people, &[], &leaves);
        let out = index.evaluate(slot(3, ShiftType::Night), None, false);
        assert_eq!(out.ids(), vec![RegistrarId::new("b")]);
        assert!(out
            .excluded
            .contains(&(&RegistrarId::new("c"), Exclusion::OutsideEmployment)));
        assert!(out
            .excluded
            .contains(&(&RegistrarId::new("a"), Exclusion::OnLeave)));
    }

    #[test]
    fn unapproved_or_cancelled_leave_is_ignored() {
        let people = people();
        let mut pending = leave("a", 3, DayPortion::All);
        pending.approved = false;
        let mut cancelled = leave("b", 3, DayPortion::All);
        cancelled.cancelled = true;
        let leaves = [pending, cancelled];
        let index = EligibilityIndex::new(&people, &[], &leaves);
        assert_eq!(index.evaluate(slot(3, ShiftType::Day), None, false).eligible.len(), 3);
    }

    #[test]
    fn half_day_leave_uses_portion_mapping() {
        let people = people();
        let leaves = [leave("a", 3, DayPortion::Am)];
        let index = EligibilityIndex::new(&people, &[], &leaves);
        let night = SlotRule::new(ShiftType::Night, &IsoWeekday::ALL).with_portions(&[DayPortion::Pm]);
        let day = SlotRule::new(ShiftType::Day, &IsoWeekday::ALL);
        let a = index.registrar(&RegistrarId::new("a")).unwrap();
        assert!(index.check(a, slot(3, ShiftType::Night), Some(&night), false).is_ok());
        assert_eq!(
            index.check(a, slot(3, ShiftType::Day), Some(&day), false),
            Err(Exclusion::OnLeave)
        );
    }

    #[test]
    fn status_rules() {
        let people = people();
        let mut part_time = status("a", StatusType::PartTime);
        part_time.weekdays = vec![IsoWeekday::Mon, IsoWeekday::Tue];
        let statuses = vec![
            part_time,
            status("b", StatusType::PreOncall),
            status("c", StatusType::Reliever),
        ];
        let index = EligibilityIndex::new(&people, &statuses, &[]);
        let get = |id: &str| index.registrar(&RegistrarId::new(id)).unwrap();

        // lundi 3 / mercredi 5
        assert!(index.check(get("a"), slot(3, ShiftType::Night), None, false).is_ok());
        assert_eq!(
            index.check(get("a"), slot(5, ShiftType::Night), None, false),
            Err(Exclusion::StatusRestricted)
        );
        assert!(index.check(get("b"), slot(3, ShiftType::Day), None, false).is_ok());
        assert_eq!(
            index.check(get("b"), slot(3, ShiftType::Night), None, false),
            Err(Exclusion::PreOncall)
        );
        assert_eq!(
            index.check(get("c"), slot(3, ShiftType::Day), None, false),
            Err(Exclusion::Reliever)
        );
    }

    #[test]
    fn status_outside_interval_has_no_effect() {
        let people = people();
        let reliever = Status::new(RegistrarId::new("c"), d(10), d(12), StatusType::Reliever).unwrap();
        let statuses = [reliever];
        let index = EligibilityIndex::new(&people, &statuses, &[]);
        let c = index.registrar(&RegistrarId::new("c")).unwrap();
        assert!(index.check(c, slot(9, ShiftType::Day), None, false).is_ok());
        assert!(index.check(c, slot(12, ShiftType::Day), None, false).is_err());
        assert!(index.check(c, slot(13, ShiftType::Day), None, false).is_ok());
    }

    #[test]
    fn buddy_needs_a_senior_on_the_same_day() {
        let people = people();
        let statuses = [status("a", StatusType::Buddy)];
        let index = EligibilityIndex::new(&people, &statuses, &[]);
        let a = index.registrar(&RegistrarId::new("a")).unwrap();
        assert_eq!(
            index.check(a, slot(3, ShiftType::Night), None, false),
            Err(Exclusion::NeedsBuddy)
        );
        assert!(index.check(a, slot(3, ShiftType::Night), None, true).is_ok());
        // hors astreinte, pas de binôme requis
        assert!(index.check(a, slot(3, ShiftType::Day), None, false).is_ok());
    }
}

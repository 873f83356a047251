//! Calendrier : jour de la semaine et jours fériés par juridiction.
//!
//! Deux sources fusionnées : des entrées datées (CSV/JSON) et des règles
//! intégrées pour la Nouvelle-Zélande (`NZ`) et Canterbury (`NZ-CAN`).

use crate::model::IsoWeekday;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Juridictions couvertes par les règles intégrées.
pub const BUILTIN_JURISDICTIONS: [&str; 2] = ["NZ", "NZ-CAN"];

/// Dates de Matariki publiées (loi de 2022).
const MATARIKI: [(i32, u32, u32); 9] = [
    (2022, 6, 24),
    (2023, 7, 14),
    (2024, 6, 28),
    (2025, 6, 20),
    (2026, 7, 10),
    (2027, 6, 25),
    (2028, 7, 14),
    (2029, 7, 6),
    (2030, 6, 21),
];

/// Jour férié nommé.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Holiday {
    pub jurisdiction: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub name: String,
}

pub fn weekday(date: NaiveDate) -> IsoWeekday {
    IsoWeekday::of(date)
}

/// Calendrier des jours fériés (instantané en lecture seule pendant un run).
#[derive(Debug, Clone)]
pub struct HolidayCalendar {
    entries: BTreeMap<String, BTreeMap<NaiveDate, String>>,
    builtin: bool,
}

impl Default for HolidayCalendar {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            builtin: true,
        }
    }
}

impl HolidayCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calendrier sans règles intégrées : seules les entrées ajoutées comptent.
    pub fn without_builtin() -> Self {
        Self {
            entries: BTreeMap::new(),
            builtin: false,
        }
    }

    pub fn with_holidays<I: IntoIterator<Item = Holiday>>(mut self, holidays: I) -> Self {
        for h in holidays {
            self.add(h);
        }
        self
    }

    pub fn add(&mut self, holiday: Holiday) {
        self.entries
            .entry(normalize(&holiday.jurisdiction))
            .or_default()
            .insert(holiday.date, holiday.name);
    }

    /// Vrai si une source existe pour ce code.
    pub fn known(&self, jurisdiction: &str) -> bool {
        let code = normalize(jurisdiction);
        self.entries.contains_key(&code) || (self.builtin && BUILTIN_JURISDICTIONS.contains(&code.as_str()))
    }

    pub fn is_holiday(&self, date: NaiveDate, jurisdiction: &str) -> bool {
        let code = normalize(jurisdiction);
        if self
            .entries
            .get(&code)
            .is_some_and(|dates| dates.contains_key(&date))
        {
            return true;
        }
        self.builtin && builtin_holidays(date.year(), &code).contains_key(&date)
    }

    /// Jours fériés de `[start, end]`, triés par date.
    pub fn holidays_between(
        &self,
        jurisdiction: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<Holiday> {
        let code = normalize(jurisdiction);
        let mut found: BTreeMap<NaiveDate, String> = BTreeMap::new();
        if self.builtin {
            for year in start.year()..=end.year() {
                found.extend(builtin_holidays(year, &code));
            }
        }
        if let Some(dates) = self.entries.get(&code) {
            found.extend(dates.range(start..=end).map(|(d, n)| (*d, n.clone())));
        }
        found
            .into_iter()
            .filter(|(d, _)| *d >= start && *d <= end)
            .map(|(date, name)| Holiday {
                jurisdiction: code.clone(),
                date,
                name,
            })
            .collect()
    }

    /// Ensemble des dates fériées de la plage, pour indexation en début de run.
    pub fn dates_between(
        &self,
        jurisdiction: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> BTreeSet<NaiveDate> {
        self.holidays_between(jurisdiction, start, end)
            .into_iter()
            .map(|h| h.date)
            .collect()
    }
}

fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

fn builtin_holidays(year: i32, code: &str) -> BTreeMap<NaiveDate, String> {
    let mut out = BTreeMap::new();
    if !BUILTIN_JURISDICTIONS.contains(&code) {
        return out;
    }
    let Some(jan1) = NaiveDate::from_ymd_opt(year, 1, 1) else {
        return out;
    };

    add_pair(&mut out, jan1, "New Year's Day", "Day after New Year's Day");
    if let Some(dec25) = NaiveDate::from_ymd_opt(year, 12, 25) {
        add_pair(&mut out, dec25, "Christmas Day", "Boxing Day");
    }

    for (month, day, name) in [(2, 6, "Waitangi Day"), (4, 25, "ANZAC Day")] {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            out.insert(date, name.to_string());
            if year >= 2014 && IsoWeekday::of(date).is_weekend() {
                out.insert(next_monday(date), format!("{name} (observed)"));
            }
        }
    }

    if let Some(easter) = easter_sunday(year) {
        out.insert(easter - Duration::days(2), "Good Friday".to_string());
        out.insert(easter + Duration::days(1), "Easter Monday".to_string());
    }
    if let Some(date) = NaiveDate::from_weekday_of_month_opt(year, 6, Weekday::Mon, 1) {
        out.insert(date, "Sovereign's Birthday".to_string());
    }
    if let Some(&(_, m, d)) = MATARIKI.iter().find(|(y, _, _)| *y == year) {
        if let Some(date) = NaiveDate::from_ymd_opt(year, m, d) {
            out.insert(date, "Matariki".to_string());
        }
    }
    if let Some(date) = NaiveDate::from_weekday_of_month_opt(year, 10, Weekday::Mon, 4) {
        out.insert(date, "Labour Day".to_string());
    }
    if code == "NZ-CAN" {
        if let Some(tue) = NaiveDate::from_weekday_of_month_opt(year, 11, Weekday::Tue, 1) {
            out.insert(tue + Duration::days(10), "Canterbury Anniversary Day".to_string());
        }
    }
    out
}

/// Paire de jours consécutifs (1er/2 janvier, Noël/lendemain) avec report en semaine.
fn add_pair(out: &mut BTreeMap<NaiveDate, String>, first: NaiveDate, a: &str, b: &str) {
    let second = first + Duration::days(1);
    out.insert(first, a.to_string());
    out.insert(second, b.to_string());
    match IsoWeekday::of(first) {
        IsoWeekday::Fri => {
            out.insert(first + Duration::days(3), format!("{b} (observed)"));
        }
        IsoWeekday::Sat => {
            out.insert(first + Duration::days(2), format!("{a} (observed)"));
            out.insert(first + Duration::days(3), format!("{b} (observed)"));
        }
        IsoWeekday::Sun => {
            out.insert(first + Duration::days(2), format!("{a} (observed)"));
        }
        _ => {}
    }
}

fn next_monday(date: NaiveDate) -> NaiveDate {
    let ahead = 7 - i64::from(date.weekday().num_days_from_monday());
    date + Duration::days(ahead)
}

/// Dimanche de Pâques (calendrier grégorien).
fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)
}

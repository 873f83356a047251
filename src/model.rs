use crate::calendar::Holiday;
use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifiant fort pour Registrar (ordonné : sert de départage final)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegistrarId(String);

impl RegistrarId {
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self(s.as_ref().to_owned())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegistrarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifiant attribué par le store au moment du commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShiftId(String);

impl ShiftId {
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self(s.as_ref().to_owned())
    }
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Interne (registrar) éligible aux gardes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registrar {
    pub id: RegistrarId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_number: Option<String>,
    #[serde(default)]
    pub senior: bool,
    /// Début de formation
    #[serde(default)]
    pub start: Option<NaiveDate>,
    /// Fin de formation
    #[serde(default)]
    pub finish: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_edited: Option<DateTime<Utc>>,
}

impl Registrar {
    pub fn new<I: AsRef<str>, U: Into<String>>(id: I, username: U) -> Self {
        Self {
            id: RegistrarId::new(id),
            username: username.into(),
            employee_number: None,
            senior: false,
            start: None,
            finish: None,
            last_edited: None,
        }
    }

    /// Année de formation à la date `today` (1 = première année).
    ///
    /// `None` sans date de début, ou une fois la formation terminée.
    pub fn year(&self, today: NaiveDate) -> Option<i64> {
        let start = self.start?;
        if self.finish.is_some_and(|finish| today > finish) {
            return None;
        }
        Some((today - start).num_days().div_euclid(365) + 1)
    }

    /// Vrai si la période d'emploi couvre `date`.
    pub fn employed_on(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| s <= date) && self.finish.map_or(true, |f| f >= date)
    }

    /// Vrai si la période d'emploi recoupe `[start, end]`.
    pub fn employed_between(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.start.map_or(true, |s| s <= end) && self.finish.map_or(true, |f| f >= start)
    }
}

/// Jour ISO (lundi = 1 … dimanche = 7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IsoWeekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl IsoWeekday {
    pub const ALL: [IsoWeekday; 7] = [
        IsoWeekday::Mon,
        IsoWeekday::Tue,
        IsoWeekday::Wed,
        IsoWeekday::Thu,
        IsoWeekday::Fri,
        IsoWeekday::Sat,
        IsoWeekday::Sun,
    ];

    pub fn of(date: NaiveDate) -> Self {
        Self::from(date.weekday())
    }

    pub fn number(self) -> u8 {
        self as u8 + 1
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.get(usize::from(n).checked_sub(1)?).copied()
    }

    pub fn is_weekend(self) -> bool {
        matches!(self, IsoWeekday::Sat | IsoWeekday::Sun)
    }
}

impl From<Weekday> for IsoWeekday {
    fn from(w: Weekday) -> Self {
        match w {
            Weekday::Mon => IsoWeekday::Mon,
            Weekday::Tue => IsoWeekday::Tue,
            Weekday::Wed => IsoWeekday::Wed,
            Weekday::Thu => IsoWeekday::Thu,
            Weekday::Fri => IsoWeekday::Fri,
            Weekday::Sat => IsoWeekday::Sat,
            Weekday::Sun => IsoWeekday::Sun,
        }
    }
}

impl FromStr for IsoWeekday {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(n) = s.parse::<u8>() {
            return Self::from_number(n).ok_or_else(|| format!("weekday out of range: {n}"));
        }
        match s.to_ascii_lowercase().as_str() {
            "mon" | "monday" => Ok(IsoWeekday::Mon),
            "tue" | "tuesday" => Ok(IsoWeekday::Tue),
            "wed" | "wednesday" => Ok(IsoWeekday::Wed),
            "thu" | "thur" | "thursday" => Ok(IsoWeekday::Thu),
            "fri" | "friday" => Ok(IsoWeekday::Fri),
            "sat" | "saturday" => Ok(IsoWeekday::Sat),
            "sun" | "sunday" => Ok(IsoWeekday::Sun),
            _ => Err(format!("unknown weekday: {s}")),
        }
    }
}

/// Type de garde
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ShiftType {
    /// Journée ordinaire
    Day,
    /// Journée longue (astreinte)
    Long,
    /// Nuit
    Night,
    /// Journée de week-end (astreinte)
    Weekend,
}

impl ShiftType {
    pub const ALL: [ShiftType; 4] = [
        ShiftType::Day,
        ShiftType::Long,
        ShiftType::Night,
        ShiftType::Weekend,
    ];

    /// Types comptés comme astreinte (exclus pour les pré-astreinte).
    pub fn is_oncall(self) -> bool {
        !matches!(self, ShiftType::Day)
    }

    pub fn code(self) -> &'static str {
        match self {
            ShiftType::Day => "DAY",
            ShiftType::Long => "LONG",
            ShiftType::Night => "NIGHT",
            ShiftType::Weekend => "WEEKEND",
        }
    }
}

impl fmt::Display for ShiftType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ShiftType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown shift type: {s}"))
    }
}

/// Statut temporaire d'un interne.
///
/// - PreOncall : premières années, pas d'astreinte
/// - Reliever : jamais d'affectation automatique, manuel uniquement
/// - PartTime : ne travaille pas certains jours
/// - PreExam : période avant examen
/// - Buddy : doit être accompagné d'un senior quand il est de garde
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusType {
    PreOncall,
    Reliever,
    PartTime,
    PreExam,
    Buddy,
}

impl FromStr for StatusType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "pre_oncall" => Ok(StatusType::PreOncall),
            "reliever" => Ok(StatusType::Reliever),
            "part_time" => Ok(StatusType::PartTime),
            "pre_exam" => Ok(StatusType::PreExam),
            "buddy" => Ok(StatusType::Buddy),
            other => Err(format!("unknown status type: {other}")),
        }
    }
}

/// Statut sur l'intervalle fermé `[start, end]`.
///
/// `weekdays` / `shift_types` vides = aucune restriction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub registrar: RegistrarId,
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(rename = "type")]
    pub kind: StatusType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weekdays: Vec<IsoWeekday>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shift_types: Vec<ShiftType>,
}

impl Status {
    pub fn new(
        registrar: RegistrarId,
        start: NaiveDate,
        end: NaiveDate,
        kind: StatusType,
    ) -> Result<Self, String> {
        if end < start {
            return Err("status end must not be before start".to_string());
        }
        Ok(Self {
            registrar,
            start,
            end,
            kind,
            weekdays: Vec::new(),
            shift_types: Vec::new(),
        })
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveType {
    Annual,
    Sick,
    Education,
    Parental,
    Lieu,
    Other,
}

impl FromStr for LeaveType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "annual" => Ok(LeaveType::Annual),
            "sick" => Ok(LeaveType::Sick),
            "education" | "conference" => Ok(LeaveType::Education),
            "parental" => Ok(LeaveType::Parental),
            "lieu" => Ok(LeaveType::Lieu),
            "other" => Ok(LeaveType::Other),
            other => Err(format!("unknown leave type: {other}")),
        }
    }
}

/// Portion de journée
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DayPortion {
    #[default]
    All,
    Am,
    Pm,
}

impl FromStr for DayPortion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "ALL" => Ok(DayPortion::All),
            "AM" => Ok(DayPortion::Am),
            "PM" => Ok(DayPortion::Pm),
            other => Err(format!("unknown day portion: {other}")),
        }
    }
}

/// Congé sur une date (ou demi-journée)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leave {
    pub registrar: RegistrarId,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: LeaveType,
    #[serde(default)]
    pub portion: DayPortion,
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

impl Leave {
    /// Seul un congé approuvé et non annulé bloque une affectation.
    pub fn blocks(&self) -> bool {
        self.approved && !self.cancelled
    }
}

/// Garde datée et typée, éventuellement affectée.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ShiftId>,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: ShiftType,
    #[serde(default)]
    pub registrar: Option<RegistrarId>,
    #[serde(default)]
    pub stat_day: bool,
    #[serde(default)]
    pub extra_duty: bool,
    #[serde(default)]
    pub fatigue_override: f64,
}

impl Shift {
    pub fn new(date: NaiveDate, kind: ShiftType) -> Self {
        Self {
            id: None,
            date,
            kind,
            registrar: None,
            stat_day: false,
            extra_duty: false,
            fatigue_override: 0.0,
        }
    }

    pub fn assigned_to(mut self, registrar: RegistrarId) -> Self {
        self.registrar = Some(registrar);
        self
    }

    /// Clé d'unicité (date, type, interne, extra).
    pub fn unique_key(&self) -> Option<(NaiveDate, ShiftType, &RegistrarId, bool)> {
        self.registrar
            .as_ref()
            .map(|r| (self.date, self.kind, r, self.extra_duty))
    }

    pub fn is_committed(&self) -> bool {
        self.id.is_some()
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registrar = self.registrar.as_ref().map_or("N/A", RegistrarId::as_str);
        write!(
            f,
            "{} {} ({:?}){}: {}",
            self.kind,
            self.date,
            IsoWeekday::of(self.date),
            if self.extra_duty { " +extra" } else { "" },
            registrar
        )
    }
}

/// Document complet : annuaire, statuts, congés, fériés locaux et gardes engagées.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Roster {
    #[serde(default)]
    pub registrars: Vec<Registrar>,
    #[serde(default)]
    pub statuses: Vec<Status>,
    #[serde(default)]
    pub leave: Vec<Leave>,
    #[serde(default)]
    pub holidays: Vec<Holiday>,
    #[serde(default)]
    pub shifts: Vec<Shift>,
}

impl Roster {
    pub fn find_registrar_by_username<'a>(&'a self, username: &str) -> Option<&'a Registrar> {
        self.registrars.iter().find(|r| r.username == username)
    }
    pub fn find_registrar<'a>(&'a self, id: &RegistrarId) -> Option<&'a Registrar> {
        self.registrars.iter().find(|r| &r.id == id)
    }

    /// Résout un interne par identifiant ou par nom d'utilisateur.
    pub fn resolve_registrar<'a>(&'a self, key: &str) -> Option<&'a Registrar> {
        self.find_registrar(&RegistrarId::new(key))
            .or_else(|| self.find_registrar_by_username(key))
    }
}

use crate::model::{DayPortion, IsoWeekday, Shift, ShiftType};
use crate::scheduler::RosterError;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// Borne des durées de configuration exprimées en jours.
pub const MAX_SPAN_DAYS: u32 = 366;

/// Configuration complète d'une génération de roster.
///
/// L'ordre de `shift_types` est la priorité de traitement au sein d'une journée.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterConfig {
    #[serde(default)]
    pub jurisdiction: Option<String>,
    #[serde(default = "default_slots")]
    pub shift_types: Vec<SlotRule>,
    #[serde(default)]
    pub fatigue: FatigueRules,
    #[serde(default)]
    pub weights: Weights,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_duties: Vec<ExtraDuty>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<SlotOverride>,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            jurisdiction: None,
            shift_types: default_slots(),
            fatigue: FatigueRules::default(),
            weights: Weights::default(),
            extra_duties: Vec::new(),
            overrides: Vec::new(),
        }
    }
}

/// Un type de garde à pourvoir, ses jours et les demi-journées qu'il occupe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotRule {
    pub shift_type: ShiftType,
    pub weekdays: Vec<IsoWeekday>,
    #[serde(default = "whole_day")]
    pub portions: Vec<DayPortion>,
}

impl SlotRule {
    pub fn new(shift_type: ShiftType, weekdays: &[IsoWeekday]) -> Self {
        Self {
            shift_type,
            weekdays: weekdays.to_vec(),
            portions: whole_day(),
        }
    }

    pub fn with_portions(mut self, portions: &[DayPortion]) -> Self {
        self.portions = portions.to_vec();
        self
    }

    /// Vrai si un congé sur `portion` chevauche ce type de garde.
    pub fn blocked_by(&self, portion: DayPortion) -> bool {
        portion == DayPortion::All
            || self.portions.is_empty()
            || self.portions.contains(&DayPortion::All)
            || self.portions.contains(&portion)
    }
}

/// Repos minimal (en jours) entre une garde `after` et une garde `before` ultérieure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestRule {
    pub after: ShiftType,
    pub before: ShiftType,
    pub min_gap_days: u32,
    /// Seuil de `fatigue_override` à partir duquel la règle est levée.
    #[serde(default)]
    pub override_threshold: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FatigueRules {
    pub lookback_days: u32,
    pub default_min_gap_days: u32,
    pub default_override_threshold: f64,
    pub max_consecutive_days: u32,
    pub consecutive_override_threshold: f64,
    pub rest: Vec<RestRule>,
}

impl Default for FatigueRules {
    fn default() -> Self {
        let after_night = |before| RestRule {
            after: ShiftType::Night,
            before,
            min_gap_days: 2,
            override_threshold: None,
        };
        Self {
            lookback_days: 7,
            default_min_gap_days: 1,
            default_override_threshold: 1.0,
            max_consecutive_days: 7,
            consecutive_override_threshold: 1.0,
            rest: vec![
                after_night(ShiftType::Day),
                after_night(ShiftType::Long),
                after_night(ShiftType::Weekend),
            ],
        }
    }
}

impl FatigueRules {
    /// Repos minimal et seuil de levée pour la paire (antérieure, ultérieure).
    pub fn min_gap(&self, after: ShiftType, before: ShiftType) -> (u32, f64) {
        self.rest
            .iter()
            .find(|r| r.after == after && r.before == before)
            .map_or(
                (self.default_min_gap_days, self.default_override_threshold),
                |r| {
                    (
                        r.min_gap_days,
                        r.override_threshold
                            .unwrap_or(self.default_override_threshold),
                    )
                },
            )
    }

    /// Fenêtre (jours) au-delà de laquelle aucune règle de repos ne s'applique.
    pub fn window_days(&self) -> u32 {
        self.rest
            .iter()
            .map(|r| r.min_gap_days)
            .chain(std::iter::once(self.default_min_gap_days))
            .max()
            .unwrap_or(0)
    }
}

/// Pondération d'équité.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    /// Multiplicateur d'une garde de jour férié
    pub stat_day: f64,
    /// Poids par type (1.0 si absent)
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub shift_types: BTreeMap<ShiftType, f64>,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            stat_day: 2.0,
            shift_types: BTreeMap::new(),
        }
    }
}

impl Weights {
    pub fn weight_of(&self, shift: &Shift) -> f64 {
        let base = self.shift_types.get(&shift.kind).copied().unwrap_or(1.0);
        if shift.stat_day {
            base * self.stat_day
        } else {
            base
        }
    }
}

/// Créneaux supplémentaires déclarés à l'avance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraDuty {
    pub date: NaiveDate,
    pub shift_type: ShiftType,
    #[serde(default = "one")]
    pub count: u32,
    #[serde(default)]
    pub fatigue_override: f64,
}

/// Levée de fatigue sur un créneau normal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotOverride {
    pub date: NaiveDate,
    pub shift_type: ShiftType,
    pub fatigue_override: f64,
}

impl RosterConfig {
    pub fn validate(&self) -> Result<(), RosterError> {
        if self.shift_types.is_empty() {
            return Err(RosterError::InvalidConfig(
                "at least one shift type must be rostered".into(),
            ));
        }
        let mut seen = BTreeSet::new();
        for slot in &self.shift_types {
            if !seen.insert(slot.shift_type) {
                return Err(RosterError::InvalidConfig(format!(
                    "shift type {} listed twice",
                    slot.shift_type
                )));
            }
            if slot.weekdays.is_empty() {
                return Err(RosterError::InvalidConfig(format!(
                    "shift type {} has no weekday mapping",
                    slot.shift_type
                )));
            }
        }

        // les règles de repos peuvent viser des types seulement présents dans l'historique
        let declared = self
            .extra_duties
            .iter()
            .map(|e| e.shift_type)
            .chain(self.overrides.iter().map(|o| o.shift_type));
        for kind in declared {
            if !seen.contains(&kind) {
                return Err(RosterError::UnknownShiftType(kind));
            }
        }

        let fatigue = &self.fatigue;
        if fatigue.max_consecutive_days == 0 {
            return Err(RosterError::InvalidConfig(
                "max_consecutive_days must be > 0".into(),
            ));
        }
        let spans = [
            ("lookback_days", fatigue.lookback_days),
            ("default_min_gap_days", fatigue.default_min_gap_days),
        ]
        .into_iter()
        .chain(fatigue.rest.iter().map(|r| ("min_gap_days", r.min_gap_days)));
        for (field, days) in spans {
            if days > MAX_SPAN_DAYS {
                return Err(RosterError::InvalidConfig(format!(
                    "{field} must be at most {MAX_SPAN_DAYS} days, got {days}"
                )));
            }
        }
        let thresholds = fatigue
            .rest
            .iter()
            .filter_map(|r| r.override_threshold)
            .chain([
                fatigue.default_override_threshold,
                fatigue.consecutive_override_threshold,
            ]);
        for t in thresholds {
            if !t.is_finite() || t <= 0.0 {
                return Err(RosterError::InvalidConfig(format!(
                    "override threshold must be a positive number, got {t}"
                )));
            }
        }

        let weights = std::iter::once(self.weights.stat_day)
            .chain(self.weights.shift_types.values().copied());
        for w in weights {
            if !w.is_finite() || w <= 0.0 {
                return Err(RosterError::InvalidConfig(format!(
                    "weights must be positive numbers, got {w}"
                )));
            }
        }
        Ok(())
    }

    /// Règle du type donné, si ce type est à pourvoir.
    pub fn slot_rule(&self, kind: ShiftType) -> Option<&SlotRule> {
        self.shift_types.iter().find(|s| s.shift_type == kind)
    }

    /// Rang de priorité : les types non configurés passent après, dans l'ordre de l'enum.
    pub fn priority(&self, kind: ShiftType) -> usize {
        self.shift_types
            .iter()
            .position(|s| s.shift_type == kind)
            .unwrap_or_else(|| self.shift_types.len() + kind as usize)
    }

    pub fn override_for(&self, date: NaiveDate, kind: ShiftType) -> f64 {
        self.overrides
            .iter()
            .find(|o| o.date == date && o.shift_type == kind)
            .map_or(0.0, |o| o.fatigue_override)
    }
}

pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> Result<RosterConfig> {
    let path = path.as_ref();
    let data = fs::read(path).with_context(|| format!("reading config {}", path.display()))?;
    let config: RosterConfig = serde_json::from_slice(&data)
        .with_context(|| format!("parsing config {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

pub fn export_config_json<P: AsRef<Path>>(path: P, config: &RosterConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)?;
    Ok(())
}

fn default_slots() -> Vec<SlotRule> {
    use IsoWeekday::*;
    vec![
        SlotRule::new(ShiftType::Night, &IsoWeekday::ALL).with_portions(&[DayPortion::Pm]),
        SlotRule::new(ShiftType::Weekend, &[Sat, Sun]),
        SlotRule::new(ShiftType::Long, &[Mon, Tue, Wed, Thu, Fri]),
        SlotRule::new(ShiftType::Day, &[Mon, Tue, Wed, Thu, Fri]),
    ]
}

fn whole_day() -> Vec<DayPortion> {
    vec![DayPortion::Am, DayPortion::Pm]
}

fn one() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = RosterConfig::default();
        config.validate().unwrap();
        assert_eq!(config.priority(ShiftType::Night), 0);
        assert_eq!(config.priority(ShiftType::Day), 3);
    }

    #[test]
    fn rejects_empty_weekday_mapping() {
        let mut config = RosterConfig::default();
        config.shift_types[0].weekdays.clear();
        assert!(matches!(
            config.validate(),
            Err(RosterError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_unbounded_day_spans() {
        let mut config = RosterConfig::default();
        config.fatigue.lookback_days = u32::MAX;
        assert!(matches!(
            config.validate(),
            Err(RosterError::InvalidConfig(_))
        ));

        let mut config = RosterConfig::default();
        config.fatigue.default_min_gap_days = MAX_SPAN_DAYS + 1;
        assert!(config.validate().is_err());

        let mut config = RosterConfig::default();
        config.fatigue.rest[0].min_gap_days = u32::MAX;
        assert!(config.validate().is_err());

        config.fatigue.rest[0].min_gap_days = MAX_SPAN_DAYS;
        config.validate().unwrap();
    }

    #[test]
    fn rejects_extra_duty_on_unrostered_type() {
        let mut config = RosterConfig::default();
        config.shift_types.retain(|s| s.shift_type != ShiftType::Day);
        config.validate().unwrap();
        config.extra_duties.push(ExtraDuty {
            date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            shift_type: ShiftType::Day,
            count: 1,
            fatigue_override: 0.0,
        });
        assert!(matches!(
            config.validate(),
            Err(RosterError::UnknownShiftType(ShiftType::Day))
        ));
    }

    #[test]
    fn min_gap_falls_back_to_default() {
        let rules = FatigueRules::default();
        assert_eq!(rules.min_gap(ShiftType::Night, ShiftType::Day), (2, 1.0));
        assert_eq!(rules.min_gap(ShiftType::Night, ShiftType::Night), (1, 1.0));
        assert_eq!(rules.window_days(), 2);
    }

    #[test]
    fn pm_leave_only_blocks_pm_shifts() {
        let night = SlotRule::new(ShiftType::Night, &IsoWeekday::ALL)
            .with_portions(&[DayPortion::Pm]);
        assert!(!night.blocked_by(DayPortion::Am));
        assert!(night.blocked_by(DayPortion::Pm));
        assert!(night.blocked_by(DayPortion::All));
    }

    #[test]
    fn parses_minimal_json() {
        let raw = r#"{
            "jurisdiction": "NZ-CAN",
            "shift_types": [
                { "shift_type": "NIGHT", "weekdays": ["MON", "TUE"], "portions": ["PM"] }
            ],
            "fatigue": { "rest": [], "max_consecutive_days": 3 }
        }"#;
        let config: RosterConfig = serde_json::from_str(raw).unwrap();
        config.validate().unwrap();
        assert_eq!(config.fatigue.lookback_days, 7);
        assert_eq!(config.fatigue.max_consecutive_days, 3);
        assert_eq!(config.weights.stat_day, 2.0);
    }
}

use crate::model::{Registrar, RegistrarId};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Charge courante d'un interne.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Load {
    pub count: u32,
    pub weighted: f64,
}

/// Compteurs de charge pour le run en cours.
#[derive(Debug, Default)]
pub struct LoadBook {
    loads: HashMap<RegistrarId, Load>,
}

impl LoadBook {
    pub fn add(&mut self, registrar: &RegistrarId, weight: f64) {
        let load = self.loads.entry(registrar.clone()).or_default();
        load.count += 1;
        load.weighted += weight;
    }

    pub fn get(&self, registrar: &RegistrarId) -> Load {
        self.loads.get(registrar).copied().unwrap_or_default()
    }
}

/// Candidat éligible et non fatigué.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub registrar: &'a Registrar,
    pub load: Load,
    pub last_assigned: Option<NaiveDate>,
}

/// Choisit le candidat le moins chargé (charge pondérée).
///
/// Départage : jamais affecté puis affectation la plus ancienne,
/// puis `last_edited` le plus ancien, puis identifiant.
pub fn select<'a>(candidates: &[Candidate<'a>]) -> Option<&'a Registrar> {
    candidates
        .iter()
        .min_by(|a, b| compare(a, b))
        .map(|c| c.registrar)
}

fn compare(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    a.load
        .weighted
        .total_cmp(&b.load.weighted)
        .then_with(|| a.last_assigned.cmp(&b.last_assigned))
        .then_with(|| a.registrar.last_edited.cmp(&b.registrar.last_edited))
        .then_with(|| a.registrar.id.cmp(&b.registrar.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn cand(r: &Registrar, weighted: f64, last: Option<u32>) -> Candidate<'_> {
        Candidate {
            registrar: r,
            load: Load {
                count: weighted as u32,
                weighted,
            },
            last_assigned: last.map(|d| NaiveDate::from_ymd_opt(2025, 3, d).unwrap()),
        }
    }

    #[test]
    fn empty_set_is_unfilled() {
        assert!(select(&[]).is_none());
    }

    #[test]
    fn least_loaded_wins() {
        let a = Registrar::new("a", "alice");
        let b = Registrar::new("b", "bob");
        let picked = select(&[cand(&a, 3.0, None), cand(&b, 2.0, Some(9))]).unwrap();
        assert_eq!(picked.id.as_str(), "b");
    }

    #[test]
    fn ties_go_to_least_recently_used_then_id() {
        let a = Registrar::new("a", "alice");
        let b = Registrar::new("b", "bob");
        let c = Registrar::new("c", "carol");
        let picked = select(&[
            cand(&a, 1.0, Some(5)),
            cand(&b, 1.0, Some(2)),
            cand(&c, 1.0, Some(2)),
        ])
        .unwrap();
        assert_eq!(picked.id.as_str(), "b");

        let picked = select(&[cand(&c, 1.0, None), cand(&a, 1.0, Some(1))]).unwrap();
        assert_eq!(picked.id.as_str(), "c");
    }

    #[test]
    fn last_edited_breaks_lru_ties() {
        let mut a = Registrar::new("a", "alice");
        let mut b = Registrar::new("b", "bob");
        a.last_edited = Some(Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap());
        b.last_edited = Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        let picked = select(&[cand(&a, 0.0, None), cand(&b, 0.0, None)]).unwrap();
        assert_eq!(picked.id.as_str(), "b");
    }

    #[test]
    fn load_book_accumulates_weights() {
        let mut book = LoadBook::default();
        let id = RegistrarId::new("a");
        book.add(&id, 1.0);
        book.add(&id, 2.0);
        assert_eq!(book.get(&id), Load { count: 2, weighted: 3.0 });
        assert_eq!(book.get(&RegistrarId::new("x")), Load::default());
    }
}

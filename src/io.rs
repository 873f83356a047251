use crate::calendar::Holiday;
use crate::model::{
    DayPortion, IsoWeekday, Leave, LeaveType, Registrar, Roster, ShiftType, Status, StatusType,
};
use crate::scheduler::{GeneratedRoster, SlotState, UnfilledReason};
use anyhow::{bail, Context};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Import d'internes : header `id,username[,senior][,start][,finish][,employee_number]`
pub fn import_registrars_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<Registrar>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut out = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        let id = rec.get(0).context("missing id")?.trim();
        let username = rec.get(1).context("missing username")?.trim();
        if id.is_empty() || username.is_empty() {
            bail!("invalid registrar row (empty)");
        }
        let mut registrar = Registrar::new(id, username);
        if let Some(flag) = optional(&rec, 2) {
            registrar.senior =
                parse_bool(flag).with_context(|| format!("invalid senior value for {id}"))?;
        }
        registrar.start = optional(&rec, 3)
            .map(parse_date)
            .transpose()
            .with_context(|| format!("invalid start for {id}"))?;
        registrar.finish = optional(&rec, 4)
            .map(parse_date)
            .transpose()
            .with_context(|| format!("invalid finish for {id}"))?;
        registrar.employee_number = optional(&rec, 5).map(str::to_string);
        out.push(registrar);
    }
    Ok(out)
}

/// Import de statuts : header `registrar,start,end,type[,weekdays][,shift_types]`
///
/// Les listes sont séparées par `;` (ex. `MON;TUE`, `NIGHT;LONG`).
pub fn import_statuses_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<Status>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut out = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        let registrar = required(&rec, 0, "registrar")?;
        let start = parse_date(required(&rec, 1, "start")?)?;
        let end = parse_date(required(&rec, 2, "end")?)?;
        let kind = parse_with::<StatusType>(required(&rec, 3, "type")?)?;
        let mut status = Status::new(crate::model::RegistrarId::new(registrar), start, end, kind)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("invalid status for {registrar}"))?;
        if let Some(days) = optional(&rec, 4) {
            status.weekdays = parse_list::<IsoWeekday>(days)?;
        }
        if let Some(kinds) = optional(&rec, 5) {
            status.shift_types = parse_list::<ShiftType>(kinds)?;
        }
        out.push(status);
    }
    Ok(out)
}

/// Import de congés : header `registrar,date,type[,portion][,approved][,cancelled][,comment]`
pub fn import_leave_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<Leave>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut out = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        let registrar = required(&rec, 0, "registrar")?;
        let date = parse_date(required(&rec, 1, "date")?)?;
        let kind = parse_with::<LeaveType>(required(&rec, 2, "type")?)?;
        let portion = optional(&rec, 3)
            .map(parse_with::<DayPortion>)
            .transpose()?
            .unwrap_or_default();
        let approved = optional(&rec, 4).map(parse_bool).transpose()?.unwrap_or(false);
        let cancelled = optional(&rec, 5).map(parse_bool).transpose()?.unwrap_or(false);
        out.push(Leave {
            registrar: crate::model::RegistrarId::new(registrar),
            date,
            kind,
            portion,
            approved,
            cancelled,
            comment: optional(&rec, 6).unwrap_or_default().to_string(),
        });
    }
    Ok(out)
}

/// Import de jours fériés : header `jurisdiction,date[,name]`
pub fn import_holidays_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<Holiday>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut out = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        out.push(Holiday {
            jurisdiction: required(&rec, 0, "jurisdiction")?.to_string(),
            date: parse_date(required(&rec, 1, "date")?)?,
            name: optional(&rec, 2).unwrap_or_default().to_string(),
        });
    }
    Ok(out)
}

fn required<'r>(rec: &'r StringRecord, idx: usize, field: &str) -> anyhow::Result<&'r str> {
    match rec.get(idx).map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => bail!("missing {field}"),
    }
}

fn optional(rec: &StringRecord, idx: usize) -> Option<&str> {
    rec.get(idx).map(str::trim).filter(|v| !v.is_empty())
}

fn parse_bool(s: &str) -> anyhow::Result<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "oui" => Ok(true),
        "false" | "0" | "no" | "n" | "non" => Ok(false),
        _ => bail!("expected boolean"),
    }
}

pub fn parse_date(raw: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date: {raw}"))
}

fn parse_with<T: FromStr<Err = String>>(raw: &str) -> anyhow::Result<T> {
    raw.parse::<T>().map_err(anyhow::Error::msg)
}

fn parse_list<T: FromStr<Err = String>>(raw: &str) -> anyhow::Result<Vec<T>> {
    raw.split(';')
        .filter(|chunk| !chunk.trim().is_empty())
        .map(parse_with::<T>)
        .collect()
}

/// Export JSON du document (jolie mise en forme)
pub fn export_roster_json<P: AsRef<Path>>(path: P, roster: &Roster) -> anyhow::Result<()> {
    let s = serde_json::to_string_pretty(roster)?;
    fs::write(path, s)?;
    Ok(())
}

/// Export CSV d'un roster généré : header `date,type,extra_duty,stat_day,registrar,username,state`
pub fn export_generated_csv<P: AsRef<Path>>(
    path: P,
    generated: &GeneratedRoster,
    roster: &Roster,
) -> anyhow::Result<()> {
    let mut w = WriterBuilder::new().has_headers(true).from_path(path)?;
    w.write_record([
        "date",
        "type",
        "extra_duty",
        "stat_day",
        "registrar",
        "username",
        "state",
    ])?;
    for entry in &generated.entries {
        let s = &entry.shift;
        let registrar = s.registrar.as_ref().map(|r| r.as_str()).unwrap_or("");
        let username = s
            .registrar
            .as_ref()
            .and_then(|id| roster.find_registrar(id))
            .map(|r| r.username.as_str())
            .unwrap_or("");
        let date = s.date.to_string();
        w.write_record([
            date.as_str(),
            s.kind.code(),
            if s.extra_duty { "true" } else { "false" },
            if s.stat_day { "true" } else { "false" },
            registrar,
            username,
            state_label(entry.state),
        ])?;
    }
    w.flush()?;
    Ok(())
}

pub fn state_label(state: SlotState) -> &'static str {
    match state {
        SlotState::Fixed => "fixed",
        SlotState::Assigned => "assigned",
        SlotState::Unfilled(UnfilledReason::NoEligibleCandidate) => "unfilled:no_eligible",
        SlotState::Unfilled(UnfilledReason::AllFatigued) => "unfilled:fatigued",
        SlotState::Unfilled(UnfilledReason::Cancelled) => "unfilled:cancelled",
    }
}

#![forbid(unsafe_code)]
use anyhow::{anyhow, Context, Result};
use radroster::{
    config::{export_config_json, load_config_from_file, RosterConfig},
    io,
    model::{Roster, ShiftId},
    scheduler::{DateRange, Scheduler},
    storage::{
        HolidaySource, JsonStorage, RegistrarDirectory, RosterSnapshot, ShiftStore, Storage,
    },
    summary::{day_grid, summarize},
};
use clap::{Parser, Subcommand};
#[cfg(feature = "logging")]
use tracing_subscriber::{fmt::Subscriber, EnvFilter};

/// CLI de génération de rosters d'internes (sans base de données)
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Active les logs (feature `logging`)
    #[arg(long, global = true)]
    log: bool,

    /// Fichier JSON de roster
    #[arg(long, global = true, default_value = "roster.json")]
    roster: String,

    /// Configuration JSON (types de garde, fatigue, pondérations)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Importer des internes depuis un CSV
    ImportRegistrars {
        #[arg(long)]
        csv: String,
    },

    /// Importer des statuts depuis un CSV
    ImportStatuses {
        #[arg(long)]
        csv: String,
    },

    /// Importer des congés depuis un CSV
    ImportLeave {
        #[arg(long)]
        csv: String,
    },

    /// Importer des jours fériés locaux depuis un CSV
    ImportHolidays {
        #[arg(long)]
        csv: String,
    },

    /// Générer le roster d'une plage (YYYY-MM-DD)
    Generate {
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        #[arg(long)]
        out_json: Option<String>,
        #[arg(long)]
        out_csv: Option<String>,
        /// Engager les gardes affectées dans le roster
        #[arg(long)]
        commit: bool,
    },

    /// Réaffecter une garde engagée (sans --registrar : la libérer)
    Reassign {
        #[arg(long)]
        shift_id: String,
        /// Identifiant ou nom d'utilisateur
        #[arg(long)]
        registrar: Option<String>,
    },

    /// Synthèse de charge des gardes engagées
    Summary {
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        /// Affiche aussi la grille jour × type
        #[arg(long)]
        grid: bool,
    },

    /// Exporter le document complet en JSON
    Export {
        #[arg(long)]
        out_json: String,
    },

    /// Écrire la configuration effective (défauts si aucune --config)
    InitConfig {
        #[arg(long)]
        out: String,
    },

    /// Lister les internes en poste sur la plage
    Active {
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },

    /// Lister les jours fériés d'une juridiction
    Holidays {
        #[arg(long)]
        jurisdiction: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },
}

/// Charge le roster ; un fichier absent donne un document vide.
fn load_roster(storage: &JsonStorage, path: &str) -> Result<Roster> {
    match storage.load() {
        Ok(roster) => Ok(roster),
        Err(e) if is_not_found(&e) => Ok(Roster::default()),
        Err(e) => Err(e).with_context(|| format!("loading {path}")),
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound)
    })
}

fn parse_range(start: &str, end: &str) -> Result<DateRange> {
    Ok(DateRange::new(io::parse_date(start)?, io::parse_date(end)?)?)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    #[cfg(feature = "logging")]
    if cli.log {
        let _ = Subscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    }

    let storage = JsonStorage::open(&cli.roster)?;
    let mut roster = load_roster(&storage, &cli.roster)?;
    let config = match &cli.config {
        Some(path) => load_config_from_file(path)?,
        None => RosterConfig::default(),
    };

    let code = match cli.cmd {
        Commands::ImportRegistrars { csv } => {
            let registrars = io::import_registrars_csv(csv)?;
            println!("imported {} registrar(s)", registrars.len());
            roster.registrars.extend(registrars);
            storage.save(&roster)?;
            0
        }
        Commands::ImportStatuses { csv } => {
            let statuses = io::import_statuses_csv(csv)?;
            println!("imported {} status(es)", statuses.len());
            roster.statuses.extend(statuses);
            storage.save(&roster)?;
            0
        }
        Commands::ImportLeave { csv } => {
            let leave = io::import_leave_csv(csv)?;
            println!("imported {} leave record(s)", leave.len());
            roster.leave.extend(leave);
            storage.save(&roster)?;
            0
        }
        Commands::ImportHolidays { csv } => {
            let holidays = io::import_holidays_csv(csv)?;
            println!("imported {} holiday(s)", holidays.len());
            roster.holidays.extend(holidays);
            storage.save(&roster)?;
            0
        }
        Commands::Generate {
            start,
            end,
            out_json,
            out_csv,
            commit,
        } => {
            let range = parse_range(&start, &end)?;
            let snapshot = RosterSnapshot::fetch(
                &roster,
                &roster,
                &roster,
                &roster,
                range,
                config.fatigue.lookback_days,
            )?;
            let weights = config.weights.clone();
            let scheduler = Scheduler::new(config, snapshot)?;
            let generated = scheduler.generate_committed(range)?;

            for entry in &generated.entries {
                println!("{} | {}", entry.shift, io::state_label(entry.state));
            }
            println!(
                "{}",
                summarize(&generated.shifts(), &weights).render(Some(&roster))
            );
            if let Some(path) = out_json {
                std::fs::write(path, serde_json::to_string_pretty(&generated)?)?;
            }
            if let Some(path) = out_csv {
                io::export_generated_csv(path, &generated, &roster)?;
            }
            if commit {
                let report = roster.commit(&generated.to_commit())?;
                println!(
                    "committed {} shift(s), rejected {}",
                    report.committed.len(),
                    report.rejected.len()
                );
                storage.save(&roster)?;
            }

            let unfilled = generated.unfilled().count();
            if unfilled > 0 {
                eprintln!("{unfilled} slot(s) left unfilled");
                // Code 2 = WARNING/INCOMPLETE
                2
            } else {
                0
            }
        }
        Commands::Reassign {
            shift_id,
            registrar,
        } => {
            let target = match registrar {
                Some(key) => Some(
                    roster
                        .resolve_registrar(&key)
                        .map(|r| r.id.clone())
                        .ok_or_else(|| anyhow!("unknown registrar: {}", key))?,
                ),
                None => None,
            };
            let shift = roster.reassign(&ShiftId::new(shift_id), target)?;
            println!("{shift}");
            storage.save(&roster)?;
            0
        }
        Commands::Summary { start, end, grid } => {
            let range = parse_range(&start, &end)?;
            let shifts = roster.shifts_between(range)?;
            if grid {
                let doc = &roster;
                for (date, by_type) in day_grid(range, &shifts) {
                    let cells: Vec<String> = by_type
                        .iter()
                        .flat_map(|(kind, list)| {
                            list.iter().map(move |s| {
                                let who = s
                                    .registrar
                                    .as_ref()
                                    .and_then(|id| doc.find_registrar(id))
                                    .map_or("-", |r| r.username.as_str());
                                format!("{kind} {who}")
                            })
                        })
                        .collect();
                    println!("{date} | {}", cells.join(" | "));
                }
            }
            println!(
                "{}",
                summarize(&shifts, &config.weights).render(Some(&roster))
            );
            0
        }
        Commands::Export { out_json } => {
            io::export_roster_json(out_json, &roster)?;
            0
        }
        Commands::InitConfig { out } => {
            export_config_json(&out, &config)?;
            println!("configuration written to {out}");
            0
        }
        Commands::Active { start, end } => {
            let range = parse_range(&start, &end)?;
            for r in roster.active_registrars(range.start, range.end)? {
                println!("{} | {}", r.id, r.username);
            }
            0
        }
        Commands::Holidays {
            jurisdiction,
            start,
            end,
        } => {
            let range = parse_range(&start, &end)?;
            let calendar = roster.calendar()?;
            if !calendar.known(&jurisdiction) {
                return Err(anyhow!("unknown jurisdiction: {}", jurisdiction));
            }
            for h in calendar.holidays_between(&jurisdiction, range.start, range.end) {
                println!("{} | {}", h.date, h.name);
            }
            0
        }
    };

    std::process::exit(code);
}

//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::{Color, Colorize};
use saksflyt_domain::{AnswerOutcome, Oppgave, OppgaveTilstand, Sporing, StegGraf, StegId, Utfall};
use std::collections::BTreeSet;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Selected output format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Format a list of oppgaver.
    pub fn format_oppgaver(&self, oppgaver: &[Oppgave]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let json: Vec<serde_json::Value> = oppgaver.iter().map(oppgave_summary_json).collect();
                Ok(serde_json::to_string_pretty(&json)?)
            }
            OutputFormat::Table => self.format_oppgaver_table(oppgaver),
            OutputFormat::Quiet => Ok(oppgaver
                .iter()
                .map(|o| o.id().to_string())
                .collect::<Vec<_>>()
                .join("\n")),
        }
    }

    fn format_oppgaver_table(&self, oppgaver: &[Oppgave]) -> Result<String> {
        if oppgaver.is_empty() {
            return Ok(self.colorize("No oppgaver found.", Color::Yellow));
        }

        let mut builder = Builder::default();
        builder.push_record(["ID", "Person", "Tilstand", "Tildelt", "Open steps", "Labels"]);

        for oppgave in oppgaver {
            builder.push_record([
                oppgave.id().to_string(),
                oppgave.behandling().person_ident().to_string(),
                oppgave.tilstand().as_str().to_string(),
                oppgave.tildelt().map(|a| a.to_string()).unwrap_or_else(|| "-".into()),
                oppgave.behandling().frontier().len().to_string(),
                join_labels(oppgave.emneknagger()),
            ]);
        }

        Ok(self.finish_table(builder))
    }

    /// Format one oppgave with its step graph.
    pub fn format_oppgave(&self, oppgave: &Oppgave) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&oppgave_json(oppgave))?),
            OutputFormat::Quiet => Ok(oppgave.tilstand().as_str().to_string()),
            OutputFormat::Table => {
                let behandling = oppgave.behandling();
                let mut out = format!(
                    "Oppgave    {}\nTilstand   {}\nTildelt    {}\nBehandling {} ({}, version {})\nPerson     {}\n",
                    oppgave.id(),
                    self.tilstand(oppgave.tilstand()),
                    oppgave.tildelt().map(|a| a.to_string()).unwrap_or_else(|| "-".into()),
                    behandling.id(),
                    behandling.tilstand().as_str(),
                    behandling.version(),
                    behandling.person_ident(),
                );
                if !oppgave.emneknagger().is_empty() {
                    out.push_str(&format!("Labels     {}\n", join_labels(oppgave.emneknagger())));
                }
                out.push('\n');
                out.push_str(&self.format_steps_table(behandling.graf(), &behandling.frontier()));
                Ok(out)
            }
        }
    }

    fn format_steps_table(&self, graf: &StegGraf, frontier: &BTreeSet<StegId>) -> String {
        let mut builder = Builder::default();
        builder.push_record(["Key", "Type", "Value", "Provenance", "Depends on", "Open"]);

        for steg in graf.steps() {
            builder.push_record([
                steg.key().to_string(),
                steg.svar().svartype().to_string(),
                steg.svar().verdi().map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
                describe_sporing(steg.svar().sporing()),
                child_keys(graf, steg.depends_on()).join(", "),
                if frontier.contains(&steg.id()) { "yes" } else { "" }.to_string(),
            ]);
        }

        self.finish_table(builder)
    }

    /// Format the transition log of an oppgave.
    pub fn format_logg(&self, oppgave: &Oppgave) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(oppgave.logg())?),
            OutputFormat::Quiet => Ok(oppgave
                .logg()
                .entries()
                .iter()
                .map(|e| e.tilstand.as_str())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["#", "Tidspunkt", "Tilstand", "Hendelse", "Aktør", "Årsak"]);
                for (sekvens, endring) in oppgave.logg().entries().iter().enumerate() {
                    builder.push_record([
                        sekvens.to_string(),
                        endring.tidspunkt.format("%Y-%m-%d %H:%M:%S").to_string(),
                        endring.tilstand.as_str().to_string(),
                        endring.hendelse.as_str().to_string(),
                        endring.utfort_av.as_ref().map(|a| a.to_string()).unwrap_or_default(),
                        endring.aarsak.clone().unwrap_or_default(),
                    ]);
                }
                Ok(self.finish_table(builder))
            }
        }
    }

    /// Format the result of answering a step.
    pub fn format_answer(&self, oppgave: &Oppgave, key: &str, outcome: &AnswerOutcome) -> Result<String> {
        let graf = oppgave.behandling().graf();
        let invalidated = child_keys(graf, &outcome.invalidated());

        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&serde_json::json!({
                "oppgave": oppgave.id().to_string(),
                "key": key,
                "changed": !matches!(outcome, AnswerOutcome::Unchanged),
                "invalidated": invalidated,
                "open_steps": oppgave.behandling().frontier().len(),
            }))?),
            OutputFormat::Quiet => Ok(invalidated.join("\n")),
            OutputFormat::Table => Ok(match outcome {
                AnswerOutcome::Unchanged => self.info(&format!("'{}' already had that answer", key)),
                AnswerOutcome::Answered { .. } if invalidated.is_empty() => {
                    self.success(&format!("Answered '{}'", key))
                }
                AnswerOutcome::Answered { .. } => format!(
                    "{}\n{}",
                    self.success(&format!("Answered '{}'", key)),
                    self.warning(&format!("Invalidated: {}", invalidated.join(", ")))
                ),
            }),
        }
    }

    /// Format the result of a task command.
    pub fn format_utfall(&self, oppgave: &Oppgave, utfall: Utfall) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let json = match utfall {
                    Utfall::Endret { fra, til } => serde_json::json!({
                        "oppgave": oppgave.id().to_string(),
                        "fra": fra.as_str(),
                        "til": til.as_str(),
                        "tildelt": oppgave.tildelt().map(|a| a.ident()),
                    }),
                    Utfall::Duplikat => serde_json::json!({
                        "oppgave": oppgave.id().to_string(),
                        "duplikat": true,
                    }),
                };
                Ok(serde_json::to_string_pretty(&json)?)
            }
            OutputFormat::Quiet => Ok(oppgave.tilstand().as_str().to_string()),
            OutputFormat::Table => Ok(match utfall {
                Utfall::Endret { fra, til } => self.success(&format!(
                    "{} -> {}",
                    fra.as_str(),
                    til.as_str()
                )),
                Utfall::Duplikat => self.info("Event already handled"),
            }),
        }
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), Color::Green)
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), Color::Blue)
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), Color::Yellow)
    }

    fn tilstand(&self, tilstand: OppgaveTilstand) -> String {
        let color = match tilstand {
            OppgaveTilstand::FerdigBehandlet => Color::Green,
            OppgaveTilstand::Avbrutt => Color::Red,
            OppgaveTilstand::KlarTilKontroll | OppgaveTilstand::UnderKontroll => Color::Magenta,
            _ => Color::Cyan,
        };
        self.colorize(tilstand.as_str(), color)
    }

    fn finish_table(&self, builder: Builder) -> String {
        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        table.to_string()
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: Color) -> String {
        if !self.color_enabled {
            return text.to_string();
        }
        text.color(color).to_string()
    }
}

fn join_labels(labels: &BTreeSet<String>) -> String {
    labels.iter().cloned().collect::<Vec<_>>().join(", ")
}

fn child_keys(graf: &StegGraf, ids: &BTreeSet<StegId>) -> Vec<String> {
    ids.iter()
        .map(|id| {
            graf.step(*id)
                .map(|s| s.key().to_string())
                .unwrap_or_else(|| id.to_string())
        })
        .collect()
}

fn describe_sporing(sporing: &Sporing) -> String {
    match sporing {
        Sporing::Ingen => "-".to_string(),
        Sporing::Manuell {
            utfort_av,
            begrunnelse,
            ..
        } => format!("{}: {}", utfort_av, begrunnelse),
        Sporing::Kilde { kildedata, .. } => {
            let mut kort: String = kildedata.chars().take(30).collect();
            if kort.len() < kildedata.len() {
                kort.push('…');
            }
            format!("kilde: {}", kort)
        }
    }
}

fn oppgave_summary_json(oppgave: &Oppgave) -> serde_json::Value {
    serde_json::json!({
        "id": oppgave.id().to_string(),
        "person_ident": oppgave.behandling().person_ident(),
        "tilstand": oppgave.tilstand().as_str(),
        "tildelt": oppgave.tildelt().map(|a| a.ident()),
        "open_steps": oppgave.behandling().frontier().len(),
        "emneknagger": oppgave.emneknagger(),
    })
}

fn oppgave_json(oppgave: &Oppgave) -> serde_json::Value {
    let behandling = oppgave.behandling();
    let graf = behandling.graf();
    let frontier = behandling.frontier();

    let steg: Vec<serde_json::Value> = graf
        .steps()
        .map(|s| {
            serde_json::json!({
                "id": s.id().to_string(),
                "key": s.key(),
                "svartype": s.svar().svartype().as_str(),
                "verdi": s.svar().verdi(),
                "sporing": s.svar().sporing(),
                "depends_on": child_keys(graf, s.depends_on()),
                "open": frontier.contains(&s.id()),
            })
        })
        .collect();

    serde_json::json!({
        "id": oppgave.id().to_string(),
        "tilstand": oppgave.tilstand().as_str(),
        "tildelt": oppgave.tildelt().map(|a| a.ident()),
        "emneknagger": oppgave.emneknagger(),
        "opprettet": oppgave.opprettet().to_rfc3339(),
        "behandling": {
            "id": behandling.id().to_string(),
            "person_ident": behandling.person_ident(),
            "tilstand": behandling.tilstand().as_str(),
            "versjon": behandling.version(),
            "roots": child_keys(graf, behandling.roots()),
        },
        "frontier": child_keys(graf, &frontier),
        "steg": steg,
    })
}

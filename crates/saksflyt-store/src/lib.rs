//! Saksflyt Storage Layer
//!
//! Persists Oppgaver, their Behandling and the whole step graph in SQLite.
//!
//! # Architecture
//!
//! - A graph is flattened into step, provenance and edge rows ([`rows`])
//! - Loading rebuilds it in two passes ([`rehydrate`]), so shared children
//!   keep one identity and dangling edges are reported
//! - Every save runs in one transaction guarded by the Behandling version
//! - The transition log is append-only; triggers reject updates and deletes
//!
//! # Examples
//!
//! ```no_run
//! use saksflyt_store::SqliteStore;
//!
//! let store = SqliteStore::new(":memory:").unwrap();
//! // Store is now ready for oppgave operations
//! ```

#![warn(missing_docs)]

mod codec;
pub mod rehydrate;
pub mod rows;

pub use codec::{bytes_to_id, id_to_bytes};
pub use rehydrate::{rehydrate, RehydratedGraf};
pub use rows::{dehydrate, GrafRader, KantRad, SporingRad, StegRad, StegTilstand};

use codec::{
    date_to_text, enum_col, id_col, opt_date_col, opt_time_col, time_col, time_to_text,
};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use saksflyt_domain::{
    Aktor, Behandling, BehandlingFlyt, BehandlingId, BehandlingTilstand, DomainError, HendelseId,
    HendelseType, Oppgave, OppgaveId, OppgaveParts, OppgaveRepository, OppgaveTilstand, StegId,
    Svartype, TilstandEndring, Tilstandslogg, ToTrinnsFlyt,
};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Referenced record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Stored edge names a step that has no row
    #[error("Dependency {parent} -> {child} references a missing step")]
    DanglingReference {
        /// Depending step
        parent: StegId,
        /// Step depended on
        child: StegId,
    },

    /// Behandling was changed by someone else since it was read
    #[error("Behandling {behandling} was modified concurrently: expected version {expected}, found {found}")]
    Conflict {
        /// Affected case
        behandling: BehandlingId,
        /// Version the caller read
        expected: u64,
        /// Version currently stored
        found: u64,
    },

    /// Stored data violates a domain invariant
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

/// SQLite-based implementation of [`OppgaveRepository`]
///
/// # Thread Safety
///
/// SQLite connections are not thread-safe. Each thread should have its own SqliteStore instance.
pub struct SqliteStore {
    conn: Connection,
    flyt: Arc<dyn BehandlingFlyt>,
}

impl SqliteStore {
    /// Create a new SqliteStore with the given database path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let mut store = Self {
            conn,
            flyt: Arc::new(ToTrinnsFlyt),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// State machine handed to every loaded Behandling
    pub fn with_flyt(mut self, flyt: Arc<dyn BehandlingFlyt>) -> Self {
        self.flyt = flyt;
        self
    }

    fn initialize_schema(&mut self) -> Result<(), StoreError> {
        let schema = include_str!("schema.sql");
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(schema)?;
        Ok(())
    }

    /// Raw rows of one graph, in stable order
    pub fn load_graf_rader(&self, behandling_id: BehandlingId) -> Result<GrafRader, StoreError> {
        let key = id_to_bytes(behandling_id.value());

        let mut stmt = self.conn.prepare(
            "SELECT id, noekkel, svartype, verdi_boolsk, verdi_heltall, verdi_desimal,
                    verdi_dato, verdi_tekst, tilstand, rot
             FROM steg WHERE behandling_id = ?1 ORDER BY id",
        )?;
        let steg = stmt
            .query_map(params![&key], |row| {
                Ok(StegRad {
                    behandling_id,
                    id: StegId::from_value(id_col(row, 0)?),
                    noekkel: row.get(1)?,
                    svartype: enum_col(row, 2, "svartype", Svartype::parse)?,
                    verdi_boolsk: row.get(3)?,
                    verdi_heltall: row.get(4)?,
                    verdi_desimal: row.get(5)?,
                    verdi_dato: opt_date_col(row, 6)?,
                    verdi_tekst: row.get(7)?,
                    tilstand: enum_col(row, 8, "step tilstand", StegTilstand::parse)?,
                    rot: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT steg_id, type, tidspunkt, utfort_av, begrunnelse, kildedata
             FROM sporing WHERE behandling_id = ?1 ORDER BY steg_id",
        )?;
        let sporing = stmt
            .query_map(params![&key], |row| {
                Ok(SporingRad {
                    behandling_id,
                    steg_id: StegId::from_value(id_col(row, 0)?),
                    kind: row.get(1)?,
                    tidspunkt: opt_time_col(row, 2)?,
                    utfort_av: row.get(3)?,
                    begrunnelse: row.get(4)?,
                    kildedata: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT parent_id, child_id FROM avhengighet
             WHERE behandling_id = ?1 ORDER BY parent_id, child_id",
        )?;
        let kanter = stmt
            .query_map(params![&key], |row| {
                Ok(KantRad {
                    behandling_id,
                    parent_id: StegId::from_value(id_col(row, 0)?),
                    child_id: StegId::from_value(id_col(row, 1)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GrafRader {
            steg,
            sporing,
            kanter,
        })
    }

    /// Load a Behandling and rebuild its graph
    pub fn load_behandling(&self, id: BehandlingId) -> Result<Option<Behandling>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT person_ident, tilstand, versjon FROM behandling WHERE id = ?1",
                params![id_to_bytes(id.value())],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        enum_col(row, 1, "behandling tilstand", BehandlingTilstand::parse)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((person_ident, tilstand, versjon)) = row else {
            return Ok(None);
        };

        let RehydratedGraf { graf, roots } = rehydrate(self.load_graf_rader(id)?)?;
        let behandling = Behandling::rehydrate(
            id,
            person_ident,
            graf,
            roots,
            tilstand,
            Arc::clone(&self.flyt),
            versjon as u64,
        )?;
        Ok(Some(behandling))
    }

    fn write_behandling(
        tx: &Transaction<'_>,
        behandling: &Behandling,
    ) -> Result<u64, StoreError> {
        let key = id_to_bytes(behandling.id().value());
        let expected = behandling.version();

        let stored: Option<i64> = tx
            .query_row(
                "SELECT versjon FROM behandling WHERE id = ?1",
                params![&key],
                |row| row.get(0),
            )
            .optional()?;
        let found = stored.map_or(0, |v| v as u64);
        if found != expected {
            return Err(StoreError::Conflict {
                behandling: behandling.id(),
                expected,
                found,
            });
        }

        let next = expected + 1;
        tx.execute(
            "INSERT INTO behandling (id, person_ident, tilstand, versjon)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
             person_ident = excluded.person_ident,
             tilstand = excluded.tilstand,
             versjon = excluded.versjon",
            params![
                &key,
                behandling.person_ident(),
                behandling.tilstand().as_str(),
                next as i64,
            ],
        )?;

        // The graph is small and saved whole
        for table in ["steg", "sporing", "avhengighet"] {
            tx.execute(
                &format!("DELETE FROM {} WHERE behandling_id = ?1", table),
                params![&key],
            )?;
        }

        let rader = dehydrate(behandling.id(), behandling.graf(), behandling.roots());
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO steg (behandling_id, id, noekkel, svartype, verdi_boolsk, verdi_heltall,
                                   verdi_desimal, verdi_dato, verdi_tekst, tilstand, rot)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for rad in &rader.steg {
                stmt.execute(params![
                    &key,
                    id_to_bytes(rad.id.value()),
                    &rad.noekkel,
                    rad.svartype.as_str(),
                    rad.verdi_boolsk,
                    rad.verdi_heltall,
                    rad.verdi_desimal,
                    rad.verdi_dato.as_ref().map(date_to_text),
                    &rad.verdi_tekst,
                    rad.tilstand.as_str(),
                    rad.rot,
                ])?;
            }
        }
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO sporing (behandling_id, steg_id, type, tidspunkt, utfort_av, begrunnelse, kildedata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for rad in &rader.sporing {
                stmt.execute(params![
                    &key,
                    id_to_bytes(rad.steg_id.value()),
                    &rad.kind,
                    rad.tidspunkt.as_ref().map(time_to_text),
                    &rad.utfort_av,
                    &rad.begrunnelse,
                    &rad.kildedata,
                ])?;
            }
        }
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO avhengighet (behandling_id, parent_id, child_id) VALUES (?1, ?2, ?3)",
            )?;
            for kant in &rader.kanter {
                stmt.execute(params![
                    &key,
                    id_to_bytes(kant.parent_id.value()),
                    id_to_bytes(kant.child_id.value()),
                ])?;
            }
        }

        debug!(
            behandling = %behandling.id(),
            steps = rader.steg.len(),
            edges = rader.kanter.len(),
            version = next,
            "Wrote step graph"
        );
        Ok(next)
    }

    fn write_oppgave(tx: &Transaction<'_>, oppgave: &Oppgave) -> Result<(), StoreError> {
        let key = id_to_bytes(oppgave.id().value());

        tx.execute(
            "INSERT INTO oppgave (id, behandling_id, tilstand, tildelt, opprettet)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
             tilstand = excluded.tilstand,
             tildelt = excluded.tildelt",
            params![
                &key,
                id_to_bytes(oppgave.behandling().id().value()),
                oppgave.tilstand().as_str(),
                oppgave.tildelt().map(|a| a.ident()),
                time_to_text(&oppgave.opprettet()),
            ],
        )?;

        tx.execute("DELETE FROM emneknagg WHERE oppgave_id = ?1", params![&key])?;
        for navn in oppgave.emneknagger() {
            tx.execute(
                "INSERT INTO emneknagg (oppgave_id, navn) VALUES (?1, ?2)",
                params![&key, navn],
            )?;
        }

        let stored: i64 = tx.query_row(
            "SELECT COUNT(*) FROM tilstandslogg WHERE oppgave_id = ?1",
            params![&key],
            |row| row.get(0),
        )?;
        let stored = stored as usize;
        let entries = oppgave.logg().entries();
        if stored > entries.len() {
            return Err(StoreError::InvalidData(format!(
                "Oppgave {} has {} stored log entries but only {} in memory",
                oppgave.id(),
                stored,
                entries.len()
            )));
        }
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO tilstandslogg (oppgave_id, sekvens, tidspunkt, tilstand, hendelse, utfort_av, aarsak)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for (sekvens, endring) in entries.iter().enumerate().skip(stored) {
                stmt.execute(params![
                    &key,
                    sekvens as i64,
                    time_to_text(&endring.tidspunkt),
                    endring.tilstand.as_str(),
                    endring.hendelse.as_str(),
                    endring.utfort_av.as_ref().map(|a| a.ident()),
                    &endring.aarsak,
                ])?;
            }
        }

        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO behandlet_hendelse (oppgave_id, hendelse_id) VALUES (?1, ?2)",
            )?;
            for hendelse in oppgave.behandlede_hendelser() {
                stmt.execute(params![&key, id_to_bytes(hendelse.value())])?;
            }
        }

        debug!(
            oppgave = %oppgave.id(),
            appended = entries.len() - stored,
            "Wrote oppgave"
        );
        Ok(())
    }

    fn load_logg(&self, key: &[u8]) -> Result<Tilstandslogg, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT tidspunkt, tilstand, hendelse, utfort_av, aarsak
             FROM tilstandslogg WHERE oppgave_id = ?1 ORDER BY sekvens",
        )?;
        let entries = stmt
            .query_map(params![key], |row| {
                Ok(TilstandEndring {
                    tidspunkt: time_col(row, 0)?,
                    tilstand: enum_col(row, 1, "oppgave tilstand", OppgaveTilstand::parse)?,
                    hendelse: enum_col(row, 2, "hendelse", HendelseType::parse)?,
                    utfort_av: row.get::<_, Option<String>>(3)?.map(Aktor::new),
                    aarsak: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Tilstandslogg::from_entries(entries))
    }
}

impl OppgaveRepository for SqliteStore {
    type Error = StoreError;

    fn save(&mut self, oppgave: &mut Oppgave) -> Result<(), Self::Error> {
        let tx = self.conn.transaction()?;
        let version = Self::write_behandling(&tx, oppgave.behandling())?;
        Self::write_oppgave(&tx, oppgave)?;
        tx.commit()?;

        oppgave.behandling_mut().mark_persisted(version);
        info!(
            oppgave = %oppgave.id(),
            tilstand = oppgave.tilstand().as_str(),
            version,
            "Saved oppgave"
        );
        Ok(())
    }

    fn load(&self, id: OppgaveId) -> Result<Option<Oppgave>, Self::Error> {
        let key = id_to_bytes(id.value());
        let row = self
            .conn
            .query_row(
                "SELECT behandling_id, tilstand, tildelt, opprettet FROM oppgave WHERE id = ?1",
                params![&key],
                |row| {
                    Ok((
                        BehandlingId::from_value(id_col(row, 0)?),
                        enum_col(row, 1, "oppgave tilstand", OppgaveTilstand::parse)?,
                        row.get::<_, Option<String>>(2)?.map(Aktor::new),
                        time_col(row, 3)?,
                    ))
                },
            )
            .optional()?;

        let Some((behandling_id, tilstand, tildelt, opprettet)) = row else {
            return Ok(None);
        };

        let behandling = self.load_behandling(behandling_id)?.ok_or_else(|| {
            StoreError::NotFound(format!("Behandling {} of oppgave {}", behandling_id, id))
        })?;

        let emneknagger = {
            let mut stmt = self
                .conn
                .prepare("SELECT navn FROM emneknagg WHERE oppgave_id = ?1 ORDER BY navn")?;
            let navn = stmt
                .query_map(params![&key], |row| row.get::<_, String>(0))?
                .collect::<Result<BTreeSet<_>, _>>()?;
            navn
        };

        let behandlede_hendelser = {
            let mut stmt = self
                .conn
                .prepare("SELECT hendelse_id FROM behandlet_hendelse WHERE oppgave_id = ?1")?;
            let ids = stmt
                .query_map(params![&key], |row| Ok(HendelseId::from_value(id_col(row, 0)?)))?
                .collect::<Result<BTreeSet<_>, _>>()?;
            ids
        };

        let oppgave = Oppgave::from_parts(OppgaveParts {
            id,
            behandling,
            tilstand,
            tildelt,
            emneknagger,
            logg: self.load_logg(&key)?,
            behandlede_hendelser,
            opprettet,
        })?;

        debug!(oppgave = %id, tilstand = tilstand.as_str(), "Loaded oppgave");
        Ok(Some(oppgave))
    }

    fn list(&self) -> Result<Vec<OppgaveId>, Self::Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM oppgave ORDER BY opprettet, id")?;
        let ids = stmt
            .query_map([], |row| Ok(OppgaveId::from_value(id_col(row, 0)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}


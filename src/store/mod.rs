//! Relational persistence for the candidate pipeline.
//!
//! One SQLite connection per process, WAL journaling, foreign keys enforced.
//! `Store` is synchronous; `DbHandle` wraps it behind `Arc<Mutex>` and runs
//! every access on tokio's blocking pool so SQLite I/O never ties up async
//! worker threads.

pub mod models;

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use models::*;

/// Async-safe handle to the pipeline store.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<Store>>,
}

impl DbHandle {
    pub fn new(store: Store) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(store)),
        }
    }

    /// Run a closure with access to the store on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Store) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let store = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = store
                .lock()
                .map_err(|e| anyhow::anyhow!("Store lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("Store task panicked")?
    }

    /// Synchronous access for startup paths and tests. Not for hot async
    /// paths.
    pub fn lock_sync(&self) -> Result<std::sync::MutexGuard<'_, Store>> {
        self.inner
            .lock()
            .map_err(|e| anyhow::anyhow!("Store lock poisoned: {}", e))
    }
}

/// Inputs to `begin_run`.
#[derive(Debug, Clone)]
pub struct BeginRun {
    pub idempotency_key: String,
    pub role_key: String,
    pub role_title: String,
    pub target_candidates: u32,
    /// Serialised search criteria, including the mode markers.
    pub criteria_json: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeginRunOutcome {
    pub run_id: String,
    pub resumed: bool,
    pub status: RunStatus,
}

/// A run joined with its diagnostics blob, for the status surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatusView {
    #[serde(flatten)]
    pub run: PipelineRun,
    pub diagnostics: Option<CandidatePipelineDiagnostics>,
}

/// One entry in the verification queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationQueueEntry {
    pub candidate: Candidate,
    pub priority: i64,
    pub total_score: f64,
    pub notes: Option<String>,
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// `[date, date+24h)` in UTC epoch millis for a `YYYY-MM-DD` day.
fn day_window_millis(date: &str) -> Result<(i64, i64)> {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", date))?;
    let start = Utc
        .from_utc_datetime(&day.and_hms_opt(0, 0, 0).expect("midnight is valid"))
        .timestamp_millis();
    Ok((start, start + 86_400_000))
}

/// Hash of the lowercased profile URL minus query string and trailing slash.
pub fn normalized_profile_url_hash(url: &str) -> String {
    let mut normalized = url.trim().to_lowercase();
    if let Some(idx) = normalized.find('?') {
        normalized.truncate(idx);
    }
    while normalized.ends_with('/') {
        normalized.pop();
    }
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database at the given path and run migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
            .context("Failed to set database pragmas")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS pipeline_runs (
                    id TEXT PRIMARY KEY,
                    idempotency_key TEXT NOT NULL UNIQUE,
                    status TEXT NOT NULL DEFAULT 'running',
                    started_at INTEGER NOT NULL,
                    finished_at INTEGER,
                    target_candidates INTEGER NOT NULL,
                    role_key TEXT NOT NULL,
                    role_title TEXT NOT NULL,
                    summary_json TEXT
                );

                CREATE TABLE IF NOT EXISTS run_roles (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    run_id TEXT NOT NULL REFERENCES pipeline_runs(id) ON DELETE CASCADE,
                    role_key TEXT NOT NULL,
                    role_title TEXT NOT NULL,
                    criteria_json TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    UNIQUE(run_id, role_key)
                );

                CREATE TABLE IF NOT EXISTS candidates (
                    id TEXT PRIMARY KEY,
                    provider TEXT NOT NULL,
                    provider_id TEXT,
                    public_identifier TEXT,
                    profile_url TEXT,
                    profile_url_hash TEXT,
                    name TEXT,
                    headline TEXT,
                    location TEXT,
                    current_company TEXT,
                    current_role TEXT,
                    first_seen_at INTEGER NOT NULL,
                    last_seen_at INTEGER NOT NULL,
                    UNIQUE(provider, provider_id),
                    UNIQUE(provider, public_identifier),
                    UNIQUE(provider, profile_url_hash)
                );

                CREATE TABLE IF NOT EXISTS candidate_source_records (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    candidate_id TEXT NOT NULL REFERENCES candidates(id) ON DELETE CASCADE,
                    run_id TEXT NOT NULL REFERENCES pipeline_runs(id) ON DELETE CASCADE,
                    source TEXT NOT NULL,
                    source_rank INTEGER NOT NULL,
                    payload_json TEXT,
                    created_at INTEGER NOT NULL,
                    UNIQUE(candidate_id, run_id, source, source_rank)
                );

                CREATE TABLE IF NOT EXISTS candidate_identities (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    candidate_id TEXT NOT NULL REFERENCES candidates(id) ON DELETE CASCADE,
                    platform TEXT NOT NULL,
                    handle TEXT,
                    url TEXT,
                    confidence REAL NOT NULL,
                    band TEXT NOT NULL,
                    reasons_json TEXT NOT NULL DEFAULT '[]',
                    shortlist_eligible INTEGER NOT NULL DEFAULT 0,
                    updated_at INTEGER NOT NULL,
                    UNIQUE(candidate_id, platform)
                );

                CREATE TABLE IF NOT EXISTS candidate_signals (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    candidate_id TEXT NOT NULL REFERENCES candidates(id) ON DELETE CASCADE,
                    run_id TEXT NOT NULL REFERENCES pipeline_runs(id) ON DELETE CASCADE,
                    key TEXT NOT NULL,
                    numeric_value REAL,
                    source TEXT NOT NULL,
                    details TEXT,
                    created_at INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS candidate_scores (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    candidate_id TEXT NOT NULL REFERENCES candidates(id) ON DELETE CASCADE,
                    run_id TEXT NOT NULL REFERENCES pipeline_runs(id) ON DELETE CASCADE,
                    total_score REAL NOT NULL,
                    builder_activity REAL NOT NULL,
                    ai_native_evidence REAL NOT NULL,
                    technical_depth REAL NOT NULL,
                    role_fit REAL NOT NULL,
                    identity_confidence REAL NOT NULL,
                    concerns_json TEXT NOT NULL DEFAULT '[]',
                    shortlist_eligible INTEGER NOT NULL DEFAULT 0,
                    outreach_angle TEXT NOT NULL DEFAULT '',
                    updated_at INTEGER NOT NULL,
                    UNIQUE(candidate_id, run_id)
                );

                CREATE TABLE IF NOT EXISTS candidate_evidence_links (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    candidate_id TEXT NOT NULL REFERENCES candidates(id) ON DELETE CASCADE,
                    run_id TEXT NOT NULL REFERENCES pipeline_runs(id) ON DELETE CASCADE,
                    url TEXT NOT NULL,
                    title TEXT,
                    source TEXT NOT NULL,
                    relevance REAL NOT NULL DEFAULT 0,
                    created_at INTEGER NOT NULL,
                    UNIQUE(candidate_id, run_id, url)
                );

                CREATE TABLE IF NOT EXISTS run_failures (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    run_id TEXT NOT NULL REFERENCES pipeline_runs(id) ON DELETE CASCADE,
                    stage TEXT NOT NULL,
                    candidate_ref TEXT,
                    error_type TEXT NOT NULL,
                    message TEXT NOT NULL,
                    retryable INTEGER NOT NULL DEFAULT 0,
                    payload_json TEXT,
                    created_at INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS candidate_reviews (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    candidate_id TEXT NOT NULL REFERENCES candidates(id) ON DELETE CASCADE,
                    run_id TEXT NOT NULL REFERENCES pipeline_runs(id) ON DELETE CASCADE,
                    status TEXT NOT NULL,
                    priority INTEGER NOT NULL DEFAULT 0,
                    notes TEXT,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL,
                    UNIQUE(candidate_id, run_id)
                );

                CREATE TABLE IF NOT EXISTS candidate_verifications (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    candidate_id TEXT NOT NULL REFERENCES candidates(id) ON DELETE CASCADE,
                    run_id TEXT NOT NULL REFERENCES pipeline_runs(id) ON DELETE CASCADE,
                    method TEXT NOT NULL,
                    outcome TEXT NOT NULL,
                    confidence_before REAL NOT NULL DEFAULT 0,
                    confidence_after REAL NOT NULL DEFAULT 0,
                    proof_links_json TEXT NOT NULL DEFAULT '[]',
                    notes TEXT,
                    created_at INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS candidate_promotions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    candidate_id TEXT NOT NULL REFERENCES candidates(id) ON DELETE CASCADE,
                    run_id TEXT NOT NULL REFERENCES pipeline_runs(id) ON DELETE CASCADE,
                    promotion_reason TEXT NOT NULL,
                    confidence_override REAL,
                    outreach_angle TEXT,
                    proof_links_json TEXT NOT NULL DEFAULT '[]',
                    promoted_at INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS daily_run_outputs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    run_id TEXT NOT NULL REFERENCES pipeline_runs(id) ON DELETE CASCADE,
                    role_key TEXT NOT NULL,
                    date TEXT NOT NULL,
                    sourced INTEGER NOT NULL DEFAULT 0,
                    enriched INTEGER NOT NULL DEFAULT 0,
                    shortlist_eligible INTEGER NOT NULL DEFAULT 0,
                    created_at INTEGER NOT NULL,
                    UNIQUE(run_id, role_key, date)
                );

                CREATE INDEX IF NOT EXISTS idx_scores_run_total
                    ON candidate_scores(run_id, total_score DESC);
                CREATE INDEX IF NOT EXISTS idx_reviews_run_status
                    ON candidate_reviews(run_id, status);
                CREATE INDEX IF NOT EXISTS idx_failures_run_created
                    ON run_failures(run_id, created_at DESC);
                CREATE INDEX IF NOT EXISTS idx_verifications_run_created
                    ON candidate_verifications(run_id, created_at DESC);
                ",
            )
            .context("Failed to create schema")?;
        Ok(())
    }

    // ── Runs ──────────────────────────────────────────────────────────

    /// Begin a run, idempotent on the key: a `running` or `completed` run
    /// with the same key is returned as-is; a `failed` run is replaced by a
    /// fresh run under a new id (the old row keeps its history under a
    /// retired key).
    pub fn begin_run(&self, input: &BeginRun) -> Result<BeginRunOutcome> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        let existing: Option<(String, String)> = tx
            .query_row(
                "SELECT id, status FROM pipeline_runs WHERE idempotency_key = ?1",
                params![input.idempotency_key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .context("Failed to query existing run")?;

        if let Some((run_id, status)) = existing {
            let status = RunStatus::from_str(&status).map_err(|e| anyhow::anyhow!(e))?;
            match status {
                RunStatus::Running | RunStatus::Completed => {
                    tx.commit().context("Failed to commit begin_run")?;
                    return Ok(BeginRunOutcome {
                        run_id,
                        resumed: true,
                        status,
                    });
                }
                RunStatus::Failed => {
                    // Free the key for the restart; the failed run keeps its
                    // rows under a retired key.
                    tx.execute(
                        "UPDATE pipeline_runs SET idempotency_key = id || ':failed:' || idempotency_key
                         WHERE id = ?1",
                        params![run_id],
                    )
                    .context("Failed to retire failed run key")?;
                }
            }
        }

        let run_id = Uuid::new_v4().to_string();
        let now = now_millis();
        tx.execute(
            "INSERT INTO pipeline_runs (id, idempotency_key, status, started_at, target_candidates, role_key, role_title)
             VALUES (?1, ?2, 'running', ?3, ?4, ?5, ?6)",
            params![
                run_id,
                input.idempotency_key,
                now,
                input.target_candidates,
                input.role_key,
                input.role_title
            ],
        )
        .context("Failed to insert run")?;
        tx.execute(
            "INSERT INTO run_roles (run_id, role_key, role_title, criteria_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                run_id,
                input.role_key,
                input.role_title,
                input.criteria_json,
                now
            ],
        )
        .context("Failed to insert run role")?;
        tx.commit().context("Failed to commit begin_run")?;

        Ok(BeginRunOutcome {
            run_id,
            resumed: false,
            status: RunStatus::Running,
        })
    }

    fn read_run_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(PipelineRun, Option<String>)> {
        let status: String = row.get(2)?;
        Ok((
            PipelineRun {
                id: row.get(0)?,
                idempotency_key: row.get(1)?,
                status: RunStatus::from_str(&status).unwrap_or(RunStatus::Failed),
                started_at: row.get(3)?,
                finished_at: row.get(4)?,
                target_candidates: row.get(5)?,
                role_key: row.get(6)?,
                role_title: row.get(7)?,
            },
            row.get(8)?,
        ))
    }

    const RUN_COLUMNS: &'static str = "id, idempotency_key, status, started_at, finished_at, target_candidates, role_key, role_title, summary_json";

    pub fn get_run_status(&self, run_id: &str) -> Result<Option<RunStatusView>> {
        let sql = format!(
            "SELECT {} FROM pipeline_runs WHERE id = ?1",
            Self::RUN_COLUMNS
        );
        let row = self
            .conn
            .query_row(&sql, params![run_id], Self::read_run_row)
            .optional()
            .context("Failed to query run")?;
        match row {
            Some((run, summary)) => Ok(Some(RunStatusView {
                run,
                diagnostics: parse_diagnostics(summary.as_deref()),
            })),
            None => Ok(None),
        }
    }

    pub fn list_recent_runs(&self, limit: u32) -> Result<Vec<RunStatusView>> {
        let sql = format!(
            "SELECT {} FROM pipeline_runs ORDER BY started_at DESC LIMIT ?1",
            Self::RUN_COLUMNS
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare list_recent_runs")?;
        let rows = stmt
            .query_map(params![limit], Self::read_run_row)
            .context("Failed to query recent runs")?;
        let mut runs = Vec::new();
        for row in rows {
            let (run, summary) = row.context("Failed to read run row")?;
            runs.push(RunStatusView {
                run,
                diagnostics: parse_diagnostics(summary.as_deref()),
            });
        }
        Ok(runs)
    }

    /// Most recent run for the role, scanning the latest `scan_limit` runs.
    pub fn find_recent_run_for_role(
        &self,
        role_key: &str,
        scan_limit: u32,
    ) -> Result<Option<PipelineRun>> {
        Ok(self
            .list_recent_runs(scan_limit)?
            .into_iter()
            .map(|view| view.run)
            .find(|run| run.role_key == role_key))
    }

    pub fn mark_run_completed(
        &self,
        run_id: &str,
        diagnostics: &CandidatePipelineDiagnostics,
    ) -> Result<()> {
        self.finish_run(run_id, RunStatus::Completed, diagnostics)?;
        // Roll the day's counters into the daily output row.
        let run = self
            .get_run_status(run_id)?
            .with_context(|| format!("Run {} vanished after completion", run_id))?
            .run;
        self.upsert_daily_output(
            run_id,
            &run.role_key,
            &Utc::now().format("%Y-%m-%d").to_string(),
            &diagnostics.counts,
        )
    }

    pub fn mark_run_failed(
        &self,
        run_id: &str,
        diagnostics: &CandidatePipelineDiagnostics,
    ) -> Result<()> {
        self.finish_run(run_id, RunStatus::Failed, diagnostics)
    }

    fn finish_run(
        &self,
        run_id: &str,
        status: RunStatus,
        diagnostics: &CandidatePipelineDiagnostics,
    ) -> Result<()> {
        let summary =
            serde_json::to_string(diagnostics).context("Failed to serialise diagnostics")?;
        let updated = self
            .conn
            .execute(
                "UPDATE pipeline_runs SET status = ?1, finished_at = ?2, summary_json = ?3 WHERE id = ?4",
                params![status.as_str(), now_millis(), summary, run_id],
            )
            .context("Failed to finish run")?;
        anyhow::ensure!(updated == 1, "Run {} not found", run_id);
        Ok(())
    }

    // ── Candidates ────────────────────────────────────────────────────

    /// Upsert by the three dedup paths in priority order: provider id, then
    /// public identifier, then normalised profile URL hash. Mutable fields
    /// take the newest non-empty value; `last_seen_at` always advances.
    pub fn upsert_candidate(
        &self,
        sourced: &crate::providers::SourcedCandidate,
    ) -> Result<Candidate> {
        let provider = "linkedin";
        let hash = sourced
            .profile_url
            .as_deref()
            .map(normalized_profile_url_hash);

        let existing_id: Option<String> = {
            let mut found = None;
            if let Some(provider_id) = sourced.provider_id.as_deref() {
                found = self
                    .conn
                    .query_row(
                        "SELECT id FROM candidates WHERE provider = ?1 AND provider_id = ?2",
                        params![provider, provider_id],
                        |row| row.get(0),
                    )
                    .optional()
                    .context("Failed to query candidate by provider id")?;
            }
            if found.is_none()
                && let Some(public_id) = sourced.public_identifier.as_deref()
            {
                found = self
                    .conn
                    .query_row(
                        "SELECT id FROM candidates WHERE provider = ?1 AND public_identifier = ?2",
                        params![provider, public_id],
                        |row| row.get(0),
                    )
                    .optional()
                    .context("Failed to query candidate by public identifier")?;
            }
            if found.is_none()
                && let Some(hash) = hash.as_deref()
            {
                found = self
                    .conn
                    .query_row(
                        "SELECT id FROM candidates WHERE provider = ?1 AND profile_url_hash = ?2",
                        params![provider, hash],
                        |row| row.get(0),
                    )
                    .optional()
                    .context("Failed to query candidate by profile url hash")?;
            }
            found
        };

        let now = now_millis();
        let id = match existing_id {
            Some(id) => {
                self.conn
                    .execute(
                        "UPDATE candidates SET
                            provider_id = COALESCE(provider_id, ?1),
                            public_identifier = COALESCE(public_identifier, ?2),
                            profile_url = COALESCE(?3, profile_url),
                            profile_url_hash = COALESCE(profile_url_hash, ?4),
                            name = COALESCE(?5, name),
                            headline = COALESCE(?6, headline),
                            location = COALESCE(?7, location),
                            current_company = COALESCE(?8, current_company),
                            current_role = COALESCE(?9, current_role),
                            last_seen_at = ?10
                         WHERE id = ?11",
                        params![
                            sourced.provider_id,
                            sourced.public_identifier,
                            sourced.profile_url,
                            hash,
                            sourced.name,
                            sourced.headline,
                            sourced.location,
                            sourced.current_company,
                            sourced.current_role,
                            now,
                            id
                        ],
                    )
                    .context("Failed to update candidate")?;
                id
            }
            None => {
                let id = generate_candidate_id(
                    sourced.provider_id.as_deref(),
                    sourced.public_identifier.as_deref(),
                    hash.as_deref(),
                );
                self.conn
                    .execute(
                        "INSERT INTO candidates
                            (id, provider, provider_id, public_identifier, profile_url, profile_url_hash,
                             name, headline, location, current_company, current_role, first_seen_at, last_seen_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
                        params![
                            id,
                            provider,
                            sourced.provider_id,
                            sourced.public_identifier,
                            sourced.profile_url,
                            hash,
                            sourced.name,
                            sourced.headline,
                            sourced.location,
                            sourced.current_company,
                            sourced.current_role,
                            now
                        ],
                    )
                    .context("Failed to insert candidate")?;
                id
            }
        };

        self.get_candidate(&id)?
            .context("Candidate not found after upsert")
    }

    const CANDIDATE_COLUMNS: &'static str = "id, provider, provider_id, public_identifier, profile_url, name, headline, location, current_company, current_role, first_seen_at, last_seen_at";

    fn read_candidate_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Candidate> {
        Ok(Candidate {
            id: row.get(0)?,
            provider: row.get(1)?,
            provider_id: row.get(2)?,
            public_identifier: row.get(3)?,
            profile_url: row.get(4)?,
            name: row.get(5)?,
            headline: row.get(6)?,
            location: row.get(7)?,
            current_company: row.get(8)?,
            current_role: row.get(9)?,
            first_seen_at: row.get(10)?,
            last_seen_at: row.get(11)?,
        })
    }

    pub fn get_candidate(&self, id: &str) -> Result<Option<Candidate>> {
        let sql = format!(
            "SELECT {} FROM candidates WHERE id = ?1",
            Self::CANDIDATE_COLUMNS
        );
        self.conn
            .query_row(&sql, params![id], Self::read_candidate_row)
            .optional()
            .context("Failed to query candidate")
    }

    pub fn add_source_record(
        &self,
        candidate_id: &str,
        run_id: &str,
        source: &str,
        source_rank: u32,
        payload_json: Option<&str>,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO candidate_source_records
                    (candidate_id, run_id, source, source_rank, payload_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    candidate_id,
                    run_id,
                    source,
                    source_rank,
                    payload_json,
                    now_millis()
                ],
            )
            .context("Failed to insert source record")?;
        Ok(())
    }

    /// Append signals in one short transaction.
    pub fn add_signals(&self, candidate_id: &str, run_id: &str, signals: &[Signal]) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin signal transaction")?;
        let now = now_millis();
        for signal in signals {
            tx.execute(
                "INSERT INTO candidate_signals (candidate_id, run_id, key, numeric_value, source, details, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    candidate_id,
                    run_id,
                    signal.key.as_str(),
                    signal.numeric_value,
                    signal.source,
                    signal.details,
                    now
                ],
            )
            .context("Failed to insert signal")?;
        }
        tx.commit().context("Failed to commit signals")
    }

    /// Append evidence links in one transaction; duplicates by URL within
    /// the (candidate, run) are ignored.
    pub fn add_evidence_links(
        &self,
        candidate_id: &str,
        run_id: &str,
        links: &[EvidenceLink],
    ) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin evidence transaction")?;
        let now = now_millis();
        for link in links {
            tx.execute(
                "INSERT OR IGNORE INTO candidate_evidence_links
                    (candidate_id, run_id, url, title, source, relevance, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    candidate_id,
                    run_id,
                    link.url,
                    link.title,
                    link.source,
                    link.relevance,
                    now
                ],
            )
            .context("Failed to insert evidence link")?;
        }
        tx.commit().context("Failed to commit evidence links")
    }

    pub fn upsert_identity(&self, candidate_id: &str, identity: &CandidateIdentity) -> Result<()> {
        let reasons =
            serde_json::to_string(&identity.reasons).context("Failed to serialise reasons")?;
        self.conn
            .execute(
                "INSERT INTO candidate_identities
                    (candidate_id, platform, handle, url, confidence, band, reasons_json, shortlist_eligible, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(candidate_id, platform) DO UPDATE SET
                    handle = excluded.handle,
                    url = excluded.url,
                    confidence = excluded.confidence,
                    band = excluded.band,
                    reasons_json = excluded.reasons_json,
                    shortlist_eligible = excluded.shortlist_eligible,
                    updated_at = excluded.updated_at",
                params![
                    candidate_id,
                    identity.platform.as_str(),
                    identity.handle,
                    identity.url,
                    identity.confidence,
                    identity.band.as_str(),
                    reasons,
                    identity.shortlist_eligible,
                    now_millis()
                ],
            )
            .context("Failed to upsert identity")?;
        Ok(())
    }

    fn read_identity_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CandidateIdentity> {
        let platform: String = row.get(0)?;
        let band: String = row.get(4)?;
        let reasons_json: String = row.get(5)?;
        Ok(CandidateIdentity {
            platform: Platform::from_str(&platform).unwrap_or(Platform::CrossPlatform),
            handle: row.get(1)?,
            url: row.get(2)?,
            confidence: row.get(3)?,
            band: ConfidenceBand::from_str(&band).unwrap_or(ConfidenceBand::Low),
            reasons: serde_json::from_str(&reasons_json).unwrap_or_default(),
            shortlist_eligible: row.get(6)?,
        })
    }

    const IDENTITY_COLUMNS: &'static str =
        "platform, handle, url, confidence, band, reasons_json, shortlist_eligible";

    pub fn get_identity(
        &self,
        candidate_id: &str,
        platform: Platform,
    ) -> Result<Option<CandidateIdentity>> {
        let sql = format!(
            "SELECT {} FROM candidate_identities WHERE candidate_id = ?1 AND platform = ?2",
            Self::IDENTITY_COLUMNS
        );
        self.conn
            .query_row(
                &sql,
                params![candidate_id, platform.as_str()],
                Self::read_identity_row,
            )
            .optional()
            .context("Failed to query identity")
    }

    pub fn upsert_score(
        &self,
        candidate_id: &str,
        run_id: &str,
        score: &CandidateScore,
    ) -> Result<()> {
        let concerns =
            serde_json::to_string(&score.concerns).context("Failed to serialise concerns")?;
        self.conn
            .execute(
                "INSERT INTO candidate_scores
                    (candidate_id, run_id, total_score, builder_activity, ai_native_evidence,
                     technical_depth, role_fit, identity_confidence, concerns_json,
                     shortlist_eligible, outreach_angle, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(candidate_id, run_id) DO UPDATE SET
                    total_score = excluded.total_score,
                    builder_activity = excluded.builder_activity,
                    ai_native_evidence = excluded.ai_native_evidence,
                    technical_depth = excluded.technical_depth,
                    role_fit = excluded.role_fit,
                    identity_confidence = excluded.identity_confidence,
                    concerns_json = excluded.concerns_json,
                    shortlist_eligible = excluded.shortlist_eligible,
                    outreach_angle = excluded.outreach_angle,
                    updated_at = excluded.updated_at",
                params![
                    candidate_id,
                    run_id,
                    score.total,
                    score.breakdown.builder_activity,
                    score.breakdown.ai_native_evidence,
                    score.breakdown.technical_depth,
                    score.breakdown.role_fit,
                    score.breakdown.identity_confidence,
                    concerns,
                    score.shortlist_eligible,
                    score.outreach_angle,
                    now_millis()
                ],
            )
            .context("Failed to upsert score")?;
        Ok(())
    }

    pub fn record_run_failure(&self, run_id: &str, failure: &RunFailure) -> Result<()> {
        let payload = failure
            .payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("Failed to serialise failure payload")?;
        self.conn
            .execute(
                "INSERT INTO run_failures (run_id, stage, candidate_ref, error_type, message, retryable, payload_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    run_id,
                    failure.stage,
                    failure.candidate_ref,
                    failure.error_type,
                    failure.message,
                    failure.retryable,
                    payload,
                    now_millis()
                ],
            )
            .context("Failed to insert run failure")?;
        Ok(())
    }

    // ── Review workflow ───────────────────────────────────────────────

    pub fn upsert_review_status(
        &self,
        candidate_id: &str,
        run_id: &str,
        status: ReviewState,
        notes: Option<&str>,
        priority: Option<i64>,
    ) -> Result<Review> {
        let now = now_millis();
        self.conn
            .execute(
                "INSERT INTO candidate_reviews (candidate_id, run_id, status, priority, notes, created_at, updated_at)
                 VALUES (?1, ?2, ?3, COALESCE(?4, 0), ?5, ?6, ?6)
                 ON CONFLICT(candidate_id, run_id) DO UPDATE SET
                    status = excluded.status,
                    priority = COALESCE(?4, candidate_reviews.priority),
                    notes = COALESCE(?5, candidate_reviews.notes),
                    updated_at = ?6",
                params![candidate_id, run_id, status.as_str(), priority, notes, now],
            )
            .context("Failed to upsert review")?;
        self.get_review(candidate_id, run_id)?
            .context("Review not found after upsert")
    }

    pub fn get_review(&self, candidate_id: &str, run_id: &str) -> Result<Option<Review>> {
        self.conn
            .query_row(
                "SELECT candidate_id, run_id, status, priority, notes, updated_at
                 FROM candidate_reviews WHERE candidate_id = ?1 AND run_id = ?2",
                params![candidate_id, run_id],
                |row| {
                    let status: String = row.get(2)?;
                    Ok(Review {
                        candidate_id: row.get(0)?,
                        run_id: row.get(1)?,
                        status: ReviewState::from_str(&status)
                            .unwrap_or(ReviewState::NewReview),
                        priority: row.get(3)?,
                        notes: row.get(4)?,
                        updated_at: row.get(5)?,
                    })
                },
            )
            .optional()
            .context("Failed to query review")
    }

    pub fn insert_verification(&self, verification: &Verification) -> Result<()> {
        let proof = serde_json::to_string(&verification.proof_links)
            .context("Failed to serialise proof links")?;
        self.conn
            .execute(
                "INSERT INTO candidate_verifications
                    (candidate_id, run_id, method, outcome, confidence_before, confidence_after,
                     proof_links_json, notes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    verification.candidate_id,
                    verification.run_id,
                    verification.method.as_str(),
                    verification.outcome.as_str(),
                    verification.confidence_before,
                    verification.confidence_after,
                    proof,
                    verification.notes,
                    now_millis()
                ],
            )
            .context("Failed to insert verification")?;
        Ok(())
    }

    pub fn has_promotion(&self, candidate_id: &str, run_id: &str) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM candidate_promotions WHERE candidate_id = ?1 AND run_id = ?2",
                params![candidate_id, run_id],
                |row| row.get(0),
            )
            .context("Failed to query promotions")
    }

    /// Insert the promotion and move the review to `promoted_shortlist` in
    /// the same transaction. The store is the single writer for review
    /// transitions triggered by promotion.
    pub fn insert_promotion(&self, promotion: &Promotion) -> Result<()> {
        let proof = serde_json::to_string(&promotion.proof_links)
            .context("Failed to serialise proof links")?;
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin promotion transaction")?;
        let now = now_millis();
        tx.execute(
            "INSERT INTO candidate_promotions
                (candidate_id, run_id, promotion_reason, confidence_override, outreach_angle, proof_links_json, promoted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                promotion.candidate_id,
                promotion.run_id,
                promotion.promotion_reason,
                promotion.confidence_override,
                promotion.outreach_angle,
                proof,
                now
            ],
        )
        .context("Failed to insert promotion")?;
        tx.execute(
            "INSERT INTO candidate_reviews (candidate_id, run_id, status, priority, notes, created_at, updated_at)
             VALUES (?1, ?2, 'promoted_shortlist', 0, NULL, ?3, ?3)
             ON CONFLICT(candidate_id, run_id) DO UPDATE SET
                status = 'promoted_shortlist',
                updated_at = ?3",
            params![promotion.candidate_id, promotion.run_id, now],
        )
        .context("Failed to promote review")?;
        tx.commit().context("Failed to commit promotion")
    }

    /// Candidates under verification for the run, by `priority DESC,
    /// total_score DESC`. `high_only` additionally filters `priority >= 50`.
    pub fn get_verification_queue(
        &self,
        run_id: &str,
        limit: u32,
        high_only: bool,
    ) -> Result<Vec<VerificationQueueEntry>> {
        let sql = format!(
            "SELECT {}, r.priority, r.notes, COALESCE(s.total_score, 0)
             FROM candidate_reviews r
             JOIN candidates c ON c.id = r.candidate_id
             LEFT JOIN candidate_scores s ON s.candidate_id = r.candidate_id AND s.run_id = r.run_id
             WHERE r.run_id = ?1 AND r.status = 'under_verification'
               AND (?2 = 0 OR r.priority >= 50)
             ORDER BY r.priority DESC, s.total_score DESC
             LIMIT ?3",
            Self::CANDIDATE_COLUMNS
                .split(", ")
                .map(|col| format!("c.{}", col))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare verification queue")?;
        let rows = stmt
            .query_map(params![run_id, high_only, limit], |row| {
                let candidate = Self::read_candidate_row(row)?;
                Ok(VerificationQueueEntry {
                    candidate,
                    priority: row.get(12)?,
                    notes: row.get(13)?,
                    total_score: row.get(14)?,
                })
            })
            .context("Failed to query verification queue")?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.context("Failed to read verification queue row")?);
        }
        Ok(entries)
    }

    // ── Read side ─────────────────────────────────────────────────────

    fn read_score_row(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<CandidateScore> {
        let concerns_json: String = row.get(offset + 6)?;
        Ok(CandidateScore {
            total: row.get(offset)?,
            breakdown: ScoreBreakdown {
                builder_activity: row.get(offset + 1)?,
                ai_native_evidence: row.get(offset + 2)?,
                technical_depth: row.get(offset + 3)?,
                role_fit: row.get(offset + 4)?,
                identity_confidence: row.get(offset + 5)?,
            },
            concerns: serde_json::from_str(&concerns_json).unwrap_or_default(),
            shortlist_eligible: row.get(offset + 7)?,
            outreach_angle: row.get(offset + 8)?,
        })
    }

    const SCORE_COLUMNS: &'static str = "total_score, builder_activity, ai_native_evidence, technical_depth, role_fit, identity_confidence, concerns_json, shortlist_eligible, outreach_angle";

    /// Top-N scored candidates for the run, partitioned into shortlist and
    /// review queue, each row carrying its top-3 evidence links.
    pub fn get_results(&self, run_id: &str, limit: u32) -> Result<CandidatePipelineResults> {
        let status = self
            .get_run_status(run_id)?
            .with_context(|| format!("Run {} not found", run_id))?;

        let sql = format!(
            "SELECT {}, {} FROM candidate_scores s
             JOIN candidates c ON c.id = s.candidate_id
             WHERE s.run_id = ?1
             ORDER BY s.total_score DESC
             LIMIT ?2",
            Self::CANDIDATE_COLUMNS
                .split(", ")
                .map(|col| format!("c.{}", col))
                .collect::<Vec<_>>()
                .join(", "),
            Self::SCORE_COLUMNS
                .split(", ")
                .map(|col| format!("s.{}", col))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare get_results")?;
        let rows = stmt
            .query_map(params![run_id, limit], |row| {
                let candidate = Self::read_candidate_row(row)?;
                let score = Self::read_score_row(row, 12)?;
                Ok((candidate, score))
            })
            .context("Failed to query results")?;

        let mut shortlist = Vec::new();
        let mut review_queue = Vec::new();
        for row in rows {
            let (candidate, score) = row.context("Failed to read result row")?;
            let identity = self.get_identity(&candidate.id, Platform::CrossPlatform)?;
            let evidence = self.top_evidence(&candidate.id, run_id, 3)?;
            let entry = CandidateResultRow {
                candidate,
                score,
                identity,
                evidence,
            };
            if entry.score.shortlist_eligible {
                shortlist.push(entry);
            } else {
                review_queue.push(entry);
            }
        }

        let modes = status
            .diagnostics
            .as_ref()
            .map(|d| d.modes)
            .unwrap_or_default();
        Ok(CandidatePipelineResults {
            shortlist,
            review_queue,
            meta: ResultsMeta {
                run_id: status.run.id,
                role_key: status.run.role_key,
                status: Some(status.run.status),
                diagnostics: status.diagnostics,
                modes,
            },
        })
    }

    fn top_evidence(&self, candidate_id: &str, run_id: &str, limit: u32) -> Result<Vec<EvidenceLink>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT url, title, source, relevance FROM candidate_evidence_links
                 WHERE candidate_id = ?1 AND run_id = ?2
                 ORDER BY relevance DESC, created_at DESC
                 LIMIT ?3",
            )
            .context("Failed to prepare evidence query")?;
        let rows = stmt
            .query_map(params![candidate_id, run_id, limit], |row| {
                Ok(EvidenceLink {
                    url: row.get(0)?,
                    title: row.get(1)?,
                    source: row.get(2)?,
                    relevance: row.get(3)?,
                })
            })
            .context("Failed to query evidence")?;
        let mut links = Vec::new();
        for row in rows {
            links.push(row.context("Failed to read evidence row")?);
        }
        Ok(links)
    }

    /// Full candidate document: identities, signals, per-run scores,
    /// evidence, reviews, verifications, promotions.
    pub fn get_candidate_detail(&self, candidate_id: &str) -> Result<Option<CandidateDetail>> {
        let Some(candidate) = self.get_candidate(candidate_id)? else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM candidate_identities WHERE candidate_id = ?1",
            Self::IDENTITY_COLUMNS
        ))?;
        let identities = stmt
            .query_map(params![candidate_id], Self::read_identity_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read identities")?;

        let mut stmt = self.conn.prepare(
            "SELECT key, numeric_value, source, details FROM candidate_signals
             WHERE candidate_id = ?1 ORDER BY created_at",
        )?;
        let signals = stmt
            .query_map(params![candidate_id], |row| {
                let key: String = row.get(0)?;
                Ok(Signal {
                    key: SignalKey::from_str(&key).unwrap_or(SignalKey::BuilderActivity),
                    numeric_value: row.get(1)?,
                    source: row.get(2)?,
                    details: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read signals")?;

        let mut stmt = self.conn.prepare(&format!(
            "SELECT run_id, {} FROM candidate_scores WHERE candidate_id = ?1 ORDER BY updated_at DESC",
            Self::SCORE_COLUMNS
        ))?;
        let scores = stmt
            .query_map(params![candidate_id], |row| {
                let run_id: String = row.get(0)?;
                Ok((run_id, Self::read_score_row(row, 1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read scores")?;

        let mut stmt = self.conn.prepare(
            "SELECT url, title, source, relevance FROM candidate_evidence_links
             WHERE candidate_id = ?1 ORDER BY relevance DESC, created_at DESC",
        )?;
        let evidence = stmt
            .query_map(params![candidate_id], |row| {
                Ok(EvidenceLink {
                    url: row.get(0)?,
                    title: row.get(1)?,
                    source: row.get(2)?,
                    relevance: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read evidence")?;

        let mut stmt = self.conn.prepare(
            "SELECT candidate_id, run_id, status, priority, notes, updated_at
             FROM candidate_reviews WHERE candidate_id = ?1",
        )?;
        let reviews = stmt
            .query_map(params![candidate_id], |row| {
                let status: String = row.get(2)?;
                Ok(Review {
                    candidate_id: row.get(0)?,
                    run_id: row.get(1)?,
                    status: ReviewState::from_str(&status).unwrap_or(ReviewState::NewReview),
                    priority: row.get(3)?,
                    notes: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read reviews")?;

        let mut stmt = self.conn.prepare(
            "SELECT candidate_id, run_id, method, outcome, confidence_before, confidence_after,
                    proof_links_json, notes, created_at
             FROM candidate_verifications WHERE candidate_id = ?1 ORDER BY created_at DESC",
        )?;
        let verifications = stmt
            .query_map(params![candidate_id], |row| {
                let method: String = row.get(2)?;
                let outcome: String = row.get(3)?;
                let proof_json: String = row.get(6)?;
                Ok(Verification {
                    candidate_id: row.get(0)?,
                    run_id: row.get(1)?,
                    method: VerificationMethod::from_str(&method)
                        .unwrap_or(VerificationMethod::Api),
                    outcome: VerificationOutcome::from_str(&outcome)
                        .unwrap_or(VerificationOutcome::Inconclusive),
                    confidence_before: row.get(4)?,
                    confidence_after: row.get(5)?,
                    proof_links: serde_json::from_str(&proof_json).unwrap_or_default(),
                    notes: row.get(7)?,
                    created_at: row.get(8)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read verifications")?;

        let mut stmt = self.conn.prepare(
            "SELECT candidate_id, run_id, promotion_reason, confidence_override, outreach_angle,
                    proof_links_json, promoted_at
             FROM candidate_promotions WHERE candidate_id = ?1 ORDER BY promoted_at DESC",
        )?;
        let promotions = stmt
            .query_map(params![candidate_id], |row| {
                let proof_json: String = row.get(5)?;
                Ok(Promotion {
                    candidate_id: row.get(0)?,
                    run_id: row.get(1)?,
                    promotion_reason: row.get(2)?,
                    confidence_override: row.get(3)?,
                    outreach_angle: row.get(4)?,
                    proof_links: serde_json::from_str(&proof_json).unwrap_or_default(),
                    promoted_at: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read promotions")?;

        Ok(Some(CandidateDetail {
            candidate,
            identities,
            signals,
            scores,
            evidence,
            reviews,
            verifications,
            promotions,
        }))
    }

    // ── Daily accounting ──────────────────────────────────────────────

    pub fn upsert_daily_output(
        &self,
        run_id: &str,
        role_key: &str,
        date: &str,
        counts: &RunCounts,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO daily_run_outputs (run_id, role_key, date, sourced, enriched, shortlist_eligible, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(run_id, role_key, date) DO UPDATE SET
                    sourced = excluded.sourced,
                    enriched = excluded.enriched,
                    shortlist_eligible = excluded.shortlist_eligible",
                params![
                    run_id,
                    role_key,
                    date,
                    counts.sourced,
                    counts.enriched,
                    counts.shortlist_eligible,
                    now_millis()
                ],
            )
            .context("Failed to upsert daily output")?;
        Ok(())
    }

    /// Review-state counters for the run over the `[date, date+24h)` UTC
    /// window (by review update time).
    pub fn get_workflow_stats(&self, run_id: &str, date: &str) -> Result<WorkflowStats> {
        let (start, end) = day_window_millis(date)?;
        let mut stmt = self
            .conn
            .prepare(
                "SELECT status, COUNT(*) FROM candidate_reviews
                 WHERE run_id = ?1 AND updated_at >= ?2 AND updated_at < ?3
                 GROUP BY status",
            )
            .context("Failed to prepare workflow stats")?;
        let rows = stmt
            .query_map(params![run_id, start, end], |row| {
                let status: String = row.get(0)?;
                let count: u32 = row.get(1)?;
                Ok((status, count))
            })
            .context("Failed to query workflow stats")?;

        let mut stats = WorkflowStats::default();
        for row in rows {
            let (status, count) = row.context("Failed to read workflow stats row")?;
            match ReviewState::from_str(&status) {
                Ok(ReviewState::NewReview) => stats.new_review = count,
                Ok(ReviewState::UnderVerification) => stats.under_verification = count,
                Ok(ReviewState::PromotedShortlist) => stats.promoted_shortlist = count,
                Ok(ReviewState::Rejected) => stats.rejected = count,
                Ok(ReviewState::Deferred) => stats.deferred = count,
                Err(_) => {}
            }
        }
        Ok(stats)
    }

    /// Verification counters for the run over the day window.
    pub fn get_verification_stats(&self, run_id: &str, date: &str) -> Result<VerificationStats> {
        let (start, end) = day_window_millis(date)?;
        let mut stmt = self
            .conn
            .prepare(
                "SELECT outcome, COUNT(*) FROM candidate_verifications
                 WHERE run_id = ?1 AND created_at >= ?2 AND created_at < ?3
                 GROUP BY outcome",
            )
            .context("Failed to prepare verification stats")?;
        let rows = stmt
            .query_map(params![run_id, start, end], |row| {
                let outcome: String = row.get(0)?;
                let count: u32 = row.get(1)?;
                Ok((outcome, count))
            })
            .context("Failed to query verification stats")?;

        let mut stats = VerificationStats::default();
        for row in rows {
            let (outcome, count) = row.context("Failed to read verification stats row")?;
            stats.submitted += count;
            match VerificationOutcome::from_str(&outcome) {
                Ok(VerificationOutcome::Confirmed) => stats.confirmed = count,
                Ok(VerificationOutcome::Rejected) => stats.rejected = count,
                Ok(VerificationOutcome::Inconclusive) => stats.inconclusive = count,
                Err(_) => {}
            }
        }
        Ok(stats)
    }

    /// Quota accounting for the run and day versus the configured targets.
    pub fn get_quota_status(
        &self,
        run_id: &str,
        date: &str,
        quotas: &crate::config::DailyQuotaConfig,
    ) -> Result<QuotaStatus> {
        let (start, end) = day_window_millis(date)?;

        let promoted: u32 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM candidate_promotions
                 WHERE run_id = ?1 AND promoted_at >= ?2 AND promoted_at < ?3",
                params![run_id, start, end],
                |row| row.get(0),
            )
            .context("Failed to count promotions")?;

        let reviewed: u32 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM candidate_reviews
                 WHERE run_id = ?1 AND updated_at >= ?2 AND updated_at < ?3",
                params![run_id, start, end],
                |row| row.get(0),
            )
            .context("Failed to count reviews")?;

        let verifications: u32 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM candidate_verifications
                 WHERE run_id = ?1 AND created_at >= ?2 AND created_at < ?3",
                params![run_id, start, end],
                |row| row.get(0),
            )
            .context("Failed to count verifications")?;

        Ok(QuotaStatus {
            promoted: QuotaProgress::new(quotas.promoted_target, promoted),
            reviewed: QuotaProgress::new(quotas.reviewed_target, reviewed),
            verification_budget: QuotaProgress::new(quotas.verification_budget, verifications),
        })
    }
}

fn parse_diagnostics(summary_json: Option<&str>) -> Option<CandidatePipelineDiagnostics> {
    summary_json.and_then(|raw| serde_json::from_str(raw).ok())
}

fn generate_candidate_id(
    provider_id: Option<&str>,
    public_identifier: Option<&str>,
    profile_url_hash: Option<&str>,
) -> String {
    if let Some(provider_id) = provider_id {
        format!("li:{}", provider_id)
    } else if let Some(public_id) = public_identifier {
        format!("li_pub:{}", public_id)
    } else if let Some(hash) = profile_url_hash {
        format!("li_url:{}", &hash[..24.min(hash.len())])
    } else {
        format!("li_rand:{}", Uuid::new_v4())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::SourcedCandidate;

    fn test_store() -> Store {
        Store::open_in_memory().unwrap()
    }

    fn begin(store: &Store, key: &str) -> BeginRunOutcome {
        store
            .begin_run(&BeginRun {
                idempotency_key: key.to_string(),
                role_key: "founding-engineer".to_string(),
                role_title: "Founding Engineer".to_string(),
                target_candidates: 100,
                criteria_json: "{}".to_string(),
            })
            .unwrap()
    }

    fn alice() -> SourcedCandidate {
        SourcedCandidate {
            provider_id: Some("urn:li:123".to_string()),
            public_identifier: Some("alice".to_string()),
            profile_url: Some("https://linkedin.com/in/alice".to_string()),
            name: Some("Alice".to_string()),
            headline: Some("Builder".to_string()),
            ..SourcedCandidate::default()
        }
    }

    #[test]
    fn profile_url_hash_ignores_query_and_trailing_slash() {
        let a = normalized_profile_url_hash("https://linkedin.com/in/Alice/?utm=1");
        let b = normalized_profile_url_hash("https://linkedin.com/in/alice");
        assert_eq!(a, b);
        let c = normalized_profile_url_hash("https://linkedin.com/in/bob");
        assert_ne!(a, c);
    }

    #[test]
    fn begin_run_is_idempotent_while_running() {
        let store = test_store();
        let first = begin(&store, "role:100:2026-08-02");
        assert!(!first.resumed);
        let second = begin(&store, "role:100:2026-08-02");
        assert!(second.resumed);
        assert_eq!(first.run_id, second.run_id);
        assert_eq!(second.status, RunStatus::Running);
    }

    #[test]
    fn begin_run_resumes_completed_but_restarts_failed() {
        let store = test_store();
        let first = begin(&store, "k1");
        store
            .mark_run_completed(&first.run_id, &CandidatePipelineDiagnostics::default())
            .unwrap();
        let second = begin(&store, "k1");
        assert!(second.resumed);
        assert_eq!(second.status, RunStatus::Completed);

        let third = begin(&store, "k2");
        store
            .mark_run_failed(&third.run_id, &CandidatePipelineDiagnostics::default())
            .unwrap();
        let fourth = begin(&store, "k2");
        assert!(!fourth.resumed);
        assert_ne!(third.run_id, fourth.run_id);
    }

    #[test]
    fn upsert_candidate_dedups_across_all_three_paths() {
        let store = test_store();
        let full = store.upsert_candidate(&alice()).unwrap();
        assert_eq!(full.id, "li:urn:li:123");

        // Same provider id, different presentation.
        let by_provider = store
            .upsert_candidate(&SourcedCandidate {
                provider_id: Some("urn:li:123".to_string()),
                ..SourcedCandidate::default()
            })
            .unwrap();
        assert_eq!(by_provider.id, full.id);

        let by_public = store
            .upsert_candidate(&SourcedCandidate {
                public_identifier: Some("alice".to_string()),
                ..SourcedCandidate::default()
            })
            .unwrap();
        assert_eq!(by_public.id, full.id);

        let by_url = store
            .upsert_candidate(&SourcedCandidate {
                profile_url: Some("https://linkedin.com/in/ALICE/?ref=search".to_string()),
                ..SourcedCandidate::default()
            })
            .unwrap();
        assert_eq!(by_url.id, full.id);
    }

    #[test]
    fn upsert_candidate_updates_mutable_fields_and_last_seen() {
        let store = test_store();
        let first = store.upsert_candidate(&alice()).unwrap();
        let updated = store
            .upsert_candidate(&SourcedCandidate {
                provider_id: Some("urn:li:123".to_string()),
                headline: Some("Staff Builder".to_string()),
                ..SourcedCandidate::default()
            })
            .unwrap();
        assert_eq!(updated.headline.as_deref(), Some("Staff Builder"));
        assert_eq!(updated.first_seen_at, first.first_seen_at);
        assert!(updated.last_seen_at >= first.last_seen_at);
        // Name was not in the second sighting; previous value survives.
        assert_eq!(updated.name.as_deref(), Some("Alice"));
    }

    #[test]
    fn candidate_id_generation_fallbacks() {
        assert_eq!(generate_candidate_id(Some("p1"), None, None), "li:p1");
        assert_eq!(generate_candidate_id(None, Some("pub"), None), "li_pub:pub");
        let hash = "a".repeat(64);
        assert_eq!(
            generate_candidate_id(None, None, Some(&hash)),
            format!("li_url:{}", "a".repeat(24))
        );
        assert!(generate_candidate_id(None, None, None).starts_with("li_rand:"));
    }

    #[test]
    fn source_records_are_insert_or_ignore() {
        let store = test_store();
        let run = begin(&store, "k");
        let candidate = store.upsert_candidate(&alice()).unwrap();
        store
            .add_source_record(&candidate.id, &run.run_id, "linkedin_search", 1, None)
            .unwrap();
        store
            .add_source_record(&candidate.id, &run.run_id, "linkedin_search", 1, None)
            .unwrap();
        let count: u32 = store
            .conn
            .query_row(
                "SELECT COUNT(*) FROM candidate_source_records",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn evidence_links_dedup_by_url() {
        let store = test_store();
        let run = begin(&store, "k");
        let candidate = store.upsert_candidate(&alice()).unwrap();
        let link = |url: &str, relevance: f64| EvidenceLink {
            url: url.to_string(),
            title: None,
            source: "external".to_string(),
            relevance,
        };
        store
            .add_evidence_links(
                &candidate.id,
                &run.run_id,
                &[
                    link("https://github.com/alice", 0.9),
                    link("https://github.com/alice", 0.1),
                    link("https://alice.dev", 0.5),
                ],
            )
            .unwrap();
        let top = store.top_evidence(&candidate.id, &run.run_id, 3).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].url, "https://github.com/alice");
        // First-seen relevance wins for the duplicate URL.
        assert_eq!(top[0].relevance, 0.9);
    }

    #[test]
    fn identity_upsert_replaces_per_platform() {
        let store = test_store();
        let candidate = store.upsert_candidate(&alice()).unwrap();
        let identity = |confidence: f64| CandidateIdentity {
            platform: Platform::CrossPlatform,
            handle: None,
            url: None,
            confidence,
            band: ConfidenceBand::from_confidence(confidence),
            reasons: vec!["context_partial_match".to_string()],
            shortlist_eligible: confidence >= 0.8,
        };
        store.upsert_identity(&candidate.id, &identity(0.7)).unwrap();
        store.upsert_identity(&candidate.id, &identity(0.95)).unwrap();
        let stored = store
            .get_identity(&candidate.id, Platform::CrossPlatform)
            .unwrap()
            .unwrap();
        assert_eq!(stored.confidence, 0.95);
        assert_eq!(stored.band, ConfidenceBand::Confirmed);
        let count: u32 = store
            .conn
            .query_row("SELECT COUNT(*) FROM candidate_identities", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    fn sample_score(total: f64, eligible: bool) -> CandidateScore {
        CandidateScore {
            total,
            breakdown: ScoreBreakdown {
                builder_activity: total,
                ai_native_evidence: total,
                technical_depth: total,
                role_fit: total,
                identity_confidence: total,
            },
            concerns: Vec::new(),
            shortlist_eligible: eligible,
            outreach_angle: "Lead with role fit".to_string(),
        }
    }

    #[test]
    fn results_partition_and_order_by_score() {
        let store = test_store();
        let run = begin(&store, "k");
        let mut ids = Vec::new();
        for (i, (total, eligible)) in [(0.9, true), (0.5, false), (0.7, true)].iter().enumerate() {
            let candidate = store
                .upsert_candidate(&SourcedCandidate {
                    provider_id: Some(format!("p{}", i)),
                    ..SourcedCandidate::default()
                })
                .unwrap();
            store
                .upsert_score(&candidate.id, &run.run_id, &sample_score(*total, *eligible))
                .unwrap();
            ids.push(candidate.id);
        }
        store
            .mark_run_completed(&run.run_id, &CandidatePipelineDiagnostics::default())
            .unwrap();

        let results = store.get_results(&run.run_id, 10).unwrap();
        assert_eq!(results.shortlist.len(), 2);
        assert_eq!(results.review_queue.len(), 1);
        assert!(results.shortlist[0].score.total > results.shortlist[1].score.total);
        assert_eq!(results.meta.status, Some(RunStatus::Completed));
    }

    #[test]
    fn diagnostics_round_trip_through_summary_json() {
        let store = test_store();
        let run = begin(&store, "k");
        let diagnostics = CandidatePipelineDiagnostics {
            counts: RunCounts {
                sourced: 12,
                enriched: 10,
                enrich_failed: 2,
                ..RunCounts::default()
            },
            stage_errors: vec![StageErrorAggregate {
                stage: "candidate_enrich_score".to_string(),
                total: 2,
                top_messages: vec![StageMessageCount {
                    message: "LinkedIn API error (429)".to_string(),
                    error_type: "rate_limit".to_string(),
                    count: 2,
                }],
            }],
            modes: RunModes {
                source_query_mode: SourceQueryMode::Broad,
                evidence_query_mode: EvidenceQueryMode::Strict,
            },
            ..CandidatePipelineDiagnostics::default()
        };
        store.mark_run_completed(&run.run_id, &diagnostics).unwrap();

        let status = store.get_run_status(&run.run_id).unwrap().unwrap();
        assert_eq!(status.diagnostics.as_ref().unwrap().counts.sourced, 12);

        let results = store.get_results(&run.run_id, 10).unwrap();
        assert_eq!(
            results.meta.modes.source_query_mode,
            SourceQueryMode::Broad
        );
        assert_eq!(
            results.meta.diagnostics.unwrap().stage_errors[0].top_messages[0].message,
            "LinkedIn API error (429)"
        );
    }

    #[test]
    fn verification_queue_orders_and_filters() {
        let store = test_store();
        let run = begin(&store, "k");
        for (i, (priority, score)) in [(80i64, 0.9), (20, 0.7), (80, 0.95)].iter().enumerate() {
            let candidate = store
                .upsert_candidate(&SourcedCandidate {
                    provider_id: Some(format!("p{}", i)),
                    ..SourcedCandidate::default()
                })
                .unwrap();
            store
                .upsert_score(&candidate.id, &run.run_id, &sample_score(*score, true))
                .unwrap();
            store
                .upsert_review_status(
                    &candidate.id,
                    &run.run_id,
                    ReviewState::UnderVerification,
                    None,
                    Some(*priority),
                )
                .unwrap();
        }

        let all = store.get_verification_queue(&run.run_id, 10, false).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].candidate.id, "li:p2"); // priority 80, score 0.95
        assert_eq!(all[1].candidate.id, "li:p0"); // priority 80, score 0.9
        assert_eq!(all[2].candidate.id, "li:p1");

        let high = store.get_verification_queue(&run.run_id, 10, true).unwrap();
        assert_eq!(high.len(), 2);
    }

    #[test]
    fn promotion_moves_review_to_shortlist_in_one_transaction() {
        let store = test_store();
        let run = begin(&store, "k");
        let candidate = store.upsert_candidate(&alice()).unwrap();
        assert!(!store.has_promotion(&candidate.id, &run.run_id).unwrap());

        store
            .insert_promotion(&Promotion {
                candidate_id: candidate.id.clone(),
                run_id: run.run_id.clone(),
                promotion_reason: "Strong OSS evidence".to_string(),
                confidence_override: None,
                outreach_angle: None,
                proof_links: vec![
                    "https://github.com/alice".to_string(),
                    "https://alice.dev".to_string(),
                ],
                promoted_at: 0,
            })
            .unwrap();

        assert!(store.has_promotion(&candidate.id, &run.run_id).unwrap());
        let review = store.get_review(&candidate.id, &run.run_id).unwrap().unwrap();
        assert_eq!(review.status, ReviewState::PromotedShortlist);
    }

    #[test]
    fn daily_stats_windows() {
        let store = test_store();
        let run = begin(&store, "k");
        let candidate = store.upsert_candidate(&alice()).unwrap();
        store
            .upsert_review_status(
                &candidate.id,
                &run.run_id,
                ReviewState::UnderVerification,
                None,
                None,
            )
            .unwrap();
        store
            .insert_verification(&Verification {
                candidate_id: candidate.id.clone(),
                run_id: run.run_id.clone(),
                method: VerificationMethod::Browser,
                outcome: VerificationOutcome::Confirmed,
                confidence_before: 0.82,
                confidence_after: 0.95,
                proof_links: vec!["https://github.com/alice".to_string()],
                notes: None,
                created_at: 0,
            })
            .unwrap();

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let workflow = store.get_workflow_stats(&run.run_id, &today).unwrap();
        assert_eq!(workflow.under_verification, 1);

        let verification = store.get_verification_stats(&run.run_id, &today).unwrap();
        assert_eq!(verification.submitted, 1);
        assert_eq!(verification.confirmed, 1);

        let quotas = crate::config::DailyQuotaConfig::default();
        let quota = store.get_quota_status(&run.run_id, &today, &quotas).unwrap();
        assert_eq!(quota.reviewed.actual, 1);
        assert_eq!(quota.verification_budget.actual, 1);
        assert!(!quota.promoted.met);

        // Empty window the day before.
        let yesterday = store.get_workflow_stats(&run.run_id, "2020-01-01").unwrap();
        assert_eq!(yesterday.under_verification, 0);
    }
}

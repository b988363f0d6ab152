use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use lifeform_core::{LifeformState, Memory, Mood, Question, QuestionStatus, Reflection};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Fixed key of the singleton state row.
pub const LIFEFORM_STATE_ID: i64 = 1;

/// How long a writer waits for the SQLite write lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

const QUESTION_COLUMNS: &str = "id, text, status, created_at";
const MEMORY_COLUMNS: &str = "id, question_id, reply_text, created_at";
const REFLECTION_COLUMNS: &str = "id, question_id, text, created_at";
const STATE_COLUMNS: &str = "mood, curiosity, last_reflected_at, revision";

/// Durable store for questions, memories, reflections and the lifeform state.
///
/// Structural guarantees live in the schema:
/// - at most one `pending` question (partial unique index)
/// - exactly one state row (`CHECK (id = 1)`), curiosity within [0, 1]
/// - one memory per question, one reflection per memory
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

/// An answered question with its reply and (once reflected) its reflection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub question: Question,
    pub reply: String,
    pub reflection: Option<String>,
    pub answered_at: DateTime<Utc>,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path`. `":memory:"` gives a private
    /// in-memory database backed by a single connection.
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let in_memory = path.as_os_str() == ":memory:";

        let pool = if in_memory {
            let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
            // Every connection to :memory: is a separate database, so keep exactly one alive.
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await
                .context("Failed to open in-memory SQLite database")?
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create database directory {}", parent.display())
                    })?;
                }
            }
            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .busy_timeout(BUSY_TIMEOUT)
                .foreign_keys(true);
            SqlitePoolOptions::new()
                .max_connections(8)
                .connect_with(options)
                .await
                .context("Failed to connect to SQLite database")?
        };

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        let statements: [(&str, &str); 8] = [
            (
                "questions table",
                r#"
                CREATE TABLE IF NOT EXISTS questions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    text TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'pending'
                        CHECK (status IN ('pending', 'answered')),
                    created_at INTEGER NOT NULL
                );
                "#,
            ),
            // At most one pending question, ever
            (
                "single pending index",
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_questions_single_pending \
                 ON questions(status) WHERE status = 'pending'",
            ),
            (
                "questions created_at index",
                "CREATE INDEX IF NOT EXISTS idx_questions_created_at ON questions(created_at)",
            ),
            (
                "memories table",
                r#"
                CREATE TABLE IF NOT EXISTS memories (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    question_id INTEGER NOT NULL UNIQUE REFERENCES questions(id),
                    reply_text TEXT NOT NULL,
                    created_at INTEGER NOT NULL
                );
                "#,
            ),
            // A reflection can only exist for a question that has a memory
            (
                "reflections table",
                r#"
                CREATE TABLE IF NOT EXISTS reflections (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    question_id INTEGER NOT NULL UNIQUE REFERENCES memories(question_id),
                    text TEXT NOT NULL,
                    created_at INTEGER NOT NULL
                );
                "#,
            ),
            (
                "reflections created_at index",
                "CREATE INDEX IF NOT EXISTS idx_reflections_created_at ON reflections(created_at)",
            ),
            (
                "lifeform_state table",
                r#"
                CREATE TABLE IF NOT EXISTS lifeform_state (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    mood TEXT NOT NULL
                        CHECK (mood IN ('curious', 'playful', 'thoughtful', 'grounded', 'radiant')),
                    curiosity REAL NOT NULL CHECK (curiosity >= 0.0 AND curiosity <= 1.0),
                    last_reflected_at INTEGER,
                    revision INTEGER NOT NULL DEFAULT 0
                );
                "#,
            ),
            (
                "memories created_at index",
                "CREATE INDEX IF NOT EXISTS idx_memories_created_at ON memories(created_at)",
            ),
        ];

        for (name, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to create {}", name))?;
        }

        tracing::debug!("Store schema ready");
        Ok(())
    }

    /// Start a unit of work. Nothing it writes is visible until `commit`;
    /// dropping it rolls back.
    pub async fn begin(&self) -> Result<UnitOfWork> {
        let tx = self.pool.begin().await.context("Failed to begin transaction")?;
        Ok(UnitOfWork { tx })
    }

    // =========================================================================
    // Lifeform state
    // =========================================================================

    /// Create the singleton state row if missing, then return it.
    pub async fn ensure_lifeform(&self) -> Result<LifeformState> {
        let defaults = LifeformState::default();
        sqlx::query(
            "INSERT INTO lifeform_state (id, mood, curiosity, last_reflected_at, revision) \
             VALUES (?, ?, ?, NULL, 0) ON CONFLICT(id) DO NOTHING",
        )
        .bind(LIFEFORM_STATE_ID)
        .bind(defaults.mood.as_str())
        .bind(defaults.curiosity)
        .execute(&self.pool)
        .await
        .context("Failed to ensure lifeform state")?;

        self.load_lifeform()
            .await?
            .context("Lifeform state missing right after ensure")
    }

    pub async fn load_lifeform(&self) -> Result<Option<LifeformState>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM lifeform_state WHERE id = ?",
            STATE_COLUMNS
        ))
        .bind(LIFEFORM_STATE_ID)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query lifeform_state")?;

        row.as_ref().map(row_to_state).transpose()
    }

    // =========================================================================
    // Questions
    // =========================================================================

    /// The oldest pending question (there is at most one).
    pub async fn pending_question(&self) -> Result<Option<Question>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM questions WHERE status = 'pending' \
             ORDER BY created_at ASC, id ASC LIMIT 1",
            QUESTION_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query pending question")?;

        row.as_ref().map(row_to_question).transpose()
    }

    pub async fn get_question(&self, id: i64) -> Result<Option<Question>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM questions WHERE id = ?",
            QUESTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query question")?;

        row.as_ref().map(row_to_question).transpose()
    }

    /// Insert a pending question unless one already exists.
    ///
    /// A single statement: the unique index makes "check, else create" atomic.
    /// Returns `None` when another pending question won the race.
    pub async fn insert_pending_question(
        &self,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Question>> {
        let row = sqlx::query(&format!(
            "INSERT INTO questions (text, status, created_at) VALUES (?, 'pending', ?) \
             ON CONFLICT DO NOTHING RETURNING {}",
            QUESTION_COLUMNS
        ))
        .bind(text)
        .bind(now.timestamp_millis())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to insert question")?;

        row.as_ref().map(row_to_question).transpose()
    }

    pub async fn count_pending_questions(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM questions WHERE status = 'pending'")
            .await
    }

    pub async fn count_questions(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM questions").await
    }

    // =========================================================================
    // Memories & reflections
    // =========================================================================

    pub async fn count_memories(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM memories").await
    }

    pub async fn count_reflections(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM reflections").await
    }

    pub async fn memory_for(&self, question_id: i64) -> Result<Option<Memory>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM memories WHERE question_id = ?",
            MEMORY_COLUMNS
        ))
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query memory")?;

        row.as_ref().map(row_to_memory).transpose()
    }

    pub async fn reflection_for(&self, question_id: i64) -> Result<Option<Reflection>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM reflections WHERE question_id = ?",
            REFLECTION_COLUMNS
        ))
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query reflection")?;

        row.as_ref().map(row_to_reflection).transpose()
    }

    pub async fn latest_reflection(&self) -> Result<Option<Reflection>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM reflections ORDER BY created_at DESC, id DESC LIMIT 1",
            REFLECTION_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query latest reflection")?;

        row.as_ref().map(row_to_reflection).transpose()
    }

    /// Memories whose reflection never got written, oldest first.
    pub async fn unreflected_memories(&self) -> Result<Vec<(Question, Memory)>> {
        let rows = sqlx::query(
            "SELECT q.id AS q_id, q.text AS q_text, q.status AS q_status, q.created_at AS q_created_at, \
                    m.id, m.question_id, m.reply_text, m.created_at \
             FROM memories m \
             JOIN questions q ON q.id = m.question_id \
             LEFT JOIN reflections r ON r.question_id = m.question_id \
             WHERE r.id IS NULL \
             ORDER BY m.created_at ASC, m.id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to query unreflected memories")?;

        rows.iter()
            .map(|row| {
                let question = Question {
                    id: row.try_get("q_id")?,
                    text: row.try_get("q_text")?,
                    status: parse_status(row.try_get("q_status")?)?,
                    created_at: from_millis(row.try_get("q_created_at")?),
                };
                Ok((question, row_to_memory(row)?))
            })
            .collect()
    }

    /// Most recent answered questions with their replies, newest first.
    pub async fn recent_history(&self, limit: u32) -> Result<Vec<HistoryEntry>> {
        let rows = sqlx::query(
            "SELECT q.id, q.text, q.status, q.created_at, \
                    m.reply_text, m.created_at AS answered_at, r.text AS reflection \
             FROM questions q \
             JOIN memories m ON m.question_id = q.id \
             LEFT JOIN reflections r ON r.question_id = q.id \
             ORDER BY m.created_at DESC, m.id DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .context("Failed to query history")?;

        rows.iter()
            .map(|row| {
                Ok(HistoryEntry {
                    question: row_to_question(row)?,
                    reply: row.try_get("reply_text")?,
                    reflection: row.try_get("reflection")?,
                    answered_at: from_millis(row.try_get("answered_at")?),
                })
            })
            .collect()
    }

    async fn count(&self, sql: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(sql)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to run count: {}", sql))?;
        Ok(count)
    }
}

// =============================================================================
// Unit of work
// =============================================================================

/// One atomic batch of writes.
///
/// Every write path starts with a write statement so SQLite takes the write
/// lock up front; reads that follow see the latest committed data.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

impl UnitOfWork {
    /// Flip a question from pending to answered, guarded by its prior status.
    ///
    /// Returns `None` when the question is unknown or no longer pending.
    pub async fn answer_question(&mut self, id: i64) -> Result<Option<Question>> {
        let row = sqlx::query(&format!(
            "UPDATE questions SET status = 'answered' \
             WHERE id = ? AND status = 'pending' RETURNING {}",
            QUESTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .context("Failed to answer question")?;

        row.as_ref().map(row_to_question).transpose()
    }

    pub async fn insert_memory(
        &mut self,
        question_id: i64,
        reply_text: &str,
        now: DateTime<Utc>,
    ) -> Result<Memory> {
        let row = sqlx::query(&format!(
            "INSERT INTO memories (question_id, reply_text, created_at) VALUES (?, ?, ?) \
             RETURNING {}",
            MEMORY_COLUMNS
        ))
        .bind(question_id)
        .bind(reply_text)
        .bind(now.timestamp_millis())
        .fetch_one(&mut *self.tx)
        .await
        .context("Failed to insert memory")?;

        row_to_memory(&row)
    }

    /// Insert the reflection for a question. `None` if one already exists.
    pub async fn insert_reflection(
        &mut self,
        question_id: i64,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Reflection>> {
        let row = sqlx::query(&format!(
            "INSERT INTO reflections (question_id, text, created_at) VALUES (?, ?, ?) \
             ON CONFLICT(question_id) DO NOTHING RETURNING {}",
            REFLECTION_COLUMNS
        ))
        .bind(question_id)
        .bind(text)
        .bind(now.timestamp_millis())
        .fetch_optional(&mut *self.tx)
        .await
        .context("Failed to insert reflection")?;

        row.as_ref().map(row_to_reflection).transpose()
    }

    pub async fn load_lifeform(&mut self) -> Result<LifeformState> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM lifeform_state WHERE id = ?",
            STATE_COLUMNS
        ))
        .bind(LIFEFORM_STATE_ID)
        .fetch_optional(&mut *self.tx)
        .await
        .context("Failed to query lifeform_state")?;

        match row {
            Some(row) => row_to_state(&row),
            None => anyhow::bail!("lifeform state row is missing"),
        }
    }

    /// Write mood/curiosity/last_reflected_at and bump the revision.
    pub async fn save_lifeform(&mut self, state: &LifeformState) -> Result<LifeformState> {
        let row = sqlx::query(&format!(
            "UPDATE lifeform_state \
             SET mood = ?, curiosity = ?, last_reflected_at = ?, revision = revision + 1 \
             WHERE id = ? RETURNING {}",
            STATE_COLUMNS
        ))
        .bind(state.mood.as_str())
        .bind(state.curiosity)
        .bind(state.last_reflected_at.map(|t| t.timestamp_millis()))
        .bind(LIFEFORM_STATE_ID)
        .fetch_optional(&mut *self.tx)
        .await
        .context("Failed to save lifeform state")?;

        match row {
            Some(row) => row_to_state(&row),
            None => anyhow::bail!("lifeform state row is missing"),
        }
    }

    /// Replace the text of the pending question in place. `None` if nothing is pending.
    pub async fn rewrite_pending_question(
        &mut self,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Question>> {
        let row = sqlx::query(&format!(
            "UPDATE questions SET text = ?, created_at = ? WHERE status = 'pending' RETURNING {}",
            QUESTION_COLUMNS
        ))
        .bind(text)
        .bind(now.timestamp_millis())
        .fetch_optional(&mut *self.tx)
        .await
        .context("Failed to rewrite pending question")?;

        row.as_ref().map(row_to_question).transpose()
    }

    pub async fn insert_pending_question(
        &mut self,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Question>> {
        let row = sqlx::query(&format!(
            "INSERT INTO questions (text, status, created_at) VALUES (?, 'pending', ?) \
             ON CONFLICT DO NOTHING RETURNING {}",
            QUESTION_COLUMNS
        ))
        .bind(text)
        .bind(now.timestamp_millis())
        .fetch_optional(&mut *self.tx)
        .await
        .context("Failed to insert question")?;

        row.as_ref().map(row_to_question).transpose()
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.context("Failed to commit transaction")
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx
            .rollback()
            .await
            .context("Failed to roll back transaction")
    }
}

// =============================================================================
// Row mapping
// =============================================================================

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}

fn parse_status(raw: String) -> Result<QuestionStatus> {
    raw.parse::<QuestionStatus>().map_err(anyhow::Error::msg)
}

fn row_to_question(row: &SqliteRow) -> Result<Question> {
    Ok(Question {
        id: row.try_get("id")?,
        text: row.try_get("text")?,
        status: parse_status(row.try_get("status")?)?,
        created_at: from_millis(row.try_get("created_at")?),
    })
}

fn row_to_memory(row: &SqliteRow) -> Result<Memory> {
    Ok(Memory {
        id: row.try_get("id")?,
        question_id: row.try_get("question_id")?,
        reply_text: row.try_get("reply_text")?,
        created_at: from_millis(row.try_get("created_at")?),
    })
}

fn row_to_reflection(row: &SqliteRow) -> Result<Reflection> {
    Ok(Reflection {
        id: row.try_get("id")?,
        question_id: row.try_get("question_id")?,
        text: row.try_get("text")?,
        created_at: from_millis(row.try_get("created_at")?),
    })
}

fn row_to_state(row: &SqliteRow) -> Result<LifeformState> {
    let mood: String = row.try_get("mood")?;
    let last: Option<i64> = row.try_get("last_reflected_at")?;
    Ok(LifeformState {
        mood: mood.parse::<Mood>().map_err(anyhow::Error::msg)?,
        curiosity: row.try_get("curiosity")?,
        last_reflected_at: last.map(from_millis),
        revision: row.try_get("revision")?,
    })
}

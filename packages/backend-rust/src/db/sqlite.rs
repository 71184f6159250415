use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use studysense_signals::EmotionalState;

use super::schema::{split_sql_statements, SCHEMA_SQL, SCHEMA_VERSION};
use super::{
    Course, Enrollment, LearnerProfile, LearningStore, LearningTx, StoreError, TelemetryRecord,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreInitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// SQLite-backed store over a small connection pool.
///
/// [`LearningStore::begin`] takes the database write lock before it returns,
/// so write transactions are serialised across all learners, not just per
/// learner. A writer waits on the busy timeout (30s) for the one ahead of it.
/// Read transactions from [`LearningStore::begin_read`] never wait on writers.
#[derive(Clone)]
pub struct SqliteLearningStore {
    pool: SqlitePool,
}

impl SqliteLearningStore {
    /// Open (creating if needed) the database file and apply the schema.
    pub async fn open(path: &Path) -> Result<Self, StoreInitError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", path.display());
        let options = SqliteConnectOptions::from_str(&db_url)
            .map_err(|e| StoreInitError::Config(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        tracing::info!(path = %path.display(), "sqlite store ready");
        Ok(store)
    }

    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    pub async fn schema_version(&self) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar(r#"SELECT "value" FROM "_db_metadata" WHERE "key" = 'schema_version'"#)
            .fetch_optional(&self.pool)
            .await
    }

    async fn migrate(&self) -> Result<(), StoreInitError> {
        if self.schema_version().await.ok().flatten().is_some() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for stmt in split_sql_statements(SCHEMA_SQL) {
            sqlx::query(&stmt).execute(&mut *tx).await?;
        }
        sqlx::query(
            r#"INSERT OR REPLACE INTO "_db_metadata" ("key", "value") VALUES ('schema_version', $1)"#,
        )
        .bind(SCHEMA_VERSION)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(version = SCHEMA_VERSION, "sqlite schema applied");
        Ok(())
    }
}

pub struct SqliteTx {
    tx: Transaction<'static, Sqlite>,
}

impl LearningStore for SqliteLearningStore {
    type Tx = SqliteTx;

    async fn begin(&self) -> Result<SqliteTx, StoreError> {
        let mut tx = self.pool.begin().await?;
        // A no-op write takes the RESERVED lock now, so the read-modify-write
        // that follows never has to upgrade a shared lock.
        sqlx::query(r#"UPDATE "_db_metadata" SET "value" = "value" WHERE 0"#)
            .execute(&mut *tx)
            .await?;
        Ok(SqliteTx { tx })
    }

    async fn begin_read(&self) -> Result<SqliteTx, StoreError> {
        Ok(SqliteTx {
            tx: self.pool.begin().await?,
        })
    }
}

fn parse_state(raw: &str) -> Result<EmotionalState, StoreError> {
    EmotionalState::parse(raw).ok_or_else(|| StoreError::Corrupt(format!("emotional state {raw:?}")))
}

fn map_profile(row: &SqliteRow) -> Result<LearnerProfile, StoreError> {
    let state: String = row.try_get("emotionalState")?;
    Ok(LearnerProfile {
        learner_id: row.try_get("id")?,
        name: row.try_get("name")?,
        cognitive_capacity: row.try_get("cognitiveCapacity")?,
        active_course_id: row.try_get("activeCourseId")?,
        overall_progress: row.try_get("overallProgress")?,
        emotional_state: parse_state(&state)?,
        created_at: row.try_get::<DateTime<Utc>, _>("createdAt")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updatedAt")?,
    })
}

fn map_course(row: &SqliteRow) -> Result<Course, StoreError> {
    Ok(Course {
        course_id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        difficulty: row.try_get("difficulty")?,
        duration_minutes: row.try_get("durationMinutes")?,
        created_at: row.try_get("createdAt")?,
    })
}

fn map_enrollment(row: &SqliteRow) -> Result<Enrollment, StoreError> {
    Ok(Enrollment {
        learner_id: row.try_get("learnerId")?,
        course_id: row.try_get("courseId")?,
        course_progress: row.try_get("courseProgress")?,
        time_spent_minutes: row.try_get("timeSpentMinutes")?,
        started_at: row.try_get("startedAt")?,
        updated_at: row.try_get("updatedAt")?,
    })
}

fn map_telemetry(row: &SqliteRow) -> Result<TelemetryRecord, StoreError> {
    let state: String = row.try_get("emotionalState")?;
    Ok(TelemetryRecord {
        id: row.try_get("id")?,
        learner_id: row.try_get("learnerId")?,
        course_id: row.try_get("courseId")?,
        recorded_at: row.try_get("recordedAt")?,
        gaze_score: row.try_get("gazeScore")?,
        attention_score: row.try_get("attentionScore")?,
        cognitive_load: row.try_get("cognitiveLoad")?,
        emotional_state: parse_state(&state)?,
        engagement: row.try_get("engagement")?,
        elapsed_minutes: row.try_get("elapsedMinutes")?,
        progress_snapshot: row.try_get("progressSnapshot")?,
    })
}

const PROFILE_COLUMNS: &str = r#""id", "name", "cognitiveCapacity", "activeCourseId", "overallProgress", "emotionalState", "createdAt", "updatedAt""#;
const ENROLLMENT_COLUMNS: &str =
    r#""learnerId", "courseId", "courseProgress", "timeSpentMinutes", "startedAt", "updatedAt""#;

impl LearningTx for SqliteTx {
    async fn load_profile(&mut self, learner_id: &str) -> Result<Option<LearnerProfile>, StoreError> {
        let sql = format!(r#"SELECT {PROFILE_COLUMNS} FROM "learner_profiles" WHERE "id" = $1"#);
        let row = sqlx::query(&sql)
            .bind(learner_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(map_profile).transpose()
    }

    async fn list_profiles(&mut self) -> Result<Vec<LearnerProfile>, StoreError> {
        let sql = format!(r#"SELECT {PROFILE_COLUMNS} FROM "learner_profiles" ORDER BY rowid"#);
        let rows = sqlx::query(&sql).fetch_all(&mut *self.tx).await?;
        rows.iter().map(map_profile).collect()
    }

    async fn insert_profile(&mut self, profile: &LearnerProfile) -> Result<(), StoreError> {
        let sql = format!(
            r#"INSERT INTO "learner_profiles" ({PROFILE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#
        );
        sqlx::query(&sql)
            .bind(&profile.learner_id)
            .bind(&profile.name)
            .bind(profile.cognitive_capacity)
            .bind(&profile.active_course_id)
            .bind(profile.overall_progress)
            .bind(profile.emotional_state.as_str())
            .bind(profile.created_at)
            .bind(profile.updated_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn update_profile(&mut self, profile: &LearnerProfile) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE "learner_profiles"
            SET "name" = $2,
                "cognitiveCapacity" = $3,
                "activeCourseId" = $4,
                "overallProgress" = $5,
                "emotionalState" = $6,
                "updatedAt" = $7
            WHERE "id" = $1
            "#,
        )
        .bind(&profile.learner_id)
        .bind(&profile.name)
        .bind(profile.cognitive_capacity)
        .bind(&profile.active_course_id)
        .bind(profile.overall_progress)
        .bind(profile.emotional_state.as_str())
        .bind(profile.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("learner {}", profile.learner_id)));
        }
        Ok(())
    }

    async fn course_exists(&mut self, course_id: &str) -> Result<bool, StoreError> {
        let found: Option<i64> = sqlx::query_scalar(r#"SELECT 1 FROM "courses" WHERE "id" = $1"#)
            .bind(course_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(found.is_some())
    }

    async fn list_courses(&mut self) -> Result<Vec<Course>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT "id", "title", "description", "difficulty", "durationMinutes", "createdAt"
            FROM "courses"
            ORDER BY rowid
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await?;
        rows.iter().map(map_course).collect()
    }

    async fn insert_course(&mut self, course: &Course) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO "courses" ("id", "title", "description", "difficulty", "durationMinutes", "createdAt")
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&course.course_id)
        .bind(&course.title)
        .bind(&course.description)
        .bind(&course.difficulty)
        .bind(course.duration_minutes)
        .bind(course.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn get_or_create_enrollment(
        &mut self,
        learner_id: &str,
        course_id: &str,
    ) -> Result<Enrollment, StoreError> {
        let fresh = Enrollment::new(learner_id, course_id);
        sqlx::query(
            r#"
            INSERT INTO "enrollments" ("learnerId", "courseId", "courseProgress", "timeSpentMinutes", "startedAt", "updatedAt")
            VALUES ($1, $2, 0, 0, $3, $3)
            ON CONFLICT ("learnerId", "courseId") DO NOTHING
            "#,
        )
        .bind(learner_id)
        .bind(course_id)
        .bind(fresh.started_at)
        .execute(&mut *self.tx)
        .await?;

        let sql = format!(
            r#"SELECT {ENROLLMENT_COLUMNS} FROM "enrollments" WHERE "learnerId" = $1 AND "courseId" = $2"#
        );
        let row = sqlx::query(&sql)
            .bind(learner_id)
            .bind(course_id)
            .fetch_one(&mut *self.tx)
            .await?;
        map_enrollment(&row)
    }

    async fn update_enrollment(&mut self, enrollment: &Enrollment) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE "enrollments"
            SET "courseProgress" = $3, "timeSpentMinutes" = $4, "updatedAt" = $5
            WHERE "learnerId" = $1 AND "courseId" = $2
            "#,
        )
        .bind(&enrollment.learner_id)
        .bind(&enrollment.course_id)
        .bind(enrollment.course_progress)
        .bind(enrollment.time_spent_minutes)
        .bind(enrollment.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!(
                "enrollment {}/{}",
                enrollment.learner_id, enrollment.course_id
            )));
        }
        Ok(())
    }

    async fn list_enrollments(&mut self, learner_id: &str) -> Result<Vec<Enrollment>, StoreError> {
        let sql = format!(
            r#"SELECT {ENROLLMENT_COLUMNS} FROM "enrollments" WHERE "learnerId" = $1 ORDER BY rowid"#
        );
        let rows = sqlx::query(&sql)
            .bind(learner_id)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.iter().map(map_enrollment).collect()
    }

    async fn append_telemetry(&mut self, record: &TelemetryRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO "telemetry_records" (
                "id",
                "learnerId",
                "courseId",
                "recordedAt",
                "gazeScore",
                "attentionScore",
                "cognitiveLoad",
                "emotionalState",
                "engagement",
                "elapsedMinutes",
                "progressSnapshot"
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
            "#,
        )
        .bind(&record.id)
        .bind(&record.learner_id)
        .bind(&record.course_id)
        .bind(record.recorded_at)
        .bind(record.gaze_score)
        .bind(record.attention_score)
        .bind(record.cognitive_load)
        .bind(record.emotional_state.as_str())
        .bind(record.engagement)
        .bind(record.elapsed_minutes)
        .bind(record.progress_snapshot)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn recent_telemetry(
        &mut self,
        learner_id: &str,
        limit: u32,
    ) -> Result<Vec<TelemetryRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT "id", "learnerId", "courseId", "recordedAt", "gazeScore", "attentionScore",
                   "cognitiveLoad", "emotionalState", "engagement", "elapsedMinutes", "progressSnapshot"
            FROM "telemetry_records"
            WHERE "learnerId" = $1
            ORDER BY rowid DESC
            LIMIT $2
            "#,
        )
        .bind(learner_id)
        .bind(i64::from(limit))
        .fetch_all(&mut *self.tx)
        .await?;
        rows.iter().map(map_telemetry).collect()
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use uuid::Uuid;

use super::{StoreError, SubjectStore};
use crate::domain::subject::{ContactAddress, Subject, SubjectId, SubjectProfile};
use crate::utils::{retry_with_backoff, RetryConfig};

// ============================================================================
// Postgres Subject Store
// ============================================================================
//
// Uniqueness is owned by the `UNIQUE (contact_address)` constraint, so two
// racing inserts for one address cannot both commit regardless of what the
// orchestrator's pre-check observed.
//
// ============================================================================

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS subjects (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    contact_address TEXT NOT NULL,
    date_of_birth DATE NOT NULL,
    postal_address TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT subjects_contact_address_key UNIQUE (contact_address)
)";

const COLUMNS: &str = "id, name, contact_address, date_of_birth, postal_address";

pub struct PgSubjectStore {
    pool: PgPool,
}

impl PgSubjectStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with startup backoff; the database may still be booting.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = retry_with_backoff(RetryConfig::startup(), "postgres_connect", |_attempt| {
            PgPoolOptions::new().max_connections(10).connect(database_url)
        })
        .await
        .into_result()?;

        Ok(Self::new(pool))
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        tracing::info!("Subject schema ready");
        Ok(())
    }

    fn map_write_error(err: sqlx::Error, address: &ContactAddress) -> StoreError {
        match err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::DuplicateAddress(address.clone())
            }
            other => StoreError::Database(other),
        }
    }
}

fn require_row<R>(row: Option<R>, id: SubjectId) -> Result<R, StoreError> {
    row.ok_or(StoreError::NotFound(id))
}

fn require_affected(rows_affected: u64, id: SubjectId) -> Result<(), StoreError> {
    if rows_affected == 0 {
        return Err(StoreError::NotFound(id));
    }
    Ok(())
}

fn subject_from_row(row: &PgRow) -> Result<Subject, StoreError> {
    Ok(Subject {
        id: SubjectId(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        contact_address: ContactAddress::new(row.try_get::<String, _>("contact_address")?),
        date_of_birth: row.try_get::<NaiveDate, _>("date_of_birth")?,
        postal_address: row.try_get("postal_address")?,
    })
}

#[async_trait]
impl SubjectStore for PgSubjectStore {
    async fn find_all(&self) -> Result<Vec<Subject>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {COLUMNS} FROM subjects ORDER BY created_at, id"))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(subject_from_row).collect()
    }

    async fn find_by_id(&self, id: SubjectId) -> Result<Option<Subject>, StoreError> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM subjects WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(subject_from_row).transpose()
    }

    async fn exists_by_address(&self, address: &ContactAddress) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM subjects WHERE contact_address = $1)",
        )
        .bind(address.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn exists_by_address_excluding(
        &self,
        address: &ContactAddress,
        id: SubjectId,
    ) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM subjects WHERE contact_address = $1 AND id <> $2)",
        )
        .bind(address.as_str())
        .bind(id.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn save(&self, id: Option<SubjectId>, profile: SubjectProfile) -> Result<Subject, StoreError> {
        let row = match id {
            None => {
                let id = SubjectId::generate();
                sqlx::query(&format!(
                    "INSERT INTO subjects ({COLUMNS}) VALUES ($1, $2, $3, $4, $5) RETURNING {COLUMNS}"
                ))
                .bind(id.as_uuid())
                .bind(profile.name())
                .bind(profile.contact_address().as_str())
                .bind(profile.date_of_birth())
                .bind(profile.postal_address())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| Self::map_write_error(e, profile.contact_address()))?
            }
            Some(id) => sqlx::query(&format!(
                "UPDATE subjects SET name = $2, contact_address = $3, date_of_birth = $4, \
                 postal_address = $5 WHERE id = $1 RETURNING {COLUMNS}"
            ))
            .bind(id.as_uuid())
            .bind(profile.name())
            .bind(profile.contact_address().as_str())
            .bind(profile.date_of_birth())
            .bind(profile.postal_address())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Self::map_write_error(e, profile.contact_address()))
            .and_then(|row| require_row(row, id))?,
        };

        subject_from_row(&row)
    }

    async fn delete_by_id(&self, id: SubjectId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM subjects WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        require_affected(result.rows_affected(), id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::fmt;

    #[derive(Debug)]
    struct FakeDbError {
        unique: bool,
    }

    impl fmt::Display for FakeDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "fake database error (unique violation: {})", self.unique)
        }
    }

    impl std::error::Error for FakeDbError {}

    impl DatabaseError for FakeDbError {
        fn message(&self) -> &str {
            "fake database error"
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            if self.unique {
                ErrorKind::UniqueViolation
            } else {
                ErrorKind::Other
            }
        }
    }

    #[test]
    fn test_unique_violation_maps_to_duplicate_address() {
        let address = ContactAddress::new("john.doe@example.com");
        let err = sqlx::Error::Database(Box::new(FakeDbError { unique: true }));

        let mapped = PgSubjectStore::map_write_error(err, &address);

        assert!(matches!(mapped, StoreError::DuplicateAddress(a) if a == address));
    }

    #[test]
    fn test_other_write_errors_stay_database_errors() {
        let address = ContactAddress::new("john.doe@example.com");

        let other_db = sqlx::Error::Database(Box::new(FakeDbError { unique: false }));
        assert!(matches!(
            PgSubjectStore::map_write_error(other_db, &address),
            StoreError::Database(_)
        ));
        assert!(matches!(
            PgSubjectStore::map_write_error(sqlx::Error::PoolTimedOut, &address),
            StoreError::Database(_)
        ));
    }

    #[test]
    fn test_missing_rows_map_to_not_found() {
        let id = SubjectId::generate();

        assert!(matches!(require_row::<()>(None, id), Err(StoreError::NotFound(found)) if found == id));
        assert!(require_row(Some(()), id).is_ok());
        assert!(matches!(require_affected(0, id), Err(StoreError::NotFound(found)) if found == id));
        assert!(require_affected(1, id).is_ok());
    }

    /// Needs a live database: REGISTRY_TEST_DATABASE_URL=postgres://... cargo test -- --ignored
    #[tokio::test]
    #[ignore]
    async fn test_live_constraint_and_not_found() {
        let Ok(url) = std::env::var("REGISTRY_TEST_DATABASE_URL") else {
            return;
        };
        let store = PgSubjectStore::connect(&url).await.unwrap();
        store.ensure_schema().await.unwrap();

        let address = format!("{}@example.com", SubjectId::generate());
        let profile = SubjectProfile::new(
            "John Doe",
            address.clone(),
            NaiveDate::from_ymd_opt(1990, 1, 15).unwrap(),
            "123 Main St",
        )
        .unwrap();

        let subject = store.save(None, profile.clone()).await.unwrap();
        assert!(matches!(
            store.save(None, profile.clone()).await,
            Err(StoreError::DuplicateAddress(_))
        ));

        let missing = SubjectId::generate();
        assert!(matches!(store.save(Some(missing), profile).await, Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete_by_id(missing).await, Err(StoreError::NotFound(_))));

        store.delete_by_id(subject.id).await.unwrap();
    }
}

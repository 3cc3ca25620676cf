//! Postgres store implementation
//!
//! Provides:
//! - SeaORM entity models
//! - Connection pool management (primary + optional read replica)
//! - The production `Store` implementation

pub mod entities;

use std::collections::HashSet;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection,
    DbBackend, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement,
    TransactionTrait,
};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use crate::models::{
    DuplicateGroup, GroupMember, GroupStatus, IgnoredSignature, Page, ScanSnapshot, Student,
    StudentPatch,
};

use super::Store;
use entities::*;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    /// Primary connection (for writes)
    pub primary: DatabaseConnection,

    /// Read replica connection (optional)
    pub replica: Option<DatabaseConnection>,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to primary database...");

        let primary = Database::connect(Self::options(&config.url, config))
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect to primary: {}", e),
            })?;

        let replica = if let Some(ref read_url) = config.read_url {
            info!("Connecting to read replica...");
            let replica_conn = Database::connect(Self::options(read_url, config))
                .await
                .map_err(|e| AppError::DatabaseConnection {
                    message: format!("Failed to connect to replica: {}", e),
                })?;
            Some(replica_conn)
        } else {
            None
        };

        info!("Database connections established");

        Ok(Self { primary, replica })
    }

    fn options(url: &str, config: &DatabaseConfig) -> ConnectOptions {
        let mut opts = ConnectOptions::new(url);
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(true);
        opts
    }

    /// Get the connection for reads (replica if available, otherwise primary)
    pub fn read(&self) -> &DatabaseConnection {
        self.replica.as_ref().unwrap_or(&self.primary)
    }

    /// Get the connection for writes (always primary)
    pub fn write(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        self.primary
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Primary ping failed: {}", e),
            })?;

        if let Some(ref replica) = self.replica {
            replica
                .execute_unprepared("SELECT 1")
                .await
                .map_err(|e| AppError::DatabaseConnection {
                    message: format!("Replica ping failed: {}", e),
                })?;
        }

        Ok(())
    }
}

/// Production store over Postgres
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    async fn count_students(&self) -> Result<u64> {
        EtudiantEntity::find()
            .filter(EtudiantColumn::Active.eq(true))
            .count(self.pool.read())
            .await
            .map_err(Into::into)
    }

    async fn list_students(&self, offset: u64, limit: u64) -> Result<Vec<Student>> {
        let models = EtudiantEntity::find()
            .filter(EtudiantColumn::Active.eq(true))
            .order_by_asc(EtudiantColumn::Id)
            .offset(offset)
            .limit(limit)
            .all(self.pool.read())
            .await?;
        Ok(models.into_iter().map(Student::from).collect())
    }

    async fn find_student(&self, id: Uuid) -> Result<Option<Student>> {
        let model = EtudiantEntity::find_by_id(id)
            .filter(EtudiantColumn::Active.eq(true))
            .one(self.pool.read())
            .await?;
        Ok(model.map(Student::from))
    }

    async fn insert_student(&self, student: Student) -> Result<Student> {
        let model = EtudiantActiveModel::from(&student)
            .insert(self.pool.write())
            .await?;
        Ok(Student::from(model))
    }

    async fn merge_students(
        &self,
        master_id: Uuid,
        ids: &[Uuid],
        patch: &StudentPatch,
    ) -> Result<Student> {
        let txn = self.pool.write().begin().await?;

        // Row locks taken in sorted id order so overlapping merges
        // serialize instead of deadlocking
        let mut lock_order: Vec<Uuid> = ids.to_vec();
        lock_order.push(master_id);
        lock_order.sort();
        for id in &lock_order {
            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                "SELECT id FROM etudiants WHERE id = $1 AND active = TRUE FOR UPDATE",
                vec![(*id).into()],
            );
            if txn.query_one(stmt).await?.is_none() {
                return Err(AppError::RecordNotFound { id: id.to_string() });
            }
        }

        // Fold dossier counts into the master and deactivate losers
        let mut reassigned: i64 = 0;
        for id in ids {
            let count_stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                "SELECT dossiers_count FROM etudiants WHERE id = $1",
                vec![(*id).into()],
            );
            let row = txn
                .query_one(count_stmt)
                .await?
                .ok_or_else(|| AppError::RecordNotFound { id: id.to_string() })?;
            reassigned += row
                .try_get_by_index::<i64>(0)
                .map_err(sea_orm::DbErr::from)?;

            let deactivate = Statement::from_sql_and_values(
                DbBackend::Postgres,
                "UPDATE etudiants SET dossiers_count = 0, active = FALSE, updated_at = NOW() \
                 WHERE id = $1",
                vec![(*id).into()],
            );
            txn.execute(deactivate).await?;
        }

        let master_model = EtudiantEntity::find_by_id(master_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::RecordNotFound {
                id: master_id.to_string(),
            })?;
        let mut master = Student::from(master_model);
        master.dossiers_count += reassigned;
        patch.apply(&mut master);
        let merged = Student::from(EtudiantActiveModel::from(&master).update(&txn).await?);

        // A merged record must not linger in any registered group
        let merged_set: HashSet<Uuid> = ids.iter().copied().collect();
        let groups = GroupeEntity::find().all(&txn).await?;
        for model in groups {
            let mut group = model.into_domain()?;
            let before = group.students.len();
            group.students.retain(|m| !merged_set.contains(&m.id));
            if group.students.len() == before {
                continue;
            }
            if group.students.len() < 2 {
                GroupeEntity::delete_by_id(group.id).exec(&txn).await?;
            } else {
                let mut active = GroupeActiveModel::try_from(&group)?;
                active.students = Set(serde_json::to_value(&group.students)?);
                active.update(&txn).await?;
            }
        }

        txn.commit().await.map_err(|e| AppError::MergeFailed {
            message: e.to_string(),
        })?;

        Ok(merged)
    }

    async fn upsert_group(
        &self,
        signature: &str,
        members: Vec<GroupMember>,
        score: f32,
    ) -> Result<DuplicateGroup> {
        if let Some(existing) = self.find_group_by_signature(signature).await? {
            return Ok(existing);
        }

        let group = DuplicateGroup {
            id: Uuid::new_v4(),
            signature: signature.to_string(),
            students: members,
            score,
            statut: GroupStatus::Detecte,
            detected_at: chrono::Utc::now(),
        };
        let model = GroupeActiveModel::try_from(&group)?
            .insert(self.pool.write())
            .await?;
        model.into_domain()
    }

    async fn find_group(&self, id: Uuid) -> Result<Option<DuplicateGroup>> {
        let model = GroupeEntity::find_by_id(id).one(self.pool.read()).await?;
        model.map(Groupe::into_domain).transpose()
    }

    async fn find_group_by_signature(&self, signature: &str) -> Result<Option<DuplicateGroup>> {
        let model = GroupeEntity::find()
            .filter(GroupeColumn::Signature.eq(signature))
            .one(self.pool.read())
            .await?;
        model.map(Groupe::into_domain).transpose()
    }

    async fn group_signatures(&self) -> Result<HashSet<String>> {
        let models = GroupeEntity::find().all(self.pool.read()).await?;
        Ok(models.into_iter().map(|m| m.signature).collect())
    }

    async fn list_groups(
        &self,
        statut: GroupStatus,
        page: u64,
        limit: u64,
    ) -> Result<Page<DuplicateGroup>> {
        let paginator = GroupeEntity::find()
            .filter(GroupeColumn::Statut.eq(String::from(statut)))
            .order_by_asc(GroupeColumn::DetectedAt)
            .paginate(self.pool.read(), limit.max(1));

        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page.saturating_sub(1)).await?;
        let data = models
            .into_iter()
            .map(Groupe::into_domain)
            .collect::<Result<Vec<_>>>()?;

        Ok(Page::new(data, total, limit))
    }

    async fn set_group_status(&self, id: Uuid, statut: GroupStatus) -> Result<DuplicateGroup> {
        let model = GroupeEntity::find_by_id(id)
            .one(self.pool.write())
            .await?
            .ok_or_else(|| AppError::GroupNotFound { id: id.to_string() })?;

        let mut active: GroupeActiveModel = model.into();
        active.statut = Set(String::from(statut));
        let updated = active.update(self.pool.write()).await?;
        updated.into_domain()
    }

    async fn delete_group(&self, id: Uuid) -> Result<bool> {
        let result = GroupeEntity::delete_by_id(id).exec(self.pool.write()).await?;
        Ok(result.rows_affected > 0)
    }

    async fn add_ignored_signature(&self, signature: &str) -> Result<IgnoredSignature> {
        // Idempotent by signature: identical member sets share one entry
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO doublons_signatures_ignorees (id, signature, date_ignore)
            VALUES ($1, $2, NOW())
            ON CONFLICT (signature) DO UPDATE SET signature = EXCLUDED.signature
            RETURNING id, signature, date_ignore
            "#,
            vec![Uuid::new_v4().into(), signature.into()],
        );

        let row = self
            .pool
            .write()
            .query_one(stmt)
            .await?
            .ok_or_else(|| AppError::Internal {
                message: "ignored signature upsert returned no row".into(),
            })?;

        Ok(IgnoredSignature {
            id: row
                .try_get_by_index::<Uuid>(0)
                .map_err(sea_orm::DbErr::from)?,
            signature: row
                .try_get_by_index::<String>(1)
                .map_err(sea_orm::DbErr::from)?,
            date_ignore: row
                .try_get_by_index::<chrono::DateTime<chrono::FixedOffset>>(2)
                .map_err(sea_orm::DbErr::from)?
                .with_timezone(&chrono::Utc),
        })
    }

    async fn list_ignored_signatures(&self) -> Result<Vec<IgnoredSignature>> {
        let models = SignatureIgnoreeEntity::find()
            .order_by_asc(SignatureIgnoreeColumn::DateIgnore)
            .all(self.pool.read())
            .await?;
        Ok(models.into_iter().map(IgnoredSignature::from).collect())
    }

    async fn ignored_signature_set(&self) -> Result<HashSet<String>> {
        let models = SignatureIgnoreeEntity::find().all(self.pool.read()).await?;
        Ok(models.into_iter().map(|m| m.signature).collect())
    }

    async fn delete_ignored_signature(&self, id: Uuid) -> Result<bool> {
        let result = SignatureIgnoreeEntity::delete_by_id(id)
            .exec(self.pool.write())
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn delete_ignored_by_signature(&self, signature: &str) -> Result<bool> {
        let result = SignatureIgnoreeEntity::delete_many()
            .filter(SignatureIgnoreeColumn::Signature.eq(signature))
            .exec(self.pool.write())
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn save_scan_job(&self, snapshot: &ScanSnapshot) -> Result<()> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            INSERT INTO scan_jobs (
                id, status, progress, current_index, total, found_count,
                result, error, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                progress = EXCLUDED.progress,
                current_index = EXCLUDED.current_index,
                total = EXCLUDED.total,
                found_count = EXCLUDED.found_count,
                result = EXCLUDED.result,
                error = EXCLUDED.error,
                updated_at = EXCLUDED.updated_at
            "#,
            vec![
                snapshot.job_id.into(),
                String::from(snapshot.status).into(),
                snapshot.progress.into(),
                (snapshot.current_index as i64).into(),
                (snapshot.total as i64).into(),
                (snapshot.found_count as i64).into(),
                serde_json::to_value(&snapshot.result)?.into(),
                snapshot.error.clone().into(),
            ],
        );

        self.pool.write().execute(stmt).await?;
        Ok(())
    }

    async fn load_scan_job(&self, job_id: Uuid) -> Result<Option<ScanSnapshot>> {
        let model = ScanJobEntity::find_by_id(job_id).one(self.pool.read()).await?;
        model.map(ScanJob::into_snapshot).transpose()
    }
}

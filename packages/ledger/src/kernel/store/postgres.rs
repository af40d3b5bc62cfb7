use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use super::{BaseDocumentStore, DocumentWrite, StoreError, StoreTransaction};
use crate::common::{Amount, MemberId, OperationId};
use crate::domains::member::models::Member;
use crate::domains::operations::models::{Operation, OperationData, OperationQuery};

const MEMBER_COLUMNS: &str = "id, full_name, username, balance, last_minted_at, donation_rate, \
     donation_to_member_id, invite_confirmed, request_invite_from_member_id, verified_by_count, \
     flagging_operation_ids, created_at";

const OPERATION_COLUMNS: &str = "id, creator_id, data, created_at";

/// Postgres-backed store. Every transaction runs at SERIALIZABLE, so lost
/// races surface as SQLSTATE 40001 and map to a retryable conflict.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl BaseDocumentStore for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;
        Ok(Box::new(PostgresTransaction { tx: Some(tx) }))
    }
}

pub struct PostgresTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PostgresTransaction {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>, StoreError> {
        self.tx.as_mut().ok_or(StoreError::Closed)
    }
}

#[derive(sqlx::FromRow)]
struct MemberRow {
    id: Uuid,
    full_name: String,
    username: String,
    balance: Decimal,
    last_minted_at: Option<DateTime<Utc>>,
    donation_rate: Option<Decimal>,
    donation_to_member_id: Option<Uuid>,
    invite_confirmed: bool,
    request_invite_from_member_id: Option<Uuid>,
    verified_by_count: i32,
    flagging_operation_ids: Vec<Uuid>,
    created_at: DateTime<Utc>,
}

impl From<MemberRow> for Member {
    fn from(row: MemberRow) -> Self {
        Self {
            id: MemberId::from_uuid(row.id),
            full_name: row.full_name,
            username: row.username,
            balance: Amount::from_decimal(row.balance),
            last_minted_at: row.last_minted_at,
            donation_rate: row.donation_rate,
            donation_to_member_id: row.donation_to_member_id.map(MemberId::from_uuid),
            invite_confirmed: row.invite_confirmed,
            request_invite_from_member_id: row.request_invite_from_member_id.map(MemberId::from_uuid),
            verified_by_count: row.verified_by_count.max(0) as u32,
            flagging_operation_ids: row
                .flagging_operation_ids
                .into_iter()
                .map(OperationId::from_uuid)
                .collect(),
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OperationRow {
    id: Uuid,
    creator_id: Option<Uuid>,
    data: Json<OperationData>,
    created_at: DateTime<Utc>,
}

impl From<OperationRow> for Operation {
    fn from(row: OperationRow) -> Self {
        Self {
            id: OperationId::from_uuid(row.id),
            creator_id: row.creator_id.map(MemberId::from_uuid),
            data: row.data.0,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn read_member(&mut self, id: MemberId) -> Result<Option<Member>, StoreError> {
        let tx = self.tx()?;
        let row = sqlx::query_as::<_, MemberRow>(&format!(
            "SELECT {} FROM members WHERE id = $1",
            MEMBER_COLUMNS
        ))
        .bind(id.into_uuid())
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row.map(Member::from))
    }

    async fn read_operation(&mut self, id: OperationId) -> Result<Option<Operation>, StoreError> {
        let tx = self.tx()?;
        let row = sqlx::query_as::<_, OperationRow>(&format!(
            "SELECT {} FROM operations WHERE id = $1",
            OPERATION_COLUMNS
        ))
        .bind(id.into_uuid())
        .fetch_optional(&mut **tx)
        .await?;
        Ok(row.map(Operation::from))
    }

    async fn query_operations(
        &mut self,
        query: &OperationQuery,
    ) -> Result<Vec<Operation>, StoreError> {
        let tx = self.tx()?;

        let mut builder =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM operations WHERE TRUE", OPERATION_COLUMNS));
        if let Some(creator_id) = query.creator_id {
            builder.push(" AND creator_id = ").push_bind(creator_id.into_uuid());
        }
        if let Some(op_code) = query.op_code {
            builder.push(" AND op_code = ").push_bind(op_code.as_str());
        }
        if let Some(target) = query.target_member_id {
            builder
                .push(" AND target_member_id = ")
                .push_bind(target.into_uuid());
        }
        if let Some(mint_type) = query.mint_type {
            builder.push(" AND mint_type = ").push_bind(mint_type.as_str());
        }
        if let Some(token) = &query.invite_token {
            builder.push(" AND invite_token = ").push_bind(token.clone());
        }
        builder.push(" ORDER BY created_at, id");

        let rows = builder
            .build_query_as::<OperationRow>()
            .fetch_all(&mut **tx)
            .await?;
        Ok(rows.into_iter().map(Operation::from).collect())
    }

    async fn list_members(&mut self) -> Result<Vec<Member>, StoreError> {
        let tx = self.tx()?;
        let rows = sqlx::query_as::<_, MemberRow>(&format!(
            "SELECT {} FROM members ORDER BY created_at, id",
            MEMBER_COLUMNS
        ))
        .fetch_all(&mut **tx)
        .await?;
        Ok(rows.into_iter().map(Member::from).collect())
    }

    async fn commit(&mut self, writes: Vec<DocumentWrite>) -> Result<(), StoreError> {
        let mut tx = self.tx.take().ok_or(StoreError::Closed)?;
        let write_count = writes.len();

        for write in writes {
            match write {
                DocumentWrite::PutMember(member) => upsert_member(&mut tx, &member).await?,
                DocumentWrite::InsertOperation(op) => insert_operation(&mut tx, &op).await?,
            }
        }

        tx.commit().await?;
        debug!(writes = write_count, "Postgres transaction committed");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}

async fn upsert_member(
    tx: &mut Transaction<'static, Postgres>,
    member: &Member,
) -> Result<(), StoreError> {
    let flags: Vec<Uuid> = member
        .flagging_operation_ids
        .iter()
        .map(|id| id.into_uuid())
        .collect();

    sqlx::query(
        "INSERT INTO members (
            id, full_name, username, balance, last_minted_at, donation_rate,
            donation_to_member_id, invite_confirmed, request_invite_from_member_id,
            verified_by_count, flagging_operation_ids, created_at
         )
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
         ON CONFLICT (id) DO UPDATE SET
            full_name = EXCLUDED.full_name,
            username = EXCLUDED.username,
            balance = EXCLUDED.balance,
            last_minted_at = EXCLUDED.last_minted_at,
            donation_rate = EXCLUDED.donation_rate,
            donation_to_member_id = EXCLUDED.donation_to_member_id,
            invite_confirmed = EXCLUDED.invite_confirmed,
            request_invite_from_member_id = EXCLUDED.request_invite_from_member_id,
            verified_by_count = EXCLUDED.verified_by_count,
            flagging_operation_ids = EXCLUDED.flagging_operation_ids,
            updated_at = NOW()",
    )
    .bind(member.id.into_uuid())
    .bind(&member.full_name)
    .bind(&member.username)
    .bind(member.balance.as_decimal())
    .bind(member.last_minted_at)
    .bind(member.donation_rate)
    .bind(member.donation_to_member_id.map(|id| id.into_uuid()))
    .bind(member.invite_confirmed)
    .bind(member.request_invite_from_member_id.map(|id| id.into_uuid()))
    .bind(i32::try_from(member.verified_by_count).unwrap_or(i32::MAX))
    .bind(flags)
    .bind(member.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_operation(
    tx: &mut Transaction<'static, Postgres>,
    op: &Operation,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO operations (
            id, creator_id, op_code, target_member_id, mint_type, invite_token, data, created_at
         )
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(op.id.into_uuid())
    .bind(op.creator_id.map(|id| id.into_uuid()))
    .bind(op.op_code().as_str())
    .bind(op.data.target_member_id().map(|id| id.into_uuid()))
    .bind(op.data.mint_type().map(|mint_type| mint_type.as_str()))
    .bind(op.data.invite_token())
    .bind(Json(&op.data))
    .bind(op.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

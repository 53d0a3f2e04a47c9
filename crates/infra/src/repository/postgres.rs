//! Postgres-backed shipment store.
//!
//! Shipments, labels and their shop associations live in four tables (see
//! [`SCHEMA`]). The "one live shipment per order" rule is a partial unique index,
//! so a lost race between two writers is rejected by the database itself.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | RepositoryError |
//! |------------|----------------------|-----------------|
//! | Database (unique violation) | `23505` | `UniqueViolation` |
//! | Database (other) | Any other | `Backend` |
//! | RowNotFound | N/A | `Missing` |
//! | Other | N/A | `Backend` |

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};

use forgeship_core::{
    CompanyId, InfoPackageId, LabelId, OrderId, RepositoryError, ShipmentId, ShopId,
};
use forgeship_shipments::{Label, NewLabel, PayloadKind, Shipment, ShipmentWrite};

use super::{RepositoryResult, ShipmentRepository};

/// Idempotent schema for the shipment store.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS shipments (
    id BIGSERIAL PRIMARY KEY,
    order_id BIGINT NOT NULL,
    order_reference TEXT NOT NULL,
    shipment_number TEXT NOT NULL,
    product TEXT NOT NULL,
    company_id BIGINT NULL,
    info_package_id BIGINT NOT NULL,
    request_payload TEXT NULL,
    response_payload TEXT NULL,
    deleted BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE UNIQUE INDEX IF NOT EXISTS shipments_one_live_per_order
    ON shipments (order_id) WHERE deleted = FALSE;

CREATE INDEX IF NOT EXISTS shipments_info_package
    ON shipments (info_package_id) WHERE deleted = FALSE;

CREATE TABLE IF NOT EXISTS shipment_shops (
    shipment_id BIGINT NOT NULL REFERENCES shipments (id) ON DELETE CASCADE,
    shop_id BIGINT NOT NULL,
    PRIMARY KEY (shipment_id, shop_id)
);

CREATE TABLE IF NOT EXISTS shipment_labels (
    id BIGSERIAL PRIMARY KEY,
    shipment_id BIGINT NOT NULL REFERENCES shipments (id) ON DELETE CASCADE,
    package_id TEXT NOT NULL,
    tracker_code TEXT NULL,
    label_type TEXT NULL,
    storage_key TEXT NULL,
    payload TEXT NULL,
    payload_kind TEXT NULL,
    printed BOOLEAN NOT NULL DEFAULT FALSE,
    UNIQUE (shipment_id, package_id)
);

CREATE TABLE IF NOT EXISTS shipment_label_shops (
    label_id BIGINT NOT NULL REFERENCES shipment_labels (id) ON DELETE CASCADE,
    shop_id BIGINT NOT NULL,
    PRIMARY KEY (label_id, shop_id)
);
"#;

const SHIPMENT_COLUMNS: &str = r#"
    s.id, s.order_id, s.order_reference, s.shipment_number, s.product, s.company_id,
    s.info_package_id, s.request_payload, s.response_payload, s.deleted,
    s.created_at, s.updated_at,
    ARRAY(SELECT ss.shop_id FROM shipment_shops ss WHERE ss.shipment_id = s.id ORDER BY ss.shop_id) AS shop_ids
"#;

const LABEL_COLUMNS: &str = r#"
    l.id, l.shipment_id, l.package_id, l.tracker_code, l.label_type, l.storage_key,
    l.payload, l.payload_kind, l.printed,
    ARRAY(SELECT ls.shop_id FROM shipment_label_shops ls WHERE ls.label_id = l.id ORDER BY ls.shop_id) AS shop_ids
"#;

/// Postgres shipment store.
///
/// The async methods are the primary API. The [`ShipmentRepository`] impl
/// bridges onto them with the ambient tokio runtime and must be called from a
/// blocking context inside that runtime (e.g. `spawn_blocking`).
#[derive(Debug, Clone)]
pub struct PostgresShipmentStore {
    pool: Arc<PgPool>,
}

impl PostgresShipmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn ensure_schema(&self) -> RepositoryResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(shipment_id = %id), err)]
    pub async fn load_shipment(&self, id: ShipmentId) -> RepositoryResult<Option<Shipment>> {
        let sql = format!("SELECT {SHIPMENT_COLUMNS} FROM shipments s WHERE s.id = $1");
        let row = sqlx::query(&sql)
            .bind(i64::from(id.get()))
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_shipment", e))?;
        row.as_ref().map(shipment_from_row).transpose()
    }

    #[instrument(skip(self), fields(order_id = %order_id), err)]
    pub async fn load_live_by_order(&self, order_id: OrderId) -> RepositoryResult<Option<Shipment>> {
        let sql = format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shipments s WHERE s.order_id = $1 AND s.deleted = FALSE"
        );
        let row = sqlx::query(&sql)
            .bind(i64::from(order_id.get()))
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_live_by_order", e))?;
        row.as_ref().map(shipment_from_row).transpose()
    }

    #[instrument(skip(self), fields(info_package_id = %info_package_id), err)]
    pub async fn load_live_by_info_package(
        &self,
        info_package_id: InfoPackageId,
    ) -> RepositoryResult<Option<Shipment>> {
        let sql = format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shipments s \
             WHERE s.info_package_id = $1 AND s.deleted = FALSE \
             ORDER BY s.id LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(i64::from(info_package_id.get()))
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_live_by_info_package", e))?;
        row.as_ref().map(shipment_from_row).transpose()
    }

    /// Shipment row and label upserts in one transaction.
    #[instrument(
        skip(self, write),
        fields(
            order_id = %write.record.order_id,
            target = ?write.target,
            label_count = write.labels.len(),
            shipment_id = tracing::field::Empty
        ),
        err
    )]
    pub async fn commit_write(&self, write: ShipmentWrite) -> RepositoryResult<(Shipment, Vec<Label>)> {
        let span = Span::current();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let record = &write.record;
        let shipment_id: i64 = match write.target {
            Some(target) => sqlx::query(
                r#"
                UPDATE shipments SET
                    order_id = $2, order_reference = $3, shipment_number = $4, product = $5,
                    company_id = $6, info_package_id = $7, request_payload = $8,
                    response_payload = $9, updated_at = NOW()
                WHERE id = $1 AND deleted = FALSE
                RETURNING id
                "#,
            )
            .bind(i64::from(target.get()))
            .bind(i64::from(record.order_id.get()))
            .bind(&record.order_reference)
            .bind(&record.shipment_number)
            .bind(&record.product)
            .bind(record.company_id.map(|id| i64::from(id.get())))
            .bind(i64::from(record.info_package_id.get()))
            .bind(&record.request_payload)
            .bind(&record.response_payload)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_shipment", e))?
            .ok_or_else(|| RepositoryError::missing(format!("live shipment {target}")))?
            .try_get("id")
            .map_err(|e| decode_error("id", e))?,
            None => sqlx::query(
                r#"
                INSERT INTO shipments (
                    order_id, order_reference, shipment_number, product, company_id,
                    info_package_id, request_payload, response_payload
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING id
                "#,
            )
            .bind(i64::from(record.order_id.get()))
            .bind(&record.order_reference)
            .bind(&record.shipment_number)
            .bind(&record.product)
            .bind(record.company_id.map(|id| i64::from(id.get())))
            .bind(i64::from(record.info_package_id.get()))
            .bind(&record.request_payload)
            .bind(&record.response_payload)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_shipment", e))?
            .try_get("id")
            .map_err(|e| decode_error("id", e))?,
        };

        sqlx::query(
            "INSERT INTO shipment_shops (shipment_id, shop_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(shipment_id)
        .bind(i64::from(record.shop_id.get()))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("associate_shipment_shop", e))?;

        let mut label_ids = Vec::with_capacity(write.labels.len());
        for label in &write.labels {
            label_ids.push(upsert_label(&mut tx, shipment_id, label).await?);
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        let id = ShipmentId::new(to_u32(shipment_id, "shipment id")?);
        let shipment = self
            .load_shipment(id)
            .await?
            .ok_or_else(|| RepositoryError::missing(format!("shipment {id}")))?;
        let stored = self.load_labels(id).await?;
        let written = label_ids
            .iter()
            .filter_map(|wanted| stored.iter().find(|l| i64::from(l.id.get()) == *wanted))
            .cloned()
            .collect::<Vec<_>>();

        span.record("shipment_id", id.get());
        Ok((shipment, written))
    }

    #[instrument(skip(self), fields(shipment_id = %shipment_id), err)]
    pub async fn load_labels(&self, shipment_id: ShipmentId) -> RepositoryResult<Vec<Label>> {
        let sql = format!(
            "SELECT {LABEL_COLUMNS} FROM shipment_labels l WHERE l.shipment_id = $1 ORDER BY l.id"
        );
        let rows = sqlx::query(&sql)
            .bind(i64::from(shipment_id.get()))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_labels", e))?;
        rows.iter().map(label_from_row).collect()
    }

    #[instrument(skip(self, labels), fields(label_count = labels.len()), err)]
    pub async fn store_labels(&self, labels: &[Label]) -> RepositoryResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        for label in labels {
            let updated = sqlx::query(
                r#"
                UPDATE shipment_labels SET
                    tracker_code = $2, label_type = $3, storage_key = $4, payload = $5,
                    payload_kind = $6, printed = $7
                WHERE id = $1
                "#,
            )
            .bind(i64::from(label.id.get()))
            .bind(&label.tracker_code)
            .bind(&label.label_type)
            .bind(&label.storage_key)
            .bind(&label.payload)
            .bind(label.payload_kind.map(payload_kind_str))
            .bind(label.printed)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_label", e))?;

            if updated.rows_affected() == 0 {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(RepositoryError::missing(format!("label {}", label.id)));
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self), fields(shipment_id = %id), err)]
    pub async fn set_deleted(&self, id: ShipmentId, deleted: bool) -> RepositoryResult<bool> {
        let result = sqlx::query(
            "UPDATE shipments SET deleted = $2, updated_at = NOW() WHERE id = $1 AND deleted = $3",
        )
        .bind(i64::from(id.get()))
        .bind(deleted)
        .bind(!deleted)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_deleted", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    pub async fn load_orphan_labels(&self) -> RepositoryResult<Vec<Label>> {
        let sql = format!(
            "SELECT {LABEL_COLUMNS} FROM shipment_labels l \
             JOIN shipments s ON s.id = l.shipment_id \
             WHERE s.deleted = TRUE ORDER BY l.id"
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_orphan_labels", e))?;
        rows.iter().map(label_from_row).collect()
    }

    /// Candidates are narrowed in SQL, then resolved with the label's own key
    /// precedence.
    #[instrument(skip(self), err)]
    pub async fn live_key_in_use(&self, key: &str) -> RepositoryResult<bool> {
        let sql = format!(
            "SELECT {LABEL_COLUMNS} FROM shipment_labels l \
             JOIN shipments s ON s.id = l.shipment_id \
             WHERE s.deleted = FALSE \
               AND (BTRIM(l.storage_key) = $1 OR BTRIM(l.payload) = $1 OR BTRIM(l.package_id) = $1)"
        );
        let rows = sqlx::query(&sql)
            .bind(key)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("live_key_in_use", e))?;
        for row in &rows {
            let label = label_from_row(row)?;
            if label.resolve_storage_key().is_some_and(|resolved| resolved.key == key) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    #[instrument(skip(self), fields(label_id = %id), err)]
    pub async fn remove_label(&self, id: LabelId) -> RepositoryResult<()> {
        let result = sqlx::query("DELETE FROM shipment_labels WHERE id = $1")
            .bind(i64::from(id.get()))
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("remove_label", e))?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::missing(format!("label {id}")));
        }
        Ok(())
    }
}

async fn upsert_label(
    tx: &mut Transaction<'_, Postgres>,
    shipment_id: i64,
    label: &NewLabel,
) -> RepositoryResult<i64> {
    let row = sqlx::query(
        r#"
        INSERT INTO shipment_labels (
            shipment_id, package_id, tracker_code, label_type, storage_key, payload, payload_kind
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (shipment_id, package_id) DO UPDATE SET
            tracker_code = EXCLUDED.tracker_code,
            label_type = EXCLUDED.label_type,
            storage_key = EXCLUDED.storage_key,
            payload = EXCLUDED.payload,
            payload_kind = EXCLUDED.payload_kind,
            printed = FALSE
        RETURNING id
        "#,
    )
    .bind(shipment_id)
    .bind(&label.package_id)
    .bind(&label.tracker_code)
    .bind(&label.label_type)
    .bind(&label.storage_key)
    .bind(&label.payload)
    .bind(label.payload_kind.map(payload_kind_str))
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("upsert_label", e))?;

    let label_id: i64 = row.try_get("id").map_err(|e| decode_error("id", e))?;

    sqlx::query(
        "INSERT INTO shipment_label_shops (label_id, shop_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(label_id)
    .bind(i64::from(label.shop_id.get()))
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("associate_label_shop", e))?;

    Ok(label_id)
}

fn payload_kind_str(kind: PayloadKind) -> &'static str {
    match kind {
        PayloadKind::StorageKey => "storage_key",
        PayloadKind::Base64Pdf => "base64_pdf",
    }
}

fn parse_payload_kind(value: Option<String>) -> RepositoryResult<Option<PayloadKind>> {
    match value.as_deref() {
        None => Ok(None),
        Some("storage_key") => Ok(Some(PayloadKind::StorageKey)),
        Some("base64_pdf") => Ok(Some(PayloadKind::Base64Pdf)),
        Some(other) => Err(RepositoryError::backend(format!(
            "unknown payload_kind '{other}'"
        ))),
    }
}

fn to_u32(value: i64, what: &str) -> RepositoryResult<u32> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::backend(format!("{what} {value} out of range")))
}

fn decode_error(column: &str, err: sqlx::Error) -> RepositoryError {
    RepositoryError::backend(format!("failed to read column {column}: {err}"))
}

fn shop_set(ids: Vec<i64>) -> RepositoryResult<BTreeSet<ShopId>> {
    ids.into_iter()
        .map(|id| to_u32(id, "shop id").map(ShopId::new))
        .collect()
}

fn shipment_from_row(row: &PgRow) -> RepositoryResult<Shipment> {
    let get_i64 = |column: &str| -> RepositoryResult<i64> {
        row.try_get(column).map_err(|e| decode_error(column, e))
    };
    let company_id: Option<i64> = row
        .try_get("company_id")
        .map_err(|e| decode_error("company_id", e))?;
    let created_at: DateTime<Utc> = row
        .try_get("created_at")
        .map_err(|e| decode_error("created_at", e))?;
    let updated_at: DateTime<Utc> = row
        .try_get("updated_at")
        .map_err(|e| decode_error("updated_at", e))?;

    Ok(Shipment {
        id: ShipmentId::new(to_u32(get_i64("id")?, "shipment id")?),
        order_id: OrderId::new(to_u32(get_i64("order_id")?, "order id")?),
        order_reference: row
            .try_get("order_reference")
            .map_err(|e| decode_error("order_reference", e))?,
        shipment_number: row
            .try_get("shipment_number")
            .map_err(|e| decode_error("shipment_number", e))?,
        product: row.try_get("product").map_err(|e| decode_error("product", e))?,
        company_id: company_id
            .map(|id| to_u32(id, "company id").map(CompanyId::new))
            .transpose()?,
        info_package_id: InfoPackageId::new(to_u32(
            get_i64("info_package_id")?,
            "info package id",
        )?),
        request_payload: row
            .try_get("request_payload")
            .map_err(|e| decode_error("request_payload", e))?,
        response_payload: row
            .try_get("response_payload")
            .map_err(|e| decode_error("response_payload", e))?,
        shop_ids: shop_set(
            row.try_get("shop_ids")
                .map_err(|e| decode_error("shop_ids", e))?,
        )?,
        deleted: row.try_get("deleted").map_err(|e| decode_error("deleted", e))?,
        created_at,
        updated_at,
    })
}

fn label_from_row(row: &PgRow) -> RepositoryResult<Label> {
    let id: i64 = row.try_get("id").map_err(|e| decode_error("id", e))?;
    let shipment_id: i64 = row
        .try_get("shipment_id")
        .map_err(|e| decode_error("shipment_id", e))?;

    Ok(Label {
        id: LabelId::new(to_u32(id, "label id")?),
        shipment_id: ShipmentId::new(to_u32(shipment_id, "shipment id")?),
        package_id: row
            .try_get("package_id")
            .map_err(|e| decode_error("package_id", e))?,
        tracker_code: row
            .try_get("tracker_code")
            .map_err(|e| decode_error("tracker_code", e))?,
        label_type: row
            .try_get("label_type")
            .map_err(|e| decode_error("label_type", e))?,
        storage_key: row
            .try_get("storage_key")
            .map_err(|e| decode_error("storage_key", e))?,
        payload: row.try_get("payload").map_err(|e| decode_error("payload", e))?,
        payload_kind: parse_payload_kind(
            row.try_get("payload_kind")
                .map_err(|e| decode_error("payload_kind", e))?,
        )?,
        printed: row.try_get("printed").map_err(|e| decode_error("printed", e))?,
        shop_ids: shop_set(
            row.try_get("shop_ids")
                .map_err(|e| decode_error("shop_ids", e))?,
        )?,
    })
}

/// Map SQLx errors to RepositoryError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code() {
                Some(code) if code.as_ref() == "23505" => RepositoryError::UniqueViolation(msg),
                _ => RepositoryError::Backend(msg),
            }
        }
        sqlx::Error::RowNotFound => {
            RepositoryError::missing(format!("unexpected row not found in {operation}"))
        }
        sqlx::Error::PoolClosed => {
            RepositoryError::backend(format!("connection pool closed in {operation}"))
        }
        _ => RepositoryError::backend(format!("sqlx error in {operation}: {err}")),
    }
}

/// Run an async store operation from the synchronous repository trait.
fn block_on<T>(fut: impl Future<Output = RepositoryResult<T>>) -> RepositoryResult<T> {
    let handle = tokio::runtime::Handle::try_current().map_err(|_| {
        RepositoryError::backend(
            "PostgresShipmentStore requires a tokio runtime; call it from spawn_blocking",
        )
    })?;
    handle.block_on(fut)
}

impl ShipmentRepository for PostgresShipmentStore {
    fn find(&self, id: ShipmentId) -> RepositoryResult<Option<Shipment>> {
        block_on(self.load_shipment(id))
    }

    fn find_live_by_order(&self, order_id: OrderId) -> RepositoryResult<Option<Shipment>> {
        block_on(self.load_live_by_order(order_id))
    }

    fn find_live_by_info_package(
        &self,
        info_package_id: InfoPackageId,
    ) -> RepositoryResult<Option<Shipment>> {
        block_on(self.load_live_by_info_package(info_package_id))
    }

    fn commit(&self, write: ShipmentWrite) -> RepositoryResult<(Shipment, Vec<Label>)> {
        block_on(self.commit_write(write))
    }

    fn labels_for(&self, shipment_id: ShipmentId) -> RepositoryResult<Vec<Label>> {
        block_on(self.load_labels(shipment_id))
    }

    fn save_labels(&self, labels: &[Label]) -> RepositoryResult<()> {
        block_on(self.store_labels(labels))
    }

    fn mark_deleted(&self, id: ShipmentId) -> RepositoryResult<bool> {
        block_on(self.set_deleted(id, true))
    }

    fn restore(&self, id: ShipmentId) -> RepositoryResult<bool> {
        block_on(self.set_deleted(id, false))
    }

    fn labels_of_deleted_shipments(&self) -> RepositoryResult<Vec<Label>> {
        block_on(self.load_orphan_labels())
    }

    fn is_key_referenced_by_live_label(&self, key: &str) -> RepositoryResult<bool> {
        block_on(self.live_key_in_use(key))
    }

    fn delete_label(&self, id: LabelId) -> RepositoryResult<()> {
        block_on(self.remove_label(id))
    }
}

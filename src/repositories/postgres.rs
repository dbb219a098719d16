use async_trait::async_trait;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Unchanged, ColumnTrait, Condition, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set, SqlErr,
};

use super::SubscriptionRepository;
use crate::entities::subscription_entity as subs;
use crate::error::{RepositoryError, RepositoryResult};
use crate::models::{CostWindow, NewSubscription, Subscription, SubscriptionFilter};

pub struct PgSubscriptionRepository {
    pool: DatabaseConnection,
}

impl PgSubscriptionRepository {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }
}

fn map_db_err(err: DbErr) -> RepositoryError {
    let sql_err = err.sql_err();
    classify_db_err(err, sql_err)
}

fn classify_db_err(err: DbErr, sql_err: Option<SqlErr>) -> RepositoryError {
    if matches!(err, DbErr::RecordNotFound(_) | DbErr::RecordNotUpdated) {
        return RepositoryError::NotFound;
    }
    match sql_err {
        Some(SqlErr::UniqueConstraintViolation(_)) => RepositoryError::Duplicate,
        _ => RepositoryError::Database(err),
    }
}

/// Escapes LIKE wildcards so the needle matches literally.
fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn apply_filter(mut query: Select<subs::Entity>, filter: &SubscriptionFilter) -> Select<subs::Entity> {
    if let Some(user_id) = filter.user_id {
        query = query.filter(subs::Column::UserId.eq(user_id));
    }
    if let Some(name) = &filter.service_name {
        // ILIKE '%name%'
        let pattern = format!("%{}%", escape_like(&name.to_lowercase()));
        query = query.filter(Expr::expr(Func::lower(Expr::col(subs::Column::ServiceName))).like(pattern));
    }
    query
}

#[async_trait]
impl SubscriptionRepository for PgSubscriptionRepository {
    async fn create(&self, sub: NewSubscription) -> RepositoryResult<Subscription> {
        let model = subs::ActiveModel {
            service_name: Set(sub.service_name),
            price: Set(sub.price),
            user_id: Set(sub.user_id),
            start_date: Set(sub.start_date.first_day()),
            end_date: Set(sub.end_date.map(|d| d.first_day())),
            created_at: Set(sub.created_at),
            updated_at: Set(sub.updated_at),
            ..Default::default()
        }
        .insert(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(model.into())
    }

    async fn get_by_id(&self, id: i64) -> RepositoryResult<Subscription> {
        subs::Entity::find_by_id(id)
            .one(&self.pool)
            .await
            .map_err(map_db_err)?
            .map(Subscription::from)
            .ok_or(RepositoryError::NotFound)
    }

    async fn get_all(
        &self,
        filter: &SubscriptionFilter,
        limit: u64,
        offset: u64,
    ) -> RepositoryResult<Vec<Subscription>> {
        let rows = apply_filter(subs::Entity::find(), filter)
            .order_by_asc(subs::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(&self.pool)
            .await
            .map_err(map_db_err)?;

        Ok(rows.into_iter().map(Subscription::from).collect())
    }

    async fn update(&self, sub: Subscription) -> RepositoryResult<Subscription> {
        let model = subs::ActiveModel {
            id: Unchanged(sub.id),
            service_name: Set(sub.service_name),
            price: Set(sub.price),
            end_date: Set(sub.end_date.map(|d| d.first_day())),
            updated_at: Set(sub.updated_at),
            ..Default::default()
        }
        .update(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(model.into())
    }

    async fn delete(&self, id: i64) -> RepositoryResult<()> {
        let res = subs::Entity::delete_by_id(id)
            .exec(&self.pool)
            .await
            .map_err(map_db_err)?;
        if res.rows_affected == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn calculate_cost(
        &self,
        filter: &SubscriptionFilter,
        window: CostWindow,
    ) -> RepositoryResult<i64> {
        // start_date <= 窗口结束 AND (end_date IS NULL OR end_date >= 窗口开始)
        let query = subs::Entity::find()
            .select_only()
            .column_as(Expr::cust("COALESCE(SUM(price), 0)::BIGINT"), "total_cost")
            .filter(subs::Column::StartDate.lte(window.end.first_day()))
            .filter(
                Condition::any()
                    .add(subs::Column::EndDate.is_null())
                    .add(subs::Column::EndDate.gte(window.start.first_day())),
            );

        let total = apply_filter(query, filter)
            .into_tuple::<i64>()
            .one(&self.pool)
            .await
            .map_err(map_db_err)?;

        Ok(total.unwrap_or(0))
    }
}

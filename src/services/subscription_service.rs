use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::converters::SubscriptionConverter;
use crate::error::{AppError, AppResult, RepositoryError, RepositoryResult};
use crate::models::*;
use crate::repositories::SubscriptionRepository;
use crate::utils::RequestContext;
use crate::validation::{RequestValidator, ValidationReport};

pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(3);

/// Subscription lifecycle and cost aggregation.
///
/// Holds no per-request state: every call receives its own [`RequestContext`]
/// and every repository call runs under the operation timeout.
#[derive(Clone)]
pub struct SubscriptionService {
    repository: Arc<dyn SubscriptionRepository>,
    validator: Arc<dyn RequestValidator>,
    converter: SubscriptionConverter,
    timeout: Duration,
}

impl SubscriptionService {
    pub fn new(
        repository: Arc<dyn SubscriptionRepository>,
        validator: Arc<dyn RequestValidator>,
    ) -> Self {
        Self {
            repository,
            validator,
            converter: SubscriptionConverter::new(),
            timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs a repository call under the operation timeout. Expiry drops the call.
    async fn bounded<T>(
        &self,
        ctx: &RequestContext,
        op: &str,
        call: impl Future<Output = RepositoryResult<T>>,
    ) -> AppResult<RepositoryResult<T>> {
        tokio::time::timeout(self.timeout, call).await.map_err(|_| {
            log::error!(
                "[{}] {op} timed out after {:?}",
                ctx.request_id,
                self.timeout
            );
            AppError::InternalError(format!("{op} timed out"))
        })
    }

    fn reject(ctx: &RequestContext, op: &str, report: ValidationReport) -> AppError {
        log::warn!("[{}] {op}: invalid input: {report}", ctx.request_id);
        AppError::InvalidRequest(report.to_string())
    }

    pub async fn create(
        &self,
        ctx: &RequestContext,
        req: CreateSubscriptionRequest,
    ) -> AppResult<SubscriptionResponse> {
        log::debug!("[{}] trying to create subscription: {req:?}", ctx.request_id);

        self.validator
            .check_create(&req)
            .map_err(|report| Self::reject(ctx, "create", report))?;

        let new_sub = self.converter.to_new_subscription(&req, Utc::now())?;

        let created = match self
            .bounded(ctx, "create", self.repository.create(new_sub))
            .await?
        {
            Ok(sub) => sub,
            Err(RepositoryError::Duplicate) => {
                log::error!("[{}] duplicate subscription", ctx.request_id);
                return Err(AppError::AlreadyExists);
            }
            Err(e) => {
                log::error!("[{}] failed to create subscription: {e}", ctx.request_id);
                return Err(AppError::InvalidRequest(
                    "failed to create subscription".into(),
                ));
            }
        };

        log::debug!(
            "[{}] success create subscription: id={}",
            ctx.request_id,
            created.id
        );
        Ok(self.converter.to_response(&created))
    }

    pub async fn get_by_id(
        &self,
        ctx: &RequestContext,
        id: i64,
    ) -> AppResult<SubscriptionResponse> {
        log::debug!("[{}] trying to get subscription by id: {id}", ctx.request_id);

        // 所有读取失败都归为 NotFound
        let sub = self
            .bounded(ctx, "get_by_id", self.repository.get_by_id(id))
            .await?
            .map_err(|e| {
                log::error!("[{}] failed to get subscription {id}: {e}", ctx.request_id);
                AppError::NotFound
            })?;

        log::debug!("[{}] success get subscription by id: {id}", ctx.request_id);
        Ok(self.converter.to_response(&sub))
    }

    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: i64,
        patch: UpdateSubscriptionRequest,
    ) -> AppResult<SubscriptionResponse> {
        log::debug!(
            "[{}] trying to update subscription {id}: {patch:?}",
            ctx.request_id
        );

        self.validator
            .check_update(&patch)
            .map_err(|report| Self::reject(ctx, "update", report))?;

        let mut sub = match self
            .bounded(ctx, "update", self.repository.get_by_id(id))
            .await?
        {
            Ok(sub) => sub,
            Err(RepositoryError::NotFound) => {
                log::error!("[{}] subscription {id} not found for update", ctx.request_id);
                return Err(AppError::NotFound);
            }
            Err(e) => {
                log::error!(
                    "[{}] failed to get subscription {id} for update: {e}",
                    ctx.request_id
                );
                return Err(AppError::InvalidRequest(
                    "failed to load subscription".into(),
                ));
            }
        };

        self.converter.apply_update(&mut sub, &patch)?;
        if let Some(end) = sub.end_date
            && end < sub.start_date
        {
            log::warn!(
                "[{}] end_date {end} precedes start_date {}",
                ctx.request_id,
                sub.start_date
            );
            return Err(AppError::InvalidRequest(
                "end_date must not precede start_date".into(),
            ));
        }
        sub.updated_at = Utc::now().max(sub.created_at);

        let updated = self
            .bounded(ctx, "update", self.repository.update(sub))
            .await?
            .map_err(|e| {
                log::error!("[{}] failed to update subscription {id}: {e}", ctx.request_id);
                AppError::InvalidRequest("failed to update subscription".into())
            })?;

        log::debug!("[{}] success update subscription: id={id}", ctx.request_id);
        Ok(self.converter.to_response(&updated))
    }

    pub async fn delete(&self, ctx: &RequestContext, id: i64) -> AppResult<()> {
        log::debug!("[{}] trying to delete subscription: id={id}", ctx.request_id);

        self.bounded(ctx, "delete", self.repository.delete(id))
            .await?
            .map_err(|e| {
                log::error!("[{}] failed to delete subscription {id}: {e}", ctx.request_id);
                AppError::NotFound
            })?;

        log::debug!("[{}] success delete subscription: id={id}", ctx.request_id);
        Ok(())
    }

    /// Lists subscriptions. An empty result is `NoSubscriptionsFound`, not an empty list.
    pub async fn get_all(
        &self,
        ctx: &RequestContext,
        query: SubscriptionListQuery,
    ) -> AppResult<Vec<SubscriptionResponse>> {
        log::debug!("[{}] trying to list subscriptions: {query:?}", ctx.request_id);

        self.validator
            .check_list(&query)
            .map_err(|report| Self::reject(ctx, "get_all", report))?;

        let filter = query.filter();
        let subs = self
            .bounded(
                ctx,
                "get_all",
                self.repository
                    .get_all(&filter, query.limit(), query.offset()),
            )
            .await?
            .map_err(|e| {
                log::error!("[{}] failed to get subscriptions: {e}", ctx.request_id);
                AppError::InternalError("failed to get subscriptions".into())
            })?;

        if subs.is_empty() {
            log::error!("[{}] no subscriptions found", ctx.request_id);
            return Err(AppError::NoSubscriptionsFound);
        }

        log::debug!(
            "[{}] success getting {} subscriptions",
            ctx.request_id,
            subs.len()
        );
        Ok(self.converter.to_responses(&subs))
    }

    /// Total price of matching subscriptions active at any month of the window.
    /// No match yields 0.
    pub async fn calculate_cost(
        &self,
        ctx: &RequestContext,
        query: CostQuery,
    ) -> AppResult<CostResponse> {
        log::debug!("[{}] trying to calculate cost: {query:?}", ctx.request_id);

        self.validator
            .check_cost(&query)
            .map_err(|report| Self::reject(ctx, "calculate_cost", report))?;

        let window = self.converter.to_cost_window(&query)?;
        let filter = query.filter();
        let total_cost = self
            .bounded(
                ctx,
                "calculate_cost",
                self.repository.calculate_cost(&filter, window),
            )
            .await?
            .map_err(|e| {
                log::error!("[{}] failed to calculate cost: {e}", ctx.request_id);
                AppError::InternalError("failed to calculate cost".into())
            })?;

        log::debug!(
            "[{}] success calculating cost: {total_cost}",
            ctx.request_id
        );
        Ok(CostResponse { total_cost })
    }
}

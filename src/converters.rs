//! Mapping between wire request/response shapes and [`Subscription`] records.

use chrono::{DateTime, Utc};

use crate::error::AppResult;
use crate::models::{
    CostQuery, CostWindow, CreateSubscriptionRequest, NewSubscription, Subscription,
    SubscriptionResponse, UpdateSubscriptionRequest,
};
use crate::utils::MonthYear;

#[derive(Debug, Clone, Copy, Default)]
pub struct SubscriptionConverter;

impl SubscriptionConverter {
    pub fn new() -> Self {
        Self
    }

    /// Builds an unsaved record; both timestamps are set to `now`.
    pub fn to_new_subscription(
        &self,
        req: &CreateSubscriptionRequest,
        now: DateTime<Utc>,
    ) -> AppResult<NewSubscription> {
        Ok(NewSubscription {
            service_name: req.service_name.clone(),
            price: req.price,
            user_id: req.user_id,
            start_date: req.start_date.parse()?,
            end_date: req
                .end_date
                .as_deref()
                .map(str::parse::<MonthYear>)
                .transpose()?,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn to_response(&self, sub: &Subscription) -> SubscriptionResponse {
        SubscriptionResponse {
            id: sub.id,
            service_name: sub.service_name.clone(),
            price: sub.price,
            user_id: sub.user_id,
            start_date: sub.start_date.to_string(),
            end_date: sub.end_date.map(|d| d.to_string()),
            created_at: sub.created_at,
            updated_at: sub.updated_at,
        }
    }

    pub fn to_responses(&self, subs: &[Subscription]) -> Vec<SubscriptionResponse> {
        subs.iter().map(|s| self.to_response(s)).collect()
    }

    /// Overwrites only the fields present in the patch.
    pub fn apply_update(
        &self,
        sub: &mut Subscription,
        patch: &UpdateSubscriptionRequest,
    ) -> AppResult<()> {
        if let Some(service_name) = &patch.service_name {
            sub.service_name = service_name.clone();
        }
        if let Some(price) = patch.price {
            sub.price = price;
        }
        if let Some(end_date) = patch.end_date.as_deref() {
            sub.end_date = Some(end_date.parse()?);
        }
        Ok(())
    }

    pub fn to_cost_window(&self, query: &CostQuery) -> AppResult<CostWindow> {
        Ok(CostWindow {
            start: query.start_date.parse()?,
            end: query.end_date.parse()?,
        })
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::utils::MonthYear;
use crate::validation::{
    validate_cost_window, validate_create_period, validate_month_year, validate_user_id,
};

pub const DEFAULT_LIST_LIMIT: i64 = 100;

/// A persisted subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: i64,
    pub service_name: String,
    pub price: i64, // 最小货币单位
    pub user_id: Uuid,
    pub start_date: MonthYear,
    pub end_date: Option<MonthYear>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A subscription that storage has not assigned an id to yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubscription {
    pub service_name: String,
    pub price: i64,
    pub user_id: Uuid,
    pub start_date: MonthYear,
    pub end_date: Option<MonthYear>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewSubscription {
    pub fn into_subscription(self, id: i64) -> Subscription {
        Subscription {
            id,
            service_name: self.service_name,
            price: self.price,
            user_id: self.user_id,
            start_date: self.start_date,
            end_date: self.end_date,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Inclusive month range a cost query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostWindow {
    pub start: MonthYear,
    pub end: MonthYear,
}

/// Optional conjunctive filters shared by listing and cost queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub user_id: Option<Uuid>,
    pub service_name: Option<String>,
}

impl SubscriptionFilter {
    pub fn new(user_id: Option<Uuid>, service_name: Option<String>) -> Self {
        Self {
            user_id,
            service_name: service_name.filter(|s| !s.is_empty()),
        }
    }

    /// user_id 精确匹配，service_name 不区分大小写的子串匹配
    pub fn matches(&self, sub: &Subscription) -> bool {
        if let Some(user_id) = self.user_id
            && sub.user_id != user_id
        {
            return false;
        }
        match &self.service_name {
            Some(needle) => sub
                .service_name
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            None => true,
        }
    }
}

impl Subscription {
    /// True when `[start_date, end_date or open]` intersects the window.
    pub fn overlaps(&self, window: &CostWindow) -> bool {
        overlaps_window(self.start_date, self.end_date, window)
    }
}

pub fn overlaps_window(start: MonthYear, end: Option<MonthYear>, window: &CostWindow) -> bool {
    start <= window.end && end.is_none_or(|end| end >= window.start)
}

/// Sums the price of every matching subscription active at some month of the window.
/// `None` when the total does not fit in `i64`.
pub fn total_cost<'a>(
    subscriptions: impl IntoIterator<Item = &'a Subscription>,
    filter: &SubscriptionFilter,
    window: &CostWindow,
) -> Option<i64> {
    subscriptions
        .into_iter()
        .filter(|s| filter.matches(s) && s.overlaps(window))
        .try_fold(0i64, |acc, s| acc.checked_add(s.price))
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_create_period"))]
pub struct CreateSubscriptionRequest {
    #[validate(length(min = 1, max = 255))]
    pub service_name: String,
    #[validate(range(min = 1))]
    pub price: i64,
    #[validate(custom(function = "validate_user_id"))]
    pub user_id: Uuid,
    /// MM-YYYY
    #[validate(custom(function = "validate_month_year"))]
    pub start_date: String,
    /// MM-YYYY, omitted while the subscription is still active
    #[validate(custom(function = "validate_month_year"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

/// Sparse patch: absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateSubscriptionRequest {
    #[validate(length(min = 1, max = 255))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[validate(range(min = 1))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,
    #[validate(custom(function = "validate_month_year"))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionResponse {
    pub id: i64,
    pub service_name: String,
    pub price: i64,
    pub user_id: Uuid,
    pub start_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct SubscriptionListQuery {
    pub user_id: Option<Uuid>,
    #[validate(length(max = 255))]
    pub service_name: Option<String>,
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<i64>,
    #[validate(range(min = 0))]
    pub offset: Option<i64>,
}

impl SubscriptionListQuery {
    pub fn filter(&self) -> SubscriptionFilter {
        SubscriptionFilter::new(self.user_id, self.service_name.clone())
    }

    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_LIST_LIMIT).max(0) as u64
    }

    pub fn offset(&self) -> u64 {
        self.offset.unwrap_or(0).max(0) as u64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_cost_window"))]
pub struct CostQuery {
    pub user_id: Option<Uuid>,
    #[validate(length(max = 255))]
    pub service_name: Option<String>,
    /// MM-YYYY, first month of the window
    #[validate(custom(function = "validate_month_year"))]
    pub start_date: String,
    /// MM-YYYY, last month of the window
    #[validate(custom(function = "validate_month_year"))]
    pub end_date: String,
}

impl CostQuery {
    pub fn filter(&self) -> SubscriptionFilter {
        SubscriptionFilter::new(self.user_id, self.service_name.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CostResponse {
    pub total_cost: i64,
}

//! Persistence port for subscriptions and its storage adapters.

pub mod memory;
pub mod postgres;

pub use memory::InMemorySubscriptionRepository;
pub use postgres::PgSubscriptionRepository;

use async_trait::async_trait;

use crate::error::RepositoryResult;
use crate::models::{CostWindow, NewSubscription, Subscription, SubscriptionFilter};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Stores a new subscription and returns it with its assigned id.
    /// A subscription with the same user, service name and start month is a `Duplicate`.
    async fn create(&self, subscription: NewSubscription) -> RepositoryResult<Subscription>;

    async fn get_by_id(&self, id: i64) -> RepositoryResult<Subscription>;

    /// Filtered page ordered by id. An empty page is not an error.
    async fn get_all(
        &self,
        filter: &SubscriptionFilter,
        limit: u64,
        offset: u64,
    ) -> RepositoryResult<Vec<Subscription>>;

    /// Writes service name, price, end date and `updated_at`.
    async fn update(&self, subscription: Subscription) -> RepositoryResult<Subscription>;

    async fn delete(&self, id: i64) -> RepositoryResult<()>;

    /// Sum of prices of matching subscriptions whose period intersects the window.
    async fn calculate_cost(
        &self,
        filter: &SubscriptionFilter,
        window: CostWindow,
    ) -> RepositoryResult<i64>;
}

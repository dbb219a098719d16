use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::SubscriptionRepository;
use crate::error::{RepositoryError, RepositoryResult};
use crate::models::{
    CostWindow, NewSubscription, Subscription, SubscriptionFilter, total_cost,
};

#[derive(Debug, Default)]
struct MemoryState {
    last_id: i64,
    rows: BTreeMap<i64, Subscription>,
}

impl MemoryState {
    fn conflicts(&self, candidate: &Subscription) -> bool {
        self.rows.values().any(|s| {
            s.id != candidate.id
                && s.user_id == candidate.user_id
                && s.service_name == candidate.service_name
                && s.start_date == candidate.start_date
        })
    }
}

/// Process-local storage with the same contract as the Postgres adapter.
#[derive(Debug, Default)]
pub struct InMemorySubscriptionRepository {
    state: RwLock<MemoryState>,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn create(&self, sub: NewSubscription) -> RepositoryResult<Subscription> {
        let mut state = self.state.write().await;
        let candidate = sub.into_subscription(state.last_id + 1);
        if state.conflicts(&candidate) {
            return Err(RepositoryError::Duplicate);
        }
        state.last_id = candidate.id;
        state.rows.insert(candidate.id, candidate.clone());
        Ok(candidate)
    }

    async fn get_by_id(&self, id: i64) -> RepositoryResult<Subscription> {
        self.state
            .read()
            .await
            .rows
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn get_all(
        &self,
        filter: &SubscriptionFilter,
        limit: u64,
        offset: u64,
    ) -> RepositoryResult<Vec<Subscription>> {
        let state = self.state.read().await;
        Ok(state
            .rows
            .values()
            .filter(|s| filter.matches(s))
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn update(&self, sub: Subscription) -> RepositoryResult<Subscription> {
        let mut state = self.state.write().await;
        if state.conflicts(&sub) {
            return Err(RepositoryError::Duplicate);
        }
        let stored = state
            .rows
            .get_mut(&sub.id)
            .ok_or(RepositoryError::NotFound)?;
        stored.service_name = sub.service_name;
        stored.price = sub.price;
        stored.end_date = sub.end_date;
        stored.updated_at = sub.updated_at;
        Ok(stored.clone())
    }

    async fn delete(&self, id: i64) -> RepositoryResult<()> {
        self.state
            .write()
            .await
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    async fn calculate_cost(
        &self,
        filter: &SubscriptionFilter,
        window: CostWindow,
    ) -> RepositoryResult<i64> {
        let state = self.state.read().await;
        total_cost(state.rows.values(), filter, &window)
            .ok_or_else(|| RepositoryError::Other("cost overflow".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn new_sub(user_id: Uuid, service: &str, start: &str, end: Option<&str>) -> NewSubscription {
        let now = Utc::now();
        NewSubscription {
            service_name: service.to_string(),
            price: 100,
            user_id,
            start_date: start.parse().unwrap(),
            end_date: end.map(|e| e.parse().unwrap()),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_ids() {
        let repo = InMemorySubscriptionRepository::new();
        let user = Uuid::new_v4();
        let a = repo.create(new_sub(user, "a", "01-2025", None)).await.unwrap();
        let b = repo.create(new_sub(user, "b", "01-2025", None)).await.unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(repo.len().await, 2);
    }

    #[tokio::test]
    async fn test_create_duplicate() {
        let repo = InMemorySubscriptionRepository::new();
        let user = Uuid::new_v4();
        repo.create(new_sub(user, "yandex", "09-2025", None)).await.unwrap();
        let err = repo
            .create(new_sub(user, "yandex", "09-2025", Some("12-2025")))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Duplicate));
        // 不同开始月份不冲突
        assert!(repo.create(new_sub(user, "yandex", "10-2025", None)).await.is_ok());
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_delete() {
        let repo = InMemorySubscriptionRepository::new();
        let user = Uuid::new_v4();
        let a = repo.create(new_sub(user, "a", "01-2025", None)).await.unwrap();
        repo.delete(a.id).await.unwrap();
        let b = repo.create(new_sub(user, "b", "01-2025", None)).await.unwrap();
        assert_eq!(b.id, 2);
        assert!(!repo.is_empty().await);
    }

    #[tokio::test]
    async fn test_get_all_filters_and_pages() {
        let repo = InMemorySubscriptionRepository::new();
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        repo.create(new_sub(user, "Yandex Plus", "01-2025", None)).await.unwrap();
        repo.create(new_sub(user, "Netflix", "01-2025", None)).await.unwrap();
        repo.create(new_sub(other, "yandex music", "01-2025", None)).await.unwrap();

        let all = repo.get_all(&SubscriptionFilter::default(), 100, 0).await.unwrap();
        assert_eq!(all.len(), 3);

        let f = SubscriptionFilter::new(Some(user), Some("YANDEX".into()));
        let hit = repo.get_all(&f, 100, 0).await.unwrap();
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].service_name, "Yandex Plus");

        let page = repo.get_all(&SubscriptionFilter::default(), 1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].service_name, "Netflix");

        let none = repo.get_all(&SubscriptionFilter::default(), 10, 5).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete_missing() {
        let repo = InMemorySubscriptionRepository::new();
        let ghost = new_sub(Uuid::new_v4(), "x", "01-2025", None).into_subscription(99);
        assert!(matches!(repo.update(ghost).await, Err(RepositoryError::NotFound)));
        assert!(matches!(repo.delete(99).await, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_update_keeps_immutable_fields() {
        let repo = InMemorySubscriptionRepository::new();
        let created = repo
            .create(new_sub(Uuid::new_v4(), "yandex", "09-2025", None))
            .await
            .unwrap();
        let mut changed = created.clone();
        changed.price = 500;
        changed.start_date = "01-2020".parse().unwrap();
        let updated = repo.update(changed).await.unwrap();
        assert_eq!(updated.price, 500);
        assert_eq!(updated.start_date, created.start_date);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_calculate_cost_uses_overlap() {
        let repo = InMemorySubscriptionRepository::new();
        let user = Uuid::new_v4();
        repo.create(new_sub(user, "yandex", "09-2025", Some("11-2025")))
            .await
            .unwrap();
        let window = |s: &str, e: &str| CostWindow {
            start: s.parse().unwrap(),
            end: e.parse().unwrap(),
        };
        let f = SubscriptionFilter::default();
        assert_eq!(repo.calculate_cost(&f, window("10-2025", "10-2025")).await.unwrap(), 100);
        assert_eq!(repo.calculate_cost(&f, window("12-2025", "01-2026")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_calculate_cost_overflow_is_error() {
        let repo = InMemorySubscriptionRepository::new();
        let user = Uuid::new_v4();
        for service in ["a", "b"] {
            let mut sub = new_sub(user, service, "01-2025", None);
            sub.price = i64::MAX;
            repo.create(sub).await.unwrap();
        }
        let window = CostWindow {
            start: "01-2025".parse().unwrap(),
            end: "01-2025".parse().unwrap(),
        };
        let err = repo
            .calculate_cost(&SubscriptionFilter::default(), window)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Other(_)));
    }
}

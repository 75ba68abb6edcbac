//! Bude service
//!
//! Owner CRUD on a user's single Bude, the public (cached) map list and the
//! admin form that creates or rewrites any Bude with its links.

use crate::cache::{Cache, CacheLayer};
use crate::db::is_unique_violation;
use crate::db::repositories::{BudeChanges, BudeRepository};
use crate::models::{AdminBudeInput, Bude, BudeInput, Link, PublicBude};
use crate::services::validation::{self, caps, FormErrors};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const CACHE_KEY_ACTIVE: &str = "budes:active";
const CACHE_PATTERN_BUDES: &str = "budes:*";

#[derive(Debug, thiserror::Error)]
pub enum BudeServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// The admin form failed; carries every field error
    #[error("Form has {} error(s)", .0.messages.len())]
    Form(FormErrors),

    #[error("Bude not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub struct BudeService {
    repo: Arc<dyn BudeRepository>,
    cache: Arc<Cache>,
    cache_ttl: Duration,
    /// Bumped by every invalidation
    generation: AtomicU64,
}

impl BudeService {
    pub fn new(repo: Arc<dyn BudeRepository>, cache: Arc<Cache>, cache_ttl: Duration) -> Self {
        Self { repo, cache, cache_ttl, generation: AtomicU64::new(0) }
    }

    /// Active Budes for the public map
    pub async fn list_active(&self) -> Result<Vec<PublicBude>, BudeServiceError> {
        if let Ok(Some(cached)) = self.cache.get::<Vec<PublicBude>>(CACHE_KEY_ACTIVE).await {
            return Ok(cached);
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let budes: Vec<PublicBude> = self
            .repo
            .list_active()
            .await?
            .into_iter()
            .map(PublicBude::from)
            .collect();

        if let Err(e) = self.cache.set(CACHE_KEY_ACTIVE, &budes, self.cache_ttl).await {
            tracing::warn!("Failed to cache bude list: {}", e);
        }
        // A mutation invalidated while we were reading; the list may predate it
        if self.generation.load(Ordering::SeqCst) != generation {
            if let Err(e) = self.cache.delete(CACHE_KEY_ACTIVE).await {
                tracing::warn!("Failed to drop stale bude list: {}", e);
            }
        }
        Ok(budes)
    }

    /// Every Bude, active or not
    pub async fn list_all(&self) -> Result<Vec<Bude>, BudeServiceError> {
        Ok(self.repo.list_all().await?)
    }

    pub async fn get(&self, id: &str) -> Result<Bude, BudeServiceError> {
        self.repo.get_by_id(id).await?.ok_or(BudeServiceError::NotFound)
    }

    /// The caller's Bude, if they own one
    pub async fn own(&self, user_id: &str) -> Result<Option<Bude>, BudeServiceError> {
        Ok(self.repo.get_by_user(user_id).await?)
    }

    pub async fn add(&self, user_id: &str, input: BudeInput) -> Result<Bude, BudeServiceError> {
        let changes = Self::validate_input(input)?;

        if self.repo.get_by_user(user_id).await?.is_some() {
            return Err(BudeServiceError::Conflict("User already owns a Bude".to_string()));
        }

        let now = Utc::now();
        let bude = Bude {
            id: Uuid::new_v4().to_string(),
            user_id: Some(user_id.to_string()),
            name: changes.name,
            description: changes.description,
            lat: changes.lat,
            lng: changes.lng,
            contact: Some(changes.contact),
            active: true,
            links: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        // A concurrent add may have landed since the check above
        let bude = self.repo.create(&bude).await.map_err(|e| {
            if is_unique_violation(&e) {
                BudeServiceError::Conflict("User already owns a Bude".to_string())
            } else {
                BudeServiceError::Internal(e)
            }
        })?;

        tracing::info!(bude_id = %bude.id, user_id, "Bude created");
        self.invalidate().await;
        Ok(bude)
    }

    /// Overwrite the caller's Bude and make it visible again
    pub async fn update(&self, user_id: &str, input: BudeInput) -> Result<Bude, BudeServiceError> {
        let changes = Self::validate_input(input)?;
        let bude = self
            .repo
            .update_by_user(user_id, &changes)
            .await?
            .ok_or(BudeServiceError::NotFound)?;

        self.invalidate().await;
        Ok(bude)
    }

    /// Hide the caller's Bude from the map
    pub async fn delete(&self, user_id: &str) -> Result<(), BudeServiceError> {
        if !self.repo.deactivate_by_user(user_id).await? {
            return Err(BudeServiceError::NotFound);
        }
        self.invalidate().await;
        Ok(())
    }

    /// Create (no `bude_id`) or rewrite a Bude from the admin form
    pub async fn admin_save(&self, input: AdminBudeInput) -> Result<Bude, BudeServiceError> {
        let errors = validation::check_admin_form(&input.name, &input.description, &input.links);
        if !errors.is_empty() {
            return Err(BudeServiceError::Form(errors));
        }

        let (lat, lng) = match (input.lat.parse(), input.lng.parse()) {
            (Some(lat), Some(lng)) => (lat, lng),
            _ => return Err(BudeServiceError::Validation("Invalid coordinates".to_string())),
        };
        validation::check_coordinates(lat, lng).map_err(BudeServiceError::Validation)?;

        let now = Utc::now();
        let bude = match input.bude_id.as_deref() {
            Some(id) => {
                let existing = self.repo.get_by_id(id).await?.ok_or(BudeServiceError::NotFound)?;
                let bude = Bude {
                    name: input.name,
                    description: input.description,
                    lat,
                    lng,
                    links: Self::build_links(id, input.links),
                    updated_at: now,
                    ..existing
                };
                if !self.repo.update_with_links(&bude).await? {
                    return Err(BudeServiceError::NotFound);
                }
                bude
            }
            None => {
                let id = Uuid::new_v4().to_string();
                let bude = Bude {
                    links: Self::build_links(&id, input.links),
                    id,
                    user_id: None,
                    name: input.name,
                    description: input.description,
                    lat,
                    lng,
                    contact: None,
                    active: true,
                    created_at: now,
                    updated_at: now,
                };
                self.repo.create_with_links(&bude).await?
            }
        };

        tracing::info!(bude_id = %bude.id, links = bude.links.len(), "Bude saved by admin");
        self.invalidate().await;
        Ok(bude)
    }

    /// Delete a Bude for good
    pub async fn admin_remove(&self, id: &str) -> Result<(), BudeServiceError> {
        if !self.repo.delete(id).await? {
            return Err(BudeServiceError::NotFound);
        }
        tracing::info!(bude_id = id, "Bude removed by admin");
        self.invalidate().await;
        Ok(())
    }

    fn validate_input(input: BudeInput) -> Result<BudeChanges, BudeServiceError> {
        validation::require_text("name", &input.name, caps::BUDE_NAME)
            .map_err(BudeServiceError::Validation)?;
        validation::require_text("description", &input.description, caps::BUDE_DESCRIPTION)
            .map_err(BudeServiceError::Validation)?;
        validation::check_coordinates(input.lat, input.lng).map_err(BudeServiceError::Validation)?;

        let contact = input.contact.trim().to_string();
        if !validation::is_valid_contact(&contact) {
            return Err(BudeServiceError::Validation(
                "contact must be an e-mail address or a mobile phone number".to_string(),
            ));
        }

        Ok(BudeChanges {
            name: input.name,
            description: input.description,
            lat: input.lat,
            lng: input.lng,
            contact,
        })
    }

    fn build_links(bude_id: &str, values: Vec<String>) -> Vec<Link> {
        values
            .into_iter()
            .map(|value| Link {
                id: Uuid::new_v4().to_string(),
                bude_id: bude_id.to_string(),
                value,
            })
            .collect()
    }

    async fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.cache.delete_pattern(CACHE_PATTERN_BUDES).await {
            tracing::warn!("Failed to invalidate bude cache: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::{SqlxBudeRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{CoordinateInput, User};

    async fn setup() -> (DynDatabasePool, BudeService) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let service = BudeService::new(
            SqlxBudeRepository::boxed(pool.clone()),
            Arc::new(Cache::Memory(MemoryCache::new())),
            Duration::from_secs(60),
        );
        (pool, service)
    }

    async fn user(pool: &DynDatabasePool, email: &str) -> User {
        SqlxUserRepository::new(pool.clone()).create(&User::new("Wirt", email)).await.unwrap()
    }

    fn input(name: &str) -> BudeInput {
        BudeInput {
            name: name.to_string(),
            description: "Bier und Brezn".to_string(),
            lat: 48.14,
            lng: 11.58,
            contact: "wirt@example.com".to_string(),
        }
    }

    fn admin_form(bude_id: Option<&str>, name: &str, links: &[&str]) -> AdminBudeInput {
        AdminBudeInput {
            bude_id: bude_id.map(str::to_string),
            name: name.to_string(),
            description: "Vom Admin".to_string(),
            lat: CoordinateInput::Text("47.5".to_string()),
            lng: CoordinateInput::Number(9.7),
            links: links.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_add_then_own() {
        let (pool, service) = setup().await;
        let owner = user(&pool, "a@example.com").await;

        let created = service.add(&owner.id, input("Hütte")).await.unwrap();
        let own = service.own(&owner.id).await.unwrap().unwrap();
        assert_eq!(own.id, created.id);
        assert_eq!(own.contact.as_deref(), Some("wirt@example.com"));
    }

    #[tokio::test]
    async fn test_second_add_conflicts() {
        let (pool, service) = setup().await;
        let owner = user(&pool, "a@example.com").await;
        service.add(&owner.id, input("Eins")).await.unwrap();

        let err = service.add(&owner.id, input("Zwei")).await.unwrap_err();
        assert!(matches!(err, BudeServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_concurrent_adds_conflict() {
        let (pool, service) = setup().await;
        let owner = user(&pool, "a@example.com").await;

        let (a, b) = tokio::join!(service.add(&owner.id, input("Eins")), service.add(&owner.id, input("Zwei")));
        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(results.iter().filter(|r| matches!(r, Err(BudeServiceError::Conflict(_)))).count(), 1);
        assert_eq!(service.list_active().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_rejects_invalid_fields() {
        let (pool, service) = setup().await;
        let owner = user(&pool, "a@example.com").await;

        let too_long = input(&"x".repeat(caps::BUDE_NAME + 1));
        assert!(matches!(service.add(&owner.id, too_long).await, Err(BudeServiceError::Validation(_))));

        let bad_contact = BudeInput { contact: "nope".into(), ..input("Ok") };
        assert!(matches!(service.add(&owner.id, bad_contact).await, Err(BudeServiceError::Validation(_))));

        let bad_lat = BudeInput { lat: 123.0, ..input("Ok") };
        assert!(matches!(service.add(&owner.id, bad_lat).await, Err(BudeServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_delete_hides_and_update_restores() {
        let (pool, service) = setup().await;
        let owner = user(&pool, "a@example.com").await;
        service.add(&owner.id, input("Hütte")).await.unwrap();
        assert_eq!(service.list_active().await.unwrap().len(), 1);

        service.delete(&owner.id).await.unwrap();
        assert!(service.list_active().await.unwrap().is_empty());

        let updated = service.update(&owner.id, input("Neue Hütte")).await.unwrap();
        assert!(updated.active);
        let listed = service.list_active().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Neue Hütte");
    }

    #[tokio::test]
    async fn test_update_and_delete_without_bude_not_found() {
        let (pool, service) = setup().await;
        let owner = user(&pool, "a@example.com").await;

        assert!(matches!(service.update(&owner.id, input("X")).await, Err(BudeServiceError::NotFound)));
        assert!(matches!(service.delete(&owner.id).await, Err(BudeServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_admin_save_creates_then_replaces_links() {
        let (_pool, service) = setup().await;

        let created = service
            .admin_save(admin_form(None, "Alm", &["https://a.example", "https://b.example"]))
            .await
            .unwrap();
        assert!(created.user_id.is_none());
        assert_eq!(created.lat, 47.5);
        assert_eq!(created.links.len(), 2);

        let updated = service
            .admin_save(admin_form(Some(&created.id), "Alm 2", &["https://c.example"]))
            .await
            .unwrap();
        assert_eq!(updated.id, created.id);

        let stored = service.get(&created.id).await.unwrap();
        assert_eq!(stored.name, "Alm 2");
        let values: Vec<&str> = stored.links.iter().map(|l| l.value.as_str()).collect();
        assert_eq!(values, vec!["https://c.example"]);
    }

    #[tokio::test]
    async fn test_admin_save_collects_form_errors() {
        let (_pool, service) = setup().await;
        let mut form = admin_form(None, "", &[""]);
        form.description = String::new();

        match service.admin_save(form).await {
            Err(BudeServiceError::Form(errors)) => {
                assert_eq!(errors.messages.len(), 3);
                assert_eq!(errors.name, Some(true));
                assert_eq!(errors.links, vec![Some(true)]);
            }
            other => panic!("expected form errors, got {:?}", other.map(|b| b.id)),
        }
    }

    #[tokio::test]
    async fn test_admin_save_bad_coordinates_and_unknown_id() {
        let (_pool, service) = setup().await;

        let mut form = admin_form(None, "Alm", &[]);
        form.lat = CoordinateInput::Text("north".into());
        assert!(matches!(service.admin_save(form).await, Err(BudeServiceError::Validation(_))));

        let unknown = admin_form(Some(&Uuid::new_v4().to_string()), "Alm", &[]);
        assert!(matches!(service.admin_save(unknown).await, Err(BudeServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_admin_save_invalidates_public_list() {
        let (_pool, service) = setup().await;
        assert!(service.list_active().await.unwrap().is_empty());

        let created = service.admin_save(admin_form(None, "Alm", &[])).await.unwrap();
        assert_eq!(service.list_active().await.unwrap().len(), 1);

        service.admin_remove(&created.id).await.unwrap();
        assert!(service.list_active().await.unwrap().is_empty());
        assert!(matches!(service.admin_remove(&created.id).await, Err(BudeServiceError::NotFound)));
    }

    /// Holds the first `list_active` result until a concurrent write is done
    struct PausingRepository {
        inner: Arc<dyn BudeRepository>,
        paused: std::sync::atomic::AtomicBool,
        read_done: Arc<tokio::sync::Notify>,
        resume: Arc<tokio::sync::Notify>,
    }

    #[async_trait::async_trait]
    impl BudeRepository for PausingRepository {
        async fn list_active(&self) -> anyhow::Result<Vec<Bude>> {
            let budes = self.inner.list_active().await?;
            if !self.paused.swap(true, Ordering::SeqCst) {
                self.read_done.notify_one();
                self.resume.notified().await;
            }
            Ok(budes)
        }
        async fn list_all(&self) -> anyhow::Result<Vec<Bude>> {
            self.inner.list_all().await
        }
        async fn get_by_id(&self, id: &str) -> anyhow::Result<Option<Bude>> {
            self.inner.get_by_id(id).await
        }
        async fn get_by_user(&self, user_id: &str) -> anyhow::Result<Option<Bude>> {
            self.inner.get_by_user(user_id).await
        }
        async fn create(&self, bude: &Bude) -> anyhow::Result<Bude> {
            self.inner.create(bude).await
        }
        async fn update_by_user(&self, user_id: &str, changes: &BudeChanges) -> anyhow::Result<Option<Bude>> {
            self.inner.update_by_user(user_id, changes).await
        }
        async fn deactivate_by_user(&self, user_id: &str) -> anyhow::Result<bool> {
            self.inner.deactivate_by_user(user_id).await
        }
        async fn create_with_links(&self, bude: &Bude) -> anyhow::Result<Bude> {
            self.inner.create_with_links(bude).await
        }
        async fn update_with_links(&self, bude: &Bude) -> anyhow::Result<bool> {
            self.inner.update_with_links(bude).await
        }
        async fn delete(&self, id: &str) -> anyhow::Result<bool> {
            self.inner.delete(id).await
        }
    }

    #[tokio::test]
    async fn test_list_read_before_add_is_not_cached() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let read_done = Arc::new(tokio::sync::Notify::new());
        let resume = Arc::new(tokio::sync::Notify::new());
        let service = BudeService::new(
            Arc::new(PausingRepository {
                inner: SqlxBudeRepository::boxed(pool.clone()),
                paused: std::sync::atomic::AtomicBool::new(false),
                read_done: read_done.clone(),
                resume: resume.clone(),
            }),
            Arc::new(Cache::Memory(MemoryCache::new())),
            Duration::from_secs(60),
        );
        let owner = user(&pool, "a@example.com").await;

        let (stale, added) = tokio::join!(service.list_active(), async {
            read_done.notified().await;
            let added = service.add(&owner.id, input("Neu")).await;
            resume.notify_one();
            added
        });
        assert!(stale.unwrap().is_empty());
        added.unwrap();

        assert_eq!(service.list_active().await.unwrap().len(), 1);
    }
}

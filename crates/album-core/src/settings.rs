//! Settings singleton with a short-lived read cache.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::repository::Repository;
use crate::types::{AccessMode, Settings};

#[derive(Debug, Clone)]
struct CachedSettings {
    settings: Settings,
    fetched_at: Instant,
}

/// Reads and writes the global settings.
///
/// Reads go through a cache that is refreshed after `ttl`. Writes are
/// write-through and last-write-wins.
pub struct SettingsStore {
    repo: Arc<dyn Repository>,
    defaults: Settings,
    min_delete_after: Duration,
    ttl: Duration,
    cache: RwLock<Option<CachedSettings>>,
}

impl SettingsStore {
    pub fn new(repo: Arc<dyn Repository>, config: &CoreConfig) -> Self {
        Self {
            repo,
            defaults: Settings {
                access_mode: AccessMode::Open,
                delete_after: config.default_delete_after,
                subscription_channel: None,
            },
            min_delete_after: config.min_delete_after,
            ttl: config.settings_cache_ttl,
            cache: RwLock::new(None),
        }
    }

    /// Load settings, writing defaults on first boot.
    ///
    /// Errors here are fatal for the caller.
    pub async fn bootstrap(&self) -> Result<Settings, CoreError> {
        if self.repo.init_settings_if_absent(&self.defaults).await? {
            info!(
                delete_after_secs = self.defaults.delete_after.as_secs(),
                "No stored settings, wrote defaults"
            );
        }
        let settings = self
            .repo
            .load_settings()
            .await?
            .unwrap_or_else(|| self.defaults.clone());
        self.store(settings.clone()).await;
        Ok(settings)
    }

    /// Current settings, served from cache while fresh.
    ///
    /// On a read failure the last known value (or the defaults) is returned.
    pub async fn current(&self) -> Settings {
        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return cached.settings.clone();
            }
        }

        match self.repo.load_settings().await {
            Ok(Some(settings)) => {
                self.store(settings.clone()).await;
                settings
            }
            Ok(None) => self.defaults.clone(),
            Err(e) => {
                warn!("Failed to load settings, using last known values: {}", e);
                self.cache
                    .read()
                    .await
                    .as_ref()
                    .map(|cached| cached.settings.clone())
                    .unwrap_or_else(|| self.defaults.clone())
            }
        }
    }

    pub async fn set_access_mode(&self, mode: AccessMode) -> Result<Settings, CoreError> {
        self.update(|settings| settings.access_mode = mode).await
    }

    /// Rejects delays below the configured floor.
    pub async fn set_delete_after(&self, delay: Duration) -> Result<Settings, CoreError> {
        if delay < self.min_delete_after {
            return Err(CoreError::DeleteDelayTooShort {
                requested: delay,
                minimum: self.min_delete_after,
            });
        }
        self.update(|settings| settings.delete_after = delay).await
    }

    pub async fn enable_subscription_gate(
        &self,
        channel: impl Into<String>,
    ) -> Result<Settings, CoreError> {
        let channel = channel.into();
        self.update(move |settings| settings.subscription_channel = Some(channel))
            .await
    }

    pub async fn disable_subscription_gate(&self) -> Result<Settings, CoreError> {
        self.update(|settings| settings.subscription_channel = None)
            .await
    }

    pub fn min_delete_after(&self) -> Duration {
        self.min_delete_after
    }

    async fn update(&self, apply: impl FnOnce(&mut Settings)) -> Result<Settings, CoreError> {
        let mut settings = match self.repo.load_settings().await? {
            Some(settings) => settings,
            None => self.defaults.clone(),
        };
        apply(&mut settings);
        self.repo.save_settings(&settings).await?;
        self.store(settings.clone()).await;
        info!(
            mode = settings.access_mode.as_str(),
            delete_after_secs = settings.delete_after.as_secs(),
            channel = settings.subscription_channel.as_deref().unwrap_or("-"),
            "Settings updated"
        );
        Ok(settings)
    }

    async fn store(&self, settings: Settings) {
        *self.cache.write().await = Some(CachedSettings {
            settings,
            fetched_at: Instant::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;

    fn store_with(repo: Arc<MemoryRepository>) -> SettingsStore {
        SettingsStore::new(repo, &CoreConfig::new(-100))
    }

    #[tokio::test]
    async fn test_bootstrap_writes_defaults_once() {
        let repo = Arc::new(MemoryRepository::new());
        let store = store_with(repo.clone());

        let settings = store.bootstrap().await.unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(repo.load_settings().await.unwrap(), Some(Settings::default()));

        store.set_access_mode(AccessMode::Restricted).await.unwrap();
        // A second process start keeps the stored value
        let other = store_with(repo.clone());
        assert_eq!(
            other.bootstrap().await.unwrap().access_mode,
            AccessMode::Restricted
        );
    }

    #[tokio::test]
    async fn test_concurrent_bootstraps_write_once() {
        let repo = Arc::new(MemoryRepository::new());
        let a = store_with(repo.clone());
        let b = store_with(repo.clone());

        let (first, second) = tokio::join!(a.bootstrap(), b.bootstrap());
        assert_eq!(first.unwrap(), second.unwrap());
        assert!(!repo
            .init_settings_if_absent(&Settings::default())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_bootstrap_fails_when_repository_down() {
        let repo = Arc::new(MemoryRepository::new());
        repo.set_unavailable(true);
        let store = store_with(repo);
        assert!(store.bootstrap().await.is_err());
    }

    #[tokio::test]
    async fn test_delete_floor() {
        let store = store_with(Arc::new(MemoryRepository::new()));
        store.bootstrap().await.unwrap();

        let result = store.set_delete_after(Duration::from_secs(4)).await;
        assert!(matches!(result, Err(CoreError::DeleteDelayTooShort { .. })));

        let settings = store.set_delete_after(Duration::from_secs(5)).await.unwrap();
        assert_eq!(settings.delete_after, Duration::from_secs(5));
        assert_eq!(store.current().await.delete_after, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_expires() {
        let repo = Arc::new(MemoryRepository::new());
        let store = store_with(repo.clone());
        store.bootstrap().await.unwrap();

        // Written behind the store's back
        repo.save_settings(&Settings {
            access_mode: AccessMode::Restricted,
            ..Settings::default()
        })
        .await
        .unwrap();

        assert_eq!(store.current().await.access_mode, AccessMode::Open);
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(store.current().await.access_mode, AccessMode::Restricted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_failure_serves_last_known() {
        let repo = Arc::new(MemoryRepository::new());
        let store = store_with(repo.clone());
        store.bootstrap().await.unwrap();
        store.enable_subscription_gate("@news").await.unwrap();

        repo.set_unavailable(true);
        tokio::time::advance(Duration::from_secs(10)).await;
        let settings = store.current().await;
        assert_eq!(settings.subscription_channel.as_deref(), Some("@news"));
    }
}

// Settings Manager - in-memory guild settings backed by the settings store
//
// The cache is loaded once at startup and changes only through writes that
// reached the store first. The write lock is held across the store call, so
// readers never see a cache that disagrees with a completed write.

use poise::serenity_prelude as serenity;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::api::database::{SettingsStore, StoreError};
use crate::models::embed::TemplateError;
use crate::models::guild::{GuildSettings, GuildSettingsRecord};

/// Errors from a settings read-modify-write
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("unknown event type: {0}")]
    UnknownEvent(String),
    #[error(transparent)]
    InvalidFormat(#[from] TemplateError),
    #[error("failed to save settings: {0}")]
    Store(#[from] StoreError),
}

pub struct SettingsManager {
    store: Arc<dyn SettingsStore>,
    guilds: RwLock<HashMap<serenity::GuildId, GuildSettings>>,
}

impl SettingsManager {
    /// Read every persisted guild. Any failure here means the bot cannot serve.
    pub async fn load(store: Arc<dyn SettingsStore>) -> Result<Self, StoreError> {
        let guilds = store
            .load_all()
            .await?
            .into_iter()
            .map(|record| {
                let guild_id = record.guild_id;
                record
                    .into_settings()
                    .map(|settings| (settings.id(), settings))
                    .ok_or(StoreError::InvalidRecord(guild_id))
            })
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok(Self {
            store,
            guilds: RwLock::new(guilds),
        })
    }

    /// Cached settings of a guild. Never touches the store.
    pub async fn get(&self, guild_id: serenity::GuildId) -> Option<GuildSettings> {
        self.guilds.read().await.get(&guild_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.guilds.read().await.len()
    }

    /// Persist `settings`, then replace the cached entry.
    /// On a store failure the cache keeps its previous value.
    pub async fn save(&self, settings: GuildSettings) -> Result<(), StoreError> {
        let mut guilds = self.guilds.write().await;
        self.persist(&mut guilds, settings).await?;
        Ok(())
    }

    // Caller holds the write lock for the whole call.
    async fn persist(
        &self,
        guilds: &mut HashMap<serenity::GuildId, GuildSettings>,
        settings: GuildSettings,
    ) -> Result<GuildSettings, StoreError> {
        self.store
            .upsert(&GuildSettingsRecord::from(&settings))
            .await?;
        guilds.insert(settings.id(), settings.clone());
        Ok(settings)
    }

    /// Return the guild's settings, creating and saving the defaults first if
    /// the guild is unknown. Check and insert happen under one lock, so two
    /// concurrent first sightings create the row once.
    pub async fn get_or_create(
        &self,
        guild_id: serenity::GuildId,
    ) -> Result<(GuildSettings, bool), StoreError> {
        if let Some(settings) = self.get(guild_id).await {
            return Ok((settings, false));
        }

        let mut guilds = self.guilds.write().await;
        if let Some(settings) = guilds.get(&guild_id) {
            return Ok((settings.clone(), false));
        }

        let settings = self
            .persist(&mut guilds, GuildSettings::new(guild_id))
            .await?;
        Ok((settings, true))
    }

    /// Atomic read-modify-write of one guild's settings.
    ///
    /// `apply` runs on a copy (defaults if the guild is unknown). If it fails,
    /// or the store rejects the result, nothing changes.
    pub async fn update<F>(
        &self,
        guild_id: serenity::GuildId,
        apply: F,
    ) -> Result<GuildSettings, SettingsError>
    where
        F: FnOnce(&mut GuildSettings) -> Result<(), SettingsError> + Send,
    {
        let mut guilds = self.guilds.write().await;
        let mut settings = guilds
            .get(&guild_id)
            .cloned()
            .unwrap_or_else(|| GuildSettings::new(guild_id));

        apply(&mut settings)?;

        Ok(self.persist(&mut guilds, settings).await?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::guild::EventConfig;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory store that can be told to fail
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub rows: Mutex<HashMap<u64, GuildSettingsRecord>>,
        pub fail_writes: AtomicBool,
        pub fail_reads: AtomicBool,
        pub writes: AtomicUsize,
    }

    impl MemoryStore {
        pub fn with_rows(rows: Vec<GuildSettingsRecord>) -> Self {
            let store = Self::default();
            store
                .rows
                .lock()
                .unwrap()
                .extend(rows.into_iter().map(|r| (r.guild_id, r)));
            store
        }
    }

    fn failure() -> StoreError {
        StoreError::Database(rusqlite::Error::QueryReturnedNoRows)
    }

    #[async_trait]
    impl SettingsStore for MemoryStore {
        async fn load_all(&self) -> Result<Vec<GuildSettingsRecord>, StoreError> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(failure());
            }
            Ok(self.rows.lock().unwrap().values().cloned().collect())
        }

        async fn upsert(&self, record: &GuildSettingsRecord) -> Result<(), StoreError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(failure());
            }
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.rows
                .lock()
                .unwrap()
                .insert(record.guild_id, record.clone());
            Ok(())
        }
    }

    fn guild(id: u64) -> serenity::GuildId {
        serenity::GuildId::new(id)
    }

    fn configured(id: u64) -> GuildSettings {
        let mut settings = GuildSettings::new(guild(id));
        settings.loggings.member_join = EventConfig {
            enabled: true,
            channel: Some(serenity::ChannelId::new(500)),
            custom_template: r#"{"title":"Welcome {display name}"}"#.to_string(),
        };
        settings
    }

    #[tokio::test]
    async fn test_load_populates_cache() {
        let store = MemoryStore::with_rows(vec![
            GuildSettingsRecord::from(&configured(1)),
            GuildSettingsRecord::from(&GuildSettings::new(guild(2))),
        ]);
        let manager = SettingsManager::load(Arc::new(store)).await.unwrap();

        assert_eq!(manager.len().await, 2);
        assert_eq!(manager.get(guild(1)).await, Some(configured(1)));
        assert_eq!(manager.get(guild(2)).await, Some(GuildSettings::new(guild(2))));
        assert_eq!(manager.get(guild(3)).await, None);
    }

    #[tokio::test]
    async fn test_load_failure_is_error() {
        let store = MemoryStore::default();
        store.fail_reads.store(true, Ordering::SeqCst);
        assert!(SettingsManager::load(Arc::new(store)).await.is_err());
    }

    #[tokio::test]
    async fn test_load_rejects_zero_guild() {
        let store = MemoryStore::with_rows(vec![GuildSettingsRecord::default()]);
        assert!(matches!(
            SettingsManager::load(Arc::new(store)).await,
            Err(StoreError::InvalidRecord(0))
        ));
    }

    #[tokio::test]
    async fn test_save_then_get() {
        let store = Arc::new(MemoryStore::default());
        let manager = SettingsManager::load(store.clone()).await.unwrap();

        manager.save(configured(9)).await.unwrap();

        assert_eq!(manager.get(guild(9)).await, Some(configured(9)));
        assert_eq!(
            store.rows.lock().unwrap().get(&9),
            Some(&GuildSettingsRecord::from(&configured(9)))
        );
    }

    #[tokio::test]
    async fn test_failed_save_keeps_previous_value() {
        let store = Arc::new(MemoryStore::default());
        let manager = SettingsManager::load(store.clone()).await.unwrap();
        let before = GuildSettings::new(guild(9));
        manager.save(before.clone()).await.unwrap();

        store.fail_writes.store(true, Ordering::SeqCst);
        assert!(manager.save(configured(9)).await.is_err());

        assert_eq!(manager.get(guild(9)).await, Some(before));
    }

    #[tokio::test]
    async fn test_failed_save_of_new_guild_not_cached() {
        let store = Arc::new(MemoryStore::default());
        store.fail_writes.store(true, Ordering::SeqCst);
        let manager = SettingsManager::load(store.clone()).await.unwrap();

        assert!(manager.save(configured(4)).await.is_err());
        assert_eq!(manager.get(guild(4)).await, None);
    }

    #[tokio::test]
    async fn test_get_or_create() {
        let store = Arc::new(MemoryStore::default());
        let manager = SettingsManager::load(store.clone()).await.unwrap();

        let (created, is_new) = manager.get_or_create(guild(3)).await.unwrap();
        assert!(is_new);
        assert_eq!(created, GuildSettings::new(guild(3)));

        let (existing, is_new) = manager.get_or_create(guild(3)).await.unwrap();
        assert!(!is_new);
        assert_eq!(existing, created);
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_or_create_keeps_existing_settings() {
        let store = MemoryStore::with_rows(vec![GuildSettingsRecord::from(&configured(3))]);
        let manager = SettingsManager::load(Arc::new(store)).await.unwrap();

        let (settings, is_new) = manager.get_or_create(guild(3)).await.unwrap();
        assert!(!is_new);
        assert_eq!(settings, configured(3));
    }

    #[tokio::test]
    async fn test_concurrent_get_or_create_writes_once() {
        let store = Arc::new(MemoryStore::default());
        let manager = Arc::new(SettingsManager::load(store.clone()).await.unwrap());

        let tasks = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.get_or_create(guild(11)).await.unwrap().1 })
            })
            .collect::<Vec<_>>();

        let mut created = 0;
        for task in tasks {
            if task.await.unwrap() {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_update_applies_and_persists() {
        let store = Arc::new(MemoryStore::default());
        let manager = SettingsManager::load(store.clone()).await.unwrap();

        let updated = manager
            .update(guild(5), |settings| {
                settings.loggings.member_join.enabled = true;
                Ok(())
            })
            .await
            .unwrap();

        assert!(updated.loggings.member_join.enabled);
        assert_eq!(manager.get(guild(5)).await, Some(updated));
        assert!(store.rows.lock().unwrap()[&5].member_join_enabled);
    }

    #[tokio::test]
    async fn test_save_and_update_share_the_cache() {
        let store = Arc::new(MemoryStore::default());
        let manager = SettingsManager::load(store.clone()).await.unwrap();

        manager.save(configured(8)).await.unwrap();
        let updated = manager
            .update(guild(8), |settings| {
                settings.loggings.member_join.custom_template.clear();
                Ok(())
            })
            .await
            .unwrap();
        let (existing, is_new) = manager.get_or_create(guild(8)).await.unwrap();

        assert!(!is_new);
        assert_eq!(existing, updated);
        assert_eq!(existing.loggings.member_join.channel, Some(serenity::ChannelId::new(500)));
        assert_eq!(store.rows.lock().unwrap()[&8], GuildSettingsRecord::from(&updated));
        assert_eq!(store.writes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_update_rejected_by_closure() {
        let store = Arc::new(MemoryStore::default());
        let manager = SettingsManager::load(store.clone()).await.unwrap();
        manager.save(configured(5)).await.unwrap();

        let result = manager
            .update(guild(5), |settings| {
                settings.loggings.member_join.enabled = false;
                Err(SettingsError::UnknownEvent("nope".to_string()))
            })
            .await;

        assert!(matches!(result, Err(SettingsError::UnknownEvent(_))));
        assert_eq!(manager.get(guild(5)).await, Some(configured(5)));
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_update_store_failure_keeps_cache() {
        let store = Arc::new(MemoryStore::default());
        let manager = SettingsManager::load(store.clone()).await.unwrap();
        manager.save(configured(5)).await.unwrap();
        store.fail_writes.store(true, Ordering::SeqCst);

        let result = manager
            .update(guild(5), |settings| {
                settings.loggings.member_join.channel = None;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(SettingsError::Store(_))));
        assert_eq!(manager.get(guild(5)).await, Some(configured(5)));
    }

    #[tokio::test]
    async fn test_concurrent_updates_do_not_lose_writes() {
        let store = Arc::new(MemoryStore::default());
        let manager = Arc::new(SettingsManager::load(store).await.unwrap());

        let channel = {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager
                    .update(guild(6), |s| {
                        s.loggings.member_join.enabled = true;
                        s.loggings.member_join.channel = Some(serenity::ChannelId::new(77));
                        Ok(())
                    })
                    .await
            })
        };
        let format = {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager
                    .update(guild(6), |s| {
                        s.loggings.member_join.custom_template = "{}".to_string();
                        Ok(())
                    })
                    .await
            })
        };
        channel.await.unwrap().unwrap();
        format.await.unwrap().unwrap();

        let settings = manager.get(guild(6)).await.unwrap();
        assert!(settings.loggings.member_join.enabled);
        assert_eq!(settings.loggings.member_join.channel, Some(serenity::ChannelId::new(77)));
        assert_eq!(settings.loggings.member_join.custom_template, "{}");
    }
}

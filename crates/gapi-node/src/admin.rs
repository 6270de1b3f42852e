//! Admin operations
//!
//! Catalogue management (packs, characters, difficulty configs) and the
//! settings pass-through that feeds every tunable.

use gapi_core::clock::{Clock, SystemClock};
use gapi_core::error::{EconomyError, Result};
use gapi_core::types::{Character, CharacterId, Difficulty, DropChances, NftPack, PackId};
use gapi_storage::{LedgerStore, LedgerTx, TxScope};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ServiceConfig;
use crate::settings::{LiveSettings, SettingValue};

/// Fields of a pack create / update
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PackDraft {
    pub name: String,
    pub price: f64,
    pub drop_chances: DropChances,
}

impl PackDraft {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(EconomyError::InvalidParameter(
                "pack name must not be empty".to_string(),
            ));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(EconomyError::InvalidParameter(format!(
                "pack price must be a non-negative number, got {}",
                self.price
            )));
        }
        self.drop_chances.validate()
    }
}

pub struct AdminService {
    store: Arc<dyn LedgerStore>,
    settings: Arc<LiveSettings>,
    clock: Arc<dyn Clock>,
    tx_timeout: Duration,
}

impl AdminService {
    pub fn new(store: Arc<dyn LedgerStore>, settings: Arc<LiveSettings>) -> Self {
        Self {
            store,
            settings,
            clock: Arc::new(SystemClock),
            tx_timeout: ServiceConfig::default().tx_timeout(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_tx_timeout(mut self, tx_timeout: Duration) -> Self {
        self.tx_timeout = tx_timeout;
        self
    }

    // === Packs ===

    pub async fn create_pack(&self, draft: PackDraft) -> Result<NftPack> {
        self.create_pack_with_id(PackId::new(), draft).await
    }

    /// Create with a caller-chosen id, e.g. from seed data
    pub async fn create_pack_with_id(&self, id: PackId, draft: PackDraft) -> Result<NftPack> {
        draft.validate()?;
        let pack = NftPack {
            id,
            name: draft.name.trim().to_string(),
            price: draft.price,
            drop_chances: draft.drop_chances,
            created_at: self.clock.now(),
            deleted_at: None,
        };

        let mut tx = self.begin(TxScope::Exclusive).await?;
        if tx.get_pack(&id).await?.is_some() {
            return Err(EconomyError::InvalidParameter(format!(
                "nft pack {id} already exists"
            )));
        }
        tx.upsert_pack(&pack).await?;
        tx.commit().await?;

        tracing::info!(pack = %pack.id, name = %pack.name, price = pack.price, "nft pack created");
        Ok(pack)
    }

    pub async fn update_pack(&self, id: &PackId, draft: PackDraft) -> Result<NftPack> {
        draft.validate()?;

        let mut tx = self.begin(TxScope::Exclusive).await?;
        let mut pack = tx
            .get_pack(id)
            .await?
            .filter(|p| !p.is_deleted())
            .ok_or_else(|| EconomyError::NotFound(format!("nft pack {id}")))?;
        pack.name = draft.name.trim().to_string();
        pack.price = draft.price;
        pack.drop_chances = draft.drop_chances;
        tx.upsert_pack(&pack).await?;
        tx.commit().await?;

        tracing::info!(pack = %pack.id, "nft pack updated");
        Ok(pack)
    }

    /// Soft delete; the pack disappears from the catalogue and cannot be bought
    pub async fn delete_pack(&self, id: &PackId) -> Result<()> {
        let mut tx = self.begin(TxScope::Exclusive).await?;
        tx.delete_pack(id, self.clock.now()).await?;
        tx.commit().await?;
        tracing::info!(pack = %id, "nft pack deleted");
        Ok(())
    }

    pub async fn list_packs(&self) -> Result<Vec<NftPack>> {
        let mut tx = self.begin(TxScope::Read).await?;
        let packs = tx.list_packs().await?;
        tx.rollback().await?;
        Ok(packs)
    }

    // === Characters ===

    /// Add or rename a character
    pub async fn add_character(&self, id: CharacterId, name: &str) -> Result<Character> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EconomyError::InvalidParameter(
                "character name must not be empty".to_string(),
            ));
        }

        let character = Character {
            id,
            name: name.to_string(),
        };
        let mut tx = self.begin(TxScope::Exclusive).await?;
        tx.upsert_character(&character).await?;
        tx.commit().await?;
        tracing::info!(character = %id, name, "character saved");
        Ok(character)
    }

    // === Game configs ===

    /// Config blob handed to clients starting a game at `complexity`
    pub async fn set_game_config(&self, complexity: i32, config: serde_json::Value) -> Result<()> {
        let difficulty = Difficulty::try_from(complexity)?;
        if !config.is_object() {
            return Err(EconomyError::InvalidParameter(
                "game config must be a JSON object".to_string(),
            ));
        }

        let mut tx = self.begin(TxScope::Exclusive).await?;
        tx.set_game_config(difficulty, config).await?;
        tx.commit().await?;
        tracing::info!(difficulty = %difficulty, "game config updated");
        Ok(())
    }

    // === Settings ===

    pub fn get_setting(&self, key: &str) -> Result<SettingValue> {
        self.settings
            .get(key)
            .ok_or_else(|| EconomyError::NotFound(format!("setting {key}")))
    }

    /// Add or update
    pub fn set_setting(&self, key: &str, value: SettingValue) -> Result<Option<SettingValue>> {
        self.settings.set(key, value)
    }

    pub fn delete_setting(&self, key: &str) -> Result<SettingValue> {
        self.settings
            .delete(key)
            .ok_or_else(|| EconomyError::NotFound(format!("setting {key}")))
    }

    pub fn list_settings(&self) -> Vec<(String, SettingValue)> {
        self.settings.list()
    }

    async fn begin(&self, scope: TxScope) -> Result<Box<dyn LedgerTx>> {
        tokio::time::timeout(self.tx_timeout, self.store.begin(scope))
            .await
            .map_err(|_| {
                EconomyError::TransactionFailed(format!(
                    "no ledger transaction within {:?}",
                    self.tx_timeout
                ))
            })?
    }
}

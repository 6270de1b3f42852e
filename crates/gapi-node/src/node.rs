//! Economy node assembly
//!
//! Wires the in-memory ledger, the live settings store and a payment
//! service into a [`GameEconomyService`] and an [`AdminService`], then seeds
//! the catalogue from configuration.

use gapi_core::clock::{Clock, SystemClock};
use gapi_core::payment::PaymentService;
use gapi_core::types::{CharacterId, PackId};
use gapi_economics::NftGenerator;
use gapi_storage::MemoryLedger;
use std::sync::Arc;

use crate::admin::{AdminService, PackDraft};
use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::service::{GameEconomyService, ServiceLimits};
use crate::settings::LiveSettings;

/// Running economy host
pub struct EconomyNode {
    config: NodeConfig,
    ledger: MemoryLedger,
    settings: Arc<LiveSettings>,
    service: GameEconomyService,
    admin: AdminService,
}

impl EconomyNode {
    /// Assemble on the system clock
    pub async fn start(
        config: NodeConfig,
        payments: Arc<dyn PaymentService>,
    ) -> Result<Self, NodeError> {
        Self::start_with_clock(config, payments, Arc::new(SystemClock)).await
    }

    pub async fn start_with_clock(
        config: NodeConfig,
        payments: Arc<dyn PaymentService>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, NodeError> {
        let settings = Arc::new(LiveSettings::from_json_map(&config.settings).map_err(|e| {
            NodeError::InvalidSetting {
                key: "settings".to_string(),
                reason: e.to_string(),
            }
        })?);

        let ledger = MemoryLedger::new();
        let limits = ServiceLimits::from(&config.service);
        let generator = match config.service.rng_seed {
            Some(seed) => NftGenerator::from_seed(seed),
            None => NftGenerator::from_entropy(),
        };

        let service = GameEconomyService::new(Arc::new(ledger.clone()), settings.clone(), payments)
            .with_generator(generator)
            .with_clock(clock.clone())
            .with_limits(limits);
        let admin = AdminService::new(Arc::new(ledger.clone()), settings.clone())
            .with_clock(clock)
            .with_tx_timeout(limits.tx_timeout);

        let node = Self {
            config,
            ledger,
            settings,
            service,
            admin,
        };
        node.seed_catalogue().await?;

        tracing::info!(
            packs = node.config.packs.len(),
            characters = node.config.characters.len(),
            settings = node.config.settings.len(),
            seeded_rng = node.config.service.rng_seed.is_some(),
            "economy node started"
        );
        Ok(node)
    }

    async fn seed_catalogue(&self) -> Result<(), NodeError> {
        for seed in &self.config.packs {
            let draft = PackDraft {
                name: seed.name.clone(),
                price: seed.price,
                drop_chances: seed.drop_chances.clone(),
            };
            let id = seed.id.map(PackId).unwrap_or_default();
            self.admin.create_pack_with_id(id, draft).await?;
        }

        for seed in &self.config.characters {
            self.admin
                .add_character(CharacterId(seed.id), &seed.name)
                .await?;
        }

        for (difficulty, blob) in self.config.resolved_game_configs()? {
            self.admin
                .set_game_config(i32::from(difficulty.level()), blob)
                .await?;
        }
        Ok(())
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn service(&self) -> &GameEconomyService {
        &self.service
    }

    pub fn admin(&self) -> &AdminService {
        &self.admin
    }

    pub fn settings(&self) -> &Arc<LiveSettings> {
        &self.settings
    }

    pub fn ledger(&self) -> &MemoryLedger {
        &self.ledger
    }
}

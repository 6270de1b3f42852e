//! Shared harness for the end-to-end tests

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use gapi_core::clock::ManualClock;
use gapi_core::payment::PaymentService;
use gapi_core::types::{DropChances, Nft, NftId, NftState, NftType, PackId, UserId};
use gapi_economics::NftGenerator;
use gapi_node::{AdminService, GameEconomyService, LiveSettings, PackDraft, SettingValue};
use gapi_storage::{LedgerStore, MemoryLedger, TxScope};
use std::sync::Arc;

pub struct Harness {
    pub ledger: MemoryLedger,
    pub settings: Arc<LiveSettings>,
    pub clock: Arc<ManualClock>,
    pub service: GameEconomyService,
    pub admin: AdminService,
}

impl Harness {
    pub fn new(payments: Arc<dyn PaymentService>) -> Self {
        let ledger = MemoryLedger::new();
        let settings = Arc::new(LiveSettings::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        ));

        let service = GameEconomyService::new(Arc::new(ledger.clone()), settings.clone(), payments)
            .with_generator(NftGenerator::from_seed(2024))
            .with_clock(clock.clone());
        let admin = AdminService::new(Arc::new(ledger.clone()), settings.clone())
            .with_clock(clock.clone());

        Self {
            ledger,
            settings,
            clock,
            service,
            admin,
        }
    }

    pub fn set(&self, key: &str, value: SettingValue) {
        self.settings.set(key, value).unwrap();
    }

    pub async fn pack(&self, price: f64) -> PackId {
        self.admin
            .create_pack(PackDraft {
                name: "starter".to_string(),
                price,
                drop_chances: DropChances {
                    common: 1.0,
                    ..Default::default()
                },
            })
            .await
            .unwrap()
            .id
    }

    /// Give `owner` an NFT of a fixed tier and level, bypassing the generator
    pub async fn grant_nft(&self, owner: UserId, tier: NftType, max_level: u8) -> NftId {
        let id: NftId = format!("{}-{}", tier, uuid_suffix()).parse().unwrap();
        let nft = Nft {
            id: id.clone(),
            owner_id: owner,
            nft_type: tier,
            max_level,
            state: NftState::Active,
            created_at: Utc::now(),
        };
        let mut tx = self.ledger.begin(TxScope::Player(owner)).await.unwrap();
        tx.insert_nft(&nft).await.unwrap();
        tx.commit().await.unwrap();
        id
    }

    /// New player holding a selected NFT of `tier` at `max_level`
    pub async fn player_with_nft(&self, tier: NftType, max_level: u8) -> (UserId, NftId) {
        let user = UserId::new();
        self.service.get_player_info(&user).await.unwrap();
        let nft = self.grant_nft(user, tier, max_level).await;
        self.service.select_nft(&user, &nft).await.unwrap();
        (user, nft)
    }
}

fn uuid_suffix() -> String {
    UserId::new().to_string()
}

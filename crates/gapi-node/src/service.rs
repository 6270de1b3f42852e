//! Game economy service
//!
//! Orchestrates the pure models with the transactional ledger and the
//! payment collaborator.
//!
//! ## Session state machine
//!
//! ```text
//!                 start_game                  finish_game(win|lose)
//! NoActiveSession ──────────► InProgress ─────────────────────────► Finished
//!        ▲                                                              │
//!        └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every multi-step operation runs in one ledger transaction scoped to the
//! calling player. Payment calls happen before commit; any error drops the
//! transaction, which rolls it back, so a failed settlement never leaves a
//! ledger write behind. Balance checks run before the transaction opens, and
//! a slow payment only delays requests of the same player.
//!
//! `get_player_info` is a mutating read: it creates the player on first
//! contact and persists lazily regenerated energy. `project_energy` is the
//! side-effect-free alternative.

use chrono::{DateTime, Utc};
use gapi_core::clock::{Clock, SystemClock};
use gapi_core::config::ConfigProvider;
use gapi_core::error::{EconomyError, Result};
use gapi_core::payment::{memo, PaymentError, PaymentService, TxRef};
use gapi_core::types::{
    Character, CharacterId, Difficulty, GameResult, GameSession, Nft, NftId, NftPack, NftType,
    PackId, Player, RewardEntry, UserId,
};
use gapi_economics::constants::MIN_CRAFT_INPUTS;
use gapi_economics::{
    claimable_balance, craft_cost, craft_target, validate_claim, ElectricityModel, EnergyModel,
    NftGenerator, RewardModel, RewardOutcome,
};
use gapi_storage::{LedgerStore, LedgerTx, SessionFinish, TxScope};
use parking_lot::Mutex;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn, Level};

use crate::config::ServiceConfig;
use crate::tunables::Tunables;

/// Bounds on the blocking points of a request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServiceLimits {
    pub tx_timeout: Duration,
    pub payment_timeout: Duration,
}

impl Default for ServiceLimits {
    fn default() -> Self {
        Self::from(&ServiceConfig::default())
    }
}

impl From<&ServiceConfig> for ServiceLimits {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            tx_timeout: config.tx_timeout(),
            payment_timeout: config.payment_timeout(),
        }
    }
}

/// Player view returned by `get_player_info`
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlayerInfo {
    pub user_id: UserId,
    pub energy_points: i32,
    pub energy_full: i32,
    pub energy_refilled_at: DateTime<Utc>,
    /// Seconds until the next regenerated point, `None` at full energy
    pub next_energy_in_secs: Option<u64>,
    pub electricity_costs: f64,
    pub electricity_spent: i32,
    pub electricity_max_games: i32,
    pub selected_nft_id: Option<NftId>,
    pub selected_character_id: Option<CharacterId>,
    /// Claim commission, percent
    pub conversion_fee: f64,
}

/// Full player status
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlayerStatus {
    #[serde(flatten)]
    pub info: PlayerInfo,
    /// Wallet balance; omitted when the payment service cannot answer
    pub balance: Option<f64>,
    pub claimable_rewards: f64,
    pub nfts: Vec<Nft>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct EnergyProjection {
    pub energy_points: i32,
    pub energy_full: i32,
    pub next_energy_in_secs: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StartedGame {
    pub session: GameSession,
    /// Difficulty config blob, `{}` when none is configured
    pub game_config: serde_json::Value,
    pub energy_points: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FinishedGame {
    pub session: GameSession,
    pub rewards: RewardOutcome,
    /// Tax charged for this session
    pub electricity_cost: f64,
    /// Player totals after this session
    pub electricity_costs: f64,
    pub electricity_spent: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClaimReceipt {
    pub tx_ref: TxRef,
    pub amount: f64,
    pub fee_percent: f64,
    pub claimable_after: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ElectricityPayment {
    pub amount: f64,
    /// `None` when nothing was owed
    pub tx_ref: Option<TxRef>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct RewardsBalance {
    pub deposited: f64,
    pub withdrawn: f64,
    pub claimable: f64,
}

/// Player-facing economy operations
pub struct GameEconomyService {
    store: Arc<dyn LedgerStore>,
    payments: Arc<dyn PaymentService>,
    tunables: Tunables,
    generator: Mutex<NftGenerator>,
    clock: Arc<dyn Clock>,
    limits: ServiceLimits,
}

impl GameEconomyService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        config: Arc<dyn ConfigProvider>,
        payments: Arc<dyn PaymentService>,
    ) -> Self {
        Self {
            store,
            payments,
            tunables: Tunables::new(config),
            generator: Mutex::new(NftGenerator::from_entropy()),
            clock: Arc::new(SystemClock),
            limits: ServiceLimits::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_generator(mut self, generator: NftGenerator) -> Self {
        self.generator = Mutex::new(generator);
        self
    }

    pub fn with_limits(mut self, limits: ServiceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn tunables(&self) -> &Tunables {
        &self.tunables
    }

    // === Player ===

    /// Current player state, creating the player and applying regeneration
    #[instrument(skip_all, fields(user = %user_id), err(level = Level::WARN))]
    pub async fn get_player_info(&self, user_id: &UserId) -> Result<PlayerInfo> {
        let now = self.clock.now();
        let (full, period) = self.tunables.energy_limits().await;

        let mut tx = self.begin(TxScope::Player(*user_id)).await?;
        let player = self.load_player(tx.as_mut(), user_id, full, period, now).await?;
        tx.commit().await?;

        Ok(self.player_info(&player, full, period, now).await)
    }

    /// `get_player_info` plus wallet balance, claimable rewards and owned NFTs
    #[instrument(skip_all, fields(user = %user_id), err(level = Level::WARN))]
    pub async fn get_player_status(&self, user_id: &UserId) -> Result<PlayerStatus> {
        let now = self.clock.now();
        let (full, period) = self.tunables.energy_limits().await;

        let mut tx = self.begin(TxScope::Player(*user_id)).await?;
        let player = self.load_player(tx.as_mut(), user_id, full, period, now).await?;
        let nfts = tx.list_active_nfts(user_id).await?;
        let deposited = tx.deposited_total(user_id).await?;
        let withdrawn = tx.withdrawn_total(user_id).await?;
        tx.commit().await?;

        let balance = match self
            .settle("balance query", self.payments.get_balance(user_id))
            .await
        {
            Ok(balance) => Some(balance),
            Err(e) => {
                warn!(user = %user_id, error = %e, "balance unavailable, omitted from status");
                None
            }
        };

        Ok(PlayerStatus {
            info: self.player_info(&player, full, period, now).await,
            balance,
            claimable_rewards: claimable_balance(deposited, withdrawn),
            nfts,
        })
    }

    /// Energy the player would have now; persists nothing
    pub async fn project_energy(&self, user_id: &UserId) -> Result<EnergyProjection> {
        let now = self.clock.now();
        let (full, period) = self.tunables.energy_limits().await;

        let mut tx = self.begin(TxScope::Read).await?;
        let player = tx.get_player(user_id).await?;
        tx.rollback().await?;

        Ok(match player {
            Some(player) => EnergyProjection {
                energy_points: EnergyModel::project(&player, full, period, now),
                energy_full: full,
                next_energy_in_secs: EnergyModel::next_point_in(&player, full, period, now)
                    .map(|d| d.as_secs()),
            },
            // A first read would create the player at full energy
            None => EnergyProjection {
                energy_points: full,
                energy_full: full,
                next_energy_in_secs: None,
            },
        })
    }

    // === NFTs ===

    pub async fn list_nfts(&self, user_id: &UserId) -> Result<Vec<Nft>> {
        let mut tx = self.begin(TxScope::Read).await?;
        let nfts = tx.list_active_nfts(user_id).await?;
        tx.rollback().await?;
        Ok(nfts)
    }

    pub async fn list_packs(&self) -> Result<Vec<NftPack>> {
        let mut tx = self.begin(TxScope::Read).await?;
        let packs = tx.list_packs().await?;
        tx.rollback().await?;
        Ok(packs)
    }

    /// Mint one NFT from `pack_id`, select it and charge the pack price
    #[instrument(skip_all, fields(user = %user_id, pack = %pack_id), err(level = Level::WARN))]
    pub async fn buy_nft_pack(&self, user_id: &UserId, pack_id: &PackId) -> Result<Nft> {
        let now = self.clock.now();
        let (full, period) = self.tunables.energy_limits().await;

        let quoted = {
            let mut tx = self.begin(TxScope::Read).await?;
            let pack = live_pack(tx.as_mut(), pack_id).await?;
            tx.rollback().await?;
            pack.price
        };
        if quoted > 0.0 {
            self.ensure_funds(user_id, quoted).await?;
        }

        let mut tx = self.begin(TxScope::Player(*user_id)).await?;
        self.load_player(tx.as_mut(), user_id, full, period, now).await?;
        let pack = live_pack(tx.as_mut(), pack_id).await?;

        let nft = self.generator.lock().generate(&pack, *user_id, now)?;
        tx.insert_nft(&nft).await?;
        tx.select_nft(user_id, &nft.id).await?;

        if pack.price > 0.0 {
            let tx_ref = self
                .settle(
                    "pack payment",
                    self.payments.pay(user_id, pack.price, memo::NFT_PACK),
                )
                .await?;
            debug!(tx = %tx_ref, price = pack.price, "pack paid");
        }

        tx.commit().await?;
        info!(nft = %nft.id, tier = %nft.nft_type, max_level = nft.max_level, price = pack.price, "nft pack bought");
        Ok(nft)
    }

    /// Consume `nft_ids` into one NFT of the tier above the lowest input
    #[instrument(skip_all, fields(user = %user_id, inputs = nft_ids.len()), err(level = Level::WARN))]
    pub async fn craft_nft(&self, user_id: &UserId, nft_ids: &[NftId]) -> Result<Nft> {
        if nft_ids.len() < MIN_CRAFT_INPUTS {
            return Err(EconomyError::InvalidCraftInput(nft_ids.len()));
        }

        let now = self.clock.now();
        let (full, period) = self.tunables.energy_limits().await;
        let step = self.tunables.craft_step_amount().await;

        let quoted = {
            let mut tx = self.begin(TxScope::Read).await?;
            let (_, target) = craft_inputs(tx.as_mut(), user_id, nft_ids).await?;
            tx.rollback().await?;
            craft_cost(target, step)
        };
        if quoted > 0.0 {
            self.ensure_funds(user_id, quoted).await?;
        }

        let mut tx = self.begin(TxScope::Player(*user_id)).await?;
        self.load_player(tx.as_mut(), user_id, full, period, now).await?;
        let (inputs, target) = craft_inputs(tx.as_mut(), user_id, nft_ids).await?;
        let cost = craft_cost(target, step);

        let crafted = self.generator.lock().craft(&inputs, *user_id, now)?;
        tx.insert_nft(&crafted).await?;
        tx.consume_nfts(nft_ids, &crafted.id, now).await?;
        tx.select_nft(user_id, &crafted.id).await?;

        if cost > 0.0 {
            let tx_ref = self
                .settle("craft payment", self.payments.pay(user_id, cost, memo::CRAFT))
                .await?;
            debug!(tx = %tx_ref, cost, "craft paid");
        }

        tx.commit().await?;
        info!(nft = %crafted.id, tier = %crafted.nft_type, cost, "nft crafted");
        Ok(crafted)
    }

    /// Point the player at one of their active NFTs
    #[instrument(skip_all, fields(user = %user_id, nft = %nft_id), err(level = Level::WARN))]
    pub async fn select_nft(&self, user_id: &UserId, nft_id: &NftId) -> Result<()> {
        let now = self.clock.now();
        let (full, period) = self.tunables.energy_limits().await;

        let mut tx = self.begin(TxScope::Player(*user_id)).await?;
        self.load_player(tx.as_mut(), user_id, full, period, now).await?;

        let nft = tx
            .get_nft(nft_id)
            .await?
            .filter(|n| n.owner_id == *user_id)
            .ok_or_else(|| EconomyError::NotFound(format!("nft {nft_id}")))?;
        if !nft.is_usable() {
            return Err(EconomyError::InvalidParameter(format!(
                "nft {nft_id} is no longer active"
            )));
        }

        tx.select_nft(user_id, nft_id).await?;
        tx.commit().await
    }

    pub async fn list_characters(&self) -> Result<Vec<Character>> {
        let mut tx = self.begin(TxScope::Read).await?;
        let characters = tx.list_characters().await?;
        tx.rollback().await?;
        Ok(characters)
    }

    #[instrument(skip_all, fields(user = %user_id, character = %character_id), err(level = Level::WARN))]
    pub async fn select_character(
        &self,
        user_id: &UserId,
        character_id: CharacterId,
    ) -> Result<()> {
        let now = self.clock.now();
        let (full, period) = self.tunables.energy_limits().await;

        let mut tx = self.begin(TxScope::Player(*user_id)).await?;
        self.load_player(tx.as_mut(), user_id, full, period, now).await?;
        if tx.get_character(character_id).await?.is_none() {
            return Err(EconomyError::NotFound(format!("character {character_id}")));
        }

        tx.select_character(user_id, character_id).await?;
        tx.commit().await
    }

    // === Sessions ===

    /// Open a session on the selected NFT and spend one energy point
    #[instrument(skip_all, fields(user = %user_id, complexity = complexity, training = is_training), err(level = Level::WARN))]
    pub async fn start_game(
        &self,
        user_id: &UserId,
        complexity: i32,
        is_training: bool,
    ) -> Result<StartedGame> {
        let difficulty = Difficulty::try_from(complexity)?;
        let max_games = self.tunables.electricity_max_games().await;
        let now = self.clock.now();
        let (full, period) = self.tunables.energy_limits().await;

        let mut tx = self.begin(TxScope::Player(*user_id)).await?;
        let player = self.load_player(tx.as_mut(), user_id, full, period, now).await?;

        if player.electricity_spent >= max_games {
            return Err(EconomyError::NotEnoughElectricity {
                spent: player.electricity_spent,
                max_games,
            });
        }

        let nft_id = player
            .selected_nft_id
            .clone()
            .ok_or_else(|| EconomyError::NotFound("selected nft".to_string()))?;
        let nft = tx
            .get_nft(&nft_id)
            .await?
            .filter(|n| n.owner_id == *user_id && n.is_usable())
            .ok_or_else(|| EconomyError::NotFound(format!("nft {nft_id}")))?;
        if !nft.supports(difficulty) {
            return Err(EconomyError::LevelMismatch {
                max_level: nft.max_level,
                complexity: difficulty.level(),
            });
        }
        if player.energy_points <= 0 {
            return Err(EconomyError::NotEnoughEnergy);
        }

        let game_config = tx
            .get_game_config(difficulty)
            .await?
            .unwrap_or_else(|| serde_json::json!({}));

        let session = GameSession::start(*user_id, nft_id, difficulty, is_training, now);
        tx.insert_session(&session).await?;

        // Spending from full starts a fresh regeneration window
        let restart_window = (player.energy_points >= full).then_some(now);
        let player = tx.spend_energy(user_id, restart_window).await?;

        tx.commit().await?;
        info!(session = %session.id, difficulty = %difficulty, energy = player.energy_points, "game started");
        Ok(StartedGame {
            session,
            game_config,
            energy_points: player.energy_points,
        })
    }

    /// Close the current session, pay rewards and accrue electricity
    #[instrument(skip_all, fields(user = %user_id, result_code = result_code, blocks_done = blocks_done), err(level = Level::WARN))]
    pub async fn finish_game(
        &self,
        user_id: &UserId,
        result_code: i32,
        blocks_done: i32,
    ) -> Result<FinishedGame> {
        let result = GameResult::try_from(result_code)?;
        if blocks_done < 0 {
            return Err(EconomyError::InvalidParameter(format!(
                "blocks done must not be negative, got {blocks_done}"
            )));
        }
        let now = self.clock.now();

        let mut tx = self.begin(TxScope::Player(*user_id)).await?;
        let session = tx
            .current_session(user_id)
            .await?
            .ok_or(EconomyError::NoActiveSession)?;

        let (rewards, electricity_cost) = if session.is_training {
            (
                RewardOutcome {
                    rewards_amount: 0.0,
                    viewers: 0,
                },
                0.0,
            )
        } else {
            let nft = tx
                .get_nft(&session.nft_id)
                .await?
                .ok_or_else(|| EconomyError::NotFound(format!("nft {}", session.nft_id)))?;
            self.session_payout(nft.nft_type, session.complexity, result)
                .await
        };

        let finished = tx
            .finish_session(
                &session.id,
                SessionFinish {
                    result,
                    blocks_done,
                    electricity_costs: electricity_cost,
                    finished_at: now,
                },
            )
            .await?;

        let player = if session.is_training {
            tx.get_player(user_id)
                .await?
                .ok_or_else(|| EconomyError::NotFound(format!("player {user_id}")))?
        } else {
            tx.deposit_rewards(&RewardEntry::deposit(
                *user_id,
                Some(session.id),
                rewards.rewards_amount,
                now,
            ))
            .await?;
            tx.add_electricity(user_id, electricity_cost).await?
        };

        tx.commit().await?;
        info!(
            session = %finished.id,
            result = %result,
            rewards = rewards.rewards_amount,
            viewers = rewards.viewers,
            electricity = electricity_cost,
            "game finished"
        );
        Ok(FinishedGame {
            session: finished,
            rewards,
            electricity_cost,
            electricity_costs: player.electricity_costs,
            electricity_spent: player.electricity_spent,
        })
    }

    pub async fn current_session(&self, user_id: &UserId) -> Result<Option<GameSession>> {
        let mut tx = self.begin(TxScope::Read).await?;
        let session = tx.current_session(user_id).await?;
        tx.rollback().await?;
        Ok(session)
    }

    /// Most recent first
    pub async fn list_sessions(&self, user_id: &UserId, limit: usize) -> Result<Vec<GameSession>> {
        let mut tx = self.begin(TxScope::Read).await?;
        let sessions = tx.list_sessions(user_id, limit).await?;
        tx.rollback().await?;
        Ok(sessions)
    }

    // === Rewards & electricity ===

    pub async fn rewards_balance(&self, user_id: &UserId) -> Result<RewardsBalance> {
        let mut tx = self.begin(TxScope::Read).await?;
        let deposited = tx.deposited_total(user_id).await?;
        let withdrawn = tx.withdrawn_total(user_id).await?;
        tx.rollback().await?;
        Ok(RewardsBalance {
            deposited,
            withdrawn,
            claimable: claimable_balance(deposited, withdrawn),
        })
    }

    /// Withdraw `amount` from the rewards ledger and settle it externally
    ///
    /// The withdrawal is committed only after settlement succeeds.
    #[instrument(skip_all, fields(user = %user_id, amount = amount), err(level = Level::WARN))]
    pub async fn claim_rewards(&self, user_id: &UserId, amount: f64) -> Result<ClaimReceipt> {
        let min_claim = self.tunables.min_rewards_to_claim().await;
        let fee_percent = self.tunables.convert_commission().await;
        let distribution = self.tunables.fee_distribution().await;
        let now = self.clock.now();

        let mut tx = self.begin(TxScope::Player(*user_id)).await?;
        let deposited = tx.deposited_total(user_id).await?;
        let withdrawn = tx.withdrawn_total(user_id).await?;
        validate_claim(amount, min_claim, deposited, withdrawn)?;

        tx.withdraw_rewards(&RewardEntry::withdraw(*user_id, amount, now))
            .await?;
        let tx_ref = self
            .settle(
                "rewards claim",
                self.payments
                    .claim_rewards(user_id, amount, fee_percent, &distribution),
            )
            .await?;

        if let Err(e) = tx.commit().await {
            error!(tx = %tx_ref, error = %e, "claim settled but ledger commit failed");
            return Err(e);
        }
        info!(tx = %tx_ref, fee_percent, "rewards claimed");
        Ok(ClaimReceipt {
            tx_ref,
            amount,
            fee_percent,
            claimable_after: claimable_balance(deposited, withdrawn + amount),
        })
    }

    /// Settle accumulated electricity and reset the counters
    #[instrument(skip_all, fields(user = %user_id), err(level = Level::WARN))]
    pub async fn pay_for_electricity(&self, user_id: &UserId) -> Result<ElectricityPayment> {
        let now = self.clock.now();
        let (full, period) = self.tunables.energy_limits().await;

        let owed = {
            let mut tx = self.begin(TxScope::Read).await?;
            let player = tx.get_player(user_id).await?;
            tx.rollback().await?;
            player.map_or(0.0, |p| p.electricity_costs)
        };
        if owed > 0.0 {
            self.ensure_funds(user_id, owed).await?;
        }

        let mut tx = self.begin(TxScope::Player(*user_id)).await?;
        let player = self.load_player(tx.as_mut(), user_id, full, period, now).await?;

        if player.electricity_costs <= 0.0 {
            // Untaxed sessions still count against the game limit
            if player.electricity_spent > 0 {
                tx.reset_electricity(user_id).await?;
            }
            tx.commit().await?;
            return Ok(ElectricityPayment {
                amount: 0.0,
                tx_ref: None,
            });
        }

        let amount = player.electricity_costs;
        tx.reset_electricity(user_id).await?;
        let tx_ref = self
            .settle(
                "electricity payment",
                self.payments.pay(user_id, amount, memo::ELECTRICITY),
            )
            .await?;

        tx.commit().await?;
        info!(tx = %tx_ref, amount, "electricity paid");
        Ok(ElectricityPayment {
            amount,
            tx_ref: Some(tx_ref),
        })
    }

    // === Internals ===

    async fn begin(&self, scope: TxScope) -> Result<Box<dyn LedgerTx>> {
        match tokio::time::timeout(self.limits.tx_timeout, self.store.begin(scope)).await {
            Ok(tx) => tx,
            Err(_) => Err(EconomyError::TransactionFailed(format!(
                "no ledger transaction within {:?}",
                self.limits.tx_timeout
            ))),
        }
    }

    /// Run one payment call under the payment timeout
    async fn settle<T, F>(&self, what: &str, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, PaymentError>>,
    {
        match tokio::time::timeout(self.limits.payment_timeout, call).await {
            Ok(result) => result.map_err(EconomyError::from),
            Err(_) => Err(EconomyError::Timeout(format!(
                "{what} exceeded {:?}",
                self.limits.payment_timeout
            ))),
        }
    }

    /// Balance check made outside the ledger transaction; `pay` still
    /// rejects a shortfall that appears afterwards
    async fn ensure_funds(&self, user_id: &UserId, required: f64) -> Result<()> {
        let available = self
            .settle("balance query", self.payments.get_balance(user_id))
            .await?;
        if available < required {
            return Err(EconomyError::InsufficientBalance {
                required,
                available,
            });
        }
        Ok(())
    }

    /// Load or create the player and persist any regenerated energy
    async fn load_player(
        &self,
        tx: &mut dyn LedgerTx,
        user_id: &UserId,
        energy_full: i32,
        recovery_period: Duration,
        now: DateTime<Utc>,
    ) -> Result<Player> {
        let Some(player) = tx.get_player(user_id).await? else {
            let player = Player::new(*user_id, energy_full, now);
            tx.create_player(&player).await?;
            info!(user = %user_id, energy = energy_full, "player created");
            return Ok(player);
        };

        match EnergyModel::refill(&player, energy_full, recovery_period, now) {
            Some(refill) => {
                let player = tx
                    .refill_energy(user_id, refill.points, refill.refilled_at)
                    .await?;
                if refill.points < 0 {
                    debug!(user = %user_id, energy = player.energy_points, "energy trimmed to lowered cap");
                } else {
                    debug!(user = %user_id, points = refill.points, energy = player.energy_points, "energy regenerated");
                }
                Ok(player)
            }
            None => Ok(player),
        }
    }

    async fn session_payout(
        &self,
        nft_type: NftType,
        difficulty: Difficulty,
        result: GameResult,
    ) -> (RewardOutcome, f64) {
        let table = self.tunables.viewers_table().await;
        let model = RewardModel::new(self.tunables.viewers_multiplier().await);
        let rewards = model.compute(&table, nft_type, difficulty, result);

        let mode = self.tunables.electricity_mode().await;
        let percent = self.tunables.electricity_percent(nft_type).await;
        let cost =
            ElectricityModel::cost(mode, nft_type, result, rewards.rewards_amount, |_| percent);
        (rewards, cost)
    }

    async fn player_info(
        &self,
        player: &Player,
        energy_full: i32,
        recovery_period: Duration,
        now: DateTime<Utc>,
    ) -> PlayerInfo {
        PlayerInfo {
            user_id: player.user_id,
            energy_points: player.energy_points,
            energy_full,
            energy_refilled_at: player.energy_refilled_at,
            next_energy_in_secs: EnergyModel::next_point_in(player, energy_full, recovery_period, now)
                .map(|d| d.as_secs()),
            electricity_costs: player.electricity_costs,
            electricity_spent: player.electricity_spent,
            electricity_max_games: self.tunables.electricity_max_games().await,
            selected_nft_id: player.selected_nft_id.clone(),
            selected_character_id: player.selected_character_id,
            conversion_fee: self.tunables.convert_commission().await,
        }
    }
}

/// Pack that is still in the catalogue
async fn live_pack(tx: &mut dyn LedgerTx, pack_id: &PackId) -> Result<NftPack> {
    tx.get_pack(pack_id)
        .await?
        .filter(|p| !p.is_deleted())
        .ok_or_else(|| EconomyError::NotFound(format!("nft pack {pack_id}")))
}

/// Crafting inputs owned and active, with the tier they craft into
async fn craft_inputs(
    tx: &mut dyn LedgerTx,
    user_id: &UserId,
    nft_ids: &[NftId],
) -> Result<(Vec<Nft>, NftType)> {
    let inputs = tx.get_active_nfts(user_id, nft_ids).await?;
    if inputs.len() != nft_ids.len() {
        return Err(EconomyError::NotAllNftsFound {
            requested: nft_ids.len(),
            found: inputs.len(),
        });
    }

    let tiers: Vec<NftType> = inputs.iter().map(|n| n.nft_type).collect();
    let target = craft_target(&tiers)?;
    Ok((inputs, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::LiveSettings;
    use async_trait::async_trait;
    use gapi_core::clock::ManualClock;
    use gapi_core::payment::{FeeDistribution, MockPaymentService};
    use gapi_core::types::{DropChances, NftState};
    use gapi_storage::MemoryLedger;

    /// Payment service that never answers in time
    struct StalledPayments;

    #[async_trait]
    impl PaymentService for StalledPayments {
        async fn get_balance(&self, _: &UserId) -> std::result::Result<f64, PaymentError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(0.0)
        }

        async fn pay(&self, _: &UserId, _: f64, _: &str) -> std::result::Result<TxRef, PaymentError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(TxRef("late".into()))
        }

        async fn claim_rewards(
            &self,
            _: &UserId,
            _: f64,
            _: f64,
            _: &FeeDistribution,
        ) -> std::result::Result<TxRef, PaymentError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(TxRef("late".into()))
        }
    }

    /// Payment service that answers every call after six seconds
    struct SlowPayments;

    #[async_trait]
    impl PaymentService for SlowPayments {
        async fn get_balance(&self, _: &UserId) -> std::result::Result<f64, PaymentError> {
            tokio::time::sleep(Duration::from_secs(6)).await;
            Ok(100.0)
        }

        async fn pay(&self, _: &UserId, _: f64, _: &str) -> std::result::Result<TxRef, PaymentError> {
            tokio::time::sleep(Duration::from_secs(6)).await;
            Ok(TxRef("slow".into()))
        }

        async fn claim_rewards(
            &self,
            _: &UserId,
            _: f64,
            _: f64,
            _: &FeeDistribution,
        ) -> std::result::Result<TxRef, PaymentError> {
            tokio::time::sleep(Duration::from_secs(6)).await;
            Ok(TxRef("slow".into()))
        }
    }

    fn service(store: &MemoryLedger, payments: Arc<dyn PaymentService>) -> GameEconomyService {
        GameEconomyService::new(Arc::new(store.clone()), Arc::new(LiveSettings::new()), payments)
            .with_generator(NftGenerator::from_seed(7))
            .with_clock(Arc::new(ManualClock::default()))
    }

    async fn seed_pack(store: &MemoryLedger, price: f64) -> PackId {
        let pack = NftPack {
            id: PackId::new(),
            name: "starter".into(),
            price,
            drop_chances: DropChances {
                common: 1.0,
                ..Default::default()
            },
            created_at: Utc::now(),
            deleted_at: None,
        };
        let mut tx = store.begin(TxScope::Exclusive).await.unwrap();
        tx.upsert_pack(&pack).await.unwrap();
        tx.commit().await.unwrap();
        pack.id
    }

    #[tokio::test]
    async fn test_player_info_creates_full_player() {
        let store = MemoryLedger::new();
        let svc = service(&store, Arc::new(MockPaymentService::new()));
        let user = UserId::new();

        let info = svc.get_player_info(&user).await.unwrap();
        assert_eq!(info.energy_points, 3);
        assert_eq!(info.energy_full, 3);
        assert_eq!(info.selected_nft_id, None);
        assert_eq!(info.next_energy_in_secs, None);
        assert_eq!(info.conversion_fee, 5.0);
    }

    #[tokio::test]
    async fn test_paid_pack_rolls_back_on_short_balance() {
        let store = MemoryLedger::new();
        let pack = seed_pack(&store, 25.0).await;
        let mut payments = MockPaymentService::new();
        payments.expect_get_balance().returning(|_| Ok(10.0));
        payments.expect_pay().never();

        let svc = service(&store, Arc::new(payments));
        let user = UserId::new();
        let err = svc.buy_nft_pack(&user, &pack).await.unwrap_err();
        assert_eq!(
            err,
            EconomyError::InsufficientBalance {
                required: 25.0,
                available: 10.0
            }
        );
        assert!(svc.list_nfts(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_settlement_failure_rolls_back_pack() {
        let store = MemoryLedger::new();
        let pack = seed_pack(&store, 5.0).await;
        let mut payments = MockPaymentService::new();
        payments.expect_get_balance().returning(|_| Ok(100.0));
        payments
            .expect_pay()
            .times(1)
            .returning(|_, _, _| Err(PaymentError::Rejected("chain congested".into())));

        let svc = service(&store, Arc::new(payments));
        let user = UserId::new();
        assert!(matches!(
            svc.buy_nft_pack(&user, &pack).await,
            Err(EconomyError::SettlementFailed(_))
        ));
        assert!(svc.list_nfts(&user).await.unwrap().is_empty());
        assert_eq!(svc.get_player_info(&user).await.unwrap().selected_nft_id, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_payment_timeout_rolls_back() {
        let store = MemoryLedger::new();
        let pack = seed_pack(&store, 5.0).await;
        let svc = service(&store, Arc::new(StalledPayments)).with_limits(ServiceLimits {
            tx_timeout: Duration::from_secs(1),
            payment_timeout: Duration::from_millis(200),
        });

        let user = UserId::new();
        assert!(matches!(
            svc.buy_nft_pack(&user, &pack).await,
            Err(EconomyError::Timeout(_))
        ));
        assert!(svc.list_nfts(&user).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transaction_acquisition_timeout() {
        let store = MemoryLedger::new();
        let svc = service(&store, Arc::new(MockPaymentService::new())).with_limits(ServiceLimits {
            tx_timeout: Duration::from_millis(100),
            payment_timeout: Duration::from_secs(1),
        });

        let held = store.begin(TxScope::Exclusive).await.unwrap();
        assert!(matches!(
            svc.get_player_info(&UserId::new()).await,
            Err(EconomyError::TransactionFailed(_))
        ));
        drop(held);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_payment_only_delays_its_own_player() {
        let store = MemoryLedger::new();
        let pack = seed_pack(&store, 5.0).await;
        let svc = service(&store, Arc::new(SlowPayments));
        assert!(svc.limits.tx_timeout > svc.limits.payment_timeout);

        let (buyer, other) = (UserId::new(), UserId::new());
        let start = tokio::time::Instant::now();
        // balance answers at 6s, payment at 12s
        let (bought, other_info, buyer_info) = tokio::join!(
            svc.buy_nft_pack(&buyer, &pack),
            async {
                tokio::time::sleep(Duration::from_secs(7)).await;
                let info = svc.get_player_info(&other).await;
                (info, start.elapsed())
            },
            async {
                tokio::time::sleep(Duration::from_secs(7)).await;
                let info = svc.get_player_info(&buyer).await;
                (info, start.elapsed())
            },
        );

        let nft = bought.unwrap();
        let (info, at) = other_info;
        assert_eq!(info.unwrap().energy_points, 3);
        assert!(at < Duration::from_secs(8), "unrelated player must not wait");

        // the buyer's own read waits for the purchase and sees it
        let (info, at) = buyer_info;
        assert_eq!(info.unwrap().selected_nft_id, Some(nft.id));
        assert!(at >= Duration::from_secs(12));
    }

    #[tokio::test]
    async fn test_status_omits_unavailable_balance() {
        let store = MemoryLedger::new();
        let mut payments = MockPaymentService::new();
        payments
            .expect_get_balance()
            .returning(|_| Err(PaymentError::Unavailable("maintenance".into())));

        let svc = service(&store, Arc::new(payments));
        let status = svc.get_player_status(&UserId::new()).await.unwrap();
        assert_eq!(status.balance, None);
        assert_eq!(status.claimable_rewards, 0.0);
        assert!(status.nfts.is_empty());
    }

    #[tokio::test]
    async fn test_select_foreign_nft_not_found() {
        let store = MemoryLedger::new();
        let pack = seed_pack(&store, 0.0).await;
        let svc = service(&store, Arc::new(MockPaymentService::new()));

        let owner = UserId::new();
        let nft = svc.buy_nft_pack(&owner, &pack).await.unwrap();
        assert_eq!(nft.state, NftState::Active);

        let other = UserId::new();
        assert!(matches!(
            svc.select_nft(&other, &nft.id).await,
            Err(EconomyError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_character_not_found() {
        let store = MemoryLedger::new();
        let svc = service(&store, Arc::new(MockPaymentService::new()));
        assert!(matches!(
            svc.select_character(&UserId::new(), CharacterId(99)).await,
            Err(EconomyError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_bad_codes_rejected_before_storage() {
        let store = MemoryLedger::new();
        let svc = service(&store, Arc::new(MockPaymentService::new()));
        let user = UserId::new();

        assert!(matches!(
            svc.start_game(&user, 4, false).await,
            Err(EconomyError::InvalidParameter(_))
        ));
        assert!(matches!(
            svc.finish_game(&user, 3, 0).await,
            Err(EconomyError::InvalidResult(3))
        ));
        assert!(matches!(
            svc.finish_game(&user, 1, 0).await,
            Err(EconomyError::NoActiveSession)
        ));
        assert_eq!(store.stats().commits(), 0);
    }

    #[tokio::test]
    async fn test_craft_needs_two_inputs() {
        let store = MemoryLedger::new();
        let svc = service(&store, Arc::new(MockPaymentService::new()));
        let one: Vec<NftId> = vec!["a".parse().unwrap()];
        assert_eq!(
            svc.craft_nft(&UserId::new(), &one).await.unwrap_err(),
            EconomyError::InvalidCraftInput(1)
        );
    }
}

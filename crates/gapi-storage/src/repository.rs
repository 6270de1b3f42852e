//! Player ledger repository contract
//!
//! Every economy operation runs inside one [`LedgerTx`]. A transaction that
//! is dropped without [`LedgerTx::commit`] rolls back, so a cancelled or
//! timed-out request never leaves partial writes behind.
//!
//! Transactions are opened for a [`TxScope`]. Player transactions only
//! exclude other transactions of the same player; catalogue writes take the
//! whole store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gapi_core::error::Result;
use gapi_core::types::{
    Character, CharacterId, Difficulty, GameResult, GameSession, Nft, NftId, NftPack, PackId,
    Player, RewardEntry, SessionId, UserId,
};

/// What a transaction may write, and therefore what it waits for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxScope {
    /// Snapshot reads; writes are rejected and nothing is waited for
    Read,
    /// Writes limited to this player's rows; serialised per player
    Player(UserId),
    /// Unrestricted; waits for every open player transaction
    Exclusive,
}

/// Source of ledger transactions
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a transaction; waits while a conflicting transaction is open
    async fn begin(&self, scope: TxScope) -> Result<Box<dyn LedgerTx>>;
}

/// Fields written when a session finishes
#[derive(Clone, Debug, PartialEq)]
pub struct SessionFinish {
    pub result: GameResult,
    pub blocks_done: i32,
    pub electricity_costs: f64,
    pub finished_at: DateTime<Utc>,
}

/// One open transaction over players, NFTs, packs, sessions and rewards
#[async_trait]
pub trait LedgerTx: Send {
    // === Players ===
    async fn get_player(&mut self, user_id: &UserId) -> Result<Option<Player>>;

    async fn create_player(&mut self, player: &Player) -> Result<()>;

    /// Add `points` and move the regeneration anchor to `refilled_at`
    ///
    /// `points` is negative when a lowered cap is enforced.
    async fn refill_energy(
        &mut self,
        user_id: &UserId,
        points: i32,
        refilled_at: DateTime<Utc>,
    ) -> Result<Player>;

    /// Spend one point; `reset_refilled_at` restarts the regeneration window
    async fn spend_energy(
        &mut self,
        user_id: &UserId,
        reset_refilled_at: Option<DateTime<Utc>>,
    ) -> Result<Player>;

    async fn select_nft(&mut self, user_id: &UserId, nft_id: &NftId) -> Result<()>;

    async fn select_character(&mut self, user_id: &UserId, character_id: CharacterId)
        -> Result<()>;

    /// Accumulate one taxed session
    async fn add_electricity(&mut self, user_id: &UserId, cost: f64) -> Result<Player>;

    async fn reset_electricity(&mut self, user_id: &UserId) -> Result<()>;

    // === NFTs ===
    async fn insert_nft(&mut self, nft: &Nft) -> Result<()>;

    async fn get_nft(&mut self, nft_id: &NftId) -> Result<Option<Nft>>;

    async fn list_active_nfts(&mut self, owner_id: &UserId) -> Result<Vec<Nft>>;

    /// Active NFTs among `ids` owned by `owner_id`
    async fn get_active_nfts(&mut self, owner_id: &UserId, ids: &[NftId]) -> Result<Vec<Nft>>;

    /// Mark crafting inputs consumed into `into`
    async fn consume_nfts(&mut self, ids: &[NftId], into: &NftId, at: DateTime<Utc>)
        -> Result<()>;

    // === Packs ===
    async fn get_pack(&mut self, pack_id: &PackId) -> Result<Option<NftPack>>;

    /// Packs not soft-deleted
    async fn list_packs(&mut self) -> Result<Vec<NftPack>>;

    async fn upsert_pack(&mut self, pack: &NftPack) -> Result<()>;

    async fn delete_pack(&mut self, pack_id: &PackId, at: DateTime<Utc>) -> Result<()>;

    // === Characters ===
    async fn get_character(&mut self, character_id: CharacterId) -> Result<Option<Character>>;

    async fn list_characters(&mut self) -> Result<Vec<Character>>;

    async fn upsert_character(&mut self, character: &Character) -> Result<()>;

    // === Game configs ===
    async fn get_game_config(&mut self, difficulty: Difficulty)
        -> Result<Option<serde_json::Value>>;

    async fn set_game_config(
        &mut self,
        difficulty: Difficulty,
        config: serde_json::Value,
    ) -> Result<()>;

    // === Sessions ===
    /// The player's unfinished session, if any
    async fn current_session(&mut self, user_id: &UserId) -> Result<Option<GameSession>>;

    /// Fails with `SessionInProgress` while another session is unfinished
    async fn insert_session(&mut self, session: &GameSession) -> Result<()>;

    async fn finish_session(
        &mut self,
        session_id: &SessionId,
        finish: SessionFinish,
    ) -> Result<GameSession>;

    /// Most recent first
    async fn list_sessions(&mut self, user_id: &UserId, limit: usize) -> Result<Vec<GameSession>>;

    // === Rewards ===
    async fn deposit_rewards(&mut self, entry: &RewardEntry) -> Result<()>;

    async fn withdraw_rewards(&mut self, entry: &RewardEntry) -> Result<()>;

    async fn deposited_total(&mut self, user_id: &UserId) -> Result<f64>;

    async fn withdrawn_total(&mut self, user_id: &UserId) -> Result<f64>;

    // === Lifecycle ===
    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

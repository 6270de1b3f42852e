//! In-memory ledger with serialisable transactions
//!
//! A transaction works on a private copy of the tables. `commit` publishes
//! the copy; `rollback` or dropping the transaction discards it.
//!
//! Locking follows [`TxScope`]:
//!
//! - `Player(id)` holds that player's lock and a shared writer slot for its
//!   whole lifetime, so two concurrent `StartGame` calls of one player
//!   cannot both observe "no current session". Commit publishes only the
//!   player's own rows, leaving other players' concurrent commits intact.
//! - `Exclusive` holds the writer slot alone and publishes every table.
//! - `Read` takes no lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gapi_core::error::{EconomyError, Result};
use gapi_core::types::{
    Character, CharacterId, Difficulty, GameSession, Nft, NftId, NftPack, NftState, OperationType,
    PackId, Player, RewardEntry, SessionId, UserId,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::repository::{LedgerStore, LedgerTx, SessionFinish, TxScope};

/// All tables
#[derive(Clone, Debug, Default)]
struct LedgerState {
    players: HashMap<UserId, Player>,
    nfts: HashMap<NftId, Nft>,
    packs: HashMap<PackId, NftPack>,
    characters: BTreeMap<CharacterId, Character>,
    game_configs: HashMap<Difficulty, serde_json::Value>,
    /// Insertion order
    sessions: Vec<GameSession>,
    rewards: Vec<RewardEntry>,
}

impl LedgerState {
    /// Replace `user_id`'s rows in `into` with the ones in `self`
    fn publish_player(self, user_id: &UserId, into: &mut LedgerState) {
        let LedgerState {
            mut players,
            nfts,
            sessions,
            rewards,
            ..
        } = self;

        if let Some(player) = players.remove(user_id) {
            into.players.insert(*user_id, player);
        }
        into.nfts.retain(|_, n| n.owner_id != *user_id);
        into.nfts
            .extend(nfts.into_iter().filter(|(_, n)| n.owner_id == *user_id));
        into.sessions.retain(|s| s.user_id != *user_id);
        into.sessions
            .extend(sessions.into_iter().filter(|s| s.user_id == *user_id));
        into.rewards.retain(|e| e.user_id != *user_id);
        into.rewards
            .extend(rewards.into_iter().filter(|e| e.user_id == *user_id));
    }
}

/// Commit / rollback counters
#[derive(Debug, Default)]
pub struct LedgerStats {
    commits: AtomicU64,
    rollbacks: AtomicU64,
}

impl LedgerStats {
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    pub fn rollbacks(&self) -> u64 {
        self.rollbacks.load(Ordering::Relaxed)
    }
}

type PlayerLock = Arc<tokio::sync::Mutex<()>>;

/// In-memory ledger store
#[derive(Clone, Default)]
pub struct MemoryLedger {
    state: Arc<Mutex<LedgerState>>,
    /// Shared by player transactions, exclusive for catalogue writes
    writers: Arc<RwLock<()>>,
    player_locks: Arc<Mutex<HashMap<UserId, PlayerLock>>>,
    stats: Arc<LedgerStats>,
    fail_next_commit: Arc<AtomicBool>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &LedgerStats {
        &self.stats
    }

    /// Make the next commit fail with `TransactionFailed`
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn begin(&self, scope: TxScope) -> Result<Box<dyn LedgerTx>> {
        let guard = match scope {
            TxScope::Read => TxGuard::Unlocked,
            TxScope::Player(user_id) => {
                let writer = self.writers.clone().read_owned().await;
                let lock = self.player_locks.lock().entry(user_id).or_default().clone();
                TxGuard::Player {
                    _writer: writer,
                    _player: lock.lock_owned().await,
                }
            }
            TxScope::Exclusive => TxGuard::Exclusive {
                _writer: self.writers.clone().write_owned().await,
            },
        };

        let working = self.state.lock().clone();
        Ok(Box::new(MemoryTx {
            scope,
            shared: self.state.clone(),
            working,
            _guard: guard,
            stats: self.stats.clone(),
            fail_commit: self.fail_next_commit.clone(),
            finished: false,
        }))
    }
}

/// Locks held by an open transaction, released on drop
enum TxGuard {
    Unlocked,
    Player {
        _writer: OwnedRwLockReadGuard<()>,
        _player: OwnedMutexGuard<()>,
    },
    Exclusive {
        _writer: OwnedRwLockWriteGuard<()>,
    },
}

/// Open transaction on a [`MemoryLedger`]
pub struct MemoryTx {
    scope: TxScope,
    shared: Arc<Mutex<LedgerState>>,
    working: LedgerState,
    _guard: TxGuard,
    stats: Arc<LedgerStats>,
    fail_commit: Arc<AtomicBool>,
    finished: bool,
}

impl MemoryTx {
    /// Writes to `owner`'s rows, or to the catalogues when `None`
    fn check_write(&self, owner: Option<&UserId>) -> Result<()> {
        match (self.scope, owner) {
            (TxScope::Exclusive, _) => Ok(()),
            (TxScope::Player(user_id), Some(owner)) if user_id == *owner => Ok(()),
            (scope, _) => Err(EconomyError::TransactionFailed(format!(
                "write outside {scope:?} transaction"
            ))),
        }
    }

    fn player_mut(&mut self, user_id: &UserId) -> Result<&mut Player> {
        self.check_write(Some(user_id))?;
        self.working
            .players
            .get_mut(user_id)
            .ok_or_else(|| EconomyError::NotFound(format!("player {user_id}")))
    }

    fn ledger_total(&self, user_id: &UserId, op: OperationType) -> f64 {
        self.working
            .rewards
            .iter()
            .filter(|e| e.user_id == *user_id && e.operation == op)
            .map(|e| e.amount)
            .sum()
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if !self.finished {
            self.stats.rollbacks.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("ledger transaction dropped, rolled back");
        }
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn get_player(&mut self, user_id: &UserId) -> Result<Option<Player>> {
        Ok(self.working.players.get(user_id).cloned())
    }

    async fn create_player(&mut self, player: &Player) -> Result<()> {
        self.check_write(Some(&player.user_id))?;
        if self.working.players.contains_key(&player.user_id) {
            return Err(EconomyError::InvalidParameter(format!(
                "player {} already exists",
                player.user_id
            )));
        }
        self.working.players.insert(player.user_id, player.clone());
        Ok(())
    }

    async fn refill_energy(
        &mut self,
        user_id: &UserId,
        points: i32,
        refilled_at: DateTime<Utc>,
    ) -> Result<Player> {
        let player = self.player_mut(user_id)?;
        player.energy_points += points;
        player.energy_refilled_at = refilled_at;
        Ok(player.clone())
    }

    async fn spend_energy(
        &mut self,
        user_id: &UserId,
        reset_refilled_at: Option<DateTime<Utc>>,
    ) -> Result<Player> {
        let player = self.player_mut(user_id)?;
        if player.energy_points <= 0 {
            return Err(EconomyError::NotEnoughEnergy);
        }
        player.energy_points -= 1;
        if let Some(at) = reset_refilled_at {
            player.energy_refilled_at = at;
        }
        Ok(player.clone())
    }

    async fn select_nft(&mut self, user_id: &UserId, nft_id: &NftId) -> Result<()> {
        self.player_mut(user_id)?.selected_nft_id = Some(nft_id.clone());
        Ok(())
    }

    async fn select_character(
        &mut self,
        user_id: &UserId,
        character_id: CharacterId,
    ) -> Result<()> {
        self.player_mut(user_id)?.selected_character_id = Some(character_id);
        Ok(())
    }

    async fn add_electricity(&mut self, user_id: &UserId, cost: f64) -> Result<Player> {
        let player = self.player_mut(user_id)?;
        player.electricity_costs += cost.max(0.0);
        player.electricity_spent += 1;
        Ok(player.clone())
    }

    async fn reset_electricity(&mut self, user_id: &UserId) -> Result<()> {
        let player = self.player_mut(user_id)?;
        player.electricity_costs = 0.0;
        player.electricity_spent = 0;
        Ok(())
    }

    async fn insert_nft(&mut self, nft: &Nft) -> Result<()> {
        self.check_write(Some(&nft.owner_id))?;
        if self.working.nfts.contains_key(&nft.id) {
            return Err(EconomyError::InvalidParameter(format!(
                "nft {} already exists",
                nft.id
            )));
        }
        self.working.nfts.insert(nft.id.clone(), nft.clone());
        Ok(())
    }

    async fn get_nft(&mut self, nft_id: &NftId) -> Result<Option<Nft>> {
        Ok(self.working.nfts.get(nft_id).cloned())
    }

    async fn list_active_nfts(&mut self, owner_id: &UserId) -> Result<Vec<Nft>> {
        let mut nfts: Vec<Nft> = self
            .working
            .nfts
            .values()
            .filter(|n| n.owner_id == *owner_id && n.is_usable())
            .cloned()
            .collect();
        nfts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(nfts)
    }

    async fn get_active_nfts(&mut self, owner_id: &UserId, ids: &[NftId]) -> Result<Vec<Nft>> {
        let mut seen = std::collections::HashSet::new();
        Ok(ids
            .iter()
            .filter(|id| seen.insert((*id).clone()))
            .filter_map(|id| self.working.nfts.get(id))
            .filter(|n| n.owner_id == *owner_id && n.is_usable())
            .cloned()
            .collect())
    }

    async fn consume_nfts(
        &mut self,
        ids: &[NftId],
        into: &NftId,
        at: DateTime<Utc>,
    ) -> Result<()> {
        for id in ids {
            let owner = self
                .working
                .nfts
                .get(id)
                .map(|n| n.owner_id)
                .ok_or_else(|| EconomyError::NotFound(format!("nft {id}")))?;
            self.check_write(Some(&owner))?;
            let nft = self
                .working
                .nfts
                .get_mut(id)
                .ok_or_else(|| EconomyError::NotFound(format!("nft {id}")))?;
            if !nft.is_usable() {
                return Err(EconomyError::InvalidParameter(format!(
                    "nft {id} is no longer active"
                )));
            }
            nft.state = NftState::ConsumedByCraft {
                into: into.clone(),
                at,
            };
        }
        Ok(())
    }

    async fn get_pack(&mut self, pack_id: &PackId) -> Result<Option<NftPack>> {
        Ok(self.working.packs.get(pack_id).cloned())
    }

    async fn list_packs(&mut self) -> Result<Vec<NftPack>> {
        let mut packs: Vec<NftPack> = self
            .working
            .packs
            .values()
            .filter(|p| !p.is_deleted())
            .cloned()
            .collect();
        packs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        Ok(packs)
    }

    async fn upsert_pack(&mut self, pack: &NftPack) -> Result<()> {
        self.check_write(None)?;
        self.working.packs.insert(pack.id, pack.clone());
        Ok(())
    }

    async fn delete_pack(&mut self, pack_id: &PackId, at: DateTime<Utc>) -> Result<()> {
        self.check_write(None)?;
        let pack = self
            .working
            .packs
            .get_mut(pack_id)
            .filter(|p| !p.is_deleted())
            .ok_or_else(|| EconomyError::NotFound(format!("nft pack {pack_id}")))?;
        pack.deleted_at = Some(at);
        Ok(())
    }

    async fn get_character(&mut self, character_id: CharacterId) -> Result<Option<Character>> {
        Ok(self.working.characters.get(&character_id).cloned())
    }

    async fn list_characters(&mut self) -> Result<Vec<Character>> {
        Ok(self.working.characters.values().cloned().collect())
    }

    async fn upsert_character(&mut self, character: &Character) -> Result<()> {
        self.check_write(None)?;
        self.working
            .characters
            .insert(character.id, character.clone());
        Ok(())
    }

    async fn get_game_config(
        &mut self,
        difficulty: Difficulty,
    ) -> Result<Option<serde_json::Value>> {
        Ok(self.working.game_configs.get(&difficulty).cloned())
    }

    async fn set_game_config(
        &mut self,
        difficulty: Difficulty,
        config: serde_json::Value,
    ) -> Result<()> {
        self.check_write(None)?;
        self.working.game_configs.insert(difficulty, config);
        Ok(())
    }

    async fn current_session(&mut self, user_id: &UserId) -> Result<Option<GameSession>> {
        Ok(self
            .working
            .sessions
            .iter()
            .rev()
            .find(|s| s.user_id == *user_id && !s.is_finished())
            .cloned())
    }

    async fn insert_session(&mut self, session: &GameSession) -> Result<()> {
        self.check_write(Some(&session.user_id))?;
        let open = self
            .working
            .sessions
            .iter()
            .any(|s| s.user_id == session.user_id && !s.is_finished());
        if open {
            return Err(EconomyError::SessionInProgress);
        }
        self.working.sessions.push(session.clone());
        Ok(())
    }

    async fn finish_session(
        &mut self,
        session_id: &SessionId,
        finish: SessionFinish,
    ) -> Result<GameSession> {
        let not_found = || EconomyError::NotFound(format!("game session {session_id}"));
        let owner = self
            .working
            .sessions
            .iter()
            .find(|s| s.id == *session_id)
            .map(|s| s.user_id)
            .ok_or_else(not_found)?;
        self.check_write(Some(&owner))?;

        let session = self
            .working
            .sessions
            .iter_mut()
            .find(|s| s.id == *session_id)
            .ok_or_else(not_found)?;
        if session.is_finished() {
            return Err(EconomyError::NoActiveSession);
        }

        session.result = Some(finish.result);
        session.blocks_done = finish.blocks_done;
        session.electricity_costs = finish.electricity_costs;
        session.finished_at = Some(finish.finished_at);
        Ok(session.clone())
    }

    async fn list_sessions(&mut self, user_id: &UserId, limit: usize) -> Result<Vec<GameSession>> {
        Ok(self
            .working
            .sessions
            .iter()
            .rev()
            .filter(|s| s.user_id == *user_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn deposit_rewards(&mut self, entry: &RewardEntry) -> Result<()> {
        self.check_write(Some(&entry.user_id))?;
        if entry.operation != OperationType::Deposit {
            return Err(EconomyError::InvalidParameter(
                "deposit entry must be a deposit".to_string(),
            ));
        }
        self.working.rewards.push(entry.clone());
        Ok(())
    }

    async fn withdraw_rewards(&mut self, entry: &RewardEntry) -> Result<()> {
        self.check_write(Some(&entry.user_id))?;
        if entry.operation != OperationType::Withdraw {
            return Err(EconomyError::InvalidParameter(
                "withdraw entry must be a withdrawal".to_string(),
            ));
        }
        self.working.rewards.push(entry.clone());
        Ok(())
    }

    async fn deposited_total(&mut self, user_id: &UserId) -> Result<f64> {
        Ok(self.ledger_total(user_id, OperationType::Deposit))
    }

    async fn withdrawn_total(&mut self, user_id: &UserId) -> Result<f64> {
        Ok(self.ledger_total(user_id, OperationType::Withdraw))
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        self.finished = true;
        if self.fail_commit.swap(false, Ordering::SeqCst) {
            self.stats.rollbacks.fetch_add(1, Ordering::Relaxed);
            return Err(EconomyError::TransactionFailed(
                "commit rejected by store".to_string(),
            ));
        }

        let working = std::mem::take(&mut self.working);
        {
            let mut shared = self.shared.lock();
            match self.scope {
                TxScope::Read => {}
                TxScope::Player(user_id) => working.publish_player(&user_id, &mut shared),
                TxScope::Exclusive => *shared = working,
            }
        }
        self.stats.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        self.finished = true;
        self.stats.rollbacks.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gapi_core::types::{GameResult, NftType};
    use std::time::Duration;

    fn nft(owner: UserId, id: &str, tier: NftType) -> Nft {
        Nft {
            id: id.parse().unwrap(),
            owner_id: owner,
            nft_type: tier,
            max_level: 2,
            state: NftState::Active,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = MemoryLedger::new();
        let user = UserId::new();

        let mut tx = store.begin(TxScope::Exclusive).await.unwrap();
        tx.create_player(&Player::new(user, 3, Utc::now())).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin(TxScope::Exclusive).await.unwrap();
        assert!(tx.get_player(&user).await.unwrap().is_some());
        assert_eq!(store.stats().commits(), 1);
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = MemoryLedger::new();
        let user = UserId::new();

        {
            let mut tx = store.begin(TxScope::Exclusive).await.unwrap();
            tx.create_player(&Player::new(user, 3, Utc::now())).await.unwrap();
        }

        let mut tx = store.begin(TxScope::Exclusive).await.unwrap();
        assert!(tx.get_player(&user).await.unwrap().is_none());
        assert_eq!(store.stats().rollbacks(), 1);
    }

    #[tokio::test]
    async fn test_failed_commit_discards_writes() {
        let store = MemoryLedger::new();
        let user = UserId::new();
        store.fail_next_commit();

        let mut tx = store.begin(TxScope::Exclusive).await.unwrap();
        tx.create_player(&Player::new(user, 3, Utc::now())).await.unwrap();
        assert!(matches!(
            tx.commit().await,
            Err(EconomyError::TransactionFailed(_))
        ));

        let mut tx = store.begin(TxScope::Exclusive).await.unwrap();
        assert!(tx.get_player(&user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_spend_energy_floor() {
        let store = MemoryLedger::new();
        let user = UserId::new();
        let mut tx = store.begin(TxScope::Exclusive).await.unwrap();
        let mut p = Player::new(user, 3, Utc::now());
        p.energy_points = 0;
        tx.create_player(&p).await.unwrap();

        assert!(matches!(
            tx.spend_energy(&user, None).await,
            Err(EconomyError::NotEnoughEnergy)
        ));
    }

    #[tokio::test]
    async fn test_one_unfinished_session_per_player() {
        let store = MemoryLedger::new();
        let user = UserId::new();
        let mut tx = store.begin(TxScope::Exclusive).await.unwrap();

        let first = GameSession::start(user, "a".parse().unwrap(), Difficulty::Easy, false, Utc::now());
        tx.insert_session(&first).await.unwrap();

        let second = GameSession::start(user, "a".parse().unwrap(), Difficulty::Easy, false, Utc::now());
        assert!(matches!(
            tx.insert_session(&second).await,
            Err(EconomyError::SessionInProgress)
        ));

        tx.finish_session(
            &first.id,
            SessionFinish {
                result: GameResult::Win,
                blocks_done: 4,
                electricity_costs: 1.0,
                finished_at: Utc::now(),
            },
        )
        .await
        .unwrap();
        tx.insert_session(&second).await.unwrap();

        let current = tx.current_session(&user).await.unwrap().unwrap();
        assert_eq!(current.id, second.id);
        assert_eq!(tx.list_sessions(&user, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_finished_session_is_immutable() {
        let store = MemoryLedger::new();
        let user = UserId::new();
        let mut tx = store.begin(TxScope::Exclusive).await.unwrap();
        let session = GameSession::start(user, "a".parse().unwrap(), Difficulty::Easy, true, Utc::now());
        tx.insert_session(&session).await.unwrap();

        let finish = SessionFinish {
            result: GameResult::Lose,
            blocks_done: 1,
            electricity_costs: 0.0,
            finished_at: Utc::now(),
        };
        tx.finish_session(&session.id, finish.clone()).await.unwrap();
        assert!(matches!(
            tx.finish_session(&session.id, finish).await,
            Err(EconomyError::NoActiveSession)
        ));
    }

    #[tokio::test]
    async fn test_consumed_nfts_leave_active_set() {
        let store = MemoryLedger::new();
        let user = UserId::new();
        let mut tx = store.begin(TxScope::Exclusive).await.unwrap();
        tx.insert_nft(&nft(user, "a1", NftType::Common)).await.unwrap();
        tx.insert_nft(&nft(user, "a2", NftType::Common)).await.unwrap();
        tx.insert_nft(&nft(UserId::new(), "b1", NftType::Common)).await.unwrap();

        let ids: Vec<NftId> = vec!["a1".parse().unwrap(), "a2".parse().unwrap(), "b1".parse().unwrap()];
        // b1 belongs to someone else
        assert_eq!(tx.get_active_nfts(&user, &ids).await.unwrap().len(), 2);

        let into: NftId = "c1".parse().unwrap();
        tx.consume_nfts(&ids[..2], &into, Utc::now()).await.unwrap();
        assert!(tx.list_active_nfts(&user).await.unwrap().is_empty());

        let consumed = tx.get_nft(&ids[0]).await.unwrap().unwrap();
        assert!(matches!(consumed.state, NftState::ConsumedByCraft { .. }));
        assert!(tx.consume_nfts(&ids[..1], &into, Utc::now()).await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_ids_counted_once() {
        let store = MemoryLedger::new();
        let user = UserId::new();
        let mut tx = store.begin(TxScope::Exclusive).await.unwrap();
        tx.insert_nft(&nft(user, "a1", NftType::Common)).await.unwrap();

        let ids: Vec<NftId> = vec!["a1".parse().unwrap(), "a1".parse().unwrap()];
        assert_eq!(tx.get_active_nfts(&user, &ids).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reward_aggregates() {
        let store = MemoryLedger::new();
        let user = UserId::new();
        let now = Utc::now();
        let mut tx = store.begin(TxScope::Exclusive).await.unwrap();
        tx.deposit_rewards(&RewardEntry::deposit(user, None, 30.0, now)).await.unwrap();
        tx.deposit_rewards(&RewardEntry::deposit(user, None, 12.5, now)).await.unwrap();
        tx.withdraw_rewards(&RewardEntry::withdraw(user, 20.0, now)).await.unwrap();
        tx.deposit_rewards(&RewardEntry::deposit(UserId::new(), None, 99.0, now)).await.unwrap();

        assert_eq!(tx.deposited_total(&user).await.unwrap(), 42.5);
        assert_eq!(tx.withdrawn_total(&user).await.unwrap(), 20.0);
        assert!(tx.withdraw_rewards(&RewardEntry::deposit(user, None, 1.0, now)).await.is_err());
    }

    #[tokio::test]
    async fn test_same_player_transactions_are_serialised() {
        let store = MemoryLedger::new();
        let user = UserId::new();
        let first = store.begin(TxScope::Player(user)).await.unwrap();

        let second =
            tokio::time::timeout(Duration::from_millis(50), store.begin(TxScope::Player(user))).await;
        assert!(second.is_err(), "second begin must wait for the first");
        let catalogue =
            tokio::time::timeout(Duration::from_millis(50), store.begin(TxScope::Exclusive)).await;
        assert!(catalogue.is_err(), "catalogue writes wait for player transactions");

        first.rollback().await.unwrap();
        assert!(
            tokio::time::timeout(Duration::from_millis(50), store.begin(TxScope::Player(user)))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_players_commit_side_by_side() {
        let store = MemoryLedger::new();
        let (a, b) = (UserId::new(), UserId::new());

        let mut tx_a = store.begin(TxScope::Player(a)).await.unwrap();
        let mut tx_b =
            tokio::time::timeout(Duration::from_millis(50), store.begin(TxScope::Player(b)))
                .await
                .expect("other players do not wait")
                .unwrap();

        tx_a.create_player(&Player::new(a, 3, Utc::now())).await.unwrap();
        tx_a.insert_nft(&nft(a, "a1", NftType::Common)).await.unwrap();
        tx_b.create_player(&Player::new(b, 3, Utc::now())).await.unwrap();
        tx_b.deposit_rewards(&RewardEntry::deposit(b, None, 7.0, Utc::now()))
            .await
            .unwrap();

        // b commits first; a's snapshot predates it and must not erase it
        tx_b.commit().await.unwrap();
        tx_a.commit().await.unwrap();

        let mut tx = store.begin(TxScope::Read).await.unwrap();
        assert!(tx.get_player(&a).await.unwrap().is_some());
        assert!(tx.get_player(&b).await.unwrap().is_some());
        assert_eq!(tx.list_active_nfts(&a).await.unwrap().len(), 1);
        assert_eq!(tx.deposited_total(&b).await.unwrap(), 7.0);
    }

    #[tokio::test]
    async fn test_read_does_not_wait() {
        let store = MemoryLedger::new();
        let _held = store.begin(TxScope::Exclusive).await.unwrap();
        assert!(
            tokio::time::timeout(Duration::from_millis(50), store.begin(TxScope::Read))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_scope_limits_writes() {
        let store = MemoryLedger::new();
        let (a, b) = (UserId::new(), UserId::new());

        let mut tx = store.begin(TxScope::Exclusive).await.unwrap();
        tx.create_player(&Player::new(b, 3, Utc::now())).await.unwrap();
        tx.insert_nft(&nft(b, "b1", NftType::Common)).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin(TxScope::Player(a)).await.unwrap();
        tx.create_player(&Player::new(a, 3, Utc::now())).await.unwrap();
        assert!(matches!(
            tx.spend_energy(&b, None).await,
            Err(EconomyError::TransactionFailed(_))
        ));
        assert!(matches!(
            tx.consume_nfts(&["b1".parse().unwrap()], &"x".parse().unwrap(), Utc::now())
                .await,
            Err(EconomyError::TransactionFailed(_))
        ));
        assert!(matches!(
            tx.set_game_config(Difficulty::Easy, serde_json::json!({})).await,
            Err(EconomyError::TransactionFailed(_))
        ));
        // reads across players stay allowed
        assert!(tx.get_player(&b).await.unwrap().is_some());

        let mut read = store.begin(TxScope::Read).await.unwrap();
        assert!(matches!(
            read.create_player(&Player::new(UserId::new(), 3, Utc::now())).await,
            Err(EconomyError::TransactionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_deleted_pack_hidden_from_catalogue() {
        use gapi_core::types::DropChances;

        let store = MemoryLedger::new();
        let mut tx = store.begin(TxScope::Exclusive).await.unwrap();
        let pack = NftPack {
            id: PackId::new(),
            name: "starter".into(),
            price: 0.0,
            drop_chances: DropChances { common: 1.0, ..Default::default() },
            created_at: Utc::now(),
            deleted_at: None,
        };
        tx.upsert_pack(&pack).await.unwrap();
        assert_eq!(tx.list_packs().await.unwrap().len(), 1);

        tx.delete_pack(&pack.id, Utc::now()).await.unwrap();
        assert!(tx.list_packs().await.unwrap().is_empty());
        assert!(tx.get_pack(&pack.id).await.unwrap().unwrap().is_deleted());
        assert!(tx.delete_pack(&pack.id, Utc::now()).await.is_err());
    }
}

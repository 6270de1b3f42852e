//! Core type definitions for the gapi economy
//!
//! Entities mirror the rows of the relational store: players, NFTs, NFT packs,
//! game sessions and the append-only rewards ledger. Identifiers are newtypes so
//! a session id can never be passed where an NFT id is expected.

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::EconomyError;

/// UserId - stable player identity issued by the auth collaborator
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = EconomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| EconomyError::InvalidParameter(format!("user id {s:?}: {e}")))
    }
}

/// NftId - opaque token id, 128 random bits rendered as hex
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NftId(String);

impl NftId {
    /// Draw a fresh id from the supplied random source
    pub fn random<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 16];
        rng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for NftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NftId({})", self.0)
    }
}

impl fmt::Display for NftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NftId {
    type Err = EconomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(EconomyError::InvalidParameter("empty nft id".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// PackId - NFT pack template identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackId(pub Uuid);

impl PackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// SessionId - game session identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// CharacterId - playable character catalogue entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CharacterId(pub i32);

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// NftType - ordered NFT tier
///
/// `Common < Rare < SuperRare < Epic < Legend`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NftType {
    Common,
    Rare,
    SuperRare,
    Epic,
    Legend,
}

impl NftType {
    /// All tiers, lowest first
    pub const ALL: [NftType; 5] = [
        NftType::Common,
        NftType::Rare,
        NftType::SuperRare,
        NftType::Epic,
        NftType::Legend,
    ];

    /// Zero-based position in the tier order
    pub fn ordinal(&self) -> u32 {
        match self {
            Self::Common => 0,
            Self::Rare => 1,
            Self::SuperRare => 2,
            Self::Epic => 3,
            Self::Legend => 4,
        }
    }

    /// The tier a craft produces from this one, `None` at the top
    pub fn next(&self) -> Option<NftType> {
        match self {
            Self::Common => Some(Self::Rare),
            Self::Rare => Some(Self::SuperRare),
            Self::SuperRare => Some(Self::Epic),
            Self::Epic => Some(Self::Legend),
            Self::Legend => None,
        }
    }

    /// Settings-key fragment (`electricity_percent_<tier>`, `viewers_<tier>_...`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Rare => "rare",
            Self::SuperRare => "super_rare",
            Self::Epic => "epic",
            Self::Legend => "legend",
        }
    }
}

impl fmt::Display for NftType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NftType {
    type Err = EconomyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NftType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| EconomyError::InvalidParameter(format!("unknown nft type {s:?}")))
    }
}

/// Difficulty tier of a game session (complexity 1..=3)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    /// Numeric complexity compared against an NFT's `max_level`
    pub fn level(&self) -> u8 {
        match self {
            Self::Easy => 1,
            Self::Medium => 2,
            Self::Hard => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl TryFrom<i32> for Difficulty {
    type Error = EconomyError;

    fn try_from(complexity: i32) -> Result<Self, Self::Error> {
        match complexity {
            1 => Ok(Self::Easy),
            2 => Ok(Self::Medium),
            3 => Ok(Self::Hard),
            other => Err(EconomyError::InvalidParameter(format!(
                "complexity must be 1..=3, got {other}"
            ))),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of a finished session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    Win,
    Lose,
}

impl GameResult {
    /// Wire code used by game clients
    pub fn code(&self) -> i32 {
        match self {
            Self::Win => 1,
            Self::Lose => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Win => "win",
            Self::Lose => "lose",
        }
    }
}

impl TryFrom<i32> for GameResult {
    type Error = EconomyError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Win),
            2 => Ok(Self::Lose),
            other => Err(EconomyError::InvalidResult(other)),
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Player row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub user_id: UserId,

    /// Current energy, `0..=energy_full`
    pub energy_points: i32,

    /// Regeneration anchor
    pub energy_refilled_at: DateTime<Utc>,

    pub selected_nft_id: Option<NftId>,

    pub selected_character_id: Option<CharacterId>,

    /// Accumulated electricity owed
    pub electricity_costs: f64,

    /// Sessions taxed since the last electricity payment
    pub electricity_spent: i32,

    pub created_at: DateTime<Utc>,
}

impl Player {
    /// A freshly created player starts with full energy
    pub fn new(user_id: UserId, energy_full: i32, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            energy_points: energy_full,
            energy_refilled_at: now,
            selected_nft_id: None,
            selected_character_id: None,
            electricity_costs: 0.0,
            electricity_spent: 0,
            created_at: now,
        }
    }
}

/// Lifecycle of a minted NFT
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NftState {
    Active,
    /// Consumed as crafting input for `into`
    ConsumedByCraft { into: NftId, at: DateTime<Utc> },
    Deleted { at: DateTime<Utc> },
}

/// NFT row
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nft {
    pub id: NftId,
    pub owner_id: UserId,
    pub nft_type: NftType,

    /// Highest session difficulty this NFT can play (1..=3)
    pub max_level: u8,

    pub state: NftState,
    pub created_at: DateTime<Utc>,
}

impl Nft {
    /// Only active NFTs can be selected, played or crafted
    pub fn is_usable(&self) -> bool {
        matches!(self.state, NftState::Active)
    }

    pub fn supports(&self, difficulty: Difficulty) -> bool {
        self.max_level >= difficulty.level()
    }
}

/// Per-tier drop weights of a pack
///
/// Weights need not sum to 1; a draw is proportional to weight.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DropChances {
    #[serde(default)]
    pub common: f64,
    #[serde(default)]
    pub rare: f64,
    #[serde(default)]
    pub super_rare: f64,
    #[serde(default)]
    pub epic: f64,
    #[serde(default)]
    pub legend: f64,
}

impl DropChances {
    pub fn weight(&self, tier: NftType) -> f64 {
        match tier {
            NftType::Common => self.common,
            NftType::Rare => self.rare,
            NftType::SuperRare => self.super_rare,
            NftType::Epic => self.epic,
            NftType::Legend => self.legend,
        }
    }

    /// Sum of the non-negative weights
    pub fn total(&self) -> f64 {
        NftType::ALL
            .iter()
            .map(|t| self.weight(*t).max(0.0))
            .sum()
    }

    /// Reject negative, non-finite or all-zero weights
    pub fn validate(&self) -> Result<(), EconomyError> {
        for tier in NftType::ALL {
            let w = self.weight(tier);
            if !w.is_finite() || w < 0.0 {
                return Err(EconomyError::InvalidParameter(format!(
                    "drop chance for {tier} must be a non-negative number, got {w}"
                )));
            }
        }
        if self.total() <= 0.0 {
            return Err(EconomyError::InvalidParameter(
                "drop chances must not all be zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Purchasable NFT pack template
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NftPack {
    pub id: PackId,
    pub name: String,
    pub price: f64,
    pub drop_chances: DropChances,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl NftPack {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Playable character catalogue entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
}

/// Session state machine position
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    InProgress,
    Finished(GameResult),
}

/// GameSession row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    pub id: SessionId,
    pub user_id: UserId,
    pub nft_id: NftId,
    pub complexity: Difficulty,

    /// Training sessions skip reward and electricity accounting
    pub is_training: bool,

    pub blocks_done: i32,
    pub result: Option<GameResult>,
    pub electricity_costs: f64,
    pub created_at: DateTime<Utc>,

    /// `None` while the session is in progress
    pub finished_at: Option<DateTime<Utc>>,
}

impl GameSession {
    pub fn start(
        user_id: UserId,
        nft_id: NftId,
        complexity: Difficulty,
        is_training: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            user_id,
            nft_id,
            complexity,
            is_training,
            blocks_done: 0,
            result: None,
            electricity_costs: 0.0,
            created_at: now,
            finished_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    pub fn state(&self) -> SessionState {
        match (self.finished_at, self.result) {
            (Some(_), Some(result)) => SessionState::Finished(result),
            _ => SessionState::InProgress,
        }
    }
}

/// Direction of a ledger entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Deposit,
    Withdraw,
}

/// Append-only rewards ledger row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RewardEntry {
    pub id: Uuid,
    pub user_id: UserId,

    /// Session that earned a deposit
    pub relation_id: Option<SessionId>,

    pub amount: f64,
    pub operation: OperationType,
    pub created_at: DateTime<Utc>,
}

impl RewardEntry {
    pub fn deposit(
        user_id: UserId,
        relation_id: Option<SessionId>,
        amount: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            relation_id,
            amount,
            operation: OperationType::Deposit,
            created_at: now,
        }
    }

    pub fn withdraw(user_id: UserId, amount: f64, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            relation_id: None,
            amount,
            operation: OperationType::Withdraw,
            created_at: now,
        }
    }
}

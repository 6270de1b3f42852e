//! # gapi Storage
//!
//! Transactional ledger of players, NFTs, packs, sessions and rewards.
//!
//! ## Storage Layout
//!
//! - `players` - energy, electricity and selection state, keyed by user
//! - `nfts` - minted NFTs; consumed and deleted rows are kept, never removed
//! - `packs` - pack templates, soft-deleted with `deleted_at`
//! - `characters` / `game_configs` - static catalogues managed by admins
//! - `sessions` - game sessions in insertion order
//! - `rewards` - append-only deposit / withdraw ledger
//!
//! All reads and writes of one request go through a single [`LedgerTx`].
//! [`MemoryLedger`] serialises transactions of the same player, and
//! catalogue writes against everything.

pub mod memory;
pub mod repository;

pub use memory::{LedgerStats, MemoryLedger, MemoryTx};
pub use repository::{LedgerStore, LedgerTx, SessionFinish, TxScope};

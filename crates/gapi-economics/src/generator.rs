//! # NFT Generation
//!
//! Pack purchases mint one NFT whose tier is drawn from the pack's weighted
//! drop chances. Crafting consumes two or more NFTs and mints one NFT of the
//! tier above the lowest input.
//!
//! ```text
//! common ──► rare ──► super_rare ──► epic ──► legend
//! ```
//!
//! The generator owns its random source. Production seeds it from OS entropy,
//! tests pass a seeded `ChaCha8Rng`. Nothing here touches storage: callers
//! persist the new NFT and consume the inputs in the same transaction.

use chrono::{DateTime, Utc};
use gapi_core::error::{EconomyError, Result};
use gapi_core::types::{Nft, NftId, NftPack, NftState, NftType, UserId};
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::constants::{MAX_NFT_LEVEL, MIN_CRAFT_INPUTS};

/// Tier a craft of `inputs` produces
pub fn craft_target(inputs: &[NftType]) -> Result<NftType> {
    if inputs.len() < MIN_CRAFT_INPUTS {
        return Err(EconomyError::InvalidCraftInput(inputs.len()));
    }

    let lowest = inputs
        .iter()
        .copied()
        .min()
        .ok_or(EconomyError::InvalidCraftInput(0))?;

    lowest.next().ok_or(EconomyError::CannotCraftFurther(lowest))
}

/// Price of crafting into `target`
pub fn craft_cost(target: NftType, craft_step_amount: f64) -> f64 {
    f64::from(target.ordinal()) * craft_step_amount
}

/// Weighted tier draws and uniform level draws
pub struct NftGenerator {
    rng: Box<dyn RngCore + Send>,
}

impl NftGenerator {
    pub fn new(rng: impl RngCore + Send + 'static) -> Self {
        Self { rng: Box::new(rng) }
    }

    /// Deterministic generator
    pub fn from_seed(seed: u64) -> Self {
        Self::new(ChaCha8Rng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(ChaCha8Rng::from_entropy())
    }

    /// Draw a tier with probability proportional to its weight
    pub fn draw_tier(&mut self, pack: &NftPack) -> Result<NftType> {
        pack.drop_chances.validate()?;

        let weights = NftType::ALL.map(|tier| pack.drop_chances.weight(tier));
        let index = WeightedIndex::new(weights).map_err(|e| {
            EconomyError::InvalidParameter(format!("pack {} drop chances: {e}", pack.id))
        })?;
        Ok(NftType::ALL[index.sample(&mut self.rng)])
    }

    /// Uniform in `1..=3`
    pub fn draw_level(&mut self) -> u8 {
        self.rng.gen_range(1..=MAX_NFT_LEVEL)
    }

    /// Mint the NFT a pack purchase yields
    pub fn generate(&mut self, pack: &NftPack, owner_id: UserId, now: DateTime<Utc>) -> Result<Nft> {
        let nft_type = self.draw_tier(pack)?;
        let max_level = self.draw_level();
        let nft = Nft {
            id: NftId::random(&mut self.rng),
            owner_id,
            nft_type,
            max_level,
            state: NftState::Active,
            created_at: now,
        };
        tracing::debug!(nft = %nft.id, tier = %nft_type, max_level, pack = %pack.id, "generated nft");
        Ok(nft)
    }

    /// Mint the NFT a craft of `inputs` yields
    ///
    /// Inputs must all be active; the output level is independent of them.
    pub fn craft(&mut self, inputs: &[Nft], owner_id: UserId, now: DateTime<Utc>) -> Result<Nft> {
        if let Some(used) = inputs.iter().find(|n| !n.is_usable()) {
            return Err(EconomyError::InvalidParameter(format!(
                "nft {} is no longer active",
                used.id
            )));
        }

        let tiers: Vec<NftType> = inputs.iter().map(|n| n.nft_type).collect();
        let nft_type = craft_target(&tiers)?;
        let max_level = self.draw_level();
        Ok(Nft {
            id: NftId::random(&mut self.rng),
            owner_id,
            nft_type,
            max_level,
            state: NftState::Active,
            created_at: now,
        })
    }
}

//! Tunable constants and the allocator configuration.
//!
//! Mirrors the constants module the teacher keeps alongside its memory
//! types (`src/memory/types.rs::constants`), scoped down to the handful
//! of knobs this allocator actually exposes.

/// Number of size classes (`spec.md` "Size-Class Table" §3).
pub const CLASS_COUNT: usize = 26;

/// Smallest slot size, in bytes.
pub const BASE_SLOT: usize = 8;

/// Largest size this allocator will serve; anything bigger defers to the
/// system allocator.
pub const MAX_SLOT: usize = 512;

/// Default cap on the number of slots parked in a single thread's magazine
/// before it flushes to the slab's global free stack.
pub const MAGAZINE_CAP: usize = 100;

/// Alignment floor for the first slot in a block, to avoid false sharing
/// between slots of the smallest size classes.
pub const CACHE_LINE: usize = 64;

const BLOCK_SMALL: usize = 4096;
const BLOCK_MEDIUM: usize = 8192;
const BLOCK_LARGE: usize = 16384;

/// Growth rule: `count` consecutive classes whose slot size increases by
/// `step` bytes each. Grounded on `original_source/MemPool.cpp`'s
/// `GrowthRule` table, which produces the exact schedule spec.md §3 lays
/// out by hand: `[(7, 8), (8, 16), (11, 32)]` starting from `BASE_SLOT`.
struct GrowthRule {
    count: usize,
    step: usize,
}

const GROWTH_RULES: [GrowthRule; 3] = [
    GrowthRule { count: 7, step: 8 },
    GrowthRule { count: 8, step: 16 },
    GrowthRule { count: 11, step: 32 },
];

/// Configuration for an [`crate::allocator::Allocator`] instance.
///
/// The `Default` impl reproduces the constants named in `spec.md` §6
/// exactly; callers who construct their own `Allocator` (rather than using
/// the process-wide [`crate::allocator::global`]) can tune magazine
/// capacity or block sizes for their workload.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocatorConfig {
    pub class_count: usize,
    pub base_slot: usize,
    pub max_slot: usize,
    pub magazine_cap: usize,
    pub cache_line: usize,
    pub block_size_small: usize,
    pub block_size_medium: usize,
    pub block_size_large: usize,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            class_count: CLASS_COUNT,
            base_slot: BASE_SLOT,
            max_slot: MAX_SLOT,
            magazine_cap: MAGAZINE_CAP,
            cache_line: CACHE_LINE,
            block_size_small: BLOCK_SMALL,
            block_size_medium: BLOCK_MEDIUM,
            block_size_large: BLOCK_LARGE,
        }
    }
}

impl AllocatorConfig {
    /// Validates internal consistency, catching the kind of typo spec.md
    /// §9 calls out (`8092` vs `8192`) before it reaches production.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::AllocError;

        if self.base_slot == 0 {
            return Err(AllocError::InvalidConfig {
                reason: "base_slot must be non-zero".into(),
            });
        }
        if self.max_slot < self.base_slot {
            return Err(AllocError::InvalidConfig {
                reason: "max_slot must be >= base_slot".into(),
            });
        }
        if self.class_count == 0 {
            return Err(AllocError::InvalidConfig {
                reason: "class_count must be non-zero".into(),
            });
        }
        if self.magazine_cap == 0 {
            return Err(AllocError::InvalidConfig {
                reason: "magazine_cap must be non-zero".into(),
            });
        }
        for size in [
            self.block_size_small,
            self.block_size_medium,
            self.block_size_large,
        ] {
            if !size.is_power_of_two() {
                return Err(AllocError::InvalidConfig {
                    reason: format!("block size {size} is not a power of two"),
                });
            }
        }
        if !(self.block_size_small < self.block_size_medium
            && self.block_size_medium < self.block_size_large)
        {
            return Err(AllocError::InvalidConfig {
                reason: "block sizes must be strictly increasing".into(),
            });
        }
        Ok(())
    }

    /// Builds the strictly increasing slot-size table `S[]` from the
    /// growth rules, per spec.md §3.
    pub(crate) fn build_size_table(&self) -> Vec<usize> {
        let mut table = Vec::with_capacity(self.class_count);
        let mut current = self.base_slot;

        'rules: for rule in GROWTH_RULES.iter() {
            for _ in 0..rule.count {
                if table.len() >= self.class_count {
                    break 'rules;
                }
                table.push(current);
                current += rule.step;
            }
        }

        // Defensive: if class_count exceeds what the hand-authored rule
        // table covers, keep extending at the last rule's step so the
        // table is always strictly increasing and long enough.
        let last_step = GROWTH_RULES.last().map(|r| r.step).unwrap_or(1);
        while table.len() < self.class_count {
            table.push(current);
            current += last_step;
        }

        table
    }

    /// Picks the block size for a slab serving `slot_size`-byte objects,
    /// per spec.md §3.
    pub(crate) fn block_size_for(&self, slot_size: usize) -> usize {
        if slot_size <= 64 {
            self.block_size_small
        } else if slot_size <= 192 {
            self.block_size_medium
        } else {
            self.block_size_large
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_matches_spec_schedule() {
        let cfg = AllocatorConfig::default();
        let table = cfg.build_size_table();
        let expected: Vec<usize> = vec![
            8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256, 288,
            320, 352, 384, 416, 448, 480, 512,
        ];
        assert_eq!(table, expected);
        assert_eq!(table.len(), CLASS_COUNT);
    }

    #[test]
    fn table_is_strictly_increasing_and_covers_max() {
        let cfg = AllocatorConfig::default();
        let table = cfg.build_size_table();
        assert!(table.windows(2).all(|w| w[0] < w[1]));
        assert!(*table.last().unwrap() >= MAX_SLOT);
    }

    #[test]
    fn validate_rejects_bad_block_sizes() {
        let mut cfg = AllocatorConfig::default();
        cfg.block_size_medium = 8092; // the spec.md-called-out typo
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_accepts_default() {
        assert!(AllocatorConfig::default().validate().is_ok());
    }
}

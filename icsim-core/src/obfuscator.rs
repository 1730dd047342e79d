//! Unused-byte obfuscation
//!
//! At [`DifficultyLevel::RandomizeUnused`] every byte outside the codec's
//! protected range is, independently and with probability 1/3, replaced by a
//! random byte on every encode. Decoders never look at those bytes.

use crate::config::DifficultyLevel;
use crate::types::FRAME_CAPACITY;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::ops::Range;

/// Fills unused payload bytes according to a difficulty level
#[derive(Debug, Clone)]
pub struct Obfuscator {
    difficulty: DifficultyLevel,
    rng: ChaCha8Rng,
}

impl Obfuscator {
    /// Obfuscator drawing from OS entropy
    pub fn new(difficulty: DifficultyLevel) -> Self {
        Self {
            difficulty,
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    /// Obfuscator with a reproducible noise stream (tests, replays)
    pub fn with_seed(difficulty: DifficultyLevel, seed: u64) -> Self {
        Self {
            difficulty,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn difficulty(&self) -> DifficultyLevel {
        self.difficulty
    }

    /// Obfuscate `buffer` outside `protected`
    ///
    /// `None` and `Pad` leave the buffer untouched; padding is already
    /// expressed by the layout length.
    pub fn obfuscate(&mut self, buffer: &mut [u8; FRAME_CAPACITY], protected: Range<usize>) {
        if self.difficulty != DifficultyLevel::RandomizeUnused {
            return;
        }

        for (index, byte) in buffer.iter_mut().enumerate() {
            if protected.contains(&index) {
                continue;
            }
            if self.rng.gen_ratio(1, 3) {
                *byte = self.rng.gen();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_and_pad_are_noops() {
        for difficulty in [DifficultyLevel::None, DifficultyLevel::Pad] {
            let mut obfuscator = Obfuscator::with_seed(difficulty, 1);
            let mut buffer = [0u8; FRAME_CAPACITY];
            for _ in 0..100 {
                obfuscator.obfuscate(&mut buffer, 2..3);
            }
            assert_eq!(buffer, [0u8; FRAME_CAPACITY]);
        }
    }

    #[test]
    fn test_randomize_skips_protected_bytes() {
        let mut obfuscator = Obfuscator::with_seed(DifficultyLevel::RandomizeUnused, 99);
        let mut touched = [false; FRAME_CAPACITY];

        for _ in 0..1_000 {
            let mut buffer = [0u8; FRAME_CAPACITY];
            buffer[3] = 0xAA;
            buffer[4] = 0x55;
            obfuscator.obfuscate(&mut buffer, 3..5);

            assert_eq!(buffer[3], 0xAA);
            assert_eq!(buffer[4], 0x55);
            for (index, byte) in buffer.iter().enumerate() {
                if *byte != 0 && !(3..5).contains(&index) {
                    touched[index] = true;
                }
            }
        }

        // Every unprotected byte gets randomized at some point
        for (index, was_touched) in touched.iter().enumerate() {
            assert_eq!(*was_touched, !(3..5).contains(&index), "byte {}", index);
        }
    }

    #[test]
    fn test_randomize_rate_is_about_one_third() {
        let mut obfuscator = Obfuscator::with_seed(DifficultyLevel::RandomizeUnused, 5);
        let mut nonzero = 0usize;
        let rounds = 3_000;

        for _ in 0..rounds {
            let mut buffer = [0u8; FRAME_CAPACITY];
            obfuscator.obfuscate(&mut buffer, 0..0);
            nonzero += buffer.iter().filter(|b| **b != 0).count();
        }

        // 1/3 chance per byte, minus the 1/256 chance of drawing zero
        let ratio = nonzero as f64 / (rounds * FRAME_CAPACITY) as f64;
        assert!((0.28..0.38).contains(&ratio), "ratio {}", ratio);
    }
}

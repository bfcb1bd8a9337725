// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Object feeder driving the supply conveyor.
//!
//! While the supply conveyor is commanded to run, an object is dropped on
//! it every feed interval. The first drop happens one interval after the
//! conveyor starts; stopping the conveyor resets that timer.

use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::plant::signal::ObjectType;

/// How the next object type is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedPattern {
    /// Weighted random, never repeating the previous type.
    #[default]
    Random,
    /// 1, 2, 3, 1, ...
    RoundRobin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeederConfig {
    pub pattern: FeedPattern,
    pub interval: Duration,
    /// RNG seed; 0 seeds from OS entropy.
    pub seed: u64,
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            pattern: FeedPattern::Random,
            interval: Duration::from_secs(1),
            seed: 0,
        }
    }
}

pub struct ObjectFeeder {
    config: FeederConfig,
    rng: SmallRng,
    last: Option<ObjectType>,
    next_due: Option<Instant>,
}

impl ObjectFeeder {
    pub fn new(config: FeederConfig) -> Self {
        let rng = if config.seed == 0 {
            SmallRng::from_entropy()
        } else {
            SmallRng::seed_from_u64(config.seed)
        };
        Self {
            config,
            rng,
            last: None,
            next_due: None,
        }
    }

    /// Advance the feeder to `now`. Returns the type of the object to drop,
    /// if one is due this cycle.
    pub fn tick(&mut self, now: Instant, conveyor_running: bool) -> Option<ObjectType> {
        if !conveyor_running {
            self.next_due = None;
            return None;
        }

        let due = *self.next_due.get_or_insert(now + self.config.interval);
        if now < due {
            return None;
        }

        self.next_due = Some(now + self.config.interval);
        let kind = self.choose();
        self.last = Some(kind);
        Some(kind)
    }

    fn choose(&mut self) -> ObjectType {
        match self.config.pattern {
            FeedPattern::RoundRobin => match self.last {
                None | Some(ObjectType::P3) => ObjectType::P1,
                Some(ObjectType::P1) => ObjectType::P2,
                Some(ObjectType::P2) => ObjectType::P3,
            },
            FeedPattern::Random => {
                let roll: u32 = self.rng.gen_range(0..100);
                match self.last {
                    None if roll < 33 => ObjectType::P1,
                    None if roll < 66 => ObjectType::P2,
                    None => ObjectType::P3,
                    Some(ObjectType::P1) if roll < 60 => ObjectType::P2,
                    Some(ObjectType::P1) => ObjectType::P3,
                    Some(ObjectType::P2) if roll < 40 => ObjectType::P1,
                    Some(ObjectType::P2) => ObjectType::P3,
                    Some(ObjectType::P3) if roll < 60 => ObjectType::P1,
                    Some(ObjectType::P3) => ObjectType::P2,
                }
            }
        }
    }
}

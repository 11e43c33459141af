//! Deterministic stand-in for the base dataset

use super::{Row, Table};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const SAMPLE_ROWS: usize = 1000;
pub const SAMPLE_SEED: u64 = 42;

pub const SAMPLE_CROPS: [&str; 10] = [
    "rice",
    "wheat",
    "corn",
    "cotton",
    "sugarcane",
    "jute",
    "coconut",
    "papaya",
    "orange",
    "apple",
];

/// Uniform mock records over plausible measurement ranges. Same seed, same table.
pub fn synthesize(rows: usize, seed: u64) -> Table {
    let mut rng = StdRng::seed_from_u64(seed);
    let rows = (0..rows)
        .map(|_| {
            let values = [
                Some(rng.random_range(0..150) as f64),
                Some(rng.random_range(0..150) as f64),
                Some(rng.random_range(0..210) as f64),
                Some(rng.random_range(8.0..45.0)),
                Some(rng.random_range(14.0..100.0)),
                Some(rng.random_range(3.5..10.0)),
                Some(rng.random_range(20.0..300.0)),
                None,
            ];
            let label = SAMPLE_CROPS[rng.random_range(0..SAMPLE_CROPS.len())];
            Row::new(values, Some(label.to_string()))
        })
        .collect();

    Table::new(false, rows)
}

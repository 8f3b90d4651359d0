//! Seeded sample-data generator for demos and tests

use super::memory::MemoryRepository;
use super::models::{ChangeRecord, ImpactDirection, MetricMeasurement};
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::info;

const CATEGORIES: &[&str] = &[
    "BOGO",
    "RTP Adjustments",
    "Add Slot",
    "Limited Time Event",
    "Featured Placement",
    "Pearly Rush Event",
    "Dealers Edge Event",
    "Cooldown",
];

const METRICS: &[&str] = &[
    "revenue",
    "dau",
    "retention",
    "session_length",
    "conversion_rate",
];

/// Populate a repository with `count` plausible changes over the 30 days
/// leading up to `as_of`. The generator is fully determined by `seed`.
pub fn seed_repository(
    repo: &MemoryRepository,
    count: usize,
    seed: u64,
    as_of: DateTime<Utc>,
) -> usize {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut inserted = 0;

    for _ in 0..count {
        let days_ago = rng.gen_range(0..30);
        let timestamp = as_of - Duration::days(days_ago) - Duration::hours(rng.gen_range(0..24));
        let category = *CATEGORIES.choose(&mut rng).expect("categories non-empty");

        let description = describe(category, &mut rng);

        let mut expected_impact = IndexMap::new();
        let impacted = rng.gen_range(1..=3);
        let mut metric_pool: Vec<&str> = METRICS.to_vec();
        metric_pool.shuffle(&mut rng);
        for metric in metric_pool.into_iter().take(impacted) {
            let direction = match rng.gen_range(0..3) {
                0 => ImpactDirection::Increase,
                1 => ImpactDirection::Decrease,
                _ => ImpactDirection::Neutral,
            };
            expected_impact.insert(metric.to_string(), direction);
        }

        let tags = vec![(*["VIP", "New Users", "Retention", "Monetization", "Engagement"]
            .choose(&mut rng)
            .expect("tags non-empty"))
        .to_string()];

        let change = ChangeRecord::new(
            timestamp,
            category.to_string(),
            description,
            expected_impact.clone(),
            tags,
        );

        let mut measurements = Vec::with_capacity(METRICS.len());
        for metric in METRICS {
            let before = base_value(metric, &mut rng);
            let multiplier = match expected_impact.get(*metric) {
                Some(ImpactDirection::Increase) => rng.gen_range(1.05..1.25),
                Some(ImpactDirection::Decrease) => rng.gen_range(0.75..0.95),
                _ => rng.gen_range(0.98..1.02),
            } * rng.gen_range(0.9..1.1);

            measurements.push(MetricMeasurement::new(
                change.change_id.clone(),
                metric.to_string(),
                before,
                before * multiplier,
                timestamp,
            ));
        }

        if repo.add_change(change, measurements) {
            inserted += 1;
        }
    }

    info!(inserted, "Sample data seeded");
    inserted
}

fn describe(category: &str, rng: &mut StdRng) -> String {
    match category {
        "BOGO" => format!(
            "BOGO sale on {}",
            ["coins", "gems", "boosters", "special items"]
                .choose(rng)
                .unwrap()
        ),
        "RTP Adjustments" => format!(
            "Adjusted RTP on {}",
            ["classic slots", "new releases", "featured machines", "table games"]
                .choose(rng)
                .unwrap()
        ),
        "Add Slot" => format!(
            "Launched {} slot machine",
            ["pirate themed", "ancient Egypt", "neon city", "jungle"]
                .choose(rng)
                .unwrap()
        ),
        "Limited Time Event" => format!(
            "{} limited time tournament",
            ["Weekend", "Holiday", "Seasonal", "Flash"].choose(rng).unwrap()
        ),
        "Featured Placement" => format!(
            "Featured {} in the lobby",
            ["new slots", "top earner", "event banner", "daily bonus"]
                .choose(rng)
                .unwrap()
        ),
        "Pearly Rush Event" => "Pearly Rush collection event round".to_string(),
        "Dealers Edge Event" => "Dealers Edge table game event".to_string(),
        _ => format!(
            "Tuned cooldown on {}",
            ["bonus wheel", "daily rewards", "free spins", "gift drops"]
                .choose(rng)
                .unwrap()
        ),
    }
}

fn base_value(metric: &str, rng: &mut StdRng) -> f64 {
    match metric {
        "revenue" => rng.gen_range(10_000.0..50_000.0),
        "dau" => rng.gen_range(10_000.0..100_000.0),
        "retention" => rng.gen_range(20.0..40.0),
        "session_length" => rng.gen_range(10.0..30.0),
        _ => rng.gen_range(2.0..8.0),
    }
}

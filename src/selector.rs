use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;
use rand::distr::Distribution;
use rand::distr::weighted::WeightedIndex;
use rand::seq::IndexedRandom;
use rule_model::{MediaRecord, RandomStrategy, Rule};

const FAVORITE_BONUS: i64 = 2;

fn recent_window() -> ChronoDuration {
    ChronoDuration::hours(24)
}

/// Picks one media record for `rule` out of `candidates`.
///
/// The image/video split is decided first using `rule.media_mix_ratio`; the
/// rule's strategy then chooses inside the resulting pool. All randomness is
/// drawn from `rng` so a seeded generator yields a reproducible pick.
pub fn pick_one<'a, R>(
    rule: &Rule,
    candidates: &'a [MediaRecord],
    now: DateTime<Utc>,
    rng: &mut R,
) -> Option<&'a MediaRecord>
where
    R: Rng + ?Sized,
{
    if candidates.is_empty() {
        return None;
    }

    let (videos, images): (Vec<&MediaRecord>, Vec<&MediaRecord>) =
        candidates.iter().partition(|media| media.is_video());
    let use_video = rng.random::<f64>() < rule.media_mix_ratio;
    let pool: Vec<&MediaRecord> = if use_video && !videos.is_empty() {
        videos
    } else if !images.is_empty() {
        images
    } else {
        candidates.iter().collect()
    };

    match rule.strategy {
        RandomStrategy::Uniform => pool.choose(rng).copied(),
        RandomStrategy::Weighted => pick_weighted(&pool, rng),
        RandomStrategy::AvoidRecent => pick_avoiding_recent(&pool, now, rng),
    }
}

/// `1 + rating`, plus a bonus for favorites. Negative ratings clamp at zero.
pub fn selection_weight(media: &MediaRecord) -> u64 {
    let bonus = if media.favorite { FAVORITE_BONUS } else { 0 };
    (1 + i64::from(media.rating) + bonus).max(0) as u64
}

fn pick_weighted<'a, R>(pool: &[&'a MediaRecord], rng: &mut R) -> Option<&'a MediaRecord>
where
    R: Rng + ?Sized,
{
    let weights: Vec<u64> = pool.iter().map(|media| selection_weight(media)).collect();
    match WeightedIndex::new(&weights) {
        Ok(dist) => pool.get(dist.sample(rng)).copied(),
        // All weights zero: fall back to the first entry rather than failing.
        Err(_) => pool.first().copied(),
    }
}

fn pick_avoiding_recent<'a, R>(
    pool: &[&'a MediaRecord],
    now: DateTime<Utc>,
    rng: &mut R,
) -> Option<&'a MediaRecord>
where
    R: Rng + ?Sized,
{
    let cutoff = now - recent_window();
    let stale: Vec<&MediaRecord> = pool
        .iter()
        .copied()
        .filter(|media| media.last_used_at.is_none_or(|used| used < cutoff))
        .collect();
    if stale.is_empty() {
        pool.choose(rng).copied()
    } else {
        stale.choose(rng).copied()
    }
}

//! Random choices made during a run
//!
//! Every function takes the run's random source explicitly, so a seeded
//! generator replays the same run.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::types::{ContentKind, TrimWindow};

/// Video with probability `video_percentage`/100, otherwise carousel
pub fn select_content_kind<R: Rng + ?Sized>(rng: &mut R, video_percentage: u8) -> ContentKind {
    if rng.gen_range(0..100u8) < video_percentage {
        ContentKind::Video
    } else {
        ContentKind::Carousel
    }
}

/// Trim window for a source of `source_s` seconds.
///
/// Sources shorter than `min_s` are used whole. Otherwise the length is
/// uniform in `[min_s, min(max_s, source_s)]` and the start uniform in
/// `[0, source_s - length]`.
pub fn choose_trim<R: Rng + ?Sized>(rng: &mut R, source_s: f64, min_s: f64, max_s: f64) -> TrimWindow {
    if source_s < min_s {
        return TrimWindow {
            start_s: 0.0,
            length_s: source_s.max(0.0),
        };
    }

    let upper = max_s.min(source_s);
    let length_s = if upper > min_s {
        rng.gen_range(min_s..=upper)
    } else {
        min_s
    };
    let slack = source_s - length_s;
    let start_s = if slack > 0.0 {
        rng.gen_range(0.0..=slack)
    } else {
        0.0
    };

    TrimWindow { start_s, length_s }
}

/// Number of carousel images, or `None` when fewer than `min` are available
pub fn choose_carousel_count<R: Rng + ?Sized>(
    rng: &mut R,
    min: usize,
    max: usize,
    available: usize,
) -> Option<usize> {
    if available < min || min == 0 {
        return None;
    }
    let upper = max.min(available).max(min);
    Some(rng.gen_range(min..=upper))
}

/// `count` distinct items, uniformly without replacement
pub fn sample_without_replacement<T: Clone, R: Rng + ?Sized>(
    rng: &mut R,
    items: &[T],
    count: usize,
) -> Vec<T> {
    items.choose_multiple(rng, count).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_full_percentages_are_deterministic() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..200 {
            assert_eq!(select_content_kind(&mut rng, 100), ContentKind::Video);
            assert_eq!(select_content_kind(&mut rng, 0), ContentKind::Carousel);
        }
    }

    #[test]
    fn test_content_kind_frequency() {
        let mut rng = StdRng::seed_from_u64(2024);
        let runs = 10_000;
        let videos = (0..runs)
            .filter(|_| select_content_kind(&mut rng, 70) == ContentKind::Video)
            .count();
        let share = videos as f64 / f64::from(runs);
        assert!((share - 0.70).abs() < 0.03, "share {share}");
    }

    #[test]
    fn test_short_source_used_whole() {
        let mut rng = StdRng::seed_from_u64(1);
        let trim = choose_trim(&mut rng, 8.0, 10.0, 30.0);
        assert!(trim.start_s.abs() < f64::EPSILON);
        assert!((trim.length_s - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_trim_within_bounds_over_sweep() {
        let mut rng = StdRng::seed_from_u64(77);
        let (min, max) = (10.0, 30.0);
        for tenth in 0..1200 {
            let source = f64::from(tenth) / 10.0;
            for _ in 0..5 {
                let trim = choose_trim(&mut rng, source, min, max);
                assert!(trim.start_s >= 0.0);
                assert!(trim.end_s() <= source + 1e-9, "{trim:?} on {source}");
                if source >= min {
                    assert!(trim.length_s >= min - 1e-9);
                    assert!(trim.length_s <= max.min(source) + 1e-9);
                } else {
                    assert!((trim.length_s - source).abs() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_exact_min_source() {
        let mut rng = StdRng::seed_from_u64(5);
        let trim = choose_trim(&mut rng, 10.0, 10.0, 30.0);
        assert!((trim.length_s - 10.0).abs() < f64::EPSILON);
        assert!(trim.start_s.abs() < f64::EPSILON);
    }

    #[test]
    fn test_carousel_count_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(choose_carousel_count(&mut rng, 3, 5, 2), None);
        assert_eq!(choose_carousel_count(&mut rng, 3, 5, 3), Some(3));
        for _ in 0..500 {
            let n = choose_carousel_count(&mut rng, 3, 5, 4).unwrap();
            assert!((3..=4).contains(&n));
            let n = choose_carousel_count(&mut rng, 3, 5, 40).unwrap();
            assert!((3..=5).contains(&n));
        }
    }

    #[test]
    fn test_sample_never_repeats() {
        let mut rng = StdRng::seed_from_u64(11);
        let items: Vec<u32> = (0..6).collect();
        for _ in 0..200 {
            let picked = sample_without_replacement(&mut rng, &items, 5);
            assert_eq!(picked.len(), 5);
            let unique: HashSet<_> = picked.iter().collect();
            assert_eq!(unique.len(), 5);
        }
        assert_eq!(sample_without_replacement(&mut rng, &items, 10).len(), 6);
    }

    #[test]
    fn test_same_seed_same_choices() {
        let choices = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let kind = select_content_kind(&mut rng, 50);
            let trim = choose_trim(&mut rng, 42.0, 10.0, 30.0);
            let count = choose_carousel_count(&mut rng, 3, 5, 9);
            (kind, trim, count)
        };
        assert_eq!(choices(123), choices(123));
    }
}

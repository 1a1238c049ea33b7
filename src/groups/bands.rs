//! Gear-score banding (§4.G stage 1). Grounded line-by-line on
//! `original_source/app/cogs/guild_events.py`'s `_calculate_gs_ranges` /
//! `_get_member_gs_range`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GsBand {
    pub min: i64,
    pub max: i64,
}

const MAX_BANDS: usize = 5;

fn stdev(values: &[i64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<i64>() as f64 / n;
    let variance = values.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt()
}

/// Tolerance per pool size per §4.G stage 1:
/// `<10: max(0.4*spread,200)`, `10-29: max(0.25*spread,150)`,
/// `>=30: min(1.2*stdev,200)`.
fn tolerance_for(gs_values: &[i64]) -> f64 {
    let total = gs_values.len();
    let spread = (gs_values.iter().max().copied().unwrap_or(0) - gs_values.iter().min().copied().unwrap_or(0)) as f64;
    if total < 10 {
        (spread * 0.4).max(200.0)
    } else if total < 30 {
        (spread * 0.25).max(150.0)
    } else {
        let sd = if gs_values.len() > 1 { stdev(gs_values) } else { 100.0 };
        (sd * 1.2).min(200.0)
    }
}

/// Produces up to 5 overlapping bands covering `[min, max]` with
/// per-band step `tolerance * 0.9`, matching the Python loop's
/// `current_min = range_max - tolerance*0.1` advance.
///
/// Fewer than 2 distinct gear scores yields a single catch-all band,
/// mirroring the source's `if len(gs_values) < 2: return [(0, 10000)]`.
pub fn compute_bands(gs_values: &[i64]) -> Vec<GsBand> {
    let mut sorted: Vec<i64> = gs_values.iter().copied().filter(|&v| v > 0).collect();
    sorted.sort_unstable();
    if sorted.len() < 2 {
        return vec![GsBand { min: 0, max: 10_000 }];
    }
    let min_gs = sorted[0];
    let max_gs = *sorted.last().unwrap();
    let tolerance = tolerance_for(&sorted);

    let mut bands = Vec::with_capacity(MAX_BANDS);
    let mut current_min = min_gs as f64;
    while current_min < max_gs as f64 {
        let range_max = (current_min + tolerance).min(max_gs as f64);
        bands.push(GsBand {
            min: current_min as i64,
            max: range_max as i64,
        });
        current_min = range_max - tolerance * 0.1;
        if bands.len() >= MAX_BANDS {
            break;
        }
    }
    bands
}

/// Index of the band a gear score falls into: first containing band; if
/// none contains it, the first band above it, or the last band if the
/// value exceeds every band's maximum (Python's trailing-else fallback).
pub fn band_index(gs: i64, bands: &[GsBand]) -> usize {
    if bands.is_empty() {
        return 0;
    }
    for (i, band) in bands.iter().enumerate() {
        if gs >= band.min && gs <= band.max {
            return i;
        }
    }
    for (i, band) in bands.iter().enumerate() {
        if gs < band.min {
            return i;
        }
        if gs > band.max && i == bands.len() - 1 {
            return i;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_distinct_value_yields_catch_all_band() {
        let bands = compute_bands(&[2500]);
        assert_eq!(bands, vec![GsBand { min: 0, max: 10_000 }]);
    }

    #[test]
    fn small_pool_uses_spread_based_tolerance_floor() {
        let values = vec![2200, 2300, 2400];
        let bands = compute_bands(&values);
        assert_eq!(bands[0].min, 2200);
        assert!(bands.last().unwrap().max >= 2400);
    }

    #[test]
    fn never_exceeds_five_bands() {
        let values: Vec<i64> = (0..50).map(|i| 1000 + i * 37).collect();
        let bands = compute_bands(&values);
        assert!(bands.len() <= 5);
    }

    #[test]
    fn band_index_falls_back_to_last_band_above_max() {
        let bands = vec![GsBand { min: 0, max: 1000 }, GsBand { min: 900, max: 2000 }];
        assert_eq!(band_index(5000, &bands), 1);
    }

    #[test]
    fn band_index_finds_containing_band() {
        let bands = vec![GsBand { min: 0, max: 1000 }, GsBand { min: 900, max: 2000 }];
        assert_eq!(band_index(950, &bands), 0);
    }
}

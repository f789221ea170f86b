// src/services/revenue.rs
use chrono::{DateTime, Datelike, Months, Utc};

use crate::models::{MonthlyRevenueBucket, ProjectionPoint, ProjectionResult, VideoObservation};
use super::rpm::NicheRpmTable;

/// Fixed compounding monthly growth assumption applied by [`project_growth`].
/// A deliberately naive heuristic carried over from the original revenue
/// model, not a fitted trend.
pub const MONTHLY_GROWTH_RATE: f64 = 1.10;

/// How many trailing buckets the projection averages over.
const PROJECTION_HISTORY_MONTHS: usize = 3;

/// Default trailing window for upload-cadence measurement.
pub const DEFAULT_FREQUENCY_WINDOW_MONTHS: u32 = 3;

/// Estimated USD revenue for a view count. Fractional cents are kept;
/// rounding is the caller's presentation concern.
pub fn estimate_revenue(table: &NicheRpmTable, views: u64, niche: &str, is_short: bool) -> f64 {
    (views as f64 / 1000.0) * table.rate_for(niche, is_short)
}

fn month_index(ts: &DateTime<Utc>) -> i32 {
    ts.year() * 12 + ts.month0() as i32
}

fn month_key(index: i32) -> String {
    format!("{:04}-{:02}", index.div_euclid(12), index.rem_euclid(12) + 1)
}

fn parse_month_key(key: &str) -> Option<i32> {
    let (year, month) = key.split_once('-')?;
    let year: i32 = year.parse().ok()?;
    let month: i32 = month.parse().ok()?;
    if !(1..=12).contains(&month) {
        return None;
    }
    Some(year * 12 + month - 1)
}

fn accumulate_observations(
    observations: &[VideoObservation],
    start: i32,
    current: i32,
    long_form: &mut [u64],
    shorts: &mut [u64],
) {
    for obs in observations {
        let idx = month_index(&obs.published_at);
        if idx < start || idx > current {
            continue;
        }
        let slot = (idx - start) as usize;
        if obs.is_short {
            shorts[slot] += obs.view_count;
        } else {
            long_form[slot] += obs.view_count;
        }
    }
}

fn finalize_buckets(
    table: &NicheRpmTable,
    niche: &str,
    start: i32,
    long_form: &[u64],
    shorts: &[u64],
) -> Vec<MonthlyRevenueBucket> {
    let mut buckets = Vec::new();
    for slot in 0..long_form.len() {
        let (lv, sv) = (long_form[slot], shorts[slot]);
        if lv + sv == 0 {
            continue;
        }
        buckets.push(MonthlyRevenueBucket {
            month: month_key(start + slot as i32),
            long_form_views: lv,
            shorts_views: sv,
            long_form_revenue: estimate_revenue(table, lv, niche, false),
            shorts_revenue: estimate_revenue(table, sv, niche, true),
        });
    }
    buckets
}

/// Group observations into calendar-month revenue buckets over a window of
/// `window_months` consecutive months ending at the current month.
///
/// Months with no observed views are dropped, not zero-filled, so the result
/// has length <= `window_months` and is not guaranteed contiguous. Order is
/// oldest month first.
pub fn build_historical_buckets(
    table: &NicheRpmTable,
    observations: &[VideoObservation],
    niche: &str,
    window_months: usize,
) -> Vec<MonthlyRevenueBucket> {
    build_historical_buckets_at(Utc::now(), table, observations, niche, window_months)
}

pub fn build_historical_buckets_at(
    now: DateTime<Utc>,
    table: &NicheRpmTable,
    observations: &[VideoObservation],
    niche: &str,
    window_months: usize,
) -> Vec<MonthlyRevenueBucket> {
    if window_months == 0 {
        return Vec::new();
    }

    let current = month_index(&now);
    let start = current - (window_months as i32 - 1);
    let mut long_form = vec![0u64; window_months];
    let mut shorts = vec![0u64; window_months];

    accumulate_observations(observations, start, current, &mut long_form, &mut shorts);
    finalize_buckets(table, niche, start, &long_form, &shorts)
}

/// Fold freshly fetched observations into previously computed buckets,
/// re-clipping everything to the window ending at the current month. Revenue
/// is recomputed from the combined view sums for the requested niche, so the
/// result is what a full rebuild over both observation sets would produce.
pub fn merge_bucket_history(
    table: &NicheRpmTable,
    prior: &[MonthlyRevenueBucket],
    observations: &[VideoObservation],
    niche: &str,
    window_months: usize,
) -> Vec<MonthlyRevenueBucket> {
    merge_bucket_history_at(Utc::now(), table, prior, observations, niche, window_months)
}

pub fn merge_bucket_history_at(
    now: DateTime<Utc>,
    table: &NicheRpmTable,
    prior: &[MonthlyRevenueBucket],
    observations: &[VideoObservation],
    niche: &str,
    window_months: usize,
) -> Vec<MonthlyRevenueBucket> {
    if window_months == 0 {
        return Vec::new();
    }

    let current = month_index(&now);
    let start = current - (window_months as i32 - 1);
    let mut long_form = vec![0u64; window_months];
    let mut shorts = vec![0u64; window_months];

    for bucket in prior {
        let idx = match parse_month_key(&bucket.month) {
            Some(idx) => idx,
            None => continue,
        };
        // Months that have since left the window are dropped, not carried.
        if idx < start || idx > current {
            continue;
        }
        let slot = (idx - start) as usize;
        long_form[slot] += bucket.long_form_views;
        shorts[slot] += bucket.shorts_views;
    }

    accumulate_observations(observations, start, current, &mut long_form, &mut shorts);
    finalize_buckets(table, niche, start, &long_form, &shorts)
}

/// Project next-month and next-year totals from the trailing three buckets.
/// Fewer than three buckets of history yields the all-zero result rather
/// than an error.
pub fn project_growth(buckets: &[MonthlyRevenueBucket]) -> ProjectionResult {
    if buckets.len() < PROJECTION_HISTORY_MONTHS {
        return ProjectionResult::default();
    }

    let recent = &buckets[buckets.len() - PROJECTION_HISTORY_MONTHS..];
    let total_views: u64 = recent.iter().map(|b| b.long_form_views + b.shorts_views).sum();
    let total_revenue: f64 = recent.iter().map(|b| b.long_form_revenue + b.shorts_revenue).sum();
    let avg_views = total_views as f64 / PROJECTION_HISTORY_MONTHS as f64;
    let avg_revenue = total_revenue / PROJECTION_HISTORY_MONTHS as f64;

    let year_growth = MONTHLY_GROWTH_RATE.powi(12);
    ProjectionResult {
        next_month: ProjectionPoint {
            views: (avg_views * MONTHLY_GROWTH_RATE).floor() as u64,
            revenue: avg_revenue * MONTHLY_GROWTH_RATE,
        },
        next_year: ProjectionPoint {
            views: (avg_views * year_growth).floor() as u64,
            revenue: avg_revenue * year_growth,
        },
    }
}

/// Observed upload cadence in videos per week over the trailing
/// `window_months` calendar months. No uploads in the window yields 0.
pub fn upload_frequency(observations: &[VideoObservation], window_months: u32) -> f64 {
    upload_frequency_at(Utc::now(), observations, window_months)
}

pub fn upload_frequency_at(
    now: DateTime<Utc>,
    observations: &[VideoObservation],
    window_months: u32,
) -> f64 {
    let cutoff = now - Months::new(window_months);
    let mut recent: Vec<DateTime<Utc>> = observations
        .iter()
        .filter(|o| o.published_at >= cutoff)
        .map(|o| o.published_at)
        .collect();

    recent.sort();
    let (first, last) = match (recent.first(), recent.last()) {
        (Some(f), Some(l)) => (*f, *l),
        _ => return 0.0,
    };

    let span = last - first;
    // Minimum span of one week so single-burst uploads don't divide by zero.
    let weeks = (span.num_seconds() as f64 / (7.0 * 86400.0)).max(1.0);
    recent.len() as f64 / weeks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::rpm::GENERAL_NICHE;
    use chrono::{Duration, TimeZone};

    fn table() -> &'static NicheRpmTable {
        NicheRpmTable::builtin()
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 27, 12, 0, 0).unwrap()
    }

    // An observation published `months_ago` whole calendar months before `now`.
    fn obs_months_ago(
        now: DateTime<Utc>,
        months_ago: i32,
        view_count: u64,
        is_short: bool,
    ) -> VideoObservation {
        let idx = month_index(&now) - months_ago;
        let (year, month) = (idx.div_euclid(12), idx.rem_euclid(12) as u32 + 1);
        VideoObservation {
            id: format!("vid-{}-{}", months_ago, view_count),
            view_count,
            published_at: Utc.with_ymd_and_hms(year, month, 15, 12, 0, 0).unwrap(),
            is_short,
        }
    }

    #[test]
    fn zero_views_estimate_zero_revenue() {
        assert_eq!(estimate_revenue(table(), 0, "finance", false), 0.0);
        assert_eq!(estimate_revenue(table(), 0, "nope", true), 0.0);
    }

    #[test]
    fn thousand_views_equal_one_rpm_unit() {
        let t = table();
        assert_eq!(estimate_revenue(t, 1000, "finance", false), t.rate_for("finance", false));
        assert_eq!(estimate_revenue(t, 1000, GENERAL_NICHE, false), 4.0);
        // Unknown niche routes through the General row.
        assert_eq!(estimate_revenue(t, 1000, "no-such-niche", false), 4.0);
    }

    #[test]
    fn buckets_drop_empty_months_and_stay_ordered() {
        let now = fixed_now();
        let observations = vec![
            obs_months_ago(now, 5, 4_000, false),
            obs_months_ago(now, 3, 2_500, false),
            obs_months_ago(now, 0, 9_000, false),
        ];
        let buckets = build_historical_buckets_at(now, table(), &observations, GENERAL_NICHE, 12);

        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].month, "2026-03");
        assert_eq!(buckets[1].month, "2026-05");
        assert_eq!(buckets[2].month, "2026-08");
        for b in &buckets {
            assert!(b.long_form_views + b.shorts_views > 0);
        }
        let months: Vec<&str> = buckets.iter().map(|b| b.month.as_str()).collect();
        let mut sorted = months.clone();
        sorted.sort();
        assert_eq!(months, sorted);
    }

    #[test]
    fn observations_outside_window_are_ignored() {
        let now = fixed_now();
        let observations = vec![
            obs_months_ago(now, 14, 50_000, false),
            obs_months_ago(now, 1, 1_000, false),
        ];
        let buckets = build_historical_buckets_at(now, table(), &observations, GENERAL_NICHE, 12);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].month, "2026-07");
        assert_eq!(buckets[0].long_form_views, 1_000);
    }

    #[test]
    fn shorts_and_long_form_split_within_a_month() {
        let now = fixed_now();
        let observations = vec![
            obs_months_ago(now, 1, 10_000, false),
            obs_months_ago(now, 1, 40_000, true),
        ];
        let buckets = build_historical_buckets_at(now, table(), &observations, "finance", 12);

        assert_eq!(buckets.len(), 1);
        let b = &buckets[0];
        assert_eq!(b.long_form_views, 10_000);
        assert_eq!(b.shorts_views, 40_000);
        assert_eq!(b.long_form_revenue, 10.0 * 22.0);
        assert_eq!(b.shorts_revenue, 40.0 * 0.18);
    }

    #[test]
    fn projection_is_zero_under_three_buckets() {
        let now = fixed_now();
        let observations = vec![
            obs_months_ago(now, 2, 10_000, false),
            obs_months_ago(now, 1, 12_000, false),
        ];
        let buckets = build_historical_buckets_at(now, table(), &observations, GENERAL_NICHE, 12);
        assert_eq!(buckets.len(), 2);
        assert_eq!(project_growth(&buckets), ProjectionResult::default());
        assert_eq!(project_growth(&[]), ProjectionResult::default());
    }

    #[test]
    fn projection_matches_worked_example() {
        // Eight months of long-form-only history, oldest first, General
        // niche at $4/1k. Last three months average 130k views.
        let views = [95_000u64, 102_000, 115_000, 98_000, 125_000, 118_000, 132_000, 140_000];
        let now = fixed_now();
        let observations: Vec<VideoObservation> = views
            .iter()
            .enumerate()
            .map(|(i, &v)| obs_months_ago(now, (views.len() - 1 - i) as i32, v, false))
            .collect();

        let buckets = build_historical_buckets_at(now, table(), &observations, GENERAL_NICHE, 12);
        assert_eq!(buckets.len(), 8);

        let projection = project_growth(&buckets);
        assert_eq!(projection.next_month.views, 143_000);

        // avg revenue = 130k views at $4/1k = $520; one month of 10% growth.
        assert!((projection.next_month.revenue - 572.0).abs() < 1e-9);
        assert_eq!(
            projection.next_year.views,
            (130_000.0 * MONTHLY_GROWTH_RATE.powi(12)).floor() as u64
        );
    }

    #[test]
    fn merging_no_new_observations_preserves_prior_history() {
        let now = fixed_now();
        let observations = vec![
            obs_months_ago(now, 4, 90_000, false),
            obs_months_ago(now, 3, 100_000, false),
            obs_months_ago(now, 2, 110_000, false),
            obs_months_ago(now, 1, 120_000, false),
        ];
        let prior = build_historical_buckets_at(now, table(), &observations, GENERAL_NICHE, 12);
        assert_eq!(prior.len(), 4);

        // An incremental pass that found nothing new must not degrade the
        // analysis: same buckets, same non-zero projection.
        let merged = merge_bucket_history_at(now, table(), &prior, &[], GENERAL_NICHE, 12);
        assert_eq!(merged, prior);
        assert_eq!(project_growth(&merged), project_growth(&prior));
        assert_ne!(project_growth(&merged), ProjectionResult::default());
    }

    #[test]
    fn merge_folds_new_observations_into_existing_months() {
        let now = fixed_now();
        let prior = build_historical_buckets_at(
            now,
            table(),
            &[obs_months_ago(now, 2, 10_000, false)],
            GENERAL_NICHE,
            12,
        );

        let fresh = vec![
            obs_months_ago(now, 2, 5_000, false),
            obs_months_ago(now, 0, 7_000, true),
        ];
        let merged = merge_bucket_history_at(now, table(), &prior, &fresh, GENERAL_NICHE, 12);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].month, "2026-06");
        assert_eq!(merged[0].long_form_views, 15_000);
        assert_eq!(merged[0].long_form_revenue, 15.0 * 4.0);
        assert_eq!(merged[1].month, "2026-08");
        assert_eq!(merged[1].shorts_views, 7_000);

        // Same result as rebuilding over both observation sets at once.
        let mut all = vec![obs_months_ago(now, 2, 10_000, false)];
        all.extend(fresh);
        assert_eq!(
            merged,
            build_historical_buckets_at(now, table(), &all, GENERAL_NICHE, 12)
        );
    }

    #[test]
    fn merge_drops_months_that_left_the_window() {
        let now = fixed_now();
        let prior = vec![
            MonthlyRevenueBucket {
                month: "2025-06".into(), // 14 months before the fixed now
                long_form_views: 50_000,
                shorts_views: 0,
                long_form_revenue: 200.0,
                shorts_revenue: 0.0,
            },
            MonthlyRevenueBucket {
                month: "2026-07".into(),
                long_form_views: 8_000,
                shorts_views: 0,
                long_form_revenue: 32.0,
                shorts_revenue: 0.0,
            },
        ];
        let merged = merge_bucket_history_at(now, table(), &prior, &[], GENERAL_NICHE, 12);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].month, "2026-07");
    }

    #[test]
    fn merge_recomputes_revenue_for_requested_niche() {
        let now = fixed_now();
        let prior = build_historical_buckets_at(
            now,
            table(),
            &[obs_months_ago(now, 1, 10_000, false)],
            GENERAL_NICHE,
            12,
        );
        assert_eq!(prior[0].long_form_revenue, 10.0 * 4.0);

        let merged = merge_bucket_history_at(now, table(), &prior, &[], "finance", 12);
        assert_eq!(merged[0].long_form_revenue, 10.0 * 22.0);
    }

    #[test]
    fn upload_frequency_empty_window_is_zero() {
        let now = fixed_now();
        assert_eq!(upload_frequency_at(now, &[], 3), 0.0);

        // Old uploads only: nothing inside the trailing window.
        let stale = vec![obs_months_ago(now, 10, 1_000, false)];
        assert_eq!(upload_frequency_at(now, &stale, 3), 0.0);
    }

    #[test]
    fn upload_frequency_counts_per_week_over_span() {
        let now = fixed_now();
        // 13 uploads, one per week, spanning exactly 12 weeks.
        let observations: Vec<VideoObservation> = (0..13)
            .map(|i| VideoObservation {
                id: format!("v{}", i),
                view_count: 100,
                published_at: now - Duration::weeks(i),
                is_short: false,
            })
            .collect();
        let freq = upload_frequency_at(now, &observations, 3);
        assert!((freq - 13.0 / 12.0).abs() < 1e-9);
    }

    #[test]
    fn upload_frequency_clamps_short_spans_to_one_week() {
        let now = fixed_now();
        // Five uploads within two days; span clamps to one week.
        let observations: Vec<VideoObservation> = (0..5)
            .map(|i| VideoObservation {
                id: format!("v{}", i),
                view_count: 100,
                published_at: now - Duration::hours(i * 10),
                is_short: true,
            })
            .collect();
        assert_eq!(upload_frequency_at(now, &observations, 3), 5.0);
    }
}

//! Calendar bounds, the canonical timestamp encoding, and the date-range
//! merge used to collapse overlapping enrollments.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Bounds ──────────────────────────────────────────────────────────────────

const MIN_PERIOD_SECS: i64 = -2_208_988_800; // 1900-01-01T00:00:00Z
const MAX_PERIOD_SECS: i64 = 4_102_444_800; // 2100-01-01T00:00:00Z

/// Lower bound of every enrollment interval; also "start unknown".
pub fn min_period() -> DateTime<Utc> {
  Utc.timestamp_opt(MIN_PERIOD_SECS, 0).single().unwrap_or_default()
}

/// Upper bound of every enrollment interval; also "still enrolled".
pub fn max_period() -> DateTime<Utc> {
  Utc.timestamp_opt(MAX_PERIOD_SECS, 0).single().unwrap_or_default()
}

pub fn in_period(dt: DateTime<Utc>) -> bool {
  dt >= min_period() && dt <= max_period()
}

// ─── Encoding ────────────────────────────────────────────────────────────────

/// Fixed-width storage form. Lexical order equals chronological order.
pub const STORAGE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// The MySQL format string every bound date is parsed with on the server.
pub const SQL_DATE_FORMAT: &str = "%Y-%m-%dT%H:%i:%s.%fZ";

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.format(STORAGE_FORMAT).to_string()
}

/// Parse a user- or database-supplied timestamp.
///
/// Accepts RFC 3339 (`2012-08-01T00:00:00.000Z`), `YYYY-MM-DD HH:MM:SS` and a
/// bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_dt(s: &str) -> Option<DateTime<Utc>> {
  let s = s.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.with_timezone(&Utc));
  }
  if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
    return Some(ndt.and_utc());
  }
  if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
    return Some(ndt.and_utc());
  }
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .ok()
    .and_then(|d| d.and_hms_opt(0, 0, 0))
    .map(|ndt| ndt.and_utc())
}

/// [`parse_dt`] with a validation error naming `field`.
pub fn parse_field(field: &'static str, s: &str) -> Result<DateTime<Utc>> {
  parse_dt(s).ok_or_else(|| Error::validation(field, format!("cannot parse date '{s}'")))
}

/// Milliseconds since the epoch, as used by the analytics endpoints.
pub fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
  DateTime::from_timestamp_millis(millis)
    .ok_or_else(|| Error::OutOfRange(format!("timestamp {millis} is out of range")))
}

// ─── Range merge ─────────────────────────────────────────────────────────────

/// A closed interval `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
  pub start: DateTime<Utc>,
  pub end:   DateTime<Utc>,
}

impl DateRange {
  pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
    Self { start, end }
  }
}

/// Collapse overlapping or touching intervals into a sorted, disjoint list.
///
/// Each input must have exactly two elements; they are swapped if given in
/// reverse. [`max_period`] acts as an open end: when either side of an overlap
/// ends there, the merged end is clipped to the earlier of the two. Likewise a
/// saved start of [`min_period`] is replaced by the overlapping start. If any
/// input starts at `min_period` (ends at `max_period`), the first (last) output
/// is pinned back to that bound.
pub fn merge_date_ranges<R: AsRef<[DateTime<Utc>]>>(ranges: &[R]) -> Result<Vec<DateRange>> {
  if ranges.is_empty() {
    return Ok(Vec::new());
  }

  let min = min_period();
  let max = max_period();

  let mut pairs = Vec::with_capacity(ranges.len());
  for range in ranges {
    let [a, b] = range.as_ref() else {
      return Err(Error::BadRequest("pair doesn't have exactly 2 elements".into()));
    };
    let (start, end) = if a <= b { (*a, *b) } else { (*b, *a) };
    for dt in [start, end] {
      if !in_period(dt) {
        return Err(Error::OutOfRange(format!(
          "date {} is out of range [{}, {}]",
          dt.to_rfc3339(),
          min.to_rfc3339(),
          max.to_rfc3339()
        )));
      }
    }
    pairs.push(DateRange::new(start, end));
  }
  pairs.sort_by_key(|r| (r.start, r.end));

  let touches_min = pairs.iter().any(|r| r.start == min);
  let touches_max = pairs.iter().any(|r| r.end == max);

  let mut merged = Vec::new();
  let mut saved = pairs[0];
  for next in &pairs[1..] {
    if next.start <= saved.end {
      if saved.start == min {
        saved.start = next.start;
      }
      saved.end = if saved.end == max || next.end == max {
        saved.end.min(next.end)
      } else {
        saved.end.max(next.end)
      };
    } else {
      merged.push(saved);
      saved = *next;
    }
  }
  merged.push(saved);

  if touches_min {
    merged[0].start = min;
  }
  if touches_max {
    let last = merged.len() - 1;
    merged[last].end = max;
  }
  Ok(merged)
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeSet;

  use chrono::Duration;
  use proptest::prelude::*;

  use super::*;

  fn d(s: &str) -> DateTime<Utc> { parse_dt(s).unwrap() }

  fn r(a: &str, b: &str) -> [DateTime<Utc>; 2] { [d(a), d(b)] }

  #[test]
  fn bounds_are_the_documented_dates() {
    assert_eq!(min_period(), d("1900-01-01T00:00:00Z"));
    assert_eq!(max_period(), d("2100-01-01T00:00:00Z"));
  }

  #[test]
  fn storage_encoding_is_fixed_width_and_parses_back() {
    let dt = d("2012-08-01T10:11:12.345Z");
    let enc = encode_dt(dt);
    assert_eq!(enc, "2012-08-01T10:11:12.345000Z");
    assert_eq!(parse_dt(&enc), Some(dt));
    assert_eq!(encode_dt(min_period()).len(), enc.len());
  }

  #[test]
  fn parse_accepts_date_only_and_space_separated() {
    assert_eq!(d("2014-04-15"), d("2014-04-15T00:00:00Z"));
    assert_eq!(d("2014-04-15 08:00:00"), d("2014-04-15T08:00:00.000Z"));
    assert!(parse_dt("15/04/2014").is_none());
  }

  #[test]
  fn empty_input_gives_empty_output() {
    let none: [[DateTime<Utc>; 2]; 0] = [];
    assert!(merge_date_ranges(&none).unwrap().is_empty());
  }

  #[test]
  fn pair_with_one_element_is_rejected() {
    let err = merge_date_ranges(&[vec![min_period()]]).unwrap_err();
    assert_eq!(err.to_string(), "pair doesn't have exactly 2 elements");
  }

  #[test]
  fn full_period_is_kept() {
    let out = merge_date_ranges(&[[min_period(), max_period()]]).unwrap();
    assert_eq!(out, vec![DateRange::new(min_period(), max_period())]);
  }

  #[test]
  fn disjoint_ranges_stay_apart_and_sorted() {
    let out = merge_date_ranges(&[
      r("2014-04-15", "2015-11-20"),
      r("2012-08-01", "2013-10-15"),
    ])
    .unwrap();
    assert_eq!(out, vec![
      DateRange::new(d("2012-08-01"), d("2013-10-15")),
      DateRange::new(d("2014-04-15"), d("2015-11-20")),
    ]);
  }

  #[test]
  fn overlapping_ranges_collapse() {
    let out = merge_date_ranges(&[
      r("2012-01-01", "2013-01-01"),
      r("2012-06-01", "2014-01-01"),
    ])
    .unwrap();
    assert_eq!(out, vec![DateRange::new(d("2012-01-01"), d("2014-01-01"))]);
  }

  #[test]
  fn touching_ranges_collapse() {
    let out = merge_date_ranges(&[
      r("2012-01-01", "2013-01-01"),
      r("2013-01-01", "2014-01-01"),
    ])
    .unwrap();
    assert_eq!(out, vec![DateRange::new(d("2012-01-01"), d("2014-01-01"))]);
  }

  #[test]
  fn reversed_pair_is_normalised() {
    let out = merge_date_ranges(&[r("2013-01-01", "2012-01-01")]).unwrap();
    assert_eq!(out, vec![DateRange::new(d("2012-01-01"), d("2013-01-01"))]);
  }

  #[test]
  fn out_of_range_dates_are_rejected() {
    let err = merge_date_ranges(&[r("1899-12-31", "2000-01-01")]).unwrap_err();
    assert!(matches!(err, Error::OutOfRange(_)));
    let err = merge_date_ranges(&[r("2000-01-01", "2100-01-02")]).unwrap_err();
    assert!(matches!(err, Error::OutOfRange(_)));
  }

  // The upper bound is clipped rather than extended: an open-ended enrollment
  // overlapping a closed one takes the closed end, then gets pinned back to
  // MAX because an input touched it.
  #[test]
  fn open_end_is_clipped_then_pinned() {
    let out = merge_date_ranges(&[
      [d("2000-01-01"), max_period()],
      r("2005-01-01", "2006-01-01"),
      r("2010-01-01", "2020-01-01"),
    ])
    .unwrap();
    assert_eq!(out, vec![
      DateRange::new(d("2000-01-01"), d("2006-01-01")),
      DateRange::new(d("2010-01-01"), max_period()),
    ]);
  }

  #[test]
  fn unknown_start_is_replaced_then_pinned() {
    let out = merge_date_ranges(&[
      [min_period(), d("2010-01-01")],
      r("2005-01-01", "2012-01-01"),
    ])
    .unwrap();
    assert_eq!(out, vec![DateRange::new(min_period(), d("2012-01-01"))]);
  }

  // ── Properties ───────────────────────────────────────────────────────────

  const PERIOD_DAYS: i64 = 73_049;

  fn arb_date() -> impl Strategy<Value = DateTime<Utc>> {
    prop_oneof![
      1 => Just(min_period()),
      1 => Just(max_period()),
      6 => (0..PERIOD_DAYS).prop_map(|days| min_period() + Duration::days(days)),
    ]
  }

  fn arb_ranges() -> impl Strategy<Value = Vec<[DateTime<Utc>; 2]>> {
    prop::collection::vec((arb_date(), arb_date()).prop_map(|(a, b)| [a, b]), 0..8)
  }

  fn as_pairs(ranges: &[DateRange]) -> Vec<[DateTime<Utc>; 2]> {
    ranges.iter().map(|r| [r.start, r.end]).collect()
  }

  fn covered_days(ranges: &[[i64; 2]]) -> BTreeSet<i64> {
    ranges.iter().flat_map(|[a, b]| (*a.min(b))..=(*a.max(b))).collect()
  }

  proptest! {
    #[test]
    fn merge_is_idempotent(ranges in arb_ranges()) {
      let once = merge_date_ranges(&ranges).unwrap();
      let twice = merge_date_ranges(&as_pairs(&once)).unwrap();
      prop_assert_eq!(once, twice);
    }

    #[test]
    fn merge_output_is_sorted_and_disjoint(ranges in arb_ranges()) {
      let out = merge_date_ranges(&ranges).unwrap();
      for r in &out {
        prop_assert!(r.start <= r.end);
      }
      for w in out.windows(2) {
        prop_assert!(w[0].end < w[1].start);
      }
    }

    #[test]
    fn merge_respects_period_bounds(ranges in arb_ranges()) {
      let out = merge_date_ranges(&ranges).unwrap();
      let flat: Vec<DateTime<Utc>> = ranges.iter().flatten().copied().collect();
      if flat.contains(&min_period()) {
        prop_assert_eq!(out[0].start, min_period());
      }
      if flat.contains(&max_period()) {
        prop_assert_eq!(out.last().map(|r| r.end), Some(max_period()));
      }
    }

    // Away from the bounds the merge only regroups: the set of covered days
    // is unchanged.
    #[test]
    fn merge_preserves_coverage(days in prop::collection::vec((1..1000i64, 1..1000i64), 1..8)) {
      let base = d("2000-01-01");
      let ranges: Vec<[DateTime<Utc>; 2]> = days
        .iter()
        .map(|(a, b)| [base + Duration::days(*a), base + Duration::days(*b)])
        .collect();
      let out = merge_date_ranges(&ranges).unwrap();
      let before: Vec<[i64; 2]> = days.iter().map(|(a, b)| [*a, *b]).collect();
      let after: Vec<[i64; 2]> = out
        .iter()
        .map(|r| [(r.start - base).num_days(), (r.end - base).num_days()])
        .collect();
      prop_assert_eq!(covered_days(&before), covered_days(&after));
    }
  }
}

//! Aggregation bodies and their response shapes.

use affil_core::analytics::{
  Contribution, ContributorSearch, ContributorStats, DEFAULT_SEARCH_FIELDS, SearchFields,
  SortField, TopContributorsQuery, UNKNOWN_ORG_NAMES,
};
use serde::Deserialize;
use serde_json::{Value, json};

/// Bucket size standing in for "all buckets".
const UNBOUNDED: i64 = i32::MAX as i64;

// ─── Unaffiliated ────────────────────────────────────────────────────────────

/// Documents whose author has no organization, bucketed by `author_uuid`.
pub fn unaffiliated_body(top_n: i64) -> Value {
  let size = if top_n <= 0 { UNBOUNDED } else { top_n.min(UNBOUNDED) };
  json!({
    "size": 0,
    "aggs": {
      "unaffiliated": {
        "filter": { "terms": { "author_org_name": UNKNOWN_ORG_NAMES } },
        "aggs": {
          "unaffiliated": {
            "terms": { "field": "author_uuid", "missing": "", "size": size }
          }
        }
      }
    }
  })
}

#[derive(Debug, Deserialize)]
struct Bucket {
  key:       String,
  doc_count: i64,
}

#[derive(Debug, Deserialize)]
struct Buckets<B> {
  buckets: Vec<B>,
}

#[derive(Debug, Deserialize)]
struct UnaffiliatedFilter {
  unaffiliated: Buckets<Bucket>,
}

#[derive(Debug, Deserialize)]
struct UnaffiliatedAggs {
  unaffiliated: UnaffiliatedFilter,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UnaffiliatedResponse {
  aggregations: UnaffiliatedAggs,
}

impl UnaffiliatedResponse {
  pub(crate) fn into_contributions(self) -> Vec<Contribution> {
    self
      .aggregations
      .unaffiliated
      .unaffiliated
      .buckets
      .into_iter()
      .map(|b| Contribution { uuid: b.key, contributions: b.doc_count })
      .collect()
  }
}

// ─── Top contributors ────────────────────────────────────────────────────────

/// Regexp matches of every search pattern on every searched field; any one
/// is enough. `None` when there is nothing to match against.
fn search_clause(search: &ContributorSearch, all_fields: &[String]) -> Option<Value> {
  let fields: Vec<String> = match &search.fields {
    SearchFields::Default => DEFAULT_SEARCH_FIELDS.iter().map(|f| f.to_string()).collect(),
    SearchFields::All => all_fields.to_vec(),
    SearchFields::Named(named) => named.clone(),
  };
  let should: Vec<Value> = search
    .patterns
    .iter()
    .flat_map(|pattern| {
      fields.iter().map(move |field| json!({ "regexp": { field.clone(): { "value": pattern } } }))
    })
    .collect();
  if should.is_empty() {
    return None;
  }
  Some(json!({ "bool": { "should": should, "minimum_should_match": 1 } }))
}

/// Terms ordering for a ranked field; `None` keeps the document count order.
fn bucket_order(query: &TopContributorsQuery) -> Option<Value> {
  let (field, order) = query.sort?;
  let path = match field {
    SortField::AuthorUuid => "_key",
    SortField::GerritMergedChangesets => "gerrit_merged_changesets>changesets",
    other => other.as_str(),
  };
  Some(json!({ path: order.as_str() }))
}

/// Activity per `author_uuid` inside `[from, to]`, enough buckets to cover
/// the requested page.
///
/// `all_fields` are the keyword columns an `all=` search runs against.
pub fn top_contributors_body(query: &TopContributorsQuery, all_fields: &[String]) -> Value {
  let sum = |field: &str| json!({ "sum": { "field": field } });

  let mut filter = vec![json!({
    "range": {
      "grimoire_creation_date": {
        "gte": query.from.timestamp_millis(),
        "lte": query.to.timestamp_millis(),
        "format": "epoch_millis"
      }
    }
  })];
  filter.extend(query.search.as_ref().and_then(|s| search_clause(s, all_fields)));

  let size = query.bucket_count().min(UNBOUNDED);
  let mut terms = json!({ "field": "author_uuid", "missing": "", "size": size });
  if let Some(order) = bucket_order(query) {
    terms["order"] = order;
  }

  json!({
    "size": 0,
    "query": { "bool": { "filter": filter } },
    "aggs": {
      "contributors": {
        "terms": terms,
        "aggs": {
          "git_lines_added": sum("lines_added"),
          "git_lines_changed": sum("lines_changed"),
          "git_lines_removed": sum("lines_removed"),
          "git_commits": { "cardinality": { "field": "hash" } },
          "gerrit_approvals": sum("is_gerrit_approval"),
          "gerrit_merged_changesets": {
            "filter": { "term": { "status": "MERGED" } },
            "aggs": { "changesets": sum("is_gerrit_changeset") }
          }
        }
      }
    }
  })
}

/// Top-level keyword columns across every index of a `_mapping` response,
/// sorted and without repeats.
pub(crate) fn keyword_fields(mapping: &Value) -> Vec<String> {
  let mut fields: Vec<String> = mapping
    .as_object()
    .into_iter()
    .flat_map(|indices| indices.values())
    .filter_map(|index| index["mappings"]["properties"].as_object())
    .flat_map(|properties| properties.iter())
    .filter(|(_, spec)| spec["type"] == "keyword")
    .map(|(name, _)| name.clone())
    .collect();
  fields.sort();
  fields.dedup();
  fields
}

/// A single-value metric; sums come back as floats.
#[derive(Debug, Default, Deserialize)]
struct Metric {
  value: Option<f64>,
}

impl Metric {
  fn int(&self) -> i64 { self.value.unwrap_or_default().round() as i64 }
}

#[derive(Debug, Default, Deserialize)]
struct MergedFilter {
  #[serde(default)]
  changesets: Metric,
}

#[derive(Debug, Deserialize)]
struct ContributorBucket {
  key:                      String,
  #[serde(default)]
  git_lines_added:          Metric,
  #[serde(default)]
  git_lines_changed:        Metric,
  #[serde(default)]
  git_lines_removed:        Metric,
  #[serde(default)]
  git_commits:              Metric,
  #[serde(default)]
  gerrit_approvals:         Metric,
  #[serde(default)]
  gerrit_merged_changesets: MergedFilter,
}

impl ContributorBucket {
  fn into_stats(self) -> ContributorStats {
    ContributorStats {
      git_lines_added: self.git_lines_added.int(),
      git_lines_changed: self.git_lines_changed.int(),
      git_lines_removed: self.git_lines_removed.int(),
      git_commits: self.git_commits.int(),
      gerrit_approvals: self.gerrit_approvals.int(),
      gerrit_merged_changesets: self.gerrit_merged_changesets.changesets.int(),
      uuid: self.key,
      ..Default::default()
    }
  }
}

#[derive(Debug, Deserialize)]
struct TopAggs {
  contributors: Buckets<ContributorBucket>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TopContributorsResponse {
  aggregations: TopAggs,
}

impl TopContributorsResponse {
  /// The requested page out of the returned buckets.
  pub(crate) fn into_page(self, query: &TopContributorsQuery) -> Vec<ContributorStats> {
    let (start, end) = query.page_bounds();
    self
      .aggregations
      .contributors
      .buckets
      .into_iter()
      .skip(start)
      .take(end - start)
      .map(ContributorBucket::into_stats)
      .collect()
  }
}

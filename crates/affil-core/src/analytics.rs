//! Contribution analytics: project slugs, index patterns and the rows the
//! document store and the enrichment queries exchange.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, dates::from_millis};

/// `author_org_name` values that mean "no organization".
pub const UNKNOWN_ORG_NAMES: [&str; 5] = ["Unknown", "NotFound", "", "-", "?"];

pub const DEFAULT_TOP_LIMIT: i64 = 10;
pub const DEFAULT_WINDOW_DAYS: i64 = 90;

/// Strip surrounding whitespace and a leading `/projects/` from a slug.
pub fn normalize_slug(slug: &str) -> &str {
  let slug = slug.trim();
  slug.strip_prefix("/projects/").unwrap_or(slug)
}

/// The index pattern backing one project's analytics.
pub fn index_pattern(slug: &str) -> String {
  format!("sds-{}-*,-*raw,-*for-merge", normalize_slug(slug).replace('/', "-"))
}

// ─── Unaffiliated ────────────────────────────────────────────────────────────

/// A contributor bucket as returned by the document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
  pub uuid:          String,
  pub contributions: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnaffiliatedContributor {
  pub uuid:          String,
  pub name:          Option<String>,
  pub contributions: i64,
}

// ─── Top contributors ────────────────────────────────────────────────────────

/// Aggregated activity of one contributor, enriched with profile data.
///
/// Field order is the CSV column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorStats {
  pub uuid:                     String,
  pub name:                     Option<String>,
  pub email:                    Option<String>,
  pub organization:             Option<String>,
  pub git_lines_added:          i64,
  pub git_lines_changed:        i64,
  pub git_lines_removed:        i64,
  pub git_commits:              i64,
  pub gerrit_approvals:         i64,
  pub gerrit_merged_changesets: i64,
}

/// Upper bound for `limit` and `top`.
pub const MAX_TOP_LIMIT: i64 = 10_000;
/// `limit` of the CSV export when none is given.
pub const CSV_TOP_LIMIT: i64 = MAX_TOP_LIMIT;

/// Columns the plain search form looks at.
pub const DEFAULT_SEARCH_FIELDS: [&str; 3] = ["author_name", "author_org_name", "author_uuid"];

/// Turn a search term into a document-store regexp.
///
/// `re:<pattern>` is taken as is, with only the characters the regexp
/// dialect reserves for its optional operators escaped. Anything else becomes
/// a case-insensitive "contains" pattern: `abc` → `.*[aA][bB][cC].*`, spaces
/// match one or more spaces and `*` matches anything.
pub fn to_case_insensitive_regexp(term: &str) -> String {
  if let Some(raw) = term.strip_prefix("re:") {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
      if matches!(c, '"' | '#' | '@' | '<' | '>' | '~' | '&') {
        out.push('\\');
      }
      out.push(c);
    }
    return out;
  }

  let mut out = String::from(".*");
  for c in term.trim().to_lowercase().chars() {
    match c {
      'a'..='z' => {
        out.push('[');
        out.push(c);
        out.push(c.to_ascii_uppercase());
        out.push(']');
      }
      ' ' => out.push_str(" +"),
      '*' => out.push_str(".*"),
      '"' | '#' | '@' | '<' | '>' | '~' | '&' | '|' | '{' | '}' | '[' | ']' | '(' | ')' | '\\'
      | '+' | '?' | '.' => {
        out.push('\\');
        out.push(c);
      }
      _ => out.push(c),
    }
  }
  out.push_str(".*");
  out
}

/// Which columns a search runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchFields {
  /// Author name, organization and uuid.
  Default,
  /// Every keyword column of the index.
  All,
  Named(Vec<String>),
}

/// A parsed `search` parameter: any pattern on any field matches.
///
/// | Form | Meaning |
/// |------|---------|
/// | `john` | contains `john` in name, organization or uuid |
/// | `all=john,jane` | contains either in any keyword column |
/// | `author_name,author_uuid=john` | contains `john` in either column |
/// | `re:J.*n` | raw regexp, case-sensitive |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributorSearch {
  pub fields:   SearchFields,
  pub patterns: Vec<String>,
}

impl ContributorSearch {
  /// `None` when the search is empty or names no field or value.
  pub fn parse(search: &str) -> Option<Self> {
    let search = if search.starts_with("re:") || search.contains("=re:") {
      search.to_owned()
    } else {
      search.trim().to_lowercase()
    };
    if search.is_empty() {
      return None;
    }

    let Some((fields, values)) = search.split_once('=') else {
      return Some(Self {
        fields:   SearchFields::Default,
        patterns: vec![to_case_insensitive_regexp(&search)],
      });
    };
    let fields: Vec<&str> = fields.split(',').collect();
    let values: Vec<&str> = values.split(',').collect();
    if fields[0].trim().is_empty() || values[0].trim().is_empty() {
      return None;
    }

    let fields = match fields.as_slice() {
      ["all"] => SearchFields::All,
      named => SearchFields::Named(named.iter().map(|f| f.trim().to_owned()).collect()),
    };
    let patterns = values.into_iter().map(to_case_insensitive_regexp).collect();
    Some(Self { fields, patterns })
  }
}

/// Metrics a contributor page can be ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
  AuthorUuid,
  GitCommits,
  GitLinesAdded,
  GitLinesRemoved,
  GitLinesChanged,
  GerritApprovals,
  GerritMergedChangesets,
}

impl SortField {
  /// `None` for unknown names; those rank by activity.
  pub fn parse(name: &str) -> Option<Self> {
    Some(match name.trim() {
      "author_uuid" => Self::AuthorUuid,
      "git_commits" => Self::GitCommits,
      "git_lines_added" => Self::GitLinesAdded,
      "git_lines_removed" => Self::GitLinesRemoved,
      "git_lines_changed" => Self::GitLinesChanged,
      "gerrit_approvals" => Self::GerritApprovals,
      "gerrit_merged_changesets" => Self::GerritMergedChangesets,
      _ => return None,
    })
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::AuthorUuid => "author_uuid",
      Self::GitCommits => "git_commits",
      Self::GitLinesAdded => "git_lines_added",
      Self::GitLinesRemoved => "git_lines_removed",
      Self::GitLinesChanged => "git_lines_changed",
      Self::GerritApprovals => "gerrit_approvals",
      Self::GerritMergedChangesets => "gerrit_merged_changesets",
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
  Asc,
  #[default]
  Desc,
}

impl SortOrder {
  /// Empty means descending; anything but `asc`/`desc` is `BadRequest`.
  pub fn parse(order: &str) -> Result<Self> {
    match order.trim().to_lowercase().as_str() {
      "" | "desc" => Ok(Self::Desc),
      "asc" => Ok(Self::Asc),
      other => Err(Error::BadRequest(format!("unknown sort_order: {other}"))),
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Asc => "asc",
      Self::Desc => "desc",
    }
  }
}

/// `data_source` value meaning every data source of the project.
pub const ALL_DATA_SOURCES: &str = "all";

/// Comma-separated data sources, lowercased and sorted. Defaults to `all`.
pub fn parse_data_sources(data_source: Option<&str>) -> Vec<String> {
  let mut sources: Vec<String> = data_source
    .unwrap_or(ALL_DATA_SOURCES)
    .split(',')
    .map(|ds| ds.trim().to_lowercase())
    .filter(|ds| !ds.is_empty())
    .collect();
  sources.sort();
  sources.dedup();
  if sources.is_empty() {
    sources.push(ALL_DATA_SOURCES.to_owned());
  }
  sources
}

/// The index pattern covering some data sources of one project.
///
/// `all` anywhere in the list means the whole project.
pub fn data_source_pattern(slug: &str, data_sources: &[String]) -> String {
  if data_sources.is_empty() || data_sources.iter().any(|ds| ds == ALL_DATA_SOURCES) {
    return index_pattern(slug);
  }
  let root = normalize_slug(slug).replace('/', "-");
  let mut parts: Vec<String> =
    data_sources.iter().map(|ds| format!("sds-{root}-{}*", ds.replace('/', "-"))).collect();
  parts.push("-*raw".into());
  parts.push("-*for-merge".into());
  parts.join(",")
}

/// A validated top-contributors request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopContributorsQuery {
  pub from:         DateTime<Utc>,
  pub to:           DateTime<Utc>,
  pub limit:        i64,
  pub offset:       i64,
  pub search:       Option<ContributorSearch>,
  /// `None` ranks by document count, descending.
  pub sort:         Option<(SortField, SortOrder)>,
  pub data_sources: Vec<String>,
}

impl TopContributorsQuery {
  /// Build a window from optional epoch-millisecond bounds relative to `now`.
  ///
  /// `limit` is clamped to `1..=MAX_TOP_LIMIT`.
  pub fn new(
    from: Option<i64>,
    to: Option<i64>,
    limit: Option<i64>,
    offset: Option<i64>,
    now: DateTime<Utc>,
  ) -> Result<Self> {
    let to = match to {
      Some(ms) => from_millis(ms)?,
      None => now,
    };
    let from = match from {
      Some(ms) => from_millis(ms)?,
      None => now - Duration::days(DEFAULT_WINDOW_DAYS),
    };
    if to < from {
      return Err(Error::BadRequest(format!(
        "'to' {} is before 'from' {}",
        to.to_rfc3339(),
        from.to_rfc3339()
      )));
    }
    let limit = limit.map_or(DEFAULT_TOP_LIMIT, |l| l.clamp(1, MAX_TOP_LIMIT));
    let offset = offset.unwrap_or(0).max(0);
    Ok(Self {
      from,
      to,
      limit,
      offset,
      search: None,
      sort: None,
      data_sources: vec![ALL_DATA_SOURCES.to_owned()],
    })
  }

  pub fn with_search(mut self, search: Option<&str>) -> Self {
    self.search = search.and_then(ContributorSearch::parse);
    self
  }

  /// An unknown `sort_field` ranks by activity; a bad `sort_order` is
  /// rejected either way.
  pub fn with_sort(mut self, field: Option<&str>, order: Option<&str>) -> Result<Self> {
    let order = SortOrder::parse(order.unwrap_or_default())?;
    self.sort = field.and_then(SortField::parse).map(|f| (f, order));
    Ok(self)
  }

  pub fn with_data_sources(mut self, data_source: Option<&str>) -> Self {
    self.data_sources = parse_data_sources(data_source);
    self
  }

  /// Buckets the document store must return to cover the requested page.
  pub fn bucket_count(&self) -> i64 { self.offset.saturating_add(1).saturating_mul(self.limit) }

  pub fn page_bounds(&self) -> (usize, usize) {
    let start = usize::try_from(self.offset.saturating_mul(self.limit)).unwrap_or(usize::MAX);
    (start, start.saturating_add(self.limit as usize))
  }
}

//! Process-wide registry of secrets that must never appear in messages.

use std::sync::{OnceLock, RwLock};

pub const REDACTED: &str = "[redacted]";

fn secrets() -> &'static RwLock<Vec<String>> {
  static SECRETS: OnceLock<RwLock<Vec<String>>> = OnceLock::new();
  SECRETS.get_or_init(|| RwLock::new(Vec::new()))
}

/// Register a secret. Blank values are ignored.
pub fn register(secret: impl Into<String>) {
  let secret = secret.into();
  if secret.trim().is_empty() {
    return;
  }
  let mut guard = secrets().write().unwrap_or_else(|poisoned| poisoned.into_inner());
  if !guard.contains(&secret) {
    guard.push(secret);
    // Longest first, so a secret containing another is replaced whole.
    guard.sort_by_key(|s| std::cmp::Reverse(s.len()));
  }
}

/// Replace every registered secret in `message` with [`REDACTED`].
pub fn redact(message: &str) -> String {
  let guard = secrets().read().unwrap_or_else(|poisoned| poisoned.into_inner());
  guard
    .iter()
    .fold(message.to_owned(), |acc, secret| acc.replace(secret.as_str(), REDACTED))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn registered_secrets_are_replaced() {
    register("s3cr3t-db-pass");
    register("   ");
    assert_eq!(
      redact("connect to mysql://sh:s3cr3t-db-pass@db failed"),
      "connect to mysql://sh:[redacted]@db failed"
    );
    assert_eq!(redact("nothing to hide"), "nothing to hide");
  }

  #[test]
  fn longer_secret_wins_over_its_prefix() {
    register("tok-123");
    register("tok-123456");
    assert_eq!(redact("bearer tok-123456"), "bearer [redacted]");
  }
}

//! Derivation of stable identity ids.

use sha1::{Digest, Sha1};
use unicode_normalization::UnicodeNormalization;

/// Letters NFKD does not decompose into an ASCII base.
const MANUAL_REPLACEMENTS: [(char, &str); 4] = [('ł', "l"), ('ø', "o"), ('ß', "ss"), ('æ', "ae")];

/// Fold `s` to printable ASCII: a few manual transliterations, NFKD
/// decomposition, then every char below U+0020 or from U+007F up is dropped.
pub fn strip_unicode(s: &str) -> String {
  let mut folded = String::with_capacity(s.len());
  for c in s.chars() {
    match MANUAL_REPLACEMENTS.iter().find(|(from, _)| *from == c) {
      Some((_, to)) => folded.push_str(to),
      None => folded.push(c),
    }
  }
  folded.nfkd().filter(|c| (' '..'\u{7f}').contains(c)).collect()
}

/// The primary key of an identity: lowercase hex SHA-1 over
/// `source:email:name:username` after [`strip_unicode`]. Missing fields are
/// empty strings.
pub fn identity_id(
  source: &str,
  email: Option<&str>,
  name: Option<&str>,
  username: Option<&str>,
) -> String {
  let joined = format!(
    "{source}:{}:{}:{}",
    email.unwrap_or_default(),
    name.unwrap_or_default(),
    username.unwrap_or_default()
  );
  hex::encode(Sha1::digest(strip_unicode(&joined).as_bytes()))
}

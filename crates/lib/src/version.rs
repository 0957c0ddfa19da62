//! Version tag resolution.
//!
//! Artifact tags in the registry are integers encoded as strings. Registries
//! accumulate non-numeric tags over time (manual pushes, experiments), so
//! everything here ignores tags that don't parse instead of failing.

/// Parse a tag as an integer.
///
/// Accepts an optional sign followed by a decimal number or a prefixed number
/// in another base: `0x` (hex), `0o` or a bare leading `0` (octal), `0b`
/// (binary). Single underscores may separate digits (`1_000`, `0x_ff`).
/// Returns `None` for anything else, including overflow.
pub fn parse_tag(tag: &str) -> Option<i64> {
  let (sign, rest) = match tag.as_bytes().first()? {
    b'+' => ("", &tag[1..]),
    b'-' => ("-", &tag[1..]),
    _ => ("", tag),
  };

  let stripped;
  let rest = if rest.contains('_') {
    if !underscores_separate_digits(rest) {
      return None;
    }
    stripped = rest.replace('_', "");
    stripped.as_str()
  } else {
    rest
  };

  let (radix, digits) = if let Some(d) = strip_prefix_ci(rest, "0x") {
    (16, d)
  } else if let Some(d) = strip_prefix_ci(rest, "0o") {
    (8, d)
  } else if let Some(d) = strip_prefix_ci(rest, "0b") {
    (2, d)
  } else if rest.len() > 1 && rest.starts_with('0') {
    (8, &rest[1..])
  } else {
    (10, rest)
  };

  // from_str_radix tolerates its own sign, which would let "+-1" through.
  if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_alphanumeric()) {
    return None;
  }

  i64::from_str_radix(&format!("{}{}", sign, digits), radix).ok()
}

/// Every `_` in `s` sits between two digits, or between a base prefix and a
/// digit.
fn underscores_separate_digits(s: &str) -> bool {
  let bytes = s.as_bytes();
  let (mut i, hex) = match bytes {
    [b'0', p, ..] if matches!(p.to_ascii_lowercase(), b'x' | b'o' | b'b') => (2, p.eq_ignore_ascii_case(&b'x')),
    _ => (0, false),
  };
  // The base prefix counts as a digit.
  let mut after_digit = i == 2;
  let mut after_underscore = false;

  while i < bytes.len() {
    let b = bytes[i];
    if b.is_ascii_digit() || (hex && b.is_ascii_hexdigit()) {
      after_digit = true;
      after_underscore = false;
    } else if b == b'_' {
      if !after_digit {
        return false;
      }
      after_digit = false;
      after_underscore = true;
    } else {
      if after_underscore {
        return false;
      }
      after_digit = false;
    }
    i += 1;
  }
  !after_underscore
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
  match s.get(..prefix.len()) {
    Some(head) if head.eq_ignore_ascii_case(prefix) => Some(&s[prefix.len()..]),
    _ => None,
  }
}

/// Find the latest numeric tag.
///
/// Returns the maximum parsed value as a decimal string and whether any tag
/// parsed at all. With no numeric tag the result is `("0", false)`.
pub fn latest_tag<I, S>(tags: I) -> (String, bool)
where
  I: IntoIterator<Item = S>,
  S: AsRef<str>,
{
  let mut last: i64 = 0;
  let mut found = false;

  for tag in tags {
    let Some(value) = parse_tag(tag.as_ref()) else {
      continue;
    };
    found = true;
    if value > last {
      last = value;
    }
  }

  (last.to_string(), found)
}

/// Compute the tag that follows `tag`.
///
/// A tag that doesn't parse resets the lineage to `"0"` rather than failing.
pub fn next_tag(tag: &str) -> String {
  match parse_tag(tag).and_then(|v| v.checked_add(1)) {
    Some(next) => next.to_string(),
    None => "0".to_string(),
  }
}

use std::sync::LazyLock;

use regex::Regex;

use crate::common::errors::ExtractError;

/// Ordered (offset, length) pairs carved out of the player script.
pub type KeySchedule = Vec<(usize, usize)>;

// The script hides the pairs as switch arms of the shape
// `case 0x1f: a=bQ,b=dX;` where bQ and dX are defined elsewhere as numeric
// literals. Arms whose body mentions `partKey` belong to an unrelated code
// path and must be skipped.
static CASE_ARM: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"case\s*0x[0-9a-f]+:\s*\w+\s*=\s*(\w+)\s*,\s*\w+\s*=\s*(\w+);").expect("valid regex")
});

/// Recovers the key schedule from player script text.
///
/// The script is obfuscated executable code; rather than run it, the
/// numeric constants are read straight out of the structural pattern the
/// obfuscator emits. If the upstream changes that shape, this is the only
/// place that needs new patterns.
pub fn extract_key_schedule(script: &str) -> Result<KeySchedule, ExtractError> {
  let mut schedule = Vec::new();

  for caps in CASE_ARM.captures_iter(script) {
    if caps[0].contains("partKey") {
      continue;
    }
    let offset = resolve_literal(script, &caps[1])?;
    let length = resolve_literal(script, &caps[2])?;
    schedule.push((offset, length));
  }

  if schedule.is_empty() {
    return Err(ExtractError::KeyScheduleNotFound);
  }
  Ok(schedule)
}

/// Finds `,<ident>=<literal>` elsewhere in the script and decodes the
/// literal: base 16 with an `0x` prefix, base 10 without.
fn resolve_literal(script: &str, ident: &str) -> Result<usize, ExtractError> {
  let pattern = format!(",{}=((?:0x)?[0-9a-fA-F]+)", regex::escape(ident));
  let re = Regex::new(&pattern).map_err(|_| ExtractError::KeyScheduleNotFound)?;
  let caps = re
    .captures(script)
    .ok_or(ExtractError::KeyScheduleNotFound)?;

  let literal = &caps[1];
  let value = match literal.strip_prefix("0x") {
    Some(hex) => usize::from_str_radix(hex, 16),
    None => literal.parse(),
  };
  value.map_err(|_| ExtractError::KeyScheduleNotFound)
}

/// Splits the encoded payload into the secret (in schedule order) and the
/// residual ciphertext (surviving characters, original order).
///
/// Offsets are relative to a cursor that advances by each consumed length,
/// so every pair is measured past the spans already carved out. The walk
/// reads the untouched payload while blanking a working copy, which keeps
/// the two outputs an exact partition of the input.
pub fn carve_secret(
  payload: &str,
  schedule: &[(usize, usize)],
) -> Result<(String, String), ExtractError> {
  let chars: Vec<char> = payload.chars().collect();
  let mut taken = vec![false; chars.len()];
  let mut secret = String::new();
  let mut cursor = 0usize;

  for &(offset, length) in schedule {
    let start = offset + cursor;
    let end = start + length;
    if end > chars.len() {
      // Schedule from a script revision that does not match this payload.
      return Err(ExtractError::KeyScheduleNotFound);
    }
    for i in start..end {
      secret.push(chars[i]);
      taken[i] = true;
    }
    cursor += length;
  }

  let residual: String = chars
    .iter()
    .zip(taken.iter())
    .filter(|(_, used)| !**used)
    .map(|(c, _)| *c)
    .collect();

  Ok((secret, residual))
}

#[cfg(test)]
mod tests {
  use super::*;

  const SCRIPT: &str = "switch(q){case 0x1a:p=Qx,v=Jz;case 0x2b:r=partKey,s=Qx;case 0x3c:m=Tn,n=Wd;}var z=[0,Qx=0x2,Jz=0x4,Tn=10,Wd=3,partKey=0x9];";

  #[test]
  fn schedule_reads_hex_and_decimal_literals() {
    let schedule = extract_key_schedule(SCRIPT).unwrap();
    assert_eq!(schedule, vec![(2, 4), (10, 3)]);
  }

  #[test]
  fn part_key_arms_are_skipped() {
    let schedule = extract_key_schedule(SCRIPT).unwrap();
    // The 0x2b arm resolves to (9, 2) and must not appear.
    assert!(!schedule.contains(&(9, 2)));
  }

  #[test]
  fn unresolvable_identifier_fails_extraction() {
    let script = "case 0x1:a=Qx,b=Zz;var z=[0,Qx=0x2];";
    assert!(matches!(
      extract_key_schedule(script),
      Err(ExtractError::KeyScheduleNotFound)
    ));
  }

  #[test]
  fn script_without_case_arms_fails_extraction() {
    assert!(matches!(
      extract_key_schedule("var a = 1;"),
      Err(ExtractError::KeyScheduleNotFound)
    ));
  }

  #[test]
  fn carve_walks_with_a_running_cursor() {
    // 30 characters; (2,4) consumes CDEF, then the cursor shifts the
    // second pair to absolute offset 14, consuming OPQ.
    let payload = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123";
    let (secret, residual) = carve_secret(payload, &[(2, 4), (10, 3)]).unwrap();

    assert_eq!(secret, "CDEFOPQ");
    assert_eq!(residual, "ABGHIJKLMNRSTUVWXYZ0123");
    assert_eq!(residual.len(), 23);
  }

  #[test]
  fn carve_partitions_without_loss() {
    let payload = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123";
    let (secret, residual) = carve_secret(payload, &[(2, 4), (10, 3), (11, 2)]).unwrap();

    assert_eq!(secret.len() + residual.len(), payload.len());
    let mut all: Vec<char> = secret.chars().chain(residual.chars()).collect();
    all.sort_unstable();
    let mut expected: Vec<char> = payload.chars().collect();
    expected.sort_unstable();
    assert_eq!(all, expected);
  }

  #[test]
  fn carve_past_the_end_is_rejected() {
    assert!(matches!(
      carve_secret("short", &[(2, 10)]),
      Err(ExtractError::KeyScheduleNotFound)
    ));
  }

  #[test]
  fn empty_schedule_yields_untouched_residual() {
    let (secret, residual) = carve_secret("abcdef", &[]).unwrap();
    assert_eq!(secret, "");
    assert_eq!(residual, "abcdef");
  }
}

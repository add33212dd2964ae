//! Position id sanitization and chunking.
//!
//! Ids arrive either from the matching service (JSON numbers or numeric
//! strings) or from an operator on the command line (`"[123,329]"` or
//! `"123,329"`). Every consumer downstream expects a strictly ascending,
//! duplicate-free sequence.

use std::collections::BTreeSet;

use crate::error::{CoreError, Result};

/// On-chain position identifier.
pub type PositionId = u64;

/// Largest integer an f64 token can carry without losing precision (2^53).
const MAX_SAFE_FLOAT_ID: f64 = 9_007_199_254_740_992.0;

/// Parse raw operator input into sanitized ids.
///
/// Accepts a JSON array (`[1,2,3]`, numbers or numeric strings) or a
/// comma-separated list (`1,2,3`). Blank list entries are ignored.
pub fn parse_ids(raw: &str) -> Result<Vec<PositionId>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CoreError::EmptyIds);
    }

    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        let values: Vec<serde_json::Value> = serde_json::from_str(trimmed)
            .map_err(|e| CoreError::InvalidId(format!("cannot parse JSON id list: {e}")))?;
        let tokens = values
            .iter()
            .map(json_token)
            .collect::<Result<Vec<String>>>()?;
        return sanitize_ids(tokens);
    }

    sanitize_ids(
        trimmed
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty()),
    )
}

/// Validate, deduplicate and sort id tokens.
///
/// Any token that is not a finite non-negative integer rejects the whole
/// input. An empty input is rejected as well.
pub fn sanitize_ids<I, S>(tokens: I) -> Result<Vec<PositionId>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = BTreeSet::new();
    for token in tokens {
        out.insert(parse_id(token.as_ref())?);
    }
    if out.is_empty() {
        return Err(CoreError::EmptyIds);
    }
    Ok(out.into_iter().collect())
}

/// Split ids into contiguous groups of at most `size`, preserving order.
pub fn chunk_ids(ids: &[PositionId], size: usize) -> Vec<&[PositionId]> {
    ids.chunks(size.max(1)).collect()
}

fn json_token(value: &serde_json::Value) -> Result<String> {
    match value {
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::String(s) => Ok(s.clone()),
        other => Err(CoreError::InvalidId(format!("{other} (integer expected)"))),
    }
}

/// Parse one id token. Must denote a finite non-negative integer.
pub fn parse_id(token: &str) -> Result<PositionId> {
    let token = token.trim();
    if let Ok(id) = token.parse::<u64>() {
        return Ok(id);
    }

    // Float-shaped tokens ("7.0", "1e3") are accepted when they denote an exact integer.
    let value: f64 = token
        .parse()
        .map_err(|_| CoreError::InvalidId(format!("{token} (integer expected)")))?;
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > MAX_SAFE_FLOAT_ID {
        return Err(CoreError::InvalidId(format!("{token} (integer expected)")));
    }
    Ok(value as PositionId)
}

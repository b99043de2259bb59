//! Random token generation.
//!
//! Tokens are alphanumeric strings drawn from the OS CSPRNG, optionally
//! split into dash-separated blocks for readability. The total formatted
//! length never exceeds [`TOKEN_MAX_SIZE`].

use rand::distributions::Alphanumeric;
use rand::rngs::{OsRng, StdRng};
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::errors::PrivateUrlError;

pub const TOKEN_MIN_SIZE: i64 = 8;
pub const TOKEN_MAX_SIZE: i64 = 65;
pub const DEFAULT_DASH_SPLIT_EACH: i64 = 12;
pub const DEFAULT_TOKEN_SIZE: TokenSize = TokenSize::Range(36, 60);

/// Requested token length, before dash formatting.
///
/// Deserializes from a number (`50`) or a list of bounds (`[36, 60]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TokenSize {
    Fixed(i64),
    /// Inclusive `[min, max]`.
    Range(i64, i64),
    /// Untyped bound list; only valid with exactly two entries.
    Bounds(Vec<i64>),
}

impl Default for TokenSize {
    fn default() -> Self {
        DEFAULT_TOKEN_SIZE
    }
}

/// Source of tokens for [`crate::service::PrivateUrls`].
pub trait TokenGenerator: Send + Sync {
    fn generate(&self, size: &TokenSize, dash_split_each: i64) -> Result<String, PrivateUrlError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomTokenGenerator;

impl TokenGenerator for RandomTokenGenerator {
    fn generate(&self, size: &TokenSize, dash_split_each: i64) -> Result<String, PrivateUrlError> {
        generate_token(size, dash_split_each)
    }
}

/// Largest raw length whose dash-formatted form still fits in [`TOKEN_MAX_SIZE`].
pub fn effective_max_size(dash_split_each: i64) -> i64 {
    if dash_split_each <= 0 {
        return TOKEN_MAX_SIZE;
    }
    // Past TOKEN_MAX_SIZE no dash is ever inserted.
    let d = dash_split_each.min(TOKEN_MAX_SIZE);
    // ceil(TOKEN_MAX_SIZE * d / (d + 1))
    (TOKEN_MAX_SIZE * d + d) / (d + 1)
}

/// Checks a requested size and dash setting, returning the inclusive `(min, max)`
/// raw length. A fixed size yields `min == max`.
pub fn validate_token_size(
    size: &TokenSize,
    dash_split_each: i64,
) -> Result<(i64, i64), PrivateUrlError> {
    if dash_split_each < 0 {
        return Err(PrivateUrlError::invalid(format!(
            "dash_split_each must not be negative (got {dash_split_each})"
        )));
    }
    if (1..4).contains(&dash_split_each) {
        return Err(PrivateUrlError::invalid(format!(
            "dash_split_each must be 0 or at least 4 (got {dash_split_each})"
        )));
    }

    let max_allowed = effective_max_size(dash_split_each);
    let in_bounds = |n: i64| (TOKEN_MIN_SIZE..=max_allowed).contains(&n);

    let (min, max) = match size {
        TokenSize::Fixed(n) => {
            if !in_bounds(*n) {
                return Err(PrivateUrlError::invalid(format!(
                    "token size {n} is outside [{TOKEN_MIN_SIZE}, {max_allowed}]"
                )));
            }
            return Ok((*n, *n));
        }
        TokenSize::Range(min, max) => (*min, *max),
        TokenSize::Bounds(bounds) => match bounds.as_slice() {
            [min, max] => (*min, *max),
            _ => {
                return Err(PrivateUrlError::invalid(format!(
                    "token size range needs exactly two bounds (got {})",
                    bounds.len()
                )))
            }
        },
    };

    if min >= max {
        return Err(PrivateUrlError::invalid(format!(
            "token size range min must be below max (got [{min}, {max}])"
        )));
    }
    if !in_bounds(min) || !in_bounds(max) {
        return Err(PrivateUrlError::invalid(format!(
            "token size range [{min}, {max}] is outside [{TOKEN_MIN_SIZE}, {max_allowed}]"
        )));
    }
    Ok((min, max))
}

/// Generates a fresh token. `dash_split_each == 0` disables dash formatting.
pub fn generate_token(size: &TokenSize, dash_split_each: i64) -> Result<String, PrivateUrlError> {
    let (min, max) = validate_token_size(size, dash_split_each)?;
    let len = if min == max {
        min
    } else {
        // fresh entropy per call, no shared seed across calls
        StdRng::from_entropy().gen_range(min..=max)
    };

    let raw: String = OsRng
        .sample_iter(&Alphanumeric)
        .take(len as usize)
        .map(char::from)
        .collect();

    Ok(split_with_dashes(&raw, dash_split_each))
}

fn split_with_dashes(raw: &str, each: i64) -> String {
    if each <= 0 {
        return raw.to_string();
    }
    let each = each as usize;
    let mut out = String::with_capacity(raw.len() + raw.len() / each);
    for (i, c) in raw.chars().enumerate() {
        if i > 0 && i % each == 0 {
            out.push('-');
        }
        out.push(c);
    }
    out
}

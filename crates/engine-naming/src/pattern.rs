//! Pattern substitution for [`NamingStrategy::Pattern`](crate::NamingStrategy::Pattern).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use engine_core::Urn;

use crate::resolver::NamingConfig;

const HEX_ALPHABET: &[u8] = b"0123456789abcdef";
const ALPHANUM_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const ALPHA_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGIT_ALPHABET: &[u8] = b"0123456789";

/// Derives a deterministic per-resource seed from a global seed and the
/// resource's URN, so the same `(pattern, URN, seed)` always proposes the
/// same name.
pub fn seed_for(urn: &Urn, global_seed: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    global_seed.hash(&mut hasher);
    urn.as_str().hash(&mut hasher);
    hasher.finish()
}

/// True if `pattern` contains any random-generator token.
pub fn has_random_token(pattern: &str) -> bool {
    ["${hex(", "${alphanum(", "${string(", "${num(", "${uuid}"]
        .iter()
        .any(|token| pattern.contains(token))
}

/// Substitutes every `${...}` token in `pattern`.
pub fn substitute(pattern: &str, urn: &Urn, config: &NamingConfig, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = String::new();
    let mut rest = pattern;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        out.push_str(&resolve_token(&after[..end], urn, config, &mut rng));
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

fn resolve_token(token: &str, urn: &Urn, config: &NamingConfig, rng: &mut StdRng) -> String {
    match token {
        "name" => return urn.name().to_string(),
        "organization" => return config.organization.clone(),
        "project" => return config.project.clone(),
        "stack" => return config.stack.clone(),
        "uuid" => return random_uuid_like(rng),
        _ => {}
    }
    if let Some(key) = token.strip_prefix("config.") {
        return config.config.get(key).cloned().unwrap_or_default();
    }
    if let Some(n) = parse_call(token, "hex") {
        return random_string(rng, n, HEX_ALPHABET);
    }
    if let Some(n) = parse_call(token, "alphanum") {
        return random_string(rng, n, ALPHANUM_ALPHABET);
    }
    if let Some(n) = parse_call(token, "string") {
        return random_string(rng, n, ALPHA_ALPHABET);
    }
    if let Some(n) = parse_call(token, "num") {
        return random_string(rng, n, DIGIT_ALPHABET);
    }
    tracing::warn!(token, "unrecognized naming pattern token, substituting empty string");
    String::new()
}

fn parse_call(token: &str, name: &str) -> Option<usize> {
    let inner = token.strip_prefix(name)?.strip_prefix('(')?.strip_suffix(')')?;
    inner.parse().ok()
}

fn random_string(rng: &mut StdRng, n: usize, alphabet: &[u8]) -> String {
    (0..n).map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char).collect()
}

fn random_uuid_like(rng: &mut StdRng) -> String {
    let bytes: [u8; 16] = rng.r#gen();
    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
    )
}

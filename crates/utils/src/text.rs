//! Small text helpers: URL slugs and opaque tokens.

use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};

pub const MAX_SLUG_LEN: usize = 60;
const FALLBACK_SLUG: &str = "cleaner";

/// Fold the accented Latin characters that show up in Spanish, Catalan and
/// the usual expat names into their ASCII base letter.
fn fold_accent(c: char) -> Option<&'static str> {
    let folded = match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' | 'Á' | 'À' | 'Â' | 'Ä' | 'Ã' | 'Å' => "a",
        'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => "e",
        'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => "i",
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'ø' | 'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' | 'Ø' => "o",
        'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => "u",
        'ñ' | 'Ñ' => "n",
        'ç' | 'Ç' => "c",
        'ý' | 'ÿ' | 'Ý' => "y",
        'ß' => "ss",
        'æ' | 'Æ' => "ae",
        'œ' | 'Œ' => "oe",
        _ => return None,
    };
    Some(folded)
}

/// Build a URL slug: lowercase ASCII, accents folded, runs of anything else
/// collapsed into a single `-`. Falls back to `cleaner` when nothing usable
/// remains (empty input, names in non-Latin scripts).
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars() {
        let piece: Option<String> = if c.is_ascii_alphanumeric() {
            Some(c.to_ascii_lowercase().to_string())
        } else {
            fold_accent(c).map(str::to_string)
        };

        match piece {
            Some(piece) => {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push_str(&piece);
            }
            None => pending_dash = true,
        }
    }

    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
    }

    if slug.is_empty() {
        return FALLBACK_SLUG.to_string();
    }
    slug
}

/// Random alphanumeric suffix, lowercase.
pub fn random_suffix(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect()
}

/// Opaque bearer token handed to clients (sessions). Only its hash is stored.
pub fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

/// Six digit numeric verification code.
pub fn generate_code() -> String {
    format!("{:06}", rand::rng().random_range(0..1_000_000u32))
}

/// Hex encoded SHA-256 of a token or code.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_folds_spanish_accents() {
        assert_eq!(slugify("María José Núñez"), "maria-jose-nunez");
        assert_eq!(slugify("Limpiezas Çà y Ñ"), "limpiezas-ca-y-n");
    }

    #[test]
    fn test_slugify_collapses_separators() {
        assert_eq!(slugify("  --Villa   Clean!!  Pro-- "), "villa-clean-pro");
        assert_eq!(slugify("a_b.c"), "a-b-c");
    }

    #[test]
    fn test_slugify_falls_back_when_nothing_usable() {
        assert_eq!(slugify("!!! ???"), "cleaner");
        assert_eq!(slugify(""), "cleaner");
        assert_eq!(slugify("李娜"), "cleaner");
        assert_eq!(slugify("Анна 2"), "2");
    }

    #[test]
    fn test_slugify_truncates_without_trailing_dash() {
        let long = format!("{} end", "x".repeat(59));
        let slug = slugify(&long);
        assert!(slug.len() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn test_generate_code_is_six_digits() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_hash_token_is_stable_hex() {
        let a = hash_token("secret");
        assert_eq!(a, hash_token("secret"));
        assert_ne!(a, hash_token("Secret"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_random_suffix_lowercase() {
        let s = random_suffix(4);
        assert_eq!(s.len(), 4);
        assert!(s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }
}

//! Weapon-code normalization and class derivation (§4.E steps 5-6).

use crate::models::GameCatalogue;

/// Uppercases, splits on `/` or `,`, validates both tokens against the
/// game's catalogue, sorts the pair alphabetically and rejoins with `/`.
/// Invalid input or wrong cardinality yields `"NULL"` (§8 property 8: the
/// result is order-independent for any valid pair).
pub fn normalize_weapons(raw: &str, catalogue: &GameCatalogue) -> String {
    let upper = raw.to_uppercase();
    let tokens: Vec<&str> = upper
        .split(|c| c == '/' || c == ',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if tokens.len() != 2 {
        return "NULL".to_string();
    }
    if !catalogue.valid_weapons.contains(tokens[0]) || !catalogue.valid_weapons.contains(tokens[1]) {
        return "NULL".to_string();
    }
    let mut pair = [tokens[0], tokens[1]];
    pair.sort_unstable();
    format!("{}/{}", pair[0], pair[1])
}

/// Looks up the sorted pair in the game's combinations table; unknown
/// pairs (or a `"NULL"` normalized code) resolve to `"NULL"` (§4.E step 6).
pub fn derive_class(normalized_weapons: &str, catalogue: &GameCatalogue) -> String {
    let Some((w1, w2)) = normalized_weapons.split_once('/') else {
        return "NULL".to_string();
    };
    catalogue
        .class_for(w1, w2)
        .map(str::to_string)
        .unwrap_or_else(|| "NULL".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    fn catalogue() -> GameCatalogue {
        let mut valid_weapons = HashSet::new();
        valid_weapons.insert("SNS".to_string());
        valid_weapons.insert("GS".to_string());
        let mut combinations = HashMap::new();
        combinations.insert(("GS".to_string(), "SNS".to_string()), "Tank".to_string());
        GameCatalogue {
            valid_weapons,
            combinations,
        }
    }

    #[test]
    fn normalizes_regardless_of_input_order() {
        let cat = catalogue();
        assert_eq!(normalize_weapons("sns/gs", &cat), "GS/SNS");
        assert_eq!(normalize_weapons("GS/SNS", &cat), "GS/SNS");
        assert_eq!(normalize_weapons("gs,sns", &cat), "GS/SNS");
    }

    #[test]
    fn invalid_token_yields_null() {
        let cat = catalogue();
        assert_eq!(normalize_weapons("gs/bow", &cat), "NULL");
    }

    #[test]
    fn wrong_cardinality_yields_null() {
        let cat = catalogue();
        assert_eq!(normalize_weapons("gs", &cat), "NULL");
        assert_eq!(normalize_weapons("gs/sns/bow", &cat), "NULL");
    }

    #[test]
    fn derives_class_from_sorted_pair() {
        let cat = catalogue();
        let normalized = normalize_weapons("sns/gs", &cat);
        assert_eq!(derive_class(&normalized, &cat), "Tank");
    }

    #[test]
    fn unknown_combination_derives_null_class() {
        let cat = catalogue();
        assert_eq!(derive_class("NULL", &cat), "NULL");
    }
}

//! Suggested quick-prompts shown under the chat, keyed by condition.

const ECZEMA: &[&str] = &[
    "What are common Eczema triggers?",
    "Suggest daily routines for Eczema",
    "Are there OTC options for Eczema?",
    "When should I see a doctor for Eczema?",
];

const PSORIASIS: &[&str] = &[
    "What lifestyle changes help Psoriasis?",
    "Are there different types of Psoriasis?",
    "Suggest OTC options for Psoriasis",
    "When should I consult a dermatologist?",
];

const DEFAULT: &[&str] = &[
    "What are common skin rashes?",
    "How does sunscreen work?",
    "When should I see a dermatologist?",
];

const TABLE: &[(&str, &[&str])] = &[("eczema", ECZEMA), ("psoriasis", PSORIASIS)];

/// Prompts for `condition`, matched case-insensitively. Unknown or missing
/// conditions get the default set.
#[must_use]
pub fn suggestions_for(condition: Option<&str>) -> &'static [&'static str] {
    let Some(key) = condition.map(|c| c.trim().to_lowercase()) else {
        return DEFAULT;
    };
    TABLE
        .iter()
        .find(|(name, _)| *name == key)
        .map_or(DEFAULT, |(_, prompts)| prompts)
}

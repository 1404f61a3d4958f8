use std::{
    collections::HashMap,
    hash::Hash,
};

use serde::{
    Deserialize,
    Deserializer,
};

/// Kanji of `text` in the CJK unified ideographs block, by first appearance.
pub fn unique_kanjis(text: &str) -> Vec<char> {
    let mut kanjis = Vec::new();
    for c in text.chars() {
        if is_kanji(c) && !kanjis.contains(&c) {
            kanjis.push(c);
        }
    }
    kanjis
}

pub fn is_kanji(c: char) -> bool {
    ('\u{4E00}'..='\u{9FAF}').contains(&c)
}

/// Counts of each item, ordered by first appearance.
pub fn ordered_counts<T, I>(items: I) -> Vec<(T, usize)>
where
    T: Eq + Hash + Clone,
    I: IntoIterator<Item = T>,
{
    let mut order: Vec<T> = Vec::new();
    let mut counts: HashMap<T, usize> = HashMap::new();
    for item in items {
        let count = counts.entry(item.clone()).or_insert(0);
        if *count == 0 {
            order.push(item);
        }
        *count += 1;
    }
    order
        .into_iter()
        .map(|item| {
            let count = counts.get(&item).copied().unwrap_or(0);
            (item, count)
        })
        .collect()
}

pub fn is_ascii_alphanumeric_token(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_alphanumeric())
}

pub fn harmonic_frequency(frequencies: &[u32]) -> Option<u32> {
    let valid: Vec<f32> = frequencies.iter().filter(|&&f| f > 0).map(|&f| f as f32).collect();
    if valid.is_empty() {
        return None;
    }
    let denominator: f32 = valid.iter().map(|f| 1.0 / f).sum();
    Some((valid.len() as f32 / denominator).round() as u32)
}

// Yomitan exports store some numbers as strings
pub fn deserialize_number_or_numeric_string<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u32),
        Float(f64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Float(f) => Ok(f.max(0.0) as u32),
        NumberOrString::String(s) => s.trim().parse::<u32>().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_kanjis_keeps_order() {
        assert_eq!(unique_kanjis("食べる飲む食事"), vec!['食', '飲', '事']);
        assert!(unique_kanjis("たべる ABC").is_empty());
    }

    #[test]
    fn test_ordered_counts() {
        let counts = ordered_counts(vec!["b", "a", "b", "c", "b"]);
        assert_eq!(counts, vec![("b", 3), ("a", 1), ("c", 1)]);
    }

    #[test]
    fn test_ascii_alphanumeric() {
        assert!(is_ascii_alphanumeric_token("Slack2"));
        assert!(!is_ascii_alphanumeric_token("食べる"));
        assert!(!is_ascii_alphanumeric_token("e-mail"));
        assert!(!is_ascii_alphanumeric_token(""));
    }

    #[test]
    fn test_harmonic_frequency() {
        assert_eq!(harmonic_frequency(&[]), None);
        assert_eq!(harmonic_frequency(&[100]), Some(100));
        assert_eq!(harmonic_frequency(&[100, 300]), Some(150));
    }
}

pub mod cards;
pub mod core;
pub mod dictionary;
pub mod kb;
pub mod parser;
pub mod persistence;
pub mod scheduler;
pub mod segmentation;
pub mod settings;
pub mod slack;
pub mod tatoeba;
pub mod translate;

pub use core::BookToCardsError;

pub use dictionary::token_dictionary::DictType;
pub use kb::KnowledgeBase;
pub use scheduler::Scheduler;
pub use segmentation::{
    Lemmatizer,
    VibratoLemmatizer,
};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::{
        dictionary::{
            jmdict::Jmdict,
            TermBankV3,
        },
        segmentation::{
            token_models::Morpheme,
            Lemmatizer,
        },
    };

    // (surface, lemma, reading, pos)
    const LEXICON: &[(&str, &str, &str, &[&str])] = &[
        ("食べる", "食べる", "たべる", &["動詞", "一般"]),
        ("飲む", "飲む", "のむ", &["動詞", "一般"]),
        ("歌う", "歌う", "うたう", &["動詞", "一般"]),
        ("感じる", "感じる", "かんじる", &["動詞", "一般"]),
        ("笑う", "笑う", "わらう", &["動詞", "一般"]),
        ("寝る", "寝る", "ねる", &["動詞", "一般"]),
        ("眠る", "眠る", "ねむる", &["動詞", "一般"]),
        ("起きる", "起きる", "おきる", &["動詞", "一般"]),
        ("見る", "見る", "みる", &["動詞", "一般"]),
        ("走る", "走る", "はしる", &["動詞", "一般"]),
        ("日本語", "日本語", "にほんご", &["名詞", "普通名詞", "一般"]),
        ("今日", "今日", "きょう", &["名詞", "普通名詞", "副詞可能"]),
        ("明日", "明日", "あした", &["名詞", "普通名詞", "副詞可能"]),
        ("晴れ", "晴れ", "はれ", &["名詞", "普通名詞", "一般"]),
        ("雨", "雨", "あめ", &["名詞", "普通名詞", "一般"]),
        ("猫", "猫", "ねこ", &["名詞", "普通名詞", "一般"]),
        ("犬", "犬", "いぬ", &["名詞", "普通名詞", "一般"]),
        ("が", "が", "が", &["助詞", "格助詞"]),
        ("を", "を", "を", &["助詞", "格助詞"]),
        ("は", "は", "は", &["助詞", "係助詞"]),
    ];

    /// Longest match over a small lexicon. Unknown ASCII runs become nouns,
    /// punctuation becomes 補助記号 and any other character a one-char noun.
    pub struct FakeLemmatizer;

    impl FakeLemmatizer {
        pub fn new() -> Self {
            FakeLemmatizer
        }
    }

    impl Lemmatizer for FakeLemmatizer {
        fn lemmatize(&self, sentence: &str) -> Vec<Morpheme> {
            let mut morphemes = Vec::new();
            let mut rest = sentence;
            while let Some(c) = rest.chars().next() {
                if let Some((surface, lemma, reading, pos)) = LEXICON
                    .iter()
                    .filter(|(surface, ..)| rest.starts_with(surface))
                    .max_by_key(|(surface, ..)| surface.len())
                {
                    let mut morpheme = Morpheme::new(surface, lemma, pos);
                    morpheme.reading = reading.to_string();
                    morphemes.push(morpheme);
                    rest = &rest[surface.len()..];
                } else if c.is_ascii_alphanumeric() {
                    let end = rest.find(|ch: char| !ch.is_ascii_alphanumeric()).unwrap_or(rest.len());
                    morphemes.push(Morpheme::new(&rest[..end], &rest[..end], &["名詞", "普通名詞", "一般"]));
                    rest = &rest[end..];
                } else {
                    let surface = &rest[..c.len_utf8()];
                    let pos: &[&str] = if c.is_alphanumeric() {
                        &["名詞", "普通名詞", "一般"]
                    } else {
                        &["補助記号", "句点"]
                    };
                    if !c.is_whitespace() {
                        morphemes.push(Morpheme::new(surface, surface, pos));
                    }
                    rest = &rest[c.len_utf8()..];
                }
            }
            morphemes
        }
    }

    /// JMdict with the lexicon's verbs and nouns; 食べる and 猫 are frequent.
    pub fn test_jmdict() -> Jmdict {
        let rows: Vec<TermBankV3> = serde_json::from_str(
            r#"[
                ["食べる","たべる","v1","v1",10,["to eat","to live on"],1,"P"],
                ["飲む","のむ","v5","v5",5,["to drink"],2,"P"],
                ["歌う","うたう","v5","v5",0,["to sing"],3,""],
                ["感じる","かんじる","v1","v1",0,["to feel"],4,""],
                ["笑う","わらう","v5","v5",0,["to laugh"],5,""],
                ["寝る","ねる","v1","v1",0,["to sleep"],6,""],
                ["眠る","ねむる","v5","v5",0,["to sleep"],7,""],
                ["起きる","おきる","v1","v1",0,["to get up"],8,""],
                ["見る","みる","v1","v1",0,["to see"],9,""],
                ["猫","ねこ","n","",3,["cat"],10,"P"]
            ]"#,
        )
        .unwrap();
        Jmdict::from_term_bank("JMdict".to_string(), "test".to_string(), rows)
    }
}

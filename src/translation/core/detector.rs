//! 基于字符集与常见词的本地语言检测
//!
//! 不依赖外部模型，适合离线部署或远程模型服务不可用的场景。
//! 非拉丁文字按 Unicode 区段判断；拉丁文字按特有字母与高频虚词打分。

use std::collections::HashMap;

use super::engine::{Detection, InferenceError, LanguageDetector};

/// 拉丁文字语言的高频虚词
const STOPWORDS: &[(&str, &[&str])] = &[
    ("en", &["the", "and", "is", "are", "of", "to", "in", "it", "you", "this", "that", "with", "was", "for", "hello"]),
    ("fr", &["le", "la", "les", "et", "est", "je", "vous", "nous", "une", "des", "du", "pas", "bonjour", "avec", "sont"]),
    ("vi", &["tôi", "là", "và", "của", "có", "không", "được", "người", "những", "các", "một", "này", "cho", "với", "xin", "chào", "bạn"]),
    ("de", &["der", "die", "das", "und", "ist", "nicht", "ich", "sie", "mit", "ein", "eine", "auf"]),
    ("es", &["el", "los", "las", "y", "es", "una", "por", "con", "para", "hola", "está", "pero"]),
    ("it", &["il", "gli", "che", "è", "sono", "non", "per", "una", "ciao", "della", "questo"]),
    ("pt", &["os", "não", "uma", "com", "para", "você", "olá", "está", "isso", "obrigado"]),
    ("nl", &["de", "het", "een", "en", "is", "niet", "ik", "je", "van", "dat", "hallo"]),
    ("pl", &["nie", "jest", "się", "że", "na", "to", "dzień", "dobry", "jak", "czy"]),
    ("tr", &["bir", "ve", "bu", "için", "ne", "değil", "merhaba", "çok", "ben", "sen"]),
    ("sw", &["na", "ya", "wa", "kwa", "ni", "habari", "jambo", "sana", "asante", "hii"]),
];

/// 只出现在特定语言中的字母
const DISTINCTIVE_LETTERS: &[(&str, &str)] = &[
    ("vi", "ăđơư"),
    ("fr", "çèêëîïœù"),
    ("de", "äöüß"),
    ("es", "ñ¡¿"),
    ("pt", "ãõ"),
    ("pl", "łąęśżźń"),
    ("tr", "ğışİ"),
];

const STOPWORD_WEIGHT: f32 = 3.0;
const LETTER_WEIGHT: f32 = 1.0;
const VIETNAMESE_TONE_WEIGHT: f32 = 3.0;

/// 字符集检测器
#[derive(Debug, Clone, Default)]
pub struct ScriptDetector;

impl ScriptDetector {
    pub fn new() -> Self {
        Self
    }

    /// 为文本中的每个候选语言打分
    fn score(&self, text: &str) -> HashMap<&'static str, f32> {
        let mut scores: HashMap<&'static str, f32> = HashMap::new();
        let has_kana = text.chars().any(is_kana);
        let mut latin_letters = 0usize;

        for c in text.chars() {
            match c {
                c if is_kana(c) => bump(&mut scores, "ja", 1.0),
                '\u{4e00}'..='\u{9fff}' => bump(&mut scores, if has_kana { "ja" } else { "zh" }, 1.0),
                '\u{ac00}'..='\u{d7af}' | '\u{1100}'..='\u{11ff}' => bump(&mut scores, "ko", 1.0),
                '\u{0400}'..='\u{04ff}' => bump(&mut scores, if c == 'ъ' || c == 'Ъ' { "bg" } else { "ru" }, 1.0),
                '\u{0370}'..='\u{03ff}' => bump(&mut scores, "el", 1.0),
                '\u{0e00}'..='\u{0e7f}' => bump(&mut scores, "th", 1.0),
                '\u{0900}'..='\u{097f}' => bump(&mut scores, "hi", 1.0),
                'ے' | 'ں' | 'ٹ' | 'ڈ' | 'ڑ' => bump(&mut scores, "ur", 3.0),
                '\u{0600}'..='\u{06ff}' => bump(&mut scores, "ar", 1.0),
                // 越南语声调字母（带下点、钩等组合符号的预组字符）
                '\u{1ea0}'..='\u{1ef9}' => bump(&mut scores, "vi", VIETNAMESE_TONE_WEIGHT),
                c if c.is_alphabetic() && is_latin(c) => {
                    latin_letters += 1;
                    let lower = c.to_lowercase().next().unwrap_or(c);
                    for &(lang, letters) in DISTINCTIVE_LETTERS {
                        if letters.contains(lower) {
                            bump(&mut scores, lang, LETTER_WEIGHT);
                        }
                    }
                }
                _ => {}
            }
        }

        if latin_letters > 0 {
            for word in text
                .split(|c: char| !c.is_alphabetic())
                .filter(|w| !w.is_empty())
                .map(str::to_lowercase)
            {
                for &(lang, words) in STOPWORDS {
                    if words.contains(&word.as_str()) {
                        bump(&mut scores, lang, STOPWORD_WEIGHT);
                    }
                }
            }

            // 没有任何特征的拉丁文字按英语处理
            if !STOPWORDS.iter().any(|(lang, _)| scores.contains_key(lang)) {
                bump(&mut scores, "en", 1.0);
            }
        }

        scores
    }
}

fn bump(scores: &mut HashMap<&'static str, f32>, lang: &'static str, weight: f32) {
    *scores.entry(lang).or_insert(0.0) += weight;
}

fn is_kana(c: char) -> bool {
    ('\u{3040}'..='\u{309f}').contains(&c) || ('\u{30a0}'..='\u{30ff}').contains(&c)
}

fn is_latin(c: char) -> bool {
    c.is_ascii_alphabetic() || ('\u{00c0}'..='\u{024f}').contains(&c)
}

impl LanguageDetector for ScriptDetector {
    fn detect(&self, texts: &[String], top_k: usize) -> Result<Vec<Detection>, InferenceError> {
        let merged = texts.join(" ");
        let scores = self.score(&merged);
        let total: f32 = scores.values().sum();

        if total <= 0.0 {
            return Err(InferenceError::Unrecognizable(
                "文本中没有可识别的文字".to_string(),
            ));
        }

        let mut detections: Vec<Detection> = scores
            .into_iter()
            .map(|(language, score)| Detection {
                language: language.to_string(),
                confidence: score / total,
            })
            .collect();
        detections.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.language.cmp(&b.language))
        });
        detections.truncate(top_k.max(1));
        Ok(detections)
    }

    fn device(&self) -> String {
        "cpu".to_string()
    }
}

//! 语言目录
//!
//! 维护受支持的翻译方向、语言显示名称以及每个语言对使用的模型描述。

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::translation::error::{TranslationError, TranslationResult};

/// 检测模型支持的语言（ISO 639-1 代码, 显示名称）
pub const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("ar", "Arabic"),
    ("bg", "Bulgarian"),
    ("de", "German"),
    ("el", "Greek"),
    ("en", "English"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("hi", "Hindi"),
    ("it", "Italian"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("nl", "Dutch"),
    ("pl", "Polish"),
    ("pt", "Portuguese"),
    ("ru", "Russian"),
    ("sw", "Swahili"),
    ("th", "Thai"),
    ("tr", "Turkish"),
    ("ur", "Urdu"),
    ("vi", "Vietnamese"),
    ("zh", "Chinese"),
];

/// 有序语言对
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
}

impl LanguagePair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// 缓存命名空间及注册表键，例如 `en2vi`
    pub fn key(&self) -> String {
        format!("{}2{}", self.source, self.target)
    }
}

impl fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}2{}", self.source, self.target)
    }
}

/// 引擎注册表的能力键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CapabilityKey {
    Translation(LanguagePair),
    Detection(String),
}

impl CapabilityKey {
    pub fn translation(source: &str, target: &str) -> Self {
        CapabilityKey::Translation(LanguagePair::new(source, target))
    }

    pub fn detection(model: &str) -> Self {
        CapabilityKey::Detection(model.to_string())
    }

    /// 对应的缓存命名空间
    pub fn namespace(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityKey::Translation(pair) => write!(f, "{}", pair),
            CapabilityKey::Detection(model) => write!(f, "detect:{}", model),
        }
    }
}

/// 单个翻译方向使用的模型描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairModel {
    pub source: String,
    pub target: String,
    pub model: String,
    /// 送入模型前为每条文本添加的前缀
    #[serde(default)]
    pub input_prefix: String,
    /// 从模型输出中移除的前缀
    #[serde(default)]
    pub output_prefix: String,
}

impl PairModel {
    pub fn new(source: &str, target: &str, model: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            model: model.to_string(),
            input_prefix: String::new(),
            output_prefix: String::new(),
        }
    }

    pub fn with_prefixes(mut self, input: &str, output: &str) -> Self {
        self.input_prefix = input.to_string();
        self.output_prefix = output.to_string();
        self
    }

    pub fn pair(&self) -> LanguagePair {
        LanguagePair::new(&self.source, &self.target)
    }
}

/// 默认的翻译方向及模型
pub fn default_pair_models() -> Vec<PairModel> {
    vec![
        PairModel::new("vi", "en", "VietAI/envit5-translation").with_prefixes("vi: ", "en: "),
        PairModel::new("vi", "fr", "Helsinki-NLP/opus-mt-vi-fr"),
        PairModel::new("en", "vi", "VietAI/envit5-translation").with_prefixes("en: ", "vi: "),
        PairModel::new("en", "fr", "Helsinki-NLP/opus-mt-en-fr"),
        PairModel::new("fr", "en", "Helsinki-NLP/opus-mt-fr-en"),
        PairModel::new("fr", "vi", "Helsinki-NLP/opus-mt-fr-vi"),
    ]
}

/// 语言目录
#[derive(Debug, Clone)]
pub struct LanguageCatalog {
    names: HashMap<String, String>,
    pairs: BTreeMap<LanguagePair, PairModel>,
}

impl LanguageCatalog {
    /// 由模型列表构建目录，重复的语言对以最后一个为准
    pub fn new(models: Vec<PairModel>) -> Self {
        let names = LANGUAGE_NAMES
            .iter()
            .map(|(code, name)| (code.to_string(), name.to_string()))
            .collect();
        let pairs = models.into_iter().map(|m| (m.pair(), m)).collect();

        Self { names, pairs }
    }

    /// 语言显示名称，未知代码返回代码本身
    pub fn display_name<'a>(&'a self, code: &'a str) -> &'a str {
        self.names.get(code).map(String::as_str).unwrap_or(code)
    }

    pub fn supports(&self, source: &str, target: &str) -> bool {
        self.pairs.contains_key(&LanguagePair::new(source, target))
    }

    /// 校验翻译方向，不支持时返回同时包含两种语言的错误
    pub fn validate(&self, source: &str, target: &str) -> TranslationResult<LanguagePair> {
        let pair = LanguagePair::new(source, target);
        if self.pairs.contains_key(&pair) {
            return Ok(pair);
        }

        Err(TranslationError::UnsupportedCapability(format!(
            "不支持从 {} ({}) 翻译到 {} ({})",
            self.display_name(source),
            source,
            self.display_name(target),
            target
        )))
    }

    pub fn model_for(&self, pair: &LanguagePair) -> Option<&PairModel> {
        self.pairs.get(pair)
    }

    pub fn models(&self) -> impl Iterator<Item = &PairModel> {
        self.pairs.values()
    }

    /// 源语言 → 可用目标语言列表
    pub fn supported_languages(&self) -> BTreeMap<String, Vec<String>> {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for pair in self.pairs.keys() {
            map.entry(pair.source.clone())
                .or_default()
                .push(pair.target.clone());
        }
        map
    }
}

impl Default for LanguageCatalog {
    fn default() -> Self {
        Self::new(default_pair_models())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pairs() {
        let catalog = LanguageCatalog::default();
        assert!(catalog.supports("en", "vi"));
        assert!(catalog.supports("fr", "vi"));
        assert!(!catalog.supports("en", "de"));
        assert!(!catalog.supports("vi", "vi"));

        let languages = catalog.supported_languages();
        assert_eq!(languages["vi"], vec!["en", "fr"]);
        assert_eq!(languages["en"], vec!["fr", "vi"]);
    }

    #[test]
    fn test_validate_names_both_languages() {
        let catalog = LanguageCatalog::default();
        let err = catalog.validate("en", "de").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("English (en)"));
        assert!(message.contains("German (de)"));
        assert!(matches!(err, TranslationError::UnsupportedCapability(_)));
    }

    #[test]
    fn test_unknown_code_falls_back_to_code() {
        let catalog = LanguageCatalog::default();
        assert_eq!(catalog.display_name("xx"), "xx");
        assert_eq!(catalog.display_name("vi"), "Vietnamese");
    }

    #[test]
    fn test_capability_namespace() {
        assert_eq!(CapabilityKey::translation("en", "vi").namespace(), "en2vi");
        assert_eq!(CapabilityKey::detection("script").namespace(), "detect:script");
    }

    #[test]
    fn test_envit5_prefixes() {
        let catalog = LanguageCatalog::default();
        let model = catalog.model_for(&LanguagePair::new("en", "vi")).unwrap();
        assert_eq!(model.input_prefix, "en: ");
        assert_eq!(model.output_prefix, "vi: ");
    }
}

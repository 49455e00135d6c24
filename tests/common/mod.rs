// 集成测试公共模块
//
// 提供可计数的假引擎、故障缓存后端和服务上下文构建器

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use translator_service::translation::config::ServiceConfig;
use translator_service::translation::core::{
    Detection, EngineRegistry, InferenceError, LanguageDetector, ServiceContext, Translator,
};
use translator_service::translation::languages::CapabilityKey;
use translator_service::translation::storage::backend::{BackendError, CacheBackend, MemoryBackend};
use translator_service::translation::storage::records::{MemoryRecordStore, RecordStore};

// ============================================================================
// 假引擎
// ============================================================================

/// 把每条文本翻译成 `[tag] 原文`
pub struct FakeTranslator {
    tag: String,
    calls: Arc<AtomicUsize>,
    texts: Arc<AtomicUsize>,
    delay: Duration,
}

impl Translator for FakeTranslator {
    fn translate(&self, texts: &[String]) -> Result<Vec<String>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(texts
            .iter()
            .map(|text| format!("[{}] {}", self.tag, text))
            .collect())
    }

    fn device(&self) -> String {
        "fake-cpu".to_string()
    }
}

/// 总是返回固定语言
pub struct FakeDetector {
    language: String,
    calls: Arc<AtomicUsize>,
}

impl LanguageDetector for FakeDetector {
    fn detect(&self, _texts: &[String], top_k: usize) -> Result<Vec<Detection>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut detected = vec![
            Detection {
                language: self.language.clone(),
                confidence: 0.9,
            },
            Detection {
                language: "fr".to_string(),
                confidence: 0.1,
            },
        ];
        detected.truncate(top_k.max(1));
        Ok(detected)
    }

    fn device(&self) -> String {
        "fake-cpu".to_string()
    }
}

// ============================================================================
// 故障缓存后端
// ============================================================================

/// 所有操作都返回连接错误
#[derive(Debug, Default)]
pub struct FailingBackend {
    pub gets: AtomicUsize,
    pub sets: AtomicUsize,
}

impl FailingBackend {
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheBackend for FailingBackend {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Err(BackendError::Connection("connection refused".to_string()))
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl: Option<Duration>) -> Result<(), BackendError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        Err(BackendError::Connection("connection refused".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<bool, BackendError> {
        Err(BackendError::Connection("connection refused".to_string()))
    }

    fn describe(&self) -> String {
        "failing://test".to_string()
    }
}

// ============================================================================
// 上下文构建
// ============================================================================

/// 测试使用的默认配置：内存缓存、快速重试、惰性加载引擎、关闭限流
pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.cache.backend = "memory".to_string();
    config.cache.retry.max_attempts = 2;
    config.cache.retry.base_delay_ms = 1;
    config.cache.retry.max_delay_ms = 2;
    config.cache.breaker.persist = false;
    config.engines.eager = false;
    config.rate_limit.enabled = false;
    config.admission.translation_timeout_ms = 200;
    config.admission.detection_timeout_ms = 200;
    config
}

/// 构建好的测试上下文及引擎调用计数
pub struct TestHarness {
    pub context: Arc<ServiceContext>,
    pub translate_calls: Arc<AtomicUsize>,
    pub translated_texts: Arc<AtomicUsize>,
    pub detect_calls: Arc<AtomicUsize>,
    pub constructions: Arc<AtomicUsize>,
}

impl TestHarness {
    pub fn translate_calls(&self) -> usize {
        self.translate_calls.load(Ordering::SeqCst)
    }

    pub fn translated_texts(&self) -> usize {
        self.translated_texts.load(Ordering::SeqCst)
    }

    pub fn detect_calls(&self) -> usize {
        self.detect_calls.load(Ordering::SeqCst)
    }

    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }
}

pub struct HarnessBuilder {
    config: ServiceConfig,
    backend: Arc<dyn CacheBackend>,
    delay: Duration,
    detected_language: String,
    records: bool,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            config: test_config(),
            backend: Arc::new(MemoryBackend::new()),
            delay: Duration::ZERO,
            detected_language: "en".to_string(),
            records: false,
        }
    }

    pub fn config(mut self, update: impl FnOnce(&mut ServiceConfig)) -> Self {
        update(&mut self.config);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// 每次翻译调用阻塞的时长
    pub fn translation_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn detected_language(mut self, language: &str) -> Self {
        self.detected_language = language.to_string();
        self
    }

    pub fn with_records(mut self) -> Self {
        self.records = true;
        self
    }

    pub async fn build(self) -> TestHarness {
        let translate_calls = Arc::new(AtomicUsize::new(0));
        let translated_texts = Arc::new(AtomicUsize::new(0));
        let detect_calls = Arc::new(AtomicUsize::new(0));
        let constructions = Arc::new(AtomicUsize::new(0));

        let translators = self.config.engines.pairs.iter().fold(
            EngineRegistry::<dyn Translator>::new("翻译"),
            |registry, spec| {
                let tag = spec.target.clone();
                let calls = translate_calls.clone();
                let texts = translated_texts.clone();
                let constructions = constructions.clone();
                let delay = self.delay;
                registry.register(CapabilityKey::Translation(spec.pair()), move || {
                    constructions.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(FakeTranslator {
                        tag: tag.clone(),
                        calls: calls.clone(),
                        texts: texts.clone(),
                        delay,
                    }) as Arc<dyn Translator>)
                })
            },
        );

        let language = self.detected_language.clone();
        let calls = detect_calls.clone();
        let detectors = EngineRegistry::<dyn LanguageDetector>::new("检测").register(
            CapabilityKey::detection(&self.config.engines.detector_model),
            move || {
                Ok(Arc::new(FakeDetector {
                    language: language.clone(),
                    calls: calls.clone(),
                }) as Arc<dyn LanguageDetector>)
            },
        );

        let records: Option<Arc<dyn RecordStore>> = if self.records {
            Some(Arc::new(MemoryRecordStore::new()))
        } else {
            None
        };

        let context = ServiceContext::assemble(self.config, translators, detectors, self.backend, records)
            .await
            .expect("测试上下文构建失败");

        TestHarness {
            context: Arc::new(context),
            translate_calls,
            translated_texts,
            detect_calls,
            constructions,
        }
    }
}

pub fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

/// 等待后台缓存写入完成
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
}

//! 翻译与语言检测编排
//!
//! 一次批量请求的处理流程：
//!
//! 1. 未指定源语言时调用语言检测，取置信度最高的结果
//! 2. 校验语言对是否受支持
//! 3. 按 `语言对:内容哈希` 逐条查询缓存，区分命中与未命中
//! 4. 申请推理槽位，解析引擎，在阻塞线程池中一次性翻译所有未命中文本
//! 5. 后台写回缓存，写入失败不影响请求
//! 6. 按输入顺序重组结果并逐条做后处理
//!
//! 全部命中时不申请推理槽位，也不解析引擎。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use super::admission::AdmissionController;
use super::engine::{Detection, LanguageDetector, Translator};
use super::normalizer::normalize;
use super::registry::EngineRegistry;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::languages::{CapabilityKey, LanguageCatalog};
use crate::translation::storage::cache::{CacheAccessor, CacheKey, CacheLookup};

/// 一次翻译请求的结果
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationOutcome {
    pub results: Vec<String>,
    pub src_lang: String,
    pub tgt_lang: String,
    /// 命中缓存的条数
    pub cache_hits: usize,
    /// 实际执行推理的设备，全部命中缓存时为 `None`
    pub device: Option<String>,
    pub elapsed: Duration,
}

impl TranslationOutcome {
    fn empty(src_lang: &str, tgt_lang: &str, started: Instant) -> Self {
        Self {
            results: Vec::new(),
            src_lang: src_lang.to_string(),
            tgt_lang: tgt_lang.to_string(),
            cache_hits: 0,
            device: None,
            elapsed: started.elapsed(),
        }
    }
}

/// 一次语言检测的结果
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionOutcome {
    /// 按置信度降序排列
    pub detected: Vec<Detection>,
    /// 置信度最高的语言
    pub language: String,
    pub cached: bool,
    pub elapsed: Duration,
}

// ============================================================================
// 统计
// ============================================================================

/// 编排器运行统计
#[derive(Debug, Default)]
pub struct ServiceStats {
    pub requests: AtomicUsize,
    pub texts: AtomicUsize,
    pub cache_hits: AtomicUsize,
    pub cache_misses: AtomicUsize,
    pub engine_calls: AtomicUsize,
    pub errors: AtomicUsize,
    /// 微秒
    pub processing_time: AtomicU64,
}

/// 统计快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceStatsSnapshot {
    pub requests: usize,
    pub texts: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub engine_calls: usize,
    pub errors: usize,
    pub processing_time_ms: u64,
}

impl ServiceStats {
    fn record_request(&self, texts: usize, elapsed: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.texts.fetch_add(texts, Ordering::Relaxed);
        self.processing_time
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    fn record_error(&self, error: &TranslationError) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("translator_request_errors_total", "category" => format!("{:?}", error.category()))
            .increment(1);
    }

    pub fn snapshot(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            texts: self.texts.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            engine_calls: self.engine_calls.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            processing_time_ms: self.processing_time.load(Ordering::Relaxed) / 1_000,
        }
    }
}

// ============================================================================
// 语言检测
// ============================================================================

/// 语言检测编排器
pub struct DetectionOrchestrator {
    model: String,
    top_k: usize,
    engines: Arc<EngineRegistry<dyn LanguageDetector>>,
    cache: Arc<CacheAccessor>,
    admission: AdmissionController,
    stats: ServiceStats,
}

impl DetectionOrchestrator {
    pub fn new(
        model: impl Into<String>,
        engines: Arc<EngineRegistry<dyn LanguageDetector>>,
        cache: Arc<CacheAccessor>,
        admission: AdmissionController,
    ) -> Self {
        Self {
            model: model.into(),
            top_k: 3,
            engines,
            cache,
            admission,
            stats: ServiceStats::default(),
        }
    }

    /// 返回的候选语言数量
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn stats(&self) -> ServiceStatsSnapshot {
        self.stats.snapshot()
    }

    /// 检测一批文本的语言，所有文本合并后作为一个整体检测
    pub async fn detect(&self, texts: &[String]) -> TranslationResult<DetectionOutcome> {
        let started = Instant::now();
        let result = self.run(texts, started).await;
        self.stats.record_request(texts.len(), started.elapsed());
        if let Err(e) = &result {
            self.stats.record_error(e);
        }
        result
    }

    async fn run(&self, texts: &[String], started: Instant) -> TranslationResult<DetectionOutcome> {
        let merged = texts.join(" ");
        if merged.trim().is_empty() {
            return Err(TranslationError::InvalidInput("待检测文本为空".to_string()));
        }

        let capability = CapabilityKey::detection(&self.model);
        let key = CacheKey::new(&capability.namespace(), &merged);

        if let CacheLookup::Hit(detected) = self.cache.get_json::<Vec<Detection>>(key.as_str()).await {
            if let Some(language) = detected.first().map(|d| d.language.clone()) {
                self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
                return Ok(DetectionOutcome {
                    detected,
                    language,
                    cached: true,
                    elapsed: started.elapsed(),
                });
            }
        }
        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);

        let ticket = self.admission.acquire().await?;
        let engine = self.engines.resolve(&capability).await?;
        let batch = texts.to_vec();
        let top_k = self.top_k;
        self.stats.engine_calls.fetch_add(1, Ordering::Relaxed);
        let detected = tokio::task::spawn_blocking(move || engine.detect(&batch, top_k)).await??;
        self.admission.release(ticket);

        let language = detected
            .first()
            .map(|d| d.language.clone())
            .ok_or_else(|| TranslationError::InferenceError("检测结果为空".to_string()))?;

        let cache = self.cache.clone();
        let cached = detected.clone();
        tokio::spawn(async move {
            cache.set_json(key.as_str(), &cached, None).await;
        });

        debug!("语言检测完成: {} ({:?})", language, started.elapsed());
        Ok(DetectionOutcome {
            detected,
            language,
            cached: false,
            elapsed: started.elapsed(),
        })
    }
}

// ============================================================================
// 翻译
// ============================================================================

/// 翻译编排器
pub struct TranslationOrchestrator {
    catalog: Arc<LanguageCatalog>,
    engines: Arc<EngineRegistry<dyn Translator>>,
    cache: Arc<CacheAccessor>,
    admission: AdmissionController,
    detection: Option<Arc<DetectionOrchestrator>>,
    stats: ServiceStats,
}

impl TranslationOrchestrator {
    pub fn new(
        catalog: Arc<LanguageCatalog>,
        engines: Arc<EngineRegistry<dyn Translator>>,
        cache: Arc<CacheAccessor>,
        admission: AdmissionController,
    ) -> Self {
        Self {
            catalog,
            engines,
            cache,
            admission,
            detection: None,
            stats: ServiceStats::default(),
        }
    }

    /// 启用源语言自动检测
    pub fn with_detection(mut self, detection: Arc<DetectionOrchestrator>) -> Self {
        self.detection = Some(detection);
        self
    }

    pub fn catalog(&self) -> &LanguageCatalog {
        &self.catalog
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    pub fn stats(&self) -> ServiceStatsSnapshot {
        self.stats.snapshot()
    }

    /// 翻译一批文本，结果与输入顺序一致
    ///
    /// `src_lang` 为 `None` 时先检测源语言。空输入直接返回空结果，
    /// 不访问缓存也不调用引擎。
    pub async fn translate(
        &self,
        texts: &[String],
        src_lang: Option<&str>,
        tgt_lang: &str,
    ) -> TranslationResult<TranslationOutcome> {
        let started = Instant::now();
        let result = self.run(texts, src_lang, tgt_lang, started).await;
        self.stats.record_request(texts.len(), started.elapsed());
        if let Err(e) = &result {
            self.stats.record_error(e);
        }
        result
    }

    async fn run(
        &self,
        texts: &[String],
        src_lang: Option<&str>,
        tgt_lang: &str,
        started: Instant,
    ) -> TranslationResult<TranslationOutcome> {
        if texts.is_empty() {
            return Ok(TranslationOutcome::empty(src_lang.unwrap_or_default(), tgt_lang, started));
        }

        let src_lang = match src_lang.map(str::trim).filter(|lang| !lang.is_empty()) {
            Some(lang) => lang.to_string(),
            None => self.detect_source(texts).await?,
        };
        let pair = self.catalog.validate(&src_lang, tgt_lang)?;
        let capability = CapabilityKey::Translation(pair);
        let namespace = capability.namespace();

        let keys: Vec<CacheKey> = texts.iter().map(|text| CacheKey::new(&namespace, text)).collect();
        // 空白文本不查缓存也不送入引擎
        let lookups = futures::future::join_all(texts.iter().zip(&keys).map(|(text, key)| async move {
            if text.trim().is_empty() {
                None
            } else {
                Some(self.cache.get_text(key.as_str()).await)
            }
        }))
        .await;

        let mut raw: Vec<Option<String>> = Vec::with_capacity(texts.len());
        // 未命中的不同文本，按首次出现顺序
        let mut pending: Vec<usize> = Vec::new();
        let mut pending_index: HashMap<&str, usize> = HashMap::new();
        let mut slots: Vec<Option<usize>> = Vec::with_capacity(texts.len());

        let mut cache_hits = 0;

        for (i, lookup) in lookups.into_iter().enumerate() {
            match lookup {
                None => {
                    raw.push(Some(String::new()));
                    slots.push(None);
                }
                Some(CacheLookup::Hit(cached)) => {
                    cache_hits += 1;
                    raw.push(Some(cached));
                    slots.push(None);
                }
                Some(CacheLookup::Miss | CacheLookup::Unavailable) => {
                    raw.push(None);
                    let key = keys[i].as_str();
                    let slot = *pending_index.entry(key).or_insert_with(|| {
                        pending.push(i);
                        pending.len() - 1
                    });
                    slots.push(Some(slot));
                }
            }
        }

        self.stats.cache_hits.fetch_add(cache_hits, Ordering::Relaxed);
        self.stats.cache_misses.fetch_add(pending.len(), Ordering::Relaxed);

        let mut device = None;
        if !pending.is_empty() {
            let batch: Vec<String> = pending.iter().map(|&i| texts[i].trim().to_string()).collect();
            let (translations, engine_device) = self.infer(&capability, batch).await?;
            device = Some(engine_device);

            for (&i, translation) in pending.iter().zip(&translations) {
                let cache = self.cache.clone();
                let key = keys[i].clone();
                let value = translation.clone();
                tokio::spawn(async move {
                    cache.set(key.as_str(), value, None).await;
                });
            }

            for (entry, slot) in raw.iter_mut().zip(&slots) {
                if let Some(slot) = slot {
                    *entry = translations.get(*slot).cloned();
                }
            }
        }

        let results = texts
            .iter()
            .zip(raw)
            .map(|(text, translated)| normalize(text, translated.as_deref().unwrap_or_default()))
            .collect();

        info!(
            "翻译完成 {}→{}: {} 条, 缓存命中 {}, 耗时 {:?}",
            src_lang,
            tgt_lang,
            texts.len(),
            cache_hits,
            started.elapsed()
        );

        Ok(TranslationOutcome {
            results,
            src_lang,
            tgt_lang: tgt_lang.to_string(),
            cache_hits,
            device,
            elapsed: started.elapsed(),
        })
    }

    /// 在推理槽位内完成引擎解析与批量翻译
    async fn infer(
        &self,
        capability: &CapabilityKey,
        batch: Vec<String>,
    ) -> TranslationResult<(Vec<String>, String)> {
        let ticket = self.admission.acquire().await?;
        let engine = self.engines.resolve(capability).await?;
        let expected = batch.len();

        self.stats.engine_calls.fetch_add(1, Ordering::Relaxed);
        let translations =
            tokio::task::spawn_blocking(move || -> Result<_, super::engine::InferenceError> {
                let translations = engine.translate(&batch)?;
                Ok((translations, engine.device()))
            })
            .await??;
        self.admission.release(ticket);

        if translations.0.len() != expected {
            return Err(TranslationError::InferenceError(format!(
                "引擎返回 {} 条结果，期望 {} 条",
                translations.0.len(),
                expected
            )));
        }
        Ok(translations)
    }

    async fn detect_source(&self, texts: &[String]) -> TranslationResult<String> {
        let detection = self.detection.as_ref().ok_or_else(|| {
            TranslationError::InvalidInput("未指定源语言，且未启用语言检测".to_string())
        })?;
        let outcome = detection.detect(texts).await?;
        debug!("自动检测源语言: {}", outcome.language);
        Ok(outcome.language)
    }
}

impl std::fmt::Debug for TranslationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationOrchestrator")
            .field("engines", &self.engines)
            .field("admission", &self.admission)
            .field("detection", &self.detection.is_some())
            .finish()
    }
}

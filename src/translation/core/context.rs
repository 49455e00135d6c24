//! 服务上下文
//!
//! 根据配置组装缓存、熔断器、引擎注册表和编排器，供 HTTP 层共享。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::admission::AdmissionController;
use super::detector::ScriptDetector;
use super::engine::{LanguageDetector, RemoteDetector, RemoteTranslator, Translator};
use super::registry::EngineRegistry;
use super::service::{DetectionOrchestrator, TranslationOrchestrator, TranslationOutcome};
use crate::translation::config::{DetectorKind, RecordBackendKind, ServiceConfig};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::languages::{CapabilityKey, LanguageCatalog};
use crate::translation::resilience::{BackendBreakerStorage, CircuitBreaker, RetryPolicy};
use crate::translation::storage::backend::{CacheBackend, MemoryBackend, RedisBackend};
use crate::translation::storage::cache::CacheAccessor;
use crate::translation::storage::records::{MemoryRecordStore, RecordStore, TranslationRecord};

/// 运行期共享的服务组件
pub struct ServiceContext {
    config: ServiceConfig,
    catalog: Arc<LanguageCatalog>,
    cache: Arc<CacheAccessor>,
    translators: Arc<EngineRegistry<dyn Translator>>,
    detectors: Arc<EngineRegistry<dyn LanguageDetector>>,
    translation: Arc<TranslationOrchestrator>,
    detection: Arc<DetectionOrchestrator>,
    records: Option<Arc<dyn RecordStore>>,
    started_at: Instant,
}

impl ServiceContext {
    /// 按配置创建全部组件
    ///
    /// 启用 `engines.eager` 时会构建所有引擎，任何一个失败都会使启动失败。
    pub async fn build(config: ServiceConfig) -> TranslationResult<Self> {
        let backend = Self::cache_backend(&config)?;
        let translators = Self::translator_registry(&config);
        let detectors = Self::detector_registry(&config);
        let records = Self::record_store(&config).await?;

        Self::assemble(config, translators, detectors, backend, records).await
    }

    /// 使用给定的引擎、缓存后端和记录存储组装上下文
    pub async fn assemble(
        config: ServiceConfig,
        translators: EngineRegistry<dyn Translator>,
        detectors: EngineRegistry<dyn LanguageDetector>,
        backend: Arc<dyn CacheBackend>,
        records: Option<Arc<dyn RecordStore>>,
    ) -> TranslationResult<Self> {
        let breaker = if config.cache.breaker.persist {
            let storage = Arc::new(BackendBreakerStorage::new(backend.clone()));
            CircuitBreaker::restore("cache", config.cache.breaker.clone(), storage).await
        } else {
            CircuitBreaker::new("cache", config.cache.breaker.clone())
        };
        let retry = RetryPolicy::new("cache", config.cache.retry.clone());
        let cache = Arc::new(CacheAccessor::new(
            backend,
            Arc::new(breaker),
            retry,
            config.cache.default_ttl(),
        ));

        let catalog = Arc::new(LanguageCatalog::new(config.engines.pairs.clone()));
        let translators = Arc::new(translators);
        let detectors = Arc::new(detectors);

        let detection = Arc::new(
            DetectionOrchestrator::new(
                config.engines.detector_model.clone(),
                detectors.clone(),
                cache.clone(),
                AdmissionController::new(
                    "detection",
                    config.admission.detection_capacity,
                    config.admission.detection_timeout(),
                ),
            )
            .with_top_k(config.engines.detection_top_k),
        );

        let translation = Arc::new(
            TranslationOrchestrator::new(
                catalog.clone(),
                translators.clone(),
                cache.clone(),
                AdmissionController::new(
                    "translation",
                    config.admission.translation_capacity,
                    config.admission.translation_timeout(),
                ),
            )
            .with_detection(detection.clone()),
        );

        if config.engines.eager {
            let started = Instant::now();
            let (translation_engines, detection_engines) =
                futures::future::try_join(translators.warm_up(), detectors.warm_up())
                    .await
                    .map_err(|e| e.with_context("启动预热"))?;
            info!(
                "引擎预热完成: 翻译 {} 个, 检测 {} 个, 耗时 {:?}",
                translation_engines,
                detection_engines,
                started.elapsed()
            );
        }

        info!(
            "服务组件就绪: 缓存后端 {}, 翻译方向 {} 个",
            cache.backend_name(),
            catalog.models().count()
        );

        Ok(Self {
            config,
            catalog,
            cache,
            translators,
            detectors,
            translation,
            detection,
            records,
            started_at: Instant::now(),
        })
    }

    fn cache_backend(config: &ServiceConfig) -> TranslationResult<Arc<dyn CacheBackend>> {
        match config.cache.backend.as_str() {
            "memory" => Ok(Arc::new(MemoryBackend::new())),
            _ => {
                let backend = RedisBackend::new(&config.cache.redis).map_err(|e| {
                    TranslationError::ConfigError(format!("Redis 配置无效: {}", e))
                })?;
                Ok(Arc::new(backend))
            }
        }
    }

    fn translator_registry(config: &ServiceConfig) -> EngineRegistry<dyn Translator> {
        let remote = config.engines.remote();
        config
            .engines
            .pairs
            .iter()
            .fold(EngineRegistry::new("翻译"), |registry, spec| {
                let remote = remote.clone();
                let spec = spec.clone();
                registry.register(CapabilityKey::Translation(spec.pair()), move || {
                    let engine = RemoteTranslator::load(&remote, spec.clone())?;
                    Ok(Arc::new(engine) as Arc<dyn Translator>)
                })
            })
    }

    fn detector_registry(config: &ServiceConfig) -> EngineRegistry<dyn LanguageDetector> {
        let key = CapabilityKey::detection(&config.engines.detector_model);
        let registry = EngineRegistry::new("检测");

        match config.engines.detector {
            DetectorKind::Script => registry.register(key, || {
                Ok(Arc::new(ScriptDetector::new()) as Arc<dyn LanguageDetector>)
            }),
            DetectorKind::Remote => {
                let remote = config.engines.remote();
                let model = config.engines.detector_model.clone();
                registry.register(key, move || {
                    let engine = RemoteDetector::load(&remote, &model)?;
                    Ok(Arc::new(engine) as Arc<dyn LanguageDetector>)
                })
            }
        }
    }

    async fn record_store(config: &ServiceConfig) -> TranslationResult<Option<Arc<dyn RecordStore>>> {
        if !config.records.enabled {
            return Ok(None);
        }

        match config.records.backend {
            RecordBackendKind::Memory => Ok(Some(Arc::new(MemoryRecordStore::new()))),
            #[cfg(feature = "mongodb")]
            RecordBackendKind::Mongodb => {
                let store = crate::translation::storage::records::MongoRecordStore::connect(
                    &config.records.uri,
                    &config.records.database,
                    &config.records.collection,
                )
                .await
                .map_err(|e| TranslationError::ConfigError(e.to_string()))?;
                Ok(Some(Arc::new(store)))
            }
            #[cfg(not(feature = "mongodb"))]
            RecordBackendKind::Mongodb => Err(TranslationError::ConfigError(
                "未启用 mongodb 特性，无法使用 MongoDB 历史存储".to_string(),
            )),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn catalog(&self) -> &LanguageCatalog {
        &self.catalog
    }

    pub fn cache(&self) -> &CacheAccessor {
        &self.cache
    }

    pub fn translation(&self) -> &TranslationOrchestrator {
        &self.translation
    }

    pub fn detection(&self) -> &DetectionOrchestrator {
        &self.detection
    }

    pub fn translators(&self) -> &EngineRegistry<dyn Translator> {
        &self.translators
    }

    pub fn detectors(&self) -> &EngineRegistry<dyn LanguageDetector> {
        &self.detectors
    }

    pub fn records(&self) -> Option<&Arc<dyn RecordStore>> {
        self.records.as_ref()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// 后台保存一次成功翻译的历史记录
    pub fn record_translation(&self, texts: &[String], outcome: &TranslationOutcome) {
        let Some(store) = self.records.clone() else {
            return;
        };
        if outcome.results.is_empty() {
            return;
        }

        let mut record = TranslationRecord::new(
            &outcome.src_lang,
            &outcome.tgt_lang,
            texts.to_vec(),
            outcome.results.clone(),
        );
        record.cache_hits = outcome.cache_hits as u32;
        record.duration_ms = outcome.elapsed.as_millis() as u64;
        record.device = outcome.device.clone().unwrap_or_else(|| "cache".to_string());

        tokio::spawn(async move {
            if let Err(e) = store.insert_one(record).await {
                warn!("保存翻译记录失败: {}", e);
            }
        });
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("cache", &self.cache)
            .field("translators", &self.translators)
            .field("detectors", &self.detectors)
            .field("records", &self.records.as_ref().map(|r| r.describe()))
            .finish()
    }
}

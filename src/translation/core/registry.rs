//! 引擎注册表
//!
//! 每个能力（语言对或检测模型）对应一个插槽。插槽在首次解析时构建引擎，
//! 之后所有调用共享同一实例。构建在阻塞线程池中进行，并发解析同一能力
//! 的调用者等待同一次构建。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::OnceCell;
use tracing::{error, info};

use super::engine::InferenceError;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::languages::CapabilityKey;

/// 引擎构建函数
pub type EngineFactory<E> = Arc<dyn Fn() -> Result<Arc<E>, InferenceError> + Send + Sync>;

struct Slot<E: ?Sized> {
    factory: EngineFactory<E>,
    engine: OnceCell<Arc<E>>,
}

/// 按能力键懒加载并缓存引擎实例
pub struct EngineRegistry<E: ?Sized> {
    kind: &'static str,
    slots: HashMap<CapabilityKey, Arc<Slot<E>>>,
    constructions: Arc<AtomicUsize>,
}

impl<E: ?Sized + Send + Sync + 'static> EngineRegistry<E> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            slots: HashMap::new(),
            constructions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 注册一个能力及其构建函数，重复注册时后者覆盖前者
    pub fn register<F>(mut self, key: CapabilityKey, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<E>, InferenceError> + Send + Sync + 'static,
    {
        self.slots.insert(
            key,
            Arc::new(Slot {
                factory: Arc::new(factory),
                engine: OnceCell::new(),
            }),
        );
        self
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn contains(&self, key: &CapabilityKey) -> bool {
        self.slots.contains_key(key)
    }

    pub fn keys(&self) -> Vec<CapabilityKey> {
        let mut keys: Vec<CapabilityKey> = self.slots.keys().cloned().collect();
        keys.sort_by_key(|key| key.to_string());
        keys
    }

    /// 引擎是否已经构建
    pub fn is_loaded(&self, key: &CapabilityKey) -> bool {
        self.slots
            .get(key)
            .map_or(false, |slot| slot.engine.initialized())
    }

    /// 成功构建的引擎总数
    pub fn construction_count(&self) -> usize {
        self.constructions.load(Ordering::Relaxed)
    }

    /// 获取能力对应的引擎，必要时构建
    ///
    /// 构建失败不会污染插槽，后续调用会再次尝试构建。
    pub async fn resolve(&self, key: &CapabilityKey) -> TranslationResult<Arc<E>> {
        let slot = self.slots.get(key).ok_or_else(|| {
            TranslationError::UnsupportedCapability(format!("没有为 {} 注册{}引擎", key, self.kind))
        })?;

        if let Some(engine) = slot.engine.get() {
            return Ok(engine.clone());
        }

        // 构建放在独立任务中完成，调用方被取消时构建仍会结束并写入插槽
        let slot = slot.clone();
        let key = key.clone();
        let kind = self.kind;
        let constructions = self.constructions.clone();
        let task = tokio::spawn(async move {
            slot.engine
                .get_or_try_init(|| construct(kind, &key, slot.factory.clone(), &constructions))
                .await
                .map(Arc::clone)
        });

        task.await?
    }

    /// 预先构建所有已注册的引擎，返回引擎数量
    pub async fn warm_up(&self) -> TranslationResult<usize> {
        let started = Instant::now();
        let engines = futures::future::try_join_all(self.slots.keys().map(|key| self.resolve(key))).await?;
        info!(
            "{}引擎预热完成: {} 个, 耗时 {:?}",
            self.kind,
            engines.len(),
            started.elapsed()
        );
        Ok(engines.len())
    }
}

async fn construct<E: ?Sized + Send + Sync + 'static>(
    kind: &'static str,
    key: &CapabilityKey,
    factory: EngineFactory<E>,
    constructions: &AtomicUsize,
) -> TranslationResult<Arc<E>> {
    info!("构建{}引擎: {}", kind, key);
    let started = Instant::now();

    let built = tokio::task::spawn_blocking(move || factory())
        .await
        .map_err(|e| e.to_string())
        .and_then(|result| result.map_err(|e| e.to_string()));

    match built {
        Ok(engine) => {
            constructions.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("translator_engine_constructions_total", "kind" => kind).increment(1);
            info!("{}引擎 {} 构建完成, 耗时 {:?}", kind, key, started.elapsed());
            Ok(engine)
        }
        Err(reason) => {
            error!("{}引擎 {} 构建失败: {}", kind, key, reason);
            Err(TranslationError::ConstructionFailed {
                capability: key.to_string(),
                reason,
            })
        }
    }
}

impl<E: ?Sized> std::fmt::Debug for EngineRegistry<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("kind", &self.kind)
            .field("capabilities", &self.slots.len())
            .field("constructions", &self.constructions.load(Ordering::Relaxed))
            .finish()
    }
}

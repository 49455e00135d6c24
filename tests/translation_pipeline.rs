//! 翻译流程集成测试
//!
//! 覆盖缓存命中、去重、自动检测、语言对校验和准入控制

use std::sync::Arc;
use std::time::Duration;

use translator_service::translation::languages::CapabilityKey;
use translator_service::TranslationError;

mod common;

use common::{settle, texts, FailingBackend, HarnessBuilder};

#[tokio::test]
async fn test_translate_end_to_end() {
    let harness = HarnessBuilder::new().build().await;

    let outcome = harness
        .context
        .translation()
        .translate(&texts(&["Hello world.", "good morning"]), Some("en"), "vi")
        .await
        .expect("翻译应成功");

    assert_eq!(outcome.results, vec!["[vi] Hello world.", "[vi] good morning"]);
    assert_eq!(outcome.src_lang, "en");
    assert_eq!(outcome.tgt_lang, "vi");
    assert_eq!(outcome.cache_hits, 0);
    assert_eq!(outcome.device.as_deref(), Some("fake-cpu"));
    assert_eq!(harness.translate_calls(), 1);
    assert_eq!(harness.constructions(), 1);
}

#[tokio::test]
async fn test_second_request_is_served_from_cache() {
    let harness = HarnessBuilder::new().build().await;
    let batch = texts(&["Hello world.", "good morning"]);
    let translation = harness.context.translation();

    let first = translation.translate(&batch, Some("en"), "vi").await.unwrap();
    settle().await;
    let second = translation.translate(&batch, Some("en"), "vi").await.unwrap();

    assert_eq!(first.results, second.results);
    assert_eq!(second.cache_hits, 2);
    assert_eq!(second.device, None);
    assert_eq!(harness.translate_calls(), 1, "缓存命中时不应调用引擎");

    let stats = translation.stats();
    assert_eq!(stats.requests, 2);
    assert_eq!(stats.cache_hits, 2);
    assert_eq!(stats.engine_calls, 1);
}

#[tokio::test]
async fn test_surrounding_whitespace_shares_cache_entry() {
    let harness = HarnessBuilder::new().build().await;
    let translation = harness.context.translation();

    translation
        .translate(&texts(&["Hello"]), Some("en"), "vi")
        .await
        .unwrap();
    settle().await;

    // 去空白后与缓存键相同的文本
    let outcome = translation
        .translate(&texts(&["  Hello  "]), Some("en"), "vi")
        .await
        .unwrap();
    assert_eq!(outcome.results, vec!["[vi] Hello"]);
    assert_eq!(outcome.cache_hits, 1);
}

#[tokio::test]
async fn test_empty_batch_skips_everything() {
    let backend = Arc::new(FailingBackend::default());
    let harness = HarnessBuilder::new().backend(backend.clone()).build().await;

    let outcome = harness
        .context
        .translation()
        .translate(&[], Some("en"), "vi")
        .await
        .unwrap();

    assert!(outcome.results.is_empty());
    assert_eq!(harness.translate_calls(), 0);
    assert_eq!(harness.detect_calls(), 0);
    assert_eq!(harness.constructions(), 0);

    settle().await;
    assert_eq!(backend.gets(), 0);
    assert_eq!(backend.sets(), 0);
    let stats = harness.context.cache().stats();
    assert_eq!(stats.hits + stats.misses + stats.failures + stats.writes, 0);
}

#[tokio::test]
async fn test_duplicates_and_blank_texts() {
    let harness = HarnessBuilder::new().build().await;

    let outcome = harness
        .context
        .translation()
        .translate(&texts(&["Hi", "Hi", "   ", "hi!"]), Some("en"), "fr")
        .await
        .unwrap();

    assert_eq!(outcome.results, vec!["[fr] Hi", "[fr] Hi", "", "[fr] hi!"]);
    assert_eq!(harness.translate_calls(), 1);
    assert_eq!(harness.translated_texts(), 2, "重复文本只应推理一次，空白文本不送入引擎");
}

#[tokio::test]
async fn test_unsupported_pair_does_not_touch_engines() {
    let harness = HarnessBuilder::new().build().await;

    let err = harness
        .context
        .translation()
        .translate(&texts(&["Hello"]), Some("en"), "de")
        .await
        .unwrap_err();

    assert!(matches!(err, TranslationError::UnsupportedCapability(_)));
    assert!(err.to_string().contains("de"));
    assert_eq!(harness.constructions(), 0);
    assert_eq!(harness.context.translation().stats().errors, 1);
}

#[tokio::test]
async fn test_source_language_is_detected_when_missing() {
    let harness = HarnessBuilder::new().detected_language("fr").build().await;

    let outcome = harness
        .context
        .translation()
        .translate(&texts(&["Bonjour le monde."]), None, "en")
        .await
        .unwrap();

    assert_eq!(outcome.src_lang, "fr");
    assert_eq!(outcome.results, vec!["[en] Bonjour le monde."]);
    assert_eq!(harness.detect_calls(), 1);

    // 空白的源语言等同于未指定
    harness
        .context
        .translation()
        .translate(&texts(&["Salut."]), Some("  "), "en")
        .await
        .unwrap();
    assert_eq!(harness.detect_calls(), 2);
}

#[tokio::test]
async fn test_detection_result_is_cached() {
    let harness = HarnessBuilder::new().detected_language("vi").build().await;
    let detection = harness.context.detection();
    let batch = texts(&["Xin chào", "thế giới"]);

    let first = detection.detect(&batch).await.unwrap();
    assert_eq!(first.language, "vi");
    assert!(!first.cached);
    assert_eq!(first.detected.len(), 2);

    settle().await;
    let second = detection.detect(&batch).await.unwrap();
    assert!(second.cached);
    assert_eq!(second.detected, first.detected);
    assert_eq!(harness.detect_calls(), 1);
}

#[tokio::test]
async fn test_detection_rejects_blank_input() {
    let harness = HarnessBuilder::new().build().await;

    let err = harness
        .context
        .detection()
        .detect(&texts(&["", "  "]))
        .await
        .unwrap_err();
    assert!(matches!(err, TranslationError::InvalidInput(_)));
    assert_eq!(harness.detect_calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overload_when_no_slot_frees_in_time() {
    let harness = HarnessBuilder::new()
        .config(|config| {
            config.admission.translation_capacity = 1;
            config.admission.translation_timeout_ms = 100;
        })
        .translation_delay(Duration::from_millis(500))
        .build()
        .await;
    let translation = harness.context.translation();

    let first = texts(&["First sentence."]);
    let second = texts(&["Second sentence."]);
    let (a, b) = tokio::join!(
        translation.translate(&first, Some("en"), "vi"),
        translation.translate(&second, Some("en"), "vi"),
    );

    let overloaded = [&a, &b]
        .iter()
        .filter(|result| matches!(result, Err(TranslationError::Overloaded { .. })))
        .count();
    assert_eq!(overloaded, 1, "恰好一个请求应因准入超时被拒绝");
    assert!(a.is_ok() || b.is_ok());
    assert_eq!(harness.translate_calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_engine_is_constructed_once_under_concurrency() {
    let harness = HarnessBuilder::new().build().await;
    let context = harness.context.clone();

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let context = context.clone();
            tokio::spawn(async move {
                context
                    .translation()
                    .translate(&[format!("Sentence {}", i)], Some("en"), "vi")
                    .await
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(harness.constructions(), 1);
    assert!(context
        .translators()
        .is_loaded(&CapabilityKey::translation("en", "vi")));
    assert!(!context
        .translators()
        .is_loaded(&CapabilityKey::translation("en", "fr")));
}

//! 推理引擎接口
//!
//! 引擎是同步、CPU/IO 密集的黑盒，由编排器放到阻塞线程池中执行。
//! 本模块定义翻译与语言检测两种能力的接口，以及通过 HTTP 调用
//! 远程模型服务的实现。
//!
//! # 远程模型服务协议
//!
//! - `GET  {endpoint}/v1/models/{model}` → `{"name": ..., "device": "cuda"}`，构建引擎时调用，
//!   用于确认模型已加载并获取推理设备
//! - `POST {endpoint}/v1/translate` `{"model", "texts"}` → `{"translations": [...]}`
//! - `POST {endpoint}/v1/detect` `{"model", "text", "top_k"}` → `{"labels": [{"language", "confidence"}]}`

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::translation::languages::PairModel;

/// 推理错误
#[derive(Debug, Error, Clone)]
pub enum InferenceError {
    #[error("推理服务请求失败: {0}")]
    Request(String),

    #[error("推理服务响应无效: {0}")]
    BadResponse(String),

    #[error("推理结果数量不匹配: 期望 {expected}，实际 {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("模型加载失败: {0}")]
    Load(String),

    /// 输入本身无法处理，属于调用方的问题
    #[error("{0}")]
    Unrecognizable(String),
}

impl From<reqwest::Error> for InferenceError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            InferenceError::BadResponse(error.to_string())
        } else {
            InferenceError::Request(error.to_string())
        }
    }
}

impl From<InferenceError> for crate::translation::error::TranslationError {
    fn from(error: InferenceError) -> Self {
        use crate::translation::error::TranslationError;
        match error {
            InferenceError::Unrecognizable(reason) => TranslationError::InvalidInput(reason),
            other => TranslationError::InferenceError(other.to_string()),
        }
    }
}

/// 单个语言检测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub language: String,
    pub confidence: f32,
}

/// 翻译引擎
pub trait Translator: Send + Sync {
    /// 批量翻译，返回结果与输入一一对应且顺序相同
    fn translate(&self, texts: &[String]) -> Result<Vec<String>, InferenceError>;

    /// 推理设备，例如 `cpu`、`cuda`
    fn device(&self) -> String;
}

/// 语言检测引擎
pub trait LanguageDetector: Send + Sync {
    /// 将所有文本以空格合并后检测，返回按置信度降序排列的前 `top_k` 个语言
    fn detect(&self, texts: &[String], top_k: usize) -> Result<Vec<Detection>, InferenceError>;

    fn device(&self) -> String;
}

// ============================================================================
// 远程引擎
// ============================================================================

/// 远程模型服务配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteEngineConfig {
    pub endpoint: String,
    pub request_timeout_secs: u64,
}

impl Default for RemoteEngineConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000".to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl RemoteEngineConfig {
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), path)
    }

    fn client(&self) -> Result<reqwest::blocking::Client, InferenceError> {
        reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .build()
            .map_err(|e| InferenceError::Load(format!("创建HTTP客户端失败: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    #[serde(default)]
    device: Option<String>,
}

/// 请求模型信息，确认模型可用
fn load_model(
    client: &reqwest::blocking::Client,
    config: &RemoteEngineConfig,
    model: &str,
) -> Result<String, InferenceError> {
    let info: ModelInfo = client
        .get(config.url(&format!("v1/models/{}", model)))
        .send()
        .and_then(|resp| resp.error_for_status())
        .map_err(|e| InferenceError::Load(format!("{}: {}", model, e)))?
        .json()?;

    Ok(info.device.unwrap_or_else(|| "cpu".to_string()))
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    model: &'a str,
    texts: &'a [String],
}

#[derive(Deserialize)]
struct TranslateResponse {
    translations: Vec<String>,
}

/// 调用远程模型服务的翻译引擎
pub struct RemoteTranslator {
    client: reqwest::blocking::Client,
    config: RemoteEngineConfig,
    spec: PairModel,
    device: String,
}

impl RemoteTranslator {
    /// 构建引擎并确认模型已在远程服务中加载
    pub fn load(config: &RemoteEngineConfig, spec: PairModel) -> Result<Self, InferenceError> {
        let client = config.client()?;
        let device = load_model(&client, config, &spec.model)?;

        Ok(Self {
            client,
            config: config.clone(),
            spec,
            device,
        })
    }

    fn strip_output_prefix<'a>(&self, text: &'a str) -> &'a str {
        if self.spec.output_prefix.is_empty() {
            return text;
        }
        let trimmed = text.trim_start();
        trimmed
            .strip_prefix(self.spec.output_prefix.as_str())
            .unwrap_or(trimmed)
    }
}

impl Translator for RemoteTranslator {
    fn translate(&self, texts: &[String]) -> Result<Vec<String>, InferenceError> {
        let inputs: Vec<String> = texts
            .iter()
            .map(|text| format!("{}{}", self.spec.input_prefix, text))
            .collect();

        let response: TranslateResponse = self
            .client
            .post(self.config.url("v1/translate"))
            .json(&TranslateRequest {
                model: &self.spec.model,
                texts: &inputs,
            })
            .send()?
            .error_for_status()?
            .json()?;

        if response.translations.len() != texts.len() {
            return Err(InferenceError::LengthMismatch {
                expected: texts.len(),
                actual: response.translations.len(),
            });
        }

        Ok(response
            .translations
            .iter()
            .map(|text| self.strip_output_prefix(text).to_string())
            .collect())
    }

    fn device(&self) -> String {
        self.device.clone()
    }
}

#[derive(Serialize)]
struct DetectRequest<'a> {
    model: &'a str,
    text: &'a str,
    top_k: usize,
}

#[derive(Deserialize)]
struct DetectResponse {
    labels: Vec<Detection>,
}

/// 调用远程模型服务的语言检测引擎
pub struct RemoteDetector {
    client: reqwest::blocking::Client,
    config: RemoteEngineConfig,
    model: String,
    device: String,
}

impl RemoteDetector {
    pub fn load(config: &RemoteEngineConfig, model: &str) -> Result<Self, InferenceError> {
        let client = config.client()?;
        let device = load_model(&client, config, model)?;

        Ok(Self {
            client,
            config: config.clone(),
            model: model.to_string(),
            device,
        })
    }
}

impl LanguageDetector for RemoteDetector {
    fn detect(&self, texts: &[String], top_k: usize) -> Result<Vec<Detection>, InferenceError> {
        let merged = texts.join(" ");
        let response: DetectResponse = self
            .client
            .post(self.config.url("v1/detect"))
            .json(&DetectRequest {
                model: &self.model,
                text: &merged,
                top_k,
            })
            .send()?
            .error_for_status()?
            .json()?;

        if response.labels.is_empty() {
            return Err(InferenceError::BadResponse("检测结果为空".to_string()));
        }

        let mut labels = response.labels;
        labels.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        labels.truncate(top_k.max(1));
        Ok(labels)
    }

    fn device(&self) -> String {
        self.device.clone()
    }
}

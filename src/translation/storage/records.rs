//! 翻译历史记录存储
//!
//! 按唯一 ID 或过滤条件进行增改查。默认使用进程内存储，
//! 启用 `mongodb` feature 后可以持久化到 MongoDB。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 记录存储错误
#[derive(Debug, Error, Clone)]
pub enum RecordError {
    #[error("记录缺少 _id，无法更新")]
    MissingId,

    #[error("记录存储后端错误: {0}")]
    Backend(String),

    #[error("记录序列化失败: {0}")]
    Serialization(String),
}

/// 一次成功翻译的记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub src_lang: String,
    pub tgt_lang: String,
    pub texts: Vec<String>,
    pub results: Vec<String>,
    pub cache_hits: u32,
    pub duration_ms: u64,
    pub device: String,
    pub created_at: DateTime<Utc>,
}

impl TranslationRecord {
    pub fn new(
        src_lang: &str,
        tgt_lang: &str,
        texts: Vec<String>,
        results: Vec<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            src_lang: src_lang.to_string(),
            tgt_lang: tgt_lang.to_string(),
            texts,
            results,
            cache_hits: 0,
            duration_ms: 0,
            device: String::new(),
            created_at: Utc::now(),
        }
    }
}

/// 查询条件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub src_lang: Option<String>,
    pub tgt_lang: Option<String>,
    pub limit: Option<usize>,
}

impl RecordFilter {
    fn matches(&self, record: &TranslationRecord) -> bool {
        self.src_lang.as_deref().map_or(true, |lang| lang == record.src_lang)
            && self.tgt_lang.as_deref().map_or(true, |lang| lang == record.tgt_lang)
    }
}

/// 记录存储接口
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// 插入一条记录，返回其 ID
    async fn insert_one(&self, record: TranslationRecord) -> Result<String, RecordError>;

    /// 批量插入，返回插入条数
    async fn insert_many(&self, records: Vec<TranslationRecord>) -> Result<usize, RecordError>;

    /// 按 ID 整体更新，返回记录是否存在
    async fn update_one(&self, record: TranslationRecord) -> Result<bool, RecordError>;

    async fn fetch_one(&self, id: &str) -> Result<Option<TranslationRecord>, RecordError>;

    /// 按条件查询，按创建时间倒序
    async fn fetch_many(&self, filter: &RecordFilter) -> Result<Vec<TranslationRecord>, RecordError>;

    fn describe(&self) -> String;
}

/// 进程内记录存储
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: DashMap<String, TranslationRecord>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert_one(&self, record: TranslationRecord) -> Result<String, RecordError> {
        let id = record.id.clone();
        self.records.insert(id.clone(), record);
        Ok(id)
    }

    async fn insert_many(&self, records: Vec<TranslationRecord>) -> Result<usize, RecordError> {
        let count = records.len();
        for record in records {
            self.records.insert(record.id.clone(), record);
        }
        Ok(count)
    }

    async fn update_one(&self, record: TranslationRecord) -> Result<bool, RecordError> {
        if record.id.is_empty() {
            return Err(RecordError::MissingId);
        }
        match self.records.get_mut(&record.id) {
            Some(mut existing) => {
                *existing = record;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn fetch_one(&self, id: &str) -> Result<Option<TranslationRecord>, RecordError> {
        Ok(self.records.get(id).map(|r| r.value().clone()))
    }

    async fn fetch_many(&self, filter: &RecordFilter) -> Result<Vec<TranslationRecord>, RecordError> {
        let mut records: Vec<TranslationRecord> = self
            .records
            .iter()
            .filter(|r| filter.matches(r.value()))
            .map(|r| r.value().clone())
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// MongoDB 记录存储
#[cfg(feature = "mongodb")]
pub struct MongoRecordStore {
    collection: mongodb::Collection<TranslationRecord>,
    name: String,
}

#[cfg(feature = "mongodb")]
impl MongoRecordStore {
    /// 连接 MongoDB 并打开指定集合
    pub async fn connect(uri: &str, database: &str, collection: &str) -> Result<Self, RecordError> {
        let client = mongodb::Client::with_uri_str(uri)
            .await
            .map_err(|e| RecordError::Backend(format!("连接 MongoDB 失败: {}", e)))?;
        let collection = client
            .database(database)
            .collection::<TranslationRecord>(collection);
        tracing::info!("已连接翻译历史存储: {}.{}", database, collection.name());

        Ok(Self {
            name: format!("mongodb:{}.{}", database, collection.name()),
            collection,
        })
    }

    fn filter_document(filter: &RecordFilter) -> bson::Document {
        let mut document = bson::doc! {};
        if let Some(src) = &filter.src_lang {
            document.insert("src_lang", src.as_str());
        }
        if let Some(tgt) = &filter.tgt_lang {
            document.insert("tgt_lang", tgt.as_str());
        }
        document
    }
}

#[cfg(feature = "mongodb")]
#[async_trait]
impl RecordStore for MongoRecordStore {
    async fn insert_one(&self, record: TranslationRecord) -> Result<String, RecordError> {
        let id = record.id.clone();
        self.collection
            .insert_one(record)
            .await
            .map_err(|e| RecordError::Backend(format!("插入记录失败: {}", e)))?;
        Ok(id)
    }

    async fn insert_many(&self, records: Vec<TranslationRecord>) -> Result<usize, RecordError> {
        if records.is_empty() {
            return Ok(0);
        }
        let result = self
            .collection
            .insert_many(records)
            .await
            .map_err(|e| RecordError::Backend(format!("批量插入记录失败: {}", e)))?;
        Ok(result.inserted_ids.len())
    }

    async fn update_one(&self, record: TranslationRecord) -> Result<bool, RecordError> {
        if record.id.is_empty() {
            return Err(RecordError::MissingId);
        }
        let filter = bson::doc! { "_id": record.id.as_str() };
        let update = bson::doc! {
            "$set": bson::to_bson(&record).map_err(|e| RecordError::Serialization(e.to_string()))?
        };
        let result = self
            .collection
            .update_one(filter, update)
            .await
            .map_err(|e| RecordError::Backend(format!("更新记录失败: {}", e)))?;
        Ok(result.matched_count > 0)
    }

    async fn fetch_one(&self, id: &str) -> Result<Option<TranslationRecord>, RecordError> {
        self.collection
            .find_one(bson::doc! { "_id": id })
            .await
            .map_err(|e| RecordError::Backend(format!("查询记录失败: {}", e)))
    }

    async fn fetch_many(&self, filter: &RecordFilter) -> Result<Vec<TranslationRecord>, RecordError> {
        use futures::stream::TryStreamExt;

        let mut query = self
            .collection
            .find(Self::filter_document(filter))
            .sort(bson::doc! { "created_at": -1 });
        if let Some(limit) = filter.limit {
            query = query.limit(limit as i64);
        }
        let cursor = query
            .await
            .map_err(|e| RecordError::Backend(format!("查询记录失败: {}", e)))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| RecordError::Backend(format!("读取结果失败: {}", e)))
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(src: &str, tgt: &str, text: &str) -> TranslationRecord {
        TranslationRecord::new(src, tgt, vec![text.to_string()], vec![format!("[{}] {}", tgt, text)])
    }

    #[tokio::test]
    async fn test_insert_and_fetch() {
        let store = MemoryRecordStore::new();
        let id = store.insert_one(record("en", "vi", "Hello.")).await.unwrap();

        let fetched = store.fetch_one(&id).await.unwrap().unwrap();
        assert_eq!(fetched.src_lang, "en");
        assert_eq!(fetched.texts, vec!["Hello."]);
        assert!(store.fetch_one("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_many_with_filter() {
        let store = MemoryRecordStore::new();
        let inserted = store
            .insert_many(vec![
                record("en", "vi", "one"),
                record("en", "fr", "two"),
                record("vi", "en", "three"),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 3);

        let filter = RecordFilter {
            src_lang: Some("en".to_string()),
            ..Default::default()
        };
        assert_eq!(store.fetch_many(&filter).await.unwrap().len(), 2);

        let limited = RecordFilter {
            limit: Some(1),
            ..Default::default()
        };
        assert_eq!(store.fetch_many(&limited).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_by_id() {
        let store = MemoryRecordStore::new();
        let mut rec = record("fr", "en", "Bonjour.");
        store.insert_one(rec.clone()).await.unwrap();

        rec.device = "cuda".to_string();
        assert!(store.update_one(rec.clone()).await.unwrap());
        assert_eq!(store.fetch_one(&rec.id).await.unwrap().unwrap().device, "cuda");

        rec.id = String::new();
        assert!(matches!(store.update_one(rec).await, Err(RecordError::MissingId)));
        assert!(!store.update_one(record("fr", "en", "x")).await.unwrap());
    }
}

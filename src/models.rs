//! 领域数据模型
//!
//! 记录（Record）是集合中的最小数据单元：一个稳定 id 加一组 JSON 字段。
//! 序列化时字段平铺在 id 旁边，与前端存储的数据形状一致。

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// 学习进度集合
pub const PROGRESS_COLLECTION: &str = "progress";

/// 仪表盘指标集合
pub const DASHBOARD_FIGURES_COLLECTION: &str = "dashboard_figures";

/// 默认识别的集合（按对账顺序）
pub const DEFAULT_COLLECTIONS: [&str; 5] = [
    PROGRESS_COLLECTION,
    DASHBOARD_FIGURES_COLLECTION,
    "lessons",
    "study_sessions",
    "achievements",
];

/// 仪表盘指标记录中存放数值的字段名
pub const FIGURE_VALUE_FIELD: &str = "value";

/// 一条可识别的领域数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// 前端可能以数字存放 id，读取时统一转成字符串
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(Value::as_f64)
    }

    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.fields.get(name).and_then(Value::as_u64)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// 构造仪表盘指标记录
    pub fn dashboard_figure(metric_id: impl Into<String>, value: f64) -> Self {
        Self::new(metric_id).with_field(FIGURE_VALUE_FIELD, value)
    }
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(de::Error::custom(format!(
            "record id must be a string or number, got {}",
            other
        ))),
    }
}

/// 当前登录用户
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
        }
    }
}

/// 学习进度写入（领域写路径的参数）
///
/// 通过 `DataStore::save_progress` 写入时会触发派生统计等副作用，
/// 因此备份回放必须走这条路径而不是直接 upsert。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub id: String,
    pub week: u32,
    pub day: u32,
    pub lesson_index: u32,
    pub status: String,
    pub time_spent: u64,
}

impl ProgressUpdate {
    /// 从进度记录中读取写入参数；字段缺失或类型不符时返回 None
    pub fn from_record(record: &Record) -> Option<Self> {
        Some(Self {
            id: record.id.clone(),
            week: u32::try_from(record.get_u64("week")?).ok()?,
            day: u32::try_from(record.get_u64("day")?).ok()?,
            lesson_index: u32::try_from(record.get_u64("lessonIndex")?).ok()?,
            status: record.get_str("status")?.to_string(),
            time_spent: record.get_u64("timeSpent")?,
        })
    }

    pub fn to_record(&self) -> Record {
        Record::new(self.id.clone())
            .with_field("week", self.week)
            .with_field("day", self.day)
            .with_field("lessonIndex", self.lesson_index)
            .with_field("status", self.status.clone())
            .with_field("timeSpent", self.time_spent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_serializes_flat() {
        let record = Record::new("w1-d2-0").with_field("week", 1).with_field("status", "done");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, json!({"id": "w1-d2-0", "week": 1, "status": "done"}));

        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn numeric_ids_are_read_as_strings() {
        let records: Vec<Record> =
            serde_json::from_str(r#"[{"id": 42, "status": "done"}, {"id": "w1-d1-0"}]"#).unwrap();
        assert_eq!(records[0].id, "42");
        assert_eq!(records[0].get_str("status"), Some("done"));
        assert!(!records[0].fields.contains_key("id"));
        assert_eq!(records[1].id, "w1-d1-0");

        assert!(serde_json::from_value::<Record>(json!({"id": null})).is_err());
    }

    #[test]
    fn progress_update_reads_camel_case_fields() {
        let record: Record = serde_json::from_value(json!({
            "id": "w2-d3-1",
            "week": 2,
            "day": 3,
            "lessonIndex": 1,
            "status": "completed",
            "timeSpent": 420
        }))
        .unwrap();

        let update = ProgressUpdate::from_record(&record).expect("complete progress record");
        assert_eq!(update.lesson_index, 1);
        assert_eq!(update.time_spent, 420);
        assert_eq!(update.to_record(), record);
    }

    #[test]
    fn progress_update_rejects_incomplete_record() {
        let record = Record::new("x").with_field("week", 1);
        assert!(ProgressUpdate::from_record(&record).is_none());
    }

    #[test]
    fn dashboard_figure_exposes_value() {
        let figure = Record::dashboard_figure("efficiency_ratio", 5000.0);
        assert_eq!(figure.get_f64(FIGURE_VALUE_FIELD), Some(5000.0));
    }
}

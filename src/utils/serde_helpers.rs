//! 用于处理 SurrealDB Thing ID 的序列化/反序列化辅助模块

use serde::{Deserialize, Deserializer, Serializer};

/// 把 SurrealDB 返回的记录 ID 还原成裸字符串 (例如 "expense:⟨xxxx⟩" -> "xxxx")
pub mod record_id {
    use super::*;

    pub fn serialize<S>(id: &str, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(id)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum IdValue {
            String(String),
            Thing {
                #[allow(dead_code)]
                tb: String,
                id: serde_json::Value,
            },
        }

        match IdValue::deserialize(deserializer)? {
            IdValue::String(s) => Ok(strip_wrappers(&s)),
            IdValue::Thing { id, .. } => match id {
                serde_json::Value::String(s) => Ok(strip_wrappers(&s)),
                serde_json::Value::Number(n) => Ok(n.to_string()),
                serde_json::Value::Object(map) => {
                    // Thing 内层 Id 枚举序列化成 {"String": "xxxx"} 的形式
                    if let Some(serde_json::Value::String(s)) = map.get("String") {
                        Ok(strip_wrappers(s))
                    } else if let Some(n) = map.get("Number") {
                        Ok(n.to_string())
                    } else {
                        Ok(serde_json::Value::Object(map).to_string())
                    }
                }
                other => Ok(other.to_string()),
            },
        }
    }

    /// 去掉 "table:" 前缀与 SurrealDB 的 ⟨⟩ 包裹
    fn strip_wrappers(raw: &str) -> String {
        let s = match raw.split_once(':') {
            Some((_, rest)) => rest,
            None => raw,
        };
        s.trim_start_matches('⟨').trim_end_matches('⟩').to_string()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Row {
        #[serde(with = "super::record_id")]
        id: String,
    }

    #[test]
    fn test_plain_string_id() {
        let row: Row = serde_json::from_value(serde_json::json!({"id": "abc-123"})).unwrap();
        assert_eq!(row.id, "abc-123");
    }

    #[test]
    fn test_prefixed_string_id() {
        let row: Row =
            serde_json::from_value(serde_json::json!({"id": "expense:⟨abc-123⟩"})).unwrap();
        assert_eq!(row.id, "abc-123");
    }

    #[test]
    fn test_thing_object_id() {
        let row: Row = serde_json::from_value(
            serde_json::json!({"id": {"tb": "expense", "id": {"String": "abc-123"}}}),
        )
        .unwrap();
        assert_eq!(row.id, "abc-123");
    }
}

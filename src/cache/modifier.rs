//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了实体更新修改器，仅支持 `$set` 语义。

use crate::error::{CacheError, Result};
use crate::model::{Entity, ID_FIELD};
use serde_json::{Map, Value};

/// 支持的唯一操作符
const SET_OPERATOR: &str = "$set";

/// 部分字段修改器
///
/// 只支持字段赋值，不支持算术或数组操作符
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Modifier {
    set: Map<String, Value>,
}

impl Modifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个字段赋值
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    /// 从 `{"$set": {...}}` 形式的JSON解析修改器
    ///
    /// # 返回值
    ///
    /// 非对象、包含 `$set` 以外的操作符、或是整文档替换时返回 `InvalidModifier`
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(operators) = value else {
            return Err(CacheError::InvalidModifier(
                "modifier must be an object".to_string(),
            ));
        };

        let mut set = Map::new();
        for (operator, fields) in operators {
            if !operator.starts_with('$') {
                return Err(CacheError::InvalidModifier(format!(
                    "replacement documents are not supported (field \"{}\")",
                    operator
                )));
            }
            if operator != SET_OPERATOR {
                return Err(CacheError::InvalidModifier(format!(
                    "unsupported operator {}",
                    operator
                )));
            }
            let Value::Object(fields) = fields else {
                return Err(CacheError::InvalidModifier(
                    "$set payload must be an object".to_string(),
                ));
            };
            set.extend(fields);
        }
        Ok(Self { set })
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.set
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// 将修改器应用到文档，返回修改后的新文档
    ///
    /// 未知字段、修改主键或类型不匹配都会返回 `InvalidModifier`
    pub fn apply<T: Entity>(&self, doc: &T) -> Result<T> {
        let mut value = serde_json::to_value(doc)?;
        let fields = value.as_object_mut().ok_or_else(|| {
            CacheError::InvalidModifier(format!("{} is not an object document", T::COLLECTION))
        })?;

        for (key, new_value) in &self.set {
            if key == ID_FIELD {
                if new_value.as_str() != Some(doc.id().to_string().as_str()) {
                    return Err(CacheError::InvalidModifier(format!(
                        "cannot change {} of {}",
                        ID_FIELD,
                        doc.id()
                    )));
                }
                continue;
            }
            match fields.get_mut(key) {
                Some(slot) => *slot = new_value.clone(),
                None => {
                    return Err(CacheError::InvalidModifier(format!(
                        "unknown field \"{}\" on {}",
                        key,
                        T::COLLECTION
                    )))
                }
            }
        }

        serde_json::from_value(value).map_err(|e| {
            CacheError::InvalidModifier(format!("modifier produced an invalid document: {}", e))
        })
    }
}

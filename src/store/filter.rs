//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了文档查询过滤条件。

use serde_json::Value;

/// 查询过滤条件
///
/// 只覆盖加载播出缓存所需的相等和包含查询，字段名支持 `a.b` 形式的嵌套路径
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// 匹配所有文档
    All,
    /// 字段等于给定值
    Eq(String, Value),
    /// 字段不等于给定值
    Ne(String, Value),
    /// 字段值在给定集合中
    In(String, Vec<Value>),
    /// 所有条件同时成立
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Ne(field.into(), value.into())
    }

    pub fn in_values<V, I>(field: impl Into<String>, values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Filter::In(field.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::All => other,
            Filter::And(mut filters) => {
                filters.push(other);
                Filter::And(filters)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    /// 判断文档是否匹配
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, expected) => lookup(doc, field).unwrap_or(&Value::Null) == expected,
            Filter::Ne(field, expected) => lookup(doc, field).unwrap_or(&Value::Null) != expected,
            Filter::In(field, values) => {
                let actual = lookup(doc, field).unwrap_or(&Value::Null);
                values.iter().any(|v| v == actual)
            }
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
        }
    }
}

fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, key| current.get(key))
}

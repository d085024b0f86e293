//! 查询描述的数据模型：过滤条件树、排序列表以及比较/连接运算符

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// 一次查询的顶层过滤条件序列
pub type FilterTree = Vec<FilterNode>;

/// 有序的排序列表, 顺序即主/次排序键
pub type SortList = Vec<SortEntry>;

/// 比较运算符, 封闭集合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Comparator {
    Equal,          // =
    NotEqual,       // !=
    GreaterThan,    // >
    GreaterOrEqual, // >=
    LessThan,       // <
    LessOrEqual,    // <=
}

impl Comparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Equal => "eq",
            Comparator::NotEqual => "ne",
            Comparator::GreaterThan => "gt",
            Comparator::GreaterOrEqual => "gte",
            Comparator::LessThan => "lt",
            Comparator::LessOrEqual => "lte",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Comparator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eq" | "equal" | "=" => Ok(Comparator::Equal),
            "ne" | "not_equal" | "!=" => Ok(Comparator::NotEqual),
            "gt" | "greater_than" | ">" => Ok(Comparator::GreaterThan),
            "gte" | "greater_or_equal" | ">=" => Ok(Comparator::GreaterOrEqual),
            "lt" | "less_than" | "<" => Ok(Comparator::LessThan),
            "lte" | "less_or_equal" | "<=" => Ok(Comparator::LessOrEqual),
            _ => Err(Error::UnsupportedComparator(s.to_string())),
        }
    }
}

impl TryFrom<String> for Comparator {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Comparator> for String {
    fn from(value: Comparator) -> Self {
        value.as_str().to_string()
    }
}

/// 连接运算符, 决定本节点与 *下一个* 兄弟节点如何拼接
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Concatenator {
    And,
    Or,
    /// 列表末尾的节点
    #[default]
    None,
}

impl Concatenator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Concatenator::And => "and",
            Concatenator::Or => "or",
            Concatenator::None => "none",
        }
    }
}

impl FromStr for Concatenator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "and" => Ok(Concatenator::And),
            "or" => Ok(Concatenator::Or),
            "none" | "" => Ok(Concatenator::None),
            _ => Err(Error::InvalidConcatenator(s.to_string())),
        }
    }
}

impl TryFrom<String> for Concatenator {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Concatenator> for String {
    fn from(value: Concatenator) -> Self {
        value.as_str().to_string()
    }
}

/// 字面量值
///
/// JSON 形式为普通标量, 时间戳写作 `{"$date": "2024-01-02T03:04:05Z"}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Timestamp(#[serde(with = "date_marker")] DateTime<Utc>),
    String(String),
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::String(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::String(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Integer(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        FilterValue::Integer(value.into())
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Float(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Boolean(value)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(value: DateTime<Utc>) -> Self {
        FilterValue::Timestamp(value)
    }
}

mod date_marker {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Marker {
        #[serde(rename = "$date")]
        date: DateTime<Utc>,
    }

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        Marker { date: *date }.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        Marker::deserialize(deserializer).map(|m| m.date)
    }
}

/// 叶子过滤条件, 例如 `age > 18`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFilter")]
pub struct Filter {
    field: String,
    comparator: Comparator,
    value: FilterValue,
    concatenator: Concatenator,
}

#[derive(Deserialize)]
struct RawFilter {
    field: String,
    comparator: Comparator,
    value: FilterValue,
    #[serde(default)]
    concatenator: Concatenator,
}

impl TryFrom<RawFilter> for Filter {
    type Error = Error;

    fn try_from(raw: RawFilter) -> Result<Self> {
        Filter::new(raw.field, raw.comparator, raw.value).map(|f| f.with_concatenator(raw.concatenator))
    }
}

impl Filter {
    /// 创建过滤条件, 字段名不能为空, 浮点数必须是有限值
    pub fn new(
        field: impl Into<String>,
        comparator: Comparator,
        value: impl Into<FilterValue>,
    ) -> Result<Self> {
        let field = field.into();
        if field.trim().is_empty() {
            return Err(Error::EmptyField);
        }
        let value = value.into();
        if let FilterValue::Float(f) = value {
            if !f.is_finite() {
                return Err(Error::InvalidValue(format!("{} is not a finite number", f)));
            }
        }
        Ok(Self {
            field,
            comparator,
            value,
            concatenator: Concatenator::None,
        })
    }

    pub fn eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Result<Self> {
        Self::new(field, Comparator::Equal, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<FilterValue>) -> Result<Self> {
        Self::new(field, Comparator::NotEqual, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<FilterValue>) -> Result<Self> {
        Self::new(field, Comparator::GreaterThan, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<FilterValue>) -> Result<Self> {
        Self::new(field, Comparator::GreaterOrEqual, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<FilterValue>) -> Result<Self> {
        Self::new(field, Comparator::LessThan, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<FilterValue>) -> Result<Self> {
        Self::new(field, Comparator::LessOrEqual, value)
    }

    /// 设置与下一个兄弟节点的连接方式
    pub fn with_concatenator(mut self, concatenator: Concatenator) -> Self {
        self.concatenator = concatenator;
        self
    }

    pub fn and(self) -> Self {
        self.with_concatenator(Concatenator::And)
    }

    pub fn or(self) -> Self {
        self.with_concatenator(Concatenator::Or)
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    pub fn value(&self) -> &FilterValue {
        &self.value
    }

    pub fn concatenator(&self) -> Concatenator {
        self.concatenator
    }
}

/// 过滤条件分组, 仅用于组合, 编译时不增加嵌套层级
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterGroup {
    pub children: Vec<FilterNode>,
    #[serde(default)]
    pub concatenator: Concatenator,
}

impl FilterGroup {
    pub fn new(children: Vec<FilterNode>) -> Self {
        Self {
            children,
            concatenator: Concatenator::None,
        }
    }

    pub fn with_concatenator(mut self, concatenator: Concatenator) -> Self {
        self.concatenator = concatenator;
        self
    }

    pub fn and(self) -> Self {
        self.with_concatenator(Concatenator::And)
    }

    pub fn or(self) -> Self {
        self.with_concatenator(Concatenator::Or)
    }

    /// 子树中是否至少含有一个叶子条件
    pub fn has_filters(&self) -> bool {
        self.children.iter().any(FilterNode::has_filters)
    }
}

/// 过滤树中的节点：叶子条件或分组
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterNode {
    Filter(Filter),
    Group(FilterGroup),
}

impl FilterNode {
    pub fn concatenator(&self) -> Concatenator {
        match self {
            FilterNode::Filter(filter) => filter.concatenator,
            FilterNode::Group(group) => group.concatenator,
        }
    }

    pub fn has_filters(&self) -> bool {
        match self {
            FilterNode::Filter(_) => true,
            FilterNode::Group(group) => group.has_filters(),
        }
    }
}

impl From<Filter> for FilterNode {
    fn from(value: Filter) -> Self {
        FilterNode::Filter(value)
    }
}

impl From<FilterGroup> for FilterNode {
    fn from(value: FilterGroup) -> Self {
        FilterNode::Group(value)
    }
}

/// 排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    #[serde(alias = "asc")]
    Ascending,
    #[serde(alias = "desc")]
    Descending,
}

/// 单个排序键
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortEntry {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortEntry {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

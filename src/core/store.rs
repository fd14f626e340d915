//! 持久化接口
//!
//! 核心逻辑只通过 `Store` 访问数据，不直接依赖任何数据库驱动。
//! SQLite 适配器见 `storage::database`。

use crate::core::error::{Result, StoreError};

/// 语句参数与结果单元格
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Integer(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// 查询结果中的一行
#[derive(Debug, Clone, PartialEq)]
pub struct Row(Vec<Value>);

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    fn cell(&self, index: usize, expected: &'static str) -> std::result::Result<&Value, StoreError> {
        self.0.get(index).ok_or(StoreError::ColumnType { index, expected })
    }

    pub fn text(&self, index: usize) -> std::result::Result<String, StoreError> {
        match self.cell(index, "TEXT")? {
            Value::Text(s) => Ok(s.clone()),
            _ => Err(StoreError::ColumnType { index, expected: "TEXT" }),
        }
    }

    pub fn integer(&self, index: usize) -> std::result::Result<i64, StoreError> {
        match self.cell(index, "INTEGER")? {
            Value::Integer(i) => Ok(*i),
            _ => Err(StoreError::ColumnType { index, expected: "INTEGER" }),
        }
    }

    /// 整数列会被提升为浮点
    pub fn real(&self, index: usize) -> std::result::Result<f64, StoreError> {
        self.optional_real(index)?
            .ok_or(StoreError::ColumnType { index, expected: "REAL" })
    }

    pub fn optional_real(&self, index: usize) -> std::result::Result<Option<f64>, StoreError> {
        match self.cell(index, "REAL")? {
            Value::Null => Ok(None),
            Value::Real(f) => Ok(Some(*f)),
            Value::Integer(i) => Ok(Some(*i as f64)),
            Value::Text(_) => Err(StoreError::ColumnType { index, expected: "REAL" }),
        }
    }

    pub fn year(&self, index: usize) -> std::result::Result<i32, StoreError> {
        i32::try_from(self.integer(index)?)
            .map_err(|_| StoreError::ColumnType { index, expected: "INTEGER(year)" })
    }
}

/// 事务内执行的工作单元
pub type TransactionWork<'a> = dyn FnMut(&dyn Store) -> Result<()> + 'a;

/// 关系型存储接口
pub trait Store {
    /// 执行写语句，返回受影响的行数
    fn execute(&self, statement: &str, params: &[Value]) -> Result<usize>;

    /// 执行读语句
    fn query(&self, statement: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// 执行多条无参数语句（建表、重置）
    fn execute_batch(&self, statements: &str) -> Result<()>;

    /// 在事务中执行 `work`：成功则提交，任何错误都回滚。
    /// 已处于事务中时直接加入外层事务。
    fn in_transaction(&self, work: &mut TransactionWork<'_>) -> Result<()>;
}

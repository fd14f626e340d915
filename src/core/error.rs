//! 错误类型定义
//!
//! 存储层的失败统一归类为 `StoreError`，
//! 领域操作在知道约束含义时把它转换成具体的 `RegistrarError`。

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistrarError>;

/// 持久化接口的失败分类
#[derive(Debug, Error)]
pub enum StoreError {
    /// 主键或唯一约束冲突
    #[error("唯一约束冲突: {0}")]
    UniqueViolation(String),
    /// 外键约束冲突（引用了不存在的学生或课程）
    #[error("外键约束冲突: {0}")]
    ForeignKeyViolation(String),
    /// 其他约束冲突（NOT NULL、CHECK 等）
    #[error("约束冲突: {0}")]
    ConstraintViolation(String),
    /// 结果列的类型与预期不符
    #[error("第 {index} 列类型不符，期望 {expected}")]
    ColumnType { index: usize, expected: &'static str },
    /// 底层存储失败（连接、IO、SQL 语法等）
    #[error("存储失败: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// 领域错误
#[derive(Debug, Error)]
pub enum RegistrarError {
    /// 等级阈值表不合法，或没有阈值能匹配给定分数
    #[error("等级阈值配置错误: {0}")]
    Configuration(String),
    /// 对空记录集做聚合
    #[error("没有可用于计算的成绩记录")]
    EmptyRecord,
    #[error("先修关系已存在: {course} -> {prereq}")]
    DuplicateEdge { course: String, prereq: String },
    #[error("先修关系会形成环: {course} -> {prereq}")]
    CyclicPrerequisite { course: String, prereq: String },
    #[error("选课记录已存在: {student} / {course} / {year}")]
    DuplicateEnrollment {
        student: String,
        course: String,
        year: i32,
    },
    #[error("学生已存在: {0}")]
    DuplicateStudent(String),
    #[error("课程已存在: {0}")]
    DuplicateCourse(String),
    /// 更新或删除的目标不存在
    #[error("记录不存在: {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RegistrarError {
    /// 若为唯一约束冲突，则替换为给定的领域错误，其余错误原样返回
    pub(crate) fn on_unique_violation(self, replacement: impl FnOnce() -> RegistrarError) -> Self {
        match self {
            RegistrarError::Store(StoreError::UniqueViolation(detail)) => {
                tracing::debug!("唯一约束冲突: {}", detail);
                replacement()
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_is_reclassified() {
        let err = RegistrarError::from(StoreError::UniqueViolation("students.unix_id".into()))
            .on_unique_violation(|| RegistrarError::DuplicateStudent("jd1".into()));
        assert!(matches!(err, RegistrarError::DuplicateStudent(ref id) if id == "jd1"));
    }

    #[test]
    fn test_other_store_errors_pass_through() {
        let err = RegistrarError::from(StoreError::ForeignKeyViolation("fk".into()))
            .on_unique_violation(|| RegistrarError::DuplicateStudent("jd1".into()));
        assert!(matches!(
            err,
            RegistrarError::Store(StoreError::ForeignKeyViolation(_))
        ));
    }
}

//! 核心数据模型定义
//!
//! 学生、课程、先修关系、等级阈值、选课记录，以及报表输出的行结构。

use serde::{Deserialize, Serialize};

/// 把课程代码规范化为大写形式（如 "cs101" -> "CS101"）
///
/// 核心层不做规范化，调用方负责在进入核心之前调用。
pub fn canonical_moniker(moniker: &str) -> String {
    moniker.trim().to_uppercase()
}

/// 学生
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub first_name: String,
    pub last_name: String,
    /// 唯一标识
    pub unix_id: String,
}

impl Student {
    pub fn new(first_name: &str, last_name: &str, unix_id: &str) -> Self {
        Self {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            unix_id: unix_id.to_string(),
        }
    }
}

/// 课程
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// 课程代码（唯一，大写）
    pub moniker: String,
    pub name: String,
    pub department: String,
}

impl Course {
    pub fn new(moniker: &str, name: &str, department: &str) -> Self {
        Self {
            moniker: moniker.to_string(),
            name: name.to_string(),
            department: department.to_string(),
        }
    }
}

/// 先修关系：修读 `course` 之前必须在 `prereq` 中取得至少 `min_grade`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prerequisite {
    pub course: String,
    pub prereq: String,
    pub min_grade: f64,
}

impl Prerequisite {
    pub fn new(course: &str, prereq: &str, min_grade: f64) -> Self {
        Self {
            course: course.to_string(),
            prereq: prereq.to_string(),
            min_grade,
        }
    }
}

/// 等级阈值：分数不低于 `min_grade` 时对应 `letter`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetterThreshold {
    pub min_grade: f64,
    pub letter: String,
}

impl LetterThreshold {
    pub fn new(min_grade: f64, letter: &str) -> Self {
        Self {
            min_grade,
            letter: letter.to_string(),
        }
    }
}

/// 选课记录，键为 (student, course, year)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub student: String,
    pub course: String,
    pub year: i32,
    /// None 表示在读
    pub grade: Option<f64>,
}

impl Enrollment {
    pub fn status(&self) -> EnrollmentStatus {
        match self.grade {
            None => EnrollmentStatus::Enrolled,
            Some(grade) => EnrollmentStatus::Graded(grade),
        }
    }
}

/// 选课记录状态
///
/// `Enrolled -> Graded` 由评分触发；重新评分仍停留在 `Graded`。
/// 退课直接删除记录，没有对应状态。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EnrollmentStatus {
    /// 在读，尚未评分
    Enrolled,
    /// 已评分
    Graded(f64),
}

/// 学生当前在读课程
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentCourse {
    pub course: String,
    pub year: i32,
}

/// 成绩单中的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptRow {
    pub course: String,
    pub year: i32,
    pub grade: f64,
    /// 分数低于最低分数线时没有对应等级
    pub letter: Option<String>,
}

/// 课程选课人数统计
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseEnrollment {
    pub course: String,
    pub name: String,
    pub enrolled: u64,
}

/// 成绩排行榜中的一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopPerformer {
    pub unix_id: String,
    pub first_name: String,
    pub last_name: String,
    pub courses_taken: usize,
    /// 平均分，保留三位小数
    pub average_grade: f64,
}

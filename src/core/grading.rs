//! 评分引擎
//!
//! 负责分数到等级的换算，以及平均分计算。
//! 阈值表按分数从高到低保存，换算时取第一个不高于分数的阈值。

use crate::core::error::{RegistrarError, Result};
use crate::core::models::LetterThreshold;
use crate::core::store::Store;
use std::collections::HashSet;

/// 聚合报表（排行榜）保留的小数位
pub const AGGREGATE_PLACES: u32 = 3;
/// 成绩单平均分保留的小数位
pub const TRANSCRIPT_PLACES: u32 = 2;

/// 等级阈值表
#[derive(Debug, Clone)]
pub struct GradeScale {
    /// 按 min_grade 严格降序
    thresholds: Vec<LetterThreshold>,
}

impl GradeScale {
    /// 由阈值列表构建，顺序不限
    ///
    /// 阈值表为空、分数不是有限值、分数或等级重复时返回 `Configuration` 错误。
    pub fn new(mut thresholds: Vec<LetterThreshold>) -> Result<Self> {
        if thresholds.is_empty() {
            return Err(RegistrarError::Configuration("阈值表为空".to_string()));
        }

        if let Some(t) = thresholds.iter().find(|t| !t.min_grade.is_finite()) {
            return Err(RegistrarError::Configuration(format!(
                "等级 {} 的分数线不是有限值",
                t.letter
            )));
        }

        thresholds.sort_by(|a, b| b.min_grade.total_cmp(&a.min_grade));

        if let Some(pair) = thresholds
            .windows(2)
            .find(|w| w[0].min_grade == w[1].min_grade)
        {
            return Err(RegistrarError::Configuration(format!(
                "分数线 {} 重复",
                pair[0].min_grade
            )));
        }

        let mut letters = HashSet::new();
        for t in &thresholds {
            if !letters.insert(t.letter.as_str()) {
                return Err(RegistrarError::Configuration(format!(
                    "等级 {} 重复",
                    t.letter
                )));
            }
        }

        Ok(Self { thresholds })
    }

    /// 从存储的 letter_grade 表加载
    pub fn load(store: &dyn Store) -> Result<Self> {
        let rows = store.query(
            "SELECT grade, letter FROM letter_grade ORDER BY grade DESC",
            &[],
        )?;

        let thresholds = rows
            .iter()
            .map(|row| -> Result<LetterThreshold> {
                Ok(LetterThreshold {
                    min_grade: row.real(0)?,
                    letter: row.text(1)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(thresholds)
    }

    /// 阈值列表（降序）
    pub fn thresholds(&self) -> &[LetterThreshold] {
        &self.thresholds
    }

    /// 分数对应的等级
    pub fn letter_for(&self, grade: f64) -> Result<&str> {
        self.thresholds
            .iter()
            .find(|t| t.min_grade <= grade)
            .map(|t| t.letter.as_str())
            .ok_or_else(|| {
                RegistrarError::Configuration(format!("没有阈值能匹配分数 {}", grade))
            })
    }
}

impl Default for GradeScale {
    /// (90,A) (80,B) (70,C) (60,D) (0,F)
    fn default() -> Self {
        Self {
            thresholds: vec![
                LetterThreshold::new(90.0, "A"),
                LetterThreshold::new(80.0, "B"),
                LetterThreshold::new(70.0, "C"),
                LetterThreshold::new(60.0, "D"),
                LetterThreshold::new(0.0, "F"),
            ],
        }
    }
}

/// 平均分（未取整）
pub fn gpa(grades: &[f64]) -> Result<f64> {
    if grades.is_empty() {
        return Err(RegistrarError::EmptyRecord);
    }
    Ok(grades.iter().sum::<f64>() / grades.len() as f64)
}

/// 四舍五入到指定小数位
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

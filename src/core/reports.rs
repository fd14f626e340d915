//! 报表引擎
//!
//! 成绩单、选课人数排行、成绩排行榜。
//! 排序的并列规则：
//! - 选课人数相同按课程代码升序
//! - 平均分相同时修课数多者在前，再按学号升序

use crate::core::error::{Result, StoreError};
use crate::core::grading::{gpa, round_to, GradeScale, AGGREGATE_PLACES, TRANSCRIPT_PLACES};
use crate::core::models::{CourseEnrollment, TopPerformer, TranscriptRow};
use crate::core::store::{Store, Value};
use serde::Serialize;
use std::collections::BTreeMap;

/// 学生成绩单
#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    pub student: String,
    /// 按学年升序
    pub rows: Vec<TranscriptRow>,
}

impl Transcript {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 平均分，保留两位小数；没有已评分记录时返回 `EmptyRecord`
    pub fn average(&self) -> Result<f64> {
        let grades: Vec<f64> = self.rows.iter().map(|r| r.grade).collect();
        gpa(&grades).map(|avg| round_to(avg, TRANSCRIPT_PLACES))
    }
}

/// 报表引擎
pub struct ReportEngine<'s> {
    store: &'s dyn Store,
    scale: GradeScale,
}

impl<'s> ReportEngine<'s> {
    pub fn new(store: &'s dyn Store, scale: GradeScale) -> Self {
        Self { store, scale }
    }

    /// 使用存储中的等级阈值表创建
    pub fn load(store: &'s dyn Store) -> Result<Self> {
        let scale = GradeScale::load(store)?;
        Ok(Self::new(store, scale))
    }

    /// 成绩单：学生所有已评分记录，按学年升序
    pub fn transcript(&self, student: &str) -> Result<Transcript> {
        let rows = self.store.query(
            "SELECT course, year, grade FROM student_course WHERE student = ?1 AND grade IS NOT NULL ORDER BY year, course",
            &[Value::from(student)],
        )?;

        let rows = rows
            .iter()
            .map(|row| -> Result<TranscriptRow> {
                let grade = row.real(2)?;
                let letter = match self.scale.letter_for(grade) {
                    Ok(letter) => Some(letter.to_string()),
                    Err(e) => {
                        tracing::debug!("{}: {} {}", e, student, grade);
                        None
                    }
                };
                Ok(TranscriptRow {
                    course: row.text(0)?,
                    year: row.year(1)?,
                    grade,
                    letter,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Transcript {
            student: student.to_string(),
            rows,
        })
    }

    /// 选课人数最多的前 n 门课程（含在读与已评分）
    pub fn most_enrolled_courses(&self, n: usize) -> Result<Vec<CourseEnrollment>> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let rows = self.store.query(
            r#"
            SELECT sc.course, c.name, COUNT(*) AS enrolled
            FROM student_course AS sc
            JOIN courses AS c ON c.moniker = sc.course
            GROUP BY sc.course, c.name
            ORDER BY enrolled DESC, sc.course ASC
            LIMIT ?1
            "#,
            &[Value::from(n)],
        )?;

        rows.iter()
            .map(|row| -> Result<CourseEnrollment> {
                Ok(CourseEnrollment {
                    course: row.text(0)?,
                    name: row.text(1)?,
                    enrolled: u64::try_from(row.integer(2)?).map_err(|_| StoreError::ColumnType {
                        index: 2,
                        expected: "INTEGER(count)",
                    })?,
                })
            })
            .collect()
    }

    /// 平均分最高的前 n 名学生，只统计已评分记录
    pub fn top_performers(&self, n: usize) -> Result<Vec<TopPerformer>> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let rows = self.store.query(
            r#"
            SELECT sc.student, s.first_name, s.last_name, sc.grade
            FROM student_course AS sc
            JOIN students AS s ON s.unix_id = sc.student
            WHERE sc.grade IS NOT NULL
            "#,
            &[],
        )?;

        // unix_id -> (first_name, last_name, grades)
        let mut by_student: BTreeMap<String, (String, String, Vec<f64>)> = BTreeMap::new();
        for row in &rows {
            let entry = by_student
                .entry(row.text(0)?)
                .or_insert_with(|| (String::new(), String::new(), Vec::new()));
            entry.0 = row.text(1)?;
            entry.1 = row.text(2)?;
            entry.2.push(row.real(3)?);
        }

        let mut performers = by_student
            .into_iter()
            .map(|(unix_id, (first_name, last_name, grades))| -> Result<TopPerformer> {
                let average = gpa(&grades)?;
                Ok(TopPerformer {
                    unix_id,
                    first_name,
                    last_name,
                    courses_taken: grades.len(),
                    average_grade: round_to(average, AGGREGATE_PLACES),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        performers.sort_by(|a, b| {
            b.average_grade
                .total_cmp(&a.average_grade)
                .then_with(|| b.courses_taken.cmp(&a.courses_taken))
                .then_with(|| a.unix_id.cmp(&b.unix_id))
        });
        performers.truncate(n);

        Ok(performers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::{Catalog, CatalogSeed};
    use crate::core::enrollment::EnrollmentLedger;
    use crate::core::error::RegistrarError;
    use crate::storage::database::SqliteStore;

    fn seeded() -> SqliteStore {
        let store = SqliteStore::open_in_memory(false).unwrap();
        Catalog::new(&store).seed(&CatalogSeed::default()).unwrap();
        store
    }

    #[test]
    fn test_transcript_ordered_with_letters() {
        let store = seeded();
        let ledger = EnrollmentLedger::new(&store);
        ledger.enroll("jd1", "CS304", 2024).unwrap();
        ledger.enroll("jd1", "CS101", 2023).unwrap();
        ledger.enroll("jd1", "MATH102", 2024).unwrap();
        ledger.set_grade("jd1", "CS304", 2024, 85.0).unwrap();
        ledger.set_grade("jd1", "CS101", 2023, 59.0).unwrap();

        let engine = ReportEngine::load(&store).unwrap();
        let transcript = engine.transcript("jd1").unwrap();

        let summary: Vec<_> = transcript
            .rows
            .iter()
            .map(|r| (r.course.as_str(), r.year, r.letter.as_deref()))
            .collect();
        assert_eq!(
            summary,
            vec![("CS101", 2023, Some("F")), ("CS304", 2024, Some("B"))]
        );
        assert_eq!(transcript.average().unwrap(), 72.0);
    }

    #[test]
    fn test_transcript_keeps_rows_below_lowest_floor() {
        let store = seeded();
        let ledger = EnrollmentLedger::new(&store);
        ledger.enroll("jd1", "CS101", 2023).unwrap();
        ledger.enroll("jd1", "MATH102", 2023).unwrap();
        ledger.set_grade("jd1", "CS101", 2023, 95.0).unwrap();
        ledger.set_grade("jd1", "MATH102", 2023, -5.0).unwrap();

        let engine = ReportEngine::load(&store).unwrap();
        let transcript = engine.transcript("jd1").unwrap();
        let letters: Vec<_> = transcript
            .rows
            .iter()
            .map(|r| (r.course.as_str(), r.letter.as_deref()))
            .collect();
        assert_eq!(letters, vec![("CS101", Some("A")), ("MATH102", None)]);
        assert_eq!(transcript.average().unwrap(), 45.0);

        assert_eq!(engine.top_performers(1).unwrap()[0].average_grade, 45.0);
    }

    #[test]
    fn test_empty_transcript() {
        let store = seeded();
        let engine = ReportEngine::load(&store).unwrap();
        let transcript = engine.transcript("ab1").unwrap();
        assert!(transcript.is_empty());
        assert!(matches!(
            transcript.average(),
            Err(RegistrarError::EmptyRecord)
        ));
    }

    #[test]
    fn test_most_enrolled() {
        let store = seeded();
        let ledger = EnrollmentLedger::new(&store);
        ledger.enroll("jd1", "CS101", 2023).unwrap();
        ledger.enroll("jd2", "CS101", 2023).unwrap();
        ledger.enroll("ab1", "ECON101", 2023).unwrap();

        let engine = ReportEngine::load(&store).unwrap();
        assert_eq!(
            engine.most_enrolled_courses(1).unwrap(),
            vec![CourseEnrollment {
                course: "CS101".into(),
                name: "Introduction to Computer Science".into(),
                enrolled: 2,
            }]
        );

        let all = engine.most_enrolled_courses(10).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].course, "ECON101");
        assert!(engine.most_enrolled_courses(0).unwrap().is_empty());
    }

    #[test]
    fn test_most_enrolled_ties_by_moniker() {
        let store = seeded();
        let ledger = EnrollmentLedger::new(&store);
        ledger.enroll("jd1", "MATH102", 2023).unwrap();
        ledger.enroll("jd1", "ECON101", 2023).unwrap();
        // 已评分记录同样计数
        ledger.set_grade("jd1", "ECON101", 2023, 70.0).unwrap();

        let engine = ReportEngine::load(&store).unwrap();
        let top = engine.most_enrolled_courses(2).unwrap();
        let monikers: Vec<_> = top.iter().map(|c| c.course.as_str()).collect();
        assert_eq!(monikers, vec!["ECON101", "MATH102"]);
    }

    #[test]
    fn test_top_performers() {
        let store = seeded();
        let ledger = EnrollmentLedger::new(&store);
        for (student, course, grade) in [
            ("jd1", "CS101", 80.0),
            ("jd1", "MATH102", 90.0),
            ("jd1", "ECON101", 100.0),
            ("jd2", "CS101", 95.0),
            ("sb1", "CS101", 90.0),
            ("sb1", "PE215", 90.0),
        ] {
            ledger.enroll(student, course, 2023).unwrap();
            ledger.set_grade(student, course, 2023, grade).unwrap();
        }
        // ab1 只有在读课程
        ledger.enroll("ab1", "CS101", 2024).unwrap();

        let engine = ReportEngine::load(&store).unwrap();
        let top = engine.top_performers(10).unwrap();
        let ids: Vec<_> = top.iter().map(|p| p.unix_id.as_str()).collect();
        // jd1 与 sb1 同为 90 分，jd1 修课更多
        assert_eq!(ids, vec!["jd2", "jd1", "sb1"]);
        assert_eq!(top[1].courses_taken, 3);
        assert_eq!(top[1].average_grade, 90.0);
        assert!(top.iter().all(|p| p.unix_id != "ab1"));

        assert_eq!(engine.top_performers(1).unwrap().len(), 1);
        assert!(engine.top_performers(0).unwrap().is_empty());
    }

    #[test]
    fn test_top_performer_average_rounded() {
        let store = seeded();
        let ledger = EnrollmentLedger::new(&store);
        for (course, grade) in [("CS101", 80.0), ("MATH102", 85.0), ("ECON101", 85.0)] {
            ledger.enroll("sb1", course, 2023).unwrap();
            ledger.set_grade("sb1", course, 2023, grade).unwrap();
        }

        let engine = ReportEngine::load(&store).unwrap();
        assert_eq!(engine.top_performers(1).unwrap()[0].average_grade, 83.333);
    }
}

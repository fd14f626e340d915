//! 选课台账
//!
//! 记录的生命周期：选课时成绩为空（在读），评分后变为已评分，
//! 重新评分直接覆盖。退课是硬删除，已评分的记录也会连同历史一起消失。

use crate::core::error::{RegistrarError, Result, StoreError};
use crate::core::models::{CurrentCourse, Enrollment, EnrollmentStatus};
use crate::core::store::{Store, Value};

/// 选课台账
pub struct EnrollmentLedger<'s> {
    store: &'s dyn Store,
}

impl<'s> EnrollmentLedger<'s> {
    pub fn new(store: &'s dyn Store) -> Self {
        Self { store }
    }

    /// 选课，成绩为空
    ///
    /// 相同 (student, course, year) 已存在时返回 `DuplicateEnrollment`，不做重试。
    pub fn enroll(&self, student: &str, course: &str, year: i32) -> Result<()> {
        self.store
            .execute(
                "INSERT INTO student_course(student, course, year) VALUES (?1, ?2, ?3)",
                &[student.into(), course.into(), year.into()],
            )
            .map_err(|e| {
                e.on_unique_violation(|| RegistrarError::DuplicateEnrollment {
                    student: student.to_string(),
                    course: course.to_string(),
                    year,
                })
            })?;

        tracing::info!("已选课: {} {} {}", student, course, year);
        Ok(())
    }

    /// 设置成绩，不校验分数范围
    ///
    /// NaN 与无穷大无法存入 REAL 列（NaN 会被存成 NULL），直接拒绝。
    pub fn set_grade(&self, student: &str, course: &str, year: i32, grade: f64) -> Result<()> {
        if !grade.is_finite() {
            return Err(StoreError::ConstraintViolation(format!("成绩不是有限值: {}", grade)).into());
        }

        let affected = self.store.execute(
            "UPDATE student_course SET grade = ?1 WHERE student = ?2 AND course = ?3 AND year = ?4",
            &[grade.into(), student.into(), course.into(), year.into()],
        )?;

        if affected == 0 {
            return Err(not_found(student, course, year));
        }

        tracing::info!("已评分: {} {} {} -> {}", student, course, year, grade);
        Ok(())
    }

    /// 退课（硬删除）
    pub fn unenroll(&self, student: &str, course: &str, year: i32) -> Result<()> {
        self.store.in_transaction(&mut |tx| {
            let ledger = EnrollmentLedger::new(tx);
            let existing = ledger
                .enrollment(student, course, year)?
                .ok_or_else(|| not_found(student, course, year))?;

            if let EnrollmentStatus::Graded(grade) = existing.status() {
                tracing::warn!(
                    "删除已评分的选课记录，成绩 {} 将丢失: {} {} {}",
                    grade,
                    student,
                    course,
                    year
                );
            }

            tx.execute(
                "DELETE FROM student_course WHERE student = ?1 AND course = ?2 AND year = ?3",
                &[student.into(), course.into(), year.into()],
            )?;
            Ok(())
        })?;

        tracing::info!("已退课: {} {} {}", student, course, year);
        Ok(())
    }

    /// 查找单条选课记录
    pub fn enrollment(&self, student: &str, course: &str, year: i32) -> Result<Option<Enrollment>> {
        let rows = self.store.query(
            "SELECT student, course, year, grade FROM student_course WHERE student = ?1 AND course = ?2 AND year = ?3",
            &[student.into(), course.into(), year.into()],
        )?;

        match rows.first() {
            Some(row) => Ok(Some(Enrollment {
                student: row.text(0)?,
                course: row.text(1)?,
                year: row.year(2)?,
                grade: row.optional_real(3)?,
            })),
            None => Ok(None),
        }
    }

    /// 学生当前在读（未评分）的课程
    pub fn current_courses(&self, student: &str) -> Result<Vec<CurrentCourse>> {
        let rows = self.store.query(
            "SELECT course, year FROM student_course WHERE student = ?1 AND grade IS NULL ORDER BY year, course",
            &[Value::from(student)],
        )?;

        rows.iter()
            .map(|row| -> Result<CurrentCourse> {
                Ok(CurrentCourse {
                    course: row.text(0)?,
                    year: row.year(1)?,
                })
            })
            .collect()
    }
}

fn not_found(student: &str, course: &str, year: i32) -> RegistrarError {
    RegistrarError::NotFound(format!("选课记录 {} / {} / {}", student, course, year))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::{Catalog, CatalogSeed};
    use crate::storage::database::SqliteStore;

    fn seeded() -> SqliteStore {
        let store = SqliteStore::open_in_memory(false).unwrap();
        Catalog::new(&store).seed(&CatalogSeed::default()).unwrap();
        store
    }

    fn current(ledger: &EnrollmentLedger, student: &str) -> Vec<(String, i32)> {
        ledger
            .current_courses(student)
            .unwrap()
            .into_iter()
            .map(|c| (c.course, c.year))
            .collect()
    }

    #[test]
    fn test_enroll_then_grade() {
        let store = seeded();
        let ledger = EnrollmentLedger::new(&store);

        ledger.enroll("jd1", "CS101", 2023).unwrap();
        assert_eq!(current(&ledger, "jd1"), vec![("CS101".to_string(), 2023)]);

        ledger.set_grade("jd1", "CS101", 2023, 91.0).unwrap();
        assert!(current(&ledger, "jd1").is_empty());

        let record = ledger.enrollment("jd1", "CS101", 2023).unwrap().unwrap();
        assert_eq!(record.status(), EnrollmentStatus::Graded(91.0));

        // 重新评分直接覆盖
        ledger.set_grade("jd1", "CS101", 2023, 75.0).unwrap();
        let record = ledger.enrollment("jd1", "CS101", 2023).unwrap().unwrap();
        assert_eq!(record.grade, Some(75.0));
    }

    #[test]
    fn test_duplicate_enroll_leaves_ledger_unchanged() {
        let store = seeded();
        let ledger = EnrollmentLedger::new(&store);

        ledger.enroll("jd1", "CS101", 2023).unwrap();
        let err = ledger.enroll("jd1", "CS101", 2023).unwrap_err();
        assert!(matches!(err, RegistrarError::DuplicateEnrollment { year: 2023, .. }));
        assert_eq!(current(&ledger, "jd1"), vec![("CS101".to_string(), 2023)]);

        // 不同学年是不同的记录
        ledger.enroll("jd1", "CS101", 2024).unwrap();
        assert_eq!(current(&ledger, "jd1").len(), 2);
    }

    #[test]
    fn test_set_grade_missing_record() {
        let store = seeded();
        let ledger = EnrollmentLedger::new(&store);
        assert!(matches!(
            ledger.set_grade("jd1", "CS101", 2023, 80.0),
            Err(RegistrarError::NotFound(_))
        ));
    }

    #[test]
    fn test_non_finite_grade_rejected() {
        let store = seeded();
        let ledger = EnrollmentLedger::new(&store);
        ledger.enroll("jd1", "CS101", 2023).unwrap();

        for grade in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = ledger.set_grade("jd1", "CS101", 2023, grade).unwrap_err();
            assert!(matches!(
                err,
                RegistrarError::Store(StoreError::ConstraintViolation(_))
            ));
        }

        // 记录保持在读状态
        assert_eq!(current(&ledger, "jd1"), vec![("CS101".to_string(), 2023)]);
        let record = ledger.enrollment("jd1", "CS101", 2023).unwrap().unwrap();
        assert_eq!(record.status(), EnrollmentStatus::Enrolled);

        // 负分仍然允许写入
        ledger.set_grade("jd1", "CS101", 2023, -5.0).unwrap();
        assert!(current(&ledger, "jd1").is_empty());
    }

    #[test]
    fn test_unenroll() {
        let store = seeded();
        let ledger = EnrollmentLedger::new(&store);

        assert!(matches!(
            ledger.unenroll("jd1", "CS101", 2023),
            Err(RegistrarError::NotFound(_))
        ));

        ledger.enroll("jd1", "CS101", 2023).unwrap();
        ledger.enroll("jd1", "MATH102", 2023).unwrap();
        ledger.set_grade("jd1", "MATH102", 2023, 66.0).unwrap();

        ledger.unenroll("jd1", "CS101", 2023).unwrap();
        ledger.unenroll("jd1", "MATH102", 2023).unwrap();
        assert!(current(&ledger, "jd1").is_empty());
        assert!(ledger.enrollment("jd1", "MATH102", 2023).unwrap().is_none());
    }

    #[test]
    fn test_enroll_unknown_student_is_store_error() {
        let store = seeded();
        let ledger = EnrollmentLedger::new(&store);
        let err = ledger.enroll("nobody", "CS101", 2023).unwrap_err();
        assert!(matches!(err, RegistrarError::Store(_)));
        assert!(current(&ledger, "nobody").is_empty());
    }
}

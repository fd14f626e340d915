//! 目录数据模块
//!
//! 学生、课程、等级阈值等静态参考数据的维护与查询，以及默认数据的批量导入。

use crate::core::error::{RegistrarError, Result};
use crate::core::grading::GradeScale;
use crate::core::models::{Course, LetterThreshold, Prerequisite, Student};
use crate::core::prerequisites::PrerequisiteGraph;
use crate::core::store::{Row, Store, Value};
use serde::{Deserialize, Serialize};

/// 目录数据访问
pub struct Catalog<'s> {
    store: &'s dyn Store,
}

impl<'s> Catalog<'s> {
    pub fn new(store: &'s dyn Store) -> Self {
        Self { store }
    }

    /// 添加学生
    pub fn add_student(&self, student: &Student) -> Result<()> {
        self.store
            .execute(
                "INSERT INTO students(first_name, last_name, unix_id) VALUES (?1, ?2, ?3)",
                &[
                    (&student.first_name).into(),
                    (&student.last_name).into(),
                    (&student.unix_id).into(),
                ],
            )
            .map_err(|e| {
                e.on_unique_violation(|| RegistrarError::DuplicateStudent(student.unix_id.clone()))
            })?;

        tracing::info!("已添加学生: {}", student.unix_id);
        Ok(())
    }

    /// 添加课程
    pub fn add_course(&self, course: &Course) -> Result<()> {
        self.store
            .execute(
                "INSERT INTO courses(moniker, name, department) VALUES (?1, ?2, ?3)",
                &[
                    (&course.moniker).into(),
                    (&course.name).into(),
                    (&course.department).into(),
                ],
            )
            .map_err(|e| {
                e.on_unique_violation(|| RegistrarError::DuplicateCourse(course.moniker.clone()))
            })?;

        tracing::info!("已添加课程: {}", course.moniker);
        Ok(())
    }

    /// 添加等级阈值
    pub fn add_letter_grade(&self, threshold: &LetterThreshold) -> Result<()> {
        self.store
            .execute(
                "INSERT INTO letter_grade(grade, letter) VALUES (?1, ?2)",
                &[threshold.min_grade.into(), (&threshold.letter).into()],
            )
            .map_err(|e| {
                e.on_unique_violation(|| {
                    RegistrarError::Configuration(format!(
                        "分数线 {} 或等级 {} 已存在",
                        threshold.min_grade, threshold.letter
                    ))
                })
            })?;
        Ok(())
    }

    /// 按姓氏模糊查找学生
    pub fn students_by_last_name(&self, fragment: &str) -> Result<Vec<Student>> {
        let pattern = format!("%{}%", fragment);
        let rows = self.store.query(
            "SELECT first_name, last_name, unix_id FROM students WHERE last_name LIKE ?1 ORDER BY unix_id",
            &[Value::from(pattern)],
        )?;
        rows.iter().map(student_from_row).collect()
    }

    /// 查找学生
    pub fn student(&self, unix_id: &str) -> Result<Option<Student>> {
        let rows = self.store.query(
            "SELECT first_name, last_name, unix_id FROM students WHERE unix_id = ?1",
            &[Value::from(unix_id)],
        )?;
        rows.first().map(student_from_row).transpose()
    }

    /// 按院系列出课程
    pub fn courses_by_department(&self, department: &str) -> Result<Vec<Course>> {
        let rows = self.store.query(
            "SELECT moniker, name, department FROM courses WHERE department = ?1 ORDER BY moniker",
            &[Value::from(department)],
        )?;

        rows.iter()
            .map(|row| -> Result<Course> {
                Ok(Course {
                    moniker: row.text(0)?,
                    name: row.text(1)?,
                    department: row.text(2)?,
                })
            })
            .collect()
    }

    /// 加载等级阈值表
    pub fn grade_scale(&self) -> Result<GradeScale> {
        GradeScale::load(self.store)
    }

    /// 在单个事务中导入目录数据，任一条失败则整体回滚
    pub fn seed(&self, seed: &CatalogSeed) -> Result<()> {
        // 先校验阈值表，避免写入后才发现配置错误
        GradeScale::new(seed.letter_grades.clone())?;

        self.store.in_transaction(&mut |tx| {
            let catalog = Catalog::new(tx);
            for student in &seed.students {
                catalog.add_student(student)?;
            }
            for course in &seed.courses {
                catalog.add_course(course)?;
            }

            let graph = PrerequisiteGraph::new(tx);
            for edge in &seed.prerequisites {
                graph.add_prerequisite(&edge.course, &edge.prereq, edge.min_grade)?;
            }

            for threshold in &seed.letter_grades {
                catalog.add_letter_grade(threshold)?;
            }
            Ok(())
        })?;

        tracing::info!(
            "目录数据导入完成: {} 名学生, {} 门课程, {} 条先修关系, {} 个等级",
            seed.students.len(),
            seed.courses.len(),
            seed.prerequisites.len(),
            seed.letter_grades.len()
        );
        Ok(())
    }
}

fn student_from_row(row: &Row) -> Result<Student> {
    Ok(Student {
        first_name: row.text(0)?,
        last_name: row.text(1)?,
        unix_id: row.text(2)?,
    })
}

/// 批量导入的目录数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSeed {
    pub students: Vec<Student>,
    pub courses: Vec<Course>,
    pub prerequisites: Vec<Prerequisite>,
    pub letter_grades: Vec<LetterThreshold>,
}

impl Default for CatalogSeed {
    fn default() -> Self {
        Self {
            students: vec![
                Student::new("John", "Doe", "jd1"),
                Student::new("Jane", "Doe", "jd2"),
                Student::new("Andy", "Bek", "ab1"),
                Student::new("Sonya", "Barzel", "sb1"),
            ],
            courses: vec![
                Course::new("CS101", "Introduction to Computer Science", "Computer Science"),
                Course::new("CS304", "Data Structures", "Computer Science"),
                Course::new("ECON101", "Introduction to Economics", "Economics"),
                Course::new("ECON255", "Econometrics", "Economics"),
                Course::new("MATH102", "Statistical Methods", "Mathematics"),
                Course::new("MATH201", "Linear Algebra", "Mathematics"),
                Course::new("MATH209", "Discrete Mathematics", "Mathematics"),
                Course::new("CS301", "Design and Analysis of Algorithm", "Computer Science"),
                Course::new("PE215", "Operations Research", "Production"),
                Course::new("PE312", "Logistics & Supply Chain Management", "Production"),
            ],
            prerequisites: vec![
                Prerequisite::new("ECON255", "ECON101", 50.0),
                Prerequisite::new("CS304", "CS101", 60.0),
                Prerequisite::new("CS304", "MATH209", 50.0),
                Prerequisite::new("MATH209", "MATH102", 50.0),
                Prerequisite::new("PE312", "PE215", 60.0),
                Prerequisite::new("CS301", "CS101", 60.0),
                Prerequisite::new("CS301", "MATH209", 60.0),
                Prerequisite::new("CS301", "MATH201", 60.0),
            ],
            letter_grades: GradeScale::default().thresholds().to_vec(),
        }
    }
}

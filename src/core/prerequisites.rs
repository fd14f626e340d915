//! 先修关系图
//!
//! 边 course -> prereq 表示修读 course 前需要在 prereq 中达到最低分。
//! 只处理直接先修，不计算传递闭包，也不检查学生是否满足先修条件。
//!
//! 先修关系必须无环：插入时会拒绝自环和会闭合成环的边。

use crate::core::error::{RegistrarError, Result};
use crate::core::models::Prerequisite;
use crate::core::store::{Store, Value};
use std::collections::{BTreeMap, HashSet};

/// 先修关系图
pub struct PrerequisiteGraph<'s> {
    store: &'s dyn Store,
}

impl<'s> PrerequisiteGraph<'s> {
    pub fn new(store: &'s dyn Store) -> Self {
        Self { store }
    }

    /// 添加先修关系
    ///
    /// 已存在相同 (course, prereq) 时返回 `DuplicateEdge`，不会覆盖最低分；
    /// 需要修改时先删除再添加。
    pub fn add_prerequisite(&self, course: &str, prereq: &str, min_grade: f64) -> Result<()> {
        if course == prereq || self.reaches(prereq, course)? {
            return Err(RegistrarError::CyclicPrerequisite {
                course: course.to_string(),
                prereq: prereq.to_string(),
            });
        }

        self.store
            .execute(
                "INSERT INTO prerequisites(course, prereq, min_grade) VALUES (?1, ?2, ?3)",
                &[course.into(), prereq.into(), min_grade.into()],
            )
            .map_err(|e| {
                e.on_unique_violation(|| RegistrarError::DuplicateEdge {
                    course: course.to_string(),
                    prereq: prereq.to_string(),
                })
            })?;

        tracing::info!("已添加先修关系: {} -> {} (最低分 {})", course, prereq, min_grade);
        Ok(())
    }

    /// 删除先修关系
    pub fn remove_prerequisite(&self, course: &str, prereq: &str) -> Result<()> {
        let affected = self.store.execute(
            "DELETE FROM prerequisites WHERE course = ?1 AND prereq = ?2",
            &[course.into(), prereq.into()],
        )?;
        if affected == 0 {
            return Err(RegistrarError::NotFound(format!("先修关系 {} -> {}", course, prereq)));
        }
        tracing::info!("已删除先修关系: {} -> {}", course, prereq);
        Ok(())
    }

    /// 课程的直接先修（按先修课程代码升序）
    pub fn prerequisites_of(&self, course: &str) -> Result<Vec<Prerequisite>> {
        let rows = self.store.query(
            "SELECT course, prereq, min_grade FROM prerequisites WHERE course = ?1 ORDER BY prereq",
            &[Value::from(course)],
        )?;

        rows.iter()
            .map(|row| -> Result<Prerequisite> {
                Ok(Prerequisite {
                    course: row.text(0)?,
                    prereq: row.text(1)?,
                    min_grade: row.real(2)?,
                })
            })
            .collect()
    }

    /// 查找已存储数据中的环，返回环上的课程序列（首尾相同）
    pub fn find_cycle(&self) -> Result<Option<Vec<String>>> {
        let edges = self.load_edges()?;
        let mut done = HashSet::new();

        for start in edges.keys() {
            let mut path = Vec::new();
            let mut visiting = HashSet::new();
            if let Some(cycle) = dfs_cycle(start, &edges, &mut visiting, &mut done, &mut path) {
                tracing::warn!("发现先修环: {}", cycle.join(" -> "));
                return Ok(Some(cycle));
            }
        }

        Ok(None)
    }

    /// `from` 能否沿先修边到达 `to`
    fn reaches(&self, from: &str, to: &str) -> Result<bool> {
        let edges = self.load_edges()?;
        let mut stack = vec![from];
        let mut seen = HashSet::new();

        while let Some(node) = stack.pop() {
            if node == to {
                return Ok(true);
            }
            if !seen.insert(node) {
                continue;
            }
            if let Some(next) = edges.get(node) {
                stack.extend(next.iter().map(String::as_str));
            }
        }

        Ok(false)
    }

    fn load_edges(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let rows = self
            .store
            .query("SELECT course, prereq FROM prerequisites ORDER BY course, prereq", &[])?;

        let mut edges: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for row in &rows {
            edges.entry(row.text(0)?).or_default().push(row.text(1)?);
        }
        Ok(edges)
    }
}

fn dfs_cycle(
    node: &str,
    edges: &BTreeMap<String, Vec<String>>,
    visiting: &mut HashSet<String>,
    done: &mut HashSet<String>,
    path: &mut Vec<String>,
) -> Option<Vec<String>> {
    if done.contains(node) {
        return None;
    }
    if visiting.contains(node) {
        let start = path.iter().position(|n| n == node).unwrap_or(0);
        let mut cycle = path[start..].to_vec();
        cycle.push(node.to_string());
        return Some(cycle);
    }

    visiting.insert(node.to_string());
    path.push(node.to_string());

    for next in edges.get(node).into_iter().flatten() {
        if let Some(cycle) = dfs_cycle(next, edges, visiting, done, path) {
            return Some(cycle);
        }
    }

    path.pop();
    visiting.remove(node);
    done.insert(node.to_string());
    None
}

//! 数据库存储模块
//!
//! 使用SQLite实现持久化接口，保存学生、课程、先修关系、等级阈值和选课记录

use crate::core::error::{RegistrarError, Result, StoreError};
use crate::core::store::{Row, Store, TransactionWork, Value};
use crate::storage::config::RegistrarConfig;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ErrorCode, ToSql};
use std::path::Path;

/// 建表语句
const SCHEMA: &str = r#"
    -- 学生表
    CREATE TABLE IF NOT EXISTS students (
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        unix_id TEXT NOT NULL PRIMARY KEY
    );

    -- 课程表
    CREATE TABLE IF NOT EXISTS courses (
        moniker TEXT NOT NULL PRIMARY KEY,
        name TEXT NOT NULL,
        department TEXT NOT NULL
    );

    -- 先修关系表
    CREATE TABLE IF NOT EXISTS prerequisites (
        course TEXT NOT NULL REFERENCES courses(moniker),
        prereq TEXT NOT NULL REFERENCES courses(moniker),
        min_grade REAL NOT NULL,
        PRIMARY KEY (course, prereq)
    );

    -- 等级阈值表
    CREATE TABLE IF NOT EXISTS letter_grade (
        grade REAL NOT NULL PRIMARY KEY,
        letter TEXT NOT NULL UNIQUE
    );

    -- 选课表
    CREATE TABLE IF NOT EXISTS student_course (
        student TEXT NOT NULL REFERENCES students(unix_id),
        course TEXT NOT NULL REFERENCES courses(moniker),
        year INTEGER NOT NULL,
        grade REAL,
        PRIMARY KEY (student, course, year)
    );

    -- 创建索引
    CREATE INDEX IF NOT EXISTS idx_student_course_course ON student_course(course);
    CREATE INDEX IF NOT EXISTS idx_students_last_name ON students(last_name);
    CREATE INDEX IF NOT EXISTS idx_courses_department ON courses(department);
"#;

/// 按外键依赖逆序删除
const DROP_SCHEMA: &str = r#"
    DROP TABLE IF EXISTS student_course;
    DROP TABLE IF EXISTS prerequisites;
    DROP TABLE IF EXISTS letter_grade;
    DROP TABLE IF EXISTS courses;
    DROP TABLE IF EXISTS students;
"#;

/// SQLite 存储
pub struct SqliteStore {
    conn: Connection,
    verbose: bool,
}

impl SqliteStore {
    /// 按配置打开或创建数据库
    pub fn open(config: &RegistrarConfig) -> Result<Self> {
        Self::open_path(&config.database, config.verbose)
    }

    /// 打开或创建数据库文件
    pub fn open_path(path: &Path, verbose: bool) -> Result<Self> {
        // 确保目录存在
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(backend)?;
        }

        let conn = Connection::open(path).map_err(StoreError::from)?;
        let store = Self::init(conn, verbose)?;
        if verbose {
            tracing::info!("已连接数据库: {}", path.display());
        }
        Ok(store)
    }

    /// 内存数据库，主要用于测试
    pub fn open_in_memory(verbose: bool) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StoreError::from)?;
        Self::init(conn, verbose)
    }

    fn init(conn: Connection, verbose: bool) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)
            .map_err(StoreError::from)?;
        let store = Self { conn, verbose };
        store.execute_batch(SCHEMA)?;
        Ok(store)
    }

    /// 删除并重建所有表
    pub fn reset(&self) -> Result<()> {
        self.in_transaction(&mut |tx| {
            tx.execute_batch(DROP_SCHEMA)?;
            tx.execute_batch(SCHEMA)
        })?;
        tracing::info!("数据库已重置");
        Ok(())
    }

    fn handle(&self) -> Handle<'_> {
        Handle {
            conn: &self.conn,
            verbose: self.verbose,
            in_transaction: false,
        }
    }
}

impl Store for SqliteStore {
    fn execute(&self, statement: &str, params: &[Value]) -> Result<usize> {
        self.handle().execute(statement, params)
    }

    fn query(&self, statement: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.handle().query(statement, params)
    }

    fn execute_batch(&self, statements: &str) -> Result<()> {
        self.handle().execute_batch(statements)
    }

    fn in_transaction(&self, work: &mut TransactionWork<'_>) -> Result<()> {
        self.handle().in_transaction(work)
    }
}

/// 对连接（或事务中的连接）的借用
struct Handle<'c> {
    conn: &'c Connection,
    verbose: bool,
    in_transaction: bool,
}

impl Handle<'_> {
    fn trace(&self, statement: &str) {
        let statement = statement.split_whitespace().collect::<Vec<_>>().join(" ");
        if self.verbose {
            tracing::info!("执行: {}", statement);
        } else {
            tracing::debug!("执行: {}", statement);
        }
    }
}

impl Store for Handle<'_> {
    fn execute(&self, statement: &str, params: &[Value]) -> Result<usize> {
        self.trace(statement);
        let affected = self
            .conn
            .execute(statement, params_from_iter(params.iter()))
            .map_err(StoreError::from)?;
        Ok(affected)
    }

    fn query(&self, statement: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.trace(statement);
        let mut stmt = self.conn.prepare(statement).map_err(StoreError::from)?;
        let width = stmt.column_count();

        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(Value::from))
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map(Row::new)
            })
            .map_err(StoreError::from)?;

        let rows = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::from)?;
        Ok(rows)
    }

    fn execute_batch(&self, statements: &str) -> Result<()> {
        self.trace(statements);
        self.conn.execute_batch(statements).map_err(StoreError::from)?;
        Ok(())
    }

    fn in_transaction(&self, work: &mut TransactionWork<'_>) -> Result<()> {
        if self.in_transaction {
            return work(self);
        }

        let tx = self.conn.unchecked_transaction().map_err(StoreError::from)?;
        let scoped = Handle {
            conn: &tx,
            verbose: self.verbose,
            in_transaction: true,
        };

        match work(&scoped) {
            Ok(()) => {
                tx.commit().map_err(StoreError::from)?;
                Ok(())
            }
            Err(e) => {
                // tx 被丢弃时自动回滚
                tracing::warn!("事务已回滚: {}", e);
                Err(e)
            }
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Integer(i) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Owned(rusqlite::types::Value::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(v: ValueRef<'_>) -> Self {
        match v {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) | ValueRef::Blob(t) => {
                Value::Text(String::from_utf8_lossy(t).into_owned())
            }
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, message) = &err {
            if failure.code == ErrorCode::ConstraintViolation {
                let detail = message.clone().unwrap_or_else(|| failure.to_string());
                return match failure.extended_code {
                    rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE => StoreError::UniqueViolation(detail),
                    rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                        StoreError::ForeignKeyViolation(detail)
                    }
                    _ => StoreError::ConstraintViolation(detail),
                };
            }
        }
        StoreError::Backend(Box::new(err))
    }
}

fn backend(err: std::io::Error) -> RegistrarError {
    StoreError::Backend(Box::new(err)).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_database_init() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("registrar.db");

        let store = SqliteStore::open_path(&db_path, true).unwrap();
        assert!(db_path.exists());

        let tables = store
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                &[],
            )
            .unwrap();
        let names: Vec<_> = tables.iter().map(|r| r.text(0).unwrap()).collect();
        assert_eq!(
            names,
            vec!["courses", "letter_grade", "prerequisites", "student_course", "students"]
        );
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("registrar.db");
        {
            let store = SqliteStore::open_path(&db_path, false).unwrap();
            store
                .execute(
                    "INSERT INTO students(first_name, last_name, unix_id) VALUES (?1, ?2, ?3)",
                    &["Jane".into(), "Doe".into(), "jd2".into()],
                )
                .unwrap();
        }
        let store = SqliteStore::open_path(&db_path, false).unwrap();
        let rows = store.query("SELECT unix_id FROM students", &[]).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_constraint_classification() {
        let store = SqliteStore::open_in_memory(false).unwrap();
        let insert = "INSERT INTO courses(moniker, name, department) VALUES (?1, ?2, ?3)";
        store
            .execute(insert, &["CS101".into(), "Intro".into(), "CS".into()])
            .unwrap();

        let dup = store
            .execute(insert, &["CS101".into(), "Intro".into(), "CS".into()])
            .unwrap_err();
        assert!(matches!(dup, RegistrarError::Store(StoreError::UniqueViolation(_))));

        let fk = store
            .execute(
                "INSERT INTO student_course(student, course, year) VALUES (?1, ?2, ?3)",
                &["ghost".into(), "CS101".into(), 2023.into()],
            )
            .unwrap_err();
        assert!(matches!(fk, RegistrarError::Store(StoreError::ForeignKeyViolation(_))));

        let not_null = store
            .execute(insert, &["CS102".into(), Value::Null, "CS".into()])
            .unwrap_err();
        assert!(matches!(not_null, RegistrarError::Store(StoreError::ConstraintViolation(_))));

        let syntax = store.query("SELEC nothing", &[]).unwrap_err();
        assert!(matches!(syntax, RegistrarError::Store(StoreError::Backend(_))));
    }

    #[test]
    fn test_transaction_commit_and_rollback() {
        let store = SqliteStore::open_in_memory(false).unwrap();
        let insert = "INSERT INTO courses(moniker, name, department) VALUES (?1, 'n', 'd')";

        store
            .in_transaction(&mut |tx| {
                tx.execute(insert, &["A".into()])?;
                // 嵌套调用加入外层事务
                tx.in_transaction(&mut |inner| {
                    inner.execute(insert, &["B".into()])?;
                    Ok(())
                })
            })
            .unwrap();

        let result = store.in_transaction(&mut |tx| {
            tx.execute(insert, &["C".into()])?;
            tx.execute(insert, &["A".into()])?;
            Ok(())
        });
        assert!(result.is_err());

        let rows = store
            .query("SELECT moniker FROM courses ORDER BY moniker", &[])
            .unwrap();
        let monikers: Vec<_> = rows.iter().map(|r| r.text(0).unwrap()).collect();
        assert_eq!(monikers, vec!["A", "B"]);
    }

    #[test]
    fn test_reset_clears_data() {
        let store = SqliteStore::open_in_memory(false).unwrap();
        store
            .execute(
                "INSERT INTO courses(moniker, name, department) VALUES ('A', 'n', 'd')",
                &[],
            )
            .unwrap();
        store.reset().unwrap();
        assert!(store.query("SELECT * FROM courses", &[]).unwrap().is_empty());
    }
}

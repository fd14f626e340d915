//! 命令行入口
//!
//! 只负责参数解析、课程代码规范化和结果输出，业务逻辑全部委托给 core。

pub mod commands;
pub mod table;

use crate::core::catalog::{Catalog, CatalogSeed};
use crate::core::enrollment::EnrollmentLedger;
use crate::core::models::{canonical_moniker, Course, Student};
use crate::core::prerequisites::PrerequisiteGraph;
use crate::core::error::RegistrarError;
use crate::core::reports::ReportEngine;
use crate::storage::config::{ConfigManager, RegistrarConfig};
use crate::storage::database::SqliteStore;
use anyhow::Result;
use chrono::Datelike;
use clap::Parser;
use commands::{Commands, ConfigAction, EnrollmentArgs, LimitArgs};
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use table::Table;

/// 教务记录管理
#[derive(Parser, Debug)]
#[command(name = "registrar", version, about = "学生、课程、选课与成绩管理")]
pub struct Cli {
    /// 配置文件路径
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// 数据库文件路径（覆盖配置与环境变量）
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// 记录每条执行的语句
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 以JSON输出查询结果
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// 合并配置文件、环境变量和命令行参数
    pub fn resolve_config(&self) -> Result<RegistrarConfig> {
        let mut config = self.config_manager().load()?.with_env_overrides();
        if let Some(database) = &self.database {
            config.database = database.clone();
        }
        if self.verbose {
            config.verbose = true;
        }
        Ok(config)
    }

    fn config_manager(&self) -> ConfigManager {
        ConfigManager::new(self.config.clone().unwrap_or_else(ConfigManager::default_path))
    }

    pub fn run(self, config: RegistrarConfig) -> Result<()> {
        let out = Output { json: self.json };

        // 配置命令不需要打开数据库
        if let Commands::Config(action) = &self.command {
            let manager = self.config_manager();
            match action {
                ConfigAction::Show => out.print_json(&config)?,
                ConfigAction::Save => {
                    manager.save(&config)?;
                    out.success();
                }
                ConfigAction::Reset => {
                    manager.reset()?;
                    out.success();
                }
            }
            return Ok(());
        }

        let store = SqliteStore::open(&config)?;

        match self.command {
            Commands::AddStudent {
                first_name,
                last_name,
                unix_id,
            } => {
                Catalog::new(&store).add_student(&Student {
                    first_name,
                    last_name,
                    unix_id,
                })?;
                out.success();
            }
            Commands::AddCourse {
                moniker,
                name,
                department,
            } => {
                Catalog::new(&store).add_course(&Course {
                    moniker: canonical_moniker(&moniker),
                    name,
                    department,
                })?;
                out.success();
            }
            Commands::AddPrereq {
                course,
                prereq,
                min_grade,
            } => {
                PrerequisiteGraph::new(&store).add_prerequisite(
                    &canonical_moniker(&course),
                    &canonical_moniker(&prereq),
                    min_grade,
                )?;
                out.success();
            }
            Commands::RemovePrereq { course, prereq } => {
                PrerequisiteGraph::new(&store)
                    .remove_prerequisite(&canonical_moniker(&course), &canonical_moniker(&prereq))?;
                out.success();
            }
            Commands::ShowPrereqs { course } => {
                let prereqs =
                    PrerequisiteGraph::new(&store).prerequisites_of(&canonical_moniker(&course))?;
                out.rows(&prereqs, &["先修课程", "最低分"], |p| {
                    vec![p.prereq.clone(), p.min_grade.to_string()]
                })?;
            }
            Commands::CheckPrereqs => match PrerequisiteGraph::new(&store).find_cycle()? {
                Some(cycle) => println!("发现先修环: {}", cycle.join(" -> ")),
                None => println!("先修关系无环"),
            },
            Commands::ShowStudents { last_name } => {
                let students = Catalog::new(&store).students_by_last_name(&last_name)?;
                out.rows(&students, &["名", "姓", "学号"], |s| {
                    vec![s.first_name.clone(), s.last_name.clone(), s.unix_id.clone()]
                })?;
            }
            Commands::ShowCourses { department } => {
                let courses = Catalog::new(&store).courses_by_department(&department)?;
                out.rows(&courses, &["课程代码", "名称", "院系"], |c| {
                    vec![c.moniker.clone(), c.name.clone(), c.department.clone()]
                })?;
            }
            Commands::Enroll(EnrollmentArgs {
                student,
                course,
                year,
            }) => {
                EnrollmentLedger::new(&store).enroll(
                    &student,
                    &canonical_moniker(&course),
                    year.unwrap_or_else(current_year),
                )?;
                out.success();
            }
            Commands::Grade {
                student,
                course,
                grade,
                year,
            } => {
                EnrollmentLedger::new(&store).set_grade(
                    &student,
                    &canonical_moniker(&course),
                    year.unwrap_or_else(current_year),
                    grade,
                )?;
                out.success();
            }
            Commands::Unenroll(EnrollmentArgs {
                student,
                course,
                year,
            }) => {
                EnrollmentLedger::new(&store).unenroll(
                    &student,
                    &canonical_moniker(&course),
                    year.unwrap_or_else(current_year),
                )?;
                out.success();
            }
            Commands::CurrentCourses { student } => {
                let courses = EnrollmentLedger::new(&store).current_courses(&student)?;
                out.rows(&courses, &["课程", "学年"], |c| {
                    vec![c.course.clone(), c.year.to_string()]
                })?;
            }
            Commands::Transcript { student } => {
                let transcript = ReportEngine::load(&store)?.transcript(&student)?;
                if out.json {
                    out.print_json(&transcript)?;
                } else {
                    if let Some(s) = Catalog::new(&store).student(&student)? {
                        println!("成绩单: {} {} ({})", s.first_name, s.last_name, s.unix_id);
                    }
                    out.rows(&transcript.rows, &["课程", "学年", "成绩", "等级"], |r| {
                        vec![
                            r.course.clone(),
                            r.year.to_string(),
                            r.grade.to_string(),
                            r.letter.clone().unwrap_or_else(|| "-".to_string()),
                        ]
                    })?;
                    match transcript.average() {
                        Ok(avg) => println!("平均GPA: {:.2}", avg),
                        Err(e) => match describe_empty(&e) {
                            Some(msg) => println!("{}", msg),
                            None => return Err(e.into()),
                        },
                    }
                }
            }
            Commands::MostEnrolled(LimitArgs { limit }) => {
                let courses = ReportEngine::load(&store)?
                    .most_enrolled_courses(limit.unwrap_or(config.default_limit))?;
                out.rows(&courses, &["课程", "名称", "选课人数"], |c| {
                    vec![c.course.clone(), c.name.clone(), c.enrolled.to_string()]
                })?;
            }
            Commands::TopStudents(LimitArgs { limit }) => {
                let students = ReportEngine::load(&store)?
                    .top_performers(limit.unwrap_or(config.default_limit))?;
                out.rows(&students, &["学号", "名", "姓", "课程数", "平均分"], |p| {
                    vec![
                        p.unix_id.clone(),
                        p.first_name.clone(),
                        p.last_name.clone(),
                        p.courses_taken.to_string(),
                        format!("{:.3}", p.average_grade),
                    ]
                })?;
            }
            // 已在打开数据库前处理
            Commands::Config(_) => {}
            Commands::ResetDatabase { yes, no_data } => {
                if !yes && !confirm("将删除所有数据，确定继续吗？(y/n): ")? {
                    println!("已取消重置");
                    return Ok(());
                }
                store.reset()?;
                println!("数据库已重置");
                if !no_data {
                    Catalog::new(&store).seed(&CatalogSeed::default())?;
                    println!("默认数据已导入");
                }
            }
        }

        Ok(())
    }
}

/// 查询结果的输出方式
struct Output {
    json: bool,
}

impl Output {
    fn success(&self) {
        if !self.json {
            println!("成功");
        }
    }

    fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    fn rows<T: Serialize>(
        &self,
        items: &[T],
        headers: &[&str],
        cells: impl Fn(&T) -> Vec<String>,
    ) -> Result<()> {
        if self.json {
            return self.print_json(items);
        }
        let mut table = Table::new(headers);
        for item in items {
            table.push(cells(item));
        }
        print!("{}", table);
        Ok(())
    }
}

/// 成绩单为空时的提示文本
fn describe_empty(err: &RegistrarError) -> Option<&'static str> {
    match err {
        RegistrarError::EmptyRecord => Some("暂无已评分记录"),
        _ => None,
    }
}

fn current_year() -> i32 {
    chrono::Local::now().year()
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

//! 子命令与参数定义

use clap::{Args, Subcommand};

/// 所有子命令
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 添加学生
    AddStudent {
        first_name: String,
        last_name: String,
        unix_id: String,
    },

    /// 添加课程
    AddCourse {
        moniker: String,
        name: String,
        department: String,
    },

    /// 添加先修关系
    AddPrereq {
        course: String,
        prereq: String,
        min_grade: f64,
    },

    /// 删除先修关系（修改最低分需先删除再添加）
    RemovePrereq { course: String, prereq: String },

    /// 查看课程的直接先修
    ShowPrereqs { course: String },

    /// 检查先修关系中是否存在环
    CheckPrereqs,

    /// 按姓氏查找学生
    ShowStudents { last_name: String },

    /// 按院系列出课程
    ShowCourses { department: String },

    /// 选课
    Enroll(EnrollmentArgs),

    /// 登记成绩
    Grade {
        student: String,
        course: String,
        grade: f64,
        /// 学年，默认当前年份
        #[arg(long)]
        year: Option<i32>,
    },

    /// 退课（删除记录，已评分的成绩也会丢失）
    Unenroll(EnrollmentArgs),

    /// 学生当前在读课程
    CurrentCourses { student: String },

    /// 学生成绩单
    Transcript { student: String },

    /// 选课人数最多的课程
    MostEnrolled(LimitArgs),

    /// 平均分最高的学生
    TopStudents(LimitArgs),

    /// 查看或保存配置
    #[command(subcommand)]
    Config(ConfigAction),

    /// 重建数据库
    ResetDatabase {
        /// 跳过确认
        #[arg(long)]
        yes: bool,
        /// 只建表，不导入默认数据
        #[arg(long)]
        no_data: bool,
    },
}

/// 配置子命令
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// 显示生效的配置（已合并环境变量与命令行参数）
    Show,
    /// 把生效的配置写入配置文件
    Save,
    /// 恢复默认配置
    Reset,
}

/// 选课与退课共用的参数
#[derive(Args, Debug)]
pub struct EnrollmentArgs {
    pub student: String,
    pub course: String,
    /// 学年，默认当前年份
    #[arg(long)]
    pub year: Option<i32>,
}

/// 排行榜条数
#[derive(Args, Debug)]
pub struct LimitArgs {
    /// 返回条数，默认取配置中的 default_limit
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

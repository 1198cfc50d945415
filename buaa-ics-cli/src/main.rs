mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "buaa-ics")]
#[command(about = "北航课程表导出工具")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 启用详细日志
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// 获取课程表并生成ICS文件
    Generate {
        /// 统一认证用户名/学号
        #[arg(short, long)]
        username: String,

        /// 密码
        #[arg(short = 'P', long)]
        password: String,

        /// 学年（格式：YYYY-YYYY，如 2024-2025）
        #[arg(short, long)]
        year: Option<String>,

        /// 学期（1 或 2）
        #[arg(short, long)]
        term: Option<u8>,

        /// 输出文件路径
        #[arg(short, long)]
        output: Option<String>,

        /// 日历名称
        #[arg(long)]
        calendar_name: Option<String>,

        /// 提醒时间（分钟）
        #[arg(long, default_value = "30")]
        reminder_minutes: u32,
    },

    /// 验证用户凭据
    Validate {
        /// 统一认证用户名/学号
        #[arg(short, long)]
        username: String,

        /// 密码
        #[arg(short = 'P', long)]
        password: String,
    },

    /// 以JSON输出某一周的课程
    Week {
        /// 统一认证用户名/学号
        #[arg(short, long)]
        username: String,

        /// 密码
        #[arg(short = 'P', long)]
        password: String,

        /// 周次
        #[arg(short, long)]
        week: u32,

        /// 学年（格式：YYYY-YYYY）
        #[arg(short, long)]
        year: Option<String>,

        /// 学期（1 或 2）
        #[arg(short, long)]
        term: Option<u8>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 设置日志级别
    let log_level = if cli.verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("buaa_ics_cli={log_level},buaa_ics_core={log_level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Generate {
            username,
            password,
            year,
            term,
            output,
            calendar_name,
            reminder_minutes,
        } => {
            commands::generate_command(commands::GenerateParams {
                username,
                password,
                year,
                term,
                output,
                calendar_name,
                reminder_minutes,
            })
            .await
        }

        Commands::Validate { username, password } => {
            commands::validate_command(username, password).await
        }

        Commands::Week {
            username,
            password,
            week,
            year,
            term,
        } => commands::week_command(username, password, week, year, term).await,
    }
}

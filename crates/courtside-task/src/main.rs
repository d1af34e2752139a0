use std::env;
use std::error::Error;
use std::fs;
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing_appender::{non_blocking, rolling::never};
use tracing_subscriber::{EnvFilter, fmt::layer, layer::SubscriberExt, util::SubscriberInitExt};

use courtside_core::{AppCache, DataSource, create_connection};

mod main_dashboard;
mod metrics;
mod pipeline;
mod player_comparison;
mod position_analysis;
mod sink;
mod source;
mod team_summary;
#[cfg(test)]
mod testing;
mod tiers;
mod value_analysis;

use pipeline::Dataset;

/// 统一的任务配置（<task_dir>/config.json）
#[derive(Debug, Deserialize)]
pub struct TaskConfig {
    pub task_id: String,
    #[serde(default)]
    pub created_at: Option<String>,

    /// 已保存数据源的 id 与内联数据源二选一
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub source: Option<DataSource>,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_batch_size")]
    pub batch: usize,

    #[serde(default = "default_stats_table")]
    pub stats_table: String,
    #[serde(default = "default_salary_table")]
    pub salary_table: String,

    /// 只输出这些赛季；缺省为全部
    #[serde(default)]
    pub seasons: Option<Vec<String>>,
    /// 只生成这些数据集；缺省为全部
    #[serde(default)]
    pub datasets: Option<Vec<Dataset>>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_delimiter() -> String {
    ",".into()
}

fn default_batch_size() -> usize {
    1000
}

fn default_stats_table() -> String {
    "player_merged_stats".into()
}

fn default_salary_table() -> String {
    "player_salaries".into()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("source_id 与 source 必须且只能配置一个")]
    SourceChoice,
    #[error("delimiter 必须是单个 ASCII 字符: {0:?}")]
    Delimiter(String),
    #[error("batch 必须大于 0")]
    Batch,
    #[error("datasets 不能为空")]
    NoDatasets,
    #[error("seasons 不能为空")]
    NoSeasons,
}

impl TaskConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source_id.is_some() == self.source.is_some() {
            return Err(ConfigError::SourceChoice);
        }
        if !matches!(self.delimiter.as_bytes(), [b] if b.is_ascii() && *b != b'\n' && *b != b'\r' && *b != b'"') {
            return Err(ConfigError::Delimiter(self.delimiter.clone()));
        }
        if self.batch == 0 {
            return Err(ConfigError::Batch);
        }
        if self.datasets.as_ref().is_some_and(|d| d.is_empty()) {
            return Err(ConfigError::NoDatasets);
        }
        if self.seasons.as_ref().is_some_and(|s| s.is_empty()) {
            return Err(ConfigError::NoSeasons);
        }
        Ok(())
    }

    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.as_bytes().first().copied().unwrap_or(b',')
    }

    /// 按固定顺序返回需要生成的数据集
    pub fn selected_datasets(&self) -> Vec<Dataset> {
        Dataset::ALL
            .into_iter()
            .filter(|d| self.datasets.as_ref().is_none_or(|set| set.contains(d)))
            .collect()
    }
}

/// 命令行参数
#[derive(Debug, PartialEq)]
struct Args {
    task_dir: PathBuf,
    save_source: bool,
}

fn parse_args(args: &[String]) -> Option<Args> {
    let mut task_dir: Option<PathBuf> = None;
    let mut save_source = false;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--task-dir" if i + 1 < args.len() => {
                task_dir = Some(PathBuf::from(&args[i + 1]));
                i += 1;
            }
            "--save-source" => save_source = true,
            _ => {}
        }
        i += 1;
    }
    task_dir.map(|task_dir| Args { task_dir, save_source })
}

/// 进度输出消息（写入 stdout 的 JSON Lines）
#[derive(Debug, Serialize)]
pub struct ProgressMessage {
    kind: MessageKind,
    data: serde_json::Value,
}

/// 消息类型
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Progress,
    Status,
    Error,
    Completed,
}

/// 初始化任务日志系统
fn init_task_logging(task_dir: &Path) -> non_blocking::WorkerGuard {
    let log_file = never(task_dir, "task.log");
    let (non_blocking, guard) = non_blocking(log_file);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(layer().with_writer(stdout))
        .with(layer().with_writer(non_blocking).with_ansi(false))
        .init();

    guard
}

fn main() -> ExitCode {
    // 1. 解析命令行参数
    let raw_args: Vec<String> = env::args().skip(1).collect();
    let Some(args) = parse_args(&raw_args) else {
        print_error("fatal", "缺少 --task-dir 参数");
        eprintln!("用法: courtside-task --task-dir <DIR> [--save-source]");
        return ExitCode::from(1);
    };
    if let Err(e) = fs::create_dir_all(&args.task_dir) {
        print_error("fatal", &format!("无法创建任务目录: {}", e));
        return ExitCode::from(1);
    }

    // 2. 初始化日志系统（guard 持有到进程结束）
    let _log_guard = init_task_logging(&args.task_dir);
    tracing::info!("任务进程启动，task_dir: {:?}", args.task_dir);

    // 3. 读取并校验任务配置
    let config = match load_config(&args.task_dir) {
        Ok(cfg) => cfg,
        Err(e) => {
            print_error("fatal", &e.to_string());
            return ExitCode::from(1);
        }
    };
    tracing::info!("任务配置解析成功: task_id={}, created_at={:?}", config.task_id, config.created_at);

    if args.save_source {
        return save_source(&config);
    }

    // 4. 解析数据源
    let datasource = match load_data_source(&config) {
        Ok(ds) => ds,
        Err(e) => {
            print_error("fatal", &format!("无法加载数据源: {}", e));
            return ExitCode::from(1);
        }
    };
    tracing::info!("数据源: {} ({})", datasource.name, datasource.display_endpoint());

    // 5. 建立数据库连接
    tracing::info!("正在连接数据库...");
    let mut session = match create_connection(&datasource.options) {
        Ok(s) => s,
        Err(e) => {
            print_error("fatal", &format!("数据库连接失败: {}", e));
            return ExitCode::from(1);
        }
    };
    tracing::info!("数据库连接成功");

    // 6. 依次生成数据集
    let summary = pipeline::run(session.as_mut(), &config);
    drop(session);
    tracing::info!("数据库连接已关闭");

    summary.log();
    let code = summary.exit_code();
    print_completed(serde_json::json!({
        "task_id": config.task_id,
        "status": summary.status(),
        "finished_at": Utc::now().to_rfc3339(),
        "summary": summary.to_json(),
    }));
    ExitCode::from(code)
}

fn load_config(task_dir: &Path) -> Result<TaskConfig, Box<dyn Error>> {
    let config_path = task_dir.join("config.json");
    let content = fs::read_to_string(&config_path).map_err(|e| format!("无法读取配置文件: {}", e))?;
    let config: TaskConfig = serde_json::from_str(&content).map_err(|e| format!("配置文件格式错误: {}", e))?;
    config.validate()?;
    Ok(config)
}

/// 内联数据源直接使用，否则从加密缓存按 id 读取
fn load_data_source(config: &TaskConfig) -> Result<DataSource, Box<dyn Error>> {
    if let Some(source) = &config.source {
        return Ok(source.clone());
    }
    let id = config.source_id.as_deref().ok_or("缺少 source_id")?;
    tracing::info!("加载数据源: {}", id);

    let cache = AppCache::init()?;
    let cache_guard = cache.read().map_err(|_| "数据源缓存不可用")?;
    Ok(cache_guard.source(id)?)
}

/// 将内联数据源保存到加密缓存后退出
fn save_source(config: &TaskConfig) -> ExitCode {
    let Some(source) = config.source.clone() else {
        print_error("fatal", "--save-source 需要在配置中提供 source");
        return ExitCode::from(1);
    };

    match persist_source(source.clone()) {
        Ok(()) => {
            tracing::info!("数据源已保存: {} ({})", source.name, source.id);
            print_completed(serde_json::json!({
                "task_id": config.task_id,
                "status": "success",
                "source_id": source.id,
            }));
            ExitCode::SUCCESS
        }
        Err(e) => {
            print_error("fatal", &format!("保存数据源失败: {}", e));
            ExitCode::from(1)
        }
    }
}

fn persist_source(source: DataSource) -> Result<(), Box<dyn Error>> {
    let cache = AppCache::init()?;
    let mut cache_guard = cache.write().map_err(|_| "数据源缓存不可用")?;
    cache_guard.save_source(source)?;
    Ok(())
}

pub fn print_error(
    severity: &str,
    message: &str,
) {
    tracing::error!("{}", message);
    print_progress(ProgressMessage {
        kind: MessageKind::Error,
        data: serde_json::json!({
            "severity": severity,
            "message": message,
        }),
    });
}

pub fn print_completed(data: serde_json::Value) {
    print_progress(ProgressMessage {
        kind: MessageKind::Completed,
        data,
    });
}

pub fn print_progress(msg: ProgressMessage) {
    if let Ok(json) = serde_json::to_string(&msg) {
        println!("{}", json);
    }
}

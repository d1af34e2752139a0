use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::json;

use courtside_core::DatabaseSession;

use crate::sink::{self, SinkError};
use crate::source::{Source, SourceError};
use crate::{
    MessageKind, ProgressMessage, TaskConfig, main_dashboard, player_comparison, position_analysis, print_progress,
    team_summary, value_analysis,
};

/// 可生成的数据集，按固定顺序执行
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    MainDashboard,
    TeamSummary,
    PlayerComparison,
    ValueAnalysis,
    PositionAnalysis,
}

impl Dataset {
    pub const ALL: [Dataset; 5] = [
        Dataset::MainDashboard,
        Dataset::TeamSummary,
        Dataset::PlayerComparison,
        Dataset::ValueAnalysis,
        Dataset::PositionAnalysis,
    ];

    pub fn file_stem(&self) -> &'static str {
        match self {
            Dataset::MainDashboard => "tableau_main_dashboard",
            Dataset::TeamSummary => "tableau_team_summary",
            Dataset::PlayerComparison => "tableau_player_comparison",
            Dataset::ValueAnalysis => "tableau_value_analysis",
            Dataset::PositionAnalysis => "tableau_position_analysis",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Dataset::MainDashboard => "主面板",
            Dataset::TeamSummary => "球队汇总",
            Dataset::PlayerComparison => "球员同比",
            Dataset::ValueAnalysis => "性价比分析",
            Dataset::PositionAnalysis => "位置分析",
        }
    }
}

/// 单个数据集的失败原因
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("查询失败: {0}")]
    Query(#[from] SourceError),
    #[error("写入失败: {0}")]
    Sink(#[from] SinkError),
}

#[derive(Debug)]
pub struct Produced {
    pub dataset: Dataset,
    pub rows: usize,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct Failed {
    pub dataset: Dataset,
    pub error: TaskError,
}

/// 本次运行的结果汇总
#[derive(Debug, Default)]
pub struct Summary {
    pub produced: Vec<Produced>,
    pub failed: Vec<Failed>,
}

impl Summary {
    /// 0 全部成功；1 没有生成任何数据集；2 部分数据集失败
    pub fn exit_code(&self) -> u8 {
        if self.failed.is_empty() {
            0
        } else if self.produced.is_empty() {
            1
        } else {
            2
        }
    }

    pub fn status(&self) -> &'static str {
        match self.exit_code() {
            0 => "success",
            1 => "failed",
            _ => "partial",
        }
    }

    pub fn log(&self) {
        tracing::info!(
            "任务结束: 成功 {} 个数据集，失败 {} 个",
            self.produced.len(),
            self.failed.len()
        );
        for item in &self.produced {
            tracing::info!("  {} -> {:?} ({} 行)", item.dataset.label(), item.path, item.rows);
        }
        for item in &self.failed {
            tracing::error!("  {} 失败: {}", item.dataset.label(), item.error);
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let produced: Vec<_> = self
            .produced
            .iter()
            .map(|item| {
                json!({
                    "dataset": item.dataset,
                    "rows": item.rows,
                    "path": item.path.display().to_string(),
                })
            })
            .collect();
        let failed: Vec<_> = self
            .failed
            .iter()
            .map(|item| {
                json!({
                    "dataset": item.dataset,
                    "error": item.error.to_string(),
                })
            })
            .collect();

        json!({ "produced": produced, "failed": failed })
    }
}

/// 依次生成配置中的数据集；单个数据集失败只记录，不影响后续数据集
pub fn run(
    session: &mut dyn DatabaseSession,
    config: &TaskConfig,
) -> Summary {
    let datasets = config.selected_datasets();
    let delimiter = config.delimiter_byte();
    let total = datasets.len();
    let mut source = Source::new(session, config);
    let mut summary = Summary::default();

    for (idx, dataset) in datasets.into_iter().enumerate() {
        let path = config.output_dir.join(format!("{}.csv", dataset.file_stem()));
        tracing::info!("[{}/{}] 开始生成{}: {:?}", idx + 1, total, dataset.label(), path);
        print_progress(ProgressMessage {
            kind: MessageKind::Status,
            data: json!({ "dataset": dataset, "status": "running" }),
        });

        let started = Instant::now();
        let ok = match produce(dataset, &mut source, &path, delimiter) {
            Ok(rows) => {
                if rows == 0 {
                    tracing::warn!("{}没有记录，只写出表头", dataset.label());
                }
                tracing::info!(
                    "{}生成完成: {} 行，耗时 {:.2}s",
                    dataset.label(),
                    rows,
                    started.elapsed().as_secs_f64()
                );
                summary.produced.push(Produced { dataset, rows, path });
                true
            }
            Err(error) => {
                tracing::error!("{}生成失败: {}", dataset.label(), error);
                summary.failed.push(Failed { dataset, error });
                false
            }
        };

        print_progress(ProgressMessage {
            kind: MessageKind::Progress,
            data: json!({
                "current": idx + 1,
                "total": total,
                "dataset": dataset,
                "ok": ok,
            }),
        });
    }

    summary
}

fn produce(
    dataset: Dataset,
    source: &mut Source<'_>,
    path: &Path,
    delimiter: u8,
) -> Result<usize, TaskError> {
    let rows = match dataset {
        Dataset::MainDashboard => sink::write_table(path, &main_dashboard::fetch(source)?, delimiter)?,
        Dataset::TeamSummary => sink::write_table(path, &team_summary::fetch(source)?, delimiter)?,
        Dataset::PlayerComparison => sink::write_table(path, &player_comparison::fetch(source)?, delimiter)?,
        Dataset::ValueAnalysis => sink::write_table(path, &value_analysis::fetch(source)?, delimiter)?,
        Dataset::PositionAnalysis => sink::write_table(path, &position_analysis::fetch(source)?, delimiter)?,
    };
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use courtside_core::{DataSourceOptions, ExecReq, SQLiteOptions, create_connection};

    use super::*;
    use crate::main_dashboard::MainDashboardRow;
    use crate::player_comparison::PlayerComparisonRow;
    use crate::position_analysis::PositionAnalysisRow;
    use crate::sink::Table;
    use crate::source::STAT_COLUMNS;
    use crate::team_summary::TeamSummaryRow;
    use crate::value_analysis::ValueAnalysisRow;

    const TEXT_COLUMNS: &[&str] = &["player_name", "season", "team", "position", "awards"];

    fn seed(dir: &Path) -> Box<dyn DatabaseSession> {
        let opts = DataSourceOptions::SQLite(SQLiteOptions {
            readonly: false,
            filepath: dir.join("nba.db").to_string_lossy().into_owned(),
        });
        let mut session = create_connection(&opts).unwrap();

        let columns: Vec<String> = STAT_COLUMNS
            .iter()
            .map(|c| {
                let kind = if TEXT_COLUMNS.contains(c) { "TEXT" } else { "REAL" };
                format!("{c} {kind}")
            })
            .collect();
        let sql = format!(
            "CREATE TABLE player_merged_stats ({});
             CREATE TABLE player_salaries (player_name TEXT, season TEXT, salary INTEGER, salary_formatted TEXT, salary_rank INTEGER);
             INSERT INTO player_merged_stats
                 (player_name, season, team, position, games_played, pg_points, adv_win_shares, adv_value_over_replacement, total_points, awards)
             VALUES
                 ('A', '2023-24', 'BOS', 'PG', 70, 25, 10, 5, 1750, 'MVP-4,AS'),
                 ('A', '2022-23', 'BOS', 'PG', 65, 22, 8, 3.5, 1430, 'AS'),
                 ('B', '2023-24', 'BOS', 'C', 45, 12, 3, 1, 540, NULL),
                 ('C', '2023-24', 'LAL', 'SF', 15, 8, 0.5, -0.2, 120, NULL),
                 ('D', '2023-24', 'LAL', NULL, 5, 2, 0, 0, 10, NULL);
             INSERT INTO player_salaries VALUES
                 ('A', '2023-24', 30000000, '$30,000,000', 8),
                 ('A', '2022-23', 28000000, '$28,000,000', 12),
                 ('B', '2023-24', 5000000, '$5,000,000', 150);",
            columns.join(", ")
        );
        session.exec(ExecReq::Sql { sql }).unwrap();
        session
    }

    fn task_config(
        dir: &Path,
        extra: serde_json::Value,
    ) -> TaskConfig {
        let mut value = json!({
            "task_id": "test",
            "source_id": "unused",
            "output_dir": dir.join("out"),
            "batch": 2,
        });
        if let (Some(base), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        let config: TaskConfig = serde_json::from_value(value).unwrap();
        config.validate().unwrap();
        config
    }

    fn read_csv(path: &Path) -> (csv::StringRecord, Vec<csv::StringRecord>) {
        let mut reader = csv::Reader::from_path(path).unwrap();
        let headers = reader.headers().unwrap().clone();
        let rows = reader.records().map(|r| r.unwrap()).collect();
        (headers, rows)
    }

    fn field<'a>(
        headers: &csv::StringRecord,
        row: &'a csv::StringRecord,
        name: &str,
    ) -> &'a str {
        let idx = headers.iter().position(|h| h == name).unwrap();
        &row[idx]
    }

    #[test]
    fn produces_all_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = seed(dir.path());
        let config = task_config(dir.path(), json!({}));

        let summary = run(session.as_mut(), &config);
        assert_eq!(summary.exit_code(), 0);
        let counts: Vec<_> = summary.produced.iter().map(|p| (p.dataset, p.rows)).collect();
        assert_eq!(
            counts,
            vec![
                (Dataset::MainDashboard, 4),
                (Dataset::TeamSummary, 3),
                (Dataset::PlayerComparison, 3),
                (Dataset::ValueAnalysis, 3),
                (Dataset::PositionAnalysis, 3),
            ]
        );

        let (headers, rows) = read_csv(&dir.path().join("out").join("tableau_main_dashboard.csv"));
        assert_eq!(&headers[0], "player_name");
        assert_eq!(&headers[headers.len() - 1], "season_year");
        assert_eq!(field(&headers, &rows[0], "player_name"), "A");
        assert_eq!(field(&headers, &rows[0], "salary"), "30000000");
        assert_eq!(field(&headers, &rows[0], "games_played"), "70");
        assert_eq!(field(&headers, &rows[0], "salary_tier"), "Top 10 (Supermax)");
        assert_eq!(field(&headers, &rows[0], "is_allstar"), "1");
        // 无薪资的球员保留，比值为空
        assert_eq!(field(&headers, &rows[2], "player_name"), "C");
        assert_eq!(field(&headers, &rows[2], "points_per_million"), "");

        let (headers, rows) = read_csv(&dir.path().join("out").join("tableau_player_comparison.csv"));
        let a = rows
            .iter()
            .find(|r| field(&headers, r, "player_name") == "A" && field(&headers, r, "current_season") == "2023-24")
            .unwrap();
        assert_eq!(field(&headers, a, "previous_season"), "2022-23");
        assert_eq!(field(&headers, a, "salary_change"), "2000000");
        assert_eq!(field(&headers, a, "vorp_change"), "1.5");
        assert_eq!(field(&headers, a, "impact_trend"), "Breakout");
    }

    #[test]
    fn rerun_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = seed(dir.path());
        let config = task_config(dir.path(), json!({ "batch": 1000 }));

        run(session.as_mut(), &config);
        let first: Vec<Vec<u8>> = Dataset::ALL
            .iter()
            .map(|d| fs::read(dir.path().join("out").join(format!("{}.csv", d.file_stem()))).unwrap())
            .collect();

        run(session.as_mut(), &config);
        let second: Vec<Vec<u8>> = Dataset::ALL
            .iter()
            .map(|d| fs::read(dir.path().join("out").join(format!("{}.csv", d.file_stem()))).unwrap())
            .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn season_filter_limits_rows_but_not_history() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = seed(dir.path());
        let config = task_config(
            dir.path(),
            json!({ "seasons": ["2023-24"], "datasets": ["player_comparison", "main_dashboard"] }),
        );

        let summary = run(session.as_mut(), &config);
        let counts: Vec<_> = summary.produced.iter().map(|p| (p.dataset, p.rows)).collect();
        assert_eq!(counts, vec![(Dataset::MainDashboard, 3), (Dataset::PlayerComparison, 2)]);
        assert!(!dir.path().join("out").join("tableau_team_summary.csv").exists());

        let (headers, rows) = read_csv(&dir.path().join("out").join("tableau_player_comparison.csv"));
        assert_eq!(field(&headers, &rows[0], "player_name"), "A");
        assert_eq!(field(&headers, &rows[0], "previous_season"), "2022-23");
    }

    #[test]
    fn sink_failure_does_not_stop_later_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = seed(dir.path());
        let config = task_config(dir.path(), json!({}));
        fs::create_dir_all(dir.path().join("out").join("tableau_team_summary.csv")).unwrap();

        let summary = run(session.as_mut(), &config);
        assert_eq!(summary.exit_code(), 2);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].dataset, Dataset::TeamSummary);
        assert!(matches!(summary.failed[0].error, TaskError::Sink(_)));
        assert_eq!(summary.produced.len(), 4);
        assert!(dir.path().join("out").join("tableau_position_analysis.csv").is_file());

        let json = summary.to_json();
        assert_eq!(json["failed"][0]["dataset"], "team_summary");
        assert_eq!(json["produced"].as_array().map(Vec::len), Some(4));
    }

    #[test]
    fn query_failure_only_affects_its_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = seed(dir.path());
        // 只有不带出场数过滤的历史查询会读到这一行
        session
            .exec(ExecReq::Sql {
                sql: "INSERT INTO player_merged_stats (player_name, season, games_played, pg_points)
                      VALUES ('E', '2021-22', 3, 'n/a');"
                    .into(),
            })
            .unwrap();
        let config = task_config(dir.path(), json!({}));

        let summary = run(session.as_mut(), &config);
        assert_eq!(summary.exit_code(), 2);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].dataset, Dataset::PlayerComparison);
        assert!(matches!(
            summary.failed[0].error,
            TaskError::Query(SourceError::Decode { ref column, .. }) if column == "pg_points"
        ));
        assert_eq!(summary.produced.len(), 4);
    }

    #[test]
    fn missing_columns_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = seed(dir.path());
        session
            .exec(ExecReq::Sql {
                sql: "CREATE TABLE thin_salaries (player_name TEXT, season TEXT, salary INTEGER);".into(),
            })
            .unwrap();
        let config = task_config(
            dir.path(),
            json!({ "salary_table": "thin_salaries", "datasets": ["value_analysis"] }),
        );

        let summary = run(session.as_mut(), &config);
        assert_eq!(summary.exit_code(), 1);
        let err = summary.failed[0].error.to_string();
        assert!(err.contains("salary_formatted"), "{err}");
        assert!(err.contains("salary_rank"), "{err}");
    }

    #[test]
    fn empty_datasets_still_carry_headers() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = seed(dir.path());
        let config = task_config(dir.path(), json!({ "seasons": ["1999-00"] }));

        let summary = run(session.as_mut(), &config);
        assert_eq!(summary.exit_code(), 0);
        assert!(summary.produced.iter().all(|p| p.rows == 0));

        for dataset in Dataset::ALL {
            let columns = match dataset {
                Dataset::MainDashboard => MainDashboardRow::COLUMNS,
                Dataset::TeamSummary => TeamSummaryRow::COLUMNS,
                Dataset::PlayerComparison => PlayerComparisonRow::COLUMNS,
                Dataset::ValueAnalysis => ValueAnalysisRow::COLUMNS,
                Dataset::PositionAnalysis => PositionAnalysisRow::COLUMNS,
            };
            let text = fs::read_to_string(dir.path().join("out").join(format!("{}.csv", dataset.file_stem()))).unwrap();
            assert_eq!(text, format!("{}\n", columns.join(",")), "{dataset:?}");
        }
    }

    #[test]
    fn every_dataset_failing_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let opts = DataSourceOptions::SQLite(SQLiteOptions {
            readonly: false,
            filepath: dir.path().join("blank.db").to_string_lossy().into_owned(),
        });
        let mut session = create_connection(&opts).unwrap();
        let config = task_config(dir.path(), json!({}));

        let summary = run(session.as_mut(), &config);
        assert!(summary.produced.is_empty());
        assert_eq!(summary.failed.len(), 5);
        assert!(summary.failed.iter().all(|f| matches!(
            f.error,
            TaskError::Query(SourceError::MissingColumns { .. })
        )));
        assert_eq!(summary.exit_code(), 1);
        assert_eq!(summary.status(), "failed");
    }

    #[test]
    fn status_follows_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = seed(dir.path());
        let config = task_config(dir.path(), json!({}));
        let mut summary = run(session.as_mut(), &config);
        assert_eq!(summary.status(), "success");

        let error = TaskError::Sink(SinkError::Io(std::io::Error::other("磁盘已满")));
        summary.failed.push(Failed { dataset: Dataset::TeamSummary, error });
        assert_eq!(summary.status(), "partial");
        assert_eq!(summary.exit_code(), 2);
    }
}

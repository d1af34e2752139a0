use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

/// 从本地 MySQL 生成五个 Tableau 数据集
fn export_all_datasets() {
    let task_dir = PathBuf::from("/tmp/courtside-tasks/tableau");
    let output_dir = PathBuf::from("/tmp/courtside-tableau");

    // 清除上次任务的信息
    if task_dir.exists() {
        fs::remove_dir_all(&task_dir).unwrap();
    }
    fs::create_dir_all(&task_dir).unwrap();

    let config = json!({
        "task_id": "tableau-001",
        "created_at": "2025-12-27T10:00:00Z",
        "source": {
            "name": "nba",
            "kind": "MySQL",
            "options": {
                "MySQL": {
                    "host": "127.0.0.1",
                    "port": "3306",
                    "username": "root",
                    "password": "root",
                    "database": "nba_stats"
                }
            }
        },
        "output_dir": output_dir,
        "delimiter": ",",
        "batch": 1000
    });

    fs::write(
        task_dir.join("config.json"),
        serde_json::to_string_pretty(&config).unwrap(),
    )
    .unwrap();

    println!("配置文件已创建: {:?}/config.json", task_dir);
    println!("正在执行任务...\n");

    let status = Command::new("cargo")
        .args(["run", "-p", "courtside-task", "--", "--task-dir"])
        .arg(&task_dir)
        .status()
        .expect("创建任务失败");

    match status.code() {
        Some(0) => println!("\n✓ 全部数据集已生成: {:?}", output_dir),
        Some(2) => println!("\n! 部分数据集生成失败，详见 {:?}/task.log", task_dir),
        _ => println!("\n✗ 任务执行失败"),
    }
}

fn main() {
    println!("=== Courtside Tableau 导出示例 ===\n");
    export_all_datasets();
    println!();

    println!("注意:");
    println!("  1. 确保 MySQL 中存在 player_merged_stats 与 player_salaries 两张表");
    println!("  2. 输出文件将保存到 /tmp/courtside-tableau/ 目录");
    println!("  3. 加上 --save-source 可将 source 保存到 ~/.courtside/sources.db，之后用 source_id 引用");
}

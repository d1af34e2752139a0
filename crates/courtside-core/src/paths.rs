use std::{fs::create_dir_all, path::PathBuf};

/// 获取 courtside 根目录（~/.courtside）
///
/// Fallback: 如果 home_dir 失败，使用 ./.courtside
pub fn root_dir() -> PathBuf {
    let dir = dirs::home_dir()
        .map(|home| home.join(".courtside"))
        .unwrap_or_else(|| PathBuf::from(".courtside"));
    let _ = create_dir_all(&dir);
    dir
}

/// 获取数据源配置文件路径（~/.courtside/sources.db）
pub fn sources_db() -> PathBuf {
    root_dir().join("sources.db")
}

use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// 核心模块导出
pub mod cache;
pub mod driver;
pub mod paths;

// 重新导出 driver 和 cache 类型
pub use driver::{
    DatabaseDriver, DatabaseSession, DriverError, ExecReq, ExecResp, FilterCond, Operator, OrderCond, Paging,
    QueryReq, QueryResp, Record, ValueCond, create_connection,
};

pub use cache::{AppCache, ArcCache, CacheError};
pub use paths::{root_dir, sources_db};

// ============================================================================
// Model Types
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: String,
    pub nullable: bool,
    pub primary_key: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataSource {
    #[serde(default = "new_source_id")]
    pub id: String,
    pub name: String,
    pub kind: DataSourceKind,
    pub options: DataSourceOptions,
}

fn new_source_id() -> String {
    Uuid::new_v4().to_string()
}

impl DataSource {
    pub fn new(
        name: String,
        kind: DataSourceKind,
        options: DataSourceOptions,
    ) -> Self {
        Self {
            id: new_source_id(),
            name,
            kind,
            options,
        }
    }

    pub fn display_endpoint(&self) -> String {
        match &self.options {
            DataSourceOptions::MySQL(opts) => opts.endpoint(),
            DataSourceOptions::SQLite(opts) => opts.endpoint(),
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSourceKind {
    MySQL,
    SQLite,
}

/// MySQL 连接参数（密码不参与 Debug 输出）
#[derive(Clone, Serialize, Deserialize)]
pub struct MySQLOptions {
    pub host: String,
    #[serde(default = "default_mysql_port")]
    pub port: String,
    pub username: String,
    pub password: String,
    pub database: String,
    #[serde(default)]
    pub use_tls: bool,
}

fn default_mysql_port() -> String {
    "3306".into()
}

impl std::fmt::Debug for MySQLOptions {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("MySQLOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("database", &self.database)
            .field("use_tls", &self.use_tls)
            .finish_non_exhaustive()
    }
}

impl Default for MySQLOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: default_mysql_port(),
            username: "root".into(),
            password: "".into(),
            database: String::new(),
            use_tls: false,
        }
    }
}

impl MySQLOptions {
    pub fn endpoint(&self) -> String {
        let scheme = if self.use_tls { "mysqls" } else { "mysql" };
        let db = self.database.trim();
        if db.is_empty() {
            format!("{}://{}:{}", scheme, self.host, self.port)
        } else {
            format!("{}://{}:{}/{}", scheme, self.host, self.port, db)
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SQLiteOptions {
    #[serde(default)]
    pub readonly: bool,
    pub filepath: String,
}

impl SQLiteOptions {
    pub fn endpoint(&self) -> String {
        let path = self.filepath.trim();
        if path.is_empty() {
            return "sqlite://<未配置文件>".into();
        }

        let name = Path::new(path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(path);

        if self.readonly {
            format!("sqlite://{}?mode=ro", name)
        } else {
            format!("sqlite://{}", name)
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum DataSourceOptions {
    MySQL(MySQLOptions),
    SQLite(SQLiteOptions),
}

impl DataSourceOptions {
    pub fn kind(&self) -> DataSourceKind {
        match self {
            DataSourceOptions::MySQL(_) => DataSourceKind::MySQL,
            DataSourceOptions::SQLite(_) => DataSourceKind::SQLite,
        }
    }
}

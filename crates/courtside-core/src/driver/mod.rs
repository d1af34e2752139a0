use std::collections::HashMap;

use crate::{ColumnInfo, DataSourceOptions};

pub use mysql::MySQLDriver;
pub use sqlite::SQLiteDriver;

mod mysql;
mod sqlite;

/// 一行查询结果：列名 -> 值（NULL 为 None）
pub type Record = HashMap<String, Option<String>>;

#[derive(Clone, Debug)]
pub struct Paging {
    page: usize,
    size: usize,
}

impl Paging {
    pub fn new(
        page: usize,
        size: usize,
    ) -> Self {
        Self { page, size }
    }

    pub fn limit(&self) -> usize {
        self.size
    }

    pub fn offset(&self) -> usize {
        self.page * self.size
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Operator {
    GreaterOrEqual,
    In,
    IsNotNull,
}

#[derive(Clone, Debug)]
pub enum QueryReq {
    /// 原始 SQL；任务只走 `Builder`，此分支用于测试和临时排查
    Sql {
        sql: String,
        args: Vec<String>,
    },
    Builder {
        table: String,
        columns: Vec<String>,
        paging: Option<Paging>,
        orders: Vec<OrderCond>,
        filters: Vec<FilterCond>,
    },
}

/// 写操作；数据集任务只读，仅测试用它准备数据
#[derive(Clone, Debug)]
pub enum ExecReq {
    Sql { sql: String },
}

#[derive(Clone, Debug)]
pub struct ExecResp {
    pub affected: u64,
}

#[derive(Clone, Debug)]
pub enum QueryResp {
    Rows { cols: Vec<String>, rows: Vec<Record> },
}

#[derive(Clone, Debug)]
pub struct OrderCond {
    pub field: String,
    pub ascending: bool,
}

#[derive(Clone, Debug)]
pub enum ValueCond {
    Null,
    Number(f64),
    List(Vec<String>),
}

#[derive(Clone, Debug)]
pub struct FilterCond {
    pub field: String,
    pub operator: Operator,
    pub value: ValueCond,
}

impl FilterCond {
    pub fn at_least(
        field: impl Into<String>,
        min: f64,
    ) -> Self {
        Self {
            field: field.into(),
            operator: Operator::GreaterOrEqual,
            value: ValueCond::Number(min),
        }
    }

    pub fn not_null(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: Operator::IsNotNull,
            value: ValueCond::Null,
        }
    }

    pub fn one_of(
        field: impl Into<String>,
        values: Vec<String>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: Operator::In,
            value: ValueCond::List(values),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("{0}")]
    Other(String),
    #[error("配置字段缺失: {0}")]
    MissingField(String),
    #[error("配置字段非法: {0}")]
    InvalidField(String),
}

pub trait DatabaseDriver {
    type Config;

    fn create_connection(
        &self,
        config: &Self::Config,
    ) -> Result<Box<dyn DatabaseSession>, DriverError>;
}

/// 数据库会话；会话在 Drop 时释放底层连接
pub trait DatabaseSession: Send {
    /// 仅用于测试建表和写入样例数据
    fn exec(
        &mut self,
        req: ExecReq,
    ) -> Result<ExecResp, DriverError>;

    fn query(
        &mut self,
        req: QueryReq,
    ) -> Result<QueryResp, DriverError>;

    fn columns(
        &mut self,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, DriverError>;
}

pub fn create_connection(opts: &DataSourceOptions) -> Result<Box<dyn DatabaseSession>, DriverError> {
    match opts {
        DataSourceOptions::MySQL(config) => MySQLDriver.create_connection(config),
        DataSourceOptions::SQLite(config) => SQLiteDriver.create_connection(config),
    }
}

pub fn validate_sql(sql: &str) -> Result<(), DriverError> {
    if sql.trim().is_empty() {
        return Err(DriverError::InvalidField("sql".into()));
    }
    Ok(())
}

pub fn escape_quote(s: &str) -> String {
    s.replace('"', "\"\"")
}

pub fn escape_backtick(s: &str) -> String {
    s.replace('`', "``")
}

/// 生成 WHERE 子句；`quote` 负责标识符转义，`bind` 收集参数
pub(crate) fn where_clause<P>(
    filters: &[FilterCond],
    quote: impl Fn(&str) -> String,
    mut bind: impl FnMut(&ValueCond, Option<&str>) -> Option<P>,
    params: &mut Vec<P>,
) -> String {
    let mut clauses = vec![];
    for filter in filters {
        let field = quote(&filter.field);
        match (&filter.operator, &filter.value) {
            (Operator::IsNotNull, _) => clauses.push(format!("{} IS NOT NULL", field)),
            (Operator::In, ValueCond::List(list)) => {
                // 空列表不匹配任何行
                if list.is_empty() {
                    clauses.push("1 = 0".to_string());
                    continue;
                }
                let placeholders = vec!["?"; list.len()].join(", ");
                clauses.push(format!("{} IN ({})", field, placeholders));
                params.extend(list.iter().filter_map(|item| bind(&filter.value, Some(item.as_str()))));
            }
            (Operator::GreaterOrEqual, value) => {
                if let Some(param) = bind(value, None) {
                    clauses.push(format!("{} >= ?", field));
                    params.push(param);
                }
            }
            _ => {}
        }
    }

    if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    }
}

pub(crate) fn order_clause(
    orders: &[OrderCond],
    quote: impl Fn(&str) -> String,
) -> String {
    if orders.is_empty() {
        return String::new();
    }
    let order_clauses: Vec<_> = orders
        .iter()
        .map(|ord| format!("{} {}", quote(&ord.field), if ord.ascending { "ASC" } else { "DESC" }))
        .collect();
    format!(" ORDER BY {}", order_clauses.join(", "))
}

use std::{collections::HashMap, fs, path::Path};

use rusqlite::{
    Connection, OpenFlags, params_from_iter,
    types::{Value, ValueRef},
};

use crate::{ColumnInfo, SQLiteOptions};

use super::{
    DatabaseDriver, DatabaseSession, DriverError, ExecReq, ExecResp, QueryReq, QueryResp, ValueCond, escape_quote,
    order_clause, validate_sql, where_clause,
};

#[derive(Debug, Clone, Copy)]
pub struct SQLiteDriver;

struct SQLiteConnection {
    conn: Connection,
}

impl SQLiteConnection {
    fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

impl DatabaseSession for SQLiteConnection {
    fn exec(
        &mut self,
        req: ExecReq,
    ) -> Result<ExecResp, DriverError> {
        let ExecReq::Sql { sql } = req;
        validate_sql(&sql)?;
        // 允许一次执行多条语句
        let before = self.conn.total_changes();
        self.conn
            .execute_batch(&sql)
            .map_err(|err| DriverError::Other(format!("执行失败: {}", err)))?;
        Ok(ExecResp {
            affected: self.conn.total_changes().saturating_sub(before),
        })
    }

    fn query(
        &mut self,
        req: QueryReq,
    ) -> Result<QueryResp, DriverError> {
        let (sql, params) = match req {
            QueryReq::Sql { sql, args } => {
                validate_sql(&sql)?;
                (sql, args.into_iter().map(Value::Text).collect::<Vec<_>>())
            }
            QueryReq::Builder {
                table,
                columns,
                paging,
                orders,
                filters,
            } => {
                let mut sql = format!("SELECT {} FROM \"{}\"", format_columns(&columns), escape_quote(&table));
                let mut params = vec![];

                sql.push_str(&where_clause(&filters, quote_ident, bind_value, &mut params));
                sql.push_str(&order_clause(&orders, quote_ident));

                // 分页子句
                if let Some(page) = paging {
                    sql.push_str(&format!(" LIMIT {} OFFSET {}", page.limit(), page.offset()));
                }

                (sql, params)
            }
        };
        tracing::debug!(sql = %sql, params = params.len());

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|err| DriverError::Other(format!("准备查询失败: {}", err)))?;
        let columns = stmt.column_names().iter().map(|s| s.to_string()).collect::<Vec<_>>();

        let mut rows = stmt
            .query(params_from_iter(params.iter()))
            .map_err(|err| DriverError::Other(format!("执行查询失败: {}", err)))?;

        let mut records = vec![];
        while let Some(row) = rows
            .next()
            .map_err(|err| DriverError::Other(format!("读取结果失败: {}", err)))?
        {
            let mut record = HashMap::with_capacity(columns.len());
            for (idx, name) in columns.iter().enumerate() {
                let value = row
                    .get_ref(idx)
                    .map_err(|err| DriverError::Other(format!("读取列 {name} 失败: {}", err)))?;
                record.insert(name.clone(), parse_value(value));
            }
            records.push(record);
        }

        Ok(QueryResp::Rows {
            cols: columns,
            rows: records,
        })
    }

    fn columns(
        &mut self,
        table: &str,
    ) -> Result<Vec<ColumnInfo>, DriverError> {
        let sql = format!("PRAGMA table_info(\"{}\")", escape_quote(table));
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|err| DriverError::Other(format!("查询列信息失败: {}", err)))?;

        let mut columns = vec![];
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i32>(3)?,
                    row.get::<_, i32>(5)?,
                ))
            })
            .map_err(|err| DriverError::Other(format!("查询列信息失败: {}", err)))?;

        for row in rows {
            let (name, data_type, notnull, pk) =
                row.map_err(|err| DriverError::Other(format!("读取列信息失败: {}", err)))?;

            columns.push(ColumnInfo {
                name,
                kind: data_type,
                nullable: notnull == 0,
                primary_key: pk > 0,
            });
        }
        Ok(columns)
    }
}

impl DatabaseDriver for SQLiteDriver {
    type Config = SQLiteOptions;

    fn create_connection(
        &self,
        config: &Self::Config,
    ) -> Result<Box<dyn DatabaseSession>, DriverError> {
        let conn = open_conn(config)?;
        conn.query_row("SELECT 1", [], |_| Ok::<_, rusqlite::Error>(()))
            .map_err(|err| DriverError::Other(format!("校验查询失败: {}", err)))?;
        Ok(Box::new(SQLiteConnection::new(conn)))
    }
}

fn open_conn(config: &SQLiteOptions) -> Result<Connection, DriverError> {
    let path_str = config.filepath.trim();
    if path_str.is_empty() {
        return Err(DriverError::MissingField("file_path".into()));
    }

    let path = Path::new(path_str);

    if config.readonly {
        if !path.exists() {
            return Err(DriverError::InvalidField("file_path 不存在".into()));
        }
    } else if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| DriverError::Other(format!("创建目录失败: {}", err)))?;
        }
    }

    let flags = if config.readonly {
        OpenFlags::SQLITE_OPEN_READ_ONLY
    } else {
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
    };

    Connection::open_with_flags(path, flags).map_err(|err| DriverError::Other(format!("打开 SQLite 失败: {}", err)))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", escape_quote(name))
}

fn bind_value(
    value: &ValueCond,
    item: Option<&str>,
) -> Option<Value> {
    match (value, item) {
        (_, Some(item)) => Some(Value::Text(item.to_string())),
        (ValueCond::Number(n), None) => Some(Value::Real(*n)),
        _ => None,
    }
}

fn parse_value(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(int) => Some(int.to_string()),
        ValueRef::Real(real) => Some(real.to_string()),
        ValueRef::Text(text) => Some(String::from_utf8_lossy(text).into_owned()),
        // Blob 显示为十六进制字符串
        ValueRef::Blob(blob) => Some(blob.iter().map(|b| format!("{:02x}", b)).collect::<String>()),
    }
}

fn format_columns(columns: &[String]) -> String {
    if columns.is_empty() {
        return "*".to_string();
    }

    columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FilterCond, OrderCond, Paging, create_connection, DataSourceOptions};

    fn session() -> (tempfile::TempDir, Box<dyn DatabaseSession>) {
        let dir = tempfile::tempdir().unwrap();
        let opts = DataSourceOptions::SQLite(SQLiteOptions {
            readonly: false,
            filepath: dir.path().join("db").join("nba.db").to_string_lossy().into_owned(),
        });
        let mut session = create_connection(&opts).unwrap();
        session
            .exec(ExecReq::Sql {
                sql: "CREATE TABLE player_salaries (player_name TEXT, season TEXT, salary INTEGER, salary_rank INTEGER);
                      INSERT INTO player_salaries VALUES ('A', '2023-24', 100, 2), ('B', '2023-24', NULL, NULL),
                                                         ('C', '2022-23', 50, 1), ('D', '2024-25', 75, 1);"
                    .into(),
            })
            .unwrap();
        (dir, session)
    }

    #[test]
    fn builder_filters_orders_and_pages() {
        let (_dir, mut session) = session();
        let resp = session
            .query(QueryReq::Builder {
                table: "player_salaries".into(),
                columns: vec!["player_name".into(), "salary".into()],
                paging: Some(Paging::new(0, 2)),
                orders: vec![OrderCond {
                    field: "player_name".into(),
                    ascending: false,
                }],
                filters: vec![
                    FilterCond::at_least("salary", 60.0),
                    FilterCond::one_of("season", vec!["2023-24".into(), "2024-25".into()]),
                ],
            })
            .unwrap();

        let QueryResp::Rows { cols, rows } = resp;
        assert_eq!(cols, vec!["player_name", "salary"]);
        let names: Vec<_> = rows.iter().map(|r| r["player_name"].clone().unwrap()).collect();
        assert_eq!(names, vec!["D", "A"]);
    }

    #[test]
    fn nulls_survive_and_columns_are_listed() {
        let (_dir, mut session) = session();
        let QueryResp::Rows { rows, .. } = session
            .query(QueryReq::Sql {
                sql: "SELECT salary FROM player_salaries WHERE player_name = ?".into(),
                args: vec!["B".into()],
            })
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["salary"], None);

        let cols = session.columns("player_salaries").unwrap();
        let names: Vec<_> = cols.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["player_name", "season", "salary", "salary_rank"]);
        assert_eq!(cols[2].kind, "INTEGER");
        assert!(cols[0].nullable && !cols[0].primary_key);
        assert!(session.columns("missing_table").unwrap().is_empty());

        session
            .exec(ExecReq::Sql {
                sql: "CREATE TABLE seasons (season TEXT NOT NULL PRIMARY KEY, label TEXT);".into(),
            })
            .unwrap();
        let cols = session.columns("seasons").unwrap();
        assert!(!cols[0].nullable && cols[0].primary_key);
        assert!(cols[1].nullable && !cols[1].primary_key);
    }

    #[test]
    fn readonly_missing_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let opts = DataSourceOptions::SQLite(SQLiteOptions {
            readonly: true,
            filepath: dir.path().join("absent.db").to_string_lossy().into_owned(),
        });
        assert!(matches!(create_connection(&opts), Err(DriverError::InvalidField(_))));
    }
}

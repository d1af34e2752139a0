use std::collections::HashMap;

use mysql::{Conn, Opts, OptsBuilder, SslOpts, Value, prelude::Queryable};

use crate::{ColumnInfo, MySQLOptions};

use super::{
    DatabaseDriver, DatabaseSession, DriverError, ExecReq, ExecResp, QueryReq, QueryResp, ValueCond, escape_backtick,
    order_clause, validate_sql, where_clause,
};

#[derive(Debug, Clone, Copy)]
pub struct MySQLDriver;

impl DatabaseDriver for MySQLDriver {
    type Config = MySQLOptions;

    fn create_connection(
        &self,
        config: &Self::Config,
    ) -> Result<Box<dyn DatabaseSession>, DriverError> {
        let mut conn = open_conn(config)?;
        conn.ping()
            .map_err(|err| DriverError::Other(format!("ping 失败: {}", err)))?;
        Ok(Box::new(MySQLSession::new(conn)))
    }
}

struct MySQLSession {
    conn: Conn,
}

impl MySQLSession {
    fn new(conn: Conn) -> Self {
        Self { conn }
    }
}

impl DatabaseSession for MySQLSession {
    fn exec(
        &mut self,
        req: ExecReq,
    ) -> Result<ExecResp, DriverError> {
        let ExecReq::Sql { sql } = req;
        validate_sql(&sql)?;
        self.conn
            .query_drop(&sql)
            .map_err(|err| DriverError::Other(format!("执行失败: {}", err)))?;
        Ok(ExecResp {
            affected: self.conn.affected_rows(),
        })
    }

    fn query(
        &mut self,
        req: QueryReq,
    ) -> Result<QueryResp, DriverError> {
        let (sql, params) = match req {
            QueryReq::Sql { sql, args } => {
                validate_sql(&sql)?;
                let params: Vec<Value> = args.into_iter().map(Value::from).collect();
                (sql, params)
            }
            QueryReq::Builder {
                table,
                columns,
                paging,
                orders,
                filters,
            } => {
                let mut sql = format!("SELECT {} FROM `{}`", format_columns(&columns), escape_backtick(&table));
                let mut params: Vec<Value> = vec![];

                // WHERE 子句
                sql.push_str(&where_clause(&filters, quote_ident, bind_value, &mut params));

                // ORDER BY 子句
                sql.push_str(&order_clause(&orders, quote_ident));

                // 分页子句
                if let Some(page) = paging {
                    sql.push_str(&format!(" LIMIT {} OFFSET {}", page.limit(), page.offset()));
                }

                (sql, params)
            }
        };
        tracing::debug!(sql = %sql, params = params.len());

        let iter = self
            .conn
            .exec_iter(&sql, params)
            .map_err(|err| DriverError::Other(format!("执行查询失败: {}", err)))?;

        let columns: Vec<String> = iter
            .columns()
            .as_ref()
            .iter()
            .map(|col| col.name_str().to_string())
            .collect();

        let rows: Vec<mysql::Row> = iter
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| DriverError::Other(format!("读取结果失败: {}", err)))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let raw = row.unwrap();
            let mut map = HashMap::with_capacity(columns.len());
            for (idx, name) in columns.iter().enumerate() {
                let value = raw.get(idx).cloned().unwrap_or(Value::NULL);
                map.insert(name.clone(), parse_value(value));
            }
            records.push(map);
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
        let sql = format!("SHOW FULL COLUMNS FROM `{}`", escape_backtick(table));
        let rows: Vec<mysql::Row> = self
            .conn
            .query(&sql)
            .map_err(|err| DriverError::Other(format!("查询列信息失败: {}", err)))?;

        let mut columns = vec![];
        for row in rows {
            let name: String = row
                .get("Field")
                .ok_or_else(|| DriverError::Other("缺少 Field 字段".into()))?;

            let mut col = ColumnInfo {
                name,
                kind: String::new(),
                nullable: false,
                primary_key: false,
            };

            for field in ["Type", "Null", "Key"] {
                let value = row.get::<Value, _>(field).unwrap_or(Value::NULL);
                let parsed = parse_value(value).unwrap_or_default();
                match field {
                    "Key" => col.primary_key = parsed == "PRI",
                    "Null" => col.nullable = parsed.eq_ignore_ascii_case("YES"),
                    "Type" => col.kind = parsed,
                    _ => {}
                }
            }

            columns.push(col);
        }
        Ok(columns)
    }
}

fn open_conn(config: &MySQLOptions) -> Result<Conn, DriverError> {
    if config.host.trim().is_empty() {
        return Err(DriverError::MissingField("host".into()));
    }
    if config.username.trim().is_empty() {
        return Err(DriverError::MissingField("username".into()));
    }
    if config.password.trim().is_empty() {
        return Err(DriverError::MissingField("password".into()));
    }
    if config.database.trim().is_empty() {
        return Err(DriverError::MissingField("database".into()));
    }
    let port: u16 = config
        .port
        .trim()
        .parse()
        .map_err(|_| DriverError::InvalidField(format!("port: {}", config.port)))?;

    let mut builder = OptsBuilder::new();
    builder = builder.ip_or_hostname(Some(config.host.clone()));
    builder = builder.tcp_port(port);
    builder = builder.user(Some(config.username.clone()));
    builder = builder.pass(Some(config.password.clone()));
    builder = builder.db_name(Some(config.database.clone()));

    if config.use_tls {
        builder = builder.ssl_opts(Some(SslOpts::default()));
    }
    let opts = Opts::from(builder);
    Conn::new(opts).map_err(|err| DriverError::Other(format!("连接失败: {}", err)))
}

fn quote_ident(name: &str) -> String {
    format!("`{}`", escape_backtick(name))
}

fn bind_value(
    value: &ValueCond,
    item: Option<&str>,
) -> Option<Value> {
    match (value, item) {
        (_, Some(item)) => Some(Value::from(item)),
        (ValueCond::Number(n), None) => Some(Value::from(*n)),
        _ => None,
    }
}

fn parse_value(value: Value) -> Option<String> {
    let text = match value {
        Value::NULL => return None,
        Value::Bytes(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Value::Int(int) => int.to_string(),
        Value::UInt(uint) => uint.to_string(),
        Value::Float(float) => float.to_string(),
        Value::Double(double) => double.to_string(),
        Value::Date(year, month, day, hour, minute, second, micros) => {
            format!("{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}.{micros:06}")
        }
        Value::Time(neg, days, hours, minutes, seconds, micros) => {
            let sign = if neg { "-" } else { "" };
            format!("{sign}{days} {hours:02}:{minutes:02}:{seconds:02}.{micros:06}")
        }
    };
    Some(text)
}

fn format_columns(columns: &[String]) -> String {
    if columns.is_empty() {
        return "*".to_string();
    }

    columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
}

use std::collections::HashMap;

use courtside_core::{DatabaseSession, DriverError, FilterCond, OrderCond, Paging, QueryReq, QueryResp, Record};

use crate::TaskConfig;

/// 球员赛季统计表需要的列
pub const STAT_COLUMNS: &[&str] = &[
    "player_name",
    "season",
    "team",
    "position",
    "age",
    "games_played",
    "games_started",
    "games_started_percentage",
    "awards",
    "pg_minutes_played",
    "pg_points",
    "pg_rebounds",
    "pg_assists",
    "pg_steals",
    "pg_blocks",
    "pg_turnovers",
    "pg_personal_fouls",
    "pg_field_goal_pct",
    "pg_three_point_pct",
    "pg_free_throw_pct",
    "pg_effective_fg_pct",
    "pg_three_pointers",
    "pg_three_point_attempts",
    "total_points",
    "total_rebounds",
    "total_assists",
    "total_steals",
    "total_blocks",
    "adv_player_efficiency_rating",
    "adv_true_shooting_pct",
    "adv_usage_pct",
    "adv_offensive_rebound_pct",
    "adv_defensive_rebound_pct",
    "adv_total_rebound_pct",
    "adv_assist_pct",
    "adv_steal_pct",
    "adv_block_pct",
    "adv_turnover_pct",
    "adv_offensive_win_shares",
    "adv_defensive_win_shares",
    "adv_win_shares",
    "adv_win_shares_per_48",
    "adv_offensive_box_plus_minus",
    "adv_defensive_box_plus_minus",
    "adv_box_plus_minus",
    "adv_value_over_replacement",
];

/// 薪资表需要的列
pub const SALARY_COLUMNS: &[&str] = &["player_name", "season", "salary", "salary_formatted", "salary_rank"];

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error("表 {table} 缺少列: {}", .columns.join(", "))]
    MissingColumns { table: String, columns: Vec<String> },
    #[error("表 {table} 列 {column} 的值无法解析为数字: {value:?}")]
    Decode {
        table: String,
        column: String,
        value: String,
    },
}

/// 一名球员一个赛季的合并统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerSeasonStat {
    pub player_name: String,
    pub season: String,
    pub team: Option<String>,
    pub position: Option<String>,
    pub age: Option<i64>,
    pub games_played: Option<i64>,
    pub games_started: Option<i64>,
    pub games_started_pct: Option<f64>,
    pub awards: Option<String>,

    // 场均
    pub minutes: Option<f64>,
    pub points: Option<f64>,
    pub rebounds: Option<f64>,
    pub assists: Option<f64>,
    pub steals: Option<f64>,
    pub blocks: Option<f64>,
    pub turnovers: Option<f64>,
    pub fouls: Option<f64>,

    // 投篮
    pub fg_pct: Option<f64>,
    pub three_pct: Option<f64>,
    pub ft_pct: Option<f64>,
    pub efg_pct: Option<f64>,
    pub threes: Option<f64>,
    pub three_attempts: Option<f64>,

    // 赛季总计
    pub total_points: Option<i64>,
    pub total_rebounds: Option<i64>,
    pub total_assists: Option<i64>,
    pub total_steals: Option<i64>,
    pub total_blocks: Option<i64>,

    // 高阶数据
    pub per: Option<f64>,
    pub ts_pct: Option<f64>,
    pub usage_pct: Option<f64>,
    pub orb_pct: Option<f64>,
    pub drb_pct: Option<f64>,
    pub trb_pct: Option<f64>,
    pub ast_pct: Option<f64>,
    pub stl_pct: Option<f64>,
    pub blk_pct: Option<f64>,
    pub tov_pct: Option<f64>,

    // 胜利贡献与影响力
    pub ows: Option<f64>,
    pub dws: Option<f64>,
    pub ws: Option<f64>,
    pub ws_per_48: Option<f64>,
    pub obpm: Option<f64>,
    pub dbpm: Option<f64>,
    pub bpm: Option<f64>,
    pub vorp: Option<f64>,
}

impl PlayerSeasonStat {
    pub fn has_min_games(
        &self,
        min: i64,
    ) -> bool {
        self.games_played.is_some_and(|games| games >= min)
    }

    fn decode(fields: &Fields<'_>) -> Result<Option<Self>, SourceError> {
        let Some((player_name, season)) = fields.identity() else {
            return Ok(None);
        };

        Ok(Some(Self {
            player_name,
            season,
            team: fields.text("team"),
            position: fields.text("position"),
            age: fields.int("age")?,
            games_played: fields.int("games_played")?,
            games_started: fields.int("games_started")?,
            games_started_pct: fields.float("games_started_percentage")?,
            awards: fields.text("awards"),
            minutes: fields.float("pg_minutes_played")?,
            points: fields.float("pg_points")?,
            rebounds: fields.float("pg_rebounds")?,
            assists: fields.float("pg_assists")?,
            steals: fields.float("pg_steals")?,
            blocks: fields.float("pg_blocks")?,
            turnovers: fields.float("pg_turnovers")?,
            fouls: fields.float("pg_personal_fouls")?,
            fg_pct: fields.float("pg_field_goal_pct")?,
            three_pct: fields.float("pg_three_point_pct")?,
            ft_pct: fields.float("pg_free_throw_pct")?,
            efg_pct: fields.float("pg_effective_fg_pct")?,
            threes: fields.float("pg_three_pointers")?,
            three_attempts: fields.float("pg_three_point_attempts")?,
            total_points: fields.int("total_points")?,
            total_rebounds: fields.int("total_rebounds")?,
            total_assists: fields.int("total_assists")?,
            total_steals: fields.int("total_steals")?,
            total_blocks: fields.int("total_blocks")?,
            per: fields.float("adv_player_efficiency_rating")?,
            ts_pct: fields.float("adv_true_shooting_pct")?,
            usage_pct: fields.float("adv_usage_pct")?,
            orb_pct: fields.float("adv_offensive_rebound_pct")?,
            drb_pct: fields.float("adv_defensive_rebound_pct")?,
            trb_pct: fields.float("adv_total_rebound_pct")?,
            ast_pct: fields.float("adv_assist_pct")?,
            stl_pct: fields.float("adv_steal_pct")?,
            blk_pct: fields.float("adv_block_pct")?,
            tov_pct: fields.float("adv_turnover_pct")?,
            ows: fields.float("adv_offensive_win_shares")?,
            dws: fields.float("adv_defensive_win_shares")?,
            ws: fields.float("adv_win_shares")?,
            ws_per_48: fields.float("adv_win_shares_per_48")?,
            obpm: fields.float("adv_offensive_box_plus_minus")?,
            dbpm: fields.float("adv_defensive_box_plus_minus")?,
            bpm: fields.float("adv_box_plus_minus")?,
            vorp: fields.float("adv_value_over_replacement")?,
        }))
    }
}

/// 一名球员一个赛季的薪资
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerSalaryRecord {
    pub player_name: String,
    pub season: String,
    pub salary: Option<i64>,
    pub salary_formatted: Option<String>,
    pub salary_rank: Option<i64>,
}

impl PlayerSalaryRecord {
    fn decode(fields: &Fields<'_>) -> Result<Option<Self>, SourceError> {
        let Some((player_name, season)) = fields.identity() else {
            return Ok(None);
        };

        Ok(Some(Self {
            player_name,
            season,
            salary: fields.int("salary")?,
            salary_formatted: fields.text("salary_formatted"),
            salary_rank: fields.int("salary_rank")?,
        }))
    }
}

/// 按 (球员, 赛季) 索引的薪资，用于 LEFT JOIN
#[derive(Debug, Default)]
pub struct SalaryIndex {
    by_key: HashMap<(String, String), PlayerSalaryRecord>,
}

impl SalaryIndex {
    pub fn new(records: Vec<PlayerSalaryRecord>) -> Self {
        let mut by_key = HashMap::with_capacity(records.len());
        for record in records {
            let key = (record.player_name.clone(), record.season.clone());
            if by_key.contains_key(&key) {
                tracing::warn!("薪资记录重复，保留第一条: {} {}", key.0, key.1);
                continue;
            }
            by_key.insert(key, record);
        }
        Self { by_key }
    }

    pub fn get(
        &self,
        player_name: &str,
        season: &str,
    ) -> Option<&PlayerSalaryRecord> {
        self.by_key.get(&(player_name.to_string(), season.to_string()))
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }
}

/// 统计表的读取条件
#[derive(Debug, Clone, Default)]
pub struct StatFilter {
    pub min_games: Option<i64>,
    pub require_position: bool,
    /// 忽略配置中的赛季限制（用于读取历史赛季）
    pub all_seasons: bool,
}

impl StatFilter {
    pub fn min_games(min: i64) -> Self {
        Self {
            min_games: Some(min),
            ..Default::default()
        }
    }

    pub fn history() -> Self {
        Self {
            all_seasons: true,
            ..Default::default()
        }
    }

    pub fn with_position(mut self) -> Self {
        self.require_position = true;
        self
    }
}

/// 源数据读取器：分页读取两张源表并解析为强类型记录
pub struct Source<'a> {
    session: &'a mut dyn DatabaseSession,
    stats_table: &'a str,
    salary_table: &'a str,
    seasons: Option<&'a [String]>,
    batch: usize,
}

impl<'a> Source<'a> {
    pub fn new(
        session: &'a mut dyn DatabaseSession,
        config: &'a TaskConfig,
    ) -> Self {
        Self {
            session,
            stats_table: &config.stats_table,
            salary_table: &config.salary_table,
            seasons: config.seasons.as_deref(),
            batch: config.batch.max(1),
        }
    }

    pub fn stats(
        &mut self,
        filter: StatFilter,
    ) -> Result<Vec<PlayerSeasonStat>, SourceError> {
        let mut filters = vec![];
        if let Some(min) = filter.min_games {
            filters.push(FilterCond::at_least("games_played", min as f64));
        }
        if filter.require_position {
            filters.push(FilterCond::not_null("position"));
        }
        if let (false, Some(seasons)) = (filter.all_seasons, self.seasons) {
            filters.push(FilterCond::one_of("season", seasons.to_vec()));
        }

        let table = self.stats_table;
        let records = self.load(table, STAT_COLUMNS, filters)?;
        decode_all(table, &records, PlayerSeasonStat::decode)
    }

    pub fn salaries(&mut self) -> Result<SalaryIndex, SourceError> {
        let table = self.salary_table;
        let records = self.load(table, SALARY_COLUMNS, vec![])?;
        let salaries = decode_all(table, &records, PlayerSalaryRecord::decode)?;
        let index = SalaryIndex::new(salaries);
        tracing::debug!("薪资索引建立完成，共 {} 条", index.len());
        Ok(index)
    }

    fn load(
        &mut self,
        table: &str,
        required: &[&str],
        filters: Vec<FilterCond>,
    ) -> Result<Vec<Record>, SourceError> {
        self.verify_columns(table, required)?;

        let columns: Vec<String> = required.iter().map(|c| c.to_string()).collect();
        let orders = vec![
            OrderCond {
                field: "player_name".into(),
                ascending: true,
            },
            OrderCond {
                field: "season".into(),
                ascending: true,
            },
        ];

        let mut records = vec![];
        let mut page = 0;
        loop {
            tracing::debug!("读取 {} 第 {} 页，batch={}", table, page, self.batch);
            let resp = self.session.query(QueryReq::Builder {
                table: table.to_string(),
                columns: columns.clone(),
                paging: Some(Paging::new(page, self.batch)),
                orders: orders.clone(),
                filters: filters.clone(),
            })?;
            let QueryResp::Rows { rows, .. } = resp;

            let fetched = rows.len();
            records.extend(rows);
            if fetched < self.batch {
                break;
            }
            page += 1;
        }

        tracing::info!("表 {} 读取完成，共 {} 行", table, records.len());
        Ok(records)
    }

    fn verify_columns(
        &mut self,
        table: &str,
        required: &[&str],
    ) -> Result<(), SourceError> {
        let present = self.session.columns(table)?;
        for col in &present {
            tracing::debug!(
                "表 {} 列 {}: 类型 {}，可空 {}，主键 {}",
                table,
                col.name,
                col.kind,
                col.nullable,
                col.primary_key
            );
        }
        let missing: Vec<String> = required
            .iter()
            .filter(|name| !present.iter().any(|col| col.name.eq_ignore_ascii_case(name)))
            .map(|name| name.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SourceError::MissingColumns {
                table: table.to_string(),
                columns: missing,
            })
        }
    }
}

fn decode_all<T>(
    table: &str,
    records: &[Record],
    decode: impl Fn(&Fields<'_>) -> Result<Option<T>, SourceError>,
) -> Result<Vec<T>, SourceError> {
    let mut decoded = Vec::with_capacity(records.len());
    let mut skipped = 0usize;
    for record in records {
        match decode(&Fields { table, record })? {
            Some(value) => decoded.push(value),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::warn!("表 {} 有 {} 行缺少 player_name 或 season，已跳过", table, skipped);
    }
    Ok(decoded)
}

/// 单行记录的字段访问器
struct Fields<'a> {
    table: &'a str,
    record: &'a Record,
}

impl Fields<'_> {
    fn raw(
        &self,
        column: &str,
    ) -> Option<&str> {
        self.record.get(column).and_then(|value| value.as_deref())
    }

    fn identity(&self) -> Option<(String, String)> {
        let player = self.raw("player_name").filter(|s| !s.is_empty())?;
        let season = self.raw("season").filter(|s| !s.is_empty())?;
        Some((player.to_string(), season.to_string()))
    }

    fn text(
        &self,
        column: &str,
    ) -> Option<String> {
        self.raw(column).map(str::to_string)
    }

    fn float(
        &self,
        column: &str,
    ) -> Result<Option<f64>, SourceError> {
        match self.raw(column).map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse::<f64>()
                .map(|value| value.is_finite().then_some(value))
                .map_err(|_| self.decode_error(column, raw)),
        }
    }

    /// 整数列同时接受 "25" 与 "25.0"；带小数的值四舍五入
    fn int(
        &self,
        column: &str,
    ) -> Result<Option<i64>, SourceError> {
        match self.raw(column).map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => match raw.parse::<i64>() {
                Ok(value) => Ok(Some(value)),
                Err(_) => match raw.parse::<f64>() {
                    Ok(value) if value.is_finite() => Ok(Some(value.round() as i64)),
                    Ok(_) => Ok(None),
                    Err(_) => Err(self.decode_error(column, raw)),
                },
            },
        }
    }

    fn decode_error(
        &self,
        column: &str,
        raw: &str,
    ) -> SourceError {
        SourceError::Decode {
            table: self.table.to_string(),
            column: column.to_string(),
            value: raw.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, Option<&str>)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
            .collect()
    }

    #[test]
    fn decodes_numbers_tolerantly() {
        let rec = record(&[
            ("player_name", Some("A")),
            ("season", Some("2023-24")),
            ("games_played", Some("30.0")),
            ("age", Some(" 27 ")),
            ("pg_points", Some("20.5")),
            ("pg_rebounds", Some("")),
            ("adv_value_over_replacement", None),
            ("awards", Some("MVP-3,AS")),
        ]);
        let stat = PlayerSeasonStat::decode(&Fields {
            table: "player_merged_stats",
            record: &rec,
        })
        .unwrap()
        .unwrap();

        assert_eq!(stat.games_played, Some(30));
        assert_eq!(stat.age, Some(27));
        assert_eq!(stat.points, Some(20.5));
        assert_eq!(stat.rebounds, None);
        assert_eq!(stat.vorp, None);
        assert_eq!(stat.awards.as_deref(), Some("MVP-3,AS"));
        assert!(stat.has_min_games(30));
        assert!(!stat.has_min_games(31));
    }

    #[test]
    fn rejects_non_numeric_values() {
        let rec = record(&[
            ("player_name", Some("A")),
            ("season", Some("2023-24")),
            ("salary", Some("ten million")),
        ]);
        let err = PlayerSalaryRecord::decode(&Fields {
            table: "player_salaries",
            record: &rec,
        })
        .unwrap_err();
        assert!(matches!(err, SourceError::Decode { ref column, .. } if column == "salary"));
        assert!(err.to_string().contains("ten million"));
    }

    #[test]
    fn rows_without_identity_are_skipped() {
        let records = vec![
            record(&[("player_name", None), ("season", Some("2023-24"))]),
            record(&[("player_name", Some("B")), ("season", Some("2023-24")), ("salary", Some("1000000.4"))]),
        ];
        let salaries = decode_all("player_salaries", &records, PlayerSalaryRecord::decode).unwrap();
        assert_eq!(salaries.len(), 1);
        assert_eq!(salaries[0].salary, Some(1_000_000));
    }

    #[test]
    fn salary_index_keeps_first_duplicate() {
        let first = PlayerSalaryRecord {
            player_name: "A".into(),
            season: "2023-24".into(),
            salary: Some(1),
            ..Default::default()
        };
        let second = PlayerSalaryRecord {
            salary: Some(2),
            ..first.clone()
        };
        let index = SalaryIndex::new(vec![first, second]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("A", "2023-24").and_then(|s| s.salary), Some(1));
        assert!(index.get("A", "2022-23").is_none());
    }
}

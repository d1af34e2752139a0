use serde::Serialize;

use crate::metrics::{as_float, desc_nulls_last, millions, positive_ratio, round_opt, round_whole, season_year};
use crate::sink::Table;
use crate::source::{PlayerSeasonStat, SalaryIndex, Source, SourceError, StatFilter};
use crate::tiers::ValueCategory;

pub const MIN_GAMES: i64 = 20;

/// 性价比分析：只包含有薪资记录的球员赛季
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueAnalysisRow {
    pub player_name: String,
    pub season: String,
    pub team: Option<String>,
    pub position: Option<String>,
    pub age: Option<i64>,
    pub games_played: Option<i64>,
    pub salary: i64,
    pub salary_formatted: Option<String>,
    pub salary_rank: Option<i64>,

    pub pg_points: Option<f64>,
    pub pg_rebounds: Option<f64>,
    pub pg_assists: Option<f64>,
    pub pg_steals: Option<f64>,
    pub pg_blocks: Option<f64>,

    #[serde(rename = "PER")]
    pub per: Option<f64>,
    #[serde(rename = "TS_pct")]
    pub ts_pct: Option<f64>,
    pub usage_pct: Option<f64>,
    #[serde(rename = "WS")]
    pub ws: Option<f64>,
    #[serde(rename = "VORP")]
    pub vorp: Option<f64>,
    #[serde(rename = "BPM")]
    pub bpm: Option<f64>,
    #[serde(rename = "OBPM")]
    pub obpm: Option<f64>,
    #[serde(rename = "DBPM")]
    pub dbpm: Option<f64>,

    pub points_per_million: Option<f64>,
    #[serde(rename = "salary_per_WS")]
    pub salary_per_ws: Option<i64>,
    #[serde(rename = "salary_per_VORP")]
    pub salary_per_vorp: Option<i64>,
    pub value_score: Option<f64>,
    pub value_category: &'static str,

    pub season_year: Option<u32>,
}

impl Table for ValueAnalysisRow {
    const COLUMNS: &'static [&'static str] = &[
        "player_name", "season", "team", "position", "age", "games_played", "salary", "salary_formatted",
        "salary_rank", "pg_points", "pg_rebounds", "pg_assists", "pg_steals", "pg_blocks", "PER", "TS_pct",
        "usage_pct", "WS", "VORP", "BPM", "OBPM", "DBPM", "points_per_million", "salary_per_WS",
        "salary_per_VORP", "value_score", "value_category", "season_year",
    ];
}

pub fn fetch(source: &mut Source<'_>) -> Result<Vec<ValueAnalysisRow>, SourceError> {
    let stats = source.stats(StatFilter::min_games(MIN_GAMES))?;
    let salaries = source.salaries()?;
    Ok(derive(&stats, &salaries))
}

pub fn derive(
    stats: &[PlayerSeasonStat],
    salaries: &SalaryIndex,
) -> Vec<ValueAnalysisRow> {
    let mut rows: Vec<ValueAnalysisRow> = stats
        .iter()
        .filter(|stat| stat.has_min_games(MIN_GAMES))
        .filter_map(|stat| {
            let pay = salaries.get(&stat.player_name, &stat.season)?;
            let salary = pay.salary?;
            Some(build_row(stat, salary, pay.salary_formatted.clone(), pay.salary_rank))
        })
        .collect();

    rows.sort_by(|a, b| {
        b.season
            .cmp(&a.season)
            .then_with(|| desc_nulls_last(a.value_score, b.value_score))
            .then_with(|| a.player_name.cmp(&b.player_name))
    });
    rows
}

fn build_row(
    stat: &PlayerSeasonStat,
    salary: i64,
    salary_formatted: Option<String>,
    salary_rank: Option<i64>,
) -> ValueAnalysisRow {
    let pay = as_float(Some(salary));

    ValueAnalysisRow {
        player_name: stat.player_name.clone(),
        season: stat.season.clone(),
        team: stat.team.clone(),
        position: stat.position.clone(),
        age: stat.age,
        games_played: stat.games_played,
        salary,
        salary_formatted,
        salary_rank,

        pg_points: stat.points,
        pg_rebounds: stat.rebounds,
        pg_assists: stat.assists,
        pg_steals: stat.steals,
        pg_blocks: stat.blocks,

        per: stat.per,
        ts_pct: stat.ts_pct,
        usage_pct: stat.usage_pct,
        ws: stat.ws,
        vorp: stat.vorp,
        bpm: stat.bpm,
        obpm: stat.obpm,
        dbpm: stat.dbpm,

        points_per_million: round_opt(positive_ratio(stat.points, millions(pay)), 2),
        salary_per_ws: round_whole(positive_ratio(pay, stat.ws)),
        salary_per_vorp: round_whole(positive_ratio(pay, stat.vorp)),
        // 每百万薪资对应的 VORP × 100
        value_score: round_opt(positive_ratio(stat.vorp.map(|v| v * 1_000_000.0), pay).map(|r| r * 100.0), 2),
        value_category: ValueCategory::classify(salary_rank, stat.vorp).label(),

        season_year: season_year(&stat.season),
    }
}

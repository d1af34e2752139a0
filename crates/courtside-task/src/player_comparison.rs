use std::collections::HashMap;

use serde::Serialize;

use crate::metrics::{as_float, delta, desc_nulls_last, previous_season, ratio, round_opt, season_year};
use crate::sink::Table;
use crate::source::{PlayerSeasonStat, SalaryIndex, Source, SourceError, StatFilter};
use crate::tiers::{ImpactTrend, PerformanceTrend};

pub const MIN_GAMES: i64 = 20;

/// 球员同比：本赛季与紧邻上一赛季的对照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerComparisonRow {
    pub player_name: String,
    pub current_season: String,
    pub current_team: Option<String>,
    pub current_age: Option<i64>,
    pub current_salary: Option<i64>,
    pub current_salary_formatted: Option<String>,
    pub current_salary_rank: Option<i64>,
    pub current_games: Option<i64>,
    pub current_ppg: Option<f64>,
    pub current_rpg: Option<f64>,
    pub current_apg: Option<f64>,
    #[serde(rename = "current_PER")]
    pub current_per: Option<f64>,
    #[serde(rename = "current_TS_pct")]
    pub current_ts_pct: Option<f64>,
    #[serde(rename = "current_WS")]
    pub current_ws: Option<f64>,
    #[serde(rename = "current_VORP")]
    pub current_vorp: Option<f64>,
    #[serde(rename = "current_BPM")]
    pub current_bpm: Option<f64>,

    pub previous_season: Option<String>,
    pub previous_team: Option<String>,
    pub previous_salary: Option<i64>,
    pub previous_salary_rank: Option<i64>,
    pub previous_games: Option<i64>,
    pub previous_ppg: Option<f64>,
    pub previous_rpg: Option<f64>,
    pub previous_apg: Option<f64>,
    #[serde(rename = "previous_PER")]
    pub previous_per: Option<f64>,
    #[serde(rename = "previous_TS_pct")]
    pub previous_ts_pct: Option<f64>,
    #[serde(rename = "previous_WS")]
    pub previous_ws: Option<f64>,
    #[serde(rename = "previous_VORP")]
    pub previous_vorp: Option<f64>,
    #[serde(rename = "previous_BPM")]
    pub previous_bpm: Option<f64>,

    pub salary_change: Option<i64>,
    pub salary_change_pct: Option<f64>,
    pub ppg_change: Option<f64>,
    pub rpg_change: Option<f64>,
    pub apg_change: Option<f64>,
    pub vorp_change: Option<f64>,
    pub ws_change: Option<f64>,
    pub performance_trend: &'static str,
    pub impact_trend: &'static str,

    pub season_year: Option<u32>,
}

impl Table for PlayerComparisonRow {
    const COLUMNS: &'static [&'static str] = &[
        "player_name", "current_season", "current_team", "current_age", "current_salary",
        "current_salary_formatted", "current_salary_rank", "current_games", "current_ppg", "current_rpg",
        "current_apg", "current_PER", "current_TS_pct", "current_WS", "current_VORP", "current_BPM",
        "previous_season", "previous_team", "previous_salary", "previous_salary_rank", "previous_games",
        "previous_ppg", "previous_rpg", "previous_apg", "previous_PER", "previous_TS_pct", "previous_WS",
        "previous_VORP", "previous_BPM", "salary_change", "salary_change_pct", "ppg_change", "rpg_change",
        "apg_change", "vorp_change", "ws_change", "performance_trend", "impact_trend", "season_year",
    ];
}

/// 当前行需要满足出场数；上一赛季的行从全部历史中查找，不做出场限制
pub fn fetch(source: &mut Source<'_>) -> Result<Vec<PlayerComparisonRow>, SourceError> {
    let current = source.stats(StatFilter::min_games(MIN_GAMES))?;
    let history = source.stats(StatFilter::history())?;
    let salaries = source.salaries()?;
    Ok(derive(&current, &history, &salaries))
}

pub fn derive(
    current: &[PlayerSeasonStat],
    history: &[PlayerSeasonStat],
    salaries: &SalaryIndex,
) -> Vec<PlayerComparisonRow> {
    let mut by_key: HashMap<(&str, &str), &PlayerSeasonStat> = HashMap::with_capacity(history.len());
    for stat in history {
        by_key
            .entry((stat.player_name.as_str(), stat.season.as_str()))
            .or_insert(stat);
    }

    let mut rows: Vec<PlayerComparisonRow> = current
        .iter()
        .filter(|stat| stat.has_min_games(MIN_GAMES))
        .map(|stat| {
            let previous = previous_season(&stat.season)
                .and_then(|season| by_key.get(&(stat.player_name.as_str(), season.as_str())).copied());
            build_row(stat, previous, salaries)
        })
        .collect();

    rows.sort_by(|a, b| {
        b.current_season
            .cmp(&a.current_season)
            .then_with(|| desc_nulls_last(a.vorp_change, b.vorp_change))
            .then_with(|| a.player_name.cmp(&b.player_name))
    });
    rows
}

fn build_row(
    curr: &PlayerSeasonStat,
    prev: Option<&PlayerSeasonStat>,
    salaries: &SalaryIndex,
) -> PlayerComparisonRow {
    let curr_pay = salaries.get(&curr.player_name, &curr.season);
    let prev_pay = prev.and_then(|p| salaries.get(&p.player_name, &p.season));

    let curr_salary = curr_pay.and_then(|p| p.salary);
    let prev_salary = prev_pay.and_then(|p| p.salary);

    let salary_change = curr_salary.map(|c| c - prev_salary.unwrap_or(0));
    let salary_change_pct = match (curr_salary, prev_salary) {
        (Some(c), Some(p)) => round_opt(ratio(Some((c - p) as f64), as_float(Some(p))).map(|r| r * 100.0), 1),
        _ => None,
    };

    let prev_field = |f: fn(&PlayerSeasonStat) -> Option<f64>| prev.and_then(f);

    PlayerComparisonRow {
        player_name: curr.player_name.clone(),
        current_season: curr.season.clone(),
        current_team: curr.team.clone(),
        current_age: curr.age,
        current_salary: curr_salary,
        current_salary_formatted: curr_pay.and_then(|p| p.salary_formatted.clone()),
        current_salary_rank: curr_pay.and_then(|p| p.salary_rank),
        current_games: curr.games_played,
        current_ppg: curr.points,
        current_rpg: curr.rebounds,
        current_apg: curr.assists,
        current_per: curr.per,
        current_ts_pct: curr.ts_pct,
        current_ws: curr.ws,
        current_vorp: curr.vorp,
        current_bpm: curr.bpm,

        previous_season: prev.map(|p| p.season.clone()),
        previous_team: prev.and_then(|p| p.team.clone()),
        previous_salary: prev_salary,
        previous_salary_rank: prev_pay.and_then(|p| p.salary_rank),
        previous_games: prev.and_then(|p| p.games_played),
        previous_ppg: prev_field(|p| p.points),
        previous_rpg: prev_field(|p| p.rebounds),
        previous_apg: prev_field(|p| p.assists),
        previous_per: prev_field(|p| p.per),
        previous_ts_pct: prev_field(|p| p.ts_pct),
        previous_ws: prev_field(|p| p.ws),
        previous_vorp: prev_field(|p| p.vorp),
        previous_bpm: prev_field(|p| p.bpm),

        salary_change,
        salary_change_pct,
        ppg_change: delta(curr.points, prev_field(|p| p.points), 2),
        rpg_change: delta(curr.rebounds, prev_field(|p| p.rebounds), 2),
        apg_change: delta(curr.assists, prev_field(|p| p.assists), 2),
        vorp_change: delta(curr.vorp, prev_field(|p| p.vorp), 2),
        ws_change: delta(curr.ws, prev_field(|p| p.ws), 2),
        performance_trend: PerformanceTrend::classify(curr.points, prev_field(|p| p.points)).label(),
        impact_trend: ImpactTrend::classify(curr.vorp, prev_field(|p| p.vorp)).label(),

        season_year: season_year(&curr.season),
    }
}

use std::collections::BTreeMap;

use serde::Serialize;

use crate::metrics::{
    Distinct, Extent, Mean, Total, as_float, desc_nulls_last, ratio, round_opt, round_whole, season_year,
};
use crate::sink::Table;
use crate::source::{PlayerSeasonStat, SalaryIndex, Source, SourceError, StatFilter};

pub const MIN_GAMES: i64 = 10;

/// 球队赛季汇总：阵容、薪资总额与平均表现
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamSummaryRow {
    pub season: String,
    pub team: Option<String>,
    pub roster_count: usize,
    pub total_payroll: Option<i64>,
    pub avg_salary: Option<i64>,
    pub max_salary: Option<i64>,
    pub min_salary: Option<i64>,

    pub avg_ppg: Option<f64>,
    pub avg_rpg: Option<f64>,
    pub avg_apg: Option<f64>,
    pub avg_spg: Option<f64>,
    pub avg_bpg: Option<f64>,
    pub avg_fg_pct: Option<f64>,
    pub avg_3pt_pct: Option<f64>,
    pub avg_ts_pct: Option<f64>,
    pub avg_efg_pct: Option<f64>,

    #[serde(rename = "avg_PER")]
    pub avg_per: Option<f64>,
    #[serde(rename = "total_WS")]
    pub total_ws: Option<f64>,
    #[serde(rename = "avg_WS")]
    pub avg_ws: Option<f64>,
    #[serde(rename = "total_VORP")]
    pub total_vorp: Option<f64>,
    #[serde(rename = "avg_VORP")]
    pub avg_vorp: Option<f64>,
    #[serde(rename = "avg_BPM")]
    pub avg_bpm: Option<f64>,
    #[serde(rename = "avg_OBPM")]
    pub avg_obpm: Option<f64>,
    #[serde(rename = "avg_DBPM")]
    pub avg_dbpm: Option<f64>,

    pub team_total_points: Option<i64>,
    pub team_total_rebounds: Option<i64>,
    pub team_total_assists: Option<i64>,

    #[serde(rename = "payroll_per_WS")]
    pub payroll_per_ws: Option<i64>,
    #[serde(rename = "payroll_per_VORP")]
    pub payroll_per_vorp: Option<i64>,

    pub season_year: Option<u32>,
}

impl Table for TeamSummaryRow {
    const COLUMNS: &'static [&'static str] = &[
        "season", "team", "roster_count", "total_payroll", "avg_salary", "max_salary", "min_salary",
        "avg_ppg", "avg_rpg", "avg_apg", "avg_spg", "avg_bpg", "avg_fg_pct", "avg_3pt_pct", "avg_ts_pct",
        "avg_efg_pct", "avg_PER", "total_WS", "avg_WS", "total_VORP", "avg_VORP", "avg_BPM", "avg_OBPM",
        "avg_DBPM", "team_total_points", "team_total_rebounds", "team_total_assists", "payroll_per_WS",
        "payroll_per_VORP", "season_year",
    ];
}

#[derive(Debug, Default)]
struct TeamGroup {
    roster: Distinct,
    payroll: Total<i64>,
    salary_avg: Mean,
    salary_range: Extent,

    ppg: Mean,
    rpg: Mean,
    apg: Mean,
    spg: Mean,
    bpg: Mean,
    fg_pct: Mean,
    three_pct: Mean,
    ts_pct: Mean,
    efg_pct: Mean,

    per: Mean,
    ws_total: Total<f64>,
    ws: Mean,
    vorp_total: Total<f64>,
    vorp: Mean,
    bpm: Mean,
    obpm: Mean,
    dbpm: Mean,

    points: Total<i64>,
    rebounds: Total<i64>,
    assists: Total<i64>,
}

impl TeamGroup {
    fn push(
        &mut self,
        stat: &PlayerSeasonStat,
        salary: Option<i64>,
    ) {
        self.roster.push(&stat.player_name);
        self.payroll.push(salary);
        self.salary_avg.push(as_float(salary));
        self.salary_range.push(salary);

        self.ppg.push(stat.points);
        self.rpg.push(stat.rebounds);
        self.apg.push(stat.assists);
        self.spg.push(stat.steals);
        self.bpg.push(stat.blocks);
        self.fg_pct.push(stat.fg_pct);
        self.three_pct.push(stat.three_pct);
        self.ts_pct.push(stat.ts_pct);
        self.efg_pct.push(stat.efg_pct);

        self.per.push(stat.per);
        self.ws_total.push(stat.ws);
        self.ws.push(stat.ws);
        self.vorp_total.push(stat.vorp);
        self.vorp.push(stat.vorp);
        self.bpm.push(stat.bpm);
        self.obpm.push(stat.obpm);
        self.dbpm.push(stat.dbpm);

        self.points.push(stat.total_points);
        self.rebounds.push(stat.total_rebounds);
        self.assists.push(stat.total_assists);
    }

    fn finish(
        self,
        season: String,
        team: Option<String>,
    ) -> TeamSummaryRow {
        let payroll = as_float(self.payroll.value());

        TeamSummaryRow {
            season_year: season_year(&season),
            season,
            team,
            roster_count: self.roster.count(),
            total_payroll: self.payroll.value(),
            avg_salary: round_whole(self.salary_avg.value()),
            max_salary: self.salary_range.max(),
            min_salary: self.salary_range.min(),

            avg_ppg: self.ppg.rounded(2),
            avg_rpg: self.rpg.rounded(2),
            avg_apg: self.apg.rounded(2),
            avg_spg: self.spg.rounded(2),
            avg_bpg: self.bpg.rounded(2),
            avg_fg_pct: self.fg_pct.rounded(3),
            avg_3pt_pct: self.three_pct.rounded(3),
            avg_ts_pct: self.ts_pct.rounded(3),
            avg_efg_pct: self.efg_pct.rounded(3),

            avg_per: self.per.rounded(2),
            total_ws: round_opt(self.ws_total.value(), 2),
            avg_ws: self.ws.rounded(2),
            total_vorp: round_opt(self.vorp_total.value(), 2),
            avg_vorp: self.vorp.rounded(2),
            avg_bpm: self.bpm.rounded(2),
            avg_obpm: self.obpm.rounded(2),
            avg_dbpm: self.dbpm.rounded(2),

            team_total_points: self.points.value(),
            team_total_rebounds: self.rebounds.value(),
            team_total_assists: self.assists.value(),

            payroll_per_ws: round_whole(ratio(payroll, self.ws_total.value())),
            payroll_per_vorp: round_whole(ratio(payroll, self.vorp_total.value())),
        }
    }
}

pub fn fetch(source: &mut Source<'_>) -> Result<Vec<TeamSummaryRow>, SourceError> {
    let stats = source.stats(StatFilter::min_games(MIN_GAMES))?;
    let salaries = source.salaries()?;
    Ok(derive(&stats, &salaries))
}

pub fn derive(
    stats: &[PlayerSeasonStat],
    salaries: &SalaryIndex,
) -> Vec<TeamSummaryRow> {
    let mut groups: BTreeMap<(String, Option<String>), TeamGroup> = BTreeMap::new();
    for stat in stats.iter().filter(|stat| stat.has_min_games(MIN_GAMES)) {
        let salary = salaries.get(&stat.player_name, &stat.season).and_then(|p| p.salary);
        groups
            .entry((stat.season.clone(), stat.team.clone()))
            .or_default()
            .push(stat, salary);
    }

    let mut rows: Vec<TeamSummaryRow> = groups
        .into_iter()
        .map(|((season, team), group)| group.finish(season, team))
        .collect();

    rows.sort_by(|a, b| {
        b.season
            .cmp(&a.season)
            .then_with(|| desc_nulls_last(a.total_vorp, b.total_vorp))
            .then_with(|| a.team.cmp(&b.team))
    });
    rows
}

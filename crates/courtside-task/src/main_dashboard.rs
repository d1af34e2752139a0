use serde::Serialize;

use crate::metrics::{as_float, desc_nulls_last, millions, positive_ratio, round_opt, round_whole, season_year};
use crate::sink::Table;
use crate::source::{PlayerSeasonStat, SalaryIndex, Source, SourceError, StatFilter};
use crate::tiers::{ImpactTier, SalaryTier, ScoringTier, award_flag};

pub const MIN_GAMES: i64 = 10;

/// 主面板：每名球员每赛季一行，附带薪资、价值比与分档
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MainDashboardRow {
    pub player_name: String,
    pub season: String,
    pub team: Option<String>,
    pub position: Option<String>,
    pub age: Option<i64>,
    pub games_played: Option<i64>,
    pub games_started: Option<i64>,
    pub games_started_percentage: Option<f64>,
    pub awards: Option<String>,

    pub salary: Option<i64>,
    pub salary_formatted: Option<String>,
    pub salary_rank: Option<i64>,

    pub mpg: Option<f64>,
    pub ppg: Option<f64>,
    pub rpg: Option<f64>,
    pub apg: Option<f64>,
    pub spg: Option<f64>,
    pub bpg: Option<f64>,
    pub tov_pg: Option<f64>,
    pub pf_pg: Option<f64>,

    pub fg_pct: Option<f64>,
    pub three_pt_pct: Option<f64>,
    pub ft_pct: Option<f64>,
    pub efg_pct: Option<f64>,
    pub three_pm_pg: Option<f64>,
    pub three_pa_pg: Option<f64>,

    pub total_points: Option<i64>,
    pub total_rebounds: Option<i64>,
    pub total_assists: Option<i64>,
    pub total_steals: Option<i64>,
    pub total_blocks: Option<i64>,

    #[serde(rename = "PER")]
    pub per: Option<f64>,
    #[serde(rename = "TS_pct")]
    pub ts_pct: Option<f64>,
    pub usage_pct: Option<f64>,
    #[serde(rename = "ORB_pct")]
    pub orb_pct: Option<f64>,
    #[serde(rename = "DRB_pct")]
    pub drb_pct: Option<f64>,
    #[serde(rename = "TRB_pct")]
    pub trb_pct: Option<f64>,
    #[serde(rename = "AST_pct")]
    pub ast_pct: Option<f64>,
    #[serde(rename = "STL_pct")]
    pub stl_pct: Option<f64>,
    #[serde(rename = "BLK_pct")]
    pub blk_pct: Option<f64>,
    #[serde(rename = "TOV_pct")]
    pub tov_pct: Option<f64>,

    #[serde(rename = "OWS")]
    pub ows: Option<f64>,
    #[serde(rename = "DWS")]
    pub dws: Option<f64>,
    #[serde(rename = "WS")]
    pub ws: Option<f64>,
    #[serde(rename = "WS_per_48")]
    pub ws_per_48: Option<f64>,
    #[serde(rename = "OBPM")]
    pub obpm: Option<f64>,
    #[serde(rename = "DBPM")]
    pub dbpm: Option<f64>,
    #[serde(rename = "BPM")]
    pub bpm: Option<f64>,
    #[serde(rename = "VORP")]
    pub vorp: Option<f64>,

    pub points_per_million: Option<f64>,
    pub salary_per_win_share: Option<i64>,
    pub salary_per_vorp: Option<i64>,

    pub salary_tier: &'static str,
    pub scoring_tier: &'static str,
    pub impact_tier: &'static str,

    pub is_mvp_candidate: u8,
    pub is_allstar: u8,
    pub is_all_nba_first: u8,
    pub is_dpoy_candidate: u8,

    pub season_year: Option<u32>,
}

impl Table for MainDashboardRow {
    const COLUMNS: &'static [&'static str] = &[
        "player_name", "season", "team", "position", "age", "games_played", "games_started",
        "games_started_percentage", "awards", "salary", "salary_formatted", "salary_rank", "mpg", "ppg",
        "rpg", "apg", "spg", "bpg", "tov_pg", "pf_pg", "fg_pct", "three_pt_pct", "ft_pct", "efg_pct",
        "three_pm_pg", "three_pa_pg", "total_points", "total_rebounds", "total_assists", "total_steals",
        "total_blocks", "PER", "TS_pct", "usage_pct", "ORB_pct", "DRB_pct", "TRB_pct", "AST_pct", "STL_pct",
        "BLK_pct", "TOV_pct", "OWS", "DWS", "WS", "WS_per_48", "OBPM", "DBPM", "BPM", "VORP",
        "points_per_million", "salary_per_win_share", "salary_per_vorp", "salary_tier", "scoring_tier",
        "impact_tier", "is_mvp_candidate", "is_allstar", "is_all_nba_first", "is_dpoy_candidate",
        "season_year",
    ];
}

pub fn fetch(source: &mut Source<'_>) -> Result<Vec<MainDashboardRow>, SourceError> {
    let stats = source.stats(StatFilter::min_games(MIN_GAMES))?;
    let salaries = source.salaries()?;
    Ok(derive(&stats, &salaries))
}

pub fn derive(
    stats: &[PlayerSeasonStat],
    salaries: &SalaryIndex,
) -> Vec<MainDashboardRow> {
    let mut rows: Vec<MainDashboardRow> = stats
        .iter()
        .filter(|stat| stat.has_min_games(MIN_GAMES))
        .map(|stat| build_row(stat, salaries))
        .collect();

    rows.sort_by(|a, b| {
        b.season
            .cmp(&a.season)
            .then_with(|| desc_nulls_last(a.salary, b.salary))
            .then_with(|| a.player_name.cmp(&b.player_name))
    });
    rows
}

fn build_row(
    stat: &PlayerSeasonStat,
    salaries: &SalaryIndex,
) -> MainDashboardRow {
    let pay = salaries.get(&stat.player_name, &stat.season);
    let salary = pay.and_then(|p| p.salary);
    let salary_rank = pay.and_then(|p| p.salary_rank);
    let salary_millions = millions(as_float(salary));
    let awards = stat.awards.as_deref();

    MainDashboardRow {
        player_name: stat.player_name.clone(),
        season: stat.season.clone(),
        team: stat.team.clone(),
        position: stat.position.clone(),
        age: stat.age,
        games_played: stat.games_played,
        games_started: stat.games_started,
        games_started_percentage: stat.games_started_pct,
        awards: stat.awards.clone(),

        salary,
        salary_formatted: pay.and_then(|p| p.salary_formatted.clone()),
        salary_rank,

        mpg: stat.minutes,
        ppg: stat.points,
        rpg: stat.rebounds,
        apg: stat.assists,
        spg: stat.steals,
        bpg: stat.blocks,
        tov_pg: stat.turnovers,
        pf_pg: stat.fouls,

        fg_pct: stat.fg_pct,
        three_pt_pct: stat.three_pct,
        ft_pct: stat.ft_pct,
        efg_pct: stat.efg_pct,
        three_pm_pg: stat.threes,
        three_pa_pg: stat.three_attempts,

        total_points: stat.total_points,
        total_rebounds: stat.total_rebounds,
        total_assists: stat.total_assists,
        total_steals: stat.total_steals,
        total_blocks: stat.total_blocks,

        per: stat.per,
        ts_pct: stat.ts_pct,
        usage_pct: stat.usage_pct,
        orb_pct: stat.orb_pct,
        drb_pct: stat.drb_pct,
        trb_pct: stat.trb_pct,
        ast_pct: stat.ast_pct,
        stl_pct: stat.stl_pct,
        blk_pct: stat.blk_pct,
        tov_pct: stat.tov_pct,

        ows: stat.ows,
        dws: stat.dws,
        ws: stat.ws,
        ws_per_48: stat.ws_per_48,
        obpm: stat.obpm,
        dbpm: stat.dbpm,
        bpm: stat.bpm,
        vorp: stat.vorp,

        points_per_million: round_opt(positive_ratio(stat.points, salary_millions), 2),
        salary_per_win_share: round_whole(positive_ratio(as_float(salary), stat.ws)),
        salary_per_vorp: round_whole(positive_ratio(as_float(salary), stat.vorp)),

        salary_tier: SalaryTier::from_rank(salary_rank).label(),
        scoring_tier: ScoringTier::from_ppg(stat.points).label(),
        impact_tier: ImpactTier::from_vorp(stat.vorp).label(),

        is_mvp_candidate: award_flag(awards, "MVP"),
        is_allstar: award_flag(awards, "AS"),
        is_all_nba_first: award_flag(awards, "NBA1"),
        is_dpoy_candidate: award_flag(awards, "DPOY"),

        season_year: season_year(&stat.season),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{salary, serialized_header, stat};

    #[test]
    fn joins_salary_and_computes_value_ratios() {
        let mut a = stat("A", "2023-24", 30);
        a.points = Some(20.0);
        a.ws = Some(8.0);
        a.vorp = Some(4.0);
        let salaries = SalaryIndex::new(vec![salary("A", "2023-24", 10_000_000, 12)]);

        let rows = derive(&[a], &salaries);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.points_per_million, Some(2.0));
        assert_eq!(row.scoring_tier, "All-Star (20-25 PPG)");
        assert_eq!(row.salary_per_win_share, Some(1_250_000));
        assert_eq!(row.salary_per_vorp, Some(2_500_000));
        assert_eq!(row.salary_tier, "Top 30 (Max)");
        assert_eq!(row.impact_tier, "Star (4-6 VORP)");
        assert_eq!(row.salary_formatted.as_deref(), Some("$10,000,000"));
        assert_eq!(row.season_year, Some(2023));
    }

    #[test]
    fn ten_games_is_the_cutoff() {
        let rows = derive(
            &[stat("Ten", "2023-24", 10), stat("Nine", "2023-24", 9)],
            &SalaryIndex::default(),
        );
        let names: Vec<_> = rows.iter().map(|r| r.player_name.as_str()).collect();
        assert_eq!(names, vec!["Ten"]);
    }

    #[test]
    fn missing_salary_keeps_row_with_null_ratios() {
        let mut a = stat("A", "2023-24", 50);
        a.points = Some(30.0);
        a.ws = Some(10.0);
        a.awards = Some("MVP-1,AS,NBA1".into());

        let rows = derive(&[a], &SalaryIndex::default());
        let row = &rows[0];
        assert_eq!(row.salary, None);
        assert_eq!(row.points_per_million, None);
        assert_eq!(row.salary_per_win_share, None);
        assert_eq!(row.salary_tier, "Other");
        assert_eq!(
            (row.is_mvp_candidate, row.is_allstar, row.is_all_nba_first, row.is_dpoy_candidate),
            (1, 1, 1, 0)
        );
    }

    #[test]
    fn negative_vorp_yields_null_ratio() {
        let mut a = stat("A", "2023-24", 50);
        a.vorp = Some(-0.4);
        a.ws = Some(0.0);
        let salaries = SalaryIndex::new(vec![salary("A", "2023-24", 2_000_000, 300)]);

        let row = &derive(&[a], &salaries)[0];
        assert_eq!(row.salary_per_vorp, None);
        assert_eq!(row.salary_per_win_share, None);
        assert_eq!(row.impact_tier, "Below Average (<0 VORP)");
    }

    #[test]
    fn ordered_by_season_then_salary_desc() {
        let salaries = SalaryIndex::new(vec![
            salary("Low", "2023-24", 1_000_000, 200),
            salary("High", "2023-24", 40_000_000, 1),
            salary("Old", "2022-23", 50_000_000, 1),
        ]);
        let stats = [
            stat("Old", "2022-23", 70),
            stat("Unpaid", "2023-24", 70),
            stat("Low", "2023-24", 70),
            stat("High", "2023-24", 70),
        ];

        let rows = derive(&stats, &salaries);
        let names: Vec<_> = rows.iter().map(|r| r.player_name.as_str()).collect();
        assert_eq!(names, vec!["High", "Low", "Unpaid", "Old"]);
    }

    #[test]
    fn columns_follow_field_order() {
        let rows = derive(&[stat("A", "2023-24", 30)], &SalaryIndex::new(vec![]));
        assert_eq!(rows.len(), 1);
        assert_eq!(serialized_header(&rows[0]), MainDashboardRow::COLUMNS);
    }

    #[test]
    fn points_per_million_uses_four_place_millions() {
        let mut a = stat("A", "2023-24", 30);
        a.points = Some(25.0);
        let salaries = SalaryIndex::new(vec![salary("A", "2023-24", 1_000_203, 90)]);

        let rows = derive(&[a], &salaries);
        assert_eq!(rows[0].points_per_million, Some(25.0));
    }
}

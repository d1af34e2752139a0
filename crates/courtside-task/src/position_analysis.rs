use std::collections::BTreeMap;

use serde::Serialize;

use crate::metrics::{Distinct, Extent, Mean, as_float, desc_nulls_last, round_whole, season_year};
use crate::sink::Table;
use crate::source::{PlayerSeasonStat, SalaryIndex, Source, SourceError, StatFilter};

pub const MIN_GAMES: i64 = 40;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionAnalysisRow {
    pub position: String,
    pub season: String,
    pub player_count: usize,
    pub avg_salary: Option<i64>,
    pub max_salary: Option<i64>,
    pub min_salary: Option<i64>,
    pub avg_ppg: Option<f64>,
    pub avg_rpg: Option<f64>,
    pub avg_apg: Option<f64>,
    pub avg_spg: Option<f64>,
    pub avg_bpg: Option<f64>,
    #[serde(rename = "avg_TS_pct")]
    pub avg_ts_pct: Option<f64>,
    #[serde(rename = "avg_PER")]
    pub avg_per: Option<f64>,
    pub avg_usage_pct: Option<f64>,
    #[serde(rename = "avg_WS")]
    pub avg_ws: Option<f64>,
    #[serde(rename = "avg_VORP")]
    pub avg_vorp: Option<f64>,
    #[serde(rename = "avg_BPM")]
    pub avg_bpm: Option<f64>,
    pub season_year: Option<u32>,
}

impl Table for PositionAnalysisRow {
    const COLUMNS: &'static [&'static str] = &[
        "position", "season", "player_count", "avg_salary", "max_salary", "min_salary", "avg_ppg", "avg_rpg",
        "avg_apg", "avg_spg", "avg_bpg", "avg_TS_pct", "avg_PER", "avg_usage_pct", "avg_WS", "avg_VORP",
        "avg_BPM", "season_year",
    ];
}

#[derive(Debug, Default)]
struct PositionGroup {
    players: Distinct,
    salary_avg: Mean,
    salary_range: Extent,
    ppg: Mean,
    rpg: Mean,
    apg: Mean,
    spg: Mean,
    bpg: Mean,
    ts_pct: Mean,
    per: Mean,
    usage_pct: Mean,
    ws: Mean,
    vorp: Mean,
    bpm: Mean,
}

impl PositionGroup {
    fn push(
        &mut self,
        stat: &PlayerSeasonStat,
        salary: Option<i64>,
    ) {
        self.players.push(&stat.player_name);
        self.salary_avg.push(as_float(salary));
        self.salary_range.push(salary);
        self.ppg.push(stat.points);
        self.rpg.push(stat.rebounds);
        self.apg.push(stat.assists);
        self.spg.push(stat.steals);
        self.bpg.push(stat.blocks);
        self.ts_pct.push(stat.ts_pct);
        self.per.push(stat.per);
        self.usage_pct.push(stat.usage_pct);
        self.ws.push(stat.ws);
        self.vorp.push(stat.vorp);
        self.bpm.push(stat.bpm);
    }

    fn finish(
        self,
        position: String,
        season: String,
    ) -> PositionAnalysisRow {
        PositionAnalysisRow {
            position,
            season_year: season_year(&season),
            season,
            player_count: self.players.count(),
            avg_salary: round_whole(self.salary_avg.value()),
            max_salary: self.salary_range.max(),
            min_salary: self.salary_range.min(),
            avg_ppg: self.ppg.rounded(2),
            avg_rpg: self.rpg.rounded(2),
            avg_apg: self.apg.rounded(2),
            avg_spg: self.spg.rounded(2),
            avg_bpg: self.bpg.rounded(2),
            avg_ts_pct: self.ts_pct.rounded(3),
            avg_per: self.per.rounded(2),
            avg_usage_pct: self.usage_pct.rounded(2),
            avg_ws: self.ws.rounded(2),
            avg_vorp: self.vorp.rounded(2),
            avg_bpm: self.bpm.rounded(2),
        }
    }
}

pub fn fetch(source: &mut Source<'_>) -> Result<Vec<PositionAnalysisRow>, SourceError> {
    let stats = source.stats(StatFilter::min_games(MIN_GAMES).with_position())?;
    let salaries = source.salaries()?;
    Ok(derive(&stats, &salaries))
}

pub fn derive(
    stats: &[PlayerSeasonStat],
    salaries: &SalaryIndex,
) -> Vec<PositionAnalysisRow> {
    let mut groups: BTreeMap<(String, String), PositionGroup> = BTreeMap::new();
    for stat in stats.iter().filter(|stat| stat.has_min_games(MIN_GAMES)) {
        let Some(position) = &stat.position else {
            continue;
        };
        let salary = salaries.get(&stat.player_name, &stat.season).and_then(|p| p.salary);
        groups
            .entry((position.clone(), stat.season.clone()))
            .or_default()
            .push(stat, salary);
    }

    let mut rows: Vec<PositionAnalysisRow> = groups
        .into_iter()
        .map(|((position, season), group)| group.finish(position, season))
        .collect();

    rows.sort_by(|a, b| {
        b.season
            .cmp(&a.season)
            .then_with(|| desc_nulls_last(a.avg_vorp, b.avg_vorp))
            .then_with(|| a.position.cmp(&b.position))
    });
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{salary, serialized_header, stat};

    fn player(
        name: &str,
        position: Option<&str>,
        games: i64,
        vorp: f64,
    ) -> PlayerSeasonStat {
        let mut s = stat(name, "2023-24", games);
        s.position = position.map(str::to_string);
        s.vorp = Some(vorp);
        s
    }

    #[test]
    fn groups_by_position_with_forty_game_floor() {
        let stats = [
            player("A", Some("PG"), 40, 3.0),
            player("B", Some("PG"), 82, 1.0),
            player("C", Some("PG"), 39, 9.0),
            player("D", None, 82, 9.0),
            player("E", Some("C"), 60, 2.5),
        ];
        let salaries = SalaryIndex::new(vec![
            salary("A", "2023-24", 3_000_000, 200),
            salary("B", "2023-24", 2_000_001, 250),
        ]);

        let rows = derive(&stats, &salaries);
        assert_eq!(rows.len(), 2);

        let pg = &rows[0];
        assert_eq!(pg.position, "PG");
        assert_eq!(pg.player_count, 2);
        assert_eq!(pg.avg_vorp, Some(2.0));
        assert_eq!(pg.avg_salary, Some(2_500_001));
        assert_eq!((pg.min_salary, pg.max_salary), (Some(2_000_001), Some(3_000_000)));

        let c = &rows[1];
        assert_eq!(c.position, "C");
        assert_eq!(c.avg_salary, None);
        assert_eq!(c.season_year, Some(2023));
    }

    #[test]
    fn columns_follow_field_order() {
        let rows = derive(&[player("A", Some("PG"), 60, 1.0)], &SalaryIndex::new(vec![]));
        assert_eq!(rows.len(), 1);
        assert_eq!(serialized_header(&rows[0]), PositionAnalysisRow::COLUMNS);
    }
}

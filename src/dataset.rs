use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, params};

use crate::metrics::Outcome;
use crate::odds::OddsTriple;

const APP_CACHE_DIR: &str = "oddslab";

/// One historical fixture row with the bookmaker's closing 1X2 odds.
#[derive(Debug, Clone)]
pub struct StoredFixture {
    pub fixture_id: u64,
    pub league_id: u32,
    /// ISO-8601 date string; lexicographic order is chronological.
    pub date: String,
    pub home_team: String,
    pub away_team: String,
    pub home_odds: f64,
    pub draw_odds: f64,
    pub away_odds: f64,
    /// 0 = home, 1 = draw, 2 = away; None for fixtures not yet settled.
    pub outcome_code: Option<u8>,
}

impl StoredFixture {
    pub fn odds(&self) -> OddsTriple {
        OddsTriple {
            home: self.home_odds,
            draw: self.draw_odds,
            away: self.away_odds,
        }
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome_code.and_then(Outcome::from_code)
    }
}

#[derive(Debug, Clone)]
pub struct LeagueIngestSummary {
    pub league_id: u32,
    pub source: PathBuf,
    pub rows_total: usize,
    pub rows_upserted: usize,
    pub rows_skipped: usize,
    pub latest_date: Option<String>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub db_path: PathBuf,
    pub files: usize,
    pub rows_upserted: usize,
    pub rows_skipped: usize,
    pub per_league: HashMap<u32, LeagueIngestSummary>,
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(APP_CACHE_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(APP_CACHE_DIR))
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join("fixtures.sqlite"))
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS fixtures (
            fixture_id INTEGER PRIMARY KEY,
            league_id INTEGER NOT NULL,
            date TEXT NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            home_odds REAL NOT NULL,
            draw_odds REAL NOT NULL,
            away_odds REAL NOT NULL,
            outcome INTEGER NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_fixtures_league ON fixtures(league_id);
        CREATE INDEX IF NOT EXISTS idx_fixtures_date ON fixtures(date);

        CREATE TABLE IF NOT EXISTS ingest_runs (
            run_id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at TEXT NOT NULL,
            finished_at TEXT NULL,
            league_id INTEGER NOT NULL,
            source TEXT NOT NULL,
            rows_total INTEGER NOT NULL,
            rows_upserted INTEGER NOT NULL,
            rows_skipped INTEGER NOT NULL,
            errors_json TEXT NOT NULL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

pub fn ingest_csv_files(
    conn: &mut Connection,
    db_path: PathBuf,
    jobs: &[(u32, PathBuf)],
) -> Result<IngestSummary> {
    if jobs.is_empty() {
        return Err(anyhow!("no csv files passed to ingest"));
    }

    let mut per_league = HashMap::new();
    let mut rows_upserted = 0usize;
    let mut rows_skipped = 0usize;

    for (league_id, path) in jobs {
        let summary = ingest_csv_file(conn, *league_id, path)?;
        rows_upserted += summary.rows_upserted;
        rows_skipped += summary.rows_skipped;
        per_league.insert(*league_id, summary);
    }

    Ok(IngestSummary {
        db_path,
        files: jobs.len(),
        rows_upserted,
        rows_skipped,
        per_league,
    })
}

pub fn ingest_csv_file(
    conn: &mut Connection,
    league_id: u32,
    path: &Path,
) -> Result<LeagueIngestSummary> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read fixture csv {}", path.display()))?;
    let parsed = parse_fixture_csv(&raw, league_id)?;

    let started_at = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO ingest_runs(started_at, finished_at, league_id, source, rows_total, rows_upserted, rows_skipped, errors_json)
         VALUES (?1, NULL, ?2, ?3, ?4, 0, 0, '[]')",
        params![
            started_at,
            league_id as i64,
            path.display().to_string(),
            parsed.rows.len() as i64
        ],
    )
    .context("insert ingest run")?;
    let run_id = conn.last_insert_rowid();

    let mut rows_upserted = 0usize;
    let tx = conn.transaction().context("begin ingest transaction")?;
    for row in &parsed.rows {
        upsert_fixture(&tx, row)?;
        rows_upserted += 1;
    }
    tx.commit().context("commit ingest transaction")?;

    let finished_at = Utc::now().to_rfc3339();
    let errors_json = serde_json::to_string(&parsed.errors).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        "UPDATE ingest_runs
         SET finished_at = ?1, rows_upserted = ?2, rows_skipped = ?3, errors_json = ?4
         WHERE run_id = ?5",
        params![
            finished_at,
            rows_upserted as i64,
            parsed.errors.len() as i64,
            errors_json,
            run_id
        ],
    )
    .context("update ingest run")?;

    let latest_date = conn
        .query_row(
            "SELECT MAX(date) FROM fixtures WHERE league_id = ?1",
            params![league_id as i64],
            |row| row.get::<_, Option<String>>(0),
        )
        .context("query latest fixture date")?;

    Ok(LeagueIngestSummary {
        league_id,
        source: path.to_path_buf(),
        rows_total: parsed.rows.len() + parsed.errors.len(),
        rows_upserted,
        rows_skipped: parsed.errors.len(),
        latest_date,
        errors: parsed.errors,
    })
}

/// Settled fixtures with valid odds, in chronological `(date, fixture_id)` order.
pub fn load_settled_fixtures(conn: &Connection, league_id: u32) -> Result<Vec<StoredFixture>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                fixture_id, league_id, date, home_team, away_team,
                home_odds, draw_odds, away_odds, outcome
            FROM fixtures
            WHERE league_id = ?1
              AND outcome IS NOT NULL
            ORDER BY date ASC, fixture_id ASC
            "#,
        )
        .context("prepare load fixtures query")?;

    let rows = stmt
        .query_map(params![league_id as i64], |row| {
            Ok(StoredFixture {
                fixture_id: row.get::<_, u64>(0)?,
                league_id: row.get::<_, u32>(1)?,
                date: row.get(2)?,
                home_team: row.get(3)?,
                away_team: row.get(4)?,
                home_odds: row.get(5)?,
                draw_odds: row.get(6)?,
                away_odds: row.get(7)?,
                outcome_code: row.get::<_, Option<i64>>(8)?.map(|v| v as u8),
            })
        })
        .context("query load fixtures")?;

    let mut out = Vec::new();
    for row in rows {
        let fixture = row.context("decode fixture row")?;
        if fixture.odds().is_valid() {
            out.push(fixture);
        }
    }
    Ok(out)
}

pub fn count_fixtures_by_league(conn: &Connection) -> Result<Vec<(u32, usize, Option<String>)>> {
    let mut stmt = conn
        .prepare(
            "SELECT league_id, COUNT(*), MAX(date) FROM fixtures GROUP BY league_id ORDER BY league_id",
        )
        .context("prepare fixture count query")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, u32>(0)?,
                row.get::<_, i64>(1)? as usize,
                row.get::<_, Option<String>>(2)?,
            ))
        })
        .context("query fixture counts")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode count row")?);
    }
    Ok(out)
}

fn upsert_fixture(tx: &rusqlite::Transaction<'_>, f: &StoredFixture) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO fixtures (
            fixture_id, league_id, date, home_team, away_team,
            home_odds, draw_odds, away_odds, outcome, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(fixture_id) DO UPDATE SET
            league_id = excluded.league_id,
            date = excluded.date,
            home_team = excluded.home_team,
            away_team = excluded.away_team,
            home_odds = excluded.home_odds,
            draw_odds = excluded.draw_odds,
            away_odds = excluded.away_odds,
            outcome = excluded.outcome,
            updated_at = excluded.updated_at
        "#,
        params![
            f.fixture_id as i64,
            f.league_id as i64,
            f.date,
            f.home_team,
            f.away_team,
            f.home_odds,
            f.draw_odds,
            f.away_odds,
            f.outcome_code.map(|c| c as i64),
            Utc::now().to_rfc3339(),
        ],
    )
    .context("upsert fixture")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ParsedCsv {
    pub rows: Vec<StoredFixture>,
    pub errors: Vec<String>,
}

/// Parse a fixture CSV export. The header row names the columns; rows that
/// fail to parse are reported, not fatal.
pub fn parse_fixture_csv(raw: &str, league_id: u32) -> Result<ParsedCsv> {
    let mut lines = raw.lines().enumerate();
    let header = loop {
        match lines.next() {
            Some((_, line)) if line.trim().is_empty() => continue,
            Some((_, line)) => break line,
            None => return Err(anyhow!("fixture csv is empty")),
        }
    };

    let columns = split_csv_line(header)
        .into_iter()
        .map(|c| c.trim().to_ascii_lowercase())
        .collect::<Vec<_>>();
    let col = |name: &str| -> Result<usize> {
        columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| anyhow!("fixture csv missing column `{name}`"))
    };

    let idx_id = col("fixture_id")?;
    let idx_home = col("home_team")?;
    let idx_away = col("away_team")?;
    let idx_date = col("date")?;
    let idx_home_odds = col("home_win_odds")?;
    let idx_draw_odds = col("draw_odds")?;
    let idx_away_odds = col("away_win_odds")?;
    let idx_outcome = columns.iter().position(|c| c == "outcome");
    let idx_league = columns.iter().position(|c| c == "league_id");

    let mut rows = Vec::new();
    let mut errors = Vec::new();

    for (line_no, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let cells = split_csv_line(line);
        match parse_fixture_row(
            &cells,
            line_no + 1,
            league_id,
            idx_id,
            idx_home,
            idx_away,
            idx_date,
            idx_home_odds,
            idx_draw_odds,
            idx_away_odds,
            idx_outcome,
            idx_league,
        ) {
            Ok(row) => rows.push(row),
            Err(err) => errors.push(err.to_string()),
        }
    }

    Ok(ParsedCsv { rows, errors })
}

#[allow(clippy::too_many_arguments)]
fn parse_fixture_row(
    cells: &[String],
    line_no: usize,
    fallback_league_id: u32,
    idx_id: usize,
    idx_home: usize,
    idx_away: usize,
    idx_date: usize,
    idx_home_odds: usize,
    idx_draw_odds: usize,
    idx_away_odds: usize,
    idx_outcome: Option<usize>,
    idx_league: Option<usize>,
) -> Result<StoredFixture> {
    let cell = |idx: usize| -> Result<&str> {
        cells
            .get(idx)
            .map(|s| s.trim())
            .ok_or_else(|| anyhow!("line {line_no}: missing column {idx}"))
    };

    let fixture_id = cell(idx_id)?
        .parse::<u64>()
        .with_context(|| format!("line {line_no}: bad fixture_id"))?;
    let home_team = cell(idx_home)?.to_string();
    let away_team = cell(idx_away)?.to_string();
    if home_team.is_empty() || away_team.is_empty() {
        return Err(anyhow!("line {line_no}: empty team name"));
    }
    let date = cell(idx_date)?.to_string();
    if date.is_empty() {
        return Err(anyhow!("line {line_no}: empty date"));
    }

    let parse_odds = |idx: usize, name: &str| -> Result<f64> {
        cell(idx)?
            .parse::<f64>()
            .with_context(|| format!("line {line_no}: bad {name}"))
    };
    let home_odds = parse_odds(idx_home_odds, "home_win_odds")?;
    let draw_odds = parse_odds(idx_draw_odds, "draw_odds")?;
    let away_odds = parse_odds(idx_away_odds, "away_win_odds")?;

    let outcome_code = match idx_outcome {
        Some(idx) => {
            let raw = cells.get(idx).map(|s| s.trim()).unwrap_or("");
            if raw.is_empty() {
                None
            } else {
                let code = raw
                    .parse::<u8>()
                    .with_context(|| format!("line {line_no}: bad outcome"))?;
                if code > 2 {
                    return Err(anyhow!("line {line_no}: outcome {code} out of range"));
                }
                Some(code)
            }
        }
        None => None,
    };

    let league_id = idx_league
        .and_then(|idx| cells.get(idx))
        .and_then(|raw| raw.trim().parse::<u32>().ok())
        .filter(|id| *id != 0)
        .unwrap_or(fallback_league_id);

    Ok(StoredFixture {
        fixture_id,
        league_id,
        date,
        home_team,
        away_team,
        home_odds,
        draw_odds,
        away_odds,
        outcome_code,
    })
}

/// Minimal RFC-4180 field splitting: commas inside double quotes are literal,
/// `""` inside a quoted field is an escaped quote.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                out.push(std::mem::take(&mut field));
            }
            _ => field.push(ch),
        }
    }
    out.push(field);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_csv_line_handles_quotes() {
        assert_eq!(split_csv_line("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(
            split_csv_line(r#"1,"Inter, Milan",2.0"#),
            vec!["1", "Inter, Milan", "2.0"]
        );
        assert_eq!(split_csv_line(r#""say ""hi""",x"#), vec![r#"say "hi""#, "x"]);
    }

    #[test]
    fn parse_fixture_csv_reads_header_order() {
        let raw = "date,fixture_id,home_team,away_team,draw_odds,home_win_odds,away_win_odds,outcome\n\
                   2024-08-17,1001,Arsenal,Wolves,5.20,1.35,9.00,0\n\
                   2024-08-18,1002,Brentford,Palace,3.40,2.45,3.05,\n";
        let parsed = parse_fixture_csv(raw, 47).unwrap();
        assert_eq!(parsed.rows.len(), 2);
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.rows[0].fixture_id, 1001);
        assert_eq!(parsed.rows[0].home_odds, 1.35);
        assert_eq!(parsed.rows[0].outcome_code, Some(0));
        assert_eq!(parsed.rows[1].outcome_code, None);
        assert_eq!(parsed.rows[1].league_id, 47);
    }

    #[test]
    fn parse_fixture_csv_reports_bad_rows() {
        let raw = "fixture_id,home_team,away_team,date,home_win_odds,draw_odds,away_win_odds,outcome\n\
                   1001,A,B,2024-01-01,2.0,3.0,4.0,0\n\
                   oops,A,B,2024-01-02,2.0,3.0,4.0,1\n\
                   1003,A,B,2024-01-03,2.0,3.0,4.0,7\n";
        let parsed = parse_fixture_csv(raw, 1).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.errors.len(), 2);
    }

    #[test]
    fn missing_column_is_fatal() {
        let raw = "fixture_id,home_team,away_team,date\n1,A,B,2024-01-01\n";
        assert!(parse_fixture_csv(raw, 1).is_err());
    }

    #[test]
    fn sqlite_roundtrip_orders_by_date() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let rows = [
            ("2024-02-01", 7u64, Some(2u8)),
            ("2024-01-01", 9, Some(0)),
            ("2024-01-01", 3, Some(1)),
            ("2024-03-01", 1, None),
        ];
        let tx_rows: Vec<StoredFixture> = rows
            .iter()
            .map(|(date, id, outcome)| StoredFixture {
                fixture_id: *id,
                league_id: 47,
                date: date.to_string(),
                home_team: "H".to_string(),
                away_team: "A".to_string(),
                home_odds: 2.0,
                draw_odds: 3.3,
                away_odds: 3.6,
                outcome_code: *outcome,
            })
            .collect();

        let mut conn = conn;
        let tx = conn.transaction().unwrap();
        for row in &tx_rows {
            upsert_fixture(&tx, row).unwrap();
        }
        tx.commit().unwrap();

        let loaded = load_settled_fixtures(&conn, 47).unwrap();
        let ids: Vec<u64> = loaded.iter().map(|f| f.fixture_id).collect();
        // Unsettled fixture 1 filtered, ties broken by fixture_id.
        assert_eq!(ids, vec![3, 9, 7]);
    }
}

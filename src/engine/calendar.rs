use rusqlite::{Connection, OptionalExtension};

use super::offerings::{self, Offering};
use super::{new_id, EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct AcademicYear {
    pub id: String,
    pub college_id: String,
    pub year_label: String,
    pub active: bool,
}

#[derive(Debug)]
pub struct ResolvedOfferings {
    pub academic_year: AcademicYear,
    pub offerings: Vec<Offering>,
}

fn year_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AcademicYear> {
    Ok(AcademicYear {
        id: row.get(0)?,
        college_id: row.get(1)?,
        year_label: row.get(2)?,
        active: row.get::<_, i64>(3)? != 0,
    })
}

pub fn get_academic_year(conn: &Connection, year_id: &str) -> EngineResult<AcademicYear> {
    conn.query_row(
        "SELECT id, college_id, year_label, active FROM academic_years WHERE id = ?",
        [year_id],
        year_from_row,
    )
    .optional()?
    .ok_or_else(|| EngineError::NotFound {
        entity: "academic_year",
        id: year_id.to_string(),
    })
}

/// Active years for a college, newest first. The "YYYY-YY" label convention
/// makes lexical descending order a recency proxy; stale active rows from old
/// migrations simply sort later and get probed later.
fn active_years_desc(conn: &Connection, college_id: &str) -> EngineResult<Vec<AcademicYear>> {
    let mut stmt = conn.prepare(
        "SELECT id, college_id, year_label, active FROM academic_years
         WHERE college_id = ? AND active = 1
         ORDER BY year_label DESC",
    )?;
    let rows = stmt
        .query_map([college_id], year_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Lazy year creation, settled atomically on UNIQUE(college_id, year_label).
pub fn find_or_create_academic_year(
    conn: &Connection,
    college_id: &str,
    year_label: &str,
) -> EngineResult<AcademicYear> {
    let college_exists: Option<i64> = conn
        .query_row("SELECT 1 FROM colleges WHERE id = ?", [college_id], |r| {
            r.get(0)
        })
        .optional()?;
    if college_exists.is_none() {
        return Err(EngineError::NotFound {
            entity: "college",
            id: college_id.to_string(),
        });
    }
    conn.execute(
        "INSERT INTO academic_years(id, college_id, year_label, active)
         VALUES(?, ?, ?, 1)
         ON CONFLICT(college_id, year_label) DO NOTHING",
        (new_id(), college_id, year_label),
    )?;
    conn.query_row(
        "SELECT id, college_id, year_label, active FROM academic_years
         WHERE college_id = ? AND year_label = ?",
        (college_id, year_label),
        year_from_row,
    )
    .optional()?
    .ok_or_else(|| EngineError::NotFound {
        entity: "academic_year",
        id: year_label.to_string(),
    })
}

/// Resolve which academic year carries the department's offerings for a
/// semester. An explicit year short-circuits the search; otherwise each
/// active year is probed newest-first and the first one that yields at least
/// one core offering wins. An empty year is skipped, never returned.
pub fn resolve_offerings_for_semester(
    conn: &Connection,
    college_id: &str,
    department_id: &str,
    semester: i64,
    explicit_year_id: Option<&str>,
) -> EngineResult<ResolvedOfferings> {
    if let Some(year_id) = explicit_year_id {
        let year = get_academic_year(conn, year_id)?;
        let offerings =
            offerings::core_offerings_for_department(conn, department_id, semester, year_id, false)?;
        return Ok(ResolvedOfferings {
            academic_year: year,
            offerings,
        });
    }

    for year in active_years_desc(conn, college_id)? {
        let offerings = offerings::core_offerings_for_department(
            conn,
            department_id,
            semester,
            &year.id,
            false,
        )?;
        if !offerings.is_empty() {
            return Ok(ResolvedOfferings {
                academic_year: year,
                offerings,
            });
        }
    }

    Err(EngineError::NoUsableAcademicYear {
        college_id: college_id.to_string(),
        semester,
    })
}

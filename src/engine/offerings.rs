use rusqlite::{Connection, OptionalExtension};

use super::{new_id, EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct Offering {
    pub id: String,
    pub course_id: String,
    pub course_code: String,
    pub semester: i64,
    pub academic_year_id: String,
    pub section_id: Option<String>,
    pub teacher_id: Option<String>,
}

/// Semesters 1-2 are year 1, 3-4 year 2, 5-6 year 3, 7-8 year 4.
pub fn semester_to_year(semester: i64) -> i64 {
    (semester + 1) / 2
}

/// Extract year-of-study from a course code shaped like `CS301` or `MATH4102`:
/// 2-4 uppercase letters, one digit 1-4, then 2-3 trailing digits. Codes that
/// do not match are treated as year-unknown and default to 1.
pub fn year_of_study_from_code(code: &str) -> i64 {
    let bytes = code.as_bytes();
    let letters = bytes
        .iter()
        .take_while(|b| b.is_ascii_uppercase())
        .count();
    if !(2..=4).contains(&letters) {
        return 1;
    }
    let digits = &bytes[letters..];
    if !(3..=4).contains(&digits.len()) || !digits.iter().all(|b| b.is_ascii_digit()) {
        return 1;
    }
    match digits[0] {
        b'1'..=b'4' => (digits[0] - b'0') as i64,
        _ => 1,
    }
}

fn offering_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Offering> {
    Ok(Offering {
        id: row.get(0)?,
        course_id: row.get(1)?,
        course_code: row.get(2)?,
        semester: row.get(3)?,
        academic_year_id: row.get(4)?,
        section_id: row.get(5)?,
        teacher_id: row.get(6)?,
    })
}

const OFFERING_COLS: &str = "o.id, o.course_id, c.code, o.semester, o.academic_year_id, o.section_id, o.teacher_id";

pub fn get_offering(conn: &Connection, offering_id: &str) -> EngineResult<Offering> {
    let sql = format!(
        "SELECT {} FROM course_offerings o JOIN courses c ON c.id = o.course_id WHERE o.id = ?",
        OFFERING_COLS
    );
    conn.query_row(&sql, [offering_id], offering_from_row)
        .optional()?
        .ok_or_else(|| EngineError::NotFound {
            entity: "offering",
            id: offering_id.to_string(),
        })
}

fn find_offering(
    conn: &Connection,
    course_id: &str,
    semester: i64,
    academic_year_id: &str,
    section_id: Option<&str>,
) -> EngineResult<Option<Offering>> {
    let sql = format!(
        "SELECT {} FROM course_offerings o JOIN courses c ON c.id = o.course_id
         WHERE o.course_id = ? AND o.semester = ? AND o.academic_year_id = ?
           AND IFNULL(o.section_id, '') = IFNULL(?, '')",
        OFFERING_COLS
    );
    Ok(conn
        .query_row(
            &sql,
            (course_id, semester, academic_year_id, section_id),
            offering_from_row,
        )
        .optional()?)
}

/// Find the offering for (course, semester, year[, section]), creating it if
/// missing. Creation races are settled by the unique offering identity index:
/// `INSERT .. ON CONFLICT DO NOTHING` followed by a read-back, never a blind
/// insert after a separate existence check.
pub fn find_or_create_offering(
    conn: &Connection,
    course_id: &str,
    semester: i64,
    academic_year_id: &str,
    section_id: Option<&str>,
    teacher_id: Option<&str>,
) -> EngineResult<Offering> {
    let course_exists: Option<i64> = conn
        .query_row("SELECT 1 FROM courses WHERE id = ?", [course_id], |r| {
            r.get(0)
        })
        .optional()?;
    if course_exists.is_none() {
        return Err(EngineError::NotFound {
            entity: "course",
            id: course_id.to_string(),
        });
    }

    conn.execute(
        "INSERT INTO course_offerings(id, course_id, semester, academic_year_id, section_id, teacher_id)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT DO NOTHING",
        (
            new_id(),
            course_id,
            semester,
            academic_year_id,
            section_id,
            teacher_id,
        ),
    )?;

    find_offering(conn, course_id, semester, academic_year_id, section_id)?.ok_or_else(|| {
        EngineError::NotFound {
            entity: "offering",
            id: course_id.to_string(),
        }
    })
}

/// Offerings for every core course of a department in one semester/year.
/// With `create_missing` the admin flows lazily materialize one offering per
/// core course (section/teacher left unset); without it this is a pure read
/// used by the calendar resolver to probe candidate years.
pub fn core_offerings_for_department(
    conn: &Connection,
    department_id: &str,
    semester: i64,
    academic_year_id: &str,
    create_missing: bool,
) -> EngineResult<Vec<Offering>> {
    let dept_exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM departments WHERE id = ?",
            [department_id],
            |r| r.get(0),
        )
        .optional()?;
    if dept_exists.is_none() {
        return Err(EngineError::NotFound {
            entity: "department",
            id: department_id.to_string(),
        });
    }

    if create_missing {
        let mut stmt = conn.prepare(
            "SELECT id FROM courses WHERE department_id = ? AND course_type = 'core' ORDER BY code",
        )?;
        let course_ids = stmt
            .query_map([department_id], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        for course_id in &course_ids {
            find_or_create_offering(conn, course_id, semester, academic_year_id, None, None)?;
        }
    }

    let sql = format!(
        "SELECT {} FROM course_offerings o
         JOIN courses c ON c.id = o.course_id
         WHERE c.department_id = ? AND c.course_type = 'core'
           AND o.semester = ? AND o.academic_year_id = ?
         ORDER BY c.code",
        OFFERING_COLS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map((department_id, semester, academic_year_id), offering_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Matcher entry point for callers that only know the course code. When no
/// semester is supplied, the year digit embedded in the code picks the
/// year-of-study and the odd (first) semester of that year is assumed.
pub fn find_or_create_offering_by_code(
    conn: &Connection,
    course_code: &str,
    semester: Option<i64>,
    academic_year_id: &str,
    section_id: Option<&str>,
    teacher_id: Option<&str>,
) -> EngineResult<Offering> {
    let course_id: Option<String> = conn
        .query_row("SELECT id FROM courses WHERE code = ?", [course_code], |r| {
            r.get(0)
        })
        .optional()?;
    let Some(course_id) = course_id else {
        return Err(EngineError::NotFound {
            entity: "course",
            id: course_code.to_string(),
        });
    };
    let semester =
        semester.unwrap_or_else(|| year_of_study_from_code(course_code) * 2 - 1);
    find_or_create_offering(
        conn,
        &course_id,
        semester,
        academic_year_id,
        section_id,
        teacher_id,
    )
}

/// Single-course lookup used by flows that are not allowed to create
/// offerings (teacher-side entry points).
pub fn require_offering(
    conn: &Connection,
    course_id: &str,
    semester: i64,
    academic_year_id: &str,
    section_id: Option<&str>,
) -> EngineResult<Offering> {
    find_offering(conn, course_id, semester, academic_year_id, section_id)?.ok_or_else(|| {
        EngineError::NoOfferingAndCreationNotPermitted {
            course_id: course_id.to_string(),
            semester,
        }
    })
}

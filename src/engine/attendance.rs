use rusqlite::{Connection, OptionalExtension};

use super::offerings;
use super::{new_id, EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub offering_id: String,
    pub teacher_id: String,
    pub class_date: String,
    pub period: i64,
    pub status: String,
    pub syllabus: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AttendanceRecord {
    pub id: String,
    pub session_id: String,
    pub student_id: String,
    pub status: String,
}

/// `unmarked` is not a persisted value: setting it deletes the record, and a
/// missing record is what "unmarked" means on read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarkStatus {
    Present,
    Absent,
    Unmarked,
}

impl MarkStatus {
    pub fn parse(s: &str) -> Option<MarkStatus> {
        match s {
            "present" => Some(MarkStatus::Present),
            "absent" => Some(MarkStatus::Absent),
            "unmarked" => Some(MarkStatus::Unmarked),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            MarkStatus::Present => "present",
            MarkStatus::Absent => "absent",
            MarkStatus::Unmarked => "unmarked",
        }
    }
}

const SESSION_STATUSES: [&str; 4] = ["scheduled", "held", "confirmed", "cancelled"];

/// Statuses that count toward classes-completed and attendance averages.
fn status_counts_toward_totals(status: &str) -> bool {
    status == "held" || status == "confirmed"
}

fn session_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        offering_id: row.get(1)?,
        teacher_id: row.get(2)?,
        class_date: row.get(3)?,
        period: row.get(4)?,
        status: row.get(5)?,
        syllabus: row.get(6)?,
    })
}

pub fn get_session(conn: &Connection, session_id: &str) -> EngineResult<Session> {
    conn.query_row(
        "SELECT id, offering_id, teacher_id, class_date, period, status, syllabus
         FROM attendance_sessions WHERE id = ?",
        [session_id],
        session_from_row,
    )
    .optional()?
    .ok_or_else(|| EngineError::NotFound {
        entity: "session",
        id: session_id.to_string(),
    })
}

/// Create the session for (offering, date, period, teacher). An explicit
/// request to create one that already exists is a conflict, not an idempotent
/// return: the whole-class entry point treats a second create as a caller
/// mistake. With `eager_fill` one `absent` record is seeded per currently
/// enrolled student; the per-record `ON CONFLICT DO NOTHING` keeps the seed
/// convergent with records created student-by-student.
pub fn create_session(
    conn: &Connection,
    offering_id: &str,
    teacher_id: &str,
    class_date: &str,
    period: i64,
    eager_fill: bool,
    syllabus: Option<&str>,
) -> EngineResult<(Session, usize)> {
    offerings::get_offering(conn, offering_id)?;

    let inserted = conn.execute(
        "INSERT INTO attendance_sessions(id, offering_id, teacher_id, class_date, period, status, syllabus)
         VALUES(?, ?, ?, ?, ?, 'held', ?)
         ON CONFLICT(offering_id, class_date, period, teacher_id) DO NOTHING",
        (new_id(), offering_id, teacher_id, class_date, period, syllabus),
    )?;
    if inserted == 0 {
        return Err(EngineError::Conflict {
            message: format!(
                "session already exists for offering {} on {} period {}",
                offering_id, class_date, period
            ),
        });
    }

    let session = conn.query_row(
        "SELECT id, offering_id, teacher_id, class_date, period, status, syllabus
         FROM attendance_sessions
         WHERE offering_id = ? AND class_date = ? AND period = ? AND teacher_id = ?",
        (offering_id, class_date, period, teacher_id),
        session_from_row,
    )?;

    let mut seeded = 0usize;
    if eager_fill {
        let mut stmt =
            conn.prepare("SELECT student_id FROM enrollments WHERE offering_id = ?")?;
        let student_ids = stmt
            .query_map([offering_id], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        for student_id in student_ids {
            seeded += conn.execute(
                "INSERT INTO attendance_records(id, session_id, student_id, status)
                 VALUES(?, ?, ?, 'absent')
                 ON CONFLICT(session_id, student_id) DO NOTHING",
                (new_id(), &session.id, &student_id),
            )?;
        }
    }

    Ok((session, seeded))
}

/// Single-student status update. Present/absent is an atomic upsert under
/// UNIQUE(session_id, student_id); unmarked deletes the row. Returns the
/// record as persisted, or None once unmarked.
pub fn set_attendance(
    conn: &Connection,
    session_id: &str,
    student_id: &str,
    status: MarkStatus,
) -> EngineResult<Option<AttendanceRecord>> {
    let session = get_session(conn, session_id)?;

    // Writes are only valid against an actual enrollment in the session's
    // offering.
    let enrolled: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM enrollments WHERE student_id = ? AND offering_id = ?",
            (student_id, &session.offering_id),
            |r| r.get(0),
        )
        .optional()?;
    if enrolled.is_none() {
        return Err(EngineError::EnrollmentNotFound {
            enrollment_id: format!("{}/{}", student_id, session.offering_id),
        });
    }

    if status == MarkStatus::Unmarked {
        conn.execute(
            "DELETE FROM attendance_records WHERE session_id = ? AND student_id = ?",
            (session_id, student_id),
        )?;
        return Ok(None);
    }

    conn.execute(
        "INSERT INTO attendance_records(id, session_id, student_id, status)
         VALUES(?, ?, ?, ?)
         ON CONFLICT(session_id, student_id) DO UPDATE SET status = excluded.status",
        (new_id(), session_id, student_id, status.as_str()),
    )?;
    let record = conn.query_row(
        "SELECT id, session_id, student_id, status FROM attendance_records
         WHERE session_id = ? AND student_id = ?",
        (session_id, student_id),
        |r| {
            Ok(AttendanceRecord {
                id: r.get(0)?,
                session_id: r.get(1)?,
                student_id: r.get(2)?,
                status: r.get(3)?,
            })
        },
    )?;
    Ok(Some(record))
}

pub fn session_records(conn: &Connection, session_id: &str) -> EngineResult<Vec<AttendanceRecord>> {
    get_session(conn, session_id)?;
    let mut stmt = conn.prepare(
        "SELECT r.id, r.session_id, r.student_id, r.status
         FROM attendance_records r
         JOIN students s ON s.id = r.student_id
         WHERE r.session_id = ?
         ORDER BY s.enrollment_no",
    )?;
    let rows = stmt
        .query_map([session_id], |r| {
            Ok(AttendanceRecord {
                id: r.get(0)?,
                session_id: r.get(1)?,
                student_id: r.get(2)?,
                status: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn set_session_status(
    conn: &Connection,
    session_id: &str,
    status: &str,
) -> EngineResult<Session> {
    if !SESSION_STATUSES.contains(&status) {
        return Err(EngineError::Conflict {
            message: format!("invalid session status: {}", status),
        });
    }
    get_session(conn, session_id)?;
    conn.execute(
        "UPDATE attendance_sessions SET status = ? WHERE id = ?",
        (status, session_id),
    )?;
    get_session(conn, session_id)
}

#[derive(Debug)]
pub struct StudentAttendance {
    pub student_id: String,
    pub present: i64,
    pub percent: Option<f64>,
}

#[derive(Debug)]
pub struct OfferingAttendance {
    pub offering_id: String,
    pub classes_completed: i64,
    pub per_student: Vec<StudentAttendance>,
    pub average_percent: Option<f64>,
}

/// Aggregate attendance for an offering. Only held/confirmed sessions count;
/// scheduled and cancelled ones exist in the ledger but not in the totals.
pub fn offering_summary(conn: &Connection, offering_id: &str) -> EngineResult<OfferingAttendance> {
    offerings::get_offering(conn, offering_id)?;

    let mut stmt = conn.prepare(
        "SELECT id, status FROM attendance_sessions WHERE offering_id = ?",
    )?;
    let sessions = stmt
        .query_map([offering_id], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    let counted: Vec<&str> = sessions
        .iter()
        .filter(|(_, status)| status_counts_toward_totals(status))
        .map(|(id, _)| id.as_str())
        .collect();
    let classes_completed = counted.len() as i64;

    let mut per_student = Vec::new();
    let mut percent_sum = 0.0;
    let mut percent_count = 0usize;
    let mut roster_stmt = conn.prepare(
        "SELECT e.student_id FROM enrollments e
         JOIN students s ON s.id = e.student_id
         WHERE e.offering_id = ?
         ORDER BY s.enrollment_no",
    )?;
    let student_ids = roster_stmt
        .query_map([offering_id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    let mut present_stmt = conn.prepare(
        "SELECT COUNT(*) FROM attendance_records r
         JOIN attendance_sessions s ON s.id = r.session_id
         WHERE s.offering_id = ? AND r.student_id = ? AND r.status = 'present'
           AND s.status IN ('held','confirmed')",
    )?;
    for student_id in student_ids {
        let present: i64 =
            present_stmt.query_row((offering_id, &student_id), |r| r.get(0))?;
        let percent = if classes_completed > 0 {
            Some(100.0 * present as f64 / classes_completed as f64)
        } else {
            None
        };
        if let Some(p) = percent {
            percent_sum += p;
            percent_count += 1;
        }
        per_student.push(StudentAttendance {
            student_id,
            present,
            percent,
        });
    }

    let average_percent = if percent_count > 0 {
        Some(percent_sum / percent_count as f64)
    } else {
        None
    };
    Ok(OfferingAttendance {
        offering_id: offering_id.to_string(),
        classes_completed,
        per_student,
        average_percent,
    })
}

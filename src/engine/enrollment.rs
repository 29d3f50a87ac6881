use rusqlite::{Connection, OptionalExtension};

use super::offerings;
use super::{new_id, EngineError, EngineResult};

#[derive(Debug, Clone)]
pub struct Enrollment {
    pub id: String,
    pub student_id: String,
    pub offering_id: String,
    pub academic_year_id: String,
    pub attempt: i64,
}

#[derive(Debug)]
pub enum EnrollOutcome {
    Enrolled(Enrollment),
    AlreadyEnrolled(Enrollment),
}

impl EnrollOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            EnrollOutcome::Enrolled(_) => "enrolled",
            EnrollOutcome::AlreadyEnrolled(_) => "already_enrolled",
        }
    }

    pub fn enrollment(&self) -> &Enrollment {
        match self {
            EnrollOutcome::Enrolled(e) | EnrollOutcome::AlreadyEnrolled(e) => e,
        }
    }
}

#[derive(Debug)]
pub struct BatchItem {
    pub student_id: String,
    pub status: &'static str,
    pub enrollment_id: Option<String>,
    pub detail: Option<String>,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub enrolled: usize,
    pub already_enrolled: usize,
    pub errors: usize,
    pub results: Vec<BatchItem>,
}

fn enrollment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Enrollment> {
    Ok(Enrollment {
        id: row.get(0)?,
        student_id: row.get(1)?,
        offering_id: row.get(2)?,
        academic_year_id: row.get(3)?,
        attempt: row.get(4)?,
    })
}

fn find_enrollment(
    conn: &Connection,
    student_id: &str,
    offering_id: &str,
) -> EngineResult<Option<Enrollment>> {
    Ok(conn
        .query_row(
            "SELECT id, student_id, offering_id, academic_year_id, attempt
             FROM enrollments WHERE student_id = ? AND offering_id = ?",
            (student_id, offering_id),
            enrollment_from_row,
        )
        .optional()?)
}

pub fn get_enrollment(conn: &Connection, enrollment_id: &str) -> EngineResult<Enrollment> {
    conn.query_row(
        "SELECT id, student_id, offering_id, academic_year_id, attempt
         FROM enrollments WHERE id = ?",
        [enrollment_id],
        enrollment_from_row,
    )
    .optional()?
    .ok_or_else(|| EngineError::EnrollmentNotFound {
        enrollment_id: enrollment_id.to_string(),
    })
}

pub fn roster(conn: &Connection, offering_id: &str) -> EngineResult<Vec<Enrollment>> {
    offerings::get_offering(conn, offering_id)?;
    let mut stmt = conn.prepare(
        "SELECT e.id, e.student_id, e.offering_id, e.academic_year_id, e.attempt
         FROM enrollments e
         JOIN students s ON s.id = e.student_id
         WHERE e.offering_id = ?
         ORDER BY s.enrollment_no",
    )?;
    let rows = stmt
        .query_map([offering_id], enrollment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn check_open_elective_eligibility(
    conn: &Connection,
    student_id: &str,
    student_department_id: &str,
    course_id: &str,
) -> EngineResult<()> {
    let course_type: String = conn.query_row(
        "SELECT course_type FROM courses WHERE id = ?",
        [course_id],
        |r| r.get(0),
    )?;
    if course_type != "open_elective" {
        return Ok(());
    }
    let restricted: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM course_restricted_departments WHERE course_id = ? AND department_id = ?",
            (course_id, student_department_id),
            |r| r.get(0),
        )
        .optional()?;
    if restricted.is_some() {
        let course_code: String =
            conn.query_row("SELECT code FROM courses WHERE id = ?", [course_id], |r| {
                r.get(0)
            })?;
        return Err(EngineError::RestrictedDepartment {
            student_id: student_id.to_string(),
            course_code,
        });
    }
    Ok(())
}

/// Idempotent enroll. Creation goes through `ON CONFLICT DO NOTHING` on
/// UNIQUE(student_id, offering_id); a losing concurrent insert or a repeated
/// request both surface as `already_enrolled` with the existing row
/// unchanged. Every entry path (manual admin, bulk import, promotion) funnels
/// through here.
pub fn enroll_student(
    conn: &Connection,
    student_id: &str,
    offering_id: &str,
    academic_year_id: &str,
) -> EngineResult<EnrollOutcome> {
    let student_department: Option<String> = conn
        .query_row(
            "SELECT department_id FROM students WHERE id = ?",
            [student_id],
            |r| r.get(0),
        )
        .optional()?;
    let Some(student_department) = student_department else {
        return Err(EngineError::NotFound {
            entity: "student",
            id: student_id.to_string(),
        });
    };
    let offering = offerings::get_offering(conn, offering_id)?;
    check_open_elective_eligibility(conn, student_id, &student_department, &offering.course_id)?;

    let inserted = conn.execute(
        "INSERT INTO enrollments(id, student_id, offering_id, academic_year_id, attempt)
         VALUES(?, ?, ?, ?, 1)
         ON CONFLICT(student_id, offering_id) DO NOTHING",
        (new_id(), student_id, offering_id, academic_year_id),
    )?;

    let enrollment = find_enrollment(conn, student_id, offering_id)?.ok_or_else(|| {
        EngineError::NotFound {
            entity: "enrollment",
            id: student_id.to_string(),
        }
    })?;
    if inserted > 0 {
        Ok(EnrollOutcome::Enrolled(enrollment))
    } else {
        Ok(EnrollOutcome::AlreadyEnrolled(enrollment))
    }
}

/// Batch enroll with per-student isolation: one student's failure (unknown
/// id, restricted department) is recorded and the rest proceed. There is no
/// wrapping transaction; committed siblings stay committed.
pub fn enroll_batch(
    conn: &Connection,
    offering_id: &str,
    student_ids: &[String],
    academic_year_id: &str,
) -> EngineResult<BatchSummary> {
    offerings::get_offering(conn, offering_id)?;

    let mut summary = BatchSummary::default();
    for student_id in student_ids {
        match enroll_student(conn, student_id, offering_id, academic_year_id) {
            Ok(outcome) => {
                match outcome {
                    EnrollOutcome::Enrolled(_) => summary.enrolled += 1,
                    EnrollOutcome::AlreadyEnrolled(_) => summary.already_enrolled += 1,
                }
                summary.results.push(BatchItem {
                    student_id: student_id.clone(),
                    status: outcome.status(),
                    enrollment_id: Some(outcome.enrollment().id.clone()),
                    detail: None,
                });
            }
            Err(EngineError::Db(e)) => return Err(EngineError::Db(e)),
            Err(e) => {
                summary.errors += 1;
                summary.results.push(BatchItem {
                    student_id: student_id.clone(),
                    status: "error",
                    enrollment_id: None,
                    detail: Some(e.to_string()),
                });
            }
        }
    }
    Ok(summary)
}

#[derive(Debug)]
pub struct PromotionItem {
    pub student_id: String,
    pub new_semester: i64,
    pub batch: BatchSummary,
}

#[derive(Debug)]
pub struct PromotionSummary {
    pub promoted: usize,
    pub skipped: usize,
    pub items: Vec<PromotionItem>,
}

/// Advance every student of a department currently in `from_semester` to the
/// next semester and enroll them in that semester's core offerings for the
/// given year, creating offerings lazily. Students already in semester 8
/// have nowhere to go and are skipped by the semester filter. Enrollment
/// reuses the deduplicator, so re-running a promotion only re-reports
/// `already_enrolled` (the semester bump itself happens once because the
/// filter no longer matches).
pub fn promote_semester(
    conn: &Connection,
    department_id: &str,
    from_semester: i64,
    academic_year_id: &str,
) -> EngineResult<PromotionSummary> {
    if !(1..=7).contains(&from_semester) {
        return Ok(PromotionSummary {
            promoted: 0,
            skipped: 0,
            items: Vec::new(),
        });
    }
    let to_semester = from_semester + 1;
    let target_offerings = offerings::core_offerings_for_department(
        conn,
        department_id,
        to_semester,
        academic_year_id,
        true,
    )?;

    let mut stmt = conn.prepare(
        "SELECT id FROM students WHERE department_id = ? AND current_semester = ?
         ORDER BY enrollment_no",
    )?;
    let student_ids = stmt
        .query_map((department_id, from_semester), |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut summary = PromotionSummary {
        promoted: 0,
        skipped: 0,
        items: Vec::new(),
    };
    for student_id in student_ids {
        let bumped = conn.execute(
            "UPDATE students SET current_semester = ? WHERE id = ? AND current_semester = ?",
            (to_semester, &student_id, from_semester),
        )?;
        if bumped == 0 {
            summary.skipped += 1;
            continue;
        }
        let mut batch = BatchSummary::default();
        for offering in &target_offerings {
            let ids = [student_id.clone()];
            let one = enroll_batch(conn, &offering.id, &ids, academic_year_id)?;
            batch.enrolled += one.enrolled;
            batch.already_enrolled += one.already_enrolled;
            batch.errors += one.errors;
            batch.results.extend(one.results);
        }
        summary.promoted += 1;
        summary.items.push(PromotionItem {
            student_id,
            new_semester: to_semester,
            batch,
        });
    }
    Ok(summary)
}

use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("academic.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS colleges(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS departments(
            id TEXT PRIMARY KEY,
            college_id TEXT NOT NULL,
            name TEXT NOT NULL,
            FOREIGN KEY(college_id) REFERENCES colleges(id),
            UNIQUE(college_id, name)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_departments_college ON departments(college_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sections(
            id TEXT PRIMARY KEY,
            department_id TEXT NOT NULL,
            name TEXT NOT NULL,
            FOREIGN KEY(department_id) REFERENCES departments(id),
            UNIQUE(department_id, name)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            college_id TEXT NOT NULL,
            name TEXT NOT NULL,
            FOREIGN KEY(college_id) REFERENCES colleges(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            enrollment_no TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            college_id TEXT NOT NULL,
            department_id TEXT NOT NULL,
            section_id TEXT,
            current_semester INTEGER NOT NULL,
            batch_year INTEGER NOT NULL,
            FOREIGN KEY(college_id) REFERENCES colleges(id),
            FOREIGN KEY(department_id) REFERENCES departments(id),
            FOREIGN KEY(section_id) REFERENCES sections(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_department ON students(department_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_dept_semester ON students(department_id, current_semester)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            department_id TEXT NOT NULL,
            course_type TEXT NOT NULL CHECK(course_type IN ('core','department_elective','open_elective')),
            has_theory INTEGER NOT NULL DEFAULT 1,
            has_lab INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(department_id) REFERENCES departments(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_department ON courses(department_id)",
        [],
    )?;

    // Open electives only: departments whose students may not enroll.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS course_restricted_departments(
            course_id TEXT NOT NULL,
            department_id TEXT NOT NULL,
            PRIMARY KEY(course_id, department_id),
            FOREIGN KEY(course_id) REFERENCES courses(id),
            FOREIGN KEY(department_id) REFERENCES departments(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS academic_years(
            id TEXT PRIMARY KEY,
            college_id TEXT NOT NULL,
            year_label TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            start_date TEXT,
            end_date TEXT,
            FOREIGN KEY(college_id) REFERENCES colleges(id),
            UNIQUE(college_id, year_label)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_academic_years_college ON academic_years(college_id, active)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS course_offerings(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            semester INTEGER NOT NULL,
            academic_year_id TEXT NOT NULL,
            section_id TEXT,
            teacher_id TEXT,
            FOREIGN KEY(course_id) REFERENCES courses(id),
            FOREIGN KEY(academic_year_id) REFERENCES academic_years(id),
            FOREIGN KEY(section_id) REFERENCES sections(id),
            FOREIGN KEY(teacher_id) REFERENCES teachers(id)
        )",
        [],
    )?;
    // section_id is optional; IFNULL keeps the uniqueness guard covering the
    // no-section case, which a plain UNIQUE over a NULL column would not.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_offerings_identity
         ON course_offerings(course_id, semester, academic_year_id, IFNULL(section_id, ''))",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_offerings_year_semester ON course_offerings(academic_year_id, semester)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrollments(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            offering_id TEXT NOT NULL,
            academic_year_id TEXT NOT NULL,
            attempt INTEGER NOT NULL DEFAULT 1,
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(offering_id) REFERENCES course_offerings(id),
            FOREIGN KEY(academic_year_id) REFERENCES academic_years(id),
            UNIQUE(student_id, offering_id)
        )",
        [],
    )?;
    ensure_enrollments_attempt(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_offering ON enrollments(offering_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_student ON enrollments(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_sessions(
            id TEXT PRIMARY KEY,
            offering_id TEXT NOT NULL,
            teacher_id TEXT NOT NULL,
            class_date TEXT NOT NULL,
            period INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'held'
                CHECK(status IN ('scheduled','held','confirmed','cancelled')),
            syllabus TEXT,
            FOREIGN KEY(offering_id) REFERENCES course_offerings(id),
            FOREIGN KEY(teacher_id) REFERENCES teachers(id),
            UNIQUE(offering_id, class_date, period, teacher_id)
        )",
        [],
    )?;
    ensure_sessions_syllabus(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sessions_offering ON attendance_sessions(offering_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance_records(
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('present','absent')),
            FOREIGN KEY(session_id) REFERENCES attendance_sessions(id),
            FOREIGN KEY(student_id) REFERENCES students(id),
            UNIQUE(session_id, student_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_records_session ON attendance_records(session_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_records_student ON attendance_records(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS theory_marks(
            id TEXT PRIMARY KEY,
            enrollment_id TEXT NOT NULL UNIQUE,
            mse1 REAL,
            mse2 REAL,
            mse3 REAL,
            ta REAL,
            updated_at TEXT,
            FOREIGN KEY(enrollment_id) REFERENCES enrollments(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS lab_marks(
            id TEXT PRIMARY KEY,
            enrollment_id TEXT NOT NULL UNIQUE,
            ca REAL,
            ese REAL,
            updated_at TEXT,
            FOREIGN KEY(enrollment_id) REFERENCES enrollments(id)
        )",
        [],
    )?;

    Ok(conn)
}

fn ensure_enrollments_attempt(conn: &Connection) -> anyhow::Result<()> {
    // Workspaces created before re-attempt tracking lack the column.
    if table_has_column(conn, "enrollments", "attempt")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE enrollments ADD COLUMN attempt INTEGER NOT NULL DEFAULT 1",
        [],
    )?;
    Ok(())
}

fn ensure_sessions_syllabus(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "attendance_sessions", "syllabus")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE attendance_sessions ADD COLUMN syllabus TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

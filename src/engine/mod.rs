pub mod attendance;
pub mod calendar;
pub mod enrollment;
pub mod marks;
pub mod offerings;

use std::fmt;

/// Typed outcomes for the rules engine. Handlers map each variant to a stable
/// error code; store-level failures pass through unchanged as `Db`.
#[derive(Debug)]
pub enum EngineError {
    NotFound {
        entity: &'static str,
        id: String,
    },
    Conflict {
        message: String,
    },
    RestrictedDepartment {
        student_id: String,
        course_code: String,
    },
    NoUsableAcademicYear {
        college_id: String,
        semester: i64,
    },
    NoOfferingAndCreationNotPermitted {
        course_id: String,
        semester: i64,
    },
    EnrollmentNotFound {
        enrollment_id: String,
    },
    Db(rusqlite::Error),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotFound { .. } => "not_found",
            EngineError::Conflict { .. } => "conflict",
            EngineError::RestrictedDepartment { .. } => "restricted_department",
            EngineError::NoUsableAcademicYear { .. } => "no_usable_academic_year",
            EngineError::NoOfferingAndCreationNotPermitted { .. } => "no_offering",
            EngineError::EnrollmentNotFound { .. } => "enrollment_not_found",
            EngineError::Db(_) => "db_query_failed",
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NotFound { entity, id } => write!(f, "{} not found: {}", entity, id),
            EngineError::Conflict { message } => write!(f, "{}", message),
            EngineError::RestrictedDepartment {
                student_id,
                course_code,
            } => write!(
                f,
                "student {} is from a department restricted for open elective {}",
                student_id, course_code
            ),
            EngineError::NoUsableAcademicYear {
                college_id,
                semester,
            } => write!(
                f,
                "no active academic year for college {} has offerings for semester {}",
                college_id, semester
            ),
            EngineError::NoOfferingAndCreationNotPermitted {
                course_id,
                semester,
            } => write!(
                f,
                "no offering for course {} in semester {} and creation not permitted",
                course_id, semester
            ),
            EngineError::EnrollmentNotFound { enrollment_id } => {
                write!(f, "enrollment not found: {}", enrollment_id)
            }
            EngineError::Db(e) => write!(f, "store error: {}", e),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        EngineError::Db(e)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

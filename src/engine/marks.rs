use rusqlite::{Connection, OptionalExtension};

use super::enrollment;
use super::{new_id, now_iso, EngineResult};

/// Once MSE1 + MSE2 reach this combined total, MSE3 is no longer an eligible
/// component and its score is forced null on every write.
pub const MSE3_ELIGIBILITY_CEILING: f64 = 20.0;

/// Combined sub-score total at which a component (theory or lab) passes.
/// Applied flat to both components, as the source system did.
pub const PASS_THRESHOLD: f64 = 30.0;

#[derive(Debug, Clone, Default)]
pub struct TheoryMarks {
    pub mse1: Option<f64>,
    pub mse2: Option<f64>,
    pub mse3: Option<f64>,
    pub ta: Option<f64>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LabMarks {
    pub ca: Option<f64>,
    pub ese: Option<f64>,
    pub updated_at: Option<String>,
}

/// Partial update: `None` means "field not supplied, keep the stored value".
#[derive(Debug, Clone, Copy, Default)]
pub struct TheoryPatch {
    pub mse1: Option<f64>,
    pub mse2: Option<f64>,
    pub mse3: Option<f64>,
    pub ta: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LabPatch {
    pub ca: Option<f64>,
    pub ese: Option<f64>,
}

#[derive(Debug, Default)]
pub struct MarksRow {
    pub enrollment_id: String,
    pub theory: Option<TheoryMarks>,
    pub lab: Option<LabMarks>,
}

pub fn mse_ceiling_reached(mse1: Option<f64>, mse2: Option<f64>) -> bool {
    mse1.unwrap_or(0.0) + mse2.unwrap_or(0.0) >= MSE3_ELIGIBILITY_CEILING
}

pub fn component_passing(total: f64) -> bool {
    total >= PASS_THRESHOLD
}

pub fn theory_total(t: &TheoryMarks) -> f64 {
    t.mse1.unwrap_or(0.0) + t.mse2.unwrap_or(0.0) + t.mse3.unwrap_or(0.0) + t.ta.unwrap_or(0.0)
}

pub fn lab_total(l: &LabMarks) -> f64 {
    l.ca.unwrap_or(0.0) + l.ese.unwrap_or(0.0)
}

fn read_theory(conn: &Connection, enrollment_id: &str) -> EngineResult<Option<TheoryMarks>> {
    Ok(conn
        .query_row(
            "SELECT mse1, mse2, mse3, ta, updated_at FROM theory_marks WHERE enrollment_id = ?",
            [enrollment_id],
            |r| {
                Ok(TheoryMarks {
                    mse1: r.get(0)?,
                    mse2: r.get(1)?,
                    mse3: r.get(2)?,
                    ta: r.get(3)?,
                    updated_at: r.get(4)?,
                })
            },
        )
        .optional()?)
}

fn read_lab(conn: &Connection, enrollment_id: &str) -> EngineResult<Option<LabMarks>> {
    Ok(conn
        .query_row(
            "SELECT ca, ese, updated_at FROM lab_marks WHERE enrollment_id = ?",
            [enrollment_id],
            |r| {
                Ok(LabMarks {
                    ca: r.get(0)?,
                    ese: r.get(1)?,
                    updated_at: r.get(2)?,
                })
            },
        )
        .optional()?)
}

/// Upsert marks for an enrollment. The overlay (absent fields keep stored
/// values) and the MSE3 ceiling are both evaluated inside one conditional
/// write per component, so concurrent partial updates cannot interleave a
/// read with a stale write. The ceiling clamps MSE3 on the merged row even
/// when the caller supplied a value for it.
pub fn upsert_marks(
    conn: &Connection,
    enrollment_id: &str,
    theory: Option<TheoryPatch>,
    lab: Option<LabPatch>,
) -> EngineResult<MarksRow> {
    enrollment::get_enrollment(conn, enrollment_id)?;
    let stamp = now_iso();

    if let Some(patch) = theory {
        conn.execute(
            "INSERT INTO theory_marks(id, enrollment_id, mse1, mse2, mse3, ta, updated_at)
             VALUES(
                ?1, ?2, ?3, ?4,
                CASE WHEN IFNULL(?3, 0) + IFNULL(?4, 0) >= ?8 THEN NULL ELSE ?5 END,
                ?6, ?7
             )
             ON CONFLICT(enrollment_id) DO UPDATE SET
                mse1 = COALESCE(?3, theory_marks.mse1),
                mse2 = COALESCE(?4, theory_marks.mse2),
                mse3 = CASE
                    WHEN IFNULL(COALESCE(?3, theory_marks.mse1), 0)
                       + IFNULL(COALESCE(?4, theory_marks.mse2), 0) >= ?8
                    THEN NULL
                    ELSE COALESCE(?5, theory_marks.mse3)
                END,
                ta = COALESCE(?6, theory_marks.ta),
                updated_at = ?7",
            (
                new_id(),
                enrollment_id,
                patch.mse1,
                patch.mse2,
                patch.mse3,
                patch.ta,
                &stamp,
                MSE3_ELIGIBILITY_CEILING,
            ),
        )?;
    }

    if let Some(patch) = lab {
        conn.execute(
            "INSERT INTO lab_marks(id, enrollment_id, ca, ese, updated_at)
             VALUES(?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(enrollment_id) DO UPDATE SET
                ca = COALESCE(?3, lab_marks.ca),
                ese = COALESCE(?4, lab_marks.ese),
                updated_at = ?5",
            (new_id(), enrollment_id, patch.ca, patch.ese, &stamp),
        )?;
    }

    get_marks(conn, enrollment_id)
}

pub fn get_marks(conn: &Connection, enrollment_id: &str) -> EngineResult<MarksRow> {
    enrollment::get_enrollment(conn, enrollment_id)?;
    Ok(MarksRow {
        enrollment_id: enrollment_id.to_string(),
        theory: read_theory(conn, enrollment_id)?,
        lab: read_lab(conn, enrollment_id)?,
    })
}

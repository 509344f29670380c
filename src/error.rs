//! Errors that abort a layout pass.
//!
//! Only broken internal invariants end up here. Malformed connectors and
//! empty measures are recovered where they are found and never surface.

use thiserror::Error;

use crate::graphical::{MeasureRef, NoteRef, StaffEntryRef, StaffLineId, SystemId, VoiceEntryRef};
use crate::model::NoteId;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("no graphical measure for measure {} on staff {}", .0.measure_index, .0.staff_index)]
    MissingMeasure(MeasureRef),

    #[error("measure column {0} does not exist")]
    MissingColumn(usize),

    #[error("staff entry {0:?} does not exist")]
    MissingStaffEntry(StaffEntryRef),

    #[error("voice entry {0:?} does not exist")]
    MissingVoiceEntry(VoiceEntryRef),

    #[error("graphical note {0:?} does not exist")]
    MissingNote(NoteRef),

    #[error("staff line {0:?} does not exist")]
    MissingStaffLine(StaffLineId),

    #[error("music system {0:?} does not exist")]
    MissingSystem(SystemId),

    #[error("source note {0:?} is not part of the score")]
    UnknownNote(NoteId),

    #[error("column {column} was joined with {expected} voices but now holds {found}")]
    ColumnVoiceMismatch {
        column: usize,
        expected: usize,
        found: usize,
    },

    #[error("invalid engraving rules: {0}")]
    Config(#[from] serde_json::Error),
}

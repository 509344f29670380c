//! Ties, beams and tuplets.

use log::debug;

use super::Calculator;
use crate::engine::{Engine, NativeNoteRef, TieSpec};
use crate::error::LayoutError;
use crate::graphical::{GraphicalTie, NoteRef};
use crate::model::{BeamId, TieId, TupletId};

impl<E: Engine> Calculator<'_, E> {
    pub fn create_graphical_tie(&self, tie: TieId, start: Option<NoteRef>, end: Option<NoteRef>) -> GraphicalTie {
        GraphicalTie { tie, start, end }
    }

    /// Native note and notehead index of one tie end.
    fn tie_anchor(&self, note: Option<NoteRef>) -> Result<(Option<NativeNoteRef>, usize), LayoutError> {
        match note {
            Some(r) => {
                let note = self.sheet.note(r)?;
                Ok((note.native, note.notehead_index))
            }
            None => Ok((None, 0)),
        }
    }

    /// Build the native tie(s) for `tie` and hand them to their measures.
    ///
    /// A tie crossing a system break becomes two fragments: one leaving the
    /// start note, registered on the start measure, and one entering the end
    /// note, registered on the end measure.
    pub fn layout_graphical_tie(&mut self, tie: &GraphicalTie, at_system_break: bool) -> Result<(), LayoutError> {
        let (first_note, first_index) = self.tie_anchor(tie.start)?;
        let (last_note, last_index) = self.tie_anchor(tie.end)?;

        if at_system_break {
            match tie.start {
                Some(start) => {
                    let fragment = self.engine.create_tie(TieSpec {
                        first_note,
                        first_indices: vec![first_index],
                        ..TieSpec::default()
                    });
                    self.sheet.measure_mut(start.measure())?.ties.push(fragment);
                }
                None => debug!("tie {:?} has no start note, start fragment skipped", tie.tie),
            }
            match tie.end {
                Some(end) => {
                    let fragment = self.engine.create_tie(TieSpec {
                        last_note,
                        last_indices: vec![last_index],
                        ..TieSpec::default()
                    });
                    self.sheet.measure_mut(end.measure())?.ties.push(fragment);
                }
                None => debug!("tie {:?} has no end note, end fragment skipped", tie.tie),
            }
            return Ok(());
        }

        let Some(anchor) = tie.end.or(tie.start).map(NoteRef::measure) else {
            debug!("tie {:?} has neither start nor end note, skipped", tie.tie);
            return Ok(());
        };
        let native = self.engine.create_tie(TieSpec {
            first_note,
            first_indices: vec![first_index],
            last_note,
            last_indices: vec![last_index],
        });
        self.sheet.measure_mut(anchor)?.ties.push(native);
        Ok(())
    }

    /// Add a note to its measure's group for `beam`.
    pub fn handle_beam(&mut self, note: NoteRef, beam: BeamId) -> Result<(), LayoutError> {
        let expected = self.score.beams.get(beam.0).map_or(0, |b| b.notes.len());
        self.sheet.measure_mut(note.measure())?.handle_beam(note, beam, expected);
        Ok(())
    }

    /// Add a note to its measure's group for `tuplet`.
    pub fn handle_tuplet(&mut self, note: NoteRef, tuplet: TupletId) -> Result<(), LayoutError> {
        let expected = self.score.tuplets.get(tuplet.0).map_or(0, |t| t.notes.len());
        self.sheet.measure_mut(note.measure())?.handle_tuplet(note, tuplet, expected);
        Ok(())
    }
}

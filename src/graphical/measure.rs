//! Per-staff measure and the engine objects it owns.

use std::collections::BTreeMap;

use log::debug;

use super::*;
use crate::engine::{TickableKind, TickableSpec};
use crate::model::{BeamId, RepetitionKind, Score, TupletId};

/// Notes gathered for one beam or tuplet inside a measure.
#[derive(Debug, Clone)]
pub(crate) struct NoteGroup<K> {
    pub(crate) id: K,
    /// Member count of the whole group in the score
    pub(crate) expected: usize,
    pub(crate) members: Vec<NoteRef>,
}

/// Vertical slice of one staff across one source measure.
///
/// Owns every engine object built for it. All of them are thrown away by
/// [`clean`](StaffMeasure::clean) and rebuilt on the next pass.
#[derive(Debug)]
pub struct StaffMeasure<E: Engine> {
    pub measure_index: usize,
    pub staff_index: usize,
    pub staff: StaffId,
    pub staff_line: Option<StaffLineId>,
    pub staff_entries: Vec<GraphicalStaffEntry>,
    /// Native voices keyed by voice id
    pub voices: BTreeMap<u32, E::Voice>,
    pub ties: Vec<E::Tie>,
    pub beams: Vec<E::Beam>,
    pub tuplets: Vec<E::Tuplet>,
    pub word_repetitions: Vec<RepetitionKind>,
    pub expressions: Vec<String>,
    pub minimum_staff_entries_width: f64,
    /// Offset from the staff line start
    pub x: f64,
    pub width: f64,
    open_beams: Vec<NoteGroup<BeamId>>,
    closed_beams: Vec<NoteGroup<BeamId>>,
    open_tuplets: Vec<NoteGroup<TupletId>>,
    closed_tuplets: Vec<NoteGroup<TupletId>>,
}

impl<E: Engine> StaffMeasure<E> {
    pub fn new(measure_index: usize, staff_index: usize, staff: StaffId) -> Self {
        Self {
            measure_index,
            staff_index,
            staff,
            staff_line: None,
            staff_entries: Vec::new(),
            voices: BTreeMap::new(),
            ties: Vec::new(),
            beams: Vec::new(),
            tuplets: Vec::new(),
            word_repetitions: Vec::new(),
            expressions: Vec::new(),
            minimum_staff_entries_width: 0.0,
            x: 0.0,
            width: 0.0,
            open_beams: Vec::new(),
            closed_beams: Vec::new(),
            open_tuplets: Vec::new(),
            closed_tuplets: Vec::new(),
        }
    }

    pub fn reference(&self) -> MeasureRef {
        MeasureRef::new(self.measure_index, self.staff_index)
    }

    /// Drop every engine object and pending group.
    pub fn clean(&mut self) {
        self.voices.clear();
        self.ties.clear();
        self.beams.clear();
        self.tuplets.clear();
        self.word_repetitions.clear();
        self.expressions.clear();
        self.open_beams.clear();
        self.closed_beams.clear();
        self.open_tuplets.clear();
        self.closed_tuplets.clear();
        self.minimum_staff_entries_width = 0.0;
        for entry in &mut self.staff_entries {
            entry.x = 0.0;
            for ve in &mut entry.voice_entries {
                for note in &mut ve.notes {
                    note.native = None;
                }
            }
        }
    }

    // ── Beams and tuplets ───────────────────────────────────────────────

    pub fn handle_beam(&mut self, note: NoteRef, beam: BeamId, expected: usize) {
        add_to_group(&mut self.open_beams, &mut self.closed_beams, beam, note, expected);
    }

    pub fn handle_tuplet(&mut self, note: NoteRef, tuplet: TupletId, expected: usize) {
        add_to_group(&mut self.open_tuplets, &mut self.closed_tuplets, tuplet, note, expected);
    }

    /// Beams still collecting notes.
    pub fn open_beam_count(&self) -> usize {
        self.open_beams.len()
    }

    /// Tuplets still collecting notes.
    pub fn open_tuplet_count(&self) -> usize {
        self.open_tuplets.len()
    }

    // ── Native voices ───────────────────────────────────────────────────

    /// Build one native voice per voice id from the staff entries.
    ///
    /// Each voice entry becomes one tickable; gaps before an entry are
    /// filled with ghost padding. Afterwards the collected beam and tuplet
    /// groups are turned into engine objects.
    pub fn staff_measure_created_calculations(&mut self, engine: &E, score: &Score) -> Result<(), LayoutError> {
        let reference = self.reference();
        let mut cursors: BTreeMap<u32, Fraction> = BTreeMap::new();

        for entry in &mut self.staff_entries {
            for gve in &mut entry.voice_entries {
                let voice = self
                    .voices
                    .entry(gve.voice)
                    .or_insert_with(|| engine.create_voice(gve.voice));
                let cursor = cursors.entry(gve.voice).or_insert(Fraction::from_integer(0));

                if !gve.grace && entry.relative_timestamp > *cursor {
                    engine.add_tickable(voice, TickableSpec::ghost(entry.relative_timestamp - *cursor));
                    *cursor = entry.relative_timestamp;
                }

                let mut keys = Vec::new();
                let mut duration = Fraction::from_integer(0);
                for note in &gve.notes {
                    let source = score.note(note.source).ok_or(LayoutError::UnknownNote(note.source))?;
                    if let Some(pitch) = &source.pitch {
                        keys.push(pitch.clone());
                    }
                    duration = duration.max(score.sounding_length(source));
                }
                let kind = if keys.is_empty() { TickableKind::Rest } else { TickableKind::Note };
                let pitched = !keys.is_empty();

                let index = engine.add_tickable(
                    voice,
                    TickableSpec {
                        kind,
                        duration,
                        keys,
                        grace: gve.grace,
                    },
                );
                if !gve.grace {
                    *cursor += duration;
                }

                let native = NativeNoteRef {
                    measure: reference,
                    voice: gve.voice,
                    index,
                };
                let mut notehead = 0;
                for note in &mut gve.notes {
                    note.native = Some(native);
                    let is_pitched = score.note(note.source).is_some_and(|n| n.pitch.is_some());
                    note.notehead_index = if pitched && is_pitched { notehead } else { 0 };
                    if is_pitched {
                        notehead += 1;
                    }
                }
            }
        }

        self.finalize_groups(engine, score);
        Ok(())
    }

    fn finalize_groups(&mut self, engine: &E, score: &Score) {
        let beams: Vec<NoteGroup<BeamId>> = self.closed_beams.drain(..).chain(self.open_beams.drain(..)).collect();
        for group in beams {
            let natives = self.group_natives(&group);
            if natives.len() < 2 {
                debug!("beam {:?} has {} native note(s) in measure {:?}, skipped", group.id, natives.len(), self.reference());
                continue;
            }
            self.beams.push(engine.create_beam(&natives));
        }

        let tuplets: Vec<NoteGroup<TupletId>> = self.closed_tuplets.drain(..).chain(self.open_tuplets.drain(..)).collect();
        for group in tuplets {
            let natives = self.group_natives(&group);
            let Some(tuplet) = score.tuplets.get(group.id.0) else {
                debug!("tuplet {:?} is not part of the score, skipped", group.id);
                continue;
            };
            if natives.len() < 2 {
                debug!("tuplet {:?} has {} native note(s) in measure {:?}, skipped", group.id, natives.len(), self.reference());
                continue;
            }
            self.tuplets.push(engine.create_tuplet(&natives, tuplet.actual, tuplet.normal));
        }
    }

    /// Distinct native chords of a group, in member order.
    fn group_natives<K>(&self, group: &NoteGroup<K>) -> Vec<NativeNoteRef> {
        let mut natives: Vec<NativeNoteRef> = Vec::new();
        for member in &group.members {
            let native = self
                .staff_entries
                .get(member.voice_entry.staff_entry.entry)
                .and_then(|e| e.voice_entries.get(member.voice_entry.voice_entry))
                .and_then(|ve| ve.notes.get(member.note))
                .and_then(|n| n.native);
            if let Some(native) = native {
                if !natives.contains(&native) {
                    natives.push(native);
                }
            }
        }
        natives
    }

    // ── Per staff entry ─────────────────────────────────────────────────

    /// Push stem direction and modifiers of one staff entry into its native notes.
    pub fn layout_staff_entry(&mut self, engine: &E, entry: usize) -> Result<(), LayoutError> {
        let staff_entry = self
            .staff_entries
            .get(entry)
            .ok_or(LayoutError::MissingStaffEntry(self.reference().staff_entry(entry)))?;

        for gve in &staff_entry.voice_entries {
            let Some(native) = gve.native() else { continue };
            let Some(voice) = self.voices.get_mut(&native.voice) else { continue };
            if let Some(stem) = gve.stem {
                engine.set_stem_direction(voice, native.index, stem);
            }
            for modifier in &gve.modifiers {
                engine.add_modifier(voice, native.index, modifier);
            }
        }
        Ok(())
    }

    /// Read back a staff entry's x from its formatted native note.
    pub fn calculate_x_position(&mut self, engine: &E, entry: usize, left_padding: f64, unit_in_pixels: f64) -> Result<(), LayoutError> {
        let reference = self.reference();
        let staff_entry = self
            .staff_entries
            .get(entry)
            .ok_or(LayoutError::MissingStaffEntry(reference.staff_entry(entry)))?;

        let x = staff_entry
            .voice_entries
            .iter()
            .filter(|ve| !ve.grace)
            .find_map(|ve| ve.native())
            .and_then(|native| self.voices.get(&native.voice).and_then(|v| engine.tickable_x(v, native.index)))
            .unwrap_or(0.0);

        self.staff_entries[entry].x = left_padding + x / unit_in_pixels;
        Ok(())
    }
}

fn add_to_group<K: Copy + PartialEq>(
    open: &mut Vec<NoteGroup<K>>,
    closed: &mut Vec<NoteGroup<K>>,
    id: K,
    note: NoteRef,
    expected: usize,
) {
    let idx = match open.iter().position(|g| g.id == id) {
        Some(i) => i,
        None => {
            open.push(NoteGroup {
                id,
                expected,
                members: Vec::new(),
            });
            open.len() - 1
        }
    };
    open[idx].members.push(note);
    if open[idx].members.len() >= open[idx].expected {
        closed.push(open.remove(idx));
    }
}

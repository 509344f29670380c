//! Slur resolution across staff lines.

use std::collections::BTreeMap;

use log::debug;

use super::Calculator;
use crate::engine::{CurveSpec, Engine};
use crate::error::LayoutError;
use crate::graphical::{GraphicalSlur, StaffLineId, VoiceEntryRef};
use crate::model::{SlurId, StaffId};

/// A slur whose end note has not been reached yet, and where its
/// current piece lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenSlur {
    pub slur: SlurId,
    pub line: StaffLineId,
    /// Index into the staff line's slur list
    pub index: usize,
}

/// Open slurs per staff, in the order they were opened.
#[derive(Debug, Default)]
pub struct OpenSlurs {
    by_staff: BTreeMap<StaffId, Vec<OpenSlur>>,
}

impl OpenSlurs {
    pub fn push(&mut self, staff: StaffId, open: OpenSlur) {
        self.by_staff.entry(staff).or_default().push(open);
    }

    /// Remove the open piece of `slur`, matched by identity.
    pub fn remove(&mut self, staff: StaffId, slur: SlurId) -> Option<OpenSlur> {
        let open = self.by_staff.get_mut(&staff)?;
        let idx = open.iter().position(|o| o.slur == slur)?;
        Some(open.remove(idx))
    }

    pub fn on_staff(&self, staff: StaffId) -> &[OpenSlur] {
        match self.by_staff.get(&staff) {
            Some(open) => open,
            None => &[],
        }
    }

    fn on_staff_mut(&mut self, staff: StaffId) -> &mut [OpenSlur] {
        match self.by_staff.get_mut(&staff) {
            Some(open) => open,
            None => &mut [],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_staff.values().all(Vec::is_empty)
    }

    pub fn slurs(&self) -> impl Iterator<Item = SlurId> + '_ {
        self.by_staff.values().flatten().map(|o| o.slur)
    }
}

/// Result of one slur resolution pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlurSummary {
    /// Native slur pieces built, over all staff lines
    pub created: usize,
    /// Slurs whose end note never showed up
    pub still_open: Vec<SlurId>,
}

impl<E: Engine> Calculator<'_, E> {
    /// Build one slur piece per staff line each slur touches.
    ///
    /// Walks staff lines in page and system order. A slur still open when a
    /// new staff line begins gets a fresh piece on that line; its end note
    /// closes whichever piece is current.
    pub fn calculate_slurs(&mut self) -> Result<SlurSummary, LayoutError> {
        let mut open = OpenSlurs::default();

        let line_order: Vec<StaffLineId> = self
            .sheet
            .pages
            .iter()
            .flat_map(|page| page.systems.iter())
            .filter_map(|id| self.sheet.systems.get(id.0))
            .flat_map(|system| system.staff_lines.iter().copied())
            .collect();

        for line_id in line_order {
            let (staff, measures) = {
                let line = self.sheet.staff_line(line_id)?;
                (line.staff, line.measures.clone())
            };

            // Slurs reaching in from the previous system
            for pending in open.on_staff_mut(staff) {
                let line = self
                    .sheet
                    .staff_lines
                    .get_mut(line_id.0)
                    .ok_or(LayoutError::MissingStaffLine(line_id))?;
                line.slurs.push(GraphicalSlur::new(pending.slur));
                pending.line = line_id;
                pending.index = line.slurs.len() - 1;
            }

            for measure_ref in measures {
                let measure = self.sheet.measure(measure_ref)?;
                let mut events: Vec<(SlurId, VoiceEntryRef, bool)> = Vec::new();

                for (ei, entry) in measure.staff_entries.iter().enumerate() {
                    let se_ref = measure_ref.staff_entry(ei);
                    for (vi, gve) in entry.voice_entries.iter().enumerate() {
                        let ve_ref = se_ref.voice_entry(vi);
                        for gnote in &gve.notes {
                            let note = self
                                .score
                                .note(gnote.source)
                                .ok_or(LayoutError::UnknownNote(gnote.source))?;
                            for &slur_id in &note.slurs {
                                let Some(slur) = self.score.slur(slur_id) else { continue };
                                let (Some(start), Some(end)) = (slur.start_note, slur.end_note) else {
                                    debug!("slur {slur_id:?} lacks a start or end note, skipped");
                                    continue;
                                };
                                if start == note.id {
                                    let continued_from = note
                                        .tie_end
                                        .and_then(|t| self.score.tie(t))
                                        .and_then(|t| self.score.note(t.start_note));
                                    if continued_from.is_some_and(|t| t.timestamp != entry.absolute_timestamp) {
                                        break;
                                    }
                                    events.push((slur_id, ve_ref, true));
                                }
                                if end == note.id {
                                    events.push((slur_id, ve_ref, false));
                                }
                            }
                        }
                    }
                }

                for (slur_id, ve_ref, starts) in events {
                    if starts {
                        let line = self
                            .sheet
                            .staff_lines
                            .get_mut(line_id.0)
                            .ok_or(LayoutError::MissingStaffLine(line_id))?;
                        let mut piece = GraphicalSlur::new(slur_id);
                        piece.start = Some(ve_ref);
                        piece.start_staff_entry = Some(ve_ref.staff_entry);
                        line.slurs.push(piece);
                        open.push(
                            staff,
                            OpenSlur {
                                slur: slur_id,
                                line: line_id,
                                index: line.slurs.len() - 1,
                            },
                        );
                    } else {
                        match open.remove(staff, slur_id) {
                            Some(found) => {
                                if let Some(piece) = self
                                    .sheet
                                    .staff_lines
                                    .get_mut(found.line.0)
                                    .and_then(|l| l.slurs.get_mut(found.index))
                                {
                                    piece.end = Some(ve_ref);
                                }
                            }
                            None => debug!("slur {slur_id:?} ends without being open, ignored"),
                        }
                    }
                }
            }
        }

        let created = self.create_slur_curves()?;
        Ok(SlurSummary {
            created,
            still_open: open.slurs().collect(),
        })
    }

    /// Ask the engine for a curve for every slur piece.
    fn create_slur_curves(&mut self) -> Result<usize, LayoutError> {
        let mut specs = Vec::new();
        for (li, line) in self.sheet.staff_lines.iter().enumerate() {
            for (pi, piece) in line.slurs.iter().enumerate() {
                let from = match piece.start {
                    Some(r) => self.sheet.voice_entry(r)?.native(),
                    None => None,
                };
                let to = match piece.end {
                    Some(r) => self.sheet.voice_entry(r)?.native(),
                    None => None,
                };
                specs.push((li, pi, CurveSpec { from, to }));
            }
        }

        let created = specs.len();
        for (li, pi, spec) in specs {
            let curve = self.engine.create_curve(spec);
            if let Some(piece) = self.sheet.staff_lines.get_mut(li).and_then(|l| l.slurs.get_mut(pi)) {
                piece.curve = Some(curve);
            }
        }
        Ok(created)
    }
}

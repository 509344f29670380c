//! One full layout pass, hook by hook.
//!
//! The order matters: groups and modifiers are collected before the native
//! voices are built, columns are measured before systems are filled, and
//! ties, repetitions and slurs are resolved only once every measure knows
//! its staff line.

use std::collections::BTreeMap;

use log::debug;

use crate::calculator::{Calculator, SlurSummary};
use crate::engine::Engine;
use crate::error::LayoutError;
use crate::graphical::{
    GraphicalMusicSheet, GraphicalNote, GraphicalStaffEntry, GraphicalTie, GraphicalVoiceEntry, MeasureRef, MusicPage,
    MusicSystem, PageId, StaffLine, StaffLineId, StaffMeasure, SystemId,
};
use crate::model::{Score, TieId};
use crate::rules::EngravingRules;

/// What one pass produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PassSummary {
    /// Minimum width of every measure column, in units
    pub measure_widths: Vec<f64>,
    pub pages: usize,
    pub systems: usize,
    /// Graphical ties, counted before splitting at system breaks
    pub ties: usize,
    pub slurs: SlurSummary,
    /// Word repetitions that found no visible staff
    pub dropped_repetitions: usize,
    pub dropped_expressions: usize,
}

/// Lay out `score` from scratch and hand back the finished sheet.
pub fn layout_score<E: Engine>(score: &Score, engine: E, rules: EngravingRules) -> Result<GraphicalMusicSheet<E>, LayoutError> {
    let mut calculator = Calculator::new(score, engine, rules);
    run_pass(&mut calculator)?;
    Ok(calculator.into_sheet())
}

/// Run every hook of one pass. Anything built by an earlier pass is discarded.
pub fn run_pass<E: Engine>(calc: &mut Calculator<'_, E>) -> Result<PassSummary, LayoutError> {
    calc.clear_recreated_objects();

    let ties = create_graphical_measures(calc)?;

    for measure in calc.sheet().measure_refs() {
        calc.staff_measure_created_calculations(measure)?;
    }
    layout_entries(calc)?;

    let measure_widths = (0..calc.score().measure_count())
        .map(|mi| calc.calculate_measure_x_layout(mi))
        .collect::<Result<Vec<_>, _>>()?;

    build_systems(calc, &measure_widths)?;
    calc.format_measures()?;

    for tie in &ties {
        let start_line = tie.start.and_then(|r| calc.sheet().staff_line_of(r));
        let end_line = tie.end.and_then(|r| calc.sheet().staff_line_of(r));
        let at_system_break = matches!((start_line, end_line), (Some(a), Some(b)) if a != b);
        calc.layout_graphical_tie(tie, at_system_break)?;
    }
    let tie_count = ties.len();
    calc.sheet_mut().ties = ties;

    calc.calculate_system_y_layout()?;

    let score = calc.score();
    let mut dropped_repetitions = 0;
    for instruction in score.repetitions.iter().filter(|r| r.kind.is_word()) {
        if instruction.measure_index >= score.measure_count() {
            debug!("{:?} targets missing measure {}, dropped", instruction.kind, instruction.measure_index);
            dropped_repetitions += 1;
            continue;
        }
        if calc.calculate_word_repetition_instruction(instruction)?.is_none() {
            dropped_repetitions += 1;
        }
    }

    let mut dropped_expressions = 0;
    for expression in &score.expressions {
        if expression.measure_index >= score.measure_count() || expression.staff_index >= score.staves.len() {
            debug!(
                "expression {:?} targets missing measure {} staff {}, dropped",
                expression.text, expression.measure_index, expression.staff_index
            );
            dropped_expressions += 1;
            continue;
        }
        if calc.calculate_mood_and_unknown_expression(expression)?.is_none() {
            dropped_expressions += 1;
        }
    }

    let slurs = calc.calculate_slurs()?;

    Ok(PassSummary {
        measure_widths,
        pages: calc.sheet().pages.len(),
        systems: calc.sheet().systems.len(),
        ties: tie_count,
        slurs,
        dropped_repetitions,
        dropped_expressions,
    })
}

/// Build the graphical measures and feed their notes to the per-note hooks.
///
/// Returns the graphical ties in time order; a tie whose end never shows
/// up keeps `end == None`.
fn create_graphical_measures<E: Engine>(calc: &mut Calculator<'_, E>) -> Result<Vec<GraphicalTie>, LayoutError> {
    let score = calc.score();

    let mut measure_list = Vec::with_capacity(score.measure_count());
    for (mi, source) in score.measures.iter().enumerate() {
        let mut column = Vec::with_capacity(score.staves.len());
        for (si, staff) in score.staves.iter().enumerate() {
            let mut measure = StaffMeasure::new(mi, si, staff.id);
            for entry in source.staff_entries.get(si).into_iter().flatten() {
                let mut gse = GraphicalStaffEntry::new(entry.timestamp, source.absolute_timestamp + entry.timestamp);
                for ve in &entry.voice_entries {
                    let mut gve = GraphicalVoiceEntry::new(ve.voice, ve.grace);
                    gve.notes = ve
                        .notes
                        .iter()
                        .map(|&note| GraphicalNote {
                            source: note,
                            native: None,
                            notehead_index: 0,
                        })
                        .collect();
                    gse.voice_entries.push(gve);
                }
                measure.staff_entries.push(gse);
            }
            column.push(measure);
        }
        measure_list.push(column);
    }

    let sheet = calc.sheet_mut();
    sheet.measure_list = measure_list;
    sheet.columns = (0..score.measure_count()).map(|_| None).collect();
    sheet.pages.clear();
    sheet.systems.clear();
    sheet.staff_lines.clear();

    let mut ties: Vec<GraphicalTie> = Vec::new();
    let mut open_ties: BTreeMap<TieId, usize> = BTreeMap::new();

    for (mi, source) in score.measures.iter().enumerate() {
        for (si, entries) in source.staff_entries.iter().enumerate().take(score.staves.len()) {
            for (ei, entry) in entries.iter().enumerate() {
                for (vi, ve) in entry.voice_entries.iter().enumerate() {
                    let ve_ref = MeasureRef::new(mi, si).staff_entry(ei).voice_entry(vi);

                    for (ni, &note_id) in ve.notes.iter().enumerate() {
                        let note_ref = ve_ref.note(ni);
                        let note = score.note(note_id).ok_or(LayoutError::UnknownNote(note_id))?;

                        if let Some(beam) = note.beam {
                            calc.handle_beam(note_ref, beam)?;
                        }
                        if let Some(tuplet) = note.tuplet {
                            calc.handle_tuplet(note_ref, tuplet)?;
                        }
                        // A note in the middle of a chain closes one tie and opens the next.
                        if let Some(tie_id) = note.tie_end {
                            if score.tie(tie_id).is_some_and(|t| t.end_note == Some(note_id)) {
                                match open_ties.remove(&tie_id) {
                                    Some(i) => ties[i].end = Some(note_ref),
                                    None => ties.push(calc.create_graphical_tie(tie_id, None, Some(note_ref))),
                                }
                            }
                        }
                        if let Some(tie_id) = note.tie_start {
                            if score.tie(tie_id).is_some_and(|t| t.start_note == note_id) {
                                open_ties.insert(tie_id, ties.len());
                                ties.push(calc.create_graphical_tie(tie_id, Some(note_ref), None));
                            }
                        }
                    }

                    if !ve.articulations.is_empty() {
                        calc.handle_voice_entry_articulations(&ve.articulations, ve_ref)?;
                    }
                    if let Some(ornament) = ve.ornament {
                        calc.handle_voice_entry_ornaments(ornament, ve_ref)?;
                    }
                    if !ve.technical.is_empty() {
                        calc.handle_voice_entry_technical_instructions(&ve.technical, ve_ref)?;
                    }
                    if !ve.lyrics.is_empty() {
                        calc.handle_voice_entry_lyrics(ve_ref, &ve.lyrics)?;
                    }
                }
            }
        }
    }

    Ok(ties)
}

fn layout_entries<E: Engine>(calc: &mut Calculator<'_, E>) -> Result<(), LayoutError> {
    let score = calc.score();
    for measure in calc.sheet().measure_refs() {
        let entry_count = calc.sheet().measure(measure)?.staff_entries.len();
        for ei in 0..entry_count {
            let se_ref = measure.staff_entry(ei);
            let voice_entries: Vec<(bool, bool)> = calc
                .sheet()
                .staff_entry(se_ref)?
                .voice_entries
                .iter()
                .map(|gve| {
                    let pitched = gve
                        .notes
                        .iter()
                        .any(|n| score.note(n.source).is_some_and(|n| n.pitch.is_some()));
                    (pitched, gve.grace)
                })
                .collect();
            for (vi, (pitched, grace)) in voice_entries.into_iter().enumerate() {
                calc.layout_voice_entry(se_ref.voice_entry(vi), pitched, grace)?;
            }
            calc.layout_staff_entry(se_ref)?;
        }
    }
    Ok(())
}

struct SystemGroup {
    measures: Vec<usize>,
    new_page: bool,
}

/// Fill systems greedily, honoring forced breaks, and stretch each one to
/// the page's content width. A system is never squeezed below the minimum
/// widths of its measures.
fn build_systems<E: Engine>(calc: &mut Calculator<'_, E>, widths: &[f64]) -> Result<(), LayoutError> {
    let score = calc.score();
    let rules = calc.rules().clone();
    let padding = rules.measure_left_padding + rules.measure_right_padding;
    let available = rules.system_content_width();

    let mut groups: Vec<SystemGroup> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut current_width = 0.0;
    let mut current_new_page = false;

    for (mi, &min_w) in widths.iter().enumerate() {
        let padded = min_w + padding;
        let (new_system, new_page) = score
            .measures
            .get(mi)
            .map_or((false, false), |m| (m.new_system || m.new_page, m.new_page));

        if !current.is_empty() && (new_system || current_width + padded > available) {
            groups.push(SystemGroup {
                measures: std::mem::take(&mut current),
                new_page: current_new_page,
            });
            current_width = 0.0;
        }
        if current.is_empty() {
            current_new_page = mi > 0 && new_page;
        }
        current.push(mi);
        current_width += padded;
    }
    if !current.is_empty() {
        groups.push(SystemGroup {
            measures: current,
            new_page: current_new_page,
        });
    }

    let sheet = calc.sheet_mut();
    for group in groups {
        if sheet.pages.is_empty() || (group.new_page && sheet.pages.last().is_some_and(|p| !p.systems.is_empty())) {
            let id = PageId(sheet.pages.len());
            sheet.pages.push(MusicPage { id, systems: Vec::new() });
        }
        let page_id = PageId(sheet.pages.len() - 1);
        let system_id = SystemId(sheet.systems.len());

        let mut staff_lines = Vec::new();
        for (si, staff) in score.staves.iter().enumerate() {
            if !score.staff_visible(staff.id) {
                continue;
            }
            let line_id = StaffLineId(sheet.staff_lines.len());
            let measures: Vec<MeasureRef> = group.measures.iter().map(|&mi| MeasureRef::new(mi, si)).collect();
            for &r in &measures {
                sheet.measure_mut(r)?.staff_line = Some(line_id);
            }
            sheet.staff_lines.push(StaffLine {
                id: line_id,
                staff: staff.id,
                staff_index: si,
                system: system_id,
                measures,
                y: 0.0,
                slurs: Vec::new(),
            });
            staff_lines.push(line_id);
        }

        let total: f64 = group.measures.iter().map(|&mi| widths[mi] + padding).sum();
        // Stretch only; a lone measure wider than the page keeps its minimum width.
        let scale = if total > available {
            debug!("system {:?} needs {total} units, {available} available; overflowing", group.measures);
            1.0
        } else if total > 0.0 {
            available / total
        } else {
            1.0
        };
        let mut x = 0.0;
        for &mi in &group.measures {
            let width = (widths[mi] + padding) * scale;
            for measure in sheet
                .measure_list
                .get_mut(mi)
                .ok_or(LayoutError::MissingColumn(mi))?
            {
                measure.x = x;
                measure.width = width;
            }
            x += width;
        }

        sheet.systems.push(MusicSystem {
            id: system_id,
            page: page_id,
            staff_lines,
            measure_indices: group.measures,
            x: 0.0,
            y: 0.0,
            border_bottom: 0.0,
        });
        if let Some(page) = sheet.pages.last_mut() {
            page.systems.push(system_id);
        }
    }
    Ok(())
}

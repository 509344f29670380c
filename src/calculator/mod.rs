//! Engine-backed layout calculator.
//!
//! [`Calculator`] owns the graphical sheet of one score and exposes the
//! layout hooks an orchestrator calls in a fixed order per pass (see
//! [`crate::driver`]). Horizontal spacing, connector objects and glyph
//! placement are delegated to the [`Engine`]; the calculator decides what to
//! ask for and composes the results.

mod connectors;
mod expressions;
mod justify;
mod lyrics;
mod slurs;
mod vertical;

pub use justify::ColumnJustification;
pub use lyrics::LyricWordRegistry;
pub use slurs::{OpenSlur, OpenSlurs, SlurSummary};

use crate::engine::{Engine, Modifier, StemDirection};
use crate::error::LayoutError;
use crate::graphical::{GraphicalMusicSheet, MeasureRef, StaffEntryRef, VoiceEntryRef};
use crate::model::{Articulation, Ornament, Score, TechnicalInstruction};
use crate::rules::EngravingRules;

/// Diatonic index of the middle staff line (B4).
const MIDDLE_LINE: f64 = 34.0;

pub struct Calculator<'a, E: Engine> {
    pub(crate) score: &'a Score,
    pub(crate) engine: E,
    pub(crate) rules: EngravingRules,
    pub(crate) sheet: GraphicalMusicSheet<E>,
    pub(crate) lyric_words: LyricWordRegistry,
}

impl<'a, E: Engine> Calculator<'a, E> {
    pub fn new(score: &'a Score, engine: E, rules: EngravingRules) -> Self {
        Self {
            score,
            engine,
            rules,
            sheet: GraphicalMusicSheet::new(),
            lyric_words: LyricWordRegistry::default(),
        }
    }

    pub fn score(&self) -> &'a Score {
        self.score
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn rules(&self) -> &EngravingRules {
        &self.rules
    }

    pub fn sheet(&self) -> &GraphicalMusicSheet<E> {
        &self.sheet
    }

    pub fn sheet_mut(&mut self) -> &mut GraphicalMusicSheet<E> {
        &mut self.sheet
    }

    pub fn into_sheet(self) -> GraphicalMusicSheet<E> {
        self.sheet
    }

    /// Words whose syllables have not all been seen yet.
    pub fn pending_lyric_words(&self) -> &LyricWordRegistry {
        &self.lyric_words
    }

    /// Discard every object the previous pass built.
    pub fn clear_recreated_objects(&mut self) {
        for column in &mut self.sheet.measure_list {
            for measure in column {
                measure.clean();
            }
        }
        for column in &mut self.sheet.columns {
            *column = None;
        }
        for line in &mut self.sheet.staff_lines {
            line.slurs.clear();
        }
        self.sheet.ties.clear();
        self.sheet.lyric_words.clear();
        self.lyric_words.clear();
    }

    /// Build the native voices and groups of a freshly created staff measure.
    pub fn staff_measure_created_calculations(&mut self, measure: MeasureRef) -> Result<(), LayoutError> {
        let score = self.score;
        let engine = &self.engine;
        self.sheet.measure_mut(measure)?.staff_measure_created_calculations(engine, score)
    }

    /// Pick the stem direction of a voice entry from where its notes sit.
    pub fn layout_voice_entry(&mut self, voice_entry: VoiceEntryRef, has_pitched_note: bool, is_grace: bool) -> Result<(), LayoutError> {
        let score = self.score;
        let gve = self.sheet.voice_entry_mut(voice_entry)?;
        if !has_pitched_note {
            gve.stem = None;
            return Ok(());
        }
        if is_grace {
            gve.stem = Some(StemDirection::Up);
            return Ok(());
        }

        let mut sum = 0.0;
        let mut count = 0usize;
        for note in &gve.notes {
            let source = score.note(note.source).ok_or(LayoutError::UnknownNote(note.source))?;
            if let Some(pitch) = &source.pitch {
                sum += f64::from(pitch.diatonic_index());
                count += 1;
            }
        }
        gve.stem = if count == 0 {
            None
        } else if sum / (count as f64) < MIDDLE_LINE {
            Some(StemDirection::Up)
        } else {
            Some(StemDirection::Down)
        };
        Ok(())
    }

    pub fn layout_staff_entry(&mut self, staff_entry: StaffEntryRef) -> Result<(), LayoutError> {
        let engine = &self.engine;
        self.sheet
            .measure_mut(staff_entry.measure)?
            .layout_staff_entry(engine, staff_entry.entry)
    }

    pub fn handle_voice_entry_articulations(&mut self, articulations: &[Articulation], voice_entry: VoiceEntryRef) -> Result<(), LayoutError> {
        let gve = self.sheet.voice_entry_mut(voice_entry)?;
        gve.modifiers
            .extend(articulations.iter().copied().map(Modifier::Articulation));
        Ok(())
    }

    pub fn handle_voice_entry_ornaments(&mut self, ornament: Ornament, voice_entry: VoiceEntryRef) -> Result<(), LayoutError> {
        self.sheet
            .voice_entry_mut(voice_entry)?
            .modifiers
            .push(Modifier::Ornament(ornament));
        Ok(())
    }

    pub fn handle_voice_entry_technical_instructions(
        &mut self,
        instructions: &[TechnicalInstruction],
        voice_entry: VoiceEntryRef,
    ) -> Result<(), LayoutError> {
        let gve = self.sheet.voice_entry_mut(voice_entry)?;
        gve.modifiers
            .extend(instructions.iter().cloned().map(Modifier::Technical));
        Ok(())
    }

    /// Run every column delegate with its final width, then read back the
    /// staff entry positions.
    pub fn format_measures(&mut self) -> Result<(), LayoutError> {
        let unit = self.rules.unit_in_pixels;
        let left = self.rules.measure_left_padding;
        let right = self.rules.measure_right_padding;

        for mi in 0..self.sheet.measure_list.len() {
            let column = self
                .sheet
                .measure_list
                .get_mut(mi)
                .ok_or(LayoutError::MissingColumn(mi))?;
            let Some(width) = column.first().map(|m| m.width) else { continue };

            if let Some(delegate) = self.sheet.columns.get_mut(mi).and_then(Option::as_mut) {
                let width_px = (width - left - right).max(0.0) * unit;
                delegate.justify(&self.engine, mi, column, width_px)?;
            }

            for measure in column.iter_mut() {
                for entry in 0..measure.staff_entries.len() {
                    measure.calculate_x_position(&self.engine, entry, left, unit)?;
                }
            }
        }
        Ok(())
    }
}

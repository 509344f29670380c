//! Horizontal justification of measure columns.

use log::warn;

use super::Calculator;
use crate::engine::Engine;
use crate::error::LayoutError;
use crate::graphical::StaffMeasure;

/// Shared justification of one measure column.
///
/// Built once the column's minimum width is known, held by the sheet, and
/// invoked a single time with the final column width. Every voice of every
/// staff in the column is formatted together so co-timed entries line up.
#[derive(Debug)]
pub struct ColumnJustification<E: Engine> {
    formatter: E::Formatter,
    voice_count: usize,
    min_width: f64,
}

impl<E: Engine> ColumnJustification<E> {
    pub fn voice_count(&self) -> usize {
        self.voice_count
    }

    /// Minimum column width in units.
    pub fn min_width(&self) -> f64 {
        self.min_width
    }

    /// Format all voices of `measures` across `width` pixels.
    pub fn justify(&mut self, engine: &E, column: usize, measures: &mut [StaffMeasure<E>], width: f64) -> Result<(), LayoutError> {
        let mut voices: Vec<&mut E::Voice> = measures
            .iter_mut()
            .flat_map(|m| m.voices.values_mut())
            .collect();
        if voices.len() != self.voice_count {
            return Err(LayoutError::ColumnVoiceMismatch {
                column,
                expected: self.voice_count,
                found: voices.len(),
            });
        }
        engine.format(&mut self.formatter, &mut voices, width);
        Ok(())
    }
}

impl<E: Engine> Calculator<'_, E> {
    /// Minimum width of measure column `measure_index`, in units.
    ///
    /// Stores the column's justification delegate on the sheet and the
    /// width on every measure of the column. A column without any voice
    /// gets the default width and no delegate.
    pub fn calculate_measure_x_layout(&mut self, measure_index: usize) -> Result<f64, LayoutError> {
        let column = self
            .sheet
            .measure_list
            .get(measure_index)
            .ok_or(LayoutError::MissingColumn(measure_index))?;

        let mut formatter = self.engine.create_formatter();
        let mut all_voices: Vec<&E::Voice> = Vec::new();
        for measure in column {
            if measure.voices.is_empty() {
                warn!(
                    "measure {} on staff {} has no voices, continuing anyway",
                    measure.measure_index, measure.staff_index
                );
                continue;
            }
            let voices: Vec<&E::Voice> = measure.voices.values().collect();
            self.engine.join_voices(&mut formatter, &voices);
            all_voices.extend(voices);
        }

        let voice_count = all_voices.len();
        let width = if voice_count > 0 {
            let px = self.engine.pre_calculate_min_total_width(&mut formatter, &all_voices);
            (px / self.rules.unit_in_pixels + self.rules.justification_margin).max(self.rules.min_measure_width)
        } else {
            self.rules.default_measure_width
        };

        for measure in self
            .sheet
            .measure_list
            .get_mut(measure_index)
            .into_iter()
            .flatten()
        {
            measure.minimum_staff_entries_width = width;
        }

        if self.sheet.columns.len() <= measure_index {
            self.sheet.columns.resize_with(measure_index + 1, || None);
        }
        self.sheet.columns[measure_index] = (voice_count > 0).then(|| ColumnJustification {
            formatter,
            voice_count,
            min_width: width,
        });
        Ok(width)
    }
}

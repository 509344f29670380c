//! Repetition words and textual expressions.

use log::debug;

use super::Calculator;
use crate::engine::Engine;
use crate::error::LayoutError;
use crate::graphical::MeasureRef;
use crate::model::{MultiExpression, RepetitionInstruction};

impl<E: Engine> Calculator<'_, E> {
    /// Attach a word repetition to the topmost visible measure of its column.
    ///
    /// Returns where it went; `None` when no staff of the column is shown.
    pub fn calculate_word_repetition_instruction(&mut self, instruction: &RepetitionInstruction) -> Result<Option<MeasureRef>, LayoutError> {
        let score = self.score;
        let column = self
            .sheet
            .measure_list
            .get_mut(instruction.measure_index)
            .ok_or(LayoutError::MissingColumn(instruction.measure_index))?;

        let uppermost = column
            .iter_mut()
            .find(|m| m.staff_line.is_some() && score.staff_visible(m.staff));
        match uppermost {
            Some(measure) => {
                measure.word_repetitions.push(instruction.kind);
                Ok(Some(measure.reference()))
            }
            None => {
                debug!(
                    "{:?} in measure {} has no visible staff, dropped",
                    instruction.kind, instruction.measure_index
                );
                Ok(None)
            }
        }
    }

    /// Attach a mood or unknown expression to its own staff's measure.
    pub fn calculate_mood_and_unknown_expression(&mut self, expression: &MultiExpression) -> Result<Option<MeasureRef>, LayoutError> {
        let target = MeasureRef::new(expression.measure_index, expression.staff_index);
        let measure = self.sheet.measure_mut(target)?;
        if measure.staff_line.is_none() {
            debug!("expression {:?} sits on a hidden staff, dropped", expression.text);
            return Ok(None);
        }
        measure.expressions.push(expression.text.clone());
        Ok(Some(target))
    }
}

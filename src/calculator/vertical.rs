//! Vertical stacking of staff lines and systems.

use super::Calculator;
use crate::engine::Engine;
use crate::error::LayoutError;
use crate::graphical::SystemId;

impl<E: Engine> Calculator<'_, E> {
    /// Place staff lines within their systems and systems within their pages.
    ///
    /// Lead sheets keep whatever positions they already have.
    pub fn calculate_system_y_layout(&mut self) -> Result<(), LayoutError> {
        if self.rules.lead_sheet {
            return Ok(());
        }
        let sheet = &mut self.sheet;

        for page in &sheet.pages {
            let mut global_y = self.rules.first_system_top();
            for &SystemId(si) in &page.systems {
                let system = sheet
                    .systems
                    .get_mut(si)
                    .ok_or(LayoutError::MissingSystem(SystemId(si)))?;

                let mut y = 0.0;
                for &line_id in &system.staff_lines {
                    let line = sheet
                        .staff_lines
                        .get_mut(line_id.0)
                        .ok_or(LayoutError::MissingStaffLine(line_id))?;
                    line.y = y;
                    y += self.rules.staff_line_distance;
                }

                system.border_bottom = y;
                system.x = self.rules.page_left_margin + self.rules.system_left_margin;
                system.y = global_y;
                global_y += y + self.rules.system_distance;
            }
        }
        Ok(())
    }
}

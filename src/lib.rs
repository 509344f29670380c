//! scorelayout: positioned layout of a semantic music score.
//!
//! Staff entries are placed horizontally inside justified measure columns,
//! staff lines and systems are stacked on pages, and ties, slurs, beams,
//! tuplets, lyrics and repetition words are derived from the note-level
//! relations of the [`Score`]. Glyph metrics and voice spacing are left to
//! an [`Engine`]; [`ProportionalEngine`] is bundled.
//!
//! # Example
//! ```
//! use scorelayout::{layout_score, EngravingRules, Fraction, Pitch, ProportionalEngine, ScoreBuilder};
//!
//! let mut b = ScoreBuilder::new();
//! b.instrument("Flute", 1);
//! let m = b.measure(Fraction::from_integer(1));
//! b.note(m, 0, 1, Fraction::from_integer(0), Pitch::new("A", 4), Fraction::from_integer(1));
//! let score = b.build();
//!
//! let sheet = layout_score(&score, ProportionalEngine::default(), EngravingRules::default()).unwrap();
//! println!("{}", scorelayout::geometry_to_json(&sheet).unwrap());
//! ```

pub mod calculator;
pub mod driver;
pub mod engine;
pub mod error;
pub mod graphical;
pub mod model;
pub mod rules;

pub use calculator::Calculator;
pub use driver::{layout_score, run_pass, PassSummary};
pub use engine::{Engine, ProportionalEngine};
pub use error::LayoutError;
pub use graphical::{GraphicalMusicSheet, SheetGeometry};
pub use model::*;
pub use rules::EngravingRules;

/// Serialize the positioned geometry of a laid-out sheet to JSON.
pub fn geometry_to_json<E: Engine>(sheet: &GraphicalMusicSheet<E>) -> Result<String, LayoutError> {
    Ok(serde_json::to_string_pretty(&sheet.geometry())?)
}

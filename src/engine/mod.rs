//! Rendering-engine boundary.
//!
//! The layout core never measures glyphs itself. It hands the engine
//! logical tickables (durations, keys, modifiers), asks it for minimum
//! widths and final positions, and builds connector objects through it.
//! Everything engine specific lives behind the [`Engine`] associated types.

mod proportional;

pub use proportional::{ProportionalEngine, ProportionalFormatter, ProportionalVoice};

use std::fmt::Debug;

use serde::Serialize;

use crate::graphical::MeasureRef;
use crate::model::{Articulation, Fraction, Ornament, Pitch, TechnicalInstruction};

/// Handle to one native note (a whole chord) inside a measure's voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NativeNoteRef {
    pub measure: MeasureRef,
    pub voice: u32,
    /// Tickable index within the voice
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TickableKind {
    Note,
    Rest,
    /// Invisible padding that fills a gap in a voice
    Ghost,
}

/// What the engine needs to know to lay out one tickable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickableSpec {
    pub kind: TickableKind,
    pub duration: Fraction,
    /// Noteheads, bottom to top as given
    pub keys: Vec<Pitch>,
    pub grace: bool,
}

impl TickableSpec {
    pub fn ghost(duration: Fraction) -> Self {
        Self {
            kind: TickableKind::Ghost,
            duration,
            keys: Vec::new(),
            grace: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StemDirection {
    Up,
    Down,
}

/// Marks attached to a native note.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Modifier {
    Articulation(Articulation),
    Ornament(Ornament),
    Technical(TechnicalInstruction),
}

/// Tie construction parameters. A missing note leaves that end open.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TieSpec {
    pub first_note: Option<NativeNoteRef>,
    pub first_indices: Vec<usize>,
    pub last_note: Option<NativeNoteRef>,
    pub last_indices: Vec<usize>,
}

/// Slur curve construction parameters. A missing end runs to the staff line edge.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CurveSpec {
    pub from: Option<NativeNoteRef>,
    pub to: Option<NativeNoteRef>,
}

/// Beam record as built by the bundled engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeamSpec {
    pub notes: Vec<NativeNoteRef>,
}

/// Tuplet record as built by the bundled engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TupletSpec {
    pub notes: Vec<NativeNoteRef>,
    pub actual: u32,
    pub normal: u32,
}

/// The typesetting oracle the layout core delegates to.
pub trait Engine {
    type Voice: Debug;
    type Formatter: Debug;
    type Tie: Debug;
    type Curve: Debug;
    type Beam: Debug;
    type Tuplet: Debug;

    fn create_voice(&self, voice_id: u32) -> Self::Voice;

    /// Append a tickable; returns its index in the voice.
    fn add_tickable(&self, voice: &mut Self::Voice, spec: TickableSpec) -> usize;

    fn set_stem_direction(&self, voice: &mut Self::Voice, index: usize, direction: StemDirection);

    fn add_modifier(&self, voice: &mut Self::Voice, index: usize, modifier: &Modifier);

    fn create_formatter(&self) -> Self::Formatter;

    /// Group co-timed voices of one staff so they align internally.
    fn join_voices(&self, formatter: &mut Self::Formatter, voices: &[&Self::Voice]);

    /// Minimum width, in pixels, that spaces all `voices` without collision.
    fn pre_calculate_min_total_width(&self, formatter: &mut Self::Formatter, voices: &[&Self::Voice]) -> f64;

    /// Position every tickable of `voices` across `width` pixels.
    fn format(&self, formatter: &mut Self::Formatter, voices: &mut [&mut Self::Voice], width: f64);

    /// Formatted x of a tickable in pixels, if formatting has happened.
    fn tickable_x(&self, voice: &Self::Voice, index: usize) -> Option<f64>;

    fn create_tie(&self, spec: TieSpec) -> Self::Tie;

    fn create_curve(&self, spec: CurveSpec) -> Self::Curve;

    fn create_beam(&self, notes: &[NativeNoteRef]) -> Self::Beam;

    fn create_tuplet(&self, notes: &[NativeNoteRef], actual: u32, normal: u32) -> Self::Tuplet;
}

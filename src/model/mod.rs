//! Semantic music model consumed by the layout core.
//!
//! These structures capture the time-ordered musical content (measures,
//! staff entries, voice entries, notes) and the note-level relations
//! (ties, slurs, beams, tuplets, lyrics) that the layout pass turns into
//! positioned graphical objects. Related objects are stored in arenas on
//! the [`Score`] and referenced by typed ids; two references denote the
//! same object exactly when their ids are equal.

mod builder;

pub use builder::ScoreBuilder;

use num_rational::Rational32;
use serde::{Deserialize, Serialize};

/// Exact musical time, in whole notes (a quarter note is `1/4`).
pub type Fraction = Rational32;

macro_rules! arena_id {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
            pub struct $name(pub usize);
        )*
    };
}

arena_id! {
    /// Index into [`Score::instruments`].
    InstrumentId,
    /// Index into [`Score::staves`]; stable across the whole sheet.
    StaffId,
    /// Index into [`Score::notes`].
    NoteId,
    /// Index into [`Score::ties`].
    TieId,
    /// Index into [`Score::slurs`].
    SlurId,
    /// Index into [`Score::beams`].
    BeamId,
    /// Index into [`Score::tuplets`].
    TupletId,
    /// Index into [`Score::lyrics`].
    LyricsEntryId,
    /// Index into [`Score::words`].
    WordId,
}

/// A complete score ready for layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Score {
    /// Title of the piece
    pub title: Option<String>,
    /// Composer name
    pub composer: Option<String>,
    /// Instruments in system order (top to bottom)
    pub instruments: Vec<Instrument>,
    /// All staves, in system order
    pub staves: Vec<Staff>,
    /// Source measures in time order
    pub measures: Vec<SourceMeasure>,
    pub notes: Vec<Note>,
    pub ties: Vec<Tie>,
    pub slurs: Vec<Slur>,
    pub beams: Vec<Beam>,
    pub tuplets: Vec<Tuplet>,
    pub lyrics: Vec<LyricsEntry>,
    pub words: Vec<LyricWord>,
    /// Repetition instructions (D.C., Fine, Segno, ...)
    pub repetitions: Vec<RepetitionInstruction>,
    /// Textual expressions (mood, unknown words)
    pub expressions: Vec<MultiExpression>,
}

/// An instrument owning one or more staves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    pub name: String,
    /// Hidden instruments keep their measures but get no staff lines.
    pub visible: bool,
    pub staves: Vec<StaffId>,
}

/// One staff of an instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staff {
    pub id: StaffId,
    pub instrument: InstrumentId,
}

/// A measure of the source score, shared by every staff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMeasure {
    /// Measure number as printed
    pub number: i32,
    /// Onset of the measure from the start of the piece
    pub absolute_timestamp: Fraction,
    /// Nominal duration (from the time signature)
    pub duration: Fraction,
    /// Staff entries per staff index, sorted by timestamp
    pub staff_entries: Vec<Vec<SourceStaffEntry>>,
    /// Whether this measure must start a new system
    pub new_system: bool,
    /// Whether this measure must start a new page
    pub new_page: bool,
}

/// All voice entries of one staff at one time point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStaffEntry {
    /// Onset relative to the start of the measure
    pub timestamp: Fraction,
    pub voice_entries: Vec<VoiceEntry>,
}

/// Notes sounding together in one voice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceEntry {
    pub voice: u32,
    pub notes: Vec<NoteId>,
    /// Lyric syllables in stored (verse) order
    pub lyrics: Vec<LyricsEntryId>,
    pub articulations: Vec<Articulation>,
    pub ornament: Option<Ornament>,
    pub technical: Vec<TechnicalInstruction>,
    pub grace: bool,
}

/// A single note or rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    /// Pitch (None if this is a rest)
    pub pitch: Option<Pitch>,
    /// Notated length
    pub length: Fraction,
    /// Absolute onset of the owning staff entry
    pub timestamp: Fraction,
    /// Tie this note starts
    pub tie_start: Option<TieId>,
    /// Tie this note continues; a note inside a chain carries both
    pub tie_end: Option<TieId>,
    pub slurs: Vec<SlurId>,
    pub beam: Option<BeamId>,
    pub tuplet: Option<TupletId>,
}

/// Pitch of a note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pitch {
    /// Note name: A, B, C, D, E, F, G
    pub step: String,
    /// Octave number (middle C = C4)
    pub octave: i32,
    /// Chromatic alteration: -1.0 = flat, 1.0 = sharp
    pub alter: Option<f64>,
}

/// Same-pitch duration extension between two notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tie {
    pub start_note: NoteId,
    /// None when the source data never closes the tie
    pub end_note: Option<NoteId>,
}

/// Phrasing curve from a start note to an end note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slur {
    pub start_note: Option<NoteId>,
    pub end_note: Option<NoteId>,
}

/// Beam over a contiguous run of notes in one voice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Beam {
    pub notes: Vec<NoteId>,
}

/// Tuplet over a contiguous run of notes in one voice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tuplet {
    pub notes: Vec<NoteId>,
    /// Notes played (e.g. 3 in a triplet)
    pub actual: u32,
    /// In the time of (e.g. 2 in a triplet)
    pub normal: u32,
}

/// One lyric syllable attached to a voice entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LyricsEntry {
    pub text: String,
    /// Verse number (1-based)
    pub verse: u32,
    pub word: Option<WordId>,
}

/// A word made of ordered syllables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LyricWord {
    pub syllables: Vec<LyricsEntryId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Articulation {
    Accent,
    Staccato,
    Staccatissimo,
    Tenuto,
    Marcato,
    Fermata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ornament {
    Trill,
    Turn,
    InvertedTurn,
    Mordent,
    InvertedMordent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TechnicalInstruction {
    Fingering(String),
    UpBow,
    DownBow,
}

/// Kinds of repetition instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepetitionKind {
    StartLine,
    BackJumpLine,
    Ending,
    DaCapo,
    DalSegno,
    Fine,
    ToCoda,
    DaCapoAlFine,
    DaCapoAlCoda,
    DalSegnoAlFine,
    DalSegnoAlCoda,
    Segno,
    Coda,
}

impl RepetitionKind {
    /// Whether this instruction is written as words above the staff.
    pub fn is_word(self) -> bool {
        matches!(
            self,
            RepetitionKind::DaCapo
                | RepetitionKind::DalSegno
                | RepetitionKind::Fine
                | RepetitionKind::ToCoda
                | RepetitionKind::DaCapoAlFine
                | RepetitionKind::DaCapoAlCoda
                | RepetitionKind::DalSegnoAlFine
                | RepetitionKind::DalSegnoAlCoda
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepetitionInstruction {
    pub measure_index: usize,
    pub kind: RepetitionKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpressionKind {
    Mood,
    Unknown,
}

/// A textual expression bound to one staff of one measure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiExpression {
    pub measure_index: usize,
    pub staff_index: usize,
    pub kind: ExpressionKind,
    pub text: String,
}

impl Score {
    pub fn measure_count(&self) -> usize {
        self.measures.len()
    }

    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.get(id.0)
    }

    pub fn tie(&self, id: TieId) -> Option<&Tie> {
        self.ties.get(id.0)
    }

    pub fn tuplet(&self, id: TupletId) -> Option<&Tuplet> {
        self.tuplets.get(id.0)
    }

    /// Time `note` actually takes: its notated length, scaled by
    /// `normal / actual` inside a tuplet.
    pub fn sounding_length(&self, note: &Note) -> Fraction {
        match note.tuplet.and_then(|t| self.tuplet(t)) {
            Some(t) if t.actual > 0 => note.length * Fraction::new(t.normal as i32, t.actual as i32),
            _ => note.length,
        }
    }

    pub fn slur(&self, id: SlurId) -> Option<&Slur> {
        self.slurs.get(id.0)
    }

    pub fn lyrics_entry(&self, id: LyricsEntryId) -> Option<&LyricsEntry> {
        self.lyrics.get(id.0)
    }

    pub fn word(&self, id: WordId) -> Option<&LyricWord> {
        self.words.get(id.0)
    }

    /// Whether the instrument owning `staff` is visible.
    pub fn staff_visible(&self, staff: StaffId) -> bool {
        self.staves
            .get(staff.0)
            .and_then(|s| self.instruments.get(s.instrument.0))
            .is_some_and(|i| i.visible)
    }
}

impl Pitch {
    pub fn new(step: &str, octave: i32) -> Self {
        Self {
            step: step.to_string(),
            octave,
            alter: None,
        }
    }

    /// Diatonic step count from C0, ignoring alterations.
    pub fn diatonic_index(&self) -> i32 {
        let step_index = match self.step.as_str() {
            "C" => 0,
            "D" => 1,
            "E" => 2,
            "F" => 3,
            "G" => 4,
            "A" => 5,
            "B" => 6,
            _ => 0,
        };
        self.octave * 7 + step_index
    }
}

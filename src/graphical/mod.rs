//! Graphical sheet: the positioned projection of a [`Score`](crate::model::Score).
//!
//! Measures are kept per source measure, per staff (`measure_list[m][s]`),
//! so the vertically aligned measures of one column sit side by side.
//! Pages, systems and staff lines live in flat arenas and point at each
//! other through ids. Graphical objects are addressed by small `*Ref`
//! paths (measure → staff entry → voice entry → note).

mod measure;

pub use measure::StaffMeasure;

use serde::Serialize;

use crate::calculator::ColumnJustification;
use crate::engine::{Engine, Modifier, NativeNoteRef, StemDirection};
use crate::error::LayoutError;
use crate::model::{Fraction, LyricsEntryId, NoteId, SlurId, StaffId, TieId, WordId};

// ═══════════════════════════════════════════════════════════════════════
// Addresses
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MeasureRef {
    pub measure_index: usize,
    pub staff_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StaffEntryRef {
    pub measure: MeasureRef,
    pub entry: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VoiceEntryRef {
    pub staff_entry: StaffEntryRef,
    pub voice_entry: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NoteRef {
    pub voice_entry: VoiceEntryRef,
    pub note: usize,
}

impl MeasureRef {
    pub fn new(measure_index: usize, staff_index: usize) -> Self {
        Self {
            measure_index,
            staff_index,
        }
    }

    pub fn staff_entry(self, entry: usize) -> StaffEntryRef {
        StaffEntryRef { measure: self, entry }
    }
}

impl StaffEntryRef {
    pub fn voice_entry(self, voice_entry: usize) -> VoiceEntryRef {
        VoiceEntryRef {
            staff_entry: self,
            voice_entry,
        }
    }
}

impl VoiceEntryRef {
    pub fn note(self, note: usize) -> NoteRef {
        NoteRef {
            voice_entry: self,
            note,
        }
    }

    pub fn measure(self) -> MeasureRef {
        self.staff_entry.measure
    }
}

impl NoteRef {
    pub fn measure(self) -> MeasureRef {
        self.voice_entry.staff_entry.measure
    }

    pub fn staff_entry(self) -> StaffEntryRef {
        self.voice_entry.staff_entry
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StaffLineId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SystemId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PageId(pub usize);

// ═══════════════════════════════════════════════════════════════════════
// Entries and notes
// ═══════════════════════════════════════════════════════════════════════

/// Renderable projection of one source note.
#[derive(Debug, Clone)]
pub struct GraphicalNote {
    pub source: NoteId,
    /// Native chord this note is drawn in; set when the measure's voices are built
    pub native: Option<NativeNoteRef>,
    /// Which notehead of the chord this note is
    pub notehead_index: usize,
}

#[derive(Debug, Clone)]
pub struct GraphicalVoiceEntry {
    pub voice: u32,
    pub grace: bool,
    pub notes: Vec<GraphicalNote>,
    pub stem: Option<StemDirection>,
    pub modifiers: Vec<Modifier>,
}

impl GraphicalVoiceEntry {
    pub fn new(voice: u32, grace: bool) -> Self {
        Self {
            voice,
            grace,
            notes: Vec::new(),
            stem: None,
            modifiers: Vec::new(),
        }
    }

    /// Native chord of the entry (all notes share it).
    pub fn native(&self) -> Option<NativeNoteRef> {
        self.notes.iter().find_map(|n| n.native)
    }
}

#[derive(Debug, Clone)]
pub struct GraphicalStaffEntry {
    pub relative_timestamp: Fraction,
    pub absolute_timestamp: Fraction,
    pub voice_entries: Vec<GraphicalVoiceEntry>,
    pub lyrics_entries: Vec<GraphicalLyricEntry>,
    /// x relative to the measure start, set once the column is justified
    pub x: f64,
}

impl GraphicalStaffEntry {
    pub fn new(relative_timestamp: Fraction, absolute_timestamp: Fraction) -> Self {
        Self {
            relative_timestamp,
            absolute_timestamp,
            voice_entries: Vec::new(),
            lyrics_entries: Vec::new(),
            x: 0.0,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Lyrics
// ═══════════════════════════════════════════════════════════════════════

/// A text label with borders relative to its anchor (centered, bottom aligned).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphicalLabel {
    pub text: String,
    pub font_height: f64,
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl GraphicalLabel {
    pub fn new(text: &str, font_height: f64) -> Self {
        Self {
            text: text.to_string(),
            font_height,
            left: 0.0,
            right: 0.0,
            top: 0.0,
            bottom: 0.0,
        }
    }

    /// Size the borders from the estimated text width.
    pub fn set_label_position_and_shape_borders(&mut self, char_width_factor: f64) {
        let width = self.text.chars().count() as f64 * self.font_height * char_width_factor;
        self.left = -width / 2.0;
        self.right = width / 2.0;
        self.top = -self.font_height;
        self.bottom = 0.0;
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }
}

#[derive(Debug, Clone)]
pub struct GraphicalLyricEntry {
    pub source: LyricsEntryId,
    pub label: GraphicalLabel,
    /// Vertical offset below the staff line top
    pub y: f64,
    pub word: Option<WordId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LyricEntryRef {
    pub staff_entry: StaffEntryRef,
    pub lyric: usize,
}

/// Graphical container of one word; one slot per syllable.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicalLyricWord {
    pub word: WordId,
    pub entries: Vec<Option<LyricEntryRef>>,
}

impl GraphicalLyricWord {
    pub fn new(word: WordId, syllables: usize) -> Self {
        Self {
            word,
            entries: vec![None; syllables],
        }
    }

    pub fn is_filled(&self) -> bool {
        self.entries.iter().all(Option::is_some)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Connectors
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct GraphicalTie {
    pub tie: TieId,
    pub start: Option<NoteRef>,
    pub end: Option<NoteRef>,
}

/// One visible piece of a slur on one staff line.
#[derive(Debug)]
pub struct GraphicalSlur<E: Engine> {
    pub slur: SlurId,
    /// None on a continuation from the previous system
    pub start: Option<VoiceEntryRef>,
    pub start_staff_entry: Option<StaffEntryRef>,
    /// None while open, or when the slur runs on into the next system
    pub end: Option<VoiceEntryRef>,
    pub curve: Option<E::Curve>,
}

impl<E: Engine> GraphicalSlur<E> {
    pub fn new(slur: SlurId) -> Self {
        Self {
            slur,
            start: None,
            start_staff_entry: None,
            end: None,
            curve: None,
        }
    }

    /// A fresh piece of the same slur for the next staff line.
    pub fn continuation(&self) -> Self {
        Self::new(self.slur)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Staff lines, systems, pages
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct StaffLine<E: Engine> {
    pub id: StaffLineId,
    pub staff: StaffId,
    pub staff_index: usize,
    pub system: SystemId,
    pub measures: Vec<MeasureRef>,
    /// Offset from the system top
    pub y: f64,
    pub slurs: Vec<GraphicalSlur<E>>,
}

#[derive(Debug, Clone)]
pub struct MusicSystem {
    pub id: SystemId,
    pub page: PageId,
    pub staff_lines: Vec<StaffLineId>,
    pub measure_indices: Vec<usize>,
    pub x: f64,
    pub y: f64,
    pub border_bottom: f64,
}

#[derive(Debug, Clone)]
pub struct MusicPage {
    pub id: PageId,
    pub systems: Vec<SystemId>,
}

// ═══════════════════════════════════════════════════════════════════════
// Sheet
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct GraphicalMusicSheet<E: Engine> {
    /// `measure_list[measure_index][staff_index]`
    pub measure_list: Vec<Vec<StaffMeasure<E>>>,
    /// Justification delegate per measure column
    pub columns: Vec<Option<ColumnJustification<E>>>,
    pub pages: Vec<MusicPage>,
    pub systems: Vec<MusicSystem>,
    pub staff_lines: Vec<StaffLine<E>>,
    pub ties: Vec<GraphicalTie>,
    /// Completed words
    pub lyric_words: Vec<GraphicalLyricWord>,
}

impl<E: Engine> Default for GraphicalMusicSheet<E> {
    fn default() -> Self {
        Self {
            measure_list: Vec::new(),
            columns: Vec::new(),
            pages: Vec::new(),
            systems: Vec::new(),
            staff_lines: Vec::new(),
            ties: Vec::new(),
            lyric_words: Vec::new(),
        }
    }
}

impl<E: Engine> GraphicalMusicSheet<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn measure(&self, r: MeasureRef) -> Result<&StaffMeasure<E>, LayoutError> {
        self.measure_list
            .get(r.measure_index)
            .and_then(|column| column.get(r.staff_index))
            .ok_or(LayoutError::MissingMeasure(r))
    }

    pub fn measure_mut(&mut self, r: MeasureRef) -> Result<&mut StaffMeasure<E>, LayoutError> {
        self.measure_list
            .get_mut(r.measure_index)
            .and_then(|column| column.get_mut(r.staff_index))
            .ok_or(LayoutError::MissingMeasure(r))
    }

    pub fn staff_entry(&self, r: StaffEntryRef) -> Result<&GraphicalStaffEntry, LayoutError> {
        self.measure(r.measure)?
            .staff_entries
            .get(r.entry)
            .ok_or(LayoutError::MissingStaffEntry(r))
    }

    pub fn staff_entry_mut(&mut self, r: StaffEntryRef) -> Result<&mut GraphicalStaffEntry, LayoutError> {
        self.measure_mut(r.measure)?
            .staff_entries
            .get_mut(r.entry)
            .ok_or(LayoutError::MissingStaffEntry(r))
    }

    pub fn voice_entry(&self, r: VoiceEntryRef) -> Result<&GraphicalVoiceEntry, LayoutError> {
        self.staff_entry(r.staff_entry)?
            .voice_entries
            .get(r.voice_entry)
            .ok_or(LayoutError::MissingVoiceEntry(r))
    }

    pub fn voice_entry_mut(&mut self, r: VoiceEntryRef) -> Result<&mut GraphicalVoiceEntry, LayoutError> {
        self.staff_entry_mut(r.staff_entry)?
            .voice_entries
            .get_mut(r.voice_entry)
            .ok_or(LayoutError::MissingVoiceEntry(r))
    }

    pub fn note(&self, r: NoteRef) -> Result<&GraphicalNote, LayoutError> {
        self.voice_entry(r.voice_entry)?
            .notes
            .get(r.note)
            .ok_or(LayoutError::MissingNote(r))
    }

    pub fn staff_line(&self, id: StaffLineId) -> Result<&StaffLine<E>, LayoutError> {
        self.staff_lines.get(id.0).ok_or(LayoutError::MissingStaffLine(id))
    }

    /// Every measure, column by column.
    pub fn measure_refs(&self) -> Vec<MeasureRef> {
        self.measure_list
            .iter()
            .enumerate()
            .flat_map(|(mi, column)| (0..column.len()).map(move |si| MeasureRef::new(mi, si)))
            .collect()
    }

    /// Staff line a graphical note is drawn on, if any.
    pub fn staff_line_of(&self, r: NoteRef) -> Option<StaffLineId> {
        self.measure(r.measure()).ok().and_then(|m| m.staff_line)
    }

    /// Positioned snapshot of pages, systems, staff lines and measures.
    pub fn geometry(&self) -> SheetGeometry {
        let pages = self
            .pages
            .iter()
            .map(|page| PageGeometry {
                systems: page
                    .systems
                    .iter()
                    .filter_map(|id| self.systems.get(id.0))
                    .map(|system| SystemGeometry {
                        x: system.x,
                        y: system.y,
                        height: system.border_bottom,
                        staff_lines: system
                            .staff_lines
                            .iter()
                            .filter_map(|id| self.staff_lines.get(id.0))
                            .map(|line| StaffLineGeometry {
                                staff_index: line.staff_index,
                                y: line.y,
                                slurs: line.slurs.len(),
                                measures: line
                                    .measures
                                    .iter()
                                    .filter_map(|r| self.measure(*r).ok())
                                    .map(|m| MeasureGeometry {
                                        measure_index: m.measure_index,
                                        x: m.x,
                                        width: m.width,
                                        staff_entries: m.staff_entries.iter().map(|e| e.x).collect(),
                                    })
                                    .collect(),
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();
        SheetGeometry { pages }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Geometry snapshot
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetGeometry {
    pub pages: Vec<PageGeometry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageGeometry {
    pub systems: Vec<SystemGeometry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemGeometry {
    pub x: f64,
    pub y: f64,
    pub height: f64,
    pub staff_lines: Vec<StaffLineGeometry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaffLineGeometry {
    pub staff_index: usize,
    pub y: f64,
    pub slurs: usize,
    pub measures: Vec<MeasureGeometry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasureGeometry {
    pub measure_index: usize,
    pub x: f64,
    pub width: f64,
    pub staff_entries: Vec<f64>,
}

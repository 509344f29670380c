//! Bundled engine: spaces onsets by the widest tickable starting there.
//!
//! Every distinct onset across all formatted voices gets one slot. A slot
//! is as wide as its widest tickable (note spacing plus room for modifiers);
//! ghost padding takes no room. Formatting scales the slots to the final
//! width, so co-timed tickables on every staff share one x.

use super::*;

const GRACE_SCALE: f64 = 0.66;

#[derive(Debug, Clone)]
pub struct ProportionalEngine {
    /// Pixels reserved for a plain note or rest
    pub note_spacing: f64,
    /// Extra pixels per modifier on a note
    pub modifier_spacing: f64,
}

impl Default for ProportionalEngine {
    fn default() -> Self {
        Self {
            note_spacing: 18.0,
            modifier_spacing: 6.0,
        }
    }
}

#[derive(Debug, Clone)]
struct Tickable {
    spec: TickableSpec,
    onset: Fraction,
    modifiers: Vec<Modifier>,
    stem: Option<StemDirection>,
    x: Option<f64>,
}

/// A voice: tickables laid end to end from the measure start.
#[derive(Debug, Clone)]
pub struct ProportionalVoice {
    pub id: u32,
    tickables: Vec<Tickable>,
    cursor: Fraction,
}

impl ProportionalVoice {
    pub fn len(&self) -> usize {
        self.tickables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickables.is_empty()
    }

    pub fn spec(&self, index: usize) -> Option<&TickableSpec> {
        self.tickables.get(index).map(|t| &t.spec)
    }

    pub fn onset(&self, index: usize) -> Option<Fraction> {
        self.tickables.get(index).map(|t| t.onset)
    }

    pub fn modifiers(&self, index: usize) -> &[Modifier] {
        self.tickables.get(index).map_or(&[], |t| t.modifiers.as_slice())
    }

    pub fn stem(&self, index: usize) -> Option<StemDirection> {
        self.tickables.get(index).and_then(|t| t.stem)
    }

    /// Total duration of the voice so far.
    pub fn ticks(&self) -> Fraction {
        self.cursor
    }
}

#[derive(Debug, Default)]
pub struct ProportionalFormatter {
    /// Voice count of each joined group
    pub joined: Vec<usize>,
    /// (onset, slot width in pixels), sorted by onset
    slots: Vec<(Fraction, f64)>,
}

impl ProportionalFormatter {
    pub fn slots(&self) -> &[(Fraction, f64)] {
        &self.slots
    }
}

impl ProportionalEngine {
    fn tickable_space(&self, tickable: &Tickable) -> f64 {
        match tickable.spec.kind {
            TickableKind::Ghost => 0.0,
            _ => {
                let base = self.note_spacing + tickable.modifiers.len() as f64 * self.modifier_spacing;
                if tickable.spec.grace {
                    base * GRACE_SCALE
                } else {
                    base
                }
            }
        }
    }

    fn compute_slots<'v>(&self, voices: impl IntoIterator<Item = &'v ProportionalVoice>) -> Vec<(Fraction, f64)> {
        let mut slots: Vec<(Fraction, f64)> = Vec::new();
        for voice in voices {
            for tickable in &voice.tickables {
                let space = self.tickable_space(tickable);
                match slots.binary_search_by(|(onset, _)| onset.cmp(&tickable.onset)) {
                    Ok(i) => slots[i].1 = slots[i].1.max(space),
                    Err(i) => slots.insert(i, (tickable.onset, space)),
                }
            }
        }
        slots
    }
}

impl Engine for ProportionalEngine {
    type Voice = ProportionalVoice;
    type Formatter = ProportionalFormatter;
    type Tie = TieSpec;
    type Curve = CurveSpec;
    type Beam = BeamSpec;
    type Tuplet = TupletSpec;

    fn create_voice(&self, voice_id: u32) -> ProportionalVoice {
        ProportionalVoice {
            id: voice_id,
            tickables: Vec::new(),
            cursor: Fraction::from_integer(0),
        }
    }

    fn add_tickable(&self, voice: &mut ProportionalVoice, spec: TickableSpec) -> usize {
        let onset = voice.cursor;
        if !spec.grace {
            voice.cursor += spec.duration;
        }
        voice.tickables.push(Tickable {
            spec,
            onset,
            modifiers: Vec::new(),
            stem: None,
            x: None,
        });
        voice.tickables.len() - 1
    }

    fn set_stem_direction(&self, voice: &mut ProportionalVoice, index: usize, direction: StemDirection) {
        if let Some(t) = voice.tickables.get_mut(index) {
            t.stem = Some(direction);
        }
    }

    fn add_modifier(&self, voice: &mut ProportionalVoice, index: usize, modifier: &Modifier) {
        if let Some(t) = voice.tickables.get_mut(index) {
            t.modifiers.push(modifier.clone());
        }
    }

    fn create_formatter(&self) -> ProportionalFormatter {
        ProportionalFormatter::default()
    }

    fn join_voices(&self, formatter: &mut ProportionalFormatter, voices: &[&ProportionalVoice]) {
        formatter.joined.push(voices.len());
    }

    fn pre_calculate_min_total_width(&self, formatter: &mut ProportionalFormatter, voices: &[&ProportionalVoice]) -> f64 {
        formatter.slots = self.compute_slots(voices.iter().copied());
        formatter.slots.iter().map(|(_, w)| w).sum()
    }

    fn format(&self, formatter: &mut ProportionalFormatter, voices: &mut [&mut ProportionalVoice], width: f64) {
        // Modifiers may have arrived after the width query.
        formatter.slots = self.compute_slots(voices.iter().map(|v| &**v));
        let total: f64 = formatter.slots.iter().map(|(_, w)| w).sum();
        let scale = if total > 0.0 { width / total } else { 1.0 };

        let mut xs = Vec::with_capacity(formatter.slots.len());
        let mut x = 0.0;
        for (_, w) in &formatter.slots {
            xs.push(x);
            x += w * scale;
        }

        for voice in voices.iter_mut() {
            for tickable in &mut voice.tickables {
                tickable.x = formatter
                    .slots
                    .binary_search_by(|(onset, _)| onset.cmp(&tickable.onset))
                    .ok()
                    .map(|i| xs[i]);
            }
        }
    }

    fn tickable_x(&self, voice: &ProportionalVoice, index: usize) -> Option<f64> {
        voice.tickables.get(index).and_then(|t| t.x)
    }

    fn create_tie(&self, spec: TieSpec) -> TieSpec {
        spec
    }

    fn create_curve(&self, spec: CurveSpec) -> CurveSpec {
        spec
    }

    fn create_beam(&self, notes: &[NativeNoteRef]) -> BeamSpec {
        BeamSpec { notes: notes.to_vec() }
    }

    fn create_tuplet(&self, notes: &[NativeNoteRef], actual: u32, normal: u32) -> TupletSpec {
        TupletSpec {
            notes: notes.to_vec(),
            actual,
            normal,
        }
    }
}

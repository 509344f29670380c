//! Programmatic construction of a [`Score`].
//!
//! Parsing a notation format is somebody else's job; the builder is how
//! callers (and tests) assemble the semantic model the layout pass reads.

use super::*;

/// Incrementally assembles a [`Score`], handing out arena ids.
#[derive(Debug, Default)]
pub struct ScoreBuilder {
    score: Score,
    /// (measure index, staff index) per note, for voice-entry lookups
    note_homes: Vec<(usize, usize)>,
}

impl ScoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(&mut self, title: &str) -> &mut Self {
        self.score.title = Some(title.to_string());
        self
    }

    pub fn composer(&mut self, composer: &str) -> &mut Self {
        self.score.composer = Some(composer.to_string());
        self
    }

    /// Add an instrument with `staves` staves, appended below the existing ones.
    pub fn instrument(&mut self, name: &str, staves: usize) -> InstrumentId {
        let id = InstrumentId(self.score.instruments.len());
        let mut staff_ids = Vec::with_capacity(staves);
        for _ in 0..staves.max(1) {
            let staff = StaffId(self.score.staves.len());
            self.score.staves.push(Staff { id: staff, instrument: id });
            staff_ids.push(staff);
        }
        self.score.instruments.push(Instrument {
            name: name.to_string(),
            visible: true,
            staves: staff_ids,
        });
        id
    }

    pub fn hide_instrument(&mut self, id: InstrumentId) -> &mut Self {
        if let Some(instrument) = self.score.instruments.get_mut(id.0) {
            instrument.visible = false;
        }
        self
    }

    /// Append a measure of the given duration; returns its index.
    pub fn measure(&mut self, duration: Fraction) -> usize {
        let absolute_timestamp = self
            .score
            .measures
            .last()
            .map_or(Fraction::from_integer(0), |m| m.absolute_timestamp + m.duration);
        let index = self.score.measures.len();
        self.score.measures.push(SourceMeasure {
            number: index as i32 + 1,
            absolute_timestamp,
            duration,
            staff_entries: vec![Vec::new(); self.score.staves.len()],
            new_system: false,
            new_page: false,
        });
        index
    }

    pub fn break_system(&mut self, measure: usize) -> &mut Self {
        if let Some(m) = self.score.measures.get_mut(measure) {
            m.new_system = true;
        }
        self
    }

    pub fn break_page(&mut self, measure: usize) -> &mut Self {
        if let Some(m) = self.score.measures.get_mut(measure) {
            m.new_system = true;
            m.new_page = true;
        }
        self
    }

    /// Add a pitched note. Notes added to the same voice at the same
    /// timestamp form a chord.
    pub fn note(
        &mut self,
        measure: usize,
        staff: usize,
        voice: u32,
        timestamp: Fraction,
        pitch: Pitch,
        length: Fraction,
    ) -> NoteId {
        self.push_note(measure, staff, voice, timestamp, Some(pitch), length, false)
    }

    pub fn rest(
        &mut self,
        measure: usize,
        staff: usize,
        voice: u32,
        timestamp: Fraction,
        length: Fraction,
    ) -> NoteId {
        self.push_note(measure, staff, voice, timestamp, None, length, false)
    }

    /// Add a grace note sharing the staff entry of the principal note at `timestamp`.
    pub fn grace_note(
        &mut self,
        measure: usize,
        staff: usize,
        voice: u32,
        timestamp: Fraction,
        pitch: Pitch,
        length: Fraction,
    ) -> NoteId {
        self.push_note(measure, staff, voice, timestamp, Some(pitch), length, true)
    }

    #[allow(clippy::too_many_arguments)]
    fn push_note(
        &mut self,
        measure: usize,
        staff: usize,
        voice: u32,
        timestamp: Fraction,
        pitch: Option<Pitch>,
        length: Fraction,
        grace: bool,
    ) -> NoteId {
        let id = NoteId(self.score.notes.len());
        let source = &mut self.score.measures[measure];
        if source.staff_entries.len() <= staff {
            source.staff_entries.resize(staff + 1, Vec::new());
        }
        let absolute = source.absolute_timestamp + timestamp;

        let entries = &mut source.staff_entries[staff];
        let entry_idx = match entries.iter().position(|e| e.timestamp >= timestamp) {
            Some(i) if entries[i].timestamp == timestamp => i,
            Some(i) => {
                entries.insert(i, SourceStaffEntry { timestamp, voice_entries: Vec::new() });
                i
            }
            None => {
                entries.push(SourceStaffEntry { timestamp, voice_entries: Vec::new() });
                entries.len() - 1
            }
        };

        let entry = &mut entries[entry_idx];
        match entry
            .voice_entries
            .iter_mut()
            .find(|ve| ve.voice == voice && ve.grace == grace)
        {
            Some(ve) => ve.notes.push(id),
            None => {
                let ve = VoiceEntry {
                    voice,
                    notes: vec![id],
                    lyrics: Vec::new(),
                    articulations: Vec::new(),
                    ornament: None,
                    technical: Vec::new(),
                    grace,
                };
                // Grace entries precede their principal entry.
                if grace {
                    entry.voice_entries.insert(0, ve);
                } else {
                    entry.voice_entries.push(ve);
                }
            }
        }

        self.score.notes.push(Note {
            id,
            pitch,
            length,
            timestamp: absolute,
            tie_start: None,
            tie_end: None,
            slurs: Vec::new(),
            beam: None,
            tuplet: None,
        });
        self.note_homes.push((measure, staff));
        id
    }

    pub fn tie(&mut self, start: NoteId, end: Option<NoteId>) -> TieId {
        let id = TieId(self.score.ties.len());
        self.score.ties.push(Tie { start_note: start, end_note: end });
        if let Some(n) = self.score.notes.get_mut(start.0) {
            n.tie_start = Some(id);
        }
        if let Some(n) = end.and_then(|end| self.score.notes.get_mut(end.0)) {
            n.tie_end = Some(id);
        }
        id
    }

    /// Add a slur. Either endpoint may be missing to model incomplete data.
    pub fn slur(&mut self, start: Option<NoteId>, end: Option<NoteId>) -> SlurId {
        let id = SlurId(self.score.slurs.len());
        self.score.slurs.push(Slur { start_note: start, end_note: end });
        for note in start.into_iter().chain(end) {
            if let Some(n) = self.score.notes.get_mut(note.0) {
                if !n.slurs.contains(&id) {
                    n.slurs.push(id);
                }
            }
        }
        id
    }

    pub fn beam(&mut self, notes: &[NoteId]) -> BeamId {
        let id = BeamId(self.score.beams.len());
        self.score.beams.push(Beam { notes: notes.to_vec() });
        for note in notes {
            if let Some(n) = self.score.notes.get_mut(note.0) {
                n.beam = Some(id);
            }
        }
        id
    }

    pub fn tuplet(&mut self, notes: &[NoteId], actual: u32, normal: u32) -> TupletId {
        let id = TupletId(self.score.tuplets.len());
        self.score.tuplets.push(Tuplet { notes: notes.to_vec(), actual, normal });
        for note in notes {
            if let Some(n) = self.score.notes.get_mut(note.0) {
                n.tuplet = Some(id);
            }
        }
        id
    }

    /// Attach a lyric syllable to the voice entry holding `note`.
    pub fn lyric(&mut self, note: NoteId, text: &str, verse: u32) -> LyricsEntryId {
        let id = LyricsEntryId(self.score.lyrics.len());
        self.score.lyrics.push(LyricsEntry {
            text: text.to_string(),
            verse,
            word: None,
        });
        if let Some(ve) = self.voice_entry_of(note) {
            ve.lyrics.push(id);
        }
        id
    }

    /// Group syllables into a word, in the given order.
    pub fn word(&mut self, syllables: &[LyricsEntryId]) -> WordId {
        let id = WordId(self.score.words.len());
        self.score.words.push(LyricWord { syllables: syllables.to_vec() });
        for syllable in syllables {
            if let Some(entry) = self.score.lyrics.get_mut(syllable.0) {
                entry.word = Some(id);
            }
        }
        id
    }

    pub fn articulation(&mut self, note: NoteId, articulation: Articulation) -> &mut Self {
        if let Some(ve) = self.voice_entry_of(note) {
            ve.articulations.push(articulation);
        }
        self
    }

    pub fn ornament(&mut self, note: NoteId, ornament: Ornament) -> &mut Self {
        if let Some(ve) = self.voice_entry_of(note) {
            ve.ornament = Some(ornament);
        }
        self
    }

    pub fn technical(&mut self, note: NoteId, instruction: TechnicalInstruction) -> &mut Self {
        if let Some(ve) = self.voice_entry_of(note) {
            ve.technical.push(instruction);
        }
        self
    }

    pub fn repetition(&mut self, measure_index: usize, kind: RepetitionKind) -> &mut Self {
        self.score
            .repetitions
            .push(RepetitionInstruction { measure_index, kind });
        self
    }

    pub fn expression(
        &mut self,
        measure_index: usize,
        staff_index: usize,
        kind: ExpressionKind,
        text: &str,
    ) -> &mut Self {
        self.score.expressions.push(MultiExpression {
            measure_index,
            staff_index,
            kind,
            text: text.to_string(),
        });
        self
    }

    fn voice_entry_of(&mut self, note: NoteId) -> Option<&mut VoiceEntry> {
        let &(measure, staff) = self.note_homes.get(note.0)?;
        self.score.measures[measure].staff_entries[staff]
            .iter_mut()
            .flat_map(|e| e.voice_entries.iter_mut())
            .find(|ve| ve.notes.contains(&note))
    }

    pub fn build(mut self) -> Score {
        let staves = self.score.staves.len();
        for measure in &mut self.score.measures {
            if measure.staff_entries.len() < staves {
                measure.staff_entries.resize(staves, Vec::new());
            }
        }
        self.score
    }
}

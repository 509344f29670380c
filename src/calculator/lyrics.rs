//! Lyric syllables and word assembly.

use log::debug;

use super::Calculator;
use crate::engine::Engine;
use crate::error::LayoutError;
use crate::graphical::{GraphicalLabel, GraphicalLyricEntry, GraphicalLyricWord, LyricEntryRef, VoiceEntryRef};
use crate::model::{LyricsEntryId, WordId};

/// Words seen in part; a word leaves as soon as its last slot is filled.
#[derive(Debug, Default)]
pub struct LyricWordRegistry {
    pending: Vec<GraphicalLyricWord>,
}

impl LyricWordRegistry {
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn contains(&self, word: WordId) -> bool {
        self.pending.iter().any(|w| w.word == word)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Put `entry` into slot `syllable` of `word`; returns the word once complete.
    fn fill(&mut self, word: WordId, syllables: usize, syllable: usize, entry: LyricEntryRef) -> Option<GraphicalLyricWord> {
        let idx = match self.pending.iter().position(|w| w.word == word) {
            Some(i) => i,
            None => {
                self.pending.push(GraphicalLyricWord::new(word, syllables));
                self.pending.len() - 1
            }
        };
        if let Some(slot) = self.pending[idx].entries.get_mut(syllable) {
            *slot = Some(entry);
        }
        if self.pending[idx].is_filled() {
            Some(self.pending.remove(idx))
        } else {
            None
        }
    }
}

impl<E: Engine> Calculator<'_, E> {
    /// Create graphical lyric entries for a voice entry and track their words.
    pub fn handle_voice_entry_lyrics(&mut self, voice_entry: VoiceEntryRef, lyrics: &[LyricsEntryId]) -> Result<(), LayoutError> {
        let score = self.score;
        let y = self.rules.staff_height + self.rules.lyrics_height;

        for &id in lyrics {
            let Some(source) = score.lyrics_entry(id) else {
                debug!("lyrics entry {id:?} is not part of the score, skipped");
                continue;
            };

            let mut label = GraphicalLabel::new(&source.text, self.rules.lyrics_height);
            label.set_label_position_and_shape_borders(self.rules.lyrics_char_width_factor);

            let staff_entry = self.sheet.staff_entry_mut(voice_entry.staff_entry)?;
            staff_entry.lyrics_entries.push(GraphicalLyricEntry {
                source: id,
                label,
                y,
                word: source.word,
            });
            let entry_ref = LyricEntryRef {
                staff_entry: voice_entry.staff_entry,
                lyric: staff_entry.lyrics_entries.len() - 1,
            };

            let Some(word_id) = source.word else { continue };
            let Some(word) = score.word(word_id) else {
                debug!("lyric word {word_id:?} is not part of the score, skipped");
                continue;
            };
            let Some(syllable) = word.syllables.iter().position(|s| *s == id) else {
                debug!("lyrics entry {id:?} is missing from its word {word_id:?}, skipped");
                continue;
            };

            if let Some(done) = self.lyric_words.fill(word_id, word.syllables.len(), syllable, entry_ref) {
                self.sheet.lyric_words.push(done);
            }
        }
        Ok(())
    }
}

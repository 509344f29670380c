//! Full-pass layout scenarios: ties, slurs, justification, lyrics,
//! repetitions and vertical stacking, run through the bundled engine.

use pretty_assertions::assert_eq;
use scorelayout::graphical::MeasureRef;
use scorelayout::{
    geometry_to_json, run_pass, Calculator, EngravingRules, ExpressionKind, Fraction, GraphicalMusicSheet, PassSummary, Pitch,
    ProportionalEngine, RepetitionKind, Score, ScoreBuilder,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn zero() -> Fraction {
    Fraction::from_integer(0)
}

fn whole() -> Fraction {
    Fraction::from_integer(1)
}

fn q() -> Fraction {
    Fraction::new(1, 4)
}

fn layout(score: &Score) -> (GraphicalMusicSheet<ProportionalEngine>, PassSummary) {
    layout_with(score, EngravingRules::default())
}

fn layout_with(score: &Score, rules: EngravingRules) -> (GraphicalMusicSheet<ProportionalEngine>, PassSummary) {
    init();
    let mut calc = Calculator::new(score, ProportionalEngine::default(), rules);
    let summary = run_pass(&mut calc).expect("layout pass failed");
    (calc.into_sheet(), summary)
}

/// Two one-note measures with the notes tied, optionally split across systems.
fn tied_pair(break_between: bool) -> Score {
    let mut b = ScoreBuilder::new();
    b.instrument("Flute", 1);
    let m0 = b.measure(whole());
    let m1 = b.measure(whole());
    let n0 = b.note(m0, 0, 1, zero(), Pitch::new("A", 4), whole());
    let n1 = b.note(m1, 0, 1, zero(), Pitch::new("A", 4), whole());
    b.tie(n0, Some(n1));
    if break_between {
        b.break_system(m1);
    }
    b.build()
}

// ─── Ties ───────────────────────────────────────────────────────────────

#[test]
fn tie_inside_one_system_is_one_fragment() {
    let score = tied_pair(false);
    let (sheet, summary) = layout(&score);
    assert_eq!(summary.systems, 1);
    assert_eq!(summary.ties, 1);

    let tie = &sheet.ties[0];
    assert!(tie.start.is_some() && tie.end.is_some());

    let start = sheet.measure(MeasureRef::new(0, 0)).unwrap();
    let end = sheet.measure(MeasureRef::new(1, 0)).unwrap();
    assert!(start.ties.is_empty());
    assert_eq!(end.ties.len(), 1);
    assert!(end.ties[0].first_note.is_some());
    assert!(end.ties[0].last_note.is_some());
    assert_eq!(end.ties[0].first_indices, vec![0]);
    assert_eq!(end.ties[0].last_indices, vec![0]);
}

#[test]
fn tie_across_a_system_break_splits_in_two() {
    let score = tied_pair(true);
    let (sheet, summary) = layout(&score);
    assert_eq!(summary.systems, 2);

    let start = sheet.measure(MeasureRef::new(0, 0)).unwrap();
    let end = sheet.measure(MeasureRef::new(1, 0)).unwrap();
    assert_eq!(start.ties.len(), 1);
    assert_eq!(end.ties.len(), 1);

    assert!(start.ties[0].first_note.is_some());
    assert!(start.ties[0].last_note.is_none());
    assert!(end.ties[0].first_note.is_none());
    assert!(end.ties[0].last_note.is_some());
}

#[test]
fn tie_binds_the_tied_notehead_of_a_chord() {
    let mut b = ScoreBuilder::new();
    b.instrument("Piano", 1);
    let m0 = b.measure(whole());
    let m1 = b.measure(whole());
    b.note(m0, 0, 1, zero(), Pitch::new("C", 4), whole());
    let e0 = b.note(m0, 0, 1, zero(), Pitch::new("E", 4), whole());
    b.note(m1, 0, 1, zero(), Pitch::new("C", 4), whole());
    let e1 = b.note(m1, 0, 1, zero(), Pitch::new("E", 4), whole());
    b.tie(e0, Some(e1));
    let score = b.build();

    let (sheet, _) = layout(&score);
    let tie = &sheet.measure(MeasureRef::new(1, 0)).unwrap().ties[0];
    assert_eq!(tie.first_indices, vec![1]);
    assert_eq!(tie.last_indices, vec![1]);
}

#[test]
fn tie_without_end_note_keeps_an_open_end() {
    let mut b = ScoreBuilder::new();
    b.instrument("Flute", 1);
    let m0 = b.measure(whole());
    let n0 = b.note(m0, 0, 1, zero(), Pitch::new("A", 4), whole());
    b.tie(n0, None);
    let score = b.build();

    let (sheet, summary) = layout(&score);
    assert_eq!(summary.ties, 1);
    assert!(sheet.ties[0].end.is_none());
    let native = &sheet.measure(MeasureRef::new(0, 0)).unwrap().ties[0];
    assert!(native.first_note.is_some());
    assert!(native.last_note.is_none());
}

/// Three tied notes: one in the first measure, two in the second.
fn tie_chain(break_between: bool) -> Score {
    let mut b = ScoreBuilder::new();
    b.instrument("Horn", 1);
    let m0 = b.measure(Fraction::new(1, 2));
    let m1 = b.measure(Fraction::new(1, 2));
    let n0 = b.note(m0, 0, 1, zero(), Pitch::new("F", 4), Fraction::new(1, 2));
    let n1 = b.note(m1, 0, 1, zero(), Pitch::new("F", 4), q());
    let n2 = b.note(m1, 0, 1, q(), Pitch::new("F", 4), q());
    b.tie(n0, Some(n1));
    b.tie(n1, Some(n2));
    if break_between {
        b.break_system(m1);
    }
    b.build()
}

#[test]
fn chained_ties_inside_one_system_each_bind_both_notes() {
    let mut b = ScoreBuilder::new();
    b.instrument("Horn", 1);
    let m0 = b.measure(Fraction::new(3, 4));
    let n0 = b.note(m0, 0, 1, zero(), Pitch::new("F", 4), q());
    let n1 = b.note(m0, 0, 1, q(), Pitch::new("F", 4), q());
    let n2 = b.note(m0, 0, 1, Fraction::new(1, 2), Pitch::new("F", 4), q());
    b.tie(n0, Some(n1));
    b.tie(n1, Some(n2));
    let score = b.build();

    let (sheet, summary) = layout(&score);
    assert_eq!(summary.ties, 2);
    assert!(sheet.ties.iter().all(|t| t.start.is_some() && t.end.is_some()));

    let ends: Vec<usize> = sheet.ties.iter().filter_map(|t| t.end).map(|e| e.voice_entry.staff_entry.entry).collect();
    assert_eq!(ends, vec![1, 2]);

    let natives = &sheet.measure(MeasureRef::new(0, 0)).unwrap().ties;
    assert_eq!(natives.len(), 2);
    assert!(natives.iter().all(|t| t.first_note.is_some() && t.last_note.is_some()));
}

#[test]
fn chained_tie_splits_only_the_link_that_crosses_the_break() {
    let score = tie_chain(true);
    let (sheet, summary) = layout(&score);
    assert_eq!(summary.systems, 2);
    assert_eq!(summary.ties, 2);

    let first = &sheet.measure(MeasureRef::new(0, 0)).unwrap().ties;
    assert_eq!(first.len(), 1);
    assert!(first[0].first_note.is_some() && first[0].last_note.is_none());

    let second = &sheet.measure(MeasureRef::new(1, 0)).unwrap().ties;
    let shapes: Vec<(bool, bool)> = second.iter().map(|t| (t.first_note.is_some(), t.last_note.is_some())).collect();
    assert_eq!(shapes, vec![(false, true), (true, true)]);
}

#[test]
fn chained_tie_in_one_system_is_never_split() {
    let score = tie_chain(false);
    let (sheet, _) = layout(&score);
    let natives: Vec<_> = sheet.measure_list.iter().flatten().flat_map(|m| m.ties.iter()).collect();
    assert_eq!(natives.len(), 2);
    assert!(natives.iter().all(|t| t.first_note.is_some() && t.last_note.is_some()));
}

// ─── Slurs ──────────────────────────────────────────────────────────────

#[test]
fn slur_over_a_system_break_yields_one_piece_per_system() {
    let mut b = ScoreBuilder::new();
    b.instrument("Violin", 1);
    let m0 = b.measure(Fraction::new(1, 2));
    let m1 = b.measure(Fraction::new(1, 2));
    let n1 = b.note(m0, 0, 1, zero(), Pitch::new("G", 4), q());
    b.note(m0, 0, 1, q(), Pitch::new("A", 4), q());
    let n3 = b.note(m1, 0, 1, zero(), Pitch::new("B", 4), q());
    b.slur(Some(n1), Some(n3));
    b.break_system(m1);
    let score = b.build();

    let (sheet, summary) = layout(&score);
    assert_eq!(summary.slurs.created, 2);
    assert!(summary.slurs.still_open.is_empty());
    assert_eq!(sheet.staff_lines.len(), 2);

    let first = &sheet.staff_lines[0].slurs;
    let second = &sheet.staff_lines[1].slurs;
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert!(first[0].start.is_some() && first[0].end.is_none());
    assert!(second[0].start.is_none() && second[0].end.is_some());
    assert!(first[0].curve.as_ref().is_some_and(|c| c.from.is_some() && c.to.is_none()));
    assert!(second[0].curve.as_ref().is_some_and(|c| c.from.is_none() && c.to.is_some()));
}

#[test]
fn slur_over_three_systems_has_an_open_middle_piece() {
    let mut b = ScoreBuilder::new();
    b.instrument("Violin", 1);
    let notes: Vec<_> = (0..3)
        .map(|_| {
            let m = b.measure(q());
            b.note(m, 0, 1, zero(), Pitch::new("E", 5), q())
        })
        .collect();
    b.slur(Some(notes[0]), Some(notes[2]));
    b.break_system(1);
    b.break_system(2);
    let score = b.build();

    let (sheet, summary) = layout(&score);
    assert_eq!(summary.systems, 3);
    assert_eq!(summary.slurs.created, 3);
    assert!(summary.slurs.still_open.is_empty());

    let shapes: Vec<Vec<(bool, bool)>> = sheet
        .staff_lines
        .iter()
        .map(|line| line.slurs.iter().map(|s| (s.start.is_some(), s.end.is_some())).collect())
        .collect();
    assert_eq!(shapes, vec![vec![(true, false)], vec![(false, false)], vec![(false, true)]]);

    let middle = &sheet.staff_lines[1].slurs[0];
    assert!(middle.curve.as_ref().is_some_and(|c| c.from.is_none() && c.to.is_none()));
}

#[test]
fn overlapping_slurs_close_by_identity() {
    let mut b = ScoreBuilder::new();
    b.instrument("Violin", 1);
    let m0 = b.measure(whole());
    let notes: Vec<_> = (0..4)
        .map(|i| b.note(m0, 0, 1, Fraction::new(i, 4), Pitch::new("D", 5), q()))
        .collect();
    b.slur(Some(notes[0]), Some(notes[2]));
    b.slur(Some(notes[1]), Some(notes[3]));
    let score = b.build();

    let (sheet, summary) = layout(&score);
    assert_eq!(summary.slurs.created, 2);
    assert!(summary.slurs.still_open.is_empty());

    let ends: Vec<usize> = sheet.staff_lines[0]
        .slurs
        .iter()
        .map(|s| s.end.map(|e| e.staff_entry.entry).unwrap())
        .collect();
    assert_eq!(ends, vec![2, 3]);
}

#[test]
fn incomplete_slurs_are_never_rendered() {
    let mut b = ScoreBuilder::new();
    b.instrument("Violin", 1);
    let m0 = b.measure(Fraction::new(1, 2));
    let n0 = b.note(m0, 0, 1, zero(), Pitch::new("E", 5), q());
    let n1 = b.note(m0, 0, 1, q(), Pitch::new("F", 5), q());
    b.slur(Some(n0), None);
    b.slur(None, Some(n1));
    let score = b.build();

    let (sheet, summary) = layout(&score);
    assert_eq!(summary.slurs.created, 0);
    assert!(summary.slurs.still_open.is_empty());
    assert!(sheet.staff_lines[0].slurs.is_empty());
}

#[test]
fn slur_starting_on_a_tied_continuation_is_not_opened() {
    let mut b = ScoreBuilder::new();
    b.instrument("Cello", 1);
    let m0 = b.measure(Fraction::new(3, 4));
    let n0 = b.note(m0, 0, 1, zero(), Pitch::new("C", 3), q());
    let n1 = b.note(m0, 0, 1, q(), Pitch::new("C", 3), q());
    let n2 = b.note(m0, 0, 1, Fraction::new(1, 2), Pitch::new("D", 3), q());
    b.tie(n0, Some(n1));
    b.slur(Some(n1), Some(n2));
    let score = b.build();

    let (sheet, summary) = layout(&score);
    assert_eq!(summary.slurs.created, 0);
    assert!(summary.slurs.still_open.is_empty());
    assert!(sheet.staff_lines[0].slurs.is_empty());
}

// ─── Justification ──────────────────────────────────────────────────────

#[test]
fn empty_staff_shares_the_width_of_the_busy_one() {
    let mut b = ScoreBuilder::new();
    b.instrument("Piano", 2);
    let m0 = b.measure(whole());
    b.note(m0, 0, 1, zero(), Pitch::new("E", 5), Fraction::new(1, 2));
    b.note(m0, 0, 1, Fraction::new(1, 2), Pitch::new("D", 5), Fraction::new(1, 2));
    b.note(m0, 0, 2, zero(), Pitch::new("G", 4), whole());
    let score = b.build();

    let (sheet, summary) = layout(&score);
    assert_eq!(summary.measure_widths, vec![36.0 / 10.0 + 5.0]);

    let upper = sheet.measure(MeasureRef::new(0, 0)).unwrap();
    let lower = sheet.measure(MeasureRef::new(0, 1)).unwrap();
    assert!(lower.voices.is_empty());
    assert_eq!(upper.minimum_staff_entries_width, lower.minimum_staff_entries_width);
    assert_eq!(upper.width, lower.width);

    assert_eq!(upper.staff_entries[0].x, 1.4);
    assert!(upper.staff_entries[1].x > upper.staff_entries[0].x);
    assert!(upper.staff_entries[1].x < upper.width);
}

#[test]
fn co_timed_entries_line_up_across_staves() {
    let mut b = ScoreBuilder::new();
    b.instrument("Piano", 2);
    let m0 = b.measure(whole());
    for i in 0..4 {
        b.note(m0, 0, 1, Fraction::new(i, 4), Pitch::new("C", 5), q());
    }
    b.note(m0, 1, 1, zero(), Pitch::new("C", 3), Fraction::new(1, 2));
    b.note(m0, 1, 1, Fraction::new(1, 2), Pitch::new("G", 2), Fraction::new(1, 2));
    let score = b.build();

    let (sheet, _) = layout(&score);
    let upper = sheet.measure(MeasureRef::new(0, 0)).unwrap();
    let lower = sheet.measure(MeasureRef::new(0, 1)).unwrap();
    assert_eq!(upper.staff_entries[0].x, lower.staff_entries[0].x);
    assert_eq!(upper.staff_entries[2].x, lower.staff_entries[1].x);
}

#[test]
fn tuplet_entries_line_up_with_plain_beats() {
    let mut b = ScoreBuilder::new();
    b.instrument("Piano", 2);
    let m0 = b.measure(Fraction::new(1, 2));
    let e = Fraction::new(1, 8);
    let triplet: Vec<_> = (0..3)
        .map(|i| b.note(m0, 0, 1, Fraction::new(i, 12), Pitch::new("C", 5), e))
        .collect();
    b.tuplet(&triplet, 3, 2);
    b.note(m0, 0, 1, q(), Pitch::new("D", 5), q());
    b.note(m0, 1, 1, zero(), Pitch::new("C", 3), q());
    b.note(m0, 1, 1, q(), Pitch::new("G", 2), q());
    let score = b.build();

    let (sheet, _) = layout(&score);
    let upper = sheet.measure(MeasureRef::new(0, 0)).unwrap();
    let lower = sheet.measure(MeasureRef::new(0, 1)).unwrap();
    assert_eq!(upper.tuplets.len(), 1);
    assert_eq!(upper.staff_entries[0].x, lower.staff_entries[0].x);
    assert_eq!(upper.staff_entries[3].x, lower.staff_entries[1].x);
    assert!(upper.staff_entries[2].x < upper.staff_entries[3].x);
}

#[test]
fn oversized_measure_keeps_its_minimum_width() {
    let mut b = ScoreBuilder::new();
    b.instrument("Flute", 1);
    let m0 = b.measure(whole());
    for i in 0..8 {
        b.note(m0, 0, 1, Fraction::new(i, 8), Pitch::new("C", 5), Fraction::new(1, 8));
    }
    let score = b.build();
    let rules = EngravingRules {
        page_width: 30.0,
        ..EngravingRules::default()
    };
    let content = rules.system_content_width();
    let padding = rules.measure_left_padding + rules.measure_right_padding;

    let (sheet, summary) = layout_with(&score, rules);
    let needed = summary.measure_widths[0] + padding;
    assert!(needed > content, "{needed} <= {content}");

    let measure = sheet.measure(MeasureRef::new(0, 0)).unwrap();
    assert!((measure.width - needed).abs() < 1e-9, "{}", measure.width);
    let xs: Vec<f64> = measure.staff_entries.iter().map(|e| e.x).collect();
    assert!(xs.windows(2).all(|w| w[0] < w[1]), "{xs:?}");
}

#[test]
fn denser_measures_are_never_narrower() {
    let widths: Vec<f64> = [1, 2, 3, 4, 6, 8]
        .into_iter()
        .map(|count| {
            let mut b = ScoreBuilder::new();
            b.instrument("Flute", 1);
            let m0 = b.measure(whole());
            for i in 0..count {
                b.note(m0, 0, 1, Fraction::new(i, count), Pitch::new("F", 4), Fraction::new(1, count));
            }
            let score = b.build();
            layout(&score).1.measure_widths[0]
        })
        .collect();

    assert!(widths.windows(2).all(|w| w[0] <= w[1]), "{widths:?}");
    assert!(widths.iter().all(|w| *w >= EngravingRules::default().min_measure_width));
}

#[test]
fn empty_score_column_falls_back_to_the_default_width() {
    let mut b = ScoreBuilder::new();
    b.instrument("Flute", 1);
    b.measure(whole());
    let score = b.build();

    let (_, summary) = layout(&score);
    assert_eq!(summary.measure_widths, vec![200.0]);
}

#[test]
fn systems_wrap_when_the_page_is_full() {
    let mut b = ScoreBuilder::new();
    b.instrument("Flute", 1);
    for _ in 0..12 {
        let m = b.measure(whole());
        for i in 0..8 {
            b.note(m, 0, 1, Fraction::new(i, 8), Pitch::new("C", 5), Fraction::new(1, 8));
        }
    }
    let score = b.build();

    let (sheet, summary) = layout(&score);
    assert!(summary.systems > 1);
    let placed: Vec<usize> = sheet.systems.iter().flat_map(|s| s.measure_indices.iter().copied()).collect();
    assert_eq!(placed, (0..12).collect::<Vec<_>>());

    let content = EngravingRules::default().system_content_width();
    for system in &sheet.systems {
        let total: f64 = system
            .measure_indices
            .iter()
            .map(|&mi| sheet.measure(MeasureRef::new(mi, 0)).unwrap().width)
            .sum();
        assert!((total - content).abs() < 1e-9, "{total}");
    }
}

// ─── Lyrics ─────────────────────────────────────────────────────────────

#[test]
fn lyric_word_is_finalized_with_every_syllable() {
    let mut b = ScoreBuilder::new();
    b.instrument("Voice", 1);
    let m0 = b.measure(Fraction::new(3, 4));
    let syllables: Vec<_> = ["Hal", "le", "lu"]
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let n = b.note(m0, 0, 1, Fraction::new(i as i32, 4), Pitch::new("G", 4), q());
            b.lyric(n, text, 1)
        })
        .collect();
    let word = b.word(&syllables);
    let score = b.build();

    init();
    let mut calc = Calculator::new(&score, ProportionalEngine::default(), EngravingRules::default());
    run_pass(&mut calc).unwrap();
    assert!(calc.pending_lyric_words().is_empty());

    let sheet = calc.sheet();
    assert_eq!(sheet.lyric_words.len(), 1);
    assert_eq!(sheet.lyric_words[0].word, word);
    assert_eq!(sheet.lyric_words[0].entries.len(), 3);
    assert!(sheet.lyric_words[0].is_filled());

    let texts: Vec<&str> = (0..3)
        .map(|e| {
            let se = sheet.staff_entry(MeasureRef::new(0, 0).staff_entry(e)).unwrap();
            se.lyrics_entries[0].label.text.as_str()
        })
        .collect();
    assert_eq!(texts, vec!["Hal", "le", "lu"]);
}

#[test]
fn unfinished_word_stays_pending() {
    let mut b = ScoreBuilder::new();
    b.instrument("Voice", 1);
    let m0 = b.measure(Fraction::new(1, 4));
    let n = b.note(m0, 0, 1, zero(), Pitch::new("G", 4), q());
    let sung = b.lyric(n, "glo", 1);
    let never_sung = b.lyric(n, "ri", 1);
    b.word(&[sung, never_sung]);
    let mut score = b.build();
    // Detach the second syllable from every voice entry.
    for entry in &mut score.measures[0].staff_entries[0] {
        for ve in &mut entry.voice_entries {
            ve.lyrics.retain(|l| *l == sung);
        }
    }

    init();
    let mut calc = Calculator::new(&score, ProportionalEngine::default(), EngravingRules::default());
    run_pass(&mut calc).unwrap();
    assert_eq!(calc.pending_lyric_words().len(), 1);
    assert!(calc.sheet().lyric_words.is_empty());
}

// ─── Repetitions and expressions ────────────────────────────────────────

#[test]
fn repetition_without_a_visible_staff_is_dropped() {
    let mut b = ScoreBuilder::new();
    let hidden = b.instrument("Cue", 1);
    b.hide_instrument(hidden);
    let m0 = b.measure(whole());
    b.note(m0, 0, 1, zero(), Pitch::new("C", 5), whole());
    b.repetition(m0, RepetitionKind::Fine);
    let score = b.build();

    let (sheet, summary) = layout(&score);
    assert_eq!(summary.dropped_repetitions, 1);
    assert!(sheet.measure(MeasureRef::new(0, 0)).unwrap().word_repetitions.is_empty());
}

#[test]
fn repetition_lands_on_the_topmost_visible_staff() {
    let mut b = ScoreBuilder::new();
    let hidden = b.instrument("Cue", 1);
    b.instrument("Oboe", 1);
    b.instrument("Bassoon", 1);
    b.hide_instrument(hidden);
    let m0 = b.measure(whole());
    b.note(m0, 1, 1, zero(), Pitch::new("C", 5), whole());
    b.repetition(m0, RepetitionKind::DaCapo);
    b.repetition(m0, RepetitionKind::Segno);
    let score = b.build();

    let (sheet, summary) = layout(&score);
    assert_eq!(summary.dropped_repetitions, 0);
    let column: Vec<Vec<RepetitionKind>> = (0..3)
        .map(|si| sheet.measure(MeasureRef::new(0, si)).unwrap().word_repetitions.clone())
        .collect();
    assert_eq!(column, vec![vec![], vec![RepetitionKind::DaCapo], vec![]]);
}

#[test]
fn expressions_attach_to_their_own_staff() {
    let mut b = ScoreBuilder::new();
    b.instrument("Piano", 2);
    let m0 = b.measure(whole());
    b.note(m0, 0, 1, zero(), Pitch::new("C", 5), whole());
    b.expression(m0, 1, ExpressionKind::Mood, "dolce");
    b.expression(m0, 5, ExpressionKind::Unknown, "nowhere");
    let score = b.build();

    let (sheet, summary) = layout(&score);
    assert_eq!(summary.dropped_expressions, 1);
    assert_eq!(sheet.measure(MeasureRef::new(0, 1)).unwrap().expressions, vec!["dolce".to_string()]);
    assert!(sheet.measure(MeasureRef::new(0, 0)).unwrap().expressions.is_empty());
}

// ─── Vertical layout ────────────────────────────────────────────────────

#[test]
fn systems_stack_by_height_and_gap() {
    let mut b = ScoreBuilder::new();
    b.instrument("Piano", 2);
    for m in 0..4 {
        let measure = b.measure(whole());
        b.note(measure, 0, 1, zero(), Pitch::new("C", 5), whole());
        if m > 0 {
            b.break_system(measure);
        }
    }
    b.break_page(3);
    let score = b.build();

    let (sheet, summary) = layout(&score);
    assert_eq!(summary.pages, 2);
    assert_eq!(summary.systems, 4);

    let geometry = sheet.geometry();
    let ys: Vec<Vec<f64>> = geometry
        .pages
        .iter()
        .map(|p| p.systems.iter().map(|s| s.y).collect())
        .collect();
    // top 19, two staff lines of 10 each, gap 5
    assert_eq!(ys, vec![vec![19.0, 44.0, 69.0], vec![19.0]]);

    let lines: Vec<f64> = geometry.pages[0].systems[0].staff_lines.iter().map(|l| l.y).collect();
    assert_eq!(lines, vec![0.0, 10.0]);
    assert!(geometry.pages.iter().flat_map(|p| &p.systems).all(|s| s.x == 5.0 && s.height == 20.0));
}

// ─── Passes ─────────────────────────────────────────────────────────────

#[test]
fn rerunning_a_pass_rebuilds_from_scratch() {
    let mut b = ScoreBuilder::new();
    b.instrument("Violin", 1);
    let m0 = b.measure(Fraction::new(1, 2));
    let m1 = b.measure(Fraction::new(1, 2));
    let n0 = b.note(m0, 0, 1, zero(), Pitch::new("A", 4), Fraction::new(1, 2));
    let n1 = b.note(m1, 0, 1, zero(), Pitch::new("A", 4), q());
    let n2 = b.note(m1, 0, 1, q(), Pitch::new("B", 4), q());
    b.tie(n0, Some(n1));
    b.slur(Some(n1), Some(n2));
    b.beam(&[n1, n2]);
    b.break_system(m1);
    let score = b.build();

    init();
    let mut calc = Calculator::new(&score, ProportionalEngine::default(), EngravingRules::default());
    let first = run_pass(&mut calc).unwrap();
    let geometry = calc.sheet().geometry();
    let ties: usize = calc.sheet().measure_list.iter().flatten().map(|m| m.ties.len()).sum();

    let second = run_pass(&mut calc).unwrap();
    assert_eq!(first, second);
    assert_eq!(calc.sheet().geometry(), geometry);
    let ties_again: usize = calc.sheet().measure_list.iter().flatten().map(|m| m.ties.len()).sum();
    assert_eq!(ties_again, ties);
    assert_eq!(calc.sheet().measure(MeasureRef::new(1, 0)).unwrap().beams.len(), 1);
}

#[test]
fn geometry_serializes_to_json() {
    let score = tied_pair(true);
    let (sheet, _) = layout(&score);
    let json = geometry_to_json(&sheet).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["pages"][0]["systems"].as_array().map(Vec::len), Some(2));
    assert_eq!(value["pages"][0]["systems"][1]["staff_lines"][0]["measures"][0]["measure_index"], 1);
}

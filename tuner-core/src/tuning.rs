//! # Musical Tuning Module
//!
//! Maps a detected fundamental frequency onto a chromatic note reading.
//! Classification works against a single reference octave of twelve
//! equal-tempered pitch classes starting at A = 440 Hz; any input frequency is
//! folded into that octave, matched to its nearest class, and the octave
//! offset is recovered from the number of folding steps.
//!
//! ## Features
//! - Static 12-entry pitch-class table (A to G#)
//! - Octave folding and nearest-class search with a deterministic tie-break
//! - One-shot boundary correction keeping deviations within (-50, +50] cents
//! - Semitone transposition for written-pitch instruments
//! - Amplitude gating to suppress unreliable readings

use once_cell::sync::Lazy;
use serde::Serialize;

/// Number of semitones in one octave.
pub const SEMITONES_PER_OCTAVE: i32 = 12;

/// Frequency of the lowest entry in the reference table.
pub const REFERENCE_A_HZ: f32 = 440.0;

/// Deviations above this many cents are re-targeted to the next class up.
const CORRECTION_LIMIT_CENTS: f32 = 50.0;

/// A single chromatic semitone within the reference octave.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PitchClass {
    /// Note name without octave (e.g., "A", "C#")
    pub name: &'static str,
    /// Frequency in Hz within the reference octave
    pub reference_frequency_hz: f32,
}

/// Statically computed reference octave (A = 440 Hz up to G#).
///
/// Equal temperament: `f = 440 * 2^(n/12)` for n = 0..12. The table is
/// strictly increasing and spans less than one octave, which is what lets
/// folding terminate.
pub static PITCH_CLASSES: Lazy<[PitchClass; 12]> = Lazy::new(|| {
    const NOTE_NAMES: [&str; 12] = [
        "A", "A#", "B", "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#",
    ];
    let mut table = [PitchClass {
        name: NOTE_NAMES[0],
        reference_frequency_hz: REFERENCE_A_HZ,
    }; 12];

    for (i, class) in table.iter_mut().enumerate() {
        class.name = NOTE_NAMES[i];
        class.reference_frequency_hz = REFERENCE_A_HZ * 2.0_f32.powf(i as f32 / 12.0);
    }
    table
});

/// A classified note, produced fresh for every accepted frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteReading {
    /// The measured (unfolded) frequency in Hz.
    pub frequency_hz: f32,
    /// Pitch-class name after correction and transposition.
    pub note_name: &'static str,
    /// Octave relative to the reference table's own octave (0).
    pub octave: i32,
    /// Deviation from the target pitch in cents, within (-50, +50].
    pub deviation_cents: f32,
}

/// Classifies a frequency/amplitude pair against the static reference table.
///
/// # Arguments
/// * `frequency_hz` - Detected fundamental in Hz
/// * `amplitude` - Detected amplitude of the frame
/// * `threshold` - Amplitude gate; readings at or below it are dropped
/// * `transposition_semitones` - Display shift applied after classification
///
/// # Returns
/// * `Some(reading)` - The classified note
/// * `None` - Gated by amplitude, or the frequency is not a positive finite number
pub fn classify(
    frequency_hz: f32,
    amplitude: f32,
    threshold: f32,
    transposition_semitones: i32,
) -> Option<NoteReading> {
    classify_with(
        PITCH_CLASSES.as_slice(),
        frequency_hz,
        amplitude,
        threshold,
        transposition_semitones,
    )
}

/// Same as [`classify`], against an arbitrary reference table.
///
/// The table must be non-empty, strictly increasing, strictly positive and
/// span less than one octave; an empty table yields `None`.
pub fn classify_with(
    table: &[PitchClass],
    frequency_hz: f32,
    amplitude: f32,
    threshold: f32,
    transposition_semitones: i32,
) -> Option<NoteReading> {
    // Equality is rejected; NaN amplitudes fail the comparison and are rejected too.
    if !(amplitude > threshold) {
        return None;
    }
    if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
        return None;
    }
    let (lowest, highest) = match (table.first(), table.last()) {
        (Some(lo), Some(hi)) => (lo.reference_frequency_hz, hi.reference_frequency_hz),
        _ => return None,
    };

    let (folded, mut octave) = fold_into_octave(frequency_hz, lowest, highest);
    let mut index = nearest_class_index(table, folded)?;

    let mut deviation_cents =
        calculate_cents_deviation(frequency_hz, target_frequency(table, index, octave));

    if deviation_cents > CORRECTION_LIMIT_CENTS {
        index = (index + 1) % table.len();
        if index == 0 {
            octave += 1;
        }
        deviation_cents =
            calculate_cents_deviation(frequency_hz, target_frequency(table, index, octave));
    }

    let (index, octave) = transpose_in(table.len(), index, octave, transposition_semitones);

    Some(NoteReading {
        frequency_hz,
        note_name: table[index].name,
        octave,
        deviation_cents,
    })
}

/// Shifts a `(class index, octave)` pair by a number of semitones in a
/// 12-entry table.
///
/// Only one octave step is ever applied: shifts with a magnitude above 12
/// land on the right pitch class but an octave short.
pub fn transpose(index: usize, octave: i32, semitones: i32) -> (usize, i32) {
    transpose_in(SEMITONES_PER_OCTAVE as usize, index, octave, semitones)
}

fn transpose_in(len: usize, index: usize, octave: i32, semitones: i32) -> (usize, i32) {
    let len = len as i32;
    let shifted = index as i32 + semitones;
    if shifted > len - 1 {
        ((shifted % len) as usize, octave + 1)
    } else if shifted < 0 {
        // rem_euclid keeps the index in range even when |semitones| > len
        (shifted.rem_euclid(len) as usize, octave - 1)
    } else {
        (shifted as usize, octave)
    }
}

/// Folds a frequency into the reference octave.
///
/// Returns the folded frequency and the octave offset (halvings minus
/// doublings). The result lies in `[lowest, 2 * lowest)`.
fn fold_into_octave(frequency_hz: f32, lowest: f32, highest: f32) -> (f32, i32) {
    let mut folded = frequency_hz;
    let mut octave = 0;
    while folded > highest {
        folded /= 2.0;
        octave += 1;
    }
    while folded < lowest {
        folded *= 2.0;
        octave -= 1;
    }
    (folded, octave)
}

/// Index of the class closest (in Hz) to `folded`. Ties go to the lowest index.
pub(crate) fn nearest_class_index(table: &[PitchClass], folded: f32) -> Option<usize> {
    // `min_by` keeps the first of several equal minima.
    table
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            let diff_a = (a.reference_frequency_hz - folded).abs();
            let diff_b = (b.reference_frequency_hz - folded).abs();
            diff_a.total_cmp(&diff_b)
        })
        .map(|(i, _)| i)
}

fn target_frequency(table: &[PitchClass], index: usize, octave: i32) -> f32 {
    table[index].reference_frequency_hz * 2.0_f32.powi(octave)
}

/// Calculates the deviation from a target frequency in cents.
///
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values indicate sharpness, negative values indicate flatness
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

#[cfg(test)]
mod tests {
    use super::*;

    const AMP: f32 = 0.5;
    const THRESHOLD: f32 = 0.025;

    fn reading(freq: f32) -> NoteReading {
        classify(freq, AMP, THRESHOLD, 0).expect("reading above threshold")
    }

    #[test]
    fn table_is_strictly_increasing_within_one_octave() {
        let table = PITCH_CLASSES.as_slice();
        assert_eq!(table.len(), 12);
        assert_eq!(table[0].reference_frequency_hz, 440.0);
        for pair in table.windows(2) {
            assert!(pair[0].reference_frequency_hz < pair[1].reference_frequency_hz);
        }
        assert!(table[11].reference_frequency_hz < 2.0 * table[0].reference_frequency_hz);
    }

    #[test]
    fn slightly_sharp_a_one_octave_up() {
        let r = reading(880.5);
        assert_eq!(r.note_name, "A");
        assert_eq!(r.octave, 1);
        assert!((r.deviation_cents - 0.98).abs() < 0.01, "{}", r.deviation_cents);
        assert_eq!(r.frequency_hz, 880.5);
    }

    #[test]
    fn reference_pitches_have_zero_deviation() {
        for class in PITCH_CLASSES.iter() {
            let r = reading(class.reference_frequency_hz);
            assert_eq!(r.note_name, class.name);
            assert_eq!(r.octave, 0);
            assert!(r.deviation_cents.abs() < 0.01);
        }
    }

    #[test]
    fn octave_folding_shifts_only_the_octave() {
        for &f in &[440.0_f32, 452.0, 523.25, 600.0, 700.0, 831.0, 850.0, 870.0] {
            let base = reading(f);
            for k in -4..=4 {
                let shifted = reading(f * 2.0_f32.powi(k));
                assert_eq!(shifted.note_name, base.note_name, "f={f} k={k}");
                assert_eq!(shifted.octave, base.octave + k, "f={f} k={k}");
                assert!((shifted.deviation_cents - base.deviation_cents).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn low_c_folds_to_negative_octave() {
        // C two octaves below the table's C (523.25 Hz)
        let r = reading(130.81);
        assert_eq!(r.note_name, "C");
        assert_eq!(r.octave, -2);
        assert!(r.deviation_cents.abs() < 0.5);
    }

    #[test]
    fn deviation_stays_within_half_semitone() {
        let mut f = 20.0_f32;
        while f < 5000.0 {
            let r = reading(f);
            assert!(
                r.deviation_cents > -50.0 && r.deviation_cents <= 50.0,
                "f={f} dev={}",
                r.deviation_cents
            );
            f *= 1.0037;
        }
    }

    #[test]
    fn frequency_above_table_top_wraps_to_next_a() {
        // Folds to itself (no octave below fits), nearest is G# but more than
        // 50 cents sharp, so the correction wraps to A one octave up.
        let r = reading(870.0);
        assert_eq!(r.note_name, "A");
        assert_eq!(r.octave, 1);
        assert!(r.deviation_cents < 0.0 && r.deviation_cents > -50.0);
    }

    #[test]
    fn linear_midpoint_corrects_to_upper_class() {
        // Halfway in Hz between A and A# is more than 50 cents above A.
        let table = PITCH_CLASSES.as_slice();
        let mid = (table[0].reference_frequency_hz + table[1].reference_frequency_hz) / 2.0;
        let r = reading(mid);
        assert_eq!(r.note_name, "A#");
        assert!(r.deviation_cents < -49.0 && r.deviation_cents > -50.0);
    }

    #[test]
    fn amplitude_gate_rejects_equality() {
        assert!(classify(440.0, THRESHOLD, THRESHOLD, 0).is_none());
        assert!(classify(440.0, THRESHOLD + 1.0, THRESHOLD, 0).is_some());
        assert!(classify(440.0, 0.0, 0.0, 0).is_none());
        assert!(classify(440.0, f32::NAN, THRESHOLD, 0).is_none());
    }

    #[test]
    fn non_positive_or_non_finite_frequency_yields_nothing() {
        assert!(classify(0.0, AMP, THRESHOLD, 0).is_none());
        assert!(classify(-440.0, AMP, THRESHOLD, 0).is_none());
        assert!(classify(f32::NAN, AMP, THRESHOLD, 0).is_none());
        assert!(classify(f32::INFINITY, AMP, THRESHOLD, 0).is_none());
    }

    #[test]
    fn tie_resolves_to_lower_index() {
        let table = [
            PitchClass { name: "X", reference_frequency_hz: 400.0 },
            PitchClass { name: "Y", reference_frequency_hz: 500.0 },
        ];
        for _ in 0..100 {
            assert_eq!(nearest_class_index(&table, 450.0), Some(0));
        }
        assert_eq!(nearest_class_index(&[], 450.0), None);
    }

    #[test]
    fn equidistant_input_classifies_identically_every_time() {
        let table = PITCH_CLASSES.as_slice();
        let mid = (table[3].reference_frequency_hz + table[4].reference_frequency_hz) / 2.0;
        let first = reading(mid);
        for _ in 0..100 {
            assert_eq!(reading(mid), first);
        }
    }

    #[test]
    fn transposition_shifts_name_and_wraps_octave() {
        // A up two semitones reads as B
        let r = classify(440.0, AMP, THRESHOLD, 2).unwrap();
        assert_eq!((r.note_name, r.octave), ("B", 0));

        // G# up two semitones wraps to A# in the next octave
        let r = classify(830.61, AMP, THRESHOLD, 2).unwrap();
        assert_eq!((r.note_name, r.octave), ("A#", 1));

        // A down three semitones wraps to F# in the octave below
        let r = classify(440.0, AMP, THRESHOLD, -3).unwrap();
        assert_eq!((r.note_name, r.octave), ("F#", -1));
    }

    #[test]
    fn transposition_does_not_change_deviation() {
        let plain = reading(452.0);
        let shifted = classify(452.0, AMP, THRESHOLD, 7).unwrap();
        assert_eq!(plain.deviation_cents, shifted.deviation_cents);
    }

    #[test]
    fn full_octave_round_trip_is_identity() {
        for index in 0..12 {
            for octave in -3..=3 {
                let (up_index, up_octave) = transpose(index, octave, 12);
                assert_eq!((up_index, up_octave), (index, octave + 1));
                assert_eq!(transpose(up_index, up_octave, -12), (index, octave));
            }
        }

        for &f in &[440.0_f32, 523.25, 97.0, 1500.0] {
            let plain = reading(f);
            let up = classify(f, AMP, THRESHOLD, 12).unwrap();
            assert_eq!((up.note_name, up.octave), (plain.note_name, plain.octave + 1));
        }
    }

    #[test]
    fn multi_octave_shift_only_corrects_one_octave() {
        // Known limitation: +24 lands on the same class but only one octave up.
        assert_eq!(transpose(0, 0, 24), (0, 1));
        assert_eq!(transpose(0, 0, -24), (0, -1));
    }

    #[test]
    fn cents_deviation_matches_definition() {
        assert!((calculate_cents_deviation(880.0, 440.0) - 1200.0).abs() < 1e-3);
        assert!(calculate_cents_deviation(440.0, 440.0).abs() < 1e-6);
        assert!(calculate_cents_deviation(430.0, 440.0) < 0.0);
    }
}

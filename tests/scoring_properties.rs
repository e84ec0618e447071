use proptest::prelude::*;

use speechcore::scoring::{
    analyze_clarity, analyze_rhythm, cadence_score, detect_hesitations, pace_wpm, ClarityRating,
};

proptest! {
    #[test]
    fn clarity_score_in_range(text in "[a-zA-Z' .,!?]{0,400}") {
        let result = analyze_clarity(&text);
        prop_assert!((1..=10).contains(&result.score));
        prop_assert_eq!(result.rating, ClarityRating::from_score(result.score));
    }

    #[test]
    fn rhythm_and_cadence_in_range(
        text in "[a-z ,.;:!?]{0,300}",
        duration in -5.0f64..600.0,
    ) {
        let rhythm = analyze_rhythm(&text, duration);
        prop_assert!((1..=10).contains(&rhythm.rhythm_score));
        prop_assert!(rhythm.speech_bursts >= 1);
        prop_assert!((1..=10).contains(&cadence_score(&text, duration)));
    }

    #[test]
    fn pace_matches_formula(words in 0usize..300, duration in 0.1f64..600.0) {
        let text = vec!["word"; words].join(" ");
        let expected = (words as f64 / duration * 60.0).round() as u32;
        prop_assert_eq!(pace_wpm(&text, duration), expected);
    }

    #[test]
    fn hesitation_count_covers_patterns(text in "[a-c -]{0,200}") {
        let report = detect_hesitations(&text);
        prop_assert!(report.count as usize >= report.patterns.len());
        if text.split_whitespace().next().is_none() {
            prop_assert_eq!(report.percentage, 0);
        }
    }
}

use proptest::prelude::*;

use super::*;
use crate::corpus::CorpusOptions;
use crate::model::BlockKind;

fn block(sequence_index: usize, kind: BlockKind, text: &str) -> TextBlock {
    TextBlock {
        kind,
        text: text.to_string(),
        raw_text: text.to_string(),
        sequence_index,
    }
}

fn paragraph(sequence_index: usize, text: &str) -> TextBlock {
    block(sequence_index, BlockKind::Paragraph, text)
}

fn corpus(pages: &[&str]) -> PageCorpus {
    PageCorpus::new(pages, &CorpusOptions::default())
}

fn sequential() -> MatchConfig {
    MatchConfig {
        parallel: false,
        ..MatchConfig::default()
    }
}

#[test]
fn coverage_scenario_assigns_exact_blocks_and_skips_short_ones() {
    let blocks = vec![
        block(0, BlockKind::Heading { level: 2 }, "Introduction"),
        paragraph(
            1,
            "This is a sufficiently long paragraph of body text for testing.",
        ),
        paragraph(2, "Hi"),
    ];
    let pages = corpus(&[
        "Introduction\nThis is a sufficiently long paragraph of body\ntext for testing.\nMore text follows.",
        "Completely unrelated material about rivers and mountains.",
    ]);

    let matches = Matcher::new(MatchConfig::default()).match_blocks(&blocks, &pages);

    assert_eq!(matches.len(), 3);
    assert_eq!(matches[0].assigned_page, PageAssignment::Page(1));
    assert_eq!(matches[0].confidence, 1.0);
    assert_eq!(matches[0].method, MatchMethod::Exact);
    assert_eq!(matches[0].intra_page_offset, Some(0));

    assert_eq!(matches[1].assigned_page, PageAssignment::Page(1));
    assert_eq!(matches[1].confidence, 1.0);
    assert_eq!(matches[1].intra_page_offset, Some(13));

    assert_eq!(matches[2].assigned_page, PageAssignment::Unmatched);
    assert_eq!(matches[2].method, MatchMethod::TooShort);
    assert_eq!(matches[2].confidence, 0.0);

    let summary = MatchSummary::from_matches(&matches);
    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.matched, 2);
    assert_eq!(summary.too_short, 1);
    assert!((summary.coverage() - 2.0 / 3.0).abs() < 1e-9);
}

#[test]
fn empty_corpus_yields_all_unmatched_of_equal_length() {
    let blocks = vec![
        paragraph(0, "A paragraph that would otherwise match something."),
        paragraph(1, "Another reasonably long paragraph."),
    ];

    let matches = Matcher::new(MatchConfig::default()).match_blocks(&blocks, &corpus(&[]));

    assert_eq!(matches.len(), 2);
    assert!(matches
        .iter()
        .all(|found| found.assigned_page == PageAssignment::Unmatched));
    assert!(matches.iter().all(|found| found.method == MatchMethod::NoPages));
    assert_eq!(MatchSummary::from_matches(&matches).coverage(), 0.0);
}

#[test]
fn empty_block_list_yields_no_matches() {
    let matches = Matcher::new(MatchConfig::default()).match_blocks(&[], &corpus(&["page"]));
    assert!(matches.is_empty());
    assert_eq!(MatchSummary::from_matches(&matches).coverage(), 0.0);
}

#[test]
fn duplicated_text_binds_to_earliest_page() {
    let text = "Shared boilerplate paragraph that repeats verbatim across pages.";
    let first = format!("Opening words. {text}");
    let third = format!("{text} Closing words.");
    let pages = corpus(&[
        first.as_str(),
        "Nothing in common on this page at all.",
        third.as_str(),
    ]);

    let exact = Matcher::new(sequential()).match_block(&paragraph(0, text), &pages);
    assert_eq!(exact.assigned_page, PageAssignment::Page(1));
    assert_eq!(exact.method, MatchMethod::Exact);

    let fuzzy_only = Matcher::new(MatchConfig {
        substring_short_circuit: false,
        ..sequential()
    })
    .match_block(&paragraph(0, text), &pages);
    assert_eq!(fuzzy_only.assigned_page, PageAssignment::Page(1));
    assert_eq!(fuzzy_only.method, MatchMethod::Fuzzy);
}

#[test]
fn exact_prefix_beats_stronger_fuzzy_evidence_elsewhere() {
    let text = "Arunachal Pradesh is a state in northeastern India bordering Bhutan and Myanmar.";
    let pages = corpus(&[
        "Arunachal Pradesh is a state in northeastern Indai bordering Bhutan and Myanmar.",
        "Arunachal Pradesh is a state in northeastern India and something else entirely.",
    ]);

    let found = Matcher::new(sequential()).match_block(&paragraph(0, text), &pages);

    assert_eq!(found.assigned_page, PageAssignment::Page(2));
    assert_eq!(found.confidence, 1.0);
    assert_eq!(found.method, MatchMethod::Exact);
    assert_eq!(found.intra_page_offset, Some(0));
}

#[test]
fn noisy_text_is_matched_fuzzily_to_the_right_page() {
    let text = "The quick brown fox jumps over the lazy dog near the river bank";
    let pages = corpus(&[
        "Tables of rainfall figures for the eastern districts during monsoon.",
        "Some preamble. The quick brown fox jumps over the lazy dgo near the river bank. Epilogue.",
    ]);

    let found = Matcher::new(sequential()).match_block(&paragraph(0, text), &pages);

    assert_eq!(found.assigned_page, PageAssignment::Page(2));
    assert_eq!(found.method, MatchMethod::Fuzzy);
    assert!(found.confidence > 0.9 && found.confidence < 1.0);
    assert!(found.intra_page_offset.is_some());
}

#[test]
fn reflowed_text_matches_through_token_overlap() {
    let text = "monsoon rainfall feeds the Siang river valley";
    let pages = corpus(&[
        "A page about something else.",
        "valley river the Siang feeds rainfall monsoon",
    ]);

    let found = Matcher::new(sequential()).match_block(&paragraph(0, text), &pages);

    assert_eq!(found.assigned_page, PageAssignment::Page(2));
    assert_eq!(found.method, MatchMethod::Fuzzy);
}

#[test]
fn page_holding_only_a_number_does_not_capture_blocks_containing_it() {
    let text = "Population grew by 12 percent between the census years of the decade.";
    let pages = corpus(&[
        "12",
        "Population grew by 12 precent between the census years of the decade and more text.",
    ]);

    let found = Matcher::new(MatchConfig::default()).match_block(&paragraph(0, text), &pages);

    assert_eq!(found.assigned_page, PageAssignment::Page(2));
    assert_eq!(found.method, MatchMethod::Fuzzy);
    assert!(found.confidence > 0.9 && found.confidence < 1.0);
}

#[test]
fn page_holding_one_shared_word_loses_to_the_noisy_full_occurrence() {
    let text = "The state borders Bhutan to the west and Myanmar to the esat.";
    let pages = corpus(&[
        "west",
        "The state borders Bhutan to the west and Myanmar to the east. More text follows here.",
    ]);

    let found = Matcher::new(MatchConfig {
        substring_short_circuit: false,
        ..sequential()
    })
    .match_block(&paragraph(0, text), &pages);

    assert_eq!(found.assigned_page, PageAssignment::Page(2));
    assert_eq!(found.method, MatchMethod::Fuzzy);
    assert!(found.confidence < 1.0);
}

#[test]
fn accepted_match_without_a_good_window_has_no_offset() {
    let text = "The quick brown fox jumps over the lazy dog near the river bank";
    let pages = corpus(&[
        "Tables of rainfall figures for the eastern districts during monsoon.",
        "Some preamble. The quick brown fox jumps over the lazy dgo near the river bank. Epilogue.",
    ]);

    let found = Matcher::new(MatchConfig {
        localization_threshold: 1.0,
        ..sequential()
    })
    .match_block(&paragraph(0, text), &pages);

    assert_eq!(found.assigned_page, PageAssignment::Page(2));
    assert_eq!(found.method, MatchMethod::Fuzzy);
    assert!(found.confidence >= 0.6);
    assert_eq!(found.intra_page_offset, None);

    let summary = MatchSummary::from_matches(&[found]);
    assert_eq!(summary.matched, 1);
    assert_eq!(summary.localized, 0);
}

#[test]
fn short_block_above_floor_matches_fuzzily_without_short_circuit() {
    let pages = corpus(&["Nothing here at all.", "Monastery at Tawang is old."]);

    let found = Matcher::new(MatchConfig {
        substring_short_circuit: false,
        ..sequential()
    })
    .match_block(&paragraph(0, "Tawang"), &pages);

    assert_eq!(found.assigned_page, PageAssignment::Page(2));
    assert_eq!(found.method, MatchMethod::Fuzzy);
    assert_eq!(found.confidence, 1.0);
    assert_eq!(found.intra_page_offset, Some(0));
}

#[test]
fn unrelated_block_is_below_threshold_with_best_candidate() {
    let text = "Quantum chromodynamics describes gluon interactions";
    let pages = corpus(&["Bananas grow in tropical orchards", "Kayaks float downstream quickly"]);

    let found = Matcher::new(sequential()).match_block(&paragraph(4, text), &pages);

    assert_eq!(found.block_ref, 4);
    assert_eq!(found.assigned_page, PageAssignment::Unmatched);
    assert_eq!(found.method, MatchMethod::BelowThreshold);
    assert!(found.confidence < 0.6);
    assert!(found.best_candidate.is_some());
    assert_eq!(found.intra_page_offset, None);
}

#[test]
fn localization_points_at_or_just_before_the_block() {
    let filler = (0..80)
        .map(|index| format!("filler{index}"))
        .collect::<Vec<String>>()
        .join(" ");
    let target = "The Brahmaputra enters the state from Tibet";
    let page_text = format!("{filler} {target} trailing words");
    let true_position = filler.chars().count() + 1;

    let found = Matcher::new(MatchConfig {
        substring_short_circuit: false,
        ..sequential()
    })
    .match_block(&paragraph(0, target), &corpus(&[page_text.as_str()]));

    let offset = found.intra_page_offset.expect("offset should be localized");
    assert!(offset <= true_position, "offset {offset} after {true_position}");
    assert!(
        true_position - offset <= 100,
        "offset {offset} too far before {true_position}"
    );
}

#[test]
fn parallel_and_sequential_runs_agree() {
    let blocks = (0..12)
        .map(|index| paragraph(index, &format!("Paragraph number {index} about district {index}")))
        .collect::<Vec<TextBlock>>();
    let pages = corpus(&[
        "Paragraph number 0 about district 0. Paragraph number 1 about district 1.",
        "Paragraph number 5 about district 5 and Paragraph number 7 about district 7.",
        "Nothing here.",
    ]);

    let parallel = Matcher::new(MatchConfig::default()).match_blocks(&blocks, &pages);
    let serial = Matcher::new(sequential()).match_blocks(&blocks, &pages);

    assert_eq!(parallel, serial);
}

#[test]
fn validated_config_clamps_out_of_range_values() {
    let config = MatchConfig {
        page_threshold: 1.7,
        localization_threshold: -0.2,
        window_step: 0,
        prefixes: Vec::new(),
        ..MatchConfig::default()
    }
    .validated();

    assert_eq!(config.page_threshold, 1.0);
    assert_eq!(config.localization_threshold, 0.0);
    assert_eq!(config.window_step, 1);
    assert_eq!(config.prefixes, MatchConfig::default().prefixes);
}

#[test]
fn config_deserializes_with_defaults_for_missing_fields() {
    let config: MatchConfig =
        serde_json::from_str(r#"{ "page_threshold": 0.75, "parallel": false }"#).unwrap();

    assert_eq!(config.page_threshold, 0.75);
    assert!(!config.parallel);
    assert_eq!(config.min_block_length, 5);
    assert!(config.substring_short_circuit);
}

const VOCABULARY: &[&str] = &[
    "river", "valley", "state", "district", "monsoon", "tribe", "festival", "border", "forest",
    "capital", "Itanagar", "Tawang", "the", "of", "and",
];

fn sentence() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(VOCABULARY), 1..10).prop_map(|words| words.join(" "))
}

fn blocks_strategy() -> impl Strategy<Value = Vec<TextBlock>> {
    prop::collection::vec(sentence(), 0..8).prop_map(|texts| {
        texts
            .iter()
            .enumerate()
            .map(|(index, text)| paragraph(index, text))
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn output_preserves_length_and_block_order(
        blocks in blocks_strategy(),
        pages in prop::collection::vec(sentence(), 0..4),
    ) {
        let corpus = PageCorpus::new(&pages, &CorpusOptions::default());
        let matches = Matcher::new(MatchConfig::default()).match_blocks(&blocks, &corpus);

        prop_assert_eq!(matches.len(), blocks.len());
        for (found, source) in matches.iter().zip(&blocks) {
            prop_assert_eq!(found.block_ref, source.sequence_index);
            prop_assert!((0.0..=1.0).contains(&found.confidence));
        }
    }

    #[test]
    fn raising_threshold_never_adds_matches(
        blocks in blocks_strategy(),
        pages in prop::collection::vec(sentence(), 1..4),
        low in 0.0f64..1.0,
        delta in 0.0f64..1.0,
    ) {
        let high = (low + delta).min(1.0);
        let corpus = PageCorpus::new(&pages, &CorpusOptions::default());
        let count = |threshold: f64| {
            Matcher::new(MatchConfig { page_threshold: threshold, parallel: false, ..MatchConfig::default() })
                .match_blocks(&blocks, &corpus)
                .iter()
                .filter(|found| found.assigned_page.is_matched())
                .count()
        };

        prop_assert!(count(high) <= count(low));
    }

    #[test]
    fn accepted_matches_clear_the_threshold(
        blocks in blocks_strategy(),
        pages in prop::collection::vec(sentence(), 1..4),
        threshold in 0.0f64..1.0,
    ) {
        let corpus = PageCorpus::new(&pages, &CorpusOptions::default());
        let matches = Matcher::new(MatchConfig { page_threshold: threshold, ..MatchConfig::default() })
            .match_blocks(&blocks, &corpus);

        for found in matches {
            if found.confidence < threshold {
                prop_assert_eq!(found.assigned_page, PageAssignment::Unmatched);
            }
        }
    }
}

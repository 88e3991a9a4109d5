// Unit tests for reading annotated corpora and selecting content words.

use std::io::Write;

use wortfeld::corpus::filter::{ContentFilter, Pos, PosFilter};
use wortfeld::corpus::models::GroupKey;
use wortfeld::corpus::reader::{load_corpus, load_text, parse_corpus};

fn write_temp(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

const RECORD: &str = r#"[
  {
    "prompt": "Beschreibe ein Auto.",
    "mistral": {
      "TextB": {"tokens": [{"text": "rot", "lemma": "rot", "pos": "ADJ"}]},
      "TextA": {"tokens": [{"text": "blau", "lemma": "blau", "pos": "ADJ"}]}
    },
    "humanText": {"tokens": [{"text": "Grünes", "lemma": "grün", "pos": "ADJ"}]},
    "gpt": {
      "TextA": {"tokens": [{"text": "gelb", "lemma": "gelb", "pos": "ADJ", "is_stop": false}]}
    }
  }
]"#;

// ============================================================
// Reader
// ============================================================

#[test]
fn corpus_documents_keep_record_order() {
    let corpus = parse_corpus(RECORD).unwrap();
    let groups: Vec<GroupKey> = corpus.documents.iter().map(|d| d.group.clone()).collect();
    // Human text first, then generators in field order, variants A before B
    assert_eq!(
        groups,
        vec![
            GroupKey::human(),
            GroupKey::new("mistral", "TextA"),
            GroupKey::new("mistral", "TextB"),
            GroupKey::new("gpt", "TextA"),
        ]
    );
    assert_eq!(corpus.record_count, 1);
    assert_eq!(corpus.token_count(), 4);
}

#[test]
fn corpus_loads_from_file() {
    let file = write_temp(RECORD);
    let corpus = load_corpus(file.path()).unwrap();
    assert_eq!(corpus.documents.len(), 4);
    assert_eq!(corpus.groups().len(), 4);
}

#[test]
fn malformed_corpus_file_is_an_error() {
    let file = write_temp("{\"not\": \"an array\"}");
    assert!(load_corpus(file.path()).is_err());

    let file = write_temp("[{\"humanText\": {\"tokens\": [{\"lemma\": \"x\"}]}}]");
    assert!(load_corpus(file.path()).is_err());
}

#[test]
fn single_text_loads_from_file() {
    let file = write_temp(r#"{"tokens": [{"text": "gut", "lemma": "gut", "pos": "ADJ"}]}"#);
    let text = load_text(file.path()).unwrap();
    assert_eq!(text.words(), vec!["gut"]);
}

// ============================================================
// Content filter
// ============================================================

#[test]
fn filter_selects_lowercased_lemmas_of_chosen_tags() {
    let corpus = parse_corpus(RECORD).unwrap();
    let filter = ContentFilter::with_stop_words(PosFilter::new([Pos::Adj]).unwrap(), Vec::new());
    let lemmas: Vec<String> = corpus
        .documents
        .iter()
        .flat_map(|d| filter.select(&d.text.tokens))
        .map(|(_, lemma)| lemma)
        .collect();
    assert_eq!(lemmas, vec!["grün", "blau", "rot", "gelb"]);
}

#[test]
fn filter_for_other_tags_selects_nothing() {
    let corpus = parse_corpus(RECORD).unwrap();
    let filter = ContentFilter::new(PosFilter::new([Pos::Noun, Pos::Verb]).unwrap());
    assert!(corpus
        .documents
        .iter()
        .all(|d| filter.select(&d.text.tokens).is_empty()));
}

#[test]
fn pos_label_names_the_run() {
    let filter: PosFilter = "adv, ADJ".parse().unwrap();
    assert_eq!(filter.label(), "ADJADV");
    assert!(filter.matches_tag("ADV"));
    assert!(!filter.matches_tag("NOUN"));
}

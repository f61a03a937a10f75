use std::fs;

use dbpe::corpus::read_corpus_lines;
use dbpe::serialization::{from_artifact_json, load_artifact, merges_listing};
use dbpe::{
    BpeModel, CorpusFormat, EvalConfig, Evaluator, IngestConfig, SelectionPolicy, Trainer,
    TrainerConfig, WordCharacters,
};

const CORPUS: &str = "the lowest newest widest\n\
                      low lower lowest slow slower\n\
                      new newer newest wide wider widest\n";

fn trainer(num_merges: usize, defense_interval: Option<usize>) -> Trainer {
    let cfg = TrainerConfig::builder()
        .num_merges(num_merges)
        .defense_interval(defense_interval)
        .seed(Some(1234))
        .show_progress(false)
        .build()
        .expect("configuration");
    Trainer::new(cfg)
}

#[test]
fn train_save_load_tokenize_evaluate() {
    let dir = tempfile::tempdir().expect("tempdir");
    let corpus_path = dir.path().join("corpus.txt");
    fs::write(&corpus_path, CORPUS).expect("write corpus");

    let artifacts = trainer(25, Some(4))
        .train_from_paths(&[&corpus_path], &IngestConfig::default())
        .expect("training");
    assert_eq!(artifacts.model.merges().len(), 25);
    assert_eq!(artifacts.metrics.defense_steps(), vec![5, 10, 15, 20, 25]);

    let artifact_path = dir.path().join("out").join("tokenizer.json");
    artifacts.model.save(&artifact_path, true).expect("save");
    let loaded = load_artifact(&artifact_path).expect("load");
    assert_eq!(loaded, artifacts.model);

    let tokenizer = loaded.tokenizer();
    let tokens = tokenizer.tokenize("lowest widest");
    let rejoined: String = tokens
        .iter()
        .map(|token| token.trim_end_matches(dbpe::END_OF_WORD))
        .collect();
    assert_eq!(rejoined, "lowestwidest");

    let eval_path = dir.path().join("eval.txt");
    fs::write(&eval_path, CORPUS).expect("write eval corpus");
    let lines = read_corpus_lines(&eval_path).expect("read eval corpus");
    let evaluator = Evaluator::new(EvalConfig {
        show_progress: false,
        ..EvalConfig::default()
    });
    let report = evaluator
        .evaluate(&lines, &tokenizer, &WordCharacters)
        .expect("evaluate");
    assert_eq!(report.lines, 3);
    // Every word start is a token start, so recall against the word split is perfect.
    assert!((report.recall - 1.0).abs() < 1e-12);
    assert!(report.precision > 0.0 && report.precision <= 1.0);
    assert!(report.f1 > 0.0 && report.f1 <= 1.0);
}

#[test]
fn defended_and_plain_runs_share_frequency_prefix() {
    let plain = trainer(8, None).train_from_text(CORPUS).expect("plain");
    let defended = trainer(8, Some(3)).train_from_text(CORPUS).expect("defended");

    // Steps before the first random step are chosen by frequency in both runs.
    assert_eq!(plain.model.merges()[..3], defended.model.merges()[..3]);
    assert!(plain
        .metrics
        .iterations
        .iter()
        .all(|it| it.policy == SelectionPolicy::MostFrequent));
    assert_eq!(defended.metrics.iterations[3].policy, SelectionPolicy::Random);
}

#[test]
fn merges_listing_matches_model() {
    let artifacts = trainer(40, Some(2)).train_from_text(CORPUS).expect("train");
    let listing = merges_listing(artifacts.model.merges());
    assert_eq!(listing.lines().count(), artifacts.model.merges().len());
    assert!(!listing.contains("</w>"));

    let json = artifacts.model.to_json(false).expect("json");
    let reparsed: BpeModel = from_artifact_json(&json).expect("parse");
    assert_eq!(reparsed.merges(), artifacts.model.merges());
}

#[test]
fn json_lines_corpus_trains_on_text_only() {
    let dir = tempfile::tempdir().expect("tempdir");
    let body = concat!(
        r#"{"content":"low lower lowest","metadata":{"identification":{"label":"en","prob":0.98}}}"#,
        "\n",
        r#"{"content":"newest widest","warc_headers":{"warc-record-id":"<urn:uuid:1>"}}"#,
        "\n"
    );
    fs::write(dir.path().join("shard.jsonl"), body).expect("write shard");
    let ingest = IngestConfig::builder()
        .extensions(["jsonl"])
        .format(CorpusFormat::JsonLines)
        .build();
    let from_docs = trainer(10, Some(2))
        .train_from_paths(&[dir.path()], &ingest)
        .expect("train jsonl");
    let from_text = trainer(10, Some(2))
        .train_from_text("low lower lowest\nnewest widest")
        .expect("train text");
    assert_eq!(from_docs.model, from_text.model);
}

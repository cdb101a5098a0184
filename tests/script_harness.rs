use std::fs::File;
use std::path::Path;

use kestrel_script_bridge::level::{LevelDescription, PlayerDescription, SpriteDescription, SpriteKind};
use kestrel_script_bridge::script_harness::{
    bless_golden, check_golden, first_divergence, load_fixture, run_fixture, FixtureStep, HarnessFixture,
    HarnessOutput,
};
use kestrel_script_bridge::sprite_manager::UidPolicy;

#[test]
fn lifecycle_fixture_matches_golden() {
    assert_fixture_matches(
        "tests/fixtures/script_harness/lifecycle.json",
        "tests/fixtures/script_harness/lifecycle.golden.json",
    );
}

#[test]
fn lifecycle_fixture_is_stable_across_runs() {
    let fixture = load_fixture("tests/fixtures/script_harness/lifecycle.json").expect("load fixture");
    let first = run_fixture(&fixture).expect("run fixture first time");
    let second = run_fixture(&fixture).expect("run fixture second time");
    assert_eq!(first, second, "fixture should produce identical output across runs");
}

#[test]
fn golden_mismatch_names_the_step_and_field() {
    let fixture = load_fixture("tests/fixtures/script_harness/lifecycle.json").expect("load fixture");
    let output = run_fixture(&fixture).expect("run fixture");
    let dir = tempfile::tempdir().expect("temp dir");
    let golden_path = dir.path().join("nested").join("lifecycle.golden.json");

    bless_golden(&golden_path, &output).expect("bless");
    check_golden(&golden_path, &output).expect("fresh golden matches");

    let mut drifted = output.clone();
    drifted.results[1].cached_uids.push(1);
    let err = check_golden(&golden_path, &drifted).expect_err("cached uids drifted");
    let message = format!("{err:#}");
    assert!(message.contains("step 1 cached_uids: expected [0], got [0, 1]"), "{message}");
    assert!(!message.contains("final_sprites"), "only the first divergence is reported: {message}");
}

#[test]
fn demo_level_runs_with_bundled_script() {
    let level = LevelDescription::load("assets/levels/demo.json").expect("demo level");
    let fixture = HarnessFixture {
        main_script: "assets/scripts/demo.rhai".to_string(),
        uid_policy: UidPolicy::Monotonic,
        deterministic_seed: Some(3),
        level,
        steps: vec![
            FixtureStep { press: vec!["shoot".parse().expect("key")], ..FixtureStep::default() },
            FixtureStep { press: vec!["action".parse().expect("key")], ..FixtureStep::default() },
            FixtureStep { press: vec!["exit".parse().expect("key")], ..FixtureStep::default() },
        ],
    };
    let output = run_fixture(&fixture).expect("run demo");
    assert_eq!(output.setup_logs, vec!["first wave: 2 enemies", "boss worth 2500 points is waiting"]);
    assert_eq!(output.results[0].logs, vec!["eato defeated"]);
    assert_eq!(output.results[1].logs, vec!["player is now big"]);
    assert_eq!(output.results[2].logs, vec!["cached objects: 3"]);
    assert_eq!(output.results[2].cached_uids, vec![0, 2, 6]);
    assert!(output.final_sprites.iter().all(|sprite| sprite.uid != 1 && sprite.uid != 3));
}

#[test]
fn missing_script_fails_the_run() {
    let fixture = HarnessFixture {
        main_script: "tests/fixtures/script_harness/does_not_exist.rhai".to_string(),
        uid_policy: UidPolicy::Monotonic,
        deterministic_seed: None,
        level: LevelDescription {
            name: "missing".to_string(),
            player: PlayerDescription::default(),
            sprites: vec![SpriteDescription {
                uid: None,
                position: [0.0, 0.0],
                kind: SpriteKind::Furball { boss: false },
            }],
        },
        steps: Vec::new(),
    };
    let err = run_fixture(&fixture).expect_err("script is missing");
    assert!(format!("{err:#}").contains("does_not_exist.rhai"), "{err:#}");
}

fn assert_fixture_matches(fixture_path: &str, golden_path: &str) {
    let fixture = load_fixture(fixture_path).expect("load fixture");
    let output = run_fixture(&fixture).expect("run fixture");
    let golden_file = File::open(Path::new(golden_path)).expect("open golden");
    let golden: HarnessOutput = serde_json::from_reader(golden_file).expect("parse golden");
    if let Some(divergence) = first_divergence(&golden, &output) {
        panic!("fixture {fixture_path} diverged from golden {golden_path} at {divergence}");
    }
    assert_eq!(output, golden);
}

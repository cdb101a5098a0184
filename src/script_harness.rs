use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::ScriptConfig;
use crate::input::InputKey;
use crate::level::{LevelDescription, SpriteDescription};
use crate::player::PlayerType;
use crate::session::Session;
use crate::sprite::Uid;
use crate::sprite_manager::UidPolicy;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarnessFixture {
    #[serde(default = "default_main_script")]
    pub main_script: String,
    #[serde(default)]
    pub uid_policy: UidPolicy,
    #[serde(default)]
    pub deterministic_seed: Option<u64>,
    pub level: LevelDescription,
    #[serde(default)]
    pub steps: Vec<FixtureStep>,
}

/// One harness step. Removals run first, then spawns, key presses and evals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FixtureStep {
    #[serde(default)]
    pub remove: Vec<Uid>,
    #[serde(default)]
    pub spawn: Vec<SpriteDescription>,
    #[serde(default)]
    pub press: Vec<InputKey>,
    #[serde(default)]
    pub eval: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HarnessOutput {
    pub level: String,
    pub main_script: String,
    pub setup_logs: Vec<String>,
    pub results: Vec<StepResult>,
    pub final_sprites: Vec<SpriteSummary>,
    pub final_player: PlayerSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepResult {
    pub step: usize,
    pub logs: Vec<String>,
    pub events: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evals: Vec<EvalResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    pub cached_uids: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalResult {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpriteSummary {
    pub uid: u32,
    pub kind: String,
    pub position: [f32; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerSummary {
    pub kind: PlayerType,
    pub position: [f32; 2],
}

fn default_main_script() -> String {
    "assets/scripts/demo.rhai".to_string()
}

pub fn run_fixture(fixture: &HarnessFixture) -> Result<HarnessOutput> {
    let script = ScriptConfig {
        main_script: PathBuf::from(&fixture.main_script),
        deterministic_seed: fixture.deterministic_seed,
        ..ScriptConfig::default()
    };
    let mut session = Session::from_description(&fixture.level, fixture.uid_policy, &script)
        .with_context(|| format!("starting level '{}'", fixture.level.name))?;
    let setup_logs = session.host_mut().take_logs();
    session.drain_events();

    let mut results = Vec::with_capacity(fixture.steps.len());
    for (step, actions) in fixture.steps.iter().enumerate() {
        results.push(run_step(&mut session, step, actions).with_context(|| format!("running step {step}"))?);
    }

    let (final_sprites, final_player) = summarize_level(&session);

    Ok(HarnessOutput {
        level: fixture.level.name.clone(),
        main_script: fixture.main_script.clone(),
        setup_logs,
        results,
        final_sprites,
        final_player,
    })
}

fn run_step(session: &mut Session, step: usize, actions: &FixtureStep) -> Result<StepResult> {
    let mut errors = Vec::new();
    for uid in &actions.remove {
        if !session.remove_sprite(*uid) {
            errors.push(format!("remove: no active sprite with UID {uid}"));
        }
    }
    for sprite in &actions.spawn {
        session.spawn(sprite.build())?;
    }
    for key in &actions.press {
        if let Err(err) = session.press(*key) {
            errors.push(err.to_string());
        }
    }
    let evals = actions
        .eval
        .iter()
        .map(|source| match session.host_mut().eval_to_string(source) {
            Ok(value) => EvalResult { source: source.clone(), value: Some(value), error: None },
            Err(err) => EvalResult { source: source.clone(), value: None, error: Some(err.to_string()) },
        })
        .collect();

    let mut cached_uids: Vec<u32> =
        session.host().uids().map(|table| table.cached_uids()).unwrap_or_default().iter().map(|uid| uid.get()).collect();
    cached_uids.sort_unstable();

    Ok(StepResult {
        step,
        logs: session.host_mut().take_logs(),
        events: session.drain_events().iter().map(ToString::to_string).collect(),
        evals,
        errors,
        cached_uids,
    })
}

fn summarize_level(session: &Session) -> (Vec<SpriteSummary>, PlayerSummary) {
    let level = session.level().borrow();
    let sprites: Vec<SpriteSummary> = level
        .sprites
        .iter()
        .map(|(uid, sprite)| SpriteSummary {
            uid: uid.get(),
            kind: sprite.kind().to_string(),
            position: sprite.position().to_array(),
        })
        .collect();
    let player = PlayerSummary { kind: level.player.kind(), position: level.player.position().to_array() };
    (sprites, player)
}

pub fn load_fixture<P: AsRef<Path>>(path: P) -> Result<HarnessFixture> {
    let file = File::open(path.as_ref()).with_context(|| format!("opening fixture '{}'", path.as_ref().display()))?;
    serde_json::from_reader(file).with_context(|| "parsing fixture JSON")
}

pub const USAGE: &str = "Usage: script_harness <fixture.json> [--check | --bless] [--golden <path>]
  (no mode)       print the run as JSON
  --check         compare the run with its golden file
  --bless         overwrite the golden file with this run
  --golden <path> golden file, defaults to <fixture>.golden.json";

/// What to do with the output of a fixture run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoldenMode {
    Print,
    Check(PathBuf),
    Bless(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessArgs {
    pub fixture: PathBuf,
    pub mode: GoldenMode,
}

impl HarnessArgs {
    /// Parses arguments without the program name.
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut fixture = None;
        let mut golden = None;
        let mut check = false;
        let mut bless = false;
        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            match arg.as_ref() {
                "--check" => check = true,
                "--bless" => bless = true,
                "--golden" => {
                    let path = iter.next().ok_or_else(|| anyhow!("Expected a path after '--golden'"))?;
                    golden = Some(PathBuf::from(path.as_ref()));
                }
                flag if flag.starts_with("--") => bail!("Unknown flag '{flag}'.\n{USAGE}"),
                path if fixture.is_none() => fixture = Some(PathBuf::from(path)),
                extra => bail!("Unexpected argument '{extra}', only one fixture per run."),
            }
        }
        let fixture = fixture.ok_or_else(|| anyhow!("A fixture path is required.\n{USAGE}"))?;
        let golden = golden.unwrap_or_else(|| golden_path_for(&fixture));
        let mode = match (check, bless) {
            (true, true) => bail!("--check and --bless are mutually exclusive"),
            (true, false) => GoldenMode::Check(golden),
            (false, true) => GoldenMode::Bless(golden),
            (false, false) => GoldenMode::Print,
        };
        Ok(Self { fixture, mode })
    }
}

/// `lifecycle.json` pairs with `lifecycle.golden.json`.
pub fn golden_path_for(fixture: &Path) -> PathBuf {
    fixture.with_extension("golden.json")
}

/// Names the first field where a run departs from its golden output, walking
/// the setup, then each step, then the final level state.
pub fn first_divergence(expected: &HarnessOutput, actual: &HarnessOutput) -> Option<String> {
    differ("level", &expected.level, &actual.level)
        .or_else(|| differ("main_script", &expected.main_script, &actual.main_script))
        .or_else(|| differ("setup_logs", &expected.setup_logs, &actual.setup_logs))
        .or_else(|| expected.results.iter().zip(&actual.results).find_map(|(want, got)| step_divergence(want, got)))
        .or_else(|| differ("step count", &expected.results.len(), &actual.results.len()))
        .or_else(|| differ("final_sprites", &expected.final_sprites, &actual.final_sprites))
        .or_else(|| differ("final_player", &expected.final_player, &actual.final_player))
}

fn step_divergence(expected: &StepResult, actual: &StepResult) -> Option<String> {
    let field = |name: &str| format!("step {} {name}", expected.step);
    differ(&field("logs"), &expected.logs, &actual.logs)
        .or_else(|| differ(&field("events"), &expected.events, &actual.events))
        .or_else(|| differ(&field("evals"), &expected.evals, &actual.evals))
        .or_else(|| differ(&field("errors"), &expected.errors, &actual.errors))
        .or_else(|| differ(&field("cached_uids"), &expected.cached_uids, &actual.cached_uids))
}

fn differ<T: PartialEq + fmt::Debug>(what: &str, expected: &T, actual: &T) -> Option<String> {
    (expected != actual).then(|| format!("{what}: expected {expected:?}, got {actual:?}"))
}

pub fn check_golden(path: &Path, actual: &HarnessOutput) -> Result<()> {
    let file = File::open(path).with_context(|| format!("opening golden file '{}'", path.display()))?;
    let expected: HarnessOutput = serde_json::from_reader(file).with_context(|| "parsing golden JSON")?;
    if let Some(divergence) = first_divergence(&expected, actual) {
        bail!("{} diverged at {divergence} (rerun with --bless to accept)", path.display());
    }
    Ok(())
}

pub fn bless_golden(path: &Path, output: &HarnessOutput) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating '{}'", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("writing golden file '{}'", path.display()))?;
    serde_json::to_writer_pretty(file, output).with_context(|| "serializing harness output")
}

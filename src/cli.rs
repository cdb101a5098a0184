use crate::config::AppConfigOverrides;
use crate::input::InputKey;
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "config/app.json";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CliOverrides {
    config: Option<PathBuf>,
    level: Option<PathBuf>,
    script: Option<PathBuf>,
    seed: Option<u64>,
    press: Vec<InputKey>,
}

impl CliOverrides {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = CliOverrides::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            if !flag.starts_with("--") {
                bail!("Unexpected argument '{flag}'. Flags take the form --name <value>.");
            }
            let key = &flag[2..];
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "config" => overrides.config = Some(PathBuf::from(value)),
                "level" => overrides.level = Some(PathBuf::from(value)),
                "script" => overrides.script = Some(PathBuf::from(value)),
                "seed" => {
                    overrides.seed = Some(value.parse::<u64>().with_context(|| format!("Invalid seed '{value}'"))?);
                }
                "press" => {
                    for name in value.split(',').filter(|name| !name.trim().is_empty()) {
                        overrides.press.push(name.parse::<InputKey>()?);
                    }
                }
                _ => bail!("Unknown flag '{flag}'. Supported flags: --config, --level, --script, --seed, --press."),
            }
        }
        Ok(overrides)
    }

    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Keys to press, in order, once the level script has run.
    pub fn presses(&self) -> &[InputKey] {
        &self.press
    }

    pub fn to_config_overrides(&self) -> AppConfigOverrides {
        AppConfigOverrides { level: self.level.clone(), script: self.script.clone(), seed: self.seed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_paths_seed_and_presses() {
        let args = ["app", "--level", "lvl.json", "--seed", "42", "--press", "jump,shoot", "--press", "exit"];
        let overrides = CliOverrides::parse(args).expect("parse overrides");
        let config = overrides.to_config_overrides();
        assert_eq!(config.level, Some(PathBuf::from("lvl.json")));
        assert_eq!(config.seed, Some(42));
        assert_eq!(overrides.presses(), &[InputKey::Jump, InputKey::Shoot, InputKey::Exit]);
        assert_eq!(overrides.config_path(), PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn latest_flag_wins() {
        let args = ["app", "--script", "a.rhai", "--script", "b.rhai", "--config", "alt.json"];
        let overrides = CliOverrides::parse(args).expect("parse overrides");
        assert_eq!(overrides.to_config_overrides().script, Some(PathBuf::from("b.rhai")));
        assert_eq!(overrides.config_path(), PathBuf::from("alt.json"));
    }

    #[test]
    fn missing_value_errors() {
        let err = CliOverrides::parse(["app", "--seed"]).unwrap_err();
        assert!(err.to_string().contains("Expected a value"), "error should mention missing value");
    }

    #[test]
    fn rejects_unknown_flags_and_keys() {
        let err = CliOverrides::parse(["app", "--foo", "bar"]).unwrap_err();
        assert!(err.to_string().contains("Unknown flag"), "unknown flags should error");
        let err = CliOverrides::parse(["app", "--press", "jump,fly"]).unwrap_err();
        assert!(err.to_string().contains("fly"), "unknown keys should be named: {err}");
    }
}

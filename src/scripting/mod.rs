pub mod error;
pub mod handle;
pub mod input;
pub mod player;
pub mod sprites;
pub mod uids;

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use std::time::SystemTime;

use anyhow::{anyhow, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rhai::{Dynamic, Engine, EvalAltResult, Scope, AST, FLOAT};
use tracing::{info, warn};

use crate::config::ScriptConfig;
use crate::events::LevelEvent;
use crate::input::InputKey;
use crate::level::{LevelHandle, WeakLevel};
use crate::sprite::Uid;
use crate::sprite_manager::RemovalListener;

pub use error::BridgeError;
pub use handle::{ObjectHandle, ScriptObject, Wrapper};
pub use input::{EventHandlers, InputObject};
pub use player::PlayerObject;
pub use uids::{IdentityCache, ResolveStats, UidTable, MAX_RANGE_LEN};

/// Script-side state for one loaded level: the `UIDS` table, the `Player`
/// and `Input` singletons and the registered event handlers.
///
/// Created when a level is attached and dropped when it goes away; dropping
/// it discards the identity cache.
pub struct ScriptContext {
    level: WeakLevel,
    uids: UidTable,
    player: PlayerObject,
    input: InputObject,
    handlers: Rc<EventHandlers>,
}

impl ScriptContext {
    pub fn new(level: &LevelHandle) -> Result<Self, BridgeError> {
        let weak = level.downgrade();
        let player = PlayerObject::new(ObjectHandle::new(Uid::PLAYER, weak.clone()));
        let cache = Rc::new(IdentityCache::new(Wrapper::new(player.clone())));
        let weak_cache: Weak<IdentityCache> = Rc::downgrade(&cache);
        let listener: Weak<dyn RemovalListener> = weak_cache;
        level.try_borrow_mut().map_err(|_| BridgeError::LevelBusy)?.sprites.subscribe(listener);

        let handlers = Rc::new(EventHandlers::default());
        let input = InputObject::new(&handlers);
        Ok(Self { uids: UidTable::new(cache, weak.clone()), level: weak, player, input, handlers })
    }

    pub fn uids(&self) -> &UidTable {
        &self.uids
    }

    pub fn player(&self) -> &PlayerObject {
        &self.player
    }

    pub fn handlers(&self) -> &EventHandlers {
        &self.handlers
    }

    pub fn level(&self) -> Option<LevelHandle> {
        self.level.upgrade()
    }

    fn bind(&self, scope: &mut Scope<'static>) {
        scope.push("UIDS", self.uids.clone());
        scope.push("Player", self.player.clone());
        scope.push("Input", self.input.clone());
    }
}

impl Drop for ScriptContext {
    fn drop(&mut self) {
        self.handlers.clear();
        self.uids.cache().clear();
    }
}

pub struct ScriptHost {
    engine: Engine,
    ast: Option<AST>,
    scope: Scope<'static>,
    script_path: PathBuf,
    last_modified: Option<SystemTime>,
    error: Option<String>,
    context: Option<ScriptContext>,
    logs: Rc<RefCell<Vec<String>>>,
}

impl ScriptHost {
    pub fn new(path: impl AsRef<Path>, config: &ScriptConfig) -> Self {
        let logs = Rc::new(RefCell::new(Vec::new()));
        let mut engine = Engine::new();
        engine.set_fast_operators(true);
        engine.set_max_operations(config.max_operations);
        engine.set_max_call_levels(config.max_call_levels);
        register_api(&mut engine, &logs, config.deterministic_seed);
        Self {
            engine,
            ast: None,
            scope: Scope::new(),
            script_path: path.as_ref().to_path_buf(),
            last_modified: None,
            error: None,
            context: None,
            logs,
        }
    }

    pub fn last_error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    pub fn context(&self) -> Option<&ScriptContext> {
        self.context.as_ref()
    }

    pub fn uids(&self) -> Option<&UidTable> {
        self.context.as_ref().map(ScriptContext::uids)
    }

    pub fn take_logs(&mut self) -> Vec<String> {
        std::mem::take(&mut *self.logs.borrow_mut())
    }

    /// Binds a freshly loaded level and runs the level script against it.
    pub fn attach_level(&mut self, level: &LevelHandle) -> Result<()> {
        self.detach_level();
        let context = ScriptContext::new(level)?;
        info!(level = %level.borrow().name(), script = %self.script_path.display(), "script_context_attached");
        self.context = Some(context);
        if self.ast.is_none() {
            self.load_script()?;
        }
        self.run_level_script()
    }

    /// Discards the script context of the current level, if any.
    pub fn detach_level(&mut self) {
        self.scope = Scope::new();
        if let Some(context) = self.context.take() {
            info!(cached = context.uids().cache_size(), "script_context_detached");
        }
    }

    pub fn force_reload(&mut self) -> Result<()> {
        self.load_script()?;
        if self.context.is_some() {
            self.run_level_script()?;
        }
        Ok(())
    }

    /// Recompiles and reruns the level script when the file changed on disk.
    pub fn reload_if_needed(&mut self) -> Result<bool> {
        let metadata = fs::metadata(&self.script_path)
            .map_err(|err| anyhow!("Script file not accessible: {err}"))?;
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        if self.ast.is_some() && self.last_modified.map_or(false, |prev| modified <= prev) {
            return Ok(false);
        }
        self.force_reload()?;
        Ok(true)
    }

    /// Fires `key_down` for every handler registered through `Input.on_key_down`.
    pub fn key_down(&mut self, key: InputKey) -> Result<(), Box<EvalAltResult>> {
        let context = self.context.as_ref().ok_or(BridgeError::LevelUnloaded)?;
        if let Some(level) = context.level() {
            level.try_borrow_mut().map_err(|_| BridgeError::LevelBusy)?.push_event(LevelEvent::KeyDown {
                key: key.name().to_string(),
            });
        }
        let Some(ast) = self.ast.as_ref() else { return Ok(()) };
        for handler in context.handlers().handlers_for(input::KEY_DOWN) {
            if let Err(err) = handler.call::<Dynamic>(&self.engine, ast, (key.name().to_string(),)) {
                warn!(key = key.name(), error = %err, "key_down_handler_failed");
                self.error = Some(err.to_string());
                return Err(err);
            }
        }
        Ok(())
    }

    /// Evaluates a snippet in the level scope, e.g. from a console.
    pub fn eval<T: Clone + 'static>(&mut self, source: &str) -> Result<T, Box<EvalAltResult>> {
        self.engine.eval_with_scope::<T>(&mut self.scope, source)
    }

    /// Like [`ScriptHost::eval`], rendering the result with the script's own `to_string`.
    pub fn eval_to_string(&mut self, source: &str) -> Result<String, Box<EvalAltResult>> {
        let value = self.eval::<Dynamic>(source)?;
        if value.is_unit() {
            return Ok("()".to_string());
        }
        let mut scope = Scope::new();
        scope.push("value", value);
        self.engine.eval_with_scope::<String>(&mut scope, "to_string(value)")
    }

    fn run_level_script(&mut self) -> Result<()> {
        let Some(context) = self.context.as_ref() else { return Ok(()) };
        context.handlers().clear();
        self.scope = Scope::new();
        context.bind(&mut self.scope);
        let Some(ast) = self.ast.as_ref() else { return Ok(()) };
        match self.engine.run_ast_with_scope(&mut self.scope, ast) {
            Ok(()) => {
                self.error = None;
                Ok(())
            }
            Err(err) => {
                warn!(script = %self.script_path.display(), error = %err, "level_script_failed");
                self.error = Some(err.to_string());
                Err(anyhow!("Running {}: {err}", self.script_path.display()))
            }
        }
    }

    fn load_script(&mut self) -> Result<()> {
        let source = fs::read_to_string(&self.script_path)
            .with_context(|| format!("Reading {}", self.script_path.display()))?;
        let ast = self.engine.compile(source).with_context(|| "Compiling Rhai script")?;
        self.last_modified = fs::metadata(&self.script_path).ok().and_then(|meta| meta.modified().ok());
        self.error = None;
        self.ast = Some(ast);
        Ok(())
    }
}

fn register_api(engine: &mut Engine, logs: &Rc<RefCell<Vec<String>>>, seed: Option<u64>) {
    uids::register(engine);
    sprites::register(engine);
    player::register(engine);
    input::register(engine);

    let print_logs = Rc::clone(logs);
    engine.on_print(move |text| {
        info!(target: "script", "{text}");
        print_logs.borrow_mut().push(text.to_string());
    });
    let log_logs = Rc::clone(logs);
    engine.register_fn("log", move |message: &str| {
        info!(target: "script", "{message}");
        log_logs.borrow_mut().push(message.to_string());
    });

    let rng = Rc::new(RefCell::new(match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }));
    engine.register_fn("rand", move |min: FLOAT, max: FLOAT| -> FLOAT {
        if max <= min {
            return min;
        }
        rng.borrow_mut().gen_range(min..max)
    });
}

//! In-process execution backend built on an embedded Lua interpreter.

use crate::config::toml_config::{CallbackConfig, LocalEngineConfig};
use crate::core::outcome::coerce_result;
use crate::core::{CallbackOutcome, ExecutionBackend, Record, Timestamp};
use crate::utils::error::{LabError, Result};
use mlua::{
    DeserializeOptions, Function, HookTriggers, Lua, LuaOptions, LuaSerdeExt, MultiValue, StdLib,
    Value as LuaValue, VmState,
};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const LOCAL_BACKEND: &str = "local";

/// Instructions between two checks of the instruction budget.
const HOOK_INTERVAL: u32 = 1_000;

/// Runs the callback in a fresh Lua state per batch, off the async reactor.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    limits: LocalEngineConfig,
    tag: String,
    entry_point: String,
}

impl LocalBackend {
    pub fn new(callback: &CallbackConfig, limits: &LocalEngineConfig) -> Self {
        Self {
            limits: limits.clone(),
            tag: callback.tag.clone(),
            entry_point: callback.entry_point.clone(),
        }
    }
}

#[async_trait::async_trait]
impl ExecutionBackend for LocalBackend {
    fn name(&self) -> &str {
        LOCAL_BACKEND
    }

    async fn execute(&self, records: &[Record], callback: &str) -> Result<Vec<CallbackOutcome>> {
        let records = records.to_vec();
        let callback = callback.to_string();
        let backend = self.clone();

        tokio::task::spawn_blocking(move || -> Result<Vec<CallbackOutcome>> {
            let sandbox = Sandbox::new(&backend.limits)?;
            let entry = sandbox.load(&callback, &backend.entry_point)?;
            Ok(records
                .iter()
                .map(|record| sandbox.invoke(&entry, &backend.tag, record))
                .collect())
        })
        .await
        .map_err(|e| LabError::backend(LOCAL_BACKEND, format!("interpreter task failed: {}", e)))?
    }
}

/// A Lua state without file or process access, with memory and instruction limits.
struct Sandbox {
    lua: Lua,
    used: Arc<AtomicU64>,
}

impl Sandbox {
    fn new(limits: &LocalEngineConfig) -> Result<Self> {
        let libs =
            StdLib::COROUTINE | StdLib::TABLE | StdLib::STRING | StdLib::UTF8 | StdLib::MATH;
        let lua = Lua::new_with(libs, LuaOptions::default()).map_err(interpreter_error)?;
        lua.set_memory_limit(limits.memory_limit_mb.saturating_mul(1024 * 1024))
            .map_err(interpreter_error)?;
        for name in ["dofile", "loadfile"] {
            lua.globals()
                .set(name, LuaValue::Nil)
                .map_err(interpreter_error)?;
        }

        let used = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&used);
        let max_instructions = limits.max_instructions;
        lua.set_hook(
            HookTriggers::new().every_nth_instruction(HOOK_INTERVAL),
            move |_lua, _debug| {
                let step = u64::from(HOOK_INTERVAL);
                if counter.fetch_add(step, Ordering::Relaxed) + step > max_instructions {
                    return Err(mlua::Error::runtime(format!(
                        "instruction limit of {} exceeded",
                        max_instructions
                    )));
                }
                Ok(VmState::Continue)
            },
        );

        Ok(Self { lua, used })
    }

    /// A script that fails to load, or lacks the entry point, fails the whole batch.
    fn load(&self, callback: &str, entry_point: &str) -> Result<Function> {
        self.used.store(0, Ordering::Relaxed);
        self.lua
            .load(callback)
            .set_name("filter")
            .exec()
            .map_err(|e| {
                LabError::backend(LOCAL_BACKEND, format!("Script compilation failed: {}", e))
            })?;

        match self.lua.globals().get::<LuaValue>(entry_point) {
            Ok(LuaValue::Function(function)) => Ok(function),
            _ => Err(LabError::backend(
                LOCAL_BACKEND,
                format!("function {}(tag, ts, record) is not defined", entry_point),
            )),
        }
    }

    fn invoke(&self, entry: &Function, tag: &str, record: &Record) -> CallbackOutcome {
        self.used.store(0, Ordering::Relaxed);

        let arguments = self.lua.to_value(&record.data).and_then(|record| {
            self.lua
                .to_value(&Timestamp::sentinel())
                .map(|ts| (ts, record))
        });
        let (ts, record) = match arguments {
            Ok(arguments) => arguments,
            Err(e) => return CallbackOutcome::failure(format!("record conversion failed: {}", e)),
        };

        let returned = match entry.call::<MultiValue>((tag, ts, record)) {
            Ok(returned) => returned,
            Err(e) => return CallbackOutcome::failure(e.to_string()),
        };

        // 多個回傳值 (code, ts, record) 轉成 JSON 陣列再統一解析
        let values = returned
            .into_iter()
            .map(|value| {
                self.lua
                    .from_value_with::<Value>(value, DeserializeOptions::new().sort_keys(true))
            })
            .collect::<mlua::Result<Vec<_>>>();

        match values {
            Ok(values) => coerce_result(Value::Array(values)),
            Err(e) => CallbackOutcome::failure(format!("result conversion failed: {}", e)),
        }
    }
}

fn interpreter_error(e: mlua::Error) -> LabError {
    LabError::backend(LOCAL_BACKEND, format!("could not start interpreter: {}", e))
}

//! Process-wide code generation context.
//!
//! Compilation happens under a global lock that also owns the host ISA, so
//! the ISA is configured once and concurrent strategy construction is
//! serialized. Executing already compiled code never takes this lock.

use std::ops::Deref;
use std::sync::OnceLock;

use cranelift_codegen::isa::OwnedTargetIsa;
use cranelift_codegen::settings::{self, Configurable};
use parking_lot::{Mutex, MutexGuard};

use crate::config::JitSettings;
use crate::error::ExecutionError;

pub struct JitContext {
    settings: JitSettings,
    isa: OwnedTargetIsa,
}

impl JitContext {
    pub fn settings(&self) -> &JitSettings {
        &self.settings
    }

    pub fn isa(&self) -> OwnedTargetIsa {
        self.isa.clone()
    }
}

static JIT_CONTEXT: OnceLock<Mutex<Option<JitContext>>> = OnceLock::new();

fn jit_context() -> &'static Mutex<Option<JitContext>> {
    JIT_CONTEXT.get_or_init(|| Mutex::new(None))
}

/// Exclusive access to the JIT context; released when dropped.
pub struct JitContextGuard {
    guard: MutexGuard<'static, Option<JitContext>>,
}

impl Deref for JitContextGuard {
    type Target = JitContext;

    fn deref(&self) -> &JitContext {
        match self.guard.as_ref() {
            Some(context) => context,
            None => unreachable!("jit context is initialized before the guard is handed out"),
        }
    }
}

impl std::fmt::Debug for JitContextGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JitContextGuard")
            .field("settings", &self.settings)
            .field("isa", &self.isa.name())
            .finish()
    }
}

/// Lock the global JIT context, building the host ISA on first use.
pub fn acquire_jit_context() -> Result<JitContextGuard, ExecutionError> {
    let mut guard = jit_context().lock();
    if guard.is_none() {
        let settings = JitSettings::from_env()?;
        let isa = build_host_isa(&settings)?;
        tracing::debug!(
            isa = isa.name(),
            opt_level = settings.opt_level.as_setting(),
            verify = settings.verify,
            "initialized jit context"
        );
        *guard = Some(JitContext { settings, isa });
    }
    Ok(JitContextGuard { guard })
}

fn build_host_isa(jit_settings: &JitSettings) -> Result<OwnedTargetIsa, ExecutionError> {
    let mut flag_builder = settings::builder();
    flag_builder
        .set("use_colocated_libcalls", "false")
        .map_err(|e| ExecutionError::Codegen(format!("set use_colocated_libcalls: {e}")))?;
    flag_builder
        .set("is_pic", "false")
        .map_err(|e| ExecutionError::Codegen(format!("set is_pic: {e}")))?;
    flag_builder
        .set("opt_level", jit_settings.opt_level.as_setting())
        .map_err(|e| ExecutionError::Codegen(format!("set opt_level: {e}")))?;
    flag_builder
        .set("enable_verifier", if jit_settings.verify { "true" } else { "false" })
        .map_err(|e| ExecutionError::Codegen(format!("set enable_verifier: {e}")))?;
    // Bodies may return more outputs than there are return registers.
    if let Err(err) = flag_builder.enable("enable_multi_ret_implicit_sret") {
        tracing::debug!(error = %err, "multi-value returns limited to return registers");
    }

    let isa_builder = cranelift_native::builder()
        .map_err(|msg| ExecutionError::Codegen(format!("host isa: {msg}")))?;
    isa_builder
        .finish(settings::Flags::new(flag_builder))
        .map_err(|e| ExecutionError::Codegen(format!("isa finish: {e}")))
}

//! JIT compilation settings.
//!
//! Defaults favour generated-code speed; the verifier runs in debug builds.
//! Both can be overridden through the environment:
//!
//! - `AIVI_ARRAY_EXEC_OPT_LEVEL`: `none`, `speed` or `speed_and_size`
//! - `AIVI_ARRAY_EXEC_VERIFY`: `0` or `1`

use crate::error::ExecutionError;

pub const OPT_LEVEL_ENV: &str = "AIVI_ARRAY_EXEC_OPT_LEVEL";
pub const VERIFY_ENV: &str = "AIVI_ARRAY_EXEC_VERIFY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptLevel {
    None,
    Speed,
    SpeedAndSize,
}

impl OptLevel {
    /// The value Cranelift's `opt_level` setting expects.
    pub fn as_setting(self) -> &'static str {
        match self {
            OptLevel::None => "none",
            OptLevel::Speed => "speed",
            OptLevel::SpeedAndSize => "speed_and_size",
        }
    }

    pub fn parse(text: &str) -> Result<Self, ExecutionError> {
        match text.trim() {
            "none" => Ok(OptLevel::None),
            "speed" => Ok(OptLevel::Speed),
            "speed_and_size" => Ok(OptLevel::SpeedAndSize),
            other => Err(ExecutionError::Config(format!(
                "{OPT_LEVEL_ENV}: unknown optimisation level `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitSettings {
    pub opt_level: OptLevel,
    pub verify: bool,
}

impl Default for JitSettings {
    fn default() -> Self {
        Self {
            opt_level: OptLevel::Speed,
            verify: cfg!(debug_assertions),
        }
    }
}

impl JitSettings {
    /// Defaults with any environment overrides applied.
    pub fn from_env() -> Result<Self, ExecutionError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ExecutionError> {
        let mut settings = Self::default();
        if let Some(level) = lookup(OPT_LEVEL_ENV) {
            settings.opt_level = OptLevel::parse(&level)?;
        }
        if let Some(verify) = lookup(VERIFY_ENV) {
            settings.verify = match verify.trim() {
                "1" | "true" => true,
                "0" | "false" => false,
                other => {
                    return Err(ExecutionError::Config(format!(
                        "{VERIFY_ENV}: expected 0 or 1, got `{other}`"
                    )))
                }
            };
        }
        Ok(settings)
    }
}

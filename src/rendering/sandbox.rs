//! Isolated script context for preview documents.
//!
//! Every frame load gets a fresh Boa context on its own thread, so nothing a
//! previewed template defines survives into the next render. The context
//! exposes `window` (aliasing the global object), a forgiving `atob`, and
//! Boa's Annex B `escape`, which is enough
//! for the `query` global and the `decodeBase64UrlSafe` helper the preview
//! shell installs.

use crate::{Error, Result};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, PAD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use boa_engine::native_function::{NativeFunction, NativeFunctionPointer};
use boa_engine::{js_string, Context, JsNativeError, JsResult, JsString, JsValue, Source};
use std::sync::mpsc;
use std::time::Duration;

/// Runtime bounds applied to preview scripts
#[derive(Debug, Clone, Copy)]
pub struct ScriptLimits {
    pub timeout_ms: u64,
    /// Maximum loop iterations before Boa throws (0 => disabled)
    pub loop_iteration_limit: u64,
    /// Maximum recursion depth before Boa throws (usize::MAX => disabled)
    pub recursion_limit: usize,
}

/// What the previewed scripts left behind
#[derive(Debug, Clone, Default)]
pub struct ScriptOutcome {
    /// One message per script that threw
    pub errors: Vec<String>,
    /// The `query` global after all scripts ran, if it was JSON-serializable
    pub query: Option<serde_json::Value>,
}

// forgiving-base64: padding is optional and leftover bits are discarded
const FORGIVING: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

const PRELUDE: &str = "var window = this; var self = this;";
const QUERY_PROBE: &str = "typeof query === 'undefined' ? undefined : JSON.stringify(query)";

fn atob_native(_this: &JsValue, args: &[JsValue], ctx: &mut Context) -> JsResult<JsValue> {
    let input = args
        .first()
        .cloned()
        .unwrap_or_else(JsValue::undefined)
        .to_string(ctx)?
        .to_std_string_escaped();
    let compact: String = input.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = FORGIVING.decode(compact).map_err(|e| {
        JsNativeError::error().with_message(format!("atob: invalid base64 ({})", e))
    })?;
    // atob yields a binary string: one UTF-16 unit per decoded byte
    let binary: String = bytes.iter().map(|&b| b as char).collect();
    Ok(JsValue::from(JsString::from(binary.as_str())))
}

fn run_in_context(scripts: &[String], limits: ScriptLimits) -> ScriptOutcome {
    let mut ctx = Context::default();
    if limits.loop_iteration_limit > 0 {
        ctx.runtime_limits_mut()
            .set_loop_iteration_limit(limits.loop_iteration_limit);
    }
    if limits.recursion_limit < usize::MAX {
        ctx.runtime_limits_mut().set_recursion_limit(limits.recursion_limit);
    }

    let atob = NativeFunction::from_fn_ptr(atob_native as NativeFunctionPointer);
    let _ = ctx.register_global_builtin_callable(js_string!("atob"), 1usize, atob);

    let mut outcome = ScriptOutcome::default();
    if let Err(e) = ctx.eval(Source::from_bytes(PRELUDE.as_bytes())) {
        outcome.errors.push(format!("Prelude failed: {}", e));
        return outcome;
    }

    for code in scripts {
        if let Err(e) = ctx.eval(Source::from_bytes(code.as_bytes())) {
            log::debug!("preview script threw: {}", e);
            outcome.errors.push(format!("Script thrown: {}", e));
        }
    }

    if let Ok(value) = ctx.eval(Source::from_bytes(QUERY_PROBE.as_bytes())) {
        if let Some(json) = value.as_string() {
            outcome.query = serde_json::from_str(&json.to_std_string_escaped()).ok();
        }
    }
    outcome
}

/// Run the scripts in order inside a fresh context and wait at most
/// `limits.timeout_ms` for them to finish.
pub fn run_scripts(scripts: Vec<String>, limits: ScriptLimits) -> Result<ScriptOutcome> {
    if scripts.is_empty() {
        return Ok(ScriptOutcome::default());
    }

    let (tx, rx) = mpsc::channel::<ScriptOutcome>();
    std::thread::Builder::new()
        .name("rendrit-sandbox".to_string())
        .spawn(move || {
            let outcome = run_in_context(&scripts, limits);
            let _ = tx.send(outcome);
        })
        .map_err(|e| Error::Script(format!("failed to spawn sandbox thread: {}", e)))?;

    match rx.recv_timeout(Duration::from_millis(limits.timeout_ms)) {
        Ok(outcome) => Ok(outcome),
        Err(mpsc::RecvTimeoutError::Timeout) => Err(Error::Timeout(limits.timeout_ms)),
        Err(e) => Err(Error::Script(format!("sandbox thread vanished: {}", e))),
    }
}

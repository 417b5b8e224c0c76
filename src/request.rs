// ABOUTME: Function registry and JSON request dispatch
// ABOUTME: Validates arity shapes, chunks tuples, and runs builtin get/set/clear/load
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Request Dispatch
//!
//! Controllers drive the engine with JSON requests of the form
//! `{"func_name": [args...]}`. A one-argument function takes an array of
//! strings, each string one call. A multi-argument function takes an array of
//! string arrays; each inner array's length must be a positive multiple of
//! the function's arity and is chunked into per-call tuples. Validation is
//! complete before any handler runs, so a malformed request has no side
//! effects.
//!
//! Four builtins (`get`, `set`, `clear`, `load`) are registered on first
//! dispatch unless the embedding module already claimed one of the names.

use crate::config::Config;
use crate::errors::ConfigError;
use crate::property::PropFlags;
use crate::value::Value;
use serde::Serialize;
use serde_json::{Map, Value as Json};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// One parsed call's arguments, exactly `nargs` strings.
pub type ArgTuple = Vec<String>;

/// A registered custom handler. Receives every tuple parsed for its name in
/// one request plus the shared results object; an `Err` aborts the request
/// with that message.
pub type CustomFn =
    dyn FnMut(&[ArgTuple], &mut Map<String, Json>) -> Result<(), String> + Send;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BuiltinOp {
    Get,
    Set,
    Clear,
    Load,
}

#[derive(Clone)]
pub(crate) enum Handler {
    Builtin(BuiltinOp),
    Custom(Arc<Mutex<CustomFn>>),
}

/// A named, fixed-arity function callable through [`Config::process_request`].
pub struct Function {
    name: String,
    nargs: usize,
    pub(crate) handler: Handler,
}

impl Function {
    /// Register a custom function with the given arity.
    pub fn new<F>(name: impl Into<String>, nargs: usize, handler: F) -> Self
    where
        F: FnMut(&[ArgTuple], &mut Map<String, Json>) -> Result<(), String> + Send + 'static,
    {
        Self {
            name: name.into(),
            nargs,
            handler: Handler::Custom(Arc::new(Mutex::new(handler))),
        }
    }

    pub(crate) fn builtin(name: &str, nargs: usize, op: BuiltinOp) -> Self {
        Self {
            name: name.to_string(),
            nargs,
            handler: Handler::Builtin(op),
        }
    }

    /// Function name, matched case-insensitively at dispatch.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of arguments per call tuple.
    #[must_use]
    pub const fn nargs(&self) -> usize {
        self.nargs
    }
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("nargs", &self.nargs)
            .finish_non_exhaustive()
    }
}

/// Response envelope for a processed request.
#[derive(Debug, Serialize)]
pub struct RequestResponse {
    /// 0 on success, 1 on failure.
    pub status: i32,
    /// "success" or the failure diagnostic.
    pub message: String,
    /// Per-property results accumulated by handlers (e.g. `get`).
    pub results: Map<String, Json>,
}

impl Config {
    /// Functions in registration order.
    #[must_use]
    pub fn functions(&self) -> &[Function] {
        &self.funcs
    }

    /// Register functions, skipping names already claimed.
    pub fn add_funcs(&mut self, funcs: Vec<Function>) {
        for f in funcs {
            if self.function_index(&f.name).is_some() {
                debug!(name = f.name(), "duplicate function, keeping first");
                continue;
            }
            self.funcs.push(f);
        }
    }

    pub(crate) fn function_index(&self, name: &str) -> Option<usize> {
        self.funcs
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Register the builtin `get`/`set`/`clear`/`load` functions for any of
    /// those names not already taken.
    pub(crate) fn ensure_builtins(&mut self) {
        let builtins = [
            ("get", 1, BuiltinOp::Get),
            ("set", 2, BuiltinOp::Set),
            ("clear", 1, BuiltinOp::Clear),
            ("load", 1, BuiltinOp::Load),
        ];
        for (name, nargs, op) in builtins {
            if self.function_index(name).is_none() {
                self.funcs.push(Function::builtin(name, nargs, op));
            }
        }
    }

    /// Parse and execute a JSON request, returning the response envelope.
    ///
    /// This never fails at the call site; protocol and handler errors are
    /// reported through the envelope's `status` and `message`.
    pub fn process_request(&mut self, request: &str) -> RequestResponse {
        let mut results = Map::new();
        match self.dispatch(request, &mut results) {
            Ok(()) => {
                self.errmsg.clear();
                RequestResponse {
                    status: 0,
                    message: "success".to_string(),
                    results,
                }
            }
            Err(message) => {
                debug!(%message, "request failed");
                self.errmsg = message.clone();
                RequestResponse {
                    status: 1,
                    message,
                    results,
                }
            }
        }
    }

    fn dispatch(&mut self, request: &str, results: &mut Map<String, Json>) -> Result<(), String> {
        self.ensure_builtins();

        let root: Json = serde_json::from_str(request)
            .map_err(|_| "error parsing request".to_string())?;
        let Json::Object(calls) = root else {
            return Err("invalid request: top level must be an object".to_string());
        };

        // Validate and collect every call before running anything.
        let mut plan: Vec<(usize, Vec<ArgTuple>)> = Vec::with_capacity(calls.len());
        for (name, args) in &calls {
            let idx = self
                .function_index(name)
                .ok_or_else(|| format!("invalid function: {name}"))?;
            let nargs = self.funcs[idx].nargs;
            let tuples = collect_tuples(name, nargs, args)?;
            plan.push((idx, tuples));
        }

        for (idx, tuples) in plan {
            let handler = self.funcs[idx].handler.clone();
            match handler {
                Handler::Builtin(op) => self.run_builtin(op, &tuples, results)?,
                Handler::Custom(f) => {
                    let mut guard = f.lock().unwrap_or_else(PoisonError::into_inner);
                    (*guard)(&tuples, results)?;
                }
            }
        }
        Ok(())
    }

    fn run_builtin(
        &mut self,
        op: BuiltinOp,
        tuples: &[ArgTuple],
        results: &mut Map<String, Json>,
    ) -> Result<(), String> {
        match op {
            BuiltinOp::Get => {
                for t in tuples {
                    let name = &t[0];
                    let p = self
                        .find_property(name)
                        .ok_or_else(|| format!("property not found: {name}"))?;
                    let value = p.value().map_or(Json::Null, |v| v.to_json());
                    results.insert(p.name().to_string(), value);
                }
            }
            BuiltinOp::Set => {
                let trig = self.triggers_enabled;
                for t in tuples {
                    let (name, raw) = (&t[0], &t[1]);
                    let p = self
                        .find_property_mut(name)
                        .ok_or_else(|| format!("property not found: {name}"))?;
                    if p.flags().contains(PropFlags::READONLY) {
                        return Err(
                            ConfigError::ReadOnly(p.name().to_string()).to_string()
                        );
                    }
                    let text = if raw.eq_ignore_ascii_case("default") {
                        p.default_value()
                            .ok_or_else(|| format!("property has no default: {name}"))?
                            .to_string()
                    } else {
                        raw.clone()
                    };
                    p.set_value(Value::String(text), true, trig)
                        .map_err(|e| e.to_string())?;
                    p.flags_mut().insert(PropFlags::FILE);
                }
                self.write_if_configured()?;
            }
            BuiltinOp::Clear => {
                let trig = self.triggers_enabled;
                for t in tuples {
                    let name = &t[0];
                    let p = self
                        .find_property_mut(name)
                        .ok_or_else(|| format!("property not found: {name}"))?;
                    p.clear_to_default(trig).map_err(|e| e.to_string())?;
                }
                self.write_if_configured()?;
            }
            BuiltinOp::Load => {
                for t in tuples {
                    self.load_json(&t[0]).map_err(|e| e.to_string())?;
                    info!("configuration loaded from request");
                }
                self.write_if_configured()?;
            }
        }
        Ok(())
    }

    fn write_if_configured(&mut self) -> Result<(), String> {
        if self.filename.is_some() {
            self.write().map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

/// Validate one function's argument shape and chunk it into call tuples.
fn collect_tuples(name: &str, nargs: usize, args: &Json) -> Result<Vec<ArgTuple>, String> {
    let Json::Array(items) = args else {
        return Err(format!("arguments for {name} must be an array"));
    };
    if nargs == 0 {
        if items.is_empty() {
            return Ok(vec![Vec::new()]);
        }
        return Err(format!(
            "function {name} takes 0 arguments but {} passed",
            items.len()
        ));
    }
    if items.is_empty() {
        return Err(format!("function {name} requires {nargs} arguments"));
    }

    let mut tuples = Vec::new();
    for item in items {
        if nargs == 1 {
            let s = item
                .as_str()
                .ok_or_else(|| format!("arguments for {name} must be strings"))?;
            tuples.push(vec![s.to_string()]);
            continue;
        }
        let Json::Array(inner) = item else {
            return Err(format!(
                "arguments for {name} must be arrays of {nargs} strings"
            ));
        };
        if inner.is_empty() || inner.len() % nargs != 0 {
            return Err(format!(
                "function {name} takes {nargs} arguments but {} passed",
                inner.len()
            ));
        }
        let mut strings = Vec::with_capacity(inner.len());
        for v in inner {
            let s = v
                .as_str()
                .ok_or_else(|| format!("arguments for {name} must be strings"))?;
            strings.push(s.to_string());
        }
        for chunk in strings.chunks(nargs) {
            tuples.push(chunk.to_vec());
        }
    }
    Ok(tuples)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use serde_json::json;

    #[test]
    fn single_arg_tuples_one_per_string() {
        let t = collect_tuples("get", 1, &json!(["a", "b"])).unwrap();
        assert_eq!(t, vec![vec!["a".to_string()], vec!["b".to_string()]]);
    }

    #[test]
    fn multi_arg_chunks_multiples_of_arity() {
        let t = collect_tuples("set", 2, &json!([["a", "1", "b", "2"]])).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t[0], vec!["a".to_string(), "1".to_string()]);
        assert_eq!(t[1], vec!["b".to_string(), "2".to_string()]);
    }

    #[test]
    fn multi_arg_rejects_bad_lengths() {
        assert!(collect_tuples("set", 2, &json!([["a"]])).is_err());
        assert!(collect_tuples("set", 2, &json!([["a", "1", "b"]])).is_err());
        assert!(collect_tuples("set", 2, &json!([[]])).is_err());
    }

    #[test]
    fn empty_args_rejected_for_positive_arity() {
        assert!(collect_tuples("get", 1, &json!([])).is_err());
    }
}

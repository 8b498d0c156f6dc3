//! Render-time function handlers
//!
//! A function handler produces a value from keyword parameters, with no
//! enclosed body. The canonical handler is [`Counter`], whose state
//! lives on the render context keyed by counter name, so concurrent
//! renders never share a counter.

use crate::context::{Direction, Params, RenderContext, Value};
use miette::Result;

/// A render-time plugin that produces a value from keyword parameters.
pub trait FunctionHandler {
    /// Returning `Ok(None)` emits nothing.
    fn handle(&self, params: &Params, ctx: &mut RenderContext) -> Result<Option<Value>>;
}

/// Named counter. Each invocation may reconfigure `start` (which also
/// resets the count), `skip`, `direction`, and a sticky `assign`
/// target. The returned value reflects the count *before* this call's
/// advance.
pub struct Counter;

impl FunctionHandler for Counter {
    fn handle(&self, params: &Params, ctx: &mut RenderContext) -> Result<Option<Value>> {
        let name = params
            .get("name")
            .map(Value::render_to_string)
            .unwrap_or_else(|| "default".to_string());

        let (assign_target, current, retval) = {
            let state = ctx.counter_mut(&name);

            if let Some(start) = params.get("start") {
                let start = start.as_int();
                state.start = start;
                state.count = start;
            }
            if let Some(assign) = params.get("assign") {
                let target = assign.render_to_string();
                if !target.is_empty() {
                    state.assign = Some(target);
                }
            }

            let print = match params.get("print") {
                Some(p) => p.is_truthy(),
                None => state.assign.is_none(),
            };
            let retval = print.then(|| Value::Int(state.count));

            if let Some(skip) = params.get("skip") {
                state.skip = skip.as_int();
            }
            if let Some(direction) = params.get("direction") {
                state.direction = Direction::parse(&direction.render_to_string());
            }

            let current = state.count;
            match state.direction {
                Direction::Down => state.count -= state.skip,
                Direction::Up => state.count += state.skip,
            }
            (state.assign.clone(), current, retval)
        };

        if let Some(target) = assign_target {
            ctx.assign(target, Value::Int(current));
        }
        Ok(retval)
    }
}

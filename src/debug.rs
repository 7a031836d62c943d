use crate::im::ImContext;
#[cfg(feature = "debug")]
use serde_json::json;

#[cfg(feature = "debug")]
thread_local!(
    static DEBUG_FRAME: std::cell::RefCell<Vec<serde_json::Value>> = Default::default();
);

/// Records the tiles reserved at the current time into the debug frame.
#[allow(unused)]
pub(crate) fn debug_reserved_tiles(ctx: &ImContext) {
    #[cfg(feature = "debug")]
    DEBUG_FRAME.with(|frame| {
        frame.borrow_mut().push(json!({
            "type": "reserved_tiles",
            "im": ctx.id(),
            "time": ctx.time(),
            "tiles": ctx.grid().grid().reserved_tiles_at(ctx.time()),
        }))
    })
}

/// Takes the debugging frames accumulated since the last call, as a
/// JSON array.
#[cfg(feature = "debug")]
pub fn take_debug_frame() -> serde_json::Value {
    json!(DEBUG_FRAME.with(|frame| frame.take()))
}

//! Well-known `WorkContext` keys shared by combinators and agents.

/// The input the current step should work on.
pub const USER_INPUT: &str = "user_input";

/// Conversation history maintained by agent steps.
pub const MESSAGE_HISTORY: &str = "message_history";

/// Textual content of the most recently completed sequential step.
pub const PREVIOUS_OUTPUT: &str = "previous_output";

/// The input a chained sequence started with.
pub const ORIGINAL_INPUT: &str = "original_input";

/// 1-based iteration counter written by `Loop` before each iteration.
pub const LOOP_ITERATION: &str = "loop_iteration";

/// Current element of an iterator loop.
pub const LOOP_ITEM: &str = "loop_item";

/// 0-based position of the current element of a sequence loop.
pub const LOOP_INDEX: &str = "loop_index";

/// Key of the current entry of a keyed-collection loop.
pub const LOOP_KEY: &str = "loop_key";

/// Message of the error a `TryCatch` handler was invoked for.
pub const CAUGHT_ERROR: &str = "caught_error";

//! Record decoders.
//!
//! Binary decoders follow a layered structure:
//! - `layout`: byte offsets and masks (source of truth)
//! - `reader`: bounds-checked byte access
//! - `parser`: domain-level decoding (no direct byte indexing)
//! - `error`: explicit, actionable errors
//!
//! Text decoders are single-line parsers. All decoders are pure: they never
//! touch the run context or perform I/O, so decoding the same entry twice
//! yields the same result. Sequence numbering and baseline filtering happen
//! in the trace reader.

pub mod header;
pub mod payload;
pub mod text;

/*!
 * Context-aware batch translation of text blocks.
 *
 * - `units`: one translation unit per text block, and batch partitioning
 * - `window`: rolling context window of accepted translations
 * - `protocol`: prompt and response format for chat models
 * - `batch`: the concurrent batch translator with retries
 */

pub mod batch;
pub mod protocol;
pub mod units;
pub mod window;

pub use batch::{BatchTranslator, ExhaustedBatch, TranslationOutcome};
pub use units::{partition, units_for_document, TranslationUnit};
pub use window::{ContextPair, ContextWindow};

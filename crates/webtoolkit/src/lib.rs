//! WebToolkit: main-content extraction, quiz form data recovery and answer filling.

pub mod adapter;
pub mod blob;
pub mod container;
pub mod entry;
pub mod evaluate;
pub mod extractor;
pub mod filler;
pub mod locator;
pub mod page;
pub mod resolver;
pub mod sanitize;
pub mod scorer;
pub mod storage;
pub mod types;

pub use adapter::{ControlHandle, FillAction, FormControlAdapter, RecordingAdapter, ScriptAdapter};
pub use blob::{Field, FormBlob};
pub use container::find_question_container;
pub use entry::{merge_entries, Entry, EntryLog, MergeSettings};
pub use extractor::{extract, extract_html};
pub use filler::{FillReport, FillStatus, FormFiller, QuestionOutcome};
pub use evaluate::evaluate_literal;
pub use locator::{locate, BlobSource, GlobalScope, LocatedBlob, BLOB_MARKER};
pub use page::Page;
pub use resolver::resolve_answers;
pub use scorer::score;
pub use storage::{ExportBundle, StateReader, StateWriter, ToolkitState};
pub use types::*;

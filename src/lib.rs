//! Motor de limpieza de metadata.
//!
//! Cada archivo se clasifica por firma y extensión, se limpia con el
//! limpiador de su categoría y produce un [`ProcessResult`] con lo eliminado.
//! Los lotes se procesan en orden y de forma independiente con
//! [`BatchOrchestrator`].

pub mod batch;
pub mod capabilities;
pub mod classify;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod paths;
pub mod sanitizer;

pub use batch::{BatchEvent, BatchOrchestrator, process_batch};
pub use dispatch::Dispatcher;
pub use error::{ErrorKind, Result, SanitizeError};
pub use model::{
    FileCategory, ProcessItem, ProcessOptions, ProcessResult, ProcessStatus, ResolvedPath,
};

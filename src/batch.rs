//! Ejecución secuencial de un lote: resolución de rutas, respaldo, limpieza,
//! conservación de fechas y reemplazo del original.

use filetime::FileTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;
use crate::error::{Result, SanitizeError};
use crate::model::{ProcessItem, ProcessOptions, ProcessResult, ProcessStatus, ResolvedPath};
use crate::paths::{ensure_output_dir, resolve_output_path};

pub const CANCELLED_MESSAGE: &str = "cancelled";

/// Progreso de un lote, en el orden en que ocurre.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum BatchEvent {
    Started {
        total: usize,
    },
    Processing {
        index: usize,
        total: usize,
        path: PathBuf,
    },
    Finished {
        index: usize,
        result: ProcessResult,
    },
    Completed {
        successes: usize,
        failures: usize,
        skipped: usize,
    },
}

#[derive(Default)]
pub struct BatchOrchestrator {
    dispatcher: Dispatcher,
    cancel: Option<Arc<AtomicBool>>,
}

impl BatchOrchestrator {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            cancel: None,
        }
    }

    /// La bandera solo se consulta entre elementos, nunca a mitad de una limpieza.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn run(&self, items: &[ProcessItem], options: &ProcessOptions) -> Vec<ProcessResult> {
        self.execute(items, options, |_| {})
    }

    pub fn run_with_sender(
        &self,
        items: &[ProcessItem],
        options: &ProcessOptions,
        sender: Sender<BatchEvent>,
    ) -> Vec<ProcessResult> {
        self.execute(items, options, |event| {
            let _ = sender.send(event);
        })
    }

    fn execute<F>(
        &self,
        items: &[ProcessItem],
        options: &ProcessOptions,
        mut emit: F,
    ) -> Vec<ProcessResult>
    where
        F: FnMut(BatchEvent),
    {
        let total = items.len();
        emit(BatchEvent::Started { total });

        let mut results = Vec::with_capacity(total);
        for (index, item) in items.iter().enumerate() {
            let result = if self.is_cancelled() {
                ProcessResult::skipped(&item.path, CANCELLED_MESSAGE)
            } else {
                emit(BatchEvent::Processing {
                    index: index + 1,
                    total,
                    path: item.path.clone(),
                });
                self.process_item(&item.path, options)
            };

            emit(BatchEvent::Finished {
                index: index + 1,
                result: result.clone(),
            });
            results.push(result);
        }

        let count = |status: ProcessStatus| results.iter().filter(|r| r.status == status).count();
        let (successes, failures, skipped) = (
            count(ProcessStatus::Success),
            count(ProcessStatus::Error),
            count(ProcessStatus::Skipped),
        );
        info!("Lote completado: {successes} correctos, {failures} con error, {skipped} omitidos");
        emit(BatchEvent::Completed {
            successes,
            failures,
            skipped,
        });

        results
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn process_item(&self, input: &Path, options: &ProcessOptions) -> ProcessResult {
        let resolved = match prepare(input, options) {
            Ok(resolved) => resolved,
            Err(error) => {
                warn!("{} no se pudo preparar: {error}", input.display());
                return ProcessResult::failure(input, None, &error);
            }
        };

        let mut result = self.dispatcher.process(input, &resolved.output_path);
        if result.is_success() {
            match finalize(input, &resolved, options) {
                Ok(final_path) => {
                    result.output_path = Some(final_path);
                    return result;
                }
                Err(error) => {
                    warn!("{} no se pudo finalizar: {error}", input.display());
                    result = ProcessResult::failure(input, Some(&resolved.output_path), &error);
                }
            }
        }

        if options.overwrite_source {
            discard_temp(&resolved.output_path);
            result.output_path = None;
        }
        result
    }
}

/// Limpia un lote con las capacidades por defecto.
pub fn process_batch(items: &[ProcessItem], options: &ProcessOptions) -> Vec<ProcessResult> {
    BatchOrchestrator::default().run(items, options)
}

fn prepare(input: &Path, options: &ProcessOptions) -> Result<ResolvedPath> {
    let resolved = resolve_output_path(input, options)?;
    ensure_output_dir(&resolved)?;

    if let Some(backup) = &resolved.backup_path {
        fs::copy(input, backup)
            .map_err(|e| SanitizeError::io_at("cannot create backup", backup, e))?;
        copy_timestamps(input, backup)?;
        debug!("Respaldo creado: {}", backup.display());
    }

    Ok(resolved)
}

/// Copia fechas al resultado y, al sobrescribir, lo mueve sobre el original.
fn finalize(input: &Path, resolved: &ResolvedPath, options: &ProcessOptions) -> Result<PathBuf> {
    copy_timestamps(input, &resolved.output_path)?;

    if options.overwrite_source {
        fs::rename(&resolved.output_path, input)
            .map_err(|e| SanitizeError::io_at("cannot replace", input, e))?;
        return Ok(input.to_path_buf());
    }
    Ok(resolved.output_path.clone())
}

fn copy_timestamps(source: &Path, target: &Path) -> Result<()> {
    let metadata =
        fs::metadata(source).map_err(|e| SanitizeError::io_at("cannot read", source, e))?;
    let accessed = FileTime::from_last_access_time(&metadata);
    let modified = FileTime::from_last_modification_time(&metadata);
    filetime::set_file_times(target, accessed, modified)
        .map_err(|e| SanitizeError::io_at("cannot set timestamps on", target, e))
}

fn discard_temp(temp: &Path) {
    if !temp.exists() {
        return;
    }
    match fs::remove_file(temp) {
        Ok(()) => debug!("Temporal descartado: {}", temp.display()),
        Err(error) => warn!("No se pudo eliminar {}: {error}", temp.display()),
    }
}

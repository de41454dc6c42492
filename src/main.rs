//! Interfaz de línea de comandos: limpia los archivos indicados e imprime los
//! resultados como JSON en la salida estándar.

use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::process;
use tracing::{Level, error};

use metaclean::{BatchOrchestrator, ProcessItem, ProcessOptions, ProcessResult, Result};

fn main() {
    let matches = build_cli().get_matches();
    init_logging(matches.get_flag("verbose"));

    let options = match options_from_matches(&matches) {
        Ok(options) => options,
        Err(err) => {
            error!("{err}");
            process::exit(2);
        }
    };

    let items: Vec<ProcessItem> = matches
        .get_many::<PathBuf>("paths")
        .into_iter()
        .flatten()
        .map(ProcessItem::new)
        .collect();

    let results = BatchOrchestrator::default().run(&items, &options);
    print_results(&results);

    if results.iter().any(|result| result.error_kind.is_some()) {
        process::exit(1);
    }
}

fn build_cli() -> Command {
    Command::new("metaclean")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Elimina metadata de imágenes, PDF, documentos Office, ZIP y multimedia")
        .arg(
            Arg::new("paths")
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .num_args(1..)
                .required(true)
                .help("Archivos a limpiar, procesados en orden"),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_name("DIR")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Directorio donde escribir las copias limpias"),
        )
        .arg(
            Arg::new("suffix")
                .long("suffix")
                .value_name("SUFFIX")
                .help("Sufijo de las copias limpias (por defecto \"-clean\")"),
        )
        .arg(
            Arg::new("overwrite")
                .long("overwrite")
                .action(ArgAction::SetTrue)
                .help("Reemplaza cada original por su versión limpia"),
        )
        .arg(
            Arg::new("backup")
                .long("backup")
                .action(ArgAction::SetTrue)
                .requires("overwrite")
                .help("Guarda una copia <archivo>.bak antes de sobrescribir"),
        )
        .arg(
            Arg::new("options")
                .long("options")
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Opciones en JSON (outputDir, copySuffix, overwriteSource, keepBackup)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Muestra el detalle de cada elemento eliminado"),
        )
}

/// Las banderas de la línea de comandos tienen prioridad sobre el archivo de opciones.
fn options_from_matches(matches: &ArgMatches) -> Result<ProcessOptions> {
    let mut options = match matches.get_one::<PathBuf>("options") {
        Some(path) => ProcessOptions::from_json_file(path)?,
        None => ProcessOptions::default(),
    };

    if let Some(dir) = matches.get_one::<PathBuf>("output-dir") {
        options.output_dir = Some(dir.clone());
    }
    if let Some(suffix) = matches.get_one::<String>("suffix") {
        options.copy_suffix = Some(suffix.clone());
    }
    if matches.get_flag("overwrite") {
        options.overwrite_source = true;
    }
    if matches.get_flag("backup") {
        options.keep_backup = true;
    }

    Ok(options)
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_results(results: &[ProcessResult]) {
    match serde_json::to_string_pretty(results) {
        Ok(json) => println!("{json}"),
        Err(err) => error!("No se pudieron serializar los resultados: {err}"),
    }
}

#![deny(clippy::all)]
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use easyyolo_domain::{to_yolo, yoloerr, ShapeI, YoloResult};
use std::{io, path::PathBuf, process::ExitCode, time::Duration};
use tracing::{error, info};
use yololib::{
    cfg::{self, get_log_folder},
    file_util::{DEFAULT_HOMEDIR, DEFAULT_STORE_DIR},
    persistence::{self, save_annotations},
    tracing_setup::tracing_setup,
    util::version_label,
    yolo_io, AnnotationEditor, DecodeWorker, EditorCfg, FileStore, ImageDescriptor, ImageSurface,
    NotificationLevel,
};

const DECODE_TIMEOUT: Duration = Duration::from_secs(120);

/// Headless companion of the EasyYOLO annotation editor working on a folder store.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Folder the annotations are persisted in.
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    /// Print debug logs to stdout.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the number of images, annotations and annotations per label.
    Stats,
    /// Write all annotations plus metadata into a json file.
    Export {
        #[arg(long)]
        out: PathBuf,
    },
    /// Replace all annotations by the ones of an exported json file.
    Import { file: PathBuf },
    /// Delete all annotations of all images.
    Clear {
        /// Do not ask for confirmation.
        #[arg(long)]
        yes: bool,
    },
    /// Print the annotations of one image in YOLO format.
    Yolo {
        #[arg(long)]
        image: String,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
        /// Print the class names in index order instead of the boxes.
        #[arg(long)]
        classes: bool,
    },
    /// Paint the stored annotations onto an image and save it as png.
    Render {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// Key the annotations are stored under, defaults to the file name of the image.
        #[arg(long)]
        key: Option<String>,
    },
}

fn confirm(question: &str) -> YoloResult<bool> {
    println!("{question} [y/N]");
    let mut answer = String::new();
    io::stdin().read_line(&mut answer).map_err(to_yolo)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn render(
    cfg: EditorCfg,
    store: FileStore,
    image: PathBuf,
    out: PathBuf,
    key: Option<String>,
) -> YoloResult<()> {
    let surface = ImageSurface::from_cfg(&cfg)?;
    let no_labels = |_: &str| -> Option<String> { None };
    let mut editor = AnnotationEditor::new(cfg, store, no_labels, surface);
    let mut descriptor = ImageDescriptor::from_path(&image);
    if let Some(key) = key {
        descriptor.name = key;
    }
    let mut worker = DecodeWorker::new();
    editor.load_image(&descriptor, 0, &mut worker);
    for (ticket, decoded) in worker.poll_blocking(DECODE_TIMEOUT) {
        editor.on_image_ready(ticket, decoded);
    }
    if !editor.is_ready() {
        return Err(yoloerr!("could not load {:?}", image));
    }
    info!(
        "rendering {} annotations of {}",
        editor.current_annotations().len(),
        descriptor.name
    );
    editor.surface().save_png(&out)
}

fn run(cli: Cli) -> YoloResult<()> {
    let cfg = cfg::read_cfg()?;
    let store_folder = cli.store.unwrap_or_else(|| DEFAULT_STORE_DIR.clone());
    let mut store = FileStore::new(store_folder);
    let key = cfg.storage_key.clone();
    match cli.command {
        Command::Stats => {
            let set = persistence::load_annotations(&store, &key);
            let stats = serde_json::to_string_pretty(&set.statistics()).map_err(to_yolo)?;
            println!("{stats}");
        }
        Command::Export { out } => {
            let set = persistence::load_annotations(&store, &key);
            persistence::export_to_path(&set, &out)?;
            println!("exported {} annotations to {out:?}", set.total_annotations());
        }
        Command::Import { file } => {
            let no_labels = |_: &str| -> Option<String> { None };
            let mut editor = AnnotationEditor::new(cfg, store, no_labels, ImageSurface::default());
            let success = editor.import_from_path(&file);
            for n in editor.take_notifications() {
                match n.level {
                    NotificationLevel::Info => println!("{}", n.message),
                    NotificationLevel::Error => eprintln!("{}", n.message),
                }
            }
            if !success {
                return Err(yoloerr!("import of {:?} failed", file));
            }
        }
        Command::Clear { yes } => {
            let mut set = persistence::load_annotations(&store, &key);
            let n = set.total_annotations();
            if yes || confirm(&format!("delete all {n} annotations? this cannot be undone."))? {
                set.clear();
                save_annotations(&mut store, &key, &set)?;
                println!("deleted {n} annotations");
            }
        }
        Command::Yolo {
            image,
            width,
            height,
            classes,
        } => {
            let set = persistence::load_annotations(&store, &key);
            if classes {
                for name in yolo_io::class_names(&set) {
                    println!("{name}");
                }
            } else {
                for line in yolo_io::yolo_lines(&set, &image, ShapeI::new(width, height))? {
                    println!("{line}");
                }
            }
        }
        Command::Render { image, out, key } => render(cfg, store, image, out, key)?,
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = tracing_setup(&get_log_folder(&DEFAULT_HOMEDIR), cli.verbose);
    info!("{}", version_label());
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

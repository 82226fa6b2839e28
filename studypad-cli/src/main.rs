use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use studypad_core::{
    reconstruct_page_text, DocumentOpener, DocumentRecord, DocumentSession, DocumentStore,
    FileDocumentStore, PageBounds, ReaderConfig, ReaderController, ScrollWindow, ToolSettings,
};
use studypad_render::PdfiumOpener;
use studypad_surface::{encode_png, PageSurface};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(
    name = "studypad",
    version,
    about = "headless harness for the studypad reader pipeline"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print document id, page count, and metadata
    Info { file: PathBuf },
    /// Render one page to a PNG file
    Render {
        file: PathBuf,
        /// Page to render (1-based)
        #[arg(short, long, default_value_t = 1)]
        page: usize,
        /// Render scale factor
        #[arg(short, long)]
        scale: Option<f32>,
        /// Compute the scale from a container width instead
        #[arg(long, conflicts_with = "scale")]
        fit_width: Option<f32>,
        /// Output path
        #[arg(short, long, default_value = "page.png")]
        out: PathBuf,
    },
    /// Print reconstructed text for one page
    Text {
        file: PathBuf,
        /// Page to extract (1-based)
        #[arg(short, long, default_value_t = 1)]
        page: usize,
    },
    /// Store a document in the local library
    Import {
        file: PathBuf,
        #[arg(long)]
        class: String,
        #[arg(long)]
        subject: String,
    },
    /// List stored documents, optionally filtered by class
    List {
        #[arg(long)]
        class: Option<String>,
    },
    /// Remove a stored document by id
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let project_dirs = ProjectDirs::from("net", "studypad", "studypad")
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let _log_guard = init_logging(&project_dirs)?;

    match args.command {
        Command::Info { file } => {
            let session = open_session(&file).await?;
            let info = session.info();
            println!("id:     {}", info.id);
            println!("pages:  {}", info.page_count);
            if let Some(title) = &info.metadata.title {
                println!("title:  {title}");
            }
            if let Some(author) = &info.metadata.author {
                println!("author: {author}");
            }
        }
        Command::Render {
            file,
            page,
            scale,
            fit_width,
            out,
        } => {
            let session = open_session(&file).await?;
            let page_index = page_index_from_arg(page, session.info().page_count)?;
            let scale = resolve_scale(&session, page_index, scale, fit_width)?;

            let mut surface = PageSurface::new(page_index);
            let config = ReaderConfig::load_or_default();
            let bounds = session.viewport(page_index, scale)?;
            surface.observe_visibility(
                PageBounds::new(0.0, bounds.height),
                ScrollWindow::new(0.0, bounds.height),
                &config,
            );

            let (ticket, request) = surface
                .begin_render(scale, 0)
                .ok_or_else(|| anyhow!("surface refused the render"))?;
            let image = session.render_page(request)?;
            surface.commit_render(ticket, image, None, &ToolSettings::pen())?;

            let raster = surface
                .raster()
                .ok_or_else(|| anyhow!("no raster after commit"))?;
            let encoded = encode_png(raster)?;
            fs::write(&out, &encoded)
                .with_context(|| format!("failed to write {:?}", out))?;
            println!(
                "wrote {:?} ({}x{} at scale {scale:.2})",
                out, raster.width, raster.height
            );
        }
        Command::Text { file, page } => {
            let session = open_session(&file).await?;
            let page_index = page_index_from_arg(page, session.info().page_count)?;
            let items = session.text_items(page_index)?;
            println!("{}", reconstruct_page_text(&items));
        }
        Command::Import {
            file,
            class,
            subject,
        } => {
            let store = open_store(&project_dirs)?;
            let data =
                fs::read(&file).with_context(|| format!("failed to read {:?}", file))?;
            let file_name = file
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("document.pdf")
                .to_string();
            let id = store.add(DocumentRecord::new(&class, &subject, &file_name, data))?;
            println!("stored {file_name} as {id}");
        }
        Command::List { class } => {
            let store = open_store(&project_dirs)?;
            let records = match class {
                Some(class) => store.get_by_class(&class)?,
                None => store.get_all()?,
            };
            for record in records {
                println!(
                    "{}  {}  {} / {}",
                    record.id, record.file_name, record.class_name, record.subject
                );
            }
        }
        Command::Delete { id } => {
            let store = open_store(&project_dirs)?;
            let id = Uuid::parse_str(&id).context("invalid document id")?;
            store.delete(id)?;
            println!("deleted {id}");
        }
    }

    Ok(())
}

async fn open_session(file: &PathBuf) -> Result<Arc<dyn DocumentSession>> {
    let opener = PdfiumOpener::new()?;
    let bytes = fs::read(file).with_context(|| format!("failed to read {:?}", file))?;
    let session = opener
        .open_bytes(bytes)
        .await
        .with_context(|| format!("failed to open {:?}", file))?;
    Ok(session)
}

fn page_index_from_arg(page: usize, page_count: usize) -> Result<usize> {
    if page == 0 || page > page_count {
        return Err(anyhow!(
            "page {page} out of range (document has {page_count} pages)"
        ));
    }
    Ok(page - 1)
}

fn resolve_scale(
    session: &Arc<dyn DocumentSession>,
    page_index: usize,
    scale: Option<f32>,
    fit_width: Option<f32>,
) -> Result<f32> {
    if let Some(scale) = scale {
        return Ok(scale);
    }
    match fit_width {
        Some(container_width) => {
            let mut controller = ReaderController::new(ReaderConfig::load_or_default(), 0);
            controller.open_document(Arc::clone(session), 0);
            controller.page_activated(page_index, 0);
            controller
                .fit_to_width(container_width)
                .ok_or_else(|| anyhow!("unable to compute fit scale"))
        }
        None => Ok(1.0),
    }
}

fn open_store(project_dirs: &ProjectDirs) -> Result<FileDocumentStore> {
    let dir = project_dirs.data_local_dir().join("documents");
    Ok(FileDocumentStore::new(dir)?)
}

fn init_logging(project_dirs: &ProjectDirs) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "studypad.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);
    let console_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}

//
// cli.rs
// Dicom-Albums-rs
//
// Defines the CLI surface with Clap and dispatches each command as one load → operate → save cycle.
//
// Thales Matheus Mendonça Santos - October 2026

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::album::AlbumManager;
use crate::error::{EntityKind, Error};
use crate::hierarchy::{HierarchyStore, ScanReport};
use crate::metadata;
use crate::models::{Album, DEFAULT_CREATOR};
use crate::query::{PatientFilter, Query, SeriesFilter, StudyFilter};
use crate::storage::DataDir;

/// Command-line interface glue code: defines the available verbs and dispatches to modules.
#[derive(Parser)]
#[command(name = "dicom-albums")]
#[command(about = "Organize DICOM files by patient, study and series, and group them into albums", long_about = None)]
pub struct Cli {
    /// Directory holding hierarchy.json and albums.json
    #[arg(long, global = true, env = "DICOM_ALBUMS_DIR", default_value = ".dicom-albums")]
    pub data_dir: PathBuf,

    /// Log debug details (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a directory tree and merge its DICOM files into the hierarchy
    Scan {
        path: PathBuf,
        /// Forget everything scanned before
        #[arg(long)]
        reset: bool,
    },
    /// Show the metadata extracted from one DICOM file
    Info { file: PathBuf },
    /// Count scanned records and albums
    Status,
    /// Create an empty album
    CreateAlbum {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = DEFAULT_CREATOR)]
        creator: String,
    },
    /// Add image files to an album
    AddImages {
        album_id: String,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Remove image files from an album
    RemoveImages {
        album_id: String,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Give an album a new name
    RenameAlbum {
        album_id: String,
        #[arg(long)]
        name: String,
    },
    /// Attach a free-form metadata entry to an album
    AnnotateAlbum {
        album_id: String,
        #[arg(long)]
        key: String,
        /// JSON value; anything that does not parse is stored as a string
        #[arg(long)]
        value: String,
    },
    /// Delete an album (image files are left alone)
    DeleteAlbum { album_id: String },
    /// List all albums
    ListAlbums,
    /// Show one album and its images
    ShowAlbum { album_id: String },
    /// Query the scanned hierarchy
    Query {
        #[command(subcommand)]
        by: QueryCommand,
    },
    /// Create an album from every image a query matches
    CreateFromQuery {
        #[arg(long)]
        album_name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, value_enum)]
        query_type: QueryLevel,
        #[command(flatten)]
        patient: PatientArgs,
        #[command(flatten)]
        study: StudyArgs,
        #[command(flatten)]
        series: SeriesArgs,
    },
}

#[derive(Subcommand)]
pub enum QueryCommand {
    /// Match patients by id or name
    ByPatient {
        #[command(flatten)]
        patient: PatientArgs,
    },
    /// Match studies by date range or description
    ByStudy {
        #[command(flatten)]
        patient: PatientArgs,
        #[command(flatten)]
        study: StudyArgs,
    },
    /// Match series by modality, number or description
    BySeries {
        #[command(flatten)]
        patient: PatientArgs,
        #[command(flatten)]
        study: StudyArgs,
        #[command(flatten)]
        series: SeriesArgs,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum QueryLevel {
    Patient,
    Study,
    Series,
}

#[derive(Args, Clone, Debug, Default)]
pub struct PatientArgs {
    #[arg(long)]
    pub patient_id: Option<String>,
    #[arg(long)]
    pub patient_name: Option<String>,
}

#[derive(Args, Clone, Debug, Default)]
pub struct StudyArgs {
    /// First study date, inclusive (YYYY-MM-DD or YYYYMMDD)
    #[arg(long, value_parser = parse_date)]
    pub date_from: Option<NaiveDate>,
    /// Last study date, inclusive (YYYY-MM-DD or YYYYMMDD)
    #[arg(long, value_parser = parse_date)]
    pub date_to: Option<NaiveDate>,
    /// Case-insensitive substring of the study description
    #[arg(long)]
    pub study_description: Option<String>,
}

#[derive(Args, Clone, Debug, Default)]
pub struct SeriesArgs {
    /// Exact, case-sensitive modality code (CT, MR, ...)
    #[arg(long)]
    pub modality: Option<String>,
    #[arg(long)]
    pub series_number: Option<i32>,
    /// Case-insensitive substring of the series description
    #[arg(long)]
    pub series_description: Option<String>,
}

impl From<PatientArgs> for PatientFilter {
    fn from(value: PatientArgs) -> Self {
        PatientFilter {
            patient_id: value.patient_id,
            patient_name: value.patient_name,
        }
    }
}

impl From<StudyArgs> for StudyFilter {
    fn from(value: StudyArgs) -> Self {
        StudyFilter {
            date_from: value.date_from,
            date_to: value.date_to,
            description: value.study_description,
        }
    }
}

impl From<SeriesArgs> for SeriesFilter {
    fn from(value: SeriesArgs) -> Self {
        SeriesFilter {
            modality: value.modality,
            series_number: value.series_number,
            description: value.series_description,
        }
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y%m%d"))
        .map_err(|_| format!("invalid date {:?}, expected YYYY-MM-DD", raw))
}

/// Builds the query for `create-from-query`; filters below `level` are rejected.
pub fn build_query(
    level: QueryLevel,
    patient: PatientArgs,
    study: StudyArgs,
    series: SeriesArgs,
) -> anyhow::Result<Query> {
    let query = Query {
        patient: patient.into(),
        study: study.into(),
        series: series.into(),
    };
    match level {
        QueryLevel::Patient if !query.study.is_empty() || !query.series.is_empty() => {
            bail!("Study and series filters require --query-type study or series")
        }
        QueryLevel::Study if !query.series.is_empty() => {
            bail!("Series filters require --query-type series")
        }
        _ => Ok(query),
    }
}

fn init_tracing(verbose: bool) {
    // Logs go to stderr so command output on stdout stays scriptable.
    let fallback = if verbose {
        "dicom_albums=debug"
    } else {
        "dicom_albums=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn run() -> anyhow::Result<()> {
    // Parse the raw CLI arguments once and dispatch to a subcommand handler.
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    execute(cli)
}

pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        data_dir, command, ..
    } = cli;
    let open_data = || DataDir::new(&data_dir).context("Failed to prepare the data directory");

    match command {
        Commands::Scan { path, reset } => {
            let data = open_data()?;
            let repo = data.hierarchy_repository();
            let mut store = HierarchyStore::load(&repo).context("Failed to load the hierarchy")?;
            if reset {
                store.reset();
            }
            let report = store.scan(&path)?;
            store.save(&repo).context("Failed to save the hierarchy")?;
            print_scan_report(&report, &store);
        }
        Commands::Info { file } => metadata::print_info(&file)?,
        Commands::Status => {
            let data = open_data()?;
            let store = HierarchyStore::load(&data.hierarchy_repository())?;
            let albums = AlbumManager::open(data.album_repository())?;
            let summary = store.summary();
            println!("Data directory: {}", data.root().display());
            println!("  Patients: {}", summary.patients);
            println!("  Studies:  {}", summary.studies);
            println!("  Series:   {}", summary.series);
            println!("  Images:   {}", summary.images);
            println!("  Albums:   {}", albums.albums().len());
        }
        Commands::CreateAlbum {
            name,
            description,
            creator,
        } => {
            let data = open_data()?;
            let mut albums = AlbumManager::open(data.album_repository())?;
            let album = albums.create_album_by(&name, &description, &creator)?;
            println!("Created album '{}' with ID: {}", album.name, album.album_id);
        }
        Commands::AddImages { album_id, paths } => {
            let data = open_data()?;
            let store = HierarchyStore::load(&data.hierarchy_repository())?;
            let paths: Vec<PathBuf> = paths.iter().map(|p| resolve_image_path(p)).collect();
            for path in &paths {
                if let Some(problem) = unindexed_reason(&store, path) {
                    warn!(path = %path.display(), "{}", problem);
                }
            }
            let mut albums = AlbumManager::open(data.album_repository())?;
            let added = albums.add_images(&album_id, &paths)?;
            println!("Added {} of {} images to album {}", added, paths.len(), album_id);
        }
        Commands::RemoveImages { album_id, paths } => {
            let data = open_data()?;
            let paths: Vec<PathBuf> = paths.iter().map(|p| resolve_image_path(p)).collect();
            let mut albums = AlbumManager::open(data.album_repository())?;
            let removed = albums.remove_images(&album_id, &paths)?;
            println!("Removed {} images from album {}", removed, album_id);
        }
        Commands::RenameAlbum { album_id, name } => {
            let data = open_data()?;
            let mut albums = AlbumManager::open(data.album_repository())?;
            albums.rename_album(&album_id, &name)?;
            println!("Renamed album {} to '{}'", album_id, name);
        }
        Commands::AnnotateAlbum {
            album_id,
            key,
            value,
        } => {
            let data = open_data()?;
            let mut albums = AlbumManager::open(data.album_repository())?;
            let value = serde_json::from_str(&value).unwrap_or(serde_json::Value::String(value));
            albums.annotate(&album_id, &key, value)?;
            println!("Set '{}' on album {}", key, album_id);
        }
        Commands::DeleteAlbum { album_id } => {
            let data = open_data()?;
            let mut albums = AlbumManager::open(data.album_repository())?;
            let album = albums.delete_album(&album_id)?;
            println!("Deleted album '{}' ({})", album.name, album.album_id);
        }
        Commands::ListAlbums => {
            let data = open_data()?;
            let albums = AlbumManager::open(data.album_repository())?;
            let listed = albums.albums();
            if listed.is_empty() {
                println!("No albums.");
            }
            for album in listed {
                print_album_header(album);
            }
        }
        Commands::ShowAlbum { album_id } => {
            let data = open_data()?;
            let albums = AlbumManager::open(data.album_repository())?;
            let album = albums
                .album(&album_id)
                .ok_or_else(|| Error::NotFound {
                    kind: EntityKind::Album,
                    id: album_id.clone(),
                })?;
            print_album_header(album);
            for (idx, image) in album.images.iter().enumerate() {
                println!("  {:>4}. {}", idx + 1, image.display());
            }
        }
        Commands::Query { by } => {
            let data = open_data()?;
            let store = HierarchyStore::load(&data.hierarchy_repository())?;
            run_query(by, &store);
        }
        Commands::CreateFromQuery {
            album_name,
            description,
            query_type,
            patient,
            study,
            series,
        } => {
            let query = build_query(query_type, patient, study, series)?;
            let data = open_data()?;
            let store = HierarchyStore::load(&data.hierarchy_repository())?;
            let mut albums = AlbumManager::open(data.album_repository())?;
            let album = albums.create_from_query(&album_name, &description, &query, &store)?;
            println!(
                "Created album '{}' with ID: {} ({} images)",
                album.name,
                album.album_id,
                album.images.len()
            );
        }
    }

    Ok(())
}

/// Scanned paths are canonical, so album references are canonicalized to match when possible.
fn resolve_image_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        debug!(path = %path.display(), "cannot canonicalize, keeping path as given");
        path.to_path_buf()
    })
}

/// Why an album reference has no scanned image behind it, if it has none.
fn unindexed_reason(store: &HierarchyStore, path: &Path) -> Option<&'static str> {
    if store.contains_image(path) {
        None
    } else if !path.exists() {
        Some("image file does not exist")
    } else {
        Some("image is not in the scanned hierarchy")
    }
}

fn run_query(by: QueryCommand, store: &HierarchyStore) {
    let mut matched = 0;
    match by {
        QueryCommand::ByPatient { patient } => {
            let query = Query {
                patient: patient.into(),
                ..Query::default()
            };
            for patient in query.patients(store) {
                matched += 1;
                println!("\nPatient ID: {}", patient.patient_id);
                println!("Patient Name: {}", patient.patient_name.as_deref().unwrap_or("N/A"));
                println!("Studies: {}", patient.studies.len());
            }
        }
        QueryCommand::ByStudy { patient, study } => {
            let query = Query {
                patient: patient.into(),
                study: study.into(),
                ..Query::default()
            };
            for found in query.studies(store) {
                matched += 1;
                println!("\nStudy UID: {}", found.study.study_instance_uid);
                println!("Patient ID: {}", found.patient.patient_id);
                println!(
                    "Description: {}",
                    found.study.study_description.as_deref().unwrap_or("N/A")
                );
                println!(
                    "Date: {}",
                    found
                        .study
                        .study_date
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "N/A".to_string())
                );
                println!("Series: {}", found.study.series.len());
            }
        }
        QueryCommand::BySeries {
            patient,
            study,
            series,
        } => {
            let query = Query {
                patient: patient.into(),
                study: study.into(),
                series: series.into(),
            };
            for found in query.series(store) {
                matched += 1;
                println!("\nSeries UID: {}", found.series.series_instance_uid);
                println!("Study UID: {}", found.study.study_instance_uid);
                println!("Modality: {}", found.series.modality.as_deref().unwrap_or("N/A"));
                println!(
                    "Number: {}",
                    found
                        .series
                        .series_number
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "N/A".to_string())
                );
                println!(
                    "Description: {}",
                    found.series.series_description.as_deref().unwrap_or("N/A")
                );
                println!("Images: {}", found.series.images.len());
            }
        }
    }
    if matched == 0 {
        println!("No matches.");
    }
}

fn print_scan_report(report: &ScanReport, store: &HierarchyStore) {
    println!("Scanned {} files under {:?}", report.scanned, report.root);
    println!("  Added:     {}", report.added);
    println!("  Refreshed: {}", report.refreshed);
    println!("  Removed:   {}", report.removed);
    println!("  Failed:    {}", report.failures.len());
    for failure in report.failures.iter().take(16) {
        println!("    {:?}: {}", failure.path, failure.reason);
    }
    if report.failures.len() > 16 {
        println!("    ... {} more failures omitted", report.failures.len() - 16);
    }
    let summary = store.summary();
    println!(
        "Hierarchy: {} patients, {} studies, {} series, {} images",
        summary.patients, summary.studies, summary.series, summary.images
    );
}

fn print_album_header(album: &Album) {
    println!("\nAlbum: {} ({})", album.name, album.album_id);
    println!("Description: {}", album.description);
    println!("Creator: {}", album.creator);
    println!("Images: {}", album.images.len());
    println!("Created: {}", album.created_at.to_rfc3339());
    for (key, value) in &album.metadata {
        println!("  {}: {}", key, value);
    }
}

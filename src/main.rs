//! quire - pack prepared content into an EPUB 3 publication

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use quire::{ContentType, Writer, WriterConfig};

#[derive(Parser)]
#[command(name = "quire")]
#[command(version, about = "Pack XHTML content and media into an EPUB 3 file", long_about = None)]
#[command(after_help = "EXAMPLES:
    quire book.epub ch1.xhtml ch2.xhtml --title \"My Book\" --author Me
    quire book.epub ch1.xhtml --cover images/cover.png --media style.css
    quire book.epub nav.xhtml ch1.xhtml --nav nav.xhtml --json")]
struct Cli {
    /// Output EPUB file
    #[arg(value_name = "OUTPUT")]
    output: String,

    /// Content documents in reading order
    #[arg(value_name = "CONTENT")]
    content: Vec<String>,

    /// Auxiliary (non-linear) content documents
    #[arg(long, value_name = "FILE")]
    aux: Vec<String>,

    /// Media resources (images, styles, fonts)
    #[arg(long, value_name = "FILE")]
    media: Vec<String>,

    /// Cover image, added as a media resource with the cover-image property
    #[arg(long, value_name = "FILE")]
    cover: Option<String>,

    /// Content document that gets the nav property
    #[arg(long, value_name = "FILE")]
    nav: Option<String>,

    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    subtitle: Option<String>,

    #[arg(long)]
    author: Vec<String>,

    /// Language tag (defaults to en)
    #[arg(long)]
    lang: Option<String>,

    /// Unique identifier value (defaults to a random urn:uuid)
    #[arg(long)]
    identifier: Option<String>,

    #[arg(long)]
    publisher: Option<String>,

    /// Publication date: YYYY, YYYY-MM, YYYY-MM-DD or RFC 3339
    #[arg(long)]
    date: Option<String>,

    #[arg(long)]
    description: Option<String>,

    /// Folder inside the archive for content and the package document
    #[arg(long, default_value = "OEBPS")]
    root: String,

    /// Deflate level (0-9)
    #[arg(long)]
    compression: Option<i64>,

    /// Print the resulting manifest and spine as JSON
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Suppress output messages
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Serialize)]
struct Summary<'a> {
    output: &'a str,
    manifest: Vec<ItemSummary<'a>>,
    spine: Vec<SpineSummary<'a>>,
}

#[derive(Serialize)]
struct ItemSummary<'a> {
    id: &'a str,
    href: &'a str,
    media_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    properties: Option<&'a str>,
}

#[derive(Serialize)]
struct SpineSummary<'a> {
    idref: &'a str,
    linear: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match pack(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    let default = if cli.quiet {
        "error"
    } else if cli.verbose {
        "quire=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Name of a resource inside the publication: relative paths are kept,
/// absolute ones are reduced to their file name.
fn resource_name(path: &str) -> String {
    let p = Path::new(path);
    if p.is_absolute() {
        p.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string())
    } else {
        path.to_string()
    }
}

fn pack(cli: &Cli) -> Result<(), quire::Error> {
    let mut config = WriterConfig::default().with_content_root(cli.root.as_str());
    if let Some(level) = cli.compression {
        config = config.with_compression_level(level);
    }
    let mut writer = Writer::create_with_config(&cli.output, config)?;

    let meta = writer.metadata_mut();
    if let Some(title) = &cli.title {
        meta.add_title(title.as_str());
    }
    if let Some(subtitle) = &cli.subtitle {
        meta.add_subtitle(subtitle.as_str());
    }
    for author in &cli.author {
        meta.add_author(author.as_str());
    }
    if let Some(lang) = &cli.lang {
        meta.add_language(lang.as_str());
    }
    if let Some(identifier) = &cli.identifier {
        meta.add_identifier("pub-id", identifier.as_str());
    }
    if let Some(publisher) = &cli.publisher {
        meta.add_publisher(publisher.as_str());
    }
    if let Some(description) = &cli.description {
        meta.add_description(description.as_str());
    }
    if let Some(date) = &cli.date {
        meta.set_date(date)?;
    }

    for path in &cli.content {
        let props: &[&str] = if cli.nav.as_deref() == Some(path.as_str()) {
            &["nav"]
        } else {
            &[]
        };
        writer.add_file(path, &resource_name(path), ContentType::Primary, props)?;
    }
    for path in &cli.aux {
        let props: &[&str] = if cli.nav.as_deref() == Some(path.as_str()) {
            &["nav"]
        } else {
            &[]
        };
        writer.add_file(path, &resource_name(path), ContentType::Auxiliary, props)?;
    }
    if let Some(nav) = &cli.nav
        && !cli.content.contains(nav)
        && !cli.aux.contains(nav)
    {
        writer.add_file(nav, &resource_name(nav), ContentType::Auxiliary, &["nav"])?;
    }
    if let Some(cover) = &cli.cover {
        writer.add_file(cover, &resource_name(cover), ContentType::Media, &["cover-image"])?;
    }
    for path in &cli.media {
        writer.add_file(path, &resource_name(path), ContentType::Media, &[])?;
    }

    writer.close()?;

    if cli.json {
        let summary = Summary {
            output: &cli.output,
            manifest: writer
                .manifest()
                .iter()
                .map(|item| ItemSummary {
                    id: &item.id,
                    href: &item.href,
                    media_type: &item.media_type,
                    properties: item.properties.as_deref(),
                })
                .collect(),
            spine: writer
                .spine()
                .iter()
                .map(|entry| SpineSummary {
                    idref: &entry.idref,
                    linear: entry.linear,
                })
                .collect(),
        };
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("error: {e}"),
        }
    } else if !cli.quiet {
        println!(
            "Wrote {} ({} resources, {} in spine)",
            cli.output,
            writer.manifest().len(),
            writer.spine().len()
        );
    }

    Ok(())
}

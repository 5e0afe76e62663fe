//! CLI entry point for `mailrender`.

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use humansize::{format_size, BINARY};

use mailrender::config::{self, Config, ConfiguredTemplates};
use mailrender::model::attachment::AttachmentMeta;
use mailrender::model::message::Message;
use mailrender::model::part::{Content, Part};
use mailrender::parser::eml;
use mailrender::render::Renderer;

#[derive(Parser)]
#[command(
    name = "mailrender",
    version,
    about = "Render email messages to text and list the attachments they carry"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a message to text
    Render {
        path: PathBuf,
        /// Treat part bodies as living in a remote FOLDER and fetch them on demand
        #[arg(long, value_name = "FOLDER")]
        remote: Option<String>,
        /// Flatten text/html parts to text instead of skipping them
        #[arg(long)]
        html_to_text: bool,
    },
    /// List the attachments a render reaches
    Attachments {
        path: PathBuf,
        /// List resources of multipart/related parts instead
        #[arg(long)]
        inline: bool,
    },
    /// List the remote parts a render has to fetch
    RequiredParts {
        path: PathBuf,
        /// Folder the message is assumed to live in
        #[arg(long, default_value = "INBOX")]
        folder: String,
    },
    /// Show the MIME part tree
    Tree { path: PathBuf },
    /// Write attachments to a directory
    Extract {
        path: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Extract resources of multipart/related parts instead
        #[arg(long)]
        inline: bool,
    },
    /// Show the effective configuration and where it is read from
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    setup_logging(&log_level, &config);

    let json = cli.json;

    match cli.command {
        Commands::Render {
            path,
            remote,
            html_to_text,
        } => {
            config.render.html_to_text |= html_to_text;
            cmd_render(&path, remote.as_deref(), &config)
        }
        Commands::Attachments { path, inline } => cmd_attachments(&path, inline, json, &config),
        Commands::RequiredParts { path, folder } => {
            cmd_required_parts(&path, &folder, json, &config)
        }
        Commands::Tree { path } => cmd_tree(&path, json),
        Commands::Extract {
            path,
            output,
            inline,
        } => cmd_extract(&path, &output, inline, &config),
        Commands::Config { save } => cmd_config(&config, save),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_path = config::log_file_path(config);
    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_name = log_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "mailrender.log".into());
        let file_appender = tracing_appender::rolling::never(&log_dir, file_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Print the effective configuration, optionally saving it.
fn cmd_config(config: &Config, save: bool) -> anyhow::Result<()> {
    if save {
        config::save_config(config)?;
    }
    match config::config_file_path() {
        Some(path) => println!("# {}", path.display()),
        None => println!("# no config directory available"),
    }
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailrender", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Render a message and print the text.
fn cmd_render(path: &Path, remote: Option<&str>, config: &Config) -> anyhow::Result<()> {
    let renderer = Renderer::new(config.render.clone());
    let mut templates = ConfiguredTemplates::new(config.templates.clone());

    let text = match remote {
        Some(folder) => {
            let (message, mut store) = eml::parse_eml_remote(path, folder)?;
            let required = renderer.required_parts_for_rendering(&message)?;
            tracing::info!(parts = required.len(), folder, "Prefetch list computed");
            let text = renderer.render(&message, &mut store, &mut templates)?;
            tracing::info!(fetches = store.fetches(), "Remote render finished");
            text
        }
        None => {
            let message = eml::parse_eml(path)?;
            renderer.render_local(&message, &mut templates)?
        }
    };

    println!("{text}");
    Ok(())
}

/// List attachments (or related resources) of a message.
fn cmd_attachments(path: &Path, inline: bool, json: bool, config: &Config) -> anyhow::Result<()> {
    let message = eml::parse_eml(path)?;
    let renderer = Renderer::new(config.render.clone());
    let parts = if inline {
        renderer.inline_attachments_for(&message)?
    } else {
        renderer.attachments_for(&message)?
    };
    let metas = AttachmentMeta::from_parts(&parts);

    if json {
        println!("{}", serde_json::to_string_pretty(&metas)?);
    } else {
        print_attachments_table(&metas);
    }
    Ok(())
}

/// List the parts a render of the remote message would fetch.
fn cmd_required_parts(
    path: &Path,
    folder: &str,
    json: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let (message, _store) = eml::parse_eml_remote(path, folder)?;
    let parts = Renderer::new(config.render.clone()).required_parts_for_rendering(&message)?;
    let metas = AttachmentMeta::from_parts(&parts);

    if json {
        println!("{}", serde_json::to_string_pretty(&metas)?);
    } else {
        print_attachments_table(&metas);
    }
    Ok(())
}

/// Print the part tree.
fn cmd_tree(path: &Path, json: bool) -> anyhow::Result<()> {
    let message = eml::parse_eml(path)?;

    if json {
        let tree = serde_json::json!({
            "header": message.header(),
            "main_part": part_json(message.main_part()),
        });
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else {
        print_tree(&message);
    }
    Ok(())
}

/// Write attachments (or related resources) to `output`.
fn cmd_extract(path: &Path, output: &Path, inline: bool, config: &Config) -> anyhow::Result<()> {
    let message = eml::parse_eml(path)?;
    let renderer = Renderer::new(config.render.clone());
    let parts = if inline {
        renderer.inline_attachments_for(&message)?
    } else {
        renderer.attachments_for(&message)?
    };

    if parts.is_empty() {
        println!("  No attachments found.");
        return Ok(());
    }

    let paths = mailrender::export::attachment::export_parts(&parts, None, output)?;
    println!(
        "  Extracted {} attachment(s) to {}",
        paths.len(),
        output.display()
    );
    Ok(())
}

fn print_attachments_table(metas: &[AttachmentMeta]) {
    println!();
    println!("  {} part(s)", metas.len());
    println!();

    if metas.is_empty() {
        return;
    }

    println!(
        "  {:<8} {:<32} {:<28} {:>10}",
        "Part", "Filename", "Type", "Size"
    );
    println!("  {}", "-".repeat(81));

    for meta in metas {
        let name: String = meta.filename.chars().take(31).collect();
        let content_type: String = meta.content_type.chars().take(27).collect();
        println!(
            "  {:<8} {:<32} {:<28} {:>10}",
            meta.part_id,
            name,
            content_type,
            format_size(meta.size, BINARY)
        );
    }
    println!();
}

fn print_tree(message: &Message) {
    let header = message.header();
    println!();
    if let Some(subject) = &header.subject {
        println!("  {:<10} {}", "Subject", subject);
    }
    if let Some(from) = &header.from {
        println!("  {:<10} {}", "From", from);
    }
    if let Some(date) = &header.date {
        println!("  {:<10} {}", "Date", date.format("%Y-%m-%d %H:%M"));
    }
    println!();
    print_part(message.main_part(), 1);
    println!();
}

fn print_part(part: &Part, indent: usize) {
    let pad = "  ".repeat(indent);
    match part {
        Part::Single(single) => {
            let mut flags = Vec::new();
            if single.is_attachment {
                flags.push("attachment");
            }
            if single.is_inline_attachment {
                flags.push("inline");
            }
            let name = single
                .filename
                .as_deref()
                .map(|n| format!(" \"{n}\""))
                .unwrap_or_default();
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            };
            println!(
                "{pad}{:<8} {}{name} ({}){flags}",
                single.part_id,
                single.mime_type,
                format_size(single.content.size(), BINARY)
            );
        }
        Part::Message(embedded) => {
            let subject = embedded.header.subject.as_deref().unwrap_or("");
            println!("{pad}{:<8} {} \"{subject}\"", embedded.part_id, embedded.mime_type);
            print_part(&embedded.main_part, indent + 1);
        }
        Part::Multipart(multipart) => {
            println!("{pad}{:<8} {}", multipart.part_id, multipart.mime_type);
            for child in &multipart.parts {
                print_part(child, indent + 1);
            }
        }
    }
}

fn part_json(part: &Part) -> serde_json::Value {
    match part {
        Part::Single(single) => serde_json::json!({
            "part_id": single.part_id,
            "mime_type": single.mime_type,
            "charset": single.charset,
            "filename": single.filename,
            "content_id": single.content_id,
            "is_attachment": single.is_attachment,
            "is_inline_attachment": single.is_inline_attachment,
            "size": single.content.size(),
            "remote": matches!(single.content, Content::Remote { .. }),
        }),
        Part::Message(embedded) => serde_json::json!({
            "part_id": embedded.part_id,
            "mime_type": embedded.mime_type,
            "header": embedded.header,
            "main_part": part_json(&embedded.main_part),
        }),
        Part::Multipart(multipart) => serde_json::json!({
            "part_id": multipart.part_id,
            "mime_type": multipart.mime_type,
            "parts": multipart.parts.iter().map(part_json).collect::<Vec<_>>(),
        }),
    }
}

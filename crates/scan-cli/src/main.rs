use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use scan_core::generation::parse_batch_input;
use scan_core::payload::{self, ContactCard, EventDraft};
use scan_core::{
    classify, ErrorCorrection, GeneratorConfig, HistoryStore, LinkInspector, LinkReport,
    QRGenerator, QRScanner, ScanResult, ScanSettings, SettingsStore, Verdict,
};
use std::fs;
use std::path::{Path, PathBuf};

mod history;

#[derive(Parser)]
#[command(name = "codescan", version, about = "Scan, generate and keep track of barcodes")]
struct Cli {
    /// Directory holding the history database and settings
    #[arg(long, global = true, default_value = ".codescan")]
    data_dir: PathBuf,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode every barcode in one or more images
    Scan {
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Fall back to the restoration backend when nothing is found
        #[arg(long)]
        restore: bool,
        #[arg(long)]
        json: bool,
        /// Do not record results in history
        #[arg(long)]
        no_history: bool,
    },
    /// Classify text as if it had been scanned
    Parse {
        text: String,
        #[arg(long)]
        json: bool,
    },
    /// Build payload text for structured content
    Payload {
        #[command(subcommand)]
        kind: PayloadKind,
    },
    /// Generate a QR code
    Generate {
        content: String,
        /// PNG output path
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print the code to the terminal
        #[arg(long)]
        terminal: bool,
        #[command(flatten)]
        render: RenderArgs,
        #[arg(long)]
        no_history: bool,
    },
    /// Generate one QR code per non-blank line of a file
    Batch {
        input: PathBuf,
        #[arg(short, long, default_value = "qr-batch")]
        out_dir: PathBuf,
        #[command(flatten)]
        render: RenderArgs,
    },
    /// Inspect a link for phishing and malware signals
    CheckLink {
        url: String,
        #[arg(long)]
        json: bool,
    },
    /// Browse and manage the scan history
    History {
        #[command(subcommand)]
        action: history::HistoryAction,
    },
    /// Show or change persisted settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(clap::Args)]
struct RenderArgs {
    #[arg(long, value_enum, default_value = "m")]
    ec: EcArg,
    /// Pixels per module
    #[arg(long, default_value_t = 10)]
    module_size: u32,
}

impl RenderArgs {
    fn generator(&self) -> QRGenerator {
        QRGenerator::new(GeneratorConfig {
            module_size: self.module_size,
            error_correction: self.ec.into(),
            ..GeneratorConfig::default()
        })
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum EcArg {
    L,
    M,
    Q,
    H,
}

impl From<EcArg> for ErrorCorrection {
    fn from(arg: EcArg) -> Self {
        match arg {
            EcArg::L => ErrorCorrection::L,
            EcArg::M => ErrorCorrection::M,
            EcArg::Q => ErrorCorrection::Q,
            EcArg::H => ErrorCorrection::H,
        }
    }
}

#[derive(Subcommand)]
enum PayloadKind {
    Wifi {
        #[arg(long)]
        ssid: String,
        #[arg(long, default_value = "")]
        password: String,
        /// WPA, WEP or nopass
        #[arg(long, default_value = "WPA")]
        encryption: String,
        #[arg(long)]
        hidden: bool,
    },
    Contact {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        address: String,
        #[arg(long, default_value = "")]
        organization: String,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        url: String,
        /// Compact MECARD instead of vCard
        #[arg(long)]
        mecard: bool,
    },
    Event {
        #[arg(long)]
        title: String,
        /// Start, milliseconds since the epoch (UTC)
        #[arg(long)]
        start: i64,
        #[arg(long, default_value_t = 0)]
        end: i64,
        #[arg(long, default_value = "")]
        location: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        all_day: bool,
    },
    Email {
        address: String,
        #[arg(long, default_value = "")]
        subject: String,
        #[arg(long, default_value = "")]
        body: String,
    },
    Geo {
        latitude: f64,
        longitude: f64,
        #[arg(long, default_value = "")]
        query: String,
    },
    Sms {
        number: String,
        #[arg(default_value = "")]
        message: String,
    },
    Tel {
        number: String,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    Show,
    /// Set a top-level setting, e.g. `check_links false`
    Set { key: String, value: String },
    Reset,
}

struct DataDir {
    root: PathBuf,
}

impl DataDir {
    fn settings(&self) -> Result<SettingsStore> {
        SettingsStore::new(self.root.join("settings.json"))
    }

    fn history(&self) -> Result<HistoryStore> {
        HistoryStore::open(self.root.join("history.db"))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let ctx = DataDir {
        root: cli.data_dir,
    };

    match cli.command {
        Command::Scan {
            images,
            restore,
            json,
            no_history,
        } => scan_cmd(&ctx, &images, restore, json, no_history),
        Command::Parse { text, json } => parse_cmd(&text, json),
        Command::Payload { kind } => {
            println!("{}", build_payload(&kind));
            Ok(())
        }
        Command::Generate {
            content,
            output,
            terminal,
            render,
            no_history,
        } => generate_cmd(&ctx, &content, output.as_deref(), terminal, &render, no_history),
        Command::Batch {
            input,
            out_dir,
            render,
        } => batch_cmd(&input, &out_dir, &render),
        Command::CheckLink { url, json } => check_link_cmd(&url, json),
        Command::History { action } => history::run(&ctx.history()?, action),
        Command::Settings { action } => settings_cmd(&ctx, action),
    }
}

fn scan_cmd(
    ctx: &DataDir,
    images: &[PathBuf],
    restore: bool,
    json: bool,
    no_history: bool,
) -> Result<()> {
    let settings = ctx.settings()?.get();
    let save = settings.save_history && !no_history;
    let scanner = QRScanner::with_settings(settings);
    let store = if save { Some(ctx.history()?) } else { None };

    let runtime = if restore {
        Some(
            tokio::runtime::Builder::new_current_thread()
                .build()
                .context("Failed to start async runtime")?,
        )
    } else {
        None
    };

    let mut results = Vec::new();
    for path in images {
        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let result = match &runtime {
            Some(rt) => rt.block_on(scanner.scan_bytes_async(&bytes)),
            None => scanner.scan_bytes(&bytes),
        }
        .with_context(|| format!("Failed to scan {}", path.display()))?;

        if let Some(store) = &store {
            for item in &result.codes {
                store.insert_if_absent(&item.content, item.content_type, false, &item.format)?;
            }
        }

        if !json {
            print_scan(path, &result);
        }
        results.push(result);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }
    Ok(())
}

fn print_scan(path: &Path, result: &ScanResult) {
    println!(
        "{}: {} code(s) in {} ms",
        path.display(),
        result.codes.len(),
        result.processing_time_ms
    );
    for (i, item) in result.codes.iter().enumerate() {
        println!(
            "  [{}] {} via {} ({}): {}",
            i,
            item.format,
            item.source,
            item.content_type,
            item.parsed.summary()
        );
        if let Some(report) = &item.link_report {
            print_link_warning(report);
        }
    }
}

fn print_link_warning(report: &LinkReport) {
    if report.verdict == Verdict::Safe {
        return;
    }
    println!("      link is {:?}:", report.verdict);
    for finding in &report.findings {
        println!("        - {:?}", finding);
    }
}

fn parse_cmd(text: &str, json: bool) -> Result<()> {
    let parsed = classify(text);
    if json {
        println!("{}", serde_json::to_string_pretty(&parsed)?);
    } else {
        println!("{}: {}", parsed.content_type(), parsed.summary());
    }
    Ok(())
}

fn build_payload(kind: &PayloadKind) -> String {
    match kind {
        PayloadKind::Wifi {
            ssid,
            password,
            encryption,
            hidden,
        } => payload::wifi(ssid, password, encryption, *hidden),
        PayloadKind::Contact {
            name,
            phone,
            email,
            address,
            organization,
            title,
            url,
            mecard,
        } => {
            let card = ContactCard {
                name,
                phone,
                email,
                address,
                organization,
                title,
                url,
            };
            if *mecard {
                payload::mecard(&card)
            } else {
                payload::vcard(&card)
            }
        }
        PayloadKind::Event {
            title,
            start,
            end,
            location,
            description,
            all_day,
        } => payload::event(&EventDraft {
            title,
            description,
            location,
            start_time_ms: *start,
            end_time_ms: *end,
            is_all_day: *all_day,
        }),
        PayloadKind::Email {
            address,
            subject,
            body,
        } => payload::mailto(address, subject, body),
        PayloadKind::Geo {
            latitude,
            longitude,
            query,
        } => payload::geo(*latitude, *longitude, query),
        PayloadKind::Sms { number, message } => payload::sms(number, message),
        PayloadKind::Tel { number } => payload::tel(number),
    }
}

fn generate_cmd(
    ctx: &DataDir,
    content: &str,
    output: Option<&Path>,
    terminal: bool,
    render: &RenderArgs,
    no_history: bool,
) -> Result<()> {
    if output.is_none() && !terminal {
        bail!("Nothing to do: pass --output <file.png> and/or --terminal");
    }
    let generator = render.generator();

    if let Some(path) = output {
        let png = generator.generate_png(content)?;
        fs::write(path, png).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote {}", path.display());
    }
    if terminal {
        println!("{}", generator.render_terminal(content)?);
    }

    if ctx.settings()?.get().save_history && !no_history {
        let content_type = classify(content).content_type();
        ctx.history()?
            .insert_if_absent(content, content_type, true, "QR_CODE")?;
    }
    Ok(())
}

fn batch_cmd(input: &Path, out_dir: &Path, render: &RenderArgs) -> Result<()> {
    let text = fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let lines = parse_batch_input(&text);
    if lines.is_empty() {
        bail!("{} has no content lines", input.display());
    }
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let mut failed = 0;
    for entry in render.generator().generate_batch(&lines) {
        match entry.result {
            Ok(img) => {
                let path = out_dir.join(format!("qr_{:04}.png", entry.index + 1));
                img.save(&path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
            Err(e) => {
                failed += 1;
                eprintln!("line {}: {}", entry.index + 1, e);
            }
        }
    }

    println!(
        "Generated {} of {} codes into {}",
        lines.len() - failed,
        lines.len(),
        out_dir.display()
    );
    Ok(())
}

fn check_link_cmd(url: &str, json: bool) -> Result<()> {
    let report = LinkInspector::new().inspect(url);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}: {:?}", report.url, report.verdict);
        for finding in &report.findings {
            println!("  - {:?}", finding);
        }
    }
    Ok(())
}

fn settings_cmd(ctx: &DataDir, action: SettingsAction) -> Result<()> {
    let store = ctx.settings()?;
    match action {
        SettingsAction::Show => {}
        SettingsAction::Set { key, value } => {
            let updated = apply_setting(&store.get(), &key, &value)?;
            store.update(updated)?;
        }
        SettingsAction::Reset => store.reset()?,
    }
    println!("{}", serde_json::to_string_pretty(&store.get())?);
    Ok(())
}

/// Values are read as JSON first so `false` and `800` keep their types
fn apply_setting(current: &ScanSettings, key: &str, value: &str) -> Result<ScanSettings> {
    let mut tree = serde_json::to_value(current)?;
    let slot = tree
        .get_mut(key)
        .with_context(|| format!("Unknown setting '{}'", key))?;
    *slot = serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    serde_json::from_value(tree).with_context(|| format!("Invalid value for '{}': {}", key, value))
}

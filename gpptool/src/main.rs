use clap::{Parser, Subcommand};
use colored_json::{Color, ColorMode, Output, Styler, ToColoredJson};
use fides_gpp::cmpapi::{CmpApi, CmpStatus, SignalStatus};
use fides_gpp::config::CmpConfig;
use fides_gpp::gvl::GvlLoader;
use fides_gpp::sections::{SectionId, supported_sections};
use fides_gpp::v1::{GPPString, GppModel};
use num_traits::ToPrimitive;
use num_traits::cast::FromPrimitive;
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{fs, io};
use tracing::{debug, info};

mod logging;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON config file of the CMP
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a GPP string and display it in the console
    Parse {
        /// GPP string to parse
        gpp_string: String,
        /// Section ID to parse
        #[arg(short, long)]
        section_id: Option<u32>,
    },
    /// List the sections of a GPP string, or the supported ones
    List {
        /// GPP string to parse
        gpp_string: Option<String>,
    },
    /// Encode a JSON object of sections, read from a file or stdin
    Encode {
        /// JSON file, `-` for stdin
        #[arg(default_value = "-")]
        input: PathBuf,
    },
    /// Display the CMP API ping answer for a GPP string
    Ping {
        /// GPP string to load
        gpp_string: String,
        /// Overrides the CMP id of the config
        #[arg(long)]
        cmp_id: Option<u16>,
    },
    /// Load a global vendor list
    Gvl {
        /// Version to load, the latest one when absent
        #[arg(short, long)]
        version: Option<u32>,
        /// Overrides the vendor list base URL of the config
        #[arg(long)]
        base_url: Option<String>,
        /// Only display this vendor
        #[arg(long)]
        vendor: Option<u16>,
    },
}

type CmdResult = Result<(), Box<dyn Error>>;

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    logging::setup_logging(args.log_json);

    let e = match load_config(args.config.as_deref()) {
        Ok(config) => run(args.cmd, config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = e {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cmd: Commands, config: CmpConfig) -> CmdResult {
    match cmd {
        Commands::Parse {
            gpp_string,
            section_id: None,
        } => parse_gpp_string(&gpp_string),
        Commands::Parse {
            gpp_string,
            section_id: Some(id),
        } => parse_gpp_string_section(&gpp_string, id),
        Commands::List {
            gpp_string: Some(s),
        } => list_sections(&s),
        Commands::List { gpp_string: None } => list_supported_sections(),
        Commands::Encode { input } => encode(&input),
        Commands::Ping { gpp_string, cmp_id } => ping(&gpp_string, cmp_id, config),
        Commands::Gvl {
            version,
            base_url,
            vendor,
        } => load_gvl(config, version, base_url, vendor).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<CmpConfig, Box<dyn Error>> {
    let Some(path) = path else {
        return Ok(CmpConfig::new(1, 0));
    };
    debug!(path = %path.display(), "loading config");
    Ok(CmpConfig::from_json(&fs::read_to_string(path)?)?)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CmdResult {
    println!(
        "{}",
        serde_json::to_string_pretty(value)?
            .to_colored_json_with_styler(ColorMode::Auto(Output::StdOut), json_color_styler())?
    );
    Ok(())
}

fn parse_gpp_string(s: &str) -> CmdResult {
    let model = GppModel::from_str(s)?;
    print_json(&model.to_json()?)
}

fn parse_gpp_string_section(s: &str, id: u32) -> CmdResult {
    let gpp_str = GPPString::from_str(s)?;

    let section = gpp_str.decode_section(SectionId::from_u32(id).ok_or("Invalid ID")?)?;

    print_json(&section)
}

fn list_sections(s: &str) -> CmdResult {
    let gpp_str = GPPString::from_str(s)?;

    for (id, section) in gpp_str.section_ids().zip(gpp_str.sections()) {
        println!("{}\t{}\t{}", id.to_u32().unwrap_or_default(), id, section);
    }

    Ok(())
}

fn list_supported_sections() -> CmdResult {
    for schema in supported_sections() {
        println!(
            "{}\t{}\t{:?}",
            schema.id.to_u32().unwrap_or_default(),
            schema.name,
            schema.versions()
        );
    }

    Ok(())
}

fn encode(input: &Path) -> CmdResult {
    let json: serde_json::Value = if input == Path::new("-") {
        serde_json::from_reader(io::stdin().lock())?
    } else {
        serde_json::from_reader(fs::File::open(input)?)?
    };
    let model = GppModel::from_json(&json)?;
    println!("{}", model.encode()?);
    Ok(())
}

fn ping(s: &str, cmp_id: Option<u16>, mut config: CmpConfig) -> CmdResult {
    if let Some(id) = cmp_id {
        config.cmp_id = id;
    }
    let api = CmpApi::from_config(&config);
    if api.cmp_status() == CmpStatus::Error {
        return Err("invalid cmp config".into());
    }

    api.set_gpp_string(s)?;
    api.set_cmp_status(CmpStatus::Loaded);
    api.set_signal_status(SignalStatus::Ready);
    print_json(&api.ping())
}

async fn load_gvl(
    mut config: CmpConfig,
    version: Option<u32>,
    base_url: Option<String>,
    vendor: Option<u16>,
) -> CmdResult {
    if let Some(url) = base_url {
        config.gvl.base_url = url;
    }
    let version = version.or(config.gvl.version);
    let loader = GvlLoader::from_config(&config.gvl)?;

    let gvl = loader.load(version).await?;
    info!(
        version = gvl.version(),
        vendors = gvl.vendors().count(),
        "loaded vendor list"
    );

    match vendor {
        Some(id) => print_json(gvl.vendor(id).ok_or("unknown vendor")?),
        None => print_json(gvl.as_ref()),
    }
}

fn json_color_styler() -> Styler {
    Styler {
        key: Color::Green.foreground(),
        string_value: Color::Blue.bold(),
        integer_value: Color::Magenta.bold(),
        float_value: Color::Magenta.italic(),
        object_brackets: Color::Yellow.bold(),
        array_brackets: Color::Cyan.bold(),
        ..Default::default()
    }
}

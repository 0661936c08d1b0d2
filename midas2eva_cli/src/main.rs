use clap::{value_parser, Arg, ArgMatches, Command};
use indicatif::{MultiProgress, ProgressBar};
use indicatif_log_bridge::LogWrapper;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use libmidas2eva::config::Config;
use libmidas2eva::eva::EvaFile;
use libmidas2eva::mdump::MdumpCommand;
use libmidas2eva::parameters::Overrides;
use libmidas2eva::process::process;

fn make_template_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config)?;
    let mut file = File::create(path)?;
    file.write_all(yaml_str.as_bytes())?;
    Ok(())
}

fn inspect_eva_file(path: &Path) {
    let eva = match EvaFile::read_file(path) {
        Ok(eva) => eva,
        Err(e) => {
            log::error!("Could not read {}: {e}", path.to_string_lossy());
            return;
        }
    };
    log::info!("Header:\n{}", eva.header_text());
    log::info!(
        "Channels: {} Frequency steps: {} Frequencies in table: {}",
        eva.num_channels,
        eva.num_freq_steps,
        eva.frequencies.len()
    );
    log::info!("Cycles: {}", eva.records.len());
    for (idx, record) in eva.records.iter().enumerate() {
        for (encoding, hist) in record.readings() {
            log::info!(
                "Cycle {idx}: time {} {encoding:?} {} occupied bins {} counts",
                record.start_time,
                hist.occupied(),
                hist.total()
            );
        }
    }
}

/// Overrides given on the command line
fn cli_overrides(matches: &ArgMatches) -> Overrides {
    let float = |name: &str| matches.get_one::<f64>(name).copied();
    Overrides {
        mass: matches.get_one::<String>("mass").cloned(),
        charge: matches.get_one::<i32>("charge").copied(),
        amplitude: float("amp"),
        start_freq: float("startf"),
        stop_freq: float("stopf"),
        num_freq_steps: float("nfreq"),
        rf_time: float("trf"),
        start_time: float("start-time"),
        end_time: float("end-time"),
        tdc_gate_width: float("tdc"),
    }
}

fn float_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .help(help)
        .value_parser(value_parser!(f64))
}

fn main() {
    // Create a cli
    let matches = Command::new("midas2eva_cli")
        .about("Convert MIDAS MPET run files to the EVA format")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .subcommand(Command::new("inspect").about("Print the content of an EVA file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .global(true)
                .help("Path to the file"),
        )
        .arg(Arg::new("mass").long("mass").help("Mass label, e.g. 1K39"))
        .arg(
            Arg::new("charge")
                .long("charge")
                .help("Charge state")
                .value_parser(value_parser!(i32)),
        )
        .arg(float_arg("amp", "RF amplitude in V"))
        .arg(float_arg("startf", "Start frequency in Hz"))
        .arg(float_arg("stopf", "Stop frequency in Hz"))
        .arg(float_arg("nfreq", "Number of frequency steps"))
        .arg(float_arg("trf", "RF excitation time in s"))
        .arg(float_arg("start-time", "Run start time"))
        .arg(float_arg("end-time", "Run end time"))
        .arg(float_arg("tdc", "TDC gate width in us"))
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    if let Err(e) = LogWrapper::new(pb_manager.clone(), logger).try_init() {
        eprintln!("Could not create logging/progress: {e}");
        return;
    }
    log::set_max_level(log::LevelFilter::Info);

    // Parse the cli
    let Some(path) = matches.get_one::<String>("path") else {
        log::error!("A path is required, pass one with -p");
        return;
    };
    let path = PathBuf::from(path);

    match matches.subcommand() {
        Some(("new", _)) => {
            log::info!("Making a template config at {}...", path.to_string_lossy());
            match make_template_config(&path) {
                Ok(()) => log::info!("Done."),
                Err(e) => log::error!("Could not write template config: {e}"),
            }
            return;
        }
        Some(("inspect", _)) => {
            inspect_eva_file(&path);
            return;
        }
        _ => (),
    }

    // Load our config
    log::info!("Loading config from {}...", path.to_string_lossy());
    let mut config = match Config::read_config_file(&path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    config.overrides = config.overrides.merged_with(&cli_overrides(&matches));
    log::info!("Config successfully loaded.");
    log::info!("Input files: {}", config.input_files.len());
    log::info!("Output Path: {}", config.output_path.to_string_lossy());
    log::info!("mdump: {} (bank {})", config.mdump_program, config.bank);
    log::info!("Bin width: {} us", config.bin_width);

    // Setup the progress bar
    let pb = pb_manager.add(ProgressBar::new(100));
    let status = Arc::new(Mutex::new(0.0));
    let sent_status = status.clone();
    let source = MdumpCommand::new(&config.mdump_program, &config.bank);
    // Spawn the task!
    let handle = std::thread::spawn(move || process(config, source, sent_status));

    loop {
        std::thread::sleep(std::time::Duration::from_millis(250));
        match status.lock() {
            Ok(stat) => pb.set_position((*stat * 100.0) as u64),
            Err(e) => log::error!("{e}"),
        }

        if handle.is_finished() {
            match handle.join() {
                Ok(result) => match result {
                    Ok(n) => log::info!("Successfully converted {n} file(s)!"),
                    Err(e) => log::error!("Conversion failed with error: {e}"),
                },
                Err(_) => log::error!("Failed to join conversion task!"),
            }
            break;
        }
    }

    pb.finish();

    log::info!("Done.");
}

use std::fs;
use std::io::{self, prelude::*};
use std::path;
use std::process;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;
use tempfile;

use tape_sort::tape::file::RmpFileTape;
use tape_sort::{ExternalSorter, Tape};

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let memory_size = arg_parser.value_of("memory_size").expect("value is required");
    let memory_budget = memory_size.parse::<ByteSize>().expect("value is pre-validated").as_u64() as usize;

    let tapes_number: usize = arg_parser.value_of_t_or_exit("tapes");
    let tmp_dir_path: Option<&str> = arg_parser.value_of("tmp_dir");

    let input = arg_parser.value_of("input").expect("value is required");
    let input_stream = match fs::File::open(input) {
        Ok(file) => io::BufReader::new(file),
        Err(err) => {
            log::error!("input file opening error: {}", err);
            process::exit(1);
        }
    };

    let output = arg_parser.value_of("output").expect("value is required");
    let mut output_stream = match fs::File::create(output) {
        Ok(file) => io::BufWriter::new(file),
        Err(err) => {
            log::error!("output file creation error: {}", err);
            process::exit(1);
        }
    };

    let tmp_dir = match tmp_dir_path {
        Some(tmp_dir_path) => tempfile::tempdir_in(path::Path::new(tmp_dir_path)),
        None => tempfile::tempdir(),
    };
    let tmp_dir = match tmp_dir {
        Ok(tmp_dir) => tmp_dir,
        Err(err) => {
            log::error!("temporary directory creation error: {}", err);
            process::exit(1);
        }
    };
    log::info!("using {} as a temporary directory", tmp_dir.path().display());

    let mut input_tape: RmpFileTape<String> = match RmpFileTape::create_in(&tmp_dir, usize::MAX) {
        Ok(tape) => tape,
        Err(err) => {
            log::error!("input tape creation error: {}", err);
            process::exit(1);
        }
    };

    let mut total_lines = 0;
    for line in input_stream.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                log::error!("input file reading error: {}", err);
                process::exit(1);
            }
        };

        input_tape.set_position(total_lines);
        if let Err(err) = input_tape.write(line) {
            log::error!("input tape writing error: {}", err);
            process::exit(1);
        }
        total_lines += 1;
    }
    if let Err(err) = input_tape.flush() {
        log::error!("input tape flushing error: {}", err);
        process::exit(1);
    }
    log::info!("loaded {} lines", total_lines);

    // temporary tapes are sized to the whole input; the backing files only
    // grow to the size of the chunk actually written
    let mut output_tape: RmpFileTape<String> = match RmpFileTape::create_in(&tmp_dir, total_lines) {
        Ok(tape) => tape,
        Err(err) => {
            log::error!("output tape creation error: {}", err);
            process::exit(1);
        }
    };
    let mut temp_tapes: Vec<RmpFileTape<String>> = Vec::with_capacity(tapes_number);
    for _ in 0..tapes_number {
        match RmpFileTape::create_in(&tmp_dir, total_lines) {
            Ok(tape) => temp_tapes.push(tape),
            Err(err) => {
                log::error!("temporary tape creation error: {}", err);
                process::exit(1);
            }
        }
    }

    let sorter = ExternalSorter::new(memory_budget);
    if let Err(err) = sorter.sort(&mut input_tape, &mut output_tape, &mut temp_tapes) {
        log::error!("data sorting error: {}", err);
        process::exit(1);
    }

    for position in 0..output_tape.size() {
        output_tape.set_position(position);
        let line = match output_tape.read() {
            Ok(line) => line,
            Err(err) => {
                log::error!("output tape reading error: {}", err);
                process::exit(1);
            }
        };
        if let Err(err) = output_stream.write_all(format!("{}\n", line).as_bytes()) {
            log::error!("data saving error: {}", err);
            process::exit(1);
        };
    }

    if let Err(err) = output_stream.flush() {
        log::error!("data flushing error: {}", err);
        process::exit(1);
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("tape-sort")
        .about("tape-based external sorter")
        .arg(
            clap::Arg::new("input")
                .short('i')
                .long("input")
                .help("file to be sorted")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("output")
                .short('o')
                .long("output")
                .help("result file")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("memory_size")
                .short('m')
                .long("memory-size")
                .help("memory budget for each sorting phase")
                .required(true)
                .takes_value(true)
                .validator(|v| match v.parse::<ByteSize>() {
                    Ok(_) => Ok(()),
                    Err(err) => Err(format!("Memory size format incorrect: {}", err)),
                }),
        )
        .arg(
            clap::Arg::new("tapes")
                .short('t')
                .long("tapes")
                .help("number of temporary tapes")
                .takes_value(true)
                .default_value("4")
                .validator(|v| match v.parse::<usize>() {
                    Ok(_) => Ok(()),
                    Err(err) => Err(format!("Tapes number incorrect: {}", err)),
                }),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .arg(
            clap::Arg::new("tmp_dir")
                .short('d')
                .long("tmp-dir")
                .help("directory to be used to store temporary tapes")
                .takes_value(true),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}

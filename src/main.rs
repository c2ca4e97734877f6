#[macro_use]
extern crate slog;

use clap::clap_app;
use luxtracer_rs::common::config::RenderSettings;
use luxtracer_rs::*;
use slog::Drain;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn number_arg_legal(val: String) -> Result<(), String> {
    val.parse::<u64>()
        .map(|_| ())
        .map_err(|_| format!("could not parse {} as a number", val))
}

fn new_drain(level: slog::Level) -> slog::Fuse<slog::LevelFilter<slog::Fuse<slog_async::Async>>> {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    drain.filter_level(level).fuse()
}

fn main() {
    let matches = clap_app!(luxtracer =>
        (version: "0.1")
        (author: "Eric F. <eric1221bday@gmail.com>")
        (about: "Multi-threaded spectral path tracer")
        (@arg CONFIG: "Render settings file (xml)")
        (@arg output: -o --output +takes_value "Image to write the render to")
        (@arg spp: -s --spp +takes_value validator(number_arg_legal) "Samples per pixel to stop at")
        (@arg time: -t --time +takes_value validator(number_arg_legal) "Seconds to stop the render after")
        (@arg threads: -j --threads +takes_value validator(number_arg_legal) "Number of render threads, 0 for one per core")
        (@arg seed: --seed +takes_value validator(number_arg_legal) "Seed for the sample sequences")
        (@arg verbose: -v --verbose ... "Log more, repeat for trace output")
    )
    .get_matches();

    let level = match matches.occurrences_of("verbose") {
        0 => slog::Level::Info,
        1 => slog::Level::Debug,
        _ => slog::Level::Trace,
    };
    let log = slog::Logger::root(new_drain(level), o!());

    if let Err(err) = run(&log, &matches) {
        crit!(log, "render failed"; "error" => format!("{:#}", err));
        // let the async drain flush before exiting
        drop(log);
        std::process::exit(1);
    }
}

fn run(log: &slog::Logger, matches: &clap::ArgMatches) -> anyhow::Result<()> {
    let mut settings = match matches.value_of("CONFIG") {
        Some(path) => RenderSettings::load(Path::new(path))?,
        None => RenderSettings::default(),
    };
    if let Some(output) = matches.value_of("output") {
        settings.output = PathBuf::from(output);
    }
    if let Some(spp) = matches.value_of("spp") {
        settings.film.halt_spp = spp.parse()?;
    }
    if let Some(time) = matches.value_of("time") {
        settings.halt_time = time.parse()?;
    }
    if let Some(threads) = matches.value_of("threads") {
        settings.threads = threads.parse()?;
    }
    if let Some(seed) = matches.value_of("seed") {
        settings.seed = Some(seed.parse()?);
    }
    settings.ensure_halt_condition();
    debug!(log, "render settings: {:?}", settings);

    let scene = Arc::new(pathtracer::demo::demo_scene(log, &settings)?);
    headless::run(log, scene, &settings)
}

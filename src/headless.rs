use crate::common::config::RenderSettings;
use crate::pathtracer::{Scene, ThreadSignal};
use anyhow::{anyhow, Context};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

fn progress_bar(settings: &RenderSettings) -> ProgressBar {
    let film = &settings.film;
    if film.halt_spp > 0 {
        let total = film.x_resolution as u64 * film.y_resolution as u64 * film.halt_spp as u64;
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {wide_bar} {pos}/{len} samples {msg}"),
        );
        bar
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner().template("{spinner} [{elapsed_precise}] {pos} samples {msg}"),
        );
        bar
    }
}

fn all_suspended(scene: &Scene) -> bool {
    let status = scene.threads_status();
    !status.is_empty() && status.iter().all(|(_, s)| *s == ThreadSignal::Pause)
}

/// Renders `scene` without a display: starts the render threads, reports
/// progress, stops the render once the time limit is hit and writes the image.
pub fn run(log: &slog::Logger, scene: Arc<Scene>, settings: &RenderSettings) -> anyhow::Result<()> {
    let log = log.new(o!("module" => "headless"));
    let threads = scene.set_thread_count(settings.thread_count());
    info!(log, "starting render"; "threads" => threads, "halt_spp" => settings.film.halt_spp,
        "halt_time" => settings.halt_time);

    let render = {
        let scene = scene.clone();
        std::thread::Builder::new()
            .name(String::from("render-driver"))
            .spawn(move || scene.render())
            .context("failed to spawn render driver")?
    };

    let bar = progress_bar(settings);
    let start = Instant::now();
    let halt_time = Duration::from_secs(settings.halt_time);
    let mut terminated = false;
    while !render.is_finished() {
        std::thread::sleep(POLL_INTERVAL);
        bar.set_position(scene.film.num_samples());
        bar.set_message(&format!(
            "{:.2} spp, {:.0} samples/s, efficiency {:.1}%",
            scene.samples_per_pixel(),
            scene.samples_per_second(),
            scene.efficiency()
        ));
        if terminated {
            continue;
        }
        if settings.halt_time > 0 && start.elapsed() >= halt_time {
            info!(log, "time limit reached"; "seconds" => settings.halt_time);
            scene.terminate();
            terminated = true;
        } else if scene.film.enough_samples() && all_suspended(&scene) {
            // nothing resumes suspended threads without a display
            info!(log, "all render threads suspended");
            scene.terminate();
            terminated = true;
        }
    }

    let result = render
        .join()
        .map_err(|_| anyhow!("render driver panicked"))?;
    if let Err(err) = result {
        bar.abandon();
        // threads started ahead of the render are still waiting for it
        scene.set_thread_count(0);
        return Err(err);
    }
    bar.finish_with_message("done");

    info!(log, "render finished";
        "seconds" => scene.seconds_elapsed(),
        "samples_per_pixel" => scene.samples_per_pixel(),
        "efficiency" => scene.efficiency());
    scene.film.write_image(&settings.output)?;
    info!(log, "image written"; "path" => %settings.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::film::FilmSettings;
    use crate::pathtracer::demo::demo_scene;
    use image::GenericImageView;

    #[test]
    fn test_headless_writes_image() {
        let log = slog::Logger::root(slog::Discard, o!());
        let output = std::env::temp_dir().join(format!("luxtracer-headless-{}.png", std::process::id()));
        let mut settings = RenderSettings {
            film: FilmSettings::with_resolution(12, 8),
            threads: 2,
            seed: Some(3),
            output: output.clone(),
            ..Default::default()
        };
        settings.film.halt_spp = 1;
        settings.integrator.max_depth = 3;

        let scene = Arc::new(demo_scene(&log, &settings).unwrap());
        run(&log, scene.clone(), &settings).unwrap();
        assert!(scene.film.enough_samples());
        let image = image::open(&output).unwrap();
        assert_eq!(image.dimensions(), (12, 8));
        std::fs::remove_file(&output).unwrap();
    }

    #[test]
    fn test_suspended_threads_do_not_block_exit() {
        let log = slog::Logger::root(slog::Discard, o!());
        let output = std::env::temp_dir().join(format!("luxtracer-suspend-{}.png", std::process::id()));
        let mut settings = RenderSettings {
            film: FilmSettings::with_resolution(8, 6),
            threads: 2,
            suspend_threads_when_done: true,
            output: output.clone(),
            ..Default::default()
        };
        settings.film.halt_spp = 1;
        settings.integrator.max_depth = 3;

        let scene = Arc::new(demo_scene(&log, &settings).unwrap());
        run(&log, scene.clone(), &settings).unwrap();
        assert!(scene.film.enough_samples());
        assert_eq!(scene.thread_count(), 0);
        assert!(output.exists());
        std::fs::remove_file(&output).unwrap();
    }

    #[test]
    fn test_time_limit_stops_unbounded_render() {
        let log = slog::Logger::root(slog::Discard, o!());
        let output = std::env::temp_dir().join(format!("luxtracer-timed-{}.png", std::process::id()));
        let settings = RenderSettings {
            film: FilmSettings::with_resolution(8, 8),
            threads: 1,
            halt_time: 1,
            output: output.clone(),
            ..Default::default()
        };

        let scene = Arc::new(demo_scene(&log, &settings).unwrap());
        run(&log, scene.clone(), &settings).unwrap();
        assert!(!scene.film.enough_samples());
        assert!(scene.film.num_samples() > 0);
        std::fs::remove_file(&output).unwrap();
    }
}

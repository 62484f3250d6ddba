//! Playlist demo application
//!
//! Runs a headless playlist session: recordings are written to disk and
//! loaded in the background, then the audio clock drives the rooms while the
//! stereo presenter draws flat frames, enters presentation on a simulated
//! headset, lowers its resolution under "load", eases out at the end of the
//! track and exits again.

mod recordings;

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use vr_engine::config::{Config, ConfigError, PlaylistConfig};
use vr_engine::foundation::logging;
use vr_engine::playback::{
    AudioTimeline, Keyframe, LinearLayout, LoadError, Playlist, PlaylistLoader, RonFileStorage,
    SimulatedAudio, TickDispatcher, Timeline, TimelineSource,
};
use vr_engine::render::{
    Camera, ManualScheduler, RecordingRenderer, RecordingScene, RenderCamera, RenderCommand,
    RenderError, SceneRenderer, SceneResources,
};
use vr_engine::stereo::{
    Capabilities, DisplayCapabilities, DisplayError, DisplayInfo, PlatformInfo, SimulatedDisplay,
    SimulatedProvider, StereoPresenter,
};

const DESKTOP_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/56.0 Safari/537.36";
const ROOM_COUNT: usize = 6;
const PERFORMERS: usize = 3;
const RECORDING_FRAMES: usize = 180;
const FRAME_TIME: Duration = Duration::from_micros(11_111);

/// Errors that end the demo
#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Display error: {0}")]
    Display(#[from] DisplayError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),
}

type Presenter = StereoPresenter<RecordingRenderer, SimulatedDisplay>;

#[derive(Debug, Default)]
struct SessionStats {
    frames: usize,
    draws: usize,
    display_frames: usize,
    platform_frames: usize,
}

/// Everything one frame touches
struct Session {
    presenter: Presenter,
    platform: ManualScheduler,
    dispatcher: TickDispatcher,
    audio: SimulatedAudio,
    resources: SceneResources,
    scene: RecordingScene,
    camera: RenderCamera,
    clock_ms: f64,
    stats: SessionStats,
}

impl Session {
    /// Run `frames` frames: schedule, tick, upload, draw
    fn run(&mut self, frames: usize, label: &str) -> Result<(), DemoError> {
        log::info!(
            "{} ({} frames, presenting={})",
            label,
            frames,
            self.presenter.is_presenting()
        );
        for _ in 0..frames {
            let fired = Rc::new(Cell::new(false));
            let flag = Rc::clone(&fired);
            self.presenter
                .request_animation_frame(Box::new(move |_timestamp| flag.set(true)));

            self.clock_ms += FRAME_TIME.as_secs_f64() * 1000.0;
            if self.presenter.is_presenting() {
                if let Some(display) = self.presenter.display_mut() {
                    self.stats.display_frames += display.run_frame(FRAME_TIME);
                }
            } else {
                self.stats.platform_frames += self.platform.run_frame(self.clock_ms);
            }
            if !fired.get() {
                log::warn!("Frame callback did not run");
                continue;
            }

            self.audio.advance(FRAME_TIME);
            self.dispatcher
                .dispatch(self.audio.clock(), &mut self.resources, false);
            self.scene.upload(&mut self.resources);
            self.presenter
                .render(&mut self.scene, &self.camera, None, false)?;

            self.stats.draws += self
                .presenter
                .renderer_mut()
                .take_commands()
                .iter()
                .filter(|command| matches!(command, RenderCommand::Draw(_)))
                .count();
            self.stats.frames += 1;
        }
        Ok(())
    }
}

fn load_config() -> Result<PlaylistConfig, ConfigError> {
    let config = match std::env::args().nth(1) {
        Some(path) => PlaylistConfig::load_from_file(&path)?,
        None => PlaylistConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn run() -> Result<(), DemoError> {
    let config = load_config()?;
    logging::init_with_level(&config.log_level);
    log::info!("Starting playlist demo");

    // Capabilities
    let provider = Arc::new(SimulatedProvider::new(vec![DisplayInfo {
        name: "Simulated Vive".to_string(),
        capabilities: DisplayCapabilities::all(),
    }]));
    let capabilities = Capabilities::probe(
        provider,
        PlatformInfo::from_user_agent(DESKTOP_USER_AGENT),
        true,
        &config.probe,
    );

    // Recordings
    let storage = RonFileStorage::new(std::env::temp_dir().join("playlist_demo_recordings"));
    let performers = PERFORMERS.min(config.playback.performers_per_room);
    let ids = recordings::write_demo_recordings(&storage, ROOM_COUNT, performers, RECORDING_FRAMES)?;

    // Scene and playlist
    let mut resources = SceneResources::allocate(
        config.layout.max_rooms,
        config.playback.performers_per_room,
        &config.costume_palette,
    );
    let layout = LinearLayout::new(&config.layout, ids.len());
    let playlist = Rc::new(RefCell::new(Playlist::new(
        ids,
        layout,
        &config,
        &mut resources,
    )?));
    playlist.borrow_mut().orb_mut().show();

    let loader = {
        let playlist = playlist.borrow();
        PlaylistLoader::start(
            Arc::new(storage),
            playlist.load_jobs(),
            config.playback.load_concurrency,
            playlist.cancellation_token(),
        )
        .on_error(|e| log::error!("Failed to load playlist: {}", e))
    };
    let load_summary = loader.wait(&mut *playlist.borrow_mut());

    // Tick subscribers: playlist first, then the section timeline
    let section = Rc::new(RefCell::new(String::from("-")));
    let section_sink = Rc::clone(&section);
    let timeline = Rc::new(RefCell::new(AudioTimeline::new(
        TimelineSource::Progress,
        Timeline::new(
            vec![
                Keyframe::new(0.0, "intro"),
                Keyframe::new(0.25, "verse"),
                Keyframe::new(0.6, "chorus"),
                Keyframe::new(0.95, "outro"),
            ],
            move |name: &&str| {
                log::info!("Section: {}", name);
                *section_sink.borrow_mut() = (*name).to_string();
            },
        ),
    )));
    let mut dispatcher = TickDispatcher::new();
    let playlist_handle = dispatcher.subscribe(Rc::clone(&playlist));
    let timeline_handle = dispatcher.subscribe(Rc::clone(&timeline));

    // Presenter
    let display = capabilities.display.as_ref().map(|info| {
        SimulatedDisplay::new(info.name.clone()).with_capabilities(info.capabilities)
    });
    let platform = ManualScheduler::new();
    let presenter = StereoPresenter::new(
        RecordingRenderer::new(1280.0, 720.0, 2.0),
        display,
        Box::new(platform.clone()),
        config.stereo.clone(),
    );

    let mut audio = SimulatedAudio::new(config.playback.track_length, config.playback.loop_seconds);
    audio.play();

    let mut session = Session {
        presenter,
        platform,
        dispatcher,
        audio,
        resources,
        scene: RecordingScene::new("playlist"),
        camera: Camera::default().to_render_camera(),
        clock_ms: 0.0,
        stats: SessionStats::default(),
    };

    session.run(90, "Flat preview")?;

    match session.presenter.request_present() {
        Ok(()) => {
            log::info!("Presenting at {:?}", session.presenter.renderer().size());
            session.run(180, "Stereo")?;

            session.presenter.set_resolution_ratio(0.5)?;
            session.run(90, "Stereo at half resolution")?;
            session.presenter.set_resolution_ratio(1.0)?;

            session.audio.seek(config.playback.max_time() - 0.1);
            session.run(90, "End of track")?;

            session.presenter.exit_present()?;
        }
        Err(e) => log::warn!("Staying flat: {}", e),
    }
    session.run(30, "Flat after presentation")?;

    // Teardown
    session.dispatcher.unsubscribe(timeline_handle);
    session.dispatcher.unsubscribe(playlist_handle);
    playlist.borrow_mut().destroy(&mut session.resources);

    let Session {
        presenter,
        stats,
        scene,
        ..
    } = session;
    let renderer = presenter.dispose();

    println!("Playlist demo finished");
    println!("  display:        {:?}", capabilities.kind);
    println!(
        "  recordings:     {} loaded, {} failed, {} skipped",
        load_summary.loaded, load_summary.failed, load_summary.skipped
    );
    println!("  frames:         {}", stats.frames);
    println!(
        "  scheduled on:   {} display, {} platform",
        stats.display_frames, stats.platform_frames
    );
    println!("  draw calls:     {}", stats.draws);
    println!("  uploaded bytes: {}", scene.uploaded_bytes());
    println!("  last section:   {}", section.borrow());
    println!("  final surface:  {:?}", renderer.size());
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        log::error!("Playlist demo failed: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

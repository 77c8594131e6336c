use log::{debug, info, warn};
use revenant::config::EngineConfig;
use revenant::graphics::GraphicsManager;
use revenant::image_decoder::ImageCrateDecoder;
use revenant::midi_driver::LoggingDriver;
use revenant::midi_parser::{SmfParser, TrackParser};
use revenant::music::Music;
use revenant::platform_manager::{create_platform, PlatformMode};
use revenant::platform_trait::Screen;
use revenant::resource::DirectoryLoader;
use revenant::scheduler::Scheduler;
use revenant::slideshow::Slideshow;
use std::env;
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    // Asking for usage is not an error
    if args.len() < 2 {
        println!("revenant - adventure engine runtime slideshow");
        println!();
        println!("Usage: {} <config.toml> [picture ...]", args[0]);
        println!("Example:");
        println!("  {} game.toml TITLE.PNG ROOM1.PNG", args[0]);
        println!();
        println!("Pictures are looked up under [resources] root. Click or press a key");
        println!("to advance; type the quit phrase or press Ctrl+C to leave.");
        println!("DISPLAY_MODE=terminal|headless overrides [display] mode.");
        return Ok(());
    }

    let config_path = Path::new(&args[1]);
    let mut config = match EngineConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: Cannot load config '{}': {}", config_path.display(), e);
            std::process::exit(1);
        }
    };

    if let Ok(mode) = env::var("DISPLAY_MODE") {
        debug!("DISPLAY_MODE overrides display mode with {}", mode);
        config.display.mode = mode;
    }

    let platform = create_platform(PlatformMode::from_name(&config.display.mode), &config.display)?;
    let format = platform.screen_format();
    let loader = DirectoryLoader::new(&config.resources.root);

    let graphics = GraphicsManager::new(
        config.cache.capacity,
        Box::new(loader.clone()),
        Box::new(ImageCrateDecoder::new(format)),
    );
    let pictures = args[2..].to_vec();
    info!("Slideshow of {} pictures", pictures.len());
    let mut slideshow = Slideshow::new(graphics, pictures);
    if let Some(track) = &config.music.track {
        slideshow = slideshow.with_music(track.clone());
    }

    let mut scheduler = Scheduler::new(platform, config.scheduler.clone());
    if config.music.enabled {
        let driver = LoggingDriver::new(config.music.timer_hz);
        match Music::new(
            Some(Box::new(driver)),
            Box::new(loader),
            Box::new(|| Box::new(SmfParser::new()) as Box<dyn TrackParser>),
            &config.music,
        ) {
            Ok(music) => scheduler = scheduler.with_sound(Box::new(music)),
            Err(e) => warn!("Music disabled: {}", e),
        }
    }

    let result = scheduler.run(&mut slideshow);

    // Restore the terminal before printing anything
    drop(scheduler);

    match result {
        Ok(reason) => {
            debug!("Exited: {:?}", reason);
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

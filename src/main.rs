use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ingame_jukebox::audio::device::list_output_devices;
use ingame_jukebox::audio::CpalBackend;
use ingame_jukebox::cli::{CliApp, Commands, DeviceAction, ParseError, QueueAction, StatusDisplay};
use ingame_jukebox::config::ConfigManager;
use ingame_jukebox::error::{AudioError, PlayerError};
use ingame_jukebox::logging;
use ingame_jukebox::models::PlaybackNotification;
use ingame_jukebox::player::{ChannelObserver, PlayerHandle};
use ingame_jukebox::source::SourceResolver;
use log::{error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Stands in for the game UI: owns the player and prints its notifications
pub struct AppController {
    player: PlayerHandle,
    config_manager: ConfigManager,
    notifications: mpsc::UnboundedReceiver<PlaybackNotification>,
    device_name: String,
    sweeper: JoinHandle<()>,
}

impl AppController {
    /// Create the player from saved configuration. Must run inside the tokio runtime.
    pub fn new() -> Result<Self, PlayerError> {
        if std::env::var("JUKEBOX_LOG_LEVEL").is_err() {
            std::env::set_var("JUKEBOX_LOG_LEVEL", "warn");
        }
        if let Err(e) = logging::init() {
            eprintln!("Warning: Failed to initialize logging: {}", e);
        }

        let config_manager = ConfigManager::new()?;
        let config = config_manager.get_config().clone();

        let backend = match CpalBackend::new(config.preferred_device.as_deref()) {
            Ok(backend) => backend,
            Err(e) if config.preferred_device.is_some() => {
                warn!("Preferred device unavailable ({}); using default output", e);
                CpalBackend::new(None)?
            }
            Err(e) => return Err(e.into()),
        };
        let device_name = backend.device_name().to_string();

        let resolver = SourceResolver::from_config(&config);
        let sweeper = resolver
            .scratch()
            .spawn_sweeper(config.sweep_interval(), config.scratch_retention());

        let (observer, notifications) = ChannelObserver::new();
        let player = PlayerHandle::spawn(Arc::new(resolver), Arc::new(backend), Arc::new(observer));
        player.set_volume(config.default_volume)?;

        info!("Jukebox ready on '{}'", device_name);

        Ok(Self {
            player,
            config_manager,
            notifications,
            device_name,
            sweeper,
        })
    }

    /// Execute a single command
    pub async fn execute_command(&mut self, command: Commands) -> Result<(), PlayerError> {
        match command {
            Commands::Play { url } => {
                self.player.play(url.as_str())?;
                println!("Loading: {}", url);
            }
            Commands::Pause => self.player.toggle_play_pause()?,
            Commands::Skip => self.player.skip()?,
            Commands::Stop => self.player.stop()?,
            Commands::Loop => {
                self.player.toggle_loop()?;
                let looping = self.player.is_looping().await?;
                println!("Loop: {}", if looping { "on" } else { "off" });
            }
            Commands::Volume { level } => {
                self.player.set_volume(level)?;
                let applied = self.player.volume().await?;
                self.config_manager.set_volume(applied)?;
                println!("OK: Volume {:.0}%", applied);
            }
            Commands::Status => {
                let status = self.player.status().await?;
                CliApp::display_status(&status);
            }
            Commands::Events { count } => {
                StatusDisplay::display_events(&self.player.recent_events(count));
            }
            Commands::Devices { action: None } => {
                let devices = list_output_devices()?;
                if devices.is_empty() {
                    println!("No audio devices found");
                } else {
                    println!("Available audio devices:");
                    for device in devices {
                        let marker = if device == self.device_name { "*" } else { " " };
                        println!("{} {}", marker, device);
                    }
                }
            }
            Commands::Devices {
                action: Some(DeviceAction::Use { name }),
            } => {
                if !list_output_devices()?.contains(&name) {
                    return Err(AudioError::DeviceNotFound { device: name }.into());
                }
                self.config_manager.set_preferred_device(Some(name.clone()))?;
                println!("OK: '{}' will be used from the next start", name);
            }
            Commands::Devices {
                action: Some(DeviceAction::Default),
            } => {
                self.config_manager.set_preferred_device(None)?;
                println!("OK: The system default output will be used from the next start");
            }
            Commands::Queue { action } => match action {
                QueueAction::Add { url } => {
                    self.player.add_to_queue(url.as_str())?;
                    let size = self.player.queue_size().await?;
                    println!("OK: Queued {} ({} in queue)", url, size);
                }
                QueueAction::List => {
                    let queue = self.player.queue().await?;
                    StatusDisplay::display_queue(&queue);
                }
                QueueAction::Clear => {
                    self.player.clear_queue()?;
                    println!("OK: Queue cleared");
                }
            },
        }
        Ok(())
    }

    /// Run interactive mode
    pub async fn run_interactive_mode(&mut self) -> Result<(), PlayerError> {
        println!("In-game Jukebox v0.1.0");
        println!("Type 'help' for available commands, 'exit' or 'quit' to quit.");
        println!();

        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let shutdown_flag_clone = shutdown_flag.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            println!("\nReceived interrupt signal. Shutting down gracefully...");
            shutdown_flag_clone.store(true, Ordering::Relaxed);
        }) {
            warn!("Could not install Ctrl-C handler: {}", e);
        }

        // Blocking stdin reads live on their own thread
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if tx.send(line.trim().to_string()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let mut interval = tokio::time::interval(std::time::Duration::from_millis(100));
        let mut awaiting_input = false;

        loop {
            if shutdown_flag.load(Ordering::Relaxed) {
                break;
            }

            if !awaiting_input {
                print!("> ");
                let _ = std::io::Write::flush(&mut std::io::stdout());
                awaiting_input = true;
            }

            tokio::select! {
                biased;

                line = rx.recv() => {
                    awaiting_input = false;
                    let line = match line {
                        Some(line) => line,
                        None => {
                            println!();
                            break;
                        }
                    };
                    if line.is_empty() {
                        continue;
                    }
                    if line == "exit" || line == "quit" {
                        println!("Goodbye!");
                        break;
                    }

                    match CliApp::parse_command(&line) {
                        Ok(command) => {
                            if let Err(e) = self.execute_command(command).await {
                                self.handle_error(&e);
                            }
                        }
                        Err(ParseError::HelpRequested) => CliApp::display_help(),
                        Err(e) => {
                            eprintln!("Error: {}", e);
                            println!("Type 'help' for available commands.");
                        }
                    }
                }
                Some(notification) = self.notifications.recv() => {
                    // Keep the HUD line off the prompt
                    if awaiting_input {
                        println!();
                        awaiting_input = false;
                    }
                    StatusDisplay::display_notification(&notification);
                }
                _ = interval.tick() => {}
            }
        }

        self.shutdown().await
    }

    /// Stop playback, persist settings and end the background tasks
    pub async fn shutdown(&mut self) -> Result<(), PlayerError> {
        println!("Shutting down...");

        if let Ok(volume) = self.player.volume().await {
            if let Err(e) = self.config_manager.set_volume(volume) {
                eprintln!("Warning: Error saving configuration: {}", e);
            }
        }
        if let Err(e) = self.player.shutdown().await {
            eprintln!("Warning: Error stopping player: {}", e);
        }
        self.sweeper.abort();

        println!("Shutdown complete.");
        Ok(())
    }

    fn handle_error(&self, error: &PlayerError) {
        log::log!(error.severity().log_level(), "Command failed: {}", error);
        CliApp::display_error(error);
    }
}

#[tokio::main]
async fn main() -> Result<(), PlayerError> {
    let cli = CliApp::parse();

    let mut app = match AppController::new() {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            StatusDisplay::display_error(&e);
            std::process::exit(1);
        }
    };

    // A command given on the command line runs first, then the session stays interactive
    if let Some(command) = cli.command {
        if let Err(e) = app.execute_command(command).await {
            app.handle_error(&e);
        }
    }

    if let Err(e) = app.run_interactive_mode().await {
        app.handle_error(&e);
        std::process::exit(1);
    }

    info!("Application shutdown complete");
    Ok(())
}

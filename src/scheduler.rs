//! Frame scheduler
//!
//! Single-threaded cooperative main loop shared by the engines. Every frame
//! drains host input, runs the script host, presents the frame, services a
//! pending "wait for player click" and checks the exit conditions. All
//! waiting is done by polling the host with short delays, never by blocking.

use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::input::{InputState, KeyGates, MouseData, PlayerCommand, QuitPhraseMatcher, Shortcut};
use crate::platform_trait::{CursorShape, Event, KeyCode, Platform};
use log::{debug, info};

/// Audio hooks the frame loop drives
pub trait SoundSystem {
    /// Per-sub-iteration tick from the busy-wait loop
    fn update(&mut self) {}

    fn play_music(&mut self, resource: &str, flags: u32) -> Result<()>;

    fn stop_music(&mut self);

    fn is_playing(&self) -> bool;
}

/// Engine-wide state the scripts and the loop share
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineFlags {
    pub allow_player_input: bool,
    pub in_menu: bool,
    pub disable_system_menu: bool,
    pub wait_for_player_click: bool,
    pub check_for_pending_data_load: bool,
    pub player_command: Option<PlayerCommand>,
    pub exit_requested: bool,
}

impl EngineFlags {
    pub fn gates(&self) -> KeyGates {
        KeyGates {
            allow_player_input: self.allow_player_input,
            in_menu: self.in_menu,
            disable_system_menu: self.disable_system_menu,
        }
    }
}

/// Why `run` returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Host quit event or a script set `exit_requested`
    ExitRequested,
    /// The hidden quit phrase was typed
    QuitPhrase,
    /// The script host reported it is finished
    EngineFinished,
}

/// Script interpreter driven once per frame
pub trait ScriptHost {
    /// Setup phase: load the boot script and initial resources
    fn boot(&mut self, _ctx: &mut FrameContext<'_>) -> Result<()> {
        Ok(())
    }

    /// A shortcut key was pressed since the last frame
    fn handle_shortcut(&mut self, ctx: &mut FrameContext<'_>, shortcut: Shortcut) -> Result<()> {
        match shortcut {
            Shortcut::Command(cmd) => ctx.flags.player_command = Some(cmd),
            other => debug!("Unhandled shortcut {:?}", other),
        }
        Ok(())
    }

    /// Run the script lists for one frame
    fn execute_frame(&mut self, ctx: &mut FrameContext<'_>) -> Result<()>;

    /// Called once after a frame that set `check_for_pending_data_load`
    fn load_pending_data(&mut self, _ctx: &mut FrameContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Engine-specific terminal condition
    fn is_finished(&self) -> bool {
        false
    }

    /// Release scripts, lists and resources acquired since `boot`
    fn teardown(&mut self) {}
}

/// Borrowed view of the scheduler handed to the script host
pub struct FrameContext<'a> {
    pub platform: &'a mut dyn Platform,
    pub input: &'a mut InputState,
    pub flags: &'a mut EngineFlags,
    pub sound: Option<&'a mut dyn SoundSystem>,
    config: &'a SchedulerConfig,
    key: Option<KeyCode>,
}

impl<'a> FrameContext<'a> {
    /// Unmapped key read at the start of this frame
    pub fn key(&self) -> Option<KeyCode> {
        self.key
    }

    pub fn mouse_data(&self) -> MouseData {
        self.input.mouse_data()
    }

    /// Drain pending host events, then busy-wait `count` sub-iterations
    ///
    /// With `count > 0` the click latches are moved into the mouse snapshot
    /// first. Each sub-iteration delays, ticks the sound system and drains
    /// again; the screen is refreshed only on every `refresh_divisor`-th
    /// sub-iteration to stay below what slow hosts can present.
    pub fn manage_events(&mut self, count: u32) -> Result<()> {
        let gates = self.flags.gates();
        while let Some(event) = self.platform.poll_event() {
            self.input.handle_event(event, gates);
            if event == Event::Quit {
                self.flags.exit_requested = true;
            }
        }

        if count > 0 {
            self.input.snapshot_clicks();
        }

        let divisor = self.config.refresh_divisor.max(1);
        for i in 0..count {
            if i % divisor == divisor - 1 {
                self.platform.update_screen()?;
            }
            self.platform.delay_millis(self.config.frame_delay_ms);
            if let Some(sound) = self.sound.as_deref_mut() {
                sound.update();
            }
            self.manage_events(0)?;
        }
        Ok(())
    }

    /// Poll until the snapshot shows `done`, or until exit is requested
    fn poll_until(&mut self, mut done: impl FnMut(&mut Self, MouseData) -> bool) -> Result<bool> {
        loop {
            if self.flags.exit_requested {
                return Ok(false);
            }
            self.manage_events(1)?;
            let mouse = self.mouse_data();
            if done(self, mouse) {
                return Ok(true);
            }
        }
    }

    /// Wait for a clean press/release cycle (or a key) from the player
    ///
    /// Phase one waits for the button to be up, phase two for a press or a
    /// key, phase three for the release. A quit ends the wait at once.
    pub fn wait_for_player_click(&mut self) -> Result<()> {
        debug!("Waiting for player click");
        let completed = self.poll_until(|_, mouse| mouse.buttons == 0)?
            && self.poll_until(|ctx, mouse| mouse.buttons != 0 || ctx.input.take_key().is_some())?
            && self.poll_until(|_, mouse| mouse.buttons == 0)?;
        if !completed {
            debug!("Wait for player click interrupted by exit request");
        }
        self.flags.wait_for_player_click = false;
        Ok(())
    }
}

/// Drives a `ScriptHost` on a `Platform` until an exit condition
pub struct Scheduler<P: Platform> {
    platform: P,
    input: InputState,
    flags: EngineFlags,
    quit_matcher: QuitPhraseMatcher,
    sound: Option<Box<dyn SoundSystem>>,
    config: SchedulerConfig,
    frame_count: u64,
}

/// Build a `FrameContext` from disjoint scheduler fields
macro_rules! frame_context {
    ($s:ident, $key:expr) => {
        FrameContext {
            platform: &mut $s.platform,
            input: &mut $s.input,
            flags: &mut $s.flags,
            sound: $s.sound.as_mut().map(|s| s.as_mut() as &mut dyn SoundSystem),
            config: &$s.config,
            key: $key,
        }
    };
}

impl<P: Platform> Scheduler<P> {
    pub fn new(platform: P, config: SchedulerConfig) -> Self {
        let quit_matcher = QuitPhraseMatcher::new(&config.quit_phrase);
        Self {
            platform,
            input: InputState::new(),
            flags: EngineFlags::default(),
            quit_matcher,
            sound: None,
            config,
            frame_count: 0,
        }
    }

    pub fn with_sound(mut self, sound: Box<dyn SoundSystem>) -> Self {
        self.sound = Some(sound);
        self
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn flags(&self) -> &EngineFlags {
        &self.flags
    }

    pub fn flags_mut(&mut self) -> &mut EngineFlags {
        &mut self.flags
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn sound(&self) -> Option<&dyn SoundSystem> {
        self.sound.as_deref()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn into_platform(self) -> P {
        self.platform
    }

    /// Drain events and busy-wait outside of a frame
    pub fn manage_events(&mut self, count: u32) -> Result<()> {
        frame_context!(self, None).manage_events(count)
    }

    /// Run frames until an exit condition, then tear everything down
    ///
    /// Teardown happens whatever ended the loop, including an error from a
    /// frame; that error is returned afterwards.
    pub fn run<H: ScriptHost>(&mut self, host: &mut H) -> Result<ExitReason> {
        info!("Starting frame loop");
        let outcome = self.setup(host).and_then(|_| loop {
            if let Some(reason) = self.run_frame(host)? {
                break Ok(reason);
            }
        });
        self.teardown(host);
        match &outcome {
            Ok(reason) => info!("Frame loop ended after {} frames: {:?}", self.frame_count, reason),
            Err(e) => info!("Frame loop aborted after {} frames: {}", self.frame_count, e),
        }
        outcome
    }

    fn setup<H: ScriptHost>(&mut self, host: &mut H) -> Result<()> {
        if self.config.pre_loaded {
            debug!("Engine pre-loaded, skipping setup");
            return Ok(());
        }
        self.input.reset();
        self.flags = EngineFlags {
            exit_requested: self.flags.exit_requested,
            ..EngineFlags::default()
        };
        self.quit_matcher.reset();
        if let Some(sound) = self.sound.as_mut() {
            sound.stop_music();
        }
        host.boot(&mut frame_context!(self, None))
    }

    fn teardown<H: ScriptHost>(&mut self, host: &mut H) {
        debug!("Frame loop teardown");
        self.platform.show_cursor(false);
        if let Some(sound) = self.sound.as_mut() {
            sound.stop_music();
        }
        self.input.reset();
        self.flags.wait_for_player_click = false;
        self.flags.check_for_pending_data_load = false;
        self.flags.player_command = None;
        host.teardown();
    }

    /// Run one frame; `Some` once an exit condition holds
    pub fn run_frame<H: ScriptHost>(&mut self, host: &mut H) -> Result<Option<ExitReason>> {
        self.frame_count += 1;
        let repeat = self.config.frame_repeat;
        frame_context!(self, None).manage_events(repeat)?;

        let key = self.input.take_key();
        let mut ctx = frame_context!(self, key);

        for shortcut in ctx.input.take_shortcuts() {
            host.handle_shortcut(&mut ctx, shortcut)?;
        }

        host.execute_frame(&mut ctx)?;

        let cursor = if ctx.flags.player_command.is_none() {
            CursorShape::Normal
        } else {
            CursorShape::Cross
        };
        ctx.platform.set_cursor(cursor);
        ctx.platform.update_screen()?;

        if ctx.flags.wait_for_player_click {
            ctx.wait_for_player_click()?;
        }

        if ctx.flags.check_for_pending_data_load {
            host.load_pending_data(&mut ctx)?;
            ctx.flags.check_for_pending_data_load = false;
        }

        let mut quit_phrase = false;
        if let Some(key) = key {
            if self.quit_matcher.feed(key) {
                info!("Quit phrase entered");
                quit_phrase = true;
            }
        }

        Ok(if self.flags.exit_requested || self.input.quit_requested() {
            Some(ExitReason::ExitRequested)
        } else if quit_phrase {
            Some(ExitReason::QuitPhrase)
        } else if host.is_finished() {
            Some(ExitReason::EngineFinished)
        } else {
            None
        })
    }
}

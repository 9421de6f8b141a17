//! Front panel LED effects
//!
//! Effects advance once per millisecond. The panel only computes the colour
//! of each group; pushing it to the strip is the firmware's job.

use crema_core::traits::{Effect, Led, LedCommand};

/// Colour of one LED group
pub type Rgb = [u8; 3];

/// Units of `cycles` for a steady effect, ms
const STEADY_CYCLE_MS: u16 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct Channel {
    command: LedCommand,
    previous: LedCommand,
    level: u8,
    elapsed_ms: u16,
    lit: bool,
    rising: bool,
    cycles_done: u16,
}

impl Channel {
    fn set(&mut self, command: LedCommand) {
        if command.restore {
            self.previous = self.command;
        }
        self.start(command);
    }

    fn start(&mut self, command: LedCommand) {
        self.command = command;
        self.elapsed_ms = 0;
        self.cycles_done = 0;
        self.lit = true;
        self.rising = true;
        self.level = match command.effect {
            Effect::On | Effect::Blink | Effect::FadeOut => command.intensity,
            Effect::Off | Effect::FadeIn | Effect::Breathe => 0,
        };
    }

    fn tick(&mut self) {
        self.elapsed_ms = self.elapsed_ms.saturating_add(1);
        let cmd = self.command;
        match cmd.effect {
            Effect::Off => self.level = 0,
            Effect::On => {
                if self.elapsed_ms >= STEADY_CYCLE_MS {
                    self.elapsed_ms = 0;
                    self.complete_cycle();
                }
            }
            Effect::Blink => {
                let limit = if self.lit { cmd.on_ms } else { cmd.off_ms };
                if self.elapsed_ms >= limit {
                    self.elapsed_ms = 0;
                    self.lit = !self.lit;
                    self.level = if self.lit { cmd.intensity } else { 0 };
                    if self.lit {
                        self.complete_cycle();
                    }
                }
            }
            Effect::FadeIn => {
                if self.step_due() && self.level < cmd.intensity {
                    self.level += 1;
                }
            }
            Effect::FadeOut => {
                if self.step_due() && self.level > 0 {
                    self.level -= 1;
                }
            }
            Effect::Breathe => {
                if self.step_due() {
                    if self.rising {
                        self.level = self.level.saturating_add(1).min(cmd.intensity);
                        self.rising = self.level < cmd.intensity;
                    } else {
                        self.level = self.level.saturating_sub(1);
                        if self.level == 0 {
                            self.rising = true;
                            self.complete_cycle();
                        }
                    }
                }
            }
        }
    }

    fn step_due(&mut self) -> bool {
        if self.elapsed_ms >= u16::from(self.command.step_ms.max(1)) {
            self.elapsed_ms = 0;
            true
        } else {
            false
        }
    }

    fn complete_cycle(&mut self) {
        self.cycles_done = self.cycles_done.saturating_add(1);
        if self.command.cycles == 0 || self.cycles_done < self.command.cycles {
            return;
        }
        if self.command.restore {
            let previous = self.previous;
            self.start(previous);
        } else {
            self.start(LedCommand::off());
        }
    }

    fn colour(&self) -> Rgb {
        let scale = |c: u8| (u16::from(c) * u16::from(self.level) / 255) as u8;
        let [r, g, b] = self.command.rgb;
        [scale(r), scale(g), scale(b)]
    }
}

/// The three LED groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LedPanel {
    channels: [Channel; 3],
}

impl LedPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, led: Led, command: LedCommand) {
        self.channels[led as usize].set(command);
    }

    pub fn command(&self, led: Led) -> &LedCommand {
        &self.channels[led as usize].command
    }

    /// Advance every effect by 1 ms
    pub fn tick(&mut self) {
        for channel in &mut self.channels {
            channel.tick();
        }
    }

    /// Brightness of a group right now
    pub fn level(&self, led: Led) -> u8 {
        self.channels[led as usize].level
    }

    /// Colours in [`Led::ALL`] order
    pub fn frame(&self) -> [Rgb; 3] {
        [
            self.channels[0].colour(),
            self.channels[1].colour(),
            self.channels[2].colour(),
        ]
    }
}

//! # Console Commands
//!
//! Decodes one line of console input into a [`Command`], runs it against a
//! [`Feeder`] and hands back a [`Reply`] whose `Display` form is what the
//! firmware prints.
//!
//! | input                    | effect                                   |
//! |--------------------------|------------------------------------------|
//! | `time`                   | show the clock                           |
//! | `time H M`               | set the clock                            |
//! | `feed E D P H M`         | slot E: D seconds at P % at H:M          |
//! | `feed E delete`          | delete the event in slot E               |
//! | `schedule`               | list events and the armed alarm          |
//! | `water V`                | target water volume in mL                |
//! | `fill auto` / `motion`   | pump fill mode                           |
//! | `alert on` / `off`       | low-water alert                          |
//! | `setting`                | show settings                            |
//!
//! Fields may be separated by spaces, `:` or `,`, so `feed 0 10 99 5:10`
//! works as typed.

use core::fmt;

use heapless::Vec;

use crate::alarm::AlarmStatus;
use crate::clock::RtcRegisters;
use crate::dispatch::{Actuator, OneShotTimer};
use crate::error::FeederError;
use crate::event::{AlertMode, DeviceConfig, FillMode, TimeOfDay};
use crate::feeder::Feeder;
use crate::store::WordStore;
use crate::table::EventList;

const MAX_FIELDS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    ShowTime,
    SetTime { hour: u8, minute: u8 },
    Feed {
        slot: usize,
        duration: u16,
        intensity: u8,
        hour: u8,
        minute: u8,
    },
    Delete { slot: usize },
    Schedule,
    Water { volume: u16 },
    Fill(FillMode),
    Alert(AlertMode),
    Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// Nothing recognisable was typed.
    Unknown,
    /// A known verb with wrong arguments; carries the usage line.
    Usage(&'static str),
    Feeder(FeederError),
}

impl From<FeederError> for CommandError {
    fn from(e: FeederError) -> Self {
        CommandError::Feeder(e)
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Unknown => f.write_str("Invalid command. Please try again."),
            CommandError::Usage(usage) => write!(f, "Usage: {}", usage),
            CommandError::Feeder(e) => write!(f, "Error: {}", e),
        }
    }
}

const USAGE_TIME: &str = "time [H M]";
const USAGE_FEED: &str = "feed E D P H:M | feed E delete";
const USAGE_WATER: &str = "water V";
const USAGE_FILL: &str = "fill auto|motion";
const USAGE_ALERT: &str = "alert on|off";

fn number<N: TryFrom<u32>>(field: &str, usage: &'static str) -> Result<N, CommandError> {
    field
        .parse::<u32>()
        .ok()
        .and_then(|n| N::try_from(n).ok())
        .ok_or(CommandError::Usage(usage))
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut fields: Vec<&str, MAX_FIELDS> = Vec::new();
        for field in line
            .split(|c: char| c.is_ascii_whitespace() || c == ':' || c == ',')
            .filter(|s| !s.is_empty())
        {
            fields.push(field).map_err(|_| CommandError::Unknown)?;
        }

        let (verb, args) = match fields.split_first() {
            Some((verb, args)) => (*verb, args),
            None => return Err(CommandError::Unknown),
        };
        let is = |word: &str| verb.eq_ignore_ascii_case(word);

        if is("time") {
            match args {
                [] => Ok(Command::ShowTime),
                [h, m] => Ok(Command::SetTime {
                    hour: number(h, USAGE_TIME)?,
                    minute: number(m, USAGE_TIME)?,
                }),
                _ => Err(CommandError::Usage(USAGE_TIME)),
            }
        } else if is("feed") {
            match args {
                [e, d, p, h, m] => Ok(Command::Feed {
                    slot: number(e, USAGE_FEED)?,
                    duration: number(d, USAGE_FEED)?,
                    intensity: number(p, USAGE_FEED)?,
                    hour: number(h, USAGE_FEED)?,
                    minute: number(m, USAGE_FEED)?,
                }),
                [e, word] if word.eq_ignore_ascii_case("delete") => Ok(Command::Delete {
                    slot: number(e, USAGE_FEED)?,
                }),
                _ => Err(CommandError::Usage(USAGE_FEED)),
            }
        } else if is("schedule") && args.is_empty() {
            Ok(Command::Schedule)
        } else if is("water") {
            match args {
                [v] => Ok(Command::Water {
                    volume: number(v, USAGE_WATER)?,
                }),
                _ => Err(CommandError::Usage(USAGE_WATER)),
            }
        } else if is("fill") {
            match args {
                [m] if m.eq_ignore_ascii_case("auto") => Ok(Command::Fill(FillMode::Auto)),
                [m] if m.eq_ignore_ascii_case("motion") => Ok(Command::Fill(FillMode::Motion)),
                _ => Err(CommandError::Usage(USAGE_FILL)),
            }
        } else if is("alert") {
            match args {
                [m] if m.eq_ignore_ascii_case("on") => Ok(Command::Alert(AlertMode::On)),
                [m] if m.eq_ignore_ascii_case("off") => Ok(Command::Alert(AlertMode::Off)),
                _ => Err(CommandError::Usage(USAGE_ALERT)),
            }
        } else if is("setting") && args.is_empty() {
            Ok(Command::Settings)
        } else {
            Err(CommandError::Unknown)
        }
    }

    /// Run the command against `feeder`.
    pub fn execute<S, R, A, T>(
        self,
        feeder: &mut Feeder<'_, S, R, A, T>,
    ) -> Result<Reply, CommandError>
    where
        S: WordStore,
        R: RtcRegisters,
        A: Actuator,
        T: OneShotTimer,
    {
        let reply = match self {
            Command::ShowTime => Reply::Time(feeder.current_time()),
            Command::SetTime { hour, minute } => Reply::ClockSet(feeder.set_time(hour, minute)?),
            Command::Feed {
                slot,
                duration,
                intensity,
                hour,
                minute,
            } => Reply::Scheduled(
                feeder.create_or_replace_event(slot, duration, intensity, hour, minute)?,
            ),
            Command::Delete { slot } => Reply::Deleted(feeder.delete_event(slot)?),
            Command::Schedule => {
                feeder.resort()?;
                let events = feeder.list_events()?;
                let alarm = feeder.rearm_alarm()?;
                Reply::Schedule { events, alarm }
            }
            Command::Water { volume } => Reply::Settings(feeder.set_water_volume(volume)?),
            Command::Fill(mode) => Reply::Settings(feeder.set_fill_mode(mode)?),
            Command::Alert(mode) => Reply::Settings(feeder.set_alert_mode(mode)?),
            Command::Settings => Reply::Settings(feeder.device_config()?),
        };
        Ok(reply)
    }
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Time(TimeOfDay),
    ClockSet(AlarmStatus),
    Scheduled(AlarmStatus),
    Deleted(AlarmStatus),
    Schedule { events: EventList, alarm: AlarmStatus },
    Settings(DeviceConfig),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Time(now) => writeln!(f, "Real Time is {}", now),
            Reply::ClockSet(alarm) => {
                writeln!(f, "Clock set.")?;
                writeln!(f, "{}", alarm)
            }
            Reply::Scheduled(alarm) => {
                writeln!(f, "The event has been scheduled.")?;
                writeln!(f, "{}", alarm)
            }
            Reply::Deleted(alarm) => {
                writeln!(f, "Event has been deleted.")?;
                writeln!(f, "{}", alarm)
            }
            Reply::Schedule { events, alarm } => {
                if events.is_empty() {
                    writeln!(f, "No events scheduled.")?;
                } else {
                    writeln!(f, "Event\tDuration\tPWM\tHH:MM")?;
                    for event in events {
                        let time = event.display_time();
                        writeln!(
                            f,
                            "  {}\t  {:>5}\t\t{:3}\t{}",
                            event.index.unwrap_or(0),
                            event.duration.unwrap_or(0),
                            event.intensity.unwrap_or(0),
                            time.unwrap_or(TimeOfDay::from_seconds(0, 24)),
                        )?;
                    }
                }
                writeln!(f, "{}", alarm)
            }
            Reply::Settings(cfg) => {
                let fill = match cfg.fill_mode {
                    FillMode::Off => "OFF",
                    FillMode::Auto => "AUTO",
                    FillMode::Motion => "MOTION",
                };
                let alert = match cfg.alert_mode {
                    AlertMode::Off => "OFF",
                    AlertMode::On => "ON",
                };
                writeln!(f, "Volume = {} ml", cfg.water_volume)?;
                writeln!(f, "Fill Mode is {}", fill)?;
                writeln!(f, "Alert mode is {}", alert)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

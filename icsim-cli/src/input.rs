//! Operator input for the control panel
//!
//! Commands arrive as whitespace-separated tokens on stdin, one or more per
//! line. A reader thread applies them to the shared [`OperatorIntent`]; the
//! control loop only ever reads the intent.
//!
//! | token | effect                        |
//! |-------|-------------------------------|
//! | `w`   | accelerate (held)             |
//! | `s`   | release the throttle          |
//! | `h`   | hold current speed            |
//! | `a`   | indicate left                 |
//! | `d`   | indicate right                |
//! | `x`   | indicators off                |
//! | `u<n>`| unlock door n (1-4)           |
//! | `l<n>`| lock door n (1-4)             |
//! | `U`   | unlock all doors              |
//! | `L`   | lock all doors                |
//! | `q`   | quit                          |

use icsim_core::{DoorState, OperatorIntent, Throttle, TurnIntent};
use std::io::{self, BufRead};
use std::str::FromStr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// One operator command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputCommand {
    Accelerate,
    Release,
    Hold,
    TurnLeft,
    TurnRight,
    Straight,
    Unlock(usize),
    Lock(usize),
    UnlockAll,
    LockAll,
    Quit,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseCommandError {
    #[error("Unknown command: '{0}'")]
    Unknown(String),

    #[error("Door number must be 1-{max}, got '{given}'")]
    BadDoor { given: String, max: usize },
}

impl FromStr for InputCommand {
    type Err = ParseCommandError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let command = match token {
            "w" => InputCommand::Accelerate,
            "s" => InputCommand::Release,
            "h" => InputCommand::Hold,
            "a" => InputCommand::TurnLeft,
            "d" => InputCommand::TurnRight,
            "x" => InputCommand::Straight,
            "U" => InputCommand::UnlockAll,
            "L" => InputCommand::LockAll,
            "q" => InputCommand::Quit,
            _ => {
                if let Some(number) = token.strip_prefix('u') {
                    InputCommand::Unlock(parse_door(number)?)
                } else if let Some(number) = token.strip_prefix('l') {
                    InputCommand::Lock(parse_door(number)?)
                } else {
                    return Err(ParseCommandError::Unknown(token.to_string()));
                }
            }
        };
        Ok(command)
    }
}

/// Door number (1-based, as printed on the dashboard) to index
fn parse_door(text: &str) -> Result<usize, ParseCommandError> {
    let max = icsim_core::types::DOOR_COUNT;
    match text.parse::<usize>() {
        Ok(number) if (1..=max).contains(&number) => Ok(number - 1),
        _ => Err(ParseCommandError::BadDoor {
            given: text.to_string(),
            max,
        }),
    }
}

impl InputCommand {
    /// Apply the command to the shared intent
    pub fn apply(self, intent: &OperatorIntent) {
        match self {
            InputCommand::Accelerate => intent.set_throttle(Throttle::Accelerate),
            InputCommand::Release => intent.set_throttle(Throttle::Release),
            InputCommand::Hold => intent.set_throttle(Throttle::Hold),
            InputCommand::TurnLeft => intent.set_turn(TurnIntent::Left),
            InputCommand::TurnRight => intent.set_turn(TurnIntent::Right),
            InputCommand::Straight => intent.set_turn(TurnIntent::Straight),
            InputCommand::Unlock(index) => intent.unlock_door(index),
            InputCommand::Lock(index) => intent.lock_door(index),
            InputCommand::UnlockAll => intent.set_doors(DoorState::all_unlocked()),
            InputCommand::LockAll => intent.set_doors(DoorState::all_locked()),
            InputCommand::Quit => intent.request_stop(),
        }
    }
}

/// Read commands until `q`, end of input, or a read error
///
/// Bad tokens are reported and skipped. Always leaves the intent stopped.
pub fn run<R: BufRead>(intent: &OperatorIntent, reader: R) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::error!("Failed to read input: {}", e);
                break;
            }
        };

        for token in line.split_whitespace() {
            match token.parse::<InputCommand>() {
                Ok(command) => {
                    log::debug!("Input: {:?}", command);
                    command.apply(intent);
                }
                Err(e) => log::warn!("{}", e),
            }
        }

        if !intent.is_running() {
            return;
        }
    }

    intent.request_stop();
}

/// Spawn the stdin reader thread
pub fn spawn_stdin_reader(intent: Arc<OperatorIntent>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("input".to_string())
        .spawn(move || run(&intent, io::stdin().lock()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!("w".parse(), Ok(InputCommand::Accelerate));
        assert_eq!("x".parse(), Ok(InputCommand::Straight));
        assert_eq!("u3".parse(), Ok(InputCommand::Unlock(2)));
        assert_eq!("l1".parse(), Ok(InputCommand::Lock(0)));
        assert_eq!("U".parse(), Ok(InputCommand::UnlockAll));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "z".parse::<InputCommand>(),
            Err(ParseCommandError::Unknown("z".to_string()))
        );
        assert!(matches!(
            "u5".parse::<InputCommand>(),
            Err(ParseCommandError::BadDoor { max: 4, .. })
        ));
        assert!("l0".parse::<InputCommand>().is_err());
        assert!("l".parse::<InputCommand>().is_err());
    }

    #[test]
    fn test_run_applies_commands_in_order() {
        let intent = OperatorIntent::new();
        run(&intent, "w d\nu2 u4 bogus\n".as_bytes());

        assert_eq!(intent.throttle(), Throttle::Accelerate);
        assert_eq!(intent.turn(), TurnIntent::Right);
        assert_eq!(intent.doors().mask(), 0x05);
        // End of input stops the panel
        assert!(!intent.is_running());
    }

    #[test]
    fn test_quit_stops_reading() {
        let intent = OperatorIntent::new();
        run(&intent, "U\nq\nL\n".as_bytes());

        assert!(!intent.is_running());
        assert_eq!(intent.doors(), DoorState::all_unlocked());
    }
}

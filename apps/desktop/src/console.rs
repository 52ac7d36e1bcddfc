//! Line-oriented operator input mapped onto the control loop.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use client_core::{
    AxisTracker, ControlHandle, JoystickGeometry, JoystickTracker, OperatorSettings, Point,
};
use shared::{
    domain::{ActionButton, ActionToken, DriveButton, Endpoint},
    protocol::Command,
};

pub const HELP: &str = "\
commands:
  toggle | connect | disconnect     open or close the vehicle connection
  move X Y                          drag the drive stick to X Y (stick radius 1)
  rotate X                          drag the rotation stick to X
  center                            release both sticks
  action TOKEN                      send one action (e.g. PICK, DROP)
  button LABEL                      press a pad button (U P S X D G L M N)
  hold BUTTON MILLIS                hold a drive button
                                    (forward back left right halt rotate_left rotate_right)
  save HOST PORT FL FR BR BL        store endpoint and motor coefficients
  status | log | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Toggle,
    Move { x: f32, y: f32 },
    Rotate { x: f32 },
    Center,
    Action(ActionToken),
    Hold { button: DriveButton, duration: Duration },
    Save(OperatorSettings),
    Status,
    Log,
    Help,
    Quit,
}

/// Blank lines parse to `None`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("toggle" | "connect" | "disconnect", []) => ConsoleCommand::Toggle,
        ("move", [x, y]) => ConsoleCommand::Move {
            x: parse_float(x)?,
            y: parse_float(y)?,
        },
        ("rotate", [x]) => ConsoleCommand::Rotate { x: parse_float(x)? },
        ("center", []) => ConsoleCommand::Center,
        ("action", [token]) => ConsoleCommand::Action(ActionToken::new(*token)),
        ("button", [label]) => {
            let button = ActionButton::from_label(label)
                .ok_or_else(|| anyhow!("unknown pad button `{label}`"))?;
            ConsoleCommand::Action(button.token())
        }
        ("hold", [button, millis]) => {
            let button = DriveButton::from_name(button)
                .ok_or_else(|| anyhow!("unknown button `{button}`"))?;
            let millis: u64 = millis
                .parse()
                .with_context(|| format!("`{millis}` is not a duration in milliseconds"))?;
            ConsoleCommand::Hold {
                button,
                duration: Duration::from_millis(millis),
            }
        }
        ("save", [host, port, fl, fr, br, bl]) => {
            let endpoint = Endpoint::new(*host, *port);
            let settings = OperatorSettings::parse(endpoint, [*fl, *fr, *br, *bl])
                .context("invalid motor coefficient")?;
            ConsoleCommand::Save(settings)
        }
        ("status", []) => ConsoleCommand::Status,
        ("log", []) => ConsoleCommand::Log,
        ("help" | "?", []) => ConsoleCommand::Help,
        ("quit" | "exit", []) => ConsoleCommand::Quit,
        (other, _) => bail!("unrecognised command `{other}` (try `help`)"),
    };
    Ok(Some(command))
}

fn parse_float(raw: &str) -> Result<f32> {
    raw.parse::<f32>()
        .with_context(|| format!("`{raw}` is not a number"))
}

/// Stick state for one console session.
pub struct Console {
    control: ControlHandle,
    drive: JoystickTracker,
    rotation: AxisTracker,
}

pub enum Flow {
    Continue,
    Quit,
}

impl Console {
    pub fn new(control: ControlHandle) -> Self {
        let stick = JoystickGeometry::circular(Point::new(0.0, 0.0), 1.0);
        Self {
            control,
            drive: JoystickTracker::new(stick),
            rotation: AxisTracker::new(stick),
        }
    }

    pub async fn execute(&mut self, command: ConsoleCommand) -> Result<Flow> {
        match command {
            ConsoleCommand::Toggle => {
                let previous = self.control.toggle().await?;
                println!("was {previous}");
            }
            ConsoleCommand::Move { x, y } => {
                let command = self.drive.drag(Point::new(x, y));
                self.control.issue(command)?;
            }
            ConsoleCommand::Rotate { x } => {
                let command = self.rotation.drag(x);
                self.control.issue(command)?;
            }
            ConsoleCommand::Center => {
                for command in self.release_sticks() {
                    self.control.issue(command)?;
                }
            }
            ConsoleCommand::Action(token) => self.control.action(token)?,
            ConsoleCommand::Hold { button, duration } => {
                let session = self.control.dispatcher(button).press();
                tokio::time::sleep(duration).await;
                session.release().await;
            }
            ConsoleCommand::Save(settings) => self.control.save_settings(settings)?,
            ConsoleCommand::Status => {
                let snapshot = self.control.snapshot().await?;
                println!(
                    "{} {} [{}]",
                    snapshot.state, snapshot.endpoint, snapshot.coefficients
                );
            }
            ConsoleCommand::Log => {
                for line in self.control.snapshot().await?.log {
                    println!("  {line}");
                }
            }
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn release_sticks(&mut self) -> Vec<Command> {
        self.drive
            .release()
            .into_iter()
            .chain(self.rotation.release())
            .collect()
    }
}

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use log::{debug, info};

use markrobot::mark_core::{Board, BoardConfig, PinId, PinMode, PinValue, PollerConfig};
use markrobot::{find_serial_candidates, MarkRobot, Motor, SerialConfig, SerialTransport};

/// Talk to a mark board over a serial port
#[derive(Parser, Debug)]
#[command(name = "markctl", version, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Baud rate of the serial link
    #[arg(long, default_value_t = markrobot::firmata_proto::DEFAULT_BAUDRATE)]
    baud: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial devices that may be boards
    List,

    /// Print the firmware name and version
    Firmware {
        #[arg(short, long)]
        port: String,
    },

    /// Sample an input pin
    #[command(group(ArgGroup::new("pin").required(true).args(["analog", "digital"])))]
    Read {
        #[arg(short, long)]
        port: String,
        /// Analog channel
        #[arg(long)]
        analog: Option<u8>,
        /// Digital pin
        #[arg(long)]
        digital: Option<u8>,
    },

    /// Drive a digital output
    #[command(group(ArgGroup::new("level").required(true).args(["high", "low"])))]
    Write {
        #[arg(short, long)]
        port: String,
        #[arg(long)]
        digital: u8,
        #[arg(long)]
        high: bool,
        #[arg(long)]
        low: bool,
    },

    /// Run a motor at POWER percent (-100 to 100)
    Motor {
        #[arg(short, long)]
        port: String,
        #[arg(value_enum)]
        motor: MotorArg,
        #[arg(allow_hyphen_values = true)]
        power: i32,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum MotorArg {
    A,
    B,
}

impl From<MotorArg> for Motor {
    fn from(arg: MotorArg) -> Self {
        match arg {
            MotorArg::A => Motor::A,
            MotorArg::B => Motor::B,
        }
    }
}

fn open(port: &str, baud: u32) -> markrobot::Result<Board> {
    let config = SerialConfig {
        baud_rate: baud,
        ..SerialConfig::default()
    };
    let transport = SerialTransport::open(port, &config)?;
    let board = Board::connect(transport, BoardConfig::default())?;
    board.start_polling(PollerConfig::default())?;
    Ok(board)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();
    debug!("{args:?}");

    match args.command {
        Command::List => {
            let found = find_serial_candidates();
            if found.is_empty() {
                info!("no serial devices found");
            }
            for (n, descriptor) in found.iter().enumerate() {
                println!("{}: {}", n + 1, descriptor.display_name());
            }
        }
        Command::Firmware { port } => {
            let board = open(&port, args.baud)?;
            match board.query_firmware()?.fresh_value() {
                Some(fw) => println!("{} {}.{}", fw.name, fw.major, fw.minor),
                None => println!("no firmware reply"),
            }
            board.disconnect()?;
        }
        Command::Read {
            port,
            analog,
            digital,
        } => {
            let board = open(&port, args.baud)?;
            let id = match (analog, digital) {
                (Some(channel), _) => PinId::Analog(channel),
                (None, Some(pin)) => {
                    board.set_mode(PinId::Digital(pin), PinMode::Input)?;
                    PinId::Digital(pin)
                }
                (None, None) => return Err("one of --analog or --digital is required".into()),
            };
            let reading = board.sample(id)?;
            match (reading.value, reading.fresh) {
                (Some(PinValue::Analog(level)), fresh) => println!("{level:.4}{}", stale_mark(fresh)),
                (Some(PinValue::Digital(level)), fresh) => {
                    println!("{}{}", u8::from(level), stale_mark(fresh))
                }
                (Some(PinValue::Degrees(angle)), fresh) => println!("{angle}{}", stale_mark(fresh)),
                (None, _) => println!("no reading"),
            }
            board.disconnect()?;
        }
        Command::Write {
            port,
            digital,
            high,
            low: _,
        } => {
            let board = open(&port, args.baud)?;
            let id = PinId::Digital(digital);
            if board.mode(id)? != PinMode::Output {
                board.set_mode(id, PinMode::Output)?;
            }
            board.write(id, PinValue::Digital(high))?;
            board.disconnect()?;
        }
        Command::Motor { port, motor, power } => {
            let robot = MarkRobot::new(port.clone(), open(&port, args.baud)?);
            robot.turn_motor(motor.into(), power)?;
            robot.disconnect()?;
        }
    }
    Ok(())
}

fn stale_mark(fresh: bool) -> &'static str {
    if fresh {
        ""
    } else {
        " (stale)"
    }
}

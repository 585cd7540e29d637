//! Line commands accepted by the CLI shell.

use std::path::PathBuf;

use foundation::GeoCoord;
use foundation::math::Vec2;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Refresh,
    /// Move the camera above a coordinate.
    Look { target: GeoCoord, altitude_m: f64 },
    /// Primary pick at a pixel.
    Click(Vec2),
    /// Secondary pick at a pixel.
    Place(Vec2),
    Locate(String),
    Upload(PathBuf),
    Close,
    Clear,
    Markers,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  refresh                  reload images from the service
  look <lat> <lon> <alt_m> move the camera
  click <x> <y>            select the marker under a pixel
  place <x> <y>            set the upload location under a pixel
  locate <address>         geocode an address and set the upload location
  upload <path>            upload a file at the pending location
  close                    close the selected image
  clear                    remove all images from the globe
  markers                  list visible markers
  help | quit";

fn parse_f64(token: Option<&str>, what: &str) -> Result<f64, String> {
    token
        .ok_or_else(|| format!("missing {what}"))?
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("invalid {what}"))
}

fn parse_pixel<'a>(mut args: impl Iterator<Item = &'a str>) -> Result<Vec2, String> {
    let x = parse_f64(args.next(), "x")?;
    let y = parse_f64(args.next(), "y")?;
    Ok(Vec2::new(x, y))
}

pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let mut args = rest.split_whitespace();

    match verb {
        "refresh" => Ok(Command::Refresh),
        "look" => {
            let lat = parse_f64(args.next(), "latitude")?;
            let lon = parse_f64(args.next(), "longitude")?;
            let altitude_m = parse_f64(args.next(), "altitude")?;
            let target = GeoCoord::new(lat, lon).map_err(|e| e.to_string())?;
            Ok(Command::Look { target, altitude_m })
        }
        "click" => parse_pixel(args).map(Command::Click),
        "place" => parse_pixel(args).map(Command::Place),
        "locate" if !rest.is_empty() => Ok(Command::Locate(rest.to_string())),
        "locate" => Err("missing address".to_string()),
        "upload" if !rest.is_empty() => Ok(Command::Upload(PathBuf::from(rest))),
        "upload" => Err("missing file path".to_string()),
        "close" => Ok(Command::Close),
        "clear" => Ok(Command::Clear),
        "markers" => Ok(Command::Markers),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        "" => Err("empty command".to_string()),
        other => Err(format!("unknown command {other:?}")),
    }
}

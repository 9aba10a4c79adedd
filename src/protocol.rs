//! # Wire Protocol Module
//!
//! Line framing for the joystick device.
//!
//! The device speaks newline-terminated ASCII/UTF-8 text in both directions:
//! - Outbound: single-verb command tokens (`cal`, `next`, `viz`, ...)
//! - Inbound: free-form status lines, among which this module recognizes the
//!   firmware version report and the raw-sample report.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Line terminator appended to every outbound command
pub const LINE_TERMINATOR: &str = "\n";

/// Marker token the device prints in front of its version triple
pub const VERSION_MARKER: &str = "FW_VERSION";

/// Marker token at the start of a raw-sample report
pub const RAW_SAMPLE_MARKER: &str = "Raw:";

/// Outbound command verbs understood by the firmware
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Begin the on-device calibration sequence
    Calibrate,
    /// Confirm the current calibration step
    Next,
    /// Switch the device into visualizer output mode
    Visualize,
    /// Switch the device into normal run mode
    Run,
    /// Request the firmware version report
    Version,
    /// Toggle raw-sample debug output
    Debug,
    /// Set the on-device deadzone fraction
    SetDeadzone(f32),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Calibrate => write!(f, "cal"),
            Command::Next => write!(f, "next"),
            Command::Visualize => write!(f, "viz"),
            Command::Run => write!(f, "run"),
            Command::Version => write!(f, "version"),
            Command::Debug => write!(f, "debug"),
            Command::SetDeadzone(dz) => write!(f, "set_deadzone {}", dz),
        }
    }
}

impl Command {
    /// Full wire frame for this command, terminator included
    #[must_use]
    pub fn to_frame(&self) -> String {
        format!("{}{}", self, LINE_TERMINATOR)
    }
}

/// Firmware version triple as reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FirmwareVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Tolerates an optional ':' or '=' separator and surrounding whitespace
        Regex::new(r"FW_VERSION\s*[:=]?\s*([0-9]+)\.([0-9]+)\.([0-9]+)")
            .expect("version pattern is valid")
    })
}

/// Extracts a firmware version from a received line.
///
/// Returns `None` for lines without the version marker or with a malformed
/// triple. Also accepts a bare `major.minor.patch` string (used when reading
/// the latest-known-version reference file).
///
/// # Examples
///
/// ```
/// use joystick_link::protocol::parse_version_line;
///
/// let v = parse_version_line("FW_VERSION: 1.4.2\n").unwrap();
/// assert_eq!(v.to_string(), "1.4.2");
/// assert!(parse_version_line("Raw: 2048,2048 | Norm: 0.00,0.00 | CENTER").is_none());
/// ```
#[must_use]
pub fn parse_version_line(line: &str) -> Option<FirmwareVersion> {
    let caps = version_regex().captures(line)?;
    // Capture groups are digit-only, so the parses cannot fail
    Some(FirmwareVersion {
        major: caps[1].parse().ok()?,
        minor: caps[2].parse().ok()?,
        patch: caps[3].parse().ok()?,
    })
}

/// Parses a bare dotted version triple, e.g. the contents of `version.txt`
#[must_use]
pub fn parse_version_str(text: &str) -> Option<FirmwareVersion> {
    let mut parts = text.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(FirmwareVersion { major, minor, patch })
}

/// One decoded raw-sample report from the device
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    /// Raw ADC pair (x, y)
    pub raw: (i32, i32),
    /// Device-computed normalized pair (x, y)
    pub norm: (f32, f32),
    /// Free-form direction label, e.g. "CENTER" or "UP"
    pub direction: String,
}

/// Parses a raw-sample report line.
///
/// The device emits something like:
///
/// ```text
/// Raw: 2048,2048 | Norm: 0.00,0.00 | CENTER
/// ```
///
/// Column spacing is device-defined and may vary, so parsing strips the `|`
/// decorations and splits on whitespace, locating the integer pair after
/// `Raw:` and the float pair after `Norm:`; the trailing token is the
/// direction label. Short or malformed lines yield `None` rather than an
/// error, so a glitched sample never takes the stream down.
#[must_use]
pub fn parse_raw_sample(line: &str) -> Option<RawSample> {
    if !line.contains(RAW_SAMPLE_MARKER) {
        return None;
    }
    let stripped = line.replace('|', " ");
    let tokens: Vec<&str> = stripped.split_whitespace().collect();

    let raw = pair_after(&tokens, RAW_SAMPLE_MARKER, parse_int_pair)?;
    let norm = pair_after(&tokens, "Norm:", parse_float_pair)?;
    let direction = (*tokens.last()?).to_string();

    Some(RawSample { raw, norm, direction })
}

fn pair_after<T>(tokens: &[&str], marker: &str, parse: fn(&str) -> Option<T>) -> Option<T> {
    let idx = tokens.iter().position(|t| *t == marker)?;
    parse(tokens.get(idx + 1)?)
}

fn parse_int_pair(token: &str) -> Option<(i32, i32)> {
    let (a, b) = token.split_once(',')?;
    Some((a.parse().ok()?, b.parse().ok()?))
}

fn parse_float_pair(token: &str) -> Option<(f32, f32)> {
    let (a, b) = token.split_once(',')?;
    Some((a.parse().ok()?, b.parse().ok()?))
}

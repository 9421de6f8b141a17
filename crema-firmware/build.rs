//! Build script for crema-firmware
//!
//! - Sets up linker search paths for memory.x
//! - Validates machine.toml and turns it into `machine_config.rs`

use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MachineToml {
    device: Device,
    link: Link,
    flow_meter: FlowMeter,
    pump: Pump,
    heater: Heaters,
    sensors: Sensors,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Device {
    serial_number: u32,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Link {
    baudrate: u32,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FlowMeter {
    ul_per_pulse: u16,
    no_flow_cutoff: u16,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Pump {
    mode: String,
    flow_kp: i32,
    flow_ki: i32,
    flow_kd: i32,
    flow_offset: u16,
    pressure_kp: i32,
    pressure_ki: i32,
    pressure_kd: i32,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Heaters {
    flow_through: FlowThrough,
    brew_head: BrewHead,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FlowThrough {
    kp: i32,
    ki: i32,
    kd: i32,
    low_track_w: u16,
    high_track_w: u16,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct BrewHead {
    kp: i32,
    ki: i32,
    kd: i32,
    track_w: u16,
    full_output_w: u16,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Sensors {
    ntc_pullup_ohms: u32,
    pressure_full_scale_mbar: u32,
}

fn main() {
    setup_linker();
    generate_config();
}

/// Set up linker search paths for memory.x
fn setup_linker() {
    let out_dir = out_dir();
    if let Err(e) = fs::write(out_dir.join("memory.x"), include_bytes!("memory.x")) {
        fail("Failed to copy memory.x", &[e.to_string()]);
    }
    println!("cargo:rustc-link-search={}", out_dir.display());
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

fn out_dir() -> PathBuf {
    match env::var("OUT_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => fail("OUT_DIR not set", &[e.to_string()]),
    }
}

fn generate_config() {
    println!("cargo:rerun-if-changed=machine.toml");

    let path = Path::new("machine.toml");
    let content = fs::read_to_string(path)
        .unwrap_or_else(|e| fail("Failed to read machine.toml", &[e.to_string()]));
    let config: MachineToml = toml::from_str(&content).unwrap_or_else(|e| {
        let lines = e.to_string().lines().map(str::to_string).collect::<Vec<_>>();
        fail("Invalid machine.toml", &lines)
    });

    let errors = validate(&config);
    if !errors.is_empty() {
        fail("machine.toml failed validation", &errors);
    }

    let rust = render(&config);
    if let Err(e) = fs::write(out_dir().join("machine_config.rs"), rust) {
        fail("Failed to write machine_config.rs", &[e.to_string()]);
    }
}

fn validate(config: &MachineToml) -> Vec<String> {
    let mut errors = Vec::new();

    if !matches!(config.link.baudrate, 9_600..=921_600) {
        errors.push(format!("link.baudrate {} out of range", config.link.baudrate));
    }
    if config.flow_meter.ul_per_pulse == 0 {
        errors.push("flow_meter.ul_per_pulse must not be 0".into());
    }
    if config.flow_meter.no_flow_cutoff == 0 {
        errors.push("flow_meter.no_flow_cutoff must not be 0".into());
    }
    if pump_mode(&config.pump.mode).is_none() {
        errors.push(format!(
            "pump.mode \"{}\" is not \"phase-cutting\" or \"elimination\"",
            config.pump.mode
        ));
    }
    if config.pump.flow_offset > 10_000 {
        errors.push("pump.flow_offset exceeds the 10000 output scale".into());
    }

    let ft = &config.heater.flow_through;
    if ft.low_track_w <= 1 || ft.high_track_w <= ft.low_track_w {
        errors.push("heater.flow_through needs 1 < low_track_w < high_track_w".into());
    }
    let bh = &config.heater.brew_head;
    if bh.track_w == 0 || bh.full_output_w == 0 {
        errors.push("heater.brew_head wattages must not be 0".into());
    }
    for (name, gain) in [
        ("heater.flow_through.kp", ft.kp),
        ("heater.flow_through.ki", ft.ki),
        ("heater.flow_through.kd", ft.kd),
        ("heater.brew_head.kp", bh.kp),
        ("heater.brew_head.ki", bh.ki),
        ("heater.brew_head.kd", bh.kd),
        ("pump.flow_kp", config.pump.flow_kp),
        ("pump.flow_ki", config.pump.flow_ki),
        ("pump.flow_kd", config.pump.flow_kd),
        ("pump.pressure_kp", config.pump.pressure_kp),
        ("pump.pressure_ki", config.pump.pressure_ki),
        ("pump.pressure_kd", config.pump.pressure_kd),
    ] {
        if gain < 0 {
            errors.push(format!("{name} must not be negative"));
        }
    }

    if config.sensors.ntc_pullup_ohms == 0 {
        errors.push("sensors.ntc_pullup_ohms must not be 0".into());
    }
    if config.sensors.pressure_full_scale_mbar == 0 {
        errors.push("sensors.pressure_full_scale_mbar must not be 0".into());
    }
    errors
}

fn pump_mode(mode: &str) -> Option<&'static str> {
    match mode {
        "phase-cutting" => Some("PhaseCutting"),
        "elimination" => Some("Elimination"),
        _ => None,
    }
}

fn render(config: &MachineToml) -> String {
    let ft = &config.heater.flow_through;
    let bh = &config.heater.brew_head;
    let pump = &config.pump;
    let mode = pump_mode(&pump.mode).unwrap_or("PhaseCutting");

    let mut out = String::new();
    out.push_str("// Generated from machine.toml by build.rs\n\n");
    let _ = writeln!(out, "pub const MACHINE: MachineConfig = MachineConfig {{");
    let _ = writeln!(out, "    serial_number: {:#010X},", config.device.serial_number);
    let _ = writeln!(out, "    baudrate: {},", config.link.baudrate);
    let _ = writeln!(out, "    ul_per_pulse: {},", config.flow_meter.ul_per_pulse);
    let _ = writeln!(out, "    no_flow_cutoff: {},", config.flow_meter.no_flow_cutoff);
    let _ = writeln!(out, "    pump_mode: PumpMode::{mode},");
    let _ = writeln!(
        out,
        "    flow_gains: PidCoefficients::from_scaled_1000({}, {}, {}),",
        pump.flow_kp, pump.flow_ki, pump.flow_kd
    );
    let _ = writeln!(out, "    flow_offset: {},", pump.flow_offset);
    let _ = writeln!(
        out,
        "    pressure_gains: PidCoefficients::from_scaled_1000({}, {}, {}),",
        pump.pressure_kp, pump.pressure_ki, pump.pressure_kd
    );
    let _ = writeln!(
        out,
        "    flow_through_gains: PidCoefficients::from_scaled_1000({}, {}, {}),",
        ft.kp, ft.ki, ft.kd
    );
    let _ = writeln!(
        out,
        "    tracks: TrackPower {{ low_w: {}, high_w: {} }},",
        ft.low_track_w, ft.high_track_w
    );
    let _ = writeln!(
        out,
        "    brew_head_gains: PidCoefficients::from_scaled_1000({}, {}, {}),",
        bh.kp, bh.ki, bh.kd
    );
    let _ = writeln!(out, "    brew_head_track_w: {},", bh.track_w);
    let _ = writeln!(out, "    brew_head_full_w: {},", bh.full_output_w);
    let _ = writeln!(out, "    ntc_pullup_ohms: {},", config.sensors.ntc_pullup_ohms);
    let _ = writeln!(
        out,
        "    pressure_full_scale_mbar: {},",
        config.sensors.pressure_full_scale_mbar
    );
    out.push_str("};\n");
    out
}

/// Abort the build with a boxed message
fn fail(title: &str, lines: &[String]) -> ! {
    let mut message = String::from("\n");
    let _ = writeln!(message, "╔{}╗", "═".repeat(68));
    let _ = writeln!(message, "║  ERROR: {:<58} ║", title);
    let _ = writeln!(message, "╠{}╣", "═".repeat(68));
    for line in lines {
        let shown = if line.chars().count() > 64 {
            format!("{}...", line.chars().take(61).collect::<String>())
        } else {
            line.clone()
        };
        let _ = writeln!(message, "║  {:<64}  ║", shown);
    }
    let _ = writeln!(message, "╚{}╝", "═".repeat(68));
    panic!("{message}");
}

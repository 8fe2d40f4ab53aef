//! Target registration and dispatch
//!
//! This module provides a centralized registry for all flash targets, with
//! support for feature-gated inclusion and dynamic help text generation.

use rmiflash_core::target::FlashTarget;

/// Information about a target backend
pub struct TargetInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available targets (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_targets() -> Vec<TargetInfo> {
    let mut targets = Vec::new();

    #[cfg(feature = "dummy")]
    targets.push(TargetInfo {
        name: "dummy",
        aliases: &[],
        description: "In-memory bootloader emulator for testing",
    });

    #[cfg(feature = "hidraw")]
    targets.push(TargetInfo {
        name: "hidraw",
        aliases: &["hid"],
        description: "Linux hidraw interface (dev=/dev/hidrawN)",
    });

    targets
}

/// Generate help text listing all available targets
pub fn target_help() -> String {
    let targets = available_targets();

    if targets.is_empty() {
        return "No targets available (recompile with target features enabled)".to_string();
    }

    let mut help = String::from("Available targets:\n");

    for t in &targets {
        help.push_str(&format!("  {:8} - {}\n", t.name, t.description));
    }

    help
}

/// Generate a short list of target names for CLI help
pub fn target_names_short() -> String {
    let targets = available_targets();
    let names: Vec<&str> = targets.iter().map(|t| t.name).collect();
    names.join(", ")
}

/// Check if a target name matches any available target
#[allow(unused_variables)]
pub fn find_target(name: &str) -> Option<&'static str> {
    #[cfg(feature = "dummy")]
    if name == "dummy" {
        return Some("dummy");
    }

    #[cfg(feature = "hidraw")]
    if name == "hidraw" || name == "hid" {
        return Some("hidraw");
    }

    None
}

/// Parse a target string into name and options
///
/// Format: "name" or "name:option1=value1,option2=value2"
pub fn parse_target_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}

/// Open the target named by a target string
///
/// The target string can be just the name (e.g., "hidraw") or include
/// parameters (e.g., "hidraw:dev=/dev/hidraw0").
#[allow(unused_variables)]
pub fn open_target(
    target: &str,
) -> Result<Box<dyn FlashTarget + Send>, Box<dyn std::error::Error>> {
    let (name, options) = parse_target_string(target);

    let canonical_name = match find_target(name) {
        Some(n) => n,
        None => return Err(unknown_target_error(name)),
    };

    match canonical_name {
        #[cfg(feature = "dummy")]
        "dummy" => {
            log::info!("Opening dummy target");
            Ok(Box::new(rmiflash_dummy::DummyRmi::new_default()))
        }

        #[cfg(feature = "hidraw")]
        "hidraw" => rmiflash_hidraw::open_hidraw(&options),

        _ => Err(unknown_target_error(name)),
    }
}

fn unknown_target_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("Unknown target: {}\n\n", name);
    msg.push_str(&target_help());
    msg.push_str("\nUse 'rmiflash list-targets' for more details");
    msg.into()
}

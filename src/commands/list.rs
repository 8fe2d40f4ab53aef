//! List commands implementation

use crate::targets;

/// List all available targets
pub fn list_targets() {
    let available = targets::available_targets();

    println!("Available targets:");
    println!();
    for t in &available {
        println!("  {:8} - {}", t.name, t.description);
        if !t.aliases.is_empty() {
            println!("  {:8}   aliases: {}", "", t.aliases.join(", "));
        }
    }
}

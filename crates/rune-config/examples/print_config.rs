/// Example program to print the loaded configuration
///
/// Run with: cargo run -p rune-config --example print_config

fn main() {
    // Load configuration from rune.toml
    let config = rune_config::RuneConfig::load();

    println!("=== Rune Flip Configuration ===\n");

    println!("Flip Settings:");
    println!("  Enabled: {}", config.flip.enabled);
    println!("  Duration (ms): {}", config.flip.duration_ms);
    println!("  Playback Rate: {}", config.flip.playback_rate);
    println!();

    println!("Logging Settings:");
    println!("  Filter: {}", config.logging.filter);
    println!();

    match toml::to_string_pretty(&config) {
        Ok(toml_str) => {
            println!("=== Serialized Configuration ===");
            println!("{}", toml_str);
        }
        Err(e) => {
            eprintln!("Failed to serialize config: {}", e);
        }
    }
}

// build.rs - TOML-driven compile-time limit generation
use std::env;
use std::fs;
use std::path::Path;

#[derive(serde::Deserialize)]
struct CompileTimeConfig {
    typecheck: TypecheckLimits,
    serialization: SerializationLimits,
    entities: EntityLimits,
    logging: LoggingLimits,
}

#[derive(serde::Deserialize)]
struct TypecheckLimits {
    max_depth: usize,
    max_chain_length: usize,
    max_overloads_tried: usize,
    max_error_message_length: usize,
}

#[derive(serde::Deserialize)]
struct SerializationLimits {
    max_tokens: usize,
    indent_width: usize,
}

#[derive(serde::Deserialize)]
struct EntityLimits {
    max_entities_per_type: usize,
    location_epsilon_micro: u32,
}

#[derive(serde::Deserialize)]
struct LoggingLimits {
    log_buffer_size: usize,
    max_log_message_length: usize,
    security_min_log_level: u8,
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=THINGTALK_BUILD_PROFILE");
    println!("cargo:rerun-if-env-changed=THINGTALK_CONFIG_DIR");

    let profile =
        env::var("THINGTALK_BUILD_PROFILE").unwrap_or_else(|_| "development".to_string());
    let config_dir = env::var("THINGTALK_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

    // Workspace root is the parent of the thingtalk directory
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let workspace_root = Path::new(&manifest_dir)
        .parent()
        .expect("Could not find workspace root (parent directory)");

    let config_path = workspace_root
        .join(&config_dir)
        .join(format!("{}.toml", profile));

    println!("cargo:rerun-if-changed={}", config_path.display());

    if !config_path.exists() {
        panic!(
            "Configuration file not found: {}\nWorkspace root: {}\nLooking for: {}/{}/{}.toml",
            config_path.display(),
            workspace_root.display(),
            workspace_root.display(),
            config_dir,
            profile
        );
    }

    let config_content = fs::read_to_string(&config_path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", config_path.display(), e));

    let config: CompileTimeConfig = toml::from_str(&config_content)
        .unwrap_or_else(|e| panic!("Invalid TOML in {}: {}", config_path.display(), e));

    validate_limits(&config, &profile);
    generate_constants(&config, &profile);
}

fn validate_limits(config: &CompileTimeConfig, profile: &str) {
    const ABSOLUTE_MAX_DEPTH: usize = 4096;
    const ABSOLUTE_MAX_TOKENS: usize = 50_000_000;
    const ABSOLUTE_MAX_INDENT: usize = 16;

    if config.typecheck.max_depth == 0 || config.typecheck.max_depth > ABSOLUTE_MAX_DEPTH {
        panic!("LIMITS: typecheck.max_depth must be in 1..={}", ABSOLUTE_MAX_DEPTH);
    }

    if config.typecheck.max_chain_length < 2 {
        panic!("LIMITS: typecheck.max_chain_length must allow at least two elements");
    }

    if config.serialization.max_tokens > ABSOLUTE_MAX_TOKENS {
        panic!("LIMITS: serialization.max_tokens exceeds absolute maximum");
    }

    if config.serialization.indent_width == 0
        || config.serialization.indent_width > ABSOLUTE_MAX_INDENT
    {
        panic!("LIMITS: serialization.indent_width must be in 1..={}", ABSOLUTE_MAX_INDENT);
    }

    if config.logging.security_min_log_level > 3 {
        panic!("LIMITS: security_min_log_level too high (max: 3)");
    }

    if profile == "production" && config.typecheck.max_depth > 512 {
        panic!("PRODUCTION: typecheck.max_depth too high for production");
    }
}

fn generate_constants(config: &CompileTimeConfig, profile: &str) {
    let out_dir = env::var("OUT_DIR").unwrap();
    let output_path = Path::new(&out_dir).join("constants.rs");

    let constants_code = format!(
        r#"
// Generated compile-time constants from TOML configuration
// Profile: {}
// DO NOT EDIT - Generated by build.rs

pub mod compile_time {{
    pub mod typecheck {{
        pub const MAX_DEPTH: usize = {};
        pub const MAX_CHAIN_LENGTH: usize = {};
        pub const MAX_OVERLOADS_TRIED: usize = {};
        pub const MAX_ERROR_MESSAGE_LENGTH: usize = {};
    }}

    pub mod serialization {{
        pub const MAX_TOKENS: usize = {};
        pub const INDENT_WIDTH: usize = {};
    }}

    pub mod entities {{
        pub const MAX_ENTITIES_PER_TYPE: usize = {};
        pub const LOCATION_EPSILON: f64 = {} as f64 / 1_000_000.0;
    }}

    pub mod logging {{
        pub const LOG_BUFFER_SIZE: usize = {};
        pub const MAX_LOG_MESSAGE_LENGTH: usize = {};
        pub const SECURITY_MIN_LOG_LEVEL: u8 = {};
    }}
}}
"#,
        profile,
        // Typecheck
        config.typecheck.max_depth,
        config.typecheck.max_chain_length,
        config.typecheck.max_overloads_tried,
        config.typecheck.max_error_message_length,
        // Serialization
        config.serialization.max_tokens,
        config.serialization.indent_width,
        // Entities
        config.entities.max_entities_per_type,
        config.entities.location_epsilon_micro,
        // Logging
        config.logging.log_buffer_size,
        config.logging.max_log_message_length,
        config.logging.security_min_log_level,
    );

    fs::write(output_path, constants_code).unwrap();
}

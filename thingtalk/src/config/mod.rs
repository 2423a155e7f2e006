//! Configuration module for the ThingTalk core
//! Compile-time limits are generated from the TOML profile by build.rs

include!(concat!(env!("OUT_DIR"), "/constants.rs"));

pub mod runtime;

pub use runtime::{ConfigError, RuntimeConfig};

/// Build information and configuration metadata
pub mod build_info {
    /// Returns the configuration profile used during build
    pub fn profile() -> &'static str {
        option_env!("THINGTALK_BUILD_PROFILE").unwrap_or("development")
    }

    /// Returns the configuration directory used during build
    pub fn config_dir() -> &'static str {
        option_env!("THINGTALK_CONFIG_DIR").unwrap_or("config")
    }

    /// Returns configuration source information
    pub fn source_info() -> String {
        format!("Generated from {}/{}.toml", config_dir(), profile())
    }
}

#[cfg(test)]
mod tests {
    use super::compile_time;

    #[test]
    fn test_generated_limits_are_sane() {
        assert!(compile_time::typecheck::MAX_DEPTH > 0);
        assert!(compile_time::typecheck::MAX_CHAIN_LENGTH >= 2);
        assert!(compile_time::serialization::INDENT_WIDTH > 0);
        assert!(compile_time::entities::LOCATION_EPSILON > 0.0);
        assert!(compile_time::entities::LOCATION_EPSILON < 1.0);
    }

    #[test]
    fn test_source_info() {
        assert!(super::build_info::source_info().ends_with(".toml"));
    }
}

use anyhow::{Error, Result};
use config_manager::config;
use config_manager::ConfigInit;

use proclang::parser::DEFAULT_MAX_DEPTH;
use proclang::ParseOptions;

#[config(
    clap(version, author),
    env_prefix = "proclang",
    file(
        format = "toml",
        clap(long = "config", short = 'c', help = "path to configuration file"),
        env = "proclang_config",
        default = "./proclang-config.toml"
    )
)]
struct InternalConfig {
    #[source(clap(long, short), env, config)]
    input: String,
    #[source(clap(long, short), env, config)]
    max_depth: Option<usize>,
    #[source(clap(long), env, config)]
    dump_symbols: bool,
    #[source(clap(long), env, config)]
    dump_tokens: bool,
}

pub struct Config {
    pub input: String,
    pub dump_symbols: bool,
    pub dump_tokens: bool,
    pub(crate) options: ParseOptions,
}

impl Config {
    pub fn try_parse() -> Result<Self> {
        let config = InternalConfig::parse()?;

        let InternalConfig {
            input,
            max_depth,
            dump_symbols,
            dump_tokens,
        } = config;

        let max_depth = match max_depth {
            None => DEFAULT_MAX_DEPTH,
            Some(0) => Err(Error::msg("max-depth must be at least 1"))?,
            Some(depth) => depth,
        };

        Ok(Self {
            input,
            dump_symbols,
            dump_tokens,
            options: ParseOptions { max_depth },
        })
    }
}

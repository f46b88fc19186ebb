//! Layered configuration merging

use crate::types::Config;
use breakwater_core::{Error, Result};

/// Merge configurations in order; later layers win field by field
pub fn merge_configs(configs: Vec<Config>) -> Result<Config> {
    let mut layers = configs.into_iter();
    let mut merged = layers
        .next()
        .ok_or_else(|| Error::Config("No configurations to merge".to_string()))?;

    for layer in layers {
        merged = merge_two(merged, layer);
    }

    Ok(merged)
}

fn merge_two(base: Config, overlay: Config) -> Config {
    let mut breakers = base.breakers;
    for (name, settings) in overlay.breakers {
        let merged = match breakers.get(&name) {
            Some(existing) => existing.overlay(&settings),
            None => settings,
        };
        breakers.insert(name, merged);
    }

    Config {
        defaults: base.defaults.overlay(&overlay.defaults),
        breakers,
        logging: overlay.logging.or(base.logging),
    }
}

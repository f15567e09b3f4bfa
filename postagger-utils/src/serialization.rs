use std::io::Read;

use failure::Error;
use log::warn;
use toml;

use crate::Config;

pub trait TomlRead
where
    Self: Sized,
{
    fn from_toml_read<R>(read: R) -> Result<Self, Error>
    where
        R: Read;
}

impl TomlRead for Config {
    fn from_toml_read<R>(mut read: R) -> Result<Self, Error>
    where
        R: Read,
    {
        let mut data = String::new();
        read.read_to_string(&mut data)?;
        let config: Config = toml::from_str(&data)?;

        if !config.input.feature_context.contains(&0) {
            warn!("The feature context does not contain the token that is tagged (offset 0)");
        }

        Ok(config)
    }
}

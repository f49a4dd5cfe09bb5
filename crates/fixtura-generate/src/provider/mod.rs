//! Value providers: the source of leaf values.

mod faker;
mod locales;

use std::collections::BTreeMap;

use fixtura_core::Value;
use rand::RngCore;

use crate::errors::GenerationError;

pub use faker::FakeProvider;
pub use locales::LocaleKey;

/// Produces a value for a named generator.
///
/// The random number generator is passed on every call so a run stays
/// reproducible from its seed.
pub trait ValueProvider {
    fn invoke(
        &self,
        generator: &str,
        args: &BTreeMap<String, serde_json::Value>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GenerationError>;
}

impl<P: ValueProvider + ?Sized> ValueProvider for &P {
    fn invoke(
        &self,
        generator: &str,
        args: &BTreeMap<String, serde_json::Value>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GenerationError> {
        (**self).invoke(generator, args, rng)
    }
}

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use fake::Fake;
use fixtura_core::Value;
use rand::distr::Uniform;
use rand::{Rng, RngCore};

use super::{LocaleKey, ValueProvider};
use crate::errors::GenerationError;
use crate::params::{ParamKind, ParamSpec, validate_params};

const GENERATORS: &[&str] = &[
    "city",
    "company",
    "country",
    "date",
    "email",
    "first_name",
    "last_name",
    "name",
    "paragraph",
    "phone_number",
    "pybool",
    "pyfloat",
    "pyint",
    "pystr",
    "random_element",
    "sentence",
    "street_name",
    "user_name",
    "uuid4",
    "word",
    "zip_code",
];

const PYINT_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("min_value", ParamKind::Int, false),
    ParamSpec::new("max_value", ParamKind::Int, false),
];
const PYFLOAT_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("min_value", ParamKind::Float, false),
    ParamSpec::new("max_value", ParamKind::Float, false),
    ParamSpec::new("right_digits", ParamKind::Int, false),
    ParamSpec::new("positive", ParamKind::Bool, false),
];
const PYSTR_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("min_chars", ParamKind::Int, false),
    ParamSpec::new("max_chars", ParamKind::Int, false),
    ParamSpec::new("prefix", ParamKind::String, false),
    ParamSpec::new("suffix", ParamKind::String, false),
];
const DATE_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("start_date", ParamKind::Date, false),
    ParamSpec::new("end_date", ParamKind::Date, false),
];
const ELEMENT_PARAMS: &[ParamSpec] = &[ParamSpec::new("elements", ParamKind::List, true)];
const WORDS_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("min_words", ParamKind::Int, false),
    ParamSpec::new("max_words", ParamKind::Int, false),
];
const SENTENCES_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("min_sentences", ParamKind::Int, false),
    ParamSpec::new("max_sentences", ParamKind::Int, false),
];

const DEFAULT_INT_MAX: i64 = 9999;
const DEFAULT_FLOAT_MAX: f64 = 10_000.0;
const DEFAULT_MAX_CHARS: usize = 20;
const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Expands to a `String` from the faker `$module::$faker` of the locale.
macro_rules! localized {
    ($locale:expr, $rng:expr, $module:ident :: $faker:ident ( $($arg:expr),* )) => {
        match $locale {
            LocaleKey::EnUs => {
                let value: String = fake::faker::$module::en::$faker($($arg),*).fake_with_rng($rng);
                value
            }
            LocaleKey::PtBr => {
                let value: String =
                    fake::faker::$module::pt_br::$faker($($arg),*).fake_with_rng($rng);
                value
            }
        }
    };
}

/// Provider backed by the `fake` crate.
///
/// Generator names follow the common faker vocabulary (`pyint`, `name`,
/// `date`, ...), so schema documents written for other faker libraries work
/// unchanged for the generators listed in [`FakeProvider::generators`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeProvider {
    locale: LocaleKey,
}

impl FakeProvider {
    pub fn new(locale: LocaleKey) -> Self {
        Self { locale }
    }

    pub fn locale(&self) -> LocaleKey {
        self.locale
    }

    /// Supported generator names, sorted.
    pub fn generators() -> &'static [&'static str] {
        GENERATORS
    }
}

impl ValueProvider for FakeProvider {
    fn invoke(
        &self,
        generator: &str,
        args: &BTreeMap<String, serde_json::Value>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GenerationError> {
        match generator {
            "pyint" => pyint(args, rng),
            "pyfloat" => pyfloat(args, rng),
            "pystr" => pystr(args, rng),
            "pybool" => {
                validate_params(args, &[], generator)?;
                Ok(Value::Bool(rng.random_bool(0.5)))
            }
            "date" => date(args, rng),
            "random_element" => random_element(args, rng),
            "uuid4" => {
                validate_params(args, &[], generator)?;
                let bytes: [u8; 16] = rng.random();
                let uuid = uuid::Builder::from_random_bytes(bytes).into_uuid();
                Ok(Value::Text(uuid.to_string()))
            }
            "sentence" => {
                let params = validate_params(args, WORDS_PARAMS, generator)?;
                let min = params.get_count(generator, "min_words", 4)?;
                let max = params.get_count(generator, "max_words", 10)?;
                let words = word_range(generator, min, max)?;
                Ok(Value::Text(localized!(self.locale, rng, lorem::Sentence(words))))
            }
            "paragraph" => {
                let params = validate_params(args, SENTENCES_PARAMS, generator)?;
                let min = params.get_count(generator, "min_sentences", 3)?;
                let max = params.get_count(generator, "max_sentences", 6)?;
                let sentences = word_range(generator, min, max)?;
                Ok(Value::Text(localized!(
                    self.locale,
                    rng,
                    lorem::Paragraph(sentences)
                )))
            }
            _ => self.text(generator, args, rng),
        }
    }
}

impl FakeProvider {
    fn text(
        &self,
        generator: &str,
        args: &BTreeMap<String, serde_json::Value>,
        rng: &mut dyn RngCore,
    ) -> Result<Value, GenerationError> {
        if !GENERATORS.contains(&generator) {
            return Err(GenerationError::Provider(format!(
                "unknown generator '{generator}'"
            )));
        }
        validate_params(args, &[], generator)?;

        let locale = self.locale;
        let text = match generator {
            "name" => localized!(locale, rng, name::Name()),
            "first_name" => localized!(locale, rng, name::FirstName()),
            "last_name" => localized!(locale, rng, name::LastName()),
            "email" => localized!(locale, rng, internet::SafeEmail()),
            "user_name" => localized!(locale, rng, internet::Username()),
            "company" => localized!(locale, rng, company::CompanyName()),
            "city" => localized!(locale, rng, address::CityName()),
            "country" => localized!(locale, rng, address::CountryName()),
            "street_name" => localized!(locale, rng, address::StreetName()),
            "zip_code" => localized!(locale, rng, address::ZipCode()),
            "phone_number" => localized!(locale, rng, phone_number::PhoneNumber()),
            "word" => localized!(locale, rng, lorem::Word()),
            other => {
                return Err(GenerationError::Provider(format!(
                    "generator '{other}' does not produce text"
                )));
            }
        };
        Ok(Value::Text(text))
    }
}

fn pyint(
    args: &BTreeMap<String, serde_json::Value>,
    rng: &mut dyn RngCore,
) -> Result<Value, GenerationError> {
    let params = validate_params(args, PYINT_PARAMS, "pyint")?;
    let min = params.get_i64("min_value").unwrap_or(0);
    let max = params.get_i64("max_value").unwrap_or(DEFAULT_INT_MAX);
    if min > max {
        return Err(GenerationError::Provider(
            "pyint: min_value must be <= max_value".to_string(),
        ));
    }
    Ok(Value::Int(rng.random_range(min..=max)))
}

fn pyfloat(
    args: &BTreeMap<String, serde_json::Value>,
    rng: &mut dyn RngCore,
) -> Result<Value, GenerationError> {
    let params = validate_params(args, PYFLOAT_PARAMS, "pyfloat")?;
    let mut min = params.get_f64("min_value").unwrap_or(0.0);
    let max = params.get_f64("max_value").unwrap_or(DEFAULT_FLOAT_MAX);
    if params.get_bool("positive").unwrap_or(false) {
        min = min.max(0.0);
    }
    if min > max {
        return Err(GenerationError::Provider(
            "pyfloat: min_value must be <= max_value".to_string(),
        ));
    }
    let range = Uniform::new_inclusive(min, max)
        .map_err(|err| GenerationError::Provider(format!("pyfloat: {err}")))?;
    let value = rng.sample(range);
    let value = match params.get_i64("right_digits") {
        Some(digits) if digits >= 0 => {
            let factor = 10_f64.powi(digits.min(15) as i32);
            (value * factor).round() / factor
        }
        Some(_) => {
            return Err(GenerationError::Provider(
                "pyfloat: right_digits must be >= 0".to_string(),
            ));
        }
        None => value,
    };
    Ok(Value::Float(value))
}

fn pystr(
    args: &BTreeMap<String, serde_json::Value>,
    rng: &mut dyn RngCore,
) -> Result<Value, GenerationError> {
    let params = validate_params(args, PYSTR_PARAMS, "pystr")?;
    let max = params.get_count("pystr", "max_chars", DEFAULT_MAX_CHARS)?;
    let min = params.get_count("pystr", "min_chars", max)?;
    if min > max {
        return Err(GenerationError::Provider(
            "pystr: min_chars must be <= max_chars".to_string(),
        ));
    }
    let len = rng.random_range(min..=max);
    let body: String = (0..len)
        .map(|_| LETTERS[rng.random_range(0..LETTERS.len())] as char)
        .collect();
    let prefix = params.get_str("prefix").unwrap_or_default();
    let suffix = params.get_str("suffix").unwrap_or_default();
    Ok(Value::Text(format!("{prefix}{body}{suffix}")))
}

fn date(
    args: &BTreeMap<String, serde_json::Value>,
    rng: &mut dyn RngCore,
) -> Result<Value, GenerationError> {
    let params = validate_params(args, DATE_PARAMS, "date")?;
    let start = params
        .get_date("start_date")
        .or_else(|| NaiveDate::from_ymd_opt(1970, 1, 1))
        .unwrap_or_default();
    let end = params
        .get_date("end_date")
        .or_else(|| NaiveDate::from_ymd_opt(2024, 12, 31))
        .unwrap_or_default();
    if start > end {
        return Err(GenerationError::Provider(
            "date: start_date must be <= end_date".to_string(),
        ));
    }
    let span = (end - start).num_days();
    let offset = rng.random_range(0..=span);
    Ok(Value::Date(start + Duration::days(offset)))
}

fn random_element(
    args: &BTreeMap<String, serde_json::Value>,
    rng: &mut dyn RngCore,
) -> Result<Value, GenerationError> {
    let params = validate_params(args, ELEMENT_PARAMS, "random_element")?;
    let elements = params.get_list("elements").unwrap_or_default();
    if elements.is_empty() {
        return Err(GenerationError::Provider(
            "random_element: elements must not be empty".to_string(),
        ));
    }
    let element = &elements[rng.random_range(0..elements.len())];
    Ok(Value::from_literal(element, None))
}

fn word_range(
    generator: &str,
    min: usize,
    max: usize,
) -> Result<std::ops::Range<usize>, GenerationError> {
    if min == 0 || min > max {
        return Err(GenerationError::Provider(format!(
            "{generator}: bounds must satisfy 1 <= min <= max"
        )));
    }
    Ok(min..max + 1)
}

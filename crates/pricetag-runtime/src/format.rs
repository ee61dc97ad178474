//! Label formatting.
//!
//! Turns an [`EvaluationResult`] into the text shown on a price badge:
//!
//! ```text
//! Usd { usd: 0.05 }                 -> "10.6 credits/Run"
//! Usd { usd: 0.05, approximate }    -> "~10.6 credits/Run"
//! RangeUsd { 0.02, 0.1 }            -> "4.2-21.1 credits/Run"
//! ListUsd { [0.02, 0.04] }          -> "4.2/8.4 credits/Run"
//! ```
//!
//! Options resolve per field: the result's own `format`, then the rule's
//! `result_defaults`, then the runtime-wide defaults.

use pricetag_config::FormatOptions;
use serde_json::Value;

use crate::credits::CreditRate;
use crate::result::EvaluationResult;

const DEFAULT_SUFFIX: &str = "/Run";
const DEFAULT_SEPARATOR: &str = "/";

/// Formats evaluation results into display labels.
#[derive(Debug, Clone)]
pub struct LabelFormatter {
  defaults: FormatOptions,
  credits: CreditRate,
}

impl LabelFormatter {
  pub fn new(defaults: FormatOptions, credits: CreditRate) -> Self {
    Self { defaults, credits }
  }

  /// Format an expression's raw JSON output. Unrecognized shapes give `""`.
  pub fn format_value(&self, value: &Value, rule_defaults: &FormatOptions) -> String {
    EvaluationResult::from_value(value)
      .map(|result| self.format(&result, rule_defaults))
      .unwrap_or_default()
  }

  /// Format a result. Amounts that are not finite in USD or in credits give `""`.
  pub fn format(&self, result: &EvaluationResult, rule_defaults: &FormatOptions) -> String {
    match result {
      EvaluationResult::Text { text } => text.clone(),
      EvaluationResult::Usd { usd, format } => {
        let Some(amount) = self.credits.format_usd(*usd) else {
          return String::new();
        };
        let options = self.resolve(format.as_ref(), rule_defaults);
        decorate(&amount, &options)
      }
      EvaluationResult::RangeUsd {
        min_usd,
        max_usd,
        format,
      } => {
        let (Some(min), Some(max)) = (
          self.credits.format_usd(*min_usd),
          self.credits.format_usd(*max_usd),
        ) else {
          return String::new();
        };
        let options = self.resolve(format.as_ref(), rule_defaults);
        if min == max {
          decorate(&min, &options)
        } else {
          decorate(&format!("{}-{}", min, max), &options)
        }
      }
      EvaluationResult::ListUsd { usd_values, format } => {
        let amounts: Vec<String> = usd_values
          .iter()
          .filter_map(|usd| self.credits.format_usd(*usd))
          .collect();
        if amounts.is_empty() {
          return String::new();
        }
        let options = self.resolve(format.as_ref(), rule_defaults);
        let separator = options.separator.as_deref().unwrap_or(DEFAULT_SEPARATOR);
        decorate(&amounts.join(separator), &options)
      }
    }
  }

  fn resolve(&self, own: Option<&FormatOptions>, rule_defaults: &FormatOptions) -> FormatOptions {
    let layered = rule_defaults.or(&self.defaults);
    match own {
      Some(own) => own.or(&layered),
      None => layered,
    }
  }
}

impl Default for LabelFormatter {
  fn default() -> Self {
    Self::new(default_options(), CreditRate::default())
  }
}

/// Runtime-wide label defaults.
pub fn default_options() -> FormatOptions {
  FormatOptions {
    suffix: Some(DEFAULT_SUFFIX.to_string()),
    note: None,
    approximate: Some(false),
    separator: Some(DEFAULT_SEPARATOR.to_string()),
  }
}

fn decorate(amount: &str, options: &FormatOptions) -> String {
  let prefix = if options.approximate.unwrap_or(false) {
    "~"
  } else {
    ""
  };
  let suffix = options.suffix.as_deref().unwrap_or(DEFAULT_SUFFIX);
  let note = match options.note.as_deref() {
    Some(note) if !note.is_empty() => format!(" {}", note),
    _ => String::new(),
  };
  format!("{}{} credits{}{}", prefix, amount, suffix, note)
}

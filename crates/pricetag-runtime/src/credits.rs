//! USD to credits conversion.

/// Fixed conversion rate from USD to display credits.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditRate {
  /// Credits per one US dollar.
  pub credits_per_usd: f64,
  /// Digits kept after the decimal point. Trailing zeros are dropped.
  pub max_fraction_digits: usize,
}

impl Default for CreditRate {
  fn default() -> Self {
    Self {
      credits_per_usd: 211.0,
      max_fraction_digits: 1,
    }
  }
}

impl CreditRate {
  /// Render a USD amount as a credits string, e.g. `10.0` → `"2,110"`.
  ///
  /// Returns `None` when the amount, or its conversion, is not finite.
  pub fn format_usd(&self, usd: f64) -> Option<String> {
    let credits = usd * self.credits_per_usd;
    credits
      .is_finite()
      .then(|| format_amount(credits, self.max_fraction_digits))
  }
}

fn format_amount(value: f64, fraction_digits: usize) -> String {
  let fixed = format!("{:.*}", fraction_digits, value);
  let trimmed = if fixed.contains('.') {
    fixed.trim_end_matches('0').trim_end_matches('.')
  } else {
    fixed.as_str()
  };

  let (sign, magnitude) = match trimmed.strip_prefix('-') {
    Some(rest) if rest != "0" => ("-", rest),
    Some(rest) => ("", rest),
    None => ("", trimmed),
  };

  match magnitude.split_once('.') {
    Some((int, frac)) => format!("{}{}.{}", sign, group_thousands(int), frac),
    None => format!("{}{}", sign, group_thousands(magnitude)),
  }
}

fn group_thousands(int: &str) -> String {
  let mut grouped = String::with_capacity(int.len() + int.len() / 3);
  for (i, c) in int.chars().enumerate() {
    if i > 0 && (int.len() - i) % 3 == 0 {
      grouped.push(',');
    }
    grouped.push(c);
  }
  grouped
}

//! Native source that evaluates arithmetic expressions.

use kestrel_plugin::{Calculation, Category, Kind, NativeSource, Query, Searchable};

pub struct CalcSource;

/// Plain numbers and words are not worth a result.
fn looks_like_expression(text: &str) -> bool {
    text.parse::<f64>().is_err()
        && text.chars().any(|c| c.is_ascii_digit())
        && text.chars().any(|c| "+-*/^%()".contains(c))
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

impl NativeSource for CalcSource {
    fn name(&self) -> &'static str {
        "calculator"
    }

    fn category(&self) -> Category {
        Category::Tools
    }

    fn query(&self, query: &Query) -> Vec<Searchable> {
        let expression = query.text.trim();
        if !looks_like_expression(expression) {
            return Vec::new();
        }
        let Ok(value) = meval::eval_str(expression) else {
            return Vec::new();
        };
        if !value.is_finite() {
            return Vec::new();
        }
        let identifier: String = expression.chars().filter(|c| !c.is_whitespace()).collect();
        vec![Searchable::new(
            Kind::Calculator(Calculation {
                expression: expression.to_string(),
                value,
            }),
            &identifier,
            format_value(value),
        )]
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn _kestrel_init() -> *mut dyn NativeSource {
    Box::into_raw(Box::new(CalcSource))
}

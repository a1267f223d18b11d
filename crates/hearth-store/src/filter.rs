use serde_json::Value;

/// Equality match on top-level JSON fields plus an optional row limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub eq: Vec<(String, Value)>,
    pub limit: Option<usize>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.eq.push((field.into(), value.into()));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, body: &Value) -> bool {
        self.eq.iter().all(|(field, expected)| {
            let actual = body.get(field).unwrap_or(&Value::Null);
            values_equal(actual, expected)
        })
    }
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => actual == expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_field_only_matches_null() {
        let body = json!({"id": "r1", "done": false});
        assert!(Filter::all().eq("time", Value::Null).matches(&body));
        assert!(!Filter::all().eq("time", "09:00").matches(&body));
    }

    #[test]
    fn numbers_compare_by_value() {
        let body = json!({"balance": 500});
        assert!(Filter::all().eq("balance", 500.0).matches(&body));
        assert!(Filter::all().eq("done", Value::Null).eq("balance", 500).matches(&body));
    }
}

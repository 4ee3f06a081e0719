//! Selection rules over [`FieldValue::selected`](crate::value::FieldValue::selected).

use crate::rule::{Outcome, RuleDefinition};
use crate::rules::{count, list};

/// Definitions of this family.
pub fn definitions() -> Vec<RuleDefinition> {
    vec![
        InList::definition(),
        NotInList::definition(),
        MinSelected::definition(),
        MaxSelected::definition(),
        ExactSelected::definition(),
        RangeSelected::definition(),
        MustInclude::definition(),
        MustExclude::definition(),
    ]
}

rule! {
    /// Every selected value is one of `values`.
    pub InList = "inList" in Selection;
    message "Please select a valid option";
    evaluate(value, params, _ctx) {
        let allowed = list(params, &["values", "value"])?;
        value.selected().iter().all(|item| allowed.contains(item))
    }
}

rule! {
    /// No selected value is one of `values`.
    pub NotInList = "notInList" in Selection;
    message "This value is not allowed";
    evaluate(value, params, _ctx) {
        let denied = list(params, &["values", "value"])?;
        !value.selected().iter().any(|item| denied.contains(item))
    }
}

rule! {
    pub MinSelected = "minSelected" in Selection;
    message "Please select at least {min} options";
    evaluate(value, params, _ctx) {
        value.selected().len() >= count(params, &["min", "value"])?
    }
}

rule! {
    pub MaxSelected = "maxSelected" in Selection;
    message "Please select no more than {max} options";
    evaluate(value, params, _ctx) {
        value.selected().len() <= count(params, &["max", "value"])?
    }
}

rule! {
    pub ExactSelected = "exactSelected" in Selection;
    message "Please select exactly {count} options";
    evaluate(value, params, _ctx) {
        value.selected().len() == count(params, &["count", "value"])?
    }
}

rule! {
    pub RangeSelected = "rangeSelected" in Selection;
    message "Please select between {min} and {max} options";
    evaluate(value, params, _ctx) {
        let min = count(params, &["min"])?;
        let max = count(params, &["max"])?;
        (min..=max).contains(&value.selected().len())
    }
}

rule! {
    /// Every one of `values` must be selected.
    pub MustInclude = "mustInclude" in Selection;
    message "Please include the required options";
    evaluate(value, params, _ctx) {
        let required = list(params, &["values", "value"])?;
        let selected = value.selected();
        let missing: Vec<&str> = required
            .iter()
            .filter(|item| !selected.contains(*item))
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            Outcome::Valid
        } else {
            Outcome::invalid(format!("Please include: {}", missing.join(", ")))
        }
    }
}

rule! {
    /// None of `values` may be selected.
    pub MustExclude = "mustExclude" in Selection;
    message "Please remove the excluded options";
    evaluate(value, params, _ctx) {
        let excluded = list(params, &["values", "value"])?;
        let present: Vec<String> = value
            .selected()
            .into_iter()
            .filter(|item| excluded.contains(item))
            .collect();
        if present.is_empty() {
            Outcome::Valid
        } else {
            Outcome::invalid(format!("Please remove: {}", present.join(", ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::rules::test_support::{eval, passes};
    use crate::value::FieldValue;
    use rstest::rstest;
    use serde_json::{Value, json};

    fn picked(items: &[&str]) -> FieldValue {
        FieldValue::List(items.iter().map(|s| (*s).to_owned()).collect())
    }

    #[rstest]
    #[case("inList", picked(&["red", "blue"]), json!(["red", "green", "blue"]), true)]
    #[case("inList", FieldValue::from("pink"), json!("red,green"), false)]
    #[case("notInList", FieldValue::from("root"), json!({"values": ["root", "admin"]}), false)]
    #[case("minSelected", picked(&["a"]), json!(2), false)]
    #[case("maxSelected", picked(&["a", "b"]), json!(2), true)]
    #[case("exactSelected", picked(&["a", "b"]), json!({"count": 2}), true)]
    #[case("rangeSelected", picked(&["a", "b", "c", "d"]), json!({"min": 1, "max": 3}), false)]
    #[case("mustInclude", picked(&["terms", "privacy"]), json!(["terms"]), true)]
    #[case("mustExclude", picked(&["a", "b"]), json!(["c"]), true)]
    #[case("minSelected", FieldValue::Bool(true), json!(1), true)]
    #[tokio::test]
    async fn selections(#[case] rule: &str, #[case] value: FieldValue, #[case] params: Value, #[case] ok: bool) {
        assert_eq!(passes(rule, value, params).await, ok, "{rule}");
    }

    #[tokio::test]
    async fn include_and_exclude_name_the_offenders() {
        let outcome = eval("mustInclude", picked(&["a"]), json!(["a", "b", "c"])).await;
        assert_eq!(outcome.message(), Some("Please include: b, c"));

        let outcome = eval("mustExclude", picked(&["a", "b"]), json!(["b"])).await;
        assert_eq!(outcome.message(), Some("Please remove: b"));
    }
}

//! Cartesian-product splitting of a composite query into per-stream sub-queries.

use serde_json::Value;
use std::collections::HashSet;

use crate::constants::streams::{SINGLE_STREAM_ID, STREAM_ID_SEPARATOR};
use crate::errors::StreamError;
use crate::types::{FieldName, Query, StreamId};
use crate::utils::value_to_param;

/// One element of the split product: a complete query bound to one stream.
#[derive(Clone, Debug, PartialEq)]
pub struct SubQuery {
    /// `field=value` pairs of the split fields, in split order.
    pub id: StreamId,
    /// Base filters followed by this stream's split values.
    pub query: Query,
}

impl SubQuery {
    /// The unsplit query as a single stream.
    pub fn whole(query: &Query) -> Self {
        Self {
            id: SINGLE_STREAM_ID.to_string(),
            query: query.clone(),
        }
    }
}

/// Text of a candidate inside a stream id; two candidates with the same text
/// would produce the same stream.
fn render_candidate(value: &Value) -> String {
    value_to_param(value).unwrap_or_else(|| "null".to_string())
}

/// Expand `query` into the Cartesian product of the candidate lists of `fields`.
///
/// Each split field is moved out of a copy of the base query; the remaining
/// fields are shared by every sub-query. Product order is lexicographic over
/// `fields` (the last field varies fastest). A scalar value counts as a
/// one-element list.
pub fn split_query(query: &Query, fields: &[FieldName]) -> Result<Vec<SubQuery>, StreamError> {
    if fields.is_empty() {
        return Ok(vec![SubQuery::whole(query)]);
    }
    let mut base = query.clone();
    let mut axes: Vec<(FieldName, Vec<Value>)> = Vec::with_capacity(fields.len());
    for field in fields {
        if axes.iter().any(|(existing, _)| existing == field) {
            return Err(StreamError::Configuration(format!(
                "split field '{field}' is listed more than once"
            )));
        }
        let value = base.shift_remove(field).ok_or_else(|| {
            StreamError::Configuration(format!(
                "split field '{field}' is not present in the base query"
            ))
        })?;
        let candidates = match value {
            Value::Array(items) => items,
            scalar => vec![scalar],
        };
        if candidates.is_empty() {
            return Err(StreamError::Configuration(format!(
                "split field '{field}' has no candidate values"
            )));
        }
        let mut rendered = HashSet::with_capacity(candidates.len());
        for candidate in &candidates {
            let param = render_candidate(candidate);
            if !rendered.insert(param.clone()) {
                return Err(StreamError::Configuration(format!(
                    "split field '{field}' lists candidate '{param}' more than once"
                )));
            }
        }
        axes.push((field.clone(), candidates));
    }

    let total: usize = axes.iter().map(|(_, values)| values.len()).product();
    let mut sub_queries = Vec::with_capacity(total);
    let mut digits = vec![0usize; axes.len()];
    for _ in 0..total {
        let mut query = base.clone();
        let mut id_parts = Vec::with_capacity(axes.len());
        for ((field, values), digit) in axes.iter().zip(&digits) {
            let value = &values[*digit];
            id_parts.push(format!("{field}={}", render_candidate(value)));
            query.insert(field.clone(), value.clone());
        }
        sub_queries.push(SubQuery {
            id: id_parts.join(STREAM_ID_SEPARATOR),
            query,
        });
        // Odometer increment, rightmost axis first.
        for axis in (0..axes.len()).rev() {
            digits[axis] += 1;
            if digits[axis] < axes[axis].1.len() {
                break;
            }
            digits[axis] = 0;
        }
    }
    Ok(sub_queries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query(pairs: &[(&str, Value)]) -> Query {
        pairs
            .iter()
            .map(|(field, value)| ((*field).to_string(), value.clone()))
            .collect()
    }

    fn fields(names: &[&str]) -> Vec<FieldName> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn splits_into_full_cartesian_product() {
        let base = query(&[("A", json!(["a1", "a2"])), ("B", json!(["b1"]))]);
        let subs = split_query(&base, &fields(&["A", "B"])).unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].query, query(&[("A", json!("a1")), ("B", json!("b1"))]));
        assert_eq!(subs[1].query, query(&[("A", json!("a2")), ("B", json!("b1"))]));
        assert_eq!(subs[0].id, "A=a1,B=b1");
        assert_eq!(subs[1].id, "A=a2,B=b1");
    }

    #[test]
    fn rightmost_field_varies_fastest() {
        let base = query(&[("A", json!([1, 2])), ("B", json!(["x", "y", "z"]))]);
        let ids: Vec<StreamId> = split_query(&base, &fields(&["A", "B"]))
            .unwrap()
            .into_iter()
            .map(|sub| sub.id)
            .collect();
        assert_eq!(
            ids,
            vec!["A=1,B=x", "A=1,B=y", "A=1,B=z", "A=2,B=x", "A=2,B=y", "A=2,B=z"]
        );
    }

    #[test]
    fn unsplit_fields_are_kept_in_every_sub_query() {
        let base = query(&[
            ("speciesKey", json!([1, 2])),
            ("country", json!("DE")),
            ("year", json!("1990,2000")),
        ]);
        let subs = split_query(&base, &fields(&["speciesKey"])).unwrap();
        assert_eq!(subs.len(), 2);
        for (sub, species) in subs.iter().zip([1, 2]) {
            let keys: Vec<&str> = sub.query.keys().map(String::as_str).collect();
            assert_eq!(keys, vec!["country", "year", "speciesKey"]);
            assert_eq!(sub.query["speciesKey"], json!(species));
            assert_eq!(sub.query["country"], json!("DE"));
        }
        // The caller's query is untouched.
        assert_eq!(base["speciesKey"], json!([1, 2]));
    }

    #[test]
    fn no_fields_yields_the_whole_query() {
        let base = query(&[("speciesKey", json!([1, 2]))]);
        let subs = split_query(&base, &[]).unwrap();
        assert_eq!(subs, vec![SubQuery::whole(&base)]);
        assert_eq!(subs[0].id, SINGLE_STREAM_ID);
    }

    #[test]
    fn scalar_values_act_as_single_candidates() {
        let base = query(&[("speciesKey", json!(7))]);
        let subs = split_query(&base, &fields(&["speciesKey"])).unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].id, "speciesKey=7");
    }

    #[test]
    fn invalid_split_requests_are_configuration_errors() {
        let base = query(&[
            ("speciesKey", json!([1])),
            ("empty", json!([])),
            ("repeated", json!([1, 2, 1])),
            ("same_text", json!([1, "1"])),
        ]);
        for names in [
            &["country"][..],
            &["empty"][..],
            &["speciesKey", "speciesKey"][..],
            &["repeated"][..],
            &["speciesKey", "same_text"][..],
        ] {
            assert!(matches!(
                split_query(&base, &fields(names)),
                Err(StreamError::Configuration(_))
            ));
        }
    }
}

//! Deterministic text rendering of responses, independent of string-table
//! order. String-index values print as the strings they refer to.

use crate::data::{Data, DataSeries};
use crate::datum::Datum;
use crate::value::Value;

fn lookup(strings: &[String], index: i64) -> String {
    usize::try_from(index)
        .ok()
        .and_then(|i| strings.get(i))
        .map(|s| format!("'{s}'"))
        .unwrap_or_else(|| format!("<missing string {index}>"))
}

fn join<T: ToString>(items: impl IntoIterator<Item = T>) -> String {
    let items: Vec<String> = items.into_iter().map(|i| i.to_string()).collect();
    format!("[ {} ]", items.join(", "))
}

impl Value {
    pub fn pretty_print(&self, strings: &[String]) -> String {
        match self {
            Value::Str(s) => format!("'{s}'"),
            Value::StrIndex(i) => lookup(strings, *i),
            Value::Strs(v) => join(v.iter().map(|s| format!("'{s}'"))),
            Value::StrIndices(v) => join(v.iter().map(|i| lookup(strings, *i))),
            Value::Int(i) => i.to_string(),
            Value::Ints(v) => join(v),
            Value::Double(d) => format!("{d:.6}"),
            Value::Duration(nanos) => format!("{nanos}ns"),
            Value::Timestamp(ts) => ts.to_string(),
        }
    }
}

impl Datum {
    /// Properties in key-string order, then children in order.
    pub fn pretty_print(&self, indent: &str, strings: &[String]) -> String {
        let mut props: Vec<(String, &Value)> = self
            .properties
            .iter()
            .map(|(k, v)| (lookup(strings, *k), v))
            .collect();
        props.sort_by(|a, b| a.0.cmp(&b.0));

        let mut lines: Vec<String> = props
            .into_iter()
            .map(|(key, value)| format!("{indent}Prop {key}: {}", value.pretty_print(strings)))
            .collect();
        let child_indent = format!("{indent}  ");
        for child in &self.children {
            lines.push(format!("{indent}Child:"));
            let rendered = child.pretty_print(&child_indent, strings);
            if !rendered.is_empty() {
                lines.push(rendered);
            }
        }
        lines.join("\n")
    }
}

impl DataSeries {
    pub fn pretty_print(&self, indent: &str, strings: &[String]) -> String {
        let mut lines = vec![
            format!("{indent}Series {}", self.series_name),
            format!("{indent}  Root:"),
        ];
        let root = self.root.pretty_print(&format!("{indent}    "), strings);
        if !root.is_empty() {
            lines.push(root);
        }
        lines.join("\n")
    }
}

impl Data {
    pub fn pretty_print(&self) -> String {
        let mut lines = vec!["Data:".to_string()];
        lines.extend(
            self.data_series
                .iter()
                .map(|s| s.pretty_print("  ", &self.string_table)),
        );
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_indices_print_as_strings() {
        let strings = vec!["name".to_string(), "baby".to_string()];
        let mut d = Datum::new();
        d.properties.insert(0, Value::StrIndex(1));
        d.children.push(Datum::new());
        assert_eq!(d.pretty_print("", &strings), "Prop 'name': 'baby'\nChild:");
    }

    #[test]
    fn properties_sort_by_key_string() {
        let strings: Vec<String> = ["zeta", "alpha"].iter().map(|s| s.to_string()).collect();
        let mut d = Datum::new();
        d.properties.insert(0, Value::int(1));
        d.properties.insert(1, Value::ints([2, 3]));
        assert_eq!(
            d.pretty_print("  ", &strings),
            "  Prop 'alpha': [ 2, 3 ]\n  Prop 'zeta': 1"
        );
    }

    #[test]
    fn missing_index_is_visible() {
        assert_eq!(Value::StrIndex(4).pretty_print(&[]), "<missing string 4>");
    }
}

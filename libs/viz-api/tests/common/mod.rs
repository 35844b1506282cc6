#![allow(dead_code)]

use viz_api::{Data, Datum, Value};

/// Index of `s` in the response's string table.
pub fn index_of(data: &Data, s: &str) -> i64 {
    data.string_table
        .iter()
        .position(|t| t == s)
        .unwrap_or_else(|| panic!("'{s}' not in string table {:?}", data.string_table)) as i64
}

/// Property of `datum` under the key string `key`.
pub fn prop<'a>(data: &Data, datum: &'a Datum, key: &str) -> &'a Value {
    let idx = index_of(data, key);
    datum
        .properties
        .get(&idx)
        .unwrap_or_else(|| panic!("no property '{key}' on {datum:?}"))
}

/// String a string-index property points at.
pub fn string_prop<'a>(data: &'a Data, datum: &Datum, key: &str) -> &'a str {
    let idx = prop(data, datum, key).expect_string_index().unwrap();
    &data.string_table[idx as usize]
}

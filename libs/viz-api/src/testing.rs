//! Helpers for testing data sources and property helpers: compare what two
//! pieces of building code produce, ignoring string-table order.

use crate::builder::{DatumBuilder, PropertyUpdate};
use crate::response::ResponseAssembler;

/// Checks that a list of updates under test produces the same node as a
/// list of expected updates. Repeated-field order matters; string-table
/// order does not.
#[derive(Debug, Default)]
pub struct UpdateComparator {
    got: Vec<PropertyUpdate>,
    want: Vec<PropertyUpdate>,
}

impl UpdateComparator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_test_updates(mut self, got: impl IntoIterator<Item = PropertyUpdate>) -> Self {
        self.got = got.into_iter().collect();
        self
    }

    pub fn with_want_updates(mut self, want: impl IntoIterator<Item = PropertyUpdate>) -> Self {
        self.want = want.into_iter().collect();
        self
    }

    /// `Err` carries a description of the difference, or the build error.
    pub fn compare(self) -> Result<(), String> {
        let asm = ResponseAssembler::new();
        let root = asm.series("");
        root.child().apply(self.got);
        root.child().apply(self.want);
        let data = asm.finish().map_err(|e| e.to_string())?;
        let children = &data.data_series[0].root.children;
        let got = children[0].pretty_print("", &data.string_table);
        let want = children[1].pretty_print("", &data.string_table);
        if got == want {
            Ok(())
        } else {
            Err(format!("got:\n{got}\nwant:\n{want}"))
        }
    }
}

fn render_with(build: impl FnOnce(&DatumBuilder)) -> Result<String, String> {
    let asm = ResponseAssembler::new();
    build(&asm.series(""));
    asm.finish().map(|d| d.pretty_print()).map_err(|e| e.to_string())
}

/// Run two build callbacks on fresh responses and compare their output.
pub fn compare_responses<G, W>(build_got: G, build_want: W) -> Result<(), String>
where
    G: FnOnce(&DatumBuilder),
    W: FnOnce(&DatumBuilder),
{
    let got = render_with(build_got)?;
    let want = render_with(build_want)?;
    if got == want {
        Ok(())
    } else {
        Err(format!("got:\n{got}\nwant:\n{want}"))
    }
}

/// Fluent tree builder for expected responses in tests.
///
/// ```ignore
/// TestDataBuilder::new(&root)
///     .child().with([PropertyUpdate::string("name", "a")])
///     .and_child().with([PropertyUpdate::string("name", "b")])
///     .child().with([PropertyUpdate::integer("depth", 2)]);
/// ```
pub struct TestDataBuilder<'a> {
    root: &'a DatumBuilder,
    stack: Vec<DatumBuilder>,
}

impl<'a> TestDataBuilder<'a> {
    pub fn new(root: &'a DatumBuilder) -> Self {
        Self { root, stack: Vec::new() }
    }

    fn current(&self) -> &DatumBuilder {
        self.stack.last().unwrap_or(self.root)
    }

    pub fn with(self, updates: impl IntoIterator<Item = PropertyUpdate>) -> Self {
        self.current().apply(updates);
        self
    }

    /// Descend into a new child of the current node.
    pub fn child(mut self) -> Self {
        let child = self.current().child();
        self.stack.push(child);
        self
    }

    /// Add a sibling of the current node, or a child when at the root.
    pub fn and_child(self) -> Self {
        if self.stack.is_empty() {
            return self.child();
        }
        self.parent().child()
    }

    /// Climb to the parent, staying put at the root.
    pub fn parent(mut self) -> Self {
        self.stack.pop();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equivalent_updates_compare_equal() {
        let result = UpdateComparator::new()
            .with_test_updates([
                PropertyUpdate::strings("choices", ["a"]),
                PropertyUpdate::extend_strings("choices", ["b", "c"]),
            ])
            .with_want_updates([PropertyUpdate::strings("choices", ["a", "b", "c"])])
            .compare();
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn list_order_matters() {
        let result = UpdateComparator::new()
            .with_test_updates([PropertyUpdate::strings("choices", ["b", "a"])])
            .with_want_updates([PropertyUpdate::strings("choices", ["a", "b"])])
            .compare();
        assert!(result.is_err());
    }

    #[test]
    fn fluent_navigation_matches_direct_building() {
        let result = compare_responses(
            |root| {
                TestDataBuilder::new(root)
                    .child()
                    .with([PropertyUpdate::string("name", "a")])
                    .child()
                    .with([PropertyUpdate::integer("depth", 1)])
                    .parent()
                    .and_child()
                    .with([PropertyUpdate::string("name", "b")]);
            },
            |root| {
                let top = root.child();
                top.with(PropertyUpdate::string("name", "a"));
                top.child().with(PropertyUpdate::integer("depth", 1));
                root.child().with(PropertyUpdate::string("name", "b"));
            },
        );
        assert_eq!(result, Ok(()));
    }
}

use snap_plugin_proto::rpc;
use std::fmt;
use std::ops::{Index, IndexMut};

/// Value used for a segment that stands for a wildcard instance.
pub const DYNAMIC_VALUE: &str = "*";

/// One segment of a metric namespace.
///
/// A segment with a non-empty `name` is dynamic: its value is filled in per
/// instance at collection time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NamespaceElement {
    value: String,
    name: String,
    description: String,
}

impl NamespaceElement {
    pub fn new(
        value: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            value: value.into(),
            name: name.into(),
            description: description.into(),
        }
    }

    pub fn new_static(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn new_dynamic(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(DYNAMIC_VALUE, name, description)
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn is_dynamic(&self) -> bool {
        !self.name.is_empty()
    }
}

impl From<&rpc::NamespaceElement> for NamespaceElement {
    fn from(elem: &rpc::NamespaceElement) -> Self {
        Self::new(
            elem.value.clone(),
            elem.name.clone(),
            elem.description.clone(),
        )
    }
}

impl From<&NamespaceElement> for rpc::NamespaceElement {
    fn from(elem: &NamespaceElement) -> Self {
        rpc::NamespaceElement {
            value: elem.value.clone(),
            description: elem.description.clone(),
            name: elem.name.clone(),
        }
    }
}

/// Ordered path of segments identifying a metric. The order of the segments
/// is the hierarchy and is never rearranged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Namespace {
    elements: Vec<NamespaceElement>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a namespace made of static segments only.
    pub fn from_static<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            elements: values
                .into_iter()
                .map(|value| NamespaceElement::new_static(value.as_ref()))
                .collect(),
        }
    }

    pub fn add_static_element(&mut self, value: impl Into<String>) -> &mut Self {
        self.elements.push(NamespaceElement::new_static(value));
        self
    }

    pub fn add_dynamic_element(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> &mut Self {
        self.elements
            .push(NamespaceElement::new_dynamic(name, description));
        self
    }

    pub fn push(&mut self, element: NamespaceElement) {
        self.elements.push(element);
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NamespaceElement> {
        self.elements.iter()
    }

    pub fn elements(&self) -> &[NamespaceElement] {
        &self.elements
    }

    /// True if any segment is dynamic.
    pub fn is_dynamic(&self) -> bool {
        self.elements.iter().any(NamespaceElement::is_dynamic)
    }

    /// Positions of the dynamic segments, in path order.
    pub fn dynamic_indexes(&self) -> Vec<usize> {
        self.elements
            .iter()
            .enumerate()
            .filter(|(_, elem)| elem.is_dynamic())
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Slash-joined segment values, e.g. `intel/procfs/*/load`.
    pub fn to_path_string(&self) -> String {
        let values: Vec<&str> = self.elements.iter().map(|e| e.value()).collect();
        values.join("/")
    }

    pub(crate) fn from_wire(elements: &[rpc::NamespaceElement]) -> Self {
        Self {
            elements: elements.iter().map(NamespaceElement::from).collect(),
        }
    }

    pub(crate) fn to_wire(&self) -> Vec<rpc::NamespaceElement> {
        self.elements.iter().map(rpc::NamespaceElement::from).collect()
    }
}

impl Index<usize> for Namespace {
    type Output = NamespaceElement;

    fn index(&self, index: usize) -> &Self::Output {
        &self.elements[index]
    }
}

impl IndexMut<usize> for Namespace {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.elements[index]
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path_string())
    }
}

impl<'a> IntoIterator for &'a Namespace {
    type Item = &'a NamespaceElement;
    type IntoIter = std::slice::Iter<'a, NamespaceElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_segments_are_tracked_by_name() {
        let mut ns = Namespace::from_static(["intel", "procfs"]);
        ns.add_dynamic_element("cpu_id", "cpu index")
            .add_static_element("load");

        assert_eq!(ns.len(), 4);
        assert!(ns.is_dynamic());
        assert_eq!(ns.dynamic_indexes(), vec![2]);
        assert_eq!(ns[2].value(), "*");
        assert_eq!(ns.to_path_string(), "intel/procfs/*/load");
    }

    #[test]
    fn setting_a_name_makes_a_segment_dynamic() {
        let mut ns = Namespace::from_static(["a", "b"]);
        assert!(!ns.is_dynamic());

        ns[1].set_name("host");
        assert!(ns[1].is_dynamic());
        assert_eq!(ns.dynamic_indexes(), vec![1]);
    }

    #[test]
    fn static_segments_from_borrowed_and_owned_values() {
        let borrowed = Namespace::from_static(&["a", "b"]);
        let zone = String::from("b");
        let mixed = Namespace::from_static(&["a", zone.as_str()]);
        let owned = Namespace::from_static(vec![String::from("a"), zone.clone()]);

        assert_eq!(borrowed, mixed);
        assert_eq!(borrowed, owned);
        assert_eq!(borrowed.to_path_string(), "a/b");
    }

    #[test]
    fn path_string_edge_cases() {
        assert_eq!(Namespace::new().to_path_string(), "");
        assert_eq!(Namespace::from_static(["only"]).to_string(), "only");
    }

    #[test]
    #[should_panic]
    fn out_of_range_index_panics() {
        let ns = Namespace::from_static(["a"]);
        let _ = &ns[1];
    }
}
